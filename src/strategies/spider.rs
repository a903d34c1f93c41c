//! Phase 4: spidering.

use crate::errors::AppError;
use crate::services::context::SessionContext;

strategy_enum!(
    /// Crawls run per context target inside the scanning phase, so each one
    /// completes under the forced user right before its attack.
    Spider,
    "spider",
    [ScanDriven]
);

impl Spider {
    pub async fn scan(&self, ctx: &SessionContext) -> Result<(), AppError> {
        self.log_invoked("scan");
        match self {
            Self::ScanDriven => {
                let context_id = ctx.context_id()?;
                tracing::info!(context_id, "Spidering runs per context target during scanning");
                Ok(())
            }
        }
    }
}
