//! Phase 8: reports.

use crate::errors::AppError;
use crate::services::context::SessionContext;
use crate::services::reporting;

strategy_enum!(Reporting, "reporting", [Standard]);

impl Reporting {
    /// Returns the generated report file names.
    pub async fn create_reports(&self, ctx: &SessionContext) -> Result<Vec<String>, AppError> {
        self.log_invoked("createReports");
        match self {
            Self::Standard => reporting::create_reports(ctx).await,
        }
    }
}
