//! Phase 7: judge the session against its alert threshold.

use crate::errors::AppError;
use crate::services::context::SessionContext;
use crate::services::threshold::{self, AlertScope, Verdict};

strategy_enum!(PostScanning, "postScanning", [BrowserAppStandard]);

impl PostScanning {
    pub fn process(&self, ctx: &SessionContext) -> Result<Verdict, AppError> {
        self.log_invoked("process");
        match self {
            Self::BrowserAppStandard => {
                let alert_threshold = ctx.sut().test_session.attributes.alert_threshold;
                let verdict = threshold::evaluate(
                    ctx.number_of_alerts(),
                    alert_threshold,
                    AlertScope::for_session(ctx.sut()),
                );
                if verdict.passed() {
                    tracing::info!(audience = "build_user", verdict = %verdict, "Well done, this Test Session passed");
                } else {
                    tracing::warn!(
                        audience = "build_user",
                        verdict = %verdict,
                        "Search the generated reports for the alerts that exceed the alert threshold"
                    );
                }
                Ok(verdict)
            }
        }
    }
}
