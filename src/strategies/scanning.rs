//! Phase 6: crawl and attack.

use crate::errors::AppError;
use crate::services::context::SessionContext;
use crate::services::poller::CompletionPoller;
use crate::services::scan_driver::{ScanDriver, ScanSummary};

strategy_enum!(Scanning, "scanning", [BrowserAppStandard]);

impl Scanning {
    /// Crawl every context target, then attack every route.
    ///
    /// `poller` overrides the session's feedback interval when given.
    pub async fn scan(
        &self,
        ctx: &SessionContext,
        poller: Option<CompletionPoller>,
    ) -> Result<ScanSummary, AppError> {
        self.log_invoked("scan");
        match self {
            Self::BrowserAppStandard => {
                let mut driver = ScanDriver::new(ctx);
                if let Some(poller) = poller {
                    driver = driver.with_poller(poller);
                }
                let summary = driver.run().await?;
                tracing::info!(
                    audience = "build_user",
                    crawls = summary.crawls,
                    active_scans = summary.active_scans,
                    alerts = summary.alerts,
                    "Scanning complete"
                );
                Ok(summary)
            }
        }
    }
}
