//! Browser-automation handle used by the SUT-facing phases.

pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::AppError;

pub use webdriver::WebDriverBrowser;

/// Page-level browser capabilities the phases need.
///
/// Every operation acts on the currently visible page and fails with
/// `AppError::Browser` when an element cannot be found in time.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Load `url` in the current window.
    async fn navigate(&self, url: &str) -> Result<(), AppError>;

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Click the located element, then optionally require `expected_page_source`
    /// in the resulting page.
    async fn find_element_then_click(
        &self,
        locator: &str,
        expected_page_source: Option<&str>,
    ) -> Result<(), AppError>;

    async fn find_element_then_send_keys(
        &self,
        locator: &str,
        value: &str,
        visible: bool,
    ) -> Result<(), AppError>;

    async fn find_element_then_clear(&self, locator: &str, visible: bool) -> Result<(), AppError>;

    /// Require `expected_page_source` in the current page.
    async fn check_user_is_authenticated(&self, expected_page_source: &str)
        -> Result<(), AppError>;

    /// Fail when the page shows a known browser-level error.
    async fn check_and_notify_build_user_if_any_known_browser_errors(&self)
        -> Result<(), AppError>;
}
