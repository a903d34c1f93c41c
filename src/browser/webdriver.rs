//! W3C WebDriver adapter implementing `Browser` over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::browser::Browser;
use crate::errors::AppError;

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Page source fragments that mean the browser, not the SUT, failed.
const KNOWN_BROWSER_ERRORS: &[&str] = &[
    "ERR_CONNECTION_REFUSED",
    "ERR_NAME_NOT_RESOLVED",
    "ERR_CONNECTION_RESET",
    "ERR_SSL_PROTOCOL_ERROR",
    "Unable to connect",
    "Server Not Found",
    "Secure Connection Failed",
];

const FIND_ATTEMPTS: u32 = 10;
const FIND_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Session against a WebDriver endpoint (geckodriver, chromedriver, Selenium).
#[derive(Debug)]
pub struct WebDriverBrowser {
    http: Client,
    session_url: String,
}

impl WebDriverBrowser {
    /// Open a new browser session.
    pub async fn connect(webdriver_url: &str, browser_name: &str) -> Result<Self, AppError> {
        let http = Client::new();
        let base = webdriver_url.trim_end_matches('/');
        let resp = http
            .post(format!("{base}/session"))
            .json(&json!({
                "capabilities": { "alwaysMatch": { "browserName": browser_name } }
            }))
            .send()
            .await
            .map_err(|e| AppError::Browser(format!("Failed to reach WebDriver at {base}: {e}")))?;
        let body = unwrap_value(resp).await?;
        let session_id = body
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Browser(format!("WebDriver returned no session id: {body}")))?;

        tracing::info!(browser = browser_name, session_id, "Opened WebDriver session");

        Ok(Self {
            http,
            session_url: format!("{base}/session/{session_id}"),
        })
    }

    /// End the browser session.
    pub async fn quit(&self) -> Result<(), AppError> {
        self.http
            .delete(&self.session_url)
            .send()
            .await
            .map_err(|e| AppError::Browser(format!("Failed to close WebDriver session: {e}")))?;
        Ok(())
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, AppError> {
        let resp = self
            .http
            .post(format!("{}{path}", self.session_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Browser(e.to_string()))?;
        unwrap_value(resp).await
    }

    async fn get(&self, path: &str) -> Result<Value, AppError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.session_url))
            .send()
            .await
            .map_err(|e| AppError::Browser(e.to_string()))?;
        unwrap_value(resp).await
    }

    async fn page_source(&self) -> Result<String, AppError> {
        let value = self.get("/source").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn try_find(&self, locator: &str) -> Option<String> {
        for selector in css_candidates(locator) {
            let found = self
                .post(
                    "/element",
                    json!({ "using": "css selector", "value": selector }),
                )
                .await;
            if let Ok(value) = found {
                if let Some(id) = value.get(ELEMENT_KEY).and_then(Value::as_str) {
                    return Some(id.to_string());
                }
            }
        }
        None
    }

    /// Locate an element, retrying while the page settles.
    async fn find_element(&self, locator: &str, visible: bool) -> Result<String, AppError> {
        for attempt in 1..=FIND_ATTEMPTS {
            if let Some(id) = self.try_find(locator).await {
                if !visible || self.is_displayed(&id).await {
                    return Ok(id);
                }
            }
            tracing::debug!(locator, attempt, "Element not ready yet");
            tokio::time::sleep(FIND_RETRY_DELAY).await;
        }
        Err(AppError::Browser(format!(
            "Timed out locating element \"{locator}\""
        )))
    }

    async fn is_displayed(&self, element_id: &str) -> bool {
        self.get(&format!("/element/{element_id}/displayed"))
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Unwrap the `value` member of a WebDriver response, mapping error payloads.
async fn unwrap_value(resp: reqwest::Response) -> Result<Value, AppError> {
    let status = resp.status();
    let body: Value = resp
        .json()
        .await
        .map_err(|e| AppError::Browser(format!("Undecodable WebDriver response: {e}")))?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if !status.is_success() {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown WebDriver error");
        return Err(AppError::Browser(format!("WebDriver error {status}: {message}")));
    }
    Ok(value)
}

/// Selectors tried in order: name attribute, id, class list, raw CSS.
fn css_candidates(locator: &str) -> Vec<String> {
    let mut candidates = vec![format!("[name=\"{locator}\"]")];
    if !locator.contains(char::is_whitespace) {
        candidates.push(format!("[id=\"{locator}\"]"));
    }
    let classes: Vec<&str> = locator.split_whitespace().collect();
    if classes.iter().all(|c| c.chars().all(|ch| ch.is_alphanumeric() || ch == '-' || ch == '_')) {
        candidates.push(format!(".{}", classes.join(".")));
    }
    candidates.push(locator.to_string());
    candidates
}

/// The first known browser error present in a page source.
fn known_browser_error(page_source: &str) -> Option<&'static str> {
    KNOWN_BROWSER_ERRORS
        .iter()
        .copied()
        .find(|marker| page_source.contains(marker))
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn find_element_then_click(
        &self,
        locator: &str,
        expected_page_source: Option<&str>,
    ) -> Result<(), AppError> {
        let id = self.find_element(locator, true).await?;
        self.post(&format!("/element/{id}/click"), json!({})).await?;

        if let Some(expected) = expected_page_source {
            self.check_user_is_authenticated(expected).await?;
        }
        Ok(())
    }

    async fn find_element_then_send_keys(
        &self,
        locator: &str,
        value: &str,
        visible: bool,
    ) -> Result<(), AppError> {
        let id = self.find_element(locator, visible).await?;
        self.post(&format!("/element/{id}/value"), json!({ "text": value }))
            .await?;
        Ok(())
    }

    async fn find_element_then_clear(&self, locator: &str, visible: bool) -> Result<(), AppError> {
        let id = self.find_element(locator, visible).await?;
        self.post(&format!("/element/{id}/clear"), json!({})).await?;
        Ok(())
    }

    async fn check_user_is_authenticated(&self, expected_page_source: &str) -> Result<(), AppError> {
        let source = self.page_source().await?;
        if source.contains(expected_page_source) {
            tracing::info!(audience = "build_user", "User is authenticated");
            Ok(())
        } else {
            Err(AppError::Browser(format!(
                "User was not authenticated: expected page source to contain \"{expected_page_source}\""
            )))
        }
    }

    async fn check_and_notify_build_user_if_any_known_browser_errors(&self) -> Result<(), AppError> {
        let source = self.page_source().await?;
        match known_browser_error(&source) {
            Some(marker) => {
                tracing::error!(audience = "build_user", marker, "Browser reported a known error");
                Err(AppError::Browser(format!(
                    "The browser reported \"{marker}\", the SUT is probably unreachable"
                )))
            }
            None => Ok(()),
        }
    }
}
