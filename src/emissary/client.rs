//! HTTP client for the Emissary JSON API.
//!
//! Every call is `GET <api>/JSON/<area>/<view|action>/<name>/?<params>` with
//! the API key header. Calls pass a single-slot gate: the engine corrupts its
//! configuration under concurrent mutation, so no two calls are ever in flight
//! from one client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::emissary::{ActiveScanRequest, ActiveScanner, Emissary, OptionValue, SpiderAsUserRequest};
use crate::errors::EngineError;
use crate::models::report::ReportDescriptor;
use crate::models::scan::ScanStatus;

/// Header carrying the Emissary API key.
pub const API_KEY_HEADER: &str = "X-ZAP-API-Key";

#[derive(Debug, Clone, Copy)]
enum CallKind {
    View,
    Action,
}

impl CallKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Action => "action",
        }
    }
}

/// `Emissary` implementation over the engine's HTTP JSON API.
#[derive(Debug)]
pub struct EmissaryClient {
    http: Client,
    api_url: String,
    api_key: String,
    gate: Mutex<()>,
}

impl EmissaryClient {
    pub fn new(api_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, EngineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            gate: Mutex::new(()),
        })
    }

    async fn call(
        &self,
        area: &str,
        kind: CallKind,
        name: &str,
        params: &[(&str, String)],
    ) -> Result<Value, EngineError> {
        let _slot = self.gate.lock().await;

        let url = format!("{}/JSON/{area}/{}/{name}/", self.api_url, kind.as_str());
        tracing::debug!(area, call = name, "Emissary API call");

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let field = |key: &str| {
                parsed
                    .as_ref()
                    .and_then(|v| v.get(key))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            return Err(EngineError::Api {
                status: status.as_u16(),
                code: field("code").unwrap_or_else(|| status.to_string()),
                message: field("message").unwrap_or(body),
            });
        }

        parsed.ok_or_else(|| EngineError::Decode(format!("{area}/{name} returned non-JSON body")))
    }

    async fn view(&self, area: &str, name: &str, params: &[(&str, String)]) -> Result<Value, EngineError> {
        self.call(area, CallKind::View, name, params).await
    }

    async fn action(&self, area: &str, name: &str, params: &[(&str, String)]) -> Result<Value, EngineError> {
        self.call(area, CallKind::Action, name, params).await
    }
}

/// Pull a string field out of a response, accepting numbers too.
fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_field(value: &Value, key: &str) -> Result<String, EngineError> {
    string_field(value, key)
        .ok_or_else(|| EngineError::Decode(format!("response has no \"{key}\": {value}")))
}

#[async_trait]
impl Emissary for EmissaryClient {
    async fn new_context(&self, context_name: &str) -> Result<String, EngineError> {
        let resp = self
            .action("context", "newContext", &[("contextName", context_name.to_string())])
            .await?;
        required_field(&resp, "contextId")
    }

    async fn include_in_context(&self, context_name: &str, regex: &str) -> Result<Value, EngineError> {
        self.action(
            "context",
            "includeInContext",
            &[("contextName", context_name.to_string()), ("regex", regex.to_string())],
        )
        .await
    }

    async fn exclude_from_context(&self, context_name: &str, regex: &str) -> Result<Value, EngineError> {
        self.action(
            "context",
            "excludeFromContext",
            &[("contextName", context_name.to_string()), ("regex", regex.to_string())],
        )
        .await
    }

    async fn set_authentication_method(
        &self,
        context_id: &str,
        auth_method_name: &str,
        auth_method_config_params: &str,
    ) -> Result<Value, EngineError> {
        self.action(
            "authentication",
            "setAuthenticationMethod",
            &[
                ("contextId", context_id.to_string()),
                ("authMethodName", auth_method_name.to_string()),
                ("authMethodConfigParams", auth_method_config_params.to_string()),
            ],
        )
        .await
    }

    async fn set_logged_in_indicator(
        &self,
        context_id: &str,
        logged_in_indicator_regex: &str,
    ) -> Result<Value, EngineError> {
        self.action(
            "authentication",
            "setLoggedInIndicator",
            &[
                ("contextId", context_id.to_string()),
                ("loggedInIndicatorRegex", logged_in_indicator_regex.to_string()),
            ],
        )
        .await
    }

    async fn set_logged_out_indicator(
        &self,
        context_id: &str,
        logged_out_indicator_regex: &str,
    ) -> Result<Value, EngineError> {
        self.action(
            "authentication",
            "setLoggedOutIndicator",
            &[
                ("contextId", context_id.to_string()),
                ("loggedOutIndicatorRegex", logged_out_indicator_regex.to_string()),
            ],
        )
        .await
    }

    async fn new_user(&self, context_id: &str, name: &str) -> Result<String, EngineError> {
        let resp = self
            .action(
                "users",
                "newUser",
                &[("contextId", context_id.to_string()), ("name", name.to_string())],
            )
            .await?;
        required_field(&resp, "userId")
    }

    async fn set_authentication_credentials(
        &self,
        context_id: &str,
        user_id: &str,
        auth_credentials_config_params: &str,
    ) -> Result<Value, EngineError> {
        self.action(
            "users",
            "setAuthenticationCredentials",
            &[
                ("contextId", context_id.to_string()),
                ("userId", user_id.to_string()),
                ("authCredentialsConfigParams", auth_credentials_config_params.to_string()),
            ],
        )
        .await
    }

    async fn set_user_enabled(&self, context_id: &str, user_id: &str, enabled: bool) -> Result<Value, EngineError> {
        self.action(
            "users",
            "setUserEnabled",
            &[
                ("contextId", context_id.to_string()),
                ("userId", user_id.to_string()),
                ("enabled", enabled.to_string()),
            ],
        )
        .await
    }

    async fn set_forced_user(&self, context_id: &str, user_id: &str) -> Result<Value, EngineError> {
        self.action(
            "forcedUser",
            "setForcedUser",
            &[("contextId", context_id.to_string()), ("userId", user_id.to_string())],
        )
        .await
    }

    async fn set_forced_user_mode_enabled(&self, enabled: bool) -> Result<Value, EngineError> {
        self.action("forcedUser", "setForcedUserModeEnabled", &[("boolean", enabled.to_string())])
            .await
    }

    async fn set_spider_max_depth(&self, max_depth: u32) -> Result<Value, EngineError> {
        self.action("spider", "setOptionMaxDepth", &[("Integer", max_depth.to_string())])
            .await
    }

    async fn set_spider_thread_count(&self, thread_count: u32) -> Result<Value, EngineError> {
        self.action("spider", "setOptionThreadCount", &[("Integer", thread_count.to_string())])
            .await
    }

    async fn spider_scan_as_user(&self, request: &SpiderAsUserRequest) -> Result<String, EngineError> {
        let resp = self
            .action(
                "spider",
                "scanAsUser",
                &[
                    ("contextId", request.context_id.clone()),
                    ("userId", request.user_id.clone()),
                    ("url", request.url.clone()),
                    ("maxChildren", request.max_children.to_string()),
                    ("recurse", request.recurse.to_string()),
                    ("subtreeOnly", request.subtree_only.to_string()),
                ],
            )
            .await?;
        required_field(&resp, "scanAsUser")
    }

    async fn spider_status(&self, scan_id: &str) -> Result<ScanStatus, EngineError> {
        let resp = self.view("spider", "status", &[("scanId", scan_id.to_string())]).await?;
        Ok(ScanStatus::parse(string_field(&resp, "status").as_deref()))
    }

    async fn ascan_scan(&self, request: &ActiveScanRequest) -> Result<String, EngineError> {
        let resp = self
            .action(
                "ascan",
                "scan",
                &[
                    ("url", request.url.clone()),
                    ("recurse", request.recurse.to_string()),
                    ("inScopeOnly", request.in_scope_only.to_string()),
                    ("scanPolicyName", request.scan_policy_name.clone()),
                    ("method", request.method.clone()),
                    ("postData", request.post_data.clone()),
                    ("contextId", request.context_id.clone()),
                ],
            )
            .await?;
        required_field(&resp, "scan")
    }

    async fn ascan_status(&self, scan_id: &str) -> Result<ScanStatus, EngineError> {
        let resp = self.view("ascan", "status", &[("scanId", scan_id.to_string())]).await?;
        Ok(ScanStatus::parse(string_field(&resp, "status").as_deref()))
    }

    async fn ascan_disable_all_scanners(&self, scan_policy_name: &str) -> Result<Value, EngineError> {
        self.action(
            "ascan",
            "disableAllScanners",
            &[("scanPolicyName", scan_policy_name.to_string())],
        )
        .await
    }

    async fn ascan_enable_all_scanners(&self, scan_policy_name: &str) -> Result<Value, EngineError> {
        self.action(
            "ascan",
            "enableAllScanners",
            &[("scanPolicyName", scan_policy_name.to_string())],
        )
        .await
    }

    async fn ascan_disable_scanners(&self, ids: &str, scan_policy_name: &str) -> Result<Value, EngineError> {
        self.action(
            "ascan",
            "disableScanners",
            &[("ids", ids.to_string()), ("scanPolicyName", scan_policy_name.to_string())],
        )
        .await
    }

    async fn ascan_view_scanners(
        &self,
        scan_policy_name: &str,
        policy_id: &str,
    ) -> Result<Vec<ActiveScanner>, EngineError> {
        let resp = self
            .view(
                "ascan",
                "scanners",
                &[
                    ("scanPolicyName", scan_policy_name.to_string()),
                    ("policyId", policy_id.to_string()),
                ],
            )
            .await?;
        let scanners = resp
            .get("scanners")
            .cloned()
            .ok_or_else(|| EngineError::Decode(format!("response has no \"scanners\": {resp}")))?;
        serde_json::from_value(scanners).map_err(|e| EngineError::Decode(e.to_string()))
    }

    async fn ascan_set_scanner_attack_strength(
        &self,
        id: &str,
        attack_strength: &str,
        scan_policy_name: &str,
    ) -> Result<Value, EngineError> {
        self.action(
            "ascan",
            "setScannerAttackStrength",
            &[
                ("id", id.to_string()),
                ("attackStrength", attack_strength.to_string()),
                ("scanPolicyName", scan_policy_name.to_string()),
            ],
        )
        .await
    }

    async fn ascan_set_scanner_alert_threshold(
        &self,
        id: &str,
        alert_threshold: &str,
        scan_policy_name: &str,
    ) -> Result<Value, EngineError> {
        self.action(
            "ascan",
            "setScannerAlertThreshold",
            &[
                ("id", id.to_string()),
                ("alertThreshold", alert_threshold.to_string()),
                ("scanPolicyName", scan_policy_name.to_string()),
            ],
        )
        .await
    }

    async fn pscan_disable_scanners(&self, ids: &str) -> Result<Value, EngineError> {
        self.action("pscan", "disableScanners", &[("ids", ids.to_string())])
            .await
    }

    async fn number_of_alerts(&self, base_url: &str) -> Result<u64, EngineError> {
        let resp = self
            .view("core", "numberOfAlerts", &[("baseurl", base_url.to_string())])
            .await?;
        let raw = required_field(&resp, "numberOfAlerts")?;
        raw.parse()
            .map_err(|_| EngineError::Decode(format!("numberOfAlerts is not a count: {raw}")))
    }

    async fn generate_report(&self, report: &ReportDescriptor) -> Result<Value, EngineError> {
        self.action(
            "reports",
            "generate",
            &[
                ("title", report.title.clone()),
                ("template", report.template.clone()),
                ("theme", report.theme.clone()),
                ("description", report.description.clone()),
                ("contexts", report.contexts.clone()),
                ("sites", report.sites.clone()),
                ("sections", report.sections.clone()),
                ("includedConfidences", report.included_confidences.clone()),
                ("includedRisks", report.included_risks.clone()),
                ("reportFileName", report.report_file_name.clone()),
                ("reportFileNamePattern", report.report_file_name_pattern.clone()),
                ("reportDir", report.report_dir.clone()),
                ("display", report.display.to_string()),
            ],
        )
        .await
    }

    async fn import_urls_file(&self, file_path: &str) -> Result<Value, EngineError> {
        self.action("importurls", "importurls", &[("filePath", file_path.to_string())])
            .await
    }

    async fn openapi_import_url(
        &self,
        url: &str,
        host_override: &str,
        context_id: &str,
    ) -> Result<Value, EngineError> {
        self.action(
            "openapi",
            "importUrl",
            &[
                ("url", url.to_string()),
                ("hostOverride", host_override.to_string()),
                ("contextId", context_id.to_string()),
            ],
        )
        .await
    }

    async fn openapi_import_file(&self, file: &str, target: &str, context_id: &str) -> Result<Value, EngineError> {
        self.action(
            "openapi",
            "importFile",
            &[
                ("file", file.to_string()),
                ("target", target.to_string()),
                ("contextId", context_id.to_string()),
            ],
        )
        .await
    }

    async fn soap_import_url(&self, url: &str) -> Result<Value, EngineError> {
        self.action("soap", "importUrl", &[("url", url.to_string())]).await
    }

    async fn soap_import_file(&self, file: &str) -> Result<Value, EngineError> {
        self.action("soap", "importFile", &[("file", file.to_string())]).await
    }

    async fn graphql_import_url(&self, url: &str, end_url: &str) -> Result<Value, EngineError> {
        self.action(
            "graphql",
            "importUrl",
            &[("url", url.to_string()), ("endurl", end_url.to_string())],
        )
        .await
    }

    async fn graphql_import_file(&self, file: &str, end_url: &str) -> Result<Value, EngineError> {
        self.action(
            "graphql",
            "importFile",
            &[("file", file.to_string()), ("endurl", end_url.to_string())],
        )
        .await
    }

    async fn graphql_set_option(&self, option: &str, value: &OptionValue) -> Result<Value, EngineError> {
        self.action("graphql", option, &[(value.param_name(), value.as_param())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_field_accepts_strings_and_numbers() {
        let v = json!({"contextId": "3", "userId": 4, "flag": true});
        assert_eq!(string_field(&v, "contextId").as_deref(), Some("3"));
        assert_eq!(string_field(&v, "userId").as_deref(), Some("4"));
        assert_eq!(string_field(&v, "flag"), None);
        assert_eq!(string_field(&v, "missing"), None);
    }

    #[test]
    fn required_field_reports_missing_key() {
        let err = required_field(&json!({"Result": "OK"}), "scan").unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn new_trims_trailing_slash() {
        let client = EmissaryClient::new("http://zap:8080/", "key", 5).unwrap();
        assert_eq!(client.api_url, "http://zap:8080");
    }
}
