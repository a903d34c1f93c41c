//! Scripted collaborators and fixtures for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::browser::Browser;
use crate::emissary::{
    ActiveScanRequest, ActiveScanner, Emissary, OptionValue, SpiderAsUserRequest,
};
use crate::errors::{AppError, EngineError};
use crate::models::report::ReportDescriptor;
use crate::models::route::{AttackField, RouteAttributes, RouteDescriptor};
use crate::models::scan::ScanStatus;
use crate::models::session::{
    ContextProperties, Relationships, ResourceIdentifier, StrategyNames, SutAuthentication,
    SutProperties, TestSession, TestSessionAttributes, ROUTE_RESOURCE_TYPE,
};

fn field(name: &str, value: &str) -> AttackField {
    AttackField {
        name: name.to_string(),
        value: value.to_string(),
        visible: true,
    }
}

fn route_descriptor(id: &str) -> RouteDescriptor {
    let (method, submit, attack_fields) = match id {
        "/profile" => (
            "POST",
            "submit",
            vec![field("firstName", "PurpleJohn"), field("lastName", "Smith")],
        ),
        "/memos" => ("POST", "btn btn-primary", vec![field("memo", "hello")]),
        "/contributions" => (
            "POST",
            "btn btn-primary",
            vec![field("preTax", "1"), field("afterTax", "2")],
        ),
        _ => ("GET", "submit", Vec::new()),
    };
    RouteDescriptor {
        id: id.to_string(),
        attributes: RouteAttributes {
            method: method.to_string(),
            attack_fields,
            submit: submit.to_string(),
        },
    }
}

/// NodeGoat-shaped SUT with one descriptor per given route id.
pub fn sut_properties(route_ids: &[&str]) -> SutProperties {
    SutProperties {
        protocol: "http".to_string(),
        ip: "pt-sut-cont".to_string(),
        port: 4000,
        browser: Some("firefox".to_string()),
        authentication: Some(SutAuthentication {
            route: "/login".to_string(),
            username_field_locater: "userName".to_string(),
            password_field_locater: "password".to_string(),
            submit: "btn btn-danger".to_string(),
            expected_page_source_success: "Log Out".to_string(),
        }),
        logged_in_indicator: Some("Log Out".to_string()),
        logged_out_indicator: None,
        context: ContextProperties {
            name: "NodeGoat_Context".to_string(),
        },
        test_session: TestSession {
            id: "lowPrivUser".to_string(),
            attributes: TestSessionAttributes {
                username: "user1".to_string(),
                password: Some("User1_123".to_string()),
                excluded_routes: vec!["http://pt-sut-cont:4000/logout".to_string()],
                alert_threshold: 5,
                a_scanner_attack_strength: "HIGH".to_string(),
                a_scanner_alert_threshold: "LOW".to_string(),
                reports: None,
                import_urls: None,
                open_api: None,
                soap: None,
                graph_ql: None,
                strategies: StrategyNames::default(),
            },
            relationships: Relationships {
                data: route_ids
                    .iter()
                    .map(|id| ResourceIdentifier {
                        resource_type: ROUTE_RESOURCE_TYPE.to_string(),
                        id: id.to_string(),
                    })
                    .collect(),
            },
        },
        test_routes: route_ids.iter().map(|id| route_descriptor(id)).collect(),
    }
}

// ---------------------------------------------------------------------------
// Emissary
// ---------------------------------------------------------------------------

/// In-memory Emissary that records every call.
///
/// Scans report 50% on the first status query and 100% on the second. The
/// n-th active scan raises `route_alerts[n]` alerts (zero when unset) against
/// its own URL; alert counts cover every scanned URL under the queried one.
pub struct FakeEmissary {
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
    spider_requests: Mutex<Vec<SpiderAsUserRequest>>,
    ascan_requests: Mutex<Vec<ActiveScanRequest>>,
    status_queries: Mutex<HashMap<String, u32>>,
    route_alerts: Vec<u64>,
    scanners: Vec<ActiveScanner>,
}

impl Default for FakeEmissary {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEmissary {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            spider_requests: Mutex::new(Vec::new()),
            ascan_requests: Mutex::new(Vec::new()),
            status_queries: Mutex::new(HashMap::new()),
            route_alerts: Vec::new(),
            scanners: vec![
                scanner("40012", "Cross Site Scripting (Reflected)", true),
                scanner("40018", "SQL Injection", true),
                scanner("40026", "Cross Site Scripting (DOM Based)", false),
            ],
        }
    }

    pub fn with_route_alerts(mut self, alerts: Vec<u64>) -> Self {
        self.route_alerts = alerts;
        self
    }

    /// Make every call to `op` (e.g. `context/action/newContext`) fail.
    pub fn failing(mut self, op: &str) -> Self {
        self.failing.insert(op.to_string());
        self
    }

    /// Recorded calls as `area/kind/name arg=value ...`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls whose op matches `op`.
    pub fn calls_to(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c == op || c.starts_with(&format!("{op} ")))
            .collect()
    }

    pub fn spider_requests(&self) -> Vec<SpiderAsUserRequest> {
        self.spider_requests.lock().unwrap().clone()
    }

    pub fn ascan_requests(&self) -> Vec<ActiveScanRequest> {
        self.ascan_requests.lock().unwrap().clone()
    }

    fn record(&self, op: &str, args: &[(&str, &str)]) -> Result<Value, EngineError> {
        let mut entry = op.to_string();
        for (key, value) in args {
            entry.push_str(&format!(" {key}={value}"));
        }
        self.calls.lock().unwrap().push(entry);

        if self.failing.contains(op) {
            return Err(EngineError::Api {
                status: 400,
                code: "bad_action".to_string(),
                message: format!("{op} rejected"),
            });
        }
        Ok(json!({ "Result": "OK" }))
    }

    fn next_status(&self, scan_id: &str) -> ScanStatus {
        let mut queries = self.status_queries.lock().unwrap();
        let count = queries.entry(scan_id.to_string()).or_insert(0);
        *count += 1;
        if *count >= 2 {
            ScanStatus::Progress(100)
        } else {
            ScanStatus::Progress(50)
        }
    }
}

fn scanner(id: &str, name: &str, enabled: bool) -> ActiveScanner {
    ActiveScanner {
        id: id.to_string(),
        name: name.to_string(),
        enabled: enabled.to_string(),
        attack_strength: "DEFAULT".to_string(),
        alert_threshold: "DEFAULT".to_string(),
    }
}

#[async_trait]
impl Emissary for FakeEmissary {
    async fn new_context(&self, context_name: &str) -> Result<String, EngineError> {
        self.record("context/action/newContext", &[("contextName", context_name)])?;
        Ok("1".to_string())
    }

    async fn include_in_context(&self, context_name: &str, regex: &str) -> Result<Value, EngineError> {
        self.record(
            "context/action/includeInContext",
            &[("contextName", context_name), ("regex", regex)],
        )
    }

    async fn exclude_from_context(&self, context_name: &str, regex: &str) -> Result<Value, EngineError> {
        self.record(
            "context/action/excludeFromContext",
            &[("contextName", context_name), ("regex", regex)],
        )
    }

    async fn set_authentication_method(
        &self,
        context_id: &str,
        auth_method_name: &str,
        auth_method_config_params: &str,
    ) -> Result<Value, EngineError> {
        self.record(
            "authentication/action/setAuthenticationMethod",
            &[
                ("contextId", context_id),
                ("authMethodName", auth_method_name),
                ("authMethodConfigParams", auth_method_config_params),
            ],
        )
    }

    async fn set_logged_in_indicator(&self, context_id: &str, regex: &str) -> Result<Value, EngineError> {
        self.record(
            "authentication/action/setLoggedInIndicator",
            &[("contextId", context_id), ("loggedInIndicatorRegex", regex)],
        )
    }

    async fn set_logged_out_indicator(&self, context_id: &str, regex: &str) -> Result<Value, EngineError> {
        self.record(
            "authentication/action/setLoggedOutIndicator",
            &[("contextId", context_id), ("loggedOutIndicatorRegex", regex)],
        )
    }

    async fn new_user(&self, context_id: &str, name: &str) -> Result<String, EngineError> {
        self.record("users/action/newUser", &[("contextId", context_id), ("name", name)])?;
        Ok("2".to_string())
    }

    async fn set_authentication_credentials(
        &self,
        context_id: &str,
        user_id: &str,
        params: &str,
    ) -> Result<Value, EngineError> {
        self.record(
            "users/action/setAuthenticationCredentials",
            &[
                ("contextId", context_id),
                ("userId", user_id),
                ("authCredentialsConfigParams", params),
            ],
        )
    }

    async fn set_user_enabled(&self, context_id: &str, user_id: &str, enabled: bool) -> Result<Value, EngineError> {
        self.record(
            "users/action/setUserEnabled",
            &[
                ("contextId", context_id),
                ("userId", user_id),
                ("enabled", &enabled.to_string()),
            ],
        )
    }

    async fn set_forced_user(&self, context_id: &str, user_id: &str) -> Result<Value, EngineError> {
        self.record(
            "forcedUser/action/setForcedUser",
            &[("contextId", context_id), ("userId", user_id)],
        )
    }

    async fn set_forced_user_mode_enabled(&self, enabled: bool) -> Result<Value, EngineError> {
        self.record(
            "forcedUser/action/setForcedUserModeEnabled",
            &[("boolean", &enabled.to_string())],
        )
    }

    async fn set_spider_max_depth(&self, max_depth: u32) -> Result<Value, EngineError> {
        self.record(
            "spider/action/setOptionMaxDepth",
            &[("Integer", &max_depth.to_string())],
        )
    }

    async fn set_spider_thread_count(&self, thread_count: u32) -> Result<Value, EngineError> {
        self.record(
            "spider/action/setOptionThreadCount",
            &[("Integer", &thread_count.to_string())],
        )
    }

    async fn spider_scan_as_user(&self, request: &SpiderAsUserRequest) -> Result<String, EngineError> {
        self.spider_requests.lock().unwrap().push(request.clone());
        self.record("spider/action/scanAsUser", &[("url", &request.url)])?;
        Ok(format!("spider-{}", self.spider_requests.lock().unwrap().len()))
    }

    async fn spider_status(&self, scan_id: &str) -> Result<ScanStatus, EngineError> {
        Ok(self.next_status(scan_id))
    }

    async fn ascan_scan(&self, request: &ActiveScanRequest) -> Result<String, EngineError> {
        self.ascan_requests.lock().unwrap().push(request.clone());
        self.record("ascan/action/scan", &[("url", &request.url)])?;
        Ok(format!("ascan-{}", self.ascan_requests.lock().unwrap().len()))
    }

    async fn ascan_status(&self, scan_id: &str) -> Result<ScanStatus, EngineError> {
        Ok(self.next_status(scan_id))
    }

    async fn ascan_disable_all_scanners(&self, policy: &str) -> Result<Value, EngineError> {
        self.record("ascan/action/disableAllScanners", &[("scanPolicyName", policy)])
    }

    async fn ascan_enable_all_scanners(&self, policy: &str) -> Result<Value, EngineError> {
        self.record("ascan/action/enableAllScanners", &[("scanPolicyName", policy)])
    }

    async fn ascan_disable_scanners(&self, ids: &str, policy: &str) -> Result<Value, EngineError> {
        self.record(
            "ascan/action/disableScanners",
            &[("ids", ids), ("scanPolicyName", policy)],
        )
    }

    async fn ascan_view_scanners(&self, policy: &str, policy_id: &str) -> Result<Vec<ActiveScanner>, EngineError> {
        self.record(
            "ascan/view/scanners",
            &[("scanPolicyName", policy), ("policyId", policy_id)],
        )?;
        Ok(self.scanners.clone())
    }

    async fn ascan_set_scanner_attack_strength(
        &self,
        id: &str,
        attack_strength: &str,
        policy: &str,
    ) -> Result<Value, EngineError> {
        self.record(
            "ascan/action/setScannerAttackStrength",
            &[("id", id), ("attackStrength", attack_strength), ("scanPolicyName", policy)],
        )
    }

    async fn ascan_set_scanner_alert_threshold(
        &self,
        id: &str,
        alert_threshold: &str,
        policy: &str,
    ) -> Result<Value, EngineError> {
        self.record(
            "ascan/action/setScannerAlertThreshold",
            &[("id", id), ("alertThreshold", alert_threshold), ("scanPolicyName", policy)],
        )
    }

    async fn pscan_disable_scanners(&self, ids: &str) -> Result<Value, EngineError> {
        self.record("pscan/action/disableScanners", &[("ids", ids)])
    }

    async fn number_of_alerts(&self, base_url: &str) -> Result<u64, EngineError> {
        self.record("core/view/numberOfAlerts", &[("baseurl", base_url)])?;
        let scans = self.ascan_requests.lock().unwrap();
        Ok(scans
            .iter()
            .zip(self.route_alerts.iter())
            .filter(|(scan, _)| scan.url.starts_with(base_url))
            .map(|(_, alerts)| alerts)
            .sum())
    }

    async fn generate_report(&self, report: &ReportDescriptor) -> Result<Value, EngineError> {
        self.record(
            "reports/action/generate",
            &[
                ("template", &report.template),
                ("reportFileName", &report.report_file_name),
            ],
        )
    }

    async fn import_urls_file(&self, file_path: &str) -> Result<Value, EngineError> {
        self.record("importurls/action/importurls", &[("filePath", file_path)])
    }

    async fn openapi_import_url(&self, url: &str, host_override: &str, context_id: &str) -> Result<Value, EngineError> {
        self.record(
            "openapi/action/importUrl",
            &[("url", url), ("hostOverride", host_override), ("contextId", context_id)],
        )
    }

    async fn openapi_import_file(&self, file: &str, target: &str, context_id: &str) -> Result<Value, EngineError> {
        self.record(
            "openapi/action/importFile",
            &[("file", file), ("target", target), ("contextId", context_id)],
        )
    }

    async fn soap_import_url(&self, url: &str) -> Result<Value, EngineError> {
        self.record("soap/action/importUrl", &[("url", url)])
    }

    async fn soap_import_file(&self, file: &str) -> Result<Value, EngineError> {
        self.record("soap/action/importFile", &[("file", file)])
    }

    async fn graphql_import_url(&self, url: &str, end_url: &str) -> Result<Value, EngineError> {
        self.record("graphql/action/importUrl", &[("url", url), ("endurl", end_url)])
    }

    async fn graphql_import_file(&self, file: &str, end_url: &str) -> Result<Value, EngineError> {
        self.record("graphql/action/importFile", &[("file", file), ("endurl", end_url)])
    }

    async fn graphql_set_option(&self, option: &str, value: &OptionValue) -> Result<Value, EngineError> {
        self.record(
            &format!("graphql/action/{option}"),
            &[(value.param_name(), &value.as_param())],
        )
    }
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// Browser that records every step instead of driving a real page.
#[derive(Default)]
pub struct FakeBrowser {
    steps: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first step whose description contains `fragment`.
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            fail_on: Some(fragment.to_string()),
        }
    }

    pub fn steps(&self) -> Vec<String> {
        self.steps.lock().unwrap().clone()
    }

    fn step(&self, description: String) -> Result<(), AppError> {
        let fails = self
            .fail_on
            .as_deref()
            .is_some_and(|fragment| description.contains(fragment));
        self.steps.lock().unwrap().push(description.clone());
        if fails {
            return Err(AppError::Browser(format!("{description} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        self.step(format!("navigate {url}"))
    }

    async fn sleep(&self, duration: Duration) {
        self.steps
            .lock()
            .unwrap()
            .push(format!("sleep {}ms", duration.as_millis()));
    }

    async fn find_element_then_click(
        &self,
        locator: &str,
        expected_page_source: Option<&str>,
    ) -> Result<(), AppError> {
        match expected_page_source {
            Some(expected) => self.step(format!("click {locator} expecting {expected}")),
            None => self.step(format!("click {locator}")),
        }
    }

    async fn find_element_then_send_keys(
        &self,
        locator: &str,
        value: &str,
        _visible: bool,
    ) -> Result<(), AppError> {
        self.step(format!("keys {locator}={value}"))
    }

    async fn find_element_then_clear(&self, locator: &str, _visible: bool) -> Result<(), AppError> {
        self.step(format!("clear {locator}"))
    }

    async fn check_user_is_authenticated(&self, expected_page_source: &str) -> Result<(), AppError> {
        self.step(format!("authenticated {expected_page_source}"))
    }

    async fn check_and_notify_build_user_if_any_known_browser_errors(&self) -> Result<(), AppError> {
        self.step("browser errors".to_string())
    }
}
