//! Engine handle for the Emissary scanning engine.
//!
//! The `Emissary` trait is the narrow, capability-shaped surface the phases
//! drive. `client::EmissaryClient` implements it over the engine's HTTP JSON
//! API; tests substitute scripted fakes.

pub mod client;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::EngineError;
use crate::models::report::ReportDescriptor;
use crate::models::scan::ScanStatus;

pub use client::EmissaryClient;

/// Arguments for a spider-as-user crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiderAsUserRequest {
    pub context_id: String,
    pub user_id: String,
    pub url: String,
    pub max_children: u32,
    pub recurse: bool,
    pub subtree_only: bool,
}

/// Arguments for an active scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveScanRequest {
    pub url: String,
    pub recurse: bool,
    /// Ignored by the engine when a context id is given.
    pub in_scope_only: bool,
    pub scan_policy_name: String,
    pub method: String,
    pub post_data: String,
    pub context_id: String,
}

/// One active scan rule as listed by the engine.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveScanner {
    pub id: String,
    pub name: String,
    pub enabled: String,
    #[serde(default)]
    pub attack_strength: String,
    #[serde(default)]
    pub alert_threshold: String,
}

impl ActiveScanner {
    pub fn is_enabled(&self) -> bool {
        self.enabled == "true"
    }
}

/// Typed value of a GraphQL option call.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl OptionValue {
    /// Pick the parameter type the engine expects from the value's shape.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.is_i64() => Self::Integer(n.as_i64().unwrap_or_default()),
            Value::Bool(b) => Self::Boolean(*b),
            Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }

    /// Query parameter name of the value.
    pub fn param_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "Integer",
            Self::Boolean(_) => "Boolean",
            Self::String(_) => "String",
        }
    }

    pub fn as_param(&self) -> String {
        match self {
            Self::Integer(i) => i.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

/// Remote calls against the Emissary, grouped by capability area.
///
/// Action calls return the engine's raw response for logging.
#[async_trait]
pub trait Emissary: Send + Sync {
    // -- context --

    /// Create a context and return its id.
    async fn new_context(&self, context_name: &str) -> Result<String, EngineError>;
    async fn include_in_context(&self, context_name: &str, regex: &str)
        -> Result<Value, EngineError>;
    async fn exclude_from_context(
        &self,
        context_name: &str,
        regex: &str,
    ) -> Result<Value, EngineError>;

    // -- authentication --

    async fn set_authentication_method(
        &self,
        context_id: &str,
        auth_method_name: &str,
        auth_method_config_params: &str,
    ) -> Result<Value, EngineError>;
    async fn set_logged_in_indicator(
        &self,
        context_id: &str,
        logged_in_indicator_regex: &str,
    ) -> Result<Value, EngineError>;
    async fn set_logged_out_indicator(
        &self,
        context_id: &str,
        logged_out_indicator_regex: &str,
    ) -> Result<Value, EngineError>;

    // -- users --

    /// Create a user in the context and return its id.
    async fn new_user(&self, context_id: &str, name: &str) -> Result<String, EngineError>;
    async fn set_authentication_credentials(
        &self,
        context_id: &str,
        user_id: &str,
        auth_credentials_config_params: &str,
    ) -> Result<Value, EngineError>;
    async fn set_user_enabled(
        &self,
        context_id: &str,
        user_id: &str,
        enabled: bool,
    ) -> Result<Value, EngineError>;

    // -- forced user --

    async fn set_forced_user(&self, context_id: &str, user_id: &str)
        -> Result<Value, EngineError>;
    async fn set_forced_user_mode_enabled(&self, enabled: bool) -> Result<Value, EngineError>;

    // -- spider --

    async fn set_spider_max_depth(&self, max_depth: u32) -> Result<Value, EngineError>;
    async fn set_spider_thread_count(&self, thread_count: u32) -> Result<Value, EngineError>;
    /// Start a crawl as a user and return the scan id.
    async fn spider_scan_as_user(&self, request: &SpiderAsUserRequest)
        -> Result<String, EngineError>;
    async fn spider_status(&self, scan_id: &str) -> Result<ScanStatus, EngineError>;

    // -- active scan --

    /// Start an active scan and return the scan id.
    async fn ascan_scan(&self, request: &ActiveScanRequest) -> Result<String, EngineError>;
    async fn ascan_status(&self, scan_id: &str) -> Result<ScanStatus, EngineError>;
    async fn ascan_disable_all_scanners(&self, scan_policy_name: &str)
        -> Result<Value, EngineError>;
    async fn ascan_enable_all_scanners(&self, scan_policy_name: &str)
        -> Result<Value, EngineError>;
    async fn ascan_disable_scanners(
        &self,
        ids: &str,
        scan_policy_name: &str,
    ) -> Result<Value, EngineError>;
    async fn ascan_view_scanners(
        &self,
        scan_policy_name: &str,
        policy_id: &str,
    ) -> Result<Vec<ActiveScanner>, EngineError>;
    async fn ascan_set_scanner_attack_strength(
        &self,
        id: &str,
        attack_strength: &str,
        scan_policy_name: &str,
    ) -> Result<Value, EngineError>;
    async fn ascan_set_scanner_alert_threshold(
        &self,
        id: &str,
        alert_threshold: &str,
        scan_policy_name: &str,
    ) -> Result<Value, EngineError>;

    // -- passive scan --

    async fn pscan_disable_scanners(&self, ids: &str) -> Result<Value, EngineError>;

    // -- core alerts --

    async fn number_of_alerts(&self, base_url: &str) -> Result<u64, EngineError>;

    // -- reports --

    async fn generate_report(&self, report: &ReportDescriptor) -> Result<Value, EngineError>;

    // -- definition imports --

    async fn import_urls_file(&self, file_path: &str) -> Result<Value, EngineError>;
    async fn openapi_import_url(
        &self,
        url: &str,
        host_override: &str,
        context_id: &str,
    ) -> Result<Value, EngineError>;
    async fn openapi_import_file(
        &self,
        file: &str,
        target: &str,
        context_id: &str,
    ) -> Result<Value, EngineError>;
    async fn soap_import_url(&self, url: &str) -> Result<Value, EngineError>;
    async fn soap_import_file(&self, file: &str) -> Result<Value, EngineError>;
    async fn graphql_import_url(&self, url: &str, end_url: &str) -> Result<Value, EngineError>;
    async fn graphql_import_file(&self, file: &str, end_url: &str)
        -> Result<Value, EngineError>;
    async fn graphql_set_option(
        &self,
        option: &str,
        value: &OptionValue,
    ) -> Result<Value, EngineError>;
}
