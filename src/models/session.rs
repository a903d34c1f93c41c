//! Test Session and SUT property structures supplied by the configuration loader.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::AppError;
use crate::models::route::RouteDescriptor;

/// Resource identifier type marking a route relationship.
pub const ROUTE_RESOURCE_TYPE: &str = "route";

/// Everything the pipeline knows about the system under test for one session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SutProperties {
    #[validate(length(min = 1))]
    pub protocol: String,
    #[validate(length(min = 1))]
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub authentication: Option<SutAuthentication>,
    #[serde(default)]
    pub logged_in_indicator: Option<String>,
    #[serde(default)]
    pub logged_out_indicator: Option<String>,
    #[validate(nested)]
    pub context: ContextProperties,
    #[validate(nested)]
    pub test_session: TestSession,
    #[serde(default)]
    #[validate(nested)]
    pub test_routes: Vec<RouteDescriptor>,
}

/// Login shape of the SUT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SutAuthentication {
    /// Login route, appended to the base URL.
    pub route: String,
    #[serde(default)]
    pub username_field_locater: String,
    #[serde(default)]
    pub password_field_locater: String,
    #[serde(default)]
    pub submit: String,
    #[serde(default)]
    pub expected_page_source_success: String,
}

/// Name of the Emissary context created for the session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContextProperties {
    #[validate(length(min = 1))]
    pub name: String,
}

/// JSON:API style Test Session resource.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TestSession {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(nested)]
    pub attributes: TestSessionAttributes,
    #[serde(default)]
    pub relationships: Relationships,
}

impl TestSession {
    /// Route ids referenced by the session, in declaration order.
    pub fn route_ids(&self) -> Vec<&str> {
        self.relationships
            .data
            .iter()
            .filter(|ri| ri.resource_type == ROUTE_RESOURCE_TYPE)
            .map(|ri| ri.id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub data: Vec<ResourceIdentifier>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

/// Build-user supplied attributes of a Test Session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestSessionAttributes {
    #[serde(default)]
    #[validate(length(max = 100))]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub excluded_routes: Vec<String>,
    #[serde(default)]
    pub alert_threshold: u64,
    #[serde(default = "default_attack_strength")]
    pub a_scanner_attack_strength: String,
    #[serde(default = "default_scanner_alert_threshold")]
    pub a_scanner_alert_threshold: String,
    #[serde(default)]
    pub reports: Option<ReportSelection>,
    #[serde(default)]
    pub import_urls: Option<DefinitionImport>,
    #[serde(default)]
    pub open_api: Option<DefinitionImport>,
    #[serde(default)]
    pub soap: Option<DefinitionImport>,
    #[serde(default)]
    pub graph_ql: Option<GraphQlImport>,
    #[serde(flatten)]
    pub strategies: StrategyNames,
}

fn default_attack_strength() -> String {
    "HIGH".to_string()
}

fn default_scanner_alert_threshold() -> String {
    "LOW".to_string()
}

/// Strategy variant names, one per phase, chosen before the pipeline starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyNames {
    #[serde(default = "StrategyNames::default_sut_authentication")]
    pub sites_tree_sut_authentication_population_strategy: String,
    #[serde(default = "StrategyNames::default_sites_tree_population")]
    pub sites_tree_population_strategy: String,
    #[serde(default = "StrategyNames::default_emissary_authentication")]
    pub emissary_authentication_strategy: String,
    #[serde(default = "StrategyNames::default_spider")]
    pub spider_strategy: String,
    #[serde(default = "StrategyNames::default_browser_app")]
    pub scanners_strategy: String,
    #[serde(default = "StrategyNames::default_browser_app")]
    pub scanning_strategy: String,
    #[serde(default = "StrategyNames::default_browser_app")]
    pub post_scanning_strategy: String,
    #[serde(default = "StrategyNames::default_reporting")]
    pub reporting_strategy: String,
}

impl StrategyNames {
    fn default_sut_authentication() -> String {
        "FormStandard".to_string()
    }

    fn default_sites_tree_population() -> String {
        "WebDriverStandard".to_string()
    }

    fn default_emissary_authentication() -> String {
        "FormStandard".to_string()
    }

    fn default_spider() -> String {
        "ScanDriven".to_string()
    }

    fn default_browser_app() -> String {
        "BrowserAppStandard".to_string()
    }

    fn default_reporting() -> String {
        "Standard".to_string()
    }
}

impl Default for StrategyNames {
    fn default() -> Self {
        Self {
            sites_tree_sut_authentication_population_strategy: Self::default_sut_authentication(),
            sites_tree_population_strategy: Self::default_sites_tree_population(),
            emissary_authentication_strategy: Self::default_emissary_authentication(),
            spider_strategy: Self::default_spider(),
            scanners_strategy: Self::default_browser_app(),
            scanning_strategy: Self::default_browser_app(),
            post_scanning_strategy: Self::default_browser_app(),
            reporting_strategy: Self::default_reporting(),
        }
    }
}

/// Subset of report templates chosen by the build user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSelection {
    #[serde(default)]
    pub template_themes: Vec<TemplateTheme>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateTheme {
    pub name: String,
}

/// Definition source for the import based site-tree population strategies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionImport {
    #[serde(default)]
    pub import_file_content_base64: Option<String>,
    #[serde(default)]
    pub import_url: Option<String>,
}

/// GraphQL definition source plus any Emissary GraphQL options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlImport {
    #[serde(default)]
    pub import_file_content_base64: Option<String>,
    #[serde(default)]
    pub import_url: Option<String>,
    /// Remaining keys are option setter names, e.g. `setOptionMaxQueryDepth`.
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl SutProperties {
    /// `protocol://ip:port` of the SUT.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.ip, self.port)
    }

    /// Route descriptors referenced by the session, in descriptor order.
    ///
    /// Identifiers without a matching descriptor are ignored.
    pub fn session_routes(&self) -> Vec<&RouteDescriptor> {
        let ids = self.test_session.route_ids();
        self.test_routes
            .iter()
            .filter(|route| ids.contains(&route.id.as_str()))
            .collect()
    }

    /// Run derive validation plus the checks `validator` cannot express.
    pub fn validate_for_session(&self) -> Result<(), AppError> {
        self.validate()?;

        for pattern in &self.test_session.attributes.excluded_routes {
            Regex::new(pattern).map_err(|e| {
                AppError::Validation(format!(
                    "excludedRoutes entry \"{pattern}\" is not a valid regular expression: {e}"
                ))
            })?;
        }

        for route_id in self.test_session.route_ids() {
            if !route_id.starts_with('/') {
                return Err(AppError::Validation(format!(
                    "route id \"{route_id}\" must start with '/'"
                )));
            }
        }

        Ok(())
    }
}
