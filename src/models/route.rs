//! Route descriptors for attackable SUT endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// One attackable endpoint of the SUT, keyed by its path.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouteDescriptor {
    #[validate(length(min = 1))]
    pub id: String,
    pub attributes: RouteAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAttributes {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub attack_fields: Vec<AttackField>,
    /// Locator of the element that submits the route's form.
    #[serde(default)]
    pub submit: String,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Request parameter used both for form automation and active-scan bodies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackField {
    pub name: String,
    pub value: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl RouteDescriptor {
    /// Active-scan request body: `name=value` pairs joined with `&`.
    ///
    /// Values are passed through as configured; the Emissary encodes them.
    pub fn post_data(&self) -> String {
        self.attributes
            .attack_fields
            .iter()
            .map(|field| format!("{}={}", field.name, field.value))
            .collect::<Vec<_>>()
            .join("&")
    }
}
