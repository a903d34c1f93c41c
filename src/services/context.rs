//! Session-scoped state threaded through every phase.
//!
//! Identifiers and property subsets are fixed at construction. The two
//! correlation ids are write-once: the site-tree population phase sets the
//! context id and the Emissary authentication phase sets the user id. A second
//! write is rejected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::EmissaryProperties;
use crate::emissary::Emissary;
use crate::errors::AppError;
use crate::models::session::SutProperties;

/// State of one orchestration run. Never shared between Test Sessions.
pub struct SessionContext {
    base_url: String,
    sut: SutProperties,
    emissary_properties: EmissaryProperties,
    engine: Arc<dyn Emissary>,
    context_id: OnceLock<String>,
    user_id: OnceLock<String>,
    number_of_alerts: AtomicU64,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("base_url", &self.base_url)
            .field("test_session_id", &self.sut.test_session.id)
            .field("context_id", &self.context_id.get())
            .field("user_id", &self.user_id.get())
            .field("number_of_alerts", &self.number_of_alerts())
            .finish()
    }
}

impl SessionContext {
    pub fn new(
        sut: SutProperties,
        emissary_properties: EmissaryProperties,
        engine: Arc<dyn Emissary>,
    ) -> Self {
        Self {
            base_url: sut.base_url(),
            sut,
            emissary_properties,
            engine,
            context_id: OnceLock::new(),
            user_id: OnceLock::new(),
            number_of_alerts: AtomicU64::new(0),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sut(&self) -> &SutProperties {
        &self.sut
    }

    pub fn test_session_id(&self) -> &str {
        &self.sut.test_session.id
    }

    pub fn emissary_properties(&self) -> &EmissaryProperties {
        &self.emissary_properties
    }

    pub fn engine(&self) -> &dyn Emissary {
        self.engine.as_ref()
    }

    /// Owned engine handle for work that outlives a borrow (poller tasks).
    pub fn engine_handle(&self) -> Arc<dyn Emissary> {
        Arc::clone(&self.engine)
    }

    pub fn set_context_id(&self, context_id: String) -> Result<(), AppError> {
        self.context_id.set(context_id).map_err(|rejected| {
            AppError::InvalidState(format!(
                "contextId is already set to \"{}\", refusing \"{rejected}\"",
                self.context_id.get().map(String::as_str).unwrap_or_default()
            ))
        })
    }

    pub fn context_id(&self) -> Result<&str, AppError> {
        self.context_id.get().map(String::as_str).ok_or_else(|| {
            AppError::InvalidState(
                "contextId has not been set; the site-tree population phase must run first"
                    .to_string(),
            )
        })
    }

    pub fn set_user_id(&self, user_id: String) -> Result<(), AppError> {
        self.user_id.set(user_id).map_err(|rejected| {
            AppError::InvalidState(format!(
                "userId is already set to \"{}\", refusing \"{rejected}\"",
                self.user_id.get().map(String::as_str).unwrap_or_default()
            ))
        })
    }

    pub fn user_id(&self) -> Result<&str, AppError> {
        self.user_id.get().map(String::as_str).ok_or_else(|| {
            AppError::InvalidState(
                "userId has not been set; the Emissary authentication phase must run first"
                    .to_string(),
            )
        })
    }

    /// Add a route's terminal alert count to the session total.
    pub(crate) fn add_alerts(&self, alerts: u64) -> u64 {
        self.number_of_alerts.fetch_add(alerts, Ordering::SeqCst) + alerts
    }

    pub fn number_of_alerts(&self) -> u64 {
        self.number_of_alerts.load(Ordering::SeqCst)
    }
}
