//! Unified error handling for the orchestration pipeline.
//!
//! `AppError` is the single error type every phase returns. Remote call
//! failures are carried as `EngineError` and wrapped with the operator-facing
//! context of what was being attempted.

/// Failure of a single call against the Emissary API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be reached at all (connection refused, DNS, reset).
    #[error("Emissary unreachable: {0}")]
    Connect(String),

    #[error("Emissary request timed out: {0}")]
    Timeout(String),

    /// The engine answered with a non-success status.
    #[error("Emissary API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Undecodable Emissary response: {0}")]
    Decode(String),

    #[error("Emissary transport error: {0}")]
    Transport(String),
}

impl EngineError {
    /// Check if this error means the engine is presumed down.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Application error type shared by every phase.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Emissary API is unreachable: {0}")]
    UnreachableEngine(String),

    #[error("Transient query error: {0}")]
    TransientQuery(String),

    #[error("Housekeeping warning: {0}")]
    Housekeeping(String),

    #[error("{context}. Error was: {source}")]
    Engine {
        context: String,
        #[source]
        source: EngineError,
    },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap an engine failure with what was being attempted.
    pub fn engine(context: impl Into<String>, source: EngineError) -> Self {
        Self::Engine {
            context: context.into(),
            source,
        }
    }

    /// Check if this error must abort the session.
    ///
    /// Transient query errors and housekeeping warnings are logged where they
    /// occur and never propagate as session failures.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::TransientQuery(_) | Self::Housekeeping(_))
    }

    /// Check if this error represents a lost Emissary.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::UnreachableEngine(_) => true,
            Self::Engine { source, .. } => source.is_connectivity(),
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_connectivity() {
        assert!(EngineError::Connect("refused".to_string()).is_connectivity());
        assert!(!EngineError::Timeout("slow".to_string()).is_connectivity());
        assert!(!EngineError::Api {
            status: 400,
            code: "bad_view".to_string(),
            message: "No such view".to_string(),
        }
        .is_connectivity());
    }

    #[test]
    fn app_error_engine_display_carries_context() {
        let err = AppError::engine(
            "Error occurred while attempting to set the spider max depth",
            EngineError::Connect("connection refused".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Error occurred while attempting to set the spider max depth. Error was: Emissary unreachable: connection refused"
        );
        assert!(err.is_unreachable());
    }

    #[test]
    fn app_error_fatality() {
        assert!(AppError::Configuration("depth".to_string()).is_fatal());
        assert!(AppError::UnreachableEngine("down".to_string()).is_fatal());
        assert!(!AppError::TransientQuery("blip".to_string()).is_fatal());
        assert!(!AppError::Housekeeping("permissions".to_string()).is_fatal());
    }

    #[test]
    fn app_error_display() {
        let err = AppError::Validation("username is required".to_string());
        assert_eq!(err.to_string(), "Validation error: username is required");
    }

    #[test]
    fn app_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io_err.into();
        assert!(matches!(err, AppError::Io(_)));
    }
}
