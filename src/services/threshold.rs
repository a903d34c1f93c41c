//! Alert threshold evaluation performed after scanning.

use std::fmt;

use crate::models::session::SutProperties;

/// What the alert count covers, for the failure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertScope {
    Routes(Vec<String>),
    BaseUrl(String),
}

impl fmt::Display for AlertScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Routes(routes) => write!(f, "the routes: {}", routes.join(", ")),
            Self::BaseUrl(base_url) => write!(f, "the base URL: {base_url}"),
        }
    }
}

impl AlertScope {
    /// The session's route ids, or the base URL when it names none.
    pub fn for_session(sut: &SutProperties) -> Self {
        let routes = sut.test_session.route_ids();
        if routes.is_empty() {
            Self::BaseUrl(sut.base_url())
        } else {
            Self::Routes(routes.into_iter().map(str::to_string).collect())
        }
    }
}

/// Pass or fail of a Test Session against its alert threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass {
        number_of_alerts: u64,
        alert_threshold: u64,
    },
    Fail {
        number_of_alerts: u64,
        alert_threshold: u64,
        overflow: u64,
        scope: AlertScope,
    },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }

    pub fn number_of_alerts(&self) -> u64 {
        match self {
            Self::Pass {
                number_of_alerts, ..
            }
            | Self::Fail {
                number_of_alerts, ..
            } => *number_of_alerts,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass {
                number_of_alerts,
                alert_threshold,
            } => write!(
                f,
                "{number_of_alerts} alerts is within the alert threshold of {alert_threshold}"
            ),
            Self::Fail {
                number_of_alerts,
                alert_threshold,
                overflow,
                scope,
            } => write!(
                f,
                "{number_of_alerts} alerts exceeds the alert threshold of {alert_threshold} \
                 by {overflow} for {scope}"
            ),
        }
    }
}

/// Pass iff `number_of_alerts <= alert_threshold`.
pub fn evaluate(number_of_alerts: u64, alert_threshold: u64, scope: AlertScope) -> Verdict {
    if number_of_alerts <= alert_threshold {
        Verdict::Pass {
            number_of_alerts,
            alert_threshold,
        }
    } else {
        Verdict::Fail {
            number_of_alerts,
            alert_threshold,
            overflow: number_of_alerts - alert_threshold,
            scope,
        }
    }
}
