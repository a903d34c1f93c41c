//! Scan operation status values reported by the Emissary.

use std::fmt;

use serde::Serialize;

/// The two long-running remote operations the poller tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanKind {
    /// Spider-as-user crawl of one context target.
    Spider,
    /// Active scan (attack) of one route or the base URL.
    ActiveScan,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spider => write!(f, "spider"),
            Self::ActiveScan => write!(f, "active scan"),
        }
    }
}

/// Progress of a scan operation: a percentage, or undefined when the status
/// query did not resolve to a usable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Progress(u8),
    Undefined,
}

/// The unique success terminal value.
pub const SCAN_COMPLETE: u8 = 100;

impl ScanStatus {
    /// Interpret the raw `status` string of a status view.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).and_then(|s| s.parse::<u8>().ok()) {
            Some(value) if value <= SCAN_COMPLETE => Self::Progress(value),
            _ => Self::Undefined,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Progress(SCAN_COMPLETE))
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(value) => write!(f, "{value}%"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}
