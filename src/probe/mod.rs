//! Probe strategies for classifying a profile
//!
//! Each strategy looks at a single data source and either reaches a verdict
//! or reports that it could not tell.
//!
//! # Strategies
//!
//! - [`structured::StructuredDataProbe`] - JSON profile-info endpoints, tried in order
//!   with a distinct header profile per variant
//! - [`markup::MarkupProbe`] - the public profile page, scanned for a fixed set of
//!   markers and meta tags
//!
//! Strategies never fail: transport errors, unexpected status codes and odd
//! payloads all become [`Classification::Indeterminate`]. A strategy that saw
//! an explicit rate-limit or unavailable response additionally marks its
//! outcome as throttled, which tells the resolver to stop probing for this cycle.

pub mod headers;
pub mod markup;
pub mod structured;
pub mod transport;

use async_trait::async_trait;
use std::fmt;

pub use headers::HeaderProfile;
pub use markup::MarkupProbe;
pub use structured::StructuredDataProbe;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

/// A probe's local verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Active,
    Deactivated,
    Indeterminate,
}

impl Classification {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deactivated => "deactivated",
            Self::Indeterminate => "indeterminate",
        }
    }

    /// Whether this verdict ends resolution
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Indeterminate)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict plus the reason it was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub classification: Classification,
    pub rationale: String,
    /// Upstream answered rate-limited/unavailable; no further probing this cycle
    pub throttled: bool,
}

impl ProbeOutcome {
    pub fn active(rationale: impl Into<String>) -> Self {
        Self::with(Classification::Active, rationale, false)
    }

    pub fn deactivated(rationale: impl Into<String>) -> Self {
        Self::with(Classification::Deactivated, rationale, false)
    }

    pub fn indeterminate(rationale: impl Into<String>) -> Self {
        Self::with(Classification::Indeterminate, rationale, false)
    }

    pub fn throttled(rationale: impl Into<String>) -> Self {
        Self::with(Classification::Indeterminate, rationale, true)
    }

    fn with(classification: Classification, rationale: impl Into<String>, throttled: bool) -> Self {
        Self {
            classification,
            rationale: rationale.into(),
            throttled,
        }
    }
}

/// A single way of classifying a handle
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Classify a normalised handle
    async fn probe(&self, handle: &str) -> ProbeOutcome;
}

/// Normalise a handle for probing: trim, drop `@` and slashes, lowercase
pub fn normalize_handle(handle: &str) -> String {
    handle
        .trim()
        .trim_start_matches('@')
        .trim_matches('/')
        .to_lowercase()
}

/// HTTP status codes meaning "back off", never a verdict
pub(crate) fn is_throttle_status(status: u16) -> bool {
    matches!(status, 429 | 503)
}
