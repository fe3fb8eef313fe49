//! Status resolution across the probe strategies
//!
//! The resolver runs its strategies in priority order and stops at the first
//! definitive verdict. A throttled outcome ends resolution immediately so a
//! rate-limited upstream is not hammered by the fallback.

use std::sync::Arc;
use tracing::debug;

use crate::config::ProbeConfig;
use crate::metrics;
use crate::models::TargetStatus;
use crate::probe::{
    normalize_handle, Classification, HttpTransport, MarkupProbe, ProbeStrategy,
    ReqwestTransport, StructuredDataProbe,
};
use crate::utils::error::TransportError;

/// Final answer of one resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: TargetStatus,
    pub rationale: String,
    /// Strategy that produced the verdict (last one tried when `UNKNOWN`)
    pub probe: Option<&'static str>,
}

impl Resolution {
    fn unknown(rationale: impl Into<String>, probe: Option<&'static str>) -> Self {
        Self {
            status: TargetStatus::Unknown,
            rationale: rationale.into(),
            probe,
        }
    }
}

/// Ordered chain of probe strategies
#[derive(Clone)]
pub struct Resolver {
    strategies: Vec<Arc<dyn ProbeStrategy>>,
}

impl Resolver {
    /// Create a resolver from an explicit strategy order
    pub fn new(strategies: Vec<Arc<dyn ProbeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Structured probe first, markup probe as fallback, sharing one transport
    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: &ProbeConfig) -> Self {
        let structured = StructuredDataProbe::new(transport.clone(), config.endpoints.clone());
        let markup = MarkupProbe::from_config(transport, config);

        Self::new(vec![Arc::new(structured), Arc::new(markup)])
    }

    /// Build the default chain over a rate-limited reqwest transport
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &ProbeConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::with_transport(transport, config))
    }

    /// Resolve a handle to `ACTIVE`, `DEACTIVATED` or `UNKNOWN`
    ///
    /// Never fails: every probe problem ends up as `UNKNOWN`.
    pub async fn resolve(&self, handle: &str) -> Resolution {
        let handle = normalize_handle(handle);
        let mut last = Resolution::unknown("no probe strategies configured", None);

        for strategy in &self.strategies {
            let outcome = strategy.probe(&handle).await;
            metrics::record_probe(strategy.name(), outcome.classification.as_str());

            debug!(
                handle = %handle,
                probe = strategy.name(),
                classification = %outcome.classification,
                rationale = %outcome.rationale,
                "Probe finished"
            );

            let status = match outcome.classification {
                Classification::Active => TargetStatus::Active,
                Classification::Deactivated => TargetStatus::Deactivated,
                Classification::Indeterminate => {
                    last = Resolution::unknown(outcome.rationale, Some(strategy.name()));
                    if outcome.throttled {
                        break;
                    }
                    continue;
                }
            };

            return Resolution {
                status,
                rationale: outcome.rationale,
                probe: Some(strategy.name()),
            };
        }

        last
    }
}
