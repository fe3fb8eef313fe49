//! Structured-data probe against the JSON profile-info endpoints
//!
//! Endpoint variants are tried in order. Interpretation of each response:
//!
//! | Response                                   | Result                      |
//! |--------------------------------------------|-----------------------------|
//! | 2xx with a `user` object                   | `Active`                    |
//! | 2xx, valid JSON, no `user` object          | `Deactivated`               |
//! | 404                                        | `Deactivated`               |
//! | 429 / 503                                  | `Indeterminate` (throttled) |
//! | 401 / 403, other codes, non-JSON 2xx, I/O  | next variant                |

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::transport::HttpTransport;
use super::{is_throttle_status, ProbeOutcome, ProbeStrategy};
use crate::config::EndpointConfig;
use crate::utils::truncate_text;

/// Probe that reads the profile-info JSON endpoints
pub struct StructuredDataProbe {
    transport: Arc<dyn HttpTransport>,
    endpoints: Vec<EndpointConfig>,
}

impl StructuredDataProbe {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: Vec<EndpointConfig>) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Decide whether a 2xx body carries a user object
    ///
    /// Returns `None` when the body is not JSON at all.
    pub fn payload_has_user(body: &str) -> Option<bool> {
        let payload: Value = serde_json::from_str(body).ok()?;

        let user = match payload.get("data") {
            Some(Value::Object(data)) if data.contains_key("user") => data.get("user"),
            _ => payload.get("user"),
        };

        Some(matches!(user, Some(Value::Object(_))))
    }
}

#[async_trait]
impl ProbeStrategy for StructuredDataProbe {
    fn name(&self) -> &'static str {
        "structured"
    }

    async fn probe(&self, handle: &str) -> ProbeOutcome {
        for (idx, endpoint) in self.endpoints.iter().enumerate() {
            let url = endpoint.url_for(handle);

            let response = match self.transport.get(&url, endpoint.profile).await {
                Ok(response) => response,
                Err(e) => {
                    debug!(handle = %handle, variant = idx, error = %e, "Structured endpoint failed");
                    continue;
                }
            };

            match response.status {
                status if response.is_success() => match Self::payload_has_user(&response.body) {
                    Some(true) => {
                        return ProbeOutcome::active(format!("structured[{idx}] {status} user found"))
                    }
                    Some(false) => {
                        return ProbeOutcome::deactivated(format!(
                            "structured[{idx}] {status} but no user"
                        ))
                    }
                    None => {
                        debug!(
                            handle = %handle,
                            variant = idx,
                            body = %truncate_text(&response.body, 120),
                            "Structured endpoint returned non-JSON body"
                        );
                    }
                },
                404 => return ProbeOutcome::deactivated(format!("structured[{idx}] 404")),
                401 | 403 => {
                    debug!(handle = %handle, variant = idx, status = response.status, "Structured endpoint refused");
                }
                status if is_throttle_status(status) => {
                    return ProbeOutcome::throttled(format!("structured[{idx}] {status} limited"));
                }
                status => {
                    debug!(handle = %handle, variant = idx, status = status, "Structured endpoint unexpected status");
                }
            }
        }

        ProbeOutcome::indeterminate("structured endpoints exhausted or blocked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::headers::HeaderProfile;
    use crate::probe::testing::{Reply, ScriptedTransport};
    use crate::probe::Classification;

    const WEB: &str = "https://web.test/info?u=alice";
    const APP: &str = "https://app.test/info?u=alice";

    fn endpoints() -> Vec<EndpointConfig> {
        vec![
            EndpointConfig::new("https://web.test/info?u={handle}", HeaderProfile::WebJson),
            EndpointConfig::new("https://app.test/info?u={handle}", HeaderProfile::MobileApp),
        ]
    }

    async fn run(transport: ScriptedTransport) -> (ProbeOutcome, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let probe = StructuredDataProbe::new(transport.clone(), endpoints());
        (probe.probe("alice").await, transport)
    }

    #[test]
    fn test_payload_has_user() {
        assert_eq!(
            StructuredDataProbe::payload_has_user(r#"{"data":{"user":{"id":"1"}}}"#),
            Some(true)
        );
        assert_eq!(
            StructuredDataProbe::payload_has_user(r#"{"user":{"id":"1"}}"#),
            Some(true)
        );
        assert_eq!(
            StructuredDataProbe::payload_has_user(r#"{"data":{"user":null}}"#),
            Some(false)
        );
        assert_eq!(
            StructuredDataProbe::payload_has_user(r#"{"status":"ok"}"#),
            Some(false)
        );
        assert_eq!(StructuredDataProbe::payload_has_user("<html>"), None);
    }

    #[tokio::test]
    async fn test_user_payload_is_active() {
        let (outcome, transport) =
            run(ScriptedTransport::new().on(WEB, Reply::status(200, r#"{"data":{"user":{}}}"#)))
                .await;

        assert_eq!(outcome.classification, Classification::Active);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_deactivated() {
        let (outcome, _) = run(ScriptedTransport::new().on(WEB, Reply::status(404, ""))).await;

        assert_eq!(outcome.classification, Classification::Deactivated);
        assert!(!outcome.throttled);
    }

    #[tokio::test]
    async fn test_forbidden_tries_next_variant_with_other_profile() {
        let (outcome, transport) = run(ScriptedTransport::new()
            .on(WEB, Reply::status(403, ""))
            .on(APP, Reply::status(200, r#"{"data":{"user":{"id":"1"}}}"#)))
        .await;

        assert_eq!(outcome.classification, Classification::Active);
        assert_eq!(
            transport.profiles(),
            vec![HeaderProfile::WebJson, HeaderProfile::MobileApp]
        );
    }

    #[tokio::test]
    async fn test_rate_limited_stops_immediately() {
        let (outcome, transport) = run(ScriptedTransport::new()
            .on(WEB, Reply::status(429, ""))
            .on(APP, Reply::status(200, r#"{"user":{}}"#)))
        .await;

        assert_eq!(outcome.classification, Classification::Indeterminate);
        assert!(outcome.throttled);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_variants_blocked_is_indeterminate() {
        let (outcome, transport) = run(ScriptedTransport::new()
            .on(WEB, Reply::status(403, ""))
            .on(APP, Reply::Fail))
        .await;

        assert_eq!(outcome.classification, Classification::Indeterminate);
        assert!(!outcome.throttled);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_non_json_success_moves_on() {
        let (outcome, _) = run(ScriptedTransport::new()
            .on(WEB, Reply::status(200, "<html>login</html>"))
            .on(APP, Reply::status(200, r#"{"data":{"user":null}}"#)))
        .await;

        assert_eq!(outcome.classification, Classification::Deactivated);
    }
}
