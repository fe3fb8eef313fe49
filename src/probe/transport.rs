//! HTTP transport used by the probes
//!
//! The probes only need "GET with these headers, give me status and body".
//! [`HttpTransport`] captures that contract so tests can script responses,
//! and [`ReqwestTransport`] implements it with:
//! - Rate limiting with governor
//! - A bounded per-request timeout
//! - Redirect following
//! - Per-call header profiles

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{redirect::Policy, Client};
use std::num::NonZeroU32;
use std::time::Duration;

use super::headers::HeaderProfile;
use crate::config::ProbeConfig;
use crate::utils::error::TransportError;

/// Maximum redirects followed per request
const MAX_REDIRECTS: usize = 10;

/// Status code and decoded body of a probe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Generic HTTP GET capability consumed by probes
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET request with the given header profile
    async fn get(&self, url: &str, profile: HeaderProfile) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport with a shared rate limiter
pub struct ReqwestTransport {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Per-request timeout
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport from probe settings
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be created
    pub fn new(config: &ProbeConfig) -> Result<Self, TransportError> {
        Self::with_settings(config.requests_per_second, config.request_timeout())
    }

    /// Create a transport with explicit rate and timeout
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be created
    pub fn with_settings(
        requests_per_second: u32,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, profile: HeaderProfile) -> Result<HttpResponse, TransportError> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .headers(profile.headers())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(TransportError::from_reqwest)?;

        tracing::trace!(url = %url, status = status, profile = %profile, "Probe request completed");

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = ReqwestTransport::new(&ProbeConfig::default());
        assert!(transport.is_ok());

        let transport = ReqwestTransport::with_settings(0, Duration::from_secs(1));
        assert!(transport.is_ok());
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }
}
