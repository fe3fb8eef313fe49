//! Webhook notification channel
//!
//! This module provides a webhook channel for sending owner notifications via HTTP POST requests.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::OwnerId;
use crate::notifications::{DeliveryStatus, Notifier};
use crate::utils::error::NotifyError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Webhook channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL endpoint
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retry attempts on failure
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// First retry delay in milliseconds; doubles per attempt
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_timeout() -> u64 {
    10
}

fn default_retries() -> u32 {
    2
}

fn default_retry_base_ms() -> u64 {
    1000
}

impl WebhookConfig {
    /// Create a new webhook configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first retry delay
    pub fn with_retry_base_ms(mut self, retry_base_ms: u64) -> Self {
        self.retry_base_ms = retry_base_ms;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Webhook URL cannot be empty".to_string());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff: crate::utils::retry::Backoff::Exponential {
                base_ms: self.retry_base_ms,
                max_ms: 30_000,
            },
        }
    }
}

/// Webhook notification channel
///
/// # Payload Format
///
/// ```json
/// {
///   "owner_id": 42,
///   "text": "🔴 <b>alice</b> status is now <b>DEACTIVATED</b>",
///   "sent_at": "2024-01-01T12:05:00Z"
/// }
/// ```
///
/// Client errors (4xx) are not retried.
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: Client,
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        config.validate().map_err(NotifyError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Create a simple webhook notifier with just a URL
    pub fn from_url(url: impl Into<String>) -> Result<Self, NotifyError> {
        Self::new(WebhookConfig::new(url))
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn build_payload(owner_id: OwnerId, text: &str) -> serde_json::Value {
        serde_json::json!({
            "owner_id": owner_id,
            "text": text,
            "sent_at": Utc::now().to_rfc3339(),
        })
    }

    async fn post_once(&self, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.config.url);

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.json(payload).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, owner_id: OwnerId, message: &str) -> Result<DeliveryStatus, NotifyError> {
        let payload = Self::build_payload(owner_id, message);

        with_retry_if(
            &self.config.retry_config(),
            || self.post_once(&payload),
            |e| !matches!(e, NotifyError::Rejected { status, .. } if (400..500).contains(status)),
        )
        .await?;

        tracing::debug!(owner_id = owner_id, url = %self.config.url, "Webhook delivered");

        Ok(DeliveryStatus::success_with_message(
            "webhook",
            format!("Delivered to {}", self.config.url),
        ))
    }
}
