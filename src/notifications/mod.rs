//! Owner notifications
//!
//! The monitor hands a formatted message to a [`Notifier`] whenever a target's
//! stored status changes, and for operator broadcasts. Delivery is best-effort:
//! the caller logs failures and moves on.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │      Monitor                               │
//! │  - status change detection                 │
//! │  - message formatting                      │
//! │  - broadcast fan-out                       │
//! └────────────────────────────────────────────┘
//!                     │
//!         ┌───────────┼───────────┐
//!         ▼           ▼           ▼
//!   ┌─────────┐ ┌─────────┐ ┌───────────┐
//!   │ Webhook │ │   Log   │ │ Recording │
//!   │ Channel │ │ Channel │ │  Channel  │
//!   └─────────┘ └─────────┘ └───────────┘
//! ```

pub mod channels;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::NotifierConfig;
use crate::models::{OwnerId, TargetStatus};
use crate::utils::error::NotifyError;

// Re-exports
pub use channels::webhook::{WebhookConfig, WebhookNotifier};
pub use channels::{LogNotifier, RecordingNotifier, SentMessage};

/// Response from sending a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Whether the notification was successfully delivered
    pub success: bool,
    /// Channel that delivered (or failed to deliver) the notification
    pub channel: String,
    /// Optional message about the delivery
    pub message: Option<String>,
    /// Timestamp of delivery attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    /// Create a successful delivery status
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a successful delivery status with a message
    pub fn success_with_message(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(channel)
        }
    }

    /// Create a failed delivery status
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {}", self.channel)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Delivers a message to the owner of a target
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Send `message` (HTML-formatted text) to `owner_id`
    async fn send(&self, owner_id: OwnerId, message: &str) -> Result<DeliveryStatus, NotifyError>;
}

/// Shared notifier handle
pub type SharedNotifier = Arc<dyn Notifier>;

/// Message sent when a target's stored status changes
///
/// ```
/// use instawatch::models::TargetStatus;
/// use instawatch::notifications::format_status_change;
///
/// assert_eq!(
///     format_status_change("alice", TargetStatus::Active),
///     "🟢 <b>alice</b> status is now <b>ACTIVE</b>"
/// );
/// ```
pub fn format_status_change(handle: &str, status: TargetStatus) -> String {
    format!(
        "{} <b>{}</b> status is now <b>{}</b>",
        status.emoji(),
        html_escape::encode_text(handle),
        status.as_str()
    )
}

/// Build the notifier described by the configuration
///
/// A configured webhook wins; otherwise messages go to the log.
pub fn notifier_from_config(config: &NotifierConfig) -> Result<SharedNotifier, NotifyError> {
    match &config.webhook_url {
        Some(url) => {
            let mut webhook = WebhookConfig::new(url)
                .with_timeout(config.timeout_secs)
                .with_max_retries(config.max_retries);
            if let Some(token) = &config.auth_token {
                webhook = webhook.with_auth_token(token);
            }
            Ok(Arc::new(WebhookNotifier::new(webhook)?))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}
