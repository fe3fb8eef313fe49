//! Notification channels
//!
//! [`webhook::WebhookNotifier`] posts to an HTTP endpoint, [`LogNotifier`]
//! writes to the tracing log, and [`RecordingNotifier`] keeps messages in
//! memory for embedding and tests.

pub mod webhook;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{DeliveryStatus, Notifier};
use crate::models::OwnerId;
use crate::utils::error::NotifyError;

/// Writes notifications to the log at `info`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, owner_id: OwnerId, message: &str) -> Result<DeliveryStatus, NotifyError> {
        tracing::info!(owner_id = owner_id, message = %message, "Notification");
        Ok(DeliveryStatus::success("log"))
    }
}

/// A message captured by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub owner_id: OwnerId,
    pub text: String,
}

/// Keeps every message in memory; can be told to fail
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (the attempt is still recorded)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages seen so far, in send order
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, owner_id: OwnerId, message: &str) -> Result<DeliveryStatus, NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError::Other("recording lock poisoned".to_string()))?
            .push(SentMessage {
                owner_id,
                text: message.to_string(),
            });

        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Other("recording notifier set to fail".to_string()));
        }

        Ok(DeliveryStatus::success("recording"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let status = LogNotifier.send(1, "hello").await.unwrap();
        assert!(status.success);
        assert_eq!(status.channel, "log");
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.send(1, "first").await.unwrap();

        notifier.set_failing(true);
        assert!(notifier.send(2, "second").await.is_err());

        assert_eq!(notifier.count(), 2);
        assert_eq!(
            notifier.messages()[0],
            SentMessage {
                owner_id: 1,
                text: "first".to_string()
            }
        );
    }
}
