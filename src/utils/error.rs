//! Error types for the instawatch monitor
//!
//! This module defines the infrastructure error types used throughout the application.

use thiserror::Error;

/// Errors that can occur while issuing a probe request
///
/// These never escape a probe: every variant is folded into an
/// `Indeterminate` classification by the caller.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Scripted failure from a test transport
    #[error("Connection failed: {0}")]
    Connection(String),
}

impl TransportError {
    /// Classify a reqwest error, separating timeouts
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Errors raised by the target record store
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the store lock
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// Stored row could not be decoded
    #[error("Corrupt record for owner {owner_id}: {reason}")]
    CorruptRecord { owner_id: i64, reason: String },

    /// Injected outage (used by tests and maintenance mode)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while delivering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid notifier configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Remote endpoint refused the message
    #[error("Delivery rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Generic error
    #[error("Notifier error: {0}")]
    Other(String),
}
