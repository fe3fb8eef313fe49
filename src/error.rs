//! Unified error handling for the instawatch crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`WatchErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! Probe problems never show up here: they are folded into an `UNKNOWN`
//! status. A [`StoreError`] reaching the caller means the check cycle could
//! not read or write its record and nothing was counted.
//!
//! # Usage
//!
//! ```rust,ignore
//! use instawatch::error::{Error, WatchErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying after {:?} error: {}", err.category(), err);
//!     } else {
//!         eprintln!("Fatal error: {}", err);
//!     }
//! }
//! ```

use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::models::ValidationError;
pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{NotifyError, StoreError, TransportError};

/// Common trait for all instawatch error types
pub trait WatchErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout)
    Network,
    /// Target record store errors
    Storage,
    /// Rejected input
    Validation,
    /// Notification delivery errors
    Notification,
    /// Scheduler bookkeeping errors
    Scheduler,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Validation => "validation",
            Self::Notification => "notification",
            Self::Scheduler => "scheduler",
        }
    }
}

impl WatchErrorTrait for TransportError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

impl WatchErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl WatchErrorTrait for NotifyError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::InvalidConfig(_) | Self::Other(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Notification
    }
}

impl WatchErrorTrait for ValidationError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Unified error type for the instawatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before reaching the resolver
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Target record store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP transport failure outside a probe
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Notification delivery failure
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Scheduler bookkeeping errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

impl WatchErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Transport(e) => e.is_recoverable(),
            Self::Notify(e) => e.is_recoverable(),
            Self::Scheduler(e) => e.is_recoverable(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Store(_) => ErrorCategory::Storage,
            Self::Transport(_) => ErrorCategory::Network,
            Self::Notify(_) => ErrorCategory::Notification,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
        }
    }
}

impl Error {
    /// Whether the store could not be reached (as opposed to a probe outcome)
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let store_err = Error::Store(StoreError::LockPoisoned);
        assert_eq!(store_err.category(), ErrorCategory::Storage);
        assert!(store_err.is_store_failure());

        let validation_err: Error = ValidationError::EmptyHandle.into();
        assert_eq!(validation_err.category(), ErrorCategory::Validation);
        assert!(!validation_err.is_store_failure());
    }

    #[test]
    fn test_is_recoverable() {
        let outage = Error::Store(StoreError::Unavailable("maintenance".to_string()));
        assert!(outage.is_recoverable());

        let rejected = Error::Notify(NotifyError::Rejected {
            status: 403,
            body: String::new(),
        });
        assert!(!rejected.is_recoverable());

        let server = Error::Notify(NotifyError::Rejected {
            status: 502,
            body: String::new(),
        });
        assert!(server.is_recoverable());

        assert!(Error::Transport(TransportError::Timeout).is_recoverable());
    }

    #[test]
    fn test_scheduler_error_conversion() {
        let unified: Error = SchedulerError::no_target(7).into();
        assert!(matches!(unified, Error::Scheduler(_)));
        assert_eq!(unified.category(), ErrorCategory::Scheduler);
        assert!(!unified.is_recoverable());
        assert_eq!(unified.category().as_str(), "scheduler");
    }
}
