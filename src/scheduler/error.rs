//! Error types for the scheduler module

use std::fmt;

use crate::models::OwnerId;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Owner has no active target
    NoTarget { owner_id: OwnerId },

    /// Monitor was shut down; no new timers are installed
    ShutDown,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTarget { owner_id } => {
                write!(f, "No target set for owner {}", owner_id)
            }
            Self::ShutDown => write!(f, "Monitor has been shut down"),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a missing-target error
    pub fn no_target(owner_id: OwnerId) -> Self {
        Self::NoTarget { owner_id }
    }
}

impl crate::error::WatchErrorTrait for SchedulerError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> crate::error::ErrorCategory {
        crate::error::ErrorCategory::Scheduler
    }
}
