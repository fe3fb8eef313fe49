// Core data structures for the instawatch monitor

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Identifier of the subscriber a target is watched for
pub type OwnerId = i64;

/// Lower bound for a target's check interval (minutes)
pub const MIN_INTERVAL_MINUTES: u32 = 5;

/// Upper bound for a target's check interval (minutes)
pub const MAX_INTERVAL_MINUTES: u32 = 360;

/// Interval assigned to newly created targets (minutes)
pub const DEFAULT_INTERVAL_MINUTES: u32 = 15;

/// Maximum handle length accepted at registration
pub const MAX_HANDLE_LEN: usize = 30;

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._]+$").expect("Invalid regex pattern"));

/// Three-valued status of a watched profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetStatus {
    Active,
    Deactivated,
    #[default]
    Unknown,
}

impl TargetStatus {
    /// Get string representation (also the persisted form)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Deactivated => "DEACTIVATED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether this is an `ACTIVE`/`DEACTIVATED` verdict
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get emoji representation
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Active => "🟢",
            Self::Deactivated => "🔴",
            Self::Unknown => "⚪",
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Self::Active,
            "DEACTIVATED" => Self::Deactivated,
            _ => Self::Unknown,
        })
    }
}

/// Rejected input at the registration boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Handle is empty after normalisation
    #[error("handle must not be empty")]
    EmptyHandle,

    /// Handle longer than [`MAX_HANDLE_LEN`]
    #[error("handle '{0}' is longer than {MAX_HANDLE_LEN} characters")]
    HandleTooLong(String),

    /// Handle contains characters outside `[A-Za-z0-9._]`
    #[error("handle '{0}' may only contain letters, digits, '.' and '_'")]
    InvalidHandle(String),
}

/// A validated profile handle
///
/// Construction strips a leading `@` and surrounding whitespace, then checks
/// the result against `[A-Za-z0-9._]{1,30}`. The original casing is kept for
/// display; probes compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    /// Validate and wrap a raw handle
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim().trim_start_matches('@');
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyHandle);
        }
        if trimmed.chars().count() > MAX_HANDLE_LEN {
            return Err(ValidationError::HandleTooLong(trimmed.to_string()));
        }
        if !HANDLE_RE.is_match(trimmed) {
            return Err(ValidationError::InvalidHandle(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Handle as entered by the owner
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased form used in probe URLs and comparisons
    pub fn normalized(&self) -> String {
        self.0.trim_matches('/').to_lowercase()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Handle {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

/// Durable per-owner record of the watched target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub owner_id: OwnerId,
    /// `None` once the owner has reset their target
    pub handle: Option<String>,
    pub last_known_status: TargetStatus,
    pub interval_minutes: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
}

impl TargetRecord {
    /// Fresh record with defaults for the given owner
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            handle: None,
            last_known_status: TargetStatus::Unknown,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            last_checked_at: None,
            consecutive_errors: 0,
        }
    }

    /// Handle of an active target, skipping cleared or blank rows
    pub fn active_handle(&self) -> Option<&str> {
        self.handle.as_deref().filter(|h| !h.is_empty())
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &TargetUpdate) {
        if let Some(handle) = &update.handle {
            self.handle = Some(handle.clone());
        }
        if let Some(status) = update.last_known_status {
            self.last_known_status = status;
        }
        if let Some(at) = update.last_checked_at {
            self.last_checked_at = Some(at);
        }
        if let Some(minutes) = update.interval_minutes {
            self.interval_minutes = minutes;
        }
        if let Some(errors) = update.consecutive_errors {
            self.consecutive_errors = errors;
        }
    }
}

/// Partial set of fields written together in one store operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetUpdate {
    pub handle: Option<String>,
    pub last_known_status: Option<TargetStatus>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub interval_minutes: Option<u32>,
    pub consecutive_errors: Option<u32>,
}

impl TargetUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn status(mut self, status: TargetStatus) -> Self {
        self.last_known_status = Some(status);
        self
    }

    pub fn checked_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_checked_at = Some(at);
        self
    }

    pub fn interval(mut self, minutes: u32) -> Self {
        self.interval_minutes = Some(minutes);
        self
    }

    pub fn errors(mut self, count: u32) -> Self {
        self.consecutive_errors = Some(count);
        self
    }
}

/// Snapshot returned to the command layer by `current_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub handle: String,
    pub status: TargetStatus,
    pub interval_minutes: u32,
}

/// Result of a check cycle as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub handle: String,
    pub status: TargetStatus,
    /// A definitive status differing from the stored one was recorded
    pub changed: bool,
    /// Status stored before this cycle
    pub previous: TargetStatus,
}
