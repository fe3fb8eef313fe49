//! instawatch - Profile status monitor
//!
//! Periodically checks whether public profiles are active or deactivated and
//! notifies the subscriber that registered a profile when its status flips.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`probe`] - Probe strategies (structured JSON endpoints, profile page markup)
//! - [`resolver`] - Combines probe verdicts into a single status
//! - [`scheduler`] - Per-target timers and the check cycle
//! - [`storage`] - Target record store (SQLite, in-memory)
//! - [`notifications`] - Status change delivery
//! - [`models`] - Core data structures and types
//! - [`metrics`] - Prometheus counters for probes and cycles
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use instawatch::config::Config;
//! use instawatch::notifications::notifier_from_config;
//! use instawatch::resolver::Resolver;
//! use instawatch::scheduler::Monitor;
//! use instawatch::storage::open_repository;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let monitor = Monitor::new(
//!         open_repository(&config.database)?,
//!         Resolver::from_config(&config.probe)?,
//!         notifier_from_config(&config.notifier)?,
//!         config.schedule.clone(),
//!     );
//!
//!     let status = monitor.register_or_update_target(42, "@someone").await?;
//!     println!("someone is {status}");
//!     monitor.start().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod probe;
pub mod resolver;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, WatchErrorTrait};
    pub use crate::models::{CheckOutcome, Handle, OwnerId, TargetRecord, TargetStatus};
    pub use crate::notifications::{Notifier, SharedNotifier};
    pub use crate::probe::{ProbeOutcome, ProbeStrategy};
    pub use crate::resolver::{Resolution, Resolver};
    pub use crate::scheduler::Monitor;
    pub use crate::storage::{SharedTargetRepository, TargetRepository};
}

// Direct re-exports for convenience
pub use models::{OwnerId, TargetStatus};
