//! Target record persistence
//!
//! SQLite holds one row per owner; the in-memory repository backs tests and
//! one-off runs.

pub mod repository;

pub use repository::{
    MemoryTargetRepository, SharedTargetRepository, SqliteTargetRepository, TargetRepository,
};

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::utils::error::StoreError;

/// Open the configured SQLite store as a shared repository
pub fn open_repository(config: &DatabaseConfig) -> Result<SharedTargetRepository, StoreError> {
    let repo = SqliteTargetRepository::new(&config.sqlite_path)?;
    Ok(Arc::new(repo))
}
