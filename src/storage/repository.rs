//! Repository Pattern for the target record store
//!
//! The monitor only depends on the [`TargetRepository`] trait, so storage can
//! be swapped without touching scheduling logic:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Monitor / check cycle                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TargetRepository                         │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                         │
//!                   ▼                         ▼
//!          ┌─────────────────┐       ┌─────────────────┐
//!          │     SQLite      │       │     Memory      │
//!          │  Implementation │       │ Implementation  │
//!          └─────────────────┘       └─────────────────┘
//! ```
//!
//! Every write is a single statement against a single row, so a check
//! cycle's timestamp, status and error counter land together.
//!
//! # Usage
//!
//! ```rust,ignore
//! use instawatch::storage::{SqliteTargetRepository, TargetRepository};
//!
//! let repo = SqliteTargetRepository::new("data/instawatch.db")?;
//! let record = repo.get(42)?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{OwnerId, TargetRecord, TargetStatus, TargetUpdate, DEFAULT_INTERVAL_MINUTES};
use crate::utils::error::StoreError;

// ============================================================================
// Repository Trait
// ============================================================================

/// Durable per-owner target records
pub trait TargetRepository: Send + Sync {
    /// Fetch the record for an owner
    fn get(&self, owner_id: OwnerId) -> Result<Option<TargetRecord>, StoreError>;

    /// Write the given fields, creating the row with defaults when missing
    ///
    /// Returns the record as stored after the write.
    fn upsert(&self, owner_id: OwnerId, update: &TargetUpdate)
        -> Result<TargetRecord, StoreError>;

    /// Clear handle, status, timestamp and error counter; the interval survives
    fn reset(&self, owner_id: OwnerId) -> Result<(), StoreError>;

    /// All records, cleared ones included
    fn list_all(&self) -> Result<Vec<TargetRecord>, StoreError>;
}

/// Shared repository handle
pub type SharedTargetRepository = Arc<dyn TargetRepository>;

// ============================================================================
// SQLite Implementation
// ============================================================================

const SELECT_COLUMNS: &str = "SELECT owner_id, handle, last_known_status, interval_minutes,
            last_checked_at, consecutive_errors FROM targets";

/// SQLite implementation of TargetRepository
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteTargetRepository {
    conn: Mutex<Connection>,
}

impl SqliteTargetRepository {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS targets (
                    owner_id INTEGER PRIMARY KEY,
                    handle TEXT,
                    last_known_status TEXT NOT NULL DEFAULT 'UNKNOWN',
                    interval_minutes INTEGER NOT NULL DEFAULT 15,
                    last_checked_at TEXT,
                    consecutive_errors INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_targets_handle
                    ON targets(handle);
                "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn fetch(conn: &Connection, owner_id: OwnerId) -> Result<Option<TargetRecord>, StoreError> {
        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE owner_id = ?1"),
                params![owner_id],
                RawRow::from_row,
            )
            .optional()?;

        raw.map(RawRow::into_record).transpose()
    }
}

/// Undecoded row, converted outside the rusqlite closure
struct RawRow {
    owner_id: i64,
    handle: Option<String>,
    status: Option<String>,
    interval_minutes: i64,
    last_checked_at: Option<String>,
    consecutive_errors: i64,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            owner_id: row.get(0)?,
            handle: row.get(1)?,
            status: row.get(2)?,
            interval_minutes: row.get(3)?,
            last_checked_at: row.get(4)?,
            consecutive_errors: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<TargetRecord, StoreError> {
        let owner_id = self.owner_id;
        let corrupt = |reason: String| StoreError::CorruptRecord { owner_id, reason };

        let last_checked_at = self
            .last_checked_at
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| corrupt(format!("bad last_checked_at '{raw}': {e}")))
            })
            .transpose()?;

        let interval_minutes = u32::try_from(self.interval_minutes)
            .map_err(|_| corrupt(format!("bad interval {}", self.interval_minutes)))?;

        let consecutive_errors = u32::try_from(self.consecutive_errors)
            .map_err(|_| corrupt(format!("bad error counter {}", self.consecutive_errors)))?;

        Ok(TargetRecord {
            owner_id,
            handle: self.handle,
            last_known_status: self
                .status
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            interval_minutes,
            last_checked_at,
            consecutive_errors,
        })
    }
}

impl TargetRepository for SqliteTargetRepository {
    fn get(&self, owner_id: OwnerId) -> Result<Option<TargetRecord>, StoreError> {
        let conn = self.lock()?;
        Self::fetch(&conn, owner_id)
    }

    fn upsert(
        &self,
        owner_id: OwnerId,
        update: &TargetUpdate,
    ) -> Result<TargetRecord, StoreError> {
        let conn = self.lock()?;

        conn.execute(
            r#"
                INSERT INTO targets (owner_id, handle, last_known_status, interval_minutes,
                                     last_checked_at, consecutive_errors)
                VALUES (?1, ?2, COALESCE(?3, 'UNKNOWN'), COALESCE(?4, ?7), ?5, COALESCE(?6, 0))
                ON CONFLICT(owner_id) DO UPDATE SET
                    handle = COALESCE(?2, handle),
                    last_known_status = COALESCE(?3, last_known_status),
                    interval_minutes = COALESCE(?4, interval_minutes),
                    last_checked_at = COALESCE(?5, last_checked_at),
                    consecutive_errors = COALESCE(?6, consecutive_errors)
                "#,
            params![
                owner_id,
                update.handle,
                update.last_known_status.map(|s| s.as_str()),
                update.interval_minutes,
                update.last_checked_at.map(|at| at.to_rfc3339()),
                update.consecutive_errors,
                DEFAULT_INTERVAL_MINUTES,
            ],
        )?;

        Self::fetch(&conn, owner_id)?.ok_or_else(|| StoreError::CorruptRecord {
            owner_id,
            reason: "row missing after upsert".to_string(),
        })
    }

    fn reset(&self, owner_id: OwnerId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                UPDATE targets
                   SET handle = NULL,
                       last_known_status = 'UNKNOWN',
                       last_checked_at = NULL,
                       consecutive_errors = 0
                 WHERE owner_id = ?1
                "#,
            params![owner_id],
        )?;

        Ok(())
    }

    fn list_all(&self) -> Result<Vec<TargetRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY owner_id"))?;

        let rows = stmt
            .query_map([], RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(RawRow::into_record).collect()
    }
}

// ============================================================================
// Memory Implementation
// ============================================================================

/// In-memory implementation of TargetRepository
///
/// Useful for testing without database dependencies. Can be switched into an
/// unavailable state to exercise store-failure paths.
#[derive(Default)]
pub struct MemoryTargetRepository {
    records: RwLock<HashMap<OwnerId, TargetRecord>>,
    unavailable: AtomicBool,
}

impl MemoryTargetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Get record count
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if repository is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

impl TargetRepository for MemoryTargetRepository {
    fn get(&self, owner_id: OwnerId) -> Result<Option<TargetRecord>, StoreError> {
        self.check_available()?;
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.get(&owner_id).cloned())
    }

    fn upsert(
        &self,
        owner_id: OwnerId,
        update: &TargetUpdate,
    ) -> Result<TargetRecord, StoreError> {
        self.check_available()?;
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;

        let record = records
            .entry(owner_id)
            .or_insert_with(|| TargetRecord::new(owner_id));
        record.apply(update);

        Ok(record.clone())
    }

    fn reset(&self, owner_id: OwnerId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;

        if let Some(record) = records.get_mut(&owner_id) {
            record.handle = None;
            record.last_known_status = TargetStatus::Unknown;
            record.last_checked_at = None;
            record.consecutive_errors = 0;
        }

        Ok(())
    }

    fn list_all(&self) -> Result<Vec<TargetRecord>, StoreError> {
        self.check_available()?;
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;

        let mut all: Vec<TargetRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.owner_id);
        Ok(all)
    }
}

// ============================================================================
// Tests
// ============================================================================
