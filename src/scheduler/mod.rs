//! Per-target scheduling and state tracking
//!
//! # Overview
//!
//! [`Monitor`] owns one recurring timer per watched target, keyed by owner,
//! and exposes the operations the command layer needs: register a handle,
//! check on demand, query, change the interval, clear, list and broadcast.
//!
//! # Exclusivity
//!
//! Every owner has a [`TargetGuard`] that lives as long as the monitor:
//!
//! - the **gate** is held for the whole of a check cycle. Timer ticks only
//!   `try_lock` it and drop the tick when it is busy; manual checks and
//!   registration wait for it.
//! - the **epoch** serialises control operations (register, interval change,
//!   clear) with the write and notify phase of a cycle. Clearing bumps the
//!   epoch, so a cycle that started before the clear finds a different epoch
//!   and throws its result away.
//!
//! ```text
//!  tick ──try_lock(gate)──► spawn cycle ──► resolve ──► lock(epoch) ──► upsert
//!                 │busy                                     │changed
//!                 ▼                                         ▼
//!            tick dropped                             result discarded
//! ```
//!
//! Timer loops never run the cycle inline. Replacing a timer aborts the loop
//! only, so a cycle already in flight still finishes and notifies.
//!
//! # Modules
//!
//! - [`cycle`] - the check cycle and its store update
//! - [`error`] - scheduler error types

pub mod cycle;
pub mod error;

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::{
    CheckOutcome, Handle, OwnerId, TargetRecord, TargetSnapshot, TargetStatus, TargetUpdate,
};
use crate::notifications::SharedNotifier;
use crate::resolver::Resolver;
use crate::storage::SharedTargetRepository;

pub use cycle::{plan_update, CyclePlan};
pub use error::{SchedulerError, SchedulerResult};

/// Wall-clock length of one interval unit
pub const MINUTE: Duration = Duration::from_secs(60);

/// Per-owner exclusivity token
#[derive(Default)]
pub struct TargetGuard {
    gate: Arc<tokio::sync::Mutex<()>>,
    epoch: tokio::sync::Mutex<u64>,
}

/// Shared state behind a [`Monitor`]
pub(crate) struct MonitorInner {
    store: SharedTargetRepository,
    resolver: Resolver,
    notifier: SharedNotifier,
    schedule: ScheduleConfig,
    tick_unit: Duration,
    guards: Mutex<HashMap<OwnerId, Arc<TargetGuard>>>,
    jobs: Mutex<HashMap<OwnerId, JoinHandle<()>>>,
    stopped: AtomicBool,
}

fn lock_map<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MonitorInner {
    fn guard(&self, owner_id: OwnerId) -> Arc<TargetGuard> {
        lock_map(&self.guards).entry(owner_id).or_default().clone()
    }

    /// Replace the owner's timer; the caller holds the owner's epoch lock
    fn install_timer(self: &Arc<Self>, owner_id: OwnerId, minutes: u32) -> SchedulerResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }

        let period = self.tick_unit.saturating_mul(minutes.max(1));
        let gate = self.guard(owner_id).gate.clone();

        let mut jobs = lock_map(&self.jobs);
        if let Some(old) = jobs.remove(&owner_id) {
            old.abort();
        }
        jobs.insert(
            owner_id,
            spawn_timer(Arc::downgrade(self), owner_id, period, gate),
        );
        metrics::set_scheduled_targets(jobs.len());

        info!(owner_id = owner_id, interval_minutes = minutes, "Timer scheduled");
        Ok(())
    }

    /// Stored interval clamped into the configured bounds
    ///
    /// An out-of-range value is corrected in the store.
    fn effective_interval(&self, record: &TargetRecord) -> Result<u32> {
        let minutes = self
            .schedule
            .clamp_interval(i64::from(record.interval_minutes));

        if minutes != record.interval_minutes {
            warn!(
                owner_id = record.owner_id,
                stored = record.interval_minutes,
                effective = minutes,
                "Stored interval out of bounds, clamping"
            );
            self.store
                .upsert(record.owner_id, &TargetUpdate::new().interval(minutes))?;
        }

        Ok(minutes)
    }

    /// Remove the owner's timer; the caller holds the owner's epoch lock
    fn cancel_timer(&self, owner_id: OwnerId) -> bool {
        let mut jobs = lock_map(&self.jobs);
        let removed = jobs.remove(&owner_id);
        metrics::set_scheduled_targets(jobs.len());

        match removed {
            Some(job) => {
                job.abort();
                true
            }
            None => false,
        }
    }
}

/// Recurring timer for one owner
///
/// The first tick fires one period after scheduling. Ticks that find the gate
/// busy are dropped.
fn spawn_timer(
    inner: Weak<MonitorInner>,
    owner_id: OwnerId,
    period: Duration,
    gate: Arc<tokio::sync::Mutex<()>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(inner) = inner.upgrade() else {
                break;
            };

            let permit = match gate.clone().try_lock_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    debug!(owner_id = owner_id, "Previous check still running, tick dropped");
                    continue;
                }
            };

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = inner.run_cycle(owner_id, true).await {
                    error!(owner_id = owner_id, error = %e, "Scheduled check failed");
                }
            });
        }
    })
}

/// Status monitor: timers, check cycles and the exposed target operations
///
/// Cloning is cheap; clones share timers and guards.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

impl Monitor {
    /// Create a monitor whose intervals are measured in minutes
    pub fn new(
        store: SharedTargetRepository,
        resolver: Resolver,
        notifier: SharedNotifier,
        schedule: ScheduleConfig,
    ) -> Self {
        Self::with_tick_unit(store, resolver, notifier, schedule, MINUTE)
    }

    /// Create a monitor with a custom length for one interval unit
    pub fn with_tick_unit(
        store: SharedTargetRepository,
        resolver: Resolver,
        notifier: SharedNotifier,
        schedule: ScheduleConfig,
        tick_unit: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                store,
                resolver,
                notifier,
                schedule,
                tick_unit,
                guards: Mutex::new(HashMap::new()),
                jobs: Mutex::new(HashMap::new()),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Load persisted targets and install one timer per stored handle
    ///
    /// Stored intervals outside the configured bounds are clamped and written
    /// back. Returns the number of timers installed.
    pub async fn start(&self) -> Result<usize> {
        let records = self.inner.store.list_all()?;
        let mut scheduled = 0;

        for record in records.iter().filter(|r| r.active_handle().is_some()) {
            let guard = self.inner.guard(record.owner_id);
            let _epoch = guard.epoch.lock().await;
            let minutes = self.inner.effective_interval(record)?;
            self.inner.install_timer(record.owner_id, minutes)?;
            scheduled += 1;
        }

        info!(targets = scheduled, "Monitor started");
        Ok(scheduled)
    }

    /// Cancel every timer; no new timers are installed afterwards
    pub fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);

        let mut jobs = lock_map(&self.inner.jobs);
        let count = jobs.len();
        for (_, job) in jobs.drain() {
            job.abort();
        }
        metrics::set_scheduled_targets(0);

        info!(timers = count, "Monitor shut down");
    }

    /// Number of owners with a live timer
    pub fn scheduled_count(&self) -> usize {
        lock_map(&self.inner.jobs).len()
    }

    /// Whether the owner currently has a live timer
    pub fn is_scheduled(&self, owner_id: OwnerId) -> bool {
        lock_map(&self.inner.jobs).contains_key(&owner_id)
    }

    /// Set or replace the owner's target and resolve it once
    ///
    /// The record is reset for the new handle (`UNKNOWN`, no errors), the
    /// handle is resolved with the normal bookkeeping but without notifying,
    /// and the timer is (re)installed.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for a malformed handle (nothing is written),
    /// `Error::Store` when the record cannot be read or written.
    pub async fn register_or_update_target(
        &self,
        owner_id: OwnerId,
        raw_handle: &str,
    ) -> Result<TargetStatus> {
        let handle = Handle::parse(raw_handle)?;
        let guard = self.inner.guard(owner_id);
        let _gate = guard.gate.lock().await;

        let (epoch, record) = {
            let mut epoch = guard.epoch.lock().await;
            *epoch += 1;

            let mut update = TargetUpdate::new()
                .handle(handle.as_str())
                .status(TargetStatus::Unknown)
                .errors(0);
            if self.inner.store.get(owner_id)?.is_none() {
                update = update.interval(self.inner.schedule.default_interval_minutes);
            }

            (*epoch, self.inner.store.upsert(owner_id, &update)?)
        };

        info!(owner_id = owner_id, handle = %handle, "Target registered");

        let resolution = self.inner.resolver.resolve(&handle.normalized()).await;
        let plan = plan_update(&record, resolution.status, Utc::now());

        let current = guard.epoch.lock().await;
        if *current != epoch {
            debug!(owner_id = owner_id, "Target cleared during registration");
            return Ok(resolution.status);
        }

        self.inner.store.upsert(owner_id, &plan.update)?;
        metrics::record_check_cycle(plan.status.as_str());
        cycle::log_resolution(owner_id, handle.as_str(), &resolution, &plan);

        let minutes = self.inner.effective_interval(&record)?;
        self.inner.install_timer(owner_id, minutes)?;

        Ok(resolution.status)
    }

    /// Run a check cycle now, outside the timer
    ///
    /// Waits for a running cycle of the same owner to finish first. A status
    /// change is notified exactly as a scheduled cycle would.
    ///
    /// # Errors
    ///
    /// `SchedulerError::NoTarget` when no handle is set, `Error::Store` when
    /// the record cannot be read or written.
    pub async fn manual_check(&self, owner_id: OwnerId) -> Result<CheckOutcome> {
        let gate = self.inner.guard(owner_id).gate.clone();
        let _gate = gate.lock().await;

        match self.inner.run_cycle(owner_id, true).await? {
            Some(outcome) => Ok(outcome),
            None => Err(SchedulerError::no_target(owner_id).into()),
        }
    }

    /// Handle, status and interval of the owner's target, if one is set
    pub fn current_status(&self, owner_id: OwnerId) -> Result<Option<TargetSnapshot>> {
        let snapshot = self.inner.store.get(owner_id)?.and_then(|record| {
            record.active_handle().map(|handle| TargetSnapshot {
                handle: handle.to_string(),
                status: record.last_known_status,
                interval_minutes: record.interval_minutes,
            })
        });

        Ok(snapshot)
    }

    /// Change the check interval, clamped into the configured bounds
    ///
    /// Creates the record when missing. The timer is replaced only when a
    /// handle is set. Returns the effective interval.
    pub async fn set_interval(&self, owner_id: OwnerId, minutes: i64) -> Result<u32> {
        let effective = self.inner.schedule.clamp_interval(minutes);
        let guard = self.inner.guard(owner_id);
        let _epoch = guard.epoch.lock().await;

        let record = self
            .inner
            .store
            .upsert(owner_id, &TargetUpdate::new().interval(effective))?;

        if i64::from(effective) != minutes {
            debug!(owner_id = owner_id, requested = minutes, effective = effective, "Interval clamped");
        }

        if record.active_handle().is_some() {
            self.inner.install_timer(owner_id, effective)?;
        }

        Ok(effective)
    }

    /// Stop watching: cancel the timer and reset the record
    ///
    /// No cycle starts for this owner after this returns; a cycle already in
    /// flight completes but its result is discarded.
    pub async fn clear_target(&self, owner_id: OwnerId) -> Result<()> {
        let guard = self.inner.guard(owner_id);
        let mut epoch = guard.epoch.lock().await;

        self.inner.cancel_timer(owner_id);
        *epoch += 1;
        self.inner.store.reset(owner_id)?;

        info!(owner_id = owner_id, "Target cleared");
        Ok(())
    }

    /// All stored records, cleared ones included
    pub fn list_targets(&self) -> Result<Vec<TargetRecord>> {
        Ok(self.inner.store.list_all()?)
    }

    /// Send a message to every known owner
    ///
    /// Returns how many deliveries succeeded; failures are logged and counted out.
    pub async fn broadcast(&self, message: &str) -> Result<usize> {
        let owners: Vec<OwnerId> = self
            .inner
            .store
            .list_all()?
            .into_iter()
            .map(|r| r.owner_id)
            .collect();

        let notifier = &self.inner.notifier;
        let results =
            futures::future::join_all(owners.iter().map(|&owner| notifier.send(owner, message)))
                .await;

        let mut delivered = 0;
        for (owner_id, result) in owners.iter().zip(results) {
            match result {
                Ok(status) if status.success => delivered += 1,
                Ok(status) => warn!(owner_id = owner_id, delivery = %status, "Broadcast not delivered"),
                Err(e) => warn!(owner_id = owner_id, error = %e, "Broadcast failed"),
            }
        }

        info!(owners = owners.len(), delivered = delivered, "Broadcast finished");
        Ok(delivered)
    }
}
