//! The check cycle: resolve, record, notify
//!
//! A cycle reads the stored record, resolves the handle, and writes the
//! timestamp, error counter and (when it changed) the status in one upsert.
//! The write and the notification happen under the target's epoch lock. The
//! result is dropped when the target was reset or re-registered while the
//! probe was running.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::MonitorInner;
use crate::error::Result;
use crate::metrics;
use crate::models::{CheckOutcome, OwnerId, TargetRecord, TargetStatus, TargetUpdate};
use crate::notifications::format_status_change;
use crate::resolver::Resolution;

/// Store write derived from a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    pub update: TargetUpdate,
    pub previous: TargetStatus,
    pub status: TargetStatus,
    pub changed: bool,
}

/// Work out what a resolution means for a record
///
/// - always stamps `last_checked_at`
/// - `UNKNOWN` bumps the error counter and leaves the status alone
/// - a definitive status clears the counter and is written only when it differs
pub fn plan_update(record: &TargetRecord, status: TargetStatus, now: DateTime<Utc>) -> CyclePlan {
    let previous = record.last_known_status;
    let mut update = TargetUpdate::new().checked_at(now);

    if !status.is_definitive() {
        update = update.errors(record.consecutive_errors.saturating_add(1));
        return CyclePlan {
            update,
            previous,
            status,
            changed: false,
        };
    }

    update = update.errors(0);
    let changed = status != previous;
    if changed {
        update = update.status(status);
    }

    CyclePlan {
        update,
        previous,
        status,
        changed,
    }
}

impl MonitorInner {
    /// Run one check cycle for an owner
    ///
    /// The caller must hold the owner's gate. Returns `None` when the owner has
    /// no active target or the result was discarded because the target was
    /// reset meanwhile.
    pub(super) async fn run_cycle(
        &self,
        owner_id: OwnerId,
        notify: bool,
    ) -> Result<Option<CheckOutcome>> {
        let _timer = metrics::start_check_timer();
        let guard = self.guard(owner_id);
        let epoch = *guard.epoch.lock().await;

        let Some(record) = self.store.get(owner_id)? else {
            debug!(owner_id = owner_id, "No record, skipping check");
            return Ok(None);
        };
        let Some(handle) = record.active_handle().map(str::to_string) else {
            debug!(owner_id = owner_id, "Target cleared, skipping check");
            return Ok(None);
        };

        let resolution = self.resolver.resolve(&handle).await;
        let plan = plan_update(&record, resolution.status, Utc::now());

        // Held until the notification is out, so a clear cannot slip in between
        let current = guard.epoch.lock().await;
        if *current != epoch {
            debug!(
                owner_id = owner_id,
                handle = %handle,
                "Target changed during check, discarding result"
            );
            return Ok(None);
        }
        self.store.upsert(owner_id, &plan.update)?;

        metrics::record_check_cycle(plan.status.as_str());
        log_resolution(owner_id, &handle, &resolution, &plan);

        if plan.changed {
            metrics::record_transition(plan.status.as_str());
            if notify {
                self.notify_change(owner_id, &handle, plan.status).await;
            }
        }
        drop(current);

        Ok(Some(CheckOutcome {
            handle,
            status: plan.status,
            changed: plan.changed,
            previous: plan.previous,
        }))
    }

    /// Best-effort status change message; failures are logged and dropped
    pub(super) async fn notify_change(&self, owner_id: OwnerId, handle: &str, status: TargetStatus) {
        let message = format_status_change(handle, status);

        match self.notifier.send(owner_id, &message).await {
            Ok(delivery) if delivery.success => {
                metrics::record_notification(true);
                debug!(owner_id = owner_id, delivery = %delivery, "Status change delivered");
            }
            Ok(delivery) => {
                metrics::record_notification(false);
                warn!(owner_id = owner_id, delivery = %delivery, "Status change not delivered");
            }
            Err(e) => {
                metrics::record_notification(false);
                warn!(owner_id = owner_id, error = %e, "Failed to send status change");
            }
        }
    }
}

pub(super) fn log_resolution(
    owner_id: OwnerId,
    handle: &str,
    resolution: &Resolution,
    plan: &CyclePlan,
) {
    if plan.changed {
        info!(
            owner_id = owner_id,
            handle = %handle,
            from = %plan.previous,
            status = %plan.status,
            probe = resolution.probe.unwrap_or("none"),
            rationale = %resolution.rationale,
            "Status changed"
        );
    } else {
        debug!(
            owner_id = owner_id,
            handle = %handle,
            status = %plan.status,
            probe = resolution.probe.unwrap_or("none"),
            rationale = %resolution.rationale,
            "Check finished"
        );
    }
}
