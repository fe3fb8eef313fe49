//! Prometheus metrics for the monitor
//!
//! This module provides metrics tracking for:
//! - Probes: verdicts per strategy
//! - Check cycles: outcome and duration
//! - Status transitions and notification deliveries
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all monitor metrics
struct MonitorMetrics {
    probe_verdicts: CounterVec,
    check_cycles: CounterVec,
    check_duration: Histogram,
    transitions: CounterVec,
    notifications: CounterVec,
    scheduled_targets: Gauge,
}

/// Global storage for monitor metrics
static MONITOR_METRICS: OnceLock<MonitorMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers anything.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = instawatch::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = MonitorMetrics {
        probe_verdicts: register_counter_vec!(
            "instawatch_probe_verdicts_total",
            "Probe verdicts by strategy and classification",
            &["probe", "classification"]
        )?,
        check_cycles: register_counter_vec!(
            "instawatch_check_cycles_total",
            "Completed check cycles by resolved status",
            &["status"]
        )?,
        check_duration: register_histogram!(
            "instawatch_check_cycle_duration_seconds",
            "Time spent in a check cycle in seconds",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        transitions: register_counter_vec!(
            "instawatch_status_transitions_total",
            "Stored status changes by new status",
            &["status"]
        )?,
        notifications: register_counter_vec!(
            "instawatch_notifications_total",
            "Notification delivery attempts by result",
            &["result"]
        )?,
        scheduled_targets: register_gauge!(
            "instawatch_scheduled_targets",
            "Number of targets with a live timer"
        )?,
    };

    MONITOR_METRICS
        .set(metrics)
        .map_err(|_| "Monitor metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    MONITOR_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a single probe verdict
pub fn record_probe(probe: &str, classification: &str) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.probe_verdicts
            .with_label_values(&[probe, classification])
            .inc();
    }
}

/// Record a finished check cycle
pub fn record_check_cycle(status: &str) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.check_cycles.with_label_values(&[status]).inc();
    }
}

/// Record a stored status change
pub fn record_transition(status: &str) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.transitions.with_label_values(&[status]).inc();
    }
}

/// Record a notification delivery attempt
pub fn record_notification(delivered: bool) {
    if let Some(m) = MONITOR_METRICS.get() {
        let result = if delivered { "delivered" } else { "failed" };
        m.notifications.with_label_values(&[result]).inc();
    }
}

/// Update the number of live timers
pub fn set_scheduled_targets(count: usize) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.scheduled_targets.set(count as f64);
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a check-cycle timer
pub fn start_check_timer() -> MetricsTimer {
    match MONITOR_METRICS.get() {
        Some(m) => MetricsTimer {
            timer: Some(m.check_duration.start_timer()),
        },
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
