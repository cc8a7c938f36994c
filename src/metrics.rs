/*
 *     ______   __     __   __
 *    /\  == \ /\ \   /\ "-.\ \
 *    \ \  _-/ \ \ \  \ \ \-.  \
 *     \ \_\    \ \_\  \ \_\\"\_\
 *      \/_/     \/_/   \/_/ \/_/
 *
 * Author: Colin MacRitchie / Ripple Group
 */
//! Counters for the assist layer's silent degradation paths
//!
//! Capacity exhaustion, failed pid resolution, and rejected batches all
//! degrade to "no change" on the control surface; these counters make them
//! observable.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

#[cfg(feature = "tracing")]
use tracing::warn;

/// Counter registry for the assist layer.
#[derive(Debug, Default)]
pub struct PinMetrics {
    /// Rows inserted or updated through the table.
    pub upserts: AtomicU64,

    /// Rows removed from the table.
    pub removals: AtomicU64,

    /// Adds dropped because every slot was occupied.
    pub capacity_exhausted: AtomicU64,

    /// Adds dropped because the pid no longer resolved to a thread.
    pub resolve_failures: AtomicU64,

    /// Full reassignment passes executed.
    pub reassign_passes: AtomicU64,

    /// Effective isolation-set changes.
    pub isolation_changes: AtomicU64,

    /// Batches rejected before any mutation.
    pub batches_rejected: AtomicU64,
}

impl PinMetrics {
    /// Creates a zeroed registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful add or in-place priority update.
    pub fn record_upsert(&self) {
        self.upserts.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("pin_upserts_total").increment(1);
    }

    /// Records a row removal.
    pub fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("pin_removals_total").increment(1);
    }

    /// Records an add dropped on a full table.
    pub fn record_capacity_exhausted(&self) {
        self.capacity_exhausted.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        warn!("critical-thread table full, add dropped");

        #[cfg(feature = "metrics")]
        counter!("pin_capacity_exhausted_total").increment(1);
    }

    /// Records an add dropped because the pid did not resolve.
    pub fn record_resolve_failure(&self) {
        self.resolve_failures.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("pin_resolve_failures_total").increment(1);
    }

    /// Records a completed reassignment pass.
    pub fn record_reassign_pass(&self) {
        self.reassign_passes.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("pin_reassign_passes_total").increment(1);
    }

    /// Records an effective isolation-set change.
    pub fn record_isolation_change(&self) {
        self.isolation_changes.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("pin_isolation_changes_total").increment(1);
    }

    /// Records a batch rejected by validation.
    pub fn record_batch_rejected(&self) {
        self.batches_rejected.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("pin_batches_rejected_total").increment(1);
    }

    /// Updates the occupied-row gauge.
    pub fn update_occupied_rows(&self, count: usize) {
        #[cfg(feature = "metrics")]
        gauge!("pin_occupied_rows").set(count as f64);

        #[cfg(not(feature = "metrics"))]
        let _ = count;
    }

    /// Copies out the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            upserts: self.upserts.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            capacity_exhausted: self.capacity_exhausted.load(Ordering::Relaxed),
            resolve_failures: self.resolve_failures.load(Ordering::Relaxed),
            reassign_passes: self.reassign_passes.load(Ordering::Relaxed),
            isolation_changes: self.isolation_changes.load(Ordering::Relaxed),
            batches_rejected: self.batches_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of the assist-layer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total rows inserted or updated.
    pub upserts: u64,
    /// Total rows removed.
    pub removals: u64,
    /// Total adds dropped on a full table.
    pub capacity_exhausted: u64,
    /// Total adds dropped on failed resolution.
    pub resolve_failures: u64,
    /// Total reassignment passes.
    pub reassign_passes: u64,
    /// Total effective isolation changes.
    pub isolation_changes: u64,
    /// Total rejected batches.
    pub batches_rejected: u64,
}
