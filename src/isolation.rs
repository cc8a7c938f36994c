#![forbid(unsafe_code)]

/*
 *     ______   __     __   __
 *    /\  == \ /\ \   /\ "-.\ \
 *    \ \  _-/ \ \ \  \ \ \-.  \
 *     \ \_\    \ \_\  \ \_\\"\_\
 *      \/_/     \/_/   \/_/ \/_/
 *
 * Author: Colin MacRitchie / Ripple Group
 */
//! Isolation masks and the per-core flag propagator
//!
//! Three independently configured isolation sets plus the aggregate
//! selected-cpu mask derive the authoritative per-core flags. The scheduler
//! and idle governor only ever read the published records.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::select_list::MAX_CORES;

#[cfg(feature = "tracing")]
use tracing::debug;

/// The three isolation set variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationKind {
    /// Cores excluded from all managed background work.
    Strict,
    /// Cores that become exclusive only while a critical thread selects them.
    Pipeline,
    /// Cores excluded from periodic background work only.
    Weak,
}

/// Outcome of an isolation-set write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationUpdate {
    /// The stored mask already matched; nothing was done.
    Unchanged,
    /// The pipeline set changed; the caller must run a reassignment pass,
    /// which republishes through the new select mask.
    NeedsReassign,
    /// The set changed and the per-core flags were republished directly.
    Published,
}

/// Scheduler-visible flags for one core, written only by the propagator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreFlags {
    /// The core is currently selected for a pipeline (critical) thread.
    pub pipeline_selected: bool,
    /// The core is reserved exclusively (strict, or pipeline-and-selected).
    pub exclusive: bool,
    /// Periodic background work must not run here.
    pub period_disallow: bool,
    /// Non-periodic background work must not run here.
    pub nonperiod_disallow: bool,
}

/// Aggregate mask state; the selected-cpu mask and the three isolation sets
/// share this one lock, and the derived masks are kept alongside for the
/// status surface.
#[derive(Debug, Default, Clone, Copy)]
struct MaskState {
    select: u32,
    strict: u32,
    pipeline: u32,
    weak: u32,
    exclusive: u32,
    period_disallow: u32,
    nonperiod_disallow: u32,
}

impl MaskState {
    fn recompute(&mut self) {
        let pipeline_selected = self.select & self.pipeline;
        self.exclusive = self.strict | pipeline_selected;
        self.period_disallow = self.strict | pipeline_selected | self.weak;
        self.nonperiod_disallow = self.strict | pipeline_selected;
    }
}

/// Read-only view of the aggregate masks, for the status surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskSnapshot {
    /// Aggregate selected-cpu mask from the last reassignment pass.
    pub select: u32,
    /// Strict isolation set.
    pub strict: u32,
    /// Pipeline isolation set.
    pub pipeline: u32,
    /// Weak isolation set.
    pub weak: u32,
    /// Derived exclusive mask.
    pub exclusive: u32,
    /// Derived periodic-work disallow mask.
    pub period_disallow: u32,
    /// Derived non-periodic-work disallow mask.
    pub nonperiod_disallow: u32,
}

/// Derives and publishes the per-core flags.
///
/// Each core's record sits behind its own lock; a publish pass computes the
/// masks under the aggregate lock, drops it, then updates cores one at a
/// time so no reader ever observes a half-written record and no publisher
/// stalls all cores at once.
#[derive(Debug)]
pub struct FlagPropagator {
    state: RwLock<MaskState>,
    cores: [Mutex<CoreFlags>; MAX_CORES],
    publishes: AtomicU64,
}

impl FlagPropagator {
    /// Creates a propagator with empty masks and cleared core flags.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MaskState::default()),
            cores: Default::default(),
            publishes: AtomicU64::new(0),
        }
    }

    /// Writes one isolation set.
    ///
    /// A write matching the stored mask is a no-op. A pipeline change is
    /// reported back for the caller to run a reassignment pass; the other
    /// sets republish directly.
    pub fn set_isolation(&self, kind: IsolationKind, cpus: u32) -> IsolationUpdate {
        {
            let mut state = self.state.write();
            let slot = match kind {
                IsolationKind::Strict => &mut state.strict,
                IsolationKind::Pipeline => &mut state.pipeline,
                IsolationKind::Weak => &mut state.weak,
            };
            if *slot == cpus {
                return IsolationUpdate::Unchanged;
            }
            *slot = cpus;
        }

        #[cfg(feature = "tracing")]
        debug!(?kind, cpus, "isolation set updated");

        if kind == IsolationKind::Pipeline {
            IsolationUpdate::NeedsReassign
        } else {
            self.republish();
            IsolationUpdate::Published
        }
    }

    /// Stores a new aggregate selected-cpu mask and republishes.
    pub fn publish_select_mask(&self, mask: u32) {
        self.state.write().select = mask;
        self.republish();
    }

    /// Recomputes the derived masks and publishes every core's flags.
    ///
    /// Idempotent: with no intervening state change, a second pass writes
    /// identical records.
    pub fn republish(&self) {
        let state = {
            let mut state = self.state.write();
            state.recompute();
            *state
        };

        for (cpu, slot) in self.cores.iter().enumerate() {
            let bit = 1u32 << cpu;
            let mut flags = slot.lock();
            flags.pipeline_selected = state.select & bit != 0;
            flags.exclusive = state.exclusive & bit != 0;
            flags.period_disallow = state.period_disallow & bit != 0;
            flags.nonperiod_disallow = state.nonperiod_disallow & bit != 0;
        }
        self.publishes.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        debug!(
            select = state.select,
            exclusive = state.exclusive,
            "core flags published"
        );
    }

    /// Reads a core's published flags under that core's own lock.
    #[must_use]
    pub fn core_flags(&self, cpu: usize) -> Option<CoreFlags> {
        self.cores.get(cpu).map(|slot| *slot.lock())
    }

    /// Idle-governor read path: whether the core is pipeline-selected and may
    /// keep its shallow-idle timeout.
    #[must_use]
    pub fn pipeline_selected(&self, cpu: usize) -> bool {
        self.core_flags(cpu).is_some_and(|f| f.pipeline_selected)
    }

    /// Returns one isolation set's stored mask.
    #[must_use]
    pub fn isolation_mask(&self, kind: IsolationKind) -> u32 {
        let state = self.state.read();
        match kind {
            IsolationKind::Strict => state.strict,
            IsolationKind::Pipeline => state.pipeline,
            IsolationKind::Weak => state.weak,
        }
    }

    /// Returns the aggregate selected-cpu mask.
    #[must_use]
    pub fn select_mask(&self) -> u32 {
        self.state.read().select
    }

    /// Copies out the full aggregate state.
    #[must_use]
    pub fn snapshot(&self) -> MaskSnapshot {
        let state = self.state.read();
        MaskSnapshot {
            select: state.select,
            strict: state.strict,
            pipeline: state.pipeline,
            weak: state.weak,
            exclusive: state.exclusive,
            period_disallow: state.period_disallow,
            nonperiod_disallow: state.nonperiod_disallow,
        }
    }

    /// Number of publish passes so far; lets callers verify that unchanged
    /// writes never republish.
    #[must_use]
    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::Relaxed)
    }
}

impl Default for FlagPropagator {
    fn default() -> Self {
        Self::new()
    }
}
