#![forbid(unsafe_code)]
#![allow(clippy::significant_drop_tightening)] /* writer guard spans mutate-then-reassign */

/*
 *     ______   __     __   __
 *    /\  == \ /\ \   /\ "-.\ \
 *    \ \  _-/ \ \ \  \ \ \-.  \
 *     \ \_\    \ \_\  \ \_\\"\_\
 *      \/_/     \/_/   \/_/ \/_/
 *
 * Author: Colin MacRitchie / Ripple Group
 */
//! The assist-layer context object and its control surface
//!
//! [`PinManager`] owns the critical-thread table, the preferred-core list,
//! and the flag propagator, and exposes every operation the control plane
//! issues. Mutations hold the table's writer lock across the full
//! mutate-then-reassign sequence, so a caller observes its own write as soon
//! as the call returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::hooks::HookRegistry;
use crate::isolation::{CoreFlags, FlagPropagator, IsolationKind, IsolationUpdate, MaskSnapshot};
use crate::metrics::PinMetrics;
use crate::resolver::{DEADLINE_LEVEL_CRITICAL, Pid, ThreadResolver};
use crate::select_list::{DEFAULT_SELECT_CPU_LIST, MAX_CORES, NO_CORE, SelectCpuList};
use crate::task_prop::{REGISTERED_BIT, TaskProp};
use crate::thread_table::{PRIORITY_LEVELS, ThreadTable};

#[cfg(feature = "tracing")]
use tracing::debug;

/// Assist-layer configuration.
#[derive(Debug, Clone)]
pub struct PinConfig {
    /// Initial preferred-core order, most-preferred first.
    pub select_cpu_list: [i32; MAX_CORES],

    /// Deadline property level written on a thread when it enters the table.
    pub deadline_level: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            select_cpu_list: DEFAULT_SELECT_CPU_LIST,
            deadline_level: DEADLINE_LEVEL_CRITICAL,
        }
    }
}

/// One row of the status listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStatus {
    /// Thread identifier.
    pub pid: Pid,
    /// Stored (clamped) priority.
    pub priority: i32,
    /// Assigned core, `-1` when unassigned.
    pub assigned_cpu: i32,
}

/// Snapshot of the active critical threads.
#[derive(Debug, Clone, Default)]
pub struct TableStatus {
    /// Occupied rows in slot order.
    pub threads: Vec<ThreadStatus>,
    /// Pid of the designated heavy task, if any.
    pub heavy_pid: Option<Pid>,
}

/// Batch payload validation failure; rejected before any mutation.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The flat pair payload was empty or odd-length.
    #[error("batch payload must be a non-empty list of (pid, priority) pairs, got {len} values")]
    MalformedPayload {
        /// Number of values received.
        len: usize,
    },
}

/// The process-wide assist context: critical-thread table, preferred-core
/// list, isolation propagator, and configuration knobs.
///
/// Constructed once at subsystem start; every operation takes `&self` and
/// completes synchronously without long blocking.
pub struct PinManager {
    table: RwLock<ThreadTable>,
    select_list: SelectCpuList,
    propagator: FlagPropagator,
    resolver: Arc<dyn ThreadResolver>,
    hooks: HookRegistry,
    metrics: PinMetrics,
    debug_level: AtomicU32,
    preempt_policy: AtomicU32,
    deadline_level: u32,
}

impl PinManager {
    /// Creates a manager with the default configuration.
    #[must_use]
    pub fn new(resolver: Arc<dyn ThreadResolver>) -> Self {
        Self::with_config(resolver, PinConfig::default())
    }

    /// Creates a manager with an explicit configuration.
    #[must_use]
    pub fn with_config(resolver: Arc<dyn ThreadResolver>, config: PinConfig) -> Self {
        Self {
            table: RwLock::new(ThreadTable::new()),
            select_list: SelectCpuList::new(config.select_cpu_list),
            propagator: FlagPropagator::new(),
            resolver,
            hooks: HookRegistry::new(),
            metrics: PinMetrics::new(),
            debug_level: AtomicU32::new(0),
            preempt_policy: AtomicU32::new(0),
            deadline_level: config.deadline_level,
        }
    }

    /* ---- critical-thread table operations ---- */

    /// Adds `pid` as a critical thread, or updates its priority in place.
    ///
    /// Returns whether anything changed. A full table or an unresolvable pid
    /// is a silent no-op; the thread keeps default scheduling.
    pub fn upsert_critical_thread(&self, pid: Pid, priority: i32) -> bool {
        let mut table = self.table.write();
        let changed = self.add_locked(&mut table, pid, priority);
        if changed {
            self.reassign_locked(&mut table);
        }
        changed
    }

    /// Removes `pid` from the table, releasing its thread reference.
    ///
    /// Returns whether a row was found.
    pub fn remove_critical_thread(&self, pid: Pid) -> bool {
        let mut table = self.table.write();
        if !table.remove(pid) {
            return false;
        }
        self.metrics.record_removal();

        #[cfg(feature = "tracing")]
        debug!(pid, "critical thread removed");

        self.reassign_locked(&mut table);
        true
    }

    /// Removes every row and resets the aggregate selected-cpu mask.
    pub fn clear_critical_threads(&self) {
        let mut table = self.table.write();
        table.clear();
        self.metrics.update_occupied_rows(0);
        self.propagator.publish_select_mask(0);

        #[cfg(feature = "tracing")]
        debug!("critical-thread table cleared");
    }

    /// Applies a batched update from a flat `(pid, priority)` pair payload.
    ///
    /// An all-negative first pair clears the table. Otherwise removals
    /// (negative priority) run before adds/updates, so a freed slot can be
    /// reused within the same batch; one reassignment pass runs at the end
    /// iff any row changed. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// [`BatchError::MalformedPayload`] for an empty or odd-length payload,
    /// rejected before any mutation.
    pub fn batch_set_critical_threads(&self, data: &[i64]) -> Result<bool, BatchError> {
        if data.is_empty() || data.len() % 2 != 0 {
            self.metrics.record_batch_rejected();
            return Err(BatchError::MalformedPayload { len: data.len() });
        }

        if data[0] < 0 && data[1] < 0 {
            self.clear_critical_threads();
            return Ok(true);
        }

        let mut table = self.table.write();
        let mut changed = false;

        for pair in data.chunks_exact(2) {
            if pair[1] >= 0 {
                continue;
            }
            if table.remove(pair[0] as Pid) {
                self.metrics.record_removal();
                changed = true;
            }
        }
        for pair in data.chunks_exact(2) {
            if pair[1] < 0 {
                continue;
            }
            if self.add_locked(&mut table, pair[0] as Pid, pair[1] as i32) {
                changed = true;
            }
        }

        if changed {
            self.reassign_locked(&mut table);
        }
        Ok(changed)
    }

    /// Designates `pid`'s row as the heavy task and re-runs assignment so the
    /// transient boost takes effect. Returns whether the pid was found.
    pub fn set_heavy_task(&self, pid: Pid) -> bool {
        let mut table = self.table.write();
        let Some(index) = table.index_of(pid) else {
            return false;
        };
        table.set_heavy(index);
        self.reassign_locked(&mut table);
        true
    }

    /// Lists the active critical threads and the heavy-task pid.
    #[must_use]
    pub fn status(&self) -> TableStatus {
        let table = self.table.read();
        TableStatus {
            threads: table
                .iter()
                .map(|(_, e)| ThreadStatus {
                    pid: e.pid(),
                    priority: e.priority(),
                    assigned_cpu: e.assigned_cpu(),
                })
                .collect(),
            heavy_pid: table.heavy_pid(),
        }
    }

    /* ---- preferred-core list ---- */

    /// Replaces the preferred-core list and re-runs assignment.
    ///
    /// Input beyond [`MAX_CORES`] entries is silently truncated.
    pub fn set_select_cpu_list(&self, cores: &[i32]) {
        self.select_list.rewrite(cores);
        let mut table = self.table.write();
        self.reassign_locked(&mut table);
    }

    /// Copies out the current preferred-core order.
    #[must_use]
    pub fn select_cpu_list(&self) -> [i32; MAX_CORES] {
        self.select_list.snapshot()
    }

    /* ---- isolation ---- */

    /// Writes one isolation set. Returns whether the stored mask changed.
    ///
    /// A pipeline change re-runs assignment (selected cores may gain or lose
    /// the isolate tag); the other sets republish the per-core flags
    /// directly. The notification sink fires once per effective change.
    pub fn set_isolation(&self, kind: IsolationKind, cpus: u32) -> bool {
        match self.propagator.set_isolation(kind, cpus) {
            IsolationUpdate::Unchanged => return false,
            IsolationUpdate::NeedsReassign => {
                let mut table = self.table.write();
                self.reassign_locked(&mut table);
            }
            IsolationUpdate::Published => {}
        }
        self.metrics.record_isolation_change();
        self.hooks.on_isolation_change(kind, cpus);
        true
    }

    /// Writes all three isolation sets, pipeline first (the heavier path),
    /// then weak, then strict.
    pub fn set_isolation_masks(&self, pipeline: u32, weak: u32, strict: u32) {
        self.set_isolation(IsolationKind::Pipeline, pipeline);
        self.set_isolation(IsolationKind::Weak, weak);
        self.set_isolation(IsolationKind::Strict, strict);
    }

    /// Reads a core's published flags.
    #[must_use]
    pub fn core_flags(&self, cpu: usize) -> Option<CoreFlags> {
        self.propagator.core_flags(cpu)
    }

    /// Idle-governor read path: whether `cpu` is pipeline-selected and may
    /// keep its shallow-idle timeout.
    #[must_use]
    pub fn idle_timeout_allowed(&self, cpu: usize) -> bool {
        self.propagator.pipeline_selected(cpu)
    }

    /// Aggregate selected-cpu mask from the last reassignment pass.
    #[must_use]
    pub fn select_mask(&self) -> u32 {
        self.propagator.select_mask()
    }

    /// Stored mask of one isolation set.
    #[must_use]
    pub fn isolation_mask(&self, kind: IsolationKind) -> u32 {
        self.propagator.isolation_mask(kind)
    }

    /// Full aggregate mask state, for the status surface.
    #[must_use]
    pub fn mask_snapshot(&self) -> MaskSnapshot {
        self.propagator.snapshot()
    }

    /// Number of per-core flag publish passes so far.
    #[must_use]
    pub fn publish_count(&self) -> u64 {
        self.propagator.publish_count()
    }

    /* ---- thread properties ---- */

    /// Sets a property tag on an arbitrary thread, outside the table path.
    ///
    /// Returns whether the pid resolved.
    pub fn set_thread_prop(&self, pid: Pid, prop: TaskProp) -> bool {
        match self.resolver.resolve(pid) {
            Some(record) => {
                record.update_prop(prop.bit(), 0);
                true
            }
            None => false,
        }
    }

    /// Clears a property tag on an arbitrary thread.
    ///
    /// Returns whether the pid resolved.
    pub fn unset_thread_prop(&self, pid: Pid, prop: TaskProp) -> bool {
        match self.resolver.resolve(pid) {
            Some(record) => {
                record.update_prop(0, prop.bit());
                true
            }
            None => false,
        }
    }

    /* ---- configuration knobs ---- */

    /// Sets the debug verbosity; negative values clamp to zero.
    pub fn set_debug_level(&self, level: i32) {
        self.debug_level.store(level.max(0) as u32, Ordering::Relaxed);
    }

    /// Current debug verbosity.
    #[must_use]
    pub fn debug_level(&self) -> u32 {
        self.debug_level.load(Ordering::Relaxed)
    }

    /// Sets the preemption policy selector; negative values clamp to zero.
    pub fn set_preempt_policy(&self, policy: i32) {
        self.preempt_policy
            .store(policy.max(0) as u32, Ordering::Relaxed);
    }

    /// Current preemption policy selector.
    #[must_use]
    pub fn preempt_policy(&self) -> u32 {
        self.preempt_policy.load(Ordering::Relaxed)
    }

    /// The notification-sink registry.
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The assist-layer counters.
    #[must_use]
    pub fn metrics(&self) -> &PinMetrics {
        &self.metrics
    }

    /* ---- internals ---- */

    /// Add/update under the table's writer lock. Any change drops the
    /// heavy-task designation.
    fn add_locked(&self, table: &mut ThreadTable, pid: Pid, priority: i32) -> bool {
        if let Some(index) = table.index_of(pid) {
            if !table.update_priority(index, priority) {
                return false;
            }
            self.metrics.record_upsert();
            table.clear_heavy();
            return true;
        }

        if table.is_full() {
            self.metrics.record_capacity_exhausted();
            return false;
        }
        let Some(record) = self.resolver.resolve(pid) else {
            self.metrics.record_resolve_failure();
            return false;
        };

        record.set_deadline_level(self.deadline_level);
        record.update_prop(REGISTERED_BIT, 0);
        table.insert(pid, priority, record);
        self.metrics.record_upsert();
        table.clear_heavy();

        #[cfg(feature = "tracing")]
        debug!(pid, priority, "critical thread added");

        true
    }

    /// The reassignment pass.
    ///
    /// Each priority level's running count starts at the number of strictly
    /// more urgent occupied rows; levels draw from the one preferred-core
    /// list in that shared rank order, ties broken by slot index. The heavy
    /// task ranks one level up for this pass only. Rank slots are offset by
    /// one so a boosted level-0 row stays in bounds.
    fn reassign_locked(&self, table: &mut ThreadTable) {
        let cores = self.select_list.snapshot();
        let pipeline_mask = self.propagator.isolation_mask(IsolationKind::Pipeline);

        let occupied: Vec<usize> = table.iter().map(|(i, _)| i).collect();

        let mut ranks = [0usize; PRIORITY_LEVELS + 2];
        for &index in &occupied {
            ranks[(table.effective_priority(index) + 2) as usize] += 1;
        }
        for i in 2..ranks.len() {
            ranks[i] += ranks[i - 1];
        }

        let mut select_mask = 0u32;
        for index in occupied {
            let slot = (table.effective_priority(index) + 1) as usize;
            let mut cpu = if ranks[slot] < MAX_CORES {
                let cpu = cores[ranks[slot]];
                ranks[slot] += 1;
                cpu
            } else {
                NO_CORE
            };
            // An out-of-range list entry leaves the row unassigned, same as
            // the sentinel.
            if !(0..MAX_CORES as i32).contains(&cpu) {
                cpu = NO_CORE;
            }

            let Some(entry) = table.entry_mut(index) else {
                continue;
            };
            entry.set_assigned_cpu(cpu);
            let record = entry.record();
            record.set_affinity_cpu(cpu);

            if cpu >= 0 {
                let isolated = pipeline_mask & (1 << cpu) != 0;
                let set = if isolated {
                    TaskProp::Pipeline.bit() | TaskProp::Isolate.bit()
                } else {
                    TaskProp::Pipeline.bit()
                };
                let clear = if isolated { 0 } else { TaskProp::Isolate.bit() };
                record.update_prop(set, clear);
                select_mask |= 1 << cpu;
            } else {
                record.update_prop(0, TaskProp::Pipeline.bit() | TaskProp::Isolate.bit());
            }
        }

        self.propagator.publish_select_mask(select_mask);
        self.metrics.record_reassign_pass();
        self.metrics.update_occupied_rows(table.len());

        #[cfg(feature = "tracing")]
        debug!(select_mask, "reassignment pass complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ProcessRegistry;
    use crate::task_prop::has_prop;
    use crate::thread_table::MAX_CRITICAL_THREADS;

    fn setup(pids: &[Pid]) -> (Arc<ProcessRegistry>, PinManager) {
        let registry = Arc::new(ProcessRegistry::new());
        for &pid in pids {
            registry.register(pid);
        }
        let manager = PinManager::new(registry.clone() as Arc<dyn ThreadResolver>);
        (registry, manager)
    }

    fn assigned_cpu(manager: &PinManager, pid: Pid) -> i32 {
        manager
            .status()
            .threads
            .iter()
            .find(|t| t.pid == pid)
            .map(|t| t.assigned_cpu)
            .unwrap_or(i32::MIN)
    }

    #[test]
    fn test_exact_assignment_order() {
        let (_registry, manager) = setup(&[10, 11, 12]);
        manager.set_select_cpu_list(&[7, 4, 3, 2, 6, 5, -1, -1]);

        assert!(manager.upsert_critical_thread(10, 0));
        assert!(manager.upsert_critical_thread(11, 0));
        assert!(manager.upsert_critical_thread(12, 1));

        // Priority 0 draws ranks 0 and 1 (slot order breaks the tie);
        // priority 1 starts at its prefix offset of 2.
        assert_eq!(assigned_cpu(&manager, 10), 7);
        assert_eq!(assigned_cpu(&manager, 11), 4);
        assert_eq!(assigned_cpu(&manager, 12), 3);
        assert_eq!(manager.select_mask(), (1 << 7) | (1 << 4) | (1 << 3));
    }

    #[test]
    fn test_overflowing_rows_fall_back_to_default_scheduling() {
        let (registry, manager) = setup(&[1, 2, 3]);
        manager.set_select_cpu_list(&[7, 4]);

        for pid in 1..=3 {
            manager.upsert_critical_thread(pid, 0);
        }

        assert_eq!(assigned_cpu(&manager, 1), 7);
        assert_eq!(assigned_cpu(&manager, 2), 4);
        assert_eq!(assigned_cpu(&manager, 3), -1);

        let third = registry.resolve(3).unwrap();
        assert!(!has_prop(third.prop_bits(), TaskProp::Pipeline));
        assert_eq!(third.affinity_cpu(), -1);
    }

    #[test]
    fn test_upsert_existing_pid_updates_in_place() {
        let (_registry, manager) = setup(&[10]);
        assert!(manager.upsert_critical_thread(10, 2));
        assert!(!manager.upsert_critical_thread(10, 2));
        assert!(manager.upsert_critical_thread(10, 4));

        let status = manager.status();
        assert_eq!(status.threads.len(), 1);
        assert_eq!(status.threads[0].priority, 4);
    }

    #[test]
    fn test_priority_clamped_into_range() {
        let (_registry, manager) = setup(&[10]);
        manager.upsert_critical_thread(10, 100);
        assert_eq!(manager.status().threads[0].priority, 8);
        // The clamped duplicate is not a change.
        assert!(!manager.upsert_critical_thread(10, 50));
    }

    #[test]
    fn test_remove_unknown_pid() {
        let (_registry, manager) = setup(&[10]);
        manager.upsert_critical_thread(10, 0);
        assert!(!manager.remove_critical_thread(11));
        assert_eq!(manager.status().threads.len(), 1);
    }

    #[test]
    fn test_capacity_exhausted_add_is_silent() {
        let pids: Vec<Pid> = (1..=9).collect();
        let (_registry, manager) = setup(&pids);
        for pid in 1..=MAX_CRITICAL_THREADS as Pid {
            assert!(manager.upsert_critical_thread(pid, 0));
        }

        let before = manager.status();
        assert!(!manager.upsert_critical_thread(9, 0));
        let after = manager.status();

        assert_eq!(before.threads, after.threads);
        assert_eq!(manager.metrics().snapshot().capacity_exhausted, 1);
    }

    #[test]
    fn test_unresolvable_pid_is_a_no_op() {
        let (_registry, manager) = setup(&[]);
        assert!(!manager.upsert_critical_thread(77, 0));
        assert!(manager.status().threads.is_empty());
        assert_eq!(manager.metrics().snapshot().resolve_failures, 1);
    }

    #[test]
    fn test_remove_releases_reference() {
        let (registry, manager) = setup(&[10]);
        let record = registry.resolve(10).unwrap();

        manager.upsert_critical_thread(10, 0);
        assert_eq!(Arc::strong_count(&record), 3); // registry + table + local

        manager.remove_critical_thread(10);
        assert_eq!(Arc::strong_count(&record), 2); // registry + local
        assert_eq!(record.prop_bits(), 0);
        assert_eq!(record.affinity_cpu(), -1);
    }

    #[test]
    fn test_clear_resets_select_mask_and_flags() {
        let (_registry, manager) = setup(&[10, 11]);
        manager.upsert_critical_thread(10, 0);
        manager.upsert_critical_thread(11, 0);
        assert_ne!(manager.select_mask(), 0);

        manager.clear_critical_threads();
        assert!(manager.status().threads.is_empty());
        assert_eq!(manager.select_mask(), 0);
        for cpu in 0..MAX_CORES {
            assert!(!manager.core_flags(cpu).unwrap().pipeline_selected);
        }
    }

    #[test]
    fn test_batch_sentinel_pair_clears() {
        let (_registry, manager) = setup(&[10, 11]);
        manager.upsert_critical_thread(10, 0);
        manager.upsert_critical_thread(11, 1);

        assert!(manager.batch_set_critical_threads(&[-1, -1]).unwrap());
        assert!(manager.status().threads.is_empty());
        assert_eq!(manager.select_mask(), 0);
    }

    #[test]
    fn test_batch_removals_run_before_adds() {
        let pids: Vec<Pid> = (1..=9).collect();
        let (_registry, manager) = setup(&pids);
        for pid in 1..=MAX_CRITICAL_THREADS as Pid {
            manager.upsert_critical_thread(pid, 0);
        }

        // Full table: pid 9 only fits because pid 1's removal frees a slot
        // within the same batch, even though the add pair comes first.
        let changed = manager
            .batch_set_critical_threads(&[9, 3, 1, -1])
            .unwrap();
        assert!(changed);

        let status = manager.status();
        assert_eq!(status.threads.len(), MAX_CRITICAL_THREADS);
        assert!(status.threads.iter().any(|t| t.pid == 9));
        assert!(!status.threads.iter().any(|t| t.pid == 1));
    }

    #[test]
    fn test_batch_runs_one_reassign_pass() {
        let (_registry, manager) = setup(&[1, 2, 3]);
        let before = manager.metrics().snapshot().reassign_passes;
        manager
            .batch_set_critical_threads(&[1, 0, 2, 0, 3, 1])
            .unwrap();
        assert_eq!(manager.metrics().snapshot().reassign_passes, before + 1);
    }

    #[test]
    fn test_malformed_batch_rejected_before_mutation() {
        let (_registry, manager) = setup(&[10]);
        manager.upsert_critical_thread(10, 0);

        assert!(manager.batch_set_critical_threads(&[]).is_err());
        assert!(manager.batch_set_critical_threads(&[10, 0, 11]).is_err());

        assert_eq!(manager.status().threads.len(), 1);
        assert_eq!(manager.metrics().snapshot().batches_rejected, 2);
    }

    #[test]
    fn test_batch_with_no_effective_change() {
        let (_registry, manager) = setup(&[10]);
        manager.upsert_critical_thread(10, 3);
        let passes = manager.metrics().snapshot().reassign_passes;

        // Same priority again and a removal of an unknown pid: no change,
        // no reassignment.
        let changed = manager
            .batch_set_critical_threads(&[10, 3, 99, -1])
            .unwrap();
        assert!(!changed);
        assert_eq!(manager.metrics().snapshot().reassign_passes, passes);
    }

    #[test]
    fn test_heavy_task_boost_reorders_within_level() {
        let (_registry, manager) = setup(&[10, 11]);
        manager.set_select_cpu_list(&[7, 4]);
        manager.upsert_critical_thread(10, 2);
        manager.upsert_critical_thread(11, 2);
        assert_eq!(assigned_cpu(&manager, 10), 7);
        assert_eq!(assigned_cpu(&manager, 11), 4);

        // Boosting the later slot ranks it ahead of its equal-priority peer.
        assert!(manager.set_heavy_task(11));
        assert_eq!(assigned_cpu(&manager, 11), 7);
        assert_eq!(assigned_cpu(&manager, 10), 4);
        assert_eq!(manager.status().heavy_pid, Some(11));
    }

    #[test]
    fn test_heavy_boost_at_most_urgent_priority() {
        let (_registry, manager) = setup(&[10, 11]);
        manager.set_select_cpu_list(&[7, 4]);
        manager.upsert_critical_thread(10, 0);
        manager.upsert_critical_thread(11, 0);

        // A boosted level-0 row ranks below level 0 without pushing peers
        // out of bounds.
        assert!(manager.set_heavy_task(11));
        assert_eq!(assigned_cpu(&manager, 11), 7);
        assert_eq!(assigned_cpu(&manager, 10), 4);
    }

    #[test]
    fn test_upsert_invalidates_heavy_designation() {
        let (_registry, manager) = setup(&[10, 11]);
        manager.upsert_critical_thread(10, 2);
        manager.set_heavy_task(10);
        assert_eq!(manager.status().heavy_pid, Some(10));

        manager.upsert_critical_thread(11, 2);
        assert_eq!(manager.status().heavy_pid, None);
    }

    #[test]
    fn test_set_heavy_task_unknown_pid() {
        let (_registry, manager) = setup(&[]);
        assert!(!manager.set_heavy_task(42));
    }

    #[test]
    fn test_pipeline_isolation_tags_selected_threads() {
        let (registry, manager) = setup(&[10, 11]);
        manager.set_select_cpu_list(&[7, 4]);
        manager.set_isolation(IsolationKind::Pipeline, 1 << 7);

        manager.upsert_critical_thread(10, 0);
        manager.upsert_critical_thread(11, 0);

        let first = registry.resolve(10).unwrap();
        let second = registry.resolve(11).unwrap();
        assert!(has_prop(first.prop_bits(), TaskProp::Pipeline));
        assert!(has_prop(first.prop_bits(), TaskProp::Isolate));
        assert!(has_prop(second.prop_bits(), TaskProp::Pipeline));
        assert!(!has_prop(second.prop_bits(), TaskProp::Isolate));

        // Shrinking the set re-runs assignment and drops the stale tag.
        manager.set_isolation(IsolationKind::Pipeline, 0);
        assert!(!has_prop(first.prop_bits(), TaskProp::Isolate));
    }

    #[test]
    fn test_unchanged_isolation_write_is_a_no_op() {
        let (_registry, manager) = setup(&[10]);
        manager.upsert_critical_thread(10, 0);
        manager.set_isolation(IsolationKind::Strict, 0b11);

        let passes = manager.metrics().snapshot().reassign_passes;
        let changes = manager.metrics().snapshot().isolation_changes;
        let publishes = manager.publish_count();

        assert!(!manager.set_isolation(IsolationKind::Strict, 0b11));
        assert!(!manager.set_isolation(IsolationKind::Pipeline, 0));

        let snap = manager.metrics().snapshot();
        assert_eq!(snap.reassign_passes, passes);
        assert_eq!(snap.isolation_changes, changes);
        assert_eq!(manager.publish_count(), publishes);
    }

    #[test]
    fn test_combined_isolation_write_order() {
        let (_registry, manager) = setup(&[10]);
        manager.set_select_cpu_list(&[7]);
        manager.upsert_critical_thread(10, 0);

        manager.set_isolation_masks(1 << 7, 1 << 1, 1 << 0);
        let snap = manager.mask_snapshot();
        assert_eq!(snap.pipeline, 1 << 7);
        assert_eq!(snap.weak, 1 << 1);
        assert_eq!(snap.strict, 1 << 0);
        assert_eq!(snap.exclusive, (1 << 7) | (1 << 0));
        assert_eq!(snap.period_disallow, (1 << 7) | (1 << 1) | (1 << 0));
    }

    #[test]
    fn test_select_list_rewrite_reassigns() {
        let (_registry, manager) = setup(&[10]);
        manager.upsert_critical_thread(10, 0);
        assert_eq!(assigned_cpu(&manager, 10), 7);

        manager.set_select_cpu_list(&[2, 3]);
        assert_eq!(assigned_cpu(&manager, 10), 2);
        assert_eq!(manager.select_mask(), 1 << 2);
    }

    #[test]
    fn test_idle_timeout_follows_selection() {
        let (_registry, manager) = setup(&[10]);
        manager.set_select_cpu_list(&[5]);
        manager.upsert_critical_thread(10, 0);

        assert!(manager.idle_timeout_allowed(5));
        assert!(!manager.idle_timeout_allowed(4));

        manager.remove_critical_thread(10);
        assert!(!manager.idle_timeout_allowed(5));
    }

    #[test]
    fn test_direct_prop_set_and_unset() {
        let (registry, manager) = setup(&[10]);
        assert!(manager.set_thread_prop(10, TaskProp::TransientAndCritical));
        let record = registry.resolve(10).unwrap();
        assert_eq!(record.kind(), TaskProp::TransientAndCritical);

        assert!(manager.unset_thread_prop(10, TaskProp::TransientAndCritical));
        assert_eq!(record.kind(), TaskProp::Common);

        assert!(!manager.set_thread_prop(99, TaskProp::Common));
    }

    #[test]
    fn test_deadline_level_written_on_insertion() {
        let (registry, manager) = setup(&[10]);
        manager.upsert_critical_thread(10, 0);
        assert_eq!(
            registry.resolve(10).unwrap().deadline_level(),
            DEADLINE_LEVEL_CRITICAL
        );
    }

    #[test]
    fn test_config_knobs_clamp_at_zero() {
        let (_registry, manager) = setup(&[]);
        manager.set_debug_level(-3);
        assert_eq!(manager.debug_level(), 0);
        manager.set_debug_level(2);
        assert_eq!(manager.debug_level(), 2);

        manager.set_preempt_policy(-1);
        assert_eq!(manager.preempt_policy(), 0);
        manager.set_preempt_policy(1);
        assert_eq!(manager.preempt_policy(), 1);
    }
}
