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
/* Fixed-capacity critical-thread table */

use std::sync::Arc;

use crate::resolver::{Pid, ThreadRecord};
use crate::task_prop::PROP_BITS_MASK;

/// Maximum number of critical-thread rows.
pub const MAX_CRITICAL_THREADS: usize = 8;

/// Most urgent acceptable priority.
pub const URGENT_PRIORITY: i32 = 0;

/// Least urgent acceptable priority.
pub const LOW_PRIORITY: i32 = 8;

/// Number of discrete priority levels (`URGENT_PRIORITY..=LOW_PRIORITY`).
pub const PRIORITY_LEVELS: usize = (LOW_PRIORITY - URGENT_PRIORITY + 1) as usize;

/// Clamps a requested priority into the accepted range.
#[inline]
#[must_use]
pub fn clamp_priority(priority: i32) -> i32 {
    priority.clamp(URGENT_PRIORITY, LOW_PRIORITY)
}

/// One occupied row of the critical-thread table.
///
/// The row owns the only table-side strong handle to the thread record;
/// dropping the row is the release, so it happens exactly once on every
/// removal path.
#[derive(Debug)]
pub struct CriticalThreadEntry {
    pid: Pid,
    priority: i32,
    assigned_cpu: i32,
    handle: Arc<ThreadRecord>,
}

impl CriticalThreadEntry {
    /// Returns the row's thread identifier.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Returns the row's clamped priority (smaller = more urgent).
    #[inline]
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the assigned core index, `-1` when unassigned.
    #[inline]
    #[must_use]
    pub fn assigned_cpu(&self) -> i32 {
        self.assigned_cpu
    }

    /// Returns the owned thread record handle.
    #[inline]
    #[must_use]
    pub fn record(&self) -> &Arc<ThreadRecord> {
        &self.handle
    }

    pub(crate) fn set_assigned_cpu(&mut self, cpu: i32) {
        self.assigned_cpu = cpu;
    }
}

/// Fixed arena of critical-thread rows with a heavy-task designation.
///
/// Slot indices are stable for a row's lifetime; ties between equal-priority
/// rows are broken by slot index during reassignment, lowest slot first.
#[derive(Debug, Default)]
pub struct ThreadTable {
    slots: [Option<CriticalThreadEntry>; MAX_CRITICAL_THREADS],
    heavy: Option<usize>,
}

impl ThreadTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot index holding `pid`, if occupied.
    #[must_use]
    pub fn index_of(&self, pid: Pid) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.pid == pid))
    }

    /// Returns the occupied row at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&CriticalThreadEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut CriticalThreadEntry> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Number of occupied rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no row is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Whether every slot is occupied.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Iterates occupied rows in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &CriticalThreadEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (i, e)))
    }

    /// Updates the priority of the row at `index` in place.
    ///
    /// Returns whether the clamped priority differed from the stored one.
    pub fn update_priority(&mut self, index: usize, priority: i32) -> bool {
        let priority = clamp_priority(priority);
        match self.entry_mut(index) {
            Some(entry) if entry.priority != priority => {
                entry.priority = priority;
                true
            }
            _ => false,
        }
    }

    /// Inserts a new row into the first free slot.
    ///
    /// Returns the slot index, or `None` when the table is full. The handle
    /// becomes the row's owned reference; `assigned_cpu` starts unassigned.
    pub fn insert(&mut self, pid: Pid, priority: i32, handle: Arc<ThreadRecord>) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(CriticalThreadEntry {
            pid,
            priority: clamp_priority(priority),
            assigned_cpu: -1,
            handle,
        });
        Some(index)
    }

    /// Removes the row holding `pid`, releasing its thread reference.
    ///
    /// Clears the record's property bits and published affinity before the
    /// handle drops. Removing the heavy-task row clears the designation.
    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.index_of(pid) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    /// Removes every occupied row, with the same per-row release as
    /// [`ThreadTable::remove`].
    pub fn clear(&mut self) {
        for index in 0..MAX_CRITICAL_THREADS {
            self.remove_at(index);
        }
    }

    fn remove_at(&mut self, index: usize) {
        if let Some(entry) = self.slots[index].take() {
            entry.handle.update_prop(0, PROP_BITS_MASK);
            entry.handle.set_affinity_cpu(-1);
            if self.heavy == Some(index) {
                self.heavy = None;
            }
        }
    }

    /// Designates the row at `index` as the heavy task.
    pub fn set_heavy(&mut self, index: usize) {
        if self.entry(index).is_some() {
            self.heavy = Some(index);
        }
    }

    /// Drops the heavy-task designation.
    pub fn clear_heavy(&mut self) {
        self.heavy = None;
    }

    /// Returns the heavy-task slot index, if designated.
    #[must_use]
    pub fn heavy_index(&self) -> Option<usize> {
        self.heavy
    }

    /// Returns the heavy-task pid, if designated.
    #[must_use]
    pub fn heavy_pid(&self) -> Option<Pid> {
        self.heavy.and_then(|i| self.entry(i)).map(|e| e.pid)
    }

    /// Priority of the row at `index` with the transient heavy boost applied.
    ///
    /// The boosted value may be one below [`URGENT_PRIORITY`]; it is used
    /// only for rank computation during a reassignment pass.
    #[must_use]
    pub fn effective_priority(&self, index: usize) -> i32 {
        let Some(entry) = self.entry(index) else {
            return LOW_PRIORITY;
        };
        if self.heavy == Some(index) {
            entry.priority - 1
        } else {
            entry.priority
        }
    }
}
