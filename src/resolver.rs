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
//! Thread identity resolution and owned thread handles
//!
//! The table never looks up threads itself; it goes through a
//! [`ThreadResolver`] so the discovery mechanism stays a collaborator.
//! [`ProcessRegistry`] is the in-process default used by embedders and tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::task_prop::{TaskProp, classify};

/// Process/thread identifier.
pub type Pid = i32;

/// Deadline property level written on insertion into the table, making the
/// underlying scheduler treat the thread specially.
pub const DEADLINE_LEVEL_CRITICAL: u32 = 3;

/// Scheduler-visible state for one managed thread.
///
/// The property bits are written both by the table and by direct control
/// callers, so they sit behind their own lock, independent of the table's.
/// The published affinity and deadline level are plain scheduler-read fields.
#[derive(Debug)]
pub struct ThreadRecord {
    pid: Pid,
    prop: Mutex<u64>,
    affinity_cpu: AtomicI32,
    deadline_level: AtomicU32,
}

impl ThreadRecord {
    /// Creates a record for `pid` with no tags, no affinity, no deadline.
    #[must_use]
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            prop: Mutex::new(0),
            affinity_cpu: AtomicI32::new(-1),
            deadline_level: AtomicU32::new(0),
        }
    }

    /// Returns the thread identifier.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Sets and clears property bits in one guarded step.
    pub fn update_prop(&self, set: u64, clear: u64) {
        let mut prop = self.prop.lock();
        *prop = (*prop & !clear) | set;
    }

    /// Returns the current property bits.
    #[must_use]
    pub fn prop_bits(&self) -> u64 {
        *self.prop.lock()
    }

    /// Classifies the thread from its current property bits.
    #[must_use]
    pub fn kind(&self) -> TaskProp {
        classify(self.prop_bits())
    }

    /// Returns the preferred core published for this thread, `-1` if none.
    #[inline]
    #[must_use]
    pub fn affinity_cpu(&self) -> i32 {
        self.affinity_cpu.load(Ordering::Relaxed)
    }

    /// Publishes the preferred core for this thread.
    #[inline]
    pub fn set_affinity_cpu(&self, cpu: i32) {
        self.affinity_cpu.store(cpu, Ordering::Relaxed);
    }

    /// Returns the deadline property level.
    #[inline]
    #[must_use]
    pub fn deadline_level(&self) -> u32 {
        self.deadline_level.load(Ordering::Relaxed)
    }

    /// Sets the deadline property level.
    #[inline]
    pub fn set_deadline_level(&self, level: u32) {
        self.deadline_level.store(level, Ordering::Relaxed);
    }
}

/// Resolves a pid to its thread object, if it still exists.
///
/// Called under the table's guarded lookup path; implementations must not
/// block for long.
pub trait ThreadResolver: Send + Sync {
    /// Returns a strong handle to the thread, or `None` when the pid is gone.
    fn resolve(&self, pid: Pid) -> Option<Arc<ThreadRecord>>;
}

/// In-process pid registry, the default [`ThreadResolver`].
///
/// Embedders register a thread when it starts and unregister it on exit;
/// the table's strong handles keep records alive across unregistration.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    threads: DashMap<Pid, Arc<ThreadRecord>>,
}

impl ProcessRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pid`, returning its record; re-registering returns the
    /// existing record unchanged.
    pub fn register(&self, pid: Pid) -> Arc<ThreadRecord> {
        self.threads
            .entry(pid)
            .or_insert_with(|| Arc::new(ThreadRecord::new(pid)))
            .clone()
    }

    /// Removes `pid` from the registry. Returns whether it was present.
    pub fn unregister(&self, pid: Pid) -> bool {
        self.threads.remove(&pid).is_some()
    }

    /// Number of registered threads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

impl ThreadResolver for ProcessRegistry {
    fn resolve(&self, pid: Pid) -> Option<Arc<ThreadRecord>> {
        self.threads.get(&pid).map(|r| r.clone())
    }
}
