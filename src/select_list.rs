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
/* Preferred-core list, most-preferred first */

use parking_lot::RwLock;

/// Maximum number of addressable cores.
pub const MAX_CORES: usize = 8;

/// Sentinel marking the end of the preferred cores.
pub const NO_CORE: i32 = -1;

/// Default preferred-core order, tuned for a big-core-first topology.
pub const DEFAULT_SELECT_CPU_LIST: [i32; MAX_CORES] = [7, 4, 3, 2, 6, 5, NO_CORE, NO_CORE];

/// Ordered list of preferred core indices, terminated by [`NO_CORE`].
///
/// Has its own reader/writer lock, independent of the table's; the
/// reassignment pass takes the read side only while copying the cores out.
#[derive(Debug)]
pub struct SelectCpuList {
    cores: RwLock<[i32; MAX_CORES]>,
}

impl SelectCpuList {
    /// Creates a list with the given initial order.
    #[must_use]
    pub fn new(cores: [i32; MAX_CORES]) -> Self {
        Self {
            cores: RwLock::new(cores),
        }
    }

    /// Replaces the whole list.
    ///
    /// Input beyond [`MAX_CORES`] entries is silently truncated; the tail is
    /// sentinel-filled. Rewriting invalidates all current assignments, so the
    /// caller must run a reassignment pass afterwards.
    pub fn rewrite(&self, cores: &[i32]) {
        let len = cores.len().min(MAX_CORES);
        let mut guard = self.cores.write();
        guard[..len].copy_from_slice(&cores[..len]);
        for slot in guard[len..].iter_mut() {
            *slot = NO_CORE;
        }
    }

    /// Copies the current order out under the read lock.
    #[must_use]
    pub fn snapshot(&self) -> [i32; MAX_CORES] {
        *self.cores.read()
    }

    /// Number of leading entries before the first sentinel.
    #[must_use]
    pub fn preferred_len(&self) -> usize {
        self.cores
            .read()
            .iter()
            .position(|&c| c < 0)
            .unwrap_or(MAX_CORES)
    }
}

impl Default for SelectCpuList {
    fn default() -> Self {
        Self::new(DEFAULT_SELECT_CPU_LIST)
    }
}
