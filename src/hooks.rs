#![forbid(unsafe_code)]
#![allow(clippy::inline_always)] /* Dispatch sits on scheduler paths */

/*
 *     ______   __     __   __
 *    /\  == \ /\ \   /\ "-.\ \
 *    \ \  _-/ \ \ \  \ \ \-.  \
 *     \ \_\    \ \_\  \ \_\\"\_\
 *      \/_/     \/_/   \/_/ \/_/
 *
 * Author: Colin MacRitchie / Ripple Group
 */

/* Notification sink for isolation changes */

use std::sync::Arc;

use parking_lot::RwLock;

use crate::isolation::IsolationKind;

/// Observer interface for isolation-mask changes.
///
/// Fired once per effective isolation-type change, fire-and-forget;
/// implementations must never block.
pub trait IsolationHooks: Send + Sync {
    /// Called after an isolation set actually changed.
    fn on_isolation_change(&self, kind: IsolationKind, cpus: u32);
}

/// Null implementation of [`IsolationHooks`] for when tracing is disabled.
#[derive(Debug, Default)]
pub struct NullHooks;

impl IsolationHooks for NullHooks {
    #[inline(always)]
    fn on_isolation_change(&self, _kind: IsolationKind, _cpus: u32) {
        // No-op
    }
}

/* Hook registry using RwLock for safe concurrent access */
pub struct HookRegistry {
    hooks: Arc<RwLock<Option<Arc<dyn IsolationHooks>>>>,
}

impl HookRegistry {
    /* Create new registry */
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: Arc::new(RwLock::new(None)),
        }
    }

    /* Install hooks */
    pub fn set_hooks(&self, hooks: Arc<dyn IsolationHooks>) -> Option<Arc<dyn IsolationHooks>> {
        self.hooks.write().replace(hooks)
    }

    /* Remove hooks */
    pub fn clear_hooks(&self) -> Option<Arc<dyn IsolationHooks>> {
        self.hooks.write().take()
    }

    /* Isolation-change dispatch */
    #[inline(always)]
    pub fn on_isolation_change(&self, kind: IsolationKind, cpus: u32) {
        if let Some(hooks) = self.hooks.read().as_ref() {
            hooks.on_isolation_change(kind, cpus);
        }
    }

    /* Check if hooks installed */
    #[inline]
    pub fn has_hooks(&self) -> bool {
        self.hooks.read().is_some()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
