//! Sched-Pin: CPU-Affinity Assist for Latency-Critical Thread Groups
//!
//! This library keeps a small group of latency-critical threads pinned to
//! the best available CPU cores and publishes per-core isolation flags the
//! surrounding scheduler consults on its hot paths.
//!
//! # Features
//!
//! - **Critical-Thread Table**: Fixed-capacity registry with priority-ranked
//!   core assignment and a transient heavy-task boost
//! - **Preferred-Core List**: Runtime-rewritable core order shared by every
//!   priority level
//! - **Isolation Propagation**: Strict/pipeline/weak isolation sets folded
//!   into per-core flags, each behind its own lock
//! - **Batched Updates**: Flat pair payloads applied with one reassignment
//!   pass and one continuous writer hold
//!
//! # Concurrency
//!
//! - Every operation takes `&self`; one [`PinManager`] serves the process
//! - A mutation's full effect is visible when its call returns
//! - Per-core flag reads never touch the aggregate mask lock
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sched_pin::{PinManager, ProcessRegistry, ThreadResolver};
//!
//! let registry = Arc::new(ProcessRegistry::new());
//! registry.register(42);
//!
//! let manager = PinManager::new(registry as Arc<dyn ThreadResolver>);
//! assert!(manager.upsert_critical_thread(42, 0));
//!
//! // The most urgent row takes the most preferred core.
//! let status = manager.status();
//! assert_eq!(status.threads[0].assigned_cpu, 7);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod hooks;
pub mod isolation;
pub mod manager;
pub mod metrics;
pub mod resolver;
pub mod select_list;
pub mod task_prop;
pub mod thread_table;

// Re-export commonly used types
pub use hooks::{HookRegistry, IsolationHooks, NullHooks};
pub use isolation::{CoreFlags, FlagPropagator, IsolationKind, MaskSnapshot};
pub use manager::{BatchError, PinConfig, PinManager, TableStatus, ThreadStatus};
pub use metrics::{MetricsSnapshot, PinMetrics};
pub use resolver::{Pid, ProcessRegistry, ThreadRecord, ThreadResolver};
pub use select_list::{DEFAULT_SELECT_CPU_LIST, MAX_CORES, NO_CORE, SelectCpuList};
pub use task_prop::TaskProp;
pub use thread_table::{MAX_CRITICAL_THREADS, ThreadTable};
