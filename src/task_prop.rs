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
/* Scheduler-visible property bits and task classification */

/// Number of defined property types.
pub const TASK_PROP_COUNT: usize = 10;

/// Bit position where the type bits begin; bit 0 is the registered flag.
const PROP_SHIFT: u32 = 1;

/// Property bit set on a thread when it enters the critical-thread table.
pub const REGISTERED_BIT: u64 = 1;

/// Mask covering the registered flag and every type bit.
pub const PROP_BITS_MASK: u64 = (((1u64 << TASK_PROP_COUNT) - 1) << PROP_SHIFT) | REGISTERED_BIT;

/// Scheduler-visible property types carried in a thread's tag bits.
///
/// Discriminants are the wire values used by the control surface; the gaps
/// (3..=6) are reserved levels that classify as unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TaskProp {
    /// Ordinary workload thread; also the fallback for untagged threads.
    Common = 0,
    /// Thread assigned a preferred core by the reassignment pass.
    Pipeline = 1,
    /// Debug or logging helper thread, lowest urgency.
    DebugOrLog = 2,
    /// Periodically recurring latency-critical thread.
    PeriodicAndCritical = 7,
    /// Transiently latency-critical thread, highest urgency.
    TransientAndCritical = 8,
    /// Pipeline thread whose preferred core is in the pipeline isolation set.
    Isolate = 9,
}

impl TaskProp {
    /// Returns the tag bit carried by this property type.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u64 {
        1 << (self as u32 + PROP_SHIFT)
    }
}

/// Tests whether `bits` carries the tag for `prop`.
#[inline]
#[must_use]
pub fn has_prop(bits: u64, prop: TaskProp) -> bool {
    bits & prop.bit() != 0
}

/// Converts a raw control-surface type value to its tag bits.
///
/// Values outside `0..TASK_PROP_COUNT` map to no bits; the control surface
/// treats them as a no-op rather than an error.
#[inline]
#[must_use]
pub fn prop_bits_from_raw(raw: i64) -> u64 {
    if (0..TASK_PROP_COUNT as i64).contains(&raw) {
        1 << (raw as u32 + PROP_SHIFT)
    } else {
        0
    }
}

/// Derives a thread's effective type from its tag bits.
///
/// Precedence, highest first: transient-critical, periodic-critical,
/// pipeline, common, debug-or-log. A thread with no tag bits (or with only
/// tags outside this precedence chain) classifies as common; debug-or-log
/// only wins when its tag is the sole claim on the thread.
#[must_use]
pub fn classify(bits: u64) -> TaskProp {
    if has_prop(bits, TaskProp::TransientAndCritical) {
        return TaskProp::TransientAndCritical;
    }
    if has_prop(bits, TaskProp::PeriodicAndCritical) {
        return TaskProp::PeriodicAndCritical;
    }
    if has_prop(bits, TaskProp::Pipeline) {
        return TaskProp::Pipeline;
    }
    if has_prop(bits, TaskProp::Common) || !has_prop(bits, TaskProp::DebugOrLog) {
        return TaskProp::Common;
    }
    TaskProp::DebugOrLog
}

/// Preemption urgency score for a raw property type value.
///
/// Scores, highest to lowest: transient-critical 5, periodic-critical 4,
/// pipeline/isolate 3, unclassified-other 2, common 1, debug-or-log 0.
#[must_use]
pub fn preempt_priority(raw: u32) -> u8 {
    match raw {
        x if x == TaskProp::TransientAndCritical as u32 => 5,
        x if x == TaskProp::PeriodicAndCritical as u32 => 4,
        x if x == TaskProp::Pipeline as u32 || x == TaskProp::Isolate as u32 => 3,
        x if x == TaskProp::Common as u32 => 1,
        x if x == TaskProp::DebugOrLog as u32 => 0,
        _ => 2,
    }
}

/// Compares two threads' tag bits by preemption urgency.
///
/// Returns `true` when `a` should preempt `b`.
#[inline]
#[must_use]
pub fn preempts(a_bits: u64, b_bits: u64) -> bool {
    preempt_priority(classify(a_bits) as u32) > preempt_priority(classify(b_bits) as u32)
}
