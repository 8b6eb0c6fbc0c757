//! Task and appctx state types

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// Scheduling state bitmask of a task
///
/// The low bits describe where the task is (queued, running); the `WOKEN_*`
/// bits accumulate the reasons it was woken since its last run.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct TaskState(u16);

impl TaskState {
    /// Not queued, not running
    pub const SLEEPING: TaskState = TaskState(0);
    /// Task is in its thread's run queue
    pub const QUEUED: TaskState = TaskState(0x0001);
    /// Task is being dispatched right now
    pub const RUNNING: TaskState = TaskState(0x0002);

    /// Woken because a resource (buffer) became available
    pub const WOKEN_RES: TaskState = TaskState(0x0100);
    /// Woken by a message from another thread
    pub const WOKEN_MSG: TaskState = TaskState(0x0200);
    /// Woken for any other reason
    pub const WOKEN_OTHER: TaskState = TaskState(0x0400);

    pub const WOKEN_ANY: TaskState = TaskState(0x0700);

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: TaskState) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: TaskState) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, other: TaskState) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: TaskState) {
        self.0 &= !other.0;
    }

    /// Remove and return the bits in `mask`
    #[inline]
    pub fn take(&mut self, mask: TaskState) -> TaskState {
        let taken = TaskState(self.0 & mask.0);
        self.remove(mask);
        taken
    }

    /// Check if the scheduler may still touch this task
    #[inline]
    pub const fn is_active(self) -> bool {
        self.intersects(TaskState(Self::QUEUED.0 | Self::RUNNING.0))
    }
}

impl BitOr for TaskState {
    type Output = TaskState;

    fn bitor(self, rhs: TaskState) -> TaskState {
        TaskState(self.0 | rhs.0)
    }
}

impl BitOrAssign for TaskState {
    fn bitor_assign(&mut self, rhs: TaskState) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(TaskState, &str); 5] = [
            (TaskState::QUEUED, "QUEUED"),
            (TaskState::RUNNING, "RUNNING"),
            (TaskState::WOKEN_RES, "WOKEN_RES"),
            (TaskState::WOKEN_MSG, "WOKEN_MSG"),
            (TaskState::WOKEN_OTHER, "WOKEN_OTHER"),
        ];
        if self.is_empty() {
            return write!(f, "SLEEPING");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Why a task is being woken up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A shared resource became available
    Resource,
    /// Another thread asked for it
    Message,
    /// Lifecycle or application request
    Other,
}

impl WakeReason {
    #[inline]
    pub const fn as_state(self) -> TaskState {
        match self {
            WakeReason::Resource => TaskState::WOKEN_RES,
            WakeReason::Message => TaskState::WOKEN_MSG,
            WakeReason::Other => TaskState::WOKEN_OTHER,
        }
    }
}

/// Appctx flag bitmask
///
/// Only `PENDING_DESTROY` belongs to the lifecycle manager. The remaining
/// bits are free for applet implementations, which can set and clear them
/// through the masked helpers without ever touching the lifecycle bit.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct AppctxFlags(u32);

impl AppctxFlags {
    pub const EMPTY: AppctxFlags = AppctxFlags(0);
    /// Teardown requested while the task was queued or running
    pub const PENDING_DESTROY: AppctxFlags = AppctxFlags(0x0000_0001);
    /// Bits applets may use for their own purposes
    pub const APPLET_MASK: u32 = !Self::PENDING_DESTROY.0;

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        AppctxFlags(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: AppctxFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: AppctxFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: AppctxFlags) {
        self.0 &= !other.0;
    }

    /// Applet-owned bits only
    #[inline]
    pub const fn applet_bits(self) -> u32 {
        self.0 & Self::APPLET_MASK
    }
}

impl fmt::Debug for AppctxFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppctxFlags({:#x})", self.0)
    }
}

/// Lifecycle tag of an appctx slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AppctxState {
    /// Slot not allocated (or handle is stale)
    Free = 0,
    /// Fully created, not marked for teardown
    Live = 1,
    /// Marked for teardown, waiting for its task to be dispatched
    PendingDestroy = 2,
}

impl AppctxState {
    /// Check if the object may still be inspected through its handle
    #[inline]
    pub const fn is_allocated(&self) -> bool {
        matches!(self, AppctxState::Live | AppctxState::PendingDestroy)
    }
}

impl fmt::Display for AppctxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppctxState::Free => write!(f, "FREE"),
            AppctxState::Live => write!(f, "LIVE"),
            AppctxState::PendingDestroy => write!(f, "PENDING_DESTROY"),
        }
    }
}

/// Discriminator for objects the server passes around polymorphically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ObjType {
    /// Slot never tagged
    #[default]
    None = 0,
    /// Applet context
    Appctx = 1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_bits() {
        let mut s = TaskState::SLEEPING;
        assert!(!s.is_active());

        s.insert(TaskState::QUEUED);
        assert!(s.is_active());
        s.insert(WakeReason::Resource.as_state() | WakeReason::Other.as_state());

        let woken = s.take(TaskState::WOKEN_ANY);
        assert!(woken.contains(TaskState::WOKEN_RES));
        assert!(woken.contains(TaskState::WOKEN_OTHER));
        assert!(!woken.contains(TaskState::WOKEN_MSG));
        assert_eq!(s, TaskState::QUEUED);
    }

    #[test]
    fn test_task_state_debug() {
        assert_eq!(format!("{:?}", TaskState::SLEEPING), "SLEEPING");
        assert_eq!(
            format!("{:?}", TaskState::RUNNING | TaskState::WOKEN_RES),
            "RUNNING|WOKEN_RES"
        );
    }

    #[test]
    fn test_appctx_flags_mask() {
        let mut f = AppctxFlags::EMPTY;
        f.insert(AppctxFlags::PENDING_DESTROY);
        f.insert(AppctxFlags::from_bits(0x10));
        assert!(f.contains(AppctxFlags::PENDING_DESTROY));
        assert_eq!(f.applet_bits(), 0x10);
    }

    #[test]
    fn test_appctx_state() {
        assert!(!AppctxState::Free.is_allocated());
        assert!(AppctxState::Live.is_allocated());
        assert!(AppctxState::PendingDestroy.is_allocated());
        assert_eq!(format!("{}", AppctxState::PendingDestroy), "PENDING_DESTROY");
    }
}
