//! Thread-local scheduler context
//!
//! Every thread that owns a scheduler gets a small sequential id. Tasks
//! record the id of the thread that created them, and the dispatcher records
//! which task it is currently running.

use applet_core::Handle;
use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::task::TaskId;

const UNASSIGNED: u32 = u32::MAX;

static NEXT_THREAD_ID: AtomicU32 = AtomicU32::new(0);

thread_local! {
    /// Sequential id of this OS thread (assigned lazily)
    static THREAD_ID: Cell<u32> = const { Cell::new(UNASSIGNED) };

    /// Task being dispatched on this thread, as (index, generation)
    static CURRENT_TASK: Cell<(u32, u32)> = const { Cell::new((u32::MAX, 0)) };
}

/// Sequential id of the calling thread
#[inline]
pub fn thread_id() -> u32 {
    THREAD_ID.with(|cell| {
        let id = cell.get();
        if id != UNASSIGNED {
            return id;
        }
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        cell.set(id);
        id
    })
}

/// Kernel thread id, for log lines that need to match external tools
pub fn os_thread_id() -> u64 {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            // Safety: gettid takes no arguments and cannot fail
            unsafe { libc::syscall(libc::SYS_gettid) as u64 }
        } else if #[cfg(unix)] {
            // Safety: pthread_self is always valid on the calling thread
            unsafe { libc::pthread_self() as u64 }
        } else {
            thread_id() as u64
        }
    }
}

/// Record the task being dispatched
#[inline]
pub fn set_current_task(id: TaskId) {
    CURRENT_TASK.with(|cell| cell.set((id.index(), id.generation())));
}

/// Clear the current task (dispatcher between runs)
#[inline]
pub fn clear_current_task() {
    CURRENT_TASK.with(|cell| cell.set((u32::MAX, 0)));
}

/// Task currently being dispatched on this thread, if any
#[inline]
pub fn current_task() -> Option<TaskId> {
    let (index, generation) = CURRENT_TASK.with(|cell| cell.get());
    Handle::new(index, generation).to_option()
}

/// Check if we're inside an applet handler
#[inline]
pub fn in_dispatch() -> bool {
    current_task().is_some()
}
