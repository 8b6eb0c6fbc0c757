//! Tasks and the per-thread run queue
//!
//! A task is the schedulable unit behind an appctx. It never leaves the
//! thread that created it: the table that owns it belongs to a single
//! scheduler, and schedulers are not `Send`.
//!
//! Wakeups coalesce. Waking a queued task only records the reason; waking a
//! running task records the reason and the task is queued again when its
//! run finishes.

use applet_core::{Handle, Pool, TaskState, WakeReason};
use std::collections::VecDeque;

use crate::appctx::AppctxId;

pub type TaskId = Handle<Task>;

/// Dispatch entry point of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskEntry {
    /// No entry point bound; dispatching does nothing
    #[default]
    Idle,
    /// Drive the bound appctx through the applet trampoline
    Applet,
}

/// A schedulable unit
#[derive(Debug, Default)]
pub struct Task {
    state: TaskState,
    entry: TaskEntry,
    /// Owner looked up when the task is dispatched
    context: Option<AppctxId>,
    /// Thread the task was created on
    thread: u32,
    /// Number of times the task was dispatched
    calls: u32,
    /// Number of wakeups issued on the task
    wakeups: u32,
}

impl Task {
    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    #[inline]
    pub fn entry(&self) -> TaskEntry {
        self.entry
    }

    #[inline]
    pub fn context(&self) -> Option<AppctxId> {
        self.context
    }

    #[inline]
    pub fn thread(&self) -> u32 {
        self.thread
    }

    #[inline]
    pub fn calls(&self) -> u32 {
        self.calls
    }

    #[inline]
    pub fn wakeups(&self) -> u32 {
        self.wakeups
    }
}

/// Tasks of one thread plus its FIFO run queue
pub struct TaskTable {
    tasks: Pool<Task>,
    run_queue: VecDeque<TaskId>,
    thread: u32,
}

impl TaskTable {
    pub fn new(capacity: usize, thread: u32) -> Self {
        Self {
            tasks: Pool::new(capacity),
            run_queue: VecDeque::with_capacity(capacity.min(1024)),
            thread,
        }
    }

    /// Create a sleeping task pinned to this table's thread
    ///
    /// Returns `None` when the task pool is exhausted.
    pub fn create_here(&mut self, entry: TaskEntry, context: Option<AppctxId>) -> Option<TaskId> {
        let (id, task) = self.tasks.allocate()?;
        *task = Task {
            state: TaskState::SLEEPING,
            entry,
            context,
            thread: self.thread,
            calls: 0,
            wakeups: 0,
        };
        Some(id)
    }

    /// Destroy a task
    ///
    /// A stale queue entry may remain; `pop_runnable` skips it.
    pub fn destroy(&mut self, id: TaskId) -> bool {
        self.tasks.release(id)
    }

    /// Issue a wakeup; returns false if the task no longer exists
    pub fn wakeup(&mut self, id: TaskId, reason: WakeReason) -> bool {
        let Some(task) = self.tasks.get_mut(id) else {
            return false;
        };
        task.wakeups = task.wakeups.wrapping_add(1);
        task.state.insert(reason.as_state());
        if !task.state.is_active() {
            task.state.insert(TaskState::QUEUED);
            self.run_queue.push_back(id);
        }
        true
    }

    /// Dequeue the next live task and mark it running
    ///
    /// Returns the task and the wake reasons accumulated since its last run.
    pub fn pop_runnable(&mut self) -> Option<(TaskId, TaskState)> {
        while let Some(id) = self.run_queue.pop_front() {
            let Some(task) = self.tasks.get_mut(id) else {
                continue;
            };
            task.state.remove(TaskState::QUEUED);
            let woken = task.state.take(TaskState::WOKEN_ANY);
            task.state.insert(TaskState::RUNNING);
            task.calls = task.calls.wrapping_add(1);
            return Some((id, woken));
        }
        None
    }

    /// Consume wake reasons recorded while the task was running
    pub fn take_woken(&mut self, id: TaskId) -> TaskState {
        self.tasks
            .get_mut(id)
            .map_or(TaskState::SLEEPING, |t| t.state.take(TaskState::WOKEN_ANY))
    }

    /// End a run; a task woken while running goes back to the queue
    pub fn finish_run(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(id) else {
            return;
        };
        task.state.remove(TaskState::RUNNING);
        if task.state.intersects(TaskState::WOKEN_ANY) {
            task.state.insert(TaskState::QUEUED);
            self.run_queue.push_back(id);
        }
    }

    #[inline]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Scheduling flags of a task, `None` if it no longer exists
    #[inline]
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(id).map(|t| t.state)
    }

    /// Entries in the run queue (stale ones included)
    #[inline]
    pub fn queued_len(&self) -> usize {
        self.run_queue.len()
    }

    #[inline]
    pub fn live_count(&self) -> u32 {
        self.tasks.allocated_count()
    }

    #[inline]
    pub fn thread(&self) -> u32 {
        self.thread
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self, id: TaskId) -> Option<&mut TaskState> {
        self.tasks.get_mut(id).map(|t| &mut t.state)
    }
}
