//! Per-thread applet scheduler
//!
//! Owns everything an applet touches: the appctx pool, the task table and
//! run queue, the shared buffer pool and its wait list. A scheduler is bound
//! to the thread that created it (it is `!Send`), which is what lets appctx
//! state go without locks. The only state shared with other threads is the
//! live-applet counter and the remote wakeup inbox.
//!
//! The lifecycle operations live in `lifecycle.rs` and the dispatch
//! trampoline in `dispatch.rs`; both are `impl Scheduler` blocks.

use std::marker::PhantomData;
use std::sync::Arc;

use applet_core::{kdebug, kinfo, kwarn};
use applet_core::{AppctxState, AppletResult, Clock, Pool, TaskState, WakeReason};
use crossbeam_queue::SegQueue;

use crate::appctx::{Appctx, AppctxId};
use crate::buffer::{Buffer, BufferPool};
use crate::clock::MonotonicClock;
use crate::config::AppletConfig;
use crate::counter::{AppletCounter, NB_APPLETS};
use crate::dispatch::TaskDirective;
use crate::remote::{Inbox, RemoteWaker};
use crate::task::{Task, TaskId, TaskTable};
use crate::tls;
use crate::watchdog::Watchdog;

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Handler and finalization runs
    pub dispatched: u64,
    /// Wakeups issued on appctx tasks, remote ones included
    pub wakeups: u64,
    /// Appctx created
    pub created: u64,
    /// Appctx freed directly by `destroy_appctx`
    pub finalized_now: u64,
    /// Appctx freed by the trampoline after a deferred destroy
    pub finalized_deferred: u64,
    /// Runs flagged by the watchdog
    pub livelocks: u64,
}

/// Single-thread applet scheduler
pub struct Scheduler {
    pub(crate) config: AppletConfig,
    pub(crate) tasks: TaskTable,
    pub(crate) appctxs: Pool<Appctx>,
    pub(crate) buffers: BufferPool,
    pub(crate) counter: &'static AppletCounter,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) watchdog: Watchdog,
    inbox: Inbox,
    thread: u32,
    pub(crate) stats: SchedStats,
    /// Appctx and tasks are bound to the creating thread
    _not_send: PhantomData<*const ()>,
}

impl Scheduler {
    /// Create a scheduler bound to the calling thread
    pub fn new(config: AppletConfig) -> AppletResult<Self> {
        config.validate()?;

        let thread = tls::thread_id();
        kdebug!(
            "scheduler on thread {} (tid {}): {} appctx, {} tasks, {}x{} buffers",
            thread,
            tls::os_thread_id(),
            config.appctx_pool_size,
            config.task_pool_size,
            config.buffer_count,
            config.buffer_size
        );

        Ok(Self {
            tasks: TaskTable::new(config.task_pool_size, thread),
            appctxs: Pool::new(config.appctx_pool_size),
            buffers: BufferPool::new(config.buffer_count, config.buffer_size),
            counter: &NB_APPLETS,
            clock: Box::new(MonotonicClock::new()),
            watchdog: Watchdog::from_config(&config),
            inbox: Arc::new(SegQueue::new()),
            thread,
            stats: SchedStats::default(),
            _not_send: PhantomData,
            config,
        })
    }

    /// Use another tick source
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Account live applets in `counter` instead of the process-wide one
    ///
    /// Ignored once an appctx exists, since its finalization must decrement
    /// the counter its creation incremented.
    pub fn with_counter(mut self, counter: &'static AppletCounter) -> Self {
        let live = self.appctxs.allocated_count();
        if live > 0 {
            kwarn!("counter switch ignored, {} appctx already live", live);
            return self;
        }
        self.counter = counter;
        self
    }

    #[inline]
    pub fn config(&self) -> &AppletConfig {
        &self.config
    }

    #[inline]
    pub fn thread(&self) -> u32 {
        self.thread
    }

    #[inline]
    pub fn appctx(&self, id: AppctxId) -> Option<&Appctx> {
        self.appctxs.get(id)
    }

    #[inline]
    pub fn appctx_mut(&mut self, id: AppctxId) -> Option<&mut Appctx> {
        self.appctxs.get_mut(id)
    }

    /// Lifecycle tag; `Free` for handles that no longer resolve
    pub fn appctx_state(&self, id: AppctxId) -> AppctxState {
        self.appctxs.get(id).map_or(AppctxState::Free, Appctx::state)
    }

    #[inline]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Scheduling flags of the task bound to `id`
    pub fn task_state(&self, id: AppctxId) -> Option<TaskState> {
        let ctx = self.appctxs.get(id)?;
        self.tasks.state(ctx.task())
    }

    #[inline]
    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    #[inline]
    pub fn stats(&self) -> SchedStats {
        self.stats
    }

    /// Appctx allocated on this scheduler, pending-destroy ones included
    #[inline]
    pub fn live_appctx(&self) -> u32 {
        self.appctxs.allocated_count()
    }

    #[inline]
    pub fn counter(&self) -> &'static AppletCounter {
        self.counter
    }

    /// Handle other threads can use to wake appctx of this scheduler
    pub fn remote_waker(&self) -> RemoteWaker {
        RemoteWaker::new(Arc::clone(&self.inbox), self.thread)
    }

    /// Return a buffer to the shared pool and offer it to waiters
    pub fn release_buffer(&mut self, buf: Buffer) {
        self.buffers.release(buf);
        self.offer_buffers();
    }

    /// Run one scheduling pass
    ///
    /// Remote wakeups are applied first, then every task queued at that point
    /// is dispatched once. Tasks queued during the pass wait for the next one.
    /// Returns the number of tasks dispatched.
    pub fn run_once(&mut self) -> usize {
        self.drain_inbox();

        let batch = self.tasks.queued_len();
        let mut ran = 0;
        for _ in 0..batch {
            let Some((task, woken)) = self.tasks.pop_runnable() else {
                break;
            };
            self.run_task(task, woken);
            self.offer_buffers();
            ran += 1;
        }
        ran
    }

    /// Run passes until nothing is runnable or `max_passes` is reached
    ///
    /// Returns the number of passes that dispatched something.
    pub fn run_until_idle(&mut self, max_passes: usize) -> usize {
        let mut passes = 0;
        while passes < max_passes {
            if self.run_once() == 0 && self.inbox.is_empty() {
                break;
            }
            passes += 1;
        }
        passes
    }

    /// Nothing queued locally or remotely
    pub fn is_idle(&self) -> bool {
        self.tasks.queued_len() == 0 && self.inbox.is_empty()
    }

    fn drain_inbox(&mut self) {
        while let Some(id) = self.inbox.pop() {
            let Some(ctx) = self.appctxs.get(id) else {
                continue;
            };
            if self.tasks.wakeup(ctx.task(), WakeReason::Message) {
                self.stats.wakeups += 1;
            }
        }
    }

    /// Dispatch one task and apply the resulting directive
    fn run_task(&mut self, task: TaskId, mut woken: TaskState) {
        tls::set_current_task(task);

        let mut inline_runs = 0;
        loop {
            let directive = self.process(task, woken);
            self.stats.dispatched += 1;

            match directive {
                TaskDirective::Continue if inline_runs < self.config.max_continue => {
                    inline_runs += 1;
                    woken = self.tasks.take_woken(task);
                    continue;
                }
                TaskDirective::Continue | TaskDirective::Requeue => {
                    self.tasks.wakeup(task, WakeReason::Other);
                    self.tasks.finish_run(task);
                }
                TaskDirective::Sleep => self.tasks.finish_run(task),
                TaskDirective::Terminated => {}
            }
            break;
        }

        tls::clear_current_task();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let live = self.appctxs.handles();
        if !live.is_empty() {
            kinfo!(
                "scheduler on thread {} dropping {} live appctx",
                self.thread,
                live.len()
            );
        }
        for id in live {
            self.finalize(id, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applet::{Applet, AppletCx, AppletStatus};
    use crate::clock::ManualClock;

    /// Returns the status encoded in `st1` and counts runs in `st0`
    struct Scripted;

    impl Applet for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn handle(&self, appctx: &mut Appctx, _cx: &mut AppletCx<'_>) -> AppletStatus {
            appctx.sub_state.st0 += 1;
            match appctx.sub_state.st1 {
                1 => AppletStatus::Continue,
                2 => AppletStatus::Yield,
                3 => AppletStatus::Close,
                _ => AppletStatus::Wait,
            }
        }
    }

    static SCRIPTED: Scripted = Scripted;

    fn sched(counter: &'static AppletCounter) -> Scheduler {
        Scheduler::new(AppletConfig::new().appctx_pool_size(16).task_pool_size(16))
            .unwrap()
            .with_clock(ManualClock::new(0))
            .with_counter(counter)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Scheduler::new(AppletConfig::new().task_pool_size(0)).err();
        assert!(matches!(err, Some(applet_core::AppletError::InvalidConfig(_))));
    }

    #[test]
    fn test_wait_sleeps_until_woken() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let mut s = sched(&COUNTER);
        let id = s.create_appctx(Some(&SCRIPTED)).unwrap();

        assert_eq!(s.run_once(), 0);
        s.wakeup_appctx(id);
        s.wakeup_appctx(id);
        assert_eq!(s.run_once(), 1);
        assert_eq!(s.appctx(id).unwrap().sub_state.st0, 1);
        assert_eq!(s.task_state(id), Some(TaskState::SLEEPING));
        assert!(s.is_idle());
    }

    #[test]
    fn test_continue_runs_inline_then_requeues() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let mut s = sched(&COUNTER);
        let id = s.create_appctx(Some(&SCRIPTED)).unwrap();
        s.appctx_mut(id).unwrap().sub_state.st1 = 1;
        let max = s.config().max_continue as i32;

        s.wakeup_appctx(id);
        assert_eq!(s.run_once(), 1);
        assert_eq!(s.appctx(id).unwrap().sub_state.st0, max + 1);
        assert!(s.task_state(id).unwrap().contains(TaskState::QUEUED));
    }

    #[test]
    fn test_yield_requeues_for_next_pass() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let mut s = sched(&COUNTER);
        let id = s.create_appctx(Some(&SCRIPTED)).unwrap();
        s.appctx_mut(id).unwrap().sub_state.st1 = 2;

        s.wakeup_appctx(id);
        assert_eq!(s.run_once(), 1);
        assert_eq!(s.run_once(), 1);
        assert_eq!(s.appctx(id).unwrap().sub_state.st0, 2);

        s.appctx_mut(id).unwrap().sub_state.st1 = 0;
        assert_eq!(s.run_until_idle(10), 1);
        assert!(s.is_idle());
    }

    #[test]
    fn test_remote_wakeup() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let mut s = sched(&COUNTER);
        let id = s.create_appctx(Some(&SCRIPTED)).unwrap();
        let waker = s.remote_waker();
        assert_eq!(waker.thread(), s.thread());

        std::thread::spawn(move || waker.wake(id)).join().unwrap();
        assert!(!s.is_idle());
        assert_eq!(s.run_once(), 1);
        assert_eq!(s.appctx(id).unwrap().sub_state.st0, 1);
        assert_eq!(s.stats().wakeups, 1);
    }

    #[test]
    fn test_remote_wakeup_of_destroyed_appctx_is_ignored() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let mut s = sched(&COUNTER);
        let id = s.create_appctx(Some(&SCRIPTED)).unwrap();
        let waker = s.remote_waker();
        s.destroy_appctx(id);

        waker.wake(id);
        assert_eq!(s.run_once(), 0);
        assert!(s.is_idle());
    }

    #[test]
    fn test_drop_finalizes_live_appctx() {
        static COUNTER: AppletCounter = AppletCounter::new();
        {
            let mut s = sched(&COUNTER);
            let a = s.create_appctx(Some(&SCRIPTED)).unwrap();
            s.create_appctx(None).unwrap();
            s.wakeup_appctx(a);
            assert_eq!(COUNTER.get(), 2);
        }
        assert_eq!(COUNTER.get(), 0);
    }

    #[test]
    fn test_counter_switch_after_create_is_ignored() {
        static COUNTER: AppletCounter = AppletCounter::new();
        static OTHER: AppletCounter = AppletCounter::new();
        let mut s = sched(&COUNTER);
        let id = s.create_appctx(None).unwrap();

        let mut s = s.with_counter(&OTHER);
        assert!(std::ptr::eq(s.counter(), &COUNTER));

        s.destroy_appctx(id);
        assert_eq!(COUNTER.get(), 0);
        assert_eq!(OTHER.get(), 0);

        let s = s.with_counter(&OTHER);
        assert!(std::ptr::eq(s.counter(), &OTHER));
    }
}
