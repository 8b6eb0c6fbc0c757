//! Dispatch trampoline
//!
//! The common entry point of every applet task. It is the only place that
//! calls applet handlers and the only reader of `PENDING_DESTROY`: a flagged
//! appctx is finalized here before any handler code can see it.

use applet_core::{kerror, TaskState};

use crate::appctx::AppctxId;
use crate::applet::{AppletCx, AppletStatus};
use crate::config::LivelockPolicy;
use crate::scheduler::Scheduler;
use crate::task::{TaskEntry, TaskId};

/// What the scheduler does with a task after dispatching it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDirective {
    /// Run again right away
    Continue,
    /// Queue again behind the other runnable tasks
    Requeue,
    /// Stay idle until woken
    Sleep,
    /// The task no longer exists
    Terminated,
}

impl Scheduler {
    /// Dispatch a task through its entry point
    pub(crate) fn process(&mut self, task: TaskId, woken: TaskState) -> TaskDirective {
        let Some(t) = self.tasks.get(task) else {
            return TaskDirective::Terminated;
        };
        match (t.entry(), t.context()) {
            (TaskEntry::Applet, Some(id)) => self.run_applet(id, woken),
            _ => TaskDirective::Sleep,
        }
    }

    fn run_applet(&mut self, id: AppctxId, woken: TaskState) -> TaskDirective {
        let now = self.clock.now_ms();
        let Some(ctx) = self.appctxs.get_mut(id) else {
            return TaskDirective::Terminated;
        };

        if ctx.is_pending_destroy() {
            self.finalize(id, true);
            return TaskDirective::Terminated;
        }

        let Some(applet) = ctx.applet() else {
            return TaskDirective::Sleep;
        };

        let mut cx = AppletCx::new(id, now, woken, &mut self.buffers);
        let status = applet.handle(ctx, &mut cx);

        let calls = ctx.call_rate_mut().update(now, self.watchdog.period_ms(), 1);
        if self.watchdog.is_looping(calls, ctx.call_rate(), status) {
            self.stats.livelocks += 1;
            kerror!(
                "applet '{}' (appctx {}) looping: {} calls in {}ms (~{}/period), status {:?}",
                applet.name(),
                id,
                calls,
                self.watchdog.period_ms(),
                self.watchdog.rate(ctx.call_rate(), now),
                status
            );
            if self.watchdog.policy() == LivelockPolicy::Kill {
                self.destroy_appctx(id);
                return TaskDirective::Sleep;
            }
        }

        match status {
            AppletStatus::Continue => TaskDirective::Continue,
            AppletStatus::Yield => TaskDirective::Requeue,
            AppletStatus::Wait => TaskDirective::Sleep,
            AppletStatus::Close => {
                // Our task is running, so this only flags the appctx
                self.destroy_appctx(id);
                TaskDirective::Sleep
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appctx::Appctx;
    use crate::applet::Applet;
    use crate::buffer::WakeupKind;
    use crate::clock::ManualClock;
    use crate::config::AppletConfig;
    use crate::counter::AppletCounter;
    use crate::tls;
    use applet_core::{AppctxState, WakeReason};

    /// Closes once `st0` reaches `st1`
    struct Countdown;

    impl Applet for Countdown {
        fn name(&self) -> &'static str {
            "countdown"
        }

        fn handle(&self, appctx: &mut Appctx, cx: &mut AppletCx<'_>) -> AppletStatus {
            assert_eq!(tls::current_task(), Some(appctx.task()));
            assert_eq!(cx.id().index(), appctx.wait_entry().target().index());
            appctx.sub_state.st0 += 1;
            if appctx.sub_state.st0 >= appctx.sub_state.st1 {
                AppletStatus::Close
            } else {
                AppletStatus::Yield
            }
        }
    }

    /// Never makes progress
    struct Spinner;

    impl Applet for Spinner {
        fn name(&self) -> &'static str {
            "spinner"
        }

        fn handle(&self, _appctx: &mut Appctx, _cx: &mut AppletCx<'_>) -> AppletStatus {
            AppletStatus::Yield
        }
    }

    /// Needs a buffer on every run; counts resource wakeups in `st2`
    struct Hungry;

    impl Applet for Hungry {
        fn name(&self) -> &'static str {
            "hungry"
        }

        fn handle(&self, appctx: &mut Appctx, cx: &mut AppletCx<'_>) -> AppletStatus {
            if cx.woken_by(WakeReason::Resource) {
                appctx.sub_state.st2 += 1;
            }
            match cx.alloc_buffer(appctx) {
                Some(buf) => {
                    appctx.sub_state.st0 += 1;
                    cx.release_buffer(buf);
                    AppletStatus::Wait
                }
                None => AppletStatus::Wait,
            }
        }
    }

    static COUNTDOWN: Countdown = Countdown;
    static SPINNER: Spinner = Spinner;
    static HUNGRY: Hungry = Hungry;

    fn sched(counter: &'static AppletCounter, config: AppletConfig, clock: &ManualClock) -> Scheduler {
        Scheduler::new(config)
            .unwrap()
            .with_clock(clock.clone())
            .with_counter(counter)
    }

    #[test]
    fn test_close_is_finalized_on_next_pass() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(0);
        let mut s = sched(&COUNTER, AppletConfig::new(), &clock);
        let id = s.create_appctx(Some(&COUNTDOWN)).unwrap();
        s.appctx_mut(id).unwrap().sub_state.st1 = 3;

        s.wakeup_appctx(id);
        s.run_once();
        s.run_once();
        assert_eq!(s.appctx(id).unwrap().sub_state.st0, 2);

        // Third run closes; the appctx is only flagged during that pass
        s.run_once();
        assert_eq!(s.appctx_state(id), AppctxState::PendingDestroy);
        assert_eq!(COUNTER.get(), 1);
        assert!(!tls::in_dispatch());

        s.run_once();
        assert_eq!(s.appctx_state(id), AppctxState::Free);
        assert_eq!(COUNTER.get(), 0);
        assert_eq!(s.stats().finalized_deferred, 1);
        assert!(s.is_idle());
    }

    #[test]
    fn test_appctx_without_applet_sleeps() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(0);
        let mut s = sched(&COUNTER, AppletConfig::new(), &clock);
        let id = s.create_appctx(None).unwrap();

        s.wakeup_appctx(id);
        assert_eq!(s.run_once(), 1);
        assert_eq!(s.appctx_state(id), AppctxState::Live);
        assert!(s.appctx(id).unwrap().call_rate().is_zero());
        assert!(s.is_idle());
    }

    #[test]
    fn test_call_rate_tracks_runs() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(5000);
        let mut s = sched(&COUNTER, AppletConfig::new(), &clock);
        let id = s.create_appctx(Some(&COUNTDOWN)).unwrap();
        s.appctx_mut(id).unwrap().sub_state.st1 = 100;

        s.wakeup_appctx(id);
        for _ in 0..4 {
            s.run_once();
        }
        let rate = *s.appctx(id).unwrap().call_rate();
        assert_eq!(rate.curr_ctr, 4);
        assert_eq!(rate.curr_tick, 5000);

        clock.advance(1000);
        s.run_once();
        let rate = *s.appctx(id).unwrap().call_rate();
        assert_eq!(rate.prev_ctr, 4);
        assert_eq!(rate.curr_ctr, 1);
    }

    #[test]
    fn test_watchdog_log_keeps_appctx() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(0);
        let config = AppletConfig::new().call_rate_limit(3).call_rate_period_ms(1000);
        let mut s = sched(&COUNTER, config, &clock);
        let id = s.create_appctx(Some(&SPINNER)).unwrap();

        s.wakeup_appctx(id);
        for _ in 0..5 {
            s.run_once();
        }
        assert_eq!(s.stats().livelocks, 0);

        clock.advance(1000);
        for _ in 0..5 {
            s.run_once();
        }
        assert_eq!(s.stats().livelocks, 3);
        assert_eq!(s.appctx_state(id), AppctxState::Live);
    }

    #[test]
    fn test_watchdog_kill_destroys() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(0);
        let config = AppletConfig::new()
            .call_rate_limit(3)
            .call_rate_period_ms(1000)
            .livelock_policy(LivelockPolicy::Kill);
        let mut s = sched(&COUNTER, config, &clock);
        let id = s.create_appctx(Some(&SPINNER)).unwrap();

        s.wakeup_appctx(id);
        for _ in 0..5 {
            s.run_once();
        }
        clock.advance(1000);
        for _ in 0..3 {
            s.run_once();
        }
        assert_eq!(s.stats().livelocks, 1);
        assert_eq!(s.appctx_state(id), AppctxState::PendingDestroy);

        s.run_once();
        assert_eq!(s.appctx_state(id), AppctxState::Free);
        assert_eq!(COUNTER.get(), 0);
    }

    #[test]
    fn test_buffer_wait_wakes_with_resource() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(0);
        let config = AppletConfig::new().buffer_count(1).buffer_size(64);
        let mut s = sched(&COUNTER, config, &clock);
        let id = s.create_appctx(Some(&HUNGRY)).unwrap();

        let held = s.buffers.acquire().unwrap();
        s.wakeup_appctx(id);
        s.run_once();
        let ctx = s.appctx(id).unwrap();
        assert_eq!(ctx.sub_state.st0, 0);
        assert!(ctx.wait_entry().is_linked());
        assert_eq!(s.buffers().waiters_len(), 1);
        assert_eq!(s.task_state(id), Some(TaskState::SLEEPING));

        // Returning the buffer wakes the waiter with WOKEN_RES
        s.release_buffer(held);
        assert_eq!(s.buffers().waiters_len(), 0);
        assert!(!s.appctx(id).unwrap().wait_entry().is_linked());
        assert!(s.task_state(id).unwrap().contains(TaskState::WOKEN_RES));

        s.run_once();
        let ctx = s.appctx(id).unwrap();
        assert_eq!(ctx.sub_state.st0, 1);
        assert_eq!(ctx.sub_state.st2, 1);
        assert_eq!(s.buffers().available(), 1);
    }

    #[test]
    fn test_destroy_unlinks_waiter() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(0);
        let config = AppletConfig::new().buffer_count(0);
        let mut s = sched(&COUNTER, config, &clock);
        let id = s.create_appctx(Some(&HUNGRY)).unwrap();

        s.wakeup_appctx(id);
        s.run_once();
        assert_eq!(s.buffers().waiters_len(), 1);

        s.destroy_appctx(id);
        assert_eq!(s.appctx_state(id), AppctxState::Free);
        assert_eq!(s.buffers().waiters_len(), 0);
    }

    #[test]
    fn test_deferred_destroy_unlinks_waiter() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(0);
        let config = AppletConfig::new().buffer_count(0);
        let mut s = sched(&COUNTER, config, &clock);
        let id = s.create_appctx(Some(&HUNGRY)).unwrap();

        s.wakeup_appctx(id);
        s.run_once();
        assert_eq!(s.buffers().waiters_len(), 1);

        // Queued again, so the destroy can only flag it
        s.wakeup_appctx(id);
        s.destroy_appctx(id);
        assert_eq!(s.appctx_state(id), AppctxState::PendingDestroy);
        assert_eq!(s.buffers().waiters_len(), 1);

        s.run_once();
        assert_eq!(s.appctx_state(id), AppctxState::Free);
        assert_eq!(s.buffers().waiters_len(), 0);
        assert_eq!(s.stats().finalized_deferred, 1);
        assert_eq!(COUNTER.get(), 0);
    }

    #[test]
    fn test_reinit_keeps_buffer_wait_registration() {
        static COUNTER: AppletCounter = AppletCounter::new();
        let clock = ManualClock::new(0);
        let config = AppletConfig::new().buffer_count(1).buffer_size(64);
        let mut s = sched(&COUNTER, config, &clock);
        let id = s.create_appctx(Some(&HUNGRY)).unwrap();

        s.appctx_mut(id).unwrap().init();
        let ctx = s.appctx(id).unwrap();
        assert_eq!(ctx.wait_entry().target(), id);
        assert_eq!(ctx.wait_entry().wakeup(), WakeupKind::Appctx);

        let held = s.buffers.acquire().unwrap();
        s.wakeup_appctx(id);
        s.run_once();
        assert!(s.appctx(id).unwrap().wait_entry().is_linked());
        assert_eq!(s.buffers().waiters_len(), 1);

        s.release_buffer(held);
        assert!(s.task_state(id).unwrap().contains(TaskState::WOKEN_RES));
        s.run_once();
        assert_eq!(s.appctx(id).unwrap().sub_state.st0, 1);
        assert_eq!(s.appctx_state(id), AppctxState::Live);
    }
}
