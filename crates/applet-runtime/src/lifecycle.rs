//! Appctx lifecycle: create, destroy, wakeup, finalize
//!
//! # Teardown
//!
//! `destroy_appctx` frees the instance right away only when its task is
//! neither queued nor running. Otherwise something may still reach the
//! instance through the task, so it only sets `PENDING_DESTROY` and wakes
//! the task; the trampoline sees the flag on the next dispatch and
//! finalizes before any handler code runs.
//!
//! Pending-destroy instances keep their pool slot, so their handle cannot
//! alias a newer appctx until finalization bumps the slot generation.

use applet_core::{kdebug, ktrace, kwarn};
use applet_core::{AppletError, AppletResult, PoolKind, WakeReason};

use crate::appctx::AppctxId;
use crate::applet::Applet;
use crate::buffer::WakeupKind;
use crate::scheduler::Scheduler;
use crate::task::TaskEntry;

impl Scheduler {
    /// Create an appctx bound to a new task on this thread
    ///
    /// All or nothing: on failure nothing stays allocated and the live
    /// counter is untouched. The new task sleeps until the appctx is woken.
    pub fn create_appctx(&mut self, applet: Option<&'static dyn Applet>) -> AppletResult<AppctxId> {
        let Some((id, ctx)) = self.appctxs.allocate() else {
            kdebug!("appctx pool exhausted");
            return Err(AppletError::AllocationFailure(PoolKind::Appctx));
        };

        ctx.bind(applet);
        ctx.init();

        let Some(task) = self.tasks.create_here(TaskEntry::Applet, Some(id)) else {
            ctx.clear();
            self.appctxs.release(id);
            kdebug!("task pool exhausted, appctx {} rolled back", id);
            return Err(AppletError::AllocationFailure(PoolKind::Task));
        };

        ctx.set_task(task);
        ctx.wait_entry_mut().register(id, WakeupKind::Appctx);

        self.counter.inc();
        self.stats.created += 1;
        kdebug!("appctx {} created for '{}' (task {})", id, ctx.applet_name(), task);
        Ok(id)
    }

    /// Destroy an appctx, now if its task is idle, otherwise on its next run
    ///
    /// Calling this again on a pending-destroy instance only re-issues the
    /// wakeup. A handle that no longer resolves is ignored.
    pub fn destroy_appctx(&mut self, id: AppctxId) {
        let Some(ctx) = self.appctxs.get_mut(id) else {
            kwarn!("destroy of unknown appctx {}", id);
            return;
        };

        let task = ctx.task();
        let busy = self.tasks.state(task).is_some_and(|s| s.is_active());
        if !busy {
            self.finalize(id, false);
            return;
        }

        ctx.mark_pending_destroy();
        self.tasks.wakeup(task, WakeReason::Other);
        self.stats.wakeups += 1;
        ktrace!("appctx {} busy, destroy deferred", id);
    }

    /// Schedule the appctx's task; the handler runs on a later pass
    ///
    /// Returns false if the handle no longer resolves.
    pub fn wakeup_appctx(&mut self, id: AppctxId) -> bool {
        let Some(ctx) = self.appctxs.get(id) else {
            return false;
        };
        let woken = self.tasks.wakeup(ctx.task(), WakeReason::Other);
        if woken {
            self.stats.wakeups += 1;
        }
        woken
    }

    /// Run the appctx's release hook, if any, and drop it
    ///
    /// The hook runs at most once. Finalization never runs it, so an owner
    /// that relies on it calls this before `destroy_appctx`.
    pub fn release_appctx(&mut self, id: AppctxId) -> bool {
        let Some(ctx) = self.appctxs.get_mut(id) else {
            return false;
        };
        match ctx.take_release_hook() {
            Some(hook) => {
                hook(ctx);
                true
            }
            None => false,
        }
    }

    /// Buffer-wait callback: a buffer may be available for `id`
    ///
    /// Wakes the task with `WakeReason::Resource`. Returns false if the
    /// appctx is gone, in which case the offer is not consumed.
    pub fn appctx_buf_available(&mut self, id: AppctxId) -> bool {
        let Some(ctx) = self.appctxs.get(id) else {
            return false;
        };
        let woken = self.tasks.wakeup(ctx.task(), WakeReason::Resource);
        if woken {
            self.stats.wakeups += 1;
        }
        woken
    }

    /// Offer available buffers to waiters, oldest first
    ///
    /// Each waiter whose callback accepts an offer is unlinked. Stops once as
    /// many waiters as there are free buffers have been served.
    pub fn offer_buffers(&mut self) -> usize {
        let mut offers = self.buffers.available();
        if offers == 0 || self.buffers.waiters_len() == 0 {
            return 0;
        }

        let mut served = 0;
        for target in self.buffers.waiters() {
            if offers == 0 {
                break;
            }
            let accepted = match self.appctxs.get(target).map(|c| c.wait_entry().wakeup()) {
                Some(WakeupKind::Appctx) => self.appctx_buf_available(target),
                Some(WakeupKind::None) | None => false,
            };
            match self.appctxs.get_mut(target) {
                Some(ctx) if accepted => {
                    self.buffers.unlink_waiter(ctx.wait_entry_mut());
                    offers -= 1;
                    served += 1;
                }
                Some(_) => {}
                None => self.buffers.forget_waiter(target),
            }
        }
        served
    }

    /// Free an appctx and its task
    ///
    /// The release hook is dropped without being called.
    pub(crate) fn finalize(&mut self, id: AppctxId, deferred: bool) {
        let Some(ctx) = self.appctxs.get_mut(id) else {
            return;
        };

        self.tasks.destroy(ctx.task());
        if ctx.wait_entry().is_linked() {
            self.buffers.unlink_waiter(ctx.wait_entry_mut());
        }
        ctx.clear();
        ctx.wait_entry_mut().reset();
        self.appctxs.release(id);
        self.counter.dec();

        if deferred {
            self.stats.finalized_deferred += 1;
        } else {
            self.stats.finalized_now += 1;
        }
        kdebug!("appctx {} finalized{}", id, if deferred { " (deferred)" } else { "" });
    }
}
