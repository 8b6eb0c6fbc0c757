//! Cross-thread wakeups
//!
//! Appctx never leave their scheduler thread, but another thread may still
//! need to poke one (a response became ready, a peer closed). A
//! `RemoteWaker` pushes the handle into the owning scheduler's lock-free
//! inbox; the owner drains it at the start of each pass and turns each entry
//! into a `WakeReason::Message` wakeup. Stale handles are ignored.
//!
//! Only wakeups travel this way. Teardown is always requested on the owning
//! thread.

use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::appctx::AppctxId;

pub(crate) type Inbox = Arc<SegQueue<AppctxId>>;

/// Sendable wakeup handle for one scheduler
#[derive(Clone)]
pub struct RemoteWaker {
    inbox: Inbox,
    thread: u32,
}

impl RemoteWaker {
    pub(crate) fn new(inbox: Inbox, thread: u32) -> Self {
        Self { inbox, thread }
    }

    /// Ask the owning scheduler to wake `id`
    #[inline]
    pub fn wake(&self, id: AppctxId) {
        self.inbox.push(id);
    }

    /// Thread id of the owning scheduler
    #[inline]
    pub fn thread(&self) -> u32 {
        self.thread
    }

    /// Wakeups not yet drained by the owner
    #[inline]
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }
}

impl std::fmt::Debug for RemoteWaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteWaker")
            .field("thread", &self.thread)
            .field("pending", &self.inbox.len())
            .finish()
    }
}
