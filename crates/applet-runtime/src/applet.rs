//! Applet descriptors and the per-run context handed to them

use applet_core::{TaskState, WakeReason};

use crate::appctx::{Appctx, AppctxId};
use crate::buffer::{Buffer, BufferPool};

/// What an applet wants after one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppletStatus {
    /// More work is ready right now; run again in the same pass
    Continue,
    /// More work, but let other tasks go first
    Yield,
    /// Nothing to do until something wakes the appctx
    Wait,
    /// Done; tear the appctx down
    Close,
}

impl AppletStatus {
    /// Check if the applet asked to be run again without being woken
    #[inline]
    pub const fn wants_more(self) -> bool {
        matches!(self, AppletStatus::Continue | AppletStatus::Yield)
    }
}

/// Applet descriptor
///
/// Descriptors are shared, stateless and outlive every appctx bound to
/// them; all per-instance state lives in the `Appctx`.
pub trait Applet: Sync {
    fn name(&self) -> &'static str;

    /// Run the instance once
    fn handle(&self, appctx: &mut Appctx, cx: &mut AppletCx<'_>) -> AppletStatus;
}

/// Context for a single applet run
pub struct AppletCx<'a> {
    id: AppctxId,
    now_ms: u32,
    woken: TaskState,
    buffers: &'a mut BufferPool,
}

impl<'a> AppletCx<'a> {
    pub(crate) fn new(
        id: AppctxId,
        now_ms: u32,
        woken: TaskState,
        buffers: &'a mut BufferPool,
    ) -> Self {
        Self {
            id,
            now_ms,
            woken,
            buffers,
        }
    }

    /// Handle of the appctx being run
    #[inline]
    pub fn id(&self) -> AppctxId {
        self.id
    }

    #[inline]
    pub fn now_ms(&self) -> u32 {
        self.now_ms
    }

    /// Wake reasons accumulated since the previous run
    #[inline]
    pub fn woken(&self) -> TaskState {
        self.woken
    }

    #[inline]
    pub fn woken_by(&self, reason: WakeReason) -> bool {
        self.woken.contains(reason.as_state())
    }

    /// Try to get a buffer
    ///
    /// On failure the appctx is put on the buffer wait list and will be woken
    /// with `WakeReason::Resource` once a buffer is released. On success any
    /// earlier registration is dropped.
    pub fn alloc_buffer(&mut self, appctx: &mut Appctx) -> Option<Buffer> {
        match self.buffers.acquire() {
            Some(buf) => {
                self.buffers.unlink_waiter(appctx.wait_entry_mut());
                Some(buf)
            }
            None => {
                self.buffers.link_waiter(appctx.wait_entry_mut());
                None
            }
        }
    }

    pub fn release_buffer(&mut self, buf: Buffer) {
        self.buffers.release(buf);
    }

    #[inline]
    pub fn buffers(&self) -> &BufferPool {
        self.buffers
    }
}
