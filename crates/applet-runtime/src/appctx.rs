//! Applet context
//!
//! An `Appctx` is the per-instance state of an applet: the descriptor it
//! runs, the task that drives it, a few opaque integers the applet uses as a
//! state machine, an optional scratch buffer, a release hook, its call-rate
//! counter and its buffer-wait entry.
//!
//! Instances live in the scheduler's appctx pool and are referred to by
//! `AppctxId`. Creation and teardown go through the scheduler; this module
//! only holds the record and the in-place reset.

use std::fmt;

use applet_core::{AppctxFlags, AppctxState, CallRate, Handle, ObjType};

use crate::applet::Applet;
use crate::buffer::BufferWait;
use crate::task::TaskId;

pub type AppctxId = Handle<Appctx>;

/// Callback run when the owner of an appctx releases it
pub type ReleaseHook = Box<dyn FnOnce(&mut Appctx)>;

/// Opaque per-instance state machine registers
///
/// The runtime never interprets these; it only zeroes them on init.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubState {
    pub st0: i32,
    pub st1: i32,
    pub st2: i32,
}

/// Per-instance applet state
#[derive(Default)]
pub struct Appctx {
    obj_type: ObjType,
    applet: Option<&'static dyn Applet>,
    task: TaskId,
    pub sub_state: SubState,
    chunk: Option<Vec<u8>>,
    release_hook: Option<ReleaseHook>,
    call_rate: CallRate,
    flags: AppctxFlags,
    wait_entry: BufferWait,
}

impl Appctx {
    /// Reset the runtime-owned fields in place
    ///
    /// Clears the sub-state registers, the scratch buffer, the release hook,
    /// the call-rate counter and the flags, and leaves the buffer-wait entry
    /// unlinked. The type tag, descriptor, task binding and wait-entry
    /// registration are untouched; creation sets those.
    ///
    /// Only run on a freshly allocated slot, which no wait list refers to.
    pub(crate) fn init(&mut self) {
        self.sub_state = SubState::default();
        self.chunk = None;
        self.release_hook = None;
        self.call_rate.reset();
        self.flags = AppctxFlags::EMPTY;
        self.wait_entry.detach();
    }

    #[inline]
    pub fn obj_type(&self) -> ObjType {
        self.obj_type
    }

    #[inline]
    pub fn applet(&self) -> Option<&'static dyn Applet> {
        self.applet
    }

    /// Descriptor name, `"<none>"` when unbound
    pub fn applet_name(&self) -> &'static str {
        self.applet.map_or("<none>", |a| a.name())
    }

    /// Task driving this instance
    #[inline]
    pub fn task(&self) -> TaskId {
        self.task
    }

    #[inline]
    pub fn flags(&self) -> AppctxFlags {
        self.flags
    }

    /// Lifecycle tag of an allocated instance
    #[inline]
    pub fn state(&self) -> AppctxState {
        if self.is_pending_destroy() {
            AppctxState::PendingDestroy
        } else {
            AppctxState::Live
        }
    }

    #[inline]
    pub fn is_pending_destroy(&self) -> bool {
        self.flags.contains(AppctxFlags::PENDING_DESTROY)
    }

    /// Set applet-owned flag bits; the lifecycle bit is masked out
    #[inline]
    pub fn set_applet_flags(&mut self, bits: u32) {
        self.flags
            .insert(AppctxFlags::from_bits(bits & AppctxFlags::APPLET_MASK));
    }

    /// Clear applet-owned flag bits; the lifecycle bit is masked out
    #[inline]
    pub fn clear_applet_flags(&mut self, bits: u32) {
        self.flags
            .remove(AppctxFlags::from_bits(bits & AppctxFlags::APPLET_MASK));
    }

    /// Scratch buffer, allocated on first use
    pub fn scratch_mut(&mut self) -> &mut Vec<u8> {
        self.chunk.get_or_insert_with(Vec::new)
    }

    #[inline]
    pub fn scratch(&self) -> Option<&[u8]> {
        self.chunk.as_deref()
    }

    pub fn take_scratch(&mut self) -> Option<Vec<u8>> {
        self.chunk.take()
    }

    /// Install the hook run by `Scheduler::release_appctx`
    pub fn set_release_hook<F>(&mut self, hook: F)
    where
        F: FnOnce(&mut Appctx) + 'static,
    {
        self.release_hook = Some(Box::new(hook));
    }

    #[inline]
    pub fn has_release_hook(&self) -> bool {
        self.release_hook.is_some()
    }

    #[inline]
    pub fn call_rate(&self) -> &CallRate {
        &self.call_rate
    }

    #[inline]
    pub fn call_rate_mut(&mut self) -> &mut CallRate {
        &mut self.call_rate
    }

    #[inline]
    pub fn wait_entry(&self) -> &BufferWait {
        &self.wait_entry
    }

    // Lifecycle manager only

    pub(crate) fn bind(&mut self, applet: Option<&'static dyn Applet>) {
        self.obj_type = ObjType::Appctx;
        self.applet = applet;
    }

    pub(crate) fn set_task(&mut self, task: TaskId) {
        self.task = task;
    }

    pub(crate) fn mark_pending_destroy(&mut self) {
        self.flags.insert(AppctxFlags::PENDING_DESTROY);
    }

    pub(crate) fn take_release_hook(&mut self) -> Option<ReleaseHook> {
        self.release_hook.take()
    }

    pub(crate) fn wait_entry_mut(&mut self) -> &mut BufferWait {
        &mut self.wait_entry
    }

    /// Drop everything the instance owns before its slot is released
    pub(crate) fn clear(&mut self) {
        self.chunk = None;
        self.release_hook = None;
        self.flags = AppctxFlags::EMPTY;
        self.task = TaskId::NONE;
        self.applet = None;
        self.obj_type = ObjType::None;
    }
}

impl fmt::Debug for Appctx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Appctx")
            .field("obj_type", &self.obj_type)
            .field("applet", &self.applet_name())
            .field("task", &self.task)
            .field("sub_state", &self.sub_state)
            .field("chunk", &self.chunk.as_ref().map(|c| c.len()))
            .field("release_hook", &self.release_hook.is_some())
            .field("call_rate", &self.call_rate)
            .field("flags", &self.flags)
            .field("wait_entry", &self.wait_entry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferPool, WakeupKind};

    #[test]
    fn test_default_is_zeroed() {
        let ctx = Appctx::default();
        assert_eq!(ctx.obj_type(), ObjType::None);
        assert!(ctx.applet().is_none());
        assert!(ctx.task().is_none());
        assert_eq!(ctx.sub_state, SubState::default());
        assert!(ctx.scratch().is_none());
        assert!(ctx.call_rate().is_zero());
        assert!(ctx.flags().is_empty());
        assert!(!ctx.wait_entry().is_linked());
    }

    #[test]
    fn test_init_clears_poisoned_instance() {
        let mut pool = BufferPool::new(0, 16);
        let mut ctx = Appctx::default();
        ctx.sub_state = SubState { st0: 7, st1: -1, st2: 42 };
        ctx.scratch_mut().extend_from_slice(b"junk");
        ctx.set_release_hook(|_| {});
        ctx.call_rate_mut().update(5000, 1000, 9);
        ctx.set_applet_flags(0x10);
        ctx.mark_pending_destroy();
        ctx.wait_entry_mut().register(Handle::new(3, 0), WakeupKind::Appctx);
        pool.link_waiter(ctx.wait_entry_mut());
        pool.forget_waiter(Handle::new(3, 0));

        ctx.init();

        assert_eq!(ctx.sub_state, SubState::default());
        assert!(ctx.scratch().is_none());
        assert!(!ctx.has_release_hook());
        assert!(ctx.call_rate().is_zero());
        assert!(ctx.flags().is_empty());
        assert_eq!(ctx.state(), AppctxState::Live);

        // Registration belongs to creation, not to init
        assert_eq!(ctx.wait_entry().target(), Handle::new(3, 0));
        assert_eq!(ctx.wait_entry().wakeup(), WakeupKind::Appctx);
        assert!(!ctx.wait_entry().is_linked());
    }

    #[test]
    fn test_applet_flags_cannot_touch_lifecycle_bit() {
        let mut ctx = Appctx::default();
        ctx.set_applet_flags(u32::MAX);
        assert!(!ctx.is_pending_destroy());
        assert_eq!(ctx.flags().bits(), AppctxFlags::APPLET_MASK);

        ctx.mark_pending_destroy();
        ctx.clear_applet_flags(u32::MAX);
        assert!(ctx.is_pending_destroy());
        assert_eq!(ctx.state(), AppctxState::PendingDestroy);
    }

    #[test]
    fn test_scratch_on_demand() {
        let mut ctx = Appctx::default();
        ctx.scratch_mut().push(1);
        assert_eq!(ctx.scratch(), Some(&[1u8][..]));
        assert_eq!(ctx.take_scratch(), Some(vec![1]));
        assert!(ctx.scratch().is_none());
    }

    #[test]
    fn test_clear_unbinds() {
        let mut ctx = Appctx::default();
        ctx.bind(None);
        ctx.set_task(Handle::new(0, 0));
        ctx.clear();
        assert_eq!(ctx.obj_type(), ObjType::None);
        assert!(ctx.task().is_none());
        assert_eq!(ctx.applet_name(), "<none>");
    }
}
