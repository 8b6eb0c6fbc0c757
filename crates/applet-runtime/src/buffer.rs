//! Shared buffer pool and buffer-wait registration
//!
//! Each scheduler thread owns one pool of fixed-size buffers shared by all
//! of its applets. When an applet asks for a buffer and none is left, its
//! wait entry is linked into the pool's wait list. Once buffers come back,
//! the scheduler walks the list and calls each waiter's wakeup callback so
//! the applet retries on its next run.
//!
//! **Contract:**
//! - `acquire()` returns a cleared buffer of `buffer_size()` capacity.
//! - `release()` returns a buffer to the pool.
//! - A wait entry is in at most one wait list, and finalization unlinks it.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use crate::appctx::AppctxId;

/// A buffer borrowed from a `BufferPool`
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Deref for Buffer {
    type Target = Vec<u8>;

    #[inline]
    fn deref(&self) -> &Vec<u8> {
        &self.data
    }
}

impl DerefMut for Buffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

/// Callback invoked when a buffer is offered to a waiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeupKind {
    /// Not registered
    #[default]
    None,
    /// Wake the target appctx's task
    Appctx,
}

/// Wait-list registration record embedded in every appctx
#[derive(Debug, Default)]
pub struct BufferWait {
    /// Owning appctx (handles never resolve once the owner is gone)
    target: AppctxId,
    wakeup: WakeupKind,
    linked: bool,
}

impl BufferWait {
    /// Point the entry at its owner; does not link it anywhere
    pub(crate) fn register(&mut self, target: AppctxId, wakeup: WakeupKind) {
        debug_assert!(!self.linked);
        self.target = target;
        self.wakeup = wakeup;
    }

    /// Drop list membership, keeping the registration
    pub(crate) fn detach(&mut self) {
        self.linked = false;
    }

    /// Back to the empty, unlinked state
    pub(crate) fn reset(&mut self) {
        self.target = AppctxId::NONE;
        self.wakeup = WakeupKind::None;
        self.linked = false;
    }

    #[inline]
    pub fn target(&self) -> AppctxId {
        self.target
    }

    #[inline]
    pub fn wakeup(&self) -> WakeupKind {
        self.wakeup
    }

    /// Membership test
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.linked
    }
}

/// Fixed set of fixed-size buffers plus the list of appctx waiting for one
pub struct BufferPool {
    /// Returned buffers ready for reuse
    free: Vec<Vec<u8>>,
    /// Total number of buffers the pool may hand out
    count: usize,
    /// Capacity of each buffer
    size: usize,
    /// Buffers currently handed out
    in_use: usize,
    /// Waiters in arrival order
    waiters: VecDeque<AppctxId>,
}

impl BufferPool {
    /// Create a pool of `count` buffers of `size` bytes
    ///
    /// Buffers are allocated lazily on first use.
    pub fn new(count: usize, size: usize) -> Self {
        Self {
            free: Vec::with_capacity(count.min(1024)),
            count,
            size,
            in_use: 0,
            waiters: VecDeque::new(),
        }
    }

    /// Acquire a buffer; `None` if all buffers are handed out
    pub fn acquire(&mut self) -> Option<Buffer> {
        if self.in_use >= self.count {
            return None;
        }
        let data = self
            .free
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.size));
        self.in_use += 1;
        Some(Buffer { data })
    }

    /// Release a previously acquired buffer back to the pool
    pub fn release(&mut self, buffer: Buffer) {
        let mut data = buffer.into_inner();
        self.in_use = self.in_use.saturating_sub(1);
        if data.capacity() >= self.size && self.free.len() < self.count {
            data.clear();
            self.free.push(data);
        }
    }

    /// Buffers that can be acquired right now
    #[inline]
    pub fn available(&self) -> usize {
        self.count.saturating_sub(self.in_use)
    }

    #[inline]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    #[inline]
    pub fn pool_size(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.size
    }

    /// Link a wait entry at the tail of the wait list
    ///
    /// Returns false if the entry was already linked or was never registered.
    pub fn link_waiter(&mut self, entry: &mut BufferWait) -> bool {
        if entry.linked || entry.wakeup == WakeupKind::None {
            return false;
        }
        self.waiters.push_back(entry.target);
        entry.linked = true;
        true
    }

    /// Unlink a wait entry; returns false if it wasn't linked
    pub fn unlink_waiter(&mut self, entry: &mut BufferWait) -> bool {
        if !entry.linked {
            return false;
        }
        let target = entry.target;
        self.waiters.retain(|w| *w != target);
        entry.linked = false;
        true
    }

    #[inline]
    pub fn waiters_len(&self) -> usize {
        self.waiters.len()
    }

    /// Current waiters, in arrival order
    pub(crate) fn waiters(&self) -> Vec<AppctxId> {
        self.waiters.iter().copied().collect()
    }

    /// Drop a waiter whose entry is no longer reachable
    pub(crate) fn forget_waiter(&mut self, target: AppctxId) {
        self.waiters.retain(|w| *w != target);
    }
}
