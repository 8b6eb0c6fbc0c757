//! Process-wide live-applet counter
//!
//! The counter is the only state shared between scheduler threads. It is
//! bumped when an appctx is fully created and dropped when it is finalized,
//! with plain atomic increments and no other synchronization.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Count of fully-created, not-yet-finalized appctx instances
pub struct AppletCounter {
    live: AtomicUsize,
}

impl AppletCounter {
    pub const fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn inc(&self) {
        self.live.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn dec(&self) {
        let prev = self.live.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "live applet counter underflow");
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

impl Default for AppletCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter used by every scheduler unless one is supplied explicitly
pub static NB_APPLETS: AppletCounter = AppletCounter::new();

/// Number of live applets in the process
#[inline]
pub fn nb_applets() -> usize {
    NB_APPLETS.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_inc_dec() {
        let counter = AppletCounter::new();
        counter.inc();
        counter.inc();
        counter.dec();
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let counter = Arc::new(AppletCounter::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    counter.inc();
                    if i % 2 == 0 {
                        counter.dec();
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.get(), 4 * 500);
    }
}
