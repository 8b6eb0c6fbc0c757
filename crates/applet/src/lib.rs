//! # applet - cooperative service handlers
//!
//! Runs lightweight service handlers (consoles, health responders, protocol
//! translators) inside per-thread schedulers, without a thread each.
//!
//! ## Features
//!
//! - **Thread-affine**: an appctx and its task never leave the creating thread
//! - **Deferred teardown**: destroying a queued or running appctx only flags
//!   it; the dispatch trampoline frees it before any handler sees it again
//! - **Backpressure**: applets that can't get a buffer join a wait list and
//!   are woken when one is released
//! - **Livelock detection**: per-appctx call-rate accounting and a watchdog
//!
//! ## Quick Start
//!
//! ```ignore
//! use applet::{Applet, AppletCx, AppletStatus, Appctx, AppletConfig, Runtime};
//!
//! struct Hello;
//!
//! impl Applet for Hello {
//!     fn name(&self) -> &'static str { "hello" }
//!     fn handle(&self, ctx: &mut Appctx, _cx: &mut AppletCx<'_>) -> AppletStatus {
//!         ctx.scratch_mut().extend_from_slice(b"hello\n");
//!         AppletStatus::Close
//!     }
//! }
//!
//! static HELLO: Hello = Hello;
//!
//! let mut rt = Runtime::new(AppletConfig::from_env(), 2)?;
//! rt.start(|_, sched| {
//!     let id = sched.create_appctx(Some(&HELLO)).unwrap();
//!     sched.wakeup_appctx(id);
//! })?;
//! let stats = rt.shutdown();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │  Scheduler thread 0  │      │  Scheduler thread 1  │
//! │  appctx pool, tasks  │      │  appctx pool, tasks  │
//! │  buffers, wait list  │      │  buffers, wait list  │
//! └──────────┬───────────┘      └──────────┬───────────┘
//!            │    RemoteWaker (wakeups)    │
//!            └──────────────┬──────────────┘
//!                           ▼
//!               live-applet counter (atomic)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

// Re-export core types
pub use applet_core::{
    AppctxFlags, AppctxState, AppletError, AppletResult, CallRate, Clock, Handle, ObjType,
    PoolKind, TaskState, WakeReason,
};

// Re-export kprint macros for debug logging
pub use applet_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};
pub use applet_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};

// Re-export env utilities
pub use applet_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use applet_runtime::{
    nb_applets, Appctx, AppctxId, Applet, AppletConfig, AppletCounter, AppletCx, AppletStatus,
    Buffer, BufferPool, LivelockPolicy, ManualClock, MonotonicClock, RemoteWaker, SchedStats,
    Scheduler, SubState, TaskDirective,
};

/// How long an idle scheduler thread sleeps before polling again
const IDLE_SLEEP: Duration = Duration::from_micros(200);

/// Passes allowed to drain pending work once shutdown is requested
const DRAIN_PASSES: usize = 64;

/// Multi-thread runner: one `Scheduler` per OS thread
///
/// Each thread builds its own scheduler, runs the setup closure on it, then
/// loops until `shutdown()`. Dropping a scheduler finalizes its remaining
/// appctx, so `nb_applets()` is back to its starting value once every
/// runtime is shut down.
pub struct Runtime {
    config: AppletConfig,
    threads: usize,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<SchedStats>>,
}

impl Runtime {
    /// Create a runtime; nothing runs until `start()`
    pub fn new(config: AppletConfig, threads: usize) -> AppletResult<Self> {
        config.validate()?;
        if threads == 0 {
            return Err(AppletError::InvalidConfig("threads must be > 0"));
        }
        Ok(Self {
            config,
            threads,
            stop: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        })
    }

    /// Spawn the scheduler threads
    ///
    /// `setup` runs once on every thread, with the thread index and that
    /// thread's scheduler, before the scheduling loop starts.
    pub fn start<F>(&mut self, setup: F) -> AppletResult<()>
    where
        F: Fn(usize, &mut Scheduler) + Send + Sync + 'static,
    {
        if !self.workers.is_empty() {
            return Err(AppletError::InvalidConfig("runtime already started"));
        }
        self.stop.store(false, Ordering::SeqCst);

        let setup = Arc::new(setup);
        for index in 0..self.threads {
            let config = self.config.clone();
            let stop = Arc::clone(&self.stop);
            let setup = Arc::clone(&setup);

            let handle = std::thread::Builder::new()
                .name(format!("applet-{}", index))
                .spawn(move || scheduler_main(index, config, stop, &*setup))
                .map_err(|_| AppletError::InvalidConfig("cannot spawn scheduler thread"))?;
            self.workers.push(handle);
        }

        kinfo!("runtime started with {} scheduler thread(s)", self.threads);
        Ok(())
    }

    /// Stop every scheduler thread and collect their statistics
    pub fn shutdown(&mut self) -> Vec<SchedStats> {
        self.stop.store(true, Ordering::SeqCst);
        let mut stats = Vec::with_capacity(self.workers.len());
        for handle in self.workers.drain(..) {
            match handle.join() {
                Ok(s) => stats.push(s),
                Err(_) => kerror!("scheduler thread panicked"),
            }
        }
        stats
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn scheduler_main(
    index: usize,
    config: AppletConfig,
    stop: Arc<AtomicBool>,
    setup: &(dyn Fn(usize, &mut Scheduler) + Send + Sync),
) -> SchedStats {
    let mut sched = match Scheduler::new(config) {
        Ok(s) => s,
        Err(e) => {
            kerror!("scheduler {} failed to start: {}", index, e);
            return SchedStats::default();
        }
    };

    setup(index, &mut sched);

    while !stop.load(Ordering::Relaxed) {
        if sched.run_once() == 0 {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
    sched.run_until_idle(DRAIN_PASSES);

    kdebug!(
        "scheduler {} exiting with {} live appctx",
        index,
        sched.live_appctx()
    );
    sched.stats()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Once;

    impl Applet for Once {
        fn name(&self) -> &'static str {
            "once"
        }

        fn handle(&self, _appctx: &mut Appctx, _cx: &mut AppletCx<'_>) -> AppletStatus {
            AppletStatus::Close
        }
    }

    static ONCE: Once = Once;

    #[test]
    fn test_zero_threads_rejected() {
        assert!(Runtime::new(AppletConfig::new(), 0).is_err());
    }

    #[test]
    fn test_runtime_runs_applets_on_each_thread() {
        let mut rt = Runtime::new(AppletConfig::new(), 2).unwrap();
        rt.start(|_, sched| {
            for _ in 0..10 {
                let id = sched.create_appctx(Some(&ONCE)).unwrap();
                sched.wakeup_appctx(id);
            }
        })
        .unwrap();
        assert!(rt.is_running());
        assert!(rt.start(|_, _| {}).is_err());

        std::thread::sleep(Duration::from_millis(50));
        let stats = rt.shutdown();
        assert!(!rt.is_running());
        assert_eq!(stats.len(), 2);
        for s in &stats {
            assert_eq!(s.created, 10);
            assert_eq!(s.finalized_deferred, 10);
        }
    }
}
