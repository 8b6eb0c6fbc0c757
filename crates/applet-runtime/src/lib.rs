//! # applet-runtime
//!
//! Per-thread scheduler for applets: lightweight service handlers run
//! cooperatively without a thread of their own.
//!
//! This crate provides:
//! - The appctx lifecycle (create, init, destroy with deferred teardown, wakeup)
//! - The dispatch trampoline that runs applet handlers
//! - A shared buffer pool with buffer-wait registration
//! - Call-rate accounting and a livelock watchdog
//! - Cross-thread wakeups and the process-wide live-applet counter
//!
//! A `Scheduler` is created on, and never leaves, the thread that drives it.
//! Run one per thread; they share nothing but the live-applet counter.
//!
//! ```rust,ignore
//! use applet_runtime::{AppletConfig, Scheduler};
//!
//! let mut sched = Scheduler::new(AppletConfig::from_env())?;
//! let id = sched.create_appctx(Some(&MY_APPLET))?;
//! sched.wakeup_appctx(id);
//! sched.run_until_idle(100);
//! sched.destroy_appctx(id);
//! ```

pub mod appctx;
pub mod applet;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod counter;
pub mod dispatch;
pub mod lifecycle;
pub mod remote;
pub mod scheduler;
pub mod task;
pub mod tls;
pub mod watchdog;

// Re-exports
pub use appctx::{Appctx, AppctxId, ReleaseHook, SubState};
pub use applet::{Applet, AppletCx, AppletStatus};
pub use buffer::{Buffer, BufferPool, BufferWait, WakeupKind};
pub use clock::{ManualClock, MonotonicClock};
pub use config::{AppletConfig, ConfigError, LivelockPolicy};
pub use counter::{nb_applets, AppletCounter, NB_APPLETS};
pub use dispatch::TaskDirective;
pub use remote::RemoteWaker;
pub use scheduler::{SchedStats, Scheduler};
pub use task::{Task, TaskEntry, TaskId, TaskTable};
pub use watchdog::Watchdog;
