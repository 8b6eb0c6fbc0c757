//! # applet-core
//!
//! Core types for the applet scheduler.
//!
//! This crate is platform-agnostic and holds no scheduling policy. The
//! per-thread scheduler, the appctx lifecycle and the buffer pool live in
//! `applet-runtime`.
//!
//! ## Modules
//!
//! - `id` - Generational handles into pools
//! - `pool` - Fixed-capacity slab pool
//! - `state` - Task state bitmask, appctx flags and lifecycle tag
//! - `freq_ctr` - Sliding-period call-rate counter
//! - `error` - Error types
//! - `traits` - Platform traits (tick clock)
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod pool;
pub mod state;
pub mod freq_ctr;
pub mod error;
pub mod traits;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::Handle;
pub use pool::Pool;
pub use state::{AppctxFlags, AppctxState, ObjType, TaskState, WakeReason};
pub use freq_ctr::CallRate;
pub use error::{AppletError, AppletResult, PoolKind};
pub use traits::Clock;
pub use env::{env_get, env_get_bool, env_get_opt};

