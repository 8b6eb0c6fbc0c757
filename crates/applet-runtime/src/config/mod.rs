//! Applet scheduler configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls (programmatic)
//! 2. Environment variables (runtime)
//! 3. The file named by `APPLET_CONFIG_RS` (compile-time)
//! 4. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use applet_runtime::config::AppletConfig;
//!
//! let config = AppletConfig::from_env()
//!     .appctx_pool_size(128)
//!     .livelock_policy(LivelockPolicy::Kill);
//! ```

pub mod defaults;

use applet_core::env::{env_get, env_get_bool};
use applet_core::AppletError;

/// What the watchdog does once an applet is caught looping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivelockPolicy {
    /// Report at error level and count it
    Log,
    /// Report, count, and destroy the appctx
    Kill,
}

/// Per-thread scheduler configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct AppletConfig {
    /// Maximum live appctx instances per scheduler thread
    pub appctx_pool_size: usize,
    /// Maximum tasks per scheduler thread
    pub task_pool_size: usize,
    /// Number of buffers in the shared buffer pool
    pub buffer_count: usize,
    /// Size of each shared buffer in bytes
    pub buffer_size: usize,
    /// How many times a handler may ask to continue before it is re-queued
    pub max_continue: u32,
    /// Calls per period at which a busy applet is reported as looping
    pub call_rate_limit: u32,
    /// Call-rate measurement period in milliseconds
    pub call_rate_period_ms: u32,
    /// Watchdog reaction to a looping applet
    pub livelock_policy: LivelockPolicy,
}

impl Default for AppletConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppletConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `APPLET_POOL_SIZE` - Max appctx instances per thread
    /// - `APPLET_TASK_POOL_SIZE` - Max tasks per thread
    /// - `APPLET_BUFFERS` - Shared buffer count
    /// - `APPLET_BUFSIZE` - Shared buffer size in bytes
    /// - `APPLET_MAX_CONTINUE` - Inline re-invocations before re-queue
    /// - `APPLET_CALL_RATE_LIMIT` - Looping threshold (calls per period)
    /// - `APPLET_CALL_RATE_PERIOD_MS` - Measurement period
    /// - `APPLET_LIVELOCK_KILL` - Destroy looping applets (0/1)
    pub fn from_env() -> Self {
        let kill = env_get_bool("APPLET_LIVELOCK_KILL", defaults::LIVELOCK_KILL);
        Self {
            appctx_pool_size: env_get("APPLET_POOL_SIZE", defaults::APPCTX_POOL_SIZE),
            task_pool_size: env_get("APPLET_TASK_POOL_SIZE", defaults::TASK_POOL_SIZE),
            buffer_count: env_get("APPLET_BUFFERS", defaults::BUFFER_COUNT),
            buffer_size: env_get("APPLET_BUFSIZE", defaults::BUFFER_SIZE),
            max_continue: env_get("APPLET_MAX_CONTINUE", defaults::MAX_CONTINUE),
            call_rate_limit: env_get("APPLET_CALL_RATE_LIMIT", defaults::CALL_RATE_LIMIT),
            call_rate_period_ms: env_get(
                "APPLET_CALL_RATE_PERIOD_MS",
                defaults::CALL_RATE_PERIOD_MS,
            ),
            livelock_policy: if kill { LivelockPolicy::Kill } else { LivelockPolicy::Log },
        }
    }

    /// Create config with compile-time defaults only (no env override).
    /// Useful for tests that must not depend on the caller's environment.
    pub fn new() -> Self {
        Self {
            appctx_pool_size: defaults::APPCTX_POOL_SIZE,
            task_pool_size: defaults::TASK_POOL_SIZE,
            buffer_count: defaults::BUFFER_COUNT,
            buffer_size: defaults::BUFFER_SIZE,
            max_continue: defaults::MAX_CONTINUE,
            call_rate_limit: defaults::CALL_RATE_LIMIT,
            call_rate_period_ms: defaults::CALL_RATE_PERIOD_MS,
            livelock_policy: if defaults::LIVELOCK_KILL {
                LivelockPolicy::Kill
            } else {
                LivelockPolicy::Log
            },
        }
    }

    // Builder methods

    pub fn appctx_pool_size(mut self, n: usize) -> Self {
        self.appctx_pool_size = n;
        self
    }

    pub fn task_pool_size(mut self, n: usize) -> Self {
        self.task_pool_size = n;
        self
    }

    pub fn buffer_count(mut self, n: usize) -> Self {
        self.buffer_count = n;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn max_continue(mut self, n: u32) -> Self {
        self.max_continue = n;
        self
    }

    pub fn call_rate_limit(mut self, calls: u32) -> Self {
        self.call_rate_limit = calls;
        self
    }

    pub fn call_rate_period_ms(mut self, ms: u32) -> Self {
        self.call_rate_period_ms = ms;
        self
    }

    pub fn livelock_policy(mut self, policy: LivelockPolicy) -> Self {
        self.livelock_policy = policy;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.appctx_pool_size == 0 {
            return Err(ConfigError::InvalidValue("appctx_pool_size must be > 0"));
        }
        if self.task_pool_size == 0 {
            return Err(ConfigError::InvalidValue("task_pool_size must be > 0"));
        }
        if self.appctx_pool_size >= u32::MAX as usize || self.task_pool_size >= u32::MAX as usize {
            return Err(ConfigError::InvalidValue("pool sizes must fit in 32 bits"));
        }
        if self.buffer_count > 0 && self.buffer_size == 0 {
            return Err(ConfigError::InvalidValue("buffer_size must be > 0"));
        }
        if self.call_rate_period_ms == 0 {
            return Err(ConfigError::InvalidValue("call_rate_period_ms must be > 0"));
        }
        if self.call_rate_limit == 0 {
            return Err(ConfigError::InvalidValue("call_rate_limit must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("Applet Configuration:");
        eprintln!("  appctx_pool_size:     {}", self.appctx_pool_size);
        eprintln!("  task_pool_size:       {}", self.task_pool_size);
        eprintln!("  buffer_count:         {}", self.buffer_count);
        eprintln!("  buffer_size:          {}", self.buffer_size);
        eprintln!("  max_continue:         {}", self.max_continue);
        eprintln!("  call_rate_limit:      {}", self.call_rate_limit);
        eprintln!("  call_rate_period_ms:  {}", self.call_rate_period_ms);
        eprintln!("  livelock_policy:      {:?}", self.livelock_policy);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for AppletError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => AppletError::InvalidConfig(msg),
        }
    }
}
