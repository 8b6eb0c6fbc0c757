//! Environment variable helpers
//!
//! Used by the runtime configuration to apply `APPLET_*` overrides on top of
//! compile-time defaults.
//!
//! ```ignore
//! use applet_core::env::{env_get, env_get_bool};
//!
//! let pool: usize = env_get("APPLET_POOL_SIZE", 1024);
//! let kill: bool = env_get_bool("APPLET_LIVELOCK_KILL", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset variables and values that fail to parse both yield `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (case-insensitive) are true; any other value is
/// false. An unset variable returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
