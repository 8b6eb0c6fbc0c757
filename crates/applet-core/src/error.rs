//! Error types for the applet layer

use core::fmt;

/// Result type for applet operations
pub type AppletResult<T> = Result<T, AppletError>;

/// Which pool could not supply an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// The appctx pool
    Appctx,
    /// The task pool backing appctx scheduling
    Task,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Appctx => write!(f, "appctx"),
            PoolKind::Task => write!(f, "task"),
        }
    }
}

/// Errors that can occur in applet operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppletError {
    /// A pool was exhausted; nothing was left allocated
    AllocationFailure(PoolKind),

    /// Scheduler configuration rejected
    InvalidConfig(&'static str),
}

impl AppletError {
    /// Check if this is an allocation failure (from either pool)
    #[inline]
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, AppletError::AllocationFailure(_))
    }
}

impl fmt::Display for AppletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppletError::AllocationFailure(kind) => {
                write!(f, "allocation failure: {} pool exhausted", kind)
            }
            AppletError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for AppletError {}
