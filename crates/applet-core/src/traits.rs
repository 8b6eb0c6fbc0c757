//! Platform traits
//!
//! These traits define the interface between the platform-agnostic core and
//! the runtime's concrete implementations.

/// Millisecond tick source for a scheduler
///
/// Ticks are a wrapping `u32`; consumers only ever look at differences
/// between two ticks, never at absolute values.
pub trait Clock {
    /// Current tick in milliseconds
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}
