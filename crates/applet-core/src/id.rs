//! Generational handle type
//!
//! Handles index into a [`Pool`](crate::pool::Pool). The generation is bumped
//! every time a slot is released, so a handle that outlived its object never
//! resolves to whatever was allocated in the same slot afterwards.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// Stable reference to an object stored in a `Pool<T>`
///
/// `T` only tags the handle so that task handles and appctx handles can't be
/// mixed up; the handle itself is a plain `Copy` pair of integers and is
/// `Send` regardless of `T`.
#[repr(C)]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Sentinel value indicating no object
    pub const NONE: Handle<T> = Handle::new(u32::MAX, 0);

    /// Create a handle from raw parts
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Handle {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index inside the owning pool
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Get the index as usize for slot lookups
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }

    /// Generation the slot had when this handle was issued
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.index == u32::MAX
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.index != u32::MAX
    }

    /// Convert to Option
    #[inline]
    pub const fn to_option(self) -> Option<Handle<T>> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

// Manual impls: derives would put bounds on T.

impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Handle::NONE
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Handle(NONE)")
        } else {
            write!(f, "Handle({}v{})", self.index, self.generation)
        }
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}.{}", self.index, self.generation)
        }
    }
}
