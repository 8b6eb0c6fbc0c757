//! Fixed-capacity slab pool
//!
//! Hands out slots of a single type, up to a fixed maximum. Freed slots are
//! kept on a LIFO free stack for cache-friendly reuse of recently released
//! objects. Like a slab allocator, the pool does not scrub a released slot:
//! the next owner gets the stale contents and is expected to initialize them.
//!
//! A pool is owned by a single scheduler thread; no locking is involved.

use crate::id::Handle;

struct Slot<T> {
    /// Bumped on every release so stale handles stop resolving
    generation: u32,
    /// Slot currently handed out
    live: bool,
    value: T,
}

/// Fixed-capacity object pool with generational handles
pub struct Pool<T> {
    /// Every slot ever touched; `slots.len()` is the next fresh index
    slots: Vec<Slot<T>>,

    /// LIFO stack of free slot indices (for reuse)
    free_stack: Vec<u32>,

    /// Maximum number of slots
    max_slots: u32,

    /// Number of currently allocated slots
    allocated_count: u32,
}

impl<T: Default> Pool<T> {
    /// Create a pool that holds at most `max_slots` objects
    pub fn new(max_slots: usize) -> Self {
        let max_slots = max_slots.min(u32::MAX as usize - 1);
        Self {
            slots: Vec::new(),
            free_stack: Vec::with_capacity(max_slots.min(1024)),
            max_slots: max_slots as u32,
            allocated_count: 0,
        }
    }

    /// Allocate a slot, returning its handle and the (uninitialized) object
    ///
    /// Prefers reusing recently freed slots (LIFO). Falls back to fresh slots
    /// if the free stack is empty. Returns `None` when the pool is exhausted.
    pub fn allocate(&mut self) -> Option<(Handle<T>, &mut T)> {
        let index = match self.free_stack.pop() {
            Some(index) => index,
            None => {
                let fresh = self.slots.len() as u32;
                if fresh >= self.max_slots {
                    return None;
                }
                self.slots.push(Slot {
                    generation: 0,
                    live: false,
                    value: T::default(),
                });
                fresh
            }
        };

        self.allocated_count += 1;
        let slot = &mut self.slots[index as usize];
        slot.live = true;
        Some((Handle::new(index, slot.generation), &mut slot.value))
    }
}

impl<T> Pool<T> {
    /// Release a slot back to the pool
    ///
    /// Returns false if the handle is stale or was never allocated.
    pub fn release(&mut self, handle: Handle<T>) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_stack.push(handle.index());
        self.allocated_count -= 1;
        true
    }

    #[inline]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.as_usize())
            .filter(|slot| slot.live && slot.generation == handle.generation())
            .map(|slot| &slot.value)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slot_mut(handle).map(|slot| &mut slot.value)
    }

    /// Check if a handle refers to a live object
    #[inline]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Handles of every live object, in slot order
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.live)
            .map(|(index, slot)| Handle::new(index as u32, slot.generation))
            .collect()
    }

    /// Get the number of currently allocated slots
    #[inline]
    pub fn allocated_count(&self) -> u32 {
        self.allocated_count
    }

    /// Get the maximum number of slots
    #[inline]
    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }

    /// Get the number of fresh (never-used) slots remaining
    #[inline]
    pub fn fresh_remaining(&self) -> u32 {
        self.max_slots.saturating_sub(self.slots.len() as u32)
    }

    /// Get the number of slots in the free stack
    #[inline]
    pub fn free_stack_size(&self) -> usize {
        self.free_stack.len()
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.allocated_count >= self.max_slots
    }

    fn slot_mut(&mut self, handle: Handle<T>) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.as_usize())
            .filter(|slot| slot.live && slot.generation == handle.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_sequential() {
        let mut pool: Pool<u64> = Pool::new(100);

        let (id1, _) = pool.allocate().unwrap();
        let (id2, _) = pool.allocate().unwrap();
        let (id3, _) = pool.allocate().unwrap();

        assert_eq!(id1.index(), 0);
        assert_eq!(id2.index(), 1);
        assert_eq!(id3.index(), 2);
        assert_eq!(pool.allocated_count(), 3);
        assert_eq!(pool.fresh_remaining(), 97);
    }

    #[test]
    fn test_allocate_release_reuse() {
        let mut pool: Pool<u64> = Pool::new(100);

        let (id1, _) = pool.allocate().unwrap();
        let (_id2, _) = pool.allocate().unwrap();

        assert!(pool.release(id1));
        assert_eq!(pool.allocated_count(), 1);

        // Next allocation reuses id1's slot (LIFO) under a new generation
        let (id3, _) = pool.allocate().unwrap();
        assert_eq!(id3.index(), id1.index());
        assert_ne!(id3, id1);
        assert_eq!(pool.allocated_count(), 2);
    }

    #[test]
    fn test_stale_handle_never_resolves() {
        let mut pool: Pool<u64> = Pool::new(4);

        let (old, value) = pool.allocate().unwrap();
        *value = 11;
        pool.release(old);
        let (new, value) = pool.allocate().unwrap();
        *value = 22;

        assert!(pool.get(old).is_none());
        assert!(pool.get_mut(old).is_none());
        assert!(!pool.release(old));
        assert_eq!(pool.get(new), Some(&22));
    }

    #[test]
    fn test_allocate_exhaustion() {
        let mut pool: Pool<u8> = Pool::new(3);

        for _ in 0..3 {
            assert!(pool.allocate().is_some());
        }
        assert!(pool.is_exhausted());
        assert!(pool.allocate().is_none());
        assert_eq!(pool.allocated_count(), 3);
    }

    #[test]
    fn test_released_slot_keeps_stale_contents() {
        let mut pool: Pool<u32> = Pool::new(1);

        let (id, value) = pool.allocate().unwrap();
        *value = 0xdead_beef;
        pool.release(id);

        let (_, value) = pool.allocate().unwrap();
        assert_eq!(*value, 0xdead_beef);
    }

    #[test]
    fn test_handles_lists_live_only() {
        let mut pool: Pool<u8> = Pool::new(8);
        let ids: Vec<_> = (0..4).map(|_| pool.allocate().unwrap().0).collect();
        pool.release(ids[1]);
        pool.release(ids[3]);

        assert_eq!(pool.handles(), vec![ids[0], ids[2]]);
        assert_eq!(pool.free_stack_size(), 2);
    }
}
