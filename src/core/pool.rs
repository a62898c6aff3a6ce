//! Fixed-size lock-free object pool.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

const NIL: u32 = u32::MAX;

struct PoolSlot<T> {
    free_next: AtomicU32,
    value: UnsafeCell<T>,
}

/// Lock-free freelist over a fixed, contiguous slab of slots.
///
/// `try_acquire` pops a slot index off the freelist with CAS;
/// [`release`](Self::release) pushes it back. The head carries a
/// generation tag so a slot recycled between a load and its CAS cannot
/// be confused with the original (ABA). On exhaustion `try_acquire`
/// returns `None` and the caller degrades: reject the order, drop the
/// tick.
///
/// Between acquire and release the caller has exclusive access to the
/// slot's value through [`slot_ptr`](Self::slot_ptr); the pool never
/// touches it.
pub struct ObjectPool<T> {
    slots: Box<[PoolSlot<T>]>,
    free_head: CachePadded<AtomicU64>,
    in_use: AtomicUsize,
}

unsafe impl<T: Send> Send for ObjectPool<T> {}
unsafe impl<T: Send> Sync for ObjectPool<T> {}

fn pack(tag: u32, idx: u32) -> u64 {
    ((tag as u64) << 32) | idx as u64
}

impl<T: Default> ObjectPool<T> {
    /// Allocate a pool of `capacity` default-initialized slots.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be non-zero");
        assert!(capacity < NIL as usize, "pool capacity exceeds index range");

        let slots = (0..capacity)
            .map(|i| PoolSlot {
                free_next: AtomicU32::new(if i + 1 < capacity { i as u32 + 1 } else { NIL }),
                value: UnsafeCell::new(T::default()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            free_head: CachePadded::new(AtomicU64::new(pack(0, 0))),
            in_use: AtomicUsize::new(0),
        }
    }
}

impl<T> ObjectPool<T> {
    /// Acquire a slot behind an RAII guard; the slot returns to the
    /// freelist when the guard drops. `None` when the pool is drained.
    pub fn acquire(&self) -> Option<PoolRef<'_, T>> {
        self.try_acquire().map(|idx| PoolRef { pool: self, idx })
    }

    /// Pop a free slot index, or `None` when the pool is drained.
    pub fn try_acquire(&self) -> Option<u32> {
        let mut head = self.free_head.load(Ordering::Acquire);

        loop {
            let idx = head as u32;
            if idx == NIL {
                return None;
            }

            let tag = (head >> 32) as u32;
            let next = self.slots[idx as usize].free_next.load(Ordering::Acquire);

            match self.free_head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.in_use.fetch_add(1, Ordering::Relaxed);
                    return Some(idx);
                }
                Err(actual) => head = actual,
            }
        }
    }

    /// Return a slot to the freelist.
    ///
    /// The index must come from [`try_acquire`](Self::try_acquire) on
    /// this pool and must not be released twice.
    pub fn release(&self, idx: u32) {
        debug_assert!((idx as usize) < self.slots.len());
        let mut head = self.free_head.load(Ordering::Acquire);

        loop {
            self.slots[idx as usize]
                .free_next
                .store(head as u32, Ordering::Relaxed);

            let tag = (head >> 32) as u32;
            match self.free_head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), idx),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.in_use.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
                Err(actual) => head = actual,
            }
        }
    }

    /// Raw pointer to a slot's value. The caller must hold the slot via
    /// `try_acquire` for any access beyond the pool's own atomics.
    pub fn slot_ptr(&self, idx: u32) -> *mut T {
        self.slots[idx as usize].value.get()
    }

    /// Number of slots currently acquired.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.free_head.load(Ordering::Acquire) as u32 == NIL
    }
}

/// Exclusive handle to an acquired pool slot.
///
/// Holds the slot for its lifetime and pushes it back onto the freelist
/// on drop. For manual index management (e.g. linking slots into a
/// structure) use [`ObjectPool::try_acquire`] instead.
pub struct PoolRef<'a, T> {
    pool: &'a ObjectPool<T>,
    idx: u32,
}

impl<T> PoolRef<'_, T> {
    /// Slot index, stable while the guard is held.
    pub fn index(&self) -> u32 {
        self.idx
    }
}

impl<T> Deref for PoolRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // The freelist hands each index to one holder at a time.
        unsafe { &*self.pool.slot_ptr(self.idx) }
    }
}

impl<T> DerefMut for PoolRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.pool.slot_ptr(self.idx) }
    }
}

impl<T> Drop for PoolRef<'_, T> {
    fn drop(&mut self) {
        self.pool.release(self.idx);
    }
}
