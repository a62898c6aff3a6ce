//! Fixed-size lock-free queues connecting the pipeline stages.
//!
//! All queues are bounded, power-of-two sized, and non-blocking: `try_push`
//! hands the value back inside [`PushError`] instead of waiting, and
//! `try_pop` returns `None` on empty. Backpressure in the engine is
//! expressed entirely through these return values.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

use super::pool::ObjectPool;

/// Number of tiers in a [`PriorityQueue`]. Priority 0 is the most urgent.
pub const NUM_PRIORITIES: u8 = 4;

/// A rejected push, carrying the value back to the caller.
pub enum PushError<T> {
    /// The ring is full; retry later or drop.
    Full(T),
    /// The backing node pool is drained (MPSC queues only).
    Exhausted(T),
}

impl<T> PushError<T> {
    /// Recover the value that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(value) | PushError::Exhausted(value) => value,
        }
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => write!(f, "Full(..)"),
            PushError::Exhausted(_) => write!(f, "Exhausted(..)"),
        }
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => write!(f, "queue is full"),
            PushError::Exhausted(_) => write!(f, "queue node pool is exhausted"),
        }
    }
}

impl<T> std::error::Error for PushError<T> {}

fn assert_capacity(capacity: usize) {
    assert!(
        capacity >= 2 && capacity.is_power_of_two(),
        "queue capacity must be a power of two >= 2, got {capacity}"
    );
}

/// Single-producer single-consumer ring buffer.
///
/// `try_push` and `try_pop` are wait-free. One slot is reserved to
/// distinguish full from empty, so the usable capacity is `size - 1`.
/// Exactly one thread may push and exactly one thread may pop.
pub struct SpscQueue<T> {
    mask: usize,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T> SpscQueue<T> {
    /// Create a queue over a ring of `size` slots.
    pub fn with_capacity(size: usize) -> Self {
        assert_capacity(size);
        let buffer = (0..size)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            mask: size - 1,
            buffer,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueue a value; fails with `Full` when the ring has no free slot.
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) & self.mask;

        if next == self.head.load(Ordering::Acquire) {
            return Err(PushError::Full(value));
        }

        unsafe {
            (*self.buffer[tail].get()).write(value);
        }
        self.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Dequeue the oldest value, if any.
    pub fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);

        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        let value = unsafe { (*self.buffer[head].get()).assume_init_read() };
        self.head.store((head + 1) & self.mask, Ordering::Release);
        Some(value)
    }

    /// Number of values currently queued.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head) & self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        let next = (self.tail.load(Ordering::Acquire) + 1) & self.mask;
        next == self.head.load(Ordering::Acquire)
    }

    /// Usable capacity (one ring slot is reserved).
    pub fn capacity(&self) -> usize {
        self.mask
    }
}

impl<T> Drop for SpscQueue<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

const NIL: u32 = u32::MAX;

/// Node for [`MpscQueue`], stored inside an [`ObjectPool`].
pub(crate) struct MpscNode<T> {
    next: AtomicU32,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for MpscNode<T> {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(NIL),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Multi-producer single-consumer intrusive queue over a bounded node pool.
///
/// Producers exchange the tail and publish through the previous tail's
/// `next` link; the single consumer walks the linkage starting from a
/// stub node. When the node pool is drained, `try_push` fails with
/// [`PushError::Exhausted`] instead of allocating.
pub struct MpscQueue<T> {
    pool: ObjectPool<MpscNode<T>>,
    stub: u32,
    head: CachePadded<AtomicU32>,
    tail: CachePadded<AtomicU32>,
}

unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
    /// Create a queue backed by `capacity` pooled nodes (plus a stub).
    pub fn with_capacity(capacity: usize) -> Self {
        assert_capacity(capacity);
        // One extra node serves as the permanent stub.
        let pool = ObjectPool::with_capacity(capacity + 1);
        let stub = pool.try_acquire().expect("fresh pool cannot be empty");
        Self {
            pool,
            stub,
            head: CachePadded::new(AtomicU32::new(stub)),
            tail: CachePadded::new(AtomicU32::new(stub)),
        }
    }

    fn node(&self, idx: u32) -> *mut MpscNode<T> {
        self.pool.slot_ptr(idx)
    }

    /// Enqueue a value; fails with `Exhausted` when no pooled node is free.
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        let idx = match self.pool.try_acquire() {
            Some(idx) => idx,
            None => return Err(PushError::Exhausted(value)),
        };

        unsafe {
            let node = self.node(idx);
            (*node).value.get().write(MaybeUninit::new(value));
            (*node).next.store(NIL, Ordering::Relaxed);
        }

        let prev = self.tail.swap(idx, Ordering::AcqRel);
        unsafe {
            (*self.node(prev)).next.store(idx, Ordering::Release);
        }
        Ok(())
    }

    /// Dequeue the oldest value, if any. Single consumer only.
    pub fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Acquire);
        let next = unsafe { (*self.node(head)).next.load(Ordering::Acquire) };

        if next == NIL {
            return None;
        }

        let value = unsafe { (*(*self.node(next)).value.get()).assume_init_read() };
        self.head.store(next, Ordering::Release);

        // The stub stays out of the pool for the queue's whole life.
        if head != self.stub {
            self.pool.release(head);
        }

        Some(value)
    }

    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        unsafe { (*self.node(head)).next.load(Ordering::Acquire) == NIL }
    }

    /// Number of pooled nodes, i.e. the maximum queue depth.
    pub fn capacity(&self) -> usize {
        self.pool.capacity() - 1
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

struct MpmcCell<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded multi-producer multi-consumer queue.
///
/// Each cell carries a sequence number; producers claim a position by CAS
/// once the cell's sequence matches, write, and publish `seq = pos + 1`.
/// Consumers mirror the protocol at `seq == pos + 1`. Operations are
/// linearizable and never block.
pub struct MpmcQueue<T> {
    mask: usize,
    buffer: Box<[MpmcCell<T>]>,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        assert_capacity(capacity);
        let buffer = (0..capacity)
            .map(|i| MpmcCell {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            mask: capacity - 1,
            buffer,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);

        loop {
            let cell = &self.buffer[pos & self.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let dif = seq as isize - pos as isize;

            if dif == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe {
                            (*cell.value.get()).write(value);
                        }
                        cell.sequence.store(pos + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(actual) => pos = actual,
                }
            } else if dif < 0 {
                return Err(PushError::Full(value));
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);

        loop {
            let cell = &self.buffer[pos & self.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let dif = seq as isize - (pos + 1) as isize;

            if dif == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*cell.value.get()).assume_init_read() };
                        cell.sequence.store(pos + self.mask + 1, Ordering::Release);
                        return Some(value);
                    }
                    Err(actual) => pos = actual,
                }
            } else if dif < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let pos = self.dequeue_pos.load(Ordering::Acquire);
        let seq = self.buffer[pos & self.mask].sequence.load(Ordering::Acquire);
        seq <= pos
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

struct PriorityTier<T> {
    queue: SpscQueue<T>,
    count: AtomicU32,
}

/// Priority lanes between one producer and one consumer.
///
/// [`NUM_PRIORITIES`] SPSC tiers indexed by priority (0 = most urgent)
/// plus a shared "highest non-empty tier" hint that lets `try_pop` skip
/// empty tiers most of the time. Order within a tier is strict FIFO.
pub struct PriorityQueue<T> {
    tiers: [PriorityTier<T>; NUM_PRIORITIES as usize],
    highest: AtomicU8,
}

impl<T> PriorityQueue<T> {
    /// Create a queue where each tier holds `tier_size` ring slots.
    pub fn with_tier_capacity(tier_size: usize) -> Self {
        Self {
            tiers: std::array::from_fn(|_| PriorityTier {
                queue: SpscQueue::with_capacity(tier_size),
                count: AtomicU32::new(0),
            }),
            highest: AtomicU8::new(NUM_PRIORITIES),
        }
    }

    /// Enqueue at `priority`, clamped to the lowest tier on overflow.
    pub fn try_push(&self, value: T, priority: u8) -> Result<(), PushError<T>> {
        let priority = priority.min(NUM_PRIORITIES - 1);
        let tier = &self.tiers[priority as usize];

        tier.queue.try_push(value)?;
        tier.count.fetch_add(1, Ordering::Relaxed);

        let mut current = self.highest.load(Ordering::Acquire);
        while priority < current {
            match self.highest.compare_exchange_weak(
                current,
                priority,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        Ok(())
    }

    /// Dequeue from the most urgent non-empty tier.
    pub fn try_pop(&self) -> Option<T> {
        let start = self.highest.load(Ordering::Acquire);

        for p in start..NUM_PRIORITIES {
            let tier = &self.tiers[p as usize];
            if let Some(value) = tier.queue.try_pop() {
                tier.count.fetch_sub(1, Ordering::Relaxed);

                if p == start && tier.count.load(Ordering::Acquire) == 0 {
                    self.advance_hint(p);
                }

                return Some(value);
            }
        }

        None
    }

    pub fn is_empty(&self) -> bool {
        self.tiers
            .iter()
            .all(|tier| tier.count.load(Ordering::Acquire) == 0)
    }

    fn advance_hint(&self, drained: u8) {
        let mut next = NUM_PRIORITIES;
        for p in drained + 1..NUM_PRIORITIES {
            if self.tiers[p as usize].count.load(Ordering::Acquire) > 0 {
                next = p;
                break;
            }
        }
        self.highest.store(next, Ordering::Release);
    }
}
