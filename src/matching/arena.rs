//! Slot arena backing the matcher's resting orders.
//!
//! Orders live in a fixed slab addressed by `u32` index, with intrusive
//! `prev`/`next` links for the FIFO list inside each price level. The
//! matcher is single-threaded, so the arena needs no atomics; exhaustion
//! surfaces as `None` from [`OrderArena::insert`] and the caller degrades.

use crate::core::types::{Order, Side, TimeInForce};

struct Entry {
    order: Order,
    prev: Option<u32>,
    next: Option<u32>,
    free_next: Option<u32>,
    in_use: bool,
}

/// Fixed-capacity order slab with an internal free list.
pub struct OrderArena {
    entries: Vec<Entry>,
    free_head: Option<u32>,
    in_use: usize,
}

impl OrderArena {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "arena capacity must be non-zero");
        assert!(
            capacity < u32::MAX as usize,
            "arena capacity exceeds index range"
        );

        let entries = (0..capacity)
            .map(|i| Entry {
                order: Order::limit(0, 0, Side::Buy, 0, 0, TimeInForce::Gtc),
                prev: None,
                next: None,
                free_next: if i + 1 < capacity {
                    Some(i as u32 + 1)
                } else {
                    None
                },
                in_use: false,
            })
            .collect();

        Self {
            entries,
            free_head: Some(0),
            in_use: 0,
        }
    }

    /// Claim a slot for `order`; `None` when the arena is exhausted.
    pub fn insert(&mut self, order: Order) -> Option<u32> {
        let idx = self.free_head?;
        let entry = &mut self.entries[idx as usize];

        self.free_head = entry.free_next;
        entry.order = order;
        entry.prev = None;
        entry.next = None;
        entry.in_use = true;
        self.in_use += 1;

        Some(idx)
    }

    /// Release a slot, returning its order.
    pub fn remove(&mut self, idx: u32) -> Order {
        let entry = &mut self.entries[idx as usize];
        debug_assert!(entry.in_use, "releasing a free arena slot");

        entry.in_use = false;
        entry.free_next = self.free_head;
        self.free_head = Some(idx);
        self.in_use -= 1;

        entry.order
    }

    pub fn get(&self, idx: u32) -> &Order {
        let entry = &self.entries[idx as usize];
        debug_assert!(entry.in_use);
        &entry.order
    }

    pub fn get_mut(&mut self, idx: u32) -> &mut Order {
        let entry = &mut self.entries[idx as usize];
        debug_assert!(entry.in_use);
        &mut entry.order
    }

    pub fn next(&self, idx: u32) -> Option<u32> {
        self.entries[idx as usize].next
    }

    /// Append a slot to the tail of a FIFO list.
    pub fn push_back(&mut self, head: &mut Option<u32>, tail: &mut Option<u32>, idx: u32) {
        self.entries[idx as usize].prev = *tail;
        self.entries[idx as usize].next = None;

        match *tail {
            Some(old_tail) => self.entries[old_tail as usize].next = Some(idx),
            None => *head = Some(idx),
        }
        *tail = Some(idx);
    }

    /// Unlink a slot from anywhere in a FIFO list in O(1).
    pub fn unlink(&mut self, head: &mut Option<u32>, tail: &mut Option<u32>, idx: u32) {
        let (prev, next) = {
            let entry = &self.entries[idx as usize];
            (entry.prev, entry.next)
        };

        match prev {
            Some(p) => self.entries[p as usize].next = next,
            None => *head = next,
        }
        match next {
            Some(n) => self.entries[n as usize].prev = prev,
            None => *tail = prev,
        }

        let entry = &mut self.entries[idx as usize];
        entry.prev = None;
        entry.next = None;
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.in_use
    }

    pub fn is_empty(&self) -> bool {
        self.in_use == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.free_head.is_none()
    }
}
