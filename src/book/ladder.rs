//! One side of a depth book: a bounded sorted array of price levels.

use crate::core::types::{Price, Quantity, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Aggregated quantity at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: u32,
}

/// Sorted level array with a price-to-index map for O(1) lookup.
///
/// Bids are kept descending, asks ascending, so index 0 is always the
/// best price. The ladder is a display cache capped at `max_levels`:
/// levels worse than the worst stored price are dropped once the cap is
/// reached (the authoritative order record lives in the matcher). The
/// index map and the array are kept consistent within every call.
pub(crate) struct Ladder {
    side: Side,
    max_levels: usize,
    levels: Vec<DepthLevel>,
    index: HashMap<Price, usize>,
}

impl Ladder {
    pub(crate) fn new(side: Side, max_levels: usize) -> Self {
        Self {
            side,
            max_levels,
            levels: Vec::with_capacity(max_levels.min(256)),
            index: HashMap::with_capacity(max_levels.min(256)),
        }
    }

    /// Apply an absolute quantity for `price`: zero removes the level,
    /// an existing price is overwritten, a new price is inserted in
    /// sorted position.
    pub(crate) fn update(&mut self, price: Price, quantity: Quantity) {
        if let Some(&at) = self.index.get(&price) {
            if quantity == 0 {
                self.remove_at(at, price);
            } else {
                self.levels[at].quantity = quantity;
            }
            return;
        }

        if quantity == 0 {
            return;
        }

        let at = match self.side {
            Side::Buy => self.levels.partition_point(|level| level.price > price),
            Side::Sell => self.levels.partition_point(|level| level.price < price),
        };

        if self.levels.len() >= self.max_levels {
            if at >= self.levels.len() {
                trace!(side = %self.side, price, "depth cap reached, dropping level");
                return;
            }
            // Better than the worst stored level: evict the tail to make room.
            let evicted = self.levels.pop().expect("ladder is non-empty at cap");
            self.index.remove(&evicted.price);
        }

        self.levels.insert(
            at,
            DepthLevel {
                price,
                quantity,
                order_count: 1,
            },
        );
        self.reindex_from(at);
    }

    fn remove_at(&mut self, at: usize, price: Price) {
        self.levels.remove(at);
        self.index.remove(&price);
        self.reindex_from(at);
    }

    fn reindex_from(&mut self, at: usize) {
        for i in at..self.levels.len() {
            self.index.insert(self.levels[i].price, i);
        }
    }

    pub(crate) fn best(&self) -> Option<DepthLevel> {
        self.levels.first().copied()
    }

    pub(crate) fn quantity_at(&self, price: Price) -> Option<Quantity> {
        self.index.get(&price).map(|&at| self.levels[at].quantity)
    }

    pub(crate) fn top(&self, depth: usize) -> Vec<DepthLevel> {
        self.levels.iter().take(depth).copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.levels.len()
    }

    pub(crate) fn clear(&mut self) {
        self.levels.clear();
        self.index.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.levels.len() == self.index.len()
            && self
                .levels
                .iter()
                .enumerate()
                .all(|(i, level)| self.index.get(&level.price) == Some(&i))
            && self.levels.windows(2).all(|pair| match self.side {
                Side::Buy => pair[0].price > pair[1].price,
                Side::Sell => pair[0].price < pair[1].price,
            })
    }
}
