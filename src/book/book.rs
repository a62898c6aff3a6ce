//! Per-symbol L2 depth book with a lock-free read path for best prices.

use super::ladder::{DepthLevel, Ladder};
use super::snapshot::BookSnapshot;
use crate::core::types::{Price, Quantity, Side, SymbolId};
use crossbeam_utils::CachePadded;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds for snapshot stamps; latency paths use the
/// engine clock instead.
fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Sentinel stored in the ask atom while the ask side is empty.
const NO_ASK: u64 = u64::MAX;

/// L2 depth book maintained from a tick stream.
///
/// One writer per symbol (the aggregation worker) mutates the ladders
/// under a side lock; readers of best prices go straight to the atomics
/// and never block. Deep reads (`bid_levels`, `ask_levels`) take the
/// shared side lock.
pub struct DepthBook {
    symbol_id: SymbolId,
    bids: RwLock<Ladder>,
    asks: RwLock<Ladder>,
    best_bid: CachePadded<AtomicU64>,
    best_ask: CachePadded<AtomicU64>,
    best_bid_qty: AtomicU64,
    best_ask_qty: AtomicU64,
    version: CachePadded<AtomicU64>,
}

impl DepthBook {
    pub fn new(symbol_id: SymbolId, max_levels: usize) -> Self {
        Self {
            symbol_id,
            bids: RwLock::new(Ladder::new(Side::Buy, max_levels)),
            asks: RwLock::new(Ladder::new(Side::Sell, max_levels)),
            best_bid: CachePadded::new(AtomicU64::new(0)),
            best_ask: CachePadded::new(AtomicU64::new(NO_ASK)),
            best_bid_qty: AtomicU64::new(0),
            best_ask_qty: AtomicU64::new(0),
            version: CachePadded::new(AtomicU64::new(0)),
        }
    }

    pub fn symbol_id(&self) -> SymbolId {
        self.symbol_id
    }

    /// Apply an absolute quantity at a price level, then republish the
    /// best-price atomics and bump the version.
    pub fn update_level(&self, side: Side, price: Price, quantity: Quantity) {
        match side {
            Side::Buy => {
                let mut bids = self.bids.write();
                bids.update(price, quantity);
                self.publish_bid(bids.best());
            }
            Side::Sell => {
                let mut asks = self.asks.write();
                asks.update(price, quantity);
                self.publish_ask(asks.best());
            }
        }
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Replace the whole book with snapshot contents.
    pub fn apply_snapshot(&self, levels: &[(Price, Quantity, Side)]) {
        {
            let mut bids = self.bids.write();
            let mut asks = self.asks.write();

            bids.clear();
            asks.clear();
            for &(price, quantity, side) in levels {
                match side {
                    Side::Buy => bids.update(price, quantity),
                    Side::Sell => asks.update(price, quantity),
                }
            }

            self.publish_bid(bids.best());
            self.publish_ask(asks.best());
        }
        self.version.fetch_add(1, Ordering::Release);
    }

    fn publish_bid(&self, best: Option<DepthLevel>) {
        match best {
            Some(level) => {
                self.best_bid.store(level.price, Ordering::Release);
                self.best_bid_qty.store(level.quantity, Ordering::Release);
            }
            None => {
                self.best_bid.store(0, Ordering::Release);
                self.best_bid_qty.store(0, Ordering::Release);
            }
        }
    }

    fn publish_ask(&self, best: Option<DepthLevel>) {
        match best {
            Some(level) => {
                self.best_ask.store(level.price, Ordering::Release);
                self.best_ask_qty.store(level.quantity, Ordering::Release);
            }
            None => {
                self.best_ask.store(NO_ASK, Ordering::Release);
                self.best_ask_qty.store(0, Ordering::Release);
            }
        }
    }

    /// Best bid price, if any. Never blocks.
    pub fn best_bid(&self) -> Option<Price> {
        match self.best_bid.load(Ordering::Acquire) {
            0 => None,
            price => Some(price),
        }
    }

    /// Best ask price, if any. Never blocks.
    pub fn best_ask(&self) -> Option<Price> {
        match self.best_ask.load(Ordering::Acquire) {
            NO_ASK => None,
            price => Some(price),
        }
    }

    /// Best-price snapshot built from the atomics.
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            symbol_id: self.symbol_id,
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            best_bid_qty: self.best_bid_qty.load(Ordering::Acquire),
            best_ask_qty: self.best_ask_qty.load(Ordering::Acquire),
            version: self.version.load(Ordering::Acquire),
            timestamp: wall_clock_millis(),
        }
    }

    /// Monotone change counter; bumped after every mutation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2),
            _ => None,
        }
    }

    pub fn spread_bps(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        let mid = (bid + ask) / 2;
        if mid == 0 {
            return None;
        }
        Some(ask.saturating_sub(bid) as f64 / mid as f64 * 10_000.0)
    }

    /// Whether the displayed book is crossed (bid at or above ask).
    pub fn is_crossed(&self) -> bool {
        matches!(
            (self.best_bid(), self.best_ask()),
            (Some(bid), Some(ask)) if bid >= ask
        )
    }

    /// Top `depth` bid levels, best first. Takes the shared side lock.
    pub fn bid_levels(&self, depth: usize) -> Vec<DepthLevel> {
        self.bids.read().top(depth)
    }

    /// Top `depth` ask levels, best first. Takes the shared side lock.
    pub fn ask_levels(&self, depth: usize) -> Vec<DepthLevel> {
        self.asks.read().top(depth)
    }

    pub fn bid_quantity(&self, price: Price) -> Option<Quantity> {
        self.bids.read().quantity_at(price)
    }

    pub fn ask_quantity(&self, price: Price) -> Option<Quantity> {
        self.asks.read().quantity_at(price)
    }

    pub fn depth(&self) -> (usize, usize) {
        (self.bids.read().len(), self.asks.read().len())
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.bids.read().is_consistent() && self.asks.read().is_consistent()
    }
}
