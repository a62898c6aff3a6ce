//! Best-price snapshot published by the depth book.

use crate::core::types::{Price, Quantity, SymbolId};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a symbol's best prices.
///
/// Built entirely from the book's atomics, so taking one never blocks
/// the writer. `version` pairs reads: two snapshots with the same
/// version saw the same book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol_id: SymbolId,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub best_bid_qty: Quantity,
    pub best_ask_qty: Quantity,
    pub version: u64,
    /// Milliseconds since UNIX epoch
    pub timestamp: u64,
}

impl BookSnapshot {
    /// Mid price, when both sides are present.
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2),
            _ => None,
        }
    }

    /// Spread in absolute price units.
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// Spread in basis points of the mid price.
    pub fn spread_bps(&self) -> Option<f64> {
        let spread = self.spread()?;
        let mid = self.mid_price()?;
        if mid == 0 {
            return None;
        }
        Some(spread as f64 / mid as f64 * 10_000.0)
    }
}
