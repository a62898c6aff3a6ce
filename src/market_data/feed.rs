//! Deterministic synthetic market-data source for demos and tests.

use super::protocol::{encode_incremental, IncrementalUpdate};
use crate::core::types::{Price, Side, SymbolId};

/// Generates a repeatable stream of valid incremental frames: a price
/// that walks a small range around `base_price`, alternating sides.
pub struct SyntheticFeed {
    symbol_id: SymbolId,
    base_price: Price,
    tick_size: Price,
    count: u64,
}

impl SyntheticFeed {
    pub fn new(symbol_id: SymbolId, base_price: Price, tick_size: Price) -> Self {
        Self {
            symbol_id,
            base_price,
            tick_size,
            count: 0,
        }
    }

    /// Produce the next encoded frame.
    pub fn next_frame(&mut self) -> Vec<u8> {
        let count = self.count;
        self.count += 1;

        let update = IncrementalUpdate {
            symbol_id: self.symbol_id,
            price: self.base_price + (count % 100) * self.tick_size,
            quantity: 1_000 + (count % 5_000),
            side: if count % 2 == 0 { Side::Buy } else { Side::Sell },
            exchange_timestamp: count,
        };

        encode_incremental(count as u32, &update)
    }

    pub fn frames_produced(&self) -> u64 {
        self.count
    }
}
