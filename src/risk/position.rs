//! Per-symbol position, VWAP and realized-PnL bookkeeping.

use crate::core::types::{notional, Price, Quantity, Side, Trade, Value, PRICE_SCALE};
use serde::{Deserialize, Serialize};

/// Running position state for one symbol.
///
/// Position deltas follow the trade's aggressor side: this engine is
/// modelled as the aggressor of every trade it observes. VWAP is
/// volume-weighted over all fills; realized PnL accrues only on
/// position-reducing fills, against the VWAP before the fill.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionTracker {
    pub position: i64,
    pub notional: Value,
    pub realized_pnl: i64,
    pub vwap: Price,
    pub volume: Quantity,
    pub order_count_today: u32,
}

/// Read-only view of a tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub position: i64,
    pub notional: Value,
    pub pnl: i64,
    pub vwap: Price,
    pub order_count: u32,
}

impl PositionTracker {
    /// Fold an executed trade into the position.
    pub fn apply_trade(&mut self, trade: &Trade) {
        let quantity = trade.quantity;
        let delta = match trade.aggressor_side {
            Side::Buy => quantity as i64,
            Side::Sell => -(quantity as i64),
        };

        let old_position = self.position;
        let entry_vwap = self.vwap;
        self.position += delta;

        // VWAP over all fills, weighted by executed volume.
        let old_volume = self.volume;
        self.volume += quantity;
        if self.volume > 0 {
            self.vwap = ((entry_vwap as u128 * old_volume as u128
                + trade.price as u128 * quantity as u128)
                / self.volume as u128) as Price;
        }

        let reducing = (old_position > 0 && delta < 0) || (old_position < 0 && delta > 0);
        if reducing && entry_vwap > 0 {
            // Only the closed fraction realizes PnL; a fill that crosses
            // zero opens a fresh position with the excess.
            let closed = quantity.min(old_position.unsigned_abs());
            let pnl = if old_position > 0 {
                (trade.price as i128 - entry_vwap as i128) * closed as i128
            } else {
                (entry_vwap as i128 - trade.price as i128) * closed as i128
            } / PRICE_SCALE as i128;
            self.realized_pnl += pnl as i64;
        }

        let expanding = (self.position > 0 && delta > 0) || (self.position < 0 && delta < 0);
        if expanding && !reducing {
            self.notional += notional(trade.price, quantity);
        } else if reducing {
            // Shrink proportionally to the closed fraction, floor division.
            let closed = quantity.min(old_position.unsigned_abs());
            let reduction = (self.notional as u128 * closed as u128
                / old_position.unsigned_abs() as u128) as Value;
            self.notional = self.notional.saturating_sub(reduction);

            // Excess past zero opens exposure on the other side.
            let opened = quantity - closed;
            if opened > 0 {
                self.notional += notional(trade.price, opened);
            }
        }
    }

    pub fn info(&self) -> PositionInfo {
        PositionInfo {
            position: self.position,
            notional: self.notional,
            pnl: self.realized_pnl,
            vwap: self.vwap,
            order_count: self.order_count_today,
        }
    }
}
