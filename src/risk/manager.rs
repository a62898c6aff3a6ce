//! The pre-trade risk gate.

use super::limits::{RiskLimits, RiskVerdict};
use super::position::{PositionInfo, PositionTracker};
use super::rate::TokenBucket;
use crate::core::clock::Clock;
use crate::core::types::{notional, Order, OrderKind, Price, Side, SymbolId, Trade};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Default per-symbol admission rate (tokens per second / burst).
const SYMBOL_RATE: u32 = 100;
const SYMBOL_BURST: u32 = 100;

/// Counters over every check performed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskStats {
    pub orders_checked: u64,
    pub orders_approved: u64,
    pub orders_rejected: u64,
    pub approval_rate: f64,
}

/// Pre-trade checks plus position/PnL bookkeeping driven by fills.
///
/// `check_order` samples position state under the shared lock;
/// `update_position` takes it exclusively. Rate limiters and reference
/// prices live in lock-free structures beside the lock.
pub struct RiskManager {
    limits: RiskLimits,
    positions: RwLock<HashMap<SymbolId, PositionTracker>>,
    global_bucket: TokenBucket,
    symbol_buckets: DashMap<SymbolId, TokenBucket>,
    reference_prices: DashMap<SymbolId, Price>,
    clock: Arc<Clock>,
    checked: AtomicU64,
    approved: AtomicU64,
    rejected: AtomicU64,
}

impl RiskManager {
    pub fn new(limits: RiskLimits, clock: Arc<Clock>) -> Self {
        Self {
            global_bucket: TokenBucket::new(limits.max_orders_per_second, limits.order_burst),
            limits,
            positions: RwLock::new(HashMap::new()),
            symbol_buckets: DashMap::new(),
            reference_prices: DashMap::new(),
            clock,
            checked: AtomicU64::new(0),
            approved: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Run the full pre-trade check against the engine clock.
    pub fn check_order(&self, order: &Order) -> RiskVerdict {
        self.check_order_at(order, self.clock.now_nanos())
    }

    /// Run the full pre-trade check at an explicit time.
    pub fn check_order_at(&self, order: &Order, now_nanos: u64) -> RiskVerdict {
        self.checked.fetch_add(1, Ordering::Relaxed);

        let verdict = self.evaluate(order, now_nanos);
        if verdict.is_approved() {
            self.approved.fetch_add(1, Ordering::Relaxed);
            self.positions
                .write()
                .entry(order.symbol_id)
                .or_default()
                .order_count_today += 1;
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            trace!(order_id = order.order_id, %verdict, "order rejected");
        }

        verdict
    }

    fn evaluate(&self, order: &Order, now_nanos: u64) -> RiskVerdict {
        if !self.global_bucket.try_acquire(now_nanos) {
            return RiskVerdict::RejectedRateLimit;
        }

        let symbol_bucket = self
            .symbol_buckets
            .entry(order.symbol_id)
            .or_insert_with(|| TokenBucket::new(SYMBOL_RATE, SYMBOL_BURST));
        if !symbol_bucket.try_acquire(now_nanos) {
            return RiskVerdict::RejectedRateLimit;
        }
        drop(symbol_bucket);

        if order.quantity > self.limits.max_order_size {
            return RiskVerdict::RejectedOrderSize;
        }

        // Market orders carry sentinel prices and cross at any level, so
        // the deviation check only applies to priced orders.
        if order.kind != OrderKind::Market {
            if let Some(reference) = self.reference_price(order.symbol_id) {
                if reference > 0 && order.price.abs_diff(reference) > self.limits.max_price_deviation
                {
                    return RiskVerdict::RejectedPriceLimit;
                }
            }
        }

        let positions = self.positions.read();
        let (position, held_notional, pnl) = positions
            .get(&order.symbol_id)
            .map(|tracker| (tracker.position, tracker.notional, tracker.realized_pnl))
            .unwrap_or_default();

        let delta = match order.side {
            Side::Buy => order.quantity as i64,
            Side::Sell => -(order.quantity as i64),
        };
        let new_position = position + delta;

        if new_position.unsigned_abs() > self.limits.max_position {
            return RiskVerdict::RejectedPositionLimit;
        }

        // Notional cap binds only when the order grows the position.
        if (new_position > 0 && delta > 0) || (new_position < 0 && delta < 0) {
            let order_price = if order.kind == OrderKind::Market {
                self.reference_price(order.symbol_id).unwrap_or(0)
            } else {
                order.price
            };
            if order_price > 0 {
                let order_notional = notional(order_price, order.quantity);
                if held_notional + order_notional > self.limits.max_notional {
                    return RiskVerdict::RejectedNotionalLimit;
                }
            }
        }

        if pnl < -(self.limits.max_loss_per_day as i64) {
            return RiskVerdict::RejectedLossLimit;
        }

        RiskVerdict::Approved
    }

    /// Fold an executed trade into the position table.
    pub fn update_position(&self, trade: &Trade) {
        self.positions
            .write()
            .entry(trade.symbol_id)
            .or_default()
            .apply_trade(trade);
    }

    /// Set the last-trade price used by the deviation check.
    pub fn update_reference_price(&self, symbol_id: SymbolId, price: Price) {
        self.reference_prices.insert(symbol_id, price);
    }

    pub fn reference_price(&self, symbol_id: SymbolId) -> Option<Price> {
        self.reference_prices.get(&symbol_id).map(|entry| *entry)
    }

    pub fn position_info(&self, symbol_id: SymbolId) -> PositionInfo {
        self.positions
            .read()
            .get(&symbol_id)
            .map(|tracker| tracker.info())
            .unwrap_or_default()
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn stats(&self) -> RiskStats {
        let checked = self.checked.load(Ordering::Relaxed);
        let approved = self.approved.load(Ordering::Relaxed);

        RiskStats {
            orders_checked: checked,
            orders_approved: approved,
            orders_rejected: self.rejected.load(Ordering::Relaxed),
            approval_rate: if checked > 0 {
                approved as f64 / checked as f64
            } else {
                0.0
            },
        }
    }
}
