//! Mean-reversion strategy: fade z-score extremes of recent prices.

use super::Strategy;
use crate::book::BookSnapshot;
use crate::core::clock::Clock;
use crate::core::queue::SpscQueue;
use crate::core::ring::HistoryBuffer;
use crate::core::types::{
    from_scaled_price, Price, Quantity, Side, SymbolId, Tick, TimeInForce, Trade,
};
use crate::engine::OrderLink;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeanReversionParams {
    /// Ticks of history required before signalling
    pub lookback: usize,
    /// Entry threshold in standard deviations
    pub entry_threshold: f64,
    /// Exit threshold in standard deviations
    pub exit_threshold: f64,
    pub max_position: Quantity,
    pub base_size: Quantity,
    /// Minimum displayed spread worth trading, in basis points
    pub min_spread_bps: f64,
    /// Minimum interval between signals, nanoseconds
    pub min_signal_interval_ns: u64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            lookback: 20,
            entry_threshold: 2.0,
            exit_threshold: 0.5,
            max_position: 1_000,
            base_size: 100,
            min_spread_bps: 5.0,
            min_signal_interval_ns: 1_000_000,
        }
    }
}

struct MeanState {
    history: HistoryBuffer<Price>,
    position: i64,
    last_signal_ns: u64,
    spread_tradeable: bool,
}

/// Buys z-score lows and sells z-score highs, flattening near the mean.
pub struct MeanReversionStrategy {
    symbol_id: SymbolId,
    params: MeanReversionParams,
    ticks: SpscQueue<Tick>,
    trades: SpscQueue<Trade>,
    snapshots: SpscQueue<BookSnapshot>,
    enabled: AtomicBool,
    signal_count: AtomicU64,
    clock: Arc<Clock>,
    state: Mutex<MeanState>,
}

impl MeanReversionStrategy {
    pub fn new(symbol_id: SymbolId, params: MeanReversionParams, clock: Arc<Clock>) -> Self {
        let lookback = params.lookback.next_power_of_two().max(2);
        Self {
            symbol_id,
            params,
            ticks: SpscQueue::with_capacity(1024),
            trades: SpscQueue::with_capacity(256),
            snapshots: SpscQueue::with_capacity(128),
            enabled: AtomicBool::new(true),
            signal_count: AtomicU64::new(0),
            clock,
            state: Mutex::new(MeanState {
                history: HistoryBuffer::with_capacity(lookback.max(128)),
                position: 0,
                last_signal_ns: 0,
                spread_tradeable: true,
            }),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn position(&self) -> i64 {
        self.state.lock().position
    }

    pub fn signal_count(&self) -> u64 {
        self.signal_count.load(Ordering::Relaxed)
    }

    fn mean_and_std(history: &HistoryBuffer<Price>) -> (f64, f64) {
        let count = history.len();
        let mut sum = 0.0;
        for price in history.iter() {
            sum += from_scaled_price(price);
        }
        let mean = sum / count as f64;

        let mut variance_sum = 0.0;
        for price in history.iter() {
            let diff = from_scaled_price(price) - mean;
            variance_sum += diff * diff;
        }
        (mean, (variance_sum / count as f64).sqrt())
    }

    fn desired_size(&self, side: Side, position: i64) -> Quantity {
        let max = self.params.max_position as i64;
        match side {
            Side::Buy => {
                if position >= max {
                    0
                } else {
                    self.params.base_size.min((max - position) as Quantity)
                }
            }
            Side::Sell => {
                if position <= -max {
                    0
                } else if position > 0 {
                    self.params.base_size.min(position as Quantity)
                } else {
                    self.params.base_size.min((max + position) as Quantity)
                }
            }
        }
    }

    fn signal_for(&self, z_score: f64, position: i64) -> Option<Side> {
        if position == 0 {
            if z_score < -self.params.entry_threshold {
                return Some(Side::Buy);
            }
            if z_score > self.params.entry_threshold {
                return Some(Side::Sell);
            }
        } else if position > 0 {
            if z_score > -self.params.exit_threshold {
                return Some(Side::Sell);
            }
        } else if z_score < self.params.exit_threshold {
            return Some(Side::Buy);
        }
        None
    }
}

impl Strategy for MeanReversionStrategy {
    fn symbol_id(&self) -> SymbolId {
        self.symbol_id
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn on_market_data(&self, tick: &Tick) {
        if !self.is_enabled() {
            return;
        }
        // Lookback is a sliding window; dropping under burst is acceptable.
        let _ = self.ticks.try_push(*tick);
    }

    fn on_trade(&self, trade: &Trade) {
        let _ = self.trades.try_push(*trade);
    }

    fn on_book_snapshot(&self, snapshot: &BookSnapshot) {
        let _ = self.snapshots.try_push(*snapshot);
    }

    fn process_signals(&self, link: &OrderLink) {
        let mut state = self.state.lock();

        while let Some(trade) = self.trades.try_pop() {
            if trade.symbol_id == self.symbol_id {
                match trade.aggressor_side {
                    Side::Buy => state.position += trade.quantity as i64,
                    Side::Sell => state.position -= trade.quantity as i64,
                }
            }
        }

        while let Some(snapshot) = self.snapshots.try_pop() {
            state.spread_tradeable = match snapshot.spread_bps() {
                Some(bps) => bps >= self.params.min_spread_bps,
                None => true,
            };
        }

        while let Some(tick) = self.ticks.try_pop() {
            state.history.push(tick.price);
            if state.history.len() < self.params.lookback || !state.spread_tradeable {
                continue;
            }

            let (mean, std_dev) = Self::mean_and_std(&state.history);
            if std_dev <= 0.0 {
                continue;
            }

            let z_score = (from_scaled_price(tick.price) - mean) / std_dev;
            let Some(side) = self.signal_for(z_score, state.position) else {
                continue;
            };

            let now = self.clock.now_nanos();
            if now.saturating_sub(state.last_signal_ns) < self.params.min_signal_interval_ns {
                continue;
            }

            let size = self.desired_size(side, state.position);
            if size == 0 {
                continue;
            }

            if link
                .submit_limit(self.symbol_id, side, tick.price, size, TimeInForce::Ioc)
                .is_some()
            {
                state.last_signal_ns = now;
                self.signal_count.fetch_add(1, Ordering::Relaxed);
                trace!(symbol_id = self.symbol_id, %side, z_score, "signal");
            }
        }
    }
}
