//! Price/time-priority matching engine.
//!
//! A single-threaded actor owning two price ladders. Bids are keyed by
//! `Reverse<Price>` so forward iteration always walks best-first; each
//! level holds a FIFO of resting orders linked through the slot arena.
//! The matcher is the serialization point of the pipeline: everything it
//! emits is totally ordered.

use super::arena::OrderArena;
use crate::core::clock::Clock;
use crate::core::types::{
    Order, OrderId, OrderKind, OrderStatus, Price, Quantity, Side, TimeInForce, Trade,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// FIFO of resting orders at one price.
struct PriceLevel {
    total_quantity: Quantity,
    order_count: u32,
    head: Option<u32>,
    tail: Option<u32>,
}

impl PriceLevel {
    fn new() -> Self {
        Self {
            total_quantity: 0,
            order_count: 0,
            head: None,
            tail: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.order_count == 0
    }
}

/// Result of processing one incoming order.
#[derive(Debug)]
pub struct MatchOutcome {
    /// Trades emitted, in match order (best price outward, FIFO within level)
    pub trades: Vec<Trade>,
    pub fully_matched: bool,
    /// Id of the remainder now resting in the book, if any
    pub resting_id: Option<OrderId>,
    /// Set when the arena ran out of slots and the remainder was dropped.
    /// Trades already emitted stay durable.
    pub capacity_exhausted: bool,
}

/// Best prices and level counts of the matcher's own book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookState {
    pub best_bid: Price,
    pub best_ask: Price,
    pub best_bid_qty: Quantity,
    pub best_ask_qty: Quantity,
    pub bid_levels: u32,
    pub ask_levels: u32,
}

/// Matching throughput counters, shared with stats readers.
#[derive(Debug, Default)]
pub struct MatchCounters {
    pub orders_processed: AtomicU64,
    pub trades_generated: AtomicU64,
    pub volume_matched: AtomicU64,
}

/// Snapshot of the matching counters with derived rates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchingStats {
    pub orders_processed: u64,
    pub trades_generated: u64,
    pub volume_matched: u64,
    pub match_rate: f64,
    pub avg_fill_size: f64,
}

impl MatchCounters {
    pub fn snapshot(&self) -> MatchingStats {
        let orders = self.orders_processed.load(Ordering::Relaxed);
        let trades = self.trades_generated.load(Ordering::Relaxed);
        let volume = self.volume_matched.load(Ordering::Relaxed);

        MatchingStats {
            orders_processed: orders,
            trades_generated: trades,
            volume_matched: volume,
            match_rate: if orders > 0 {
                trades as f64 / orders as f64
            } else {
                0.0
            },
            avg_fill_size: if trades > 0 {
                volume as f64 / trades as f64
            } else {
                0.0
            },
        }
    }
}

type TradeHook = Box<dyn FnMut(&Trade) + Send>;
type OrderHook = Box<dyn FnMut(&Order) + Send>;

/// The matching engine.
///
/// Owned and driven by exactly one thread; trades and order updates are
/// delivered through the registered hooks as they happen, and the trades
/// of each call are also returned in the [`MatchOutcome`].
pub struct MatchEngine {
    bids: BTreeMap<Reverse<Price>, PriceLevel>,
    asks: BTreeMap<Price, PriceLevel>,
    arena: OrderArena,
    lookup: HashMap<OrderId, u32>,
    next_trade_id: u64,
    counters: Arc<MatchCounters>,
    clock: Arc<Clock>,
    trade_hook: Option<TradeHook>,
    order_hook: Option<OrderHook>,
}

/// The later-arriving order is the aggressor.
fn aggressor_side(buy_ts: u64, sell_ts: u64) -> Side {
    if buy_ts > sell_ts {
        Side::Buy
    } else {
        Side::Sell
    }
}

impl MatchEngine {
    /// Create an engine whose book can rest up to `capacity` orders.
    pub fn new(capacity: usize, clock: Arc<Clock>) -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            arena: OrderArena::with_capacity(capacity),
            lookup: HashMap::with_capacity(capacity),
            next_trade_id: 1,
            counters: Arc::new(MatchCounters::default()),
            clock,
            trade_hook: None,
            order_hook: None,
        }
    }

    /// Shared handle to the throughput counters.
    pub fn counters(&self) -> Arc<MatchCounters> {
        Arc::clone(&self.counters)
    }

    pub fn set_trade_hook(&mut self, hook: impl FnMut(&Trade) + Send + 'static) {
        self.trade_hook = Some(Box::new(hook));
    }

    pub fn set_order_hook(&mut self, hook: impl FnMut(&Order) + Send + 'static) {
        self.order_hook = Some(Box::new(hook));
    }

    /// Match an incoming order against resting liquidity.
    ///
    /// Sweeps the opposite side best-price outward, FIFO within each
    /// level, trading at the resting order's price. Unmatched remainders
    /// rest for `Day`/`Gtc` limit orders, and are cancelled for `Ioc` and
    /// market orders. `Fok` orders match in full or not at all.
    pub fn process_order(&mut self, order: Order) -> MatchOutcome {
        self.counters.orders_processed.fetch_add(1, Ordering::Relaxed);
        let mut taker = order;

        if taker.time_in_force == TimeInForce::Fok && !self.fok_can_fill(&taker) {
            trace!(order_id = taker.order_id, "FOK order cannot fill, killing");
            taker.status = OrderStatus::Cancelled;
            self.emit_order(&taker);
            return MatchOutcome {
                trades: Vec::new(),
                fully_matched: false,
                resting_id: None,
                capacity_exhausted: false,
            };
        }

        let trades = match taker.side {
            Side::Buy => self.sweep_asks(&mut taker),
            Side::Sell => self.sweep_bids(&mut taker),
        };

        let mut outcome = MatchOutcome {
            trades,
            fully_matched: taker.is_filled(),
            resting_id: None,
            capacity_exhausted: false,
        };

        if !taker.is_filled() {
            let no_rest =
                taker.kind == OrderKind::Market || taker.time_in_force == TimeInForce::Ioc;

            if no_rest {
                taker.status = OrderStatus::Cancelled;
            } else if self.rest_order(taker) {
                outcome.resting_id = Some(taker.order_id);
            } else {
                warn!(
                    order_id = taker.order_id,
                    "order arena exhausted, dropping remainder"
                );
                outcome.capacity_exhausted = true;
                taker.status = OrderStatus::Cancelled;
            }
        }

        self.emit_order(&taker);
        outcome
    }

    /// Cancel a resting order in O(1). Returns `false` for unknown ids,
    /// with no side effects.
    pub fn cancel_order(&mut self, order_id: OrderId) -> bool {
        let Some(&idx) = self.lookup.get(&order_id) else {
            return false;
        };

        let mut order = *self.arena.get(idx);

        match order.side {
            Side::Buy => {
                let key = Reverse(order.price);
                let emptied = {
                    let level = self.bids.get_mut(&key).expect("resting order has a level");
                    self.arena.unlink(&mut level.head, &mut level.tail, idx);
                    level.total_quantity -= order.open_quantity();
                    level.order_count -= 1;
                    level.is_empty()
                };
                if emptied {
                    self.bids.remove(&key);
                }
            }
            Side::Sell => {
                let emptied = {
                    let level = self
                        .asks
                        .get_mut(&order.price)
                        .expect("resting order has a level");
                    self.arena.unlink(&mut level.head, &mut level.tail, idx);
                    level.total_quantity -= order.open_quantity();
                    level.order_count -= 1;
                    level.is_empty()
                };
                if emptied {
                    self.asks.remove(&order.price);
                }
            }
        }

        self.lookup.remove(&order_id);
        self.arena.remove(idx);

        order.status = OrderStatus::Cancelled;
        trace!(order_id, "cancelled resting order");
        self.emit_order(&order);
        true
    }

    /// Best prices and level counts. Zeros when a side is empty.
    pub fn book_state(&self) -> BookState {
        let mut state = BookState {
            bid_levels: self.bids.len() as u32,
            ask_levels: self.asks.len() as u32,
            ..BookState::default()
        };

        if let Some((key, level)) = self.bids.iter().next() {
            state.best_bid = key.0;
            state.best_bid_qty = level.total_quantity;
        }
        if let Some((&price, level)) = self.asks.iter().next() {
            state.best_ask = price;
            state.best_ask_qty = level.total_quantity;
        }

        state
    }

    pub fn stats(&self) -> MatchingStats {
        self.counters.snapshot()
    }

    /// Number of orders currently resting in the book.
    pub fn resting_orders(&self) -> usize {
        self.lookup.len()
    }

    fn emit_order(&mut self, order: &Order) {
        if let Some(hook) = self.order_hook.as_mut() {
            hook(order);
        }
    }

    /// Whether crossable liquidity covers a FOK order in full.
    fn fok_can_fill(&self, taker: &Order) -> bool {
        let mut available: Quantity = 0;

        match taker.side {
            Side::Buy => {
                for (&price, level) in self.asks.iter() {
                    if price > taker.price {
                        break;
                    }
                    available += level.total_quantity;
                    if available >= taker.quantity {
                        return true;
                    }
                }
            }
            Side::Sell => {
                for (key, level) in self.bids.iter() {
                    if key.0 < taker.price {
                        break;
                    }
                    available += level.total_quantity;
                    if available >= taker.quantity {
                        return true;
                    }
                }
            }
        }

        available >= taker.quantity
    }

    fn sweep_asks(&mut self, taker: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();

        while taker.open_quantity() > 0 {
            let Some(mut level_entry) = self.asks.first_entry() else {
                break;
            };
            let level_price = *level_entry.key();
            if level_price > taker.price {
                break;
            }

            let level = level_entry.get_mut();
            let mut cursor = level.head;

            while let Some(idx) = cursor {
                if taker.open_quantity() == 0 {
                    break;
                }
                cursor = self.arena.next(idx);

                let fill = {
                    let maker = self.arena.get_mut(idx);
                    let fill = taker.open_quantity().min(maker.open_quantity());
                    maker.apply_fill(fill);
                    fill
                };
                taker.apply_fill(fill);
                level.total_quantity -= fill;

                let maker = *self.arena.get(idx);
                let trade_id = self.next_trade_id;
                self.next_trade_id += 1;

                let trade = Trade {
                    trade_id,
                    buy_order_id: taker.order_id,
                    sell_order_id: maker.order_id,
                    symbol_id: taker.symbol_id,
                    price: level_price,
                    quantity: fill,
                    timestamp: self.clock.now(),
                    aggressor_side: aggressor_side(taker.timestamp, maker.timestamp),
                };

                self.counters.trades_generated.fetch_add(1, Ordering::Relaxed);
                self.counters.volume_matched.fetch_add(fill, Ordering::Relaxed);

                if maker.is_filled() {
                    self.arena.unlink(&mut level.head, &mut level.tail, idx);
                    level.order_count -= 1;
                    self.lookup.remove(&maker.order_id);
                    self.arena.remove(idx);
                }

                if let Some(hook) = self.trade_hook.as_mut() {
                    hook(&trade);
                }
                if let Some(hook) = self.order_hook.as_mut() {
                    hook(&maker);
                }
                trades.push(trade);
            }

            if level.is_empty() {
                level_entry.remove();
            } else {
                break;
            }
        }

        trades
    }

    fn sweep_bids(&mut self, taker: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();

        while taker.open_quantity() > 0 {
            let Some(mut level_entry) = self.bids.first_entry() else {
                break;
            };
            let level_price = level_entry.key().0;
            if level_price < taker.price {
                break;
            }

            let level = level_entry.get_mut();
            let mut cursor = level.head;

            while let Some(idx) = cursor {
                if taker.open_quantity() == 0 {
                    break;
                }
                cursor = self.arena.next(idx);

                let fill = {
                    let maker = self.arena.get_mut(idx);
                    let fill = taker.open_quantity().min(maker.open_quantity());
                    maker.apply_fill(fill);
                    fill
                };
                taker.apply_fill(fill);
                level.total_quantity -= fill;

                let maker = *self.arena.get(idx);
                let trade_id = self.next_trade_id;
                self.next_trade_id += 1;

                let trade = Trade {
                    trade_id,
                    buy_order_id: maker.order_id,
                    sell_order_id: taker.order_id,
                    symbol_id: taker.symbol_id,
                    price: level_price,
                    quantity: fill,
                    timestamp: self.clock.now(),
                    aggressor_side: aggressor_side(maker.timestamp, taker.timestamp),
                };

                self.counters.trades_generated.fetch_add(1, Ordering::Relaxed);
                self.counters.volume_matched.fetch_add(fill, Ordering::Relaxed);

                if maker.is_filled() {
                    self.arena.unlink(&mut level.head, &mut level.tail, idx);
                    level.order_count -= 1;
                    self.lookup.remove(&maker.order_id);
                    self.arena.remove(idx);
                }

                if let Some(hook) = self.trade_hook.as_mut() {
                    hook(&trade);
                }
                if let Some(hook) = self.order_hook.as_mut() {
                    hook(&maker);
                }
                trades.push(trade);
            }

            if level.is_empty() {
                level_entry.remove();
            } else {
                break;
            }
        }

        trades
    }

    /// Rest an order remainder in its own side at its own price.
    fn rest_order(&mut self, order: Order) -> bool {
        let Some(idx) = self.arena.insert(order) else {
            return false;
        };

        let level = match order.side {
            Side::Buy => self
                .bids
                .entry(Reverse(order.price))
                .or_insert_with(PriceLevel::new),
            Side::Sell => self.asks.entry(order.price).or_insert_with(PriceLevel::new),
        };

        self.arena.push_back(&mut level.head, &mut level.tail, idx);
        level.total_quantity += order.open_quantity();
        level.order_count += 1;
        self.lookup.insert(order.order_id, idx);

        trace!(
            order_id = order.order_id,
            price = order.price,
            open = order.open_quantity(),
            "rested order"
        );
        true
    }

    /// Walk every level and cross-check totals against the arena.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let mut listed = 0usize;

        let check_side = |levels: Vec<(&PriceLevel, Price)>, listed: &mut usize| -> bool {
            for (level, price) in levels {
                let mut quantity: Quantity = 0;
                let mut count = 0u32;
                let mut cursor = level.head;
                while let Some(idx) = cursor {
                    let order = self.arena.get(idx);
                    if order.price != price {
                        return false;
                    }
                    quantity += order.open_quantity();
                    count += 1;
                    cursor = self.arena.next(idx);
                }
                if quantity != level.total_quantity || count != level.order_count || count == 0 {
                    return false;
                }
                *listed += count as usize;
            }
            true
        };

        let bids: Vec<_> = self.bids.iter().map(|(k, v)| (v, k.0)).collect();
        let asks: Vec<_> = self.asks.iter().map(|(k, v)| (v, *k)).collect();

        check_side(bids, &mut listed)
            && check_side(asks, &mut listed)
            && listed == self.lookup.len()
            && listed == self.arena.len()
    }
}
