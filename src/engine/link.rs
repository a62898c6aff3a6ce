//! Order-submission capability handed to strategies.

use crate::core::clock::Clock;
use crate::core::queue::MpscQueue;
use crate::core::types::{
    Order, OrderCommand, OrderId, Price, Quantity, Side, SymbolId, TimeInForce,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cheap, cloneable handle into the engine's order ingress.
///
/// Generated order ids live in their own range so they never collide
/// with client-assigned ids. Submissions count toward the engine's
/// `orders_received` like any client order.
#[derive(Clone)]
pub struct OrderLink {
    ingress: Arc<MpscQueue<OrderCommand>>,
    next_order_id: Arc<AtomicU64>,
    orders_received: Arc<AtomicU64>,
    clock: Arc<Clock>,
}

impl OrderLink {
    pub(crate) fn new(
        ingress: Arc<MpscQueue<OrderCommand>>,
        next_order_id: Arc<AtomicU64>,
        orders_received: Arc<AtomicU64>,
        clock: Arc<Clock>,
    ) -> Self {
        Self {
            ingress,
            next_order_id,
            orders_received,
            clock,
        }
    }

    fn next_id(&self) -> OrderId {
        self.next_order_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Submit a prepared order; stamps id and timestamp when unset.
    /// Returns `false` iff the ingress queue rejected it.
    pub fn submit(&self, mut order: Order) -> bool {
        if order.order_id == 0 {
            order.order_id = self.next_id();
        }
        if order.timestamp == 0 {
            order.timestamp = self.clock.now();
        }

        self.orders_received.fetch_add(1, Ordering::Relaxed);
        self.ingress.try_push(OrderCommand::Submit(order)).is_ok()
    }

    /// Build and submit a limit order, returning its generated id.
    pub fn submit_limit(
        &self,
        symbol_id: SymbolId,
        side: Side,
        price: Price,
        quantity: Quantity,
        time_in_force: TimeInForce,
    ) -> Option<OrderId> {
        let order_id = self.next_id();
        let mut order = Order::limit(order_id, symbol_id, side, price, quantity, time_in_force);
        order.timestamp = self.clock.now();

        self.orders_received.fetch_add(1, Ordering::Relaxed);
        self.ingress
            .try_push(OrderCommand::Submit(order))
            .is_ok()
            .then_some(order_id)
    }

    /// Request a cancel. Returns `false` iff the ingress queue is full.
    pub fn cancel(&self, order_id: OrderId) -> bool {
        self.ingress.try_push(OrderCommand::Cancel(order_id)).is_ok()
    }
}
