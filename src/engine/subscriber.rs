//! Typed event subscribers.

use crate::book::BookSnapshot;
use crate::core::types::{Order, SymbolId, Tick, Trade};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by subscriber registration.
pub type SubscriberId = u64;

/// Receives engine events. Every method defaults to a no-op, so an
/// implementation only overrides the events it cares about.
pub trait EventSink: Send + Sync {
    /// A tick was applied to its symbol's book.
    fn on_tick(&self, _tick: &Tick) {}

    /// A trade was executed and fanned out.
    fn on_trade(&self, _trade: &Trade) {}

    /// A snapshot rebuilt a symbol's book.
    fn on_book_snapshot(&self, _symbol_id: SymbolId, _snapshot: &BookSnapshot) {}

    /// An order changed status (accepted, filled, cancelled, rejected).
    fn on_order_update(&self, _order: &Order) {}
}

/// Engine events in channel form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    Tick(Tick),
    Trade(Trade),
    BookSnapshot(SymbolId, BookSnapshot),
    OrderUpdate(Order),
}

/// Forwards every event into a bounded channel; full channels drop the
/// event rather than stall the pipeline.
pub struct ChannelSink {
    sender: crossbeam_channel::Sender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(sender: crossbeam_channel::Sender<EngineEvent>) -> Self {
        Self { sender }
    }

    /// Convenience constructor: a sink and its receiving end.
    pub fn bounded(capacity: usize) -> (Self, crossbeam_channel::Receiver<EngineEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelSink {
    fn on_tick(&self, tick: &Tick) {
        let _ = self.sender.try_send(EngineEvent::Tick(*tick));
    }

    fn on_trade(&self, trade: &Trade) {
        let _ = self.sender.try_send(EngineEvent::Trade(*trade));
    }

    fn on_book_snapshot(&self, symbol_id: SymbolId, snapshot: &BookSnapshot) {
        let _ = self
            .sender
            .try_send(EngineEvent::BookSnapshot(symbol_id, *snapshot));
    }

    fn on_order_update(&self, order: &Order) {
        let _ = self.sender.try_send(EngineEvent::OrderUpdate(*order));
    }
}

/// Registered sinks, fanned to in registration order.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    sinks: RwLock<Vec<(SubscriberId, Arc<dyn EventSink>)>>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub(crate) fn register(&self, sink: Arc<dyn EventSink>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.sinks.write().push((id, sink));
        id
    }

    pub(crate) fn unregister(&self, id: SubscriberId) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|(sink_id, _)| *sink_id != id);
        sinks.len() != before
    }

    pub(crate) fn emit_tick(&self, tick: &Tick) {
        for (_, sink) in self.sinks.read().iter() {
            sink.on_tick(tick);
        }
    }

    pub(crate) fn emit_trade(&self, trade: &Trade) {
        for (_, sink) in self.sinks.read().iter() {
            sink.on_trade(trade);
        }
    }

    pub(crate) fn emit_book_snapshot(&self, symbol_id: SymbolId, snapshot: &BookSnapshot) {
        for (_, sink) in self.sinks.read().iter() {
            sink.on_book_snapshot(symbol_id, snapshot);
        }
    }

    pub(crate) fn emit_order_update(&self, order: &Order) {
        for (_, sink) in self.sinks.read().iter() {
            sink.on_order_update(order);
        }
    }
}
