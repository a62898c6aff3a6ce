//! Market-data ingress: decode, normalize, and fan out per symbol.

use super::protocol::{self, Message, ParseError};
use crate::book::{BookManager, BookSnapshot};
use crate::core::clock::Clock;
use crate::core::queue::SpscQueue;
use crate::core::types::{Side, SymbolId, Tick};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

type TickHandler = Arc<dyn Fn(&Tick) + Send + Sync>;
type SnapshotHandler = Arc<dyn Fn(SymbolId, &BookSnapshot) + Send + Sync>;

/// Ingress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStats {
    pub messages_received: u64,
    pub messages_processed: u64,
    pub parse_errors: u64,
    pub messages_dropped: u64,
    pub active_symbols: u64,
}

struct SymbolWorker {
    queue: Arc<SpscQueue<Tick>>,
    sequence: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Decodes raw frames and routes ticks onto per-symbol SPSC queues, each
/// drained by its own aggregation worker thread.
///
/// The wire receiver is external: callers feed frames in through
/// [`process_raw_message`](Self::process_raw_message). Frames for a
/// given symbol must arrive from a single thread (the tick queues are
/// single-producer). Malformed frames are counted and dropped; ticks
/// for unsubscribed symbols are ignored.
pub struct MarketDataGateway {
    workers: DashMap<SymbolId, Arc<SymbolWorker>>,
    books: Arc<BookManager>,
    clock: Arc<Clock>,
    queue_capacity: usize,
    tick_handler: RwLock<Option<TickHandler>>,
    snapshot_handler: RwLock<Option<SnapshotHandler>>,
    received: AtomicU64,
    processed: AtomicU64,
    parse_errors: AtomicU64,
}

impl MarketDataGateway {
    pub fn new(books: Arc<BookManager>, clock: Arc<Clock>, queue_capacity: usize) -> Self {
        Self {
            workers: DashMap::new(),
            books,
            clock,
            queue_capacity,
            tick_handler: RwLock::new(None),
            snapshot_handler: RwLock::new(None),
            received: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
        }
    }

    /// Called after each tick has been applied to its book.
    ///
    /// Register before subscribing symbols: each worker captures the
    /// handler when it starts.
    pub fn set_tick_handler(&self, handler: impl Fn(&Tick) + Send + Sync + 'static) {
        *self.tick_handler.write() = Some(Arc::new(handler));
    }

    /// Called after a snapshot has rebuilt a book.
    pub fn set_snapshot_handler(
        &self,
        handler: impl Fn(SymbolId, &BookSnapshot) + Send + Sync + 'static,
    ) {
        *self.snapshot_handler.write() = Some(Arc::new(handler));
    }

    /// Spawn the aggregation worker for a symbol.
    pub fn subscribe_symbol(&self, symbol_id: SymbolId) {
        if self.workers.contains_key(&symbol_id) {
            return;
        }

        let worker = Arc::new(SymbolWorker {
            queue: Arc::new(SpscQueue::with_capacity(self.queue_capacity)),
            sequence: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            running: Arc::new(AtomicBool::new(true)),
            handle: Mutex::new(None),
        });

        let queue = Arc::clone(&worker.queue);
        let running = Arc::clone(&worker.running);
        let stats = Arc::clone(&worker);
        let books = Arc::clone(&self.books);
        let tick_handler = self.tick_handler.read().clone();

        let handle = std::thread::Builder::new()
            .name(format!("md-worker-{symbol_id}"))
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    match queue.try_pop() {
                        Some(tick) => {
                            books.apply_tick(&tick);
                            if let Some(handler) = tick_handler.as_ref() {
                                handler(&tick);
                            }
                            stats.processed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => std::thread::yield_now(),
                    }
                }
            })
            .expect("spawn market-data worker");

        *worker.handle.lock() = Some(handle);
        self.workers.insert(symbol_id, worker);
        info!(symbol_id, "subscribed symbol");
    }

    /// Stop and join a symbol's worker.
    pub fn unsubscribe_symbol(&self, symbol_id: SymbolId) {
        if let Some((_, worker)) = self.workers.remove(&symbol_id) {
            worker.running.store(false, Ordering::Release);
            if let Some(handle) = worker.handle.lock().take() {
                let _ = handle.join();
            }
            info!(symbol_id, "unsubscribed symbol");
        }
    }

    /// Stop all symbol workers. Idempotent.
    pub fn stop(&self) {
        let symbols: Vec<SymbolId> = self.workers.iter().map(|entry| *entry.key()).collect();
        for symbol_id in symbols {
            self.unsubscribe_symbol(symbol_id);
        }
    }

    pub fn subscribed_symbols(&self) -> Vec<SymbolId> {
        self.workers.iter().map(|entry| *entry.key()).collect()
    }

    /// Decode one raw frame and route it.
    pub fn process_raw_message(&self, buf: &[u8]) {
        self.received.fetch_add(1, Ordering::Relaxed);

        match protocol::decode_message(buf) {
            Ok(Message::Incremental(_, update)) => {
                let Some(worker) = self.workers.get(&update.symbol_id) else {
                    return; // not subscribed
                };

                let tick = Tick {
                    symbol_id: update.symbol_id,
                    price: update.price,
                    quantity: update.quantity,
                    side: update.side,
                    timestamp: self.clock.now(),
                    sequence: worker.sequence.fetch_add(1, Ordering::Relaxed) + 1,
                };

                if worker.queue.try_push(tick).is_err() {
                    worker.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(symbol_id = update.symbol_id, "tick queue full, dropping");
                } else {
                    self.processed.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(Message::Snapshot(_, snapshot)) => {
                let book = self.books.get_or_create(snapshot.symbol_id);
                let levels: Vec<(u64, u64, Side)> = snapshot
                    .levels
                    .iter()
                    .map(|level| (level.price, level.quantity, level.side))
                    .collect();
                book.apply_snapshot(&levels);
                self.processed.fetch_add(1, Ordering::Relaxed);

                if let Some(handler) = self.snapshot_handler.read().as_ref() {
                    handler(snapshot.symbol_id, &book.snapshot());
                }
            }
            Err(error) => {
                self.count_parse_error(error);
            }
        }
    }

    fn count_parse_error(&self, error: ParseError) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        debug!(%error, "dropped malformed frame");
    }

    /// Ticks dropped on a symbol's queue overflow.
    pub fn dropped_for(&self, symbol_id: SymbolId) -> u64 {
        self.workers
            .get(&symbol_id)
            .map(|worker| worker.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn stats(&self) -> GatewayStats {
        let dropped: u64 = self
            .workers
            .iter()
            .map(|entry| entry.dropped.load(Ordering::Relaxed))
            .sum();

        GatewayStats {
            messages_received: self.received.load(Ordering::Relaxed),
            messages_processed: self.processed.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            messages_dropped: dropped,
            active_symbols: self.workers.len() as u64,
        }
    }
}

impl Drop for MarketDataGateway {
    fn drop(&mut self) {
        self.stop();
    }
}
