//! The pipeline orchestrator: owns every component and worker thread.

use super::config::EngineConfig;
use super::error::EngineError;
use super::link::OrderLink;
use super::stats::EngineStats;
use super::subscriber::{EventSink, SubscriberId, SubscriberSet};
use crate::book::{BookManager, DepthBook};
use crate::core::clock::Clock;
use crate::core::queue::{MpscQueue, SpscQueue};
use crate::core::types::{Order, OrderCommand, OrderId, OrderStatus, SymbolId, Trade};
use crate::market_data::{MarketDataGateway, SyntheticFeed};
use crate::matching::{MatchCounters, MatchEngine};
use crate::risk::{PositionInfo, RiskManager, RiskStats};
use crate::strategy::Strategy;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Order ids generated for strategies start here, clear of client ranges.
const GENERATED_ID_BASE: u64 = 1 << 32;

#[derive(Default)]
struct Workers {
    feed: Option<JoinHandle<()>>,
    risk: Option<JoinHandle<()>>,
    matcher: Option<JoinHandle<()>>,
    fanout: Option<JoinHandle<()>>,
    strategy: Option<JoinHandle<()>>,
}

/// The trading engine.
///
/// Wires market-data ingress, the risk gate, the matcher and trade
/// fan-out together with typed queues, one worker thread per stage.
/// All facilities (clock, books, counters) are owned here; there is no
/// process-wide state.
pub struct TradingEngine {
    config: EngineConfig,
    clock: Arc<Clock>,
    books: Arc<BookManager>,
    gateway: Arc<MarketDataGateway>,
    risk: Arc<RiskManager>,
    subscribers: Arc<SubscriberSet>,
    strategies: Arc<RwLock<Vec<Arc<dyn Strategy>>>>,
    ingress: Arc<MpscQueue<OrderCommand>>,
    approved: Arc<SpscQueue<OrderCommand>>,
    trades: Arc<MpscQueue<Trade>>,
    matcher: Mutex<Option<MatchEngine>>,
    match_counters: Arc<MatchCounters>,
    next_order_id: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    feed_running: Arc<AtomicBool>,
    started: AtomicBool,
    stopped: AtomicBool,
    orders_received: Arc<AtomicU64>,
    orders_processed: Arc<AtomicU64>,
    orders_rejected: Arc<AtomicU64>,
    trades_executed: Arc<AtomicU64>,
    workers: Mutex<Workers>,
    start_time: Mutex<Option<Instant>>,
}

impl TradingEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let clock = Arc::new(
            Clock::with_calibration(
                config.clock_calibration_samples,
                Duration::from_millis(config.clock_calibration_window_ms),
            )
            .map_err(|_| EngineError::ClockUnavailable)?,
        );
        let books = Arc::new(BookManager::new(config.book_depth));
        let gateway = Arc::new(MarketDataGateway::new(
            Arc::clone(&books),
            Arc::clone(&clock),
            config.tick_queue_capacity,
        ));
        let risk = Arc::new(RiskManager::new(config.risk, Arc::clone(&clock)));
        let subscribers = Arc::new(SubscriberSet::default());
        let strategies: Arc<RwLock<Vec<Arc<dyn Strategy>>>> = Arc::new(RwLock::new(Vec::new()));

        let matcher = MatchEngine::new(config.arena_capacity, Arc::clone(&clock));
        let match_counters = matcher.counters();

        let engine = Self {
            ingress: Arc::new(MpscQueue::with_capacity(config.ingress_capacity)),
            approved: Arc::new(SpscQueue::with_capacity(config.approved_capacity)),
            trades: Arc::new(MpscQueue::with_capacity(config.trade_capacity)),
            matcher: Mutex::new(Some(matcher)),
            match_counters,
            next_order_id: Arc::new(AtomicU64::new(GENERATED_ID_BASE)),
            running: Arc::new(AtomicBool::new(false)),
            feed_running: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            orders_received: Arc::new(AtomicU64::new(0)),
            orders_processed: Arc::new(AtomicU64::new(0)),
            orders_rejected: Arc::new(AtomicU64::new(0)),
            trades_executed: Arc::new(AtomicU64::new(0)),
            workers: Mutex::new(Workers::default()),
            start_time: Mutex::new(None),
            config,
            clock,
            books,
            gateway,
            risk,
            subscribers,
            strategies,
        };

        engine.wire_gateway();
        Ok(engine)
    }

    /// Route gateway events to subscribers and per-symbol strategies.
    fn wire_gateway(&self) {
        let subscribers = Arc::clone(&self.subscribers);
        let strategies = Arc::clone(&self.strategies);
        self.gateway.set_tick_handler(move |tick| {
            subscribers.emit_tick(tick);
            for strategy in strategies.read().iter() {
                if strategy.symbol_id() == tick.symbol_id && strategy.is_enabled() {
                    strategy.on_market_data(tick);
                }
            }
        });

        let subscribers = Arc::clone(&self.subscribers);
        let strategies = Arc::clone(&self.strategies);
        self.gateway.set_snapshot_handler(move |symbol_id, snapshot| {
            subscribers.emit_book_snapshot(symbol_id, snapshot);
            for strategy in strategies.read().iter() {
                if strategy.symbol_id() == symbol_id && strategy.is_enabled() {
                    strategy.on_book_snapshot(snapshot);
                }
            }
        });
    }

    /// Launch the worker threads and subscribe configured symbols.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyRunning);
        }

        *self.start_time.lock() = Some(Instant::now());
        self.running.store(true, Ordering::Release);

        for &symbol_id in &self.config.symbols {
            self.gateway.subscribe_symbol(symbol_id);
        }

        let mut workers = self.workers.lock();
        workers.risk = Some(self.spawn_risk_worker());
        workers.matcher = Some(self.spawn_matcher_worker());
        workers.fanout = Some(self.spawn_fanout_worker());
        workers.strategy = Some(self.spawn_strategy_worker());
        if self.config.synthetic_feed {
            self.feed_running.store(true, Ordering::Release);
            workers.feed = Some(self.spawn_feed_worker());
        }

        info!(symbols = self.config.symbols.len(), "engine started");
        Ok(())
    }

    fn spawn_risk_worker(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let ingress = Arc::clone(&self.ingress);
        let approved = Arc::clone(&self.approved);
        let risk = Arc::clone(&self.risk);
        let subscribers = Arc::clone(&self.subscribers);
        let orders_rejected = Arc::clone(&self.orders_rejected);

        std::thread::Builder::new()
            .name("risk-worker".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    match ingress.try_pop() {
                        Some(OrderCommand::Submit(mut order)) => {
                            if risk.check_order(&order).is_approved() {
                                if approved.try_push(OrderCommand::Submit(order)).is_err() {
                                    // Backpressure from the matcher.
                                    orders_rejected.fetch_add(1, Ordering::Relaxed);
                                    order.status = OrderStatus::Rejected;
                                    subscribers.emit_order_update(&order);
                                }
                            } else {
                                orders_rejected.fetch_add(1, Ordering::Relaxed);
                                order.status = OrderStatus::Rejected;
                                subscribers.emit_order_update(&order);
                            }
                        }
                        Some(OrderCommand::Cancel(order_id)) => {
                            if approved.try_push(OrderCommand::Cancel(order_id)).is_err() {
                                warn!(order_id, "approved queue full, cancel dropped");
                            }
                        }
                        None => std::thread::yield_now(),
                    }
                }
            })
            .expect("spawn risk worker")
    }

    fn spawn_matcher_worker(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let approved = Arc::clone(&self.approved);
        let trades = Arc::clone(&self.trades);
        let subscribers = Arc::clone(&self.subscribers);
        let orders_processed = Arc::clone(&self.orders_processed);

        let mut matcher = self
            .matcher
            .lock()
            .take()
            .expect("matcher present until first start");

        {
            let trades = Arc::clone(&trades);
            matcher.set_trade_hook(move |trade| {
                if trades.try_push(*trade).is_err() {
                    warn!(trade_id = trade.trade_id, "trade queue full, dropping");
                }
            });
        }
        {
            let subscribers = Arc::clone(&subscribers);
            matcher.set_order_hook(move |order| {
                subscribers.emit_order_update(order);
            });
        }

        std::thread::Builder::new()
            .name("matcher-worker".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    match approved.try_pop() {
                        Some(OrderCommand::Submit(order)) => {
                            matcher.process_order(order);
                            orders_processed.fetch_add(1, Ordering::Relaxed);
                        }
                        Some(OrderCommand::Cancel(order_id)) => {
                            matcher.cancel_order(order_id);
                        }
                        None => std::thread::yield_now(),
                    }
                }
            })
            .expect("spawn matcher worker")
    }

    fn spawn_fanout_worker(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let trades = Arc::clone(&self.trades);
        let risk = Arc::clone(&self.risk);
        let subscribers = Arc::clone(&self.subscribers);
        let strategies = Arc::clone(&self.strategies);
        let trades_executed = Arc::clone(&self.trades_executed);

        std::thread::Builder::new()
            .name("trade-fanout".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    match trades.try_pop() {
                        Some(trade) => {
                            risk.update_position(&trade);
                            risk.update_reference_price(trade.symbol_id, trade.price);
                            trades_executed.fetch_add(1, Ordering::Relaxed);

                            subscribers.emit_trade(&trade);
                            for strategy in strategies.read().iter() {
                                if strategy.symbol_id() == trade.symbol_id
                                    && strategy.is_enabled()
                                {
                                    strategy.on_trade(&trade);
                                }
                            }
                        }
                        None => std::thread::yield_now(),
                    }
                }
            })
            .expect("spawn trade fan-out worker")
    }

    fn spawn_strategy_worker(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let strategies = Arc::clone(&self.strategies);
        let link = self.order_link();

        std::thread::Builder::new()
            .name("strategy-worker".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    for strategy in strategies.read().iter() {
                        if strategy.is_enabled() {
                            strategy.process_signals(&link);
                        }
                    }
                    std::thread::sleep(Duration::from_micros(100));
                }
            })
            .expect("spawn strategy worker")
    }

    fn spawn_feed_worker(&self) -> JoinHandle<()> {
        let feed_running = Arc::clone(&self.feed_running);
        let gateway = Arc::clone(&self.gateway);
        let interval = Duration::from_micros(self.config.feed_interval_us);
        let mut feeds: Vec<SyntheticFeed> = self
            .config
            .symbols
            .iter()
            .map(|&symbol_id| SyntheticFeed::new(symbol_id, self.config.feed_base_price, 1_000_000))
            .collect();

        std::thread::Builder::new()
            .name("synthetic-feed".into())
            .spawn(move || {
                while feed_running.load(Ordering::Acquire) {
                    for feed in feeds.iter_mut() {
                        gateway.process_raw_message(&feed.next_frame());
                    }
                    std::thread::sleep(interval);
                }
            })
            .expect("spawn synthetic feed")
    }

    /// Submit a client order. Returns `false` iff the ingress queue is
    /// full; the caller retries or fails the order upstream.
    pub fn submit_order(&self, mut order: Order) -> bool {
        self.orders_received.fetch_add(1, Ordering::Relaxed);

        if order.timestamp == 0 {
            order.timestamp = self.clock.now();
        }

        self.ingress.try_push(OrderCommand::Submit(order)).is_ok()
    }

    /// Request a cancel; the terminal update arrives via `on_order_update`.
    pub fn cancel_order(&self, order_id: OrderId) -> bool {
        self.ingress.try_push(OrderCommand::Cancel(order_id)).is_ok()
    }

    /// Register an event sink; events flow until unregistered.
    pub fn register_subscriber(&self, sink: Arc<dyn EventSink>) -> SubscriberId {
        self.subscribers.register(sink)
    }

    pub fn unregister_subscriber(&self, id: SubscriberId) -> bool {
        self.subscribers.unregister(id)
    }

    /// Add a strategy and subscribe its symbol's market data.
    pub fn add_strategy(&self, strategy: Arc<dyn Strategy>) {
        self.gateway.subscribe_symbol(strategy.symbol_id());
        self.strategies.write().push(strategy);
    }

    /// Submission handle for strategies and embedders.
    pub fn order_link(&self) -> OrderLink {
        OrderLink::new(
            Arc::clone(&self.ingress),
            Arc::clone(&self.next_order_id),
            Arc::clone(&self.orders_received),
            Arc::clone(&self.clock),
        )
    }

    pub fn subscribe_symbol(&self, symbol_id: SymbolId) {
        self.gateway.subscribe_symbol(symbol_id);
    }

    pub fn unsubscribe_symbol(&self, symbol_id: SymbolId) {
        self.gateway.unsubscribe_symbol(symbol_id);
    }

    /// Feed a raw market-data frame into the gateway.
    pub fn process_market_data(&self, buf: &[u8]) {
        self.gateway.process_raw_message(buf);
    }

    pub fn book(&self, symbol_id: SymbolId) -> Option<Arc<DepthBook>> {
        self.books.get(symbol_id)
    }

    pub fn position_info(&self, symbol_id: SymbolId) -> PositionInfo {
        self.risk.position_info(symbol_id)
    }

    pub fn risk_stats(&self) -> RiskStats {
        self.risk.stats()
    }

    pub fn clock(&self) -> Arc<Clock> {
        Arc::clone(&self.clock)
    }

    pub fn stats(&self) -> EngineStats {
        let uptime = match *self.start_time.lock() {
            Some(start) => start.elapsed().as_secs_f64(),
            None => 0.0,
        };
        let processed = self.orders_processed.load(Ordering::Relaxed);

        EngineStats {
            orders_received: self.orders_received.load(Ordering::Relaxed),
            orders_processed: processed,
            orders_rejected: self.orders_rejected.load(Ordering::Relaxed),
            trades_executed: self.trades_executed.load(Ordering::Relaxed),
            order_processing_rate: if uptime > 0.0 {
                processed as f64 / uptime
            } else {
                0.0
            },
            uptime_seconds: uptime,
            market_data: self.gateway.stats(),
            matching: self.match_counters.snapshot(),
        }
    }

    /// Stop the pipeline: no new ticks, drain nothing, join in stage
    /// order, then shut strategies down. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("stopping engine");

        // 1. Stop new events at the source.
        self.feed_running.store(false, Ordering::Release);
        let mut workers = self.workers.lock();
        if let Some(handle) = workers.feed.take() {
            let _ = handle.join();
        }
        self.gateway.stop();

        // 2. Signal the stage workers.
        self.running.store(false, Ordering::Release);

        // 3. Join in pipeline order.
        if let Some(handle) = workers.matcher.take() {
            let _ = handle.join();
        }
        if let Some(handle) = workers.risk.take() {
            let _ = handle.join();
        }
        if let Some(handle) = workers.fanout.take() {
            let _ = handle.join();
        }
        if let Some(handle) = workers.strategy.take() {
            let _ = handle.join();
        }
        drop(workers);

        // 4. Strategies last.
        for strategy in self.strategies.read().iter() {
            strategy.shutdown();
        }

        info!("engine stopped");
    }
}

impl Drop for TradingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
