//! Full-pipeline tests: orders and market data in, trades and events out.

use std::sync::Arc;
use std::time::{Duration, Instant};
use trading_engine_rs::{
    ChannelSink, EngineConfig, EngineEvent, MeanReversionStrategy, Order, OrderStatus, Side,
    Strategy, TimeInForce, TradingEngine, PRICE_SCALE,
};
use trading_engine_rs::market_data::protocol::{encode_incremental, IncrementalUpdate};
use trading_engine_rs::strategy::MeanReversionParams;

fn create_config() -> EngineConfig {
    EngineConfig {
        clock_calibration_samples: 1,
        clock_calibration_window_ms: 1,
        ..EngineConfig::default()
    }
}

fn limit(order_id: u64, side: Side, price_units: u64, quantity: u64) -> Order {
    Order::limit(
        order_id,
        1,
        side,
        price_units * PRICE_SCALE,
        quantity,
        TimeInForce::Gtc,
    )
}

fn tick_frame(symbol_id: u32, price: u64, seq: u32) -> Vec<u8> {
    encode_incremental(
        seq,
        &IncrementalUpdate {
            symbol_id,
            price,
            quantity: 100,
            side: Side::Buy,
            exchange_timestamp: seq as u64,
        },
    )
}

#[test]
fn orders_cross_and_positions_update() {
    let engine = TradingEngine::new(create_config()).unwrap();
    let (sink, receiver) = ChannelSink::bounded(4096);
    engine.register_subscriber(Arc::new(sink));
    engine.start().unwrap();

    // A small ladder of resting sells, then one sweeping buy.
    for (id, price) in [(1u64, 101u64), (2, 102), (3, 103)] {
        assert!(engine.submit_order(limit(id, Side::Sell, price, 50)));
    }
    assert!(engine.submit_order(limit(10, Side::Buy, 103, 120)));

    let deadline = Duration::from_secs(10);
    let mut trades = Vec::new();
    let start = Instant::now();
    while trades.len() < 3 {
        assert!(start.elapsed() < deadline, "expected 3 trades, got {trades:?}");
        if let Ok(event) = receiver.recv_timeout(Duration::from_millis(100)) {
            if let EngineEvent::Trade(trade) = event {
                trades.push(trade);
            }
        }
    }

    // Best price outward at resting prices.
    assert_eq!(trades[0].price, 101 * PRICE_SCALE);
    assert_eq!(trades[1].price, 102 * PRICE_SCALE);
    assert_eq!(trades[2].price, 103 * PRICE_SCALE);
    assert_eq!(trades.iter().map(|t| t.quantity).sum::<u64>(), 120);

    // Position settles at +120 (all fills aggressor-buy).
    let start = Instant::now();
    while engine.position_info(1).position != 120 {
        assert!(start.elapsed() < deadline, "position update timed out");
        std::thread::yield_now();
    }

    // The last trade becomes the reference price.
    let stats = engine.stats();
    assert_eq!(stats.trades_executed, 3);
    assert_eq!(stats.matching.volume_matched, 120);

    engine.stop();
}

#[test]
fn rejected_orders_emit_exactly_one_terminal_update() {
    let mut config = create_config();
    config.risk.max_order_size = 10;
    let engine = TradingEngine::new(config).unwrap();
    let (sink, receiver) = ChannelSink::bounded(4096);
    engine.register_subscriber(Arc::new(sink));
    engine.start().unwrap();

    assert!(engine.submit_order(limit(1, Side::Buy, 100, 1_000)));

    let deadline = Duration::from_secs(10);
    let start = Instant::now();
    let mut rejects = 0;
    while start.elapsed() < Duration::from_secs(2) {
        if let Ok(EngineEvent::OrderUpdate(order)) = receiver.recv_timeout(Duration::from_millis(50))
        {
            if order.order_id == 1 {
                assert_eq!(order.status, OrderStatus::Rejected);
                rejects += 1;
            }
        }
        if rejects > 0 && start.elapsed() > Duration::from_millis(500) {
            break;
        }
        assert!(start.elapsed() < deadline);
    }
    assert_eq!(rejects, 1);

    engine.stop();
}

#[test]
fn strategy_reacts_to_market_data_through_the_loop() {
    let config = EngineConfig {
        symbols: vec![1],
        ..create_config()
    };
    let engine = TradingEngine::new(config).unwrap();

    let strategy = Arc::new(MeanReversionStrategy::new(
        1,
        MeanReversionParams {
            lookback: 8,
            entry_threshold: 2.0,
            min_signal_interval_ns: 0,
            ..MeanReversionParams::default()
        },
        engine.clock(),
    ));
    engine.add_strategy(Arc::clone(&strategy) as Arc<dyn Strategy>);
    engine.start().unwrap();

    // Stable prices, then a deep dislocation the strategy should buy.
    let mut seq = 0u32;
    for _ in 0..5 {
        for price_units in [100u64, 101] {
            engine.process_market_data(&tick_frame(1, price_units * PRICE_SCALE, seq));
            seq += 1;
        }
    }
    engine.process_market_data(&tick_frame(1, 80 * PRICE_SCALE, seq));

    let deadline = Duration::from_secs(10);
    let start = Instant::now();
    while strategy.signal_count() == 0 {
        assert!(start.elapsed() < deadline, "strategy never signalled");
        std::thread::sleep(Duration::from_millis(1));
    }

    // The signal became a real order through the ingress.
    let start = Instant::now();
    while engine.stats().orders_received == 0 {
        assert!(start.elapsed() < deadline, "signal order never arrived");
        std::thread::sleep(Duration::from_millis(1));
    }

    engine.stop();
}

#[test]
fn shutdown_joins_cleanly_with_traffic_in_flight() {
    let config = EngineConfig {
        symbols: vec![1, 2],
        synthetic_feed: true,
        feed_interval_us: 50,
        ..create_config()
    };
    let engine = TradingEngine::new(config).unwrap();
    engine.start().unwrap();

    for id in 0..100u64 {
        let side = if id % 2 == 0 { Side::Buy } else { Side::Sell };
        engine.submit_order(limit(id + 1, side, 100 + (id % 5), 10));
    }

    std::thread::sleep(Duration::from_millis(50));
    engine.stop();

    // After stop the books saw feed traffic and the matcher saw orders.
    let stats = engine.stats();
    assert!(stats.market_data.messages_received > 0);
    assert!(stats.orders_received >= 100);
}
