#[cfg(test)]
mod tests {
    use crate::core::clock::Clock;
    use crate::core::types::{Order, OrderStatus, Side, TimeInForce};
    use crate::matching::MatchEngine;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn create_engine() -> MatchEngine {
        let clock = Arc::new(Clock::with_calibration(1, Duration::from_millis(1)).unwrap());
        MatchEngine::new(1024, clock)
    }

    fn create_limit(
        order_id: u64,
        side: Side,
        price: u64,
        quantity: u64,
        time_in_force: TimeInForce,
        timestamp: u64,
    ) -> Order {
        let mut order = Order::limit(order_id, 1, side, price, quantity, time_in_force);
        order.timestamp = timestamp;
        order
    }

    #[test]
    fn test_simple_cross() {
        let mut engine = create_engine();

        let rest = engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));
        assert!(rest.trades.is_empty());
        assert_eq!(rest.resting_id, Some(1));

        let hit = engine.process_order(create_limit(2, Side::Buy, 10_100, 100, TimeInForce::Gtc, 2));
        assert_eq!(hit.trades.len(), 1);
        assert!(hit.fully_matched);

        let trade = hit.trades[0];
        assert_eq!(trade.buy_order_id, 2);
        assert_eq!(trade.sell_order_id, 1);
        assert_eq!(trade.price, 10_100);
        assert_eq!(trade.quantity, 100);
        assert_eq!(trade.aggressor_side, Side::Buy);

        // Book is empty again.
        let state = engine.book_state();
        assert_eq!(state.best_bid, 0);
        assert_eq!(state.best_ask, 0);
        assert_eq!(engine.resting_orders(), 0);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_partial_fill_rests_remainder() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));
        let outcome =
            engine.process_order(create_limit(2, Side::Buy, 10_100, 150, TimeInForce::Gtc, 2));

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].quantity, 100);
        assert!(!outcome.fully_matched);
        assert_eq!(outcome.resting_id, Some(2));

        // Remaining 50 rests as the new best bid.
        let state = engine.book_state();
        assert_eq!(state.best_bid, 10_100);
        assert_eq!(state.best_bid_qty, 50);
        assert_eq!(state.best_ask, 0);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_price_time_priority_within_level() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 50, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Sell, 10_100, 50, TimeInForce::Gtc, 2));

        let outcome =
            engine.process_order(create_limit(3, Side::Buy, 10_100, 75, TimeInForce::Gtc, 3));

        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].sell_order_id, 1);
        assert_eq!(outcome.trades[0].quantity, 50);
        assert_eq!(outcome.trades[1].sell_order_id, 2);
        assert_eq!(outcome.trades[1].quantity, 25);
        assert!(outcome.fully_matched);

        // Order 2 keeps 25 open at the level.
        let state = engine.book_state();
        assert_eq!(state.best_ask, 10_100);
        assert_eq!(state.best_ask_qty, 25);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_sweep_across_levels_trades_at_resting_prices() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Sell, 10_200, 100, TimeInForce::Gtc, 2));

        let outcome =
            engine.process_order(create_limit(3, Side::Buy, 10_200, 150, TimeInForce::Gtc, 3));

        assert_eq!(outcome.trades.len(), 2);
        // Price improvement: first fill at the better resting price.
        assert_eq!(outcome.trades[0].price, 10_100);
        assert_eq!(outcome.trades[0].quantity, 100);
        assert_eq!(outcome.trades[1].price, 10_200);
        assert_eq!(outcome.trades[1].quantity, 50);

        let state = engine.book_state();
        assert_eq!(state.best_ask, 10_200);
        assert_eq!(state.best_ask_qty, 50);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_ioc_remainder_never_rests() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));

        let mut cancelled = None;
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            engine.set_order_hook(move |order| seen.lock().unwrap().push(*order));
        }

        let outcome =
            engine.process_order(create_limit(2, Side::Buy, 10_100, 200, TimeInForce::Ioc, 2));

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].quantity, 100);
        assert!(!outcome.fully_matched);
        assert_eq!(outcome.resting_id, None);

        for order in seen.lock().unwrap().iter() {
            if order.order_id == 2 {
                cancelled = Some(*order);
            }
        }
        let final_update = cancelled.expect("taker update emitted");
        assert_eq!(final_update.status, OrderStatus::Cancelled);
        assert_eq!(final_update.filled, 100);

        // No new bid appeared.
        assert_eq!(engine.book_state().best_bid, 0);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_market_order_crosses_any_price() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 60, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Sell, 10_900, 60, TimeInForce::Gtc, 2));

        let mut market = Order::market(3, 1, Side::Buy, 100);
        market.timestamp = 3;
        let outcome = engine.process_order(market);

        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].price, 10_100);
        assert_eq!(outcome.trades[1].price, 10_900);
        assert!(outcome.fully_matched);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_fok_kills_when_depth_insufficient() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));

        let outcome =
            engine.process_order(create_limit(2, Side::Buy, 10_100, 150, TimeInForce::Fok, 2));

        // No trades at all: the partial match is not allowed to happen.
        assert!(outcome.trades.is_empty());
        assert!(!outcome.fully_matched);
        assert_eq!(outcome.resting_id, None);

        // Resting liquidity is untouched.
        let state = engine.book_state();
        assert_eq!(state.best_ask, 10_100);
        assert_eq!(state.best_ask_qty, 100);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_fok_fills_when_depth_covers() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Sell, 10_150, 100, TimeInForce::Gtc, 2));

        let outcome =
            engine.process_order(create_limit(3, Side::Buy, 10_150, 150, TimeInForce::Fok, 3));

        assert_eq!(outcome.trades.len(), 2);
        assert!(outcome.fully_matched);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Buy, 10_000, 100, TimeInForce::Gtc, 1));
        assert_eq!(engine.book_state().best_bid, 10_000);

        assert!(engine.cancel_order(1));
        assert_eq!(engine.book_state().best_bid, 0);
        assert_eq!(engine.resting_orders(), 0);

        // Second cancel finds nothing and changes nothing.
        assert!(!engine.cancel_order(1));
        assert_eq!(engine.book_state().best_bid, 0);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_cancel_unknown_id() {
        let mut engine = create_engine();
        assert!(!engine.cancel_order(999));
    }

    #[test]
    fn test_cancel_partially_filled_order() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Buy, 10_100, 40, TimeInForce::Gtc, 2));

        // 60 remains open; cancelling removes exactly that.
        assert!(engine.cancel_order(1));
        assert_eq!(engine.book_state().best_ask, 0);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_trade_ids_monotonic() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 50, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Sell, 10_100, 50, TimeInForce::Gtc, 2));
        engine.process_order(create_limit(3, Side::Sell, 10_200, 50, TimeInForce::Gtc, 3));

        let a = engine.process_order(create_limit(4, Side::Buy, 10_200, 120, TimeInForce::Gtc, 4));
        let b = engine.process_order(create_limit(5, Side::Buy, 10_200, 30, TimeInForce::Gtc, 5));

        let mut ids: Vec<u64> = a
            .trades
            .iter()
            .chain(b.trades.iter())
            .map(|trade| trade.trade_id)
            .collect();
        let sorted = {
            let mut clone = ids.clone();
            clone.sort_unstable();
            clone
        };
        assert_eq!(ids, sorted);
        ids.dedup();
        assert_eq!(ids.len(), a.trades.len() + b.trades.len());
    }

    #[test]
    fn test_sell_aggressor_side() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Buy, 10_000, 100, TimeInForce::Gtc, 1));
        let outcome =
            engine.process_order(create_limit(2, Side::Sell, 10_000, 100, TimeInForce::Gtc, 5));

        assert_eq!(outcome.trades.len(), 1);
        // The sell arrived later, so it is the aggressor.
        assert_eq!(outcome.trades[0].aggressor_side, Side::Sell);
        assert_eq!(outcome.trades[0].buy_order_id, 1);
        assert_eq!(outcome.trades[0].sell_order_id, 2);
    }

    #[test]
    fn test_no_cross_rests_both_sides() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Buy, 10_000, 100, TimeInForce::Gtc, 1));
        let outcome =
            engine.process_order(create_limit(2, Side::Sell, 10_100, 100, TimeInForce::Gtc, 2));

        assert!(outcome.trades.is_empty());
        let state = engine.book_state();
        assert_eq!(state.best_bid, 10_000);
        assert_eq!(state.best_ask, 10_100);
        assert_eq!(state.bid_levels, 1);
        assert_eq!(state.ask_levels, 1);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_arena_exhaustion_drops_remainder() {
        let clock = Arc::new(Clock::with_calibration(1, Duration::from_millis(1)).unwrap());
        let mut engine = MatchEngine::new(2, clock);

        engine.process_order(create_limit(1, Side::Sell, 10_100, 50, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Sell, 10_200, 50, TimeInForce::Gtc, 2));

        // Takes out order 1 (freeing a slot), then tries to rest 50.
        let outcome =
            engine.process_order(create_limit(3, Side::Buy, 10_100, 100, TimeInForce::Gtc, 3));
        assert_eq!(outcome.trades.len(), 1);
        assert!(!outcome.capacity_exhausted);
        assert_eq!(outcome.resting_id, Some(3));

        // Arena is full again; a non-crossing order cannot rest.
        let outcome =
            engine.process_order(create_limit(4, Side::Buy, 9_000, 10, TimeInForce::Gtc, 4));
        assert!(outcome.trades.is_empty());
        assert!(outcome.capacity_exhausted);
        assert_eq!(outcome.resting_id, None);
        assert_eq!(engine.resting_orders(), 2);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_hooks_observe_trades_and_updates() {
        let mut engine = create_engine();

        let trade_count = Arc::new(AtomicU64::new(0));
        {
            let trade_count = Arc::clone(&trade_count);
            engine.set_trade_hook(move |_| {
                trade_count.fetch_add(1, Ordering::Relaxed);
            });
        }

        let updates = Arc::new(Mutex::new(Vec::new()));
        {
            let updates = Arc::clone(&updates);
            engine.set_order_hook(move |order| updates.lock().unwrap().push(*order));
        }

        engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Buy, 10_100, 100, TimeInForce::Gtc, 2));

        assert_eq!(trade_count.load(Ordering::Relaxed), 1);

        let updates = updates.lock().unwrap();
        // Resting ack for 1, fill update for 1, final update for 2.
        assert!(updates.iter().any(|o| o.order_id == 1 && o.status == OrderStatus::Incoming));
        assert!(updates.iter().any(|o| o.order_id == 1 && o.status == OrderStatus::Filled));
        assert!(updates.iter().any(|o| o.order_id == 2 && o.status == OrderStatus::Filled));
    }

    #[test]
    fn test_statistics() {
        let mut engine = create_engine();

        engine.process_order(create_limit(1, Side::Sell, 10_100, 100, TimeInForce::Gtc, 1));
        engine.process_order(create_limit(2, Side::Buy, 10_100, 60, TimeInForce::Gtc, 2));
        engine.process_order(create_limit(3, Side::Buy, 10_100, 40, TimeInForce::Gtc, 3));

        let stats = engine.stats();
        assert_eq!(stats.orders_processed, 3);
        assert_eq!(stats.trades_generated, 2);
        assert_eq!(stats.volume_matched, 100);
        assert!((stats.match_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_fill_size - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_conservation_of_quantity() {
        let mut engine = create_engine();
        let mut emitted = 0u64;

        for id in 1..=10u64 {
            let side = if id % 2 == 0 { Side::Buy } else { Side::Sell };
            let price = 10_000 + (id % 3) * 100;
            let outcome = engine.process_order(create_limit(
                id,
                side,
                price,
                50 + id * 7,
                TimeInForce::Gtc,
                id,
            ));
            emitted += outcome.trades.iter().map(|t| t.quantity).sum::<u64>();
        }

        // Every fill was booked on both sides exactly once.
        assert_eq!(engine.stats().volume_matched, emitted);
        assert!(engine.is_consistent());
    }
}
