//! Execution Simulator: the authoritative live-order table, cash/position
//! scalars, fee tiering, and the delayed-event queue that models cancel and
//! trade-processing latency. Grounded in `execution::{types, simulated}`
//! (`Order`/`Fill`/bounded-queue shape) and the original
//! `execution_simulator.py` (exact queue-consumption and fee-tier logic);
//! the `SimulatedExecutor` this is grounded on fills immediately and is not
//! queue-aware, so the fill algorithm here is new.

pub mod bus;
pub mod types;

pub use bus::{Event, EventBus};
pub use types::{active_fee_rate, CancelReason, DelayedEvent, DelayedPayload, Fill, LiveOrder, FEE_TIERS};

use crate::errors::IngestError;
use crate::types::{Book, OrderId, Side, Trade};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::time::{Duration, Instant, SystemTime};

const THIRTY_DAYS: Duration = Duration::from_secs(30 * 24 * 3600);
const STALE_TRADE_MAX_AGE: Duration = Duration::from_secs(5);
const FUTURE_TRADE_MAX_SKEW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct ExecutionConfig {
    pub tick_size: Decimal,
    pub initial_cash: Decimal,
    pub rng_seed: u64,
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    #[error("execution is halted by an emergency condition")]
    Halted,
}

struct Inner {
    live_orders: HashMap<OrderId, LiveOrder>,
    cash: Decimal,
    position: Decimal,
    fills: Vec<Fill>,
    last_book: Option<Book>,
    volume_history: VecDeque<(Instant, Decimal)>,
    rolling_volume: Decimal,
    delayed_events: BinaryHeap<std::cmp::Reverse<DelayedEvent>>,
    seq: u64,
    next_order_id: u64,
    halted: bool,
    rng: StdRng,
    tick_size: Decimal,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn next_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    fn same_level(&self, a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < self.tick_size / Decimal::TWO
    }

    fn estimate_queue_ahead(&mut self, side: Side, price: Decimal) -> Decimal {
        use rust_decimal_macros::dec;
        let level = self.last_book.as_ref().and_then(|book| {
            let levels = match side {
                Side::Buy => &book.bids,
                Side::Sell => &book.asks,
            };
            levels.iter().find(|l| self.same_level(l.price, price)).copied()
        });
        match level {
            Some(l) => {
                let frac = self.rng.gen_range(10..=30) as u64;
                l.size * Decimal::from(frac) / dec!(100)
            }
            None => Decimal::from(self.rng.gen_range(0..=5u64)),
        }
    }

    fn add_volume(&mut self, notional: Decimal, now: Instant) {
        self.volume_history.push_back((now, notional));
        self.rolling_volume += notional;
        while let Some((ts, amt)) = self.volume_history.front().copied() {
            if now.duration_since(ts) > THIRTY_DAYS {
                self.rolling_volume -= amt;
                self.volume_history.pop_front();
            } else {
                break;
            }
        }
    }

    /// The queue-consumption fill rule. Returns produced fill events.
    fn apply_trade(
        &mut self,
        price: Decimal,
        size: Decimal,
        aggressor_side: Side,
        now: Instant,
    ) -> Vec<Event> {
        let mut matching: Vec<OrderId> = self
            .live_orders
            .iter()
            .filter(|(_, o)| self.same_level(o.price, price) && aggressor_side == o.side.opposite())
            .map(|(id, _)| *id)
            .collect();
        matching.sort();

        let mut produced = Vec::new();
        for order_id in matching {
            let rate = active_fee_rate(self.rolling_volume);
            let order = match self.live_orders.get_mut(&order_id) {
                Some(o) => o,
                None => continue,
            };
            let old_q = order.queue_ahead;
            let new_q = (old_q - size).max(Decimal::ZERO);
            order.queue_ahead = new_q;

            if new_q > Decimal::ZERO {
                continue;
            }

            let volume_that_reached_us = (size - old_q).max(Decimal::ZERO);
            let fill_qty = order.remaining().min(volume_that_reached_us).max(Decimal::ZERO);
            if fill_qty.is_zero() {
                continue;
            }

            let side = order.side;
            order.filled_size += fill_qty;
            let remaining_after = order.remaining();
            let fee = fill_qty * price * rate;

            match side {
                Side::Buy => {
                    self.position += fill_qty;
                    self.cash -= price * fill_qty;
                }
                Side::Sell => {
                    self.position -= fill_qty;
                    self.cash += price * fill_qty;
                }
            }
            self.cash -= fee;
            self.add_volume(fill_qty * price, now);

            self.fills.push(Fill { order_id, side, qty: fill_qty, price, fee, timestamp: now });
            produced.push(Event::Fill {
                order_id,
                side,
                fill_qty,
                remaining_qty: remaining_after,
                price,
                fee,
                timestamp: now,
            });

            if remaining_after.is_zero() {
                self.live_orders.remove(&order_id);
            }
        }
        produced
    }
}

/// The execution simulator. `submit`/`cancel`/`on_trade` enqueue work under
/// a single mutex; `poll`/`on_book_update` drain due delayed events under
/// that same mutex and publish the results to the bus after releasing it.
pub struct ExecutionSimulator {
    inner: Mutex<Inner>,
    bus: EventBus,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                live_orders: HashMap::new(),
                cash: config.initial_cash,
                position: Decimal::ZERO,
                fills: Vec::new(),
                last_book: None,
                volume_history: VecDeque::new(),
                rolling_volume: Decimal::ZERO,
                delayed_events: BinaryHeap::new(),
                seq: 0,
                next_order_id: 1,
                halted: false,
                rng: StdRng::seed_from_u64(config.rng_seed),
                tick_size: config.tick_size,
            }),
            bus: EventBus::new(1024),
        }
    }

    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn set_halted(&self, halted: bool) {
        self.inner.lock().halted = halted;
    }

    pub fn is_halted(&self) -> bool {
        self.inner.lock().halted
    }

    /// Inserts the order into the live table with an estimated queue-ahead.
    /// Submission is effective immediately for fill eligibility; no latency
    /// is applied.
    pub fn submit(&self, side: Side, price: Decimal, size: Decimal) -> Result<OrderId, SubmitRejection> {
        let mut inner = self.inner.lock();
        if inner.halted {
            return Err(SubmitRejection::Halted);
        }
        let queue_ahead = inner.estimate_queue_ahead(side, price);
        let id = inner.next_id();
        inner.live_orders.insert(
            id,
            LiveOrder {
                id,
                side,
                price,
                original_size: size,
                filled_size: Decimal::ZERO,
                queue_ahead,
                submitted_at: Instant::now(),
            },
        );
        Ok(id)
    }

    /// Schedules a delayed cancel. Idempotent and never fails: if the order
    /// is already gone when the delayed event fires, it's a no-op.
    pub fn cancel(&self, order_id: OrderId, reason: CancelReason) {
        let mut inner = self.inner.lock();
        let delay_ms = inner.rng.gen_range(150..=400);
        let execute_at = Instant::now() + Duration::from_millis(delay_ms);
        let seq = inner.next_seq();
        inner.delayed_events.push(std::cmp::Reverse(DelayedEvent {
            execute_at,
            seq,
            payload: DelayedPayload::Cancel { order_id, reason },
        }));
    }

    /// Validates the trade timestamp, then schedules a `trade_update`.
    pub fn on_trade(&self, trade: Trade) -> Result<(), IngestError> {
        let wall_now = SystemTime::now();
        match wall_now.duration_since(trade.timestamp) {
            Ok(age) if age > STALE_TRADE_MAX_AGE => return Err(IngestError::StaleTrade),
            Err(future) if future.duration() > FUTURE_TRADE_MAX_SKEW => {
                return Err(IngestError::FutureTrade)
            }
            _ => {}
        }

        let mut inner = self.inner.lock();
        let delay_us = inner.rng.gen_range(200..=800);
        let execute_at = Instant::now() + Duration::from_micros(delay_us);
        let seq = inner.next_seq();
        inner.delayed_events.push(std::cmp::Reverse(DelayedEvent {
            execute_at,
            seq,
            payload: DelayedPayload::TradeUpdate {
                price: trade.price,
                size: trade.size,
                aggressor_side: trade.aggressor_side,
            },
        }));
        Ok(())
    }

    /// Drains and processes every delayed event due at or before `now`,
    /// publishing the results to the bus after the lock is released.
    pub fn poll(&self, now: Instant) -> Vec<Event> {
        let produced = {
            let mut inner = self.inner.lock();
            let mut due = Vec::new();
            while matches!(inner.delayed_events.peek(), Some(std::cmp::Reverse(e)) if e.execute_at <= now)
            {
                due.push(inner.delayed_events.pop().unwrap().0);
            }

            let mut produced = Vec::new();
            for event in due {
                match event.payload {
                    DelayedPayload::Cancel { order_id, reason } => {
                        if let Some(order) = inner.live_orders.remove(&order_id) {
                            produced.push(Event::Cancel { order_id, side: order.side, reason, timestamp: now });
                        }
                    }
                    DelayedPayload::TradeUpdate { price, size, aggressor_side } => {
                        produced.extend(inner.apply_trade(price, size, aggressor_side, now));
                    }
                }
            }
            produced
        };

        for event in &produced {
            self.bus.publish(*event);
        }
        produced
    }

    /// Refreshes top-of-book/full-book context, then drains due events.
    pub fn on_book_update(&self, book: Book) -> Vec<Event> {
        {
            let mut inner = self.inner.lock();
            inner.last_book = Some(book);
        }
        self.poll(Instant::now())
    }

    pub fn cash(&self) -> Decimal {
        self.inner.lock().cash
    }

    pub fn position(&self) -> Decimal {
        self.inner.lock().position
    }

    pub fn equity(&self, mid: Decimal) -> Decimal {
        let inner = self.inner.lock();
        inner.cash + inner.position * mid
    }

    pub fn fills(&self) -> Vec<Fill> {
        self.inner.lock().fills.clone()
    }

    pub fn total_fees_paid(&self) -> Decimal {
        self.inner.lock().fills.iter().map(|f| f.fee).sum()
    }

    pub fn rolling_volume(&self) -> Decimal {
        self.inner.lock().rolling_volume
    }

    pub fn active_fee_rate(&self) -> Decimal {
        active_fee_rate(self.inner.lock().rolling_volume)
    }

    pub fn live_order(&self, id: OrderId) -> Option<LiveOrder> {
        self.inner.lock().live_orders.get(&id).cloned()
    }

    pub fn live_orders_for(&self, side: Side) -> Vec<LiveOrder> {
        self.inner.lock().live_orders.values().filter(|o| o.side == side).cloned().collect()
    }

    /// Read-only preview of the queue-ahead an order at `price` would be
    /// assigned right now, without consuming the rng draw `submit` would
    /// make. Used by the quoting engine's whale-level guard ahead of a
    /// replace, where an approximation (not an exact future draw) suffices.
    pub fn queue_ahead_preview(&self, side: Side, price: Decimal) -> Decimal {
        use rust_decimal_macros::dec;
        let inner = self.inner.lock();
        let level = inner.last_book.as_ref().and_then(|book| {
            let levels = match side {
                Side::Buy => &book.bids,
                Side::Sell => &book.asks,
            };
            levels.iter().find(|l| inner.same_level(l.price, price)).copied()
        });
        match level {
            Some(l) => l.size * dec!(0.20),
            None => dec!(2),
        }
    }

    /// Moves a live order to `new_price` in place, scaling its queue-ahead by
    /// `retain_fraction`, the amend path of the place/amend/replace policy.
    /// Does not reset the entry timestamp: an amend is a mutation of the
    /// same order, not a new one.
    pub fn amend(&self, order_id: OrderId, new_price: Decimal, retain_fraction: Decimal) -> Option<Decimal> {
        let mut inner = self.inner.lock();
        let order = inner.live_orders.get_mut(&order_id)?;
        order.price = new_price;
        order.queue_ahead *= retain_fraction;
        Some(order.queue_ahead)
    }

    /// Overwrites an order's queue-ahead with a book-driven decay estimate,
    /// as the `age_orders` step does each tick. The simulator stays the sole
    /// owner of the live-order table; the quoting engine computes the
    /// heuristic but always writes it back through this setter rather than
    /// reaching into the table directly.
    pub fn set_queue_ahead(&self, order_id: OrderId, value: Decimal) {
        let mut inner = self.inner.lock();
        if let Some(order) = inner.live_orders.get_mut(&order_id) {
            order.queue_ahead = value.max(Decimal::ZERO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Level;
    use rust_decimal_macros::dec;

    fn book_s1() -> Book {
        Book {
            bids: vec![Level { price: dec!(100.00), size: dec!(50) }],
            asks: vec![Level { price: dec!(100.05), size: dec!(50) }],
            timestamp: SystemTime::now(),
        }
    }

    fn sim() -> ExecutionSimulator {
        ExecutionSimulator::new(ExecutionConfig { tick_size: dec!(0.01), initial_cash: dec!(1000), rng_seed: 1 })
    }

    #[test]
    fn s1_single_clean_fill_on_the_bid() {
        let sim = sim();
        sim.on_book_update(book_s1());
        let id = sim.submit(Side::Buy, dec!(100.00), dec!(10)).unwrap();
        // Force the estimate to zero so the trade fills immediately like S1.
        {
            let mut inner = sim.inner.lock();
            inner.live_orders.get_mut(&id).unwrap().queue_ahead = Decimal::ZERO;
        }
        sim.on_trade(Trade { price: dec!(100.00), size: dec!(60), aggressor_side: Side::Sell, timestamp: SystemTime::now() })
            .unwrap();
        let events = sim.poll(Instant::now() + Duration::from_millis(1));
        assert_eq!(events.len(), 1);
        match events[0] {
            Event::Fill { fill_qty, fee, remaining_qty, .. } => {
                assert_eq!(fill_qty, dec!(10));
                assert_eq!(fee, dec!(4.00));
                assert_eq!(remaining_qty, dec!(0));
            }
            _ => panic!("expected fill"),
        }
        assert_eq!(sim.cash(), dec!(1000) - dec!(1000) - dec!(4.00));
        assert_eq!(sim.position(), dec!(10));
        assert!(sim.live_order(id).is_none());
    }

    #[test]
    fn s2_partial_fill_leaves_remainder_at_front_of_queue() {
        let sim = sim();
        sim.on_book_update(book_s1());
        let id = sim.submit(Side::Sell, dec!(100.05), dec!(10)).unwrap();
        {
            let mut inner = sim.inner.lock();
            inner.live_orders.get_mut(&id).unwrap().queue_ahead = dec!(50);
        }
        sim.on_trade(Trade { price: dec!(100.05), size: dec!(55), aggressor_side: Side::Buy, timestamp: SystemTime::now() })
            .unwrap();
        let events = sim.poll(Instant::now() + Duration::from_millis(1));
        assert_eq!(events.len(), 1);
        match events[0] {
            Event::Fill { fill_qty, remaining_qty, .. } => {
                assert_eq!(fill_qty, dec!(5));
                assert_eq!(remaining_qty, dec!(5));
            }
            _ => panic!("expected fill"),
        }
        let order = sim.live_order(id).unwrap();
        assert_eq!(order.remaining(), dec!(5));
        assert_eq!(order.queue_ahead, Decimal::ZERO);
        assert_eq!(sim.position(), dec!(-5));
    }

    #[test]
    fn trade_exactly_at_old_queue_produces_zero_fill() {
        let sim = sim();
        sim.on_book_update(book_s1());
        let id = sim.submit(Side::Buy, dec!(100.00), dec!(10)).unwrap();
        {
            let mut inner = sim.inner.lock();
            inner.live_orders.get_mut(&id).unwrap().queue_ahead = dec!(20);
        }
        sim.on_trade(Trade { price: dec!(100.00), size: dec!(20), aggressor_side: Side::Sell, timestamp: SystemTime::now() })
            .unwrap();
        let events = sim.poll(Instant::now() + Duration::from_millis(1));
        assert!(events.is_empty());
        assert_eq!(sim.live_order(id).unwrap().queue_ahead, Decimal::ZERO);
    }

    #[test]
    fn same_side_aggressor_never_fills_the_order() {
        let sim = sim();
        sim.on_book_update(book_s1());
        let id = sim.submit(Side::Buy, dec!(100.00), dec!(10)).unwrap();
        {
            let mut inner = sim.inner.lock();
            inner.live_orders.get_mut(&id).unwrap().queue_ahead = Decimal::ZERO;
        }
        // Aggressor is also "buy" -- must never match a resting buy order.
        sim.on_trade(Trade { price: dec!(100.00), size: dec!(60), aggressor_side: Side::Buy, timestamp: SystemTime::now() })
            .unwrap();
        let events = sim.poll(Instant::now() + Duration::from_millis(1));
        assert!(events.is_empty());
    }

    #[test]
    fn half_tick_boundary_is_excluded() {
        let sim = sim();
        sim.on_book_update(book_s1());
        let id = sim.submit(Side::Buy, dec!(100.00), dec!(10)).unwrap();
        {
            let mut inner = sim.inner.lock();
            inner.live_orders.get_mut(&id).unwrap().queue_ahead = Decimal::ZERO;
        }
        // Exactly half a tick away (0.005) must NOT count as the same level.
        sim.on_trade(Trade { price: dec!(100.005), size: dec!(60), aggressor_side: Side::Sell, timestamp: SystemTime::now() })
            .unwrap();
        let events = sim.poll(Instant::now() + Duration::from_millis(1));
        assert!(events.is_empty());
    }

    #[test]
    fn cancel_is_idempotent_on_a_missing_order() {
        let sim = sim();
        sim.cancel(OrderId(999), CancelReason::Manual);
        let events = sim.poll(Instant::now() + Duration::from_millis(500));
        assert!(events.is_empty());
    }

    #[test]
    fn halted_simulator_rejects_new_submissions() {
        let sim = sim();
        sim.set_halted(true);
        let result = sim.submit(Side::Buy, dec!(100), dec!(1));
        assert_eq!(result, Err(SubmitRejection::Halted));
    }

    #[test]
    fn stale_trade_is_rejected() {
        let sim = sim();
        let stale = SystemTime::now() - Duration::from_secs(10);
        let err = sim.on_trade(Trade { price: dec!(100), size: dec!(1), aggressor_side: Side::Buy, timestamp: stale });
        assert_eq!(err, Err(IngestError::StaleTrade));
    }

    #[test]
    fn fee_sum_matches_total_fees_paid() {
        let sim = sim();
        sim.on_book_update(book_s1());
        let id = sim.submit(Side::Buy, dec!(100.00), dec!(10)).unwrap();
        {
            let mut inner = sim.inner.lock();
            inner.live_orders.get_mut(&id).unwrap().queue_ahead = Decimal::ZERO;
        }
        sim.on_trade(Trade { price: dec!(100.00), size: dec!(60), aggressor_side: Side::Sell, timestamp: SystemTime::now() })
            .unwrap();
        sim.poll(Instant::now() + Duration::from_millis(1));
        let fills = sim.fills();
        let expected: Decimal = fills.iter().map(|f| f.fee).sum();
        assert_eq!(sim.total_fees_paid(), expected);
    }
}
