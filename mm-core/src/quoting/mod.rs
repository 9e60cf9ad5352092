//! Quoting Engine: owns the at-most-one-per-side order mirror, the risk
//! manager, the inventory parameters, and the OBI-driven place/amend/replace
//! policy. Grounded in the `engine` module's overall shape (a struct owning
//! a risk component and an executor handle, driven by a single per-tick
//! entry point) and the original engine's
//! `on_market_data`/`_age_and_validate_orders`/`_get_obi_thresholds` methods
//! for the exact policy; a const-generic/ZST strategy dispatch has no
//! counterpart here, since these parameters are chosen at runtime rather
//! than selected at compile time.

pub mod session;
pub mod state;

pub use session::{PerformanceCounters, SessionSummary};
pub use state::QuoteState;

use crate::execution::{CancelReason, Event, ExecutionSimulator, SubmitRejection};
use crate::risk::{inventory_skew, InventoryParams, RiskManager, SkewOffsets};
use crate::types::{round_to_tick, Book, OrderId, Side, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const MANUAL_COOLDOWN: Duration = Duration::from_millis(300);
const MIN_REPLACE_INTERVAL: Duration = Duration::from_secs(2);
const WHALE_QUEUE_AHEAD: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy)]
pub struct QuotingParams {
    pub tick_size: Decimal,
    pub base_increment: Decimal,
    pub min_notional: Decimal,
    pub default_order_size: Decimal,
    pub max_position: Decimal,
    pub base_max_ticks_away: u32,
    pub adaptive_multiplier_cap: Decimal,
    pub ttl: Duration,
}

/// The bid/ask-row-selected view of the order-book-imbalance threshold table.
#[derive(Debug, Clone, Copy)]
pub struct ObiThresholds {
    pub moderate_bid: Decimal,
    pub extreme_bid: Decimal,
    pub moderate_ask: Decimal,
    pub extreme_ask: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct ObiThresholdTable {
    pub flat: ObiThresholds,
    pub long: ObiThresholds,
    pub short: ObiThresholds,
}

impl From<crate::config::ObiThresholdTable> for ObiThresholdTable {
    fn from(t: crate::config::ObiThresholdTable) -> Self {
        fn conv(t: crate::config::ObiThresholds) -> ObiThresholds {
            ObiThresholds {
                moderate_bid: t.moderate_bid,
                extreme_bid: t.extreme_bid,
                moderate_ask: t.moderate_ask,
                extreme_ask: t.extreme_ask,
            }
        }
        ObiThresholdTable { flat: conv(t.flat), long: conv(t.long), short: conv(t.short) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObiRegime {
    Flat,
    Long,
    Short,
}

impl ObiThresholdTable {
    fn for_regime(&self, regime: ObiRegime) -> ObiThresholds {
        match regime {
            ObiRegime::Flat => self.flat,
            ObiRegime::Long => self.long,
            ObiRegime::Short => self.short,
        }
    }
}

/// The quoting engine's read-through mirror of one resting order.
#[derive(Debug, Clone)]
struct MirrorOrder {
    id: OrderId,
    price: Decimal,
    original_size: Decimal,
    filled_size: Decimal,
    queue_ahead: Decimal,
    entry_time: Instant,
    mid_at_entry: Decimal,
    last_level_size: Decimal,
}

impl MirrorOrder {
    fn remaining(&self) -> Decimal {
        self.original_size - self.filled_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    Placed,
    Amended,
    Replaced,
    Held(&'static str),
    Rejected(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideDecision {
    Quote,
    Widen,
    HoldExtreme,
}

pub struct QuotingEngine {
    params: QuotingParams,
    obi_thresholds: ObiThresholdTable,
    inventory_params: InventoryParams,
    vol_estimate: Decimal,
    risk: RiskManager,
    sim: Arc<ExecutionSimulator>,
    mirror: HashMap<Side, MirrorOrder>,
    last_replace_time: HashMap<Side, Instant>,
    last_manual_cancel_time: Option<Instant>,
    last_inventory_update: Instant,
    last_skew: SkewOffsets,
    last_adaptive_max_ticks: u32,
    state: QuoteState,
    counters: PerformanceCounters,
    initial_cash: Decimal,
    last_mid: Option<Decimal>,
}

impl QuotingEngine {
    pub fn new(
        params: QuotingParams,
        obi_thresholds: ObiThresholdTable,
        inventory_params: InventoryParams,
        vol_estimate: Decimal,
        risk: RiskManager,
        sim: Arc<ExecutionSimulator>,
        initial_cash: Decimal,
    ) -> Self {
        Self {
            params,
            obi_thresholds,
            inventory_params,
            vol_estimate,
            risk,
            sim,
            mirror: HashMap::new(),
            last_replace_time: HashMap::new(),
            last_manual_cancel_time: None,
            last_inventory_update: Instant::now(),
            last_skew: SkewOffsets { bid_skew: Decimal::ZERO, ask_skew: Decimal::ZERO },
            last_adaptive_max_ticks: params.base_max_ticks_away,
            state: QuoteState::IdleNoOrders,
            counters: PerformanceCounters::new(initial_cash),
            initial_cash,
            last_mid: None,
        }
    }

    pub fn state(&self) -> QuoteState {
        self.state
    }

    pub fn last_skew(&self) -> SkewOffsets {
        self.last_skew
    }

    pub fn session_summary(&self) -> SessionSummary {
        let mid = self.last_mid.unwrap_or(self.initial_cash);
        let equity = self.sim.equity(mid);
        self.counters.summary(Instant::now(), equity, self.initial_cash)
    }

    pub fn risk_snapshot(&self) -> crate::risk::RiskSnapshot {
        self.risk.snapshot()
    }

    /// Forwards a trade print to the execution simulator. Any resulting
    /// fills surface on the next `on_book` call's drain: the engine is
    /// driven entirely by book updates, never by a timer thread.
    pub fn on_trade(&self, trade: Trade) {
        if let Err(e) = self.sim.on_trade(trade) {
            debug!(error = %e, "dropped invalid trade");
        }
    }

    /// Signals a manual (operator-driven) cancel-all, starting the
    /// 300ms cooldown.
    pub fn manual_cancel_all(&mut self) {
        for (side, order) in self.mirror.drain() {
            self.sim.cancel(order.id, CancelReason::Manual);
            let _ = side;
        }
        self.last_manual_cancel_time = Some(Instant::now());
        self.counters.record_cancel();
    }

    /// The main per-book-update entry point.
    pub fn on_book(&mut self, book: &Book) -> QuoteState {
        if book.validate().is_err() {
            warn!("dropped malformed book");
            return self.state;
        }

        for event in self.sim.on_book_update(book.clone()) {
            self.handle_event(event);
        }

        // Emergency risk condition: cancel everything and suppress further
        // placements until the risk manager's condition clears.
        // `place()`'s own pre-trade gate already rejects new submissions via
        // `no_critical_breaches`; this additionally tears down orders placed
        // before the breach fired. Idempotent: `cancel_side` no-ops on an
        // already-empty mirror entry.
        if self.risk.emergency_shutdown() {
            error!("emergency shutdown condition active, cancelling all open orders");
            self.cancel_side(Side::Buy, CancelReason::Manual);
            self.cancel_side(Side::Sell, CancelReason::Manual);
            self.state = QuoteState::IdleNoOrders;
            return self.state;
        }

        self.age_orders(book);

        let (Some(best_bid), Some(best_ask)) = (book.best_bid(), book.best_ask()) else {
            self.state = QuoteState::IdleNoOrders;
            return self.state;
        };
        let mid = (best_bid.price + best_ask.price) / Decimal::TWO;
        self.last_mid = Some(mid);
        let spread = best_ask.price - best_bid.price;

        if spread <= self.params.tick_size / Decimal::TWO {
            self.cancel_side(Side::Buy, CancelReason::TightSpread);
            self.cancel_side(Side::Sell, CancelReason::TightSpread);
            self.state = QuoteState::HoldTightSpread;
            return self.state;
        }

        let position = self.sim.position();
        let elapsed = Decimal::try_from(self.last_inventory_update.elapsed().as_secs_f64()).unwrap_or(Decimal::ZERO);
        let skew = inventory_skew(position, self.inventory_params, self.vol_estimate, elapsed, self.params.tick_size);
        self.last_inventory_update = Instant::now();
        self.last_skew = skew;

        let mut target_bid = round_to_tick(best_bid.price + skew.bid_skew, self.params.tick_size);
        let mut target_ask = round_to_tick(best_ask.price + skew.ask_skew, self.params.tick_size);
        if target_bid >= target_ask {
            target_bid = best_bid.price;
            target_ask = best_ask.price;
        }
        if target_bid >= target_ask {
            self.cancel_side(Side::Buy, CancelReason::Crossed);
            self.cancel_side(Side::Sell, CancelReason::Crossed);
            self.state = QuoteState::HoldCrossedSkew;
            return self.state;
        }

        if let Some(t) = self.last_manual_cancel_time {
            if t.elapsed() < MANUAL_COOLDOWN {
                self.state = QuoteState::HoldCooldownManual;
                return self.state;
            }
        }

        let (bid_vol, ask_vol) = book.depth_volume();
        let total = bid_vol + ask_vol;
        let obi = if total.is_zero() { Decimal::ZERO } else { (bid_vol - ask_vol) / total };
        let regime = self.regime(position);
        let thresholds = self.obi_thresholds.for_regime(regime);

        let bid_decision = if obi <= -thresholds.extreme_bid {
            SideDecision::HoldExtreme
        } else if obi <= -thresholds.moderate_bid {
            SideDecision::Widen
        } else {
            SideDecision::Quote
        };
        let ask_decision = if obi >= thresholds.extreme_ask {
            SideDecision::HoldExtreme
        } else if obi >= thresholds.moderate_ask {
            SideDecision::Widen
        } else {
            SideDecision::Quote
        };

        let bid_outcome = match bid_decision {
            SideDecision::HoldExtreme => {
                self.cancel_side(Side::Buy, CancelReason::Manual);
                PlaceOutcome::Held("extreme_obi")
            }
            SideDecision::Widen => {
                let price = round_to_tick(target_bid - self.params.tick_size, self.params.tick_size);
                self.place(Side::Buy, price, self.params.default_order_size, book)
            }
            SideDecision::Quote => self.place(Side::Buy, target_bid, self.params.default_order_size, book),
        };
        let ask_outcome = match ask_decision {
            SideDecision::HoldExtreme => {
                self.cancel_side(Side::Sell, CancelReason::Manual);
                PlaceOutcome::Held("extreme_obi")
            }
            SideDecision::Widen => {
                let price = round_to_tick(target_ask + self.params.tick_size, self.params.tick_size);
                self.place(Side::Sell, price, self.params.default_order_size, book)
            }
            SideDecision::Quote => self.place(Side::Sell, target_ask, self.params.default_order_size, book),
        };
        if matches!(bid_outcome, PlaceOutcome::Rejected(_)) {
            debug!(side = "buy", outcome = ?bid_outcome, "bid placement rejected");
        }
        if matches!(ask_outcome, PlaceOutcome::Rejected(_)) {
            debug!(side = "sell", outcome = ?ask_outcome, "ask placement rejected");
        }

        self.state = Self::resolve_state(
            bid_decision,
            ask_decision,
            self.mirror.contains_key(&Side::Buy),
            self.mirror.contains_key(&Side::Sell),
        );
        self.counters.record_equity(self.sim.equity(mid));
        self.state
    }

    fn resolve_state(bid: SideDecision, ask: SideDecision, bid_live: bool, ask_live: bool) -> QuoteState {
        if bid == SideDecision::HoldExtreme {
            return QuoteState::HoldNoBidExtremeObi;
        }
        if ask == SideDecision::HoldExtreme {
            return QuoteState::HoldNoAskExtremeObi;
        }
        if bid == SideDecision::Widen && ask == SideDecision::Widen {
            return QuoteState::BothWideModerateObi;
        }
        if bid == SideDecision::Widen {
            return QuoteState::BidWideModerateObi;
        }
        if ask == SideDecision::Widen {
            return QuoteState::AskWideModerateObi;
        }
        match (bid_live, ask_live) {
            (true, true) => QuoteState::Quoting,
            (true, false) => QuoteState::BidOnly,
            (false, true) => QuoteState::AskOnly,
            (false, false) => QuoteState::IdleNoOrders,
        }
    }

    fn regime(&self, position: Decimal) -> ObiRegime {
        let half_size = self.params.default_order_size / Decimal::TWO;
        if position > half_size {
            ObiRegime::Long
        } else if position < -half_size {
            ObiRegime::Short
        } else {
            ObiRegime::Flat
        }
    }

    /// Ages and validates each open order against the new book, cancelling
    /// on TTL expiry, crossed quotes, or drift beyond the adaptive
    /// max-ticks-away; otherwise refreshes its queue-ahead estimate
    /// from the level's observed volume change.
    fn age_orders(&mut self, book: &Book) {
        let Some(best_bid) = book.best_bid() else { return };
        let Some(best_ask) = book.best_ask() else { return };

        self.last_adaptive_max_ticks = self.adaptive_max_ticks(book);
        let max_ticks = Decimal::from(self.last_adaptive_max_ticks);

        let sides: Vec<Side> = self.mirror.keys().copied().collect();
        for side in sides {
            let (best, level) = match side {
                Side::Buy => (best_bid.price, book.bids.iter().find(|l| self.same_level(l.price, self.mirror[&side].price))),
                Side::Sell => (best_ask.price, book.asks.iter().find(|l| self.same_level(l.price, self.mirror[&side].price))),
            };
            let order_price = self.mirror[&side].price;
            let age = self.mirror[&side].entry_time.elapsed();

            if age > self.params.ttl {
                self.cancel_side(side, CancelReason::Ttl);
                continue;
            }
            let crossed = match side {
                Side::Buy => order_price > best,
                Side::Sell => order_price < best,
            };
            if crossed {
                self.cancel_side(side, CancelReason::Crossed);
                continue;
            }
            let ticks_away = ((order_price - best) / self.params.tick_size).abs();
            if ticks_away > max_ticks {
                self.cancel_side(side, CancelReason::TooFar);
                continue;
            }

            let current_size = level.map(|l| l.size).unwrap_or(Decimal::ZERO);
            if let Some(mirror) = self.mirror.get_mut(&side) {
                let decrease = (mirror.last_level_size - current_size).max(Decimal::ZERO);
                let advance = decrease * Decimal::new(9, 1); // 0.9, midpoint of 80-100%
                let new_queue = (mirror.queue_ahead - advance).max(Decimal::ZERO);
                mirror.queue_ahead = new_queue;
                mirror.last_level_size = current_size;
                self.sim.set_queue_ahead(mirror.id, new_queue);
            }
        }
    }

    /// Widens the max-ticks-away tolerance when the mid has moved a lot
    /// since the previous book: >5 ticks of movement is a fast market and
    /// gets the full `adaptive_multiplier_cap`, >2 ticks is moderate and
    /// gets 1.5x, otherwise the market is calm and the base tolerance holds.
    fn adaptive_max_ticks(&self, book: &Book) -> u32 {
        let (Some(best_bid), Some(best_ask)) = (book.best_bid(), book.best_ask()) else {
            return self.params.base_max_ticks_away;
        };
        let Some(prev_mid) = self.last_mid else { return self.params.base_max_ticks_away };

        let new_mid = (best_bid.price + best_ask.price) / Decimal::TWO;
        let price_move_ticks = ((new_mid - prev_mid) / self.params.tick_size).abs();

        let multiplier = if price_move_ticks > Decimal::from(5u32) {
            self.params.adaptive_multiplier_cap
        } else if price_move_ticks > Decimal::from(2u32) {
            Decimal::new(15, 1)
        } else {
            Decimal::ONE
        };
        let scaled = Decimal::from(self.params.base_max_ticks_away) * multiplier;
        scaled.round().to_u32().unwrap_or(self.params.base_max_ticks_away)
    }

    fn same_level(&self, a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < self.params.tick_size / Decimal::TWO
    }

    fn cancel_side(&mut self, side: Side, reason: CancelReason) {
        if let Some(order) = self.mirror.remove(&side) {
            self.sim.cancel(order.id, reason);
            self.counters.record_cancel();
        }
    }

    /// The place/amend/replace policy: notional/size/position checks, the
    /// risk manager's pre-trade gate, an amend when the order can retain
    /// queue position, and a throttled replace otherwise.
    fn place(&mut self, side: Side, price: Decimal, size: Decimal, book: &Book) -> PlaceOutcome {
        if size < self.params.base_increment || price * size < self.params.min_notional {
            return PlaceOutcome::Rejected("below_minimum");
        }
        let position = self.sim.position();
        let projected = match side {
            Side::Buy => position + size,
            Side::Sell => position - size,
        };
        if projected.abs() > self.params.max_position {
            return PlaceOutcome::Rejected("max_position");
        }

        let mid = book.mid().unwrap_or(price);
        let equity = self.sim.equity(mid);
        self.risk.record_order_attempt();
        let gates = self.risk.check_pre_trade(side, size, price, position, equity, 1);
        if !gates.permit() {
            return PlaceOutcome::Rejected("risk_gate");
        }

        let now = Instant::now();
        if let Some(existing) = self.mirror.get(&side).cloned() {
            let diff_ticks = ((price - existing.price) / self.params.tick_size).abs();
            if diff_ticks <= Decimal::from(5u32) {
                let retain = if diff_ticks <= Decimal::ONE {
                    Decimal::new(8, 1)
                } else if diff_ticks <= Decimal::from(3u32) {
                    Decimal::new(5, 1)
                } else {
                    Decimal::new(2, 1)
                };
                if let Some(new_queue) = self.sim.amend(existing.id, price, retain) {
                    if let Some(mirror) = self.mirror.get_mut(&side) {
                        mirror.price = price;
                        mirror.queue_ahead = new_queue;
                    }
                    self.counters.record_placement_or_amend(now);
                    return PlaceOutcome::Amended;
                }
                return PlaceOutcome::Rejected("amend_target_missing");
            }

            if !self.should_replace(side, &existing, diff_ticks, now) {
                return PlaceOutcome::Held("replace_not_justified");
            }
        }

        self.replace(side, price, size, book, now)
    }

    fn should_replace(&self, side: Side, existing: &MirrorOrder, diff_ticks: Decimal, now: Instant) -> bool {
        if let Some(last) = self.last_replace_time.get(&side) {
            if now.duration_since(*last) < MIN_REPLACE_INTERVAL {
                return false;
            }
        }
        let age = existing.entry_time.elapsed();
        let required = if age < Duration::from_secs(10) {
            Decimal::from(15u32)
        } else if age < Duration::from_secs(30) {
            Decimal::from(10u32)
        } else {
            Decimal::from(5u32)
        };
        diff_ticks >= required
    }

    fn replace(&mut self, side: Side, price: Decimal, size: Decimal, book: &Book, now: Instant) -> PlaceOutcome {
        let Some(best_bid) = book.best_bid() else { return PlaceOutcome::Rejected("no_book") };
        let Some(best_ask) = book.best_ask() else { return PlaceOutcome::Rejected("no_book") };

        let crosses = match side {
            Side::Buy => price >= best_ask.price,
            Side::Sell => price <= best_bid.price,
        };
        if crosses {
            return PlaceOutcome::Rejected("crosses_book");
        }
        let best = match side {
            Side::Buy => best_bid.price,
            Side::Sell => best_ask.price,
        };
        let ticks_away = ((price - best) / self.params.tick_size).abs();
        if ticks_away > Decimal::from(self.params.base_max_ticks_away) {
            return PlaceOutcome::Rejected("too_far");
        }
        let preview = self.sim.queue_ahead_preview(side, price);
        if preview > WHALE_QUEUE_AHEAD {
            return PlaceOutcome::Rejected("whale_level");
        }

        if let Some(existing) = self.mirror.remove(&side) {
            self.sim.cancel(existing.id, CancelReason::Replace);
        }

        match self.sim.submit(side, price, size) {
            Ok(id) => {
                let level_size = match side {
                    Side::Buy => book.bids.iter().find(|l| self.same_level(l.price, price)).map(|l| l.size),
                    Side::Sell => book.asks.iter().find(|l| self.same_level(l.price, price)).map(|l| l.size),
                }
                .unwrap_or(Decimal::ZERO);
                let queue_ahead = self.sim.live_order(id).map(|o| o.queue_ahead).unwrap_or(Decimal::ZERO);
                self.mirror.insert(
                    side,
                    MirrorOrder {
                        id,
                        price,
                        original_size: size,
                        filled_size: Decimal::ZERO,
                        queue_ahead,
                        entry_time: now,
                        mid_at_entry: book.mid().unwrap_or(price),
                        last_level_size: level_size,
                    },
                );
                self.last_replace_time.insert(side, now);
                self.counters.record_placement_or_amend(now);
                PlaceOutcome::Replaced
            }
            Err(SubmitRejection::Halted) => PlaceOutcome::Rejected("halted"),
        }
    }

    /// Reconciles a fill/cancel event from the execution simulator against
    /// the mirror.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Fill { order_id, side, fill_qty, remaining_qty, price, fee, timestamp: _ } => {
                let Some(mirror) = self.mirror.get_mut(&side) else {
                    warn!(?order_id, "fill for an order the mirror no longer tracks");
                    return;
                };
                if mirror.id != order_id {
                    warn!(mirror_id = ?mirror.id, event_id = ?order_id, "mirror/simulator order id divergence");
                    return;
                }
                mirror.filled_size += fill_qty;
                let spread_capture = match side {
                    Side::Buy => (mirror.mid_at_entry - price) * fill_qty,
                    Side::Sell => (price - mirror.mid_at_entry) * fill_qty,
                } - fee;
                self.counters.record_fill(spread_capture, fee, Instant::now());
                let mark = self.last_mid.unwrap_or(mirror.mid_at_entry);
                self.risk.update_position_and_pnl(self.sim.equity(mark));
                if remaining_qty.is_zero() {
                    self.mirror.remove(&side);
                }
            }
            Event::Cancel { order_id, side, reason: _, timestamp: _ } => {
                if self.mirror.get(&side).map(|m| m.id) == Some(order_id) {
                    self.mirror.remove(&side);
                }
            }
        }
    }
}
