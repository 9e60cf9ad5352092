//! Execution-simulator supporting types: the live-order record, fills, the
//! delayed-event queue entries, and the fee-tier table. Grounded in
//! `execution::types` (Order/Fill shape) and the original
//! `execution_simulator.py` (`SimOrder`, `DelayedEvent`, fee_tiers).

use crate::types::{OrderId, Side};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::time::Instant;

/// The execution simulator's authoritative record of one resting order.
#[derive(Debug, Clone)]
pub struct LiveOrder {
    pub id: OrderId,
    pub side: Side,
    pub price: Decimal,
    pub original_size: Decimal,
    pub filled_size: Decimal,
    pub queue_ahead: Decimal,
    pub submitted_at: Instant,
}

impl LiveOrder {
    pub fn remaining(&self) -> Decimal {
        self.original_size - self.filled_size
    }
}

/// A fill record, as produced by the simulator and retained in fill history.
#[derive(Debug, Clone, Copy)]
pub struct Fill {
    pub order_id: OrderId,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub timestamp: Instant,
}

/// Reasons a cancel was issued, carried through to the bus so the quoting
/// engine can log/account for it distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Ttl,
    Crossed,
    TooFar,
    TightSpread,
    Replace,
    Manual,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CancelReason::Ttl => "ttl",
            CancelReason::Crossed => "crossed",
            CancelReason::TooFar => "too_far",
            CancelReason::TightSpread => "tight_spread",
            CancelReason::Replace => "replace",
            CancelReason::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

/// Payload of a scheduled delayed event.
#[derive(Debug, Clone)]
pub enum DelayedPayload {
    Cancel { order_id: OrderId, reason: CancelReason },
    TradeUpdate { price: Decimal, size: Decimal, aggressor_side: Side },
}

/// One entry in the delayed-event priority queue, ordered by `execute_at`
/// (earliest first when used behind a `BinaryHeap` + `Reverse`).
#[derive(Debug, Clone)]
pub struct DelayedEvent {
    pub execute_at: Instant,
    pub seq: u64,
    pub payload: DelayedPayload,
}

impl PartialEq for DelayedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.execute_at == other.execute_at && self.seq == other.seq
    }
}
impl Eq for DelayedEvent {}

impl PartialOrd for DelayedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.execute_at
            .cmp(&other.execute_at)
            .then(self.seq.cmp(&other.seq))
    }
}

/// (cumulative 30-day-volume threshold, maker-fee rate in bps), ascending.
pub const FEE_TIERS: &[(u64, u32)] = &[
    (0, 40),
    (10_000, 25),
    (50_000, 15),
    (100_000, 10),
    (1_000_000, 8),
    (15_000_000, 6),
    (75_000_000, 3),
    (250_000_000, 0),
    (400_000_000, 0),
];

/// Active maker-fee rate (as a fraction, e.g. 0.0004 for 4bps) for a given
/// rolling 30-day notional volume: the highest threshold not exceeding it.
pub fn active_fee_rate(rolling_volume: Decimal) -> Decimal {
    let mut rate_bps = FEE_TIERS[0].1;
    for &(threshold, rate) in FEE_TIERS {
        if Decimal::from(threshold) <= rolling_volume {
            rate_bps = rate;
        } else {
            break;
        }
    }
    Decimal::from(rate_bps) / Decimal::from(10_000u32)
}
