//! Shared primitive types: sides, price levels, book snapshots, trade prints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A stable order identity assigned at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl OrderId {
    pub fn next(counter: &std::sync::atomic::AtomicU64) -> Self {
        OrderId(counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order-{}", self.0)
    }
}

/// Side of a resting order or a trade aggressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// One price level: price and resting size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: Decimal,
    pub size: Decimal,
}

/// An order-book snapshot. `bids`/`asks` are ordered best-first.
#[derive(Debug, Clone)]
pub struct Book {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub timestamp: SystemTime,
}

impl Book {
    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }

    pub fn mid(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((bid + ask) / Decimal::TWO)
    }

    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some(ask - bid)
    }

    /// Sum of resting size across the visible depth, per side.
    pub fn depth_volume(&self) -> (Decimal, Decimal) {
        let bid_vol = self.bids.iter().fold(Decimal::ZERO, |a, l| a + l.size);
        let ask_vol = self.asks.iter().fold(Decimal::ZERO, |a, l| a + l.size);
        (bid_vol, ask_vol)
    }

    /// Validates that both sides are non-empty and all fields are finite.
    /// Corresponds to the "malformed book" invalid-input case.
    pub fn validate(&self) -> Result<(), crate::errors::IngestError> {
        if self.bids.is_empty() || self.asks.is_empty() {
            return Err(crate::errors::IngestError::EmptyBookSide);
        }
        for level in self.bids.iter().chain(self.asks.iter()) {
            if !level.price.is_sign_positive() || level.size.is_sign_negative() {
                return Err(crate::errors::IngestError::NonFiniteValue);
            }
        }
        Ok(())
    }
}

/// A single trade print from the tape.
#[derive(Debug, Clone, Copy)]
pub struct Trade {
    pub price: Decimal,
    pub size: Decimal,
    pub aggressor_side: Side,
    pub timestamp: SystemTime,
}

/// Rounds `price` to the nearest multiple of `tick`, ties away from zero.
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    if tick.is_zero() {
        return price;
    }
    (price / tick).round() * tick
}

/// Current wall-clock time, used consistently so tests can reason about it.
pub fn now() -> SystemTime {
    SystemTime::now()
}

pub fn since_epoch_ms(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn mid_and_spread() {
        let book = Book {
            bids: vec![Level { price: dec!(100.00), size: dec!(50) }],
            asks: vec![Level { price: dec!(100.05), size: dec!(50) }],
            timestamp: now(),
        };
        assert_eq!(book.mid(), Some(dec!(100.025)));
        assert_eq!(book.spread(), Some(dec!(0.05)));
    }

    #[test]
    fn round_to_tick_ties_away_from_zero() {
        assert_eq!(round_to_tick(dec!(100.024), dec!(0.01)), dec!(100.02));
        assert_eq!(round_to_tick(dec!(100.026), dec!(0.01)), dec!(100.03));
    }

    #[test]
    fn empty_side_is_rejected() {
        let book = Book { bids: vec![], asks: vec![], timestamp: now() };
        assert!(book.validate().is_err());
    }
}
