//! Session performance tracking: the rolling order/trade ratio, win/loss
//! counters, and the PnL-sample history the original engine's
//! `get_session_performance_summary` reported. Grounded in the original's
//! rolling-window bookkeeping, carried as an accessor rather than printed
//! by the core.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const ORDER_TRADE_WINDOW: Duration = Duration::from_secs(5 * 60);
const ALERT_RATIO: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderTradeEvent {
    Placement,
    Fill,
}

pub struct PerformanceCounters {
    orders_sent: u64,
    fills: u64,
    cancels: u64,
    wins: u64,
    total: u64,
    session_fees: Decimal,
    pnl_samples: VecDeque<Decimal>,
    peak_equity: Decimal,
    max_drawdown: Decimal,
    order_trade_window: VecDeque<(Instant, OrderTradeEvent)>,
}

impl PerformanceCounters {
    pub fn new(initial_equity: Decimal) -> Self {
        Self {
            orders_sent: 0,
            fills: 0,
            cancels: 0,
            wins: 0,
            total: 0,
            session_fees: Decimal::ZERO,
            pnl_samples: VecDeque::new(),
            peak_equity: initial_equity,
            max_drawdown: Decimal::ZERO,
            order_trade_window: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some((ts, _)) = self.order_trade_window.front().copied() {
            if now.duration_since(ts) > ORDER_TRADE_WINDOW {
                self.order_trade_window.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record_placement_or_amend(&mut self, now: Instant) {
        self.orders_sent += 1;
        self.order_trade_window.push_back((now, OrderTradeEvent::Placement));
        self.prune(now);
    }

    pub fn record_cancel(&mut self) {
        self.cancels += 1;
    }

    pub fn record_fill(&mut self, spread_capture: Decimal, fee: Decimal, now: Instant) {
        self.fills += 1;
        self.session_fees += fee;
        self.total += 1;
        if spread_capture > Decimal::ZERO {
            self.wins += 1;
        }
        self.order_trade_window.push_back((now, OrderTradeEvent::Fill));
        self.prune(now);
    }

    pub fn record_equity(&mut self, equity: Decimal) {
        self.pnl_samples.push_back(equity);
        if self.pnl_samples.len() > 10_000 {
            self.pnl_samples.pop_front();
        }
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if !self.peak_equity.is_zero() {
            let drawdown = (self.peak_equity - equity) / self.peak_equity;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }

    /// (placements + amendments) / fills over the rolling 5-minute window.
    pub fn order_trade_ratio(&self, now: Instant) -> Option<Decimal> {
        let placements = self
            .order_trade_window
            .iter()
            .filter(|(ts, ev)| now.duration_since(*ts) <= ORDER_TRADE_WINDOW && *ev == OrderTradeEvent::Placement)
            .count();
        let fills = self
            .order_trade_window
            .iter()
            .filter(|(ts, ev)| now.duration_since(*ts) <= ORDER_TRADE_WINDOW && *ev == OrderTradeEvent::Fill)
            .count();
        if fills == 0 {
            return None;
        }
        Some(Decimal::from(placements as u64) / Decimal::from(fills as u64))
    }

    /// True when the ratio exceeds 25 with at least one fill in the window.
    pub fn should_alert_order_trade_ratio(&self, now: Instant) -> bool {
        self.order_trade_ratio(now).map(|r| r > Decimal::from(ALERT_RATIO)).unwrap_or(false)
    }

    fn win_rate(&self) -> Decimal {
        if self.total == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(self.wins) / Decimal::from(self.total)
        }
    }

    /// A coarse Sharpe-style ratio over the retained equity-mark history:
    /// mean period-over-period change divided by its sample standard
    /// deviation. Zero when fewer than three samples are available. Uses
    /// `f64` for the variance/sqrt step, same tradeoff `clock::LatencyStats`
    /// makes for its mean.
    fn sharpe(&self) -> Decimal {
        if self.pnl_samples.len() < 3 {
            return Decimal::ZERO;
        }
        let diffs: Vec<f64> = self
            .pnl_samples
            .iter()
            .zip(self.pnl_samples.iter().skip(1))
            .map(|(a, b)| (*b - *a).to_string().parse::<f64>().unwrap_or(0.0))
            .collect();
        let n = diffs.len() as f64;
        let mean = diffs.iter().sum::<f64>() / n;
        let variance = diffs.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
        if variance <= 0.0 {
            return Decimal::ZERO;
        }
        let ratio = mean / variance.sqrt();
        Decimal::try_from(ratio).unwrap_or(Decimal::ZERO)
    }

    pub fn summary(&self, now: Instant, current_equity: Decimal, initial_cash: Decimal) -> SessionSummary {
        SessionSummary {
            orders_sent: self.orders_sent,
            fills: self.fills,
            cancels: self.cancels,
            wins: self.wins,
            total: self.total,
            win_rate: self.win_rate(),
            sharpe: self.sharpe(),
            session_fees: self.session_fees,
            pnl: current_equity - initial_cash,
            peak_equity: self.peak_equity,
            max_drawdown: self.max_drawdown,
            order_trade_ratio: self.order_trade_ratio(now),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub orders_sent: u64,
    pub fills: u64,
    pub cancels: u64,
    pub wins: u64,
    pub total: u64,
    pub win_rate: Decimal,
    pub sharpe: Decimal,
    pub session_fees: Decimal,
    pub pnl: Decimal,
    pub peak_equity: Decimal,
    pub max_drawdown: Decimal,
    pub order_trade_ratio: Option<Decimal>,
}
