//! Risk Manager: pre-trade gates, rolling PnL/drawdown/rate tracking, and
//! emergency shutdown detection. Grounded in `risk::types`/`risk::mod` (the
//! Decimal `Position`/`RiskLimits` shape) and the original
//! `RiskManager.check_pre_trade_risk` / `InventoryManager`.

pub mod inventory;
pub mod types;

pub use inventory::{inventory_skew, InventoryParams, SkewOffsets};
pub use types::{Gate, GateResults, RiskLimits};

use rust_decimal::Decimal;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tracing::warn;

const STARTUP_GRACE: Duration = Duration::from_secs(5 * 60);
const ORDER_RATE_WINDOW: Duration = Duration::from_secs(1);
const DAILY_VOL: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01
const VAR_Z_SCORE: Decimal = Decimal::from_parts(233, 0, 0, false, 2); // 2.33

/// Typical per-minute traded volume for a price band, used by the
/// concentration-risk gate. A coarse step function: expensive instruments
/// trade thin, cheap ones trade thick.
fn typical_minute_volume(price: Decimal) -> Decimal {
    use rust_decimal_macros::dec;
    if price >= dec!(50_000) {
        dec!(10)
    } else if price >= dec!(1_000) {
        dec!(50)
    } else if price >= dec!(100) {
        dec!(100)
    } else if price >= dec!(10) {
        dec!(500)
    } else if price >= dec!(1) {
        dec!(1_000)
    } else {
        dec!(2_000)
    }
}

pub struct RiskManager {
    limits: RiskLimits,
    session_start: Instant,
    peak_equity: Decimal,
    max_drawdown_observed: Decimal,
    daily_pnl: Decimal,
    order_attempts: VecDeque<Instant>,
    persistent_breaches: HashSet<Gate>,
}

impl RiskManager {
    pub fn new(limits: RiskLimits, initial_equity: Decimal) -> Self {
        Self {
            limits,
            session_start: Instant::now(),
            peak_equity: initial_equity,
            max_drawdown_observed: Decimal::ZERO,
            daily_pnl: Decimal::ZERO,
            order_attempts: VecDeque::new(),
            persistent_breaches: HashSet::new(),
        }
    }

    fn in_grace_period(&self) -> bool {
        self.session_start.elapsed() < STARTUP_GRACE
    }

    /// Runs all eight gates and returns (permit, results). Updates the
    /// persistent breach set (gates 1-3) as a side effect.
    #[allow(clippy::too_many_arguments)]
    pub fn check_pre_trade(
        &mut self,
        side: crate::types::Side,
        size: Decimal,
        price: Decimal,
        current_position: Decimal,
        current_equity: Decimal,
        latency_ms: u64,
    ) -> GateResults {
        use rust_decimal_macros::dec;

        let projected_position = match side {
            crate::types::Side::Buy => current_position + size,
            crate::types::Side::Sell => current_position - size,
        };

        let mut results = std::collections::HashMap::new();

        // 1. position_limit
        results.insert(Gate::PositionLimit, projected_position.abs() <= self.limits.max_position);

        // 2. daily_pnl_limit
        let effective_daily_loss_limit = if self.in_grace_period() {
            self.limits.max_daily_loss.max(self.peak_equity * dec!(0.01))
        } else {
            self.limits.max_daily_loss
        };
        results.insert(
            Gate::DailyPnlLimit,
            current_equity - self.peak_equity >= -effective_daily_loss_limit,
        );

        // 3. drawdown_limit
        let effective_drawdown_limit = if self.in_grace_period() {
            self.limits.max_drawdown.max(dec!(0.02))
        } else {
            self.limits.max_drawdown
        };
        let drawdown = if self.peak_equity.is_zero() {
            Decimal::ZERO
        } else {
            (self.peak_equity - current_equity) / self.peak_equity
        };
        results.insert(Gate::DrawdownLimit, drawdown <= effective_drawdown_limit);

        // 4. concentration_risk
        let notional = size * price;
        let concentration_ok = if notional < dec!(0.50) {
            true
        } else {
            let typical_volume_notional = typical_minute_volume(price) * price;
            notional <= self.limits.concentration * typical_volume_notional
        };
        results.insert(Gate::ConcentrationRisk, concentration_ok);

        // 5. var_limit
        let var = (projected_position * price).abs() * DAILY_VOL * VAR_Z_SCORE;
        results.insert(Gate::VarLimit, var <= self.limits.var_limit);

        // 6. order_rate_limit
        let recent_attempts = self
            .order_attempts
            .iter()
            .filter(|t| t.elapsed() <= ORDER_RATE_WINDOW)
            .count();
        results.insert(
            Gate::OrderRateLimit,
            (recent_attempts as u32) < self.limits.max_orders_per_second,
        );

        // 7. latency_limit
        results.insert(Gate::LatencyLimit, latency_ms <= self.limits.max_latency_ms);

        // Recompute the persistent breach set from gates 1-3 before gate 8
        // reads it; it is recomputed fully on every pre-trade call.
        self.persistent_breaches.clear();
        for gate in [Gate::PositionLimit, Gate::DailyPnlLimit, Gate::DrawdownLimit] {
            if !results[&gate] {
                self.persistent_breaches.insert(gate);
            }
        }

        // 8. no_critical_breaches
        results.insert(Gate::NoCriticalBreaches, self.persistent_breaches.is_empty());

        let gate_results = GateResults { results };
        if !gate_results.permit() {
            warn!(
                failed = ?gate_results.failed_gates().iter().map(|g| g.name()).collect::<Vec<_>>(),
                "pre-trade check rejected"
            );
        }
        gate_results
    }

    pub fn record_order_attempt(&mut self) {
        let now = Instant::now();
        self.order_attempts.push_back(now);
        while let Some(front) = self.order_attempts.front() {
            if front.elapsed() > ORDER_RATE_WINDOW {
                self.order_attempts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Updates rolling PnL/drawdown state from a fresh equity mark.
    pub fn update_position_and_pnl(&mut self, equity: Decimal) {
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if !self.peak_equity.is_zero() {
            let drawdown = (self.peak_equity - equity) / self.peak_equity;
            if drawdown > self.max_drawdown_observed {
                self.max_drawdown_observed = drawdown;
            }
        }
        self.daily_pnl = equity - self.peak_equity;
    }

    /// True if an emergency condition is in effect: daily PnL below 80% of
    /// the daily-loss limit, drawdown above 90% of the drawdown limit, or
    /// two-plus critical (persistent) breaches simultaneously.
    pub fn emergency_shutdown(&self) -> bool {
        use rust_decimal_macros::dec;
        let pnl_emergency = self.daily_pnl <= -(self.limits.max_daily_loss * dec!(0.8));
        let drawdown_emergency = self.max_drawdown_observed >= self.limits.max_drawdown * dec!(0.9);
        let breach_emergency = self.persistent_breaches.len() >= 2;
        pnl_emergency || drawdown_emergency || breach_emergency
    }

    pub fn persistent_breaches(&self) -> &HashSet<Gate> {
        &self.persistent_breaches
    }

    pub fn peak_equity(&self) -> Decimal {
        self.peak_equity
    }

    pub fn max_drawdown_observed(&self) -> Decimal {
        self.max_drawdown_observed
    }

    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    /// Read-only snapshot for the ambient reporting accessor.
    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            peak_equity: self.peak_equity,
            max_drawdown_observed: self.max_drawdown_observed,
            daily_pnl: self.daily_pnl,
            breached_gates: self.persistent_breaches.iter().map(|g| g.name().to_string()).collect(),
            emergency: self.emergency_shutdown(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RiskSnapshot {
    pub peak_equity: Decimal,
    pub max_drawdown_observed: Decimal,
    pub daily_pnl: Decimal,
    pub breached_gates: Vec<String>,
    pub emergency: bool,
}
