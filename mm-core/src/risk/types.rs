//! Risk-manager supporting types: configurable limits and the eight named
//! pre-trade gates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configurable risk limits, one set per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum absolute position (long or short).
    pub max_position: Decimal,
    /// Maximum daily loss, in quote currency, as a positive magnitude.
    pub max_daily_loss: Decimal,
    /// Maximum drawdown as a fraction of peak equity (0.0-1.0).
    pub max_drawdown: Decimal,
    /// Position-concentration ceiling as a fraction of typical minute volume.
    pub concentration: Decimal,
    /// VaR ceiling, in quote currency.
    pub var_limit: Decimal,
    /// Max order attempts accepted per rolling second.
    pub max_orders_per_second: u32,
    /// Max acceptable order-placement latency, milliseconds.
    pub max_latency_ms: u64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            max_position: dec!(100),
            max_daily_loss: dec!(100),
            max_drawdown: dec!(0.2),
            concentration: dec!(0.1),
            var_limit: dec!(100_000),
            max_orders_per_second: 5,
            max_latency_ms: 50,
        }
    }
}

/// The eight named pre-trade gates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    PositionLimit,
    DailyPnlLimit,
    DrawdownLimit,
    ConcentrationRisk,
    VarLimit,
    OrderRateLimit,
    LatencyLimit,
    NoCriticalBreaches,
}

impl Gate {
    pub const ALL: [Gate; 8] = [
        Gate::PositionLimit,
        Gate::DailyPnlLimit,
        Gate::DrawdownLimit,
        Gate::ConcentrationRisk,
        Gate::VarLimit,
        Gate::OrderRateLimit,
        Gate::LatencyLimit,
        Gate::NoCriticalBreaches,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Gate::PositionLimit => "position_limit",
            Gate::DailyPnlLimit => "daily_pnl_limit",
            Gate::DrawdownLimit => "drawdown_limit",
            Gate::ConcentrationRisk => "concentration_risk",
            Gate::VarLimit => "var_limit",
            Gate::OrderRateLimit => "order_rate_limit",
            Gate::LatencyLimit => "latency_limit",
            Gate::NoCriticalBreaches => "no_critical_breaches",
        }
    }

    /// Gates 1-3 are the ones tracked in the persistent breach set.
    pub fn is_persistent(self) -> bool {
        matches!(self, Gate::PositionLimit | Gate::DailyPnlLimit | Gate::DrawdownLimit)
    }
}

/// Result of a single pre-trade check: which gates passed.
#[derive(Debug, Clone)]
pub struct GateResults {
    pub results: std::collections::HashMap<Gate, bool>,
}

impl GateResults {
    pub fn permit(&self) -> bool {
        self.results.values().all(|&ok| ok)
    }

    pub fn failed_gates(&self) -> Vec<Gate> {
        self.results
            .iter()
            .filter(|(_, &ok)| !ok)
            .map(|(g, _)| *g)
            .collect()
    }
}
