//! Run configuration: a fixed record, loadable from JSON. Grounded in
//! `config::types`'s serde-derive shape and its per-field
//! `#[serde(default = "fn")]` standalone default functions, dropped of the
//! compile-time-feature philosophy it pairs with elsewhere: these limits
//! are chosen at runtime, not selected via Cargo features.

use crate::errors::ConfigError;
use crate::risk::RiskLimits;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instrument symbol, e.g. "BTC-USD". Required: no sensible default.
    pub symbol: String,
    /// Minimum price increment. Required: no sensible default.
    pub tick_size: Decimal,
    /// Minimum order size.
    #[serde(default = "default_base_increment")]
    pub base_increment: Decimal,
    /// Minimum order value in quote currency.
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,
    #[serde(default = "default_order_size")]
    pub default_order_size: Decimal,
    #[serde(default = "default_max_position")]
    pub max_position: Decimal,
    /// Starting cash. Required: no sensible default.
    pub initial_cash: Decimal,
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_ticks_away")]
    pub max_ticks_away: u32,
    #[serde(default)]
    pub obi_thresholds: ObiThresholdTable,
    #[serde(default = "default_fee_tiers")]
    pub fee_tiers: Vec<(u64, u32)>,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObiThresholds {
    pub moderate_bid: Decimal,
    pub extreme_bid: Decimal,
    pub moderate_ask: Decimal,
    pub extreme_ask: Decimal,
}

/// The flat/long/short rows of the order-book-imbalance threshold table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObiThresholdTable {
    pub flat: ObiThresholds,
    pub long: ObiThresholds,
    pub short: ObiThresholds,
}

impl Default for ObiThresholdTable {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            flat: ObiThresholds {
                moderate_bid: dec!(0.40),
                extreme_bid: dec!(0.70),
                moderate_ask: dec!(0.40),
                extreme_ask: dec!(0.70),
            },
            long: ObiThresholds {
                moderate_bid: dec!(0.35),
                extreme_bid: dec!(0.65),
                moderate_ask: dec!(0.55),
                extreme_ask: dec!(0.85),
            },
            short: ObiThresholds {
                moderate_bid: dec!(0.55),
                extreme_bid: dec!(0.85),
                moderate_ask: dec!(0.35),
                extreme_ask: dec!(0.65),
            },
        }
    }
}

fn default_base_increment() -> Decimal {
    use rust_decimal_macros::dec;
    dec!(0.001)
}

fn default_min_notional() -> Decimal {
    use rust_decimal_macros::dec;
    dec!(1)
}

fn default_order_size() -> Decimal {
    use rust_decimal_macros::dec;
    dec!(10)
}

fn default_max_position() -> Decimal {
    use rust_decimal_macros::dec;
    dec!(100)
}

fn default_ttl_secs() -> u64 {
    120
}

fn default_max_ticks_away() -> u32 {
    15
}

fn default_rng_seed() -> u64 {
    0
}

fn default_fee_tiers() -> Vec<(u64, u32)> {
    crate::execution::FEE_TIERS.to_vec()
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::MissingField("symbol"));
        }
        if self.tick_size <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveTick(self.tick_size));
        }
        if self.base_increment <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveIncrement(self.base_increment));
        }
        for (name, value) in [
            ("max_position", self.risk.max_position),
            ("max_daily_loss", self.risk.max_daily_loss),
            ("max_drawdown", self.risk.max_drawdown),
            ("concentration", self.risk.concentration),
            ("var_limit", self.risk.var_limit),
        ] {
            if value <= Decimal::ZERO {
                return Err(ConfigError::NonPositiveRiskLimit { name, value });
            }
        }
        if self.fee_tiers.is_empty() || !self.fee_tiers.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(ConfigError::MalformedFeeTiers);
        }
        Ok(())
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}
