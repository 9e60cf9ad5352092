//! Market-making simulator, synthetic feed.
//!
//! Wires a synthetic random-walk book/trade generator to `mm-core`'s
//! quoting engine, execution simulator, and risk manager, and runs until
//! SIGINT or a configured tick budget is exhausted. Grounded in
//! `bog-bins`'s CLI/logging setup (`common::{init_logging, CommonArgs}`)
//! and its `create_test_feed` synthetic-snapshot generator, with a
//! `KillSwitch` substituted for the engine-internal stop flag that setup
//! otherwise uses: a thin binary wires a simulated ingestion source and
//! installs an orderly shutdown handle.

use anyhow::{Context, Result};
use clap::Parser;
use mm_core::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(author, version, about = "Market-making simulator over a synthetic feed")]
struct Args {
    /// Path to a JSON config file. When omitted, built-in defaults are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of book ticks to simulate before stopping on its own.
    #[arg(short, long, default_value_t = 5_000)]
    ticks: u64,

    /// Log level.
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            Ok(Config::from_json(&raw)?)
        }
        None => {
            let raw = r#"{"symbol":"BTC-USD","tick_size":"0.01","initial_cash":"100000"}"#;
            Ok(Config::from_json(raw)?)
        }
    }
}

/// A synthetic random-walk book/trade generator, standing in for a real
/// ingestion source the way `create_test_feed` stands in for Huginn.
/// Produces a fresh two-level book each tick and occasionally a trade
/// print crossing into the book.
struct SyntheticFeed {
    rng: StdRng,
    mid: Decimal,
    tick_size: Decimal,
}

impl SyntheticFeed {
    fn new(seed: u64, tick_size: Decimal, start_mid: Decimal) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), mid: start_mid, tick_size }
    }

    fn next_book(&mut self) -> Book {
        let drift_ticks = self.rng.gen_range(-3..=3);
        self.mid = (self.mid + self.tick_size * Decimal::from(drift_ticks)).max(self.tick_size);
        let half_spread = self.tick_size * Decimal::from(self.rng.gen_range(1..=4));
        let bid_price = round_to_tick(self.mid - half_spread, self.tick_size);
        let ask_price = round_to_tick(self.mid + half_spread, self.tick_size);
        let bid_size = Decimal::from(self.rng.gen_range(10..=200));
        let ask_size = Decimal::from(self.rng.gen_range(10..=200));
        Book {
            bids: vec![Level { price: bid_price, size: bid_size }],
            asks: vec![Level { price: ask_price, size: ask_size }],
            timestamp: SystemTime::now(),
        }
    }

    /// One time in five, prints a trade crossing into the current book.
    fn maybe_trade(&mut self, book: &Book) -> Option<Trade> {
        if self.rng.gen_range(0..5) != 0 {
            return None;
        }
        let aggressor_side = if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let price = match aggressor_side {
            Side::Buy => book.best_ask()?.price,
            Side::Sell => book.best_bid()?.price,
        };
        let size = Decimal::from(self.rng.gen_range(5..=80));
        Some(Trade { price, size, aggressor_side, timestamp: SystemTime::now() })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = load_config(&args)?;
    tracing::info!(symbol = %config.symbol, tick_size = %config.tick_size, "starting simulated run");

    let kill_switch = KillSwitch::new();
    {
        let ks = kill_switch.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("SIGINT received, shutting down");
            ks.shutdown();
        })
        .context("installing SIGINT handler")?;
    }

    let sim = Arc::new(ExecutionSimulator::new(ExecutionConfig {
        tick_size: config.tick_size,
        initial_cash: config.initial_cash,
        rng_seed: config.rng_seed,
    }));
    let risk = RiskManager::new(config.risk, config.initial_cash);
    let params = QuotingParams {
        tick_size: config.tick_size,
        base_increment: config.base_increment,
        min_notional: config.min_notional,
        default_order_size: config.default_order_size,
        max_position: config.max_position,
        base_max_ticks_away: config.max_ticks_away,
        adaptive_multiplier_cap: rust_decimal_macros::dec!(2),
        ttl: Duration::from_secs(config.ttl_secs),
    };
    let inventory_params = InventoryParams {
        target: Decimal::ZERO,
        max_inventory: config.max_position,
        k_ticks_per_unit: Decimal::ONE,
        half_life_secs: rust_decimal_macros::dec!(60),
    };
    let mut engine = QuotingEngine::new(
        params,
        ObiThresholdTable::from(config.obi_thresholds),
        inventory_params,
        rust_decimal_macros::dec!(0.01),
        risk,
        Arc::clone(&sim),
        config.initial_cash,
    );

    let mut feed = SyntheticFeed::new(config.rng_seed.wrapping_add(1), config.tick_size, rust_decimal_macros::dec!(100.00));

    let mut tick = 0u64;
    while tick < args.ticks {
        if kill_switch.should_stop() {
            tracing::info!(ticks_run = tick, "stopping before tick budget exhausted");
            break;
        }

        let book = feed.next_book();
        if let Some(trade) = feed.maybe_trade(&book) {
            engine.on_trade(trade);
        }
        let state = engine.on_book(&book);
        if tick % 500 == 0 {
            tracing::debug!(tick, state = %state, position = %sim.position(), "tick");
        }

        tick += 1;
    }

    let summary = engine.session_summary();
    let risk_snapshot = engine.risk_snapshot();
    tracing::info!(
        orders_sent = summary.orders_sent,
        fills = summary.fills,
        cancels = summary.cancels,
        win_rate = %summary.win_rate,
        sharpe = %summary.sharpe,
        fees = %summary.session_fees,
        pnl = %summary.pnl,
        max_drawdown = %summary.max_drawdown,
        "=== session summary ==="
    );
    tracing::info!(
        peak_equity = %risk_snapshot.peak_equity,
        breached_gates = ?risk_snapshot.breached_gates,
        emergency = risk_snapshot.emergency,
        "=== risk snapshot ==="
    );

    Ok(())
}
