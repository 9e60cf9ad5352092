//! Clock & Latency: wall-clock access plus a synthetic per-event-class
//! latency generator and rolling statistics, grounded in the original
//! `LatencyTracker` (market_data / order_placement / order_cancel /
//! tick_to_trade sampling with warn/critical spike thresholds).

use rand::Rng;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

const WINDOW_CAPACITY: usize = 500;

/// The four latency classes the core tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatencyKind {
    MarketData,
    OrderPlacement,
    OrderCancel,
    TickToTrade,
}

impl LatencyKind {
    fn thresholds_us(self) -> Option<(u64, u64)> {
        match self {
            LatencyKind::MarketData => Some((1_000, 5_000)),
            LatencyKind::OrderPlacement => Some((2_000, 10_000)),
            LatencyKind::TickToTrade => Some((5_000, 15_000)),
            LatencyKind::OrderCancel => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy)]
pub struct Spike {
    pub kind: LatencyKind,
    pub sample_us: u64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyStats {
    pub mean_us: f64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
    pub count: usize,
}

struct Window {
    samples: VecDeque<u64>,
    last_was_critical: bool,
}

impl Window {
    fn new() -> Self {
        Self { samples: VecDeque::with_capacity(WINDOW_CAPACITY), last_was_critical: false }
    }

    fn push(&mut self, us: u64) {
        if self.samples.len() == WINDOW_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(us);
    }

    fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let mean_us = sum as f64 / count as f64;
        let idx = |p: f64| -> usize { ((count as f64 - 1.0) * p).round() as usize };
        LatencyStats {
            mean_us,
            p95_us: sorted[idx(0.95)],
            p99_us: sorted[idx(0.99)],
            max_us: *sorted.last().unwrap(),
            count,
        }
    }
}

/// Tracks rolling latency windows per event class and the simulated latency
/// generator used to synthesize samples for each.
pub struct LatencyTracker {
    windows: std::collections::HashMap<LatencyKind, Window>,
    spikes: VecDeque<Spike>,
    spike_capacity: usize,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyTracker {
    pub fn new() -> Self {
        let mut windows = std::collections::HashMap::new();
        for kind in [
            LatencyKind::MarketData,
            LatencyKind::OrderPlacement,
            LatencyKind::OrderCancel,
            LatencyKind::TickToTrade,
        ] {
            windows.insert(kind, Window::new());
        }
        Self { windows, spikes: VecDeque::new(), spike_capacity: 200 }
    }

    /// Draws a synthetic latency sample for `kind`: a base uniform draw plus,
    /// with low probability, a heavy-tail jitter draw. `tick_to_trade` is
    /// synthesized as market_data + a small constant + order_placement so it
    /// stays internally consistent with its two components.
    pub fn sample<R: Rng + ?Sized>(&self, kind: LatencyKind, rng: &mut R) -> u64 {
        match kind {
            LatencyKind::MarketData => Self::draw(rng, 50, 400, 0.02, 3_000, 8_000),
            LatencyKind::OrderPlacement => Self::draw(rng, 200, 1_500, 0.02, 8_000, 20_000),
            LatencyKind::OrderCancel => Self::draw(rng, 150_000, 400_000, 0.0, 0, 0),
            LatencyKind::TickToTrade => {
                let md = Self::draw(rng, 50, 400, 0.02, 3_000, 8_000);
                let processing = rng.gen_range(50..=300u64);
                let placement = Self::draw(rng, 200, 1_500, 0.02, 8_000, 20_000);
                md + processing + placement
            }
        }
    }

    fn draw<R: Rng + ?Sized>(
        rng: &mut R,
        base_lo: u64,
        base_hi: u64,
        jitter_prob: f64,
        jitter_lo: u64,
        jitter_hi: u64,
    ) -> u64 {
        let base = rng.gen_range(base_lo..=base_hi);
        if jitter_prob > 0.0 && rng.gen_bool(jitter_prob) {
            base + rng.gen_range(jitter_lo..=jitter_hi)
        } else {
            base
        }
    }

    /// Records a sample, updates rolling stats, and appends a spike entry if
    /// the sample crosses that kind's warning/critical threshold. Cancel
    /// latency has no spike classification.
    pub fn record(&mut self, kind: LatencyKind, us: u64) {
        let window = self.windows.entry(kind).or_insert_with(Window::new);
        window.push(us);

        if let Some((warn, crit)) = kind.thresholds_us() {
            let severity = if us >= crit {
                Some(Severity::Critical)
            } else if us >= warn {
                Some(Severity::Warning)
            } else {
                None
            };
            window.last_was_critical = matches!(severity, Some(Severity::Critical));
            if let Some(severity) = severity {
                if self.spikes.len() == self.spike_capacity {
                    self.spikes.pop_front();
                }
                self.spikes.push_back(Spike { kind, sample_us: us, severity });
            }
        }
    }

    pub fn stats(&self, kind: LatencyKind) -> LatencyStats {
        self.windows.get(&kind).map(|w| w.stats()).unwrap_or_default()
    }

    pub fn spikes(&self) -> impl Iterator<Item = &Spike> {
        self.spikes.iter()
    }

    /// True when the most recent recorded sample for `kind` was a critical
    /// spike, mirroring the original `should_alert` hook.
    pub fn should_alert(&self, kind: LatencyKind) -> bool {
        self.windows.get(&kind).map(|w| w.last_was_critical).unwrap_or(false)
    }
}

pub fn micros_since(earlier: SystemTime, later: SystemTime) -> u64 {
    later.duration_since(earlier).unwrap_or(Duration::ZERO).as_micros() as u64
}
