// ─────────────────────────────────────────────────────────────────────────────
// price_engine.rs — Sentiment-Driven Price Walk
//
// One engine per session. Each tick produces a new mid price from:
//   - the sentiment's probability/volatility profile,
//   - trend persistence with forced pullbacks after long runs,
//   - mean reversion toward an anchor (Sideways only),
//   - optional news shocks (1-3% jumps, rate-limited by a tick gate).
// Prices live on a 0.05 grid and every tick moves at least one grid step.
// ─────────────────────────────────────────────────────────────────────────────
use std::fmt;

use crate::rng::SimRng;
use crate::sentiment::{Intensity, Sentiment};

/// Minimum price increment.
pub const PRICE_TICK: f64 = 0.05;
/// Absolute price floor.
pub const MIN_PRICE: f64 = 0.01;

/// Ticks that must elapse after a shock before another may fire.
const SHOCK_MIN_GAP_TICKS: i32 = 20;
/// Per-tick shock probability once the gap gate is open.
const SHOCK_PROBABILITY: f64 = 0.03;

/// Snap a price onto the 0.05 grid.
pub fn round_tick(x: f64) -> f64 {
    (x * 20.0).round() / 20.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShockKind {
    Bullish,
    Bearish,
}

impl fmt::Display for ShockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShockKind::Bullish => write!(f, "bullish"),
            ShockKind::Bearish => write!(f, "bearish"),
        }
    }
}

/// Annotation for a tick on which a news shock fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShockInfo {
    pub kind: ShockKind,
    /// Jump size as a fraction of the pre-shock price.
    pub percent: f64,
}

/// Stochastic state carried between ticks.
#[derive(Debug)]
pub struct PriceEngine {
    consecutive_moves: i32,
    last_direction: i32,
    pullback_remaining: i32,
    ticks_since_last_shock: i32,
    last_shock_kind: Option<ShockKind>,
    /// Reference price for mean reversion; set on the first tick.
    anchor_price: f64,
}

impl PriceEngine {
    pub fn new() -> Self {
        Self {
            consecutive_moves: 0,
            last_direction: 1,
            pullback_remaining: 0,
            ticks_since_last_shock: 0,
            last_shock_kind: None,
            anchor_price: 0.0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance one tick. Returns the new price (strictly positive, on the
    /// 0.05 grid, never equal to `current`) and a shock annotation if a news
    /// shock fired this tick.
    pub fn next(
        &mut self,
        current: f64,
        sentiment: Sentiment,
        intensity: Intensity,
        shock_enabled: bool,
        rng: &mut SimRng,
    ) -> (f64, Option<ShockInfo>) {
        self.ticks_since_last_shock += 1;

        if shock_enabled
            && self.ticks_since_last_shock >= SHOCK_MIN_GAP_TICKS
            && rng.chance(SHOCK_PROBABILITY)
        {
            return self.fire_shock(current, sentiment, intensity, rng);
        }

        if self.anchor_price <= 0.0 {
            self.anchor_price = current;
        }

        let (change_fraction, direction) = self.normal_move(current, sentiment, intensity, rng);
        let mut new_price = round_tick(current * (1.0 + change_fraction));
        if (new_price - current).abs() < 1e-9 {
            // Rounding swallowed the move; force one grid step.
            new_price = round_tick(current + direction as f64 * PRICE_TICK);
        }
        (new_price.max(MIN_PRICE), None)
    }

    fn fire_shock(
        &mut self,
        current: f64,
        sentiment: Sentiment,
        intensity: Intensity,
        rng: &mut SimRng,
    ) -> (f64, Option<ShockInfo>) {
        let up = rng.chance(sentiment.params().up_prob);
        let direction = if up { 1.0 } else { -1.0 };
        let magnitude = (0.01 + rng.uniform() * 0.02) * intensity.price_multiplier();

        let mut new_price = round_tick(current * (1.0 + direction * magnitude));
        if (new_price - current).abs() < 1e-9 {
            new_price = round_tick(current + direction * PRICE_TICK);
        }

        self.consecutive_moves = 0;
        self.pullback_remaining = 0;
        self.ticks_since_last_shock = 0;
        let kind = if up { ShockKind::Bullish } else { ShockKind::Bearish };
        self.last_shock_kind = Some(kind);

        (
            new_price.max(MIN_PRICE),
            Some(ShockInfo { kind, percent: magnitude }),
        )
    }

    /// One non-shock step. Branch order matters: reversal roll first, then
    /// forced pullback entry, then an ongoing pullback, then the trend-biased
    /// normal draw. Later branches read state the earlier ones update.
    fn normal_move(
        &mut self,
        current: f64,
        sentiment: Sentiment,
        intensity: Intensity,
        rng: &mut SimRng,
    ) -> (f64, i32) {
        let params = sentiment.params();
        let mut in_pullback = false;
        let direction;

        if rng.chance(params.reversal_chance) {
            direction = -self.last_direction;
            self.consecutive_moves = 1;
            self.last_direction = direction;
        } else if self.consecutive_moves >= params.max_consecutive {
            // Run exhausted: start a 2-4 tick counter-trend pullback.
            direction = -self.last_direction;
            self.pullback_remaining = 2 + rng.range_i32(0, 3);
            self.consecutive_moves = 0;
            in_pullback = true;
        } else if self.pullback_remaining > 0 {
            direction = -self.last_direction;
            self.pullback_remaining -= 1;
            if self.pullback_remaining == 0 {
                self.consecutive_moves = 0;
            }
            in_pullback = true;
        } else {
            let mut effective_up = params.up_prob;
            if params.mean_revert && self.anchor_price > 0.0 {
                let deviation = (current - self.anchor_price) / self.anchor_price;
                effective_up = (params.up_prob - deviation * 0.4).clamp(0.2, 0.8);
            }
            if sentiment == Sentiment::Choppy {
                effective_up = 0.35 + rng.uniform() * 0.30;
            }
            if self.consecutive_moves > 0 && params.trend_strength > 0.5 {
                let push = (params.trend_strength - 0.5) * 0.15;
                effective_up += if self.last_direction > 0 { push } else { -push };
            }

            direction = if rng.chance(effective_up) { 1 } else { -1 };
            if direction == self.last_direction {
                self.consecutive_moves += 1;
            } else {
                self.consecutive_moves = 1;
                self.last_direction = direction;
            }
        }

        let mut magnitude = (0.5 + rng.uniform() * 0.5) * params.base_vol;
        if in_pullback {
            magnitude *= 0.7;
        }
        magnitude *= intensity.price_multiplier();
        if sentiment == Sentiment::Volatile && rng.chance(0.15) {
            magnitude *= 2.0;
        }
        if sentiment == Sentiment::Choppy {
            magnitude *= 0.5 + rng.uniform();
        }

        (direction as f64 * magnitude, direction)
    }
}
