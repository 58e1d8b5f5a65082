use serde::{Deserialize, Serialize};

use crate::rng::SimRng;

/// Market mood steering the price walk. The wire protocol uses the uppercase
/// tag names ("BULLISH", "SIDEWAYS", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Volatile,
    Sideways,
    Choppy,
    Neutral,
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Numeric profile of one sentiment. All six values are consumed by the
/// price engine each tick.
#[derive(Debug, Clone, Copy)]
pub struct SentimentParams {
    /// Probability of an up move in the unbiased branch.
    pub up_prob: f64,
    /// Per-tick volatility as a fraction of price.
    pub base_vol: f64,
    /// Trend persistence; values above 0.5 push probability toward the
    /// direction of the current run.
    pub trend_strength: f64,
    /// Chance of an immediate direction flip on any tick.
    pub reversal_chance: f64,
    /// Run length that triggers a forced pullback.
    pub max_consecutive: i32,
    /// Whether price regresses toward its anchor.
    pub mean_revert: bool,
}

impl Sentiment {
    pub fn params(&self) -> SentimentParams {
        match self {
            Sentiment::Bullish => SentimentParams {
                up_prob: 0.62,
                base_vol: 0.0004,
                trend_strength: 0.80,
                reversal_chance: 0.08,
                max_consecutive: 10,
                mean_revert: false,
            },
            Sentiment::Bearish => SentimentParams {
                up_prob: 0.38,
                base_vol: 0.0004,
                trend_strength: 0.80,
                reversal_chance: 0.08,
                max_consecutive: 10,
                mean_revert: false,
            },
            Sentiment::Volatile => SentimentParams {
                up_prob: 0.50,
                base_vol: 0.0012,
                trend_strength: 0.65,
                reversal_chance: 0.18,
                max_consecutive: 6,
                mean_revert: false,
            },
            Sentiment::Sideways => SentimentParams {
                up_prob: 0.50,
                base_vol: 0.0002,
                trend_strength: 0.30,
                reversal_chance: 0.10,
                max_consecutive: 5,
                mean_revert: true,
            },
            Sentiment::Choppy => SentimentParams {
                up_prob: 0.50,
                base_vol: 0.0010,
                trend_strength: 0.20,
                reversal_chance: 0.35,
                max_consecutive: 3,
                mean_revert: false,
            },
            Sentiment::Neutral => SentimentParams {
                up_prob: 0.50,
                base_vol: 0.0004,
                trend_strength: 0.50,
                reversal_chance: 0.10,
                max_consecutive: 8,
                mean_revert: false,
            },
        }
    }

    /// Probability that a generated trade is a buy. Choppy re-rolls a fresh
    /// bias on every call.
    pub fn buy_probability(&self, rng: &mut SimRng) -> f64 {
        match self {
            Sentiment::Bullish => 0.72,
            Sentiment::Bearish => 0.28,
            Sentiment::Choppy => 0.40 + rng.uniform() * 0.20,
            _ => 0.50,
        }
    }

    /// (bid, ask) depth scaling for book reconstruction. Choppy draws each
    /// side independently per call.
    pub fn depth_multipliers(&self, rng: &mut SimRng) -> (f64, f64) {
        match self {
            Sentiment::Bullish => (1.5, 0.7),
            Sentiment::Bearish => (0.7, 1.5),
            Sentiment::Volatile => (0.6, 0.6),
            Sentiment::Sideways => (1.3, 1.3),
            Sentiment::Choppy => {
                let bid = 0.8 + rng.uniform() * 0.6;
                let ask = 0.8 + rng.uniform() * 0.6;
                (bid, ask)
            }
            Sentiment::Neutral => (1.0, 1.0),
        }
    }
}

/// How hard the simulation leans into its sentiment. Scales both price moves
/// and generated trade sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intensity {
    Mild,
    Moderate,
    Normal,
    Aggressive,
    Extreme,
}

impl Default for Intensity {
    fn default() -> Self {
        Self::Normal
    }
}

impl Intensity {
    pub fn price_multiplier(&self) -> f64 {
        match self {
            Intensity::Mild => 0.4,
            Intensity::Moderate => 0.7,
            Intensity::Normal => 0.85,
            Intensity::Aggressive => 1.0,
            Intensity::Extreme => 1.25,
        }
    }

    pub fn volume_multiplier(&self) -> f64 {
        match self {
            Intensity::Mild => 0.5,
            Intensity::Moderate => 0.8,
            Intensity::Normal => 1.0,
            Intensity::Aggressive => 1.2,
            Intensity::Extreme => 1.5,
        }
    }
}
