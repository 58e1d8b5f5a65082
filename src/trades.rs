use serde::Serialize;

use crate::rng::SimRng;
use crate::sentiment::{Intensity, Sentiment};

/// Per-tick probability that a trade prints.
const TRADE_PROBABILITY: f64 = 0.33;
/// Id space reserved per session; ids are `session_id * ID_SPAN + counter`.
const ID_SPAN: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// An executed synthetic trade at the current mid.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Trade {
    pub id: i64,
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
    pub timestamp: i64,
}

/// Emits trades with sentiment-biased side and intensity-scaled size. Ids are
/// unique across every session of the process: each session owns a disjoint
/// one-million-id block. A session that exhausts its block stops printing
/// trades rather than reuse an id.
#[derive(Debug)]
pub struct TradeGenerator {
    session_id: i64,
    counter: i64,
    exhausted_logged: bool,
}

impl TradeGenerator {
    pub fn new(session_id: i64) -> Self {
        Self { session_id, counter: 0, exhausted_logged: false }
    }

    pub fn maybe_trade(
        &mut self,
        mid: f64,
        sentiment: Sentiment,
        intensity: Intensity,
        now_ms: i64,
        rng: &mut SimRng,
    ) -> Option<Trade> {
        if !rng.chance(TRADE_PROBABILITY) {
            return None;
        }
        if self.counter >= ID_SPAN {
            if !self.exhausted_logged {
                log::warn!(
                    "[SESSION {}] trade id block exhausted, no further trades will print",
                    self.session_id
                );
                self.exhausted_logged = true;
            }
            return None;
        }

        let buy_prob = sentiment.buy_probability(rng);
        let side = if rng.chance(buy_prob) { Side::Buy } else { Side::Sell };
        let quantity = ((10.0 + rng.uniform() * 200.0) * intensity.volume_multiplier()).round();
        let id = self.session_id * ID_SPAN + self.counter;
        self.counter += 1;

        Some(Trade { id, price: mid, quantity, side, timestamp: now_ms })
    }
}
