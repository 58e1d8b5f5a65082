use serde::Serialize;

use crate::price_engine::{round_tick, PRICE_TICK};
use crate::rng::SimRng;
use crate::sentiment::Sentiment;

/// Levels reconstructed on each side of the book.
pub const BOOK_DEPTH: usize = 15;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: i32,
    /// Running sum of quantities from the top of this side down.
    pub total: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookSnapshot {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread: f64,
}

/// Rebuild the synthetic book around `mid`. Bids descend and asks ascend in
/// 0.05 steps from the touch; level quantities are uniform draws scaled by
/// the sentiment's depth multipliers.
///
/// The ask is derived from the rounded bid rather than rounded independently,
/// so the touch distance always equals the configured spread at grid
/// precision even when `spread / 2` falls between grid points.
pub fn shape(mid: f64, spread: f64, sentiment: Sentiment, rng: &mut SimRng) -> OrderBookSnapshot {
    let best_bid = round_tick(mid - spread / 2.0);
    let best_ask = round_tick(best_bid + spread);
    let (bid_mult, ask_mult) = sentiment.depth_multipliers(rng);

    let mut bids = Vec::with_capacity(BOOK_DEPTH);
    let mut asks = Vec::with_capacity(BOOK_DEPTH);
    let mut bid_total = 0;
    let mut ask_total = 0;

    for i in 0..BOOK_DEPTH {
        let offset = i as f64 * PRICE_TICK;
        let bid_qty = (rng.range_i32(100, 500) as f64 * bid_mult).round() as i32;
        bid_total += bid_qty;
        bids.push(PriceLevel {
            price: round_tick(best_bid - offset),
            quantity: bid_qty,
            total: bid_total,
        });

        let ask_qty = (rng.range_i32(100, 500) as f64 * ask_mult).round() as i32;
        ask_total += ask_qty;
        asks.push(PriceLevel {
            price: round_tick(best_ask + offset),
            quantity: ask_qty,
            total: ask_total,
        });
    }

    OrderBookSnapshot {
        bids,
        asks,
        best_bid,
        best_ask,
        spread: round_tick(best_ask - best_bid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sides_are_sorted_from_touch() {
        let mut rng = SimRng::seeded(9);
        let book = shape(100.00, 0.10, Sentiment::Neutral, &mut rng);
        assert_eq!(book.bids.len(), BOOK_DEPTH);
        assert_eq!(book.asks.len(), BOOK_DEPTH);
        for pair in book.bids.windows(2) {
            assert!(pair[1].price < pair[0].price);
        }
        for pair in book.asks.windows(2) {
            assert!(pair[1].price > pair[0].price);
        }
        assert_eq!(book.bids[0].price, book.best_bid);
        assert_eq!(book.asks[0].price, book.best_ask);
    }

    #[test]
    fn test_spread_is_exact_on_grid() {
        let mut rng = SimRng::seeded(9);
        for spread in [0.05, 0.10, 0.15, 0.20, 0.25] {
            let book = shape(100.00, spread, Sentiment::Neutral, &mut rng);
            assert!(
                (book.best_ask - book.best_bid - book.spread).abs() < 1e-9,
                "reported spread {} disagrees with touch {}..{}",
                book.spread,
                book.best_bid,
                book.best_ask
            );
            assert!((book.spread - spread).abs() < 1e-9);
        }
    }

    #[test]
    fn test_off_grid_spread_snaps_within_half_tick() {
        let mut rng = SimRng::seeded(9);
        for spread in [0.12, 0.18, 0.21] {
            let book = shape(87.35, spread, Sentiment::Neutral, &mut rng);
            assert!((book.best_ask - book.best_bid - book.spread).abs() < 1e-9);
            assert!((book.spread - spread).abs() <= PRICE_TICK / 2.0 + 1e-9);
        }
    }

    #[test]
    fn test_cumulative_totals() {
        let mut rng = SimRng::seeded(21);
        let book = shape(250.55, 0.15, Sentiment::Volatile, &mut rng);
        for side in [&book.bids, &book.asks] {
            let mut running = 0;
            for level in side.iter() {
                assert!(level.quantity > 0);
                running += level.quantity;
                assert_eq!(level.total, running);
            }
        }
    }

    #[test]
    fn test_depth_follows_sentiment() {
        let mut rng = SimRng::seeded(33);
        let mut bid_sum = 0i64;
        let mut ask_sum = 0i64;
        for _ in 0..200 {
            let book = shape(100.00, 0.10, Sentiment::Bullish, &mut rng);
            bid_sum += book.bids.last().unwrap().total as i64;
            ask_sum += book.asks.last().unwrap().total as i64;
        }
        // Bullish books are bid-heavy (1.5x vs 0.7x scaling).
        assert!(bid_sum > ask_sum);
    }
}
