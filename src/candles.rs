use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

/// Aggregation periods in seconds. Wire messages key candles by these values.
pub const TIMEFRAMES: [u32; 5] = [1, 5, 30, 60, 300];
/// Completed candles retained per timeframe; oldest are discarded.
const MAX_COMPLETED: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    /// Period-floor timestamp: always a multiple of the timeframe.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trades: i32,
}

impl Candle {
    fn seed(slot: i64, price: f64, volume: f64) -> Self {
        Self {
            timestamp: slot,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            trades: if volume > 0.0 { 1 } else { 0 },
        }
    }

    fn absorb(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
        if volume > 0.0 {
            self.trades += 1;
        }
    }
}

#[derive(Debug)]
struct TimeframeBucket {
    period_ms: i64,
    current: Option<Candle>,
    completed: VecDeque<Candle>,
}

impl TimeframeBucket {
    fn new(period_s: u32) -> Self {
        Self {
            period_ms: period_s as i64 * 1_000,
            current: None,
            completed: VecDeque::with_capacity(MAX_COMPLETED),
        }
    }

    /// Fold one observation in; returns the candle this observation closed,
    /// if any.
    fn ingest(&mut self, timestamp_ms: i64, price: f64, volume: f64) -> Option<Candle> {
        let slot = timestamp_ms / self.period_ms * self.period_ms;
        match &mut self.current {
            Some(candle) if candle.timestamp == slot => {
                candle.absorb(price, volume);
                None
            }
            _ => {
                let finished = self.current.take();
                if let Some(done) = finished {
                    if self.completed.len() >= MAX_COMPLETED {
                        self.completed.pop_front();
                    }
                    self.completed.push_back(done);
                }
                self.current = Some(Candle::seed(slot, price, volume));
                finished
            }
        }
    }
}

/// Five independent OHLCV aggregators fed from the same tick stream. All
/// state is session-local; `reset` returns the manager to its freshly
/// constructed form.
#[derive(Debug)]
pub struct CandleManager {
    buckets: Vec<TimeframeBucket>,
}

impl CandleManager {
    pub fn new() -> Self {
        Self {
            buckets: TIMEFRAMES.iter().map(|&p| TimeframeBucket::new(p)).collect(),
        }
    }

    /// Feed one (timestamp, price, volume) observation to every timeframe.
    /// Returns the post-ingest partial per timeframe and the candles this
    /// observation completed.
    pub fn ingest(
        &mut self,
        timestamp_ms: i64,
        price: f64,
        volume: f64,
    ) -> (BTreeMap<u32, Option<Candle>>, Vec<(u32, Candle)>) {
        let mut current = BTreeMap::new();
        let mut completed = Vec::new();
        for (tf, bucket) in TIMEFRAMES.iter().zip(self.buckets.iter_mut()) {
            if let Some(done) = bucket.ingest(timestamp_ms, price, volume) {
                completed.push((*tf, done));
            }
            current.insert(*tf, bucket.current);
        }
        (current, completed)
    }

    /// Copy out the retained history for one timeframe. Unknown timeframes
    /// yield None.
    pub fn history(&self, timeframe: u32) -> Option<(Vec<Candle>, Option<Candle>)> {
        let idx = TIMEFRAMES.iter().position(|&p| p == timeframe)?;
        let bucket = &self.buckets[idx];
        Some((bucket.completed.iter().copied().collect(), bucket.current))
    }

    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.current = None;
            bucket.completed.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_period_aggregation() {
        let mut mgr = CandleManager::new();
        mgr.ingest(0, 100.0, 1.0);
        mgr.ingest(250, 101.0, 2.0);
        mgr.ingest(750, 99.0, 3.0);
        let (current, completed) = mgr.ingest(999, 100.5, 4.0);
        assert!(completed.is_empty());

        let partial = current[&1].expect("1s partial");
        assert_eq!(partial.timestamp, 0);
        assert_eq!(partial.open, 100.0);
        assert_eq!(partial.high, 101.0);
        assert_eq!(partial.low, 99.0);
        assert_eq!(partial.close, 100.5);
        assert_eq!(partial.volume, 10.0);
        assert_eq!(partial.trades, 4);
    }

    #[test]
    fn test_boundary_tick_opens_fresh_partial() {
        let mut mgr = CandleManager::new();
        for (ts, price, vol) in [(0, 100.0, 1.0), (250, 101.0, 2.0), (750, 99.0, 3.0), (999, 100.5, 4.0)] {
            mgr.ingest(ts, price, vol);
        }
        let (current, completed) = mgr.ingest(1_000, 102.0, 5.0);

        let closed: Vec<_> = completed.iter().filter(|(tf, _)| *tf == 1).collect();
        assert_eq!(closed.len(), 1);
        let done = closed[0].1;
        assert_eq!(done.timestamp, 0);
        assert_eq!(done.close, 100.5);

        let fresh = current[&1].unwrap();
        assert_eq!(fresh.timestamp, 1_000);
        assert_eq!(fresh.open, 102.0);
        assert_eq!(fresh.trades, 1);

        // Longer timeframes absorbed the same tick without closing.
        assert!(completed.iter().all(|(tf, _)| *tf == 1));
        assert_eq!(current[&300].unwrap().timestamp, 0);
    }

    #[test]
    fn test_ohlc_ordering_invariant() {
        let mut mgr = CandleManager::new();
        let mut price = 100.0;
        for i in 0..5_000i64 {
            price += if i % 3 == 0 { 0.35 } else { -0.20 };
            let (current, completed) = mgr.ingest(i * 137, price, (i % 4) as f64);
            for candle in current
                .values()
                .flatten()
                .chain(completed.iter().map(|(_, c)| c))
            {
                assert!(candle.low <= candle.open.min(candle.close));
                assert!(candle.high >= candle.open.max(candle.close));
                assert!(candle.volume >= 0.0);
            }
        }
    }

    #[test]
    fn test_retention_cap_and_ordering() {
        let mut mgr = CandleManager::new();
        // 600 one-second periods, two ticks each.
        for s in 0..600i64 {
            mgr.ingest(s * 1_000, 100.0, 1.0);
            mgr.ingest(s * 1_000 + 500, 100.5, 0.0);
        }
        let (completed, current) = mgr.history(1).unwrap();
        assert_eq!(completed.len(), 500);
        // Oldest discarded: retained range is [99s, 599s).
        assert_eq!(completed.first().unwrap().timestamp, 99_000);
        assert_eq!(completed.last().unwrap().timestamp, 598_000);
        for pair in completed.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
        for candle in &completed {
            assert_eq!(candle.timestamp % 1_000, 0);
        }
        let partial = current.unwrap();
        assert_eq!(partial.timestamp, 599_000);
        assert!(completed.iter().all(|c| c.timestamp != partial.timestamp));
    }

    #[test]
    fn test_zero_volume_ticks_count_no_trades() {
        let mut mgr = CandleManager::new();
        mgr.ingest(0, 100.0, 0.0);
        mgr.ingest(100, 101.0, 0.0);
        let (current, _) = mgr.ingest(200, 99.5, 12.0);
        let partial = current[&1].unwrap();
        assert_eq!(partial.trades, 1);
        assert_eq!(partial.volume, 12.0);
    }

    #[test]
    fn test_unknown_timeframe_is_none() {
        let mgr = CandleManager::new();
        assert!(mgr.history(2).is_none());
        assert!(mgr.history(0).is_none());
    }

    #[test]
    fn test_reset_erases_everything() {
        let mut mgr = CandleManager::new();
        for s in 0..10i64 {
            mgr.ingest(s * 1_000, 100.0, 1.0);
        }
        mgr.reset();
        for tf in TIMEFRAMES {
            let (completed, current) = mgr.history(tf).unwrap();
            assert!(completed.is_empty());
            assert!(current.is_none());
        }
        // First ingest after reset behaves like a fresh manager.
        let (current, completed) = mgr.ingest(3_500, 50.0, 0.0);
        assert!(completed.is_empty());
        assert_eq!(current[&1].unwrap().timestamp, 3_000);
    }
}
