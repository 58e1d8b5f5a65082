// ─────────────────────────────────────────────────────────────────────────────
// session.rs — Per-Client Simulation State
//
// A Session owns everything one client sees: price engine, order book
// reshaping, trade generation, candle aggregation, cumulative stats, and the
// control flags. Nothing in here is shared between sessions; the connection
// driver owns the Session outright, so no locking is needed.
//
// Lifecycle: Idle → (start) Running ⇄ (pause) Paused → (reset) Idle.
// Disconnect drops the whole Session.
// ─────────────────────────────────────────────────────────────────────────────
use std::time::Duration;

use crate::candles::CandleManager;
use crate::orderbook;
use crate::price_engine::{round_tick, PriceEngine, MIN_PRICE};
use crate::protocol::{
    CandleHistoryData, ClientMessage, CompletedCandle, PricePoint, ServerMessage, StartConfig,
    StatsPayload, TickData,
};
use crate::rng::SimRng;
use crate::sentiment::{Intensity, Sentiment};
use crate::trades::TradeGenerator;

/// Base simulation cadence before speed scaling.
const TICK_INTERVAL_MS: f64 = 100.0;
pub const SPREAD_RANGE: (f64, f64) = (0.05, 0.25);
pub const SPEED_RANGE: (f64, f64) = (0.25, 2.0);

/// Advisory shock-activation window reported to clients.
const SHOCK_ACTIVE_WINDOW_MS: i64 = 5_000;
/// Advisory post-shock cooldown reported to clients.
const SHOCK_COOLDOWN_MS: i64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Running,
    Paused,
}

pub struct Session {
    id: i64,
    state: SessionState,
    symbol: String,

    // Control flags; mutations take effect on the next tick.
    sentiment: Sentiment,
    intensity: Intensity,
    spread: f64,
    speed: f64,
    shock_enabled: bool,
    shock_armed_at_ms: i64,
    last_shock_at_ms: i64,

    // Cumulative stats since start.
    current_price: f64,
    open_price: f64,
    high_price: f64,
    low_price: f64,
    total_volume: f64,
    total_trades: i64,

    engine: PriceEngine,
    candles: CandleManager,
    trades: TradeGenerator,
    rng: SimRng,
}

impl Session {
    pub fn new(id: i64) -> Self {
        Self::with_rng(id, SimRng::from_entropy())
    }

    /// Deterministic constructor for tests and reproducible runs.
    pub fn with_seed(id: i64, seed: u64) -> Self {
        Self::with_rng(id, SimRng::seeded(seed))
    }

    fn with_rng(id: i64, rng: SimRng) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            symbol: String::new(),
            sentiment: Sentiment::default(),
            intensity: Intensity::default(),
            spread: 0.10,
            speed: 1.0,
            shock_enabled: false,
            shock_armed_at_ms: 0,
            last_shock_at_ms: 0,
            current_price: 0.0,
            open_price: 0.0,
            high_price: 0.0,
            low_price: 0.0,
            total_volume: 0.0,
            total_trades: 0,
            engine: PriceEngine::new(),
            candles: CandleManager::new(),
            trades: TradeGenerator::new(id),
            rng,
        }
    }

    /// Wall-clock gap between this session's ticks at its current speed.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis((TICK_INTERVAL_MS / self.speed).round() as u64)
    }

    // ─── Inbound dispatch ─────────────────────────────────────────────────────

    /// Apply one decoded control message; returns the synchronous replies to
    /// write before the session's next tick bundle.
    pub fn handle(&mut self, msg: ClientMessage, now_ms: i64) -> Vec<ServerMessage> {
        match msg {
            ClientMessage::Start { config } => {
                self.start(config);
                vec![ServerMessage::Started]
            }
            ClientMessage::Sentiment { value } => {
                self.sentiment = value;
                Vec::new()
            }
            ClientMessage::Intensity { value } => {
                self.intensity = value;
                Vec::new()
            }
            ClientMessage::Spread { value } => {
                if (SPREAD_RANGE.0..=SPREAD_RANGE.1).contains(&value) {
                    self.spread = value;
                }
                Vec::new()
            }
            ClientMessage::Speed { value } => {
                if (SPEED_RANGE.0..=SPEED_RANGE.1).contains(&value) {
                    self.speed = value;
                }
                Vec::new()
            }
            ClientMessage::Pause { value } => {
                self.set_pause(value);
                Vec::new()
            }
            ClientMessage::Reset => {
                self.reset();
                vec![ServerMessage::SimulationReset, ServerMessage::CandleReset]
            }
            ClientMessage::NewsShock { value } => {
                self.shock_enabled = value;
                if value {
                    self.shock_armed_at_ms = now_ms;
                }
                Vec::new()
            }
            ClientMessage::GetCandles { timeframe } => {
                match self.candles.history(timeframe) {
                    Some((candles, current)) => vec![ServerMessage::CandleHistory {
                        data: CandleHistoryData { timeframe, candles, current },
                    }],
                    // Unknown timeframe: ignore, no reply.
                    None => Vec::new(),
                }
            }
            ClientMessage::Ping { value } => vec![ServerMessage::Pong { timestamp: value }],
        }
    }

    /// A `start` on a running session restarts it from the new config.
    fn start(&mut self, config: StartConfig) {
        self.reset();

        self.symbol = config.symbol;
        self.sentiment = config.sentiment;
        self.intensity = config.intensity;
        self.spread = config.spread.clamp(SPREAD_RANGE.0, SPREAD_RANGE.1);
        self.speed = config.speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1);

        let price = round_tick(config.price.max(MIN_PRICE));
        self.current_price = price;
        self.open_price = price;
        self.high_price = price;
        self.low_price = price;

        self.state = SessionState::Running;
        log::info!(
            "[SESSION {}] started {} @ {:.2} ({:?}/{:?}, spread {:.2}, speed {:.2})",
            self.id,
            self.symbol,
            price,
            self.sentiment,
            self.intensity,
            self.spread,
            self.speed
        );
    }

    /// Back to Idle. Configured controls survive; candles, stats and engine
    /// state do not. The trade id counter is deliberately kept so ids stay
    /// unique across the whole process lifetime.
    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.engine.reset();
        self.candles.reset();
        self.current_price = 0.0;
        self.open_price = 0.0;
        self.high_price = 0.0;
        self.low_price = 0.0;
        self.total_volume = 0.0;
        self.total_trades = 0;
        self.shock_armed_at_ms = 0;
        self.last_shock_at_ms = 0;
    }

    fn set_pause(&mut self, paused: bool) {
        match (self.state, paused) {
            (SessionState::Running, true) => self.state = SessionState::Paused,
            (SessionState::Paused, false) => self.state = SessionState::Running,
            _ => {}
        }
    }

    // ─── Tick ─────────────────────────────────────────────────────────────────

    /// Advance one simulation step. Idle and paused sessions produce nothing.
    pub fn tick(&mut self, now_ms: i64) -> Option<ServerMessage> {
        if self.state != SessionState::Running {
            return None;
        }

        let (new_price, shock) = self.engine.next(
            self.current_price,
            self.sentiment,
            self.intensity,
            self.shock_enabled,
            &mut self.rng,
        );
        if let Some(info) = shock {
            self.last_shock_at_ms = now_ms;
            log::info!(
                "[SESSION {}] news shock: {} {:.2}% @ {:.2}",
                self.id,
                info.kind,
                info.percent * 100.0,
                new_price
            );
        }

        self.current_price = new_price;
        self.high_price = self.high_price.max(new_price);
        self.low_price = self.low_price.min(new_price);

        let book = orderbook::shape(new_price, self.spread, self.sentiment, &mut self.rng);
        let trade = self.trades.maybe_trade(
            new_price,
            self.sentiment,
            self.intensity,
            now_ms,
            &mut self.rng,
        );
        let volume = trade.map(|t| t.quantity).unwrap_or(0.0);
        if let Some(t) = &trade {
            self.total_volume += t.quantity;
            self.total_trades += 1;
        }

        let (current_candles, closed) = self.candles.ingest(now_ms, new_price, volume);
        let completed_candles = closed
            .into_iter()
            .map(|(timeframe, candle)| CompletedCandle { timeframe, candle })
            .collect();

        Some(ServerMessage::Tick {
            data: Box::new(TickData {
                orderbook: book,
                stats: self.stats_payload(now_ms),
                price: PricePoint { timestamp: now_ms, price: new_price, volume },
                current_candles,
                completed_candles,
                trade,
            }),
        })
    }

    fn stats_payload(&self, now_ms: i64) -> StatsPayload {
        let change_percentage = if self.open_price > 0.0 {
            (self.current_price - self.open_price) / self.open_price * 100.0
        } else {
            0.0
        };

        // Advisory shock timers; actual firing is gated inside the engine.
        let active_remaining = if self.shock_enabled {
            (self.shock_armed_at_ms + SHOCK_ACTIVE_WINDOW_MS - now_ms).max(0)
        } else {
            0
        };
        let cooldown_remaining = if self.last_shock_at_ms > 0 {
            (self.last_shock_at_ms + SHOCK_COOLDOWN_MS - now_ms).max(0)
        } else {
            0
        };

        StatsPayload {
            symbol: self.symbol.clone(),
            current_price: self.current_price,
            open_price: self.open_price,
            high_price: self.high_price,
            low_price: self.low_price,
            total_volume: self.total_volume,
            total_trades: self.total_trades,
            change_percentage,
            sentiment: self.sentiment,
            intensity: self.intensity,
            spread: self.spread,
            speed: self.speed,
            paused: self.state == SessionState::Paused,
            news_shock_enabled: self.shock_enabled,
            news_shock_cooldown: cooldown_remaining > 0,
            news_shock_cooldown_remaining: cooldown_remaining,
            news_shock_active_remaining: active_remaining,
        }
    }
}
