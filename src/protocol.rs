// ─────────────────────────────────────────────────────────────────────────────
// protocol.rs — Wire Codec
//
// One JSON object per outbound text frame. Inbound frames may concatenate
// several top-level objects ("{…}{…}"); decode_frames splits them with a
// depth-tracking scanner before handing each to serde. Anything that fails to
// parse is dropped silently, per protocol: malformed input never closes a
// connection and never gets a reply.
// ─────────────────────────────────────────────────────────────────────────────
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::candles::Candle;
use crate::orderbook::OrderBookSnapshot;
use crate::sentiment::{Intensity, Sentiment};
use crate::trades::Trade;

/// Application subprotocol tag negotiated during the WS handshake.
pub const SUBPROTOCOL: &str = "lws-minimal";

// ─── Client → Server ──────────────────────────────────────────────────────────

/// Initial simulation parameters carried by `start`. Missing fields fall back
/// to the defaults below.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartConfig {
    pub symbol: String,
    pub price: f64,
    pub spread: f64,
    pub sentiment: Sentiment,
    pub intensity: Intensity,
    pub speed: f64,
}

impl Default for StartConfig {
    fn default() -> Self {
        Self {
            symbol: "SIM".to_string(),
            price: 100.00,
            spread: 0.10,
            sentiment: Sentiment::Neutral,
            intensity: Intensity::Normal,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Start { config: StartConfig },
    Sentiment { value: Sentiment },
    Intensity { value: Intensity },
    Spread { value: f64 },
    Speed { value: f64 },
    Pause { value: bool },
    Reset,
    NewsShock { value: bool },
    GetCandles { timeframe: u32 },
    Ping { value: String },
}

// ─── Server → Client ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedCandle {
    pub timeframe: u32,
    pub candle: Candle,
}

/// The per-tick stats block: cumulative session figures plus every control
/// flag echoed back so clients can render state without bookkeeping.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPayload {
    pub symbol: String,
    pub current_price: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub total_volume: f64,
    pub total_trades: i64,
    pub change_percentage: f64,
    pub sentiment: Sentiment,
    pub intensity: Intensity,
    pub spread: f64,
    pub speed: f64,
    pub paused: bool,
    pub news_shock_enabled: bool,
    pub news_shock_cooldown: bool,
    pub news_shock_cooldown_remaining: i64,
    pub news_shock_active_remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickData {
    pub orderbook: OrderBookSnapshot,
    pub stats: StatsPayload,
    pub price: PricePoint,
    /// Keyed by timeframe seconds; serde_json renders the keys as strings.
    pub current_candles: BTreeMap<u32, Option<Candle>>,
    pub completed_candles: Vec<CompletedCandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade: Option<Trade>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleHistoryData {
    pub timeframe: u32,
    pub candles: Vec<Candle>,
    pub current: Option<Candle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Started,
    Tick { data: Box<TickData> },
    CandleHistory { data: CandleHistoryData },
    SimulationReset,
    CandleReset,
    Pong { timestamp: String },
}

// ─── Frame decoding ───────────────────────────────────────────────────────────

/// Split a text frame into the top-level JSON objects it contains. The scanner
/// tracks brace depth and skips string bodies (including escapes), so braces
/// inside values never confuse it. Bytes outside any object and a trailing
/// unterminated object are discarded.
pub fn split_objects(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    objects.push(&input[start..=i]);
                }
            }
            _ => {}
        }
    }
    objects
}

/// Decode every parseable control message in a frame, dropping the rest.
pub fn decode_frames(text: &str) -> Vec<ClientMessage> {
    split_objects(text)
        .into_iter()
        .filter_map(|obj| match serde_json::from_str::<ClientMessage>(obj) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::debug!("[WIRE] ignoring unparseable message: {}", e);
                None
            }
        })
        .collect()
}

/// Serialize one outbound message to its frame payload.
pub fn encode(msg: &ServerMessage) -> String {
    // ServerMessage contains no map with non-string keys except u32 candle
    // keys, which serde_json stringifies; serialization cannot fail.
    serde_json::to_string(msg).unwrap_or_else(|e| {
        log::error!("[WIRE] failed to serialize outbound frame: {}", e);
        String::from("{}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_single_object() {
        assert_eq!(split_objects(r#"{"type":"reset"}"#), vec![r#"{"type":"reset"}"#]);
    }

    #[test]
    fn test_split_concatenated_objects() {
        let frame = r#"{"type":"pause","value":true}{"type":"reset"}{"type":"speed","value":2.0}"#;
        let parts = split_objects(frame);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], r#"{"type":"reset"}"#);
    }

    #[test]
    fn test_split_ignores_braces_inside_strings() {
        let frame = r#"{"type":"ping","value":"{tricky}}"}{"type":"reset"}"#;
        let parts = split_objects(frame);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], r#"{"type":"ping","value":"{tricky}}"}"#);
    }

    #[test]
    fn test_split_handles_escaped_quotes() {
        let frame = r#"{"type":"ping","value":"say \"}\" loud"}{"type":"reset"}"#;
        let parts = split_objects(frame);
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_split_discards_garbage_and_trailing_partial() {
        let frame = r#"  noise {"type":"reset"} , {"type":"pause","value":false} {"type":"spe"#;
        let parts = split_objects(frame);
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_decode_all_control_messages() {
        let frame = concat!(
            r#"{"type":"start","config":{"symbol":"ACME","price":50,"spread":0.1,"sentiment":"BULLISH","intensity":"MILD","speed":1.5}}"#,
            r#"{"type":"sentiment","value":"CHOPPY"}"#,
            r#"{"type":"intensity","value":"AGGRESSIVE"}"#,
            r#"{"type":"spread","value":0.2}"#,
            r#"{"type":"speed","value":0.5}"#,
            r#"{"type":"pause","value":true}"#,
            r#"{"type":"reset"}"#,
            r#"{"type":"newsShock","value":true}"#,
            r#"{"type":"getCandles","timeframe":30}"#,
            r#"{"type":"ping","value":"1712345678901"}"#,
        );
        let msgs = decode_frames(frame);
        assert_eq!(msgs.len(), 10);
        match &msgs[0] {
            ClientMessage::Start { config } => {
                assert_eq!(config.symbol, "ACME");
                assert_eq!(config.price, 50.0);
                assert_eq!(config.sentiment, Sentiment::Bullish);
                assert_eq!(config.speed, 1.5);
            }
            other => panic!("expected start, got {:?}", other),
        }
        assert!(matches!(msgs[6], ClientMessage::Reset));
        assert!(matches!(msgs[8], ClientMessage::GetCandles { timeframe: 30 }));
        match &msgs[9] {
            ClientMessage::Ping { value } => assert_eq!(value, "1712345678901"),
            other => panic!("expected ping, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_skips_unknown_and_malformed() {
        let frame = r#"{"type":"teleport"}{"type":"spread","value":"wide"}{"type":"reset"}"#;
        let msgs = decode_frames(frame);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], ClientMessage::Reset));
    }

    #[test]
    fn test_start_config_defaults_fill_missing_fields() {
        let msgs = decode_frames(r#"{"type":"start","config":{"symbol":"XYZ"}}"#);
        match &msgs[0] {
            ClientMessage::Start { config } => {
                assert_eq!(config.symbol, "XYZ");
                assert_eq!(config.price, 100.00);
                assert_eq!(config.spread, 0.10);
                assert_eq!(config.sentiment, Sentiment::Neutral);
            }
            other => panic!("expected start, got {:?}", other),
        }
    }

    #[test]
    fn test_outbound_tags() {
        assert_eq!(encode(&ServerMessage::Started), r#"{"type":"started"}"#);
        assert_eq!(encode(&ServerMessage::SimulationReset), r#"{"type":"simulationReset"}"#);
        assert_eq!(encode(&ServerMessage::CandleReset), r#"{"type":"candleReset"}"#);
        let pong = encode(&ServerMessage::Pong { timestamp: "123".into() });
        let value: serde_json::Value = serde_json::from_str(&pong).unwrap();
        assert_eq!(value["type"], "pong");
        assert_eq!(value["timestamp"], "123");
    }

    #[test]
    fn test_candle_history_shape() {
        let msg = ServerMessage::CandleHistory {
            data: CandleHistoryData { timeframe: 60, candles: Vec::new(), current: None },
        };
        let value: serde_json::Value = serde_json::from_str(&encode(&msg)).unwrap();
        assert_eq!(value["type"], "candleHistory");
        assert_eq!(value["data"]["timeframe"], 60);
        assert!(value["data"]["candles"].as_array().unwrap().is_empty());
        assert!(value["data"]["current"].is_null());
    }
}
