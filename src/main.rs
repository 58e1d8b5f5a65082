// ─────────────────────────────────────────────────────────────────────────────
// sim-engine-rs: per-client synthetic market simulator
//
// Serves a WebSocket endpoint where every connection gets an isolated market:
// a sentiment-driven price walk, a reconstructed limit order book, a synthetic
// trade tape, and OHLCV candles over five timeframes. Clients steer their own
// simulation with JSON control messages and receive a tick bundle on a
// speed-scaled 100 ms cadence.
// ─────────────────────────────────────────────────────────────────────────────
mod candles;
mod orderbook;
mod price_engine;
mod protocol;
mod rng;
mod sentiment;
mod server;
mod session;
mod trades;

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignored if missing)
    dotenvy::dotenv().ok();
    env_logger::init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let bind = std::env::var("SIM_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());

    log::info!("📈 sim-engine-rs starting…");
    log::info!("  Bind: {}:{}", bind, port);

    if let Err(e) = server::run(&bind, port).await {
        log::error!("[SERVER] fatal: {}", e);
        std::process::exit(1);
    }
}
