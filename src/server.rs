// ─────────────────────────────────────────────────────────────────────────────
// server.rs — Session Multiplexer
//
// Accepts WebSocket clients and gives each one its own Session driven by its
// own task. The task single-threadedly owns the session, so inbound dispatch,
// ticking, and teardown can never race within one session, and no simulation
// state is ever shared across sessions. The only process-wide mutable state
// is the monotonic session-id counter.
//
// Pacing: each session sleeps until its own next-due instant, computed from
// its speed setting (100 ms / speed). Slow ticks stretch the wall clock;
// ticks are never skipped.
// ─────────────────────────────────────────────────────────────────────────────
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use crate::protocol::{self, ServerMessage, SUBPROTOCOL};
use crate::session::Session;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Bind and serve forever. Every accepted connection gets a fresh session id
/// and an independent driver task.
pub async fn run(bind: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind((bind, port)).await?;
    log::info!("✅ [SERVER] listening on {}:{} (subprotocol \"{}\")", bind, port, SUBPROTOCOL);

    let next_id = Arc::new(AtomicI64::new(1));
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("[SERVER] accept failed: {}", e);
                continue;
            }
        };
        let session_id = next_id.fetch_add(1, Ordering::SeqCst);
        assert!(session_id < i64::MAX, "session id space exhausted");
        log::info!("[SERVER] connection from {} -> session {}", peer, session_id);

        tokio::spawn(async move {
            if let Err(e) = drive_connection(stream, session_id).await {
                log::warn!("[SESSION {}] connection ended: {}", session_id, e);
            }
            log::info!("[SESSION {}] closed", session_id);
        });
    }
}

/// Upgrade one TCP stream to WebSocket and run the session until the client
/// goes away. Returns Err only for handshake/transport failures; protocol
/// nonsense from the client is ignored per the wire contract.
async fn drive_connection(
    stream: TcpStream,
    session_id: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut negotiated = false;
    let ws = accept_hdr_async(stream, |req: &Request, mut resp: Response| {
        let offered = req
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').any(|p| p.trim() == SUBPROTOCOL))
            .unwrap_or(false);
        if offered {
            resp.headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
            negotiated = true;
        }
        Ok(resp)
    })
    .await?;
    log::info!(
        "[SESSION {}] handshake complete (subprotocol {})",
        session_id,
        if negotiated { "accepted" } else { "not offered" }
    );

    let (mut sink, mut source) = ws.split();
    let mut session = Session::new(session_id);
    let mut next_tick = tokio::time::Instant::now() + session.tick_interval();

    loop {
        tokio::select! {
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        for msg in protocol::decode_frames(&text) {
                            for reply in session.handle(msg, now_ms()) {
                                send_frame(&mut sink, session_id, &reply).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("[SESSION {}] read error: {}", session_id, e);
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(next_tick) => {
                if let Some(bundle) = session.tick(now_ms()) {
                    send_frame(&mut sink, session_id, &bundle).await;
                }
                // Re-anchor on the current instant so speed changes take
                // effect immediately.
                next_tick = tokio::time::Instant::now() + session.tick_interval();
            }
        }
    }

    Ok(())
}

/// Best-effort write. A failed write drops the frame and keeps the session
/// alive; the next tick re-publishes fresh state.
async fn send_frame(sink: &mut WsSink, session_id: i64, msg: &ServerMessage) {
    let payload = protocol::encode(msg);
    if let Err(e) = sink.send(Message::Text(payload)).await {
        log::debug!("[SESSION {}] dropped outbound frame: {}", session_id, e);
    }
}
