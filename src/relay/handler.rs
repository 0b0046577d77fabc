//! WebSocket connection lifecycle.
//!
//! Authenticates the upgrade request, registers a sink with the hub, then
//! runs the two halves of the connection: a write pump draining the sink's
//! outbound queue onto the wire (with periodic pings), and a read pump that
//! only watches for closure and liveness. Either half failing ends both and
//! produces exactly one unregister.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::RelayState;
use crate::hub::{ChannelSink, ClientSink, Outbound};
use crate::metrics;

/// GET /ws
///
/// Bearer token is checked before the upgrade; a rejected connection never
/// reaches the hub.
pub async fn websocket_handler(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = bearer_token(&headers).and_then(|token| state.jwt.verify(token).ok());

    let claims = match claims {
        Some(claims) => claims,
        None => {
            metrics::REJECTED_CONNECTIONS.inc();
            tracing::info!("connection rejected: unauthorized");
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    };

    tracing::info!(subject = %claims.sub, "connection accepted");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (sink, outbound) = ChannelSink::new(state.config.send_buffer);
    let sink_id = sink.id();
    state.hub.register(sink);

    let (ws_tx, ws_rx) = socket.split();

    let mut send_task = tokio::spawn(write_pump(ws_tx, outbound, state.config.ping_interval));
    let mut recv_task = tokio::spawn(read_pump(ws_rx, state.config.read_deadline));

    // Both halves share one fate: whichever ends first takes the other down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Exactly one unregister per connection; a no-op if the hub already
    // dropped this sink for backpressure.
    state.hub.unregister(sink_id);
    tracing::debug!(sink_id = %sink_id, "connection finished");
}

/// Drain the outbound queue onto the wire, probing liveness with pings.
async fn write_pump(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: Outbound,
    ping_interval: Duration,
) {
    let mut ping = tokio::time::interval(ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbound.next() => match frame {
                Some(payload) => {
                    let text = String::from_utf8_lossy(&payload).into_owned();
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        tracing::debug!("write failed, closing connection");
                        break;
                    }
                }
                None => {
                    // Sink closed by the hub; tell the peer and stop.
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    tracing::debug!("ping failed, closing connection");
                    break;
                }
            }
        }
    }
}

/// Watch the inbound half for closure. Clients don't speak to the relay;
/// any frame (a pong above all) just proves the peer is alive.
async fn read_pump(mut ws_rx: SplitStream<WebSocket>, read_deadline: Duration) {
    loop {
        match tokio::time::timeout(read_deadline, ws_rx.next()).await {
            Err(_) => {
                tracing::debug!("liveness deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(error = %e, "read failed");
                break;
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Ok(_))) => {}
        }
    }
}
