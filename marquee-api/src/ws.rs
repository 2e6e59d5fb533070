use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use marquee_infra::bus::seat_events_channel;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(20);
const PONG_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

// GET /ws/showtimes/:showtime_id/seats?token=JWT
pub async fn seats(
    State(state): State<AppState>,
    Path(showtime_id): Path<String>,
    Query(q): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = q.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"ok": false, "error": "missing_token"})),
        )
            .into_response();
    };

    if state.jwt.verify(token).is_err() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"ok": false, "error": "invalid_token"})),
        )
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, showtime_id))
}

/// Forwards `seat-events:<showtime>` payloads verbatim to the client.
/// Read-only: the gateway never publishes.
async fn handle_socket(socket: WebSocket, state: AppState, showtime_id: String) {
    let mut pubsub = match state.redis.get_async_pubsub().await {
        Ok(p) => p,
        Err(e) => {
            warn!(showtime_id, "pubsub connect failed: {e}");
            return;
        }
    };
    if let Err(e) = pubsub.subscribe(seat_events_channel(&showtime_id)).await {
        warn!(showtime_id, "subscribe failed: {e}");
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    let hello = json!({"type": "hello", "showtime_id": showtime_id});
    if sender.send(Message::Text(hello.to_string())).await.is_err() {
        return;
    }

    let mut events = pubsub.on_message();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await; // first tick fires immediately

    let deadline = tokio::time::sleep(PONG_DEADLINE);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            msg = events.next() => {
                let Some(msg) = msg else { break };
                let Ok(payload) = msg.get_payload::<String>() else { continue };
                if sender.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Pong(_))) => {
                        deadline
                            .as_mut()
                            .reset(tokio::time::Instant::now() + PONG_DEADLINE);
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(b"ping".to_vec())).await.is_err() {
                    break;
                }
            }
            _ = &mut deadline => {
                debug!(showtime_id, "websocket pong deadline exceeded");
                break;
            }
        }
    }
}
