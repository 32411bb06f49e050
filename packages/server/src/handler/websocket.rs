//! WebSocket relay handler.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use lobby_shared::protocol::{Envelope, SessionInfo, events};

use crate::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let connection_id = Uuid::new_v4().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id))
}

/// Build the `session` frame announcing the client's connection id.
fn session_frame(connection_id: &str) -> Option<String> {
    let data = serde_json::to_value(SessionInfo {
        connection_id: connection_id.to_string(),
    })
    .ok()?;
    Envelope::new(events::SESSION, Some(data)).to_json().ok()
}

/// Validate a client frame; only well-formed envelopes are relayed.
fn relay_frame(text: &str) -> Option<String> {
    match Envelope::from_json(text) {
        Ok(envelope) if events::is_lifecycle(&envelope.event) => {
            tracing::warn!("Refusing to relay reserved event '{}'", envelope.event);
            None
        }
        Ok(envelope) => envelope.to_json().ok(),
        Err(e) => {
            tracing::warn!("Dropping malformed frame: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, connection_id: String) {
    let (mut sender, mut receiver) = socket.split();
    // subscribe before announcing so no relayed frame is missed
    let mut relay_rx = state.relay.subscribe();

    let Some(frame) = session_frame(&connection_id) else {
        tracing::error!("Failed to encode session frame for '{}'", connection_id);
        return;
    };
    if let Err(e) = sender.send(Message::Text(frame.into())).await {
        tracing::error!("Failed to send session to '{}': {}", connection_id, e);
        return;
    }
    tracing::info!("Client '{}' connected", connection_id);

    // Spawn a task to push relayed frames to this client
    let id_for_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            match relay_rx.recv().await {
                Ok(frame) => {
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Client '{}' lagged, skipped {} frame(s)", id_for_send, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Spawn a task to relay frames received from this client
    let relay = state.relay.clone();
    let id_for_recv = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error from '{}': {}", id_for_recv, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    if let Some(frame) = relay_frame(text.as_str()) {
                        tracing::debug!("Relaying frame from '{}'", id_for_recv);
                        relay_to_all(&relay, frame);
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Client '{}' requested close", id_for_recv);
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    tracing::info!("Client '{}' disconnected", connection_id);
}

fn relay_to_all(relay: &broadcast::Sender<String>, frame: String) {
    // no subscribers only happens while the last client is leaving
    let _ = relay.send(frame);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_frame_carries_connection_id() {
        // テスト項目: session フレームに接続 ID が含まれる
        // given (前提条件):
        let connection_id = "c0ffee";

        // when (操作):
        let frame = session_frame(connection_id).unwrap();

        // then (期待する結果):
        assert_eq!(
            frame,
            r#"{"event":"session","data":{"socketId":"c0ffee"}}"#
        );
    }

    #[test]
    fn test_relay_frame_accepts_envelope() {
        // テスト項目: 正しいエンベロープは中継対象になる
        // given (前提条件):
        let text = r#"{"event":"start"}"#;

        // when (操作):
        let result = relay_frame(text);

        // then (期待する結果):
        assert_eq!(result.as_deref(), Some(text));
    }

    #[test]
    fn test_relay_frame_drops_garbage_and_reserved_names() {
        // テスト項目: 不正なフレームと予約イベント名は中継しない
        // given (前提条件):

        // when (操作) / then (期待する結果):
        assert_eq!(relay_frame("hello"), None);
        assert_eq!(relay_frame(r#"{"event":"connect"}"#), None);
    }
}
