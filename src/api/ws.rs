//! src/api/ws.rs
//!
//! Streams the status snapshot to a connected websocket client every time
//! the runtime publishes a new one.

use super::ApiState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, mut state: ApiState) {
    let initial = state.status_rx.borrow().clone();
    if send_snapshot(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        if state.status_rx.changed().await.is_err() {
            break;
        }
        let snapshot = state.status_rx.borrow().clone();
        if send_snapshot(&mut socket, &snapshot).await.is_err() {
            break;
        }
    }
}

async fn send_snapshot(
    socket: &mut WebSocket,
    snapshot: &crate::runtime::StatusSnapshot,
) -> Result<(), axum::Error> {
    let body = serde_json::to_string(snapshot).unwrap_or_default();
    socket.send(Message::Text(body)).await
}
