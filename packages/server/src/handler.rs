//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{domain::ConnectionId, event::ClientEvent, state::AppState};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Spawns a task that drains the rx channel and pushes each frame to the
/// WebSocket sender. Messages addressed to this client by other handlers
/// arrive through this channel.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // The connection id is assigned here, at accept time, and only ever
    // leaks to clients through roster snapshots and relayed events.
    let connection_id = ConnectionId::generate();
    let (tx, rx) = mpsc::unbounded_channel();

    {
        let mut session = state.session.lock().await;
        session.register(connection_id.clone(), tx);
    }
    tracing::info!("User connected: {}", connection_id);

    let (sender, mut receiver) = socket.split();

    let recv_id = connection_id.clone();
    let recv_state = state.clone();

    // Receive events from this client and dispatch them one at a time.
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => match ClientEvent::decode(&text) {
                    Ok(event) => {
                        let mut session = recv_state.session.lock().await;
                        if let Err(e) = session.dispatch(&recv_id, event) {
                            // Drop-and-log policy: no error response, the
                            // connection stays open.
                            tracing::error!("{}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("{}", e);
                    }
                },
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Client '{}' requested close", recv_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Push messages from other clients to this client.
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Same teardown for clean close and abrupt loss: drop the channel and
    // task cache, prune the username index, keep the roster entry.
    let mut session = state.session.lock().await;
    match session.connection_closed(&connection_id) {
        Some(username) => tracing::info!(
            "User {} disconnected, {} client(s) still connected",
            username,
            session.connected_count()
        ),
        None => tracing::info!("Connection {} closed before joining", connection_id),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
