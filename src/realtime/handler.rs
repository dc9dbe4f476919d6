//! WebSocket connection handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::Serialize;

use super::events::{ClientMessage, ServerMessage};
use super::registry::{ConnectionGuard, Delivery};
use super::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one frame. Returns false if the client is gone.
async fn send_frame<T: Serialize>(socket: &mut WebSocket, frame: &T) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            tracing::error!("failed to serialize frame: {}", e);
            true
        }
    }
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Dropping the guard on any exit path removes every subscription
    let (connection, mut rx) = state.registry().connect(state.config.outbound_capacity);
    let id = connection.id();
    tracing::info!(connection = %id, "client connected");

    let welcome = ServerMessage::Connected { connection_id: id };
    if !send_frame(&mut socket, &welcome).await {
        return; // Client disconnected immediately
    }

    loop {
        tokio::select! {
            // Deliveries for subscribed topics
            delivery = rx.recv() => {
                match delivery {
                    Some(delivery) => {
                        if !forward_delivery(&mut socket, &connection, delivery).await {
                            break;
                        }
                    }
                    None => break, // Connection removed from the registry
                }
            }

            // Handle client messages
            result = socket.recv() => {
                match result {
                    Some(Ok(msg)) => {
                        if !handle_client_message(msg, &mut socket, &connection).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection = %id, "socket error: {}", e);
                        break;
                    }
                    None => break, // Client disconnected
                }
            }
        }
    }

    tracing::info!(connection = %id, "client disconnected");
}

async fn forward_delivery(
    socket: &mut WebSocket,
    connection: &ConnectionGuard,
    delivery: Delivery,
) -> bool {
    // Events were dropped for this connection; the client must refetch
    if connection.take_lagged() && !send_frame(socket, &ServerMessage::lagged()).await {
        return false;
    }

    send_frame(socket, &ServerMessage::Event(delivery.to_delivered())).await
}

/// Handle a message from the client
/// Returns false if the connection should be closed
async fn handle_client_message(
    msg: Message,
    socket: &mut WebSocket,
    connection: &ConnectionGuard,
) -> bool {
    match msg {
        Message::Text(text) => {
            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => ServerMessage::Pong,
                Ok(ClientMessage::Subscribe { topic }) => match connection.subscribe(topic.clone()) {
                    Ok(_) => ServerMessage::Subscribed { topic },
                    Err(e) => ServerMessage::error(e.code(), e.to_string()),
                },
                Ok(ClientMessage::Unsubscribe { topic }) => {
                    connection.unsubscribe(&topic);
                    ServerMessage::Unsubscribed { topic }
                }
                Err(e) => ServerMessage::error("bad_request", e.to_string()),
            };
            send_frame(socket, &reply).await
        }
        Message::Binary(_) => true, // Ignore binary messages
        Message::Ping(data) => socket.send(Message::Pong(data)).await.is_ok(),
        Message::Pong(_) => true,
        Message::Close(_) => false, // Client requested close
    }
}
