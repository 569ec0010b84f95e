//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle:
//! register → read loop / write loop → remove.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;
use crate::hub::{ConnectionHub, ConnectionId, HubError, Identity, IdentityResolver};

/// A socket write that takes longer than this means the peer stopped reading
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let hub = Arc::clone(&state.hub);
    let resolver = Arc::clone(&state.identity_resolver);
    ws.on_upgrade(move |socket| handle_socket(socket, hub, resolver))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>, resolver: Arc<dyn IdentityResolver>) {
    let (mut sender, mut receiver) = socket.split();

    let connection_id = ConnectionId::new();
    let (tx, mut rx) = hub.open_channel();

    if let Err(e) = hub.register(connection_id.clone(), tx).await {
        tracing::error!(connection_id = %connection_id, error = %e, "Failed to register WebSocket connection");
        let error_msg = ServerMessage::Error {
            message: e.to_string(),
        };
        if let Ok(frame) = error_msg.to_frame() {
            let _ = sender.send(Message::Text(frame.to_string())).await;
        }
        let _ = sender.close().await;
        return;
    }

    reply(
        &hub,
        &connection_id,
        ServerMessage::Connected {
            connection_id: connection_id.to_string(),
        },
    )
    .await;

    let conn_id_for_send = connection_id.clone();

    // Drain the outbound queue into the socket. The queue closes when the
    // hub removes this connection, which also closes the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let write = sender.send(Message::Text(frame.to_string()));
            match tokio::time::timeout(WRITE_TIMEOUT, write).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_send,
                        "WebSocket send failed, closing connection"
                    );
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        connection_id = %conn_id_for_send,
                        "WebSocket write timed out, closing connection"
                    );
                    break;
                }
            }
        }
        let _ = tokio::time::timeout(WRITE_TIMEOUT, sender.close()).await;
    });

    let hub_for_recv = Arc::clone(&hub);
    let conn_id_for_recv = connection_id.clone();

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    hub_for_recv.touch_heartbeat(&conn_id_for_recv).await;
                    if !handle_ws_message(&hub_for_recv, resolver.as_ref(), &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.remove(&connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(
    hub: &ConnectionHub,
    resolver: &dyn IdentityResolver,
    connection_id: &ConnectionId,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    if let Some(response) = handle_client_message(hub, resolver, connection_id, client_msg).await {
                        reply(hub, connection_id, response).await;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Invalid client message"
                    );
                    let error_msg = ServerMessage::Error {
                        message: format!("Invalid message format: {}", e),
                    };
                    reply(hub, connection_id, error_msg).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let error_msg = ServerMessage::Error {
                message: "Binary messages not supported".to_string(),
            };
            reply(hub, connection_id, error_msg).await;
            true
        }
        // Axum answers pings itself; either way the heartbeat was refreshed
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Apply a parsed client message and return the reply, if any
pub(crate) async fn handle_client_message(
    hub: &ConnectionHub,
    resolver: &dyn IdentityResolver,
    connection_id: &ConnectionId,
    message: ClientMessage,
) -> Option<ServerMessage> {
    // Raced with disconnect or eviction
    let connection = hub.find(connection_id).await?;

    if let Some(request) = message.join_request() {
        let result = match request.authorize(connection.identity.as_ref()) {
            Ok(room) => hub.join(connection_id, &room).await.map(|_| room),
            Err(e) => Err(e),
        };

        return match result {
            Ok(room) => Some(ServerMessage::Joined {
                room: room.to_string(),
            }),
            Err(HubError::ConnectionNotFound(_)) => None,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Join rejected");
                Some(ServerMessage::Error {
                    message: e.to_string(),
                })
            }
        };
    }

    match message {
        ClientMessage::Authenticate {
            user_id,
            role,
            tenant_id,
        } => {
            let claimed = Identity::new(user_id, role, tenant_id);
            let result = match resolver.resolve(claimed).await {
                Ok(identity) => hub
                    .authenticate(connection_id, identity.clone())
                    .await
                    .map(|_| identity),
                Err(e) => Err(e),
            };

            match result {
                Ok(identity) => Some(ServerMessage::Authenticated { identity }),
                Err(HubError::ConnectionNotFound(_)) => None,
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Authentication rejected");
                    Some(ServerMessage::Error {
                        message: e.to_string(),
                    })
                }
            }
        }
        ClientMessage::HeartbeatPing => {
            hub.touch_heartbeat(connection_id).await;
            Some(ServerMessage::HeartbeatPong)
        }
        ClientMessage::JoinRole { .. }
        | ClientMessage::JoinLibrary { .. }
        | ClientMessage::JoinTenant { .. } => None,
    }
}

async fn reply(hub: &ConnectionHub, connection_id: &ConnectionId, message: ServerMessage) {
    match message.to_frame() {
        Ok(frame) => {
            if let Err(e) = hub.send_to(connection_id, frame).await {
                tracing::debug!(connection_id = %connection_id, error = %e, "Reply dropped");
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize message"),
    }
}
