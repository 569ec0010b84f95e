//! WebSocket Message Types
//!
//! Control messages exchanged between portal clients and the hub. Domain
//! events use the shared frame encoding in [`crate::hub::OutboundEvent`].

use serde::{Deserialize, Serialize};

use crate::hub::{Frame, Identity, JoinRequest, Role};

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Attach an identity to this connection
    #[serde(rename = "authenticate", rename_all = "camelCase")]
    Authenticate {
        user_id: String,
        role: Role,
        #[serde(default)]
        tenant_id: Option<String>,
    },
    /// Join the room for the caller's role
    #[serde(rename = "join:role")]
    JoinRole { role: Role },
    /// Join a library's room (seat map, front desk)
    #[serde(rename = "join:library", rename_all = "camelCase")]
    JoinLibrary { library_id: String },
    /// Join a tenant's room (owner dashboards)
    #[serde(rename = "join:tenant", rename_all = "camelCase")]
    JoinTenant { tenant_id: String },
    /// Keepalive
    #[serde(rename = "heartbeat-ping")]
    HeartbeatPing,
}

impl ClientMessage {
    /// The room a join message asks for, if it is one
    pub fn join_request(&self) -> Option<JoinRequest> {
        match self {
            ClientMessage::JoinRole { role } => Some(JoinRequest::Role(*role)),
            ClientMessage::JoinLibrary { library_id } => Some(JoinRequest::Library(library_id.clone())),
            ClientMessage::JoinTenant { tenant_id } => Some(JoinRequest::Tenant(tenant_id.clone())),
            _ => None,
        }
    }
}

/// Control messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Connection established
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { connection_id: String },
    /// Identity attached
    #[serde(rename = "authenticated")]
    Authenticated { identity: Identity },
    /// Room joined (also sent when already a member)
    #[serde(rename = "joined")]
    Joined { room: String },
    /// Reply to `heartbeat-ping`
    #[serde(rename = "heartbeat-pong")]
    HeartbeatPong,
    /// Request rejected; the connection stays open
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }
}
