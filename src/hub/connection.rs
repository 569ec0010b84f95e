//! Connection records and identifiers

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::identity::Identity;
use super::room::RoomName;

/// A serialized outbound frame, shared between every recipient of one event
pub type Frame = Arc<str>;

/// Send side of a connection's outbound queue
pub type Transport = mpsc::Sender<Frame>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A live connection, owned by the session registry
#[derive(Debug)]
pub(crate) struct Connection {
    pub transport: Transport,
    pub identity: Option<Identity>,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: Instant,
}

impl Connection {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            identity: None,
            connected_at: Utc::now(),
            last_heartbeat: Instant::now(),
        }
    }
}

/// Point-in-time view of a connection returned by lookups
#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub identity: Option<Identity>,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: Instant,
    pub rooms: Vec<RoomName>,
}

impl ConnectionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}
