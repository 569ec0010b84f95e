//! Connection Hub
//!
//! Shared state behind every real-time connection: the session registry,
//! the user index and room membership. All three live behind one
//! `RwLock` so a disconnect can never leave membership pointing at a
//! connection the registry has already forgotten.
//!
//! Dispatch only takes the read lock long enough to copy out the
//! `(ConnectionId, Transport)` pairs it needs; the actual sends happen after
//! the lock is released.

mod connection;
mod dispatch;
mod error;
mod event;
mod heartbeat;
mod identity;
mod registry;
mod room;
mod rooms;

pub use connection::{ConnectionId, ConnectionSnapshot, Frame, Transport};
pub use dispatch::Dispatcher;
pub use error::{HubError, HubResult};
pub use event::{AddressedEvent, EventTarget, OutboundEvent};
pub use identity::{Identity, IdentityResolver, LibraryId, Role, TenantId, TrustedClaims, UserId};
pub use registry::{AuthOutcome, SessionRegistry};
pub use room::{JoinRequest, RoomName};
pub use rooms::RoomMembership;

use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

/// Runtime configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Capacity of each connection's outbound queue
    pub outbound_queue_capacity: usize,
    /// Connections silent for longer than this are evicted
    pub heartbeat_timeout: Duration,
    /// How often the sweeper looks for silent connections
    pub sweep_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            outbound_queue_capacity: 256,
            heartbeat_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(15),
        }
    }
}

/// Read-only statistics for dashboards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub total_connections: usize,
    pub authenticated_users: usize,
    pub rooms: Vec<String>,
}

#[derive(Debug, Default)]
struct HubState {
    registry: SessionRegistry,
    rooms: RoomMembership,
}

/// Owns every live connection and its room memberships
#[derive(Debug)]
pub struct ConnectionHub {
    state: RwLock<HubState>,
    config: HubConfig,
}

impl ConnectionHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Create an outbound queue sized for this hub
    pub fn open_channel(&self) -> (Transport, mpsc::Receiver<Frame>) {
        mpsc::channel(self.config.outbound_queue_capacity.max(1))
    }

    /// Register a freshly accepted transport as an anonymous connection
    pub async fn register(&self, id: ConnectionId, transport: Transport) -> HubResult<()> {
        let mut state = self.state.write().await;
        if state.registry.len() >= self.config.max_connections {
            return Err(HubError::ConnectionLimitReached(self.config.max_connections));
        }
        state.registry.register(id.clone(), transport)?;
        drop(state);

        tracing::info!(connection_id = %id, "Connection registered");
        Ok(())
    }

    /// Attach a validated identity to a connection
    pub async fn authenticate(&self, id: &ConnectionId, identity: Identity) -> HubResult<AuthOutcome> {
        identity.validate()?;

        let user_id = identity.user_id.clone();
        let role = identity.role;
        let outcome = self.state.write().await.registry.authenticate(id, identity)?;

        if outcome == AuthOutcome::Attached {
            tracing::info!(connection_id = %id, user_id = %user_id, role = %role, "Connection authenticated");
        }
        Ok(outcome)
    }

    /// Remove a connection with all of its memberships. Idempotent.
    ///
    /// Dropping the registry's transport closes the connection's outbound
    /// queue, which ends its writer task and closes the socket.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        let mut state = self.state.write().await;
        let removed = state.registry.remove(id);
        let rooms = state.rooms.leave_all(id);
        drop(state);

        match removed {
            Some(_) => {
                tracing::info!(connection_id = %id, rooms = rooms.len(), "Connection removed");
                true
            }
            None => false,
        }
    }

    pub async fn find(&self, id: &ConnectionId) -> Option<ConnectionSnapshot> {
        let state = self.state.read().await;
        let connection = state.registry.get(id)?;

        let mut rooms: Vec<RoomName> = state.rooms.rooms_of(id).into_iter().collect();
        rooms.sort();

        Some(ConnectionSnapshot {
            id: id.clone(),
            identity: connection.identity.clone(),
            connected_at: connection.connected_at,
            last_heartbeat: connection.last_heartbeat,
            rooms,
        })
    }

    pub async fn touch_heartbeat(&self, id: &ConnectionId) {
        self.state
            .write()
            .await
            .registry
            .touch_heartbeat(id, Instant::now());
    }

    /// Join a room. Only registered connections can hold memberships.
    pub async fn join(&self, id: &ConnectionId, room: &RoomName) -> HubResult<bool> {
        let mut state = self.state.write().await;
        if !state.registry.contains(id) {
            return Err(HubError::ConnectionNotFound(id.clone()));
        }
        let added = state.rooms.join(id, room);
        drop(state);

        if added {
            tracing::debug!(connection_id = %id, room = %room, "Joined room");
        }
        Ok(added)
    }

    pub async fn leave(&self, id: &ConnectionId, room: &RoomName) -> bool {
        self.state.write().await.rooms.leave(id, room)
    }

    pub async fn members_of(&self, room: &RoomName) -> HashSet<ConnectionId> {
        self.state.read().await.rooms.members_of(room)
    }

    pub async fn rooms_of(&self, id: &ConnectionId) -> HashSet<RoomName> {
        self.state.read().await.rooms.rooms_of(id)
    }

    pub async fn user_connections(&self, user_id: &str) -> HashSet<ConnectionId> {
        self.state.read().await.registry.user_connections(user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.registry.len()
    }

    pub async fn stats(&self) -> HubStats {
        let state = self.state.read().await;
        HubStats {
            total_connections: state.registry.len(),
            authenticated_users: state.registry.user_count(),
            rooms: state
                .rooms
                .room_names()
                .into_iter()
                .map(|room| room.to_string())
                .collect(),
        }
    }

    /// Queue a control frame for one connection (replies to client requests).
    ///
    /// Never waits on the queue: a full queue evicts the connection the same
    /// way a failed broadcast does.
    pub async fn send_to(&self, id: &ConnectionId, frame: Frame) -> HubResult<()> {
        let transport = self
            .state
            .read()
            .await
            .registry
            .transport(id)
            .ok_or_else(|| HubError::ConnectionNotFound(id.clone()))?;

        match transport.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                drop(transport);
                tracing::warn!(connection_id = %id, "Outbound queue full on reply, evicting slow connection");
                self.remove(id).await;
                Err(HubError::SlowConsumer(id.clone()))
            }
            Err(TrySendError::Closed(_)) => {
                drop(transport);
                self.remove(id).await;
                Err(HubError::ConnectionNotFound(id.clone()))
            }
        }
    }

    /// Evict every connection that has been silent past the heartbeat timeout
    pub async fn evict_stale(&self) -> Vec<ConnectionId> {
        self.evict_idle_at(Instant::now()).await
    }

    pub(crate) async fn evict_idle_at(&self, now: Instant) -> Vec<ConnectionId> {
        let Some(cutoff) = now.checked_sub(self.config.heartbeat_timeout) else {
            return Vec::new();
        };

        let mut state = self.state.write().await;
        let idle = state.registry.idle_since(cutoff);
        for id in &idle {
            state.registry.remove(id);
            state.rooms.leave_all(id);
        }
        drop(state);

        for id in &idle {
            tracing::info!(connection_id = %id, "Evicted connection after missed heartbeats");
        }
        idle
    }

    pub(crate) async fn room_transports(&self, room: &RoomName) -> Vec<(ConnectionId, Transport)> {
        let state = self.state.read().await;
        state
            .rooms
            .members_of(room)
            .into_iter()
            .filter_map(|id| state.registry.transport(&id).map(|tx| (id, tx)))
            .collect()
    }

    pub(crate) async fn user_transports(&self, user_id: &str) -> Vec<(ConnectionId, Transport)> {
        self.state.read().await.registry.user_transports(user_id)
    }

    pub(crate) async fn all_transports(&self) -> Vec<(ConnectionId, Transport)> {
        self.state.read().await.registry.all_transports()
    }

    /// Membership is a subset of the registry and both indices agree
    #[cfg(test)]
    pub(crate) async fn is_consistent(&self) -> bool {
        let state = self.state.read().await;
        let members_registered = state.rooms.room_names().iter().all(|room| {
            state
                .rooms
                .members_of(room)
                .iter()
                .all(|id| state.registry.contains(id))
        });
        members_registered && state.rooms.is_consistent()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    async fn connect(hub: &ConnectionHub) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let id = ConnectionId::new();
        let (tx, rx) = hub.open_channel();
        hub.register(id.clone(), tx).await.unwrap();
        (id, rx)
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_connections, 10_000);
        assert_eq!(config.outbound_queue_capacity, 256);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_register_remove() {
        let hub = ConnectionHub::default();
        let (id, _rx) = connect(&hub).await;
        assert_eq!(hub.connection_count().await, 1);

        assert!(hub.remove(&id).await);
        assert!(!hub.remove(&id).await);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_register_keeps_original() {
        let hub = ConnectionHub::default();
        let (id, _rx) = connect(&hub).await;
        let (tx, _rx2) = hub.open_channel();

        let result = hub.register(id.clone(), tx).await;
        assert_eq!(result, Err(HubError::DuplicateConnection(id)));
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = ConnectionHub::new(HubConfig {
            max_connections: 2,
            ..Default::default()
        });
        connect(&hub).await;
        connect(&hub).await;

        let (tx, _rx) = hub.open_channel();
        let result = hub.register(ConnectionId::new(), tx).await;
        assert_eq!(result, Err(HubError::ConnectionLimitReached(2)));
    }

    #[tokio::test]
    async fn test_authenticate_after_remove_is_not_found() {
        let hub = ConnectionHub::default();
        let (id, _rx) = connect(&hub).await;
        hub.remove(&id).await;

        let result = hub
            .authenticate(&id, Identity::new("u1", Role::Student, None))
            .await;
        assert!(matches!(result, Err(HubError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_join_requires_registration() {
        let hub = ConnectionHub::default();
        let ghost = ConnectionId::new();
        let result = hub.join(&ghost, &RoomName::tenant("t1")).await;
        assert!(matches!(result, Err(HubError::ConnectionNotFound(_))));
        assert!(hub.members_of(&RoomName::tenant("t1")).await.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_without_leave_cleans_rooms() {
        let hub = ConnectionHub::default();
        let (c, _rx) = connect(&hub).await;
        hub.authenticate(&c, Identity::new("u3", Role::Student, None))
            .await
            .unwrap();
        let rooms = [RoomName::tenant("t1"), RoomName::library("l1"), RoomName::role(Role::Student)];
        for room in &rooms {
            hub.join(&c, room).await.unwrap();
        }

        hub.remove(&c).await;

        for room in &rooms {
            assert!(!hub.members_of(room).await.contains(&c));
        }
        assert!(hub.rooms_of(&c).await.is_empty());
        assert!(hub.user_connections("u3").await.is_empty());
        assert!(hub.stats().await.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_find_reports_identity_and_rooms() {
        let hub = ConnectionHub::default();
        let (id, _rx) = connect(&hub).await;

        let snapshot = hub.find(&id).await.unwrap();
        assert!(!snapshot.is_authenticated());

        hub.authenticate(&id, Identity::new("o1", Role::LibraryOwner, Some("t1".into())))
            .await
            .unwrap();
        hub.join(&id, &RoomName::tenant("t1")).await.unwrap();

        let snapshot = hub.find(&id).await.unwrap();
        assert_eq!(snapshot.identity.unwrap().user_id, "o1");
        assert_eq!(snapshot.rooms, vec![RoomName::tenant("t1")]);
        assert!(hub.find(&ConnectionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let hub = ConnectionHub::default();
        let (a, _ra) = connect(&hub).await;
        let (b, _rb) = connect(&hub).await;
        let (_anon, _rc) = connect(&hub).await;

        hub.authenticate(&a, Identity::new("u1", Role::Student, None)).await.unwrap();
        hub.authenticate(&b, Identity::new("u1", Role::Student, None)).await.unwrap();
        hub.join(&a, &RoomName::tenant("t1")).await.unwrap();
        hub.join(&b, &RoomName::library("l1")).await.unwrap();

        let stats = hub.stats().await;
        assert_eq!(stats.total_connections, 3);
        assert_eq!(stats.authenticated_users, 1);
        assert_eq!(stats.rooms, vec!["library:l1".to_string(), "tenant:t1".to_string()]);
    }

    #[tokio::test]
    async fn test_evict_idle_connections() {
        let hub = ConnectionHub::default();
        let (quiet, mut quiet_rx) = connect(&hub).await;
        let (chatty, _rx) = connect(&hub).await;
        hub.join(&quiet, &RoomName::library("l1")).await.unwrap();

        // Nothing is idle yet
        assert!(hub.evict_stale().await.is_empty());

        let later = Instant::now() + Duration::from_secs(61);
        hub.state
            .write()
            .await
            .registry
            .touch_heartbeat(&chatty, later);

        let evicted = hub.evict_idle_at(later).await;
        assert_eq!(evicted, vec![quiet.clone()]);
        assert_eq!(hub.connection_count().await, 1);
        assert!(hub.members_of(&RoomName::library("l1")).await.is_empty());

        // The evicted connection's queue is closed
        assert!(quiet_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_queues_control_frame() {
        let hub = ConnectionHub::default();
        let (id, mut rx) = connect(&hub).await;

        hub.send_to(&id, Frame::from("{\"type\":\"heartbeat-pong\"}")).await.unwrap();
        assert_eq!(&*rx.recv().await.unwrap(), "{\"type\":\"heartbeat-pong\"}");

        let missing = hub.send_to(&ConnectionId::new(), Frame::from("x")).await;
        assert!(matches!(missing, Err(HubError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_send_to_full_queue_evicts_without_waiting() {
        let hub = ConnectionHub::new(HubConfig {
            outbound_queue_capacity: 1,
            ..HubConfig::default()
        });
        let (id, mut rx) = connect(&hub).await;
        hub.join(&id, &RoomName::library("l1")).await.unwrap();

        hub.send_to(&id, Frame::from("first")).await.unwrap();
        let second = hub.send_to(&id, Frame::from("second")).await;

        assert_eq!(second, Err(HubError::SlowConsumer(id.clone())));
        assert!(hub.find(&id).await.is_none());
        assert!(hub.members_of(&RoomName::library("l1")).await.is_empty());

        // The queued frame drains, then the queue reports closed
        assert_eq!(&*rx.recv().await.unwrap(), "first");
        assert!(rx.recv().await.is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Join(usize, usize),
        Leave(usize, usize),
        Remove(usize),
        Reconnect(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..5usize, 0..3usize).prop_map(|(c, r)| Op::Join(c, r)),
            (0..5usize, 0..3usize).prop_map(|(c, r)| Op::Leave(c, r)),
            (0..5usize).prop_map(Op::Remove),
            (0..5usize).prop_map(Op::Reconnect),
        ]
    }

    proptest! {
        #[test]
        fn prop_membership_never_outlives_registration(ops in proptest::collection::vec(op(), 0..48)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let hub = ConnectionHub::default();
                let mut ids = Vec::new();
                let mut receivers = Vec::new();
                for _ in 0..5 {
                    let (id, rx) = connect(&hub).await;
                    ids.push(id);
                    receivers.push(rx);
                }
                let names: Vec<RoomName> = (0..3).map(|i| RoomName::tenant(&i.to_string())).collect();

                for op in ops {
                    match op {
                        Op::Join(c, r) => { let _ = hub.join(&ids[c], &names[r]).await; }
                        Op::Leave(c, r) => { hub.leave(&ids[c], &names[r]).await; }
                        Op::Remove(c) => { hub.remove(&ids[c]).await; }
                        Op::Reconnect(c) => {
                            let (id, rx) = connect(&hub).await;
                            ids[c] = id;
                            receivers[c] = rx;
                        }
                    }
                    assert!(hub.is_consistent().await);
                }

                for id in &ids {
                    let reverse = hub.rooms_of(id).await;
                    let mut forward = HashSet::new();
                    for room in &names {
                        if hub.members_of(room).await.contains(id) {
                            forward.insert(room.clone());
                        }
                    }
                    assert_eq!(reverse, forward);
                }
            });
        }
    }
}
