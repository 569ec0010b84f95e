//! Connection Session Registry
//!
//! Tracks every live connection and the reverse index from user id to that
//! user's connections. Not synchronized on its own: [`ConnectionHub`] holds
//! it behind the same lock as the room membership maps so both stay
//! consistent.
//!
//! [`ConnectionHub`]: super::ConnectionHub

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::connection::{Connection, ConnectionId, Transport};
use super::error::{HubError, HubResult};
use super::identity::{Identity, UserId};

/// Result of attaching an identity to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Identity attached for the first time
    Attached,
    /// Same identity was already attached
    Unchanged,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Primary storage: connection_id → connection
    connections: HashMap<ConnectionId, Connection>,
    /// Secondary index: user_id → connection ids (multi-device)
    user_index: HashMap<UserId, HashSet<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an anonymous connection entry
    pub fn register(&mut self, id: ConnectionId, transport: Transport) -> HubResult<()> {
        if self.connections.contains_key(&id) {
            return Err(HubError::DuplicateConnection(id));
        }
        self.connections.insert(id, Connection::new(transport));
        Ok(())
    }

    /// Attach an identity. Identities are immutable once set.
    pub fn authenticate(&mut self, id: &ConnectionId, identity: Identity) -> HubResult<AuthOutcome> {
        let connection = self
            .connections
            .get_mut(id)
            .ok_or_else(|| HubError::ConnectionNotFound(id.clone()))?;

        match &connection.identity {
            Some(existing) if *existing == identity => return Ok(AuthOutcome::Unchanged),
            Some(_) => return Err(HubError::IdentityImmutable(id.clone())),
            None => {}
        }

        self.user_index
            .entry(identity.user_id.clone())
            .or_default()
            .insert(id.clone());
        connection.identity = Some(identity);

        Ok(AuthOutcome::Attached)
    }

    /// Remove a connection and its user index entry. Idempotent.
    pub(crate) fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(id)?;

        if let Some(identity) = &connection.identity {
            if let Some(ids) = self.user_index.get_mut(&identity.user_id) {
                ids.remove(id);
                if ids.is_empty() {
                    self.user_index.remove(&identity.user_id);
                }
            }
        }

        Some(connection)
    }

    pub(crate) fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Record a heartbeat. Returns false if the connection is gone.
    pub fn touch_heartbeat(&mut self, id: &ConnectionId, at: Instant) -> bool {
        match self.connections.get_mut(id) {
            Some(connection) => {
                connection.last_heartbeat = at;
                true
            }
            None => false,
        }
    }

    pub fn transport(&self, id: &ConnectionId) -> Option<Transport> {
        self.connections.get(id).map(|c| c.transport.clone())
    }

    /// Transports for every connection of one user
    pub fn user_transports(&self, user_id: &str) -> Vec<(ConnectionId, Transport)> {
        self.user_index
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.transport(id).map(|tx| (id.clone(), tx)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Transports for every registered connection
    pub fn all_transports(&self) -> Vec<(ConnectionId, Transport)> {
        self.connections
            .iter()
            .map(|(id, c)| (id.clone(), c.transport.clone()))
            .collect()
    }

    pub fn user_connections(&self, user_id: &str) -> HashSet<ConnectionId> {
        self.user_index.get(user_id).cloned().unwrap_or_default()
    }

    /// Connections whose last heartbeat is older than `cutoff`
    pub fn idle_since(&self, cutoff: Instant) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, c)| c.last_heartbeat < cutoff)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of distinct authenticated users
    pub fn user_count(&self) -> usize {
        self.user_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::identity::Role;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn transport() -> Transport {
        mpsc::channel(8).0
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut registry = SessionRegistry::new();
        let id = ConnectionId::new();

        registry.register(id.clone(), transport()).unwrap();
        let result = registry.register(id.clone(), transport());

        assert_eq!(result, Err(HubError::DuplicateConnection(id)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_authenticate_indexes_user() {
        let mut registry = SessionRegistry::new();
        let phone = ConnectionId::new();
        let browser = ConnectionId::new();
        registry.register(phone.clone(), transport()).unwrap();
        registry.register(browser.clone(), transport()).unwrap();

        let identity = Identity::new("u1", Role::Student, None);
        assert_eq!(
            registry.authenticate(&phone, identity.clone()),
            Ok(AuthOutcome::Attached)
        );
        assert_eq!(
            registry.authenticate(&browser, identity),
            Ok(AuthOutcome::Attached)
        );

        assert_eq!(registry.user_count(), 1);
        assert_eq!(registry.user_transports("u1").len(), 2);
        assert!(registry.user_transports("u2").is_empty());
    }

    #[test]
    fn test_identity_is_immutable() {
        let mut registry = SessionRegistry::new();
        let id = ConnectionId::new();
        registry.register(id.clone(), transport()).unwrap();

        let identity = Identity::new("u1", Role::Student, None);
        registry.authenticate(&id, identity.clone()).unwrap();

        assert_eq!(
            registry.authenticate(&id, identity),
            Ok(AuthOutcome::Unchanged)
        );
        assert_eq!(
            registry.authenticate(&id, Identity::new("u2", Role::Student, None)),
            Err(HubError::IdentityImmutable(id.clone()))
        );
        assert_eq!(registry.user_connections("u2").len(), 0);
    }

    #[test]
    fn test_authenticate_after_remove_is_not_found() {
        let mut registry = SessionRegistry::new();
        let id = ConnectionId::new();
        registry.register(id.clone(), transport()).unwrap();
        registry.remove(&id);

        let result = registry.authenticate(&id, Identity::new("u1", Role::Student, None));
        assert_eq!(result, Err(HubError::ConnectionNotFound(id)));
    }

    #[test]
    fn test_remove_is_idempotent_and_cleans_user_index() {
        let mut registry = SessionRegistry::new();
        let id = ConnectionId::new();
        registry.register(id.clone(), transport()).unwrap();
        registry
            .authenticate(&id, Identity::new("u1", Role::Student, None))
            .unwrap();

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn test_idle_since() {
        let mut registry = SessionRegistry::new();
        let fresh = ConnectionId::new();
        let stale = ConnectionId::new();
        registry.register(fresh.clone(), transport()).unwrap();
        registry.register(stale.clone(), transport()).unwrap();

        let later = Instant::now() + Duration::from_secs(120);
        registry.touch_heartbeat(&fresh, later);

        let idle = registry.idle_since(later - Duration::from_secs(60));
        assert_eq!(idle, vec![stale]);
        assert!(!registry.touch_heartbeat(&ConnectionId::new(), later));
    }
}
