//! Room Membership Manager
//!
//! Keeps `room → connections` and `connection → rooms` as exact inverses.
//! Empty rooms are dropped as soon as their last member leaves.

use std::collections::{HashMap, HashSet};

use super::connection::ConnectionId;
use super::room::RoomName;

#[derive(Debug, Default)]
pub struct RoomMembership {
    /// room → members
    members: HashMap<RoomName, HashSet<ConnectionId>>,
    /// connection → rooms, for O(rooms) cleanup on disconnect
    by_connection: HashMap<ConnectionId, HashSet<RoomName>>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the connection was not already a member
    pub fn join(&mut self, id: &ConnectionId, room: &RoomName) -> bool {
        let added = self
            .members
            .entry(room.clone())
            .or_default()
            .insert(id.clone());
        self.by_connection
            .entry(id.clone())
            .or_default()
            .insert(room.clone());
        added
    }

    /// Returns true if the connection was a member
    pub fn leave(&mut self, id: &ConnectionId, room: &RoomName) -> bool {
        let removed = match self.by_connection.get_mut(id) {
            Some(rooms) => {
                let removed = rooms.remove(room);
                if rooms.is_empty() {
                    self.by_connection.remove(id);
                }
                removed
            }
            None => false,
        };

        if removed {
            self.detach(id, room);
        }
        removed
    }

    /// Drop every membership of a connection; returns the rooms it left
    pub fn leave_all(&mut self, id: &ConnectionId) -> Vec<RoomName> {
        let rooms: Vec<RoomName> = self
            .by_connection
            .remove(id)
            .map(|rooms| rooms.into_iter().collect())
            .unwrap_or_default();

        for room in &rooms {
            self.detach(id, room);
        }
        rooms
    }

    /// Snapshot of a room's members
    pub fn members_of(&self, room: &RoomName) -> HashSet<ConnectionId> {
        self.members.get(room).cloned().unwrap_or_default()
    }

    /// Snapshot of a connection's rooms
    pub fn rooms_of(&self, id: &ConnectionId) -> HashSet<RoomName> {
        self.by_connection.get(id).cloned().unwrap_or_default()
    }

    /// Names of all non-empty rooms, sorted
    pub fn room_names(&self) -> Vec<RoomName> {
        let mut names: Vec<RoomName> = self.members.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn room_count(&self) -> usize {
        self.members.len()
    }

    fn detach(&mut self, id: &ConnectionId, room: &RoomName) {
        if let Some(members) = self.members.get_mut(room) {
            members.remove(id);
            if members.is_empty() {
                self.members.remove(room);
            }
        }
    }

    /// Both indices agree with each other
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let forward = self
            .members
            .iter()
            .all(|(room, ids)| {
                !ids.is_empty()
                    && ids
                        .iter()
                        .all(|id| self.by_connection.get(id).is_some_and(|r| r.contains(room)))
            });
        let reverse = self.by_connection.iter().all(|(id, rooms)| {
            !rooms.is_empty()
                && rooms
                    .iter()
                    .all(|room| self.members.get(room).is_some_and(|m| m.contains(id)))
        });
        forward && reverse
    }
}
