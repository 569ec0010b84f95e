//! Event Fan-Out Dispatcher
//!
//! Three fire-and-forget delivery primitives (room, user, everyone). Each
//! call serializes the event once and pushes the shared frame onto every
//! target's bounded outbound queue with `try_send`, so one stalled client
//! cannot hold up the rest of the fan-out. Targets whose queue is full or
//! closed are evicted once the loop completes.

use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

use super::connection::{ConnectionId, Transport};
use super::event::{AddressedEvent, EventTarget, OutboundEvent};
use super::room::RoomName;
use super::ConnectionHub;

pub struct Dispatcher {
    hub: Arc<ConnectionHub>,
}

impl Dispatcher {
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self { hub }
    }

    /// Deliver to every current member of a room
    pub async fn broadcast_to_room(&self, room: &RoomName, event: &OutboundEvent) -> usize {
        let targets = self.hub.room_transports(room).await;
        let delivered = self.deliver(targets, event).await;

        tracing::trace!(room = %room, event = %event.name, delivered, "Room broadcast");
        delivered
    }

    /// Deliver to every live connection of one user (multi-device)
    ///
    /// An offline user simply yields zero deliveries.
    pub async fn send_to_user(&self, user_id: &str, event: &OutboundEvent) -> usize {
        let targets = self.hub.user_transports(user_id).await;
        let delivered = self.deliver(targets, event).await;

        tracing::trace!(user_id = %user_id, event = %event.name, delivered, "User delivery");
        delivered
    }

    /// Deliver to every registered connection, authenticated or not
    pub async fn broadcast_all(&self, event: &OutboundEvent) -> usize {
        let targets = self.hub.all_transports().await;
        let delivered = self.deliver(targets, event).await;

        tracing::trace!(event = %event.name, delivered, "Global broadcast");
        delivered
    }

    pub async fn dispatch(&self, addressed: &AddressedEvent) -> usize {
        match &addressed.target {
            EventTarget::Room(room) => self.broadcast_to_room(room, &addressed.event).await,
            EventTarget::User(user_id) => self.send_to_user(user_id, &addressed.event).await,
            EventTarget::All => self.broadcast_all(&addressed.event).await,
        }
    }

    async fn deliver(&self, targets: Vec<(ConnectionId, Transport)>, event: &OutboundEvent) -> usize {
        if targets.is_empty() {
            return 0;
        }

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(event = %event.name, error = %e, "Failed to serialize event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, transport) in targets {
            match transport.try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection_id = %id,
                        event = %event.name,
                        "Outbound queue full, evicting slow connection"
                    );
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        connection_id = %id,
                        event = %event.name,
                        "Outbound queue closed, evicting connection"
                    );
                    failed.push(id);
                }
            }
        }

        for id in &failed {
            self.hub.remove(id).await;
        }

        delivered
    }
}
