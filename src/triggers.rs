//! External Trigger Interface
//!
//! The only entry point booking, payment and notification services use to
//! push events to connected clients. Each method knows which rooms (and
//! users) its event fans out to and issues one dispatcher call per target.
//! Callers pass typed ids, never raw room names, so one tenant's events
//! cannot be pointed at another tenant's room by accident.
//!
//! # Example
//!
//! ```rust,ignore
//! let scope = BookingScope::new("tenant-1", "library-9").with_student("user-42");
//! let report = state.triggers.booking_created(&scope, serde_json::to_value(&booking)?).await;
//! tracing::debug!(delivered = report.delivered, "Booking broadcast");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::hub::{
    Dispatcher, HubError, HubResult, LibraryId, OutboundEvent, Role, RoomName, TenantId, UserId,
};

/// Seat availability change for one seat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAvailability {
    pub seat_id: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
}

/// User-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type", default = "default_notification_kind")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn default_notification_kind() -> String {
    "notification".to_string()
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: default_notification_kind(),
            title: title.into(),
            message: message.into(),
            data: None,
        }
    }
}

/// Every event the hub knows how to emit
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    BookingCreated(Value),
    BookingUpdated(Value),
    BookingCancelled(Value),
    BookingCheckedIn(Value),
    BookingCheckedOut(Value),
    LibraryCreated(Value),
    LibraryUpdated(Value),
    LibraryDeleted { library_id: LibraryId },
    PricingUpdated(Value),
    SeatAvailability(SeatAvailability),
    SeatsAvailabilityBatch {
        library_id: LibraryId,
        seats: Vec<SeatAvailability>,
    },
    Notification(Notification),
    Custom { name: String, data: Value },
}

impl HubEvent {
    /// Wire name of the event
    pub fn event_name(&self) -> &str {
        match self {
            HubEvent::BookingCreated(_) => "booking:created",
            HubEvent::BookingUpdated(_) => "booking:updated",
            HubEvent::BookingCancelled(_) => "booking:cancelled",
            HubEvent::BookingCheckedIn(_) => "booking:checkin",
            HubEvent::BookingCheckedOut(_) => "booking:checkout",
            HubEvent::LibraryCreated(_) => "library:created",
            HubEvent::LibraryUpdated(_) => "library:updated",
            HubEvent::LibraryDeleted { .. } => "library:deleted",
            HubEvent::PricingUpdated(_) => "pricing:updated",
            HubEvent::SeatAvailability(_) => "seat:availability",
            HubEvent::SeatsAvailabilityBatch { .. } => "seats:availability:batch",
            HubEvent::Notification(_) => "notification",
            HubEvent::Custom { name, .. } => name,
        }
    }

    /// JSON payload sent to clients
    pub fn payload(&self) -> Value {
        match self {
            HubEvent::BookingCreated(v)
            | HubEvent::BookingUpdated(v)
            | HubEvent::BookingCancelled(v)
            | HubEvent::BookingCheckedIn(v)
            | HubEvent::BookingCheckedOut(v)
            | HubEvent::LibraryCreated(v)
            | HubEvent::LibraryUpdated(v)
            | HubEvent::PricingUpdated(v) => v.clone(),
            HubEvent::LibraryDeleted { library_id } => {
                serde_json::json!({ "libraryId": library_id })
            }
            HubEvent::SeatAvailability(seat) => to_json(seat),
            HubEvent::SeatsAvailabilityBatch { library_id, seats } => {
                serde_json::json!({ "libraryId": library_id, "seats": to_json(seats) })
            }
            HubEvent::Notification(notification) => to_json(notification),
            HubEvent::Custom { data, .. } => data.clone(),
        }
    }

    pub fn to_outbound(&self) -> OutboundEvent {
        OutboundEvent::new(self.event_name(), self.payload())
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    // Plain structs of strings and bools always serialize
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Tenant and library a booking belongs to, plus the student who owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingScope {
    pub tenant_id: TenantId,
    pub library_id: LibraryId,
    pub student_id: Option<UserId>,
}

impl BookingScope {
    pub fn new(tenant_id: impl Into<String>, library_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            library_id: library_id.into(),
            student_id: None,
        }
    }

    pub fn with_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }
}

/// Tenant and library an event concerns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryScope {
    pub tenant_id: TenantId,
    pub library_id: LibraryId,
}

impl LibraryScope {
    pub fn new(tenant_id: impl Into<String>, library_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            library_id: library_id.into(),
        }
    }
}

/// What a trigger call delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    pub event: String,
    pub delivered: usize,
}

/// Typed domain-event API in front of the dispatcher
#[derive(Clone)]
pub struct EventTrigger {
    dispatcher: Arc<Dispatcher>,
}

impl EventTrigger {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    // ---- bookings ----

    pub async fn booking_created(&self, scope: &BookingScope, booking: Value) -> TriggerReport {
        self.booking(scope, HubEvent::BookingCreated(booking)).await
    }

    pub async fn booking_updated(&self, scope: &BookingScope, booking: Value) -> TriggerReport {
        self.booking(scope, HubEvent::BookingUpdated(booking)).await
    }

    pub async fn booking_cancelled(&self, scope: &BookingScope, booking: Value) -> TriggerReport {
        self.booking(scope, HubEvent::BookingCancelled(booking)).await
    }

    pub async fn booking_checked_in(&self, scope: &BookingScope, booking: Value) -> TriggerReport {
        self.booking(scope, HubEvent::BookingCheckedIn(booking)).await
    }

    pub async fn booking_checked_out(&self, scope: &BookingScope, booking: Value) -> TriggerReport {
        self.booking(scope, HubEvent::BookingCheckedOut(booking)).await
    }

    /// Library floor + tenant dashboards, then the student's own devices
    async fn booking(&self, scope: &BookingScope, event: HubEvent) -> TriggerReport {
        let rooms = [
            RoomName::library(&scope.library_id),
            RoomName::tenant(&scope.tenant_id),
        ];
        let outbound = event.to_outbound();
        let mut delivered = self.to_rooms(&rooms, &outbound).await;

        if let Some(student_id) = &scope.student_id {
            delivered += self.dispatcher.send_to_user(student_id, &outbound).await;
        }

        report(&outbound, delivered)
    }

    // ---- libraries ----

    pub async fn library_created(&self, scope: &LibraryScope, library: Value) -> TriggerReport {
        self.library(scope, HubEvent::LibraryCreated(library)).await
    }

    pub async fn library_updated(&self, scope: &LibraryScope, library: Value) -> TriggerReport {
        self.library(scope, HubEvent::LibraryUpdated(library)).await
    }

    pub async fn library_deleted(&self, scope: &LibraryScope) -> TriggerReport {
        let event = HubEvent::LibraryDeleted {
            library_id: scope.library_id.clone(),
        };
        self.library(scope, event).await
    }

    /// Library viewers, the owning tenant and platform operators
    async fn library(&self, scope: &LibraryScope, event: HubEvent) -> TriggerReport {
        let rooms = [
            RoomName::library(&scope.library_id),
            RoomName::tenant(&scope.tenant_id),
            RoomName::role(Role::SuperAdmin),
            RoomName::role(Role::PlatformSupport),
        ];
        let outbound = event.to_outbound();
        let delivered = self.to_rooms(&rooms, &outbound).await;
        report(&outbound, delivered)
    }

    // ---- pricing & seats ----

    pub async fn pricing_updated(&self, scope: &LibraryScope, pricing: Value) -> TriggerReport {
        let rooms = [
            RoomName::library(&scope.library_id),
            RoomName::tenant(&scope.tenant_id),
        ];
        let outbound = HubEvent::PricingUpdated(pricing).to_outbound();
        let delivered = self.to_rooms(&rooms, &outbound).await;
        report(&outbound, delivered)
    }

    pub async fn seat_availability_changed(
        &self,
        scope: &LibraryScope,
        seat: SeatAvailability,
    ) -> TriggerReport {
        let outbound = HubEvent::SeatAvailability(seat).to_outbound();
        let delivered = self
            .dispatcher
            .broadcast_to_room(&RoomName::library(&scope.library_id), &outbound)
            .await;
        report(&outbound, delivered)
    }

    /// One frame for many seats, so clients redraw the floor plan once
    pub async fn seats_availability_batch(
        &self,
        scope: &LibraryScope,
        seats: Vec<SeatAvailability>,
    ) -> TriggerReport {
        let event = HubEvent::SeatsAvailabilityBatch {
            library_id: scope.library_id.clone(),
            seats,
        };
        let outbound = event.to_outbound();
        let delivered = self
            .dispatcher
            .broadcast_to_room(&RoomName::library(&scope.library_id), &outbound)
            .await;
        report(&outbound, delivered)
    }

    // ---- generic ----

    pub async fn send_notification(&self, user_id: &str, notification: Notification) -> TriggerReport {
        let outbound = HubEvent::Notification(notification).to_outbound();
        let delivered = self.dispatcher.send_to_user(user_id, &outbound).await;
        report(&outbound, delivered)
    }

    pub async fn broadcast_to_role(
        &self,
        role: Role,
        event_name: &str,
        data: Value,
    ) -> HubResult<TriggerReport> {
        let outbound = custom(event_name, data)?.to_outbound();
        let delivered = self
            .dispatcher
            .broadcast_to_room(&RoomName::role(role), &outbound)
            .await;
        Ok(report(&outbound, delivered))
    }

    pub async fn broadcast(&self, event_name: &str, data: Value) -> HubResult<TriggerReport> {
        let outbound = custom(event_name, data)?.to_outbound();
        let delivered = self.dispatcher.broadcast_all(&outbound).await;
        Ok(report(&outbound, delivered))
    }

    async fn to_rooms(&self, rooms: &[RoomName], event: &OutboundEvent) -> usize {
        let mut delivered = 0;
        for room in rooms {
            delivered += self.dispatcher.broadcast_to_room(room, event).await;
        }
        delivered
    }
}

fn custom(event_name: &str, data: Value) -> HubResult<HubEvent> {
    let name = event_name.trim();
    if name.is_empty() {
        return Err(HubError::InvalidEventName("event name cannot be empty".to_string()));
    }
    if name.len() > 100 {
        return Err(HubError::InvalidEventName(
            "event name exceeds maximum length of 100 characters".to_string(),
        ));
    }
    Ok(HubEvent::Custom {
        name: name.to_string(),
        data,
    })
}

fn report(event: &OutboundEvent, delivered: usize) -> TriggerReport {
    tracing::debug!(event = %event.name, delivered, "Trigger dispatched");
    TriggerReport {
        event: event.name.clone(),
        delivered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{ConnectionHub, ConnectionId, Frame, Identity};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Harness {
        hub: Arc<ConnectionHub>,
        triggers: EventTrigger,
    }

    impl Harness {
        fn new() -> Self {
            let hub = Arc::new(ConnectionHub::default());
            let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&hub)));
            Self {
                hub,
                triggers: EventTrigger::new(dispatcher),
            }
        }

        async fn client(&self, identity: Identity, rooms: &[RoomName]) -> mpsc::Receiver<Frame> {
            let id = ConnectionId::new();
            let (tx, rx) = self.hub.open_channel();
            self.hub.register(id.clone(), tx).await.unwrap();
            self.hub.authenticate(&id, identity).await.unwrap();
            for room in rooms {
                self.hub.join(&id, room).await.unwrap();
            }
            rx
        }
    }

    fn events(rx: &mut mpsc::Receiver<Frame>) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let value: Value = serde_json::from_str(&frame).unwrap();
            names.push(value["event"].as_str().unwrap().to_string());
        }
        names
    }

    #[test]
    fn test_event_names() {
        assert_eq!(HubEvent::BookingCheckedIn(Value::Null).event_name(), "booking:checkin");
        assert_eq!(HubEvent::BookingCheckedOut(Value::Null).event_name(), "booking:checkout");
        assert_eq!(
            HubEvent::SeatsAvailabilityBatch {
                library_id: "l1".into(),
                seats: vec![]
            }
            .event_name(),
            "seats:availability:batch"
        );
    }

    #[test]
    fn test_notification_payload_shape() {
        let payload = HubEvent::Notification(Notification::new("x", "")).payload();
        assert_eq!(payload, json!({"type": "notification", "title": "x"}));
    }

    #[test]
    fn test_notification_deserialize_defaults() {
        let n: Notification = serde_json::from_str(r#"{"title": "Seat reserved"}"#).unwrap();
        assert_eq!(n.kind, "notification");
        assert!(n.message.is_empty());
    }

    #[tokio::test]
    async fn test_booking_created_fans_out_to_library_tenant_and_student() {
        let h = Harness::new();
        let mut owner = h
            .client(
                Identity::new("o1", Role::LibraryOwner, Some("t1".into())),
                &[RoomName::tenant("t1")],
            )
            .await;
        let mut desk = h
            .client(
                Identity::new("d1", Role::FrontDesk, Some("t1".into())),
                &[RoomName::library("l1")],
            )
            .await;
        let mut student = h.client(Identity::new("u1", Role::Student, None), &[]).await;
        let mut other_tenant = h
            .client(
                Identity::new("o2", Role::LibraryOwner, Some("t2".into())),
                &[RoomName::tenant("t2"), RoomName::role(Role::LibraryOwner)],
            )
            .await;

        let scope = BookingScope::new("t1", "l1").with_student("u1");
        let report = h.triggers.booking_created(&scope, json!({"id": "b1"})).await;

        assert_eq!(report.event, "booking:created");
        assert_eq!(report.delivered, 3);
        assert_eq!(events(&mut owner), vec!["booking:created"]);
        assert_eq!(events(&mut desk), vec!["booking:created"]);
        assert_eq!(events(&mut student), vec!["booking:created"]);
        assert!(events(&mut other_tenant).is_empty());
    }

    #[tokio::test]
    async fn test_booking_lifecycle_names() {
        let h = Harness::new();
        let mut desk = h
            .client(
                Identity::new("d1", Role::FrontDesk, Some("t1".into())),
                &[RoomName::library("l1")],
            )
            .await;
        let scope = BookingScope::new("t1", "l1");

        h.triggers.booking_updated(&scope, json!({})).await;
        h.triggers.booking_cancelled(&scope, json!({})).await;
        h.triggers.booking_checked_in(&scope, json!({})).await;
        h.triggers.booking_checked_out(&scope, json!({})).await;

        assert_eq!(
            events(&mut desk),
            vec!["booking:updated", "booking:cancelled", "booking:checkin", "booking:checkout"]
        );
    }

    #[tokio::test]
    async fn test_library_events_reach_platform_roles() {
        let h = Harness::new();
        let mut admin = h
            .client(
                Identity::new("a1", Role::SuperAdmin, None),
                &[RoomName::role(Role::SuperAdmin)],
            )
            .await;
        let mut support = h
            .client(
                Identity::new("p1", Role::PlatformSupport, None),
                &[RoomName::role(Role::PlatformSupport)],
            )
            .await;
        let mut student = h
            .client(
                Identity::new("u1", Role::Student, None),
                &[RoomName::role(Role::Student)],
            )
            .await;

        let scope = LibraryScope::new("t1", "l1");
        h.triggers.library_created(&scope, json!({"name": "Central"})).await;
        let report = h.triggers.library_deleted(&scope).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(events(&mut admin), vec!["library:created", "library:deleted"]);
        assert_eq!(events(&mut support), vec!["library:created", "library:deleted"]);
        assert!(events(&mut student).is_empty());
    }

    #[tokio::test]
    async fn test_seat_events_stay_in_library_room() {
        let h = Harness::new();
        let mut viewer = h
            .client(Identity::new("u1", Role::Student, None), &[RoomName::library("l1")])
            .await;
        let mut tenant_dash = h
            .client(
                Identity::new("o1", Role::LibraryOwner, Some("t1".into())),
                &[RoomName::tenant("t1")],
            )
            .await;

        let scope = LibraryScope::new("t1", "l1");
        let seat = SeatAvailability {
            seat_id: "A1".into(),
            available: false,
            booking_id: Some("b1".into()),
        };
        h.triggers.seat_availability_changed(&scope, seat.clone()).await;
        h.triggers
            .seats_availability_batch(&scope, vec![seat.clone(), seat])
            .await;
        h.triggers.pricing_updated(&scope, json!({"hourly": 40})).await;

        assert_eq!(
            events(&mut viewer),
            vec!["seat:availability", "seats:availability:batch", "pricing:updated"]
        );
        assert_eq!(events(&mut tenant_dash), vec!["pricing:updated"]);
    }

    #[tokio::test]
    async fn test_generic_triggers() {
        let h = Harness::new();
        let mut student = h
            .client(
                Identity::new("u1", Role::Student, None),
                &[RoomName::role(Role::Student)],
            )
            .await;
        let mut owner = h
            .client(
                Identity::new("o1", Role::LibraryOwner, Some("t1".into())),
                &[RoomName::role(Role::LibraryOwner)],
            )
            .await;

        let report = h
            .triggers
            .send_notification("u1", Notification::new("Payment received", "Thanks"))
            .await;
        assert_eq!(report.delivered, 1);

        let report = h
            .triggers
            .broadcast_to_role(Role::LibraryOwner, "payout:settled", json!({}))
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);

        let report = h.triggers.broadcast("maintenance", json!({})).await.unwrap();
        assert_eq!(report.delivered, 2);

        assert_eq!(events(&mut student), vec!["notification", "maintenance"]);
        assert_eq!(events(&mut owner), vec!["payout:settled", "maintenance"]);

        assert!(matches!(
            h.triggers.broadcast("  ", json!({})).await,
            Err(HubError::InvalidEventName(_))
        ));
    }
}
