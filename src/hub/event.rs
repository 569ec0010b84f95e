//! Outbound events and their wire encoding

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::connection::Frame;
use super::identity::UserId;
use super::room::RoomName;

/// A named event with an opaque JSON payload
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub name: String,
    pub data: Value,
    pub emitted_at: DateTime<Utc>,
}

impl OutboundEvent {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            emitted_at: Utc::now(),
        }
    }

    /// Serialize once into a frame shared by every recipient
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        let wire = WireFrame::Event {
            event: &self.name,
            data: &self.data,
            emitted_at: &self.emitted_at,
        };
        serde_json::to_string(&wire).map(Frame::from)
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFrame<'a> {
    Event {
        event: &'a str,
        data: &'a Value,
        #[serde(rename = "emittedAt")]
        emitted_at: &'a DateTime<Utc>,
    },
}

/// Where an event should be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTarget {
    Room(RoomName),
    User(UserId),
    All,
}

/// An event together with its target
#[derive(Debug, Clone, PartialEq)]
pub struct AddressedEvent {
    pub target: EventTarget,
    pub event: OutboundEvent,
}

impl AddressedEvent {
    pub fn new(target: EventTarget, event: OutboundEvent) -> Self {
        Self { target, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_shape() {
        let event = OutboundEvent::new("booking:created", json!({"id": "b1"}));
        let frame = event.to_frame().unwrap();
        let parsed: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(parsed["type"], "event");
        assert_eq!(parsed["event"], "booking:created");
        assert_eq!(parsed["data"]["id"], "b1");
        assert!(parsed["emittedAt"].is_string());
    }
}
