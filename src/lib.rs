//! # Booking Hub
//!
//! Real-time event hub for a multi-tenant library seat booking platform.
//! Portal clients (students, library owners and staff, front desks, platform
//! admins) hold a WebSocket open; backend services push booking, library,
//! pricing, seat and notification events through [`triggers::EventTrigger`],
//! and the hub fans them out to the right rooms and users.
//!
//! ## Modules
//!
//! - [`hub`]: Connection registry, room membership and dispatch
//! - [`triggers`]: Typed event entry points for backend services
//! - [`websocket`]: Client protocol over `/ws`
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use booking_hub::hub::{ConnectionHub, Dispatcher, HubConfig};
//! use booking_hub::triggers::{BookingScope, EventTrigger};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let hub = Arc::new(ConnectionHub::new(HubConfig::default()));
//! let triggers = EventTrigger::new(Arc::new(Dispatcher::new(Arc::clone(&hub))));
//!
//! let scope = BookingScope::new("tenant-1", "library-9").with_student("user-42");
//! let report = triggers
//!     .booking_created(&scope, serde_json::json!({"id": "b-1", "seat": "A-12"}))
//!     .await;
//! println!("{} delivered to {} connections", report.event, report.delivered);
//! # }
//! ```

pub mod api;
pub mod config;
pub mod hub;
pub mod logging;
pub mod triggers;
pub mod websocket;

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use hub::{
    ConnectionHub, ConnectionId, Dispatcher, HubConfig, HubError, HubResult, HubStats, Identity,
    IdentityResolver, OutboundEvent, Role, RoomName,
};

pub use triggers::{
    BookingScope, EventTrigger, HubEvent, LibraryScope, Notification, SeatAvailability,
    TriggerReport,
};

pub use websocket::{websocket_handler, ClientMessage, ServerMessage};

pub use config::{Config, ConfigError, LoggingConfig};
