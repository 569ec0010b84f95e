//! WebSocket Real-Time Streaming
//!
//! Portal clients connect to `/ws`, identify themselves and join the rooms
//! they care about:
//!
//! - `role:<role>` - every connection of a portal role
//! - `tenant:<tenantId>` - owner/staff dashboards of one tenant
//! - `library:<libraryId>` - seat maps and front desks of one library
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8090/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'authenticate', userId: 'u1', role: 'student'}));
//!   ws.send(JSON.stringify({type: 'join:library', libraryId: 'lib-42'}));
//!   setInterval(() => ws.send(JSON.stringify({type: 'heartbeat-ping'})), 20000);
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'event') console.log(msg.event, msg.data);
//! };
//! ```

mod handler;
mod messages;

pub use handler::websocket_handler;
pub use messages::{ClientMessage, ServerMessage};
