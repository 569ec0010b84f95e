//! API Routes
//!
//! Route handlers organized by functionality.

pub mod health;
pub mod stats;
pub mod triggers;
