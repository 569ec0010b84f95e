//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Live connections
    pub connections: usize,
    /// Configured connection limit
    pub max_connections: usize,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}

/// Body for the role and global broadcast endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRequest {
    /// Event name delivered to clients
    pub event: String,
    /// Arbitrary payload
    #[serde(default)]
    pub data: Value,
}
