//! Hub error types

use thiserror::Error;

use super::connection::ConnectionId;

/// Errors that can occur in the connection hub
///
/// Delivery failures are never surfaced here: they are isolated to the
/// failing connection and resolved by evicting it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    /// A connection with this id is already registered
    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// The connection has been removed (usually a race with disconnect)
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// The configured connection limit has been reached
    #[error("Too many connections (limit: {0})")]
    ConnectionLimitReached(usize),

    /// Identity was already attached with different values
    #[error("Connection {0} is already authenticated as a different identity")]
    IdentityImmutable(ConnectionId),

    /// Identity failed validation
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Role string did not match a known role
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Room name failed validation
    #[error("Invalid room name: {0}")]
    InvalidRoom(String),

    /// Event name failed validation
    #[error("Invalid event name: {0}")]
    InvalidEventName(String),

    /// Operation requires an authenticated connection
    #[error("Connection must authenticate first")]
    NotAuthenticated,

    /// Join request rejected by the room policy
    #[error("Join denied: {0}")]
    JoinDenied(String),

    /// Outbound queue was full; the connection has been evicted
    #[error("Connection {0} is not reading its messages and was evicted")]
    SlowConsumer(ConnectionId),
}

/// Result type alias for hub operations
pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HubError::ConnectionLimitReached(2);
        assert_eq!(err.to_string(), "Too many connections (limit: 2)");

        let err = HubError::UnknownRole("janitor".to_string());
        assert_eq!(err.to_string(), "Unknown role: janitor");
    }
}
