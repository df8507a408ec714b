//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers and small value types:
//! - `ConnectionId`: UUID-based identifier for a transport connection
//! - `MessageKind`: whether a broadcast is membership churn or chat

use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Assigned when a transport connection is accepted, before any username
/// is known. Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a room broadcast
///
/// System messages (joins, leaves, disconnects) only reach members whose
/// active room is the broadcasting room. Chat messages reach every member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    System,
    Chat,
}

/// Check whether a room name is usable
///
/// Room names double as log file names, so only ASCII letters, digits,
/// `-` and `_` are accepted.
pub fn is_valid_room_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
