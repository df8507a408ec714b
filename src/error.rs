//! Error types for the chat server
//!
//! Defines fatal application errors, user-facing chat errors, log
//! persistence errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
///
/// These terminate a connection (or startup) rather than being shown to a user.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Client sent a line longer than the configured limit
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// User-input errors
///
/// Recovered locally by rendering the message to the offending session only.
/// The `Display` output is the exact text sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Username is held by another session
    #[error("Sorry, but {0} is already in use!")]
    NameTaken(String),

    /// Username was blank
    #[error("Usernames can't be empty!")]
    EmptyName,

    /// A room with that name already exists
    #[error("A room named {0} already exists!")]
    RoomExists(String),

    /// Name is not usable as a room name
    #[error("Room names may only contain letters, numbers, '-' and '_'.")]
    InvalidRoomName(String),

    /// No room by that name
    #[error("Sorry, no room by that name was found.")]
    RoomNotFound(String),

    /// Session is already a member of the room
    #[error("You're already in that room!")]
    AlreadyMember(String),

    /// Session is not a member of the room
    #[error("You're not in that room!")]
    NotMember(String),

    /// Parting would leave the session in no room at all
    #[error("You can't leave {0} while it is your only room.")]
    CannotLeaveLastRoom(String),

    /// Topic changes must be issued from the target room
    #[error("You can only change the topic of your active room!")]
    WrongRoom(String),

    /// Only the room owner may change the topic
    #[error("You don't have permission to do that!")]
    NotOwner(String),

    /// Unknown slash command
    #[error("Unknown command {0}")]
    Unrecognized(String),
}

/// Room log persistence errors
///
/// Operational: reported through tracing, never shown to users.
#[derive(Debug, Error)]
pub enum LogError {
    /// Appending a batch to the room's log file failed
    #[error("failed to write room log {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Message send errors
///
/// Occurs when a message cannot be queued for a connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
    /// The client is not draining its queue
    #[error("Channel full")]
    Full,
}
