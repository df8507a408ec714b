//! Message protocol definitions
//!
//! Everything the server writes to a connection is a `ServerMessage`.
//! Its `Display` output is the exact text sent over the wire, terminator
//! included, so the same value renders identically on every transport.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::command;
use crate::error::ChatError;

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting sent once the transport is ready
    Welcome,
    /// Ask for a username (no line terminator)
    UsernamePrompt,
    /// Pointer to `/help`, sent after login
    HelpHint,
    /// Room created by this session
    Created { room: String },
    /// Room joined by this session
    Joined { room: String },
    /// Room left by this session
    Left { room: String },
    /// The session's active room changed
    ActiveRoomChanged { room: String },
    /// Reply to `/room`
    CurrentRoom { room: String },
    /// The topic of a room
    Topic { room: String, topic: Option<String> },
    /// Reply to `/rooms`
    RoomList { rooms: Vec<String>, active: String },
    /// Room ownership passed to this session
    OwnershipTransferred { room: String },
    /// Reply to `/help`
    Help,
    /// A rendered room broadcast line
    Broadcast { line: String },
    /// A user-input error
    Error(ChatError),
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Welcome => writeln!(f, "Welcome to the Telnet Chat Server!"),
            ServerMessage::UsernamePrompt => write!(f, "Please enter your username: "),
            ServerMessage::HelpHint => writeln!(f, "Type /help to see available commands"),
            ServerMessage::Created { room } => writeln!(f, "Created {}!", room),
            ServerMessage::Joined { room } => writeln!(f, "Joined {}!", room),
            ServerMessage::Left { room } => writeln!(f, "Left {}.", room),
            ServerMessage::ActiveRoomChanged { room } => {
                writeln!(f, "You are now chatting in {}.", room)
            }
            ServerMessage::CurrentRoom { room } => writeln!(f, "Your active room is {}.", room),
            ServerMessage::Topic { room, topic } => match topic {
                Some(topic) => writeln!(f, "Topic for {}: {}", room, topic),
                None => writeln!(f, "{} has no topic set.", room),
            },
            ServerMessage::RoomList { rooms, active } => {
                writeln!(f, "You are in the following rooms:")?;
                for room in rooms {
                    if room == active {
                        writeln!(f, "\t* {} (active)", room)?;
                    } else {
                        writeln!(f, "\t- {}", room)?;
                    }
                }
                Ok(())
            }
            ServerMessage::OwnershipTransferred { room } => {
                writeln!(f, "You are now the owner of {}.", room)
            }
            ServerMessage::Help => f.write_str(&command::help_text()),
            ServerMessage::Broadcast { line } => writeln!(f, "{}", line),
            ServerMessage::Error(err) => writeln!(f, "{}", err),
        }
    }
}

/// Convert ChatError to ServerMessage for client notification
impl From<ChatError> for ServerMessage {
    fn from(err: ChatError) -> Self {
        ServerMessage::Error(err)
    }
}

/// Render a broadcast line: `[<ISO-8601 timestamp>::<room>] <message>`
pub fn render_broadcast(at: DateTime<Utc>, room: &str, message: &str) -> String {
    format!(
        "[{}::{}] {}",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        room,
        message
    )
}

/// Body of an ordinary chat line
pub fn chat_body(username: &str, text: &str) -> String {
    format!("({}): {}", username, text)
}

/// Body of a join announcement
pub fn joined_body(username: &str, room: &str) -> String {
    format!("{} has joined {}!", username, room)
}

/// Body of a leave announcement
pub fn left_body(username: &str, room: &str) -> String {
    format!("{} has left {}.", username, room)
}

/// Body of a disconnect announcement
pub fn disconnected_body(username: &str) -> String {
    format!("{} disconnected from the server.", username)
}

/// Body of a topic change notice
pub fn topic_changed_body(username: &str, topic: &str) -> String {
    format!("{} changed the topic to: {}", username, topic)
}
