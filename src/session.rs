//! Sessions and the session registry
//!
//! A `Session` exists once a connection has claimed a unique username.
//! The registry is keyed by username and enforces that uniqueness.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ChatError, SendError};
use crate::message::ServerMessage;
use crate::types::ConnectionId;

/// Handle to a transport connection
///
/// Cloning shares the same outbound channel. Sending never waits: a peer
/// whose queue is full is cut off through `closer`, and its handler then
/// disconnects it like any other closed connection.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Server → Client message channel
    sender: mpsc::Sender<ServerMessage>,
    /// Cancelled to make the handler drop the connection
    closer: CancellationToken,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
        closer: CancellationToken,
    ) -> Self {
        Self { id, sender, closer }
    }

    /// Queue a message for this connection without waiting
    ///
    /// A full queue means the client stopped reading; the connection is
    /// closed and the message dropped.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                if !self.closer.is_cancelled() {
                    warn!("Connection {} is not reading, dropping it", self.id);
                    self.closer.cancel();
                }
                Err(SendError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::ChannelClosed),
        }
    }
}

/// A logged-in chat participant
#[derive(Debug)]
pub struct Session {
    username: String,
    connection: Connection,
    active_room: String,
    joined_rooms: BTreeSet<String>,
}

impl Session {
    /// Create a session that starts out in `home_room` only
    pub fn new(username: String, connection: Connection, home_room: String) -> Self {
        let mut joined_rooms = BTreeSet::new();
        joined_rooms.insert(home_room.clone());
        Self {
            username,
            connection,
            active_room: home_room,
            joined_rooms,
        }
    }

    /// The room that receives unprefixed chat lines
    pub fn active_room(&self) -> &str {
        &self.active_room
    }

    /// Rooms this session belongs to, in name order
    pub fn joined_rooms(&self) -> &BTreeSet<String> {
        &self.joined_rooms
    }

    pub fn is_in(&self, room: &str) -> bool {
        self.joined_rooms.contains(room)
    }

    /// Add a room and make it active
    pub fn enter(&mut self, room: &str) {
        self.joined_rooms.insert(room.to_string());
        self.active_room = room.to_string();
    }

    /// Make an already-joined room active. Returns false if not a member.
    pub fn activate(&mut self, room: &str) -> bool {
        if !self.is_in(room) {
            return false;
        }
        self.active_room = room.to_string();
        true
    }

    /// Remove a room from the joined set
    ///
    /// If it was the active room, another joined room becomes active and is
    /// returned. When no room remains, `None` is returned and the caller
    /// must `enter` a new room before the session is used again.
    pub fn leave(&mut self, room: &str) -> Option<String> {
        self.joined_rooms.remove(room);
        if self.active_room != room {
            return None;
        }
        let next = self.joined_rooms.iter().next().cloned()?;
        self.active_room = next.clone();
        Some(next)
    }

    /// Send a message to this session's connection
    ///
    /// A closed or full channel means the client is going away; the
    /// disconnect path cleans up, so the error is dropped here.
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.connection.send(msg);
    }
}

/// All logged-in sessions, keyed by username
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a username (case-sensitive)
    pub fn register(
        &mut self,
        username: &str,
        connection: Connection,
        home_room: &str,
    ) -> Result<&mut Session, ChatError> {
        if username.is_empty() {
            return Err(ChatError::EmptyName);
        }
        if self.sessions.contains_key(username) {
            return Err(ChatError::NameTaken(username.to_string()));
        }

        let session = Session::new(username.to_string(), connection, home_room.to_string());
        Ok(self.sessions.entry(username.to_string()).or_insert(session))
    }

    /// Release a username. Removing an unknown name is a no-op.
    pub fn unregister(&mut self, username: &str) -> Option<Session> {
        self.sessions.remove(username)
    }

    pub fn get(&self, username: &str) -> Option<&Session> {
        self.sessions.get(username)
    }

    pub fn get_mut(&mut self, username: &str) -> Option<&mut Session> {
        self.sessions.get_mut(username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.sessions.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
