//! Rooms and the room registry
//!
//! A room tracks its members by username, an optional owner and topic,
//! and a write-behind log. Rooms are never removed once created.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{ChatError, LogError};
use crate::log::RoomLog;
use crate::message::{self, ServerMessage};
use crate::session::SessionRegistry;
use crate::types::{is_valid_room_name, MessageKind};

/// A chat room
#[derive(Debug)]
pub struct Room {
    /// Room name (registry key)
    pub name: String,
    /// Creator, or whoever ownership passed to. The default room has none.
    owner: Option<String>,
    /// Topic shown on join and by `/topic`
    topic: Option<String>,
    /// Usernames of current members
    members: BTreeSet<String>,
    /// Pending and persisted broadcast lines
    log: RoomLog,
}

impl Room {
    /// Create a room; the owner, if any, is its first member
    pub fn new(name: String, owner: Option<String>, topic: Option<String>, log: RoomLog) -> Self {
        let members = owner.iter().cloned().collect();
        Self {
            name,
            owner,
            topic,
            members,
            log,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Check if a user is a member
    pub fn contains(&self, username: &str) -> bool {
        self.members.contains(username)
    }

    /// Member usernames, in name order
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    /// Add a member. Returns false if they were already present.
    pub fn add_member(&mut self, username: &str) -> bool {
        self.members.insert(username.to_string())
    }

    /// Remove a member
    ///
    /// If the owner leaves, ownership passes to the first remaining member
    /// (by name), whose username is returned. With nobody left the room
    /// becomes ownerless.
    pub fn remove_member(&mut self, username: &str) -> Option<String> {
        self.members.remove(username);
        if self.owner.as_deref() != Some(username) {
            return None;
        }
        self.owner = self.members.iter().next().cloned();
        self.owner.clone()
    }

    /// Replace the topic if `username` is allowed to
    ///
    /// Ownerless rooms never accept a topic change.
    pub fn set_topic(&mut self, username: &str, topic: &str) -> Result<(), ChatError> {
        match self.owner.as_deref() {
            Some(owner) if owner == username => {
                self.topic = Some(topic.to_string());
                Ok(())
            }
            Some(_) | None => Err(ChatError::NotOwner(self.name.clone())),
        }
    }

    /// Deliver a message to members and append it to the log
    ///
    /// The sender never receives their own message. System messages skip
    /// members whose active room is elsewhere; they are still logged.
    pub fn broadcast(
        &mut self,
        sessions: &SessionRegistry,
        sender: &str,
        body: &str,
        kind: MessageKind,
    ) {
        let line = message::render_broadcast(Utc::now(), &self.name, body);

        for username in &self.members {
            if username == sender {
                continue;
            }
            let Some(session) = sessions.get(username) else {
                continue;
            };
            if kind == MessageKind::System && session.active_room() != self.name {
                continue;
            }
            session.send(ServerMessage::Broadcast { line: line.clone() });
        }

        self.log.push(line.trim().to_string());
    }

    pub fn log(&self) -> &RoomLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut RoomLog {
        &mut self.log
    }
}

/// All rooms, keyed by name
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    default_room: String,
    log_dir: PathBuf,
    flush_threshold: usize,
}

impl RoomRegistry {
    /// Create a registry holding only the ownerless default room
    pub fn new(config: &ServerConfig) -> Self {
        let mut registry = Self {
            rooms: HashMap::new(),
            default_room: config.default_room.clone(),
            log_dir: config.log_dir.clone(),
            flush_threshold: config.log_flush_threshold,
        };

        let log = registry.new_log(&config.default_room);
        let room = Room::new(
            config.default_room.clone(),
            None,
            Some(config.default_topic.clone()),
            log,
        );
        registry.rooms.insert(room.name.clone(), room);
        registry
    }

    fn new_log(&self, name: &str) -> RoomLog {
        RoomLog::new(self.log_path(name), self.flush_threshold)
    }

    /// Log file location for a room: `<log_dir>/<name>.log`
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", name))
    }

    /// Create a room owned by `owner`, who becomes its only member
    pub fn create(&mut self, name: &str, owner: &str) -> Result<&mut Room, ChatError> {
        if !is_valid_room_name(name) {
            return Err(ChatError::InvalidRoomName(name.to_string()));
        }
        if self.rooms.contains_key(name) {
            return Err(ChatError::RoomExists(name.to_string()));
        }

        let log = self.new_log(name);
        let room = Room::new(name.to_string(), Some(owner.to_string()), None, log);
        info!("Room {} created by {}", name, owner);
        debug!("Total rooms: {}", self.rooms.len() + 1);
        Ok(self.rooms.entry(name.to_string()).or_insert(room))
    }

    pub fn lookup(&self, name: &str) -> Result<&Room, ChatError> {
        self.rooms
            .get(name)
            .ok_or_else(|| ChatError::RoomNotFound(name.to_string()))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Result<&mut Room, ChatError> {
        self.rooms
            .get_mut(name)
            .ok_or_else(|| ChatError::RoomNotFound(name.to_string()))
    }

    /// Name of the well-known room every session starts in
    pub fn default_room_name(&self) -> &str {
        &self.default_room
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Wait for in-flight background flushes in every room
    pub async fn settle_logs(&mut self) {
        for room in self.rooms.values_mut() {
            room.log_mut().settle().await;
        }
    }

    /// Synchronously flush every room's pending log lines
    ///
    /// Returns one entry per room: whether anything was written, or why
    /// the write failed.
    pub fn flush_all_sync(&self) -> Vec<(String, Result<bool, LogError>)> {
        let mut results: Vec<_> = self
            .rooms
            .values()
            .map(|room| (room.name.clone(), room.log().flush_sync()))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}
