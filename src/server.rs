//! ChatServer Actor implementation
//!
//! The central actor that owns all chat state and the table of live
//! connections. Connection handlers only forward lines; every state change
//! happens here, one command at a time.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::command::{self, Command, Invocation};
use crate::config::ServerConfig;
use crate::error::ChatError;
use crate::message::ServerMessage;
use crate::session::Connection;
use crate::state::ChatState;
use crate::types::ConnectionId;

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection ready for the username prompt
    Connect {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
        /// Cancelled by the server to drop a client that stopped reading
        closer: CancellationToken,
    },
    /// One decoded input line
    Line {
        connection_id: ConnectionId,
        line: String,
    },
    /// Connection closed
    Disconnect { connection_id: ConnectionId },
    /// Flush every room log and stop; replies with the rooms that had data
    Shutdown { done: oneshot::Sender<Vec<String>> },
}

/// Where a connection is in its lifecycle
#[derive(Debug)]
enum Peer {
    /// Waiting for a free username
    Pending(Connection),
    /// Logged in under this username
    Bound(String),
}

/// The main ChatServer actor
pub struct ChatServer {
    state: ChatState,
    /// Live connections: ConnectionId -> Peer
    peers: HashMap<ConnectionId, Peer>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(config: &ServerConfig, receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            state: ChatState::new(config),
            peers: HashMap::new(),
            receiver,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Run the ChatServer event loop
    ///
    /// Processes commands until `Shutdown` arrives or all senders are
    /// dropped. Room logs are flushed on the way out in both cases.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            if let ServerCommand::Shutdown { done } = cmd {
                let flushed = self.shutdown().await;
                let _ = done.send(flushed);
                info!("ChatServer shutting down");
                return;
            }
            self.handle_command(cmd).await;
        }

        self.shutdown().await;
        info!("ChatServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                connection_id,
                sender,
                closer,
            } => {
                self.handle_connect(Connection::new(connection_id, sender, closer));
            }
            ServerCommand::Line {
                connection_id,
                line,
            } => {
                self.handle_line(connection_id, line);
            }
            ServerCommand::Disconnect { connection_id } => {
                self.handle_disconnect(connection_id);
            }
            ServerCommand::Shutdown { done } => {
                let _ = done.send(self.shutdown().await);
            }
        }
    }

    /// Greet a new connection and ask for a username
    fn handle_connect(&mut self, connection: Connection) {
        info!("Connection {} opened", connection.id);
        let _ = connection.send(ServerMessage::Welcome);
        let _ = connection.send(ServerMessage::UsernamePrompt);
        self.peers.insert(connection.id, Peer::Pending(connection));
        debug!(
            "Total connections: {}, Total rooms: {}",
            self.peers.len(),
            self.state.rooms().len()
        );
    }

    /// Route a line to the username prompt or the command dispatcher
    fn handle_line(&mut self, connection_id: ConnectionId, line: String) {
        match self.peers.get(&connection_id) {
            Some(Peer::Pending(connection)) => {
                let connection = connection.clone();
                self.handle_username(connection, line.trim());
            }
            Some(Peer::Bound(username)) => {
                let username = username.clone();
                if let Err(err) = self.dispatch(&username, &line) {
                    debug!("{} command failed: {}", username, err);
                    self.state.notify(&username, err.into());
                }
            }
            None => {
                debug!("Line from unknown connection {}", connection_id);
            }
        }
    }

    /// Try to claim a username; re-prompt on failure
    fn handle_username(&mut self, connection: Connection, username: &str) {
        match self.state.login(username, connection.clone()) {
            Ok(()) => {
                info!("Connection {} is now {}", connection.id, username);
                self.peers
                    .insert(connection.id, Peer::Bound(username.to_string()));
            }
            Err(err) => {
                debug!("Connection {} rejected username: {}", connection.id, err);
                let _ = connection.send(err.into());
                let _ = connection.send(ServerMessage::UsernamePrompt);
            }
        }
    }

    /// Handle a line from a logged-in session
    fn dispatch(&mut self, username: &str, line: &str) -> Result<(), ChatError> {
        let line = line.trim();
        match line.strip_prefix('/') {
            Some(rest) => {
                let invocation = command::parse(rest)?;
                self.run_command(username, invocation)
            }
            None => self.state.chat(username, line),
        }
    }

    /// Run a parsed command
    fn run_command(&mut self, username: &str, invocation: Invocation<'_>) -> Result<(), ChatError> {
        let name = invocation.name_argument();
        match invocation.command {
            Command::Create => self.state.create_room(username, name),
            Command::Help => {
                self.state.notify(username, ServerMessage::Help);
                Ok(())
            }
            Command::Join => self.state.join(username, name),
            Command::Part => self.state.part(username, name),
            Command::Room => {
                self.state.which_room(username);
                Ok(())
            }
            Command::Rooms => {
                self.state.list_rooms(username);
                Ok(())
            }
            Command::Switch => self.state.switch(username, name),
            Command::Topic if invocation.argument.is_empty() => self.state.read_topic(username),
            Command::Topic => {
                let Some(active) = self
                    .state
                    .sessions()
                    .get(username)
                    .map(|s| s.active_room().to_string())
                else {
                    return Ok(());
                };
                self.state
                    .change_topic(username, &active, invocation.argument)
            }
        }
    }

    /// Handle connection close
    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        info!("Connection {} closed", connection_id);

        if let Some(Peer::Bound(username)) = self.peers.remove(&connection_id) {
            self.state.logout(&username);
        }

        debug!(
            "Total connections: {}, Total rooms: {}",
            self.peers.len(),
            self.state.rooms().len()
        );
    }

    /// Drain every room log to disk
    ///
    /// Returns the names of rooms that had pending lines.
    async fn shutdown(&mut self) -> Vec<String> {
        let rooms = self.state.rooms_mut();
        rooms.settle_logs().await;

        let mut flushed = Vec::new();
        for (room, result) in rooms.flush_all_sync() {
            match result {
                Ok(true) => {
                    info!("Flushed {}", room);
                    flushed.push(room);
                }
                Ok(false) => {}
                Err(e) => error!("Could not flush {}: {}", room, e),
            }
        }
        flushed
    }
}
