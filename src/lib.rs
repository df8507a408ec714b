//! Multi-room Telnet Chat Server Library
//!
//! A line-oriented chat server built on tokio using the Actor pattern for
//! state management.
//!
//! # Features
//! - Username claim with uniqueness check and re-prompt
//! - Any number of named rooms, each with an optional owner and topic
//! - Slash commands: `/create`, `/help`, `/join`, `/part`, `/room`,
//!   `/rooms`, `/switch`, `/topic`
//! - Per-room append-only logs with write-behind buffering
//! - Log flush on shutdown
//! - Telnet-style TCP or WebSocket transport
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor; it owns a `ChatState` holding the
//!   session and room registries
//! - Each connection has a handler task that forwards lines and writes replies
//! - No locks around chat state - all access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use telnet_chat::{transport, ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_buffer);
//!
//!     tokio::spawn(ChatServer::new(&config, cmd_rx).run());
//!     transport::serve(listener, cmd_tx, Arc::new(config)).await;
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod log;
pub mod message;
pub mod room;
pub mod server;
pub mod session;
pub mod state;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use command::Command;
pub use config::{ServerConfig, TransportKind};
pub use error::{AppError, ChatError, LogError, SendError};
pub use handler::drive_connection;
pub use message::ServerMessage;
pub use room::{Room, RoomRegistry};
pub use server::{ChatServer, ServerCommand};
pub use session::{Connection, Session, SessionRegistry};
pub use state::ChatState;
pub use types::{ConnectionId, MessageKind};
