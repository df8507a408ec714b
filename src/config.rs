//! Server configuration
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. `./telnet-chat.toml`
//! 3. `TELNET_CHAT_*` environment variables (e.g. `TELNET_CHAT_BIND_ADDR`)

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::is_valid_room_name;

/// Project-level configuration file name
pub const CONFIG_FILE: &str = "telnet-chat.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TELNET_CHAT_";

/// Wire transport used for client connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Raw TCP lines with Telnet option negotiation filtered out
    Telnet,
    /// One WebSocket text frame per line
    Websocket,
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,
    pub transport: TransportKind,
    /// Directory holding `<room>.log` files
    pub log_dir: PathBuf,
    /// Pending log lines allowed before a background flush starts
    pub log_flush_threshold: usize,
    /// Ownerless room every session starts in
    pub default_room: String,
    pub default_topic: String,
    /// Capacity of the command channel into the server actor
    pub channel_buffer: usize,
    /// Capacity of each connection's outbound channel; a client this far
    /// behind is disconnected
    pub client_buffer: usize,
    /// Longest accepted input line, in bytes
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:2323".to_string(),
            transport: TransportKind::Telnet,
            log_dir: PathBuf::from("."),
            log_flush_threshold: 2,
            default_room: "GeneralChat".to_string(),
            default_topic: "General Chat!".to_string(),
            channel_buffer: 256,
            client_buffer: 32,
            max_line_length: 4096,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the default sources
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load configuration using `path` as the config file (if it exists)
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let mut figment = Figment::new().merge(Serialized::defaults(ServerConfig::default()));

        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        let config: ServerConfig = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if !is_valid_room_name(&self.default_room) {
            return Err(AppError::InvalidConfig(format!(
                "default_room {:?} is not a valid room name",
                self.default_room
            )));
        }
        if self.channel_buffer == 0 || self.client_buffer == 0 {
            return Err(AppError::InvalidConfig(
                "channel buffers must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
