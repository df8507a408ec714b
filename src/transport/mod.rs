//! Wire transports
//!
//! Each transport turns an accepted TCP stream into a line stream and a
//! text sink for [`crate::handler::drive_connection`].

pub mod telnet;
pub mod websocket;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::{ServerConfig, TransportKind};
use crate::server::ServerCommand;

pub use telnet::{handle_telnet, TelnetCodec};
pub use websocket::handle_websocket;

/// Accept connections forever, spawning a handler task for each
pub async fn serve(
    listener: TcpListener,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<ServerConfig>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let config = Arc::clone(&config);

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    let result = match config.transport {
                        TransportKind::Telnet => handle_telnet(stream, cmd_tx, &config).await,
                        TransportKind::Websocket => {
                            handle_websocket(stream, cmd_tx, &config).await
                        }
                    };
                    if let Err(e) = result {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
