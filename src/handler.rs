//! Per-connection handler
//!
//! Transport-independent half of a connection: forwards decoded lines to
//! the ChatServer and writes its replies back. Transports supply a stream
//! of lines and a sink of outbound text.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::message::ServerMessage;
use crate::server::ServerCommand;
use crate::types::ConnectionId;

/// Sends `Disconnect` for its connection when dropped
///
/// Held for the lifetime of a connection so that cleanup reaches the
/// server on every exit path.
pub struct DisconnectGuard {
    connection_id: ConnectionId,
    cmd_tx: mpsc::Sender<ServerCommand>,
}

impl DisconnectGuard {
    pub fn new(connection_id: ConnectionId, cmd_tx: mpsc::Sender<ServerCommand>) -> Self {
        Self {
            connection_id,
            cmd_tx,
        }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let cmd = ServerCommand::Disconnect {
            connection_id: self.connection_id,
        };
        match self.cmd_tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                // Queue is busy; finish the send off the drop path
                let cmd_tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    let _ = cmd_tx.send(cmd).await;
                });
            }
            Err(TrySendError::Closed(_)) => {
                debug!(
                    "Server closed before disconnect of {} was sent",
                    self.connection_id
                );
            }
        }
    }
}

/// Drive one connection until either direction ends
///
/// Registers with the ChatServer, then runs a read task (lines → server)
/// and a write task (server → sink). The server may also cut the
/// connection off when its outbound queue fills up.
pub async fn drive_connection<R, W>(
    lines: R,
    sink: W,
    cmd_tx: mpsc::Sender<ServerCommand>,
    client_buffer: usize,
) -> Result<(), AppError>
where
    R: Stream<Item = Result<String, AppError>> + Unpin + Send + 'static,
    W: Sink<String, Error = AppError> + Unpin + Send + 'static,
{
    let connection_id = ConnectionId::new();

    // Channel for server -> client messages
    let (msg_tx, msg_rx) = mpsc::channel::<ServerMessage>(client_buffer);
    let closer = CancellationToken::new();

    // Register with ChatServer
    if cmd_tx
        .send(ServerCommand::Connect {
            connection_id,
            sender: msg_tx,
            closer: closer.clone(),
        })
        .await
        .is_err()
    {
        warn!("Failed to register connection {} - server closed", connection_id);
        return Err(AppError::ChannelSend);
    }
    let _guard = DisconnectGuard::new(connection_id, cmd_tx.clone());
    info!("Connection {} registered", connection_id);

    let mut read_task = tokio::spawn(read_lines(connection_id, lines, cmd_tx));
    let mut write_task = tokio::spawn(write_messages(connection_id, msg_rx, sink));

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", connection_id);
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", connection_id);
            read_task.abort();
        }
        _ = closer.cancelled() => {
            info!("Connection {} dropped by server", connection_id);
            read_task.abort();
            write_task.abort();
        }
    }

    Ok(())
}

/// Forward every decoded line to the server
async fn read_lines<R>(connection_id: ConnectionId, mut lines: R, cmd_tx: mpsc::Sender<ServerCommand>)
where
    R: Stream<Item = Result<String, AppError>> + Unpin,
{
    while let Some(item) = lines.next().await {
        match item {
            Ok(line) => {
                let cmd = ServerCommand::Line {
                    connection_id,
                    line,
                };
                if cmd_tx.send(cmd).await.is_err() {
                    debug!("Server closed, ending read task for {}", connection_id);
                    break;
                }
            }
            Err(e) => {
                warn!("Read error for {}: {}", connection_id, e);
                break;
            }
        }
    }
    debug!("Read task ended for {}", connection_id);
}

/// Write server messages until the server drops this connection
async fn write_messages<W>(
    connection_id: ConnectionId,
    mut msg_rx: mpsc::Receiver<ServerMessage>,
    mut sink: W,
) where
    W: Sink<String, Error = AppError> + Unpin,
{
    while let Some(msg) = msg_rx.recv().await {
        if let Err(e) = sink.send(msg.to_string()).await {
            debug!("Send failed for {}, ending write task: {}", connection_id, e);
            break;
        }
    }
    let _ = sink.close().await;
    debug!("Write task ended for {}", connection_id);
}
