//! WebSocket line transport
//!
//! Each inbound text frame is one line; each outbound message is sent as
//! one text frame. Binary, ping and pong frames are ignored, a close frame
//! ends the stream.

use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::drive_connection;
use crate::server::ServerCommand;

/// Turn a stream of WebSocket frames into a stream of lines
pub fn frames_to_lines<S>(frames: S) -> impl Stream<Item = Result<String, AppError>> + Unpin
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    frames
        .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(_) => None,
                Err(e) => Some(Err(AppError::from(e))),
            })
        })
}

/// Wrap a frame sink so it accepts outbound text
pub fn text_sink<S>(frames: S) -> impl Sink<String, Error = AppError> + Unpin
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    frames.with(|text: String| future::ready(Ok::<_, AppError>(Message::Text(text.into()))))
}

/// Handle a WebSocket connection
///
/// Performs the WebSocket handshake, then hands the connection to the
/// shared driver.
pub async fn handle_websocket(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: &ServerConfig,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    debug!("New WebSocket connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (ws_sender, ws_receiver) = ws_stream.split();

    drive_connection(
        frames_to_lines(ws_receiver),
        text_sink(ws_sender),
        cmd_tx,
        config.client_buffer,
    )
    .await
}
