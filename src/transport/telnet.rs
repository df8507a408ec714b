//! Telnet-style line transport
//!
//! Plain TCP carrying text lines. Telnet clients interleave option
//! negotiation (`IAC ...`) with data, so the decoder drops those
//! sequences along with carriage returns and NULs before splitting on
//! `\n`. The server never negotiates options itself.

use bytes::{Buf, BytesMut};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::drive_connection;
use crate::server::ServerCommand;

const IAC: u8 = 255;
const DONT: u8 = 254;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Position inside the Telnet byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    /// Saw IAC
    Command,
    /// Saw IAC WILL/WONT/DO/DONT, option byte follows
    Option,
    /// Inside IAC SB ... IAC SE
    Subnegotiation,
    /// Saw IAC inside a subnegotiation
    SubnegotiationCommand,
}

/// Line codec that filters Telnet control sequences
///
/// Decodes lines as lossy UTF-8; encodes outbound text verbatim.
#[derive(Debug)]
pub struct TelnetCodec {
    max_length: usize,
    state: State,
    line: Vec<u8>,
}

impl TelnetCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            state: State::Data,
            line: Vec::new(),
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        line
    }

    fn push_data(&mut self, byte: u8) -> Result<(), AppError> {
        if self.line.len() >= self.max_length {
            return Err(AppError::LineTooLong(self.max_length));
        }
        self.line.push(byte);
        Ok(())
    }
}

impl Decoder for TelnetCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, AppError> {
        while src.has_remaining() {
            let byte = src.get_u8();
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Command,
                (State::Data, b'\n') => return Ok(Some(self.take_line())),
                (State::Data, b'\r' | 0) => State::Data,
                (State::Data, _) => {
                    self.push_data(byte)?;
                    State::Data
                }
                // IAC IAC is an escaped 0xFF data byte
                (State::Command, IAC) => {
                    self.push_data(IAC)?;
                    State::Data
                }
                (State::Command, WILL..=DONT) => State::Option,
                (State::Command, SB) => State::Subnegotiation,
                (State::Command, _) => State::Data,
                (State::Option, _) => State::Data,
                (State::Subnegotiation, IAC) => State::SubnegotiationCommand,
                (State::Subnegotiation, _) => State::Subnegotiation,
                (State::SubnegotiationCommand, SE) => State::Data,
                (State::SubnegotiationCommand, _) => State::Subnegotiation,
            };
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, AppError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        // Unterminated final line
        if self.line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.take_line()))
        }
    }
}

impl Encoder<String> for TelnetCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), AppError> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

/// Handle a raw TCP connection
pub async fn handle_telnet(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: &ServerConfig,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    debug!("New telnet connection from {}", peer_addr);

    let (read_half, write_half) = stream.into_split();
    let lines = FramedRead::new(read_half, TelnetCodec::new(config.max_line_length));
    let sink = FramedWrite::new(write_half, TelnetCodec::new(config.max_line_length));

    drive_connection(lines, sink, cmd_tx, config.client_buffer).await
}
