//! OSC transport to a running sclang.
//!
//! sclang listens for OSC on UDP (57120 by default). Code is sent to
//! `/interpret` and server control snippets to `/cmd`, each as a single
//! string argument.

mod codec;

use std::io;
use std::net::UdpSocket;

use thiserror::Error;

pub use codec::{OscArg, OscMessage};

/// Largest UDP payload deliverable over IPv4.
pub const MAX_DATAGRAM: usize = 65_507;

pub const BOOT_SERVER: &str = "Server.default.boot;";
pub const QUIT_SERVER: &str = "Server.default.quit;";
pub const FREE_ALL: &str = "Server.default.freeAll;";

/// OSC transport errors.
#[derive(Debug, Error)]
pub enum OscError {
    #[error("OSC client is not connected")]
    NotConnected,

    #[error("OSC address must start with '/': {0:?}")]
    InvalidAddress(String),

    #[error("code contains a NUL byte and cannot be sent as an OSC string")]
    InteriorNul,

    #[error("OSC packet is {0} bytes, larger than a UDP datagram allows")]
    PayloadTooLarge(usize),

    #[error("malformed OSC packet: {0}")]
    Malformed(String),

    #[error("OSC socket error: {0}")]
    Io(#[from] io::Error),
}

/// UDP client for sclang's OSC port.
#[derive(Debug)]
pub struct OscClient {
    host: String,
    port: u16,
    socket: Option<UdpSocket>,
}

impl OscClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            socket: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Bind an ephemeral local port and point it at sclang.
    ///
    /// UDP has no handshake, so this succeeds whenever the host resolves;
    /// a missing sclang only shows up as lost messages.
    ///
    /// # Errors
    /// Returns an error if the socket cannot be bound or the host cannot
    /// be resolved.
    pub fn connect(&mut self) -> Result<(), OscError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect((self.host.as_str(), self.port))?;
        tracing::info!(host = %self.host, port = self.port, "OSC client connected");
        self.socket = Some(socket);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!(host = %self.host, port = self.port, "OSC client disconnected");
        }
    }

    /// Change the target. Disconnects if connected and the target changed.
    ///
    /// Returns `true` when a reconnect is needed to apply the change.
    pub fn update_connection(&mut self, host: &str, port: u16) -> bool {
        let changed = self.host != host || self.port != port;
        self.host = host.to_string();
        self.port = port;
        if changed && self.is_connected() {
            self.disconnect();
            return true;
        }
        false
    }

    /// Send a message.
    ///
    /// # Errors
    /// Fails when disconnected, when the message cannot be encoded, or
    /// when the packet does not fit in one datagram.
    pub fn send(&self, message: &OscMessage) -> Result<(), OscError> {
        let socket = self.socket.as_ref().ok_or(OscError::NotConnected)?;
        let packet = message.encode()?;
        if packet.len() > MAX_DATAGRAM {
            return Err(OscError::PayloadTooLarge(packet.len()));
        }
        socket.send(&packet)?;
        tracing::debug!(address = %message.address, bytes = packet.len(), "OSC sent");
        Ok(())
    }

    /// Evaluate code in sclang.
    ///
    /// # Errors
    /// See [`OscClient::send`].
    pub fn send_eval(&self, code: &str) -> Result<(), OscError> {
        self.send(&OscMessage::new(
            "/interpret",
            vec![OscArg::Str(code.to_string())],
        ))
    }

    /// # Errors
    /// See [`OscClient::send`].
    pub fn boot_server(&self) -> Result<(), OscError> {
        self.send_cmd(BOOT_SERVER)
    }

    /// # Errors
    /// See [`OscClient::send`].
    pub fn quit_server(&self) -> Result<(), OscError> {
        self.send_cmd(QUIT_SERVER)
    }

    /// # Errors
    /// See [`OscClient::send`].
    pub fn stop_all_sounds(&self) -> Result<(), OscError> {
        self.send_cmd(FREE_ALL)
    }

    fn send_cmd(&self, snippet: &str) -> Result<(), OscError> {
        self.send(&OscMessage::new("/cmd", vec![OscArg::Str(snippet.to_string())]))
    }
}
