//! Error types for the WebSocket server engine.
//!
//! Every failure the engine can report lives here. Only [`Error::Bind`] and
//! [`Error::RegistryConflict`] are fatal to the server; everything else is
//! isolated to a single connection attempt or connection.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving WebSocket connections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The listening socket could not be created.
    #[error("Failed to bind listener: {0}")]
    Bind(String),

    /// Malformed or non-conforming Upgrade request.
    #[error("Bad handshake: {0}")]
    BadHandshake(String),

    /// The Upgrade request did not arrive within the read budget.
    #[error("Timed out reading handshake request")]
    HandshakeReadTimeout,

    /// The 101 response could not be written.
    #[error("Failed to write handshake response: {0}")]
    HandshakeWriteError(String),

    /// Bounded read exhausted its retry budget.
    #[error("Read timed out waiting for {wanted} bytes")]
    ReadTimeout {
        /// Number of bytes the read was still waiting for.
        wanted: usize,
    },

    /// A frame could not be read completely within the retry budget.
    #[error("Timed out reading frame")]
    FrameReadTimeout,

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A second connection was registered under an address already in use.
    #[error("Connection already registered for {0}")]
    RegistryConflict(SocketAddr),

    /// Writing to the peer failed.
    #[error("Write failed: {0}")]
    WriteError(String),

    /// The peer closed its end of the stream.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// No connection is registered for the address.
    #[error("No connection registered for {0}")]
    UnknownPeer(SocketAddr),

    /// Declared frame length exceeds the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared frame size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Accumulated message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Upgrade request head exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A header value would break the response framing.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid frame structure.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Returns `true` for errors that must stop the server.
    ///
    /// Startup bind failures and registry-consistency violations are fatal;
    /// every other error only affects one connection.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Error::Bind(_) | Error::RegistryConflict(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
