//! # Error Types
//!
//! Error handling shared by the codecs, the packet transport and the RCON/SLP clients.
//!
//! ## Error Categories
//! - **Lookup**: no server registered under a guild + name
//! - **Authentication**: RCON login rejected
//! - **Transport**: connection reset, unexpected end of stream, I/O, timeouts, cancellation
//! - **Protocol**: malformed or out-of-sequence packets, oversized frames, bad VarInts
//! - **Lifecycle**: operations on clients that never connected or were disposed
//!
//! Expected environmental failures are always returned as [`Error`] values. Only
//! programmer errors (driving a transport before it connected) panic.
//!
//! ## Example Usage
//! ```rust
//! use mc_remote::error::{Error, Result};
//!
//! fn check_reply(reply: &str) -> Result<()> {
//!     if reply.is_empty() {
//!         return Err(Error::ProtocolViolation("empty reply".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_reply("").is_err());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Transport messages
    pub const ERR_CONNECTION_RESET: &str = "The remote host reset the connection";
    pub const ERR_STREAM_ENDED: &str = "Stream ended before a full packet was received";
    pub const ERR_NOT_CONNECTED: &str = "Transport is not connected";

    /// RCON messages
    pub const ERR_INVALID_PASSWORD: &str = "Invalid RCON password";
    pub const ERR_UNAUTHENTICATED_REPLY: &str = "Server replied to a command before login completed";
    pub const ERR_UNEXPECTED_RESPONSE_ID: &str = "Unexpected response ID";
    pub const ERR_UNKNOWN_PACKET_TYPE: &str = "Unknown RCON packet type";
    pub const ERR_REMAINDER_TOO_SHORT: &str = "RCON remainder length shorter than the fixed fields";
    pub const ERR_PAYLOAD_TOO_LONG: &str = "RCON payload exceeds the server-bound limit";

    /// Server List Ping messages
    pub const ERR_UNEXPECTED_PACKET: &str = "Unexpected Server List Ping packet";
    pub const ERR_UNKNOWN_PACKET_ID: &str = "Unknown Server List Ping packet ID";
    pub const ERR_NEGATIVE_LENGTH: &str = "Negative length prefix";
    pub const ERR_TRAILING_DATA: &str = "Packet data did not match its declared length";
}

/// Error type for every fallible operation in the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{}", constants::ERR_INVALID_PASSWORD)]
    InvalidCredentials,

    #[error("{}", constants::ERR_CONNECTION_RESET)]
    ConnectionReset,

    #[error("{}", constants::ERR_STREAM_ENDED)]
    UnexpectedEof,

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("VarInt is too large")]
    VarIntTooLarge,

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Client is not connected")]
    NotConnected,

    #[error("Client has been disposed")]
    Disposed,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Whether this error leaves the underlying connection unusable.
    ///
    /// RCON clients notify their owning pool when a command fails with one of these.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::ConnectionReset
                | Error::UnexpectedEof
                | Error::Cancelled
                | Error::Timeout
                | Error::ProtocolViolation(_)
                | Error::VarIntTooLarge
                | Error::OversizedPacket(_)
        )
    }

    pub(crate) fn violation(message: &str) -> Self {
        Error::ProtocolViolation(message.to_string())
    }
}

/// Type alias for Results using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
