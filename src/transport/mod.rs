//! # Transport Layer
//!
//! A single generic, length-delimited packet transport over TCP. RCON and Server
//! List Ping both run on it and differ only in the codec they plug in.
//!
//! ## Features
//! - Buffered reads: partial packets and back-to-back packets are handled by the codec
//! - Cancellation on every suspension point via `CancellationToken`
//! - Peer resets reported as a typed [`ConnectionReset`](crate::error::Error::ConnectionReset)
//! - Connect timeout from [`ClientConfig`](crate::config::ClientConfig)

pub mod tcp;

pub use tcp::PacketTransport;
