//! # Core Protocol Components
//!
//! Pure packet encoding and decoding for RCON and Server List Ping. Nothing in
//! this module performs I/O.
//!
//! ## Components
//! - **VarInt**: variable-length integers, strings and JSON used by SLP
//! - **RconPacket**: little-endian length-prefixed RCON packets
//! - **SLP packets**: handshake, status and ping packets plus the status JSON model
//! - **Codec**: Tokio codecs framing both protocols over byte streams
//!
//! ## Wire Formats
//! ```text
//! RCON: [Remainder: i32 LE] [Id: i32 LE] [Type: i32 LE] [Payload: Latin-1] [0x00] [0x00]
//! SLP:  [Length: VarInt] [PacketId: VarInt] [Data]
//! ```

pub mod codec;
pub mod rcon_packet;
pub mod slp_packet;
pub mod varint;
