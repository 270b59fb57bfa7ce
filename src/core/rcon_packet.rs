//! # RCON Packet
//!
//! Wire format (all integers little-endian):
//! ```text
//! [Remainder(4)] [Id(4)] [Type(4)] [Payload(N)] [0x00] [0x00]
//! ```
//! `Remainder` counts every byte after itself, so it is always `N + 10`.
//!
//! Payloads are Latin-1. Some servers colour their replies with the section sign
//! (byte `0xA7`), which is not ASCII but round-trips through Latin-1 unchanged.

use bytes::BufMut;

use crate::error::{constants, Error, Result};

/// Size of the remainder length prefix
pub const LENGTH_PREFIX_LEN: usize = 4;

/// `sizeof(id) + sizeof(type) + NUL terminator + NUL pad`
pub const FIXED_REMAINDER_LEN: usize = 10;

/// Packet kinds understood by Minecraft's RCON server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RconPacketType {
    Response = 0,
    Command = 2,
    Login = 3,
}

impl TryFrom<i32> for RconPacketType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(RconPacketType::Response),
            2 => Ok(RconPacketType::Command),
            3 => Ok(RconPacketType::Login),
            other => Err(Error::ProtocolViolation(format!(
                "{}: {other}",
                constants::ERR_UNKNOWN_PACKET_TYPE
            ))),
        }
    }
}

/// A single RCON packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub kind: RconPacketType,
    pub payload: String,
}

impl RconPacket {
    pub fn new(id: i32, kind: RconPacketType, payload: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            payload: payload.into(),
        }
    }

    /// Number of payload bytes once encoded as Latin-1
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.chars().count()
    }

    /// Total encoded size, including the remainder prefix
    #[inline]
    pub fn encoded_len(&self) -> usize {
        LENGTH_PREFIX_LEN + FIXED_REMAINDER_LEN + self.payload_len()
    }

    /// Try to read one packet from the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold the whole packet; nothing is
    /// consumed in that case and the caller should retry once more bytes arrive.
    /// On success returns the packet and the number of bytes it occupied.
    pub fn try_read(buf: &[u8]) -> Result<Option<(RconPacket, usize)>> {
        if buf.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }
        let remainder = read_i32_le(&buf[..4]);
        if remainder < FIXED_REMAINDER_LEN as i32 {
            return Err(Error::ProtocolViolation(format!(
                "{}: {remainder}",
                constants::ERR_REMAINDER_TOO_SHORT
            )));
        }
        let total = LENGTH_PREFIX_LEN + remainder as usize;
        if buf.len() < total {
            return Ok(None);
        }

        let id = read_i32_le(&buf[4..8]);
        let kind = RconPacketType::try_from(read_i32_le(&buf[8..12]))?;
        // the two trailing NULs are not part of the payload
        let payload = decode_latin1(&buf[12..total - 2]);

        Ok(Some((RconPacket { id, kind, payload }, total)))
    }

    /// Append the encoded packet to `buf` and return the number of bytes written.
    pub fn write<B: BufMut>(&self, buf: &mut B) -> usize {
        let payload_len = self.payload_len();
        let remainder = payload_len + FIXED_REMAINDER_LEN;

        buf.put_i32_le(remainder as i32);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.kind as i32);
        for c in self.payload.chars() {
            buf.put_u8(encode_latin1(c));
        }
        buf.put_u8(0); // NUL terminator
        buf.put_u8(0); // NUL padding

        LENGTH_PREFIX_LEN + remainder
    }

    /// Encode into a freshly allocated buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write(&mut buf);
        buf
    }
}

#[inline]
fn read_i32_le(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Characters outside Latin-1 have no single byte form and are sent as `?`.
#[inline]
fn encode_latin1(c: char) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or(b'?')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_vector() -> (RconPacket, Vec<u8>) {
        (
            RconPacket::new(0x12, RconPacketType::Login, "abcd"),
            vec![
                0x0E, 0x00, 0x00, 0x00, // remainder length
                0x12, 0x00, 0x00, 0x00, // request ID
                0x03, 0x00, 0x00, 0x00, // type
                0x61, 0x62, 0x63, 0x64, 0x00, // payload + NUL
                0x00, // NUL padding
            ],
        )
    }

    fn section_sign_vector() -> (RconPacket, Vec<u8>) {
        (
            RconPacket::new(0x1ABC_DEF2, RconPacketType::Command, "abcd\u{A7}q"),
            vec![
                0x10, 0x00, 0x00, 0x00, // remainder length
                0xF2, 0xDE, 0xBC, 0x1A, // request ID
                0x02, 0x00, 0x00, 0x00, // type
                0x61, 0x62, 0x63, 0x64, 0xA7, 0x71, 0x00, // payload + NUL
                0x00, // NUL padding
            ],
        )
    }

    #[test]
    fn encodes_known_vectors() {
        for (packet, expected) in [login_vector(), section_sign_vector()] {
            assert_eq!(packet.encoded_len(), expected.len());
            assert_eq!(packet.to_bytes(), expected);
        }
    }

    #[test]
    fn decodes_known_vectors() {
        for (expected, bytes) in [login_vector(), section_sign_vector()] {
            let (packet, consumed) = RconPacket::try_read(&bytes).unwrap().unwrap();
            assert_eq!(consumed, bytes.len());
            assert_eq!(packet, expected);
        }
    }

    #[test]
    fn too_short_for_length() {
        assert_eq!(RconPacket::try_read(&[0u8; 2]).unwrap(), None);
    }

    #[test]
    fn too_short_for_declared_remainder() {
        let mut buf = vec![0u8; 8];
        buf[..4].copy_from_slice(&500i32.to_le_bytes());
        let snapshot = buf.clone();
        assert_eq!(RconPacket::try_read(&buf).unwrap(), None);
        assert_eq!(buf, snapshot);
    }

    #[test]
    fn remainder_below_fixed_fields_is_rejected() {
        let mut buf = vec![0u8; 14];
        buf[..4].copy_from_slice(&9i32.to_le_bytes());
        assert!(matches!(
            RconPacket::try_read(&buf),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut bytes = login_vector().1;
        bytes[8] = 0x07;
        assert!(matches!(
            RconPacket::try_read(&bytes),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn non_latin1_characters_become_question_marks() {
        let packet = RconPacket::new(1, RconPacketType::Command, "say \u{263A}");
        let bytes = packet.to_bytes();
        assert_eq!(&bytes[12..17], b"say ?");
        assert_eq!(bytes.len(), packet.encoded_len());
    }

    #[test]
    fn back_to_back_packets_are_read_one_at_a_time() {
        let mut bytes = login_vector().1;
        bytes.extend(section_sign_vector().1);

        let (first, consumed) = RconPacket::try_read(&bytes).unwrap().unwrap();
        assert_eq!(first.id, 0x12);
        let (second, rest) = RconPacket::try_read(&bytes[consumed..]).unwrap().unwrap();
        assert_eq!(second.id, 0x1ABC_DEF2);
        assert_eq!(consumed + rest, bytes.len());
    }
}
