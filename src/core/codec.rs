//! Tokio codecs framing RCON and Server List Ping packets over a byte stream.
//!
//! Each codec only adapts the pure readers/writers in [`rcon_packet`](super::rcon_packet)
//! and [`slp_packet`](super::slp_packet) to `tokio_util`'s `Decoder`/`Encoder`, so a
//! `Framed` stream handles partial reads and back-to-back packets in one read.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{RCON_MAX_CLIENTBOUND_PAYLOAD, RCON_MAX_SERVERBOUND_PAYLOAD, SLP_MAX_FRAME};
use crate::core::rcon_packet::{RconPacket, FIXED_REMAINDER_LEN, LENGTH_PREFIX_LEN};
use crate::core::slp_packet::{self, Clientbound, Outbound, RawFrame};
use crate::error::{constants, Error, Result};

/// Length-prefixed RCON framing
#[derive(Debug, Clone, Copy)]
pub struct RconCodec {
    max_inbound_payload: usize,
    max_outbound_payload: usize,
}

impl RconCodec {
    pub fn new(max_inbound_payload: usize, max_outbound_payload: usize) -> Self {
        Self {
            max_inbound_payload,
            max_outbound_payload,
        }
    }

    /// Limits for the server side of a connection (used by test doubles and tools)
    pub fn server() -> Self {
        Self::new(RCON_MAX_SERVERBOUND_PAYLOAD, RCON_MAX_CLIENTBOUND_PAYLOAD)
    }
}

impl Default for RconCodec {
    fn default() -> Self {
        Self::new(RCON_MAX_CLIENTBOUND_PAYLOAD, RCON_MAX_SERVERBOUND_PAYLOAD)
    }
}

impl Decoder for RconCodec {
    type Item = RconPacket;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let remainder = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if remainder > 0 && remainder as usize > self.max_inbound_payload + FIXED_REMAINDER_LEN {
            return Err(Error::OversizedPacket(remainder as usize));
        }

        match RconPacket::try_read(src)? {
            Some((packet, consumed)) => {
                src.advance(consumed);
                Ok(Some(packet))
            }
            None => {
                src.reserve(LENGTH_PREFIX_LEN + remainder as usize - src.len());
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() => Ok(None),
            None => Err(Error::UnexpectedEof),
        }
    }
}

impl Encoder<RconPacket> for RconCodec {
    type Error = Error;

    fn encode(&mut self, packet: RconPacket, dst: &mut BytesMut) -> Result<()> {
        if packet.payload_len() > self.max_outbound_payload {
            return Err(Error::ProtocolViolation(format!(
                "{}: {} > {}",
                constants::ERR_PAYLOAD_TOO_LONG,
                packet.payload_len(),
                self.max_outbound_payload
            )));
        }
        dst.reserve(packet.encoded_len());
        packet.write(dst);
        Ok(())
    }
}

/// Client side Server List Ping framing
#[derive(Debug, Clone, Copy)]
pub struct SlpCodec {
    max_frame: usize,
}

impl SlpCodec {
    pub fn new(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Default for SlpCodec {
    fn default() -> Self {
        Self::new(SLP_MAX_FRAME)
    }
}

impl Decoder for SlpCodec {
    type Item = Clientbound;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match slp_packet::read_frame(src, self.max_frame)? {
            Some((packet, consumed)) => {
                src.advance(consumed);
                Ok(Some(packet))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() => Ok(None),
            None => Err(Error::UnexpectedEof),
        }
    }
}

impl<P: Outbound> Encoder<P> for SlpCodec {
    type Error = Error;

    fn encode(&mut self, packet: P, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(slp_packet::frame_len(&packet));
        slp_packet::write_frame(dst, &packet);
        Ok(())
    }
}

/// Server List Ping framing that leaves packet data undecoded.
///
/// Handy on the server side of a connection, where inbound packets depend on
/// connection state the codec does not track.
#[derive(Debug, Clone, Copy)]
pub struct RawFrameCodec {
    max_frame: usize,
}

impl RawFrameCodec {
    pub fn new(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Default for RawFrameCodec {
    fn default() -> Self {
        Self::new(SLP_MAX_FRAME)
    }
}

impl Decoder for RawFrameCodec {
    type Item = RawFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match slp_packet::read_raw_frame(src, self.max_frame)? {
            Some((frame, consumed)) => {
                src.advance(consumed);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() => Ok(None),
            None => Err(Error::UnexpectedEof),
        }
    }
}

impl<P: Outbound> Encoder<P> for RawFrameCodec {
    type Error = Error;

    fn encode(&mut self, packet: P, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(slp_packet::frame_len(&packet));
        slp_packet::write_frame(dst, &packet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rcon_packet::RconPacketType;
    use crate::core::slp_packet::Ping;

    #[test]
    fn rcon_partial_decode_preserves_buffer() {
        let bytes = RconPacket::new(5, RconPacketType::Response, "hello").to_bytes();
        let mut codec = RconCodec::default();

        let mut buffer = BytesMut::from(&bytes[..7]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert_eq!(buffer.len(), 7);

        buffer.extend_from_slice(&bytes[7..]);
        let packet = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(packet.payload, "hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn rcon_back_to_back_packets() {
        let mut codec = RconCodec::default();
        let mut buffer = BytesMut::new();
        codec
            .encode(RconPacket::new(1, RconPacketType::Command, "list"), &mut buffer)
            .unwrap();
        codec
            .encode(RconPacket::new(2, RconPacketType::Command, ""), &mut buffer)
            .unwrap();

        assert_eq!(codec.decode(&mut buffer).unwrap().unwrap().id, 1);
        assert_eq!(codec.decode(&mut buffer).unwrap().unwrap().id, 2);
        assert!(codec.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn rcon_oversized_inbound_is_rejected() {
        let mut codec = RconCodec::default();
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&100_000i32.to_le_bytes());
        assert!(matches!(
            codec.decode(&mut buffer),
            Err(Error::OversizedPacket(100_000))
        ));
    }

    #[test]
    fn rcon_long_outbound_is_rejected_before_writing() {
        let mut codec = RconCodec::default();
        let mut buffer = BytesMut::new();
        let packet = RconPacket::new(1, RconPacketType::Command, "x".repeat(2000));
        assert!(matches!(
            codec.encode(packet, &mut buffer),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn leftover_bytes_at_eof_are_unexpected_eof() {
        let bytes = RconPacket::new(5, RconPacketType::Response, "hello").to_bytes();
        let mut codec = RconCodec::default();
        let mut buffer = BytesMut::from(&bytes[..9]);
        assert!(matches!(
            codec.decode_eof(&mut buffer),
            Err(Error::UnexpectedEof)
        ));
        assert!(codec.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }

    #[test]
    fn slp_ping_round_trip_through_codecs() {
        let mut client = SlpCodec::default();
        let mut server = RawFrameCodec::default();
        let mut wire = BytesMut::new();

        client.encode(Ping { payload: -42 }, &mut wire).unwrap();
        let frame = server.decode(&mut wire).unwrap().unwrap();
        assert_eq!(frame.id, Ping::ID);
        assert_eq!(frame.data, (-42i64).to_be_bytes().to_vec());

        server.encode(Ping { payload: -42 }, &mut wire).unwrap();
        assert_eq!(
            client.decode(&mut wire).unwrap(),
            Some(Clientbound::Pong(Ping { payload: -42 }))
        );
    }
}
