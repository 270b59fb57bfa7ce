//! # Server List Ping Packets
//!
//! Every frame is
//! ```text
//! [Length: VarInt] [PacketId: VarInt] [Data]
//! ```
//! where `Length` covers the packet ID and the data.
//!
//! | Packet           | Direction | ID | Data                                                        |
//! |------------------|-----------|----|-------------------------------------------------------------|
//! | `Handshake`      | out       | 0  | VarInt version, VarString address, u16 BE port, VarInt state |
//! | `StatusRequest`  | out       | 0  | empty                                                       |
//! | `StatusResponse` | in        | 0  | VarString JSON                                              |
//! | `Ping`           | both      | 1  | i64 BE payload                                              |

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::config::SLP_NEXT_STATE_STATUS;
use crate::core::varint::{
    read_json, read_string, read_varint, string_len, varint_len, write_string,
    write_varint,
};
use crate::error::{constants, Error, Result};

/// A packet this client sends to the server
pub trait Outbound {
    /// The packet's ID
    const ID: i32;

    /// Length of the packet data, not including the ID
    fn data_len(&self) -> usize;

    /// Write exactly [`data_len`](Self::data_len) bytes of packet data
    fn write_data<B: BufMut>(&self, buf: &mut B);
}

/// Opens the connection and selects the status state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: i32,
}

impl Handshake {
    /// Handshake that moves the connection into the status state
    pub fn status(protocol_version: i32, server_address: impl Into<String>, server_port: u16) -> Self {
        Self {
            protocol_version,
            server_address: server_address.into(),
            server_port,
            next_state: SLP_NEXT_STATE_STATUS,
        }
    }

    /// Parse handshake data (the bytes after the packet ID)
    pub fn parse(data: &[u8]) -> Result<Self> {
        let truncated = || Error::violation(constants::ERR_TRAILING_DATA);

        let (protocol_version, mut offset) = read_varint(data)?.ok_or_else(truncated)?;
        let (server_address, read) = read_string(&data[offset..])?.ok_or_else(truncated)?;
        offset += read;
        let port = data.get(offset..offset + 2).ok_or_else(truncated)?;
        let server_port = u16::from_be_bytes([port[0], port[1]]);
        offset += 2;
        let (next_state, read) = read_varint(&data[offset..])?.ok_or_else(truncated)?;
        if offset + read != data.len() {
            return Err(truncated());
        }

        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            next_state,
        })
    }
}

impl Outbound for Handshake {
    const ID: i32 = 0x00;

    fn data_len(&self) -> usize {
        varint_len(self.protocol_version)
            + string_len(&self.server_address)
            + std::mem::size_of::<u16>()
            + varint_len(self.next_state)
    }

    fn write_data<B: BufMut>(&self, buf: &mut B) {
        write_varint(buf, self.protocol_version);
        write_string(buf, &self.server_address);
        buf.put_u16(self.server_port);
        write_varint(buf, self.next_state);
    }
}

/// Asks for the server's status JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusRequest;

impl Outbound for StatusRequest {
    const ID: i32 = 0x00;

    fn data_len(&self) -> usize {
        0
    }

    fn write_data<B: BufMut>(&self, _buf: &mut B) {}
}

/// Carries the server's status JSON
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub status: ServerStatus,
    json: Vec<u8>,
}

impl StatusResponse {
    /// Build a response for sending, serializing `status` once up front
    pub fn new(status: ServerStatus) -> Result<Self> {
        let json = serde_json::to_vec(&status)?;
        Ok(Self { status, json })
    }
}

impl Outbound for StatusResponse {
    const ID: i32 = 0x00;

    fn data_len(&self) -> usize {
        varint_len(self.json.len() as i32) + self.json.len()
    }

    fn write_data<B: BufMut>(&self, buf: &mut B) {
        write_varint(buf, self.json.len() as i32);
        buf.put_slice(&self.json);
    }
}

/// Latency probe, echoed verbatim by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub payload: i64,
}

impl Outbound for Ping {
    const ID: i32 = 0x01;

    fn data_len(&self) -> usize {
        std::mem::size_of::<i64>()
    }

    fn write_data<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64(self.payload);
    }
}

/// Packets the server sends while in the status state, keyed by packet ID
#[derive(Debug, Clone, PartialEq)]
pub enum Clientbound {
    Status(ServerStatus),
    Pong(Ping),
}

/// A frame split into its packet ID and undecoded data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub id: i32,
    pub data: Vec<u8>,
}

/// Number of bytes [`write_frame`] produces for `packet`.
pub fn frame_len<P: Outbound>(packet: &P) -> usize {
    let length = varint_len(P::ID) + packet.data_len();
    varint_len(length as i32) + length
}

/// Append a complete frame for `packet` and return the number of bytes written.
pub fn write_frame<B: BufMut, P: Outbound>(buf: &mut B, packet: &P) -> usize {
    let length = varint_len(P::ID) + packet.data_len();
    let prefix = write_varint(buf, length as i32);
    write_varint(buf, P::ID);
    packet.write_data(buf);
    prefix + length
}

/// Try to split one frame off the front of `buf` without decoding its data.
///
/// Returns `Ok(None)` until the whole frame is available. Frames declaring more
/// than `max_frame` bytes fail with [`Error::OversizedPacket`].
pub fn read_raw_frame(buf: &[u8], max_frame: usize) -> Result<Option<(RawFrame, usize)>> {
    let Some((length, prefix)) = read_varint(buf)? else {
        return Ok(None);
    };
    if length < 0 {
        return Err(Error::violation(constants::ERR_NEGATIVE_LENGTH));
    }
    let length = length as usize;
    if length > max_frame {
        return Err(Error::OversizedPacket(length));
    }
    let Some(body) = buf.get(prefix..prefix + length) else {
        return Ok(None);
    };

    let (id, id_len) = read_varint(body)?
        .ok_or_else(|| Error::violation(constants::ERR_TRAILING_DATA))?;

    Ok(Some((
        RawFrame {
            id,
            data: body[id_len..].to_vec(),
        },
        prefix + length,
    )))
}

/// Try to read one clientbound packet from the front of `buf`.
pub fn read_frame(buf: &[u8], max_frame: usize) -> Result<Option<(Clientbound, usize)>> {
    let Some((frame, consumed)) = read_raw_frame(buf, max_frame)? else {
        return Ok(None);
    };
    Ok(Some((decode_clientbound(&frame)?, consumed)))
}

fn decode_clientbound(frame: &RawFrame) -> Result<Clientbound> {
    match frame.id {
        0x00 => {
            let (status, consumed) = read_json::<ServerStatus>(&frame.data)?
                .ok_or_else(|| Error::violation(constants::ERR_TRAILING_DATA))?;
            if consumed != frame.data.len() {
                return Err(Error::violation(constants::ERR_TRAILING_DATA));
            }
            Ok(Clientbound::Status(status))
        }
        0x01 => {
            let bytes: [u8; 8] = frame
                .data
                .as_slice()
                .try_into()
                .map_err(|_| Error::violation(constants::ERR_TRAILING_DATA))?;
            Ok(Clientbound::Pong(Ping {
                payload: i64::from_be_bytes(bytes),
            }))
        }
        other => Err(Error::ProtocolViolation(format!(
            "{}: {other:#04x}",
            constants::ERR_UNKNOWN_PACKET_ID
        ))),
    }
}

/// The status document a server returns
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub version: Version,
    #[serde(default)]
    pub players: Players,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
    /// PNG data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub protocol: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Players {
    #[serde(default)]
    pub max: i32,
    #[serde(default)]
    pub online: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<Player>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub name: String,
    pub id: String,
}

/// Server MOTD. Older servers send a bare string, newer ones a chat component.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "DescriptionRepr")]
pub struct Description {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptionRepr {
    Plain(String),
    Component {
        #[serde(default)]
        text: Option<String>,
    },
}

impl From<DescriptionRepr> for Description {
    fn from(repr: DescriptionRepr) -> Self {
        match repr {
            DescriptionRepr::Plain(text) => Description { text: Some(text) },
            DescriptionRepr::Component { text } => Description { text },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn handshake_layout() {
        let handshake = Handshake::status(-1, "localhost", 25565);
        let mut buf = BytesMut::new();
        let written = write_frame(&mut buf, &handshake);

        assert_eq!(written, frame_len(&handshake));
        assert_eq!(
            buf.to_vec(),
            vec![
                0x13, // length
                0x00, // packet id
                0xFF, 0xFF, 0xFF, 0xFF, 0x0F, // protocol version -1
                0x09, b'l', b'o', b'c', b'a', b'l', b'h', b'o', b's', b't', // address
                0x63, 0xDD, // port, big endian
                0x01, // next state
            ]
        );
    }

    #[test]
    fn handshake_parses_back() {
        let handshake = Handshake::status(-1, "mc.example.org", 25566);
        let mut buf = BytesMut::new();
        write_frame(&mut buf, &handshake);

        let (frame, _) = read_raw_frame(&buf, 1024).unwrap().unwrap();
        assert_eq!(frame.id, Handshake::ID);
        assert_eq!(Handshake::parse(&frame.data).unwrap(), handshake);
    }

    #[test]
    fn status_request_is_two_bytes() {
        let mut buf = BytesMut::new();
        write_frame(&mut buf, &StatusRequest);
        assert_eq!(buf.to_vec(), vec![0x01, 0x00]);
    }

    #[test]
    fn ping_is_big_endian() {
        let mut buf = BytesMut::new();
        write_frame(&mut buf, &Ping { payload: 0x0102_0304_0506_0708 });
        assert_eq!(
            buf.to_vec(),
            vec![0x09, 0x01, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );

        let (packet, consumed) = read_frame(&buf, 1024).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(packet, Clientbound::Pong(Ping { payload: 0x0102_0304_0506_0708 }));
    }

    #[test]
    fn status_response_decodes() {
        let json = br#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":20,"online":1,"sample":[{"name":"alice","id":"4566e69f-c907-48ee-8d71-d7ba5aa00d20"}]},"description":{"text":"Hello"}}"#;
        let mut data = Vec::new();
        write_varint(&mut data, json.len() as i32);
        data.extend_from_slice(json);
        let mut buf = Vec::new();
        write_varint(&mut buf, (data.len() + 1) as i32);
        buf.push(0x00);
        buf.extend_from_slice(&data);

        let (packet, consumed) = read_frame(&buf, 1 << 20).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        let Clientbound::Status(status) = packet else {
            panic!("expected a status response");
        };
        assert_eq!(status.version.protocol, 765);
        assert_eq!(status.players.online, 1);
        assert_eq!(status.players.sample.unwrap()[0].name, "alice");
        assert_eq!(status.description.unwrap().text.as_deref(), Some("Hello"));
        assert!(status.favicon.is_none());
    }

    #[test]
    fn sample_players_may_omit_fields() {
        let status: ServerStatus = serde_json::from_str(
            r#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":20,"online":2,"sample":[{"name":"alice"},{"id":"4566e69f-c907-48ee-8d71-d7ba5aa00d20"}]}}"#,
        )
        .unwrap();

        let sample = status.players.sample.unwrap();
        assert_eq!(sample[0].name, "alice");
        assert!(sample[0].id.is_empty());
        assert!(sample[1].name.is_empty());
        assert_eq!(sample[1].id, "4566e69f-c907-48ee-8d71-d7ba5aa00d20");
    }

    #[test]
    fn status_response_reads_back() {
        let status = ServerStatus {
            version: Version { name: "1.8.9".into(), protocol: 47 },
            ..ServerStatus::default()
        };
        let mut buf = BytesMut::new();
        let response = StatusResponse::new(status.clone()).unwrap();
        let written = write_frame(&mut buf, &response);
        assert_eq!(written, frame_len(&response));

        let (packet, consumed) = read_frame(&buf, 1 << 20).unwrap().unwrap();
        assert_eq!(consumed, written);
        assert_eq!(packet, Clientbound::Status(status));
    }

    #[test]
    fn plain_string_description() {
        let status: ServerStatus =
            serde_json::from_str(r#"{"version":{"name":"b1.7","protocol":1},"players":{"max":8,"online":0},"description":"A Minecraft Server"}"#)
                .unwrap();
        assert_eq!(
            status.description.and_then(|d| d.text).as_deref(),
            Some("A Minecraft Server")
        );
    }

    #[test]
    fn missing_fields_default() {
        let status: ServerStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status, ServerStatus::default());
    }

    #[test]
    fn partial_frame_needs_more_data() {
        let mut buf = BytesMut::new();
        write_frame(&mut buf, &Ping { payload: 7 });
        assert_eq!(read_frame(&buf[..buf.len() - 1], 1024).unwrap(), None);
        assert_eq!(read_frame(&[], 1024).unwrap(), None);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 5000);
        assert!(matches!(
            read_frame(&buf, 1024),
            Err(Error::OversizedPacket(5000))
        ));
    }

    #[test]
    fn unknown_packet_id_is_rejected() {
        assert!(matches!(
            read_frame(&[0x01, 0x05], 1024),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn short_pong_is_rejected() {
        assert!(matches!(
            read_frame(&[0x03, 0x01, 0x00, 0x00], 1024),
            Err(Error::ProtocolViolation(_))
        ));
    }
}
