//! # Variable-Length Wire Primitives
//!
//! Encoders and decoders for the Server List Ping building blocks:
//!
//! - **VarInt**: 7 data bits per byte, least significant group first, `0x80` marks continuation.
//!   A 32-bit value takes at most [`MAX_VARINT_LEN`] bytes.
//! - **VarString**: VarInt byte length followed by UTF-8 bytes, no terminator.
//! - **VarJson**: a VarString whose contents are a JSON document.
//!
//! Readers operate on plain byte slices and never consume input. They return
//! `Ok(None)` when more bytes are needed, and `Ok(Some((value, consumed)))` once a
//! full value is available. The `*_len` helpers always agree with the writers, so
//! callers can size a frame before writing it.

use bytes::BufMut;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{constants, Error, Result};

/// Longest encoding of a 32-bit VarInt
pub const MAX_VARINT_LEN: usize = 5;

const SEGMENT_BITS: u32 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// Number of bytes [`write_varint`] produces for `value`.
#[inline]
pub fn varint_len(value: i32) -> usize {
    match value as u32 {
        v if v < 1 << 7 => 1,
        v if v < 1 << 14 => 2,
        v if v < 1 << 21 => 3,
        v if v < 1 << 28 => 4,
        _ => MAX_VARINT_LEN,
    }
}

/// Append `value` as a VarInt and return the number of bytes written.
///
/// Negative values are encoded through their two's complement bit pattern and always
/// take five bytes.
pub fn write_varint<B: BufMut>(buf: &mut B, value: i32) -> usize {
    let mut remaining = value as u32;
    let mut written = 0;
    loop {
        written += 1;
        if remaining & !SEGMENT_BITS == 0 {
            buf.put_u8(remaining as u8);
            return written;
        }
        buf.put_u8((remaining & SEGMENT_BITS) as u8 | CONTINUE_BIT);
        remaining >>= 7;
    }
}

/// Read a VarInt from the front of `buf`.
///
/// A fifth byte that still carries the continuation bit fails with
/// [`Error::VarIntTooLarge`].
pub fn read_varint(buf: &[u8]) -> Result<Option<(i32, usize)>> {
    let mut value: u32 = 0;
    for (index, &byte) in buf.iter().enumerate() {
        value |= (u32::from(byte) & SEGMENT_BITS) << (7 * index);
        if byte & CONTINUE_BIT == 0 {
            return Ok(Some((value as i32, index + 1)));
        }
        if index + 1 >= MAX_VARINT_LEN {
            return Err(Error::VarIntTooLarge);
        }
    }
    Ok(None)
}

/// Read a VarInt length prefix and reject negative lengths.
fn read_length(buf: &[u8]) -> Result<Option<(usize, usize)>> {
    match read_varint(buf)? {
        Some((length, _)) if length < 0 => Err(Error::violation(constants::ERR_NEGATIVE_LENGTH)),
        Some((length, consumed)) => Ok(Some((length as usize, consumed))),
        None => Ok(None),
    }
}

/// Number of bytes [`write_string`] produces for `value`.
#[inline]
pub fn string_len(value: &str) -> usize {
    varint_len(value.len() as i32) + value.len()
}

/// Append `value` as a VarString and return the number of bytes written.
pub fn write_string<B: BufMut>(buf: &mut B, value: &str) -> usize {
    let prefix = write_varint(buf, value.len() as i32);
    buf.put_slice(value.as_bytes());
    prefix + value.len()
}

/// Read a VarString from the front of `buf`.
pub fn read_string(buf: &[u8]) -> Result<Option<(String, usize)>> {
    let Some((bytes, prefix)) = read_prefixed(buf)? else {
        return Ok(None);
    };
    let value = std::str::from_utf8(bytes)
        .map_err(|e| Error::ProtocolViolation(format!("Invalid UTF-8 in string: {e}")))?;
    Ok(Some((value.to_owned(), prefix + bytes.len())))
}

/// Serialize `value` as JSON and append it as a VarString.
pub fn write_json<B: BufMut, T: Serialize>(buf: &mut B, value: &T) -> Result<usize> {
    let json = serde_json::to_vec(value)?;
    let prefix = write_varint(buf, json.len() as i32);
    buf.put_slice(&json);
    Ok(prefix + json.len())
}

/// Read a VarString from the front of `buf` and parse it as JSON into `T`.
pub fn read_json<T: DeserializeOwned>(buf: &[u8]) -> Result<Option<(T, usize)>> {
    let Some((bytes, prefix)) = read_prefixed(buf)? else {
        return Ok(None);
    };
    let value = serde_json::from_slice(bytes)?;
    Ok(Some((value, prefix + bytes.len())))
}

fn read_prefixed(buf: &[u8]) -> Result<Option<(&[u8], usize)>> {
    let Some((length, prefix)) = read_length(buf)? else {
        return Ok(None);
    };
    let rest = &buf[prefix..];
    if rest.len() < length {
        return Ok(None);
    }
    Ok(Some((&rest[..length], prefix)))
}
