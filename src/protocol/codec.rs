//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! - GET:       key_len (4 bytes) + key
//! - PUT:       key_len (4 bytes) + key + value
//! - DELETE:    key_len (4 bytes) + key
//! - PING:      empty
//! - BATCH_PUT: bincode `Vec<(String, Vec<u8>)>`
//! - RANGE:     start_len (4 bytes) + start + end
//! - STATS:     empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//! RANGE responses carry a bincode `Vec<(String, Vec<u8>)>`, STATS
//! responses a bincode `StoreStats`.

use std::io::{Read, Write};

use crate::error::{CaskError, Result};

use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Pair Lists (BATCH_PUT requests, RANGE responses)
// =============================================================================

/// Encode an ordered list of key/value pairs
pub fn encode_pairs(pairs: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    Ok(bincode::serialize(pairs)?)
}

/// Decode an ordered list of key/value pairs
pub fn decode_pairs(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    Ok(bincode::deserialize(bytes)?)
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let cmd_type = command.command_type() as u8;

    // Build payload based on command type
    let payload = match command {
        Command::Get { key } | Command::Delete { key } => prefixed(key.as_bytes(), &[]),
        Command::Put { key, value } => prefixed(key.as_bytes(), value),
        Command::Range { start, end } => prefixed(start.as_bytes(), end.as_bytes()),
        Command::BatchPut { items } => encode_pairs(items)?,
        Command::Ping | Command::Stats => Vec::new(),
    };

    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(CaskError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    // Build full message: header + payload
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(cmd_type);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(&payload);

    Ok(message)
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes, "command")?;

    // Parse command based on type
    match cmd_type {
        t if t == CommandType::Get as u8 => {
            let (key, _) = split_prefixed(payload, "GET")?;
            Ok(Command::Get {
                key: utf8(key, "GET")?,
            })
        }
        t if t == CommandType::Put as u8 => {
            let (key, value) = split_prefixed(payload, "PUT")?;
            Ok(Command::Put {
                key: utf8(key, "PUT")?,
                value: value.to_vec(),
            })
        }
        t if t == CommandType::Delete as u8 => {
            let (key, _) = split_prefixed(payload, "DELETE")?;
            Ok(Command::Delete {
                key: utf8(key, "DELETE")?,
            })
        }
        t if t == CommandType::Ping as u8 => {
            expect_empty(payload, "PING")?;
            Ok(Command::Ping)
        }
        t if t == CommandType::Stats as u8 => {
            expect_empty(payload, "STATS")?;
            Ok(Command::Stats)
        }
        t if t == CommandType::BatchPut as u8 => Ok(Command::BatchPut {
            items: decode_pairs(payload)?,
        }),
        t if t == CommandType::Range as u8 => {
            let (start, end) = split_prefixed(payload, "RANGE")?;
            Ok(Command::Range {
                start: utf8(start, "RANGE")?,
                end: utf8(end, "RANGE")?,
            })
        }
        _ => Err(CaskError::Protocol(format!(
            "Unknown command type: 0x{:02x}",
            cmd_type
        ))),
    }
}

/// Build `len(4, BE) + head + tail`
fn prefixed(head: &[u8], tail: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + head.len() + tail.len());
    payload.extend_from_slice(&(head.len() as u32).to_be_bytes());
    payload.extend_from_slice(head);
    payload.extend_from_slice(tail);
    payload
}

/// Split `len(4, BE) + head + tail` into `(head, tail)`
fn split_prefixed<'a>(payload: &'a [u8], name: &str) -> Result<(&'a [u8], &'a [u8])> {
    if payload.len() < 4 {
        return Err(CaskError::Protocol(format!(
            "{} command: missing key length",
            name
        )));
    }

    let key_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;

    if payload.len() - 4 < key_len {
        return Err(CaskError::Protocol(format!(
            "{} command: incomplete key (expected {}, got {})",
            name,
            key_len,
            payload.len() - 4
        )));
    }

    Ok((&payload[4..4 + key_len], &payload[4 + key_len..]))
}

fn expect_empty(payload: &[u8], name: &str) -> Result<()> {
    if !payload.is_empty() {
        return Err(CaskError::Protocol(format!(
            "{} command: unexpected payload of {} bytes",
            name,
            payload.len()
        )));
    }
    Ok(())
}

fn utf8(bytes: &[u8], name: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CaskError::Protocol(format!("{} command: key is not valid UTF-8", name)))
}

/// Validate a frame header and return `(type_or_status, payload)`
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(CaskError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(CaskError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(CaskError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    let payload_len = payload.len() as u32;

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(response.status as u8);
    message.extend_from_slice(&payload_len.to_be_bytes());
    message.extend_from_slice(payload);

    message
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;

    // Parse status
    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        _ => {
            return Err(CaskError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    // Extract payload
    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    // Parse payload length
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(CaskError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload_len);
    frame.extend_from_slice(&header);
    frame.resize(HEADER_SIZE + payload_len, 0);
    reader.read_exact(&mut frame[HEADER_SIZE..])?;

    Ok(frame)
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let frame = read_frame(reader)?;
    decode_command(&frame)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let frame = read_frame(reader)?;
    decode_response(&frame)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
