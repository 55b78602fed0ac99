//! Record codec
//!
//! Encoding of record headers and whole records.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CaskError, Result};

use super::{FLAG_TOMBSTONE, HEADER_SIZE};

/// Decoded fixed-size record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Length of the key in bytes (negative only in corrupted files)
    pub key_len: i32,
    /// Length of the value in bytes (negative only in corrupted files)
    pub val_len: i32,
    /// Flag bits (bit 0 = tombstone)
    pub flags: u8,
    /// CRC32 over key ‖ value, stored as the raw 32-bit pattern
    pub crc: u32,
}

impl RecordHeader {
    /// Decode a header from the first `HEADER_SIZE` bytes of `bytes`.
    ///
    /// Returns `None` when fewer than `HEADER_SIZE` bytes are available.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return None;
        }
        let mut buf = &bytes[..HEADER_SIZE as usize];
        Some(Self {
            key_len: buf.get_i32_le(),
            val_len: buf.get_i32_le(),
            flags: buf.get_u8(),
            crc: buf.get_u32_le(),
        })
    }

    /// Append the encoded header to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.key_len);
        buf.put_i32_le(self.val_len);
        buf.put_u8(self.flags);
        buf.put_u32_le(self.crc);
    }

    pub fn is_tombstone(&self) -> bool {
        self.flags & FLAG_TOMBSTONE != 0
    }

    /// Whether both lengths are non-negative
    pub fn has_valid_lengths(&self) -> bool {
        self.key_len >= 0 && self.val_len >= 0
    }

    /// Total on-disk size of the record (header + key + value).
    /// Only meaningful when `has_valid_lengths()` holds.
    pub fn record_len(&self) -> u64 {
        HEADER_SIZE + self.key_len as u64 + self.val_len as u64
    }
}

/// CRC32 over key ‖ value
pub fn checksum(key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Serialize a complete record into a single buffer.
///
/// Tombstones always carry an empty value, whatever `value` holds.
pub fn encode_record(key: &[u8], value: &[u8], tombstone: bool) -> Result<BytesMut> {
    let value = if tombstone { &[][..] } else { value };

    let key_len = i32::try_from(key.len()).map_err(|_| {
        CaskError::InvalidArgument(format!("key too large: {} bytes", key.len()))
    })?;
    let val_len = i32::try_from(value.len()).map_err(|_| {
        CaskError::InvalidArgument(format!("value too large: {} bytes", value.len()))
    })?;

    let header = RecordHeader {
        key_len,
        val_len,
        flags: if tombstone { FLAG_TOMBSTONE } else { 0 },
        crc: checksum(key, value),
    };

    let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize + key.len() + value.len());
    header.encode(&mut buf);
    buf.put_slice(key);
    buf.put_slice(value);
    Ok(buf)
}
