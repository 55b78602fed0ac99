//! Segment Module
//!
//! Append-only log files holding the store's records.
//!
//! ## Responsibilities
//! - Serialize records with a per-record CRC32
//! - Append records and hand back the offset of each header
//! - Random-offset reads of a record's value
//! - Durable flush (fsync)
//!
//! ## Record Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Header (13 bytes, little-endian)                                 │
//! │ ┌────────────┬────────────┬───────────┬────────────┐             │
//! │ │KeyLen i32  │ValLen i32  │ Flags u8  │ CRC32 (4)  │             │
//! │ └────────────┴────────────┴───────────┴────────────┘             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Key (KeyLen bytes, UTF-8) │ Value (ValLen bytes, 0 for deletes)  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//! Flags bit 0 marks a tombstone. The CRC covers key ‖ value.
//!
//! ## File Naming
//! `segment-NNNNNN.log`, where `NNNNNN` is the zero-padded segment id.
//! The highest id is the active segment.

mod file;
mod record;

use std::path::{Path, PathBuf};

pub use file::Segment;
pub use record::{checksum, encode_record, RecordHeader};

// =============================================================================
// Shared Constants
// =============================================================================

/// Header size: KeyLen (4) + ValLen (4) + Flags (1) + CRC32 (4) = 13 bytes
pub const HEADER_SIZE: u64 = 13;

/// Flags bit marking a tombstone record
pub const FLAG_TOMBSTONE: u8 = 0x01;

const FILE_PREFIX: &str = "segment-";
const FILE_SUFFIX: &str = ".log";

// =============================================================================
// File Naming
// =============================================================================

/// File name for a segment id: 42 → "segment-000042.log"
pub fn segment_file_name(id: u32) -> String {
    format!("{}{:06}{}", FILE_PREFIX, id, FILE_SUFFIX)
}

/// Full path of a segment inside a data directory
pub fn segment_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(segment_file_name(id))
}

/// Parse a segment id from a file name
/// "segment-000042.log" → Some(42)
pub fn parse_segment_id(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id),
    }
}
