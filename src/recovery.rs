//! Segment Recovery
//!
//! Rebuilds the index at startup by replaying segment files.
//!
//! ## Policy
//! Each segment is read sequentially from offset 0. Replay of a segment stops
//! at the first record that is torn (runs past the end of the file), has a
//! negative length, fails its CRC check, or carries a non-UTF-8 key. Nothing
//! after that point in the same segment is trusted, even if it looks
//! well-formed. Stopping early is not an error: the caller logs it and moves
//! on to the next segment.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;
use crate::index::{KeyIndex, Position};
use crate::segment::{checksum, RecordHeader, HEADER_SIZE};

/// Why replay of a segment ended before the end of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Fewer than `HEADER_SIZE` bytes left
    TornHeader,
    /// Header declares a negative key or value length
    InvalidLength,
    /// Key and value run past the end of the file
    TornRecord,
    /// Stored CRC does not match key ‖ value
    ChecksumMismatch,
    /// Key bytes are not valid UTF-8
    InvalidKey,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::TornHeader => "torn header",
            StopReason::InvalidLength => "invalid length",
            StopReason::TornRecord => "torn record",
            StopReason::ChecksumMismatch => "checksum mismatch",
            StopReason::InvalidKey => "invalid key",
        };
        f.write_str(text)
    }
}

/// Result of replaying one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Segment that was replayed
    pub segment_id: u32,

    /// Number of records applied (tombstones included)
    pub records_recovered: u64,

    /// How many of those records were tombstones
    pub tombstones: u64,

    /// End offset of the last valid record
    pub valid_len: u64,

    /// File size at the time of the scan
    pub file_len: u64,

    /// Set when replay ended before `file_len`
    pub stop: Option<StopReason>,
}

impl ReplayStats {
    /// Whether some bytes at the tail of the segment were not recovered
    pub fn stopped_early(&self) -> bool {
        self.stop.is_some()
    }

    /// Bytes after the last valid record
    pub fn discarded_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }
}

/// Replays segment files into a [`KeyIndex`]
pub struct RecoveryScanner;

impl RecoveryScanner {
    /// Replay segment `segment_id` stored at `path` into `index`
    ///
    /// Records are applied in file order, so a later record for a key
    /// overwrites an earlier one. Replaying segments in ascending id order
    /// therefore yields last-write-wins across the whole store.
    pub fn replay(path: &Path, segment_id: u32, index: &mut KeyIndex) -> Result<ReplayStats> {
        Self::scan(path, segment_id, |key, position| index.insert(key, position))
    }

    /// Scan a segment and report statistics without touching any index
    pub fn verify(path: &Path, segment_id: u32) -> Result<ReplayStats> {
        Self::scan(path, segment_id, |_, _| {})
    }

    /// Walk records from offset 0, calling `apply` for each valid one
    fn scan<F>(path: &Path, segment_id: u32, mut apply: F) -> Result<ReplayStats>
    where
        F: FnMut(String, Position),
    {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut stats = ReplayStats {
            segment_id,
            records_recovered: 0,
            tombstones: 0,
            valid_len: 0,
            file_len,
            stop: None,
        };

        let mut pos = 0u64;
        while pos < file_len {
            if file_len - pos < HEADER_SIZE {
                stats.stop = Some(StopReason::TornHeader);
                break;
            }

            let mut header_bytes = [0u8; HEADER_SIZE as usize];
            reader.read_exact(&mut header_bytes)?;
            let header = match RecordHeader::decode(&header_bytes) {
                Some(header) => header,
                None => {
                    stats.stop = Some(StopReason::TornHeader);
                    break;
                }
            };

            if !header.has_valid_lengths() {
                stats.stop = Some(StopReason::InvalidLength);
                break;
            }

            let next_pos = pos + header.record_len();
            if next_pos > file_len {
                stats.stop = Some(StopReason::TornRecord);
                break;
            }

            let mut key = vec![0u8; header.key_len as usize];
            reader.read_exact(&mut key)?;
            let mut value = vec![0u8; header.val_len as usize];
            reader.read_exact(&mut value)?;

            if checksum(&key, &value) != header.crc {
                stats.stop = Some(StopReason::ChecksumMismatch);
                break;
            }

            let key = match String::from_utf8(key) {
                Ok(key) => key,
                Err(_) => {
                    stats.stop = Some(StopReason::InvalidKey);
                    break;
                }
            };

            let position = if header.is_tombstone() {
                stats.tombstones += 1;
                Position::tombstone(segment_id, pos)
            } else {
                Position::live(segment_id, pos, header.val_len as u32)
            };

            tracing::trace!(
                "Recovered segment={} off={} key={} tombstone={}",
                segment_id,
                pos,
                key,
                position.tombstone
            );

            apply(key, position);
            stats.records_recovered += 1;
            pos = next_pos;
            stats.valid_len = pos;
        }

        if let Some(reason) = stats.stop {
            tracing::warn!(
                "Segment {} replay stopped at offset {}: {} ({} trailing bytes ignored)",
                segment_id,
                stats.valid_len,
                reason,
                stats.discarded_bytes()
            );
        }

        Ok(stats)
    }
}
