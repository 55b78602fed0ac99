//! Segment file
//!
//! One append-only log file plus its append cursor.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Result;

use super::record::{encode_record, RecordHeader};
use super::{segment_path, HEADER_SIZE};

/// An open segment file
///
/// ## Concurrency:
/// - Appends and random reads share one file handle (and its seek
///   position), so both go through the `inner` mutex.
/// - All methods take `&self`; the store's readers-writer lock decides
///   who may append.
pub struct Segment {
    /// Segment id (parsed from / encoded into the file name)
    id: u32,
    /// Path to the segment file
    path: PathBuf,
    /// File handle and append cursor
    inner: Mutex<SegmentFile>,
}

struct SegmentFile {
    file: File,
    /// Offset at which the next record will be written
    write_pos: u64,
}

impl Segment {
    /// Open (or create) segment `id` inside `dir`
    ///
    /// The append cursor starts at the current end of the file.
    pub fn open(dir: &Path, id: u32) -> Result<Self> {
        Self::open_path(segment_path(dir, id), id)
    }

    /// Open (or create) segment `id` stored at `path`
    ///
    /// Used for files found on disk, whose names need not be canonical.
    pub fn open_path(path: PathBuf, id: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let write_pos = file.metadata()?.len();

        tracing::debug!("Opened segment {} at {} ({} bytes)", id, path.display(), write_pos);

        Ok(Self {
            id,
            path,
            inner: Mutex::new(SegmentFile { file, write_pos }),
        })
    }

    /// Append a record, returning the offset of its header
    ///
    /// The whole record is written with one `write_all` at the cursor;
    /// existing bytes are never overwritten.
    pub fn append(&self, key: &[u8], value: &[u8], tombstone: bool) -> Result<u64> {
        let record = encode_record(key, value, tombstone)?;

        let mut inner = self.inner.lock();
        let offset = inner.write_pos;

        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(&record)?;
        inner.write_pos += record.len() as u64;

        tracing::trace!(
            "Segment {} append off={} key_len={} val_len={} tombstone={}",
            self.id,
            offset,
            key.len(),
            if tombstone { 0 } else { value.len() },
            tombstone
        );

        Ok(offset)
    }

    /// Read the value of the record whose header starts at `offset`
    ///
    /// Returns:
    /// - `Ok(Some(value))`: live record
    /// - `Ok(None)`: record is a tombstone
    ///
    /// The CRC is not re-checked here; records reachable from the index
    /// were validated when they were written or recovered.
    pub fn read_value_at(&self, offset: u64) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();

        inner.file.seek(SeekFrom::Start(offset))?;
        let mut header_bytes = [0u8; HEADER_SIZE as usize];
        inner.file.read_exact(&mut header_bytes)?;

        let header = RecordHeader::decode(&header_bytes)
            .filter(RecordHeader::has_valid_lengths)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad record header in segment {} at offset {}", self.id, offset),
                )
            })?;

        if header.is_tombstone() {
            return Ok(None);
        }

        // Skip the key (the index already knows it)
        inner.file.seek(SeekFrom::Current(header.key_len as i64))?;

        let mut value = vec![0u8; header.val_len as usize];
        inner.file.read_exact(&mut value)?;

        Ok(Some(value))
    }

    /// Flush file contents and metadata to durable storage
    pub fn force(&self) -> Result<()> {
        let inner = self.inner.lock();
        if let Err(e) = inner.file.sync_all() {
            tracing::error!("fsync failed for segment {}: {}", self.id, e);
            return Err(e.into());
        }
        tracing::trace!("Segment {} fsynced", self.id);
        Ok(())
    }

    /// Cut the file back to `len` bytes and move the append cursor there
    ///
    /// Only used by recovery to drop an unreadable tail from the active
    /// segment before it takes new appends.
    pub fn truncate_to(&self, len: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.set_len(len)?;
        inner.file.sync_all()?;
        inner.write_pos = len;
        Ok(())
    }

    /// Flush, then release the file handle
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner();
        if let Err(e) = inner.file.sync_all() {
            tracing::error!("Close failed for segment {}: {}", self.id, e);
            return Err(e.into());
        }
        tracing::debug!("Segment {} closed", self.id);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size in bytes (the append cursor)
    pub fn size(&self) -> u64 {
        self.inner.lock().write_pos
    }
}
