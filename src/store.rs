//! Store Module
//!
//! The storage engine that coordinates segments, the index and the sync
//! policy.
//!
//! ## Responsibilities
//! - Discover segment files and replay them on startup
//! - Append writes to the active segment and index them
//! - Serve reads through the index
//! - Apply the sync policy after every append
//! - Flush and close every segment on shutdown

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::index::{KeyIndex, Position};
use crate::protocol::{encode_pairs, Command, Response, MAX_PAYLOAD_SIZE};
use crate::recovery::{RecoveryScanner, ReplayStats};
use crate::segment::{encode_record, parse_segment_id, segment_file_name, Segment};
use crate::sync::SyncTracker;

/// Id of the first segment of an empty store
const FIRST_SEGMENT_ID: u32 = 1;

/// Point-in-time counters, sent to clients for STATS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub segments: usize,
    pub active_segment_id: u32,
    pub active_segment_size: u64,
    pub live_keys: usize,
    pub indexed_keys: usize,
    pub pending_sync_writes: u64,
    pub sync_policy: String,
}

/// The key-value store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/batch_put): hold `state` exclusively for the
///   whole operation, including any fsync the sync policy requires.
/// - **Reads** (get/get_range): hold `state` shared, so they run alongside
///   each other but never alongside a writer.
/// - Each `Segment` additionally serializes access to its own file handle.
pub struct Store {
    /// Store configuration
    config: Config,

    /// Everything writers mutate
    state: RwLock<StoreState>,

    /// Per-segment replay results from startup
    recovery: Vec<ReplayStats>,
}

struct StoreState {
    /// Open segments by id (ascending = creation order)
    segments: BTreeMap<u32, Segment>,

    /// Id of the append target (always the highest id)
    active_id: u32,

    /// Key → latest record, plus the live key set
    index: KeyIndex,

    /// Sync policy counter
    sync: SyncTracker,

    /// Set by `close()`
    closed: bool,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Validate config, create the data directory if needed
    /// 2. Discover `segment-NNNNNN.log` files (one per id)
    /// 3. Replay every segment in ascending id order
    /// 4. Make the highest id the active segment (create id 1 if none)
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            "Opening store dir={} sync={} sync_interval_ms={} compact_threshold_bytes={}",
            config.data_dir.display(),
            config.sync_policy,
            config.sync_interval_ms,
            config.compact_threshold_bytes
        );

        // Step 1: Data directory
        let data_dir = config.data_dir.clone();
        Self::prepare_dir(&data_dir)?;

        // Step 2: Discover segment files
        let found = Self::discover_segments(&data_dir)?;

        let mut segments = BTreeMap::new();
        let mut index = KeyIndex::new();
        let mut recovery = Vec::with_capacity(found.len());

        if found.is_empty() {
            // Fresh store
            let segment = Segment::open(&data_dir, FIRST_SEGMENT_ID)?;
            segments.insert(FIRST_SEGMENT_ID, segment);
        } else {
            // Step 3: Open and replay, oldest first
            for (id, path) in found {
                let segment = Segment::open_path(path, id)?;
                let stats = RecoveryScanner::replay(segment.path(), id, &mut index)?;
                tracing::debug!(
                    "Replayed segment {}: {} records ({} tombstones), {} bytes",
                    id,
                    stats.records_recovered,
                    stats.tombstones,
                    stats.valid_len
                );
                recovery.push(stats);
                segments.insert(id, segment);
            }
        }

        // Step 4: Active segment
        let active_id = *segments.keys().next_back().unwrap_or(&FIRST_SEGMENT_ID);

        // An unreadable tail in the active segment would hide every record
        // appended after it from the next recovery, so cut it off now.
        if let Some(stats) = recovery.last().filter(|s| s.stopped_early()) {
            if let Some(active) = segments.get(&active_id) {
                tracing::warn!(
                    "Truncating active segment {} from {} to {} bytes",
                    active_id,
                    stats.file_len,
                    stats.valid_len
                );
                active.truncate_to(stats.valid_len)?;
            }
        }

        tracing::info!(
            "Store ready: {} segments, active={}, {} keys ({} live)",
            segments.len(),
            active_id,
            index.len(),
            index.live_len()
        );

        Ok(Self {
            state: RwLock::new(StoreState {
                segments,
                active_id,
                index,
                sync: SyncTracker::new(config.sync_policy),
                closed: false,
            }),
            config,
            recovery,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Execute a command
    ///
    /// Routes protocol commands to the matching operation
    pub fn execute(&self, command: Command) -> Result<Response> {
        match command {
            Command::Get { key } => Ok(match self.get(&key)? {
                Some(value) => Response::ok(Some(value)),
                None => Response::not_found(),
            }),
            Command::Put { key, value } => {
                self.put(&key, &value)?;
                Ok(Response::ok(None))
            }
            Command::Delete { key } => {
                self.delete(&key)?;
                Ok(Response::ok(None))
            }
            Command::BatchPut { items } => {
                self.batch_put(&items)?;
                Ok(Response::ok(None))
            }
            Command::Range { start, end } => {
                let pairs = self.get_range(&start, &end)?;
                let payload = encode_pairs(&pairs)?;
                if payload.len() > MAX_PAYLOAD_SIZE as usize {
                    return Err(CaskError::Protocol(format!(
                        "Range result too large: {} pairs, {} bytes",
                        pairs.len(),
                        payload.len()
                    )));
                }
                Ok(Response::ok(Some(payload)))
            }
            Command::Stats => {
                let stats = self.stats()?;
                Ok(Response::ok(Some(bincode::serialize(&stats)?)))
            }
            Command::Ping => Ok(Response::ok(Some(b"PONG".to_vec()))),
        }
    }

    /// Get a value by key
    ///
    /// Returns `Ok(None)` for keys never written or deleted.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let state = self.state.read();
        state.ensure_open()?;

        let position = match state.index.get(key) {
            Some(position) if !position.tombstone => *position,
            _ => {
                tracing::trace!("get miss key={}", key);
                return Ok(None);
            }
        };

        state.read_value(key, &position)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append record to the active segment
    /// 3. Point the index at the new record
    /// 4. Apply the sync policy
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        tracing::debug!("put key={} bytes={}", key, value.len());

        let mut state = self.state.write();
        state.ensure_open()?;
        state.append_live(key, value)
    }

    /// Delete a key
    ///
    /// Always appends a tombstone, even when the key has no live value.
    pub fn delete(&self, key: &str) -> Result<()> {
        tracing::debug!("delete key={}", key);

        let mut state = self.state.write();
        state.ensure_open()?;

        let active = state.active()?;
        let (active_id, offset) = (active.id(), active.append(key.as_bytes(), &[], true)?);
        state
            .index
            .insert(key.to_string(), Position::tombstone(active_id, offset));
        state.after_append()
    }

    /// Put several pairs under one write lock
    ///
    /// Readers see either none or all of the batch. A crash part-way
    /// through keeps whatever prefix already reached the disk. The sync
    /// policy is applied per item.
    pub fn batch_put<K, V>(&self, items: &[(K, V)]) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        if items.is_empty() {
            return self.state.read().ensure_open();
        }
        tracing::debug!("batch_put items={}", items.len());

        // Reject oversized items before anything is written
        for (key, value) in items {
            encode_record(key.as_ref().as_bytes(), value.as_ref(), false)?;
        }

        let mut state = self.state.write();
        state.ensure_open()?;
        for (key, value) in items {
            state.append_live(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// All live pairs with keys in `[start, end]`, ascending
    ///
    /// The bounds are swapped when `start > end`. The result is a
    /// snapshot taken under one read lock.
    pub fn get_range(&self, start: &str, end: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let (start, end) = if start > end { (end, start) } else { (start, end) };

        let state = self.state.read();
        state.ensure_open()?;

        let mut pairs = Vec::new();
        for (key, position) in state.index.range(start, end) {
            if let Some(value) = state.read_value(key, position)? {
                pairs.push((key.to_string(), value));
            }
        }

        tracing::debug!("range start={} end={} count={}", start, end, pairs.len());
        Ok(pairs)
    }

    /// Force-flush the active segment now
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        state.active()?.force()?;
        state.sync.mark_synced();
        Ok(())
    }

    /// Counters taken under one read lock
    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read();
        state.ensure_open()?;

        Ok(StoreStats {
            segments: state.segments.len(),
            active_segment_id: state.active_id,
            active_segment_size: state.active()?.size(),
            live_keys: state.index.live_len(),
            indexed_keys: state.index.len(),
            pending_sync_writes: state.sync.pending(),
            sync_policy: state.sync.policy().to_string(),
        })
    }

    /// Close the store gracefully
    ///
    /// Flushes and closes every segment and drops the index. Calling it
    /// again is a no-op; any other operation afterwards fails with
    /// [`CaskError::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let segments = std::mem::take(&mut state.segments);
        state.index.clear();

        // Close everything, report the first failure
        let mut first_error = None;
        for (_, segment) in segments {
            if let Err(e) = segment.close() {
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("Store closed: {}", self.config.data_dir.display());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Per-segment replay results from startup (empty for a fresh store)
    pub fn recovery_stats(&self) -> &[ReplayStats] {
        &self.recovery
    }

    /// Number of open segments
    pub fn segment_count(&self) -> usize {
        self.state.read().segments.len()
    }

    /// Id of the segment taking appends
    pub fn active_segment_id(&self) -> u32 {
        self.state.read().active_id
    }

    /// Size of the active segment in bytes
    pub fn active_segment_size(&self) -> u64 {
        let state = self.state.read();
        state
            .segments
            .get(&state.active_id)
            .map(Segment::size)
            .unwrap_or(0)
    }

    /// Number of keys with a live value
    pub fn live_key_count(&self) -> usize {
        self.state.read().index.live_len()
    }

    /// Number of indexed keys, tombstones included
    pub fn index_len(&self) -> usize {
        self.state.read().index.len()
    }

    /// Appends acknowledged since the last flush
    pub fn pending_sync_writes(&self) -> u64 {
        self.state.read().sync.pending()
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Create the data directory, or check that an existing path is one
    fn prepare_dir(dir: &Path) -> Result<()> {
        if dir.exists() && !dir.is_dir() {
            return Err(CaskError::Config(format!(
                "data_dir {} is not a directory",
                dir.display()
            )));
        }
        fs::create_dir_all(dir).map_err(|e| {
            CaskError::Config(format!("Cannot create data_dir {}: {}", dir.display(), e))
        })
    }

    /// Segment files in `dir` by id, ascending
    ///
    /// Names are matched loosely (`segment-2.log` is id 2). When two files
    /// map to the same id, the canonical name wins and the other is skipped.
    fn discover_segments(dir: &Path) -> Result<BTreeMap<u32, PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| {
            CaskError::Config(format!("Cannot read data_dir {}: {}", dir.display(), e))
        })?;

        let mut found: BTreeMap<u32, PathBuf> = BTreeMap::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let id = match parse_segment_id(&path) {
                Some(id) => id,
                None => continue,
            };

            let canonical = segment_file_name(id);
            let is_canonical = |p: &Path| p.file_name() == Some(OsStr::new(&canonical));
            let replace = match found.get(&id) {
                None => true,
                Some(existing) if is_canonical(existing.as_path()) => false,
                // Neither is canonical: keep the lexically smaller name
                Some(existing) => is_canonical(&path) || path < *existing,
            };

            let skipped = if replace {
                match found.insert(id, path) {
                    Some(old) => old,
                    None => continue,
                }
            } else {
                path
            };
            tracing::warn!(
                "Skipping {}: another file already holds segment {}",
                skipped.display(),
                id
            );
        }

        Ok(found)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Error closing store on drop: {}", e);
        }
    }
}

impl StoreState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CaskError::Closed);
        }
        Ok(())
    }

    /// The append target
    fn active(&self) -> Result<&Segment> {
        self.segments.get(&self.active_id).ok_or_else(|| {
            tracing::error!("Active segment {} is not open", self.active_id);
            CaskError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("active segment {} is not open", self.active_id),
            ))
        })
    }

    /// Append a live record and index it
    fn append_live(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let active = self.active()?;
        let (active_id, offset) = (active.id(), active.append(key.as_bytes(), value, false)?);
        self.index.insert(
            key.to_string(),
            Position::live(active_id, offset, value.len() as u32),
        );
        self.after_append()
    }

    /// Apply the sync policy after one append
    fn after_append(&mut self) -> Result<()> {
        if self.sync.record_append() {
            self.active()?.force()?;
        }
        Ok(())
    }

    /// Resolve a live position to its value
    ///
    /// A position naming a segment that is not open breaks an internal
    /// invariant; it is logged and treated as absent.
    fn read_value(&self, key: &str, position: &Position) -> Result<Option<Vec<u8>>> {
        match self.segments.get(&position.segment_id) {
            Some(segment) => segment.read_value_at(position.offset),
            None => {
                tracing::error!(
                    "Segment {} missing for key={} (offset {})",
                    position.segment_id,
                    key,
                    position.offset
                );
                Ok(None)
            }
        }
    }
}
