//! Index Module
//!
//! In-memory key directory.
//!
//! ## Responsibilities
//! - Map every key ever written to the location of its latest record
//! - Keep a sorted set of live (non-tombstone) keys for range scans
//!
//! ## Data Structure Choice
//! `HashMap` for point lookups plus a `BTreeSet` of live keys. Both live
//! behind the store's lock and are only mutated through [`KeyIndex::insert`],
//! which keeps the live set equal to the non-tombstone keys of the map.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

/// Location of a key's most recent record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Segment holding the record
    pub segment_id: u32,
    /// Offset of the record header inside the segment
    pub offset: u64,
    /// Value length (0 for tombstones)
    pub value_len: u32,
    /// Whether the record deletes the key
    pub tombstone: bool,
}

impl Position {
    /// Position of a live record
    pub fn live(segment_id: u32, offset: u64, value_len: u32) -> Self {
        Self {
            segment_id,
            offset,
            value_len,
            tombstone: false,
        }
    }

    /// Position of a tombstone record
    pub fn tombstone(segment_id: u32, offset: u64) -> Self {
        Self {
            segment_id,
            offset,
            value_len: 0,
            tombstone: true,
        }
    }
}

/// Key → Position map plus the sorted set of live keys
#[derive(Debug, Default)]
pub struct KeyIndex {
    positions: HashMap<String, Position>,
    live_keys: BTreeSet<String>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `key` at `position`, replacing any previous entry
    ///
    /// Tombstone positions stay in the map but drop the key from the
    /// live set.
    pub fn insert(&mut self, key: String, position: Position) {
        if position.tombstone {
            self.live_keys.remove(&key);
        } else if !self.live_keys.contains(&key) {
            self.live_keys.insert(key.clone());
        }
        self.positions.insert(key, position);
    }

    /// Current position of `key`, tombstones included
    pub fn get(&self, key: &str) -> Option<&Position> {
        self.positions.get(key)
    }

    /// Whether `key` currently has a live value
    pub fn is_live(&self, key: &str) -> bool {
        self.live_keys.contains(key)
    }

    /// Live keys in `[start, end]` in ascending order, with their positions
    ///
    /// The bounds are swapped when `start > end`.
    pub fn range<'a>(
        &'a self,
        start: &'a str,
        end: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Position)> + 'a {
        let (low, high) = if start > end { (end, start) } else { (start, end) };
        self.live_keys
            .range::<str, _>((Bound::Included(low), Bound::Included(high)))
            .filter_map(move |key| {
                self.positions
                    .get(key.as_str())
                    .map(|position| (key.as_str(), position))
            })
    }

    /// Number of keys with an entry (live or tombstone)
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of live keys
    pub fn live_len(&self) -> usize {
        self.live_keys.len()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.live_keys.clear();
    }
}
