//! Sync policy bookkeeping
//!
//! Decides after each append whether the active segment must be flushed.

use crate::config::SyncPolicy;

/// Write counter driven by the configured [`SyncPolicy`]
///
/// The counter is shared by all keys. It lives inside the store's
/// write-locked state, so it needs no synchronization of its own.
#[derive(Debug)]
pub struct SyncTracker {
    policy: SyncPolicy,
    writes_since_sync: u64,
}

impl SyncTracker {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            writes_since_sync: 0,
        }
    }

    /// Count one append and report whether a flush is due now
    ///
    /// A `true` result resets the counter; the caller must flush before
    /// returning to its own caller.
    pub fn record_append(&mut self) -> bool {
        self.writes_since_sync += 1;
        let due = match self.policy {
            SyncPolicy::Always => true,
            SyncPolicy::EveryN { count } => self.writes_since_sync >= count as u64,
        };
        if due {
            self.writes_since_sync = 0;
        }
        due
    }

    /// Reset after an out-of-band flush
    pub fn mark_synced(&mut self) {
        self.writes_since_sync = 0;
    }

    /// Appends acknowledged since the last flush
    pub fn pending(&self) -> u64 {
        self.writes_since_sync
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }
}
