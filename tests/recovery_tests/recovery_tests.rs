//! Tests for segment recovery
//!
//! These tests verify:
//! - Replay of clean segments (empty, single, many records)
//! - Last-write-wins and tombstones inside one segment
//! - Torn tails (partial header, partial record)
//! - Corruption (CRC mismatch, negative lengths, non-UTF-8 keys)
//! - Verify mode (stats only, index untouched)

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use caskkv::index::{KeyIndex, Position};
use caskkv::recovery::{RecoveryScanner, StopReason};
use caskkv::segment::{encode_record, segment_path, HEADER_SIZE};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_segment() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = segment_path(temp_dir.path(), 1);
    (temp_dir, path)
}

/// Serialized (key, value, tombstone) records, concatenated
fn records(entries: &[(&str, &str, bool)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (key, value, tombstone) in entries {
        let record = encode_record(key.as_bytes(), value.as_bytes(), *tombstone).unwrap();
        bytes.extend_from_slice(&record);
    }
    bytes
}

fn write_raw(path: &PathBuf, bytes: &[u8]) {
    let mut file = File::create(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

fn append_raw(path: &PathBuf, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Clean Segment Tests
// =============================================================================

#[test]
fn test_replay_empty_file() {
    let (_temp, path) = setup_temp_segment();
    write_raw(&path, &[]);

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 0);
    assert_eq!(stats.valid_len, 0);
    assert_eq!(stats.file_len, 0);
    assert!(!stats.stopped_early());
    assert!(index.is_empty());
}

#[test]
fn test_replay_single_record() {
    let (_temp, path) = setup_temp_segment();
    write_raw(&path, &records(&[("k", "v", false)]));

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 1);
    assert_eq!(stats.tombstones, 0);
    assert_eq!(stats.valid_len, HEADER_SIZE + 2);
    assert_eq!(stats.stop, None);
    assert_eq!(index.get("k"), Some(&Position::live(1, 0, 1)));
    assert!(index.is_live("k"));
}

#[test]
fn test_replay_many_records_in_order() {
    let (_temp, path) = setup_temp_segment();
    let entries: Vec<(String, String)> = (0..50)
        .map(|i| (format!("key{:02}", i), format!("value{}", i)))
        .collect();
    let refs: Vec<(&str, &str, bool)> = entries
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str(), false))
        .collect();
    write_raw(&path, &records(&refs));

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 50);
    assert_eq!(stats.valid_len, stats.file_len);
    assert_eq!(index.live_len(), 50);

    let keys: Vec<&str> = index.range("key00", "key99").map(|(k, _)| k).collect();
    assert_eq!(keys.len(), 50);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_replay_last_write_wins() {
    let (_temp, path) = setup_temp_segment();
    let bytes = records(&[("k", "v1", false), ("k", "value2", false)]);
    write_raw(&path, &bytes);

    let mut index = KeyIndex::new();
    RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    let second_offset = HEADER_SIZE + 1 + 2;
    assert_eq!(index.get("k"), Some(&Position::live(1, second_offset, 6)));
    assert_eq!(index.len(), 1);
}

#[test]
fn test_replay_tombstone_removes_live_key() {
    let (_temp, path) = setup_temp_segment();
    write_raw(
        &path,
        &records(&[("a", "1", false), ("b", "2", false), ("a", "", true)]),
    );

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 3);
    assert_eq!(stats.tombstones, 1);
    assert!(index.get("a").unwrap().tombstone);
    assert!(!index.is_live("a"));
    assert!(index.is_live("b"));
    assert_eq!(index.len(), 2);
    assert_eq!(index.live_len(), 1);
}

#[test]
fn test_replay_across_segments_uses_segment_id() {
    let temp_dir = TempDir::new().unwrap();
    let path1 = segment_path(temp_dir.path(), 1);
    let path2 = segment_path(temp_dir.path(), 2);
    write_raw(&path1, &records(&[("k", "old", false), ("x", "1", false)]));
    write_raw(&path2, &records(&[("k", "new", false)]));

    let mut index = KeyIndex::new();
    RecoveryScanner::replay(&path1, 1, &mut index).unwrap();
    RecoveryScanner::replay(&path2, 2, &mut index).unwrap();

    assert_eq!(index.get("k"), Some(&Position::live(2, 0, 3)));
    assert_eq!(index.get("x").unwrap().segment_id, 1);
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_replay_partial_header_at_tail() {
    let (_temp, path) = setup_temp_segment();
    let good = records(&[("k", "v", false)]);
    write_raw(&path, &good);
    append_raw(&path, &[0u8; 8]); // 8 bytes < HEADER_SIZE

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 1);
    assert_eq!(stats.stop, Some(StopReason::TornHeader));
    assert_eq!(stats.valid_len, good.len() as u64);
    assert_eq!(stats.discarded_bytes(), 8);
    assert!(index.is_live("k"));
}

#[test]
fn test_replay_partial_record_at_tail() {
    let (_temp, path) = setup_temp_segment();
    let good = records(&[("k", "v", false)]);
    let mut torn = records(&[("k2", "value2", false)]);
    torn.truncate(HEADER_SIZE as usize + 4); // header + part of key/value
    write_raw(&path, &good);
    append_raw(&path, &torn);

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 1);
    assert_eq!(stats.stop, Some(StopReason::TornRecord));
    assert_eq!(stats.valid_len, good.len() as u64);
    assert!(index.get("k2").is_none());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_replay_stops_at_crc_mismatch() {
    let (_temp, path) = setup_temp_segment();
    let good = records(&[("k1", "v1", false)]);
    let mut bad = records(&[("k2", "v2", false)]);
    if let Some(byte) = bad.last_mut() {
        *byte ^= 0xFF;
    }
    write_raw(&path, &good);
    append_raw(&path, &bad);

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 1);
    assert_eq!(stats.stop, Some(StopReason::ChecksumMismatch));
    assert!(index.is_live("k1"));
    assert!(index.get("k2").is_none());
}

#[test]
fn test_replay_ignores_valid_records_after_corruption() {
    let (_temp, path) = setup_temp_segment();
    let first = records(&[("k1", "v1", false)]);
    let mut corrupt = records(&[("k2", "v2", false)]);
    corrupt[HEADER_SIZE as usize] ^= 0x01; // flip a key byte
    let trailing = records(&[("k3", "v3", false)]);

    write_raw(&path, &first);
    append_raw(&path, &corrupt);
    append_raw(&path, &trailing);

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 1);
    assert_eq!(stats.valid_len, first.len() as u64);
    assert!(index.get("k3").is_none());
}

#[test]
fn test_replay_corruption_at_first_record() {
    let (_temp, path) = setup_temp_segment();
    let mut bytes = records(&[("k", "v", false)]);
    bytes[10] ^= 0xFF; // inside the CRC field
    write_raw(&path, &bytes);

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 0);
    assert_eq!(stats.valid_len, 0);
    assert_eq!(stats.stop, Some(StopReason::ChecksumMismatch));
    assert!(index.is_empty());
}

#[test]
fn test_replay_stops_at_negative_length() {
    let (_temp, path) = setup_temp_segment();
    let good = records(&[("k", "v", false)]);
    let mut bad = records(&[("k2", "v2", false)]);
    bad[4..8].copy_from_slice(&(-5i32).to_le_bytes());
    write_raw(&path, &good);
    append_raw(&path, &bad);

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 1);
    assert_eq!(stats.stop, Some(StopReason::InvalidLength));
}

#[test]
fn test_replay_stops_at_invalid_utf8_key() {
    let (_temp, path) = setup_temp_segment();
    let mut bytes = records(&[("ok", "1", false)]);
    bytes.extend_from_slice(&encode_record(&[0xFF, 0xFE], b"2", false).unwrap());
    write_raw(&path, &bytes);

    let mut index = KeyIndex::new();
    let stats = RecoveryScanner::replay(&path, 1, &mut index).unwrap();

    assert_eq!(stats.records_recovered, 1);
    assert_eq!(stats.stop, Some(StopReason::InvalidKey));
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_matches_replay() {
    let (_temp, path) = setup_temp_segment();
    let mut bytes = records(&[("a", "1", false), ("b", "", true), ("c", "3", false)]);
    bytes.extend_from_slice(&[1, 2, 3]);
    write_raw(&path, &bytes);

    let mut index = KeyIndex::new();
    let replayed = RecoveryScanner::replay(&path, 1, &mut index).unwrap();
    let verified = RecoveryScanner::verify(&path, 1).unwrap();

    assert_eq!(replayed, verified);
    assert_eq!(verified.records_recovered, 3);
    assert_eq!(verified.tombstones, 1);
    assert_eq!(verified.stop, Some(StopReason::TornHeader));
}

#[test]
fn test_replay_missing_file_is_error() {
    let (_temp, path) = setup_temp_segment();

    let mut index = KeyIndex::new();
    assert!(RecoveryScanner::replay(&path, 1, &mut index).is_err());
}
