//! # CaskKV
//!
//! An embeddable, Bitcask-style key-value store with:
//! - Append-only segment files with per-record CRC32
//! - In-memory index and sorted live-key set
//! - Crash recovery by replaying segments on startup
//! - Configurable fsync policy (every write, or every N writes)
//! - Single-writer/multi-reader concurrency model
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Store                                 │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Segments   │◄─────────│  KeyIndex   │
//!   │  (Append)   │ Position │ (+ live set)│
//!   └──────┬──────┘          └─────────────┘
//!          │ startup
//!          ▼
//!   ┌─────────────┐
//!   │  Recovery   │
//!   │  (Replay)   │
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use caskkv::{Config, Store, SyncPolicy};
//!
//! let config = Config::builder()
//!     .data_dir("./data")
//!     .sync_policy(SyncPolicy::EveryN { count: 100 })
//!     .build();
//! let store = Store::open(config)?;
//!
//! store.put("a", b"1")?;
//! assert_eq!(store.get("a")?, Some(b"1".to_vec()));
//! store.close()?;
//! # Ok::<(), caskkv::CaskError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod segment;
pub mod recovery;
pub mod index;
pub mod sync;
pub mod store;
pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, SyncPolicy};
pub use index::Position;
pub use store::{Store, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CaskKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
