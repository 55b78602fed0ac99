//! Command definitions
//!
//! Represents commands from clients.

use crate::error::{CaskError, Result};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Delete = 0x03,
    Ping = 0x04,
    BatchPut = 0x05,
    Range = 0x06,
    Stats = 0x07,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Put a key-value pair
    Put { key: String, value: Vec<u8> },

    /// Delete a key
    Delete { key: String },

    /// Put several pairs as one reader-atomic batch
    BatchPut { items: Vec<(String, Vec<u8>)> },

    /// Read live pairs in the inclusive range `[start, end]`
    Range { start: String, end: String },

    /// Ping (health check)
    Ping,

    /// Store statistics snapshot
    Stats,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Delete { .. } => CommandType::Delete,
            Command::BatchPut { .. } => CommandType::BatchPut,
            Command::Range { .. } => CommandType::Range,
            Command::Ping => CommandType::Ping,
            Command::Stats => CommandType::Stats,
        }
    }

    /// Reject requests the store would accept but clients must not send
    ///
    /// Keys and range bounds must not be blank, and a batch must carry at
    /// least one pair.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::Get { key } | Command::Put { key, .. } | Command::Delete { key } => {
                require_key(key, "key")
            }
            Command::Range { start, end } => {
                require_key(start, "range start")?;
                require_key(end, "range end")
            }
            Command::BatchPut { items } => {
                if items.is_empty() {
                    return Err(CaskError::InvalidArgument(
                        "batch must contain at least one pair".to_string(),
                    ));
                }
                for (i, (key, _)) in items.iter().enumerate() {
                    require_key(key, &format!("batch key #{}", i))?;
                }
                Ok(())
            }
            Command::Ping | Command::Stats => Ok(()),
        }
    }
}

fn require_key(key: &str, what: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(CaskError::InvalidArgument(format!(
            "{} must not be blank",
            what
        )));
    }
    Ok(())
}
