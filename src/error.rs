//! Error types for HashLog
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using HashLogError
pub type Result<T> = std::result::Result<T, HashLogError>;

/// Unified error type for HashLog operations
#[derive(Debug, Error)]
pub enum HashLogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("Bad key size: {0} bytes (expected 1..=1024)")]
    BadKeySize(usize),

    #[error("Bad value size: {0} bytes (max 8 MiB)")]
    BadValueSize(usize),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Bad checksum for record at offset {offset}: stored {expected:#010x}, computed {actual:#010x}")]
    BadChecksum {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    #[error("Log corruption detected: {0}")]
    Corruption(String),

    #[error("Compression error: {0}")]
    Compression(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HashLogError {
    /// True for the normal negative lookup result
    pub fn is_not_found(&self) -> bool {
        matches!(self, HashLogError::KeyNotFound)
    }
}
