//! Configuration for HashLog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{HashLogError, Result};

/// Main configuration for a HashLog engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Location of the single append-only data file
    pub path: PathBuf,

    /// Sync strategy: whether to fsync after each append
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Record Configuration
    // -------------------------------------------------------------------------
    /// Value compression applied on the write path
    pub compression: Compression,

    // -------------------------------------------------------------------------
    // Recovery Configuration
    // -------------------------------------------------------------------------
    /// What to do with a torn record at the end of the log on open
    pub recovery_mode: RecoveryMode,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Initial capacity of the in-memory index
    pub index_capacity: usize,
}

/// Value compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Store every value verbatim
    None,

    /// LZ4 block compression for values whose record spans more than one padding block
    Lz4,
}

/// Sync strategy for appended records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Leave flushing to the OS (fastest, no crash durability)
    Never,

    /// fdatasync after every append (safest, slowest)
    EveryWrite,
}

/// Startup handling of an incomplete trailing record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    /// Truncate the file back to the last intact record
    TruncateTail,

    /// Refuse to open a log with a torn tail
    Strict,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./hashlog.data"),
            sync_strategy: SyncStrategy::Never,
            compression: Compression::Lz4,
            recovery_mode: RecoveryMode::TruncateTail,
            index_capacity: 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the configuration before opening an engine
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(HashLogError::Config("data file path is empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the value compression codec
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Set the startup recovery mode
    pub fn recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.config.recovery_mode = mode;
        self
    }

    /// Set the initial index capacity
    pub fn index_capacity(mut self, capacity: usize) -> Self {
        self.config.index_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
