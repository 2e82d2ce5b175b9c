//! Engine Module
//!
//! The storage engine that coordinates the log file, the record codec and the index.
//!
//! ## Responsibilities
//! - Validate key/value sizes before any I/O
//! - Encode, pad and append records; roll back failed appends
//! - Serve reads from the index plus one positioned read per lookup
//! - Rebuild the index from the log on startup

use std::fs::File;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Compression, Config, SyncStrategy};
use crate::error::{HashLogError, Result};
use crate::index::{IndexEntry, IndexTable};
use crate::record::{pad_to_block, Record, MAX_KEY_SIZE, MAX_VALUE_SIZE, PADDING_SIZE};
use crate::storage::{open_log_file, LogFile, LogRecovery, RecoveryResult};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/remove): Serialized by `writer`
///   - Only ONE append (plus its index update) at a time
///   - The lock is per instance; engines on different files never contend
///
/// - **Reads** (get): Never touch `writer`
///   - IndexTable uses an internal RwLock (many concurrent readers)
///   - Positioned reads against the shared file handle, no shared cursor
///   - A read racing a write sees the entry from before or after it
pub struct Engine<F: LogFile = File> {
    /// Engine configuration
    config: Config,

    /// Backing data file (shared by readers and the writer)
    file: F,

    /// Primary index: key → cached header + offset
    index: IndexTable,

    /// Exclusive writer state
    writer: Mutex<Writer>,
}

/// State owned by whoever holds the write lock
struct Writer {
    /// Logical file size: offset of the next record, advanced only on success
    size: u64,

    /// Reusable encode buffer; never exposed to readers
    buffer: BytesMut,
}

/// Point-in-time counters for an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of live keys
    pub keys: usize,

    /// Approximate bytes used by the index
    pub index_memory_usage: usize,

    /// Logical size of the data file
    pub logical_size: u64,
}

impl Engine<File> {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config
    /// 2. Open/create the data file (and its parent directory)
    /// 3. Replay the log into the index, repairing a torn tail
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let file = open_log_file(&config.path)?;
        Self::with_file(config, file)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data file
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().path(path).build();
        Self::open(config)
    }
}

impl<F: LogFile> Engine<F> {
    /// Open an engine over an already-open log file
    ///
    /// `config.path` is only reported back through [`Engine::path`].
    pub fn with_file(config: Config, file: F) -> Result<Self> {
        let index = IndexTable::with_capacity(config.index_capacity);
        let recovery: RecoveryResult = LogRecovery::recover(&file, &index, config.recovery_mode)?;

        info!(
            path = %config.path.display(),
            keys = index.len(),
            size = recovery.valid_size,
            truncated = recovery.was_truncated,
            "Engine opened"
        );

        Ok(Self {
            config,
            file,
            index,
            writer: Mutex::new(Writer {
                size: recovery.valid_size,
                buffer: BytesMut::with_capacity(PADDING_SIZE),
            }),
        })
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Validate sizes
    /// 2. Build the record (compressing large values if configured)
    /// 3. Acquire write lock, append at the logical size
    /// 4. Install the index entry only after a successful append
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(HashLogError::BadValueSize(value.len()));
        }

        let key = Bytes::copy_from_slice(key);
        let mut record = Record::new(key.clone(), value.to_vec());
        if self.config.compression == Compression::Lz4 && record.try_compress_value() {
            debug!(
                key_len = key.len(),
                raw = value.len(),
                stored = record.header().value_size,
                "Compressed value"
            );
        }

        let mut writer = self.writer.lock();
        let offset = self.append(&mut writer, &record)?;
        self.index.put(key, IndexEntry::new(record.header(), offset));

        Ok(())
    }

    /// Get the value stored under `key`
    ///
    /// An index miss is a definitive `KeyNotFound` with no disk access.
    /// A hit reads only the value and trailer, verifies the checksum and
    /// decompresses if needed.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        validate_key(key)?;

        let entry = self.index.get(key).ok_or(HashLogError::KeyNotFound)?;
        if entry.header.is_deleted() {
            return Err(HashLogError::KeyNotFound);
        }

        let mut record = Record::decode(
            entry.offset,
            Bytes::copy_from_slice(key),
            entry.header,
            &self.file,
        )?;
        record.decompress_value()?;

        Ok(record.into_value())
    }

    /// Remove a key
    ///
    /// Missing keys are a silent no-op. Otherwise a tombstone is appended
    /// so a replay of the log also forgets the key, then the index entry
    /// is evicted.
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        validate_key(key)?;

        let mut writer = self.writer.lock();
        if !self.index.contains_key(key) {
            return Ok(());
        }

        let record = Record::tombstone(Bytes::copy_from_slice(key));
        self.append(&mut writer, &record)?;
        self.index.remove(key);

        Ok(())
    }

    /// Location of the backing data file
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Whether `key` currently has a live value
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Flush file contents to stable storage
    pub fn sync(&self) -> Result<()> {
        let _writer = self.writer.lock();
        self.file.sync_data()?;
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Syncs the data file before dropping it
    pub fn close(self) -> Result<()> {
        self.sync()?;
        info!(path = %self.config.path.display(), "Engine closed");
        Ok(())
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Encode + pad `record` into the write buffer and append it at the
    /// logical size. Returns the offset the record was written at.
    ///
    /// On failure the file is truncated back to the pre-append size and the
    /// original error is returned; the logical size does not move.
    fn append(&self, writer: &mut Writer, record: &Record) -> Result<u64> {
        let offset = writer.size;

        writer.buffer.clear();
        record.encode(&mut writer.buffer);
        pad_to_block(&mut writer.buffer);

        if let Err(e) = self.write_block(&writer.buffer, offset) {
            warn!(offset, error = %e, "Append failed, truncating log to last good size");
            if let Err(truncate_err) = self.file.set_len(offset) {
                warn!(offset, error = %truncate_err, "Truncate after failed append also failed");
            }
            return Err(e.into());
        }

        writer.size += writer.buffer.len() as u64;
        Ok(offset)
    }

    /// One contiguous write of a padded record, synced if configured
    fn write_block(&self, block: &[u8], offset: u64) -> std::io::Result<()> {
        self.file.write_all_at(block, offset)?;
        if self.config.sync_strategy == SyncStrategy::EveryWrite {
            self.file.sync_data()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Logical size of the data file (offset of the next append)
    pub fn logical_size(&self) -> u64 {
        self.writer.lock().size
    }

    /// Approximate bytes used by the in-memory index
    pub fn index_memory_usage(&self) -> usize {
        self.index.memory_usage()
    }

    /// Snapshot of the engine counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            keys: self.index.len(),
            index_memory_usage: self.index.memory_usage(),
            logical_size: self.logical_size(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying log file
    pub fn file(&self) -> &F {
        &self.file
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_SIZE {
        return Err(HashLogError::BadKeySize(key.len()));
    }
    Ok(())
}
