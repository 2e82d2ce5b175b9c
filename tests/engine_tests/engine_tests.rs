//! Tests for Engine
//!
//! These tests verify:
//! - Basic put/get/remove operations
//! - Size validation
//! - Block-aligned appends and tombstones
//! - Compression on the write path
//! - Checksum verification on the read path
//! - Rollback of failed appends

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use hashlog::record::{HEADER_SIZE, MAX_KEY_SIZE, MAX_VALUE_SIZE, PADDING_SIZE, TRAILER_SIZE};
use hashlog::storage::{open_log_file, LogFile, ReadAt};
use hashlog::{Compression, Config, Engine, HashLogError, SyncStrategy};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(dir: &TempDir) -> Config {
    Config::builder()
        .path(dir.path().join("test.data"))
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(test_config(&temp_dir)).unwrap();
    (temp_dir, engine)
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

/// XOR one byte of the data file in place, through a separate handle
fn flip_byte(path: &Path, offset: u64) {
    let file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let mut byte = [0u8; 1];
    file.read_exact_at(&mut byte, offset).unwrap();
    byte[0] ^= 0xFF;
    file.write_all_at(&byte, offset).unwrap();
}

/// Log file that can be told to fail its next write halfway through
struct FlakyFile {
    inner: File,
    fail_next_write: AtomicBool,
}

impl FlakyFile {
    fn open(path: &Path) -> Self {
        Self {
            inner: open_log_file(path).unwrap(),
            fail_next_write: AtomicBool::new(false),
        }
    }

    fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }
}

impl ReadAt for FlakyFile {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.inner.read_exact_at(buf, offset)
    }
}

impl LogFile for FlakyFile {
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            // Leave a partially written record behind
            self.inner.write_all_at(&buf[..buf.len() / 2], offset)?;
            return Err(io::Error::other("injected write failure"));
        }
        self.inner.write_all_at(buf, offset)
    }

    fn set_len(&self, size: u64) -> io::Result<()> {
        LogFile::set_len(&self.inner, size)
    }

    fn sync_data(&self) -> io::Result<()> {
        LogFile::sync_data(&self.inner)
    }

    fn file_size(&self) -> io::Result<u64> {
        self.inner.file_size()
    }
}

fn setup_flaky_engine() -> (TempDir, Engine<FlakyFile>) {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let file = FlakyFile::open(&config.path);
    let engine = Engine::with_file(config, file).unwrap();
    (temp_dir, engine)
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("db.data");

    let engine = Engine::open(Config::builder().path(&path).build()).unwrap();

    assert!(path.exists());
    assert_eq!(engine.path(), path.as_path());
    assert_eq!(engine.logical_size(), 0);
    assert!(engine.is_empty());
}

#[test]
fn test_engine_open_rejects_empty_path() {
    let result = Engine::open(Config::builder().path("").build());
    assert!(matches!(result, Err(HashLogError::Config(_))));
}

#[test]
fn test_engine_put_get() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"hello", b"world").unwrap();

    assert_eq!(engine.get(b"hello").unwrap(), b"world".to_vec());
}

#[test]
fn test_engine_get_nonexistent_key() {
    let (_temp, engine) = setup_temp_engine();

    let err = engine.get(b"nonexistent").unwrap_err();

    assert!(err.is_not_found());
}

#[test]
fn test_engine_put_empty_value() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"empty", b"").unwrap();

    assert_eq!(engine.get(b"empty").unwrap(), Vec::<u8>::new());
    assert!(engine.contains_key(b"empty"));
}

#[test]
fn test_engine_put_overwrite() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value1").unwrap();
    engine.put(b"key", b"value2").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), b"value2".to_vec());
    assert_eq!(engine.len(), 1);
}

#[test]
fn test_engine_remove() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value").unwrap();
    engine.remove(b"key").unwrap();

    assert!(engine.get(b"key").unwrap_err().is_not_found());
    assert!(!engine.contains_key(b"key"));

    // Second remove is a no-op
    engine.remove(b"key").unwrap();
}

#[test]
fn test_engine_remove_nonexistent_key() {
    let (_temp, engine) = setup_temp_engine();

    engine.remove(b"nonexistent").unwrap();

    assert_eq!(engine.logical_size(), 0);
}

#[test]
fn test_engine_multiple_keys() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key1", b"value1").unwrap();
    engine.put(b"key2", b"value2").unwrap();
    engine.put(b"key3", b"value3").unwrap();

    assert_eq!(engine.get(b"key1").unwrap(), b"value1".to_vec());
    assert_eq!(engine.get(b"key2").unwrap(), b"value2".to_vec());
    assert_eq!(engine.get(b"key3").unwrap(), b"value3".to_vec());
    assert_eq!(engine.len(), 3);
}

#[test]
fn test_engine_binary_keys_and_values() {
    let (_temp, engine) = setup_temp_engine();
    let key = [0u8, 1, 2, 255];
    let value: Vec<u8> = (0..=255u8).collect();

    engine.put(&key, &value).unwrap();

    assert_eq!(engine.get(&key).unwrap(), value);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_put_rejects_bad_key_sizes() {
    let (_temp, engine) = setup_temp_engine();
    let long_key = vec![b'k'; MAX_KEY_SIZE + 1];

    assert!(matches!(engine.put(b"", b"v"), Err(HashLogError::BadKeySize(0))));
    assert!(matches!(
        engine.put(&long_key, b"v"),
        Err(HashLogError::BadKeySize(1025))
    ));

    assert_eq!(engine.logical_size(), 0);
    assert!(engine.is_empty());
}

#[test]
fn test_put_accepts_max_key_size() {
    let (_temp, engine) = setup_temp_engine();
    let key = vec![b'k'; MAX_KEY_SIZE];

    engine.put(&key, b"v").unwrap();

    assert_eq!(engine.get(&key).unwrap(), b"v".to_vec());
}

#[test]
fn test_put_rejects_oversized_value() {
    let (_temp, engine) = setup_temp_engine();
    let value = vec![0u8; MAX_VALUE_SIZE + 1];

    let err = engine.put(b"key", &value).unwrap_err();

    assert!(matches!(err, HashLogError::BadValueSize(n) if n == MAX_VALUE_SIZE + 1));
    assert_eq!(engine.logical_size(), 0);
}

#[test]
fn test_put_accepts_max_value_size() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("test.data"))
        .compression(Compression::None)
        .build();
    let engine = Engine::open(config).unwrap();
    let value = vec![0x5Au8; MAX_VALUE_SIZE];

    engine.put(b"max", &value).unwrap();

    assert_eq!(engine.get(b"max").unwrap(), value);
}

#[test]
fn test_get_and_remove_reject_bad_key_sizes() {
    let (_temp, engine) = setup_temp_engine();
    let long_key = vec![b'k'; MAX_KEY_SIZE + 1];

    assert!(matches!(engine.get(b""), Err(HashLogError::BadKeySize(0))));
    assert!(matches!(engine.get(&long_key), Err(HashLogError::BadKeySize(_))));
    assert!(matches!(engine.remove(b""), Err(HashLogError::BadKeySize(0))));
    assert!(matches!(engine.remove(&long_key), Err(HashLogError::BadKeySize(_))));
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_appends_are_block_aligned() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"a", b"small").unwrap();
    assert_eq!(engine.logical_size(), PADDING_SIZE as u64);

    // 8 + 1 + 300 + 4 = 313 bytes -> two blocks
    let temp = TempDir::new().unwrap();
    let engine2 = Engine::open(
        Config::builder()
            .path(temp.path().join("b.data"))
            .compression(Compression::None)
            .build(),
    )
    .unwrap();
    engine2.put(b"b", &[1u8; 300]).unwrap();
    assert_eq!(engine2.logical_size(), 2 * PADDING_SIZE as u64);
    assert_eq!(file_len(engine2.path()), engine2.logical_size());
}

#[test]
fn test_remove_appends_tombstone() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value").unwrap();
    let before = engine.logical_size();
    engine.remove(b"key").unwrap();

    assert_eq!(engine.logical_size(), before + PADDING_SIZE as u64);
    assert_eq!(file_len(engine.path()), engine.logical_size());
}

#[test]
fn test_index_memory_usage() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"abc", b"1").unwrap();
    let usage = engine.index_memory_usage();
    assert!(usage >= 3);

    engine.put(b"abc", b"2").unwrap();
    assert_eq!(engine.index_memory_usage(), usage);

    engine.remove(b"abc").unwrap();
    assert_eq!(engine.index_memory_usage(), 0);
}

#[test]
fn test_stats() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"k1", b"v1").unwrap();
    engine.put(b"k2", b"v2").unwrap();
    let stats = engine.stats();

    assert_eq!(stats.keys, 2);
    assert_eq!(stats.logical_size, 2 * PADDING_SIZE as u64);
    assert_eq!(stats.index_memory_usage, engine.index_memory_usage());
}

// =============================================================================
// Compression Tests
// =============================================================================

#[test]
fn test_large_value_is_compressed_on_write() {
    let (_temp, engine) = setup_temp_engine();
    let value = b"compressible ".repeat(10_000);

    engine.put(b"big", &value).unwrap();

    assert!(engine.logical_size() < value.len() as u64 / 2);
    assert_eq!(engine.get(b"big").unwrap(), value);
}

#[test]
fn test_compression_disabled_stores_verbatim() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("test.data"))
        .compression(Compression::None)
        .build();
    let engine = Engine::open(config).unwrap();
    let value = b"compressible ".repeat(10_000);

    engine.put(b"big", &value).unwrap();

    assert!(engine.logical_size() >= value.len() as u64);
    assert_eq!(engine.get(b"big").unwrap(), value);
}

// =============================================================================
// Checksum Tests
// =============================================================================

#[test]
fn test_get_detects_every_corrupted_value_byte() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"first", b"untouched").unwrap();
    engine.put(b"key", b"some value bytes").unwrap();

    let record_start = PADDING_SIZE as u64;
    let value_start = record_start + (HEADER_SIZE + 3) as u64;
    let value_end = value_start + 16 + TRAILER_SIZE as u64;

    for offset in value_start..value_end {
        flip_byte(engine.path(), offset);
        let err = engine.get(b"key").unwrap_err();
        assert!(
            matches!(err, HashLogError::BadChecksum { offset: o, .. } if o == record_start),
            "byte {} not detected: {:?}",
            offset,
            err
        );
        flip_byte(engine.path(), offset);
    }

    assert_eq!(engine.get(b"key").unwrap(), b"some value bytes".to_vec());
    assert_eq!(engine.get(b"first").unwrap(), b"untouched".to_vec());
}

#[test]
fn test_padding_corruption_is_ignored() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"key", b"value").unwrap();

    flip_byte(engine.path(), PADDING_SIZE as u64 - 1);

    assert_eq!(engine.get(b"key").unwrap(), b"value".to_vec());
}

// =============================================================================
// Failed Append Tests
// =============================================================================

#[test]
fn test_failed_put_truncates_and_skips_index() {
    let (_temp, engine) = setup_flaky_engine();
    engine.put(b"a", b"value-a").unwrap();
    let size_before = engine.logical_size();

    engine.file().fail_next_write();
    let err = engine.put(b"b", b"value-b").unwrap_err();

    assert!(matches!(err, HashLogError::Io(_)));
    assert_eq!(engine.logical_size(), size_before);
    assert_eq!(file_len(engine.path()), size_before);
    assert!(!engine.contains_key(b"b"));
    assert!(engine.get(b"b").unwrap_err().is_not_found());
    assert_eq!(engine.get(b"a").unwrap(), b"value-a".to_vec());

    // The engine keeps working afterwards
    engine.put(b"b", b"value-b").unwrap();
    assert_eq!(engine.get(b"b").unwrap(), b"value-b".to_vec());
    assert_eq!(engine.logical_size(), size_before + PADDING_SIZE as u64);
}

#[test]
fn test_failed_overwrite_keeps_previous_value() {
    let (_temp, engine) = setup_flaky_engine();
    engine.put(b"a", b"old").unwrap();

    engine.file().fail_next_write();
    assert!(engine.put(b"a", b"new").is_err());

    assert_eq!(engine.get(b"a").unwrap(), b"old".to_vec());
}

#[test]
fn test_failed_remove_keeps_key() {
    let (_temp, engine) = setup_flaky_engine();
    engine.put(b"a", b"value").unwrap();
    let size_before = engine.logical_size();

    engine.file().fail_next_write();
    assert!(engine.remove(b"a").is_err());

    assert_eq!(engine.logical_size(), size_before);
    assert_eq!(file_len(engine.path()), size_before);
    assert_eq!(engine.get(b"a").unwrap(), b"value".to_vec());
}

#[test]
fn test_failed_append_leaves_replayable_log() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    {
        let engine = Engine::with_file(config.clone(), FlakyFile::open(&config.path)).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.file().fail_next_write();
        assert!(engine.put(b"b", b"2").is_err());
    }

    let engine = Engine::open(config).unwrap();

    assert_eq!(engine.len(), 1);
    assert_eq!(engine.get(b"a").unwrap(), b"1".to_vec());
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_sync_every_write() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("test.data"))
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();
    let engine = Engine::open(config).unwrap();

    engine.put(b"key", b"value").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), b"value".to_vec());
}

#[test]
fn test_close_then_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);

    let engine = Engine::open(config.clone()).unwrap();
    engine.put(b"key", b"value").unwrap();
    engine.close().unwrap();

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.get(b"key").unwrap(), b"value".to_vec());
}
