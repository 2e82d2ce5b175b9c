//! Log Recovery
//!
//! Rebuilds the index on startup by replaying the log from offset 0.

use std::fs::File;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::RecoveryMode;
use crate::error::{HashLogError, Result};
use crate::index::{IndexEntry, IndexTable};
use crate::record::{Header, Record, HEADER_SIZE, PADDING_SIZE};

use super::{LogFile, ReadAt};

/// Chunk size used when checking whether a tail region is all zeroes
const ZERO_SCAN_CHUNK: usize = 64 * 1024;

/// Handles index rebuild and torn-tail repair on open
pub struct LogRecovery;

/// Result of a recovery or verify pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of intact records replayed
    pub records_scanned: u64,

    /// Number of value records among them
    pub values: u64,

    /// Number of tombstones among them
    pub tombstones: u64,

    /// Offset just past the last intact record (the engine's logical size)
    pub valid_size: u64,

    /// Physical file size before any truncation
    pub file_size: u64,

    /// Offset of an incomplete trailing record, if one was found
    pub torn_at: Option<u64>,

    /// Whether the torn tail was cut off
    pub was_truncated: bool,
}

/// Why the scan stopped before end of file
struct TornTail {
    offset: u64,
    reason: &'static str,
}

impl LogRecovery {
    /// Replay `file` into `index` and repair a torn tail according to `mode`.
    ///
    /// This will:
    /// 1. Clear the index
    /// 2. Install value records and evict keys on tombstones, in log order
    /// 3. Truncate (or reject) an incomplete trailing record
    /// 4. Fail on corruption followed by further data
    pub fn recover<F: LogFile + ?Sized>(
        file: &F,
        index: &IndexTable,
        mode: RecoveryMode,
    ) -> Result<RecoveryResult> {
        index.clear();

        let file_size = file.file_size()?;
        let (mut result, torn) = Self::scan(file, file_size, |record, offset| {
            if record.is_deleted() {
                index.remove(record.key());
            } else {
                index.put(record.key().clone(), IndexEntry::new(record.header(), offset));
            }
        })?;

        if let Some(torn) = torn {
            match mode {
                RecoveryMode::TruncateTail => {
                    warn!(
                        offset = torn.offset,
                        reason = torn.reason,
                        discarded = file_size - torn.offset,
                        "Truncating torn tail of log"
                    );
                    file.set_len(torn.offset)?;
                    result.was_truncated = true;
                }
                RecoveryMode::Strict => {
                    return Err(HashLogError::Corruption(format!(
                        "torn record at offset {}: {}",
                        torn.offset, torn.reason
                    )));
                }
            }
        }

        info!(
            records = result.records_scanned,
            tombstones = result.tombstones,
            live_keys = index.len(),
            size = result.valid_size,
            "Log recovery complete"
        );

        Ok(result)
    }

    /// Verify integrity of a data file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let (result, _) = Self::scan(&file, file_size, |_, _| {})?;
        Ok(result)
    }

    /// Walk every record from offset 0, handing intact ones to `visit`.
    fn scan<R, V>(
        reader: &R,
        file_size: u64,
        mut visit: V,
    ) -> Result<(RecoveryResult, Option<TornTail>)>
    where
        R: ReadAt + ?Sized,
        V: FnMut(&Record, u64),
    {
        let mut result = RecoveryResult {
            file_size,
            ..Default::default()
        };
        let mut offset = 0u64;
        let mut torn = None;

        while offset < file_size {
            let remaining = file_size - offset;

            if remaining < HEADER_SIZE as u64 {
                torn = Some(TornTail {
                    offset,
                    reason: "partial header",
                });
                break;
            }

            let header = Header::read_at(offset, reader)?;
            if let Err(reason) = header.validate() {
                if Self::is_zero_filled(reader, offset, file_size)? {
                    torn = Some(TornTail { offset, reason });
                    break;
                }
                return Err(HashLogError::Corruption(format!(
                    "invalid record header at offset {}: {}",
                    offset, reason
                )));
            }

            let footprint = header.padded_len() as u64;
            if footprint > remaining {
                if let Some(next) = Self::next_intact_record(reader, offset, file_size)? {
                    return Err(HashLogError::Corruption(format!(
                        "record at offset {} overruns intact record at offset {}",
                        offset, next
                    )));
                }
                torn = Some(TornTail {
                    offset,
                    reason: "record extends past end of file",
                });
                break;
            }

            let record = match Record::read_at(offset, header, reader) {
                Ok(record) => record,
                Err(e @ HashLogError::BadChecksum { .. }) if offset + footprint == file_size => {
                    if Self::next_intact_record(reader, offset, file_size)?.is_some() {
                        return Err(e);
                    }
                    torn = Some(TornTail {
                        offset,
                        reason: "checksum mismatch in final record",
                    });
                    break;
                }
                Err(e) => return Err(e),
            };

            visit(&record, offset);

            result.records_scanned += 1;
            if record.is_deleted() {
                result.tombstones += 1;
            } else {
                result.values += 1;
            }
            offset += footprint;
        }

        result.valid_size = offset;
        result.torn_at = torn.as_ref().map(|t| t.offset);

        debug!(
            records = result.records_scanned,
            valid_size = result.valid_size,
            file_size,
            "Scanned log"
        );

        Ok((result, torn))
    }

    /// First block boundary after `offset` holding a fully intact record.
    ///
    /// A damaged header can claim a footprint that swallows the records after
    /// it; the tail is only torn when nothing intact follows.
    fn next_intact_record<R: ReadAt + ?Sized>(
        reader: &R,
        offset: u64,
        file_size: u64,
    ) -> Result<Option<u64>> {
        let mut pos = offset + PADDING_SIZE as u64;

        while pos + HEADER_SIZE as u64 <= file_size {
            let header = Header::read_at(pos, reader)?;
            if header.validate().is_ok() && header.padded_len() as u64 <= file_size - pos {
                match Record::read_at(pos, header, reader) {
                    Ok(_) => return Ok(Some(pos)),
                    Err(HashLogError::BadChecksum { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            pos += PADDING_SIZE as u64;
        }
        Ok(None)
    }

    /// True if every byte in `[offset, file_size)` is zero
    fn is_zero_filled<R: ReadAt + ?Sized>(reader: &R, offset: u64, file_size: u64) -> Result<bool> {
        let mut buf = vec![0u8; ZERO_SCAN_CHUNK];
        let mut pos = offset;

        while pos < file_size {
            let len = ZERO_SCAN_CHUNK.min((file_size - pos) as usize);
            let chunk = &mut buf[..len];
            reader.read_exact_at(chunk, pos)?;
            if chunk.iter().any(|&b| b != 0) {
                return Ok(false);
            }
            pos += len as u64;
        }
        Ok(true)
    }
}
