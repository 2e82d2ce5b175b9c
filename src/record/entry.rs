//! Record encoding and decoding
//!
//! A `Record` lives for exactly one encode or one decode and is then dropped.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{HashLogError, Result};
use crate::storage::ReadAt;

use super::{
    Header, COMPRESS_RATIO_LIMIT, FLAG_COMPRESSED, FLAG_DELETED, FLAG_VALUE, HEADER_SIZE,
    MAX_VALUE_SIZE, PADDING_SIZE, TRAILER_SIZE,
};

/// One key/value entry or tombstone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    header: Header,
    key: Bytes,
    value: Vec<u8>,
}

impl Record {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Build a value record. Sizes must already be bounds-checked.
    pub fn new(key: Bytes, value: Vec<u8>) -> Self {
        Self::with_flags(key, value, FLAG_VALUE)
    }

    /// Build a deletion marker for `key`
    pub fn tombstone(key: Bytes) -> Self {
        Self::with_flags(key, Vec::new(), FLAG_DELETED)
    }

    fn with_flags(key: Bytes, value: Vec<u8>, flags: u16) -> Self {
        if flags & FLAG_DELETED != 0 {
            assert!(value.is_empty(), "tombstone record must not carry a value");
        }
        debug_assert!(key.len() <= u16::MAX as usize);
        debug_assert!(value.len() <= u32::MAX as usize);

        let header = Header {
            flags,
            key_size: key.len() as u16,
            value_size: value.len() as u32,
        };
        Self { header, key, value }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn is_deleted(&self) -> bool {
        self.header.is_deleted()
    }

    pub fn is_value_compressed(&self) -> bool {
        self.header.is_value_compressed()
    }

    /// Unpadded on-disk size of this record
    pub fn encoded_len(&self) -> usize {
        self.header.record_len()
    }

    // =========================================================================
    // Compression
    // =========================================================================

    /// Replace the value with its LZ4 encoding if that pays off.
    ///
    /// Only records spanning more than one padding block are considered, and
    /// the compressed form must be at most 70% of the original value.
    /// Returns whether the value was replaced.
    pub fn try_compress_value(&mut self) -> bool {
        assert!(
            !self.is_value_compressed(),
            "record value is already compressed"
        );
        if self.is_deleted() || self.encoded_len() <= PADDING_SIZE {
            return false;
        }

        let compressed = lz4_flex::compress_prepend_size(&self.value);
        let limit = (self.value.len() as f64 * COMPRESS_RATIO_LIMIT) as usize;
        if compressed.len() > limit {
            return false;
        }

        self.header.value_size = compressed.len() as u32;
        self.header.flags |= FLAG_COMPRESSED;
        self.value = compressed;
        true
    }

    /// Restore the original value. No-op when the value is not compressed.
    pub fn decompress_value(&mut self) -> Result<()> {
        if !self.is_value_compressed() {
            return Ok(());
        }

        // The size prefix decides the output allocation, so bound it first
        let prefix: [u8; 4] = self
            .value
            .get(..4)
            .and_then(|p| p.try_into().ok())
            .ok_or_else(|| HashLogError::Compression("missing size prefix".to_string()))?;
        let size = u32::from_le_bytes(prefix) as usize;
        if size > MAX_VALUE_SIZE {
            return Err(HashLogError::Compression(format!(
                "decompressed value of {} bytes exceeds limit",
                size
            )));
        }

        let value = lz4_flex::decompress_size_prepended(&self.value)
            .map_err(|e| HashLogError::Compression(e.to_string()))?;

        self.header.value_size = value.len() as u32;
        self.header.flags &= !FLAG_COMPRESSED;
        self.value = value;
        Ok(())
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// CRC32 over header + key + value (never the trailer)
    pub fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.header.encode());
        hasher.update(&self.key);
        hasher.update(&self.value);
        hasher.finalize()
    }

    /// Append header, key, value and trailer to `buf`. Callers pad.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());

        let mut hasher = crc32fast::Hasher::new();
        let header = self.header.encode();

        buf.put_slice(&header);
        hasher.update(&header);
        buf.put_slice(&self.key);
        hasher.update(&self.key);
        buf.put_slice(&self.value);
        hasher.update(&self.value);

        buf.put_u32(hasher.finalize());
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Lookup-path decode: header and key come from the index, only the value
    /// and trailer are read from `offset + HEADER_SIZE + key_size`.
    pub fn decode<R: ReadAt + ?Sized>(
        offset: u64,
        key: Bytes,
        header: Header,
        reader: &R,
    ) -> Result<Self> {
        debug_assert_eq!(key.len(), header.key_size as usize);

        let value_size = header.value_size as usize;
        let mut buf = vec![0u8; value_size + TRAILER_SIZE];
        reader.read_exact_at(&mut buf, offset + (HEADER_SIZE + key.len()) as u64)?;

        let stored = trailer_sum(&buf[value_size..]);
        buf.truncate(value_size);

        let record = Self {
            header,
            key,
            value: buf,
        };
        record.verify(offset, stored)?;
        Ok(record)
    }

    /// Scan-path decode: reads key, value and trailer following an
    /// already-parsed `header` at `offset`.
    pub fn read_at<R: ReadAt + ?Sized>(offset: u64, header: Header, reader: &R) -> Result<Self> {
        let key_size = header.key_size as usize;
        let value_size = header.value_size as usize;

        let mut buf = vec![0u8; key_size + value_size + TRAILER_SIZE];
        reader.read_exact_at(&mut buf, offset + HEADER_SIZE as u64)?;

        let stored = trailer_sum(&buf[key_size + value_size..]);
        buf.truncate(key_size + value_size);
        let value = buf.split_off(key_size);

        let record = Self {
            header,
            key: Bytes::from(buf),
            value,
        };
        record.verify(offset, stored)?;
        Ok(record)
    }

    fn verify(&self, offset: u64, stored: u32) -> Result<()> {
        let actual = self.checksum();
        if actual != stored {
            return Err(HashLogError::BadChecksum {
                offset,
                expected: stored,
                actual,
            });
        }
        Ok(())
    }
}

#[inline]
fn trailer_sum(trailer: &[u8]) -> u32 {
    u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]])
}
