//! Record header
//!
//! Fixed 8-byte, big-endian prefix of every record.

use std::io;

use crate::storage::ReadAt;

use super::{
    padded_len, FLAG_COMPRESSED, FLAG_DELETED, HEADER_SIZE, KNOWN_FLAGS, MAX_KEY_SIZE,
    MAX_VALUE_SIZE, TRAILER_SIZE,
};

/// Flags and payload sizes of a record
///
/// Cached verbatim in the index so lookups never re-read it from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub flags: u16,
    pub key_size: u16,
    pub value_size: u32,
}

impl Header {
    /// Serialize to the on-disk byte layout
    #[inline]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.flags.to_be_bytes());
        buf[2..4].copy_from_slice(&self.key_size.to_be_bytes());
        buf[4..8].copy_from_slice(&self.value_size.to_be_bytes());
        buf
    }

    /// Parse the on-disk byte layout (no validation)
    #[inline]
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            flags: u16::from_be_bytes([buf[0], buf[1]]),
            key_size: u16::from_be_bytes([buf[2], buf[3]]),
            value_size: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    /// Read and parse the header stored at `offset`
    pub fn read_at<R: ReadAt + ?Sized>(offset: u64, reader: &R) -> io::Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact_at(&mut buf, offset)?;
        Ok(Self::decode(&buf))
    }

    pub fn is_deleted(&self) -> bool {
        self.flags & FLAG_DELETED != 0
    }

    pub fn is_value_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Unpadded on-disk size: header + key + value + trailer
    #[inline]
    pub fn record_len(&self) -> usize {
        HEADER_SIZE + self.key_size as usize + self.value_size as usize + TRAILER_SIZE
    }

    /// On-disk footprint including block padding
    #[inline]
    pub fn padded_len(&self) -> usize {
        padded_len(self.record_len())
    }

    /// Structural sanity check for headers read back from disk.
    ///
    /// Compressed values are never larger than 70% of the original, so the
    /// uncompressed limit bounds every stored value size.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.flags & !KNOWN_FLAGS != 0 {
            return Err("unknown flag bits");
        }
        if self.key_size == 0 || self.key_size as usize > MAX_KEY_SIZE {
            return Err("key size out of range");
        }
        if self.value_size as usize > MAX_VALUE_SIZE {
            return Err("value size out of range");
        }
        if self.is_deleted() && (self.value_size != 0 || self.is_value_compressed()) {
            return Err("tombstone carries a value");
        }
        Ok(())
    }
}
