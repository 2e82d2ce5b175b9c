//! Record Module
//!
//! The on-disk unit of persistence: one key/value entry or one tombstone.
//!
//! ## Responsibilities
//! - Fixed big-endian header describing flags and payload sizes
//! - CRC32 (IEEE) trailer over header + key + value
//! - Optional LZ4 compression of large values
//! - Block padding helpers (the codec itself never pads)
//!
//! ## Record Format
//! ```text
//! ┌───────────┬───────────┬─────────────┬──────────┬────────────┬─────────┐
//! │ Flags (2) │ KSize (2) │  VSize (4)  │   Key    │   Value    │ CRC (4) │
//! └───────────┴───────────┴─────────────┴──────────┴────────────┴─────────┘
//! │◄──────────── header (8) ───────────►│                       │◄trailer►│
//!
//! followed by zero padding up to the next 256-byte boundary
//! ```

mod entry;
mod header;

pub use entry::Record;
pub use header::Header;

// =============================================================================
// Format Constants
// =============================================================================

/// Header size: Flags (2) + KeySize (2) + ValueSize (4) = 8 bytes
pub const HEADER_SIZE: usize = 8;

/// Trailer size: CRC32 (4) = 4 bytes
pub const TRAILER_SIZE: usize = 4;

/// Every appended record is zero-padded to a multiple of this many bytes
pub const PADDING_SIZE: usize = 256;

pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Largest accepted key
pub const MAX_KEY_SIZE: usize = KB;

/// Largest accepted value (before compression)
pub const MAX_VALUE_SIZE: usize = 8 * MB;

// =============================================================================
// Flag Bits
// =============================================================================

/// Plain key/value record (no flag bits set)
pub const FLAG_VALUE: u16 = 0x00;

/// Deletion marker
pub const FLAG_DELETED: u16 = 0x01;

/// Value bytes are LZ4-compressed
pub const FLAG_COMPRESSED: u16 = 0x02;

/// All flag bits this format knows about
pub(crate) const KNOWN_FLAGS: u16 = FLAG_DELETED | FLAG_COMPRESSED;

/// Compressed value must be at most this fraction of the original to be kept
pub const COMPRESS_RATIO_LIMIT: f64 = 0.70;

// =============================================================================
// Padding Helpers
// =============================================================================

/// Round `len` up to the next padding block boundary
#[inline]
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(PADDING_SIZE) * PADDING_SIZE
}

/// Zero-fill `buf` up to the next padding block boundary
pub fn pad_to_block(buf: &mut bytes::BytesMut) {
    let padded = padded_len(buf.len());
    buf.resize(padded, 0);
}
