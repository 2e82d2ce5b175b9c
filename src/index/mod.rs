//! Index Module
//!
//! In-memory primary index: key → location of its latest record.
//!
//! ## Responsibilities
//! - Exact byte-equality key lookups (no ordering, no normalization)
//! - Many concurrent readers, exclusive mutators
//! - Approximate memory accounting for the embedding process
//!
//! ## Data Structure Choice
//! `HashMap<Bytes, IndexEntry>` behind a `parking_lot::RwLock`. Entries are
//! `Copy`, so readers get a whole value out and never observe a half-installed
//! entry.

mod table;

pub use table::IndexTable;

use crate::record::Header;

/// Cached header plus the file offset of the record's header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub header: Header,
    pub offset: u64,
}

impl IndexEntry {
    pub fn new(header: Header, offset: u64) -> Self {
        Self { header, offset }
    }
}

/// Bytes charged per entry on top of the key length
pub const INDEX_ENTRY_SIZE: usize = std::mem::size_of::<IndexEntry>();
