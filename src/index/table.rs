//! IndexTable implementation
//!
//! HashMap-based index with RwLock for concurrency.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use super::{IndexEntry, INDEX_ENTRY_SIZE};

/// Concurrent key → IndexEntry mapping
///
/// ## Concurrency:
/// - `get`, `len`, `memory_usage`: shared read lock
/// - `put`, `remove`, `clear`: exclusive write lock
/// - Each call holds its lock for its whole duration
pub struct IndexTable {
    inner: RwLock<Inner>,
}

struct Inner {
    table: HashMap<Bytes, IndexEntry>,
    /// Sum of `key.len() + INDEX_ENTRY_SIZE` over all entries
    usage: usize,
}

impl IndexTable {
    /// Create a new empty IndexTable
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create an empty IndexTable with room for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                table: HashMap::with_capacity(capacity),
                usage: 0,
            }),
        }
    }

    /// Install `entry` for `key`, returning the entry it replaced
    pub fn put(&self, key: Bytes, entry: IndexEntry) -> Option<IndexEntry> {
        debug_assert!(!key.is_empty(), "index key must not be empty");

        let charge = key.len() + INDEX_ENTRY_SIZE;
        let mut inner = self.inner.write();

        let previous = inner.table.insert(key, entry);
        if previous.is_none() {
            inner.usage += charge;
        }
        previous
    }

    /// Look up the entry for `key`
    pub fn get(&self, key: &[u8]) -> Option<IndexEntry> {
        self.inner.read().table.get(key).copied()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.inner.read().table.contains_key(key)
    }

    /// Delete the entry for `key`. Absent keys are a no-op.
    pub fn remove(&self, key: &[u8]) -> Option<IndexEntry> {
        let mut inner = self.inner.write();

        let removed = inner.table.remove(key);
        if removed.is_some() {
            inner.usage -= key.len() + INDEX_ENTRY_SIZE;
        }
        removed
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.inner.read().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().table.is_empty()
    }

    /// Approximate resident bytes of keys plus entries
    pub fn memory_usage(&self) -> usize {
        self.inner.read().usage
    }

    /// Drop every entry and reset the usage counter
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.table.clear();
        inner.usage = 0;
    }
}

impl Default for IndexTable {
    fn default() -> Self {
        Self::new()
    }
}
