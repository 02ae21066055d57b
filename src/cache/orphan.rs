//! Orphan/pending pool (spec §4.J).
//!
//! A block whose parent is not yet known is buffered here, keyed by the
//! parent hash it is waiting for. Entries expire after `ORPHAN_TTL` slots to
//! bound memory; [`OrphanPool`] is part of the cache and shares its lock.

use std::collections::HashMap;

use crate::block::{Block, Slot};
use crate::crypto::Hash;

struct Entry {
    block: Block,
    buffered_at: Slot,
}

/// Maps `parent_hash -> blocks waiting for that parent`.
#[derive(Default)]
pub struct OrphanPool {
    by_parent: HashMap<Hash, Vec<Entry>>,
}

impl OrphanPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `block`, which is waiting for a parent not currently in the cache.
    pub fn buffer(&mut self, block: Block, now_slot: Slot) {
        self.by_parent
            .entry(block.parent_hash)
            .or_default()
            .push(Entry {
                block,
                buffered_at: now_slot,
            });
    }

    /// Drains (FIFO) all blocks waiting on `parent_hash`, e.g. because that
    /// parent was just admitted.
    pub fn drain_children_of(&mut self, parent_hash: &Hash) -> Vec<Block> {
        self.by_parent
            .remove(parent_hash)
            .map(|entries| entries.into_iter().map(|e| e.block).collect())
            .unwrap_or_default()
    }

    /// Removes entries buffered more than `ttl` slots ago. Returns the count
    /// removed, for metrics.
    pub fn reap_expired(&mut self, now_slot: Slot, ttl: Slot) -> usize {
        let mut removed = 0;
        self.by_parent.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| now_slot.saturating_sub(e.buffered_at) <= ttl);
            removed += before - entries.len();
            !entries.is_empty()
        });
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_parent.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
