//! Arena entry for the block cache (spec §3, §9).
//!
//! Nodes are owned exclusively by the cache's hash map; the parent link is a
//! non-owning back-reference (a hash, not a pointer), avoiding the
//! owning-parent/owning-child cycle the spec's design notes call out.

use smallvec::SmallVec;

use crate::block::Block;
use crate::crypto::Hash;

/// A pending block plus the bookkeeping the cache needs around it.
pub struct BlockCacheNode {
    pub block: Block,
    /// Non-owning back-reference to the parent (the confirmed root itself if
    /// this node's parent is not in the unconfirmed tree).
    pub parent_hash: Hash,
    /// Owned forward references to children.
    pub children: SmallVec<[Hash; 4]>,
    /// Chain length measured from the confirmed root (root itself is 0).
    pub cumulative_length: u64,
}

impl BlockCacheNode {
    #[must_use]
    pub fn new(block: Block, parent_hash: Hash, cumulative_length: u64) -> Self {
        Self {
            block,
            parent_hash,
            children: SmallVec::new(),
            cumulative_length,
        }
    }
}
