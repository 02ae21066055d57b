//! Transaction source adapter (spec §4.G).
//!
//! Pull-based by design: the producer asks for at most `TX_PER_BLOCK` items
//! and tells the adapter which transactions to skip (those already present
//! on the ancestor chain of the block being built), rather than the
//! adapter pushing transactions at the core.

use std::collections::HashSet;

use crate::block::Transaction;
use crate::crypto::Hash;

/// External transaction pool surface. Implementations are expected to
/// exclude transactions already committed on the relevant chain; the core
/// only enforces per-block count and ordering, not dedup against history.
pub trait TxSource: Send + Sync + 'static {
    /// Returns up to `max_count` transactions, in the order they should be
    /// assembled into the block, skipping anything whose hash is in `exclude`.
    fn pending(&self, max_count: usize, exclude: &HashSet<Hash>) -> Vec<Transaction>;
}
