//! Persistence contract (externalized, spec §6).
//!
//! The storage engine itself — the teacher embeds RocksDB — is out of scope
//! (spec §1's Non-goals). This trait is the seam: the core calls `append`
//! once per confirmation, in strict order, and `load_last` exactly once at
//! startup to seed its confirmed root.

use thiserror::Error;

use crate::block::Block;

#[derive(Clone, Debug, Error)]
#[error("block storage error: {0}")]
pub struct StorageError(pub String);

pub trait BlockStorage: Send + Sync + 'static {
    /// Appends a newly confirmed block. Called with strictly increasing
    /// `block.number` across calls; never called twice for the same block.
    fn append(&self, block: &Block) -> Result<(), StorageError>;

    /// Returns the last persisted block, or `None` for a fresh chain (in
    /// which case the core starts from the genesis block its caller supplies).
    fn load_last(&self) -> Result<Option<Block>, StorageError>;
}
