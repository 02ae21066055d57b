//! The block data model (spec §3).
//!
//! A [`Block`] is immutable once constructed; `block_hash` is always a pure
//! function of its header fields and can be recomputed by any holder.

use serde::{Deserialize, Serialize};

use crate::crypto::{self, Hash, PublicKey, Signature};

/// Height of a block; `genesis.number == 0`.
pub type BlockNumber = u64;

/// A slot index, see [`crate::clock`].
pub type Slot = u64;

/// A witness (block-producing validator) identifier.
pub type WitnessId = u32;

/// An opaque, already-serialized transaction.
///
/// Execution semantics belong to the VM, which is out of scope for this
/// crate; the consensus core only needs to hash and order transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction(pub Vec<u8>);

impl Transaction {
    #[must_use]
    pub fn hash(&self) -> Hash {
        crypto::hash(&self.0)
    }
}

/// An immutable block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub version: u32,
    pub parent_hash: Hash,
    pub tree_hash: Hash,
    pub block_hash: Hash,
    /// Opaque consensus-level payload (e.g. future vote tallies). Passed
    /// through unmodified; see spec §9 on the ambiguity of this field.
    pub info: Vec<u8>,
    pub number: BlockNumber,
    pub witness: WitnessId,
    pub time: Slot,
    pub signature: Signature,
    pub content: Vec<Transaction>,
}

impl Block {
    /// Builds the canonical `HeaderInfo` pre-image used for both hashing and
    /// signing (spec §3, bit-exact and normative):
    /// `time(8B BE) ++ version(4B BE) ++ number(4B BE) ++ parent_hash ++ tree_hash ++ info`.
    #[must_use]
    pub fn header_info(
        time: Slot,
        version: u32,
        number: BlockNumber,
        parent_hash: &Hash,
        tree_hash: &Hash,
        info: &[u8],
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 4 + 4 + 32 + 32 + info.len());
        buf.extend_from_slice(&time.to_be_bytes());
        buf.extend_from_slice(&(version as u32).to_be_bytes());
        buf.extend_from_slice(&(number as u32).to_be_bytes());
        buf.extend_from_slice(parent_hash);
        buf.extend_from_slice(tree_hash);
        buf.extend_from_slice(info);
        buf
    }

    /// Assembles, signs, and hashes a new block on top of `parent`.
    ///
    /// This is the single construction path used by both the producer (for
    /// self-produced blocks) and tests; wire-decoded blocks are built via
    /// [`Block::decode`] instead since their signature already exists.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn produce(
        parent_number: BlockNumber,
        parent_hash: Hash,
        time: Slot,
        witness: WitnessId,
        info: Vec<u8>,
        content: Vec<Transaction>,
        secret_key: &crate::crypto::SecretKey,
    ) -> Self {
        let version = 0;
        let number = parent_number + 1;
        let tree_hash = merkle_root(&content);
        let preimage = Self::header_info(time, version, number, &parent_hash, &tree_hash, &info);
        let signature = secret_key.sign(&preimage);
        let block_hash = crypto::hash(&preimage);
        Self {
            version,
            parent_hash,
            tree_hash,
            block_hash,
            info,
            number,
            witness,
            time,
            signature,
            content,
        }
    }

    /// Recomputes `block_hash` from the header fields, ignoring the stored value.
    #[must_use]
    pub fn recompute_hash(&self) -> Hash {
        let preimage = Self::header_info(
            self.time,
            self.version,
            self.number,
            &self.parent_hash,
            &self.tree_hash,
            &self.info,
        );
        crypto::hash(&preimage)
    }

    /// Verifies the block's signature under `pubkey`, over its own header-info.
    #[must_use]
    pub fn signature_valid(&self, pubkey: &PublicKey) -> bool {
        let preimage = Self::header_info(
            self.time,
            self.version,
            self.number,
            &self.parent_hash,
            &self.tree_hash,
            &self.info,
        );
        pubkey.verify(&self.signature, &preimage)
    }

    /// Wire encoding (spec §6): `header_info ++ len-prefixed signature ++ len-prefixed content`.
    #[must_use]
    pub fn encode(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map(|(b, _)| b)
    }
}

/// A minimal Merkle root over a transaction list: a binary tree of SHA-256
/// digests, duplicating the last node on odd levels. Empty content hashes
/// to the zero hash.
#[must_use]
pub fn merkle_root(txs: &[Transaction]) -> Hash {
    if txs.is_empty() {
        return crypto::zero_hash();
    }
    let mut layer: Vec<Hash> = txs.iter().map(Transaction::hash).collect();
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        for pair in layer.chunks(2) {
            let mut buf = Vec::with_capacity(64);
            buf.extend_from_slice(&pair[0]);
            buf.extend_from_slice(pair.get(1).unwrap_or(&pair[0]));
            next.push(crypto::hash(&buf));
        }
        layer = next;
    }
    layer[0]
}
