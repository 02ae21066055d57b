//! Cryptographic primitives used by the consensus core.
//!
//! Key management, address encoding, and transaction-level crypto belong to
//! the surrounding node; this module only provides the fixed-width digest
//! and the header-signing primitive the verifier and producer need.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed-width digest used for block and parent hashes.
pub type Hash = [u8; 32];

/// Returns the all-zero hash, used as the parent hash of a genesis block.
#[must_use]
pub const fn zero_hash() -> Hash {
    [0u8; 32]
}

/// Hashes an arbitrary byte string into a [`Hash`].
#[must_use]
pub fn hash(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Renders the first 8 hex characters of a hash, for compact log lines.
#[must_use]
pub fn short(h: &Hash) -> String {
    hex::encode(&h[..4])
}

/// A witness's secret key, used to sign blocks it produces.
#[derive(Clone)]
pub struct SecretKey(ed25519_consensus::SigningKey);

/// A witness's public key, used to verify blocks attributed to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "pubkey_bytes")] ed25519_consensus::VerificationKey);

/// A block header signature.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signature(#[serde(with = "sig_bytes")] ed25519_consensus::Signature);

impl SecretKey {
    /// Generates a new random secret key. Intended for tests and local setup;
    /// the surrounding node's key management owns real validator keys.
    #[must_use]
    pub fn generate<R: rand::RngCore + rand::CryptoRng>(rng: &mut R) -> Self {
        Self(ed25519_consensus::SigningKey::new(rng))
    }

    #[must_use]
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verification_key())
    }

    /// Signs a pre-image (the `HeaderInfo` encoding, see [`crate::block::header_info`]).
    #[must_use]
    pub fn sign(&self, preimage: &[u8]) -> Signature {
        Signature(self.0.sign(preimage))
    }
}

impl PublicKey {
    /// Verifies `signature` over `preimage`. Returns `false` on any malformed input,
    /// never panics — the verifier must be a total function of its arguments.
    #[must_use]
    pub fn verify(&self, signature: &Signature, preimage: &[u8]) -> bool {
        self.0.verify(&signature.0, preimage).is_ok()
    }
}

mod pubkey_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        key: &ed25519_consensus::VerificationKey,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(key.as_bytes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<ed25519_consensus::VerificationKey, D::Error> {
        let bytes = <[u8; 32]>::deserialize(d)?;
        ed25519_consensus::VerificationKey::try_from(bytes).map_err(serde::de::Error::custom)
    }
}

mod sig_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        sig: &ed25519_consensus::Signature,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(&sig.to_bytes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<ed25519_consensus::Signature, D::Error> {
        let bytes = <[u8; 64]>::deserialize(d)?;
        Ok(ed25519_consensus::Signature::from(bytes))
    }
}
