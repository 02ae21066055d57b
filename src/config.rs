//! Configuration surface (spec §6, enumerated).
//!
//! Built by the surrounding node and handed to [`crate::ConsensusCore::new`]
//! the same way the teacher's `EpochInfo` is assembled externally and
//! passed into `Alpenglow::new`. No file/env parsing lives here; that is an
//! external-node concern.

use std::time::Duration;

use crate::block::{Slot, WitnessId};
use crate::crypto::SecretKey;
use crate::properties::WitnessInfo;

/// Identifies this node within the witness set and supplies its signing key.
/// Used only by the block producer.
pub struct SelfAccount {
    pub id: WitnessId,
    pub secret_key: SecretKey,
}

pub struct Config {
    /// Slot width in seconds (default 3).
    pub slot_duration: Duration,
    /// Wall-clock instant corresponding to slot 0.
    pub genesis_unix: Duration,
    /// Accepted future-slot tolerance (default 1).
    pub skew_max: Slot,
    /// Distinct witnesses required to confirm; `None` defaults to `⌈2N/3⌉`.
    pub confirm_threshold: Option<usize>,
    /// Maximum transactions assembled per block (default 6000).
    pub tx_per_block: usize,
    /// Orphan retention, in slots (default 10).
    pub orphan_ttl: Slot,
    /// Ordered identifiers of the epoch's witnesses.
    pub witness_list: Vec<WitnessInfo>,
    pub self_account: SelfAccount,
}

impl Config {
    #[must_use]
    pub fn new(genesis_unix: Duration, witness_list: Vec<WitnessInfo>, self_account: SelfAccount) -> Self {
        Self {
            slot_duration: Duration::from_secs(3),
            genesis_unix,
            skew_max: 1,
            confirm_threshold: None,
            tx_per_block: 6_000,
            orphan_ttl: 10,
            witness_list,
            self_account,
        }
    }

    #[must_use]
    pub fn with_slot_duration(mut self, d: Duration) -> Self {
        self.slot_duration = d;
        self
    }

    #[must_use]
    pub fn with_skew_max(mut self, skew_max: Slot) -> Self {
        self.skew_max = skew_max;
        self
    }

    #[must_use]
    pub fn with_confirm_threshold(mut self, threshold: usize) -> Self {
        self.confirm_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_tx_per_block(mut self, n: usize) -> Self {
        self.tx_per_block = n;
        self
    }

    #[must_use]
    pub fn with_orphan_ttl(mut self, ttl: Slot) -> Self {
        self.orphan_ttl = ttl;
        self
    }

    /// Resolves `confirm_threshold`, defaulting to `⌈2N/3⌉` over the witness count.
    #[must_use]
    pub fn confirm_threshold(&self) -> usize {
        self.confirm_threshold.unwrap_or_else(|| {
            let n = self.witness_list.len();
            (2 * n).div_ceil(3)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;

    fn witnesses(n: u32) -> Vec<WitnessInfo> {
        (0..n)
            .map(|id| WitnessInfo {
                id,
                pubkey: SecretKey::generate(&mut rand::rngs::OsRng).public(),
            })
            .collect()
    }

    #[test]
    fn default_confirm_threshold_is_ceil_two_thirds() {
        let cfg = Config::new(
            Duration::ZERO,
            witnesses(7),
            SelfAccount {
                id: 0,
                secret_key: SecretKey::generate(&mut rand::rngs::OsRng),
            },
        );
        assert_eq!(cfg.confirm_threshold(), 5); // ceil(14/3) = 5
    }

    #[test]
    fn explicit_confirm_threshold_overrides_default() {
        let cfg = Config::new(
            Duration::ZERO,
            witnesses(7),
            SelfAccount {
                id: 0,
                secret_key: SecretKey::generate(&mut rand::rngs::OsRng),
            },
        )
        .with_confirm_threshold(2);
        assert_eq!(cfg.confirm_threshold(), 2);
    }
}
