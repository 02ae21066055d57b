//! Header verifier (spec §4.E).
//!
//! `verify` is a pure function of `(block, parent, static+dynamic properties,
//! now)` — no suspension is permitted while it runs (spec §5), so it borrows
//! everything it needs rather than acquiring locks itself. The block cache
//! calls it with the cache's read-locked properties already in hand.

use crate::block::{Block, Slot};
use crate::error::VerifyError;
use crate::properties::{GlobalDynamicProperty, GlobalStaticProperty};
use crate::schedule::leader_of_slot;

/// Bundles the context `verify` needs, so [`crate::cache::BlockCache::add`]
/// can pass a single borrow instead of four.
#[derive(Clone, Copy)]
pub struct HeaderVerifier<'a> {
    pub static_props: &'a GlobalStaticProperty,
    pub dynamic_props: &'a GlobalDynamicProperty,
    pub now_slot: Slot,
    pub skew_max: Slot,
}

impl<'a> HeaderVerifier<'a> {
    #[must_use]
    pub const fn new(
        static_props: &'a GlobalStaticProperty,
        dynamic_props: &'a GlobalDynamicProperty,
        now_slot: Slot,
        skew_max: Slot,
    ) -> Self {
        Self {
            static_props,
            dynamic_props,
            now_slot,
            skew_max,
        }
    }

    /// Runs the five checks of spec §4.E in order, short-circuiting on the
    /// first failure. The optional content pass (step 6) is delegated to an
    /// external executor and is not part of this crate.
    pub fn verify(&self, block: &Block, parent: &Block) -> Result<(), VerifyError> {
        if block.number != parent.number + 1 {
            return Err(VerifyError::BadLink {
                got: block.number,
                parent: parent.number,
            });
        }
        // parent_hash == parent.block_hash is checked by the caller, which
        // is the one that looked `parent` up by that exact hash (spec §4.F
        // admission step 2); re-checking it here would be redundant.
        if block.time <= parent.time {
            return Err(VerifyError::BadSlot {
                got: block.time,
                parent: parent.time,
            });
        }
        if block.time > self.now_slot + self.skew_max {
            return Err(VerifyError::FromFuture {
                got: block.time,
                now: self.now_slot,
                skew_max: self.skew_max,
            });
        }
        let expected = leader_of_slot(self.static_props, self.dynamic_props, block.time);
        if block.witness != expected {
            return Err(VerifyError::WrongLeader {
                got: block.witness,
                expected,
                slot: block.time,
            });
        }
        let witness = self
            .static_props
            .witness(block.witness)
            .ok_or(VerifyError::BadSignature {
                witness: block.witness,
            })?;
        if !block.signature_valid(&witness.pubkey) {
            return Err(VerifyError::BadSignature {
                witness: block.witness,
            });
        }
        Ok(())
    }
}
