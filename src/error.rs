//! Error kinds surfaced by the consensus core (spec §7).
//!
//! Verification failures and admission failures are distinct enums because
//! callers need to distinguish "this block will never be valid"
//! ([`VerifyError`]) from "this block may be admitted later, or was already
//! handled" ([`AdmitError`]).

use thiserror::Error;

use crate::block::{BlockNumber, Slot, WitnessId};

/// Why [`crate::verify::verify`] rejected a block. Each kind is fatal for
/// the block under review; the core never retries a verification failure.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("block number {got} is not parent number {parent} + 1")]
    BadLink { got: BlockNumber, parent: BlockNumber },
    #[error("block time {got} is not strictly after parent time {parent}")]
    BadSlot { got: Slot, parent: Slot },
    #[error("block claims witness {got}, but slot {slot} is led by {expected}")]
    WrongLeader {
        got: WitnessId,
        expected: WitnessId,
        slot: Slot,
    },
    #[error("signature does not validate under the registered key for witness {witness}")]
    BadSignature { witness: WitnessId },
    #[error("block time {got} exceeds current slot {now} plus skew tolerance {skew_max}")]
    FromFuture { got: Slot, now: Slot, skew_max: Slot },
    #[error("content verification failed: {0}")]
    Other(String),
}

/// Outcome of [`crate::cache::BlockCache::add`] that is not a successful
/// admission. `Pending` (orphan buffering) is represented separately as
/// [`crate::cache::AdmitOutcome::Pending`] since it is not an error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AdmitError {
    #[error("block already present in the cache")]
    Duplicate,
    #[error("block number {got} is at or below the confirmed root ({confirmed})")]
    Stale { got: BlockNumber, confirmed: BlockNumber },
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// Fatal invariant violation. The task observing this must terminate and
/// rely on the supervisor to restart the node; the confirmed stream must
/// never be rolled back to recover from one of these.
#[derive(Clone, Debug, Error)]
#[error("consensus core invariant violated: {0}")]
pub struct InternalError(pub String);
