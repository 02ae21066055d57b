//! The cache and the dynamic properties it drives share one lock (spec §5:
//! "Global dynamic properties are updated under the same exclusive lock
//! held during `add`"). [`ConsensusState`] is that combined structure;
//! [`crate::producer::BlockProducer`] and [`crate::ingestion::IngestionLoop`]
//! each hold an `Arc<RwLock<ConsensusState>>` to it rather than two separate
//! locks.

use crate::block::{Block, Slot};
use crate::cache::{AdmitContext, AdmitOutcome, BlockCache};
use crate::error::AdmitError;
use crate::properties::{GlobalDynamicProperty, GlobalStaticProperty};

pub struct ConsensusState {
    pub cache: BlockCache,
    pub dynamic_props: GlobalDynamicProperty,
}

impl ConsensusState {
    #[must_use]
    pub fn new(root: Block, static_props: &GlobalStaticProperty) -> Self {
        Self {
            cache: BlockCache::new(root),
            dynamic_props: GlobalDynamicProperty::genesis(static_props),
        }
    }

    /// Admits `block` and, if it lands directly (not as a drained orphan),
    /// updates the rotation bookkeeping (spec §4.I step 3). Maintenance
    /// itself runs on its own timer task ([`crate::maintenance`]) rather
    /// than inline here, matching the concurrency model's fixed task list
    /// (spec §5). Orphans drained as a side effect of this call are
    /// admitted into the tree but do not themselves trigger a bookkeeping
    /// update here — the block that unblocked them already did, for the
    /// slot that matters to the schedule.
    pub fn admit(
        &mut self,
        block: Block,
        static_props: &GlobalStaticProperty,
        now_slot: Slot,
        skew_max: Slot,
        confirm_threshold: usize,
    ) -> Result<AdmitOutcome, AdmitError> {
        let time = block.time;
        let witness = block.witness;
        let ctx = AdmitContext {
            static_props,
            dynamic_props: &self.dynamic_props,
            now_slot,
            skew_max,
            confirm_threshold,
        };
        let outcome = self.cache.add(block, ctx)?;
        if matches!(outcome, AdmitOutcome::Admitted(_)) {
            self.dynamic_props.record_block(static_props, time, witness);
        }
        Ok(outcome)
    }
}
