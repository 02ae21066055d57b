//! Maintenance timer (spec §5's fixed task list, item 3).
//!
//! Polls once per slot and runs [`GlobalDynamicProperty::perform_maintenance`]
//! exactly when it is due, independent of whether any block happens to be
//! admitted around the boundary — a quiet epoch must still roll over.

use std::sync::Arc;

use log::info;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::crypto;
use crate::properties::GlobalStaticProperty;
use crate::state::ConsensusState;

pub struct MaintenanceTimer {
    state: Arc<RwLock<ConsensusState>>,
    static_props: Arc<GlobalStaticProperty>,
    clock: Clock,
    cancel: CancellationToken,
}

impl MaintenanceTimer {
    #[must_use]
    pub fn new(
        state: Arc<RwLock<ConsensusState>>,
        static_props: Arc<GlobalStaticProperty>,
        clock: Clock,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            static_props,
            clock,
            cancel,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let now = self.clock.now_slot();
            {
                let mut state = self.state.write().await;
                if state.dynamic_props.needs_maintenance(now) {
                    let root_hash = state.cache.confirmed_root().block_hash;
                    state.dynamic_props.perform_maintenance(&self.static_props, &root_hash);
                    info!(
                        "maintenance ran at slot {now}, seeded from confirmed root {}",
                        crypto::short(&root_hash)
                    );
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.clock.slot_duration()) => {}
                () = self.cancel.cancelled() => return Ok(()),
            }
        }
    }
}
