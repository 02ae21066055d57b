//! Orphan reaper (spec §5's fixed task list, item 4; §4.J).
//!
//! Periodically evicts orphan-pool entries older than `ORPHAN_TTL` slots so
//! a flood of unresolvable children cannot grow the pool without bound.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::block::Slot;
use crate::clock::Clock;
use crate::state::ConsensusState;

pub struct OrphanReaper {
    state: Arc<RwLock<ConsensusState>>,
    clock: Clock,
    ttl: Slot,
    cancel: CancellationToken,
}

impl OrphanReaper {
    #[must_use]
    pub fn new(state: Arc<RwLock<ConsensusState>>, clock: Clock, ttl: Slot, cancel: CancellationToken) -> Self {
        Self {
            state,
            clock,
            ttl,
            cancel,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(1).max(self.clock.slot_duration())) => {}
                () = self.cancel.cancelled() => return Ok(()),
            }

            let now = self.clock.now_slot();
            let mut state = self.state.write().await;
            let removed = state.cache.reap_orphans(now, self.ttl);
            if removed > 0 {
                debug!("orphan reaper evicted {removed} expired entries");
            }
        }
    }
}
