//! Block producer (spec §4.H).
//!
//! Single cooperative task, structured after the teacher's
//! `block_production_loop`: sleep until the next slot this node leads, then
//! assemble, sign, self-admit, and broadcast exactly one block.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::block::{Block, Slot};
use crate::cache::AdmitOutcome;
use crate::clock::Clock;
use crate::config::Config;
use crate::crypto;
use crate::properties::GlobalStaticProperty;
use crate::router::{Router, RouterMessage};
use crate::schedule::{leader_of_slot, time_until_next_schedule};
use crate::state::ConsensusState;
use crate::tx_source::TxSource;

pub struct BlockProducer<R: Router, T: TxSource> {
    state: Arc<RwLock<ConsensusState>>,
    static_props: Arc<GlobalStaticProperty>,
    config: Arc<Config>,
    clock: Clock,
    router: Arc<R>,
    tx_source: Arc<T>,
    cancel: CancellationToken,
    last_produced_slot: Option<Slot>,
}

impl<R: Router, T: TxSource> BlockProducer<R, T> {
    #[must_use]
    pub fn new(
        state: Arc<RwLock<ConsensusState>>,
        static_props: Arc<GlobalStaticProperty>,
        config: Arc<Config>,
        clock: Clock,
        router: Arc<R>,
        tx_source: Arc<T>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            static_props,
            config,
            clock,
            router,
            tx_source,
            cancel,
            last_produced_slot: None,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            let sleep_for = {
                let state = self.state.read().await;
                time_until_next_schedule(
                    &self.static_props,
                    &state.dynamic_props,
                    &self.clock,
                    self.config.self_account.id,
                )
            };

            tokio::select! {
                () = sleep(sleep_for) => {}
                () = self.cancel.cancelled() => return Ok(()),
            }

            let slot = self.clock.now_slot();
            if self.last_produced_slot == Some(slot) {
                continue;
            }
            let is_leader = {
                let state = self.state.read().await;
                leader_of_slot(&self.static_props, &state.dynamic_props, slot) == self.config.self_account.id
            };
            if !is_leader {
                continue;
            }

            self.produce_block(slot).await?;
            self.last_produced_slot = Some(slot);
        }
    }

    async fn produce_block(&self, slot: Slot) -> anyhow::Result<()> {
        let (parent, exclude) = {
            let state = self.state.read().await;
            let handle = state.cache.longest_chain();
            let parent = state
                .cache
                .block(&handle.head_hash)
                .expect("longest_chain always points at a block in the cache")
                .clone();
            let exclude = state.cache.ancestor_tx_hashes(handle.head_hash);
            (parent, exclude)
        };

        let txs = self.tx_source.pending(self.config.tx_per_block, &exclude);
        // `info` carries consensus-level payload whose encoding spec §9
        // explicitly leaves unspecified; passed through empty here.
        let info = Vec::new();
        let block = Block::produce(
            parent.number,
            parent.block_hash,
            slot,
            self.config.self_account.id,
            info,
            txs,
            &self.config.self_account.secret_key,
        );

        let outcome = {
            let mut state = self.state.write().await;
            state.admit(
                block.clone(),
                &self.static_props,
                slot,
                self.config.skew_max,
                self.config.confirm_threshold(),
            )
        };

        match outcome {
            Ok(AdmitOutcome::Admitted(hash)) => {
                info!(
                    "produced block {} at slot {slot} on top of {}",
                    crypto::short(&hash),
                    crypto::short(&parent.block_hash)
                );
                match block.encode() {
                    Ok(bytes) => self.router.broadcast(RouterMessage::NewBlock(bytes)),
                    Err(err) => warn!("failed to encode self-produced block: {err}"),
                }
            }
            Ok(AdmitOutcome::Pending) => {
                warn!("self-produced block buffered as orphan; parent {} not yet admitted", crypto::short(&parent.block_hash));
            }
            Err(err) => warn!("self-produced block rejected: {err}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::config::SelfAccount;
    use crate::test_utils::{InMemoryRouter, InMemoryTxSource, generate_witnesses};

    #[tokio::test]
    async fn producer_emits_blocks_for_its_own_leader_slot() {
        let (witnesses, secret_keys) = generate_witnesses(1);
        let static_props = Arc::new(GlobalStaticProperty::new(witnesses.clone(), 0));
        let genesis = Block::produce(0, crypto::zero_hash(), 0, 0, vec![], vec![], &secret_keys[0]);
        let state = Arc::new(RwLock::new(ConsensusState::new(genesis, &static_props)));

        // Genesis set to "now" so a single witness's slot schedule starts
        // near slot 0 on the real wall clock, rather than floor(unix_now / slot_duration).
        let now_unix = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        let config = Arc::new(
            Config::new(
                now_unix,
                witnesses,
                SelfAccount {
                    id: 0,
                    secret_key: secret_keys[0].clone(),
                },
            )
            .with_slot_duration(Duration::from_millis(20)),
        );
        let clock = Clock::new(config.slot_duration, config.genesis_unix);
        let router = Arc::new(InMemoryRouter::new());
        let tx_source = Arc::new(InMemoryTxSource::with_transactions(vec![]));
        let cancel = CancellationToken::new();

        let producer = BlockProducer::new(
            Arc::clone(&state),
            Arc::clone(&static_props),
            Arc::clone(&config),
            clock,
            Arc::clone(&router),
            tx_source,
            cancel.clone(),
        );

        let handle = tokio::spawn(producer.run());
        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert!(state.read().await.cache.confirmed_length() >= 1);
        assert!(router.broadcast_count() >= 1);
    }
}
