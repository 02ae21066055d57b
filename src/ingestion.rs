//! Ingestion loop (spec §4.I).
//!
//! Single cooperative task consuming inbound block messages from a
//! filtered router subscription, admitting them into the shared cache, and
//! rebroadcasting newly-seen admitted blocks. Also drains the cache's
//! confirmed-block stream into persistent storage (spec §6's "on each
//! confirmation emission, the core calls `storage.append(block)` with
//! strict ordering"), keeping I/O out of the cache itself (spec §5).

use std::collections::VecDeque;
use std::sync::Arc;

use log::{trace, warn};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::block::Block;
use crate::cache::AdmitOutcome;
use crate::clock::Clock;
use crate::config::Config;
use crate::crypto::{self, Hash};
use crate::error::AdmitError;
use crate::properties::GlobalStaticProperty;
use crate::router::{Router, RouterMessage};
use crate::state::ConsensusState;
use crate::storage::BlockStorage;

/// Bounded FIFO membership set used for gossip dedup by `block_hash` (spec
/// §4.I step 4). Unlike the cache itself, seen-ness has no correctness
/// requirement beyond "don't rebroadcast forever", so a fixed-capacity ring
/// is enough — no need to borrow the orphan pool's TTL machinery.
struct SeenSet {
    order: VecDeque<Hash>,
    capacity: usize,
}

impl SeenSet {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn insert(&mut self, hash: Hash) -> bool {
        if self.order.contains(&hash) {
            return false;
        }
        if self.order.len() >= self.capacity {
            self.order.pop_front();
        }
        self.order.push_back(hash);
        true
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.order.contains(hash)
    }
}

pub struct IngestionLoop<R: Router, S: BlockStorage> {
    state: Arc<RwLock<ConsensusState>>,
    static_props: Arc<GlobalStaticProperty>,
    config: Arc<Config>,
    clock: Clock,
    router: Arc<R>,
    storage: Arc<S>,
    inbound: mpsc::Receiver<RouterMessage>,
    confirmed: broadcast::Receiver<Block>,
    seen: SeenSet,
    cancel: CancellationToken,
}

impl<R: Router, S: BlockStorage> IngestionLoop<R, S> {
    #[must_use]
    pub async fn new(
        state: Arc<RwLock<ConsensusState>>,
        static_props: Arc<GlobalStaticProperty>,
        config: Arc<Config>,
        clock: Clock,
        router: Arc<R>,
        storage: Arc<S>,
        inbound: mpsc::Receiver<RouterMessage>,
        cancel: CancellationToken,
    ) -> Self {
        let confirmed = state.read().await.cache.subscribe_confirmed();
        Self {
            state,
            static_props,
            config,
            clock,
            router,
            storage,
            inbound,
            confirmed,
            seen: SeenSet::new(10_000),
            cancel,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                msg = self.inbound.recv() => {
                    match msg {
                        Some(msg) => self.handle_message(msg).await,
                        None => return Ok(()),
                    }
                }
                Ok(block) = self.confirmed.recv() => {
                    if let Err(err) = self.storage.append(&block) {
                        anyhow::bail!("storage append failed for block {}: {err}", crypto::short(&block.block_hash));
                    }
                }
                () = self.cancel.cancelled() => return Ok(()),
            }
        }
    }

    async fn handle_message(&mut self, msg: RouterMessage) {
        let RouterMessage::NewBlock(bytes) = msg else { return };

        let block = match Block::decode(&bytes) {
            Ok(block) => block,
            Err(err) => {
                warn!("dropping malformed block: {err}");
                return;
            }
        };

        let already_seen = self.seen.contains(&block.block_hash);
        let now_slot = self.clock.now_slot();
        let outcome = {
            let mut state = self.state.write().await;
            state.admit(
                block.clone(),
                &self.static_props,
                now_slot,
                self.config.skew_max,
                self.config.confirm_threshold(),
            )
        };

        match outcome {
            Ok(AdmitOutcome::Admitted(hash)) => {
                self.seen.insert(hash);
                if !already_seen {
                    self.router.broadcast(RouterMessage::NewBlock(bytes));
                }
            }
            Ok(AdmitOutcome::Pending) => {
                trace!("buffered orphan block {}", crypto::short(&block.block_hash));
            }
            Err(AdmitError::Duplicate) => {
                trace!("ignoring duplicate block {}", crypto::short(&block.block_hash));
            }
            Err(err) => {
                warn!("rejecting block {}: {err}", crypto::short(&block.block_hash));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::SelfAccount;
    use crate::schedule::leader_of_slot;
    use crate::test_utils::{InMemoryRouter, InMemoryStorage, generate_witnesses};

    #[tokio::test]
    async fn ingestion_admits_rebroadcasts_once_and_persists_on_confirmation() {
        let (witnesses, secret_keys) = generate_witnesses(2);
        let static_props = Arc::new(GlobalStaticProperty::new(witnesses.clone(), 0));
        let genesis = Block::produce(0, crypto::zero_hash(), 0, 0, vec![], vec![], &secret_keys[0]);
        let state = Arc::new(RwLock::new(ConsensusState::new(genesis.clone(), &static_props)));
        let dynamic_props = state.read().await.dynamic_props.clone();

        let config = Arc::new(Config::new(
            Duration::ZERO,
            witnesses,
            SelfAccount {
                id: 0,
                secret_key: secret_keys[0].clone(),
            },
        ));
        let clock = Clock::new(config.slot_duration, config.genesis_unix);
        let router = Arc::new(InMemoryRouter::new());
        let storage = Arc::new(InMemoryStorage::new());
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let mut loop_ = IngestionLoop::new(
            Arc::clone(&state),
            Arc::clone(&static_props),
            Arc::clone(&config),
            clock,
            Arc::clone(&router),
            Arc::clone(&storage),
            rx,
            cancel.clone(),
        )
        .await;

        // Two blocks from two distinct witnesses reach the default
        // confirm_threshold (ceil(2*2/3) = 2): walking back from block2
        // (the head) to block1 already carries two distinct witnesses, so
        // block1 becomes the new root and commits alongside genesis; block2
        // itself is the strictly-newer tip and stays unconfirmed (spec §4.F).
        let leader1 = leader_of_slot(&static_props, &dynamic_props, 1);
        let block1 = Block::produce(
            genesis.number,
            genesis.block_hash,
            1,
            leader1,
            vec![],
            vec![],
            &secret_keys[leader1 as usize],
        );
        let leader2 = leader_of_slot(&static_props, &dynamic_props, 2);
        let block2 = Block::produce(
            block1.number,
            block1.block_hash,
            2,
            leader2,
            vec![],
            vec![],
            &secret_keys[leader2 as usize],
        );

        tx.send(RouterMessage::NewBlock(block1.encode().unwrap())).await.unwrap();
        tx.send(RouterMessage::NewBlock(block2.encode().unwrap())).await.unwrap();
        drop(tx);

        let handle = tokio::spawn(loop_.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(state.read().await.cache.confirmed_length(), 2); // genesis, block1 — block2 still pending
        assert_eq!(router.broadcast_count(), 2);
        assert_eq!(storage.appended_count(), 1); // only block1 newly confirmed
    }
}
