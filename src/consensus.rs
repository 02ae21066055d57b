//! The top-level [`ConsensusCore`], the crate's single entry point.
//!
//! Structured after the teacher's `Alpenglow<A, D, R>`: one struct generic
//! over the external collaborators, constructed once via `new`, and driven
//! by spawning its fixed set of cooperative tasks from `start`.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::block::Block;
use crate::cache::ChainHandle;
use crate::clock::Clock;
use crate::config::Config;
use crate::crypto::Hash;
use crate::ingestion::IngestionLoop;
use crate::maintenance::MaintenanceTimer;
use crate::producer::BlockProducer;
use crate::properties::GlobalStaticProperty;
use crate::properties::WitnessInfo;
use crate::reaper::OrphanReaper;
use crate::router::{MessageFilter, Router};
use crate::state::ConsensusState;
use crate::storage::BlockStorage;
use crate::tx_source::TxSource;

/// An opaque reference to post-execution state, keyed by the block hash it
/// was produced against. The state machine itself (spec §1's Non-goals
/// exclude the VM) belongs to the surrounding executor; this crate only
/// hands out the handle it should look up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateHandle(pub Hash);

/// Consensus core of a single witness node: block cache, leader schedule,
/// and the production/ingestion loops, generic over the three external
/// collaborators the surrounding node supplies.
pub struct ConsensusCore<R: Router, T: TxSource, S: BlockStorage> {
    state: Arc<RwLock<ConsensusState>>,
    static_props: Arc<GlobalStaticProperty>,
    config: Arc<Config>,
    clock: Clock,
    router: Arc<R>,
    tx_source: Arc<T>,
    storage: Arc<S>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl<R: Router, T: TxSource, S: BlockStorage> ConsensusCore<R, T, S> {
    /// Builds a core from its configuration and collaborators. Reads the
    /// last persisted block from `storage` to seed the confirmed root (spec
    /// §6); if storage has nothing yet, `genesis` seeds a fresh chain.
    pub fn new(config: Config, router: R, tx_source: T, storage: S, genesis: Block) -> anyhow::Result<Self> {
        let witnesses: Vec<WitnessInfo> = config.witness_list.clone();
        let self_id = config.self_account.id;
        let static_props = Arc::new(GlobalStaticProperty::new(witnesses, self_id));

        let root = storage
            .load_last()
            .context("loading last persisted block at startup")?
            .unwrap_or(genesis);

        let state = Arc::new(RwLock::new(ConsensusState::new(root, &static_props)));
        let clock = Clock::new(config.slot_duration, config.genesis_unix);

        Ok(Self {
            state,
            static_props,
            config: Arc::new(config),
            clock,
            router: Arc::new(router),
            tx_source: Arc::new(tx_source),
            storage: Arc::new(storage),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }

    /// Spawns the fixed task set (spec §5): Ingestion, Producer, Maintenance
    /// timer, Orphan reaper. Idempotent only in the sense that calling it
    /// twice spawns a second set; callers should call it once per lifetime.
    pub async fn start(&mut self) {
        let inbound = self.router.subscribe(MessageFilter::NewBlock);

        let ingestion = IngestionLoop::new(
            Arc::clone(&self.state),
            Arc::clone(&self.static_props),
            Arc::clone(&self.config),
            self.clock,
            Arc::clone(&self.router),
            Arc::clone(&self.storage),
            inbound,
            self.cancel.clone(),
        )
        .await;
        self.tasks.push(tokio::spawn(ingestion.run()));

        let producer = BlockProducer::new(
            Arc::clone(&self.state),
            Arc::clone(&self.static_props),
            Arc::clone(&self.config),
            self.clock,
            Arc::clone(&self.router),
            Arc::clone(&self.tx_source),
            self.cancel.clone(),
        );
        self.tasks.push(tokio::spawn(producer.run()));

        let maintenance = MaintenanceTimer::new(
            Arc::clone(&self.state),
            Arc::clone(&self.static_props),
            self.clock,
            self.cancel.clone(),
        );
        self.tasks.push(tokio::spawn(maintenance.run()));

        let reaper = OrphanReaper::new(Arc::clone(&self.state), self.clock, self.config.orphan_ttl, self.cancel.clone());
        self.tasks.push(tokio::spawn(reaper.run()));
    }

    /// Signals all tasks to stop after their current message and waits for
    /// them to return (spec §5: "all tasks to return after finishing the
    /// current message").
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.await.context("consensus task panicked")??;
        }
        Ok(())
    }

    /// The confirmed chain's current tip. Full confirmed history is the
    /// storage engine's concern (out of scope per §1); this crate only
    /// keeps the current confirmed root in memory once older blocks are
    /// committed and trimmed from the tree.
    pub async fn block_chain(&self) -> Block {
        self.state.read().await.cache.confirmed_root().clone()
    }

    /// A view of the longest unconfirmed chain, root first (leaves-last).
    pub async fn cached_block_chain(&self) -> Vec<Block> {
        let state = self.state.read().await;
        let handle = state.cache.longest_chain();
        state.cache.chain_blocks(&handle)
    }

    /// Opaque post-confirmation state handle, keyed by the confirmed root.
    pub async fn state_pool(&self) -> StateHandle {
        StateHandle(self.state.read().await.cache.confirmed_root().block_hash)
    }

    /// Opaque post-longest-chain state handle, keyed by the current head.
    pub async fn cached_state_pool(&self) -> StateHandle {
        let handle: ChainHandle = self.state.read().await.cache.longest_chain();
        StateHandle(handle.head_hash)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::config::SelfAccount;
    use crate::crypto;
    use crate::test_utils::{InMemoryRouter, InMemoryStorage, InMemoryTxSource, generate_witnesses};

    #[tokio::test]
    async fn single_witness_core_produces_and_confirms_blocks_then_stops_cleanly() {
        let (witnesses, secret_keys) = generate_witnesses(1);
        let genesis = Block::produce(0, crypto::zero_hash(), 0, 0, vec![], vec![], &secret_keys[0]);
        let now_unix = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();

        let config = Config::new(
            now_unix,
            witnesses,
            SelfAccount {
                id: 0,
                secret_key: secret_keys[0].clone(),
            },
        )
        .with_slot_duration(Duration::from_millis(20));

        let mut core = ConsensusCore::new(config, InMemoryRouter::new(), InMemoryTxSource::with_transactions(vec![]), InMemoryStorage::new(), genesis)
            .expect("storage has no prior block, genesis seeds the chain");

        core.start().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        core.stop().await.unwrap();

        let confirmed = core.block_chain().await;
        assert!(confirmed.number >= 1);

        let cached = core.cached_block_chain().await;
        assert_eq!(cached.first().unwrap().block_hash, confirmed.block_hash);

        let pool = core.state_pool().await;
        assert_eq!(pool.0, confirmed.block_hash);
    }
}
