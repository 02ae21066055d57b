//! In-memory collaborators for tests, analogous to the teacher's
//! `test_utils::generate_validators` plus hand-rolled network/storage test
//! doubles. `pub(crate)` only — nothing here is part of the public API.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::block::Transaction;
use crate::crypto::{Hash, SecretKey};
use crate::properties::WitnessInfo;
use crate::router::{MessageFilter, Router, RouterMessage};
use crate::storage::{BlockStorage, StorageError};
use crate::tx_source::TxSource;

/// Generates `n` witnesses with freshly-minted keys, returning the roster
/// alongside the secret keys in the same order (index == `WitnessId`).
pub(crate) fn generate_witnesses(n: u32) -> (Vec<WitnessInfo>, Vec<SecretKey>) {
    let mut secret_keys = Vec::with_capacity(n as usize);
    let witnesses = (0..n)
        .map(|id| {
            let sk = SecretKey::generate(&mut rand::rngs::OsRng);
            let pubkey = sk.public();
            secret_keys.push(sk);
            WitnessInfo { id, pubkey }
        })
        .collect();
    (witnesses, secret_keys)
}

/// A router double that records every broadcast and hands out channels for
/// subscribers; nothing actually crosses a network boundary.
#[derive(Default)]
pub(crate) struct InMemoryRouter {
    broadcasts: Mutex<Vec<RouterMessage>>,
    subscribers: Mutex<Vec<(MessageFilter, mpsc::Sender<RouterMessage>)>>,
}

impl InMemoryRouter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }
}

impl Router for InMemoryRouter {
    fn subscribe(&self, filter: MessageFilter) -> mpsc::Receiver<RouterMessage> {
        let (tx, rx) = mpsc::channel(1024);
        self.subscribers.lock().unwrap().push((filter, tx));
        rx
    }

    fn broadcast(&self, msg: RouterMessage) {
        self.broadcasts.lock().unwrap().push(msg.clone());
        let filter = msg.filter();
        for (sub_filter, tx) in self.subscribers.lock().unwrap().iter() {
            if *sub_filter == filter {
                let _ = tx.try_send(msg.clone());
            }
        }
    }
}

/// A transaction source that always hands back whatever was preloaded,
/// minus anything in the exclude set, honoring `max_count`.
#[derive(Default)]
pub(crate) struct InMemoryTxSource {
    pool: Mutex<Vec<Transaction>>,
}

impl InMemoryTxSource {
    pub(crate) fn with_transactions(txs: Vec<Transaction>) -> Self {
        Self { pool: Mutex::new(txs) }
    }
}

impl TxSource for InMemoryTxSource {
    fn pending(&self, max_count: usize, exclude: &HashSet<Hash>) -> Vec<Transaction> {
        self.pool
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| !exclude.contains(&tx.hash()))
            .take(max_count)
            .cloned()
            .collect()
    }
}

/// A storage double that keeps everything in memory, for tests that need a
/// real `BlockStorage` implementation without touching disk.
#[derive(Default)]
pub(crate) struct InMemoryStorage {
    last: Mutex<Option<crate::block::Block>>,
    appended: Mutex<Vec<crate::block::Block>>,
}

impl InMemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn appended_count(&self) -> usize {
        self.appended.lock().unwrap().len()
    }
}

impl BlockStorage for InMemoryStorage {
    fn append(&self, block: &crate::block::Block) -> Result<(), StorageError> {
        self.appended.lock().unwrap().push(block.clone());
        *self.last.lock().unwrap() = Some(block.clone());
        Ok(())
    }

    fn load_last(&self) -> Result<Option<crate::block::Block>, StorageError> {
        Ok(self.last.lock().unwrap().clone())
    }
}
