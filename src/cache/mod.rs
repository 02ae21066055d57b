//! Block cache (spec §4.F) — the heart of the consensus core.
//!
//! An in-memory tree of unconfirmed blocks rooted at the last confirmed
//! block, with fork tracking, a deterministic longest-chain selector, and
//! the confirmation rule that prunes and advances the confirmed root.

mod node;
mod orphan;

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::broadcast;

use crate::block::{Block, BlockNumber};
use crate::crypto::Hash;
use crate::error::AdmitError;
use crate::properties::{GlobalDynamicProperty, GlobalStaticProperty};
use crate::verify::HeaderVerifier;

pub use node::BlockCacheNode;
pub use orphan::OrphanPool;

/// Successful outcome of [`BlockCache::add`]. Rejections are represented as
/// `Err(AdmitError)` instead, mirroring the teacher's `Result<(), PoolError>`
/// convention for admission paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// The block was inserted into the tree (and confirmation advancement ran).
    Admitted(Hash),
    /// The block's parent is not yet known; it was buffered in the orphan pool.
    Pending,
}

/// A reference to the tip of some chain in the cache, returned by
/// [`BlockCache::longest_chain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainHandle {
    pub head_hash: Hash,
    pub head_number: BlockNumber,
    pub length: u64,
}

/// The context `add` and confirmation advancement need about the rest of
/// the consensus state. Borrowed for the duration of one `add` call; the
/// cache never stores it.
#[derive(Clone, Copy)]
pub struct AdmitContext<'a> {
    pub static_props: &'a GlobalStaticProperty,
    pub dynamic_props: &'a GlobalDynamicProperty,
    pub now_slot: u64,
    pub skew_max: u64,
    pub confirm_threshold: usize,
}

pub struct BlockCache {
    /// Unconfirmed blocks, keyed by `block_hash`.
    nodes: HashMap<Hash, BlockCacheNode>,
    /// Tip of the confirmed chain; its parent is, by definition, not in the cache.
    root: Block,
    orphans: OrphanPool,
    /// Number of blocks linearized into the confirmed prefix (`root.number + 1`).
    confirmed_length: u64,
    confirmed_tx: broadcast::Sender<Block>,
}

impl BlockCache {
    /// Creates a cache rooted at `root` (the last persisted/confirmed block,
    /// per spec §6's startup contract). The cache starts empty otherwise.
    #[must_use]
    pub fn new(root: Block) -> Self {
        let confirmed_length = root.number + 1;
        let (confirmed_tx, _) = broadcast::channel(1024);
        Self {
            nodes: HashMap::new(),
            root,
            orphans: OrphanPool::new(),
            confirmed_length,
            confirmed_tx,
        }
    }

    #[must_use]
    pub fn confirmed_root(&self) -> &Block {
        &self.root
    }

    #[must_use]
    pub fn confirmed_length(&self) -> u64 {
        self.confirmed_length
    }

    /// A restartable subscription to the confirmed stream (spec §4.F:
    /// "lazy sequence ... restartable via subscription"). Blocks are sent in
    /// strictly increasing `number` order; lagging receivers see
    /// [`broadcast::error::RecvError::Lagged`] rather than silently missing
    /// blocks.
    #[must_use]
    pub fn subscribe_confirmed(&self) -> broadcast::Receiver<Block> {
        self.confirmed_tx.subscribe()
    }

    #[must_use]
    pub fn orphan_pool_len(&self) -> usize {
        self.orphans.len()
    }

    pub fn reap_orphans(&mut self, now_slot: u64, ttl: u64) -> usize {
        self.orphans.reap_expired(now_slot, ttl)
    }

    /// Admission algorithm (spec §4.F): duplicate/stale checks, parent
    /// lookup (buffering as an orphan if unknown), verification, insertion,
    /// orphan drain, and confirmation advancement — all atomically, under
    /// whatever external lock the caller holds.
    pub fn add(&mut self, block: Block, ctx: AdmitContext<'_>) -> Result<AdmitOutcome, AdmitError> {
        let outcome = self.admit_one(block, ctx)?;
        if let AdmitOutcome::Admitted(hash) = outcome {
            self.drain_orphans_from(hash, ctx);
            self.try_confirm(ctx);
        }
        Ok(outcome)
    }

    fn drain_orphans_from(&mut self, mut root_hash: Hash, ctx: AdmitContext<'_>) {
        let mut queue = VecDeque::from([root_hash]);
        while let Some(hash) = queue.pop_front() {
            root_hash = hash;
            for orphan in self.orphans.drain_children_of(&root_hash) {
                if let Ok(AdmitOutcome::Admitted(h)) = self.admit_one(orphan, ctx) {
                    queue.push_back(h);
                }
            }
        }
    }

    fn admit_one(&mut self, block: Block, ctx: AdmitContext<'_>) -> Result<AdmitOutcome, AdmitError> {
        if self.nodes.contains_key(&block.block_hash) {
            return Err(AdmitError::Duplicate);
        }

        if block.parent_hash == self.root.block_hash {
            let verifier = HeaderVerifier::new(ctx.static_props, ctx.dynamic_props, ctx.now_slot, ctx.skew_max);
            verifier.verify(&block, &self.root)?;
            let hash = block.block_hash;
            self.nodes.insert(hash, BlockCacheNode::new(block, self.root.block_hash, 1));
            return Ok(AdmitOutcome::Admitted(hash));
        }

        if let Some(parent) = self.nodes.get(&block.parent_hash) {
            let verifier = HeaderVerifier::new(ctx.static_props, ctx.dynamic_props, ctx.now_slot, ctx.skew_max);
            verifier.verify(&block, &parent.block)?;
            let cumulative_length = parent.cumulative_length + 1;
            let hash = block.block_hash;
            let parent_hash = block.parent_hash;
            self.nodes
                .insert(hash, BlockCacheNode::new(block, parent_hash, cumulative_length));
            self.nodes.get_mut(&parent_hash).unwrap().children.push(hash);
            return Ok(AdmitOutcome::Admitted(hash));
        }

        if block.number <= self.root.number {
            return Err(AdmitError::Stale {
                got: block.number,
                confirmed: self.root.number,
            });
        }

        self.orphans.buffer(block, ctx.now_slot);
        Ok(AdmitOutcome::Pending)
    }

    /// Looks up a block by hash, whether it is the confirmed root or still
    /// unconfirmed in the tree.
    #[must_use]
    pub fn block(&self, hash: &Hash) -> Option<&Block> {
        if *hash == self.root.block_hash {
            Some(&self.root)
        } else {
            self.nodes.get(hash).map(|n| &n.block)
        }
    }

    /// The ancestor-tx oracle (spec §4.G): transaction hashes already
    /// present anywhere between `head_hash` and the confirmed root,
    /// inclusive, for the producer to exclude when pulling from the tx source.
    #[must_use]
    pub fn ancestor_tx_hashes(&self, head_hash: Hash) -> HashSet<Hash> {
        let mut out = HashSet::new();
        let mut cur = head_hash;
        while cur != self.root.block_hash {
            let node = &self.nodes[&cur];
            out.extend(node.block.content.iter().map(crate::block::Transaction::hash));
            cur = node.parent_hash;
        }
        out.extend(self.root.content.iter().map(crate::block::Transaction::hash));
        out
    }

    /// Among all leaf nodes (including the root itself, if the tree is
    /// empty), returns the one with maximum cumulative length; ties broken
    /// by the lexicographically smaller `block_hash` (spec §4.F). Pure and
    /// deterministic over the cache's current contents.
    #[must_use]
    pub fn longest_chain(&self) -> ChainHandle {
        let mut best = ChainHandle {
            head_hash: self.root.block_hash,
            head_number: self.root.number,
            length: 0,
        };
        for (hash, node) in &self.nodes {
            if !node.children.is_empty() {
                continue;
            }
            let better = node.cumulative_length > best.length
                || (node.cumulative_length == best.length && *hash < best.head_hash);
            if better {
                best = ChainHandle {
                    head_hash: *hash,
                    head_number: node.block.number,
                    length: node.cumulative_length,
                };
            }
        }
        best
    }

    /// Walks from `handle.head_hash` back to the confirmed root and returns
    /// the chain in ascending `number` order (root first).
    #[must_use]
    pub fn chain_blocks(&self, handle: &ChainHandle) -> Vec<Block> {
        let mut blocks = Vec::with_capacity(handle.length as usize + 1);
        let mut cur = handle.head_hash;
        while cur != self.root.block_hash {
            let node = &self.nodes[&cur];
            blocks.push(node.block.clone());
            cur = node.parent_hash;
        }
        blocks.push(self.root.clone());
        blocks.reverse();
        blocks
    }

    /// Confirmation rule (spec §4.F): walk from the longest-chain head
    /// *toward* the root, counting distinct witnesses; the first node hit on
    /// that head-to-root walk where the count reaches `confirm_threshold`
    /// becomes the new confirmed root. Anything strictly newer than that
    /// node (the suffix still short of the threshold) stays unconfirmed.
    fn try_confirm(&mut self, ctx: AdmitContext<'_>) {
        let head = self.longest_chain();
        if head.head_hash == self.root.block_hash {
            return;
        }

        // Descending: path[0] is the head, path[last] is the current root's child.
        let mut path = Vec::new();
        let mut cur = head.head_hash;
        while cur != self.root.block_hash {
            path.push(cur);
            cur = self.nodes[&cur].parent_hash;
        }

        let mut distinct = HashSet::new();
        let mut new_root_idx = None;
        for (i, hash) in path.iter().enumerate() {
            distinct.insert(self.nodes[hash].block.witness);
            if distinct.len() >= ctx.confirm_threshold {
                new_root_idx = Some(i);
                break;
            }
        }

        let Some(new_root_idx) = new_root_idx else { return };

        // The child continuing toward the (still unconfirmed) head must
        // survive the prune below; every other child of a committed node is
        // a losing fork.
        let keep_child = (new_root_idx > 0).then(|| path[new_root_idx - 1]);

        // Ascending order (current root's child first, new root last) for
        // both removal from the tree and emission on the confirmed stream.
        let to_commit: Vec<Hash> = path[new_root_idx..].iter().rev().copied().collect();
        let last = to_commit.len() - 1;

        let mut to_discard = Vec::new();
        for (i, hash) in to_commit.iter().enumerate() {
            let node = self.nodes.remove(hash).expect("node on path must exist");
            let next_on_path = if i == last { keep_child.as_ref() } else { to_commit.get(i + 1) };
            for child in &node.children {
                if Some(child) != next_on_path {
                    to_discard.push(*child);
                }
            }
            self.root = node.block;
            // A lagging/absent subscriber is not this cache's concern.
            let _ = self.confirmed_tx.send(self.root.clone());
        }
        self.confirmed_length = self.root.number + 1;

        while let Some(hash) = to_discard.pop() {
            if let Some(node) = self.nodes.remove(&hash) {
                to_discard.extend(node.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{self, SecretKey};
    use crate::properties::{GlobalDynamicProperty, WitnessInfo};
    use crate::schedule::leader_of_slot;

    struct Fixture {
        static_props: GlobalStaticProperty,
        dynamic_props: GlobalDynamicProperty,
        sks: Vec<SecretKey>,
    }

    fn fixture(n: u32) -> Fixture {
        let mut sks = Vec::new();
        let witnesses = (0..n)
            .map(|id| {
                let sk = SecretKey::generate(&mut rand::rngs::OsRng);
                let pubkey = sk.public();
                sks.push(sk);
                WitnessInfo { id, pubkey }
            })
            .collect();
        let static_props = GlobalStaticProperty::new(witnesses, 0);
        let dynamic_props = GlobalDynamicProperty::genesis(&static_props);
        Fixture {
            static_props,
            dynamic_props,
            sks,
        }
    }

    fn ctx<'a>(f: &'a Fixture, now_slot: u64, confirm_threshold: usize) -> AdmitContext<'a> {
        AdmitContext {
            static_props: &f.static_props,
            dynamic_props: &f.dynamic_props,
            now_slot,
            skew_max: 1,
            confirm_threshold,
        }
    }

    fn genesis(sks: &[SecretKey]) -> Block {
        Block::produce(0, crypto::zero_hash(), 0, 0, vec![], vec![], &sks[0])
    }

    fn child(parent: &Block, f: &Fixture, time: u64) -> Block {
        let leader = leader_of_slot(&f.static_props, &f.dynamic_props, time);
        Block::produce(
            parent.number,
            parent.block_hash,
            time,
            leader,
            vec![],
            vec![],
            &f.sks[leader as usize],
        )
    }

    #[test]
    fn single_producer_confirms_with_threshold_one() {
        let f = fixture(1);
        let mut cache = BlockCache::new(genesis(&f.sks));
        let mut parent = cache.confirmed_root().clone();
        for slot in 1..=5 {
            let blk = child(&parent, &f, slot);
            parent = blk.clone();
            let outcome = cache.add(blk, ctx(&f, slot, 1)).unwrap();
            assert!(matches!(outcome, AdmitOutcome::Admitted(_)));
        }
        assert_eq!(cache.confirmed_length(), 6); // genesis + 5
    }

    #[test]
    fn single_producer_never_confirms_with_threshold_three() {
        let f = fixture(1);
        let mut cache = BlockCache::new(genesis(&f.sks));
        let mut parent = cache.confirmed_root().clone();
        for slot in 1..=5 {
            let blk = child(&parent, &f, slot);
            parent = blk.clone();
            cache.add(blk, ctx(&f, slot, 3)).unwrap();
        }
        assert_eq!(cache.confirmed_length(), 1); // only genesis
    }

    #[test]
    fn three_witness_confirmation_advances_once_second_witness_appears() {
        let f = fixture(3);
        let gen = genesis(&f.sks);
        let mut cache = BlockCache::new(gen.clone());

        // A lone block from the first scheduled leader is not enough on its
        // own (only one distinct witness on the path from head to root).
        let b1 = child(&gen, &f, 1);
        cache.add(b1.clone(), ctx(&f, 1, 2)).unwrap();
        assert_eq!(cache.confirmed_length(), 1);

        // The next slot's leader is necessarily a different witness (the
        // schedule is a permutation with no immediate repeats), so walking
        // from the new head (b2) back to b1 already carries two distinct
        // witnesses: b1 becomes the new root and commits, but b2 itself is
        // the strictly-newer tip and stays unconfirmed (spec §4.F).
        let b2 = child(&b1, &f, 2);
        cache.add(b2, ctx(&f, 2, 2)).unwrap();
        assert_eq!(cache.confirmed_length(), 2); // genesis, b1 — b2 still pending
    }

    #[test]
    fn fork_tie_break_picks_smaller_hash() {
        let f = fixture(2);
        let gen = genesis(&f.sks);
        let mut cache = BlockCache::new(gen.clone());
        let a = Block::produce(gen.number, gen.block_hash, 1, 0, b"a".to_vec(), vec![], &f.sks[0]);
        let b = Block::produce(gen.number, gen.block_hash, 1, 0, b"b".to_vec(), vec![], &f.sks[0]);
        cache.admit_one(a.clone(), ctx(&f, 1, 2)).ok();
        cache.admit_one(b.clone(), ctx(&f, 1, 2)).ok();
        let expected = if a.block_hash < b.block_hash { a.block_hash } else { b.block_hash };
        assert_eq!(cache.longest_chain().head_hash, expected);
    }

    #[test]
    fn orphan_is_admitted_once_parent_arrives() {
        let f = fixture(1);
        let gen = genesis(&f.sks);
        let mut cache = BlockCache::new(gen.clone());
        let b = child(&gen, &f, 1);
        let c = child(&b, &f, 2);

        let outcome = cache.add(c.clone(), ctx(&f, 2, 5)).unwrap();
        assert_eq!(outcome, AdmitOutcome::Pending);
        assert_eq!(cache.orphan_pool_len(), 1);

        let outcome = cache.add(b.clone(), ctx(&f, 2, 5)).unwrap();
        assert!(matches!(outcome, AdmitOutcome::Admitted(h) if h == b.block_hash));
        assert!(cache.orphan_pool_len() == 0);
        assert!(cache.longest_chain().head_hash == c.block_hash);
    }

    #[test]
    fn duplicate_add_is_rejected_and_cache_unchanged() {
        let f = fixture(1);
        let gen = genesis(&f.sks);
        let mut cache = BlockCache::new(gen.clone());
        let b = child(&gen, &f, 1);
        cache.add(b.clone(), ctx(&f, 1, 5)).unwrap();
        let before = cache.longest_chain();
        let err = cache.add(b, ctx(&f, 1, 5)).unwrap_err();
        assert_eq!(err, AdmitError::Duplicate);
        assert_eq!(cache.longest_chain(), before);
    }

    #[test]
    fn replaying_confirmed_stream_reproduces_same_prefix() {
        let f = fixture(1);
        let gen = genesis(&f.sks);
        let mut source = BlockCache::new(gen.clone());
        let mut rx = source.subscribe_confirmed();

        let mut parent = gen.clone();
        for slot in 1..=5 {
            let blk = child(&parent, &f, slot);
            parent = blk.clone();
            // threshold 1 confirms every block as soon as it lands on the
            // head chain, so each `add` pushes exactly one block onto the stream.
            source.add(blk, ctx(&f, slot, 1)).unwrap();
        }

        let mut replay = BlockCache::new(gen);
        while let Ok(block) = rx.try_recv() {
            let slot = block.time;
            replay.add(block, ctx(&f, slot, 1)).unwrap();
        }
        assert_eq!(replay.confirmed_length(), source.confirmed_length());
        assert_eq!(
            replay.longest_chain().head_hash,
            source.longest_chain().head_hash
        );
    }
}
