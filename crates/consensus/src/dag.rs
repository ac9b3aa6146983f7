//! Block DAG container.
//!
//! Owns every block, the hash index, the tip set and the main chain, and keeps
//! the virtual order current after each addition. Only the most recent
//! addition can be undone.

use crate::block::{BlockArena, BlockFilter, BlockNode, BlockStatus};
use crate::config::DagConfig;
use crate::error::{DagError, Result};
use crate::idset::IdSet;
use crate::phantom::Phantom;
use blockdag_storage::DagStore;
use blockdag_types::{BlockData, BlockHash, BlockId, BlockRecord, DagMetadata};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a successful [`BlockDag::add_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedBlock {
    pub id: BlockId,
    /// The new block replaced the previous main tip.
    pub main_tip_changed: bool,
}

/// State needed to undo the most recent addition.
#[derive(Debug, Clone)]
struct Snapshot {
    added: BlockId,
    tips: IdSet,
    main_tip: BlockId,
    /// First order position the addition was allowed to rewrite.
    fork_order: usize,
    /// Blocks that sat at `fork_order..` before the addition.
    tail: Vec<(BlockId, BlockStatus)>,
    diff_anticone: IdSet,
}

pub struct BlockDag {
    pub(crate) phantom: Phantom,
    pub(crate) tips_distance_limit: u64,
    pub(crate) arena: BlockArena,
    pub(crate) hash_index: HashMap<BlockHash, BlockId>,
    pub(crate) tips: IdSet,
    pub(crate) main_tip: BlockId,
    /// Main chain indexed by chain height.
    pub(crate) main_chain: Vec<BlockId>,
    /// Virtual order: position -> id.
    pub(crate) by_order: Vec<BlockId>,
    /// Blocks outside the past of the main tip.
    pub(crate) diff_anticone: IdSet,
    pending: Option<Snapshot>,
    pub(crate) store: Option<Arc<dyn DagStore>>,
}

impl fmt::Debug for BlockDag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDag")
            .field("anticone_size", &self.phantom.anticone_size())
            .field("total", &self.arena.len())
            .field("tips", &self.tips)
            .field("main_tip", &self.main_tip)
            .field("pending_rollback", &self.pending.is_some())
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl BlockDag {
    /// Create a DAG holding only `genesis`.
    ///
    /// With a store attached the genesis record and the initial metadata are
    /// written before returning.
    pub fn new(
        config: &DagConfig,
        genesis: Arc<dyn BlockData>,
        store: Option<Arc<dyn DagStore>>,
    ) -> Result<Self> {
        let mut dag = Self::detached(config, genesis);
        if let Some(store) = store {
            let record = dag.record(0);
            store.commit_block(&record, &dag.metadata())?;
            dag.store = Some(store);
        }
        Ok(dag)
    }

    /// Genesis-only DAG with no store; used by `new` and by replay.
    pub(crate) fn detached(config: &DagConfig, genesis: Arc<dyn BlockData>) -> Self {
        if !genesis.parents().is_empty() {
            warn!(hash = %genesis.hash(), "genesis declares parents; ignoring them");
        }
        let hash = genesis.hash();
        let node = BlockNode {
            id: 0,
            hash,
            data: genesis,
            parents: IdSet::new(),
            children: IdSet::new(),
            main_parent: None,
            layer: 0,
            chain_height: 0,
            blue_score: 0,
            blue_merge: Vec::new(),
            red_merge: Vec::new(),
            order: 0,
            status: BlockStatus::Blue,
        };

        let mut arena = BlockArena::default();
        arena.push(node);

        Self {
            phantom: Phantom::new(config.anticone_size),
            tips_distance_limit: config.tips_distance_limit,
            arena,
            hash_index: HashMap::from([(hash, 0)]),
            tips: IdSet::from_ids([0]),
            main_tip: 0,
            main_chain: vec![0],
            by_order: vec![0],
            diff_anticone: IdSet::new(),
            pending: None,
            store: None,
        }
    }

    /// Insert a block whose parents are all known.
    pub fn add_block(&mut self, data: Arc<dyn BlockData>) -> Result<AddedBlock> {
        let hash = data.hash();
        if self.hash_index.contains_key(&hash) {
            return Err(DagError::DuplicateBlock(hash));
        }
        if data.parents().is_empty() {
            return Err(DagError::MissingParents(hash));
        }

        let mut parents = IdSet::new();
        for parent in data.parents() {
            let parent_id = self
                .hash_index
                .get(parent)
                .copied()
                .ok_or(DagError::UnknownParent(*parent))?;
            parents.add(parent_id);
        }

        let id = self.arena.next_id();
        let main_parent = self
            .phantom
            .main_parent(&self.arena, &parents)
            .ok_or(DagError::MissingParents(hash))?;
        let merge_set = self.phantom.merge_set(&self.arena, main_parent, &parents);
        let coloring = self.phantom.classify(&self.arena, main_parent, &merge_set);

        let layer = 1 + parents
            .ids()
            .map(|parent| self.arena.node(parent).layer)
            .max()
            .unwrap_or(0);
        let parent_node = self.arena.node(main_parent);
        let blue_score = parent_node.blue_score + 1 + coloring.blues.len() as u64;
        let chain_height = parent_node.chain_height + 1;

        let old_main = self.main_tip;
        let becomes_main = parents.has(old_main) || blue_score > self.arena.blue_score(old_main);
        let fork_point = if becomes_main {
            self.chain_junction(main_parent)
        } else {
            old_main
        };

        let fork_order = self.arena.node(fork_point).order as usize + 1;
        let snapshot = Snapshot {
            added: id,
            tips: self.tips.clone(),
            main_tip: old_main,
            fork_order,
            tail: self.by_order[fork_order..]
                .iter()
                .map(|member| (*member, self.arena.node(*member).status))
                .collect(),
            diff_anticone: self.diff_anticone.clone(),
        };

        for parent in parents.ids() {
            self.arena.node_mut(parent).children.add(id);
        }
        for parent in parents.ids() {
            self.tips.remove(parent);
        }
        self.arena.push(BlockNode {
            id,
            hash,
            data,
            parents,
            children: IdSet::new(),
            main_parent: Some(main_parent),
            layer,
            chain_height,
            blue_score,
            blue_merge: coloring.blues,
            red_merge: coloring.reds,
            order: 0,
            status: BlockStatus::Unclassified,
        });
        self.hash_index.insert(hash, id);
        self.tips.add(id);
        if becomes_main {
            self.main_tip = id;
        }
        self.prune_tips();
        self.rebuild_main_chain();
        self.reorder(fork_order, Some(id));

        if let Some(store) = self.store.clone() {
            let record = self.record(id);
            if let Err(err) = store.commit_block(&record, &self.metadata()) {
                warn!(%hash, id, error = %err, "failed to persist block; undoing addition");
                self.restore(snapshot);
                return Err(err.into());
            }
        }

        debug!(
            %hash,
            id,
            layer,
            blue_score,
            main_tip = self.main_tip,
            "added block"
        );
        self.pending = Some(snapshot);
        Ok(AddedBlock {
            id,
            main_tip_changed: becomes_main,
        })
    }

    /// Undo the most recent [`add_block`](Self::add_block).
    pub fn rollback(&mut self) -> Result<()> {
        let snapshot = self.pending.as_ref().ok_or(DagError::NothingToRollback)?;
        let removed = snapshot.added;
        let hash = self.arena.node(removed).hash;

        // The store must accept the removal before memory is touched.
        if let Some(store) = &self.store {
            let metadata = DagMetadata {
                total: removed,
                genesis: self.genesis_hash(),
                tips: snapshot
                    .tips
                    .ids()
                    .map(|id| self.arena.node(id).hash)
                    .collect(),
                main_tip: self.arena.node(snapshot.main_tip).hash,
                anticone_size: self.phantom.anticone_size(),
                tips_distance_limit: self.tips_distance_limit,
            };
            if let Err(err) = store.remove_block(removed, &hash, &metadata) {
                warn!(%hash, id = removed, error = %err, "failed to persist rollback; keeping block");
                return Err(err.into());
            }
        }

        if let Some(snapshot) = self.pending.take() {
            self.restore(snapshot);
        }
        debug!(%hash, id = removed, "rolled back block");
        Ok(())
    }

    /// Change the tip distance limit and prune the tip set against it.
    ///
    /// The new limit is persisted with the DAG metadata. On success the
    /// pending rollback snapshot is dropped, as its tip set predates the
    /// change.
    pub fn set_tips_distance_limit(&mut self, limit: u64) -> Result<()> {
        if limit == self.tips_distance_limit {
            return Ok(());
        }
        let previous = (self.tips_distance_limit, self.tips.clone());
        self.tips_distance_limit = limit;
        self.prune_tips();

        if let Some(store) = &self.store {
            if let Err(err) = store.put_dag_metadata(&self.metadata()) {
                warn!(limit, error = %err, "failed to persist tips distance limit");
                (self.tips_distance_limit, self.tips) = previous;
                return Err(err.into());
            }
        }
        self.pending = None;
        debug!(limit, tips = self.tips.len(), "changed tips distance limit");
        Ok(())
    }

    /// Drop the rollback snapshot; the last addition becomes permanent.
    pub fn commit(&mut self) {
        self.pending = None;
    }

    pub fn can_rollback(&self) -> bool {
        self.pending.is_some()
    }

    fn restore(&mut self, snapshot: Snapshot) {
        if let Some(node) = self.arena.pop() {
            debug_assert_eq!(node.id, snapshot.added);
            self.hash_index.remove(&node.hash);
            for parent in node.parents.ids() {
                self.arena.node_mut(parent).children.remove(node.id);
            }
        }

        self.tips = snapshot.tips;
        self.main_tip = snapshot.main_tip;
        self.rebuild_main_chain();

        self.by_order.truncate(snapshot.fork_order);
        for (id, status) in snapshot.tail {
            let node = self.arena.node_mut(id);
            node.order = self.by_order.len() as u32;
            node.status = status;
            self.by_order.push(id);
        }
        self.diff_anticone = snapshot.diff_anticone;
    }

    /// First block on the current main chain reached from `from` by
    /// following main parents.
    fn chain_junction(&self, from: BlockId) -> BlockId {
        let mut cursor = from;
        while !self.on_main_chain(cursor) {
            match self.arena.node(cursor).main_parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        cursor
    }

    fn on_main_chain(&self, id: BlockId) -> bool {
        let height = self.arena.node(id).chain_height as usize;
        self.main_chain.get(height) == Some(&id)
    }

    fn rebuild_main_chain(&mut self) {
        let mut extension = Vec::new();
        let mut cursor = self.main_tip;
        while !self.on_main_chain(cursor) {
            extension.push(cursor);
            match self.arena.node(cursor).main_parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        let keep = self.arena.node(cursor).chain_height as usize + 1;
        self.main_chain.truncate(keep);
        self.main_chain.extend(extension.into_iter().rev());
    }

    /// Evict tips lying more than the limit below the highest tip.
    fn prune_tips(&mut self) {
        let arena = &self.arena;
        let Some(max_layer) = self.tips.ids().map(|tip| arena.node(tip).layer).max() else {
            return;
        };
        let limit = self.tips_distance_limit;
        let main_tip = self.main_tip;
        self.tips.retain(|tip, _| {
            tip == main_tip || max_layer - arena.node(tip).layer <= limit
        });
    }

    /// Recompute order and status of every block at position `fork` or later,
    /// plus `added`.
    fn reorder(&mut self, fork: usize, added: Option<BlockId>) {
        let mut pending: IdSet = self.by_order.drain(fork..).collect();
        if let Some(id) = added {
            pending.add(id);
        }

        let start = self
            .by_order
            .last()
            .filter(|last| self.on_main_chain(**last))
            .map(|last| self.arena.node(*last).chain_height as usize + 1)
            .unwrap_or(0);

        for height in start..self.main_chain.len() {
            let chain_block = self.main_chain[height];
            if !pending.has(chain_block) {
                continue;
            }
            let node = self.arena.node(chain_block);
            let blues = node.blue_merge.clone();
            let reds = node.red_merge.clone();
            let mut merged: Vec<BlockId> = blues.iter().chain(reds.iter()).copied().collect();
            self.arena.sort_for_emission(&mut merged);

            for member in merged {
                self.emit(member, &mut pending);
            }
            self.set_status(&blues, BlockStatus::Blue);
            self.set_status(&reds, BlockStatus::Red);
            self.emit(chain_block, &mut pending);
            self.arena.node_mut(chain_block).status = BlockStatus::Blue;
        }

        // Whatever is left is the virtual block's merge set.
        let leftovers = pending.clone();
        let coloring = self.phantom.classify(&self.arena, self.main_tip, &leftovers);
        self.set_status(&coloring.blues, BlockStatus::Blue);
        self.set_status(&coloring.reds, BlockStatus::Red);

        let mut rest = leftovers.to_vec();
        self.arena.sort_for_emission(&mut rest);
        for member in rest {
            self.emit(member, &mut pending);
        }
        self.diff_anticone = leftovers;
    }

    /// Append `root` to the order after its still-pending ancestors.
    fn emit(&mut self, root: BlockId, pending: &mut IdSet) {
        let mut stack = vec![(root, false)];
        while let Some((id, ready)) = stack.pop() {
            if ready {
                self.arena.node_mut(id).order = self.by_order.len() as u32;
                self.by_order.push(id);
                continue;
            }
            if pending.remove(id).is_none() {
                continue;
            }
            stack.push((id, true));

            let mut parents: Vec<BlockId> = self
                .arena
                .node(id)
                .parents
                .ids()
                .filter(|parent| pending.has(*parent))
                .collect();
            self.arena.sort_for_emission(&mut parents);
            stack.extend(parents.into_iter().rev().map(|parent| (parent, false)));
        }
    }

    fn set_status(&mut self, ids: &[BlockId], status: BlockStatus) {
        for id in ids {
            self.arena.node_mut(*id).status = status;
        }
    }

    /// Recompute the whole virtual order from genesis.
    pub fn update_virtual_block_order(&mut self) {
        self.reorder(1, None);
    }

    pub(crate) fn record(&self, id: BlockId) -> BlockRecord {
        let node = self.arena.node(id);
        BlockRecord {
            id,
            hash: node.hash,
            parents: node.data.parents().to_vec(),
            layer: node.layer,
        }
    }

    pub(crate) fn metadata(&self) -> DagMetadata {
        DagMetadata {
            total: self.block_total(),
            genesis: self.genesis_hash(),
            tips: self.tip_hashes(),
            main_tip: self.arena.node(self.main_tip).hash,
            anticone_size: self.phantom.anticone_size(),
            tips_distance_limit: self.tips_distance_limit,
        }
    }

    fn checked(&self, id: BlockId) -> Result<&BlockNode> {
        self.arena.get(id).ok_or(DagError::UnknownId(id))
    }

    // Accessors

    pub fn anticone_size(&self) -> u32 {
        self.phantom.anticone_size()
    }

    pub fn tips_distance_limit(&self) -> u64 {
        self.tips_distance_limit
    }

    pub fn block(&self, id: BlockId) -> Option<&BlockNode> {
        self.arena.get(id)
    }

    pub fn block_by_hash(&self, hash: &BlockHash) -> Option<&BlockNode> {
        self.block_id(hash).map(|id| self.arena.node(id))
    }

    pub fn block_id(&self, hash: &BlockHash) -> Option<BlockId> {
        self.hash_index.get(hash).copied()
    }

    pub fn has_block(&self, hash: &BlockHash) -> bool {
        self.hash_index.contains_key(hash)
    }

    pub fn block_by_order(&self, order: u32) -> Option<&BlockNode> {
        self.by_order
            .get(order as usize)
            .map(|id| self.arena.node(*id))
    }

    pub fn block_total(&self) -> u32 {
        self.arena.len() as u32
    }

    pub fn genesis(&self) -> &BlockNode {
        self.arena.node(0)
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis().hash
    }

    pub fn main_chain_tip(&self) -> &BlockNode {
        self.arena.node(self.main_tip)
    }

    /// Check that a block built on `parents` would extend the main chain.
    ///
    /// Returns the main parent the block would get, provided it lies on the
    /// current main chain.
    pub fn check_sub_main_chain_tip(&self, parents: &[BlockHash]) -> Result<BlockId> {
        let mut ids = IdSet::new();
        for parent in parents {
            let id = self.block_id(parent).ok_or(DagError::UnknownBlock(*parent))?;
            ids.add(id);
        }
        let main_parent = self
            .phantom
            .main_parent(&self.arena, &ids)
            .ok_or(DagError::EmptyParentSet)?;
        if !self.on_main_chain(main_parent) {
            return Err(DagError::OffMainChain(self.arena.node(main_parent).hash));
        }
        Ok(main_parent)
    }

    pub fn tips(&self) -> &IdSet {
        &self.tips
    }

    pub fn tip_hashes(&self) -> Vec<BlockHash> {
        self.tips.ids().map(|id| self.arena.node(id).hash).collect()
    }

    /// Most recently added block.
    pub fn last_block(&self) -> &BlockNode {
        self.arena.node(self.arena.next_id() - 1)
    }

    /// Hashes in virtual order.
    pub fn order_snapshot(&self) -> Vec<BlockHash> {
        self.by_order
            .iter()
            .map(|id| self.arena.node(*id).hash)
            .collect()
    }

    pub fn main_chain(&self) -> &[BlockId] {
        &self.main_chain
    }

    pub fn store(&self) -> Option<&Arc<dyn DagStore>> {
        self.store.as_ref()
    }

    // Traversal and queries

    pub fn past_set(&self, id: BlockId) -> Result<IdSet> {
        self.checked(id)?;
        Ok(self.arena.past(id))
    }

    pub fn future_set(&self, id: BlockId) -> Result<IdSet> {
        self.checked(id)?;
        Ok(self.arena.future(id))
    }

    pub fn anticone(&self, id: BlockId, limit: Option<usize>) -> Result<IdSet> {
        self.checked(id)?;
        Ok(self.arena.anticone(id, limit))
    }

    /// True when `ancestor` is in the strict past of `descendant`.
    pub fn is_ancestor(&self, ancestor: BlockId, descendant: BlockId) -> Result<bool> {
        self.checked(ancestor)?;
        self.checked(descendant)?;
        Ok(self.arena.is_ancestor(ancestor, descendant))
    }

    pub fn is_on_main_chain(&self, id: BlockId) -> bool {
        self.arena.get(id).is_some() && self.on_main_chain(id)
    }

    pub fn layer(&self, id: BlockId) -> Result<u64> {
        Ok(self.checked(id)?.layer)
    }

    /// Visit blocks ordered before `start`, latest first.
    ///
    /// At most `max_depth` blocks are walked; filtered-out blocks count
    /// towards the depth. The visitor stops the walk by returning `Ok(false)`.
    pub fn for_each<E, F>(
        &self,
        start: BlockId,
        max_depth: Option<usize>,
        filter: BlockFilter,
        mut visitor: F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(&BlockNode) -> std::result::Result<bool, E>,
    {
        let Some(start) = self.arena.get(start) else {
            return Ok(());
        };
        let depth = max_depth.unwrap_or(usize::MAX);

        for position in (0..start.order as usize).rev().take(depth) {
            let node = self.arena.node(self.by_order[position]);
            if !filter.accepts(node.status) {
                continue;
            }
            if !visitor(node)? {
                break;
            }
        }
        Ok(())
    }

    /// Main-chain depth at which `id` got merged, counted from the main tip.
    ///
    /// The main tip itself has one confirmation; blocks outside the main
    /// tip's past have none.
    pub fn confirmations(&self, id: BlockId) -> Result<u64> {
        let node = self.checked(id)?;
        let tip = self.arena.node(self.main_tip);
        if node.order > tip.order {
            return Ok(0);
        }

        let merged_by = self.by_order[node.order as usize..]
            .iter()
            .copied()
            .find(|candidate| self.on_main_chain(*candidate))
            .unwrap_or(self.main_tip);
        Ok(tip.chain_height - self.arena.node(merged_by).chain_height + 1)
    }

    /// Smallest layer distance from `id` to a confirming block that has `id`
    /// in its past (or is `id`). Zero when none does.
    pub fn maturity(&self, id: BlockId, confirming: &[BlockId]) -> Result<u64> {
        let layer = self.checked(id)?.layer;
        let mut best: Option<u64> = None;
        for confirmer in confirming {
            let Some(node) = self.arena.get(*confirmer) else {
                continue;
            };
            if *confirmer != id && !self.arena.is_ancestor(id, *confirmer) {
                continue;
            }
            let distance = node.layer - layer;
            best = Some(best.map_or(distance, |current| current.min(distance)));
        }
        Ok(best.unwrap_or(0))
    }

    /// True when every other block is in the past or future of `id`.
    pub fn is_hourglass(&self, id: BlockId) -> Result<bool> {
        self.checked(id)?;
        let related = self.arena.past(id).len() + self.arena.future(id).len() + 1;
        Ok(related == self.arena.len())
    }

    /// Size of the block's merge set: the part of its past lying in its main
    /// parent's anticone.
    pub fn main_parent_concurrency(&self, id: BlockId) -> Result<usize> {
        Ok(self.checked(id)?.merge_set_len())
    }

    /// Size of the block's anticone in the whole DAG.
    pub fn block_concurrency(&self, hash: &BlockHash) -> Result<usize> {
        let id = self.block_id(hash).ok_or(DagError::UnknownBlock(*hash))?;
        Ok(self.arena.anticone(id, None).len())
    }

    /// Blocks not yet in the main tip's past.
    pub fn diff_anticone(&self) -> &IdSet {
        &self.diff_anticone
    }

    /// Blue members of [`diff_anticone`](Self::diff_anticone).
    pub fn diff_blue_set(&self) -> IdSet {
        self.diff_anticone
            .ids()
            .filter(|id| self.arena.node(*id).is_blue())
            .collect()
    }
}
