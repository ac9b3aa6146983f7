//! DAG vertices and the id-indexed arena that owns them.

use crate::idset::IdSet;
use blockdag_types::{BlockData, BlockHash, BlockId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Classification of a block relative to the current virtual tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockStatus {
    #[default]
    Unclassified,
    Blue,
    Red,
}

/// Selects which blocks a walk hands to its visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFilter {
    All,
    Blue,
    Red,
}

impl BlockFilter {
    pub fn accepts(self, status: BlockStatus) -> bool {
        match self {
            BlockFilter::All => true,
            BlockFilter::Blue => status == BlockStatus::Blue,
            BlockFilter::Red => status == BlockStatus::Red,
        }
    }
}

/// A block linked into the DAG.
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub(crate) id: BlockId,
    pub(crate) hash: BlockHash,
    pub(crate) data: Arc<dyn BlockData>,
    pub(crate) parents: IdSet,
    pub(crate) children: IdSet,
    pub(crate) main_parent: Option<BlockId>,
    pub(crate) layer: u64,
    pub(crate) chain_height: u64,
    pub(crate) blue_score: u64,
    /// Merge set split by colour, excluding the main parent.
    pub(crate) blue_merge: Vec<BlockId>,
    pub(crate) red_merge: Vec<BlockId>,
    pub(crate) order: u32,
    pub(crate) status: BlockStatus,
}

impl BlockNode {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn data(&self) -> &Arc<dyn BlockData> {
        &self.data
    }

    pub fn parents(&self) -> &IdSet {
        &self.parents
    }

    pub fn children(&self) -> &IdSet {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// `None` only for genesis.
    pub fn main_parent(&self) -> Option<BlockId> {
        self.main_parent
    }

    /// Longest-path distance from genesis.
    pub fn layer(&self) -> u64 {
        self.layer
    }

    /// Main-parent hops to genesis.
    pub fn chain_height(&self) -> u64 {
        self.chain_height
    }

    /// Number of blue blocks in this block's past.
    pub fn blue_score(&self) -> u64 {
        self.blue_score
    }

    pub fn blue_merge(&self) -> &[BlockId] {
        &self.blue_merge
    }

    pub fn red_merge(&self) -> &[BlockId] {
        &self.red_merge
    }

    /// Blocks this block pulled into its past besides its main parent's past.
    pub fn merge_set_len(&self) -> usize {
        self.blue_merge.len() + self.red_merge.len()
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn status(&self) -> BlockStatus {
        self.status
    }

    pub fn is_blue(&self) -> bool {
        self.status == BlockStatus::Blue
    }

    pub fn is_genesis(&self) -> bool {
        self.main_parent.is_none()
    }
}

/// Dense storage of all nodes, indexed by id.
#[derive(Debug, Default)]
pub(crate) struct BlockArena {
    nodes: Vec<BlockNode>,
}

impl BlockArena {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn next_id(&self) -> BlockId {
        self.nodes.len() as BlockId
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockNode> {
        self.nodes.get(id as usize)
    }

    /// Node lookup for ids the DAG itself handed out.
    pub fn node(&self, id: BlockId) -> &BlockNode {
        &self.nodes[id as usize]
    }

    pub fn node_mut(&mut self, id: BlockId) -> &mut BlockNode {
        &mut self.nodes[id as usize]
    }

    pub fn push(&mut self, node: BlockNode) {
        debug_assert_eq!(node.id as usize, self.nodes.len());
        self.nodes.push(node);
    }

    pub fn pop(&mut self) -> Option<BlockNode> {
        self.nodes.pop()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockNode> {
        self.nodes.iter()
    }

    pub fn blue_score(&self, id: BlockId) -> u64 {
        self.node(id).blue_score
    }

    /// True when `ancestor` is in the strict past of `descendant`.
    ///
    /// Layers strictly increase along child edges, so the walk never descends
    /// to or below the ancestor's layer.
    pub fn is_ancestor(&self, ancestor: BlockId, descendant: BlockId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let floor = self.node(ancestor).layer;
        if self.node(descendant).layer <= floor {
            return false;
        }

        let mut stack = vec![descendant];
        let mut visited = IdSet::new();
        while let Some(current) = stack.pop() {
            for parent in self.node(current).parents.ids() {
                if parent == ancestor {
                    return true;
                }
                if self.node(parent).layer > floor && visited.add(parent) {
                    stack.push(parent);
                }
            }
        }
        false
    }

    /// Every block reachable through parent edges.
    pub fn past(&self, id: BlockId) -> IdSet {
        self.closure(id, |node| &node.parents)
    }

    /// Every block reachable through child edges.
    pub fn future(&self, id: BlockId) -> IdSet {
        self.closure(id, |node| &node.children)
    }

    fn closure<F>(&self, id: BlockId, edges: F) -> IdSet
    where
        F: Fn(&BlockNode) -> &IdSet,
    {
        let mut seen = IdSet::new();
        let mut queue: VecDeque<BlockId> = edges(self.node(id)).ids().collect();
        while let Some(current) = queue.pop_front() {
            if !seen.add(current) {
                continue;
            }
            queue.extend(edges(self.node(current)).ids().filter(|next| !seen.has(*next)));
        }
        seen
    }

    /// Blocks neither in the past nor the future of `id`, at most `limit`.
    pub fn anticone(&self, id: BlockId, limit: Option<usize>) -> IdSet {
        let past = self.past(id);
        let future = self.future(id);
        let cap = limit.unwrap_or(usize::MAX);
        self.iter()
            .map(|node| node.id)
            .filter(|other| *other != id && !past.has(*other) && !future.has(*other))
            .take(cap)
            .collect()
    }

    /// Strict preference used for main-parent and main-tip selection: the
    /// greater blue score wins, the lower id breaks ties.
    pub fn is_preferred(&self, candidate: BlockId, incumbent: BlockId) -> bool {
        let (a, b) = (self.node(candidate), self.node(incumbent));
        a.blue_score > b.blue_score || (a.blue_score == b.blue_score && a.id < b.id)
    }

    /// Most preferred id of a non-empty set.
    pub fn best_of<I: IntoIterator<Item = BlockId>>(&self, ids: I) -> Option<BlockId> {
        ids.into_iter().reduce(|best, id| {
            if self.is_preferred(id, best) {
                id
            } else {
                best
            }
        })
    }

    /// Sort key for emitting blocks into the virtual order:
    /// blue score descending, then id ascending.
    pub fn sort_for_emission(&self, ids: &mut [BlockId]) {
        ids.sort_by(|a, b| {
            self.blue_score(*b)
                .cmp(&self.blue_score(*a))
                .then(a.cmp(b))
        });
    }

    /// Topological sort key used by colouring: blue score ascending, then id.
    pub fn sort_topologically(&self, ids: &mut [BlockId]) {
        ids.sort_by_key(|id| (self.blue_score(*id), *id));
    }
}
