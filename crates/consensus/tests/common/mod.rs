#![allow(dead_code)]

use blockdag_consensus::{AddedBlock, BlockDag, BlockStatus, DagConfig};
use blockdag_storage::DagStore;
use blockdag_types::{BlockData, BlockHash, BlockId, RawBlock};
use std::collections::HashMap;
use std::sync::Arc;

/// Parent lists by label; "A" is always genesis.
pub type Figure = &'static [(char, &'static str)];

pub const FIG1: Figure = &[
    ('B', "A"),
    ('C', "A"),
    ('D', "A"),
    ('E', "A"),
    ('F', "BC"),
    ('G', "D"),
    ('H', "FGE"),
    ('I', "H"),
    ('J', "IE"),
];

pub const FIG2: Figure = &[
    ('B', "A"),
    ('C', "A"),
    ('D', "A"),
    ('E', "A"),
    ('F', "BC"),
    ('G', "CD"),
    ('H', "E"),
    ('I', "FG"),
    ('J', "GH"),
    ('K', "IJ"),
];

pub const FIG4: Figure = &[
    ('B', "A"),
    ('C', "B"),
    ('D', "C"),
    ('E', "D"),
    ('X', "A"),
    ('Y', "X"),
    ('Z', "Y"),
    ('F', "EZ"),
    ('G', "F"),
    ('H', "GD"),
];

/// Two hourglass points: everything funnels through J.
pub const CUT_POINT: Figure = &[
    ('B', "A"),
    ('C', "A"),
    ('J', "BC"),
    ('D', "J"),
    ('E', "J"),
    ('F', "DE"),
];

pub const FAN: Figure = &[('B', "A"), ('C', "A"), ('D', "A"), ('E', "A")];

pub fn raw_block(label: char, parents: Vec<BlockHash>) -> Arc<RawBlock> {
    Arc::new(RawBlock::new(parents, 0, label.to_string().into_bytes()))
}

pub fn genesis_block() -> Arc<RawBlock> {
    Arc::new(RawBlock::genesis(b"A".to_vec()))
}

/// A DAG built from labelled blocks, with the data kept for replay.
pub struct Fixture {
    pub dag: BlockDag,
    pub blocks: HashMap<BlockHash, Arc<RawBlock>>,
    labels: HashMap<char, BlockHash>,
}

impl Fixture {
    pub fn new(config: DagConfig) -> Self {
        Self::open(config, None)
    }

    pub fn open(config: DagConfig, store: Option<Arc<dyn DagStore>>) -> Self {
        let genesis = genesis_block();
        let dag = BlockDag::new(&config, genesis.clone(), store).expect("genesis");
        let mut fixture = Self {
            dag,
            blocks: HashMap::new(),
            labels: HashMap::new(),
        };
        fixture.remember('A', genesis);
        fixture
    }

    pub fn build(anticone_size: u32, figure: Figure) -> Self {
        let mut fixture = Self::new(DagConfig::new(anticone_size, 100));
        fixture.extend(figure);
        fixture
    }

    pub fn extend(&mut self, figure: &[(char, &str)]) {
        for (label, parents) in figure {
            self.add(*label, parents).expect("fixture block");
        }
    }

    pub fn add(&mut self, label: char, parents: &str) -> blockdag_consensus::Result<AddedBlock> {
        let parents = parents.chars().map(|p| self.hash(p)).collect();
        let block = raw_block(label, parents);
        let added = self.dag.add_block(block.clone())?;
        self.remember(label, block);
        Ok(added)
    }

    fn remember(&mut self, label: char, block: Arc<RawBlock>) {
        self.labels.insert(label, block.hash);
        self.blocks.insert(block.hash, block);
    }

    pub fn fetch(&self) -> impl FnMut(&BlockHash) -> Option<Arc<dyn BlockData>> + '_ {
        |hash| {
            self.blocks
                .get(hash)
                .map(|block| block.clone() as Arc<dyn BlockData>)
        }
    }

    pub fn hash(&self, label: char) -> BlockHash {
        self.labels[&label]
    }

    pub fn id(&self, label: char) -> BlockId {
        self.dag.block_id(&self.hash(label)).expect("known label")
    }

    pub fn label(&self, id: BlockId) -> char {
        let hash = self.dag.block(id).expect("known id").hash();
        self.label_of(&hash)
    }

    pub fn label_of(&self, hash: &BlockHash) -> char {
        self.labels
            .iter()
            .find(|(_, candidate)| *candidate == hash)
            .map(|(label, _)| *label)
            .expect("labelled hash")
    }

    /// Labels joined in ascending label order.
    pub fn labels<I: IntoIterator<Item = BlockId>>(&self, ids: I) -> String {
        let mut labels: Vec<char> = ids.into_iter().map(|id| self.label(id)).collect();
        labels.sort();
        labels.into_iter().collect()
    }

    /// Labels in virtual order.
    pub fn order(&self) -> String {
        self.dag
            .order_snapshot()
            .iter()
            .map(|hash| self.label_of(hash))
            .collect()
    }

    pub fn main_chain(&self) -> String {
        self.dag.main_chain().iter().map(|id| self.label(*id)).collect()
    }

    pub fn with_status(&self, status: BlockStatus) -> String {
        let ids = (0..self.dag.block_total())
            .filter(|id| self.dag.block(*id).map(|node| node.status()) == Some(status));
        self.labels(ids)
    }

    pub fn tips(&self) -> String {
        self.labels(self.dag.tips().ids())
    }

    /// Layer of each block, as digits, in virtual order.
    pub fn layer_digits(&self) -> String {
        (0..self.dag.block_total())
            .filter_map(|order| self.dag.block_by_order(order))
            .map(|node| node.layer().to_string())
            .collect()
    }
}
