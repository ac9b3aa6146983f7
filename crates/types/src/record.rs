use crate::hash::{BlockHash, BlockId};
use serde::{Deserialize, Serialize};

/// Per-block entry written by the DAG core when a block is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: BlockId,
    pub hash: BlockHash,
    pub parents: Vec<BlockHash>,
    pub layer: u64,
}

/// DAG-wide metadata rewritten on every commit and rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagMetadata {
    /// Number of blocks, i.e. the next id to assign.
    pub total: u32,
    pub genesis: BlockHash,
    pub tips: Vec<BlockHash>,
    pub main_tip: BlockHash,
    /// Colouring parameter `k` the stored blocks were ordered with.
    pub anticone_size: u32,
    /// Limit in force while the stored blocks were added; replay reuses it.
    pub tips_distance_limit: u64,
}
