//! Error types for the BlockDAG core

use blockdag_storage::StorageError;
use blockdag_types::{BlockHash, BlockId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagError {
    #[error("unknown parent {0}")]
    UnknownParent(BlockHash),

    #[error("block {0} already exists")]
    DuplicateBlock(BlockHash),

    #[error("block {0} declares no parents")]
    MissingParents(BlockHash),

    #[error("nothing to roll back")]
    NothingToRollback,

    #[error("unknown block {0}")]
    UnknownBlock(BlockHash),

    #[error("unknown block id {0}")]
    UnknownId(BlockId),

    #[error("empty parent set")]
    EmptyParentSet,

    #[error("main parent {0} is off the main chain")]
    OffMainChain(BlockHash),

    #[error("genesis mismatch: expected {expected}, found {found}")]
    GenesisMismatch { expected: BlockHash, found: BlockHash },

    #[error("block data for {0} unavailable during load")]
    MissingBlockData(BlockHash),

    #[error("no stored block with id {0}")]
    MissingRecord(BlockId),

    #[error("no DAG metadata in store")]
    MissingMetadata,

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, DagError>;
