//! BlockDAG ordering core.
//! Maintains the block DAG, colours blocks blue or red PHANTOM-style and
//! derives a deterministic total order from the colouring.

pub mod anticone;
pub mod block;
pub mod config;
pub mod dag;
pub mod error;
pub mod idset;
pub mod persistence;
pub mod phantom;
pub mod sync;

pub use anticone::{anticone_bound, AnticoneEstimator, BLOCK_DELAY_SECS, SECURITY_LEVEL};
pub use block::{BlockFilter, BlockNode, BlockStatus};
pub use config::{ConfigError, DagConfig, NetworkTiming};
pub use dag::{AddedBlock, BlockDag};
pub use error::{DagError, Result};
pub use idset::IdSet;
pub use phantom::Phantom;
pub use sync::GraphState;

use parking_lot::RwLock;
use std::sync::Arc;

/// One writer, many readers.
pub type SharedBlockDag = Arc<RwLock<BlockDag>>;

/// Wrap a DAG for sharing across threads.
pub fn shared(dag: BlockDag) -> SharedBlockDag {
    Arc::new(RwLock::new(dag))
}
