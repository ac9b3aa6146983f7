//! Block identity and persisted record types shared by the BlockDAG crates.

pub mod block;
pub mod hash;
pub mod record;

pub use block::*;
pub use hash::*;
pub use record::*;
