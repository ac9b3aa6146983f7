//! Peer synchronisation helpers.

use crate::dag::BlockDag;
use crate::idset::IdSet;
use blockdag_types::BlockHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Summary of a DAG exchanged with peers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphState {
    pub tips: BTreeSet<BlockHash>,
    pub total: u32,
    /// Layer of the main tip.
    pub main_layer: u64,
}

impl GraphState {
    /// True when `self` is strictly ahead of `other`.
    pub fn is_excellent(&self, other: &GraphState) -> bool {
        self.main_layer > other.main_layer
            || (self.main_layer == other.main_layer && self.total > other.total)
    }

    pub fn has_tip(&self, hash: &BlockHash) -> bool {
        self.tips.contains(hash)
    }
}

impl BlockDag {
    pub fn graph_state(&self) -> GraphState {
        GraphState {
            tips: self.tip_hashes().into_iter().collect(),
            total: self.block_total(),
            main_layer: self.main_chain_tip().layer(),
        }
    }

    /// Blocks a peer at `peer` lacks, in virtual order, at most `max_count`.
    ///
    /// The peer is assumed to hold the past of every tip it reports that we
    /// know. Nothing is returned to a peer that is ahead of us.
    pub fn locate_blocks(&self, peer: &GraphState, max_count: usize) -> Vec<BlockHash> {
        if peer.is_excellent(&self.graph_state()) {
            return Vec::new();
        }

        let mut known = IdSet::from_ids([0]);
        for tip in &peer.tips {
            if let Some(id) = self.block_id(tip) {
                known.add(id);
                known.add_set(&self.arena.past(id));
            }
        }

        self.by_order
            .iter()
            .filter(|id| !known.has(**id))
            .take(max_count)
            .map(|id| self.arena.node(*id).hash())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(main_layer: u64, total: u32) -> GraphState {
        GraphState {
            tips: BTreeSet::new(),
            total,
            main_layer,
        }
    }

    #[test]
    fn layer_dominates_total() {
        assert!(state(5, 10).is_excellent(&state(4, 50)));
        assert!(!state(4, 50).is_excellent(&state(5, 10)));
    }

    #[test]
    fn total_breaks_layer_ties() {
        assert!(state(5, 11).is_excellent(&state(5, 10)));
        assert!(!state(5, 10).is_excellent(&state(5, 10)));
    }
}
