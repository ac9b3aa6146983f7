//! PHANTOM/GHOSTDAG colouring.
//!
//! Each block inherits the blue set of its main parent and extends it with
//! the blue part of its merge set. A merge-set candidate stays blue only while
//! at most `k` blocks of the growing blue set sit in its anticone.

use crate::block::BlockArena;
use crate::idset::IdSet;
use blockdag_types::BlockId;
use std::collections::VecDeque;

/// Result of colouring one merge set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Coloring {
    /// Blue candidates in topological order.
    pub(crate) blues: Vec<BlockId>,
    pub(crate) reds: Vec<BlockId>,
}

#[derive(Debug, Clone, Copy)]
pub struct Phantom {
    anticone_size: u32,
}

impl Phantom {
    pub fn new(anticone_size: u32) -> Self {
        Self { anticone_size }
    }

    /// The `k` parameter.
    pub fn anticone_size(&self) -> u32 {
        self.anticone_size
    }

    /// Parent with the greatest blue score, ties to the lower id.
    pub(crate) fn main_parent(&self, arena: &BlockArena, parents: &IdSet) -> Option<BlockId> {
        arena.best_of(parents.ids())
    }

    /// Blocks in the past of `parents` that are neither `main_parent` nor in
    /// its past.
    pub(crate) fn merge_set(
        &self,
        arena: &BlockArena,
        main_parent: BlockId,
        parents: &IdSet,
    ) -> IdSet {
        let mut merged = IdSet::new();
        let mut seen = IdSet::new();
        let mut queue: VecDeque<BlockId> =
            parents.ids().filter(|id| *id != main_parent).collect();

        while let Some(current) = queue.pop_front() {
            if !seen.add(current) {
                continue;
            }
            if current == main_parent || arena.is_ancestor(current, main_parent) {
                continue;
            }
            merged.add(current);
            queue.extend(arena.node(current).parents().ids());
        }
        merged
    }

    /// Colour `candidates` against the blue set seen from `main_parent`.
    pub(crate) fn classify(
        &self,
        arena: &BlockArena,
        main_parent: BlockId,
        candidates: &IdSet,
    ) -> Coloring {
        let mut ordered = candidates.to_vec();
        arena.sort_topologically(&mut ordered);

        let mut coloring = Coloring::default();
        for candidate in ordered {
            if self.is_blue_candidate(arena, main_parent, &coloring.blues, candidate) {
                coloring.blues.push(candidate);
            } else {
                coloring.reds.push(candidate);
            }
        }
        coloring
    }

    fn is_blue_candidate(
        &self,
        arena: &BlockArena,
        main_parent: BlockId,
        merge_blues: &[BlockId],
        candidate: BlockId,
    ) -> bool {
        let k = u64::from(self.anticone_size);
        let mut in_anticone = merge_blues
            .iter()
            .filter(|blue| !arena.is_ancestor(**blue, candidate))
            .count() as u64;

        // Walk the selected chain. Once a chain block is in the candidate's
        // past, so is everything it inherited.
        let mut cursor = Some(main_parent);
        while let Some(chain_block) = cursor {
            if in_anticone > k || arena.is_ancestor(chain_block, candidate) {
                break;
            }
            let node = arena.node(chain_block);
            in_anticone += 1;
            in_anticone += node
                .blue_merge()
                .iter()
                .filter(|blue| !arena.is_ancestor(**blue, candidate))
                .count() as u64;
            cursor = node.main_parent();
        }

        in_anticone <= k
    }
}
