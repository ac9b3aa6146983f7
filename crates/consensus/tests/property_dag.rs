use blockdag_consensus::{BlockDag, BlockStatus, DagConfig};
use blockdag_storage::{DagStore, MemoryDagStore};
use blockdag_types::{BlockData, BlockHash, RawBlock};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Parent picks per block, as offsets back from the newest block.
fn dag_shape() -> impl Strategy<Value = Vec<Vec<u32>>> {
    prop::collection::vec(prop::collection::vec(0u32..6, 1..4), 1..30)
}

struct Built {
    dag: BlockDag,
    blocks: HashMap<BlockHash, Arc<RawBlock>>,
}

fn build(
    shape: &[Vec<u32>],
    anticone_size: u32,
    limit: u64,
    store: Option<Arc<dyn DagStore>>,
) -> Built {
    let config = DagConfig::new(anticone_size, limit);
    let genesis = Arc::new(RawBlock::genesis(b"genesis".to_vec()));
    let mut blocks = HashMap::new();
    blocks.insert(genesis.hash, genesis.clone());
    let mut dag = BlockDag::new(&config, genesis, store).unwrap();

    for (n, picks) in shape.iter().enumerate() {
        let newest = dag.block_total() - 1;
        let mut parents = Vec::new();
        for offset in picks {
            let hash = dag.block(newest.saturating_sub(*offset)).unwrap().hash();
            if !parents.contains(&hash) {
                parents.push(hash);
            }
        }
        let block = Arc::new(RawBlock::new(parents, n as u64, (n as u32).to_be_bytes().to_vec()));
        blocks.insert(block.hash, block.clone());
        dag.add_block(block).unwrap();
        dag.commit();
    }
    Built { dag, blocks }
}

fn statuses(dag: &BlockDag) -> Vec<BlockStatus> {
    (0..dag.block_total())
        .map(|id| dag.block(id).unwrap().status())
        .collect()
}

proptest! {
    #[test]
    fn order_is_a_bijection(shape in dag_shape(), k in 0u32..4) {
        let built = build(&shape, k, 100, None);
        let dag = &built.dag;
        let total = dag.block_total();

        let mut seen = vec![false; total as usize];
        for id in 0..total {
            let order = dag.block(id).unwrap().order();
            prop_assert!(order < total);
            prop_assert!(!seen[order as usize]);
            seen[order as usize] = true;
            prop_assert_eq!(dag.block_by_order(order).unwrap().id(), id);
        }
    }

    #[test]
    fn ancestors_come_first(shape in dag_shape(), k in 0u32..4, limit in 1u64..4) {
        let built = build(&shape, k, limit, None);
        let dag = &built.dag;
        for id in 0..dag.block_total() {
            let node = dag.block(id).unwrap();
            for parent in node.parents().ids() {
                prop_assert!(dag.block(parent).unwrap().order() < node.order());
            }
        }
    }

    #[test]
    fn every_block_is_classified(shape in dag_shape(), k in 0u32..4) {
        let built = build(&shape, k, 100, None);
        prop_assert!(statuses(&built.dag)
            .iter()
            .all(|status| *status != BlockStatus::Unclassified));
    }

    #[test]
    fn incremental_order_matches_full_recompute(
        shape in dag_shape(),
        k in 0u32..4,
        limit in 1u64..4,
    ) {
        let mut built = build(&shape, k, limit, None);
        let order = built.dag.order_snapshot();
        let before = statuses(&built.dag);

        built.dag.update_virtual_block_order();
        prop_assert_eq!(built.dag.order_snapshot(), order);
        prop_assert_eq!(statuses(&built.dag), before);
    }

    #[test]
    fn rollback_is_exact(
        shape in dag_shape(),
        k in 0u32..4,
        picks in prop::collection::vec(0u32..30, 1..4),
    ) {
        let mut built = build(&shape, k, 2, None);
        let dag = &mut built.dag;
        let order = dag.order_snapshot();
        let before = statuses(dag);
        let tips = dag.tips().clone();
        let main_tip = dag.main_chain_tip().id();
        let total = dag.block_total();

        let mut parents = Vec::new();
        for pick in picks {
            let hash = dag.block(pick % total).unwrap().hash();
            if !parents.contains(&hash) {
                parents.push(hash);
            }
        }
        dag.add_block(Arc::new(RawBlock::new(parents, 0, b"extra".to_vec()))).unwrap();
        dag.rollback().unwrap();

        prop_assert_eq!(dag.block_total(), total);
        prop_assert_eq!(dag.order_snapshot(), order);
        prop_assert_eq!(statuses(dag), before);
        prop_assert_eq!(dag.tips(), &tips);
        prop_assert_eq!(dag.main_chain_tip().id(), main_tip);
    }

    #[test]
    fn cones_partition_the_dag(shape in dag_shape(), k in 0u32..4) {
        let built = build(&shape, k, 100, None);
        let dag = &built.dag;
        let total = dag.block_total() as usize;

        for id in 0..dag.block_total() {
            let past = dag.past_set(id).unwrap();
            let future = dag.future_set(id).unwrap();
            let anticone = dag.anticone(id, None).unwrap();
            prop_assert!(past.intersection(&future).is_empty());
            prop_assert_eq!(past.len() + future.len() + anticone.len() + 1, total);
            prop_assert_eq!(dag.is_hourglass(id).unwrap(), anticone.is_empty());
        }
    }

    #[test]
    fn reload_reproduces_order(shape in dag_shape(), k in 0u32..4, limit in 1u64..4) {
        let store = Arc::new(MemoryDagStore::new());
        let built = build(&shape, k, limit, Some(store.clone() as Arc<dyn DagStore>));

        let blocks = &built.blocks;
        let reloaded = BlockDag::load(&DagConfig::new(k, 100), store, |hash| {
            blocks.get(hash).map(|block| block.clone() as Arc<dyn BlockData>)
        })
        .unwrap();

        prop_assert_eq!(reloaded.block_total(), built.dag.block_total());
        prop_assert_eq!(reloaded.order_snapshot(), built.dag.order_snapshot());
        prop_assert_eq!(statuses(&reloaded), statuses(&built.dag));
        prop_assert_eq!(reloaded.tips(), built.dag.tips());
        prop_assert_eq!(reloaded.tips_distance_limit(), limit);
    }

    #[test]
    fn blue_score_grows_along_a_chain(length in 1usize..40, k in 0u32..4) {
        let shape = vec![vec![0u32]; length];
        let built = build(&shape, k, 100, None);
        let dag = &built.dag;

        let mut previous = 0;
        for id in 0..dag.block_total() {
            let node = dag.block(id).unwrap();
            prop_assert!(node.blue_score() >= previous);
            prop_assert!(node.is_blue());
            previous = node.blue_score();
        }
        prop_assert_eq!(dag.main_chain().len(), length + 1);
    }
}
