//! Rebuilding a DAG from a [`DagStore`].
//!
//! The store holds one record per block plus DAG-wide metadata. Reloading
//! replays `add_block` in id order, which reproduces the exact order, colouring
//! and tip set the DAG had when it was persisted.

use crate::config::DagConfig;
use crate::dag::BlockDag;
use crate::error::{DagError, Result};
use blockdag_storage::DagStore;
use blockdag_types::{BlockData, BlockHash, DagMetadata};
use std::sync::Arc;
use tracing::{info, warn};

impl BlockDag {
    /// Reload using the totals, `k` and tip limit recorded in the store
    /// metadata. Stored parameters win over the configured ones.
    pub fn load<F>(config: &DagConfig, store: Arc<dyn DagStore>, fetch: F) -> Result<Self>
    where
        F: FnMut(&BlockHash) -> Option<Arc<dyn BlockData>>,
    {
        let metadata = store.get_dag_metadata()?.ok_or(DagError::MissingMetadata)?;
        let mut replay_config = config.clone();
        if replay_config.anticone_size != metadata.anticone_size {
            warn!(
                configured = config.anticone_size,
                stored = metadata.anticone_size,
                "using stored anticone size for replay"
            );
            replay_config.anticone_size = metadata.anticone_size;
        }
        if replay_config.tips_distance_limit != metadata.tips_distance_limit {
            info!(
                configured = config.tips_distance_limit,
                stored = metadata.tips_distance_limit,
                "using stored tips distance limit for replay"
            );
            replay_config.tips_distance_limit = metadata.tips_distance_limit;
        }

        let dag = Self::load_all(
            &replay_config,
            store,
            metadata.total,
            metadata.genesis,
            fetch,
        )?;
        dag.check_against(&metadata);
        Ok(dag)
    }

    /// Replay blocks `0..total` from the store, fetching each block's data by
    /// hash.
    pub fn load_all<F>(
        config: &DagConfig,
        store: Arc<dyn DagStore>,
        total: u32,
        genesis_hash: BlockHash,
        mut fetch: F,
    ) -> Result<Self>
    where
        F: FnMut(&BlockHash) -> Option<Arc<dyn BlockData>>,
    {
        let stored_genesis = store.get_block_hash(0)?.ok_or(DagError::MissingRecord(0))?;
        if stored_genesis != genesis_hash {
            return Err(DagError::GenesisMismatch {
                expected: genesis_hash,
                found: stored_genesis,
            });
        }
        let genesis = fetch(&genesis_hash).ok_or(DagError::MissingBlockData(genesis_hash))?;
        if genesis.hash() != genesis_hash {
            return Err(DagError::GenesisMismatch {
                expected: genesis_hash,
                found: genesis.hash(),
            });
        }

        let mut dag = Self::detached(config, genesis);
        for id in 1..total {
            let hash = store.get_block_hash(id)?.ok_or(DagError::MissingRecord(id))?;
            let data = fetch(&hash).ok_or(DagError::MissingBlockData(hash))?;
            if let Some(record) = store.get_block_record(&hash)? {
                if record.parents.as_slice() != data.parents() {
                    warn!(%hash, id, "stored parents differ from fetched block");
                }
            }

            let added = dag.add_block(data)?;
            if added.id != id {
                warn!(%hash, expected = id, assigned = added.id, "replay assigned a different id");
            }
        }
        dag.commit();
        dag.store = Some(store);

        info!(
            total = dag.block_total(),
            tips = dag.tips().len(),
            main_tip = %dag.main_chain_tip().hash(),
            "loaded block DAG"
        );
        Ok(dag)
    }

    fn check_against(&self, metadata: &DagMetadata) {
        let main_tip = self.main_chain_tip().hash();
        if main_tip != metadata.main_tip {
            warn!(stored = %metadata.main_tip, rebuilt = %main_tip, "main tip differs after reload");
        }
        let mut stored_tips = metadata.tips.clone();
        stored_tips.sort();
        let mut rebuilt_tips = self.tip_hashes();
        rebuilt_tips.sort();
        if stored_tips != rebuilt_tips {
            warn!(
                stored = stored_tips.len(),
                rebuilt = rebuilt_tips.len(),
                "tip set differs after reload"
            );
        }
    }
}
