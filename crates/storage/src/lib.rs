use blockdag_types::{BlockHash, BlockId, BlockRecord, DagMetadata};
use parking_lot::RwLock;
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

const METADATA_KEY: &[u8] = b"dag_metadata";

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transaction aborted: {0}")]
    Transaction(String),
    #[error("Corrupt entry for key {0}")]
    Corrupt(String),
    #[error("Write rejected by store")]
    WriteRejected,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Read/write contract the DAG core needs from a key-value store.
///
/// `commit_block` and `remove_block` must apply the record, the id index and
/// the metadata together: a reader never observes one without the others.
pub trait DagStore: Send + Sync {
    fn commit_block(&self, record: &BlockRecord, metadata: &DagMetadata) -> Result<()>;
    fn remove_block(&self, id: BlockId, hash: &BlockHash, metadata: &DagMetadata) -> Result<()>;
    fn put_block_record(&self, record: &BlockRecord) -> Result<()>;
    fn get_block_record(&self, hash: &BlockHash) -> Result<Option<BlockRecord>>;
    fn get_block_hash(&self, id: BlockId) -> Result<Option<BlockHash>>;
    fn put_dag_metadata(&self, metadata: &DagMetadata) -> Result<()>;
    fn get_dag_metadata(&self) -> Result<Option<DagMetadata>>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Sled-backed implementation
pub struct SledDagStore {
    db: Db,
    blocks: Tree,
    block_ids: Tree,
    metadata: Tree,
}

impl SledDagStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let blocks = db.open_tree("blocks")?;
        let block_ids = db.open_tree("block_ids")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            blocks,
            block_ids,
            metadata,
        })
    }

    /// Number of block records currently stored.
    pub fn record_count(&self) -> usize {
        self.blocks.len()
    }
}

fn map_transaction_error(err: TransactionError<()>) -> StorageError {
    match err {
        TransactionError::Abort(()) => StorageError::Transaction("aborted".into()),
        TransactionError::Storage(e) => StorageError::Database(e),
    }
}

impl DagStore for SledDagStore {
    fn commit_block(&self, record: &BlockRecord, metadata: &DagMetadata) -> Result<()> {
        let encoded = serde_json::to_vec(record)?;
        let encoded_meta = serde_json::to_vec(metadata)?;
        let id_key = record.id.to_be_bytes();
        let outcome: TransactionResult<(), ()> = (&self.blocks, &self.block_ids, &self.metadata)
            .transaction(|(blocks, ids, meta)| {
                blocks.insert(&record.hash.0[..], encoded.clone())?;
                ids.insert(&id_key[..], &record.hash.0[..])?;
                meta.insert(METADATA_KEY, encoded_meta.clone())?;
                Ok(())
            });
        outcome.map_err(map_transaction_error)
    }

    fn remove_block(&self, id: BlockId, hash: &BlockHash, metadata: &DagMetadata) -> Result<()> {
        let encoded_meta = serde_json::to_vec(metadata)?;
        let id_key = id.to_be_bytes();
        let outcome: TransactionResult<(), ()> = (&self.blocks, &self.block_ids, &self.metadata)
            .transaction(|(blocks, ids, meta)| {
                blocks.remove(&hash.0[..])?;
                ids.remove(&id_key[..])?;
                meta.insert(METADATA_KEY, encoded_meta.clone())?;
                Ok(())
            });
        outcome.map_err(map_transaction_error)
    }

    fn put_block_record(&self, record: &BlockRecord) -> Result<()> {
        let data = serde_json::to_vec(record)?;
        self.blocks.insert(&record.hash.0[..], data)?;
        self.block_ids
            .insert(&record.id.to_be_bytes()[..], &record.hash.0[..])?;
        Ok(())
    }

    fn get_block_record(&self, hash: &BlockHash) -> Result<Option<BlockRecord>> {
        self.blocks
            .get(&hash.0[..])?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn get_block_hash(&self, id: BlockId) -> Result<Option<BlockHash>> {
        let Some(value) = self.block_ids.get(&id.to_be_bytes()[..])? else {
            return Ok(None);
        };
        let bytes: [u8; 32] = value
            .as_ref()
            .try_into()
            .map_err(|_| StorageError::Corrupt(format!("block_ids/{id}")))?;
        Ok(Some(BlockHash(bytes)))
    }

    fn put_dag_metadata(&self, metadata: &DagMetadata) -> Result<()> {
        self.metadata
            .insert(METADATA_KEY, serde_json::to_vec(metadata)?)?;
        Ok(())
    }

    fn get_dag_metadata(&self) -> Result<Option<DagMetadata>> {
        self.metadata
            .get(METADATA_KEY)?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory testing backend
#[derive(Default)]
pub struct MemoryDagStore {
    blocks: RwLock<HashMap<BlockHash, BlockRecord>>,
    block_ids: RwLock<HashMap<BlockId, BlockHash>>,
    metadata: RwLock<Option<DagMetadata>>,
    reject_writes: AtomicBool,
}

impl MemoryDagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StorageError::WriteRejected`].
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn record_count(&self) -> usize {
        self.blocks.read().len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            tracing::warn!("memory store rejected a write");
            return Err(StorageError::WriteRejected);
        }
        Ok(())
    }
}

impl DagStore for MemoryDagStore {
    fn commit_block(&self, record: &BlockRecord, metadata: &DagMetadata) -> Result<()> {
        self.check_writable()?;
        self.blocks.write().insert(record.hash, record.clone());
        self.block_ids.write().insert(record.id, record.hash);
        *self.metadata.write() = Some(metadata.clone());
        Ok(())
    }

    fn remove_block(&self, id: BlockId, hash: &BlockHash, metadata: &DagMetadata) -> Result<()> {
        self.check_writable()?;
        self.blocks.write().remove(hash);
        self.block_ids.write().remove(&id);
        *self.metadata.write() = Some(metadata.clone());
        Ok(())
    }

    fn put_block_record(&self, record: &BlockRecord) -> Result<()> {
        self.check_writable()?;
        self.blocks.write().insert(record.hash, record.clone());
        self.block_ids.write().insert(record.id, record.hash);
        Ok(())
    }

    fn get_block_record(&self, hash: &BlockHash) -> Result<Option<BlockRecord>> {
        Ok(self.blocks.read().get(hash).cloned())
    }

    fn get_block_hash(&self, id: BlockId) -> Result<Option<BlockHash>> {
        Ok(self.block_ids.read().get(&id).copied())
    }

    fn put_dag_metadata(&self, metadata: &DagMetadata) -> Result<()> {
        self.check_writable()?;
        *self.metadata.write() = Some(metadata.clone());
        Ok(())
    }

    fn get_dag_metadata(&self) -> Result<Option<DagMetadata>> {
        Ok(self.metadata.read().clone())
    }
}
