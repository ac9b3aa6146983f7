use crate::hash::BlockHash;
use blake3::Hasher as Blake3;
use serde::{Deserialize, Serialize};
use std::fmt;

const HASH_DOMAIN: &[u8] = b"blockdag/block";

/// Capability the DAG core needs from a block.
///
/// Validation, transactions and everything else about a block's contents
/// stay behind this interface; the core only reads the identity, the
/// declared parents and an opaque payload.
pub trait BlockData: Send + Sync + fmt::Debug {
    /// External identity of the block.
    fn hash(&self) -> BlockHash;

    /// Declared parents, in the order the producer listed them.
    fn parents(&self) -> &[BlockHash];

    /// Producer timestamp in seconds. Informational only.
    fn timestamp(&self) -> u64 {
        0
    }

    /// Opaque block body.
    fn payload(&self) -> &[u8] {
        &[]
    }
}

/// Minimal self-describing block used by storage replay, tooling and tests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub hash: BlockHash,
    pub parents: Vec<BlockHash>,
    pub timestamp: u64,
    #[serde(default, with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl RawBlock {
    /// Build a block whose hash commits to the parents, timestamp and payload.
    pub fn new(parents: Vec<BlockHash>, timestamp: u64, payload: Vec<u8>) -> Self {
        let hash = Self::compute_hash(&parents, timestamp, &payload);
        Self {
            hash,
            parents,
            timestamp,
            payload,
        }
    }

    /// Block without parents; used to seed a DAG.
    pub fn genesis(payload: Vec<u8>) -> Self {
        Self::new(Vec::new(), 0, payload)
    }

    fn compute_hash(parents: &[BlockHash], timestamp: u64, payload: &[u8]) -> BlockHash {
        let mut hasher = Blake3::new();
        hasher.update(HASH_DOMAIN);
        hasher.update(&(parents.len() as u64).to_be_bytes());
        for parent in parents {
            hasher.update(parent.as_bytes());
        }
        hasher.update(&timestamp.to_be_bytes());
        hasher.update(blake3::hash(payload).as_bytes());
        BlockHash(*hasher.finalize().as_bytes())
    }

    /// Recompute the hash and compare with the stored one.
    pub fn is_valid(&self) -> bool {
        self.hash == Self::compute_hash(&self.parents, self.timestamp, &self.payload)
    }
}

impl BlockData for RawBlock {
    fn hash(&self) -> BlockHash {
        self.hash
    }

    fn parents(&self) -> &[BlockHash] {
        &self.parents
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Debug for RawBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBlock")
            .field("hash", &self.hash)
            .field("parents", &self.parents)
            .field("timestamp", &self.timestamp)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
