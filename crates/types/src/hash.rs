use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dense identifier assigned to a block when it is linked into the DAG.
///
/// Genesis always receives `0`; identifiers are reused only after a rollback
/// removed the block that consumed them.
pub type BlockId = u32;

/// Length in bytes of a [`BlockHash`].
pub const HASH_LEN: usize = 32;

/// External identity of a block (32-byte blake3 digest).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; HASH_LEN]);

/// Error returned when parsing a [`BlockHash`] from its hex form.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum HashParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl BlockHash {
    /// The all-zero hash.
    pub const ZERO: BlockHash = BlockHash([0u8; HASH_LEN]);

    /// Hash arbitrary bytes with blake3.
    pub fn digest(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; HASH_LEN]> for BlockHash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for BlockHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let array: [u8; HASH_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashParseError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps DAG dumps readable.
        write!(f, "BlockHash({})", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_accepts_prefix() {
        let hash = BlockHash::digest(b"genesis");
        let parsed: BlockHash = format!("0x{hash}").parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn rejects_short_input() {
        let err = "abcd".parse::<BlockHash>().unwrap_err();
        assert_eq!(err, HashParseError::InvalidLength(2));
    }

    #[test]
    fn debug_is_abbreviated() {
        let hash = BlockHash([0xab; HASH_LEN]);
        assert_eq!(format!("{hash:?}"), "BlockHash(abababababababab)");
    }
}
