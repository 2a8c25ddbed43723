use amf_crypto::MerkleError;
use thiserror::Error;

use crate::shard::ShardId;

#[derive(Debug, Error)]
pub enum ForestError {
    #[error("shard {0} not found")]
    ShardNotFound(ShardId),

    #[error("value for key {0:?} contains a non-finite float")]
    NonFiniteValue(String),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error("invalid forest settings: {0}")]
    Config(String),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ForestResult<T> = Result<T, ForestError>;
