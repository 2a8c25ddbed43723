use thiserror::Error;

/// Failures surfaced by tree construction and proof generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// A tree was requested over zero items
    #[error("cannot build a Merkle tree over an empty item list")]
    EmptyInput,

    /// The requested item is not a leaf of the tree
    #[error("item not found in Merkle tree")]
    ItemNotFound,
}

pub type MerkleResult<T> = Result<T, MerkleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(MerkleError::EmptyInput.to_string().contains("empty"));
        assert!(MerkleError::ItemNotFound.to_string().contains("not found"));
    }
}
