//! Adaptive Merkle Forest.
//!
//! Re-exports the hashing layer (`amf-crypto`) and the sharded registry
//! (`amf-state`) under one crate for embedding applications.

pub use amf_crypto as crypto;
pub use amf_state as state;

pub use amf_crypto::{compress_proof, BloomFilter, MerkleProof, MerkleTree, MembershipFilter};
pub use amf_state::{
    Forest, ForestError, ForestResult, ForestSettings, RebalanceConfig, ShardId, Value,
};

/// Install the default `env_logger` backend, honouring `RUST_LOG` and falling
/// back to `info`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_round_trip() {
        init_logging();
        let forest = Forest::new();
        forest.create_shard(ShardId(1));
        forest
            .add_data_to_shard(ShardId(1), "key", "value", &RebalanceConfig::default())
            .unwrap();
        assert_eq!(forest.reconstruct_state().len(), 1);

        let tree = MerkleTree::build(&[b"a".to_vec(), b"b".to_vec()]).unwrap();
        let proof = tree.generate_proof(b"b").unwrap();
        assert_eq!(compress_proof(&proof).0, proof.steps[0].sibling);
    }
}
