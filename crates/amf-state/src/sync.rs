// Cross-shard key transfer.
//
// Both shard locks are taken in ascending ID order under the registry read
// lock, so a transfer cannot interleave with a split or merge of either shard
// or deadlock against a concurrent transfer in the opposite direction.
//
// The transfer is atomic only with respect to other callers that respect the
// shard locks. There is no write-ahead log: a crash mid-transfer can lose or
// duplicate a key.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use amf_crypto::Digest32;

use crate::error::{ForestError, ForestResult};
use crate::forest::{lock_pair, Forest};
use crate::rebalance::{rebalance, RebalanceConfig, RebalanceReport};
use crate::shard::ShardId;
use crate::value::Value;

/// Audit record for one moved key.
///
/// The digest marks what was moved; it does not make the transfer atomic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCommitment {
    pub key: String,
    pub src: ShardId,
    pub dst: ShardId,
    pub digest: String,
}

impl TransferCommitment {
    pub fn new(key: &str, value: &Value, src: ShardId, dst: ShardId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(value.canonical_bytes());
        hasher.update(src.0.to_le_bytes());
        hasher.update(dst.0.to_le_bytes());
        TransferCommitment {
            key: key.to_string(),
            src,
            dst,
            digest: hex::encode(hasher.finalize()),
        }
    }
}

/// Outcome of a `sync_keys` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReceipt {
    pub src: ShardId,
    pub dst: ShardId,
    pub moved: Vec<String>,
    /// Requested keys that were not present in the source
    pub skipped: Vec<String>,
    pub src_root: Digest32,
    pub dst_root: Digest32,
    pub rebalance: RebalanceReport,
}

impl Forest {
    /// Move `keys` from shard `src` to shard `dst`, recompute both roots and
    /// run a rebalance pass.
    ///
    /// Keys missing from `src` are skipped. Loads are left untouched. When
    /// `src == dst` nothing moves and no rebalance runs.
    pub fn sync_keys<K: AsRef<str>>(
        &self,
        src: ShardId,
        dst: ShardId,
        keys: &[K],
        cfg: &RebalanceConfig,
    ) -> ForestResult<SyncReceipt> {
        let mut moved = Vec::new();
        let mut skipped = Vec::new();
        let mut commitments = Vec::new();

        let (src_root, dst_root) = {
            let registry = self.registry();
            let src_meta = registry.get(&src).ok_or(ForestError::ShardNotFound(src))?;
            let dst_meta = registry.get(&dst).ok_or(ForestError::ShardNotFound(dst))?;

            if src == dst {
                let root = src_meta.read().root_hash();
                return Ok(SyncReceipt {
                    src,
                    dst,
                    moved,
                    skipped: keys.iter().map(|k| k.as_ref().to_string()).collect(),
                    src_root: root,
                    dst_root: root,
                    rebalance: RebalanceReport::default(),
                });
            }

            let (mut src_state, mut dst_state) = lock_pair(src_meta, dst_meta);
            for key in keys {
                let key = key.as_ref();
                match src_state.shard.remove(key) {
                    Some(value) => {
                        commitments.push(TransferCommitment::new(key, &value, src, dst));
                        dst_state.shard.insert(key, value);
                        moved.push(key.to_string());
                    }
                    None => skipped.push(key.to_string()),
                }
            }
            src_state.recompute_root();
            dst_state.recompute_root();
            (src_state.root_hash(), dst_state.root_hash())
        };

        if !skipped.is_empty() {
            debug!(
                "[CrossShardSync] {} key(s) absent from shard {}: {:?}",
                skipped.len(),
                src,
                skipped
            );
        }
        info!(
            "[CrossShardSync] Moved {} key(s) from shard {} to shard {}",
            moved.len(),
            src,
            dst
        );
        self.commitments.lock().extend(commitments);

        let report = rebalance(self, cfg);
        Ok(SyncReceipt {
            src,
            dst,
            moved,
            skipped,
            src_root,
            dst_root,
            rebalance: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> RebalanceConfig {
        RebalanceConfig::new(u64::MAX, 0)
    }

    fn setup() -> Forest {
        let forest = Forest::new();
        forest.create_shard(ShardId(2));
        forest.create_shard(ShardId(3));
        for (k, v) in [("aa", 1i64), ("bb", 2), ("cd", 3)] {
            forest.add_data_to_shard(ShardId(2), k, v, &quiet()).unwrap();
        }
        forest.add_data_to_shard(ShardId(3), "e", 4i64, &quiet()).unwrap();
        forest
    }

    #[test]
    fn test_sync_moves_key_and_changes_roots() {
        let forest = setup();
        let src_before = forest.shard_root(ShardId(2)).unwrap().hash;
        let dst_before = forest.shard_root(ShardId(3)).unwrap().hash;

        let receipt = forest
            .sync_keys(ShardId(2), ShardId(3), &["aa"], &quiet())
            .unwrap();
        assert_eq!(receipt.moved, vec!["aa".to_string()]);
        assert!(receipt.skipped.is_empty());

        assert!(!forest.shard_data(ShardId(2)).unwrap().contains_key("aa"));
        assert_eq!(
            forest.shard_data(ShardId(3)).unwrap().get("aa"),
            Some(&Value::Int(1))
        );
        assert_ne!(receipt.src_root, src_before);
        assert_ne!(receipt.dst_root, dst_before);
        for id in [2, 3] {
            assert!(forest.get_shard(ShardId(id)).unwrap().read().is_consistent());
        }
    }

    #[test]
    fn test_sync_skips_absent_keys() {
        let forest = setup();
        let receipt = forest
            .sync_keys(ShardId(2), ShardId(3), &["bb", "zz"], &quiet())
            .unwrap();
        assert_eq!(receipt.moved, vec!["bb".to_string()]);
        assert_eq!(receipt.skipped, vec!["zz".to_string()]);
    }

    #[test]
    fn test_sync_unknown_shard() {
        let forest = setup();
        let err = forest
            .sync_keys(ShardId(2), ShardId(99), &["aa"], &quiet())
            .unwrap_err();
        assert!(matches!(err, ForestError::ShardNotFound(ShardId(99))));
        assert!(forest.shard_data(ShardId(2)).unwrap().contains_key("aa"));
    }

    #[test]
    fn test_sync_same_shard_is_noop() {
        let forest = setup();
        let before = forest.shard_data(ShardId(2)).unwrap();
        let receipt = forest
            .sync_keys(ShardId(2), ShardId(2), &["aa"], &quiet())
            .unwrap();
        assert!(receipt.moved.is_empty());
        assert_eq!(forest.shard_data(ShardId(2)).unwrap(), before);
        assert!(forest.commitments().is_empty());
    }

    #[test]
    fn test_sync_records_commitments() {
        let forest = setup();
        forest
            .sync_keys(ShardId(3), ShardId(2), &["e"], &quiet())
            .unwrap();
        let log = forest.commitments();
        assert_eq!(log.len(), 1);
        assert_eq!(
            log[0],
            TransferCommitment::new("e", &Value::Int(4), ShardId(3), ShardId(2))
        );
        assert_eq!(log[0].digest.len(), 64);
    }

    #[test]
    fn test_sync_loads_unchanged() {
        let forest = setup();
        forest
            .sync_keys(ShardId(2), ShardId(3), &["aa", "bb"], &quiet())
            .unwrap();
        assert_eq!(forest.shard_load(ShardId(2)), Some(3));
        assert_eq!(forest.shard_load(ShardId(3)), Some(1));
    }
}
