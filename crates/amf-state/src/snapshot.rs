use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ForestResult;
use crate::shard::ShardId;
use crate::value::Value;

/// One shard as seen by the archiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardSnapshot {
    pub id: ShardId,
    pub load: u64,
    /// Hex-encoded Merkle root
    pub root: String,
    pub data: BTreeMap<String, Value>,
}

/// Point-in-time copy of the whole forest, shards in ascending ID order.
///
/// Each shard is copied under its own lock; the snapshot as a whole is
/// consistent with respect to shard membership only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub shards: Vec<ShardSnapshot>,
}

impl StateSnapshot {
    /// Flattened key/value view; later shards win on collision.
    pub fn merged_state(&self) -> BTreeMap<String, Value> {
        let mut state = BTreeMap::new();
        for shard in &self.shards {
            state.extend(shard.data.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        state
    }

    pub fn to_json(&self) -> ForestResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> ForestResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
