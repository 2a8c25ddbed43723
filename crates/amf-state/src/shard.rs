use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// ShardId uniquely identifies a shard in the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct ShardId(pub u64);

impl ShardId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Children produced by a split: `(2*id, 2*id + 1)`.
    ///
    /// `None` when either ID would overflow.
    pub fn split_children(&self) -> Option<(ShardId, ShardId)> {
        let left = self.0.checked_mul(2)?;
        let right = left.checked_add(1)?;
        Some((ShardId(left), ShardId(right)))
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ShardId {
    fn from(id: u64) -> Self {
        ShardId(id)
    }
}

/// Ordered key/value container. Has no locking of its own; the owning
/// registry entry guards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    pub id: ShardId,
    pub data: BTreeMap<String, Value>,
}

impl Shard {
    pub fn new(id: ShardId) -> Self {
        Shard {
            id,
            data: BTreeMap::new(),
        }
    }

    /// Insert or overwrite; returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Split rule: even-length keys go left, odd-length keys go right.
    ///
    /// This is a fixed placeholder partition, not a load-balanced one.
    pub fn partition_by_key_parity(self, left: ShardId, right: ShardId) -> (Shard, Shard) {
        let mut even = Shard::new(left);
        let mut odd = Shard::new(right);
        for (key, value) in self.data {
            if key.len() % 2 == 0 {
                even.data.insert(key, value);
            } else {
                odd.data.insert(key, value);
            }
        }
        (even, odd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_children() {
        assert_eq!(ShardId(1).split_children(), Some((ShardId(2), ShardId(3))));
        assert_eq!(ShardId(0).split_children(), Some((ShardId(0), ShardId(1))));
        assert_eq!(ShardId(u64::MAX / 2 + 1).split_children(), None);
    }

    #[test]
    fn test_insert_get_remove() {
        let mut shard = Shard::new(ShardId(7));
        assert!(shard.insert("k", Value::Int(1)).is_none());
        assert_eq!(shard.insert("k", Value::Int(2)), Some(Value::Int(1)));
        assert_eq!(shard.get("k"), Some(&Value::Int(2)));
        assert_eq!(shard.remove("k"), Some(Value::Int(2)));
        assert!(shard.is_empty());
    }

    #[test]
    fn test_partition_by_key_parity() {
        let mut shard = Shard::new(ShardId(1));
        shard.insert("aa", Value::Int(1));
        shard.insert("b", Value::Int(2));
        shard.insert("ccc", Value::Int(3));
        shard.insert("", Value::Int(4));

        let (left, right) = shard.partition_by_key_parity(ShardId(2), ShardId(3));
        assert_eq!(left.id, ShardId(2));
        assert_eq!(right.id, ShardId(3));
        assert_eq!(left.keys().cloned().collect::<Vec<_>>(), vec!["", "aa"]);
        assert_eq!(right.keys().cloned().collect::<Vec<_>>(), vec!["b", "ccc"]);
    }
}
