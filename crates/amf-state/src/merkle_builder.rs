//! Deterministic shard commitment.
//!
//! Leaves are `sha256(len_be64(key) ++ key ++ ":" ++ canonical(value))` in
//! ascending key order; an empty shard commits to `sha256("")`. The tree is
//! rebuilt from scratch on every call.

use amf_crypto::{fold_levels, MerkleNode};

use crate::shard::Shard;
use crate::value::{push_len_prefixed, Value};

/// Byte string hashed into the leaf for `key`.
pub fn leaf_preimage(key: &str, value: &Value) -> Vec<u8> {
    let encoded = value.canonical_bytes();
    let mut out = Vec::with_capacity(8 + key.len() + 1 + encoded.len());
    push_len_prefixed(&mut out, key.as_bytes());
    out.push(b':');
    out.extend_from_slice(&encoded);
    out
}

/// Leaf preimages of a shard in sorted key order.
pub fn leaf_preimages(shard: &Shard) -> Vec<Vec<u8>> {
    // BTreeMap iteration is already in ascending key order
    shard.data.iter().map(|(k, v)| leaf_preimage(k, v)).collect()
}

pub fn build_root(shard: &Shard) -> MerkleNode {
    let leaves = shard
        .data
        .iter()
        .map(|(k, v)| MerkleNode::leaf_from_bytes(&leaf_preimage(k, v)))
        .collect();
    fold_levels(leaves).unwrap_or_else(MerkleNode::empty)
}
