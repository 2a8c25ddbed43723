//! Binary Merkle nodes and the level-by-level builder shared by shard roots
//! and generic item trees.
//!
//! Trees are built bottom-up and every node exclusively owns its children.
//! An odd node at the end of a level is carried up unchanged; there is no
//! duplication padding.

use serde::{Deserialize, Serialize};

use crate::digest::{hash_bytes, hash_pair, Digest32, EMPTY_DIGEST};

/// A node in a Merkle tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleNode {
    /// Hash of this node
    pub hash: Digest32,

    /// Left child (None for a leaf)
    pub left: Option<Box<MerkleNode>>,

    /// Right child (None for a leaf)
    pub right: Option<Box<MerkleNode>>,
}

impl MerkleNode {
    /// Create a leaf node from a precomputed hash
    pub fn leaf(hash: Digest32) -> Self {
        Self {
            hash,
            left: None,
            right: None,
        }
    }

    /// Create a leaf node by hashing its preimage
    pub fn leaf_from_bytes(data: &[u8]) -> Self {
        Self::leaf(hash_bytes(data))
    }

    /// Root of an empty shard: `sha256("")` with no children
    pub fn empty() -> Self {
        Self::leaf(EMPTY_DIGEST)
    }

    /// Create an internal node from two children
    pub fn branch(left: MerkleNode, right: MerkleNode) -> Self {
        Self {
            hash: hash_pair(&left.hash, &right.hash),
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Number of leaves below (and including) this node
    pub fn leaf_count(&self) -> usize {
        match (&self.left, &self.right) {
            (Some(l), Some(r)) => l.leaf_count() + r.leaf_count(),
            (Some(only), None) | (None, Some(only)) => only.leaf_count(),
            (None, None) => 1,
        }
    }
}

/// Pairwise-merge adjacent nodes level by level until one root remains.
///
/// Returns `None` for an empty level.
pub fn fold_levels(mut level: Vec<MerkleNode>) -> Option<MerkleNode> {
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        let mut nodes = level.into_iter();
        while let Some(left) = nodes.next() {
            match nodes.next() {
                Some(right) => next.push(MerkleNode::branch(left, right)),
                None => next.push(left),
            }
        }
        level = next;
    }
    level.pop()
}
