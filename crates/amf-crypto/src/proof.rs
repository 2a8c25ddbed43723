//! Generic Merkle trees over arbitrary byte strings, inclusion proofs and
//! XOR-folded proof compression.
//!
//! Block transaction lists and shard key proofs both go through
//! [`MerkleTree`]. For a shard, building the tree over the shard's sorted
//! leaf preimages yields the same root as the shard's own commitment.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::digest::{hash_bytes, hash_pair, Digest32};
use crate::error::{MerkleError, MerkleResult};
use crate::merkle::{fold_levels, MerkleNode};

/// Which side of the running hash a sibling sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// One level of an inclusion proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Digest32,
    pub side: Side,
}

/// Inclusion proof, innermost sibling first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Hash of the proved item
    pub leaf_hash: Digest32,

    /// Path from leaf to root
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Sibling hashes in proof order
    pub fn siblings(&self) -> Vec<Digest32> {
        self.steps.iter().map(|s| s.sibling).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Recombine the leaf hash with every sibling up to a root
    pub fn compute_root(&self) -> Digest32 {
        self.steps.iter().fold(self.leaf_hash, |acc, step| match step.side {
            Side::Left => hash_pair(&step.sibling, &acc),
            Side::Right => hash_pair(&acc, &step.sibling),
        })
    }

    /// Check the proof for `item` against an expected root
    pub fn verify(&self, root: &Digest32, item: &[u8]) -> bool {
        hash_bytes(item) == self.leaf_hash && &self.compute_root() == root
    }
}

/// A Merkle tree whose leaves are `sha256(item)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree {
    pub root: MerkleNode,
    pub leaf_count: usize,
}

impl MerkleTree {
    /// Build a tree over `items` in the given order.
    pub fn build<T: AsRef<[u8]>>(items: &[T]) -> MerkleResult<Self> {
        let leaves: Vec<MerkleNode> = items
            .iter()
            .map(|item| MerkleNode::leaf_from_bytes(item.as_ref()))
            .collect();
        let leaf_count = leaves.len();
        let root = fold_levels(leaves).ok_or(MerkleError::EmptyInput)?;
        Ok(Self { root, leaf_count })
    }

    pub fn root_hash(&self) -> Digest32 {
        self.root.hash
    }

    /// Generate the inclusion proof for `item`.
    ///
    /// When the same item appears more than once, the leftmost occurrence is
    /// proved.
    pub fn generate_proof(&self, item: &[u8]) -> MerkleResult<MerkleProof> {
        let leaf_hash = hash_bytes(item);
        let mut steps = Vec::new();
        if !collect_path(&self.root, &leaf_hash, &mut steps) {
            debug!("[Proof] leaf {} absent from tree", hex::encode(leaf_hash));
            return Err(MerkleError::ItemNotFound);
        }
        Ok(MerkleProof { leaf_hash, steps })
    }
}

/// Depth-first descent towards the leaf; siblings are pushed while unwinding
/// so the innermost one ends up first.
fn collect_path(node: &MerkleNode, target: &Digest32, steps: &mut Vec<ProofStep>) -> bool {
    match (&node.left, &node.right) {
        (None, None) => &node.hash == target,
        (Some(left), Some(right)) => {
            if collect_path(left, target, steps) {
                steps.push(ProofStep { sibling: right.hash, side: Side::Right });
                true
            } else if collect_path(right, target, steps) {
                steps.push(ProofStep { sibling: left.hash, side: Side::Left });
                true
            } else {
                false
            }
        }
        (Some(only), None) | (None, Some(only)) => collect_path(only, target, steps),
    }
}

/// XOR fold of every sibling hash in a proof.
///
/// This is a lossy size reduction, not a succinct proof: nothing can be
/// verified from the folded digest alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedProof(pub Digest32);

impl fmt::Display for CompressedProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Fold a proof into a single digest. An empty proof folds to all zeroes.
pub fn compress_proof(proof: &MerkleProof) -> CompressedProof {
    let mut folded = [0u8; 32];
    for step in &proof.steps {
        for (acc, byte) in folded.iter_mut().zip(step.sibling.iter()) {
            *acc ^= byte;
        }
    }
    CompressedProof(folded)
}
