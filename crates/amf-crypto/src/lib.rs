//! Hashing primitives for the Adaptive Merkle Forest.
//!
//! This crate knows nothing about shards. It turns ordered byte strings into
//! binary SHA-256 trees, produces and checks inclusion proofs over them, and
//! offers cheap approximate-membership filters used as a pre-check before a
//! full proof lookup.

pub mod digest;
pub mod error;
pub mod filter;
pub mod merkle;
pub mod proof;

pub use digest::{hash_bytes, hash_pair, Digest32, EMPTY_DIGEST};
pub use error::{MerkleError, MerkleResult};
pub use filter::{prefilter_contains, BloomFilter, HashAccumulator, MembershipFilter};
pub use merkle::{fold_levels, MerkleNode};
pub use proof::{compress_proof, CompressedProof, MerkleProof, MerkleTree, ProofStep, Side};
