//! Approximate-membership pre-filters.
//!
//! A filter answers "definitely absent" or "maybe present" so callers can skip
//! building a full Merkle proof for keys that cannot be in a shard. False
//! positives are possible; false negatives are not.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Capability shared by every membership pre-filter
pub trait MembershipFilter {
    fn insert(&mut self, item: &[u8]);

    fn contains(&self, item: &[u8]) -> bool;
}

/// Cheap pre-check before a proof lookup.
pub fn prefilter_contains<F: MembershipFilter + ?Sized>(filter: &F, item: &[u8]) -> bool {
    filter.contains(item)
}

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Bit-array Bloom filter indexed by salted FNV-1a.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomFilter {
    bits: Vec<bool>,
    salts: Vec<u32>,
}

impl BloomFilter {
    /// `size` is clamped to at least one bit.
    pub fn new(size: usize, salts: Vec<u32>) -> Self {
        Self {
            bits: vec![false; size.max(1)],
            salts,
        }
    }

    pub fn size(&self) -> usize {
        self.bits.len()
    }

    fn index(&self, item: &[u8], salt: u32) -> usize {
        let mut h = FNV_OFFSET;
        for byte in item {
            h ^= u32::from(*byte);
            h = h.wrapping_mul(FNV_PRIME);
        }
        (h ^ salt) as usize % self.bits.len()
    }
}

impl MembershipFilter for BloomFilter {
    fn insert(&mut self, item: &[u8]) {
        let indices: Vec<usize> = self.salts.iter().map(|salt| self.index(item, *salt)).collect();
        for idx in indices {
            self.bits[idx] = true;
        }
    }

    fn contains(&self, item: &[u8]) -> bool {
        self.salts.iter().all(|salt| self.bits[self.index(item, *salt)])
    }
}

/// Set-backed accumulator with exact membership and removal.
///
/// Stands in for a cryptographic accumulator; it provides no succinct witness.
#[derive(Debug, Clone, Default)]
pub struct HashAccumulator {
    elements: HashSet<Vec<u8>>,
}

impl HashAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&mut self, item: &[u8]) -> bool {
        self.elements.remove(item)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl MembershipFilter for HashAccumulator {
    fn insert(&mut self, item: &[u8]) {
        self.elements.insert(item.to_vec());
    }

    fn contains(&self, item: &[u8]) -> bool {
        self.elements.contains(item)
    }
}
