use sha2::{Digest, Sha256};

/// Fixed-length SHA-256 digest used for every node in the forest.
pub type Digest32 = [u8; 32];

/// SHA-256 of the empty input; the root of an empty shard.
pub const EMPTY_DIGEST: Digest32 = [
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
];

/// Hash an arbitrary byte string.
pub fn hash_bytes(data: &[u8]) -> Digest32 {
    Sha256::digest(data).into()
}

/// Hash of an internal node: `sha256(left ++ right)`.
pub fn hash_pair(left: &Digest32, right: &Digest32) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
