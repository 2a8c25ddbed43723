// Adaptive Merkle Forest - sharded key/value registry
//
// INVARIANTS:
// 1. Every shard ID in the registry is unique; split and merge never overwrite
//    a live shard
// 2. A shard's root is always build_root() of its current contents; every
//    mutation recomputes it before the shard lock is released
// 3. Lock order is registry lock first, then shard locks in ascending ID
// 4. Content mutation holds the registry read lock for its whole critical
//    section, so split/merge (registry write lock) never interleave with it
//
// Callers must not hold a ShardState guard while calling back into the Forest.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use amf_crypto::{BloomFilter, Digest32, MerkleNode, MerkleProof, MerkleTree, MembershipFilter};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ForestError, ForestResult};
use crate::merkle_builder::{build_root, leaf_preimage, leaf_preimages};
use crate::rebalance::{rebalance, RebalanceConfig, RebalanceReport};
use crate::settings::BloomSettings;
use crate::shard::{Shard, ShardId};
use crate::snapshot::{ShardSnapshot, StateSnapshot};
use crate::sync::TransferCommitment;
use crate::value::Value;

/// Lifecycle of a registry entry. Anything other than `Active` means the
/// entry has been detached from the registry and a held handle is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardStatus {
    Active,
    SplitInto(ShardId, ShardId),
    MergedInto(ShardId),
    Replaced,
}

/// Lock-guarded contents of a registry entry
#[derive(Debug, Clone)]
pub struct ShardState {
    pub shard: Shard,
    pub root: MerkleNode,
    pub load: u64,
    pub status: ShardStatus,
}

impl ShardState {
    fn new(shard: Shard, load: u64) -> Self {
        let root = build_root(&shard);
        ShardState {
            shard,
            root,
            load,
            status: ShardStatus::Active,
        }
    }

    /// True when the stored root matches a fresh rebuild of the contents.
    pub fn is_consistent(&self) -> bool {
        self.root == build_root(&self.shard)
    }

    pub fn root_hash(&self) -> Digest32 {
        self.root.hash
    }

    pub(crate) fn recompute_root(&mut self) {
        self.root = build_root(&self.shard);
    }
}

/// Registry entry: one shard plus its derived root and load counter
#[derive(Debug)]
pub struct ShardMeta {
    pub id: ShardId,
    state: RwLock<ShardState>,
}

impl ShardMeta {
    fn new(shard: Shard, load: u64) -> Self {
        ShardMeta {
            id: shard.id,
            state: RwLock::new(ShardState::new(shard, load)),
        }
    }

    /// Shared access to the shard contents.
    pub fn read(&self) -> RwLockReadGuard<'_, ShardState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ShardState> {
        self.state.write()
    }
}

/// Inclusion proof for one key of one shard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyProof {
    pub shard_id: ShardId,
    pub key: String,
    pub value: Value,
    pub root: Digest32,
    pub proof: MerkleProof,
}

impl KeyProof {
    pub fn verify(&self) -> bool {
        self.proof
            .verify(&self.root, &leaf_preimage(&self.key, &self.value))
    }
}

/// The shard registry.
#[derive(Debug, Default)]
pub struct Forest {
    shards: RwLock<BTreeMap<ShardId, Arc<ShardMeta>>>,
    roots: RwLock<Vec<MerkleNode>>,
    pub(crate) commitments: Mutex<Vec<TransferCommitment>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new empty shard under `id`.
    ///
    /// An existing shard with the same ID is replaced and its contents are
    /// dropped.
    pub fn create_shard(&self, id: ShardId) -> Arc<ShardMeta> {
        let meta = Arc::new(ShardMeta::new(Shard::new(id), 0));
        let mut shards = self.shards.write();
        if let Some(previous) = shards.insert(id, Arc::clone(&meta)) {
            let mut old = previous.write();
            warn!(
                "[Forest] CreateShard overwrote shard {} ({} keys dropped)",
                id,
                old.shard.len()
            );
            old.status = ShardStatus::Replaced;
        } else {
            info!("[Forest] Created shard {}", id);
        }
        meta
    }

    pub fn get_shard(&self, id: ShardId) -> Option<Arc<ShardMeta>> {
        self.shards.read().get(&id).cloned()
    }

    pub fn contains_shard(&self, id: ShardId) -> bool {
        self.shards.read().contains_key(&id)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.read().len()
    }

    pub fn discover_shard_ids(&self) -> BTreeSet<ShardId> {
        self.shards.read().keys().copied().collect()
    }

    pub fn shard_load(&self, id: ShardId) -> Option<u64> {
        self.get_shard(id).map(|meta| meta.read().load)
    }

    pub fn shard_root(&self, id: ShardId) -> Option<MerkleNode> {
        self.get_shard(id).map(|meta| meta.read().root.clone())
    }

    pub fn shard_data(&self, id: ShardId) -> Option<BTreeMap<String, Value>> {
        self.get_shard(id).map(|meta| meta.read().shard.data.clone())
    }

    /// Insert or overwrite `key` in shard `id`, then run a rebalance pass over
    /// the whole forest.
    ///
    /// The pass may split or merge any shard, including `id` itself, so the
    /// caller must not assume the shard ID set is unchanged afterwards.
    /// Values holding a NaN or infinite float are refused with
    /// [`ForestError::NonFiniteValue`] and leave the shard untouched.
    pub fn add_data_to_shard(
        &self,
        id: ShardId,
        key: impl Into<String>,
        value: impl Into<Value>,
        cfg: &RebalanceConfig,
    ) -> ForestResult<RebalanceReport> {
        let key = key.into();
        let value = value.into();
        if !value.is_finite() {
            return Err(ForestError::NonFiniteValue(key));
        }
        {
            let shards = self.shards.read();
            let meta = shards.get(&id).ok_or(ForestError::ShardNotFound(id))?;
            let mut state = meta.write();
            state.shard.insert(key, value);
            state.load += 1;
            state.recompute_root();
            debug!(
                "[Forest] Shard {} now holds {} keys (load={})",
                id,
                state.shard.len(),
                state.load
            );
        }
        Ok(rebalance(self, cfg))
    }

    /// Split shard `id` into `2*id` (even-length keys) and `2*id+1`
    /// (odd-length keys) when its load exceeds `split_threshold`.
    ///
    /// Returns `None` when the split does not apply: load at or below the
    /// threshold, child IDs overflowing, or a child ID already taken by
    /// another live shard.
    pub fn split_shard(
        &self,
        id: ShardId,
        split_threshold: u64,
    ) -> ForestResult<Option<(ShardId, ShardId)>> {
        let mut shards = self.shards.write();
        let parent = shards.get(&id).cloned().ok_or(ForestError::ShardNotFound(id))?;
        let mut state = parent.write();

        if state.load <= split_threshold {
            return Ok(None);
        }
        let Some((left_id, right_id)) = id.split_children() else {
            warn!("[Forest] Shard {} cannot split: child IDs overflow", id);
            return Ok(None);
        };
        let occupied = [left_id, right_id]
            .into_iter()
            .find(|child| *child != id && shards.contains_key(child));
        if let Some(child) = occupied {
            warn!(
                "[Forest] Shard {} cannot split: child ID {} already in use",
                id, child
            );
            return Ok(None);
        }

        let contents = std::mem::replace(&mut state.shard, Shard::new(id));
        let (left, right) = contents.partition_by_key_parity(left_id, right_id);
        let parent_load = state.load;
        state.recompute_root();
        state.status = ShardStatus::SplitInto(left_id, right_id);
        drop(state);

        info!(
            "[Forest] Split shard {} (load={}) into {} ({} keys) and {} ({} keys)",
            id,
            parent_load,
            left_id,
            left.len(),
            right_id,
            right.len()
        );

        shards.remove(&id);
        shards.insert(left_id, Arc::new(ShardMeta::new(left, 0)));
        shards.insert(right_id, Arc::new(ShardMeta::new(right, 0)));
        Ok(Some((left_id, right_id)))
    }

    /// Absorb shard `id2` into `id1` when their combined load is at most
    /// `merge_threshold`. On key collision the value from `id2` wins.
    pub fn merge_shards(&self, id1: ShardId, id2: ShardId, merge_threshold: u64) -> ForestResult<bool> {
        let mut shards = self.shards.write();
        let target = shards.get(&id1).cloned().ok_or(ForestError::ShardNotFound(id1))?;
        let source = shards.get(&id2).cloned().ok_or(ForestError::ShardNotFound(id2))?;
        if id1 == id2 {
            return Ok(false);
        }

        let (mut target_state, mut source_state) = lock_pair(&target, &source);
        let combined = target_state.load.saturating_add(source_state.load);
        if combined > merge_threshold {
            return Ok(false);
        }

        let absorbed = std::mem::replace(&mut source_state.shard, Shard::new(id2));
        let moved = absorbed.len();
        target_state.shard.data.extend(absorbed.data);
        target_state.load = combined;
        target_state.recompute_root();
        source_state.recompute_root();
        source_state.status = ShardStatus::MergedInto(id1);
        drop(source_state);
        drop(target_state);

        shards.remove(&id2);
        info!(
            "[Forest] Merged shard {} into {} ({} keys moved, load={})",
            id2, id1, moved, combined
        );
        Ok(true)
    }

    /// Run one split/merge pass over the whole forest.
    pub fn rebalance(&self, cfg: &RebalanceConfig) -> RebalanceReport {
        rebalance(self, cfg)
    }

    /// Union of every shard's data. Shards are visited in ascending ID order,
    /// so a key present in several shards takes the highest shard's value.
    pub fn reconstruct_state(&self) -> BTreeMap<String, Value> {
        let shards = self.shards.read();
        let mut state = BTreeMap::new();
        for meta in shards.values() {
            let guard = meta.read();
            for (k, v) in &guard.shard.data {
                state.insert(k.clone(), v.clone());
            }
        }
        state
    }

    /// Append a root to the forest's ordered root list.
    pub fn add_root(&self, root: MerkleNode) {
        self.roots.write().push(root);
    }

    /// Append every shard's current root (ascending ID) to the root list and
    /// return how many were added.
    pub fn commit_roots(&self) -> usize {
        let current: Vec<MerkleNode> = {
            let shards = self.shards.read();
            shards.values().map(|meta| meta.read().root.clone()).collect()
        };
        let added = current.len();
        self.roots.write().extend(current);
        added
    }

    pub fn roots(&self) -> Vec<MerkleNode> {
        self.roots.read().clone()
    }

    /// Commitment over the whole registry: SHA-256 of every `(id, root)`
    /// pair in ascending ID order.
    pub fn registry_root(&self) -> Digest32 {
        let shards = self.shards.read();
        let mut hasher = Sha256::new();
        for (id, meta) in shards.iter() {
            hasher.update(id.0.to_le_bytes());
            hasher.update(meta.read().root.hash);
        }
        hasher.finalize().into()
    }

    /// Inclusion proof for `key` against shard `id`'s current root.
    pub fn prove_key(&self, id: ShardId, key: &str) -> ForestResult<KeyProof> {
        let meta = self.get_shard(id).ok_or(ForestError::ShardNotFound(id))?;
        let state = meta.read();
        let value = state
            .shard
            .get(key)
            .cloned()
            .ok_or(amf_crypto::MerkleError::ItemNotFound)?;
        let tree = MerkleTree::build(&leaf_preimages(&state.shard))?;
        let proof = tree.generate_proof(&leaf_preimage(key, &value))?;
        Ok(KeyProof {
            shard_id: id,
            key: key.to_string(),
            value,
            root: state.root.hash,
            proof,
        })
    }

    /// Bloom filter over the keys of shard `id`.
    pub fn key_filter(&self, id: ShardId, settings: &BloomSettings) -> ForestResult<BloomFilter> {
        let meta = self.get_shard(id).ok_or(ForestError::ShardNotFound(id))?;
        let mut filter = settings.build();
        for key in meta.read().shard.keys() {
            filter.insert(key.as_bytes());
        }
        Ok(filter)
    }

    /// Point-in-time copy of every shard for external archival.
    pub fn snapshot(&self) -> StateSnapshot {
        let registry = self.shards.read();
        let shards = registry
            .values()
            .map(|meta| {
                let state = meta.read();
                ShardSnapshot {
                    id: meta.id,
                    load: state.load,
                    root: state.root.hash_hex(),
                    data: state.shard.data.clone(),
                }
            })
            .collect();
        StateSnapshot { shards }
    }

    /// Audit log of every key moved between shards.
    pub fn commitments(&self) -> Vec<TransferCommitment> {
        self.commitments.lock().clone()
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, BTreeMap<ShardId, Arc<ShardMeta>>> {
        self.shards.read()
    }
}

/// Write-lock two distinct entries in ascending ID order. The guards come
/// back in argument order.
pub(crate) fn lock_pair<'a>(
    first: &'a ShardMeta,
    second: &'a ShardMeta,
) -> (RwLockWriteGuard<'a, ShardState>, RwLockWriteGuard<'a, ShardState>) {
    if first.id < second.id {
        let a = first.write();
        let b = second.write();
        (a, b)
    } else {
        let b = second.write();
        let a = first.write();
        (a, b)
    }
}
