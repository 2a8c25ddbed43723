// Load-driven split/merge pass over the forest.
//
// The pass is stateless: it reads load counters through the registry's public
// operations and never holds a lock across two registry calls. Both phases
// work from an ID snapshot, so shards created or removed concurrently are
// either picked up on the next pass or skipped.
//
// Merge pairing is first-fit in ascending ID order. It is O(n^2) and does not
// minimise the number of shards.

use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{ForestError, ForestResult};
use crate::forest::Forest;
use crate::shard::ShardId;

/// Split/merge thresholds supplied by the caller on every mutating call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Load above which a shard is split
    pub split_threshold: u64,

    /// Combined load below which two shards are merged
    pub merge_threshold: u64,
}

impl RebalanceConfig {
    pub fn new(split_threshold: u64, merge_threshold: u64) -> Self {
        RebalanceConfig {
            split_threshold,
            merge_threshold,
        }
    }
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        RebalanceConfig::new(100, 10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub parent: ShardId,
    pub left: ShardId,
    pub right: ShardId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub target: ShardId,
    pub absorbed: ShardId,
}

/// What a single pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub splits: Vec<SplitRecord>,
    pub merges: Vec<MergeRecord>,
}

impl RebalanceReport {
    pub fn is_empty(&self) -> bool {
        self.splits.is_empty() && self.merges.is_empty()
    }
}

/// Split every overloaded shard, then greedily merge underloaded pairs.
pub fn rebalance(forest: &Forest, cfg: &RebalanceConfig) -> RebalanceReport {
    let mut report = RebalanceReport::default();
    split_pass(forest, cfg, &mut report);
    merge_pass(forest, cfg, &mut report);
    if !report.is_empty() {
        info!(
            "[Rebalancer] Pass complete: {} split(s), {} merge(s), {} shard(s) live",
            report.splits.len(),
            report.merges.len(),
            forest.shard_count()
        );
    }
    report
}

fn split_pass(forest: &Forest, cfg: &RebalanceConfig, report: &mut RebalanceReport) {
    for id in forest.discover_shard_ids() {
        let Some(load) = forest.shard_load(id) else {
            continue;
        };
        if load <= cfg.split_threshold {
            continue;
        }
        info!("[Rebalancer] Splitting shard {} (load={})", id, load);
        match forest.split_shard(id, cfg.split_threshold) {
            Ok(Some((left, right))) => report.splits.push(SplitRecord {
                parent: id,
                left,
                right,
            }),
            Ok(None) => {}
            Err(err) => debug!("[Rebalancer] Split of shard {} skipped: {}", id, err),
        }
    }
}

fn merge_pass(forest: &Forest, cfg: &RebalanceConfig, report: &mut RebalanceReport) {
    let ids: Vec<ShardId> = forest.discover_shard_ids().into_iter().collect();
    let mut consumed: BTreeSet<ShardId> = BTreeSet::new();

    for (i, &target) in ids.iter().enumerate() {
        if consumed.contains(&target) {
            continue;
        }
        for &candidate in &ids[i + 1..] {
            if consumed.contains(&candidate) {
                continue;
            }
            let (Some(target_load), Some(candidate_load)) =
                (forest.shard_load(target), forest.shard_load(candidate))
            else {
                continue;
            };
            if target_load.saturating_add(candidate_load) >= cfg.merge_threshold {
                continue;
            }

            info!(
                "[Rebalancer] Merging shards {} and {} (loads={},{})",
                target, candidate, target_load, candidate_load
            );
            let result = forest.merge_shards(target, candidate, cfg.merge_threshold);
            if settle_merge(result, target, candidate, report, &mut consumed) {
                break;
            }
        }
    }
}

/// Record the outcome of merging `candidate` into `target`. Returns true when
/// the scan for `target` is over.
///
/// A candidate is consumed only by a merge that happened. `Ok(false)` means
/// the loads grew after they were read, so the next candidate is tried.
fn settle_merge(
    result: ForestResult<bool>,
    target: ShardId,
    candidate: ShardId,
    report: &mut RebalanceReport,
    consumed: &mut BTreeSet<ShardId>,
) -> bool {
    match result {
        Ok(true) => {
            report.merges.push(MergeRecord {
                target,
                absorbed: candidate,
            });
            consumed.insert(candidate);
            true
        }
        Ok(false) => false,
        Err(ForestError::ShardNotFound(missing)) => {
            debug!(
                "[Rebalancer] Merge of {} into {} skipped: shard {} is gone",
                candidate, target, missing
            );
            missing == target
        }
        Err(err) => {
            debug!(
                "[Rebalancer] Merge of {} into {} skipped: {}",
                candidate, target, err
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn load_shard(forest: &Forest, id: u64, keys: &[&str]) {
        forest.create_shard(ShardId(id));
        let quiet = RebalanceConfig::new(u64::MAX, 0);
        for (i, key) in keys.iter().enumerate() {
            forest
                .add_data_to_shard(ShardId(id), *key, Value::Int(i as i64), &quiet)
                .unwrap();
        }
    }

    #[test]
    fn test_refused_merge_leaves_candidate_available() {
        let mut report = RebalanceReport::default();
        let mut consumed = BTreeSet::new();

        let done = settle_merge(Ok(false), ShardId(1), ShardId(2), &mut report, &mut consumed);
        assert!(!done);
        assert!(consumed.is_empty());
        assert!(report.merges.is_empty());

        let lost_race = Err(ForestError::ShardNotFound(ShardId(3)));
        let done = settle_merge(lost_race, ShardId(1), ShardId(3), &mut report, &mut consumed);
        assert!(!done);
        assert!(consumed.is_empty());

        let done = settle_merge(Ok(true), ShardId(1), ShardId(4), &mut report, &mut consumed);
        assert!(done);
        assert!(consumed.contains(&ShardId(4)));
        assert_eq!(report.merges.len(), 1);
    }

    #[test]
    fn test_vanished_target_ends_its_scan() {
        let mut report = RebalanceReport::default();
        let mut consumed = BTreeSet::new();
        let gone = Err(ForestError::ShardNotFound(ShardId(1)));
        assert!(settle_merge(gone, ShardId(1), ShardId(2), &mut report, &mut consumed));
        assert!(consumed.is_empty());
    }

    #[test]
    fn test_quiet_pass_changes_nothing() {
        let forest = Forest::new();
        load_shard(&forest, 1, &["a", "b"]);
        let report = rebalance(&forest, &RebalanceConfig::new(10, 0));
        assert!(report.is_empty());
        assert_eq!(forest.shard_count(), 1);
    }

    #[test]
    fn test_split_pass() {
        let forest = Forest::new();
        load_shard(&forest, 1, &["aa", "b", "cc"]);
        let report = rebalance(&forest, &RebalanceConfig::new(2, 0));
        assert_eq!(
            report.splits,
            vec![SplitRecord {
                parent: ShardId(1),
                left: ShardId(2),
                right: ShardId(3)
            }]
        );
        assert_eq!(
            forest.discover_shard_ids(),
            BTreeSet::from([ShardId(2), ShardId(3)])
        );
    }

    #[test]
    fn test_merge_pass_is_first_fit() {
        let forest = Forest::new();
        load_shard(&forest, 1, &["a"]);
        load_shard(&forest, 2, &["b"]);
        load_shard(&forest, 3, &["c"]);
        load_shard(&forest, 4, &["d"]);

        let report = rebalance(&forest, &RebalanceConfig::new(100, 3));
        assert_eq!(
            report.merges,
            vec![
                MergeRecord { target: ShardId(1), absorbed: ShardId(2) },
                MergeRecord { target: ShardId(3), absorbed: ShardId(4) },
            ]
        );
        assert_eq!(forest.shard_load(ShardId(1)), Some(2));
        assert_eq!(forest.shard_load(ShardId(3)), Some(2));
    }

    #[test]
    fn test_merge_pass_uses_strict_bound() {
        let forest = Forest::new();
        load_shard(&forest, 1, &["a"]);
        load_shard(&forest, 2, &["b"]);
        // 1 + 1 is not < 2
        let report = rebalance(&forest, &RebalanceConfig::new(100, 2));
        assert!(report.merges.is_empty());
        assert_eq!(forest.shard_count(), 2);
    }

    #[test]
    fn test_split_children_can_merge_back_when_unloaded() {
        let forest = Forest::new();
        load_shard(&forest, 1, &["aa", "b"]);
        // children start at load 0, so any positive merge threshold rejoins them
        let report = rebalance(&forest, &RebalanceConfig::new(1, 1));
        assert_eq!(report.splits.len(), 1);
        assert_eq!(
            report.merges,
            vec![MergeRecord { target: ShardId(2), absorbed: ShardId(3) }]
        );
        assert_eq!(forest.shard_data(ShardId(2)).unwrap().len(), 2);
    }
}
