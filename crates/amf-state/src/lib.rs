pub mod error;
pub mod forest;
pub mod merkle_builder;
pub mod rebalance;
pub mod settings;
pub mod shard;
pub mod snapshot;
pub mod sync;
pub mod value;

pub use error::{ForestError, ForestResult};
pub use forest::{Forest, KeyProof, ShardMeta, ShardState, ShardStatus};
pub use merkle_builder::{build_root, leaf_preimage, leaf_preimages};
pub use rebalance::{rebalance, MergeRecord, RebalanceConfig, RebalanceReport, SplitRecord};
pub use settings::{BloomSettings, ForestSettings};
pub use shard::{Shard, ShardId};
pub use snapshot::{ShardSnapshot, StateSnapshot};
pub use sync::{SyncReceipt, TransferCommitment};
pub use value::Value;
