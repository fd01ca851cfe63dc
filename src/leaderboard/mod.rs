// Leaderboard domain: run records, partitioning and ranking
//
// Everything here is pure and synchronous. The recalculation engine feeds it
// runs fetched from the store and writes back whatever it derives.

pub use models::{LeaderboardKind, Player, PointsConfig, Run, RunType, Top3Bonus};
pub use partition::{key_of, normalize, player_group_key, PartitionKey};
pub use ranking::{rank_partition, Band, Placement, RankedPartition};
pub use time::parse_run_time;

mod models;
pub mod partition;
mod ranking;
pub mod time;
