// Store adapter contract
//
// The engine never owns persistence. Everything it needs from the backing
// document store goes through `LeaderboardStore`; `InMemoryStore` is the
// reference implementation used by the binary and the test suites.

pub use errors::StoreError;
pub use memory::InMemoryStore;
pub use models::{
    ChangeKind, Collection, DocumentKey, FieldDiff, PointsConfigChange, RunChange, RunQuery,
    WriteOp,
};
pub use seed::{SeedError, StoreSeed};

mod errors;
mod memory;
mod models;
mod seed;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::leaderboard::{Player, PointsConfig, Run};

#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Runs matching the equality filters, in document-id order, capped by
    /// `query.limit` and the store's own result cap
    async fn query_runs(&self, query: &RunQuery) -> Result<Vec<Run>, StoreError>;

    async fn get_player(&self, uid: &str) -> Result<Option<Player>, StoreError>;

    async fn query_players(&self, limit: usize) -> Result<Vec<Player>, StoreError>;

    /// The points configuration singleton, if one was ever saved
    async fn get_points_config(&self) -> Result<Option<PointsConfig>, StoreError>;

    /// Push-based feed of runs entering, changing inside, or leaving `query`
    async fn subscribe_runs(
        &self,
        query: RunQuery,
    ) -> Result<mpsc::UnboundedReceiver<RunChange>, StoreError>;

    async fn subscribe_points_config(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<PointsConfigChange>, StoreError>;

    /// Applies every operation or none of them
    async fn commit_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError>;

    /// Largest number of operations accepted by a single `commit_batch`
    fn max_batch_ops(&self) -> usize;
}
