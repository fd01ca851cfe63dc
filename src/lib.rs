// Library crate for the runboard recalculation engine
// This file exposes the public API for the binary and integration tests

pub mod event;
pub mod leaderboard;
pub mod recalc;
pub mod scoring;
pub mod settings;
pub mod store;

// Re-export commonly used types for easier access in tests
pub use leaderboard::{PartitionKey, Player, PointsConfig, Run};
pub use recalc::{RecalcError, RecalculationEngine, RecalculationReport, RecalculationStatus};
pub use scoring::calculate_points;
pub use settings::EngineSettings;
pub use store::{InMemoryStore, LeaderboardStore, StoreError, StoreSeed};
