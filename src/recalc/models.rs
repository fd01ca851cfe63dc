use serde::Serialize;

use crate::leaderboard::PartitionKey;
use crate::store::DocumentKey;

/// Something that could not be recalculated or written during a pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum RecalculationFailure {
    Partition { key: String, error: String },
    Write { key: String, error: String },
    Player { uid: String, error: String },
    /// The set of partitions and players could not be enumerated
    Global { error: String },
}

impl RecalculationFailure {
    pub fn partition(key: &PartitionKey, error: impl ToString) -> Self {
        Self::Partition {
            key: key.to_string(),
            error: error.to_string(),
        }
    }

    pub fn write(key: &DocumentKey, error: impl ToString) -> Self {
        Self::Write {
            key: key.to_string(),
            error: error.to_string(),
        }
    }

    pub fn player(uid: &str, error: impl ToString) -> Self {
        Self::Player {
            uid: uid.to_string(),
            error: error.to_string(),
        }
    }

    pub fn global(error: impl ToString) -> Self {
        Self::Global {
            error: error.to_string(),
        }
    }
}

/// Summary of one recalculation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationReport {
    /// Partitions in which at least one run changed
    pub partitions_updated: usize,
    /// Runs whose rank or points were written
    pub runs_updated: usize,
    /// Player documents whose aggregates were written
    pub players_updated: usize,
    pub errors: Vec<RecalculationFailure>,
}

impl RecalculationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.runs_updated + self.players_updated
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}
