use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Where the scheduler is in its `Idle -> Debouncing -> Recalculating` cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    #[default]
    Idle,
    Debouncing,
    Recalculating,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationStatus {
    pub in_progress: bool,
    pub phase: SchedulerPhase,
    /// Partitions waiting for the next pass
    pub pending_partitions: usize,
}

impl RecalculationStatus {
    pub fn idle(pending_partitions: usize) -> Self {
        Self {
            in_progress: false,
            phase: SchedulerPhase::Idle,
            pending_partitions,
        }
    }

    pub fn debouncing(pending_partitions: usize) -> Self {
        Self {
            in_progress: false,
            phase: SchedulerPhase::Debouncing,
            pending_partitions,
        }
    }

    pub fn recalculating(pending_partitions: usize) -> Self {
        Self {
            in_progress: true,
            phase: SchedulerPhase::Recalculating,
            pending_partitions,
        }
    }
}
