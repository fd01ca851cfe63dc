use crate::store::{ChangeKind, PointsConfigChange, RunChange};

/// Changes delivered by the store's feeds
///
/// Events describe writes that already happened. Consumers react by
/// recomputing from source data, never by patching cached state.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// A run entered, changed inside, or left the verified-runs feed
    Run(RunChange),

    /// The points configuration singleton was saved or deleted
    PointsConfig(PointsConfigChange),
}

impl ChangeEvent {
    /// Get a human-readable description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            ChangeEvent::Run(change) => match change.kind {
                ChangeKind::Added => "run_added",
                ChangeKind::Modified => "run_modified",
                ChangeKind::Removed => "run_removed",
            },
            ChangeEvent::PointsConfig(_) => "points_config_changed",
        }
    }

    /// Id of the run the event concerns, if any
    pub fn run_id(&self) -> Option<&str> {
        match self {
            ChangeEvent::Run(change) => Some(change.run.id.as_str()),
            ChangeEvent::PointsConfig(_) => None,
        }
    }
}

impl From<RunChange> for ChangeEvent {
    fn from(change: RunChange) -> Self {
        ChangeEvent::Run(change)
    }
}

impl From<PointsConfigChange> for ChangeEvent {
    fn from(change: PointsConfigChange) -> Self {
        ChangeEvent::PointsConfig(change)
    }
}
