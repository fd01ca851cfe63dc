use serde::{Deserialize, Serialize};
use std::fmt;

use super::models::{LeaderboardKind, Run, RunType};
use crate::store::RunQuery;

/// Stands in for an absent `level` or `subcategory`
pub const ABSENT: &str = "";

/// Identifies the leaderboard a run competes in.
///
/// Derived from the run on every use and never stored. Two runs compete
/// directly exactly when their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub leaderboard_kind: LeaderboardKind,
    pub category: String,
    pub platform: String,
    pub run_type: RunType,
    pub level: String,
    pub subcategory: String,
}

impl PartitionKey {
    pub fn of(run: &Run) -> Self {
        Self {
            leaderboard_kind: run.leaderboard_kind,
            category: run.category.clone(),
            platform: run.platform.clone(),
            run_type: run.run_type,
            level: optional_component(run.level.as_deref()),
            subcategory: optional_component(run.subcategory.as_deref()),
        }
    }

    /// Server-side half of the partition fetch: equality filters on indexed fields
    pub fn to_query(&self) -> RunQuery {
        RunQuery {
            leaderboard_kind: Some(self.leaderboard_kind),
            category: Some(self.category.clone()),
            platform: Some(self.platform.clone()),
            run_type: Some(self.run_type),
            level: (self.level != ABSENT).then(|| self.level.clone()),
            ..RunQuery::default()
        }
    }

    /// Client-side half of the partition fetch.
    ///
    /// Needed because "field absent" cannot be expressed as a store filter;
    /// the fetch over-selects and this predicate trims the result.
    pub fn matches(&self, run: &Run) -> bool {
        PartitionKey::of(run) == *self
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: &str| {
            if value == ABSENT {
                "-".to_string()
            } else {
                value.to_string()
            }
        };
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            self.leaderboard_kind,
            self.category,
            self.platform,
            self.run_type,
            show(&self.level),
            show(&self.subcategory)
        )
    }
}

/// Convenience wrapper for `PartitionKey::of`
pub fn key_of(run: &Run) -> PartitionKey {
    PartitionKey::of(run)
}

/// Groups runs that belong to the same player or co-op pair.
///
/// Each participant is identified by account id when present and by display
/// name otherwise. Co-op participants are sorted so swapping slots does not
/// create a second group.
pub fn player_group_key(run: &Run) -> String {
    let first = normalize(participant(&run.player_id, &run.player_name));

    let second = if run.is_co_op() {
        normalize(participant(
            run.player2_id.as_deref().unwrap_or_default(),
            run.player2_name.as_deref().unwrap_or_default(),
        ))
    } else {
        String::new()
    };

    if second.is_empty() || first <= second {
        format!("{first}_{second}")
    } else {
        format!("{second}_{first}")
    }
}

pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn participant<'a>(id: &'a str, name: &'a str) -> &'a str {
    if id.trim().is_empty() {
        name
    } else {
        id
    }
}

fn optional_component(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => ABSENT.to_string(),
    }
}
