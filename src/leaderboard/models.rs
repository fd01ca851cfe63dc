use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Whether a run was played alone or by two participants
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RunType {
    #[default]
    Solo,
    CoOp,
}

/// Which family of leaderboards a run competes in
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LeaderboardKind {
    #[default]
    Regular,
    IndividualLevel,
    CommunityGolds,
}

/// A submitted run as stored in the `runs` collection.
///
/// `rank` and `points` are derived fields written by the recalculation engine;
/// everything else is owned by whoever submits or moderates the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    /// Account id of the first participant, empty for unclaimed (imported) runs
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub player_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2_name: Option<String>,
    pub category: String,
    pub platform: String,
    #[serde(default)]
    pub run_type: RunType,
    #[serde(default)]
    pub leaderboard_kind: LeaderboardKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    /// Raw time as submitted, e.g. `1:02:03.450` or `PT1H2M3.45S`
    pub time: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub obsolete: bool,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub points: Option<i64>,
}

impl Run {
    pub fn is_co_op(&self) -> bool {
        self.run_type == RunType::CoOp
    }

    /// Account ids of every claimed participant
    pub fn participant_ids(&self) -> Vec<&str> {
        let mut ids = Vec::with_capacity(2);
        if !self.player_id.trim().is_empty() {
            ids.push(self.player_id.as_str());
        }
        if self.is_co_op() {
            if let Some(id) = self.player2_id.as_deref() {
                if !id.trim().is_empty() && !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Returns true when two records differ only in engine-written fields
    pub fn same_except_derived(&self, other: &Run) -> bool {
        let mut left = self.clone();
        let mut right = other.clone();
        left.rank = None;
        left.points = None;
        right.rank = None;
        right.points = None;
        left == right
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Top3Bonus {
    pub rank1: i64,
    pub rank2: i64,
    pub rank3: i64,
}

impl Top3Bonus {
    pub fn for_rank(&self, rank: u32) -> Option<i64> {
        match rank {
            1 => Some(self.rank1),
            2 => Some(self.rank2),
            3 => Some(self.rank3),
            _ => None,
        }
    }
}

/// Scoring policy singleton edited by administrators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointsConfig {
    pub version: u32,
    pub base_points_per_run: i64,
    pub top3_bonus: Top3Bonus,
    pub co_op_multiplier: f64,
    pub il_multiplier: f64,
    pub community_golds_multiplier: f64,
    pub obsolete_multiplier: f64,
    #[serde(rename = "applyRankBonusesToIL")]
    pub apply_rank_bonuses_to_il: bool,
    pub apply_rank_bonuses_to_community_golds: bool,
    pub enabled: bool,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            version: 0,
            base_points_per_run: 10,
            top3_bonus: Top3Bonus {
                rank1: 50,
                rank2: 30,
                rank3: 20,
            },
            co_op_multiplier: 0.5,
            il_multiplier: 1.0,
            community_golds_multiplier: 1.0,
            obsolete_multiplier: 0.5,
            apply_rank_bonuses_to_il: false,
            apply_rank_bonuses_to_community_golds: false,
            enabled: true,
        }
    }
}

impl PointsConfig {
    /// Field-wise comparison of the scoring fields; `version` is ignored
    pub fn same_policy(&self, other: &PointsConfig) -> bool {
        self.base_points_per_run == other.base_points_per_run
            && self.top3_bonus == other.top3_bonus
            && self.co_op_multiplier == other.co_op_multiplier
            && self.il_multiplier == other.il_multiplier
            && self.community_golds_multiplier == other.community_golds_multiplier
            && self.obsolete_multiplier == other.obsolete_multiplier
            && self.apply_rank_bonuses_to_il == other.apply_rank_bonuses_to_il
            && self.apply_rank_bonuses_to_community_golds
                == other.apply_rank_bonuses_to_community_golds
            && self.enabled == other.enabled
    }
}

/// Per-player aggregates, written only by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    pub uid: String,
    pub total_points: i64,
    pub total_runs: u32,
}
