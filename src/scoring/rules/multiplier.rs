use super::super::{rule_priority, PointsContext, PointsRule};
use crate::leaderboard::{LeaderboardKind, RunType};

/// Scales the running total by every multiplier that applies to the run
pub struct MultiplierRule;

impl PointsRule for MultiplierRule {
    fn apply(&self, running_total: f64, context: &PointsContext) -> f64 {
        let config = context.config;
        let run = context.run;

        let run_type = match run.run_type {
            RunType::Solo => 1.0,
            RunType::CoOp => config.co_op_multiplier,
        };
        let kind = match run.leaderboard_kind {
            LeaderboardKind::Regular => 1.0,
            LeaderboardKind::IndividualLevel => config.il_multiplier,
            LeaderboardKind::CommunityGolds => config.community_golds_multiplier,
        };
        let band = if run.obsolete {
            config.obsolete_multiplier
        } else {
            1.0
        };

        running_total * run_type * kind * band
    }

    fn priority(&self) -> u32 {
        rule_priority::MULTIPLIER
    }
}
