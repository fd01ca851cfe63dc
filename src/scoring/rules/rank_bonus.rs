use super::super::{rule_priority, PointsContext, PointsRule};
use crate::leaderboard::{LeaderboardKind, PointsConfig};

/// Adds the configured top-three bonus where the leaderboard kind allows it
pub struct RankBonusRule;

impl RankBonusRule {
    pub fn applies_to(kind: LeaderboardKind, config: &PointsConfig) -> bool {
        match kind {
            LeaderboardKind::Regular => true,
            LeaderboardKind::IndividualLevel => config.apply_rank_bonuses_to_il,
            LeaderboardKind::CommunityGolds => config.apply_rank_bonuses_to_community_golds,
        }
    }
}

impl PointsRule for RankBonusRule {
    fn apply(&self, running_total: f64, context: &PointsContext) -> f64 {
        if !Self::applies_to(context.run.leaderboard_kind, context.config) {
            return running_total;
        }

        let bonus = context
            .config
            .top3_bonus
            .for_rank(context.rank)
            .unwrap_or_default();
        running_total + bonus as f64
    }

    fn priority(&self) -> u32 {
        rule_priority::RANK_BONUS
    }
}
