use super::super::{rule_priority, PointsContext, PointsRule};

/// Base points awarded to the holder of rank 1, whatever the configuration says
pub const RANK_ONE_BASE_POINTS: i64 = 100;

pub struct BasePointsRule;

impl PointsRule for BasePointsRule {
    fn apply(&self, running_total: f64, context: &PointsContext) -> f64 {
        let base = if context.rank == 1 {
            RANK_ONE_BASE_POINTS
        } else {
            context.config.base_points_per_run
        };
        running_total + base as f64
    }

    fn priority(&self) -> u32 {
        rule_priority::BASE_POINTS
    }
}
