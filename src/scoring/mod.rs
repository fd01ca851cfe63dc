pub mod rules;

use crate::leaderboard::{PointsConfig, Run};

use rules::{BasePointsRule, MultiplierRule, RankBonusRule};

/// Priority constants for points rules.
/// Lower values run first; later rules see the running total of earlier ones.
pub mod rule_priority {
    /// Base points for holding a rank
    pub const BASE_POINTS: u32 = 100;
    /// Flat top-three bonus
    pub const RANK_BONUS: u32 = 200;
    /// Multipliers for run type, leaderboard kind and obsolete band
    pub const MULTIPLIER: u32 = 300;
}

/// One step of the points policy
pub trait PointsRule: Send + Sync {
    fn apply(&self, running_total: f64, context: &PointsContext) -> f64;

    fn priority(&self) -> u32;
}

pub struct PointsContext<'a> {
    pub run: &'a Run,
    pub rank: u32,
    pub config: &'a PointsConfig,
}

impl<'a> PointsContext<'a> {
    pub fn new(run: &'a Run, rank: u32, config: &'a PointsConfig) -> Self {
        Self { run, rank, config }
    }
}

static STANDARD_RULES: [&dyn PointsRule; 3] = [&BasePointsRule, &RankBonusRule, &MultiplierRule];

/// Points for a run holding `rank` in its partition under `config`.
///
/// Deterministic and side-effect free; the configuration is always passed in.
/// Returns 0 when scoring is disabled. The total is rounded once, after every
/// rule has run, and never goes below zero.
pub fn calculate_points(run: &Run, rank: u32, config: &PointsConfig) -> i64 {
    if !config.enabled {
        return 0;
    }

    let context = PointsContext::new(run, rank, config);
    let total = STANDARD_RULES
        .iter()
        .fold(0.0, |total, rule| rule.apply(total, &context));

    total.round().max(0.0) as i64
}
