pub mod base_points;
pub mod multiplier;
pub mod rank_bonus;

pub use base_points::BasePointsRule;
pub use multiplier::MultiplierRule;
pub use rank_bonus::RankBonusRule;
