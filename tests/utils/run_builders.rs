use chrono::NaiveDate;

use runboard::leaderboard::{LeaderboardKind, Run, RunType};

// ============================================================================
// Run Builder
// ============================================================================

/// Builds run documents with sensible defaults: a verified solo any% PC run
/// submitted on 2024-01-01.
pub struct RunBuilder {
    run: Run,
}

#[allow(dead_code)]
impl RunBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            run: Run {
                id: id.to_string(),
                player_id: String::new(),
                player_name: String::new(),
                player2_id: None,
                player2_name: None,
                category: "any%".to_string(),
                platform: "pc".to_string(),
                run_type: RunType::Solo,
                leaderboard_kind: LeaderboardKind::Regular,
                level: None,
                subcategory: None,
                time: "1:00".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
                verified: true,
                obsolete: false,
                rank: None,
                points: None,
            },
        }
    }

    /// Claimed run: account id plus a display name derived from it
    pub fn by(mut self, uid: &str) -> Self {
        self.run.player_id = uid.to_string();
        self.run.player_name = uid.to_uppercase();
        self
    }

    /// Imported run with only a display name
    pub fn by_name(mut self, name: &str) -> Self {
        self.run.player_id = String::new();
        self.run.player_name = name.to_string();
        self
    }

    pub fn with_partner(mut self, uid: &str) -> Self {
        self.run.run_type = RunType::CoOp;
        self.run.player2_id = Some(uid.to_string());
        self.run.player2_name = Some(uid.to_uppercase());
        self
    }

    pub fn time(mut self, time: &str) -> Self {
        self.run.time = time.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.run.category = category.to_string();
        self
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.run.platform = platform.to_string();
        self
    }

    pub fn level(mut self, level: &str) -> Self {
        self.run.leaderboard_kind = LeaderboardKind::IndividualLevel;
        self.run.level = Some(level.to_string());
        self
    }

    pub fn subcategory(mut self, subcategory: &str) -> Self {
        self.run.subcategory = Some(subcategory.to_string());
        self
    }

    pub fn on(mut self, year: i32, month: u32, day: u32) -> Self {
        self.run.date = NaiveDate::from_ymd_opt(year, month, day).expect("valid date");
        self
    }

    pub fn obsolete(mut self) -> Self {
        self.run.obsolete = true;
        self
    }

    pub fn unverified(mut self) -> Self {
        self.run.verified = false;
        self
    }

    pub fn build(self) -> Run {
        self.run
    }
}
