use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::leaderboard::{Player, PointsConfig, Run};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Initial contents for an `InMemoryStore`, loaded from a JSON fixture
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSeed {
    pub runs: Vec<Run>,
    pub players: Vec<Player>,
    pub points_config: Option<PointsConfig>,
}

impl StoreSeed {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(contents)?)
    }
}
