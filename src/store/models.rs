use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use strum_macros::{AsRefStr, Display};

use crate::leaderboard::{LeaderboardKind, PointsConfig, Run, RunType};

/// Collections the engine reads from or writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Collection {
    Runs,
    Players,
    PointsConfig,
}

/// Address of a single document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub collection: Collection,
    pub id: String,
}

impl DocumentKey {
    pub const POINTS_CONFIG_ID: &'static str = "current";

    pub fn run(id: impl Into<String>) -> Self {
        Self {
            collection: Collection::Runs,
            id: id.into(),
        }
    }

    pub fn player(uid: impl Into<String>) -> Self {
        Self {
            collection: Collection::Players,
            id: uid.into(),
        }
    }

    pub fn points_config() -> Self {
        Self {
            collection: Collection::PointsConfig,
            id: Self::POINTS_CONFIG_ID.to_string(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Partial document update, keyed by the stored (camelCase) field name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDiff(Map<String, Value>);

impl FieldDiff {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a diff from every field of a serializable record
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(record)? {
            Value::Object(fields) => Ok(Self(fields)),
            other => Ok(Self::new().with("value", other)),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrites the matching fields of `document`
    pub fn merge_into(&self, document: &mut Map<String, Value>) {
        for (field, value) in &self.0 {
            document.insert(field.clone(), value.clone());
        }
    }
}

/// One operation inside an atomic batch commit
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Merge into the document, creating it when absent
    Set { key: DocumentKey, fields: FieldDiff },
    /// Merge into an existing document; fails the batch when it is absent
    Update { key: DocumentKey, fields: FieldDiff },
    Delete { key: DocumentKey },
}

impl WriteOp {
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOp::Set { key, .. } => key,
            WriteOp::Update { key, .. } => key,
            WriteOp::Delete { key } => key,
        }
    }
}

/// Equality filters over the indexed run fields.
///
/// Absent-field predicates (a run without `subcategory`, say) cannot be
/// expressed here; callers fetch with the indexed filters and finish the
/// selection in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunQuery {
    pub verified: Option<bool>,
    pub leaderboard_kind: Option<LeaderboardKind>,
    pub category: Option<String>,
    pub platform: Option<String>,
    pub run_type: Option<RunType>,
    pub level: Option<String>,
    pub player_id: Option<String>,
    pub player2_id: Option<String>,
    pub limit: Option<usize>,
}

impl RunQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn verified_only() -> Self {
        Self {
            verified: Some(true),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_player(mut self, uid: &str) -> Self {
        self.player_id = Some(uid.to_string());
        self
    }

    pub fn with_player2(mut self, uid: &str) -> Self {
        self.player2_id = Some(uid.to_string());
        self
    }

    pub fn matches(&self, run: &Run) -> bool {
        fn eq<T: PartialEq>(filter: &Option<T>, value: &T) -> bool {
            filter.as_ref().map_or(true, |expected| expected == value)
        }

        eq(&self.verified, &run.verified)
            && eq(&self.leaderboard_kind, &run.leaderboard_kind)
            && eq(&self.category, &run.category)
            && eq(&self.platform, &run.platform)
            && eq(&self.run_type, &run.run_type)
            && self
                .level
                .as_ref()
                .map_or(true, |level| run.level.as_ref() == Some(level))
            && eq(&self.player_id, &run.player_id)
            && self
                .player2_id
                .as_ref()
                .map_or(true, |uid| run.player2_id.as_ref() == Some(uid))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A change-feed delivery for one run entering, changing inside or leaving a query
#[derive(Debug, Clone, PartialEq)]
pub struct RunChange {
    pub kind: ChangeKind,
    pub run: Run,
    /// Record before the write, when the store can provide it
    pub previous: Option<Run>,
}

/// A change-feed delivery for the points configuration singleton
#[derive(Debug, Clone, PartialEq)]
pub struct PointsConfigChange {
    /// `None` when the singleton was deleted
    pub current: Option<PointsConfig>,
}
