use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecalcError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A fetch filled its result cap, so the records behind it are incomplete
    #[error("Query for {scope} hit the result cap of {limit}")]
    Truncated { scope: &'static str, limit: usize },

    #[error("Recalculation engine is not running")]
    NotRunning,

    #[error("Recalculation engine is already running")]
    AlreadyRunning,
}
