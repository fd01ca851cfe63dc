use async_trait::async_trait;
use thiserror::Error;

use super::events::ChangeEvent;
use crate::store::StoreError;

/// Errors that can occur when handling change events
#[derive(Debug, Error)]
pub enum ChangeError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Handler error: {0}")]
    Handler(String),
}

/// Trait for components that react to store change feeds
///
/// Handlers must tolerate duplicate and collapsed deliveries: a feed may
/// replay an event, and several writes may arrive as one.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn handle_change(&self, event: ChangeEvent) -> Result<(), ChangeError>;

    /// Get a human-readable name for this handler (for logging/debugging)
    fn handler_name(&self) -> &'static str;
}
