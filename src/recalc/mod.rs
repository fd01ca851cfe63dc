// Incremental recalculation
//
// Change events mark partitions and players as pending; after a quiet period
// the scheduler drains the pending set into one pass that ranks, scores and
// diffs each partition, writes through the batch writer, and refreshes
// player aggregates.

// Public API - what other modules can use
pub use batch_writer::{BatchReport, BatchWriter, FailedWrite};
pub use engine::RecalculationEngine;
pub use errors::RecalcError;
pub use models::{RecalculationFailure, RecalculationReport};
pub use pass::PendingWork;
pub use retry::{apply_with_retry, RetryPolicy};
pub use status::{RecalculationStatus, SchedulerPhase};

// Internal modules
mod batch_writer;
mod engine;
mod errors;
mod models;
mod pass;
mod retry;
mod scheduler;
mod status;
