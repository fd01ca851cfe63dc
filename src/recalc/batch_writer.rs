use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::store::{DocumentKey, LeaderboardStore, StoreError, WriteOp};

#[derive(Debug, Clone, PartialEq)]
pub struct FailedWrite {
    pub key: DocumentKey,
    pub error: StoreError,
}

/// Outcome of applying a set of mutations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<FailedWrite>,
    /// Number of `commit_batch` calls issued
    pub commits: usize,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.succeeded
    }

    pub fn error_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Folds a follow-up report (a retry of some failed writes) into this one
    pub fn absorb(&mut self, other: BatchReport) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
        self.commits += other.commits;
    }
}

/// Splits mutations into commit-sized chunks and commits them independently.
///
/// A failing chunk neither rolls back nor blocks the others; every entity in
/// it is reported with the chunk's error. Retrying is left to the caller.
pub struct BatchWriter {
    store: Arc<dyn LeaderboardStore>,
    chunk_size: usize,
    concurrency: usize,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn LeaderboardStore>, max_ops: usize, concurrency: usize) -> Self {
        let chunk_size = max_ops.min(store.max_batch_ops()).max(1);
        Self {
            store,
            chunk_size,
            concurrency: concurrency.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[instrument(skip(self, ops), fields(op_count = ops.len()))]
    pub async fn apply(&self, ops: Vec<WriteOp>) -> BatchReport {
        if ops.is_empty() {
            return BatchReport::default();
        }

        let chunks: Vec<Vec<WriteOp>> = ops
            .chunks(self.chunk_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let commits = chunks.len();

        let mut results: Vec<(usize, Vec<WriteOp>, Result<(), StoreError>)> =
            stream::iter(chunks.into_iter().enumerate())
                .map(|(index, chunk)| {
                    let store = Arc::clone(&self.store);
                    async move {
                        let result = store.commit_batch(&chunk).await;
                        (index, chunk, result)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut report = BatchReport {
            commits,
            ..BatchReport::default()
        };
        for (index, chunk, result) in results {
            match result {
                Ok(()) => {
                    debug!(chunk = index, size = chunk.len(), "Chunk committed");
                    report.succeeded += chunk.len();
                }
                Err(error) => {
                    warn!(chunk = index, size = chunk.len(), error = %error, "Chunk commit failed");
                    report
                        .failed
                        .extend(chunk.iter().map(|op| FailedWrite {
                            key: op.key().clone(),
                            error: error.clone(),
                        }));
                }
            }
        }

        report
    }
}
