use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use super::batch_writer::{BatchReport, BatchWriter};
use crate::store::{DocumentKey, WriteOp};

/// Exponential backoff with jitter for transient store failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based): base * 2^retry, capped,
    /// plus up to 50% random jitter
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        let jitter_ceiling = exponential.as_millis() as u64 / 2;
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ceiling)
        };
        exponential + Duration::from_millis(jitter)
    }
}

/// Applies `ops` through the writer, re-applying writes that failed with a
/// transient error until they succeed or the policy runs out of attempts.
pub async fn apply_with_retry(
    writer: &BatchWriter,
    policy: &RetryPolicy,
    ops: Vec<WriteOp>,
) -> BatchReport {
    let mut pending = ops;
    let mut report = BatchReport::default();
    let mut attempt: u32 = 0;

    loop {
        let mut outcome = writer.apply(pending.clone()).await;
        attempt += 1;

        let transient: HashSet<DocumentKey> = outcome
            .failed
            .iter()
            .filter(|failure| failure.error.is_transient())
            .map(|failure| failure.key.clone())
            .collect();

        if transient.is_empty() || attempt >= policy.max_attempts {
            if attempt > 1 && outcome.is_complete() {
                info!(attempt, "Writes succeeded after retry");
            }
            report.absorb(outcome);
            return report;
        }

        let delay = policy.delay_for(attempt - 1);
        warn!(
            attempt,
            retrying = transient.len(),
            delay_ms = delay.as_millis() as u64,
            "Transient write failures, will retry"
        );

        outcome
            .failed
            .retain(|failure| !transient.contains(&failure.key));
        report.absorb(outcome);

        pending.retain(|op| transient.contains(op.key()));
        tokio::time::sleep(delay).await;
    }
}
