use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::recalc::RetryPolicy;

/// Runtime configuration for the recalculation engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Quiet period after the last change event before a pass starts
    pub debounce: Duration,
    /// Partitions recalculated concurrently within one pass
    pub partition_workers: usize,
    /// Batch chunks committed concurrently
    pub commit_workers: usize,
    /// Upper bound on operations per atomic commit
    pub max_batch_ops: usize,
    /// Result cap requested from the store for every query
    pub query_limit: usize,
    /// Backoff applied to chunks that failed with a transient error
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
            partition_workers: 4,
            commit_workers: 2,
            max_batch_ops: 500,
            query_limit: 10_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineSettings {
    /// Defaults overridden by `RUNBOARD_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |name: &str, default: u64| -> u64 { parse_or(name, lookup(name), default) };

        Self {
            debounce: Duration::from_millis(read(
                "RUNBOARD_DEBOUNCE_MS",
                defaults.debounce.as_millis() as u64,
            )),
            partition_workers: read(
                "RUNBOARD_PARTITION_WORKERS",
                defaults.partition_workers as u64,
            )
            .max(1) as usize,
            commit_workers: read("RUNBOARD_COMMIT_WORKERS", defaults.commit_workers as u64).max(1)
                as usize,
            max_batch_ops: read("RUNBOARD_MAX_BATCH_OPS", defaults.max_batch_ops as u64).max(1)
                as usize,
            query_limit: read("RUNBOARD_QUERY_LIMIT", defaults.query_limit as u64).max(1) as usize,
            retry: RetryPolicy {
                max_attempts: read(
                    "RUNBOARD_RETRY_ATTEMPTS",
                    defaults.retry.max_attempts as u64,
                )
                .max(1) as u32,
                base_delay: Duration::from_millis(read(
                    "RUNBOARD_RETRY_BASE_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )),
                ..defaults.retry
            },
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    name: &str,
    raw: Option<String>,
    default: T,
) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, default = %default, "Ignoring invalid setting");
            default
        }),
    }
}
