use std::sync::Arc;
use std::time::Duration;

use runboard::{
    leaderboard::{PointsConfig, Run},
    recalc::RetryPolicy,
    EngineSettings, InMemoryStore, RecalculationEngine,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub const TEST_DEBOUNCE: Duration = Duration::from_millis(1500);

pub struct TestSetup {
    pub store: Arc<InMemoryStore>,
    pub engine: RecalculationEngine,
}

#[allow(dead_code)]
impl TestSetup {
    /// Lets the debounce window lapse so a pending pass runs to completion.
    /// Intended for tests running on paused time.
    pub async fn settle(&self) {
        tokio::time::sleep(TEST_DEBOUNCE * 2).await;
    }

    pub fn rank_of(&self, run_id: &str) -> Option<u32> {
        self.store.run(run_id).and_then(|run| run.rank)
    }

    pub fn points_of(&self, run_id: &str) -> Option<i64> {
        self.store.run(run_id).and_then(|run| run.points)
    }

    pub fn total_points_of(&self, uid: &str) -> Option<i64> {
        self.store.player(uid).map(|player| player.total_points)
    }

    pub fn total_runs_of(&self, uid: &str) -> Option<u32> {
        self.store.player(uid).map(|player| player.total_runs)
    }

    pub fn submit(&self, run: Run) {
        self.store.upsert_run(run).expect("run should be stored");
    }
}

pub struct TestSetupBuilder {
    runs: Vec<Run>,
    points_config: Option<PointsConfig>,
    max_batch_ops: usize,
    started: bool,
}

#[allow(dead_code)]
impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            runs: vec![],
            points_config: None,
            max_batch_ops: 500,
            started: false,
        }
    }

    pub fn with_runs(mut self, runs: Vec<Run>) -> Self {
        self.runs.extend(runs);
        self
    }

    pub fn with_points_config(mut self, config: PointsConfig) -> Self {
        self.points_config = Some(config);
        self
    }

    pub fn with_max_batch_ops(mut self, max_batch_ops: usize) -> Self {
        self.max_batch_ops = max_batch_ops;
        self
    }

    /// Subscribe the engine to the store feeds during `build`
    pub fn started(mut self) -> Self {
        self.started = true;
        self
    }

    pub async fn build(self) -> TestSetup {
        let store = Arc::new(InMemoryStore::with_limits(self.max_batch_ops, 10_000));

        for run in self.runs {
            store.upsert_run(run).expect("seed run should be stored");
        }
        if let Some(config) = &self.points_config {
            store
                .set_points_config(config)
                .expect("points config should be stored");
        }

        let settings = EngineSettings {
            debounce: TEST_DEBOUNCE,
            commit_workers: 1,
            max_batch_ops: self.max_batch_ops,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
            ..EngineSettings::default()
        };
        let engine = RecalculationEngine::new(store.clone(), settings);

        if self.started {
            engine.start().await.expect("engine should start");
        }

        TestSetup { store, engine }
    }
}
