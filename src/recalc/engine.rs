use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::errors::RecalcError;
use super::models::RecalculationReport;
use super::pass::Recalculator;
use super::scheduler::Scheduler;
use super::status::RecalculationStatus;
use crate::event::{ChangeHandler, FeedSubscription};
use crate::leaderboard::PointsConfig;
use crate::settings::EngineSettings;
use crate::store::{LeaderboardStore, RunQuery};

struct RunningTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Keeps run ranks, run points and player aggregates in step with the store.
///
/// Nothing happens until `start`: the engine then follows the verified-runs
/// feed and the points-config feed, and recalculates affected partitions
/// after each burst of changes. `trigger_full_recalculation` works with or
/// without the feeds running.
pub struct RecalculationEngine {
    store: Arc<dyn LeaderboardStore>,
    scheduler: Arc<Scheduler>,
    running: Mutex<Option<RunningTasks>>,
}

impl RecalculationEngine {
    pub fn new(store: Arc<dyn LeaderboardStore>, settings: EngineSettings) -> Self {
        let recalculator = Recalculator::new(Arc::clone(&store), &settings);
        let scheduler = Arc::new(Scheduler::new(recalculator, settings.debounce));
        Self {
            store,
            scheduler,
            running: Mutex::new(None),
        }
    }

    /// Loads the points policy and subscribes to both change feeds
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), RecalcError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(RecalcError::AlreadyRunning);
        }

        let config = self.load_points_config().await;
        self.scheduler.load_points_config(config).await;

        let runs = self
            .store
            .subscribe_runs(RunQuery::verified_only())
            .await?;
        let configs = self.store.subscribe_points_config().await?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handler: Arc<dyn ChangeHandler> = self.scheduler.clone();
        let handles = vec![
            FeedSubscription::new("runs", runs, Arc::clone(&handler), shutdown_rx.clone()).start(),
            FeedSubscription::new("points_config", configs, handler, shutdown_rx.clone()).start(),
            tokio::spawn(Arc::clone(&self.scheduler).run(shutdown_rx)),
        ];

        *running = Some(RunningTasks { shutdown, handles });
        info!("Recalculation engine started");
        Ok(())
    }

    /// Stops consuming feeds. A pass already in flight runs to completion.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), RecalcError> {
        let Some(tasks) = self.running.lock().await.take() else {
            return Err(RecalcError::NotRunning);
        };

        // receivers may already be gone if a task ended on its own
        let _ = tasks.shutdown.send(true);
        for handle in tasks.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Engine task ended abnormally");
            }
        }

        info!("Recalculation engine stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Recalculates every partition and every player now and reports the
    /// outcome. Uses `config` when given, otherwise the stored policy.
    ///
    /// The chosen policy also becomes the one incremental passes score with,
    /// so every board stays on a single policy until the next config change.
    #[instrument(skip(self, config))]
    pub async fn trigger_full_recalculation(
        &self,
        config: Option<PointsConfig>,
    ) -> RecalculationReport {
        let config = match config {
            Some(config) => config,
            None => self.load_points_config().await,
        };
        self.scheduler.load_points_config(config.clone()).await;

        info!("Full recalculation requested");
        self.scheduler.recalculate_everything(&config).await
    }

    pub fn status(&self) -> RecalculationStatus {
        self.scheduler.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RecalculationStatus> {
        self.scheduler.subscribe_status()
    }

    /// The policy incremental passes currently score with
    pub async fn points_config(&self) -> PointsConfig {
        self.scheduler.points_config().await
    }

    /// Stored policy, the default when none was saved, and the cached one
    /// when the store cannot be reached
    async fn load_points_config(&self) -> PointsConfig {
        match self.store.get_points_config().await {
            Ok(Some(config)) => config,
            Ok(None) => {
                info!("No points config stored, using the default policy");
                PointsConfig::default()
            }
            Err(e) => {
                warn!(error = %e, "Could not load points config, using the cached policy");
                self.scheduler.points_config().await
            }
        }
    }
}
