use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify, RwLock};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument};

use super::models::RecalculationReport;
use super::pass::{PendingWork, Recalculator};
use super::status::{RecalculationStatus, SchedulerPhase};
use crate::event::{ChangeError, ChangeEvent, ChangeHandler};
use crate::leaderboard::{key_of, PointsConfig};
use crate::store::{ChangeKind, PointsConfigChange, RunChange};

#[derive(Debug, Default)]
struct SchedulerState {
    pending: PendingWork,
    recalculating: bool,
}

/// Debounces change events into recalculation passes.
///
/// Events only ever touch the pending set; the loop started by `run` drains
/// it once the feed has been quiet for the debounce period. Passes are
/// serialized by `pass_lock`, so work arriving mid-pass waits for the next one.
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    wakeup: Notify,
    config: RwLock<PointsConfig>,
    pass_lock: tokio::sync::Mutex<()>,
    status: watch::Sender<RecalculationStatus>,
    recalculator: Recalculator,
    debounce: Duration,
}

impl Scheduler {
    pub fn new(recalculator: Recalculator, debounce: Duration) -> Self {
        let (status, _) = watch::channel(RecalculationStatus::default());
        Self {
            state: Mutex::new(SchedulerState::default()),
            wakeup: Notify::new(),
            config: RwLock::new(PointsConfig::default()),
            pass_lock: tokio::sync::Mutex::new(()),
            status,
            recalculator,
            debounce,
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RecalculationStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> RecalculationStatus {
        self.status.borrow().clone()
    }

    pub async fn points_config(&self) -> PointsConfig {
        self.config.read().await.clone()
    }

    /// Replaces the cached policy without scheduling anything
    pub async fn load_points_config(&self, config: PointsConfig) {
        *self.config.write().await = config;
    }

    #[cfg(test)]
    pub fn pending_work(&self) -> PendingWork {
        self.lock_state().pending.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, phase: SchedulerPhase) {
        let (pending_partitions, recalculating) = {
            let state = self.lock_state();
            (state.pending.partitions.len(), state.recalculating)
        };
        // a pass started outside the loop still owns the status
        let phase = if recalculating {
            SchedulerPhase::Recalculating
        } else {
            phase
        };
        let status = match phase {
            SchedulerPhase::Idle => RecalculationStatus::idle(pending_partitions),
            SchedulerPhase::Debouncing => RecalculationStatus::debouncing(pending_partitions),
            SchedulerPhase::Recalculating => RecalculationStatus::recalculating(pending_partitions),
        };
        self.status.send_replace(status);
    }

    fn schedule(&self, work: PendingWork) {
        self.lock_state().pending.merge(work);
        self.wakeup.notify_one();
    }

    fn on_run_change(&self, change: RunChange) {
        if change.kind == ChangeKind::Modified {
            if let Some(previous) = &change.previous {
                if previous.same_except_derived(&change.run) {
                    debug!(run_id = %change.run.id, "Ignoring write of derived fields");
                    return;
                }
            }
        }

        let mut work = PendingWork::default();
        work.mark_run(&change.run);
        if let Some(previous) = &change.previous {
            if key_of(previous) != key_of(&change.run) {
                debug!(run_id = %change.run.id, "Run moved between partitions");
            }
            work.mark_run(previous);
        }

        debug!(
            run_id = %change.run.id,
            kind = %change.kind,
            partitions = work.partitions.len(),
            "Scheduling partition recalculation"
        );
        self.schedule(work);
    }

    async fn on_points_config_change(&self, change: PointsConfigChange) {
        let next = change.current.unwrap_or_default();
        {
            let mut current = self.config.write().await;
            if current.same_policy(&next) {
                debug!("Points config unchanged, skipping recalculation");
                return;
            }
            *current = next;
        }

        info!("Points config changed, scheduling global recalculation");
        self.schedule(PendingWork::everything());
    }

    /// Debounce loop: runs until `shutdown` flips to true.
    ///
    /// A pass in progress when shutdown arrives is allowed to finish.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut deadline: Option<Instant> = None;
        info!(debounce_ms = self.debounce.as_millis() as u64, "Scheduler started");

        while !*shutdown.borrow() {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.wakeup.notified() => {
                    deadline = Some(Instant::now() + self.debounce);
                    self.publish(SchedulerPhase::Debouncing);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.run_pending().await;
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Drains the pending set into one pass. Failed work goes back into the
    /// set without waking the loop; the next change event picks it up.
    async fn run_pending(&self) {
        let _pass = self.pass_lock.lock().await;

        let work = {
            let mut state = self.lock_state();
            if state.pending.is_empty() {
                return;
            }
            state.recalculating = true;
            std::mem::take(&mut state.pending)
        };

        let config = self.points_config().await;
        self.execute_with(work, &config).await;
    }

    /// Recalculates everything right away, bypassing the debounce timer.
    /// Anything already pending is folded into the same pass.
    pub async fn recalculate_everything(&self, config: &PointsConfig) -> RecalculationReport {
        let _pass = self.pass_lock.lock().await;
        let mut work = PendingWork::everything();
        {
            let mut state = self.lock_state();
            state.recalculating = true;
            work.merge(std::mem::take(&mut state.pending));
        }
        self.execute_with(work, config).await
    }

    #[instrument(skip_all)]
    async fn execute_with(&self, work: PendingWork, config: &PointsConfig) -> RecalculationReport {
        self.publish(SchedulerPhase::Recalculating);
        let outcome = self.recalculator.run_pass(work, config).await;

        {
            let mut state = self.lock_state();
            if !outcome.leftover.is_empty() {
                info!(
                    partitions = outcome.leftover.partitions.len(),
                    players = outcome.leftover.players.len(),
                    global = outcome.leftover.global,
                    "Keeping failed work pending"
                );
            }
            state.pending.merge(outcome.leftover);
            state.recalculating = false;
        }
        self.publish(SchedulerPhase::Idle);

        outcome.report
    }

}

#[async_trait]
impl ChangeHandler for Scheduler {
    async fn handle_change(&self, event: ChangeEvent) -> Result<(), ChangeError> {
        match event {
            ChangeEvent::Run(change) => self.on_run_change(change),
            ChangeEvent::PointsConfig(change) => self.on_points_config_change(change).await,
        }
        Ok(())
    }

    fn handler_name(&self) -> &'static str {
        "RecalculationScheduler"
    }
}
