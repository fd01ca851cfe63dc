use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    ChangeKind, Collection, DocumentKey, FieldDiff, LeaderboardStore, PointsConfigChange,
    RunChange, RunQuery, StoreError, StoreSeed, WriteOp,
};
use crate::leaderboard::{Player, PointsConfig, Run};

pub const DEFAULT_MAX_BATCH_OPS: usize = 500;
pub const DEFAULT_MAX_QUERY_RESULTS: usize = 10_000;

#[derive(Default)]
struct StoreState {
    runs: BTreeMap<String, Run>,
    players: BTreeMap<String, Player>,
    points_config: Option<PointsConfig>,
    run_subscribers: Vec<(RunQuery, mpsc::UnboundedSender<RunChange>)>,
    config_subscribers: Vec<mpsc::UnboundedSender<PointsConfigChange>>,
}

/// Documents staged by a batch before it is applied
#[derive(Default)]
struct StagedBatch {
    runs: BTreeMap<String, Option<Run>>,
    players: BTreeMap<String, Option<Player>>,
    points_config: Option<Option<PointsConfig>>,
}

/// In-memory implementation of LeaderboardStore for development and testing
///
/// Behaves like a document store with filtered change feeds: a write that
/// moves a run into, inside or out of a subscriber's query is delivered as
/// added, modified or removed respectively. Writes that change nothing are
/// not delivered. Commit failures and outages can be scripted for tests.
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    max_batch_ops: usize,
    max_query_results: usize,
    commit_attempts: AtomicUsize,
    commits: AtomicUsize,
    scripted_failures: Mutex<HashMap<usize, StoreError>>,
    unavailable: AtomicBool,
    commit_delay_ms: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_BATCH_OPS, DEFAULT_MAX_QUERY_RESULTS)
    }

    pub fn with_limits(max_batch_ops: usize, max_query_results: usize) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            max_batch_ops: max_batch_ops.max(1),
            max_query_results: max_query_results.max(1),
            commit_attempts: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            scripted_failures: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            commit_delay_ms: AtomicU64::new(0),
        }
    }

    /// Loads documents without emitting change events
    pub fn seed(&self, seed: StoreSeed) -> Result<(), StoreError> {
        let mut state = self.lock_state()?;
        for mut run in seed.runs {
            if run.id.is_empty() {
                run.id = Uuid::new_v4().to_string();
            }
            state.runs.insert(run.id.clone(), run);
        }
        for player in seed.players {
            state.players.insert(player.uid.clone(), player);
        }
        if seed.points_config.is_some() {
            state.points_config = seed.points_config;
        }
        Ok(())
    }

    /// Creates or fully replaces a run, returning its id
    pub fn upsert_run(&self, mut run: Run) -> Result<String, StoreError> {
        if run.id.is_empty() {
            run.id = Uuid::new_v4().to_string();
        }
        let key = DocumentKey::run(run.id.clone());
        let ops = [
            WriteOp::Delete { key: key.clone() },
            WriteOp::Set {
                key,
                fields: FieldDiff::from_record(&run)?,
            },
        ];
        self.apply_ops(&ops)?;
        Ok(run.id)
    }

    pub fn delete_run(&self, id: &str) -> Result<(), StoreError> {
        self.apply_ops(&[WriteOp::Delete {
            key: DocumentKey::run(id),
        }])
    }

    /// Replaces the points configuration singleton
    pub fn set_points_config(&self, config: &PointsConfig) -> Result<(), StoreError> {
        let key = DocumentKey::points_config();
        self.apply_ops(&[
            WriteOp::Delete { key: key.clone() },
            WriteOp::Set {
                key,
                fields: FieldDiff::from_record(config)?,
            },
        ])
    }

    pub fn clear_points_config(&self) -> Result<(), StoreError> {
        self.apply_ops(&[WriteOp::Delete {
            key: DocumentKey::points_config(),
        }])
    }

    pub fn run(&self, id: &str) -> Option<Run> {
        self.lock_state().ok()?.runs.get(id).cloned()
    }

    pub fn runs(&self) -> Vec<Run> {
        self.lock_state()
            .map(|state| state.runs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn player(&self, uid: &str) -> Option<Player> {
        self.lock_state().ok()?.players.get(uid).cloned()
    }

    /// Number of `commit_batch` calls that were applied
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of `commit_batch` calls received, failed ones included
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Makes the `attempt`-th call to `commit_batch` (1-based) fail with `error`
    pub fn fail_commit(&self, attempt: usize, error: StoreError) {
        if let Ok(mut failures) = self.scripted_failures.lock() {
            failures.insert(attempt, error);
        }
    }

    /// Makes every `commit_batch` take `delay` before it is applied
    pub fn set_commit_delay(&self, delay: Duration) {
        self.commit_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Simulates the store being unreachable for reads and writes
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::unavailable("in-memory store lock poisoned"))
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("store is unreachable"));
        }
        Ok(())
    }

    fn apply_ops(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        let mut state = self.lock_state()?;
        let staged = stage_batch(&state, ops)?;
        state.apply(staged);
        Ok(())
    }
}

#[async_trait]
impl LeaderboardStore for InMemoryStore {
    #[instrument(skip(self))]
    async fn query_runs(&self, query: &RunQuery) -> Result<Vec<Run>, StoreError> {
        self.ensure_available()?;
        let limit = query
            .limit
            .unwrap_or(self.max_query_results)
            .min(self.max_query_results);

        let state = self.lock_state()?;
        let runs: Vec<Run> = state
            .runs
            .values()
            .filter(|run| query.matches(run))
            .take(limit)
            .cloned()
            .collect();

        debug!(result_count = runs.len(), "Queried runs from memory");
        Ok(runs)
    }

    async fn get_player(&self, uid: &str) -> Result<Option<Player>, StoreError> {
        self.ensure_available()?;
        Ok(self.lock_state()?.players.get(uid).cloned())
    }

    async fn query_players(&self, limit: usize) -> Result<Vec<Player>, StoreError> {
        self.ensure_available()?;
        let limit = limit.min(self.max_query_results);
        Ok(self
            .lock_state()?
            .players
            .values()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_points_config(&self) -> Result<Option<PointsConfig>, StoreError> {
        self.ensure_available()?;
        Ok(self.lock_state()?.points_config.clone())
    }

    #[instrument(skip(self))]
    async fn subscribe_runs(
        &self,
        query: RunQuery,
    ) -> Result<mpsc::UnboundedReceiver<RunChange>, StoreError> {
        self.ensure_available()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock_state()?.run_subscribers.push((query, sender));
        debug!("Registered run change feed subscriber");
        Ok(receiver)
    }

    async fn subscribe_points_config(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<PointsConfigChange>, StoreError> {
        self.ensure_available()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock_state()?.config_subscribers.push(sender);
        debug!("Registered points config feed subscriber");
        Ok(receiver)
    }

    #[instrument(skip(self, ops), fields(op_count = ops.len()))]
    async fn commit_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        let attempt = self.commit_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.ensure_available()?;

        let scripted = self
            .scripted_failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.remove(&attempt));
        if let Some(error) = scripted {
            warn!(attempt, error = %error, "Failing commit as scripted");
            return Err(error);
        }

        let delay = self.commit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if ops.len() > self.max_batch_ops {
            return Err(StoreError::BatchTooLarge {
                size: ops.len(),
                limit: self.max_batch_ops,
            });
        }

        self.apply_ops(ops)?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        debug!(attempt, "Batch committed in memory");
        Ok(())
    }

    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }
}

impl StoreState {
    fn apply(&mut self, staged: StagedBatch) {
        for (id, next) in staged.runs {
            let previous = match &next {
                Some(run) => self.runs.insert(id.clone(), run.clone()),
                None => self.runs.remove(&id),
            };
            if previous != next {
                self.notify_run_subscribers(previous.as_ref(), next.as_ref());
            }
        }

        for (uid, next) in staged.players {
            match next {
                Some(player) => {
                    self.players.insert(uid, player);
                }
                None => {
                    self.players.remove(&uid);
                }
            }
        }

        if let Some(next) = staged.points_config {
            if next != self.points_config {
                self.points_config = next.clone();
                self.config_subscribers.retain(|sender| {
                    sender
                        .send(PointsConfigChange {
                            current: next.clone(),
                        })
                        .is_ok()
                });
            }
        }
    }

    fn notify_run_subscribers(&mut self, previous: Option<&Run>, next: Option<&Run>) {
        self.run_subscribers.retain(|(query, sender)| {
            let before = previous.filter(|run| query.matches(run));
            let after = next.filter(|run| query.matches(run));

            let (kind, run) = match (before, after) {
                (None, Some(run)) => (ChangeKind::Added, run),
                (Some(_), Some(run)) => (ChangeKind::Modified, run),
                (Some(run), None) => (ChangeKind::Removed, next.unwrap_or(run)),
                (None, None) => return !sender.is_closed(),
            };

            sender
                .send(RunChange {
                    kind,
                    run: run.clone(),
                    previous: previous.cloned(),
                })
                .is_ok()
        });
    }
}

fn stage_batch(state: &StoreState, ops: &[WriteOp]) -> Result<StagedBatch, StoreError> {
    let mut staged = StagedBatch::default();

    for op in ops {
        let key = op.key();
        match key.collection {
            Collection::Runs => {
                let current = match staged.runs.get(&key.id) {
                    Some(doc) => doc.clone(),
                    None => state.runs.get(&key.id).cloned(),
                };
                let next = apply_op(current, op, Some("id"))?;
                staged.runs.insert(key.id.clone(), next);
            }
            Collection::Players => {
                let current = match staged.players.get(&key.id) {
                    Some(doc) => doc.clone(),
                    None => state.players.get(&key.id).cloned(),
                };
                let next = apply_op(current, op, Some("uid"))?;
                staged.players.insert(key.id.clone(), next);
            }
            Collection::PointsConfig => {
                let current = match &staged.points_config {
                    Some(doc) => doc.clone(),
                    None => state.points_config.clone(),
                };
                let next = apply_op(current, op, None)?;
                staged.points_config = Some(next);
            }
        }
    }

    Ok(staged)
}

fn apply_op<T: Serialize + DeserializeOwned>(
    current: Option<T>,
    op: &WriteOp,
    id_field: Option<&str>,
) -> Result<Option<T>, StoreError> {
    match op {
        WriteOp::Delete { .. } => Ok(None),
        WriteOp::Update { key, fields } => {
            let existing = current.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
            merge_document(Some(existing), key, fields, id_field).map(Some)
        }
        WriteOp::Set { key, fields } => merge_document(current, key, fields, id_field).map(Some),
    }
}

fn merge_document<T: Serialize + DeserializeOwned>(
    current: Option<T>,
    key: &DocumentKey,
    fields: &FieldDiff,
    id_field: Option<&str>,
) -> Result<T, StoreError> {
    let mut document = match current {
        Some(doc) => match serde_json::to_value(doc)? {
            Value::Object(map) => map,
            _ => {
                return Err(StoreError::invalid_document(format!(
                    "{key} is not an object"
                )))
            }
        },
        None => Map::new(),
    };

    fields.merge_into(&mut document);
    if let Some(id_field) = id_field {
        document.insert(id_field.to_string(), Value::String(key.id.clone()));
    }

    serde_json::from_value(Value::Object(document))
        .map_err(|err| StoreError::invalid_document(format!("{key}: {err}")))
}
