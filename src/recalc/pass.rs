use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::batch_writer::BatchWriter;
use super::errors::RecalcError;
use super::models::{RecalculationFailure, RecalculationReport};
use super::retry::{apply_with_retry, RetryPolicy};
use crate::leaderboard::{key_of, rank_partition, PartitionKey, Player, PointsConfig, Run};
use crate::scoring::calculate_points;
use crate::settings::EngineSettings;
use crate::store::{DocumentKey, FieldDiff, LeaderboardStore, RunQuery, StoreError, WriteOp};

/// Work accumulated between passes
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PendingWork {
    pub partitions: HashSet<PartitionKey>,
    pub players: HashSet<String>,
    /// Every partition and every player, regardless of the sets above
    pub global: bool,
}

impl PendingWork {
    pub fn everything() -> Self {
        Self {
            global: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.global && self.partitions.is_empty() && self.players.is_empty()
    }

    pub fn mark_run(&mut self, run: &Run) {
        self.partitions.insert(key_of(run));
        self.players
            .extend(run.participant_ids().into_iter().map(str::to_string));
    }

    pub fn merge(&mut self, other: PendingWork) {
        self.partitions.extend(other.partitions);
        self.players.extend(other.players);
        self.global |= other.global;
    }
}

/// Result of one pass plus whatever has to be attempted again
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub report: RecalculationReport,
    pub leftover: PendingWork,
}

/// A rank/points write for one run, with the players it affects
#[derive(Debug, Clone, PartialEq)]
struct DerivedWrite {
    op: WriteOp,
    participants: Vec<String>,
}

/// Fetch, rank, score and diff partitions, then refresh player aggregates
pub struct Recalculator {
    store: Arc<dyn LeaderboardStore>,
    writer: BatchWriter,
    retry: RetryPolicy,
    partition_workers: usize,
    query_limit: usize,
}

impl Recalculator {
    pub fn new(store: Arc<dyn LeaderboardStore>, settings: &EngineSettings) -> Self {
        let writer = BatchWriter::new(
            Arc::clone(&store),
            settings.max_batch_ops,
            settings.commit_workers,
        );
        Self {
            store,
            writer,
            retry: settings.retry.clone(),
            partition_workers: settings.partition_workers.max(1),
            query_limit: settings.query_limit.max(1),
        }
    }

    #[instrument(skip_all, fields(
        global = work.global,
        partitions = work.partitions.len(),
        players = work.players.len()
    ))]
    pub async fn run_pass(&self, work: PendingWork, config: &PointsConfig) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        let PendingWork {
            mut partitions,
            mut players,
            global,
        } = work;

        if global {
            match self.enumerate_everything().await {
                Ok((all_partitions, all_players)) => {
                    partitions.extend(all_partitions);
                    players.extend(all_players);
                }
                Err(e) => {
                    warn!(error = %e, "Could not enumerate partitions, keeping work pending");
                    outcome.report.errors.push(RecalculationFailure::global(&e));
                    outcome.leftover = PendingWork {
                        partitions,
                        players,
                        global: true,
                    };
                    return outcome;
                }
            }
        }

        // Partitions: fetch, rank and score concurrently, then write everything at once
        let mut ordered: Vec<PartitionKey> = partitions.into_iter().collect();
        ordered.sort();

        let results: Vec<(PartitionKey, Result<Vec<DerivedWrite>, RecalcError>)> =
            stream::iter(ordered)
                .map(|key| async move {
                    let result = self.recalculate_partition(&key, config).await;
                    (key, result)
                })
                .buffer_unordered(self.partition_workers)
                .collect()
                .await;

        let mut run_ops = Vec::new();
        let mut partition_of: HashMap<DocumentKey, PartitionKey> = HashMap::new();
        for (key, result) in results {
            match result {
                Ok(writes) => {
                    for write in writes {
                        partition_of.insert(write.op.key().clone(), key.clone());
                        players.extend(write.participants);
                        run_ops.push(write.op);
                    }
                }
                Err(e) => {
                    warn!(partition = %key, error = %e, "Partition recalculation failed");
                    outcome
                        .report
                        .errors
                        .push(RecalculationFailure::partition(&key, &e));
                    outcome.leftover.partitions.insert(key);
                }
            }
        }

        let mut updated_partitions: BTreeSet<PartitionKey> = BTreeSet::new();
        if !run_ops.is_empty() {
            let written: Vec<DocumentKey> = run_ops.iter().map(|op| op.key().clone()).collect();
            let batch = apply_with_retry(&self.writer, &self.retry, run_ops).await;
            let failed: HashSet<&DocumentKey> =
                batch.failed.iter().map(|failure| &failure.key).collect();

            for key in written.iter().filter(|key| !failed.contains(key)) {
                if let Some(partition) = partition_of.get(key) {
                    updated_partitions.insert(partition.clone());
                }
            }
            outcome.report.runs_updated = batch.success_count();

            for failure in &batch.failed {
                outcome
                    .report
                    .errors
                    .push(RecalculationFailure::write(&failure.key, &failure.error));
                if let Some(partition) = partition_of.get(&failure.key) {
                    outcome.leftover.partitions.insert(partition.clone());
                }
            }
        }
        outcome.report.partitions_updated = updated_partitions.len();

        // Players: aggregates read back the points written above
        let mut uids: Vec<String> = players.into_iter().filter(|uid| !uid.is_empty()).collect();
        uids.sort();

        let totals: Vec<(String, Result<Option<WriteOp>, RecalcError>)> = stream::iter(uids)
            .map(|uid| async move {
                let result = self.recalculate_player(&uid).await;
                (uid, result)
            })
            .buffer_unordered(self.partition_workers)
            .collect()
            .await;

        let mut player_ops = Vec::new();
        for (uid, result) in totals {
            match result {
                Ok(Some(op)) => player_ops.push(op),
                Ok(None) => {}
                Err(e) => {
                    warn!(uid = %uid, error = %e, "Player aggregate recalculation failed");
                    outcome
                        .report
                        .errors
                        .push(RecalculationFailure::player(&uid, &e));
                    outcome.leftover.players.insert(uid);
                }
            }
        }

        if !player_ops.is_empty() {
            let batch = apply_with_retry(&self.writer, &self.retry, player_ops).await;
            outcome.report.players_updated = batch.success_count();
            for failure in batch.failed {
                outcome
                    .report
                    .errors
                    .push(RecalculationFailure::write(&failure.key, &failure.error));
                outcome.leftover.players.insert(failure.key.id);
            }
        }

        info!(
            partitions_updated = outcome.report.partitions_updated,
            runs_updated = outcome.report.runs_updated,
            players_updated = outcome.report.players_updated,
            errors = outcome.report.error_count(),
            "Recalculation pass finished"
        );
        outcome
    }

    /// Every partition key and claimed player currently known to the store
    async fn enumerate_everything(
        &self,
    ) -> Result<(HashSet<PartitionKey>, HashSet<String>), RecalcError> {
        let runs = self
            .store
            .query_runs(&RunQuery::all().with_limit(self.query_limit))
            .await?;
        self.ensure_complete("all runs", runs.len())?;

        let mut work = PendingWork::default();
        for run in &runs {
            work.mark_run(run);
        }

        // Existing aggregates whose runs are all gone still need zeroing
        let existing = self.store.query_players(self.query_limit).await?;
        self.ensure_complete("players", existing.len())?;
        work.players
            .extend(existing.into_iter().map(|player| player.uid));

        debug!(
            partitions = work.partitions.len(),
            players = work.players.len(),
            "Enumerated everything for a global pass"
        );
        Ok((work.partitions, work.players))
    }

    #[instrument(skip(self, config), fields(partition = %key))]
    async fn recalculate_partition(
        &self,
        key: &PartitionKey,
        config: &PointsConfig,
    ) -> Result<Vec<DerivedWrite>, RecalcError> {
        let fetched = self
            .store
            .query_runs(&key.to_query().with_limit(self.query_limit))
            .await?;
        self.ensure_complete("partition", fetched.len())?;

        let runs: Vec<Run> = fetched.into_iter().filter(|run| key.matches(run)).collect();
        let writes = derived_writes(&runs, config);

        debug!(
            run_count = runs.len(),
            changed = writes.len(),
            "Partition recalculated"
        );
        Ok(writes)
    }

    /// The aggregate write for `uid`, or `None` when the stored one is current
    async fn recalculate_player(&self, uid: &str) -> Result<Option<WriteOp>, RecalcError> {
        let as_first = self
            .store
            .query_runs(
                &RunQuery::verified_only()
                    .with_player(uid)
                    .with_limit(self.query_limit),
            )
            .await?;
        let as_second = self
            .store
            .query_runs(
                &RunQuery::verified_only()
                    .with_player2(uid)
                    .with_limit(self.query_limit),
            )
            .await?;
        self.ensure_complete("player runs", as_first.len().max(as_second.len()))?;

        let mut seen = HashSet::new();
        let runs: Vec<Run> = as_first
            .into_iter()
            .chain(as_second.into_iter().filter(Run::is_co_op))
            .filter(|run| seen.insert(run.id.clone()))
            .collect();

        let totals = Player {
            uid: uid.to_string(),
            total_points: runs.iter().filter_map(|run| run.points).sum(),
            total_runs: runs.len() as u32,
        };

        let stored = self.store.get_player(uid).await?;
        if stored.as_ref() == Some(&totals) {
            return Ok(None);
        }

        let fields = FieldDiff::from_record(&totals).map_err(StoreError::from)?;
        Ok(Some(WriteOp::Set {
            key: DocumentKey::player(uid),
            fields,
        }))
    }

    /// A result that fills the cap may be missing records; deriving from it
    /// would write wrong ranks, so the work is failed and kept pending
    fn ensure_complete(&self, scope: &'static str, result_count: usize) -> Result<(), RecalcError> {
        if result_count >= self.query_limit {
            warn!(
                scope,
                limit = self.query_limit,
                "Query hit its result cap, refusing to recalculate from a partial result"
            );
            return Err(RecalcError::Truncated {
                scope,
                limit: self.query_limit,
            });
        }
        Ok(())
    }
}

/// Rank and score one partition and diff the result against the stored
/// derived fields. Only runs whose rank or points actually change produce a
/// write, and each write carries only the fields that changed.
fn derived_writes(runs: &[Run], config: &PointsConfig) -> Vec<DerivedWrite> {
    let ranked = rank_partition(runs);
    let mut writes = Vec::new();

    for placement in &ranked.placements {
        let points = calculate_points(placement.run, placement.rank, config);
        if let Some(op) = diff_derived(placement.run, Some(placement.rank), points) {
            writes.push(DerivedWrite {
                op,
                participants: owned_participants(placement.run),
            });
        }
    }

    for run in ranked.excluded.iter().chain(ranked.unverified.iter()) {
        let stale = run.rank.is_some() || run.points.is_some_and(|points| points != 0);
        if !stale {
            continue;
        }
        if let Some(op) = diff_derived(run, None, 0) {
            writes.push(DerivedWrite {
                op,
                participants: owned_participants(run),
            });
        }
    }

    writes
}

fn diff_derived(run: &Run, rank: Option<u32>, points: i64) -> Option<WriteOp> {
    let mut fields = FieldDiff::new();
    if run.rank != rank {
        fields = fields.with("rank", rank.map_or(Value::Null, Value::from));
    }
    if run.points != Some(points) {
        fields = fields.with("points", points);
    }

    (!fields.is_empty()).then(|| WriteOp::Update {
        key: DocumentKey::run(&run.id),
        fields,
    })
}

fn owned_participants(run: &Run) -> Vec<String> {
    run.participant_ids()
        .into_iter()
        .map(str::to_string)
        .collect()
}
