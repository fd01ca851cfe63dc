mod utils;

use runboard::leaderboard::PointsConfig;
use runboard::recalc::{RecalculationFailure, SchedulerPhase};
use runboard::StoreError;
use std::time::Duration;
use utils::{RunBuilder, TestSetupBuilder};

// ============================================================================
// Full recalculation
// ============================================================================

#[tokio::test]
async fn full_recalculation_ranks_scores_and_aggregates() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by("alice").time("55").build(),
            RunBuilder::new("b").by("alice").time("1:00").build(),
            RunBuilder::new("c").by("bob").time("1:10").build(),
            RunBuilder::new("d").by("carol").time("1:20").obsolete().build(),
            RunBuilder::new("e").by("dave").time("50").unverified().build(),
        ])
        .build()
        .await;

    let report = setup.engine.trigger_full_recalculation(None).await;

    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    assert_eq!(report.partitions_updated, 1);
    assert_eq!(report.runs_updated, 3);

    // alice's slower run is beaten by her own 55s and stays unranked
    assert_eq!(setup.rank_of("a"), Some(1));
    assert_eq!(setup.points_of("a"), Some(150));
    assert_eq!(setup.rank_of("b"), None);
    assert_eq!(setup.rank_of("c"), Some(2));
    assert_eq!(setup.points_of("c"), Some(40));

    // obsolete band ranks after every current run, at half value
    assert_eq!(setup.rank_of("d"), Some(3));
    assert_eq!(setup.points_of("d"), Some(15));

    assert_eq!(setup.rank_of("e"), None);

    assert_eq!(setup.total_points_of("alice"), Some(150));
    assert_eq!(setup.total_runs_of("alice"), Some(2));
    assert_eq!(setup.total_points_of("bob"), Some(40));
    assert_eq!(setup.total_points_of("carol"), Some(15));
    assert_eq!(setup.total_points_of("dave"), Some(0));
    assert_eq!(setup.total_runs_of("dave"), Some(0));
}

#[tokio::test]
async fn full_recalculation_is_idempotent() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by("alice").time("55").build(),
            RunBuilder::new("b").by("bob").time("1:00").build(),
        ])
        .build()
        .await;

    setup.engine.trigger_full_recalculation(None).await;
    let commits = setup.store.commit_count();

    let second = setup.engine.trigger_full_recalculation(None).await;

    assert_eq!(second.runs_updated, 0);
    assert_eq!(second.players_updated, 0);
    assert_eq!(second.partitions_updated, 0);
    assert_eq!(setup.store.commit_count(), commits);
}

#[tokio::test]
async fn partitions_are_ranked_independently() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("any-1").by("alice").time("50").build(),
            RunBuilder::new("hundred-1").by("bob").time("2:00").category("100%").build(),
            RunBuilder::new("console-1").by("carol").time("1:30").platform("ps5").build(),
            RunBuilder::new("glitchless-1")
                .by("dave")
                .time("1:45")
                .subcategory("glitchless")
                .build(),
            RunBuilder::new("level-1").by("erin").time("12").level("1-1").build(),
        ])
        .build()
        .await;

    let report = setup.engine.trigger_full_recalculation(None).await;

    assert_eq!(report.partitions_updated, 5);
    for id in ["any-1", "hundred-1", "console-1", "glitchless-1", "level-1"] {
        assert_eq!(setup.rank_of(id), Some(1), "{id} should lead its own board");
    }

    // no top-three bonus on individual levels by default
    assert_eq!(setup.points_of("level-1"), Some(100));
    assert_eq!(setup.points_of("any-1"), Some(150));
}

#[tokio::test]
async fn equal_times_favour_the_earlier_submission() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("z-early").by("alice").time("1:00").on(2024, 1, 1).build(),
            RunBuilder::new("a-late").by("bob").time("1:00").on(2024, 2, 1).build(),
        ])
        .build()
        .await;

    setup.engine.trigger_full_recalculation(None).await;

    assert_eq!(setup.rank_of("z-early"), Some(1));
    assert_eq!(setup.rank_of("a-late"), Some(2));
}

#[tokio::test]
async fn co_op_pairs_are_one_group_whatever_the_slot_order() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("pair-1")
                .by("alice")
                .with_partner("bob")
                .time("50")
                .build(),
            RunBuilder::new("pair-2")
                .by("bob")
                .with_partner("alice")
                .time("55")
                .build(),
        ])
        .build()
        .await;

    setup.engine.trigger_full_recalculation(None).await;

    assert_eq!(setup.rank_of("pair-1"), Some(1));
    assert_eq!(setup.points_of("pair-1"), Some(75));
    assert_eq!(setup.rank_of("pair-2"), None);

    for uid in ["alice", "bob"] {
        assert_eq!(setup.total_points_of(uid), Some(75));
        assert_eq!(setup.total_runs_of(uid), Some(2));
    }
}

#[tokio::test]
async fn unclaimed_runs_group_by_display_name() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by_name("Speedy").time("50").build(),
            RunBuilder::new("b").by_name(" speedy ").time("45").build(),
        ])
        .build()
        .await;

    let report = setup.engine.trigger_full_recalculation(None).await;

    assert_eq!(setup.rank_of("b"), Some(1));
    assert_eq!(setup.rank_of("a"), None);
    assert_eq!(report.players_updated, 0);
}

#[tokio::test]
async fn disabled_policy_ranks_without_points() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![RunBuilder::new("a").by("alice").time("55").build()])
        .with_points_config(PointsConfig {
            enabled: false,
            ..PointsConfig::default()
        })
        .build()
        .await;

    setup.engine.trigger_full_recalculation(None).await;

    assert_eq!(setup.rank_of("a"), Some(1));
    assert_eq!(setup.points_of("a"), Some(0));
    assert_eq!(setup.total_points_of("alice"), Some(0));
}

#[tokio::test]
async fn explicit_config_overrides_the_stored_one() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by("alice").time("55").build(),
            RunBuilder::new("b").by("bob").time("1:00").build(),
        ])
        .build()
        .await;

    setup
        .engine
        .trigger_full_recalculation(Some(PointsConfig {
            base_points_per_run: 25,
            ..PointsConfig::default()
        }))
        .await;

    assert_eq!(setup.points_of("b"), Some(55));
}

#[tokio::test(start_paused = true)]
async fn incremental_passes_keep_the_backfill_policy() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by("alice").time("55").build(),
            RunBuilder::new("b").by("bob").time("1:00").build(),
            RunBuilder::new("x").by("carol").time("2:00").category("100%").build(),
            RunBuilder::new("y").by("dave").time("2:10").category("100%").build(),
        ])
        .started()
        .build()
        .await;

    setup
        .engine
        .trigger_full_recalculation(Some(PointsConfig {
            base_points_per_run: 25,
            ..PointsConfig::default()
        }))
        .await;
    assert_eq!(setup.points_of("b"), Some(55));
    assert_eq!(setup.points_of("y"), Some(55));

    setup.submit(RunBuilder::new("c").by("erin").time("1:30").build());
    setup.settle().await;

    // b is rescored in place, y is untouched; both stay on the same policy
    assert_eq!(setup.rank_of("c"), Some(3));
    assert_eq!(setup.points_of("b"), Some(55));
    assert_eq!(setup.points_of("c"), Some(45));
    assert_eq!(setup.points_of("y"), Some(55));
    assert_eq!(setup.engine.points_config().await.base_points_per_run, 25);

    setup.engine.stop().await.unwrap();
}

#[tokio::test]
async fn failed_chunks_are_reported_and_retried_next_pass() {
    let runs = (0..5)
        .map(|i| {
            RunBuilder::new(&format!("run-{i}"))
                .by(&format!("player-{i}"))
                .time(&format!("{}", 50 + i))
                .build()
        })
        .collect();
    let setup = TestSetupBuilder::new()
        .with_runs(runs)
        .with_max_batch_ops(2)
        .build()
        .await;
    setup
        .store
        .fail_commit(1, StoreError::invalid_document("rejected"));

    let report = setup.engine.trigger_full_recalculation(None).await;

    assert_eq!(report.runs_updated, 3);
    assert_eq!(report.error_count(), 2);
    assert!(report
        .errors
        .iter()
        .all(|failure| matches!(failure, RecalculationFailure::Write { .. })));
    assert_eq!(setup.rank_of("run-0"), None);
    assert_eq!(setup.rank_of("run-2"), Some(3));

    let retry = setup.engine.trigger_full_recalculation(None).await;

    assert!(retry.is_clean());
    assert_eq!(retry.runs_updated, 2);
    assert_eq!(setup.rank_of("run-0"), Some(1));
    assert_eq!(setup.total_points_of("player-0"), Some(150));
}

// ============================================================================
// Incremental recalculation driven by the change feeds
// ============================================================================

#[tokio::test(start_paused = true)]
async fn submitted_runs_are_ranked_after_the_debounce() {
    let setup = TestSetupBuilder::new().started().build().await;

    setup.submit(RunBuilder::new("a").by("alice").time("1:00").build());
    setup.settle().await;

    assert_eq!(setup.rank_of("a"), Some(1));
    assert_eq!(setup.total_points_of("alice"), Some(150));

    setup.submit(RunBuilder::new("b").by("bob").time("55").build());
    setup.settle().await;

    assert_eq!(setup.rank_of("b"), Some(1));
    assert_eq!(setup.rank_of("a"), Some(2));
    assert_eq!(setup.points_of("a"), Some(40));
    assert_eq!(setup.total_points_of("alice"), Some(40));
    assert_eq!(setup.total_points_of("bob"), Some(150));

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn bursts_of_changes_collapse_into_one_pass() {
    let setup = TestSetupBuilder::new().started().build().await;

    setup.submit(RunBuilder::new("a").by("alice").time("1:00").build());
    tokio::time::sleep(Duration::from_millis(1000)).await;
    setup.submit(RunBuilder::new("b").by("bob").time("55").build());
    tokio::time::sleep(Duration::from_millis(1000)).await;

    // the second event restarted the quiet period
    assert_eq!(setup.store.commit_count(), 0);

    setup.settle().await;
    // one commit of run updates, one of player aggregates
    assert_eq!(setup.store.commit_count(), 2);

    // the engine's own rank/points writes do not schedule more work
    setup.settle().await;
    assert_eq!(setup.store.commit_count(), 2);

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unverified_run_loses_its_rank() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by("alice").time("55").build(),
            RunBuilder::new("b").by("bob").time("1:00").build(),
        ])
        .started()
        .build()
        .await;
    setup.engine.trigger_full_recalculation(None).await;

    let mut rejected = setup.store.run("a").unwrap();
    rejected.verified = false;
    setup.submit(rejected);
    setup.settle().await;

    assert_eq!(setup.rank_of("a"), None);
    assert_eq!(setup.points_of("a"), Some(0));
    assert_eq!(setup.rank_of("b"), Some(1));
    assert_eq!(setup.total_points_of("alice"), Some(0));
    assert_eq!(setup.total_runs_of("alice"), Some(0));
    assert_eq!(setup.total_points_of("bob"), Some(150));

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn moving_a_run_recalculates_both_boards() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by("alice").time("55").build(),
            RunBuilder::new("b").by("bob").time("1:00").build(),
        ])
        .started()
        .build()
        .await;
    setup.engine.trigger_full_recalculation(None).await;
    assert_eq!(setup.rank_of("b"), Some(2));

    let mut moved = setup.store.run("a").unwrap();
    moved.category = "100%".to_string();
    setup.submit(moved);
    setup.settle().await;

    assert_eq!(setup.rank_of("a"), Some(1));
    assert_eq!(setup.rank_of("b"), Some(1));
    assert_eq!(setup.points_of("b"), Some(150));

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn deleted_run_promotes_the_next_one() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by("alice").time("55").build(),
            RunBuilder::new("b").by("bob").time("1:00").build(),
        ])
        .started()
        .build()
        .await;
    setup.engine.trigger_full_recalculation(None).await;

    setup.store.delete_run("a").unwrap();
    setup.settle().await;

    assert_eq!(setup.rank_of("b"), Some(1));
    assert_eq!(setup.total_points_of("alice"), Some(0));

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn changed_points_config_triggers_a_global_pass() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![
            RunBuilder::new("a").by("alice").time("55").build(),
            RunBuilder::new("b").by("bob").time("1:00").category("100%").build(),
            RunBuilder::new("c").by("carol").time("1:10").category("100%").build(),
        ])
        .started()
        .build()
        .await;
    setup.engine.trigger_full_recalculation(None).await;
    assert_eq!(setup.points_of("c"), Some(40));

    setup
        .store
        .set_points_config(&PointsConfig {
            version: 2,
            base_points_per_run: 25,
            ..PointsConfig::default()
        })
        .unwrap();
    setup.settle().await;

    assert_eq!(setup.points_of("c"), Some(55));
    assert_eq!(setup.total_points_of("carol"), Some(55));
    assert_eq!(setup.engine.points_config().await.base_points_per_run, 25);

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn republishing_the_same_points_config_is_a_no_op() {
    let setup = TestSetupBuilder::new()
        .with_runs(vec![RunBuilder::new("a").by("alice").time("55").build()])
        .started()
        .build()
        .await;
    setup.engine.trigger_full_recalculation(None).await;
    let commits = setup.store.commit_attempts();

    setup
        .store
        .set_points_config(&PointsConfig {
            version: 7,
            ..PointsConfig::default()
        })
        .unwrap();
    setup.settle().await;

    assert_eq!(setup.store.commit_attempts(), commits);
    assert_eq!(setup.engine.status().pending_partitions, 0);

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn status_follows_the_scheduler_cycle() {
    let setup = TestSetupBuilder::new().started().build().await;
    let mut status = setup.engine.subscribe_status();

    let observer = tokio::spawn(async move {
        let mut phases = Vec::new();
        while status.changed().await.is_ok() {
            let phase = status.borrow_and_update().phase;
            phases.push(phase);
            if phase == SchedulerPhase::Idle {
                break;
            }
        }
        phases
    });

    setup.submit(RunBuilder::new("a").by("alice").time("1:00").build());
    setup.settle().await;

    let phases = observer.await.unwrap();
    assert_eq!(phases.first(), Some(&SchedulerPhase::Debouncing));
    assert_eq!(phases.last(), Some(&SchedulerPhase::Idle));
    assert!(!setup.engine.status().in_progress);

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unreachable_store_keeps_work_until_the_next_change() {
    let setup = TestSetupBuilder::new().started().build().await;

    setup.submit(RunBuilder::new("a").by("alice").time("1:00").build());
    setup.store.set_unavailable(true);
    setup.settle().await;

    assert_eq!(setup.rank_of("a"), None);
    assert_eq!(setup.engine.status().pending_partitions, 1);

    setup.store.set_unavailable(false);
    setup.submit(RunBuilder::new("b").by("bob").time("1:30").category("100%").build());
    setup.settle().await;

    assert_eq!(setup.rank_of("a"), Some(1));
    assert_eq!(setup.rank_of("b"), Some(1));
    assert_eq!(setup.engine.status().pending_partitions, 0);

    setup.engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_lets_the_running_pass_finish_and_ignores_later_changes() {
    let setup = TestSetupBuilder::new().started().build().await;
    setup.store.set_commit_delay(Duration::from_millis(1000));

    setup.submit(RunBuilder::new("a").by("alice").time("1:00").build());
    tokio::time::sleep(utils::TEST_DEBOUNCE + Duration::from_millis(100)).await;

    // the pass has started and is waiting on its first commit
    assert!(setup.engine.status().in_progress);
    assert_eq!(setup.store.commit_count(), 0);

    setup.engine.stop().await.unwrap();

    assert_eq!(setup.rank_of("a"), Some(1));
    assert_eq!(setup.total_points_of("alice"), Some(150));
    assert_eq!(setup.store.commit_count(), 2);
    assert!(!setup.engine.status().in_progress);

    setup.submit(RunBuilder::new("b").by("bob").time("55").build());
    setup.settle().await;

    assert_eq!(setup.rank_of("b"), None);
    assert_eq!(setup.store.commit_count(), 2);
}
