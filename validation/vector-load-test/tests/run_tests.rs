//! End-to-end runs against the in-process backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{always, line_count, test_config, Event, MockBackend};
use vector_load_test::config::LatencyRecording;
use vector_load_test::{
    BackendError, HarnessError, LoadRunner, OperationClass, RoundScheduler, RunContext,
    SchedulerState,
};

fn runner(config: vector_load_test::RunConfig, backend: &Arc<MockBackend>) -> LoadRunner {
    LoadRunner::with_backends(config, backend.clone(), backend.clone())
}

// ============================================================================
// Invocation counts
// ============================================================================

#[tokio::test]
async fn test_issues_exactly_rounds_times_units() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let config = test_config(dir.path(), 6, 5);

    let outcome = runner(config.clone(), &backend).run().await.unwrap();

    assert!(outcome.error.is_none());
    assert_eq!(outcome.summary.invocations_issued, 30);
    assert_eq!(outcome.summary.rounds_completed, 6);
    assert_eq!(outcome.summary.samples_total(), 30);
    assert_eq!(backend.calls(), 30);

    let written = line_count(&config.output.path_for(OperationClass::Write))
        + line_count(&config.output.path_for(OperationClass::Query));
    assert_eq!(written, 30);
}

#[tokio::test]
async fn test_zero_units_per_round_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let config = test_config(dir.path(), 5, 0);

    let outcome = runner(config.clone(), &backend).run().await.unwrap();

    assert!(outcome.error.is_none());
    assert_eq!(outcome.summary.rounds_completed, 5);
    assert_eq!(outcome.summary.samples_total(), 0);
    assert_eq!(backend.calls(), 0);
    for class in OperationClass::ALL {
        let meta = std::fs::metadata(config.output.path_for(class)).unwrap();
        assert_eq!(meta.len(), 0);
    }
}

#[tokio::test]
async fn test_zero_rounds_finishes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let config = test_config(dir.path(), 0, 12);

    let outcome = runner(config, &backend).run().await.unwrap();

    assert!(outcome.error.is_none());
    assert_eq!(outcome.summary.rounds_completed, 0);
    assert_eq!(outcome.summary.invocations_issued, 0);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_forced_write_round() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let mut config = test_config(dir.path(), 1, 10);
    config.workload.selection = always(OperationClass::Write);

    let outcome = runner(config, &backend).run().await.unwrap();

    assert_eq!(outcome.summary.writes.count, 10);
    assert_eq!(outcome.summary.queries.count, 0);
    assert_eq!(outcome.summary.iterations_consumed, 10);
    // 10 iterations x 3 rows, all distinct
    assert_eq!(backend.inserted_keys().len(), 30);
    assert_eq!(backend.distinct_keys(), 30);
}

#[tokio::test]
async fn test_forced_query_round_consumes_no_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let mut config = test_config(dir.path(), 2, 4);
    config.workload.selection = always(OperationClass::Query);

    let outcome = runner(config, &backend).run().await.unwrap();

    assert_eq!(outcome.summary.queries.count, 8);
    assert_eq!(outcome.summary.writes.count, 0);
    assert_eq!(outcome.summary.iterations_consumed, 0);
}

// ============================================================================
// Concurrency invariants
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_iteration_indices_unique_under_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend {
        delay: Duration::from_millis(1),
        ..MockBackend::new()
    });
    let mut config = test_config(dir.path(), 20, 16);
    config.workload.selection = always(OperationClass::Write);
    config.workload.rows_per_insert = 2;

    let outcome = runner(config, &backend).run().await.unwrap();

    assert_eq!(outcome.summary.iterations_consumed, 320);
    assert_eq!(backend.inserted_keys().len(), 640);
    assert_eq!(backend.distinct_keys(), 640);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rounds_never_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend {
        delay: Duration::from_millis(2),
        jitter: true,
        ..MockBackend::new()
    });
    let units = 8;
    let config = test_config(dir.path(), 6, units);

    let outcome = runner(config, &backend).run().await.unwrap();
    assert!(outcome.error.is_none());

    // The k-th call to start belongs to round k / units; every call of the
    // earlier rounds must have ended before it started.
    let mut starts = 0;
    let mut ends = 0;
    for event in backend.events() {
        match event {
            Event::Start => {
                let round = starts / units;
                assert!(
                    ends >= round * units,
                    "call {} of round {} started with only {} calls finished",
                    starts,
                    round,
                    ends
                );
                starts += 1;
            }
            Event::End => ends += 1,
        }
    }
    assert_eq!(starts, 48);
    assert_eq!(ends, 48);
    assert!(backend.max_in_flight() <= units);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_runs_share_nothing() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let backend_a = Arc::new(MockBackend::new());
    let backend_b = Arc::new(MockBackend::new());
    let mut config_a = test_config(dir_a.path(), 3, 4);
    let mut config_b = test_config(dir_b.path(), 2, 5);
    config_a.workload.selection = always(OperationClass::Write);
    config_b.workload.selection = always(OperationClass::Write);

    let runner_a = runner(config_a, &backend_a);
    let runner_b = runner(config_b, &backend_b);
    let (a, b) = tokio::join!(runner_a.run(), runner_b.run());

    assert_eq!(a.unwrap().summary.iterations_consumed, 12);
    assert_eq!(b.unwrap().summary.iterations_consumed, 10);
    // Both runs start their key space at zero
    assert!(backend_a.inserted_keys().contains(&0));
    assert!(backend_b.inserted_keys().contains(&0));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_failure_mid_round_drains_round_then_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::failing_on_call(3));
    let config = test_config(dir.path(), 3, 10);

    let outcome = runner(config.clone(), &backend).run().await.unwrap();

    match &outcome.error {
        Some(HarnessError::Backend { round, .. }) => assert_eq!(*round, 0),
        other => panic!("expected backend error, got {:?}", other),
    }
    // All ten invocations of round 0 ran, round 1 never started
    assert_eq!(backend.calls(), 10);
    assert_eq!(outcome.summary.invocations_issued, 10);
    assert_eq!(outcome.summary.rounds_completed, 0);
    // Default policy records the failed call as well
    assert_eq!(outcome.summary.samples_total(), 10);
    assert!(outcome.summary.aborted.is_some());

    let exported = line_count(&config.output.path_for(OperationClass::Write))
        + line_count(&config.output.path_for(OperationClass::Query));
    assert_eq!(exported, 10);
}

#[tokio::test]
async fn test_success_only_recording_skips_failed_call() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::failing_on_call(3));
    let mut config = test_config(dir.path(), 3, 10);
    config.workload.latency_recording = LatencyRecording::SuccessOnly;

    let outcome = runner(config, &backend).run().await.unwrap();

    assert!(outcome.error.is_some());
    assert_eq!(outcome.summary.samples_total(), 9);
}

#[tokio::test]
async fn test_deadline_expiry_is_backend_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend {
        delay: Duration::from_millis(500),
        ..MockBackend::new()
    });
    let mut config = test_config(dir.path(), 2, 2);
    config.backend.call_timeout_ms = Some(20);

    let outcome = runner(config, &backend).run().await.unwrap();

    match outcome.error {
        Some(HarnessError::Backend {
            round: 0,
            source: BackendError::Timeout(20),
            ..
        }) => {}
        other => panic!("expected timeout in round 0, got {:?}", other),
    }
    assert_eq!(outcome.summary.rounds_completed, 0);
    assert_eq!(outcome.summary.samples_total(), 2);
}

#[tokio::test]
async fn test_setup_failure_still_exports_empty_series() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend {
        fail_setup: Some("create_collection"),
        ..MockBackend::new()
    });
    let config = test_config(dir.path(), 3, 3);

    let outcome = runner(config.clone(), &backend).run().await.unwrap();

    match &outcome.error {
        Some(HarnessError::Setup { step, .. }) => assert_eq!(*step, "create_collection"),
        other => panic!("expected setup error, got {:?}", other),
    }
    assert_eq!(backend.calls(), 0);
    assert_eq!(outcome.summary.invocations_issued, 0);
    for class in OperationClass::ALL {
        assert!(config.output.path_for(class).exists());
    }
}

// ============================================================================
// Setup and preload
// ============================================================================

#[tokio::test]
async fn test_setup_recreates_existing_collection() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend {
        collection_exists: true,
        ..MockBackend::new()
    });
    let config = test_config(dir.path(), 0, 0);

    runner(config, &backend).run().await.unwrap();

    assert_eq!(
        backend.setup_calls(),
        vec![
            "has_collection",
            "drop_collection",
            "create_collection",
            "create_index",
            "create_partition",
            "load_collection",
        ]
    );
}

#[tokio::test]
async fn test_setup_reuses_collection_without_recreate() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend {
        collection_exists: true,
        ..MockBackend::new()
    });
    let mut config = test_config(dir.path(), 0, 0);
    config.collection.recreate = false;

    runner(config, &backend).run().await.unwrap();

    assert_eq!(
        backend.setup_calls(),
        vec!["has_collection", "load_collection"]
    );
}

#[tokio::test]
async fn test_preload_claims_iterations_without_samples() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let mut config = test_config(dir.path(), 1, 3);
    config.workload.preload_batches = 2;
    config.workload.selection = always(OperationClass::Write);

    let outcome = runner(config, &backend).run().await.unwrap();

    assert_eq!(outcome.summary.iterations_consumed, 5);
    assert_eq!(outcome.summary.writes.count, 3);
    assert_eq!(backend.distinct_keys(), 15);
}

// ============================================================================
// Scheduler directly
// ============================================================================

#[tokio::test]
async fn test_scheduler_state_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let config = Arc::new(test_config(dir.path(), 2, 3));
    let ctx = Arc::new(RunContext::new(config, backend.clone(), backend.clone()));

    let mut scheduler = RoundScheduler::new(ctx.clone());
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    scheduler.run().await.unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Finished);
    assert_eq!(scheduler.rounds_completed(), 2);
    assert_eq!(ctx.recorder().len(OperationClass::Write) + ctx.recorder().len(OperationClass::Query), 6);
}

#[tokio::test]
async fn test_scheduler_reports_abort_round() {
    let dir = tempfile::tempdir().unwrap();
    // Second round's first call fails
    let backend = Arc::new(MockBackend::failing_on_call(4));
    let config = Arc::new(test_config(dir.path(), 5, 3));
    let ctx = Arc::new(RunContext::new(config, backend.clone(), backend.clone()));

    let mut scheduler = RoundScheduler::new(ctx);
    let err = scheduler.run().await.unwrap_err();

    assert_eq!(err.round(), Some(1));
    assert_eq!(scheduler.state(), SchedulerState::Aborted { round: 1 });
    assert_eq!(scheduler.rounds_completed(), 1);
    assert_eq!(backend.calls(), 6);
}

#[tokio::test]
async fn test_seeded_runs_pick_the_same_classes() {
    let mut sequences = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let mut config = test_config(dir.path(), 8, 1);
        config.workload.seed = Some(2024);

        runner(config, &backend).run().await.unwrap();
        sequences.push(backend.classes());
    }
    assert_eq!(sequences[0].len(), 8);
    assert_eq!(sequences[0], sequences[1]);
}
