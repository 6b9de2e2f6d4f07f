//! End-to-end lifecycle scenarios against the in-memory store
//!
//! Each test drives a complete (or deliberately cut short) run and checks
//! what ends up in the record and the report.

use index_profiler::{
    db::InMemoryStore,
    logging::{LogLevel, Logger},
    models::{IndexSpec, IndexStatus, Phase, QueryCase, RunRecord, Stage},
    report::{ComparisonReport, Improvement},
    workload::Workload,
    IndexProfiler, ProfilerError,
};
use chrono::Utc;
use mongodb::bson::doc;
use std::time::Duration;

fn quiet_logger() -> Logger {
    let mut logger = Logger::new("scenario".to_string());
    logger.set_level(LogLevel::Fatal);
    logger
}

fn eduhub_cases() -> (Vec<IndexSpec>, Vec<QueryCase>) {
    let workload = Workload::eduhub();
    let cases = workload.resolve(Utc::now()).unwrap();
    (workload.indexes, cases)
}

async fn full_run(store: &InMemoryStore, timeout: Duration) -> (RunRecord, ComparisonReport) {
    let (specs, cases) = eduhub_cases();
    let profiler = IndexProfiler::new(store, timeout, quiet_logger());
    let mut record = RunRecord::new("scenario-session".to_string());
    let report = profiler.run(&specs, &cases, &mut record).await;
    (record, report)
}

#[tokio::test]
async fn test_full_run_on_fresh_store() {
    let store = InMemoryStore::eduhub();
    let (record, report) = full_run(&store, Duration::from_secs(2)).await;

    assert_eq!(record.completed, Stage::ORDER.to_vec());
    assert!(!record.interrupted);
    assert!(record.finished_at.is_some());

    // Nothing to drop on a fresh store, and that is not a failure
    assert_eq!(record.drop_outcomes.len(), 6);
    assert!(record
        .drop_outcomes
        .iter()
        .all(|o| o.status == IndexStatus::AlreadyAbsent));
    assert!(record
        .create_outcomes
        .iter()
        .all(|o| o.status == IndexStatus::Created));
    assert!(report.failures.is_empty());

    let labels: Vec<&str> = report.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["Courses by Category", "Enrollments by User", "Assignments Due Soon"]
    );
    for row in &report.rows {
        assert!(row.client_before_ms.is_some());
        assert!(row.client_after_ms.is_some());
        assert!(matches!(row.client_improvement, Improvement::Percent(_)));
    }

    let enrollments = &report.rows[1];
    assert_eq!(enrollments.server_before_ms, Some(12.0));
    assert_eq!(enrollments.server_after_ms, Some(2.0));
    let percent = enrollments.server_improvement.percent().unwrap();
    assert!((percent - 83.333).abs() < 0.01);

    assert_eq!(
        store.index_names("enrollments").await,
        vec!["idx_enrollments_courseId", "idx_enrollments_userId"]
    );
}

#[tokio::test]
async fn test_regression_is_reported_not_clamped() {
    let store = InMemoryStore::eduhub();
    let (_, report) = full_run(&store, Duration::from_secs(2)).await;

    let regressions: Vec<_> = report.regressions().collect();
    assert_eq!(regressions.len(), 1);
    assert_eq!(regressions[0].label, "Assignments Due Soon");
    assert_eq!(regressions[0].server_improvement, Improvement::Percent(-50.0));
    assert!(report
        .notes
        .iter()
        .any(|n| n.starts_with("'Assignments Due Soon' got slower after indexing")));
}

#[tokio::test]
async fn test_existing_index_under_other_name_is_skipped() {
    let store = InMemoryStore::eduhub().with_index("users", "uix_users_email", doc! { "email": 1 }, true);
    let (record, report) = full_run(&store, Duration::from_secs(2)).await;

    let users = record
        .create_outcomes
        .iter()
        .find(|o| o.collection == "users")
        .unwrap();
    assert_eq!(users.status, IndexStatus::SkippedConflict);
    assert!(matches!(users.error, Some(ProfilerError::IndexNameConflict { .. })));

    // Not retried under another name, the original index stays
    assert_eq!(store.index_names("users").await, vec!["uix_users_email"]);
    assert_eq!(
        store
            .calls()
            .await
            .iter()
            .filter(|c| c.starts_with("create_index users."))
            .count(),
        1
    );

    // The rest of the batch still went through
    assert_eq!(
        record
            .create_outcomes
            .iter()
            .filter(|o| o.status == IndexStatus::Created)
            .count(),
        5
    );
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, Stage::CreateIndexes);
    assert!(report.notes[0].starts_with("[create] users.idx_users_email (CONFLICT)"));
    assert!(report.notes[0].contains("uix_users_email"));
}

#[tokio::test]
async fn test_second_run_drops_what_the_first_created() {
    let store = InMemoryStore::eduhub();
    full_run(&store, Duration::from_secs(2)).await;
    let (record, report) = full_run(&store, Duration::from_secs(2)).await;

    assert!(record
        .drop_outcomes
        .iter()
        .all(|o| o.status == IndexStatus::Dropped));
    assert!(report.failures.is_empty());
    assert_eq!(report.rows[0].plan_before.as_deref(), Some("COLLSCAN"));
}

#[tokio::test]
async fn test_timeout_only_affects_the_stalled_collection() {
    let store = InMemoryStore::eduhub().with_delay("courses", Duration::from_millis(300));
    let (record, report) = full_run(&store, Duration::from_millis(50)).await;

    assert_eq!(record.completed.last(), Some(&Stage::Compare));

    let courses = &report.rows[0];
    assert!(courses.client_before_ms.is_none());
    assert!(courses.server_after_ms.is_none());
    assert_eq!(courses.server_improvement, Improvement::NotCalculable);

    let enrollments = &report.rows[1];
    assert!(matches!(enrollments.server_improvement, Improvement::Percent(_)));

    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f.error, ProfilerError::MeasurementTimeout { timeout_ms: 50, .. })));
    assert!(report
        .failures
        .iter()
        .any(|f| f.stage == Stage::CreateIndexes && f.subject == "courses.idx_courses_category"));
}

#[tokio::test]
async fn test_failed_queries_keep_server_timings() {
    let store = InMemoryStore::eduhub().failing_queries("enrollments");
    let (_, report) = full_run(&store, Duration::from_secs(2)).await;

    let enrollments = &report.rows[1];
    assert!(enrollments.client_before_ms.is_none());
    assert_eq!(enrollments.client_improvement, Improvement::NotCalculable);
    assert_eq!(enrollments.server_before_ms, Some(12.0));
    assert!(matches!(enrollments.server_improvement, Improvement::Percent(_)));

    let stages: Vec<Stage> = report
        .failures
        .iter()
        .filter(|f| f.subject == "Enrollments by User")
        .map(|f| f.stage)
        .collect();
    assert_eq!(stages, vec![Stage::ProfileBefore, Stage::ProfileAfter]);
}

#[tokio::test]
async fn test_self_explain_never_reaches_the_store() {
    let store = InMemoryStore::eduhub();
    let profiler = IndexProfiler::new(&store, Duration::from_secs(1), quiet_logger());

    let explain_output = doc! {
        "queryPlanner": { "winningPlan": { "stage": "COLLSCAN" } },
        "executionStats": { "executionTimeMillis": 3 },
    };
    let err = profiler.explain_command("courses", explain_output).await.unwrap_err();
    assert!(matches!(err, ProfilerError::SelfExplain { .. }));

    let explain_command = doc! { "explain": { "find": "courses" }, "verbosity": "executionStats" };
    let err = profiler.explain_command("courses", explain_command).await.unwrap_err();
    assert!(matches!(err, ProfilerError::SelfExplain { .. }));

    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn test_interrupted_run_keeps_partial_results() {
    let (specs, cases) = eduhub_cases();
    let store = InMemoryStore::eduhub().with_delay("assignments", Duration::from_millis(500));
    let profiler = IndexProfiler::new(&store, Duration::from_secs(5), quiet_logger());
    let mut record = RunRecord::new("interrupted-session".to_string());

    let cut = tokio::time::timeout(
        Duration::from_millis(100),
        profiler.run(&specs, &cases, &mut record),
    )
    .await;
    assert!(cut.is_err());

    record.finalize(&cases, true);
    let report = ComparisonReport::from_record(&record);

    assert!(report.interrupted);
    assert!(record.completed.is_empty());
    // users and both courses indexes were handled before the stall
    assert_eq!(record.drop_outcomes.len(), 3);
    assert_eq!(record.timings(Phase::Before).len(), 3);
    assert_eq!(record.timings(Phase::After).len(), 3);

    assert_eq!(report.rows.len(), 3);
    assert!(report
        .rows
        .iter()
        .all(|r| r.client_improvement == Improvement::NotCalculable));
    assert!(report.notes[0].starts_with("Run interrupted during 'drop'"));
}
