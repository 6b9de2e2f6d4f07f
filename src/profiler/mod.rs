//! Index lifecycle profiler
//!
//! Drives one run in its fixed order: drop the configured indexes, profile
//! every query case, create the indexes, profile again, compare. Each
//! database call is bounded by the configured timeout and every per-item
//! failure is recorded without stopping the batch it belongs to.

pub mod explain;

use crate::{
    db::DocumentStore,
    error::{ItemResult, ProfilerError},
    logging::Logger,
    models::{
        IndexOutcome, IndexSpec, IndexStatus, Phase, PlanSummary, QueryCase, RunRecord, Stage,
        TimingResult,
    },
    report::ComparisonReport,
};
use explain::{execution_profile, ExplainRequest};
use mongodb::bson::Document;
use std::future::Future;
use std::time::{Duration, Instant};

/// Result of timing one query case: whatever was measured plus the errors
/// that kept the rest from being measured
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMeasurement {
    pub result: TimingResult,
    pub errors: Vec<ProfilerError>,
}

pub struct IndexProfiler<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    timeout: Duration,
    logger: Logger,
}

impl<'a, S: DocumentStore + ?Sized> IndexProfiler<'a, S> {
    pub fn new(store: &'a S, timeout: Duration, logger: Logger) -> Self {
        Self {
            store,
            timeout,
            logger,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Await a store call, giving up after the configured timeout
    async fn bounded<T, F>(&self, operation: String, call: F) -> ItemResult<T>
    where
        F: Future<Output = ItemResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProfilerError::timeout(operation, self.timeout)),
        }
    }

    /// Drop one configured index. A missing index or collection counts as
    /// already absent.
    pub async fn drop_index(&self, spec: &IndexSpec) -> IndexOutcome {
        let name = spec.index_name();
        let result = self
            .bounded(
                format!("drop index {}.{}", spec.collection, name),
                self.store.drop_index(&spec.collection, &name),
            )
            .await;

        let (status, error) = match result {
            Ok(()) => {
                self.logger
                    .info("Dropped index")
                    .field("collection", &spec.collection)
                    .field("index", &name)
                    .log()
                    .await;
                (IndexStatus::Dropped, None)
            }
            Err(err @ ProfilerError::IndexAlreadyAbsent { .. }) => {
                self.logger
                    .debug("Index already absent")
                    .field("collection", &spec.collection)
                    .field("index", &name)
                    .log()
                    .await;
                (IndexStatus::AlreadyAbsent, Some(err))
            }
            Err(err) => {
                self.logger
                    .warn("Could not drop index")
                    .field("collection", &spec.collection)
                    .field("index", &name)
                    .field("stage", Stage::DropIndexes)
                    .item_error(&err)
                    .log()
                    .await;
                (IndexStatus::Failed, Some(err))
            }
        };

        IndexOutcome {
            stage: Stage::DropIndexes,
            collection: spec.collection.clone(),
            index: name,
            keys: spec.describe_keys(),
            status,
            error,
        }
    }

    /// Drop every configured index, in order
    pub async fn drop_configured_indexes(&self, specs: &[IndexSpec]) -> Vec<IndexOutcome> {
        self.drop_configured_indexes_into(specs, |_| {}).await
    }

    /// Same as [`Self::drop_configured_indexes`], handing each outcome to
    /// `sink` as soon as it is known
    pub async fn drop_configured_indexes_into<F>(&self, specs: &[IndexSpec], mut sink: F) -> Vec<IndexOutcome>
    where
        F: FnMut(&IndexOutcome),
    {
        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            let outcome = self.drop_index(spec).await;
            sink(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Create one configured index. Conflicts with an existing index are
    /// skipped, never retried under another name.
    pub async fn create_index(&self, spec: &IndexSpec) -> IndexOutcome {
        let name = spec.index_name();
        let result = self
            .bounded(
                format!("create index {}.{}", spec.collection, name),
                self.store.create_index(spec),
            )
            .await;

        let (status, error) = match result {
            Ok(()) => {
                self.logger
                    .info("Created index")
                    .field("collection", &spec.collection)
                    .field("index", &name)
                    .field("keys", spec.describe_keys())
                    .field("unique", spec.unique)
                    .log()
                    .await;
                (IndexStatus::Created, None)
            }
            Err(err) => {
                let status = match err {
                    ProfilerError::IndexNameConflict { .. } => IndexStatus::SkippedConflict,
                    _ => IndexStatus::Failed,
                };
                self.logger
                    .warn("Could not create index")
                    .field("collection", &spec.collection)
                    .field("index", &name)
                    .field("stage", Stage::CreateIndexes)
                    .item_error(&err)
                    .log()
                    .await;
                (status, Some(err))
            }
        };

        IndexOutcome {
            stage: Stage::CreateIndexes,
            collection: spec.collection.clone(),
            index: name,
            keys: spec.describe_keys(),
            status,
            error,
        }
    }

    /// Create every configured index, in order
    pub async fn create_configured_indexes(&self, specs: &[IndexSpec]) -> Vec<IndexOutcome> {
        self.create_configured_indexes_into(specs, |_| {}).await
    }

    pub async fn create_configured_indexes_into<F>(&self, specs: &[IndexSpec], mut sink: F) -> Vec<IndexOutcome>
    where
        F: FnMut(&IndexOutcome),
    {
        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            let outcome = self.create_index(spec).await;
            sink(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Explain an arbitrary command and extract its execution time and plan.
    /// Explain commands and explain output are rejected before any call.
    pub async fn explain_command(&self, collection: &str, command: Document) -> ItemResult<(f64, PlanSummary)> {
        let request = ExplainRequest::wrap(collection, command)?;
        self.explain(&request).await
    }

    async fn explain(&self, request: &ExplainRequest) -> ItemResult<(f64, PlanSummary)> {
        let output = self
            .bounded(
                format!("explain {}", request.collection()),
                self.store.explain(request),
            )
            .await?;
        execution_profile(&output)
    }

    /// Time one query case: client wall clock around executing the query
    /// and draining its results, then the server's own execution time from
    /// an explain of the same query. Either half may fail on its own.
    pub async fn time_query(&self, case: &QueryCase, phase: Phase) -> QueryMeasurement {
        let mut result = TimingResult::missing(&case.label, &case.collection, phase);
        let mut errors = Vec::new();

        let started = Instant::now();
        match self
            .bounded(
                format!("query {}", case.collection),
                self.store.run_query(&case.collection, &case.query),
            )
            .await
        {
            Ok(documents) => result = result.with_client(started.elapsed(), documents),
            Err(err) => errors.push(err),
        }

        match self.explain(&ExplainRequest::for_case(case)).await {
            Ok((server_ms, plan)) => result = result.with_server(server_ms, plan),
            Err(err) => errors.push(err),
        }

        for err in &errors {
            self.logger
                .warn("Measurement failed")
                .field("label", &case.label)
                .field("collection", &case.collection)
                .field("stage", Stage::for_phase(phase))
                .item_error(err)
                .log()
                .await;
        }
        self.logger.debug("Timed query").timing(&result).log().await;

        QueryMeasurement { result, errors }
    }

    /// Time every case in order. A failing case never stops the others.
    pub async fn run_profiling_pass(&self, cases: &[QueryCase], phase: Phase) -> Vec<QueryMeasurement> {
        self.run_profiling_pass_into(cases, phase, |_| {}).await
    }

    pub async fn run_profiling_pass_into<F>(&self, cases: &[QueryCase], phase: Phase, mut sink: F) -> Vec<QueryMeasurement>
    where
        F: FnMut(&QueryMeasurement),
    {
        let mut measurements = Vec::with_capacity(cases.len());
        for case in cases {
            let measurement = self.time_query(case, phase).await;
            sink(&measurement);
            measurements.push(measurement);
        }
        measurements
    }

    /// Run the whole lifecycle. Each batch feeds `record` item by item
    /// through its sink, so dropping this future mid-run (Ctrl-C) leaves
    /// everything finished so far in the record.
    pub async fn run(&self, specs: &[IndexSpec], cases: &[QueryCase], record: &mut RunRecord) -> ComparisonReport {
        self.logger
            .info("Starting index profiling run")
            .field("store", self.store.name())
            .field("indexes", specs.len())
            .field("queries", cases.len())
            .field("timeout_ms", self.timeout.as_millis() as u64)
            .log()
            .await;

        self.drop_configured_indexes_into(specs, |outcome| Self::note_outcome(record, outcome))
            .await;
        record.mark_completed(Stage::DropIndexes);

        self.profile_into(cases, Phase::Before, record).await;

        self.create_configured_indexes_into(specs, |outcome| Self::note_outcome(record, outcome))
            .await;
        record.mark_completed(Stage::CreateIndexes);

        self.profile_into(cases, Phase::After, record).await;

        record.finalize(cases, false);
        let report = ComparisonReport::from_record(record);
        record.mark_completed(Stage::Compare);

        self.logger
            .info("Profiling run finished")
            .field("rows", report.rows.len())
            .field("failures", record.failure_count())
            .log()
            .await;
        report
    }

    async fn profile_into(&self, cases: &[QueryCase], phase: Phase, record: &mut RunRecord) {
        let stage = Stage::for_phase(phase);
        self.run_profiling_pass_into(cases, phase, |measurement| {
            for err in &measurement.errors {
                record.note_failure(stage, measurement.result.label.clone(), err.clone());
            }
            record.record_timing(measurement.result.clone());
        })
        .await;
        record.mark_completed(stage);
    }

    fn note_outcome(record: &mut RunRecord, outcome: &IndexOutcome) {
        if outcome.is_failure() {
            if let Some(err) = &outcome.error {
                record.note_failure(
                    outcome.stage,
                    format!("{}.{}", outcome.collection, outcome.index),
                    err.clone(),
                );
            }
        }
        record.record_outcome(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use mongodb::bson::doc;

    fn quiet_logger() -> Logger {
        let mut logger = Logger::new("profiler-test".to_string());
        logger.set_level(crate::logging::LogLevel::Fatal);
        logger
    }

    fn courses_case() -> QueryCase {
        QueryCase::find("Courses by Category", "courses", doc! { "category": "Data Science" })
    }

    #[tokio::test]
    async fn test_drop_is_idempotent() {
        let store = InMemoryStore::eduhub();
        let profiler = IndexProfiler::new(&store, Duration::from_secs(1), quiet_logger());
        let specs = vec![IndexSpec::new("courses", "category")];

        profiler.create_configured_indexes(&specs).await;
        let first = profiler.drop_configured_indexes(&specs).await;
        let second = profiler.drop_configured_indexes(&specs).await;

        assert_eq!(first[0].status, IndexStatus::Dropped);
        assert_eq!(second[0].status, IndexStatus::AlreadyAbsent);
        assert!(!second[0].is_failure());
    }

    #[tokio::test]
    async fn test_time_query_keeps_client_when_explain_fails() {
        let store = InMemoryStore::eduhub().failing_explains("courses");
        let profiler = IndexProfiler::new(&store, Duration::from_secs(1), quiet_logger());

        let measurement = profiler.time_query(&courses_case(), Phase::Before).await;
        assert!(measurement.result.client_ms.is_some());
        assert_eq!(measurement.result.documents, Some(18));
        assert!(measurement.result.server_ms.is_none());
        assert_eq!(measurement.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_per_item() {
        let store = InMemoryStore::eduhub().with_delay("courses", Duration::from_millis(200));
        let profiler = IndexProfiler::new(&store, Duration::from_millis(20), quiet_logger());
        let cases = vec![
            courses_case(),
            QueryCase::find("Enrollments by User", "enrollments", doc! { "userId": "u1001" }),
        ];

        let measurements = profiler.run_profiling_pass(&cases, Phase::Before).await;
        assert_eq!(measurements.len(), 2);
        assert!(measurements[0].result.is_empty());
        assert!(measurements[0]
            .errors
            .iter()
            .all(|e| matches!(e, ProfilerError::MeasurementTimeout { timeout_ms: 20, .. })));
        assert!(measurements[1].result.is_complete());
    }

    #[tokio::test]
    async fn test_sinks_see_each_item_as_it_finishes() {
        let store = InMemoryStore::eduhub();
        let profiler = IndexProfiler::new(&store, Duration::from_secs(1), quiet_logger());
        let specs = vec![IndexSpec::new("courses", "category"), IndexSpec::new("users", "email")];

        let mut seen = Vec::new();
        let outcomes = profiler
            .create_configured_indexes_into(&specs, |o| seen.push(o.index.clone()))
            .await;
        assert_eq!(seen, vec!["idx_courses_category", "idx_users_email"]);
        assert_eq!(outcomes.len(), 2);

        let mut labels = Vec::new();
        profiler
            .run_profiling_pass_into(&[courses_case()], Phase::After, |m| labels.push(m.result.label.clone()))
            .await;
        assert_eq!(labels, vec!["Courses by Category"]);
    }

    #[tokio::test]
    async fn test_explain_command_rejects_self_explain() {
        let store = InMemoryStore::eduhub();
        let profiler = IndexProfiler::new(&store, Duration::from_secs(1), quiet_logger());

        let nested = ExplainRequest::for_case(&courses_case()).to_command();
        let err = profiler.explain_command("courses", nested).await.unwrap_err();
        assert!(matches!(err, ProfilerError::SelfExplain { .. }));
        assert!(store.calls().await.is_empty());

        let (millis, plan) = profiler
            .explain_command("courses", doc! { "find": "courses", "filter": { "category": "x" } })
            .await
            .unwrap();
        assert_eq!(millis, 4.0);
        assert_eq!(plan.access_stage.as_deref(), Some("COLLSCAN"));
    }
}
