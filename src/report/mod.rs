//! Before/after comparison of profiling results

use crate::models::{FailureNote, IndexOutcome, Phase, RunRecord, Stage, TimingResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Relative change from a before value to an after value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Improvement {
    /// `(before - after) / before * 100`; negative means the query got slower
    Percent(f64),
    NotCalculable,
}

impl Improvement {
    /// Improvement from `before` to `after`. Not calculable when either side
    /// is missing, when the baseline is not positive, or when the result is
    /// not a finite number.
    pub fn between(before: Option<f64>, after: Option<f64>) -> Self {
        let (Some(before), Some(after)) = (before, after) else {
            return Improvement::NotCalculable;
        };
        if before.is_nan() || before <= 0.0 {
            return Improvement::NotCalculable;
        }
        let percent = (before - after) / before * 100.0;
        if percent.is_finite() {
            Improvement::Percent(percent)
        } else {
            Improvement::NotCalculable
        }
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            Improvement::Percent(p) => Some(*p),
            Improvement::NotCalculable => None,
        }
    }

    pub fn is_regression(&self) -> bool {
        matches!(self, Improvement::Percent(p) if *p < 0.0)
    }
}

impl fmt::Display for Improvement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Improvement::Percent(p) => write!(f, "{:.1}%", p),
            Improvement::NotCalculable => f.write_str("not calculable"),
        }
    }
}

/// One line of the comparison table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub label: String,
    pub collection: String,
    pub client_before_ms: Option<f64>,
    pub client_after_ms: Option<f64>,
    pub client_improvement: Improvement,
    pub server_before_ms: Option<f64>,
    pub server_after_ms: Option<f64>,
    pub server_improvement: Improvement,
    /// Access stage of the winning plan before indexing, e.g. `COLLSCAN`
    pub plan_before: Option<String>,
    pub plan_after: Option<String>,
}

impl ComparisonRow {
    fn build(label: &str, collection: &str, before: Option<&TimingResult>, after: Option<&TimingResult>) -> Self {
        let client_before_ms = before.and_then(|r| r.client_ms);
        let client_after_ms = after.and_then(|r| r.client_ms);
        let server_before_ms = before.and_then(|r| r.server_ms);
        let server_after_ms = after.and_then(|r| r.server_ms);
        let access = |r: Option<&TimingResult>| {
            r.and_then(|r| r.plan.as_ref())
                .and_then(|p| p.access_stage.clone().or_else(|| p.winning_stage.clone()))
        };

        Self {
            label: label.to_string(),
            collection: collection.to_string(),
            client_before_ms,
            client_after_ms,
            client_improvement: Improvement::between(client_before_ms, client_after_ms),
            server_before_ms,
            server_after_ms,
            server_improvement: Improvement::between(server_before_ms, server_after_ms),
            plan_before: access(before),
            plan_after: access(after),
        }
    }

    pub fn is_regression(&self) -> bool {
        self.client_improvement.is_regression() || self.server_improvement.is_regression()
    }
}

/// Everything needed to render a run's results
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub session_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub interrupted: bool,
    pub completed_stages: Vec<Stage>,
    pub rows: Vec<ComparisonRow>,
    pub drop_outcomes: Vec<IndexOutcome>,
    pub create_outcomes: Vec<IndexOutcome>,
    pub failures: Vec<FailureNote>,
    /// Free-text notes: every failure with stage and cause, regressions and
    /// interruption
    pub notes: Vec<String>,
}

impl ComparisonReport {
    /// Report for a (possibly interrupted) run record
    pub fn from_record(record: &RunRecord) -> Self {
        let mut report = compare_and_report(record.timings(Phase::Before), record.timings(Phase::After), &record.failures);
        report.session_id = Some(record.session_id.clone());
        report.interrupted = record.interrupted;
        report.completed_stages = record.completed.clone();
        report.drop_outcomes = record.drop_outcomes.clone();
        report.create_outcomes = record.create_outcomes.clone();

        if record.interrupted {
            let reached = Stage::ORDER
                .iter()
                .find(|stage| !record.is_completed(**stage))
                .map(|stage| stage.as_str())
                .unwrap_or("compare");
            report.notes.insert(
                0,
                format!(
                    "Run interrupted during '{}'; values never measured are shown as not calculable",
                    reached
                ),
            );
        }
        report
    }

    pub fn regressions(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|row| row.is_regression())
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Pair before and after results by label and compute improvements.
///
/// Rows follow the order in which labels first appear, before results
/// first. A label present on only one side still gets a row with
/// not-calculable improvements.
pub fn compare_and_report(before: &[TimingResult], after: &[TimingResult], failures: &[FailureNote]) -> ComparisonReport {
    let mut labels: Vec<(&str, &str)> = Vec::new();
    for result in before.iter().chain(after) {
        if !labels.iter().any(|(label, _)| *label == result.label) {
            labels.push((result.label.as_str(), result.collection.as_str()));
        }
    }

    let rows: Vec<ComparisonRow> = labels
        .into_iter()
        .map(|(label, collection)| {
            ComparisonRow::build(
                label,
                collection,
                before.iter().find(|r| r.label == label),
                after.iter().find(|r| r.label == label),
            )
        })
        .collect();

    let mut notes: Vec<String> = failures.iter().map(ToString::to_string).collect();
    for row in rows.iter().filter(|row| row.is_regression()) {
        notes.push(format!(
            "'{}' got slower after indexing (client {}, server {})",
            row.label, row.client_improvement, row.server_improvement
        ));
    }

    ComparisonReport {
        session_id: None,
        generated_at: Utc::now(),
        interrupted: false,
        completed_stages: Vec::new(),
        rows,
        drop_outcomes: Vec::new(),
        create_outcomes: Vec::new(),
        failures: failures.to_vec(),
        notes,
    }
}
