//! Per-run accumulation of index outcomes, timings and failure notes

use crate::error::ProfilerError;
use crate::models::query::QueryCase;
use crate::models::timing::{Phase, TimingResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Steps of a run, in their only valid order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DropIndexes,
    ProfileBefore,
    CreateIndexes,
    ProfileAfter,
    Compare,
}

impl Stage {
    pub const ORDER: [Stage; 5] = [
        Stage::DropIndexes,
        Stage::ProfileBefore,
        Stage::CreateIndexes,
        Stage::ProfileAfter,
        Stage::Compare,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DropIndexes => "drop",
            Stage::ProfileBefore => "profile-before",
            Stage::CreateIndexes => "create",
            Stage::ProfileAfter => "profile-after",
            Stage::Compare => "compare",
        }
    }

    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Before => Stage::ProfileBefore,
            Phase::After => Stage::ProfileAfter,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one index spec in the drop or create step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Dropped,
    AlreadyAbsent,
    Created,
    SkippedConflict,
    Failed,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Dropped => "dropped",
            IndexStatus::AlreadyAbsent => "already absent",
            IndexStatus::Created => "created",
            IndexStatus::SkippedConflict => "skipped (conflict)",
            IndexStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexOutcome {
    pub stage: Stage,
    pub collection: String,
    pub index: String,
    pub keys: String,
    pub status: IndexStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProfilerError>,
}

impl IndexOutcome {
    /// Whether this outcome should show up in the failure notes
    pub fn is_failure(&self) -> bool {
        matches!(self.status, IndexStatus::SkippedConflict | IndexStatus::Failed)
    }
}

/// A recorded failure with enough context to diagnose it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureNote {
    pub stage: Stage,
    /// `collection.index` for index work, the query label for measurements
    pub subject: String,
    pub error: ProfilerError,
}

impl fmt::Display for FailureNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}): {}", self.stage, self.subject, self.error.category(), self.error)
    }
}

/// Everything one run accumulates. Owned by the caller of the run, so a
/// partially filled record survives an interrupted run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub interrupted: bool,
    pub completed: Vec<Stage>,
    pub drop_outcomes: Vec<IndexOutcome>,
    pub create_outcomes: Vec<IndexOutcome>,
    pub before: Vec<TimingResult>,
    pub after: Vec<TimingResult>,
    pub failures: Vec<FailureNote>,
}

impl RunRecord {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            finished_at: None,
            interrupted: false,
            completed: Vec::new(),
            drop_outcomes: Vec::new(),
            create_outcomes: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn timings(&self, phase: Phase) -> &[TimingResult] {
        match phase {
            Phase::Before => &self.before,
            Phase::After => &self.after,
        }
    }

    /// Store a timing, replacing any earlier one for the same label and phase
    pub fn record_timing(&mut self, result: TimingResult) {
        let bucket = match result.phase {
            Phase::Before => &mut self.before,
            Phase::After => &mut self.after,
        };
        match bucket.iter_mut().find(|r| r.label == result.label) {
            Some(existing) => *existing = result,
            None => bucket.push(result),
        }
    }

    pub fn record_outcome(&mut self, outcome: IndexOutcome) {
        match outcome.stage {
            Stage::CreateIndexes => self.create_outcomes.push(outcome),
            _ => self.drop_outcomes.push(outcome),
        }
    }

    pub fn note_failure(&mut self, stage: Stage, subject: String, error: ProfilerError) {
        self.failures.push(FailureNote { stage, subject, error });
    }

    pub fn mark_completed(&mut self, stage: Stage) {
        if !self.completed.contains(&stage) {
            self.completed.push(stage);
        }
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    /// Close the record. Every case ends up with exactly one before and one
    /// after result; cases a run never reached get an empty one.
    pub fn finalize(&mut self, cases: &[QueryCase], interrupted: bool) {
        self.interrupted = interrupted;
        for phase in [Phase::Before, Phase::After] {
            for case in cases {
                if !self.timings(phase).iter().any(|r| r.label == case.label) {
                    self.record_timing(TimingResult::missing(&case.label, &case.collection, phase));
                }
            }
        }
        self.finished_at = Some(Utc::now());
    }

    /// Failures that count against the run (absent drops are informational)
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use std::time::Duration;

    fn cases() -> Vec<QueryCase> {
        vec![
            QueryCase::find("Courses by Category", "courses", doc! { "category": "Data Science" }),
            QueryCase::find("Enrollments by User", "enrollments", doc! { "userId": "u1001" }),
        ]
    }

    #[test]
    fn test_record_timing_replaces_same_label() {
        let mut record = RunRecord::new("s".to_string());
        record.record_timing(TimingResult::missing("Courses by Category", "courses", Phase::Before));
        record.record_timing(
            TimingResult::missing("Courses by Category", "courses", Phase::Before)
                .with_client(Duration::from_millis(2), 1),
        );
        assert_eq!(record.before.len(), 1);
        assert_eq!(record.before[0].client_ms, Some(2.0));
        assert!(record.after.is_empty());
    }

    #[test]
    fn test_finalize_backfills_every_phase() {
        let mut record = RunRecord::new("s".to_string());
        record.record_timing(
            TimingResult::missing("Courses by Category", "courses", Phase::Before)
                .with_client(Duration::from_millis(1), 4),
        );
        record.finalize(&cases(), true);

        assert!(record.interrupted);
        assert!(record.finished_at.is_some());
        assert_eq!(record.before.len(), 2);
        assert_eq!(record.after.len(), 2);
        assert_eq!(record.before[0].client_ms, Some(1.0));
        assert!(record.before[1].is_empty());
        assert!(record.after.iter().all(TimingResult::is_empty));
    }

    #[test]
    fn test_stage_order_and_completion() {
        assert!(Stage::DropIndexes < Stage::ProfileBefore);
        assert!(Stage::CreateIndexes < Stage::ProfileAfter);
        assert_eq!(Stage::for_phase(Phase::After), Stage::ProfileAfter);

        let mut record = RunRecord::new("s".to_string());
        record.mark_completed(Stage::DropIndexes);
        record.mark_completed(Stage::DropIndexes);
        assert_eq!(record.completed, vec![Stage::DropIndexes]);
        assert!(record.is_completed(Stage::DropIndexes));
        assert!(!record.is_completed(Stage::Compare));
    }

    #[test]
    fn test_failure_note_display() {
        let note = FailureNote {
            stage: Stage::CreateIndexes,
            subject: "users.idx_users_email".to_string(),
            error: ProfilerError::name_conflict("users", "idx_users_email", "Index already exists with a different name"),
        };
        let text = note.to_string();
        assert!(text.starts_with("[create] users.idx_users_email (CONFLICT)"));
    }
}
