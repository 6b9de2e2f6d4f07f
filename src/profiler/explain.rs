//! Explain requests and execution-statistics extraction
//!
//! An [`ExplainRequest`] always wraps an original query command. Building one
//! from anything that is already an explain command, or from the output of a
//! previous explain, fails with [`ProfilerError::SelfExplain`] before any call
//! reaches the database.

use mongodb::bson::{doc, Bson, Document};

use crate::error::{ItemResult, ProfilerError};
use crate::models::{PlanSummary, QueryCase};

/// Commands the server can explain
const EXPLAINABLE: &[&str] = &[
    "find",
    "aggregate",
    "count",
    "distinct",
    "update",
    "delete",
    "findAndModify",
];

/// Top-level keys that only ever appear in explain output
const EXPLAIN_OUTPUT_KEYS: &[&str] = &["queryPlanner", "executionStats", "explainVersion"];

/// Only verbosity that reports `executionTimeMillis` for the winning plan
pub const VERBOSITY: &str = "executionStats";

/// `IllegalOperation`, returned for commands that do not support explain
pub const CODE_ILLEGAL_OPERATION: i32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ExplainRequest {
    collection: String,
    command: Document,
}

impl ExplainRequest {
    /// Explain request for a profiled query. The command comes straight from
    /// the query definition, so it can never be an explain itself.
    pub fn for_case(case: &QueryCase) -> Self {
        Self {
            collection: case.collection.clone(),
            command: case.query.command(&case.collection),
        }
    }

    /// Explain request for an arbitrary command document
    pub fn wrap(collection: &str, command: Document) -> ItemResult<Self> {
        if is_explain_command(&command) {
            return Err(ProfilerError::self_explain(format!(
                "command for '{}' is already an explain command",
                collection
            )));
        }
        if is_explain_output(&command) {
            return Err(ProfilerError::self_explain(format!(
                "document for '{}' is the result of a previous explain",
                collection
            )));
        }

        let verb = command.keys().next().cloned().unwrap_or_default();
        if !EXPLAINABLE.contains(&verb.as_str()) {
            return Err(ProfilerError::unclassified(
                format!("explain {}", collection),
                None,
                format!("'{}' is not an explainable command", verb),
            ));
        }

        Ok(Self {
            collection: collection.to_string(),
            command,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The original command being explained
    pub fn inner(&self) -> &Document {
        &self.command
    }

    /// `{ explain: <command>, verbosity: "executionStats" }` as sent to the server
    pub fn to_command(&self) -> Document {
        doc! {
            "explain": self.command.clone(),
            "verbosity": VERBOSITY,
        }
    }
}

/// True when the document's command verb is `explain`
pub fn is_explain_command(document: &Document) -> bool {
    document
        .keys()
        .next()
        .map(|k| k.eq_ignore_ascii_case("explain"))
        .unwrap_or(false)
}

/// True when the document looks like something an explain returned
pub fn is_explain_output(document: &Document) -> bool {
    EXPLAIN_OUTPUT_KEYS.iter().any(|k| document.contains_key(k))
        || (document.contains_key("stages") && document.contains_key("serverInfo"))
}

/// The server's rejection of an explain wrapped around another explain:
/// `IllegalOperation` with "Cannot explain cmd: explain"
pub fn is_self_explain_rejection(code: Option<i32>, message: &str) -> bool {
    code == Some(CODE_ILLEGAL_OPERATION)
        && message
            .to_ascii_lowercase()
            .contains("cannot explain cmd: explain")
}

/// Server execution time and plan details from an `executionStats` explain.
///
/// Handles plain find output (`executionStats` at the top) and aggregate
/// output where the stats sit under `stages[0].$cursor`.
pub fn execution_profile(output: &Document) -> ItemResult<(f64, PlanSummary)> {
    if is_explain_command(output) {
        return Err(ProfilerError::self_explain("explain output is itself an explain command"));
    }

    let scope = stats_scope(output).ok_or_else(|| {
        ProfilerError::unclassified(
            "explain",
            None,
            "explain output has no executionStats (was verbosity executionStats?)",
        )
    })?;

    let stats = scope.get_document("executionStats").map_err(|_| {
        ProfilerError::unclassified("explain", None, "explain output has no executionStats section")
    })?;

    let millis = stats
        .get("executionTimeMillis")
        .and_then(as_f64)
        .ok_or_else(|| ProfilerError::unclassified("explain", None, "executionStats has no executionTimeMillis"))?;

    let winning = scope
        .get_document("queryPlanner")
        .ok()
        .and_then(|qp| qp.get_document("winningPlan").ok())
        .map(|plan| plan.get_document("queryPlan").unwrap_or(plan));

    let (access_stage, index_name) = winning.map(leaf_stage).unwrap_or((None, None));

    let plan = PlanSummary {
        winning_stage: winning.and_then(|p| p.get_str("stage").ok()).map(str::to_string),
        access_stage,
        index_name,
        n_returned: stats.get("nReturned").and_then(as_i64),
        docs_examined: stats.get("totalDocsExamined").and_then(as_i64),
        keys_examined: stats.get("totalKeysExamined").and_then(as_i64),
    };

    Ok((millis, plan))
}

fn stats_scope(output: &Document) -> Option<&Document> {
    if output.contains_key("executionStats") {
        return Some(output);
    }
    output
        .get_array("stages")
        .ok()
        .and_then(|stages| stages.first())
        .and_then(Bson::as_document)
        .and_then(|first| first.get_document("$cursor").ok())
        .filter(|cursor| cursor.contains_key("executionStats"))
}

/// Walk `inputStage` down to the stage that reads data
fn leaf_stage(plan: &Document) -> (Option<String>, Option<String>) {
    let mut current = plan;
    let mut index_name = None;
    loop {
        if let Ok(name) = current.get_str("indexName") {
            index_name = Some(name.to_string());
        }
        match current.get_document("inputStage") {
            Ok(next) => current = next,
            Err(_) => break,
        }
    }
    (current.get_str("stage").ok().map(str::to_string), index_name)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}
