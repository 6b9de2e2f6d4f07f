//! Timing results recorded for each query case and phase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which side of the index boundary a measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Before,
    After,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plan details pulled from an `executionStats` explain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Top-level winning stage, e.g. `COLLSCAN`, `IXSCAN`, `FETCH`
    pub winning_stage: Option<String>,
    /// Stage that actually reads data, e.g. the `IXSCAN` under a `FETCH`
    pub access_stage: Option<String>,
    pub index_name: Option<String>,
    pub n_returned: Option<i64>,
    pub docs_examined: Option<i64>,
    pub keys_examined: Option<i64>,
}

impl PlanSummary {
    /// True when the winning plan reads through an index
    pub fn uses_index(&self) -> bool {
        self.access_stage.as_deref() == Some("IXSCAN") || self.index_name.is_some()
    }
}

/// One measurement of one query case in one phase.
///
/// Either duration may be absent when its measurement failed; absence is kept
/// as `None` so comparisons can report "not calculable" instead of zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingResult {
    pub label: String,
    pub collection: String,
    pub phase: Phase,
    /// Wall-clock round trip measured by this process, in milliseconds
    pub client_ms: Option<f64>,
    /// `executionStats.executionTimeMillis` reported by the server
    pub server_ms: Option<f64>,
    /// Documents the client actually received
    pub documents: Option<u64>,
    pub plan: Option<PlanSummary>,
}

impl TimingResult {
    /// A result with nothing measured yet
    pub fn missing(label: &str, collection: &str, phase: Phase) -> Self {
        Self {
            label: label.to_string(),
            collection: collection.to_string(),
            phase,
            client_ms: None,
            server_ms: None,
            documents: None,
            plan: None,
        }
    }

    pub fn with_client(mut self, elapsed: Duration, documents: u64) -> Self {
        self.client_ms = Some(elapsed.as_secs_f64() * 1000.0);
        self.documents = Some(documents);
        self
    }

    pub fn with_server(mut self, server_ms: f64, plan: PlanSummary) -> Self {
        self.server_ms = Some(server_ms);
        self.plan = Some(plan);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.client_ms.is_some() && self.server_ms.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.client_ms.is_none() && self.server_ms.is_none()
    }
}
