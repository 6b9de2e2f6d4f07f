//! Data models and structures for the index profiler

pub mod config;
pub mod index;
pub mod query;
pub mod run;
pub mod timing;

// Re-export main model types
pub use config::Config;
pub use index::{IndexField, IndexSpec};
pub use query::{Query, QueryCase, QueryDefinition, QueryTemplate};
pub use run::{FailureNote, IndexOutcome, IndexStatus, RunRecord, Stage};
pub use timing::{Phase, PlanSummary, TimingResult};
