//! Index Profiler
//!
//! Measures how a fixed set of MongoDB indexes changes query performance.
//! A run drops the configured indexes, times every workload query (client
//! round trip and server-side `explain`), recreates the indexes, times the
//! queries again and reports the per-query improvement.

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod profiler;
pub mod report;
pub mod workload;

// Re-export commonly used types
pub use db::{DocumentStore, InMemoryStore, MongoStore};
pub use error::{AppError, ItemResult, ProfilerError, Result};
pub use models::{Config, IndexSpec, QueryCase, RunRecord, TimingResult};
pub use output::{ColoredFormatter, OutputCoordinator, OutputFormatter, OutputFormatterFactory, PlainFormatter};
pub use profiler::IndexProfiler;
pub use report::{compare_and_report, ComparisonReport, ComparisonRow, Improvement};
pub use workload::Workload;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Name reported to the server in the connection handshake
pub const APP_NAME: &str = "idxprof";

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/";
    pub const DEFAULT_DATABASE: &str = "eduhub_db";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    /// Upper bound for the per-operation timeout (10 minutes)
    pub const MAX_TIMEOUT_MS: u64 = 600_000;
}
