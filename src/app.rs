//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config},
    db::{DocumentStore, InMemoryStore, MongoStore},
    error::{AppError, Result},
    logging::{Logger, LoggerFactory},
    models::{Config, IndexSpec, QueryCase, RunRecord},
    output::{write_markdown, OutputCoordinator},
    profiler::IndexProfiler,
    report::ComparisonReport,
    workload::Workload,
};
use chrono::Utc;
use std::path::Path;

/// Exit code for a run stopped with Ctrl-C
pub const EXIT_INTERRUPTED: i32 = 130;

/// What a finished (or interrupted) run produced
#[derive(Debug)]
pub struct RunSummary {
    pub report: ComparisonReport,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else {
            0
        }
    }
}

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    loggers: LoggerFactory,
    logger: Logger,
}

impl App {
    /// Build the application from CLI arguments, environment and .env
    pub async fn from_cli(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::config)?;
        let config = load_config(cli)?;
        Ok(Self::new(config).await)
    }

    /// Build the application from an already validated configuration
    pub async fn new(config: Config) -> Self {
        let loggers = LoggerFactory::new(config.clone());
        let logger = loggers.create_logger("app").await;
        Self {
            config,
            loggers,
            logger,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the profiler and emit the report. Only configuration, workload
    /// and connection problems return an error; per-item failures end up in
    /// the report.
    pub async fn run(&self) -> Result<RunSummary> {
        if self.config.debug {
            eprintln!("{} v{}", crate::PKG_NAME, crate::VERSION);
            eprintln!("{}", display_config_summary(&self.config));
        }

        let workload = Workload::load(self.config.workload_file.as_deref())?;
        let cases = workload.resolve(Utc::now())?;
        let mut record = RunRecord::new(self.loggers.session_id().to_string());

        self.logger
            .info("Loaded workload")
            .field("indexes", workload.indexes.len())
            .field("queries", cases.len())
            .field("source", self.config.workload_file.as_deref().unwrap_or("built-in"))
            .log()
            .await;

        let interrupted = if self.config.dry_run {
            let store = InMemoryStore::eduhub();
            self.profile(&store, &workload.indexes, &cases, &mut record).await
        } else {
            let store = match MongoStore::connect(&self.config).await {
                Ok(store) => store,
                Err(err) => {
                    self.logger
                        .fatal("Could not connect to MongoDB")
                        .field("database", &self.config.database)
                        .error_info(&err)
                        .log()
                        .await;
                    return Err(err);
                }
            };
            self.logger
                .info("Connected to MongoDB")
                .field("database", store.database_name())
                .log()
                .await;

            let interrupted = self.profile(&store, &workload.indexes, &cases, &mut record).await;
            store.close().await;
            self.logger.debug("Closed MongoDB connection").log().await;
            interrupted
        };

        let report = ComparisonReport::from_record(&record);
        self.emit(&report)?;

        Ok(RunSummary { report, interrupted })
    }

    /// Drive the profiler until it finishes or Ctrl-C arrives. Returns
    /// whether the run was interrupted; `record` holds everything measured
    /// either way.
    async fn profile<S: DocumentStore>(
        &self,
        store: &S,
        specs: &[IndexSpec],
        cases: &[QueryCase],
        record: &mut RunRecord,
    ) -> bool {
        let profiler = IndexProfiler::new(store, self.config.timeout(), self.logger.named("profiler"));

        let interrupted = {
            let run = profiler.run(specs, cases, record);
            tokio::pin!(run);
            tokio::select! {
                _ = &mut run => false,
                Ok(()) = tokio::signal::ctrl_c() => true,
            }
        };

        if interrupted {
            record.finalize(cases, true);
            self.logger
                .warn("Run interrupted; reporting partial results")
                .field("completed_stages", &record.completed)
                .log()
                .await;
        }
        interrupted
    }

    /// Print the report to stdout and write the Markdown file if configured
    fn emit(&self, report: &ComparisonReport) -> Result<()> {
        let coordinator = OutputCoordinator::from_config(&self.config);
        println!("{}", coordinator.display_report(report)?);

        if let Some(path) = &self.config.output_file {
            write_markdown(report, Path::new(path))?;
            if !self.config.json_output {
                println!();
                println!("{}", coordinator.display_success(&format!("Markdown report written to {}", path))?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stage;
    use crate::report::Improvement;
    use tempfile::tempdir;

    fn dry_run_config() -> Config {
        Config {
            dry_run: true,
            enable_color: false,
            timeout_ms: 2_000,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_dry_run_reports_every_query() {
        let app = App::new(dry_run_config()).await;
        let summary = app.run().await.unwrap();

        assert!(!summary.interrupted);
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.report.rows.len(), 3);
        assert_eq!(summary.report.completed_stages.last(), Some(&Stage::Compare));
        assert!(summary.report.failures.is_empty());

        let courses = &summary.report.rows[0];
        assert_eq!(courses.server_improvement, Improvement::Percent(75.0));
        assert_eq!(courses.plan_before.as_deref(), Some("COLLSCAN"));
        assert_eq!(courses.plan_after.as_deref(), Some("IXSCAN"));

        let assignments = &summary.report.rows[2];
        assert_eq!(assignments.server_improvement, Improvement::Percent(-50.0));
    }

    #[tokio::test]
    async fn test_markdown_output_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.md");
        let config = Config {
            output_file: path.to_str().map(str::to_string),
            ..dry_run_config()
        };

        App::new(config).await.run().await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Assignments Due Soon"));
    }

    #[tokio::test]
    async fn test_missing_workload_is_an_error() {
        let config = Config {
            workload_file: Some("/nonexistent/workload.json".to_string()),
            ..dry_run_config()
        };
        let err = App::new(config).await.run().await.unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
