//! Output formatting and display system
//!
//! Renders a comparison report as a plain or colored console table, as
//! JSON, or as a Markdown document.

mod colored;
mod formatter;
pub mod markdown;

pub use colored::{ChangeLevel, ColorScheme, ColoredFormatter};
pub use formatter::{
    format_ms, Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData, TableFormat,
};
pub use markdown::{render_markdown, write_markdown};

use crate::{
    error::{AppError, Result},
    models::Config,
    report::ComparisonReport,
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false)
    }
}

/// How the report goes to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Json,
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    format: ReportFormat,
}

impl OutputCoordinator {
    /// Create a new output coordinator with the specified formatter
    pub fn new(formatter: Box<dyn OutputFormatter>, format: ReportFormat) -> Self {
        Self { formatter, format }
    }

    /// Coordinator matching the configured color, verbosity and JSON choice
    pub fn from_config(config: &Config) -> Self {
        let format = if config.json_output {
            ReportFormat::Json
        } else {
            ReportFormat::Table
        };
        Self::new(
            OutputFormatterFactory::create_formatter(config.enable_color && !config.json_output, config.verbose),
            format,
        )
    }

    /// Render the report for stdout
    pub fn display_report(&self, report: &ComparisonReport) -> Result<String> {
        match self.format {
            ReportFormat::Json => serde_json::to_string_pretty(report)
                .map_err(|e| AppError::parse(format!("Failed to serialize report: {}", e))),
            ReportFormat::Table => self.formatter.format_report(report),
        }
    }

    pub fn display_error(&self, message: &str) -> Result<String> {
        self.formatter.format_error(message)
    }

    pub fn display_warning(&self, message: &str) -> Result<String> {
        self.formatter.format_warning(message)
    }

    pub fn display_success(&self, message: &str) -> Result<String> {
        self.formatter.format_success(message)
    }
}
