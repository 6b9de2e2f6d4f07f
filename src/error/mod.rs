//! Error handling for the index profiler
//!
//! Two layers of errors exist:
//! - [`AppError`] covers run-level problems (configuration, connection, I/O).
//!   Only these can stop the tool.
//! - [`ProfilerError`] is the closed per-item taxonomy. Every failure while
//!   dropping, creating or measuring is converted into one of its variants and
//!   recorded in the report instead of aborting the run.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Run-level error types for the index profiler
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Establishing or verifying the database connection failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Workload file could not be loaded or resolved
    #[error("Workload error: {0}")]
    Workload(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (JSON, numbers, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new workload error
    pub fn workload<S: Into<String>>(message: S) -> Self {
        Self::Workload(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Connection(_) => "CONNECTION",
            Self::Workload(_) => "WORKLOAD",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your .env file or command line arguments.", msg)
            }
            Self::Connection(msg) => {
                format!("Could not reach the database: {}\n\nSuggestion: Verify MONGO_URI, that mongod is running, and that credentials are correct.", msg)
            }
            Self::Workload(msg) => {
                format!("Workload problem: {}\n\nSuggestion: Check the workload JSON file against the documented format.", msg)
            }
            Self::Validation(msg) => {
                format!("Invalid input: {}\n\nSuggestion: Check collection names, index fields and timeout values.", msg)
            }
            Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check file permissions and disk space.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse data: {}\n\nSuggestion: Check the format of your input data or configuration files.", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::Workload(_) => 1,
            Self::Connection(_) => 2,
            Self::Io(_) => 5,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::Workload(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Connection(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(error: mongodb::error::Error) -> Self {
        Self::connection(error.to_string())
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Per-item failure taxonomy.
///
/// None of these abort a run: each is caught at the item boundary and turned
/// into a report entry.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfilerError {
    /// Drop target not found. Informational.
    #[error("index {collection}.{index} is already absent")]
    IndexAlreadyAbsent { collection: String, index: String },

    /// Create target collides with an existing index over an equivalent key
    /// (or reuses a name with a different definition).
    #[error("index {collection}.{index} conflicts with an existing index: {message}")]
    IndexNameConflict {
        collection: String,
        index: String,
        message: String,
    },

    /// An explain was requested for something that is itself an explain
    /// command or an explain result.
    #[error("self-explain not permitted: {context}")]
    SelfExplain { context: String },

    /// A database call exceeded its bound.
    #[error("{operation} timed out after {timeout_ms}ms")]
    MeasurementTimeout { operation: String, timeout_ms: u64 },

    /// Anything else the database reported.
    #[error("{operation} failed: {message}")]
    Unclassified {
        operation: String,
        code: Option<i32>,
        message: String,
    },
}

impl ProfilerError {
    pub fn already_absent(collection: &str, index: &str) -> Self {
        Self::IndexAlreadyAbsent {
            collection: collection.to_string(),
            index: index.to_string(),
        }
    }

    pub fn name_conflict<S: Into<String>>(collection: &str, index: &str, message: S) -> Self {
        Self::IndexNameConflict {
            collection: collection.to_string(),
            index: index.to_string(),
            message: message.into(),
        }
    }

    pub fn self_explain<S: Into<String>>(context: S) -> Self {
        Self::SelfExplain {
            context: context.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S, after: Duration) -> Self {
        Self::MeasurementTimeout {
            operation: operation.into(),
            timeout_ms: after.as_millis() as u64,
        }
    }

    pub fn unclassified<S: Into<String>, M: Into<String>>(operation: S, code: Option<i32>, message: M) -> Self {
        Self::Unclassified {
            operation: operation.into(),
            code,
            message: message.into(),
        }
    }

    /// Stable tag for logging and report notes
    pub fn category(&self) -> &'static str {
        match self {
            Self::IndexAlreadyAbsent { .. } => "ABSENT",
            Self::IndexNameConflict { .. } => "CONFLICT",
            Self::SelfExplain { .. } => "SELF_EXPLAIN",
            Self::MeasurementTimeout { .. } => "TIMEOUT",
            Self::Unclassified { .. } => "UNCLASSIFIED",
        }
    }

    /// Expected outcomes of the lifecycle that are not counted as failures
    /// by callers that only care about hard errors.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::IndexAlreadyAbsent { .. } | Self::IndexNameConflict { .. })
    }

    /// Nothing in the taxonomy is retried: repeating a conflicting create or a
    /// self-explain reproduces the same error.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Result of a single database call as seen by the profiler
pub type ItemResult<T> = std::result::Result<T, ProfilerError>;

/// Error reporter for structured error output and user feedback
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report a fatal error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        if self.verbose {
            eprintln!();
            eprintln!("{}", error.user_friendly_message());
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
