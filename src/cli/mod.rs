//! Command-line interface

use clap::Parser;

/// Index profiler - measures query performance before and after creating indexes
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "idxprof")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// MongoDB connection string (overrides MONGO_URI)
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// Database holding the profiled collections (overrides MONGO_DB)
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Timeout for each database call in milliseconds (overrides PROFILER_TIMEOUT_MS)
    #[arg(long, value_name = "MS", value_parser = parse_timeout_ms)]
    pub timeout_ms: Option<u64>,

    /// JSON file with index specs and query cases (overrides WORKLOAD_FILE)
    #[arg(long, value_name = "FILE")]
    pub workload: Option<String>,

    /// Also write the report as Markdown to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Profile against a seeded in-memory store instead of a live server
    #[arg(long)]
    pub dry_run: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Log line format: console, json or compact
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Describe the supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,

    /// Write an example .env file to FILE and exit
    #[arg(long, value_name = "FILE")]
    pub init_env: Option<String>,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Some(path) = &self.output {
            if path.trim().is_empty() {
                return Err("--output needs a file path".to_string());
            }
        }

        Ok(())
    }

    /// Explicit color choice, if any flag was given
    pub fn color_override(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        self.color_override().unwrap_or_else(supports_color)
    }
}

/// Parse a per-call timeout in milliseconds
fn parse_timeout_ms(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid timeout: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid timeout: {}", s))
        .and_then(|ms| {
            if ms == 0 {
                Err("Timeout must be greater than 0".to_string())
            } else if ms > crate::defaults::MAX_TIMEOUT_MS {
                Err(format!(
                    "Timeout cannot exceed {} milliseconds",
                    crate::defaults::MAX_TIMEOUT_MS
                ))
            } else {
                Ok(ms)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}
