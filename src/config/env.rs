//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Index Profiler Configuration
#
# Values here are used as defaults and can be overridden by command-line
# arguments.

# MongoDB connection string (standalone, replica set or mongodb+srv)
# MONGO_URI=mongodb://localhost:27017/

# Database holding the profiled collections
# MONGO_DB=eduhub_db

# Timeout for each database call in milliseconds (1-600000)
# PROFILER_TIMEOUT_MS=10000

# JSON workload replacing the built-in EduHub indexes and queries
# WORKLOAD_FILE=workload.json

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "MONGO_URI" => {
                let value = value.trim();
                if !value.starts_with("mongodb://") && !value.starts_with("mongodb+srv://") {
                    return Err(AppError::config(format!(
                        "MONGO_URI must start with mongodb:// or mongodb+srv://, got: {}",
                        value
                    )));
                }
            }
            "MONGO_DB" => {
                if value.trim().is_empty() {
                    return Err(AppError::config("MONGO_DB cannot be empty"));
                }
            }
            "PROFILER_TIMEOUT_MS" => {
                let timeout: u64 = value
                    .trim()
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid PROFILER_TIMEOUT_MS value '{}': {}", value, e)))?;
                if timeout == 0 || timeout > crate::defaults::MAX_TIMEOUT_MS {
                    return Err(AppError::config(format!(
                        "PROFILER_TIMEOUT_MS must be between 1 and {}, got: {}",
                        crate::defaults::MAX_TIMEOUT_MS,
                        timeout
                    )));
                }
            }
            "WORKLOAD_FILE" => {
                let path = value.trim();
                if !path.is_empty() && !Path::new(path).exists() {
                    return Err(AppError::config(format!("WORKLOAD_FILE does not exist: {}", path)));
                }
            }
            "ENABLE_COLOR" => {
                value
                    .trim()
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// All supported environment variables with descriptions and examples
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("MONGO_URI", "MongoDB connection string", "mongodb://localhost:27017/"),
            ("MONGO_DB", "Database holding the profiled collections", "eduhub_db"),
            ("PROFILER_TIMEOUT_MS", "Timeout per database call in ms (1-600000)", "10000"),
            ("WORKLOAD_FILE", "JSON workload file", "workload.json"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<20} {}\n", var, description));
            help.push_str(&format!("  {:<20} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::validate_vars(|name| std::env::var(name).ok())
    }

    /// Warnings for every supported variable `lookup` returns a bad value for
    pub fn validate_vars<F>(lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = lookup(name)?;
                Self::validate_env_var(name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Text for `--env-help`: the variable reference followed by an example file
    pub fn env_help_text() -> String {
        let mut help = Self::display_env_help();
        help.push_str("\nExample .env file:\n\n");
        help.push_str(&Self::create_example_env_content());
        help
    }

    /// Handle `--env-help` and `--init-env`. Returns what to print, or
    /// `None` when neither was requested and the profiler should run.
    pub fn handle_env_commands(env_help: bool, init_env: Option<&Path>) -> Result<Option<String>> {
        if let Some(path) = init_env {
            if path.exists() {
                return Err(AppError::config(format!(
                    "Refusing to overwrite existing file {}",
                    path.display()
                )));
            }
            Self::save_example_env_file(path)?;
            return Ok(Some(format!("Wrote example configuration to {}", path.display())));
        }
        if env_help {
            return Ok(Some(Self::env_help_text()));
        }
        Ok(None)
    }
}
