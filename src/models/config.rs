//! Configuration data model and validation

use crate::error::{AppError, Result};
use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// MongoDB connection string
    #[serde(default = "default_mongo_uri")]
    pub mongo_uri: String,

    /// Database holding the profiled collections
    #[serde(default = "default_database")]
    pub database: String,

    /// Bound applied to every individual database call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional JSON workload replacing the built-in EduHub one
    #[serde(default)]
    pub workload_file: Option<String>,

    /// Optional Markdown report destination
    #[serde(default)]
    pub output_file: Option<String>,

    /// Print the report as JSON instead of a table
    #[serde(default)]
    pub json_output: bool,

    /// Run against the in-memory store instead of a live server
    #[serde(default)]
    pub dry_run: bool,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Log line format (console, json, compact)
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: default_mongo_uri(),
            database: default_database(),
            timeout_ms: default_timeout_ms(),
            workload_file: None,
            output_file: None,
            json_output: false,
            dry_run: false,
            enable_color: default_enable_color(),
            log_format: default_log_format(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-call timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed log format
    pub fn log_format(&self) -> Result<LogFormat> {
        LogFormat::from_str(&self.log_format)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.mongo_uri.trim().is_empty() {
            return Err(AppError::config("MongoDB URI cannot be empty"));
        }

        // Host lists (replica sets) are not URL-shaped, so only the scheme is
        // checked here. The driver parses the rest when connecting.
        if !self.mongo_uri.starts_with("mongodb://") && !self.mongo_uri.starts_with("mongodb+srv://") {
            return Err(AppError::config(format!(
                "MongoDB URI must use the mongodb:// or mongodb+srv:// scheme: {}",
                self.mongo_uri
            )));
        }

        if self.database.is_empty() {
            return Err(AppError::config("Database name cannot be empty"));
        }

        if self.database.contains(&['/', '\\', '.', ' ', '"', '$'][..]) {
            return Err(AppError::config(format!("Invalid database name: {}", self.database)));
        }

        if self.timeout_ms == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_ms > crate::defaults::MAX_TIMEOUT_MS {
            return Err(AppError::config(format!(
                "Timeout cannot exceed {}ms",
                crate::defaults::MAX_TIMEOUT_MS
            )));
        }

        self.log_format()?;

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(uri) = std::env::var("MONGO_URI") {
            self.mongo_uri = uri.trim().to_string();
        }

        if let Ok(database) = std::env::var("MONGO_DB") {
            self.database = database.trim().to_string();
        }

        if let Ok(timeout) = std::env::var("PROFILER_TIMEOUT_MS") {
            self.timeout_ms = timeout
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid PROFILER_TIMEOUT_MS value '{}': {}", timeout, e)))?;
        }

        if let Ok(workload) = std::env::var("WORKLOAD_FILE") {
            let workload = workload.trim();
            if !workload.is_empty() {
                self.workload_file = Some(workload.to_string());
            }
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_mongo_uri() -> String {
    crate::defaults::DEFAULT_MONGO_URI.to_string()
}

fn default_database() -> String {
    crate::defaults::DEFAULT_DATABASE.to_string()
}

fn default_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

fn default_log_format() -> String {
    "console".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), crate::defaults::DEFAULT_TIMEOUT);
        assert_eq!(config.database, "eduhub_db");
    }

    #[test]
    fn test_srv_uri_accepted() {
        let mut config = Config::default();
        config.mongo_uri = "mongodb+srv://user:pw@cluster0.example.net/?retryWrites=true".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replica_set_uri_accepted() {
        let mut config = Config::default();
        config.mongo_uri = "mongodb://db1:27017,db2:27017/?replicaSet=rs0".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_mongodb_scheme_invalid() {
        let mut config = Config::default();
        config.mongo_uri = "http://localhost:27017".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_uri_invalid() {
        let mut config = Config::default();
        config.mongo_uri = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_database_name() {
        let mut config = Config::default();
        config.database = "edu.hub".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = Config::default();
        config.timeout_ms = 0;
        assert!(config.validate().is_err());

        config.timeout_ms = crate::defaults::MAX_TIMEOUT_MS + 1;
        assert!(config.validate().is_err());

        config.timeout_ms = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_log_format_invalid() {
        let mut config = Config::default();
        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: Config = serde_json::from_str(r#"{"database": "shop"}"#).unwrap();
        assert_eq!(config.database, "shop");
        assert_eq!(config.mongo_uri, crate::defaults::DEFAULT_MONGO_URI);
        assert_eq!(config.log_format, "console");
    }
}
