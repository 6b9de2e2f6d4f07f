//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        for warning in self.env_warnings() {
            eprintln!("{}", warning);
        }
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Problems with the environment worth mentioning under --verbose or --debug
    pub fn env_warnings(&self) -> Vec<String> {
        if self.cli.verbose || self.cli.debug {
            EnvManager::validate_current_env()
        } else {
            Vec::new()
        }
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) {
        if let Some(uri) = &self.cli.uri {
            config.mongo_uri = uri.trim().to_string();
        }
        if let Some(database) = &self.cli.database {
            config.database = database.trim().to_string();
        }
        if let Some(timeout_ms) = self.cli.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(workload) = &self.cli.workload {
            config.workload_file = Some(workload.clone());
        }
        if let Some(output) = &self.cli.output {
            config.output_file = Some(output.clone());
        }
        if let Some(log_format) = &self.cli.log_format {
            config.log_format = log_format.clone();
        }
        if let Some(color) = self.cli.color_override() {
            config.enable_color = color;
        }

        // CLI-only switches
        config.json_output = self.cli.json;
        config.dry_run = self.cli.dry_run;
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!(
                "Final config: database={}, timeout={}ms, dry_run={}, enable_color={}",
                config.database, config.timeout_ms, config.dry_run, config.enable_color
            );
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Configuration summary for debug output. Credentials in the URI are masked.
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("MongoDB URI: {}", mask_credentials(&config.mongo_uri)));
    summary.push(format!("Database: {}", config.database));
    summary.push(format!("Timeout: {}ms", config.timeout_ms));
    summary.push(format!(
        "Workload: {}",
        config.workload_file.as_deref().unwrap_or("built-in (EduHub)")
    ));
    if let Some(output) = &config.output_file {
        summary.push(format!("Markdown report: {}", output));
    }
    summary.push(format!("Dry run: {}", config.dry_run));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

/// Replace the password part of `user:password@host` with `***`
fn mask_credentials(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    match rest.rsplit_once('@') {
        Some((userinfo, hosts)) => {
            let user = userinfo.split(':').next().unwrap_or_default();
            format!("{}://{}:***@{}", scheme, user, hosts)
        }
        None => uri.to_string(),
    }
}
