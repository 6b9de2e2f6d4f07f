//! Index Profiler - Main CLI Application
//!
//! Drops the configured indexes, profiles the workload queries, recreates the
//! indexes, profiles again and reports the before/after comparison.

use clap::Parser;
use index_profiler::{
    app::App,
    cli::Cli,
    config::EnvManager,
    error::{AppError, ErrorReporter},
};
use std::path::Path;
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let use_color = cli.use_colors();
    let verbose = cli.verbose || cli.debug;

    match EnvManager::handle_env_commands(cli.env_help, cli.init_env.as_deref().map(Path::new)) {
        Ok(Some(message)) => {
            println!("{}", message);
            return;
        }
        Ok(None) => {}
        Err(e) => fail(&e, use_color, verbose),
    }

    let app = match App::from_cli(cli).await {
        Ok(app) => app,
        Err(e) => fail(&e, use_color, verbose),
    };

    let reporter = ErrorReporter::new(app.config().enable_color, app.config().verbose);
    match app.run().await {
        Ok(summary) => process::exit(summary.exit_code()),
        Err(e) => {
            reporter.report_error(&e);
            print_error_suggestions(&e);
            process::exit(e.exit_code());
        }
    }
}

fn fail(error: &AppError, use_color: bool, verbose: bool) -> ! {
    ErrorReporter::new(use_color, verbose).report_error(error);
    print_error_suggestions(error);
    process::exit(error.exit_code());
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format");
            eprintln!("  - MONGO_URI must start with mongodb:// or mongodb+srv://");
            eprintln!("  - PROFILER_TIMEOUT_MS must be between 1 and 600000");
        }
        AppError::Connection(_) => {
            eprintln!();
            eprintln!("Connection troubleshooting:");
            eprintln!("  - Check that the MongoDB server is running and reachable");
            eprintln!("  - Verify credentials and authSource in the connection string");
            eprintln!("  - Raise --timeout-ms for slow networks");
            eprintln!("  - Use --dry-run to try the tool without a server");
        }
        AppError::Workload(_) => {
            eprintln!();
            eprintln!("Workload help:");
            eprintln!("  - The file needs \"indexes\" and \"queries\" arrays");
            eprintln!("  - Query types are find, aggregate and due_within");
            eprintln!("  - Labels and index names must be unique");
        }
        _ => {}
    }
}
