//! Markdown rendering of a comparison report, for `--output report.md`

use super::formatter::format_ms;
use crate::{
    error::{AppError, Result},
    models::IndexOutcome,
    report::ComparisonReport,
};
use std::fmt::Write as _;
use std::path::Path;

/// Escape characters that would break a Markdown table cell
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn outcome_table(output: &mut String, title: &str, outcomes: &[IndexOutcome]) -> std::fmt::Result {
    writeln!(output, "## {}\n", title)?;
    writeln!(output, "| Collection | Index | Keys | Status | Detail |")?;
    writeln!(output, "|---|---|---|---|---|")?;
    for outcome in outcomes {
        let detail = match (&outcome.error, outcome.is_failure()) {
            (Some(err), true) => cell(&err.to_string()),
            _ => String::new(),
        };
        writeln!(
            output,
            "| {} | `{}` | {} | {} | {} |",
            cell(&outcome.collection),
            cell(&outcome.index),
            cell(&outcome.keys),
            outcome.status.as_str(),
            detail
        )?;
    }
    writeln!(output)
}

/// Render the report as a Markdown document
pub fn render_markdown(report: &ComparisonReport) -> Result<String> {
    render(report).map_err(|e| AppError::io(format!("Failed to render Markdown report: {}", e)))
}

fn render(report: &ComparisonReport) -> std::result::Result<String, std::fmt::Error> {
    let mut output = String::new();

    writeln!(output, "# Indexing & Query Performance Summary\n")?;
    writeln!(
        output,
        "Generated {}{}.\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report
            .session_id
            .as_deref()
            .map(|s| format!(" (session `{}`)", s))
            .unwrap_or_default()
    )?;
    if report.interrupted {
        writeln!(output, "> **Run interrupted.** Values never measured are marked n/a.\n")?;
    }

    writeln!(output, "## Query Timings\n")?;
    writeln!(
        output,
        "| Query | Collection | Client Before | Client After | Client Improvement | Server Before | Server After | Server Improvement | Plan |"
    )?;
    writeln!(output, "|---|---|---:|---:|---:|---:|---:|---:|---|")?;
    for row in &report.rows {
        let plan = match (&row.plan_before, &row.plan_after) {
            (Some(before), Some(after)) => format!("{} → {}", before, after),
            (Some(before), None) => before.clone(),
            (None, Some(after)) => format!("? → {}", after),
            (None, None) => "-".to_string(),
        };
        writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            cell(&row.label),
            cell(&row.collection),
            format_ms(row.client_before_ms),
            format_ms(row.client_after_ms),
            row.client_improvement,
            format_ms(row.server_before_ms),
            format_ms(row.server_after_ms),
            row.server_improvement,
            plan
        )?;
    }
    writeln!(output)?;
    writeln!(
        output,
        "Improvement is `(before - after) / before × 100`. Negative values mean the query got slower."
    )?;
    writeln!(output)?;

    if !report.drop_outcomes.is_empty() {
        outcome_table(&mut output, "Dropped Indexes", &report.drop_outcomes)?;
    }
    if !report.create_outcomes.is_empty() {
        outcome_table(&mut output, "Created Indexes", &report.create_outcomes)?;
    }

    writeln!(output, "## Notes\n")?;
    if report.notes.is_empty() {
        writeln!(output, "No failures recorded.")?;
    }
    for note in &report.notes {
        writeln!(output, "- {}", note)?;
    }

    Ok(output)
}

/// Write the Markdown report to `path`
pub fn write_markdown(report: &ComparisonReport, path: &Path) -> Result<()> {
    let content = render_markdown(report)?;
    std::fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write report to {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProfilerError;
    use crate::models::{FailureNote, IndexStatus, Phase, Stage, TimingResult};
    use crate::report::compare_and_report;
    use tempfile::tempdir;

    fn report() -> ComparisonReport {
        let before = vec![TimingResult {
            client_ms: Some(8.0),
            server_ms: Some(4.0),
            ..TimingResult::missing("Enrollments by User", "enrollments", Phase::Before)
        }];
        let after = vec![TimingResult {
            client_ms: Some(2.0),
            server_ms: Some(0.0),
            ..TimingResult::missing("Enrollments by User", "enrollments", Phase::After)
        }];
        let failures = vec![FailureNote {
            stage: Stage::CreateIndexes,
            subject: "users.idx_users_email".to_string(),
            error: ProfilerError::name_conflict("users", "idx_users_email", "Index already exists with a different name: email_1"),
        }];
        let mut report = compare_and_report(&before, &after, &failures);
        report.create_outcomes = vec![IndexOutcome {
            stage: Stage::CreateIndexes,
            collection: "users".to_string(),
            index: "idx_users_email".to_string(),
            keys: "email:1".to_string(),
            status: IndexStatus::SkippedConflict,
            error: Some(failures[0].error.clone()),
        }];
        report
    }

    #[test]
    fn test_markdown_sections() {
        let text = render_markdown(&report()).unwrap();
        assert!(text.starts_with("# Indexing & Query Performance Summary"));
        assert!(text.contains("| Enrollments by User | enrollments | 8.00ms | 2.00ms | 75.0% | 4.00ms | 0.00ms | 100.0% |"));
        assert!(text.contains("## Created Indexes"));
        assert!(text.contains("skipped (conflict)"));
        assert!(text.contains("- [create] users.idx_users_email (CONFLICT)"));
    }

    #[test]
    fn test_cells_are_escaped() {
        assert_eq!(cell("a|b\nc"), "a\\|b c");
    }

    #[test]
    fn test_write_markdown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.md");
        write_markdown(&report(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("## Notes"));

        let missing = dir.path().join("no/such/dir/report.md");
        assert!(matches!(write_markdown(&report(), &missing), Err(AppError::Io(_))));
    }
}
