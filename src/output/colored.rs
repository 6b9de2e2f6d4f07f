//! Colored formatter implementation with terminal color support
//!
//! Wraps the plain formatter's layout and paints it: improvements green,
//! regressions red, unmeasured values yellow.

use super::formatter::{comparison_table, FormattingOptions, OutputFormatter, PlainFormatter};
use crate::{
    error::Result,
    models::{IndexOutcome, IndexStatus},
    report::{ComparisonReport, ComparisonRow},
};
use colored::*;

/// Classification of an improvement cell for color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeLevel {
    /// Faster by at least half
    Large,
    Improved,
    Unchanged,
    Regressed,
    Unknown,
}

impl ChangeLevel {
    /// Classify a rendered improvement cell (`"50.0%"`, `"not calculable"`)
    pub fn from_cell(cell: &str) -> Self {
        match cell.trim().trim_end_matches('%').parse::<f64>() {
            Ok(p) if p >= 50.0 => Self::Large,
            Ok(p) if p > 0.0 => Self::Improved,
            Ok(p) if p < 0.0 => Self::Regressed,
            Ok(_) => Self::Unchanged,
            Err(_) => Self::Unknown,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Large => Color::Green,
            Self::Improved => Color::Cyan,
            Self::Unchanged => Color::White,
            Self::Regressed => Color::Red,
            Self::Unknown => Color::Yellow,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options),
            color_scheme,
        }
    }

    fn enabled(&self) -> bool {
        self.plain_formatter.options().enable_color
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.enabled() {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Apply bold formatting if colors are enabled
    fn bold(&self, text: &str) -> ColoredString {
        if self.enabled() {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn status_color(&self, status: IndexStatus) -> Color {
        match status {
            IndexStatus::Dropped | IndexStatus::Created => self.color_scheme.success,
            IndexStatus::AlreadyAbsent => self.color_scheme.muted,
            IndexStatus::SkippedConflict => self.color_scheme.warning,
            IndexStatus::Failed => self.color_scheme.error,
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "=".repeat(title.chars().count() + 4);
        Ok(format!(
            "{}\n  {}  \n{}",
            self.colorize(&border, self.color_scheme.header),
            self.bold(title),
            self.colorize(&border, self.color_scheme.header)
        ))
    }

    fn format_run_summary(&self, report: &ComparisonReport) -> Result<String> {
        let summary = self.plain_formatter.format_run_summary(report)?;
        let mut lines = Vec::new();
        for line in summary.lines() {
            let painted = if line.starts_with("Run Summary") {
                self.bold(line).to_string()
            } else if line.starts_with("Status:") {
                self.colorize(line, self.color_scheme.error).to_string()
            } else if line.starts_with("Failures:") && report.has_failures() {
                self.colorize(line, self.color_scheme.warning).to_string()
            } else {
                line.to_string()
            };
            lines.push(painted);
        }
        Ok(lines.join("\n"))
    }

    fn format_comparison_table(&self, rows: &[ComparisonRow]) -> Result<String> {
        if rows.is_empty() {
            return Ok(self
                .colorize("No query results recorded.", self.color_scheme.warning)
                .to_string());
        }
        let (format, data) = comparison_table(rows, self.plain_formatter.options());
        let table = self.plain_formatter.create_table(&format, &data, |column, raw, padded| {
            match column {
                4 | 7 => self.colorize(&padded, ChangeLevel::from_cell(raw).color()).to_string(),
                2 | 3 | 5 | 6 if raw == "n/a" => self.colorize(&padded, self.color_scheme.warning).to_string(),
                0 => self.bold(&padded).to_string(),
                _ => padded,
            }
        });
        Ok(table)
    }

    fn format_index_outcomes(&self, title: &str, outcomes: &[IndexOutcome]) -> Result<String> {
        let mut lines = vec![format!("{}:", self.bold(title))];
        for outcome in outcomes {
            let mut line = format!(
                "  {}.{} ({}): {}",
                outcome.collection,
                outcome.index,
                self.colorize(&outcome.keys, self.color_scheme.muted),
                self.colorize(outcome.status.as_str(), self.status_color(outcome.status))
            );
            if outcome.is_failure() {
                if let Some(err) = &outcome.error {
                    line.push_str(&format!(" - {}", err));
                }
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    fn format_notes(&self, notes: &[String]) -> Result<String> {
        let mut lines = vec![format!("{}:", self.bold("Notes"))];
        if notes.is_empty() {
            lines.push(format!("  {}", self.colorize("none", self.color_scheme.success)));
        }
        for note in notes {
            let color = if note.contains("got slower") || note.starts_with("Run interrupted") {
                self.color_scheme.warning
            } else {
                self.color_scheme.error
            };
            lines.push(format!("  {} {}", self.colorize("-", color), note));
        }
        Ok(lines.join("\n"))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("ERROR:", self.color_scheme.error), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("WARNING:", self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("SUCCESS:", self.color_scheme.success), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Phase, TimingResult};
    use crate::report::compare_and_report;

    fn report() -> ComparisonReport {
        let before = vec![
            TimingResult {
                client_ms: Some(10.0),
                server_ms: Some(4.0),
                ..TimingResult::missing("Courses by Category", "courses", Phase::Before)
            },
            TimingResult {
                client_ms: Some(2.0),
                server_ms: Some(2.0),
                ..TimingResult::missing("Assignments Due Soon", "assignments", Phase::Before)
            },
        ];
        let after = vec![
            TimingResult {
                client_ms: Some(5.0),
                server_ms: Some(1.0),
                ..TimingResult::missing("Courses by Category", "courses", Phase::After)
            },
            TimingResult {
                client_ms: Some(3.0),
                server_ms: Some(3.0),
                ..TimingResult::missing("Assignments Due Soon", "assignments", Phase::After)
            },
        ];
        compare_and_report(&before, &after, &[])
    }

    #[test]
    fn test_change_level_classification() {
        assert_eq!(ChangeLevel::from_cell("75.0%"), ChangeLevel::Large);
        assert_eq!(ChangeLevel::from_cell("  12.5%"), ChangeLevel::Improved);
        assert_eq!(ChangeLevel::from_cell("0.0%"), ChangeLevel::Unchanged);
        assert_eq!(ChangeLevel::from_cell("-50.0%"), ChangeLevel::Regressed);
        assert_eq!(ChangeLevel::from_cell("not calculable"), ChangeLevel::Unknown);
    }

    #[test]
    fn test_disabled_colors_match_plain_layout() {
        let options = FormattingOptions {
            enable_color: false,
            ..FormattingOptions::default()
        };
        let colored = ColoredFormatter::new(options.clone());
        let plain = PlainFormatter::new(options);

        let rows = report().rows;
        assert_eq!(
            colored.format_comparison_table(&rows).unwrap(),
            plain.format_comparison_table(&rows).unwrap()
        );
    }

    #[test]
    fn test_notes_include_regression() {
        colored::control::set_override(false);
        let formatter = ColoredFormatter::new(FormattingOptions::default());
        let text = formatter.format_notes(&report().notes).unwrap();
        assert!(text.contains("'Assignments Due Soon' got slower after indexing"));
        colored::control::unset_override();
    }
}
