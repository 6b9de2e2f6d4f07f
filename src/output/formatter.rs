//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    models::{IndexOutcome, IndexStatus},
    report::{ComparisonReport, ComparisonRow},
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the run summary (session, stages, counts)
    fn format_run_summary(&self, report: &ComparisonReport) -> Result<String>;

    /// Format the before/after comparison as a table
    fn format_comparison_table(&self, rows: &[ComparisonRow]) -> Result<String>;

    /// Format the outcomes of one index step
    fn format_index_outcomes(&self, title: &str, outcomes: &[IndexOutcome]) -> Result<String>;

    /// Format failures, regressions and interruption notes
    fn format_notes(&self, notes: &[String]) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;

    /// Format the complete report
    fn format_report(&self, report: &ComparisonReport) -> Result<String> {
        let mut output = String::new();
        output.push_str(&self.format_header("Index Performance Report")?);
        output.push_str("\n\n");
        output.push_str(&self.format_run_summary(report)?);
        output.push_str("\n\n");
        output.push_str(&self.format_comparison_table(&report.rows)?);
        output.push_str("\n\n");
        if !report.drop_outcomes.is_empty() {
            output.push_str(&self.format_index_outcomes("Dropped Indexes", &report.drop_outcomes)?);
            output.push_str("\n\n");
        }
        if !report.create_outcomes.is_empty() {
            output.push_str(&self.format_index_outcomes("Created Indexes", &report.create_outcomes)?);
            output.push_str("\n\n");
        }
        output.push_str(&self.format_notes(&report.notes)?);
        Ok(output)
    }
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show plan details (access stage before/after) in the table
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Maximum cell width
    pub max_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_width: 40,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Show borders around table
    pub show_borders: bool,
    /// Show header row
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    /// Column header
    pub header: String,
    /// Column alignment
    pub alignment: Alignment,
    /// Minimum width
    pub min_width: usize,
    /// Maximum width
    pub max_width: usize,
}

impl Column {
    pub fn left(header: &str, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment: Alignment::Left,
            min_width: 4,
            max_width,
        }
    }

    pub fn right(header: &str, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment: Alignment::Right,
            min_width: 4,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Format a millisecond value, or `n/a` when it was never measured
pub fn format_ms(value: Option<f64>) -> String {
    match value {
        Some(ms) if ms >= 1000.0 => format!("{:.2}s", ms / 1000.0),
        Some(ms) => format!("{:.2}ms", ms),
        None => "n/a".to_string(),
    }
}

/// Comparison table layout shared by the plain and colored formatters
pub(crate) fn comparison_table(rows: &[ComparisonRow], options: &FormattingOptions) -> (TableFormat, Vec<RowData>) {
    let mut columns = vec![
        Column::left("Query", options.max_width),
        Column::left("Collection", options.max_width),
        Column::right("Client before", 14),
        Column::right("Client after", 14),
        Column::right("Client gain", 16),
        Column::right("Server before", 14),
        Column::right("Server after", 14),
        Column::right("Server gain", 16),
    ];
    if options.verbose_mode {
        columns.push(Column::left("Plan before", 12));
        columns.push(Column::left("Plan after", 12));
    }

    let data = rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.label.clone(),
                row.collection.clone(),
                format_ms(row.client_before_ms),
                format_ms(row.client_after_ms),
                row.client_improvement.to_string(),
                format_ms(row.server_before_ms),
                format_ms(row.server_after_ms),
                row.server_improvement.to_string(),
            ];
            if options.verbose_mode {
                cells.push(row.plan_before.clone().unwrap_or_else(|| "-".to_string()));
                cells.push(row.plan_after.clone().unwrap_or_else(|| "-".to_string()));
            }
            cells
        })
        .collect();

    (
        TableFormat {
            columns,
            show_borders: options.table_borders,
            show_header: true,
        },
        data,
    )
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Render a table. `paint` receives the column index, the raw cell text
    /// and the padded cell, and returns what is written.
    pub(crate) fn create_table<F>(&self, format: &TableFormat, rows: &[RowData], paint: F) -> String
    where
        F: Fn(usize, &str, String) -> String,
    {
        let widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&widths));
                output.push('\n');
            }
            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &widths, format, |_, _, padded| padded));
            output.push('\n');
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&self.create_row(row, &widths, format, &paint));
            output.push('\n');
        }

        if format.show_borders && (!rows.is_empty() || format.show_header) {
            output.push_str(&self.create_horizontal_border(&widths));
        }

        output.trim_end_matches('\n').to_string()
    }

    /// Calculate column widths from headers and content
    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format
            .columns
            .len()
            .max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|col_idx| {
                let column = format.columns.get(col_idx);
                let mut width = column
                    .map(|c| c.min_width.max(c.header.chars().count()))
                    .unwrap_or(4);
                for row in rows {
                    if let Some(cell) = row.get(col_idx) {
                        width = width.max(cell.chars().count());
                    }
                }
                match column {
                    Some(c) => width.min(c.max_width.max(c.header.chars().count())),
                    None => width.min(self.options.max_width),
                }
            })
            .collect()
    }

    /// Create a table row
    fn create_row<F>(&self, data: &[String], widths: &[usize], format: &TableFormat, paint: F) -> String
    where
        F: Fn(usize, &str, String) -> String,
    {
        let mut row = String::new();
        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format
                .columns
                .get(idx)
                .map(|c| &c.alignment)
                .unwrap_or(&Alignment::Left);
            let padded = paint(idx, cell, self.align_text(cell, width, alignment));

            if format.show_borders {
                row.push(' ');
                row.push_str(&padded);
                row.push_str(" |");
            } else {
                row.push_str(&padded);
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    /// Create horizontal border for table
    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::new();
        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }
        border
    }

    /// Align text within specified width, truncating on char boundaries
    fn align_text(&self, text: &str, width: usize, alignment: &Alignment) -> String {
        let len = text.chars().count();
        if len >= width {
            return text.chars().take(width).collect();
        }

        let padding = width - len;
        match alignment {
            Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
            Alignment::Right => format!("{}{}", " ".repeat(padding), text),
            Alignment::Center => {
                let left_pad = padding / 2;
                let right_pad = padding - left_pad;
                format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
            }
        }
    }

    pub(crate) fn options(&self) -> &FormattingOptions {
        &self.options
    }
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.chars().count() + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_run_summary(&self, report: &ComparisonReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Run Summary:").map_err(fmt_err)?;
        writeln!(output, "------------").map_err(fmt_err)?;
        if let Some(session) = &report.session_id {
            writeln!(output, "Session:          {}", session).map_err(fmt_err)?;
        }
        writeln!(
            output,
            "Generated:        {}",
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .map_err(fmt_err)?;
        let stages: Vec<&str> = report.completed_stages.iter().map(|s| s.as_str()).collect();
        writeln!(output, "Completed stages: {}", if stages.is_empty() { "none".to_string() } else { stages.join(" -> ") })
            .map_err(fmt_err)?;
        writeln!(output, "Queries profiled: {}", report.rows.len()).map_err(fmt_err)?;
        write!(output, "Failures:         {}", report.failures.len()).map_err(fmt_err)?;
        if report.interrupted {
            write!(output, "\nStatus:           INTERRUPTED").map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_comparison_table(&self, rows: &[ComparisonRow]) -> Result<String> {
        if rows.is_empty() {
            return Ok("No query results recorded.".to_string());
        }
        let (format, data) = comparison_table(rows, &self.options);
        Ok(self.create_table(&format, &data, |_, _, padded| padded))
    }

    fn format_index_outcomes(&self, title: &str, outcomes: &[IndexOutcome]) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "{}:", title).map_err(fmt_err)?;
        for (i, outcome) in outcomes.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            write!(
                output,
                "  {}.{} ({}): {}",
                outcome.collection,
                outcome.index,
                outcome.keys,
                outcome.status.as_str()
            )
            .map_err(fmt_err)?;
            if outcome.status == IndexStatus::Failed || outcome.status == IndexStatus::SkippedConflict {
                if let Some(err) = &outcome.error {
                    write!(output, " - {}", err).map_err(fmt_err)?;
                }
            }
        }
        Ok(output)
    }

    fn format_notes(&self, notes: &[String]) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "Notes:").map_err(fmt_err)?;
        if notes.is_empty() {
            write!(output, "  none").map_err(fmt_err)?;
        }
        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            write!(output, "  - {}", note).map_err(fmt_err)?;
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}
