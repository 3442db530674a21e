//! Summary report types and markdown rendering.
//!
//! The report renders as markdown through `Display`, so the same text can be
//! printed by the CLI and written into a dataset card.

use serde::Serialize;
use std::fmt;

/// Summary of one table.
#[derive(Clone, Debug, Serialize)]
pub struct TableSummary {
    /// Heading of the rendered document, usually the repository id.
    pub title: String,
    pub rows: usize,
    pub columns: usize,
    /// Estimated in-memory size of all cells, in bytes.
    pub memory_bytes: usize,
    pub duplicates: DuplicateStats,
    /// One entry per column, in table order.
    pub column_stats: Vec<ColumnStats>,
    /// Per-column value summaries.
    pub details: Vec<ColumnDetail>,
    pub sample: SampleRows,
}

/// Duplicate-row statistics over a bounded prefix of the table.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DuplicateStats {
    /// Number of rows that were compared.
    pub scanned: usize,
    /// Rows equal to an earlier scanned row.
    pub count: usize,
}

impl DuplicateStats {
    pub fn rate(&self) -> f64 {
        if self.scanned == 0 {
            0.0
        } else {
            self.count as f64 / self.scanned as f64 * 100.0
        }
    }
}

/// Type, size and missing-value statistics for one column.
#[derive(Clone, Debug, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub dtype: &'static str,
    pub memory_bytes: usize,
    pub missing: usize,
    pub missing_rate: f64,
}

/// Value summary for one column.
#[derive(Clone, Debug, Serialize)]
pub struct ColumnDetail {
    pub name: String,
    pub dtype: &'static str,
    pub values: ValueSummary,
}

/// Shape-specific value statistics.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueSummary {
    Numeric {
        min: f64,
        max: f64,
        mean: f64,
        std: f64,
    },
    Bool {
        true_count: usize,
        false_count: usize,
    },
    List {
        mean_len: f64,
        min_len: usize,
        max_len: usize,
    },
    Categorical {
        unique: usize,
        /// Present when there are few enough distinct values to list.
        frequencies: Option<Vec<(String, usize)>>,
    },
    /// Every cell is null.
    Empty,
}

/// Leading rows rendered as truncated strings.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SampleRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl fmt::Display for TableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Dataset Summary: {}", self.title)?;
        writeln!(f)?;
        self.fmt_overview(f)?;
        writeln!(f)?;
        self.fmt_column_table(f)?;
        writeln!(f)?;
        self.fmt_details(f)?;
        writeln!(f)?;
        self.fmt_sample(f)
    }
}

impl TableSummary {
    fn fmt_overview(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- **Shape:** {} rows × {} columns",
            format_number(self.rows),
            format_number(self.columns)
        )?;
        writeln!(f, "- **Memory:** {}", human_bytes(self.memory_bytes))?;
        writeln!(
            f,
            "- **Duplicate rows:** {} ({:.2}% of the first {} rows)",
            format_number(self.duplicates.count),
            self.duplicates.rate(),
            format_number(self.duplicates.scanned)
        )
    }

    fn fmt_column_table(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "| Column | Dtype | Memory Usage | Missing Count | Missing Rate |"
        )?;
        writeln!(f, "|---|---|---|---|---|")?;

        let mut total_memory = 0;
        let mut total_missing = 0;
        for column in &self.column_stats {
            total_memory += column.memory_bytes;
            total_missing += column.missing;
            writeln!(
                f,
                "| {} | {} | {} | {} | {:.2}% |",
                escape_cell(&column.name),
                column.dtype,
                human_bytes(column.memory_bytes),
                format_number(column.missing),
                column.missing_rate
            )?;
        }

        let cells = self.rows * self.columns;
        let total_rate = if cells == 0 {
            0.0
        } else {
            total_missing as f64 / cells as f64 * 100.0
        };
        writeln!(
            f,
            "| **TOTAL** | | {} | {} | {:.2}% |",
            human_bytes(total_memory),
            format_number(total_missing),
            total_rate
        )
    }

    fn fmt_details(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Column Summaries")?;
        for detail in &self.details {
            writeln!(f)?;
            writeln!(f, "→ **{}** ({})", detail.name, detail.dtype)?;
            match &detail.values {
                ValueSummary::Numeric {
                    min,
                    max,
                    mean,
                    std,
                } => {
                    writeln!(
                        f,
                        "- Min: {min:.3}, Max: {max:.3}, Mean: {mean:.3}, Std: {std:.3}"
                    )?;
                }
                ValueSummary::Bool {
                    true_count,
                    false_count,
                } => {
                    let total = true_count + false_count;
                    writeln!(
                        f,
                        "- True: {} ({}), False: {} ({})",
                        format_number(*true_count),
                        fmt_percent(*true_count, total),
                        format_number(*false_count),
                        fmt_percent(*false_count, total)
                    )?;
                }
                ValueSummary::List {
                    mean_len,
                    min_len,
                    max_len,
                } => {
                    writeln!(
                        f,
                        "- Typical length: {mean_len:.1} (min {min_len}, max {max_len})"
                    )?;
                }
                ValueSummary::Categorical {
                    unique,
                    frequencies,
                } => {
                    writeln!(f, "- Unique values: {}", format_number(*unique))?;
                    if let Some(frequencies) = frequencies {
                        for (value, count) in frequencies {
                            writeln!(f, "  - `{}`: {}", value, format_number(*count))?;
                        }
                    }
                }
                ValueSummary::Empty => writeln!(f, "- All values missing")?,
            }
        }
        Ok(())
    }

    fn fmt_sample(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Sample Rows")?;
        writeln!(f)?;
        if self.sample.columns.is_empty() {
            return writeln!(f, "_No columns._");
        }

        let header: Vec<String> = self.sample.columns.iter().map(|c| escape_cell(c)).collect();
        writeln!(f, "| {} |", header.join(" | "))?;
        writeln!(f, "|{}", "---|".repeat(header.len()))?;
        for row in &self.sample.rows {
            let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
            writeln!(f, "| {} |", cells.join(" | "))?;
        }
        Ok(())
    }
}

/// Format a number with thousands separators.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
    }
}

/// `1536` → `1.50 KB`.
pub fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
