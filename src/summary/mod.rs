//! Table summaries.
//!
//! Produces the statistics written into a hub dataset card and printed by
//! `anyload peek`: shape, memory estimate, duplicates, per-column missing
//! values, per-column value summaries and a few sample rows.

mod report;

pub use report::{
    human_bytes, ColumnDetail, ColumnStats, DuplicateStats, SampleRows, TableSummary,
    ValueSummary,
};

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::payload::Table;

/// Options for table summaries.
#[derive(Clone, Debug)]
pub struct SummaryOptions {
    /// Only this many leading rows are checked for duplicates.
    pub duplicate_scan_rows: usize,
    /// Columns with at most this many distinct values list their frequencies.
    pub max_listed_values: usize,
    pub sample_rows: usize,
    /// Sample cells longer than this are truncated.
    pub max_cell_chars: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            duplicate_scan_rows: 200_000,
            max_listed_values: 20,
            sample_rows: 3,
            max_cell_chars: 50,
        }
    }
}

/// Compute a summary of `table`.
pub fn summarize_table(title: &str, table: &Table, opts: &SummaryOptions) -> TableSummary {
    let rows = table.num_rows();
    let mut column_stats = Vec::with_capacity(table.num_columns());
    let mut details = Vec::with_capacity(table.num_columns());

    for (idx, name) in table.columns().iter().enumerate() {
        let cells: Vec<&Value> = table.rows().iter().map(|row| &row[idx]).collect();
        let dtype = column_dtype(&cells);
        let missing = cells.iter().filter(|cell| cell.is_null()).count();

        column_stats.push(ColumnStats {
            name: name.clone(),
            dtype,
            memory_bytes: cells.iter().map(|cell| cell_memory(cell)).sum(),
            missing,
            missing_rate: if rows == 0 {
                0.0
            } else {
                missing as f64 / rows as f64 * 100.0
            },
        });
        details.push(ColumnDetail {
            name: name.clone(),
            dtype,
            values: summarize_values(dtype, &cells, opts.max_listed_values),
        });
    }

    TableSummary {
        title: title.to_string(),
        rows,
        columns: table.num_columns(),
        memory_bytes: column_stats.iter().map(|c| c.memory_bytes).sum(),
        duplicates: count_duplicates(table, opts.duplicate_scan_rows),
        column_stats,
        details,
        sample: sample_rows(table, opts.sample_rows, opts.max_cell_chars),
    }
}

fn column_dtype(cells: &[&Value]) -> &'static str {
    let mut seen: Option<&'static str> = None;
    for cell in cells {
        let dtype = match cell {
            Value::Null => continue,
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_i64() || n.is_u64() => "int64",
            Value::Number(_) => "float64",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "object",
        };
        seen = Some(match (seen, dtype) {
            (None, next) => next,
            (Some(current), next) if current == next => current,
            (Some("int64"), "float64") | (Some("float64"), "int64") => "float64",
            _ => return "mixed",
        });
    }
    seen.unwrap_or("null")
}

/// Rough per-cell footprint: fixed 8 bytes for scalars, payload plus a
/// 24-byte header for strings and nested values.
fn cell_memory(cell: &Value) -> usize {
    match cell {
        Value::Null | Value::Bool(_) | Value::Number(_) => 8,
        Value::String(text) => 24 + text.len(),
        nested => 24 + nested.to_string().len(),
    }
}

fn summarize_values(dtype: &str, cells: &[&Value], max_listed: usize) -> ValueSummary {
    let present: Vec<&Value> = cells.iter().copied().filter(|c| !c.is_null()).collect();
    if present.is_empty() {
        return ValueSummary::Empty;
    }

    match dtype {
        "int64" | "float64" => {
            let values: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
            numeric_summary(&values)
        }
        "bool" => {
            let true_count = present.iter().filter(|v| v.as_bool() == Some(true)).count();
            ValueSummary::Bool {
                true_count,
                false_count: present.len() - true_count,
            }
        }
        "list" => {
            let lengths: Vec<usize> = present
                .iter()
                .filter_map(|v| v.as_array().map(Vec::len))
                .collect();
            ValueSummary::List {
                mean_len: lengths.iter().sum::<usize>() as f64 / lengths.len() as f64,
                min_len: lengths.iter().copied().min().unwrap_or(0),
                max_len: lengths.iter().copied().max().unwrap_or(0),
            }
        }
        _ => {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for value in &present {
                *counts.entry(display_value(value)).or_default() += 1;
            }
            let unique = counts.len();
            let frequencies = (unique <= max_listed).then(|| {
                let mut listed: Vec<(String, usize)> = counts.into_iter().collect();
                listed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                listed
            });
            ValueSummary::Categorical {
                unique,
                frequencies,
            }
        }
    }
}

fn numeric_summary(values: &[f64]) -> ValueSummary {
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    // Sample standard deviation; a single value has none.
    let std = if values.len() > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1.0)).sqrt()
    } else {
        0.0
    };
    ValueSummary::Numeric {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean,
        std,
    }
}

fn count_duplicates(table: &Table, limit: usize) -> DuplicateStats {
    let mut seen = HashSet::new();
    let mut stats = DuplicateStats::default();
    for row in table.rows().iter().take(limit) {
        stats.scanned += 1;
        let key = serde_json::to_string(row).unwrap_or_default();
        if !seen.insert(key) {
            stats.count += 1;
        }
    }
    stats
}

fn sample_rows(table: &Table, count: usize, max_chars: usize) -> SampleRows {
    SampleRows {
        columns: table.columns().to_vec(),
        rows: table
            .rows()
            .iter()
            .take(count)
            .map(|row| {
                row.iter()
                    .map(|cell| truncate(&display_value(cell), max_chars))
                    .collect()
            })
            .collect(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
