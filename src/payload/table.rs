//! Row/column table used by the tabular loaders and the hub dataset loader.

use serde::Serialize;
use serde_json::{Map, Value};

/// Column name used when records are not JSON objects.
pub const VALUE_COLUMN: &str = "value";

/// A rectangular table of JSON cells.
///
/// Every row has exactly `columns.len()` cells; missing cells are `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, padding short rows with `null` and truncating long ones.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Build a table from JSON records.
    ///
    /// Object records contribute their keys as columns in first-seen order.
    /// Any other record is stored under a single [`VALUE_COLUMN`].
    pub fn from_records(records: Vec<Value>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            match record {
                Value::Object(map) => {
                    for key in map.keys() {
                        if !columns.iter().any(|column| column == key) {
                            columns.push(key.clone());
                        }
                    }
                }
                _ => {
                    if !columns.iter().any(|column| column == VALUE_COLUMN) {
                        columns.push(VALUE_COLUMN.to_string());
                    }
                }
            }
        }

        let mut table = Table::with_columns(columns);
        for record in records {
            let mut row = vec![Value::Null; table.columns.len()];
            match record {
                Value::Object(map) => {
                    for (key, value) in map {
                        if let Some(idx) = table.column_index(&key) {
                            row[idx] = value;
                        }
                    }
                }
                other => {
                    if let Some(idx) = table.column_index(VALUE_COLUMN) {
                        row[idx] = other;
                    }
                }
            }
            table.rows.push(row);
        }
        table
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let map: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(map)
            })
            .collect()
    }

    /// Keep only `names`, in the given order. Returns the first unknown name
    /// as the error.
    pub fn select(&self, names: &[String]) -> Result<Table, String> {
        let indices = names
            .iter()
            .map(|name| self.column_index(name).ok_or_else(|| name.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
            .collect();
        Ok(Table {
            columns: names.to_vec(),
            rows,
        })
    }

    /// Stack tables vertically. Columns are the union in first-seen order.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut out = Table::with_columns(columns);
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|column| out.column_index(column))
                .collect();
            for row in table.rows {
                let mut cells = vec![Value::Null; out.columns.len()];
                for (cell, &target) in row.into_iter().zip(&mapping) {
                    cells[target] = cell;
                }
                out.rows.push(cells);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_records_unions_keys_in_first_seen_order() {
        let table = Table::from_records(vec![json!({"b": 1, "a": 2}), json!({"a": 3, "c": true})]);
        assert_eq!(table.columns(), ["b", "a", "c"]);
        assert_eq!(table.rows()[0], vec![json!(1), json!(2), Value::Null]);
        assert_eq!(table.rows()[1], vec![Value::Null, json!(3), json!(true)]);
    }

    #[test]
    fn scalar_records_use_value_column() {
        let table = Table::from_records(vec![json!(1), json!("x")]);
        assert_eq!(table.columns(), [VALUE_COLUMN]);
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn records_round_trip() {
        let records = vec![json!({"x": 1, "y": "a"}), json!({"x": 2, "y": "b"})];
        let table = Table::from_records(records.clone());
        assert_eq!(table.to_records(), records);
    }

    #[test]
    fn select_reorders_and_rejects_unknown() {
        let table = Table::from_records(vec![json!({"a": 1, "b": 2})]);
        let picked = table.select(&["b".to_string(), "a".to_string()]).expect("select");
        assert_eq!(picked.columns(), ["b", "a"]);
        assert_eq!(picked.rows()[0], vec![json!(2), json!(1)]);
        assert_eq!(table.select(&["zzz".to_string()]), Err("zzz".to_string()));
    }

    #[test]
    fn concat_fills_missing_cells_with_null() {
        let left = Table::from_records(vec![json!({"a": 1})]);
        let right = Table::from_records(vec![json!({"b": 2})]);
        let joined = Table::concat(vec![left, right]);
        assert_eq!(joined.columns(), ["a", "b"]);
        assert_eq!(joined.rows()[0], vec![json!(1), Value::Null]);
        assert_eq!(joined.rows()[1], vec![Value::Null, json!(2)]);
    }

    #[test]
    fn new_pads_short_rows() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![json!(1)], vec![json!(1), json!(2), json!(3)]],
        );
        assert_eq!(table.rows()[0], vec![json!(1), Value::Null]);
        assert_eq!(table.rows()[1].len(), 2);
    }
}
