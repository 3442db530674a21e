//! CSV reader and writer.
//!
//! Cells are typed on read (null, bool, integer, float, string) unless type
//! inference is disabled or a per-column `dtype` hint says otherwise. Nested
//! values are written as compact JSON text.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde_json::{Number, Value};

use super::LoaderConfig;
use crate::error::AnyloadError;
use crate::payload::Table;

const MEMORY_PATH: &str = "<memory>";

/// Column type hint for the `dtype` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Str,
    Int,
    Float,
    Bool,
}

impl ColumnType {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "str" | "string" | "object" => Some(ColumnType::Str),
            "int" | "int64" | "integer" => Some(ColumnType::Int),
            "float" | "float64" | "double" => Some(ColumnType::Float),
            "bool" | "boolean" => Some(ColumnType::Bool),
            _ => None,
        }
    }
}

/// Options for reading CSV.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvReadOptions {
    pub delimiter: u8,
    pub columns: Option<Vec<String>>,
    pub has_headers: bool,
    pub infer_types: bool,
    pub dtypes: BTreeMap<String, ColumnType>,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            columns: None,
            has_headers: true,
            infer_types: true,
            dtypes: BTreeMap::new(),
        }
    }
}

impl CsvReadOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("csv");
        let mut options = Self {
            delimiter: reader.delimiter("delimiter", b',')?,
            columns: reader.string_list("columns")?,
            has_headers: reader.bool("has_headers", true)?,
            infer_types: reader.bool("infer_types", true)?,
            dtypes: BTreeMap::new(),
        };
        for (column, type_name) in reader.string_map("dtype")?.unwrap_or_default() {
            let column_type =
                ColumnType::from_name(&type_name).ok_or_else(|| AnyloadError::InvalidOption {
                    loader: "csv",
                    key: "dtype".to_string(),
                    message: format!("unknown type '{type_name}' for column '{column}'"),
                })?;
            options.dtypes.insert(column, column_type);
        }
        reader.finish();
        Ok(options)
    }
}

/// Options for writing CSV.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvWriteOptions {
    pub delimiter: u8,
    pub columns: Option<Vec<String>>,
    pub header: bool,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            columns: None,
            header: true,
        }
    }
}

impl CsvWriteOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("csv");
        let options = Self {
            delimiter: reader.delimiter("delimiter", b',')?,
            columns: reader.string_list("columns")?,
            header: reader.bool("header", true)?,
        };
        reader.finish();
        Ok(options)
    }
}

/// Reads a CSV file into a table.
pub fn read_csv(path: &Path, options: &CsvReadOptions) -> Result<Table, AnyloadError> {
    let file = File::open(path).map_err(AnyloadError::Io)?;
    parse_csv(BufReader::new(file), path, options)
}

/// Parses CSV text. Useful for testing without file I/O.
pub fn from_csv_str(text: &str, options: &CsvReadOptions) -> Result<Table, AnyloadError> {
    parse_csv(text.as_bytes(), Path::new(MEMORY_PATH), options)
}

fn parse_csv<R: Read>(
    reader: R,
    path: &Path,
    options: &CsvReadOptions,
) -> Result<Table, AnyloadError> {
    let csv_error = |source| AnyloadError::CsvParse {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_headers)
        .from_reader(reader);

    let mut columns: Vec<String> = if options.has_headers {
        rdr.headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    let mut raw_rows: Vec<csv::StringRecord> = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_error)?;
        if !options.has_headers && columns.len() < record.len() {
            columns = (0..record.len()).map(|idx| idx.to_string()).collect();
        }
        raw_rows.push(record);
    }

    let column_types: Vec<Option<ColumnType>> = columns
        .iter()
        .map(|column| options.dtypes.get(column).copied())
        .collect();

    let mut table = Table::with_columns(columns);
    for (row_idx, record) in raw_rows.iter().enumerate() {
        let mut row = Vec::with_capacity(record.len());
        for (col_idx, field) in record.iter().enumerate() {
            let hint = column_types.get(col_idx).copied().flatten();
            let cell = convert_cell(field, hint, options.infer_types).map_err(|message| {
                AnyloadError::Parse {
                    path: path.to_path_buf(),
                    format: "csv",
                    message: format!("row {}: column {}: {message}", row_idx + 1, col_idx + 1),
                }
            })?;
            row.push(cell);
        }
        table.push_row(row);
    }

    match options.columns.as_deref() {
        Some(subset) => table.select(subset).map_err(|missing| AnyloadError::InvalidOption {
            loader: "csv",
            key: "columns".to_string(),
            message: format!("column '{missing}' not found in {}", path.display()),
        }),
        None => Ok(table),
    }
}

fn convert_cell(field: &str, hint: Option<ColumnType>, infer: bool) -> Result<Value, String> {
    if hint.is_some() && field.is_empty() {
        return Ok(Value::Null);
    }
    match hint {
        Some(ColumnType::Str) => Ok(Value::String(field.to_string())),
        Some(ColumnType::Int) => field
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{field}' is not an integer")),
        Some(ColumnType::Float) => field
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("'{field}' is not a finite float")),
        Some(ColumnType::Bool) => parse_bool(field.trim())
            .map(Value::Bool)
            .ok_or_else(|| format!("'{field}' is not a boolean")),
        None if infer => Ok(infer_cell(field)),
        None => Ok(Value::String(field.to_string())),
    }
}

/// Type a raw CSV cell. Only an empty cell is null.
pub fn infer_cell(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    if field.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if field.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if looks_numeric(field) {
        if let Ok(int) = field.parse::<i64>() {
            return Value::from(int);
        }
        if let Some(number) = field.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(number);
        }
    }
    Value::String(field.to_string())
}

fn looks_numeric(field: &str) -> bool {
    let digits = field.strip_prefix(['-', '+']).unwrap_or(field);
    digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
}

fn parse_bool(field: &str) -> Option<bool> {
    match field.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Writes a table to a CSV file.
pub fn write_csv(path: &Path, table: &Table, options: &CsvWriteOptions) -> Result<(), AnyloadError> {
    let file = File::create(path).map_err(AnyloadError::Io)?;
    write_csv_to(BufWriter::new(file), path, table, options)
}

/// Writes a table to a CSV string. Useful for testing without file I/O.
pub fn to_csv_string(table: &Table, options: &CsvWriteOptions) -> Result<String, AnyloadError> {
    let mut buffer = Vec::new();
    write_csv_to(&mut buffer, Path::new(MEMORY_PATH), table, options)?;
    String::from_utf8(buffer).map_err(|source| AnyloadError::Write {
        path: MEMORY_PATH.into(),
        format: "csv",
        message: source.to_string(),
    })
}

fn write_csv_to<W: Write>(
    writer: W,
    path: &Path,
    table: &Table,
    options: &CsvWriteOptions,
) -> Result<(), AnyloadError> {
    let csv_error = |source| AnyloadError::CsvWrite {
        path: path.to_path_buf(),
        source,
    };

    let selected;
    let table = match options.columns.as_deref() {
        Some(subset) => {
            selected = table
                .select(subset)
                .map_err(|missing| AnyloadError::InvalidOption {
                    loader: "csv",
                    key: "columns".to_string(),
                    message: format!("column '{missing}' not present in the table"),
                })?;
            &selected
        }
        None => table,
    };

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(writer);

    if options.header {
        wtr.write_record(table.columns()).map_err(csv_error)?;
    }
    for row in table.rows() {
        wtr.write_record(row.iter().map(cell_to_field))
            .map_err(csv_error)?;
    }
    wtr.flush().map_err(AnyloadError::Io)?;
    Ok(())
}

fn cell_to_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        nested => nested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infers_cell_types() {
        assert_eq!(infer_cell(""), Value::Null);
        assert_eq!(infer_cell("NaN"), json!("NaN"));
        assert_eq!(infer_cell("NA"), json!("NA"));
        assert_eq!(infer_cell("42"), json!(42));
        assert_eq!(infer_cell("-1.5"), json!(-1.5));
        assert_eq!(infer_cell("1e3"), json!(1000.0));
        assert_eq!(infer_cell("True"), json!(true));
        assert_eq!(infer_cell("inf"), json!("inf"));
        assert_eq!(infer_cell("12abc"), json!("12abc"));
        assert_eq!(infer_cell("hello"), json!("hello"));
    }

    #[test]
    fn missing_value_words_survive_a_round_trip() {
        let table = Table::new(
            vec!["code".to_string(), "note".to_string()],
            vec![
                vec![json!("NA"), json!("null")],
                vec![json!("N/A"), Value::Null],
            ],
        );
        let text = to_csv_string(&table, &CsvWriteOptions::default()).expect("write");
        let back = from_csv_str(&text, &CsvReadOptions::default()).expect("read");
        assert_eq!(back, table);
    }

    #[test]
    fn reads_headers_and_typed_rows() {
        let table = from_csv_str("id,name,score\n1,ann,0.5\n2,bob,\n", &CsvReadOptions::default())
            .expect("parse");
        assert_eq!(table.columns(), ["id", "name", "score"]);
        assert_eq!(table.rows()[0], vec![json!(1), json!("ann"), json!(0.5)]);
        assert_eq!(table.rows()[1], vec![json!(2), json!("bob"), Value::Null]);
    }

    #[test]
    fn dtype_hint_keeps_leading_zeros() {
        let options = CsvReadOptions {
            dtypes: BTreeMap::from([("zip".to_string(), ColumnType::Str)]),
            ..Default::default()
        };
        let table = from_csv_str("zip,n\n00123,7\n", &options).expect("parse");
        assert_eq!(table.rows()[0], vec![json!("00123"), json!(7)]);
    }

    #[test]
    fn bad_dtype_value_is_parse_error() {
        let options = CsvReadOptions {
            dtypes: BTreeMap::from([("n".to_string(), ColumnType::Int)]),
            ..Default::default()
        };
        let err = from_csv_str("n\nabc\n", &options).expect_err("not an int");
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn delimiter_and_column_subset() {
        let options = CsvReadOptions {
            delimiter: b';',
            columns: Some(vec!["b".to_string()]),
            ..Default::default()
        };
        let table = from_csv_str("a;b\n1;x\n", &options).expect("parse");
        assert_eq!(table.columns(), ["b"]);
        assert_eq!(table.rows()[0], vec![json!("x")]);
    }

    #[test]
    fn headerless_files_get_positional_names() {
        let options = CsvReadOptions {
            has_headers: false,
            ..Default::default()
        };
        let table = from_csv_str("1,2\n3,4\n", &options).expect("parse");
        assert_eq!(table.columns(), ["0", "1"]);
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn writes_nested_cells_as_json() {
        let table = Table::from_records(vec![json!({"a": 1, "b": null, "c": [1, 2]})]);
        let text = to_csv_string(&table, &CsvWriteOptions::default()).expect("write");
        assert_eq!(text, "a,b,c\n1,,\"[1,2]\"\n");
    }

    #[test]
    fn written_table_reads_back() {
        let table = Table::from_records(vec![
            json!({"id": 1, "label": "cat", "score": 0.25, "ok": true}),
            json!({"id": 2, "label": "dog", "score": 1.5, "ok": false}),
        ]);
        let text = to_csv_string(&table, &CsvWriteOptions::default()).expect("write");
        let back = from_csv_str(&text, &CsvReadOptions::default()).expect("read");
        assert_eq!(back, table);
    }
}
