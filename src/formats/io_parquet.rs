//! Parquet reader and writer.
//!
//! Reading goes through the row API and converts each row to JSON, so nested
//! Parquet groups and lists come back as JSON objects and arrays. Writing
//! infers one Arrow column type per table column.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::Value;

use super::LoaderConfig;
use crate::error::AnyloadError;
use crate::payload::Table;

/// Options for reading Parquet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParquetReadOptions {
    pub columns: Option<Vec<String>>,
}

impl ParquetReadOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("parquet");
        let options = Self {
            columns: reader.string_list("columns")?,
        };
        reader.finish();
        Ok(options)
    }
}

/// Options for writing Parquet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParquetWriteOptions {
    pub compression: Compression,
}

impl Default for ParquetWriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
        }
    }
}

impl ParquetWriteOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("parquet");
        let compression = match reader.string("compression")? {
            None => Compression::SNAPPY,
            Some(name) => parse_compression(&name).ok_or_else(|| AnyloadError::InvalidOption {
                loader: "parquet",
                key: "compression".to_string(),
                message: format!(
                    "unknown codec '{name}' (supported: snappy, zstd, gzip, lz4, brotli, none)"
                ),
            })?,
        };
        reader.finish();
        Ok(Self { compression })
    }
}

fn parse_compression(name: &str) -> Option<Compression> {
    match name.to_ascii_lowercase().as_str() {
        "snappy" => Some(Compression::SNAPPY),
        "zstd" => Some(Compression::ZSTD(ZstdLevel::default())),
        "gzip" => Some(Compression::GZIP(GzipLevel::default())),
        "lz4" => Some(Compression::LZ4_RAW),
        "brotli" => Some(Compression::BROTLI(BrotliLevel::default())),
        "none" | "uncompressed" => Some(Compression::UNCOMPRESSED),
        _ => None,
    }
}

/// Reads a Parquet file into a table.
pub fn read_parquet(path: &Path, options: &ParquetReadOptions) -> Result<Table, AnyloadError> {
    let parse_error = |message: String| AnyloadError::Parse {
        path: path.to_path_buf(),
        format: "parquet",
        message,
    };

    let file = File::open(path).map_err(AnyloadError::Io)?;
    let reader = SerializedFileReader::new(file).map_err(|source| parse_error(source.to_string()))?;

    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let row_iter = reader
        .get_row_iter(None)
        .map_err(|source| parse_error(source.to_string()))?;

    let mut table = Table::with_columns(columns.clone());
    for (idx, row_res) in row_iter.enumerate() {
        let row = row_res.map_err(|source| parse_error(format!("row {}: {source}", idx + 1)))?;
        let cells = match row.to_json_value() {
            Value::Object(mut map) => columns
                .iter()
                .map(|column| map.remove(column).unwrap_or(Value::Null))
                .collect(),
            other => vec![other],
        };
        table.push_row(cells);
    }

    match options.columns.as_deref() {
        Some(subset) => table.select(subset).map_err(|missing| AnyloadError::InvalidOption {
            loader: "parquet",
            key: "columns".to_string(),
            message: format!("column '{missing}' not found in {}", path.display()),
        }),
        None => Ok(table),
    }
}

/// Writes a table to a Parquet file.
pub fn write_parquet(
    path: &Path,
    table: &Table,
    options: &ParquetWriteOptions,
) -> Result<(), AnyloadError> {
    let write_error = |message: String| AnyloadError::Write {
        path: path.to_path_buf(),
        format: "parquet",
        message,
    };

    if table.num_columns() == 0 {
        return Err(write_error("cannot write a table without columns".to_string()));
    }

    let batch = table_to_record_batch(table).map_err(write_error)?;
    let props = WriterProperties::builder()
        .set_compression(options.compression)
        .build();

    let file = File::create(path).map_err(AnyloadError::Io)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|source| write_error(source.to_string()))?;
    writer
        .write(&batch)
        .map_err(|source| write_error(source.to_string()))?;
    writer
        .close()
        .map_err(|source| write_error(source.to_string()))?;
    Ok(())
}

/// Arrow type chosen for one table column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Bool,
    Utf8,
    /// Mixed or nested values, stored as JSON text.
    Json,
}

impl ColumnKind {
    fn data_type(self) -> DataType {
        match self {
            ColumnKind::Int => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Bool => DataType::Boolean,
            ColumnKind::Utf8 | ColumnKind::Json => DataType::Utf8,
        }
    }
}

/// Pick the narrowest Arrow type that holds every non-null cell.
pub fn infer_column_kind<'a>(cells: impl IntoIterator<Item = &'a Value>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for cell in cells {
        let cell_kind = match cell {
            Value::Null => continue,
            Value::Bool(_) => ColumnKind::Bool,
            Value::Number(n) if n.is_i64() => ColumnKind::Int,
            Value::Number(_) => ColumnKind::Float,
            Value::String(_) => ColumnKind::Utf8,
            Value::Array(_) | Value::Object(_) => return ColumnKind::Json,
        };
        kind = Some(match (kind, cell_kind) {
            (None, next) => next,
            (Some(current), next) if current == next => current,
            (Some(ColumnKind::Int), ColumnKind::Float) | (Some(ColumnKind::Float), ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => return ColumnKind::Json,
        });
    }
    kind.unwrap_or(ColumnKind::Utf8)
}

fn table_to_record_batch(table: &Table) -> Result<RecordBatch, String> {
    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.num_columns());

    for (idx, name) in table.columns().iter().enumerate() {
        let cells: Vec<&Value> = table.rows().iter().map(|row| &row[idx]).collect();
        let kind = infer_column_kind(cells.iter().copied());
        fields.push(Field::new(name, kind.data_type(), true));

        let array: ArrayRef = match kind {
            ColumnKind::Int => Arc::new(Int64Array::from(
                cells.iter().map(|v| v.as_i64()).collect::<Vec<_>>(),
            )),
            ColumnKind::Float => Arc::new(Float64Array::from(
                cells.iter().map(|v| v.as_f64()).collect::<Vec<_>>(),
            )),
            ColumnKind::Bool => Arc::new(BooleanArray::from(
                cells.iter().map(|v| v.as_bool()).collect::<Vec<_>>(),
            )),
            ColumnKind::Utf8 => Arc::new(StringArray::from(
                cells
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Vec<_>>(),
            )),
            ColumnKind::Json => Arc::new(StringArray::from(
                cells
                    .iter()
                    .map(|v| match v {
                        Value::Null => None,
                        Value::String(text) => Some(text.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect::<Vec<_>>(),
            )),
        };
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(|e| e.to_string())
}
