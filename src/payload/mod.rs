//! In-memory values produced by `load` and consumed by `save`.
//!
//! The variant of a [`Payload`] is inferred from the value itself
//! ([`Payload::kind`]); the target format is inferred from the extension.
//! The two are kept separate and reconciled by the `into_*` conversions
//! below, which the format writers call before serializing.

mod table;

use std::collections::BTreeMap;
use std::fmt;

use image::DynamicImage;
use serde_json::Value;

pub use table::{Table, VALUE_COLUMN};

use crate::error::AnyloadError;
use crate::hub::RecordStream;

/// A loaded value.
#[derive(Debug)]
pub enum Payload {
    Table(Table),
    Json(Value),
    Records(Vec<Value>),
    Lines(Vec<String>),
    Image(DynamicImage),
    Bytes(Vec<u8>),
    Null,
    /// Every split of a hub dataset, keyed by split name.
    Splits(BTreeMap<String, Table>),
    /// Lazily fetched rows of a hub dataset.
    Stream(RecordStream),
}

/// Shape of a payload, as inferred from the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Table,
    Mapping,
    Sequence,
    Scalar,
    Lines,
    Image,
    Bytes,
    Null,
    Splits,
    Stream,
}

impl PayloadKind {
    pub fn name(self) -> &'static str {
        match self {
            PayloadKind::Table => "table",
            PayloadKind::Mapping => "mapping",
            PayloadKind::Sequence => "sequence",
            PayloadKind::Scalar => "scalar",
            PayloadKind::Lines => "lines",
            PayloadKind::Image => "image",
            PayloadKind::Bytes => "bytes",
            PayloadKind::Null => "null",
            PayloadKind::Splits => "dataset splits",
            PayloadKind::Stream => "record stream",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Payload {
    /// Infer the payload's shape from its value.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Table(_) => PayloadKind::Table,
            Payload::Json(Value::Object(_)) => PayloadKind::Mapping,
            Payload::Json(Value::Array(_)) | Payload::Records(_) => PayloadKind::Sequence,
            Payload::Json(Value::Null) | Payload::Null => PayloadKind::Null,
            Payload::Json(_) => PayloadKind::Scalar,
            Payload::Lines(_) => PayloadKind::Lines,
            Payload::Image(_) => PayloadKind::Image,
            Payload::Bytes(_) => PayloadKind::Bytes,
            Payload::Splits(_) => PayloadKind::Splits,
            Payload::Stream(_) => PayloadKind::Stream,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Payload::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Value]> {
        match self {
            Payload::Records(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_lines(&self) -> Option<&[String]> {
        match self {
            Payload::Lines(lines) => Some(lines),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&DynamicImage> {
        match self {
            Payload::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null | Payload::Json(Value::Null))
    }

    /// Convert to a table. `format` names the target for error messages.
    pub fn into_table(self, format: &'static str) -> Result<Table, AnyloadError> {
        let kind = self.kind();
        match self {
            Payload::Table(table) => Ok(table),
            Payload::Records(records) => Ok(Table::from_records(records)),
            Payload::Json(Value::Array(items)) => Ok(Table::from_records(items)),
            Payload::Json(Value::Object(map)) => Ok(table_from_mapping(map)),
            Payload::Lines(lines) => Ok(Table::from_records(
                lines
                    .into_iter()
                    .map(|line| serde_json::json!({ "text": line }))
                    .collect(),
            )),
            Payload::Null | Payload::Json(Value::Null) => Ok(Table::default()),
            Payload::Splits(splits) if splits.len() == 1 => {
                Ok(splits.into_values().next().unwrap_or_default())
            }
            Payload::Stream(stream) => {
                let records = stream.collect::<Result<Vec<Value>, AnyloadError>>()?;
                Ok(Table::from_records(records))
            }
            _ => Err(mismatch(format, kind)),
        }
    }

    /// Convert to a list of JSON records.
    pub fn into_records(self, format: &'static str) -> Result<Vec<Value>, AnyloadError> {
        let kind = self.kind();
        match self {
            Payload::Records(records) => Ok(records),
            Payload::Json(Value::Array(items)) => Ok(items),
            Payload::Json(Value::Null) | Payload::Null => Ok(Vec::new()),
            Payload::Json(value) => Ok(vec![value]),
            Payload::Table(table) => Ok(table.to_records()),
            Payload::Lines(lines) => Ok(lines.into_iter().map(Value::String).collect()),
            Payload::Stream(stream) => stream.collect(),
            _ => Err(mismatch(format, kind)),
        }
    }

    /// Convert to a single JSON value.
    pub fn into_json(self, format: &'static str) -> Result<Value, AnyloadError> {
        let kind = self.kind();
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Null => Ok(Value::Null),
            Payload::Records(records) => Ok(Value::Array(records)),
            Payload::Table(table) => Ok(Value::Array(table.to_records())),
            Payload::Lines(lines) => Ok(Value::Array(
                lines.into_iter().map(Value::String).collect(),
            )),
            Payload::Splits(splits) => Ok(Value::Object(
                splits
                    .into_iter()
                    .map(|(name, table)| (name, Value::Array(table.to_records())))
                    .collect(),
            )),
            Payload::Stream(stream) => {
                let records = stream.collect::<Result<Vec<Value>, AnyloadError>>()?;
                Ok(Value::Array(records))
            }
            _ => Err(mismatch(format, kind)),
        }
    }

    /// Convert to text lines. Non-string values are written as compact JSON.
    pub fn into_lines(self, format: &'static str) -> Result<Vec<String>, AnyloadError> {
        let kind = self.kind();
        match self {
            Payload::Lines(lines) => Ok(lines),
            Payload::Bytes(bytes) => Ok(String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect()),
            Payload::Json(Value::String(text)) => Ok(text.lines().map(str::to_string).collect()),
            Payload::Image(_) | Payload::Splits(_) => Err(mismatch(format, kind)),
            other => Ok(other
                .into_records(format)?
                .into_iter()
                .map(|value| match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                })
                .collect()),
        }
    }

    pub fn into_image(self, format: &'static str) -> Result<DynamicImage, AnyloadError> {
        match self {
            Payload::Image(image) => Ok(image),
            other => Err(mismatch(format, other.kind())),
        }
    }
}

fn table_from_mapping(map: serde_json::Map<String, Value>) -> Table {
    let columnar_len = map
        .values()
        .map(|value| value.as_array().map(Vec::len))
        .collect::<Option<Vec<_>>>()
        .filter(|lens| !lens.is_empty() && lens.iter().all(|len| *len == lens[0]))
        .map(|lens| lens[0]);

    match columnar_len {
        Some(len) => {
            let columns: Vec<String> = map.keys().cloned().collect();
            let arrays: Vec<Vec<Value>> = map
                .into_values()
                .map(|value| match value {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                })
                .collect();
            let rows = (0..len)
                .map(|idx| arrays.iter().map(|column| column[idx].clone()).collect())
                .collect();
            Table::new(columns, rows)
        }
        None => Table::from_records(vec![Value::Object(map)]),
    }
}

fn mismatch(format: &'static str, kind: PayloadKind) -> AnyloadError {
    AnyloadError::PayloadMismatch {
        format,
        found: kind.name(),
    }
}

impl From<Table> for Payload {
    fn from(table: Table) -> Self {
        Payload::Table(table)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Vec<String>> for Payload {
    fn from(lines: Vec<String>) -> Self {
        Payload::Lines(lines)
    }
}

impl From<DynamicImage> for Payload {
    fn from(image: DynamicImage) -> Self {
        Payload::Image(image)
    }
}
