//! TOML and YAML readers and writers.
//!
//! Both load into a JSON value so the rest of the crate handles one nested
//! mapping type. TOML datetimes load as their string form.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::{Number, Value};

use crate::error::AnyloadError;

/// Reads a TOML document.
pub fn read_toml(path: &Path) -> Result<Value, AnyloadError> {
    let text = std::fs::read_to_string(path).map_err(AnyloadError::Io)?;
    from_toml_str(&text).map_err(|message| AnyloadError::Parse {
        path: path.to_path_buf(),
        format: "toml",
        message,
    })
}

/// Parses a TOML document. Useful for testing without file I/O.
pub fn from_toml_str(text: &str) -> Result<Value, String> {
    let table: toml::Table = toml::from_str(text).map_err(|source| source.to_string())?;
    Ok(toml_to_json(toml::Value::Table(table)))
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(text) => Value::String(text),
        toml::Value::Integer(int) => Value::from(int),
        toml::Value::Float(float) => Number::from_f64(float)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(flag) => Value::Bool(flag),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, item)| (key, toml_to_json(item)))
                .collect(),
        ),
    }
}

/// Writes a mapping as a TOML document.
pub fn write_toml(path: &Path, value: &Value) -> Result<(), AnyloadError> {
    let text = to_toml_string(value).map_err(|message| AnyloadError::Write {
        path: path.to_path_buf(),
        format: "toml",
        message,
    })?;
    std::fs::write(path, text).map_err(AnyloadError::Io)
}

/// Serializes a mapping as TOML. Useful for testing without file I/O.
pub fn to_toml_string(value: &Value) -> Result<String, String> {
    if !value.is_object() {
        return Err("a TOML document must be a mapping at the top level".to_string());
    }
    if contains_null(value) {
        return Err("TOML has no null value".to_string());
    }
    toml::to_string(value).map_err(|source| source.to_string())
}

fn contains_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.iter().any(contains_null),
        Value::Object(map) => map.values().any(contains_null),
        _ => false,
    }
}

/// Reads a YAML document. An empty document loads as `null`.
pub fn read_yaml(path: &Path) -> Result<Value, AnyloadError> {
    let file = File::open(path).map_err(AnyloadError::Io)?;
    if file.metadata().map_err(AnyloadError::Io)?.len() == 0 {
        return Ok(Value::Null);
    }
    serde_yaml::from_reader(BufReader::new(file)).map_err(|source| AnyloadError::Parse {
        path: path.to_path_buf(),
        format: "yaml",
        message: source.to_string(),
    })
}

/// Writes a value as YAML.
pub fn write_yaml(path: &Path, value: &Value) -> Result<(), AnyloadError> {
    let file = File::create(path).map_err(AnyloadError::Io)?;
    let mut writer = BufWriter::new(file);
    serde_yaml::to_writer(&mut writer, value).map_err(|source| AnyloadError::Write {
        path: path.to_path_buf(),
        format: "yaml",
        message: source.to_string(),
    })?;
    writer.flush().map_err(AnyloadError::Io)
}
