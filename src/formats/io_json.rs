//! JSON reader and writer.
//!
//! A zero-byte file loads as `None` rather than a parse error.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use super::LoaderConfig;
use crate::error::AnyloadError;

/// Options for writing JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonWriteOptions {
    pub pretty: bool,
}

impl JsonWriteOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("json");
        let options = Self {
            pretty: reader.bool("pretty", false)?,
        };
        reader.finish();
        Ok(options)
    }
}

/// Reads a JSON file. Returns `None` for a zero-byte file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_json(path: &Path) -> Result<Option<Value>, AnyloadError> {
    let bytes = std::fs::read(path).map_err(AnyloadError::Io)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    from_json_slice(&bytes)
        .map(Some)
        .map_err(|source| AnyloadError::JsonParse {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes a value to a JSON file.
pub fn write_json(path: &Path, value: &Value, options: &JsonWriteOptions) -> Result<(), AnyloadError> {
    let file = File::create(path).map_err(AnyloadError::Io)?;
    let mut writer = BufWriter::new(file);

    let result = if options.pretty {
        serde_json::to_writer_pretty(&mut writer, value)
    } else {
        serde_json::to_writer(&mut writer, value)
    };
    result.map_err(|source| AnyloadError::JsonWrite {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(AnyloadError::Io)
}

/// Parses JSON from bytes. Useful for testing without file I/O.
pub fn from_json_slice(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(bytes)
}
