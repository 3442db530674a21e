//! Plain-text reader and writer (one entry per line).

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::LoaderConfig;
use crate::error::AnyloadError;

/// Options for reading text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextReadOptions {
    pub strip: bool,
    pub skip_empty: bool,
}

impl Default for TextReadOptions {
    fn default() -> Self {
        Self {
            strip: true,
            skip_empty: false,
        }
    }
}

impl TextReadOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("text");
        let options = Self {
            strip: reader.bool("strip", true)?,
            skip_empty: reader.bool("skip_empty", false)?,
        };
        reader.finish();
        Ok(options)
    }
}

/// Options for writing text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextWriteOptions {
    pub newline: String,
    pub append: bool,
}

impl Default for TextWriteOptions {
    fn default() -> Self {
        Self {
            newline: "\n".to_string(),
            append: false,
        }
    }
}

impl TextWriteOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("text");
        let options = Self {
            newline: reader.string("newline")?.unwrap_or_else(|| "\n".to_string()),
            append: reader.bool("append", false)?,
        };
        reader.finish();
        Ok(options)
    }
}

/// Reads a UTF-8 text file into lines.
pub fn read_text(path: &Path, options: &TextReadOptions) -> Result<Vec<String>, AnyloadError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::InvalidData {
            AnyloadError::Parse {
                path: path.to_path_buf(),
                format: "text",
                message: source.to_string(),
            }
        } else {
            AnyloadError::Io(source)
        }
    })?;
    Ok(split_lines(&text, options))
}

/// Split text into lines according to `options`.
pub fn split_lines(text: &str, options: &TextReadOptions) -> Vec<String> {
    text.lines()
        .map(|line| if options.strip { line.trim() } else { line })
        .filter(|line| !(options.skip_empty && line.trim().is_empty()))
        .map(str::to_string)
        .collect()
}

/// Writes lines, each followed by the configured newline.
pub fn write_text(
    path: &Path,
    lines: &[String],
    options: &TextWriteOptions,
) -> Result<(), AnyloadError> {
    let file = if options.append {
        OpenOptions::new().create(true).append(true).open(path)
    } else {
        File::create(path)
    }
    .map_err(AnyloadError::Io)?;

    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line.as_bytes()).map_err(AnyloadError::Io)?;
        writer
            .write_all(options.newline.as_bytes())
            .map_err(AnyloadError::Io)?;
    }
    writer.flush().map_err(AnyloadError::Io)
}
