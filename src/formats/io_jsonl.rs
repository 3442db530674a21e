//! JSON Lines reader and writer.
//!
//! Each non-blank line is parsed on its own. By default malformed lines are
//! skipped with a warning and bare `NaN` tokens are rewritten to `null`
//! before parsing, since some producers emit them.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use super::LoaderConfig;
use crate::error::AnyloadError;

const MEMORY_PATH: &str = "<memory>";

/// Options for reading JSON Lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JsonlReadOptions {
    pub skip_errors: bool,
    pub replace_nan: bool,
}

impl Default for JsonlReadOptions {
    fn default() -> Self {
        Self {
            skip_errors: true,
            replace_nan: true,
        }
    }
}

impl JsonlReadOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("jsonl");
        let options = Self {
            skip_errors: reader.bool("skip_errors", true)?,
            replace_nan: reader.bool("replace_nan", true)?,
        };
        reader.finish();
        Ok(options)
    }
}

/// Reads a JSON Lines file.
pub fn read_jsonl(path: &Path, options: &JsonlReadOptions) -> Result<Vec<Value>, AnyloadError> {
    let bytes = std::fs::read(path).map_err(AnyloadError::Io)?;
    parse_jsonl(&bytes, path, options)
}

/// Parses JSON Lines from bytes. Useful for testing without file I/O.
pub fn from_jsonl_slice(bytes: &[u8], options: &JsonlReadOptions) -> Result<Vec<Value>, AnyloadError> {
    parse_jsonl(bytes, Path::new(MEMORY_PATH), options)
}

fn parse_jsonl(
    bytes: &[u8],
    path: &Path,
    options: &JsonlReadOptions,
) -> Result<Vec<Value>, AnyloadError> {
    let text = String::from_utf8_lossy(bytes);
    let mut records = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let prepared = if options.replace_nan {
            replace_nan_tokens(line)
        } else {
            Cow::Borrowed(line)
        };

        match serde_json::from_str::<Value>(&prepared) {
            Ok(value) => records.push(value),
            Err(source) if options.skip_errors => {
                warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %source,
                    "skipping malformed JSON Lines record"
                );
            }
            Err(source) => {
                return Err(AnyloadError::Parse {
                    path: path.to_path_buf(),
                    format: "jsonl",
                    message: format!("line {}: {source}", idx + 1),
                });
            }
        }
    }

    Ok(records)
}

/// Rewrite every bare `NaN` token outside string literals to `null`.
pub fn replace_nan_tokens(line: &str) -> Cow<'_, str> {
    if !line.contains("NaN") {
        return Cow::Borrowed(line);
    }

    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let byte = bytes[idx];
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            idx += 1;
            continue;
        }

        if byte == b'"' {
            in_string = true;
            idx += 1;
            continue;
        }

        if bytes[idx..].starts_with(b"NaN")
            && !idx.checked_sub(1).is_some_and(|prev| is_word_byte(bytes[prev]))
            && !bytes.get(idx + 3).is_some_and(|next| is_word_byte(*next))
        {
            out.push_str(&line[start..idx]);
            out.push_str("null");
            idx += 3;
            start = idx;
            continue;
        }

        idx += 1;
    }

    if start == 0 {
        return Cow::Borrowed(line);
    }
    out.push_str(&line[start..]);
    Cow::Owned(out)
}

/// Fuzz-only entrypoint for strict JSON Lines parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_strict(input: &[u8]) -> Result<(), AnyloadError> {
    let strict = JsonlReadOptions {
        skip_errors: false,
        replace_nan: true,
    };
    let _ = parse_jsonl(input, Path::new("<fuzz>"), &strict)?;
    Ok(())
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Writes records as JSON Lines.
pub fn write_jsonl(path: &Path, records: &[Value]) -> Result<(), AnyloadError> {
    let file = File::create(path).map_err(AnyloadError::Io)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(|source| AnyloadError::JsonWrite {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(b"\n").map_err(AnyloadError::Io)?;
    }
    writer.flush().map_err(AnyloadError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_token_becomes_null() {
        let records = from_jsonl_slice(b"{\"a\": NaN, \"b\": 1}\n", &JsonlReadOptions::default())
            .expect("parse");
        assert_eq!(records, vec![json!({"a": null, "b": 1})]);
    }

    #[test]
    fn nan_inside_strings_and_words_is_untouched() {
        assert_eq!(
            replace_nan_tokens(r#"{"s": "NaN", "k": NaNa, "v": NaN}"#),
            r#"{"s": "NaN", "k": NaNa, "v": null}"#
        );
        assert_eq!(
            replace_nan_tokens(r#"{"s": "say \"NaN\""}"#),
            r#"{"s": "say \"NaN\""}"#
        );
        assert_eq!(replace_nan_tokens("[NaN,NaN]"), "[null,null]");
    }

    #[test]
    fn malformed_lines_are_skipped_by_default() {
        let input = b"{\"x\": 1}\nnot json\n\n{\"x\": 2}\n";
        let records = from_jsonl_slice(input, &JsonlReadOptions::default()).expect("parse");
        assert_eq!(records, vec![json!({"x": 1}), json!({"x": 2})]);
    }

    #[test]
    fn strict_mode_reports_line_number() {
        let options = JsonlReadOptions {
            skip_errors: false,
            replace_nan: true,
        };
        let err = from_jsonl_slice(b"{\"x\": 1}\n{broken\n", &options).expect_err("strict");
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn nan_without_rewrite_is_malformed() {
        let options = JsonlReadOptions {
            skip_errors: true,
            replace_nan: false,
        };
        let records = from_jsonl_slice(b"{\"a\": NaN}\n", &options).expect("parse");
        assert!(records.is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let records =
            from_jsonl_slice(b"{\"x\": 1}\r\n{\"x\": 2}\r\n", &JsonlReadOptions::default())
                .expect("parse");
        assert_eq!(records.len(), 2);
    }
}
