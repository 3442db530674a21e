//! Per-call loader options.
//!
//! Options arrive as a loose map. Each loader reads the keys it understands
//! through an [`OptionReader`]; whatever is left over is logged and dropped.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AnyloadError;

/// Loose option map passed to `load` and `save`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoaderConfig {
    options: Map<String, Value>,
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.options.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Start reading options on behalf of `loader`.
    pub fn reader(&self, loader: &'static str) -> OptionReader<'_> {
        OptionReader {
            loader,
            config: self,
            consumed: BTreeSet::new(),
        }
    }
}

impl From<Map<String, Value>> for LoaderConfig {
    fn from(options: Map<String, Value>) -> Self {
        Self { options }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for LoaderConfig {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Typed access to a [`LoaderConfig`] that remembers which keys were read.
pub struct OptionReader<'a> {
    loader: &'static str,
    config: &'a LoaderConfig,
    consumed: BTreeSet<&'static str>,
}

impl<'a> OptionReader<'a> {
    fn take(&mut self, key: &'static str) -> Option<&'a Value> {
        self.consumed.insert(key);
        let config: &'a LoaderConfig = self.config;
        config.options.get(key).filter(|value| !value.is_null())
    }

    fn invalid(&self, key: &str, message: impl Into<String>) -> AnyloadError {
        AnyloadError::InvalidOption {
            loader: self.loader,
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn bool(&mut self, key: &'static str, default: bool) -> Result<bool, AnyloadError> {
        match self.take(key) {
            None => Ok(default),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(other) => Err(self.invalid(key, format!("expected a boolean, got {other}"))),
        }
    }

    pub fn string(&mut self, key: &'static str) -> Result<Option<String>, AnyloadError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {other}"))),
        }
    }

    /// A single-byte delimiter such as `,` or `\t`.
    pub fn delimiter(&mut self, key: &'static str, default: u8) -> Result<u8, AnyloadError> {
        match self.string(key)? {
            None => Ok(default),
            Some(text) if text.len() == 1 => Ok(text.as_bytes()[0]),
            Some(text) => Err(self.invalid(
                key,
                format!("expected a single ASCII character, got {text:?}"),
            )),
        }
    }

    pub fn string_list(&mut self, key: &'static str) -> Result<Option<Vec<String>>, AnyloadError> {
        let Some(value) = self.take(key).cloned() else {
            return Ok(None);
        };
        match value {
            Value::String(single) => Ok(Some(vec![single])),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text),
                    other => Err(self.invalid(key, format!("expected strings, got {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            other => Err(self.invalid(key, format!("expected a list of strings, got {other}"))),
        }
    }

    pub fn u32(&mut self, key: &'static str) -> Result<Option<u32>, AnyloadError> {
        let Some(value) = self.take(key).cloned() else {
            return Ok(None);
        };
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| self.invalid(key, format!("expected a non-negative integer, got {value}")))
    }

    /// A `[width, height]` pair.
    pub fn u32_pair(&mut self, key: &'static str) -> Result<Option<(u32, u32)>, AnyloadError> {
        let Some(value) = self.take(key).cloned() else {
            return Ok(None);
        };
        let pair = value.as_array().and_then(|items| match items.as_slice() {
            [a, b] => Some((
                a.as_u64().and_then(|n| u32::try_from(n).ok())?,
                b.as_u64().and_then(|n| u32::try_from(n).ok())?,
            )),
            _ => None,
        });
        pair.map(Some)
            .ok_or_else(|| self.invalid(key, format!("expected [width, height], got {value}")))
    }

    /// A mapping of string keys to string values.
    pub fn string_map(
        &mut self,
        key: &'static str,
    ) -> Result<Option<Vec<(String, String)>>, AnyloadError> {
        let Some(value) = self.take(key).cloned() else {
            return Ok(None);
        };
        let map = match value {
            Value::Object(map) => map,
            other => return Err(self.invalid(key, format!("expected a mapping, got {other}"))),
        };
        map.into_iter()
            .map(|(name, item)| match item {
                Value::String(text) => Ok((name, text)),
                other => Err(self.invalid(key, format!("expected string values, got {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Warn about every option that was supplied but never read.
    pub fn finish(self) {
        for key in self.config.options.keys() {
            if !self.consumed.contains(key.as_str()) {
                warn!(
                    loader = self.loader,
                    option = %key,
                    "ignoring unrecognized loader option"
                );
            }
        }
    }

    /// Keys supplied but not read so far.
    pub fn unused(&self) -> Vec<&str> {
        self.config
            .options
            .keys()
            .map(String::as_str)
            .filter(|key| !self.consumed.contains(*key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_typed_values_with_defaults() {
        let config = LoaderConfig::new()
            .with("strip", false)
            .with("delimiter", ";")
            .with("columns", json!(["a", "b"]));
        let mut reader = config.reader("test");
        assert!(!reader.bool("strip", true).expect("bool"));
        assert!(reader.bool("skip_empty", true).expect("bool"));
        assert_eq!(reader.delimiter("delimiter", b',').expect("delimiter"), b';');
        assert_eq!(
            reader.string_list("columns").expect("list"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(reader.unused().is_empty());
    }

    #[test]
    fn unknown_keys_are_reported_not_fatal() {
        let config = LoaderConfig::new().with("strip", true).with("bogus", 1);
        let mut reader = config.reader("text");
        reader.bool("strip", true).expect("bool");
        assert_eq!(reader.unused(), vec!["bogus"]);
        reader.finish();
    }

    #[test]
    fn wrong_type_for_known_key_is_an_error() {
        let config = LoaderConfig::new().with("strip", "yes");
        let err = config.reader("text").bool("strip", true).expect_err("type");
        assert!(matches!(err, AnyloadError::InvalidOption { loader: "text", .. }));
    }

    #[test]
    fn resize_pair_parses() {
        let config = LoaderConfig::new().with("resize", json!([32, 16]));
        assert_eq!(
            config.reader("image").u32_pair("resize").expect("pair"),
            Some((32, 16))
        );
        let bad = LoaderConfig::new().with("resize", json!([32]));
        assert!(bad.reader("image").u32_pair("resize").is_err());
    }

    #[test]
    fn null_values_count_as_absent() {
        let config = LoaderConfig::new().with("columns", Value::Null);
        let mut reader = config.reader("csv");
        assert_eq!(reader.string_list("columns").expect("list"), None);
    }
}
