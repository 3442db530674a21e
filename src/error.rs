use std::path::PathBuf;
use thiserror::Error;

/// The main error type for anyload operations.
#[derive(Debug, Error)]
pub enum AnyloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No loader found for format '{extension}' ({target})")]
    NoLoader { target: String, extension: String },

    #[error("Invalid URI '{uri}': {message}")]
    InvalidUri { uri: String, message: String },

    #[error("Refusing to use restricted path {path}: it is under deny-listed {blocked}")]
    PermissionDenied { path: PathBuf, blocked: PathBuf },

    #[error("{backend} backend does not support {operation}: {reason}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
        reason: String,
    },

    #[error("Transfer failed for {uri}: {message}")]
    Transport { uri: String, message: String },

    #[error("Object storage error for {uri}: {source}")]
    ObjectStore {
        uri: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Hub API error for {repo_id}: {message}")]
    HubApi { repo_id: String, message: String },

    #[error("Failed to parse JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse CSV from {path}: {source}")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write CSV to {path}: {source}")]
    CsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image {path}: {source}")]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to parse {format} from {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("Failed to write {format} to {path}: {message}")]
    Write {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("Cannot save {found} data as {format}")]
    PayloadMismatch {
        format: &'static str,
        found: &'static str,
    },

    #[error("Invalid value for option '{key}' of the {loader} loader: {message}")]
    InvalidOption {
        loader: &'static str,
        key: String,
        message: String,
    },
}
