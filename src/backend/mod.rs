//! Storage backends: moving bytes between a URI and the local filesystem.
//!
//! Each backend knows one storage category ([`crate::uri::UriKind`]). The
//! façade picks one with [`route`], materializes remote data under a staging
//! directory, and hands the local file to a format loader.
//!
//! | Backend          | URI shape              | download | upload | list | presign |
//! |------------------|------------------------|----------|--------|------|---------|
//! | `local`          | plain path             | identity | copy   | yes  | -       |
//! | `object-storage` | `s3://bucket/key`      | yes      | yes    | yes  | yes     |
//! | `remote-hub`     | `hf://owner/repo/path` | yes      | yes    | yes  | -       |
//! | `web`            | `http(s)://host/path`  | yes      | -      | -    | -       |

pub mod hub;
pub mod local;
pub mod object_storage;
pub mod runtime;
pub mod web;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::AnyloadError;
use crate::hub::HubApi;
use crate::security::ensure_allowed;
use crate::uri::{classify, UriKind};

pub use object_storage::{BucketConnector, S3Connector, MAX_PRESIGN_TTL};

/// Result of [`StorageBackend::download`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Materialized {
    /// Data is available at this local path.
    Local(PathBuf),
    /// The URI names a whole hub dataset; the dataset loader must read it
    /// straight from the hub instead of a local file.
    RemoteDataset(String),
}

impl Materialized {
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Materialized::Local(path) => Some(path),
            Materialized::RemoteDataset(_) => None,
        }
    }
}

/// One storage category.
pub trait StorageBackend {
    fn name(&self) -> &'static str;

    /// Whether `download` returns the caller's own path.
    fn is_local(&self) -> bool {
        false
    }

    /// Materialize `uri` under `target_dir` (the staging root when `None`).
    fn download(&self, uri: &str, target_dir: Option<&Path>) -> Result<Materialized, AnyloadError>;

    /// Copy `local_path` to `uri`.
    fn upload(&self, local_path: &Path, uri: &str) -> Result<(), AnyloadError>;

    /// Entries directly under `uri` (the local backend walks recursively).
    ///
    /// `extensions` are already normalized by [`normalize_extensions`]; an
    /// empty slice keeps everything.
    fn list(&self, uri: &str, extensions: &[String], relative: bool)
        -> Result<Vec<String>, AnyloadError>;

    fn exists(&self, uri: &str) -> Result<bool, AnyloadError>;

    /// A time-limited URL granting read access to `uri`.
    fn presign(&self, uri: &str, _ttl: Option<Duration>) -> Result<String, AnyloadError> {
        Err(AnyloadError::Unsupported {
            backend: self.name(),
            operation: "presign",
            reason: format!("cannot presign '{uri}'"),
        })
    }
}

/// Shared handles every backend needs.
#[derive(Clone)]
pub struct BackendContext {
    pub settings: Arc<Settings>,
    pub hub_api: Arc<dyn HubApi>,
    pub buckets: Arc<dyn BucketConnector>,
}

impl std::fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Pick the backend for `uri`.
pub fn route(uri: &str, ctx: &BackendContext) -> Box<dyn StorageBackend> {
    match classify(uri) {
        UriKind::ObjectStorage => Box::new(object_storage::ObjectStorageBackend::new(ctx.clone())),
        UriKind::RemoteHub => Box::new(hub::HubBackend::new(ctx.clone())),
        UriKind::Web => Box::new(web::WebBackend::new(ctx.clone())),
        UriKind::Local => Box::new(local::LocalBackend::new(ctx.clone())),
    }
}

/// Lowercase extension filters and strip any leading dot.
pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Case-insensitive suffix match of `name` against normalized `extensions`.
pub fn matches_extension(name: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    extensions.iter().any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Check `target_dir` (or the staging root) against the deny-list and create
/// it.
pub(crate) fn prepare_target_dir(
    target_dir: Option<&Path>,
    ctx: &BackendContext,
) -> Result<PathBuf, AnyloadError> {
    let dir = target_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.settings.staging_root.clone());
    ensure_allowed(&dir, &ctx.settings.deny_list)?;
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
