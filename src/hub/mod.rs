//! Remote dataset hub support.
//!
//! This module owns hub-specific concerns: URI parsing, the client seam
//! ([`HubApi`]), whole-dataset load/save and the dataset card region that
//! `save` regenerates. Single-file transfers go through
//! `crate::backend::hub`.

mod card;
mod client;
mod dataset;

pub use card::{update_readme_region, AUTODOC_BEGIN, AUTODOC_END};
pub use client::HfHubApi;
pub use dataset::{
    infer_split_from_path, load_dataset, normalize_split_name, save_dataset, DatasetLoadOptions,
    DatasetSaveOptions, RecordStream,
};
pub(crate) use dataset::is_under;

use std::path::{Path, PathBuf};

use crate::error::AnyloadError;
use crate::uri::HUB_PREFIX;

/// Kind of hub repository.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RepoKind {
    #[default]
    Dataset,
    Model,
    Space,
}

impl RepoKind {
    /// Plural path segment used by the hub REST API (`datasets`, ...).
    pub fn api_segment(self) -> &'static str {
        match self {
            RepoKind::Dataset => "datasets",
            RepoKind::Model => "models",
            RepoKind::Space => "spaces",
        }
    }

    /// Singular name used when creating repositories.
    pub fn type_name(self) -> &'static str {
        match self {
            RepoKind::Dataset => "dataset",
            RepoKind::Model => "model",
            RepoKind::Space => "space",
        }
    }

    /// Prefix of the repository in git URLs; models have none.
    pub fn url_prefix(self) -> &'static str {
        match self {
            RepoKind::Dataset => "datasets/",
            RepoKind::Model => "",
            RepoKind::Space => "spaces/",
        }
    }
}

/// A hub repository at an optional revision.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HubRepo {
    pub kind: RepoKind,
    /// `owner/name`.
    pub id: String,
    pub revision: Option<String>,
}

impl HubRepo {
    pub fn new(kind: RepoKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    /// Revision to read from or commit to.
    pub fn revision_or_main(&self) -> &str {
        self.revision.as_deref().unwrap_or("main")
    }
}

/// A parsed `hf://` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubUri {
    pub repo: HubRepo,
    /// Path inside the repository, possibly empty; a trailing `/` is kept.
    pub subpath: String,
}

impl HubUri {
    /// Parse `hf://[datasets/|models/|spaces/]owner/repo[@revision][/subpath]`.
    pub fn parse(uri: &str) -> Result<Self, AnyloadError> {
        let invalid = |message: &str| AnyloadError::InvalidUri {
            uri: uri.to_string(),
            message: message.to_string(),
        };

        let rest = uri
            .strip_prefix(HUB_PREFIX)
            .ok_or_else(|| invalid("expected an hf:// URI"))?;

        let (kind, rest) = if let Some(rest) = rest.strip_prefix("datasets/") {
            (RepoKind::Dataset, rest)
        } else if let Some(rest) = rest.strip_prefix("models/") {
            (RepoKind::Model, rest)
        } else if let Some(rest) = rest.strip_prefix("spaces/") {
            (RepoKind::Space, rest)
        } else {
            (RepoKind::Dataset, rest)
        };

        let mut parts = rest.splitn(3, '/');
        let owner = parts.next().unwrap_or_default();
        let name_and_revision = parts.next().unwrap_or_default();
        let subpath = parts.next().unwrap_or_default();

        let (name, revision) = match name_and_revision.split_once('@') {
            Some((name, revision)) if !revision.is_empty() => (name, Some(revision.to_string())),
            Some(_) => return Err(invalid("empty revision after '@'")),
            None => (name_and_revision, None),
        };

        if owner.is_empty() || name.is_empty() {
            return Err(invalid("expected hf://<owner>/<repo>[/<path>]"));
        }
        if subpath.split('/').any(|segment| segment == "..") {
            return Err(invalid("'..' segments are not allowed"));
        }

        Ok(Self {
            repo: HubRepo::new(kind, format!("{owner}/{name}")).with_revision(revision),
            subpath: subpath.to_string(),
        })
    }

    /// Sub-path with surrounding slashes removed.
    pub fn trimmed_subpath(&self) -> &str {
        self.subpath.trim_matches('/')
    }

    /// Build the URI of `path` inside the same repository.
    pub fn uri_for(&self, path: &str) -> String {
        let kind = match self.repo.kind {
            RepoKind::Dataset => "",
            other => other.url_prefix(),
        };
        let revision = self
            .repo
            .revision
            .as_deref()
            .map(|rev| format!("@{rev}"))
            .unwrap_or_default();
        format!("{HUB_PREFIX}{kind}{}{revision}/{path}", self.repo.id)
    }
}

/// Client capabilities the hub backend and dataset loader rely on.
///
/// Implementations must be shareable across the worker threads of
/// `concurrent_load`.
pub trait HubApi: Send + Sync {
    /// Every file path in the repository, recursively.
    fn list_files(&self, repo: &HubRepo) -> Result<Vec<String>, AnyloadError>;

    /// Fetch one file and return a local path the caller may read but must
    /// not modify or delete.
    fn download_file(&self, repo: &HubRepo, path: &str) -> Result<PathBuf, AnyloadError>;

    /// Create the repository; an existing repository is not an error.
    fn create_repo(&self, repo: &HubRepo, private: bool) -> Result<(), AnyloadError>;

    /// Commit `local_path` to `path_in_repo`.
    fn upload_file(
        &self,
        repo: &HubRepo,
        local_path: &Path,
        path_in_repo: &str,
        message: &str,
    ) -> Result<(), AnyloadError>;
}
