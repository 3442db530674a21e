//! Plain filesystem paths.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::{matches_extension, BackendContext, Materialized, StorageBackend};
use crate::error::AnyloadError;
use crate::security::{absolute_lexical, ensure_allowed};

pub struct LocalBackend {
    ctx: BackendContext,
}

impl LocalBackend {
    pub fn new(ctx: BackendContext) -> Self {
        Self { ctx }
    }
}

impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn is_local(&self) -> bool {
        true
    }

    /// Local data is already materialized; no I/O happens here.
    fn download(&self, uri: &str, _target_dir: Option<&Path>) -> Result<Materialized, AnyloadError> {
        Ok(Materialized::Local(PathBuf::from(uri)))
    }

    fn upload(&self, local_path: &Path, uri: &str) -> Result<(), AnyloadError> {
        let destination = Path::new(uri);
        ensure_allowed(destination, &self.ctx.settings.deny_list)?;
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        if absolute_lexical(local_path)? == absolute_lexical(destination)? {
            debug!(path = %destination.display(), "source and destination are the same file");
            return Ok(());
        }
        let bytes = fs::copy(local_path, destination)?;
        info!(
            from = %local_path.display(),
            to = %destination.display(),
            bytes,
            "copied file"
        );
        Ok(())
    }

    fn list(
        &self,
        uri: &str,
        extensions: &[String],
        relative: bool,
    ) -> Result<Vec<String>, AnyloadError> {
        let root = Path::new(uri);
        if !root.is_dir() {
            debug!(path = %root.display(), "not a directory; nothing to list");
            return Ok(Vec::new());
        }
        let absolute_root = absolute_lexical(root)?;

        let mut entries = Vec::new();
        for entry in WalkDir::new(&absolute_root).follow_links(true) {
            let entry = entry.map_err(|source| {
                AnyloadError::Io(
                    source
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !matches_extension(&name, extensions) {
                continue;
            }

            let path = entry.path();
            let rendered = if relative {
                path.strip_prefix(&absolute_root)
                    .unwrap_or(path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            } else {
                path.to_string_lossy().into_owned()
            };
            entries.push(rendered);
        }
        entries.sort();
        Ok(entries)
    }

    fn exists(&self, uri: &str) -> Result<bool, AnyloadError> {
        Ok(Path::new(uri).exists())
    }
}
