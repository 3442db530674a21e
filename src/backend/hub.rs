//! Single-file transfers against `hf://` repositories.
//!
//! Whole-dataset load/save lives in [`crate::hub`]; this backend only signals
//! it with [`Materialized::RemoteDataset`].

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::{matches_extension, prepare_target_dir, BackendContext, Materialized, StorageBackend};
use crate::error::AnyloadError;
use crate::hub::{is_under, HubUri};

pub struct HubBackend {
    ctx: BackendContext,
}

impl HubBackend {
    pub fn new(ctx: BackendContext) -> Self {
        Self { ctx }
    }

    fn path_in_repo(uri: &HubUri, local_path: &Path) -> Result<String, AnyloadError> {
        let subpath = uri.subpath.trim_start_matches('/');
        if !subpath.is_empty() && !subpath.ends_with('/') {
            return Ok(subpath.to_string());
        }
        let name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| AnyloadError::InvalidUri {
                uri: uri.uri_for(subpath),
                message: "cannot derive a file name for the upload".to_string(),
            })?;
        Ok(format!("{subpath}{name}"))
    }
}

impl StorageBackend for HubBackend {
    fn name(&self) -> &'static str {
        "remote-hub"
    }

    fn download(&self, uri: &str, target_dir: Option<&Path>) -> Result<Materialized, AnyloadError> {
        let parsed = HubUri::parse(uri)?;
        if self.ctx.settings.hub_path_rule.is_dataset(&parsed.subpath) {
            debug!(uri, "URI names a whole dataset");
            return Ok(Materialized::RemoteDataset(uri.to_string()));
        }

        let path = parsed.trimmed_subpath();
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let dir = prepare_target_dir(target_dir, &self.ctx)?;
        let cached = self.ctx.hub_api.download_file(&parsed.repo, path)?;
        let local = dir.join(file_name);
        fs::copy(&cached, &local)?;
        info!(uri, local = %local.display(), "downloaded hub file");
        Ok(Materialized::Local(local))
    }

    fn upload(&self, local_path: &Path, uri: &str) -> Result<(), AnyloadError> {
        let parsed = HubUri::parse(uri)?;
        let path_in_repo = Self::path_in_repo(&parsed, local_path)?;
        self.ctx.hub_api.create_repo(&parsed.repo, true)?;
        self.ctx.hub_api.upload_file(
            &parsed.repo,
            local_path,
            &path_in_repo,
            &format!("Upload {path_in_repo}"),
        )?;
        info!(repo = %parsed.repo.id, path = %path_in_repo, "uploaded hub file");
        Ok(())
    }

    fn list(
        &self,
        uri: &str,
        extensions: &[String],
        relative: bool,
    ) -> Result<Vec<String>, AnyloadError> {
        let parsed = HubUri::parse(uri)?;
        let prefix = parsed.trimmed_subpath();
        let strip = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };

        let mut entries: Vec<String> = self
            .ctx
            .hub_api
            .list_files(&parsed.repo)?
            .into_iter()
            .filter(|path| is_under(path, prefix))
            .filter(|path| matches_extension(path, extensions))
            .map(|path| {
                if relative {
                    path.strip_prefix(&strip).unwrap_or(&path).to_string()
                } else {
                    parsed.uri_for(&path)
                }
            })
            .collect();
        entries.sort();
        Ok(entries)
    }

    fn exists(&self, uri: &str) -> Result<bool, AnyloadError> {
        let parsed = HubUri::parse(uri)?;
        let path = parsed.trimmed_subpath();
        let files = self.ctx.hub_api.list_files(&parsed.repo)?;
        if path.is_empty() {
            return Ok(true);
        }
        Ok(files.iter().any(|file| file == path || is_under(file, path)))
    }
}
