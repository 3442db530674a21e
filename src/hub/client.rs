//! Production [`HubApi`] backed by the Hugging Face Hub.
//!
//! Reads (listing and file download) go through `hf-hub`, which also owns the
//! local file cache. Writes use the hub's commit REST API over `ureq`: small
//! files are inlined as base64, files the hub routes to LFS are uploaded
//! through the LFS batch API first and then referenced by their sha256.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{HubApi, HubRepo, RepoKind};
use crate::config::Settings;
use crate::error::AnyloadError;

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";
const SAMPLE_BYTES: usize = 512;

/// Hub client for a single endpoint and token.
#[derive(Clone, Debug)]
pub struct HfHubApi {
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: String,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsError {
    code: u16,
    message: String,
}

impl HfHubApi {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.hub_endpoint.clone(), settings.hub_token.clone())
    }

    fn repo_handle(&self, repo: &HubRepo) -> Result<ApiRepo, AnyloadError> {
        let mut builder = ApiBuilder::new()
            .with_progress(false)
            .with_endpoint(self.endpoint.clone());
        if self.token.is_some() {
            builder = builder.with_token(self.token.clone());
        }

        let api = builder.build().map_err(|source| hub_error(repo, source))?;
        let repo_type = match repo.kind {
            RepoKind::Dataset => RepoType::Dataset,
            RepoKind::Model => RepoType::Model,
            RepoKind::Space => RepoType::Space,
        };
        Ok(api.repo(Repo::with_revision(
            repo.id.clone(),
            repo_type,
            repo.revision_or_main().to_string(),
        )))
    }

    fn agent(&self) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(30)))
            .http_status_as_error(false)
            .build();
        config.into()
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        match self.token.as_deref() {
            Some(token) => request.header("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn repo_api_url(&self, repo: &HubRepo, action: &str) -> String {
        let revision: String =
            url::form_urlencoded::byte_serialize(repo.revision_or_main().as_bytes()).collect();
        format!(
            "{}/api/{}/{}/{action}/{revision}",
            self.endpoint,
            repo.kind.api_segment(),
            repo.id
        )
    }

    fn upload_mode(
        &self,
        agent: &ureq::Agent,
        repo: &HubRepo,
        path_in_repo: &str,
        bytes: &[u8],
    ) -> Result<String, AnyloadError> {
        let sample = &bytes[..bytes.len().min(SAMPLE_BYTES)];
        let body = json!({
            "files": [{
                "path": path_in_repo,
                "size": bytes.len(),
                "sample": base64::engine::general_purpose::STANDARD.encode(sample),
            }]
        });
        let request = self.authorize(agent.post(&self.repo_api_url(repo, "preupload")));
        let response = request
            .send_json(&body)
            .map_err(|source| hub_error(repo, source))?;
        let mut response = check_status(repo, "preupload", response)?;
        let parsed: PreuploadResponse = response
            .body_mut()
            .read_json()
            .map_err(|source| hub_error(repo, source))?;

        Ok(parsed
            .files
            .into_iter()
            .find(|file| file.path == path_in_repo)
            .map(|file| file.upload_mode)
            .unwrap_or_else(|| "regular".to_string()))
    }

    fn upload_lfs(
        &self,
        agent: &ureq::Agent,
        repo: &HubRepo,
        bytes: &[u8],
        oid: &str,
    ) -> Result<(), AnyloadError> {
        let url = format!(
            "{}/{}{}.git/info/lfs/objects/batch",
            self.endpoint,
            repo.kind.url_prefix(),
            repo.id
        );
        let body = json!({
            "operation": "upload",
            "transfers": ["basic"],
            "objects": [{"oid": oid, "size": bytes.len()}],
            "hash_algo": "sha256",
        });
        let payload = serde_json::to_vec(&body).map_err(|source| hub_error(repo, source))?;
        let request = self
            .authorize(agent.post(&url))
            .header("Accept", LFS_CONTENT_TYPE)
            .content_type(LFS_CONTENT_TYPE);
        let response = request
            .send(&payload[..])
            .map_err(|source| hub_error(repo, source))?;
        let mut response = check_status(repo, "LFS batch", response)?;
        let batch: LfsBatchResponse = response
            .body_mut()
            .read_json()
            .map_err(|source| hub_error(repo, source))?;

        let Some(object) = batch.objects.into_iter().next() else {
            return Err(hub_error(repo, "LFS batch response listed no objects"));
        };
        if let Some(error) = object.error {
            return Err(hub_error(
                repo,
                format!("LFS error {}: {}", error.code, error.message),
            ));
        }
        let Some(actions) = object.actions else {
            debug!(repo = %repo.id, oid, "LFS object already present");
            return Ok(());
        };

        if let Some(upload) = actions.upload {
            if upload.header.contains_key("chunk_size") {
                return Err(AnyloadError::Unsupported {
                    backend: "remote-hub",
                    operation: "upload",
                    reason: "multipart LFS uploads are not supported".to_string(),
                });
            }
            let mut request = agent.put(&upload.href);
            for (name, value) in &upload.header {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request
                .send(bytes)
                .map_err(|source| hub_error(repo, source))?;
            check_status(repo, "LFS upload", response)?;
        }

        if let Some(verify) = actions.verify {
            let mut request = self.authorize(agent.post(&verify.href));
            for (name, value) in &verify.header {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request
                .send_json(&json!({"oid": oid, "size": bytes.len()}))
                .map_err(|source| hub_error(repo, source))?;
            check_status(repo, "LFS verify", response)?;
        }
        Ok(())
    }
}

impl HubApi for HfHubApi {
    fn list_files(&self, repo: &HubRepo) -> Result<Vec<String>, AnyloadError> {
        let info = self
            .repo_handle(repo)?
            .info()
            .map_err(|source| hub_error(repo, source))?;
        Ok(info
            .siblings
            .into_iter()
            .map(|sibling| sibling.rfilename)
            .collect())
    }

    fn download_file(&self, repo: &HubRepo, path: &str) -> Result<PathBuf, AnyloadError> {
        info!(repo = %repo.id, path, "downloading hub file");
        self.repo_handle(repo)?
            .get(path)
            .map_err(|source| AnyloadError::HubApi {
                repo_id: repo.id.clone(),
                message: format!("failed downloading '{path}': {source}"),
            })
    }

    fn create_repo(&self, repo: &HubRepo, private: bool) -> Result<(), AnyloadError> {
        let (organization, name) = match repo.id.split_once('/') {
            Some((organization, name)) => (Some(organization), name),
            None => (None, repo.id.as_str()),
        };
        let mut body = json!({"name": name, "private": private});
        if let Some(organization) = organization {
            body["organization"] = Value::from(organization);
        }
        if repo.kind != RepoKind::Model {
            body["type"] = Value::from(repo.kind.type_name());
        }

        let agent = self.agent();
        let url = format!("{}/api/repos/create", self.endpoint);
        let response = self
            .authorize(agent.post(&url))
            .send_json(&body)
            .map_err(|source| hub_error(repo, source))?;
        if response.status().as_u16() == 409 {
            debug!(repo = %repo.id, "repository already exists");
            return Ok(());
        }
        check_status(repo, "create repository", response)?;
        info!(repo = %repo.id, private, "created repository");
        Ok(())
    }

    fn upload_file(
        &self,
        repo: &HubRepo,
        local_path: &Path,
        path_in_repo: &str,
        message: &str,
    ) -> Result<(), AnyloadError> {
        let bytes = std::fs::read(local_path)?;
        let agent = self.agent();

        let operation = if self.upload_mode(&agent, repo, path_in_repo, &bytes)? == "lfs" {
            let oid = hex::encode(Sha256::digest(&bytes));
            self.upload_lfs(&agent, repo, &bytes, &oid)?;
            json!({
                "key": "lfsFile",
                "value": {"path": path_in_repo, "algo": "sha256", "oid": oid},
            })
        } else {
            json!({
                "key": "file",
                "value": {
                    "content": base64::engine::general_purpose::STANDARD.encode(&bytes),
                    "path": path_in_repo,
                    "encoding": "base64",
                },
            })
        };

        let header = json!({
            "key": "header",
            "value": {"summary": message, "description": ""},
        });
        let body = format!("{header}\n{operation}\n");

        let response = self
            .authorize(agent.post(&self.repo_api_url(repo, "commit")))
            .content_type("application/x-ndjson")
            .send(body.as_bytes())
            .map_err(|source| hub_error(repo, source))?;
        check_status(repo, "commit", response)?;
        info!(
            repo = %repo.id,
            path = path_in_repo,
            bytes = bytes.len(),
            "committed file to hub"
        );
        Ok(())
    }
}

fn check_status(
    repo: &HubRepo,
    step: &str,
    mut response: http::Response<ureq::Body>,
) -> Result<http::Response<ureq::Body>, AnyloadError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(AnyloadError::HubApi {
        repo_id: repo.id.clone(),
        message: format!("{step} failed with HTTP {status}: {}", body.trim()),
    })
}

fn hub_error(repo: &HubRepo, source: impl ToString) -> AnyloadError {
    AnyloadError::HubApi {
        repo_id: repo.id.clone(),
        message: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_normalized() {
        let api = HfHubApi::new("https://hub.example/", None);
        assert_eq!(api.endpoint, "https://hub.example");
    }

    #[test]
    fn repo_api_url_encodes_revision() {
        let api = HfHubApi::new("https://hub.example", None);
        let repo = HubRepo::new(RepoKind::Dataset, "org/ds")
            .with_revision(Some("refs/pr/1".to_string()));
        assert_eq!(
            api.repo_api_url(&repo, "commit"),
            "https://hub.example/api/datasets/org/ds/commit/refs%2Fpr%2F1"
        );
        let model = HubRepo::new(RepoKind::Model, "org/m");
        assert_eq!(
            api.repo_api_url(&model, "preupload"),
            "https://hub.example/api/models/org/m/preupload/main"
        );
    }

    #[test]
    fn preupload_response_parses() {
        let parsed: PreuploadResponse = serde_json::from_value(json!({
            "files": [{"path": "a.parquet", "uploadMode": "lfs", "shouldIgnore": false}]
        }))
        .expect("parse");
        assert_eq!(parsed.files[0].upload_mode, "lfs");
    }

    #[test]
    fn lfs_batch_without_actions_parses() {
        let parsed: LfsBatchResponse =
            serde_json::from_value(json!({"objects": [{"oid": "abc", "size": 3}]})).expect("parse");
        assert!(parsed.objects[0].actions.is_none());
    }
}
