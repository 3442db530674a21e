//! Read-only `http(s)://` backend.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use super::{prepare_target_dir, BackendContext, Materialized, StorageBackend};
use crate::error::AnyloadError;

/// Suffixes recognised when a URL has no usable file name, in priority order.
const GUESSED_EXTENSIONS: &[&str] = &[
    ".jpeg", ".jpg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".svg", ".parquet", ".jsonl",
    ".json", ".csv", ".txt", ".yaml", ".yml", ".toml", ".pdf", ".xml", ".mp4", ".webm",
];

pub struct WebBackend {
    ctx: BackendContext,
}

impl WebBackend {
    pub fn new(ctx: BackendContext) -> Self {
        Self { ctx }
    }

    fn agent() -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(30)))
            .build();
        config.into()
    }

    fn read_only(&self, operation: &'static str) -> AnyloadError {
        AnyloadError::Unsupported {
            backend: self.name(),
            operation,
            reason: "web URLs are read-only".to_string(),
        }
    }
}

/// Parse `uri` and require an http(s) scheme with a host.
pub fn validate_web_uri(uri: &str) -> Result<Url, AnyloadError> {
    let invalid = |message: String| AnyloadError::InvalidUri {
        uri: uri.to_string(),
        message,
    };
    let url = Url::parse(uri.trim()).map_err(|source| invalid(source.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Local file name for a download of `url`.
///
/// The final path segment is used when it has an extension; otherwise the
/// name is derived from a hash of the URL plus a suffix guessed from it.
pub fn download_file_name(url: &Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if !last.is_empty() && last.contains('.') {
        return last.to_string();
    }

    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    let lower = url.as_str().to_ascii_lowercase();
    let extension = GUESSED_EXTENSIONS
        .iter()
        .find(|ext| lower.contains(*ext))
        .copied()
        .unwrap_or_default();
    format!("http_download_{}{extension}", &digest[..8])
}

impl StorageBackend for WebBackend {
    fn name(&self) -> &'static str {
        "web"
    }

    fn download(&self, uri: &str, target_dir: Option<&Path>) -> Result<Materialized, AnyloadError> {
        let url = validate_web_uri(uri)?;
        let dir = prepare_target_dir(target_dir, &self.ctx)?;
        let local = dir.join(download_file_name(&url));

        let transport = |message: String| AnyloadError::Transport {
            uri: uri.to_string(),
            message,
        };

        debug!(uri, local = %local.display(), "fetching URL");
        let mut response = Self::agent()
            .get(url.as_str())
            .call()
            .map_err(|source| transport(source.to_string()))?;

        let written = (|| -> io::Result<u64> {
            let mut writer = BufWriter::new(File::create(&local)?);
            let copied = io::copy(&mut response.body_mut().as_reader(), &mut writer)?;
            writer.flush()?;
            Ok(copied)
        })();

        match written {
            Ok(bytes) => {
                info!(uri, bytes, "downloaded URL");
                Ok(Materialized::Local(local))
            }
            Err(error) => {
                let _ = fs::remove_file(&local);
                Err(transport(error.to_string()))
            }
        }
    }

    fn upload(&self, _local_path: &Path, _uri: &str) -> Result<(), AnyloadError> {
        Err(self.read_only("upload"))
    }

    fn list(
        &self,
        _uri: &str,
        _extensions: &[String],
        _relative: bool,
    ) -> Result<Vec<String>, AnyloadError> {
        Err(self.read_only("list"))
    }

    fn exists(&self, uri: &str) -> Result<bool, AnyloadError> {
        let url = validate_web_uri(uri)?;
        match Self::agent().head(url.as_str()).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::StatusCode(_)) => Ok(false),
            Err(source) => Err(AnyloadError::Transport {
                uri: uri.to_string(),
                message: source.to_string(),
            }),
        }
    }
}
