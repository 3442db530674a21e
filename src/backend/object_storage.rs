//! `s3://bucket/key` backend on top of `object_store`.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, info, warn};

use super::runtime::run_blocking;
use super::{matches_extension, prepare_target_dir, BackendContext, Materialized, StorageBackend};
use crate::error::AnyloadError;
use crate::security::ensure_allowed;

/// Longest lifetime a presigned URL may have.
pub const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Opens stores for buckets.
///
/// Clients are created on first use inside an operation, so missing
/// credentials surface from `download`/`upload`/`list`, not from routing.
pub trait BucketConnector: Send + Sync {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, AnyloadError>;

    fn signer(&self, bucket: &str) -> Result<Arc<dyn Signer>, AnyloadError>;
}

/// Connects to Amazon S3 (or an S3-compatible service) using `AWS_*`
/// environment variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct S3Connector;

impl S3Connector {
    fn build(&self, bucket: &str) -> Result<object_store::aws::AmazonS3, AnyloadError> {
        AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|source| AnyloadError::ObjectStore {
                uri: format!("s3://{bucket}"),
                source,
            })
    }
}

impl BucketConnector for S3Connector {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, AnyloadError> {
        Ok(Arc::new(self.build(bucket)?))
    }

    fn signer(&self, bucket: &str) -> Result<Arc<dyn Signer>, AnyloadError> {
        Ok(Arc::new(self.build(bucket)?))
    }
}

/// Bucket and key of an `s3://` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    /// Object key as written in the URI, possibly empty or ending in `/`.
    pub key: String,
}

impl S3Location {
    pub fn parse(uri: &str) -> Result<Self, AnyloadError> {
        let invalid = |message: &str| AnyloadError::InvalidUri {
            uri: uri.to_string(),
            message: message.to_string(),
        };

        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| invalid("expected s3://<bucket>/<key>"))?;
        if !scheme.eq_ignore_ascii_case("s3") {
            return Err(invalid("expected the s3 scheme"));
        }
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(invalid("missing bucket name"));
        }
        if key.split('/').any(|segment| segment == "..") {
            return Err(invalid("'..' segments are not allowed"));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    fn object_path(&self, uri: &str) -> Result<ObjectPath, AnyloadError> {
        ObjectPath::parse(&self.key).map_err(|source| AnyloadError::InvalidUri {
            uri: uri.to_string(),
            message: source.to_string(),
        })
    }

    /// Final key segment, if the key names an object.
    fn file_name(&self) -> Option<&str> {
        self.key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }
}

/// Object-storage backend.
pub struct ObjectStorageBackend {
    ctx: BackendContext,
}

impl ObjectStorageBackend {
    pub fn new(ctx: BackendContext) -> Self {
        Self { ctx }
    }

    fn store_error(uri: &str) -> impl Fn(object_store::Error) -> AnyloadError + '_ {
        move |source| AnyloadError::ObjectStore {
            uri: uri.to_string(),
            source,
        }
    }
}

impl StorageBackend for ObjectStorageBackend {
    fn name(&self) -> &'static str {
        "object-storage"
    }

    fn download(&self, uri: &str, target_dir: Option<&Path>) -> Result<Materialized, AnyloadError> {
        let location = S3Location::parse(uri)?;
        let file_name = location.file_name().ok_or_else(|| AnyloadError::InvalidUri {
            uri: uri.to_string(),
            message: "URI names a prefix, not an object".to_string(),
        })?;
        let object_path = location.object_path(uri)?;
        let dir = prepare_target_dir(target_dir, &self.ctx)?;
        let local = dir.join(file_name);

        let store = self.ctx.buckets.store(&location.bucket)?;
        info!(uri, local = %local.display(), "downloading object");
        let bytes = run_blocking(|| async move {
            let result = store
                .get(&object_path)
                .await
                .map_err(Self::store_error(uri))?;
            result.bytes().await.map_err(Self::store_error(uri))
        })?;

        if let Err(error) = fs::write(&local, &bytes) {
            let _ = fs::remove_file(&local);
            return Err(AnyloadError::Io(error));
        }
        debug!(uri, bytes = bytes.len(), "object downloaded");
        Ok(Materialized::Local(local))
    }

    fn upload(&self, local_path: &Path, uri: &str) -> Result<(), AnyloadError> {
        ensure_allowed(local_path, &self.ctx.settings.deny_list)?;
        let mut location = S3Location::parse(uri)?;
        if location.file_name().is_none() {
            let name = local_path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| AnyloadError::InvalidUri {
                    uri: uri.to_string(),
                    message: "cannot derive an object name".to_string(),
                })?;
            location.key = format!("{}{name}", location.key);
        }
        let object_path = location.object_path(uri)?;

        let data = fs::read(local_path)?;
        let size = data.len();
        let store = self.ctx.buckets.store(&location.bucket)?;
        run_blocking(|| async move {
            store
                .put(&object_path, PutPayload::from(data))
                .await
                .map_err(Self::store_error(uri))
        })?;
        info!(uri, bytes = size, "uploaded object");
        Ok(())
    }

    fn list(
        &self,
        uri: &str,
        extensions: &[String],
        relative: bool,
    ) -> Result<Vec<String>, AnyloadError> {
        let location = S3Location::parse(uri)?;
        let prefix = location.key.trim_matches('/');
        let prefix_path = if prefix.is_empty() {
            None
        } else {
            Some(ObjectPath::parse(prefix).map_err(|source| AnyloadError::InvalidUri {
                uri: uri.to_string(),
                message: source.to_string(),
            })?)
        };

        let store = self.ctx.buckets.store(&location.bucket)?;
        let listing = run_blocking(|| async move {
            store
                .list_with_delimiter(prefix_path.as_ref())
                .await
                .map_err(Self::store_error(uri))
        })?;

        let strip = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        let render = |key: &str| -> String {
            if relative {
                key.strip_prefix(&strip).unwrap_or(key).to_string()
            } else {
                format!("s3://{}/{key}", location.bucket)
            }
        };

        let mut entries: Vec<String> = listing
            .common_prefixes
            .iter()
            .map(|sub| format!("{}/", render(sub.as_ref())))
            .collect();
        entries.extend(
            listing
                .objects
                .iter()
                .map(|meta| meta.location.as_ref())
                .filter(|key| matches_extension(key, extensions))
                .map(render),
        );
        entries.sort();
        debug!(uri, entries = entries.len(), "listed prefix");
        Ok(entries)
    }

    fn exists(&self, uri: &str) -> Result<bool, AnyloadError> {
        let location = S3Location::parse(uri)?;
        let object_path = location.object_path(uri)?;
        let store = self.ctx.buckets.store(&location.bucket)?;
        run_blocking(|| async move {
            match store.head(&object_path).await {
                Ok(_) => Ok(true),
                Err(object_store::Error::NotFound { .. }) => Ok(false),
                Err(source) => Err(Self::store_error(uri)(source)),
            }
        })
    }

    fn presign(&self, uri: &str, ttl: Option<Duration>) -> Result<String, AnyloadError> {
        let location = S3Location::parse(uri)?;
        if location.file_name().is_none() {
            return Err(AnyloadError::InvalidUri {
                uri: uri.to_string(),
                message: "URI names a prefix, not an object".to_string(),
            });
        }
        let object_path = location.object_path(uri)?;

        let mut ttl = ttl.unwrap_or(MAX_PRESIGN_TTL);
        if ttl > MAX_PRESIGN_TTL {
            warn!(
                uri,
                requested_secs = ttl.as_secs(),
                "presign TTL capped at 7 days"
            );
            ttl = MAX_PRESIGN_TTL;
        }

        let signer = self.ctx.buckets.signer(&location.bucket)?;
        let url = run_blocking(|| async move {
            signer
                .signed_url(http::Method::GET, &object_path, ttl)
                .await
                .map_err(Self::store_error(uri))
        })?;
        Ok(url.to_string())
    }
}
