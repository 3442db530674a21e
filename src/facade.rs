//! The `Anyload` façade: one value owning the settings, clients and staging
//! area that every operation shares.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{
    normalize_extensions, route, BackendContext, BucketConnector, Materialized, S3Connector,
};
use crate::config::Settings;
use crate::error::AnyloadError;
use crate::formats::{format_for_path, no_loader, route_for_path, Format, LoaderConfig, LoaderRoute};
use crate::hub::{load_dataset, save_dataset, HfHubApi, HubApi, HubUri};
use crate::payload::Payload;
use crate::security::ensure_allowed;
use crate::staging::StagingArea;
use crate::uri::final_segment;

/// Entry point for loading and saving data by URI.
///
/// Cheap to clone; clones share clients.
#[derive(Clone, Debug)]
pub struct Anyload {
    ctx: BackendContext,
    staging: StagingArea,
}

impl Anyload {
    /// Façade with the production hub client and S3 connector.
    pub fn new(settings: Settings) -> Self {
        let hub_api: Arc<dyn HubApi> = Arc::new(HfHubApi::from_settings(&settings));
        let staging =
            StagingArea::new(&settings.staging_root).with_deny_list(settings.deny_list.clone());
        Self {
            ctx: BackendContext {
                settings: Arc::new(settings),
                hub_api,
                buckets: Arc::new(S3Connector),
            },
            staging,
        }
    }

    /// Façade configured from the process environment.
    pub fn from_env() -> Self {
        Self::new(Settings::from_env())
    }

    /// Replace the hub client.
    pub fn with_hub_api(mut self, hub_api: Arc<dyn HubApi>) -> Self {
        self.ctx.hub_api = hub_api;
        self
    }

    /// Replace the object-storage connector.
    pub fn with_bucket_connector(mut self, buckets: Arc<dyn BucketConnector>) -> Self {
        self.ctx.buckets = buckets;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    pub fn load(&self, uri: &str) -> Result<Payload, AnyloadError> {
        self.load_with(uri, &LoaderConfig::new())
    }

    /// Load `uri` into memory.
    ///
    /// Remote data is staged in a private directory that is removed before
    /// this returns; every payload is fully materialized by then.
    pub fn load_with(&self, uri: &str, config: &LoaderConfig) -> Result<Payload, AnyloadError> {
        let backend = route(uri, &self.ctx);
        debug!(uri, backend = backend.name(), "resolved backend");

        if backend.is_local() {
            let format = format_for_path(uri)?;
            debug!(uri, format = format.name(), "resolved loader");
            return format.load(Path::new(uri), config);
        }

        let stage = self.staging.stage()?;
        match backend.download(uri, Some(stage.path()))? {
            Materialized::RemoteDataset(original) => {
                let hub_uri = HubUri::parse(&original)?;
                load_dataset(Arc::clone(&self.ctx.hub_api), &hub_uri, config)
            }
            Materialized::Local(local) => {
                let format = staged_format(&local, uri)?;
                debug!(uri, format = format.name(), "resolved loader");
                format.load(&local, config)
            }
        }
    }

    pub fn save(&self, payload: Payload, uri: &str) -> Result<(), AnyloadError> {
        self.save_with(payload, uri, &LoaderConfig::new())
    }

    /// Save `payload` to `uri`; the format follows the extension.
    pub fn save_with(
        &self,
        payload: Payload,
        uri: &str,
        config: &LoaderConfig,
    ) -> Result<(), AnyloadError> {
        let format = match route_for_path(uri, self.ctx.settings.hub_path_rule) {
            Some(LoaderRoute::File(format)) => format,
            Some(LoaderRoute::HubDataset) => {
                let hub_uri = HubUri::parse(uri)?;
                return save_dataset(
                    self.ctx.hub_api.as_ref(),
                    &hub_uri,
                    payload,
                    config,
                    &self.staging,
                );
            }
            None => return Err(no_loader(uri)),
        };

        let backend = route(uri, &self.ctx);
        if backend.is_local() {
            let path = Path::new(uri);
            ensure_allowed(path, &self.ctx.settings.deny_list)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            format.save(path, payload, config)?;
            info!(path = uri, format = format.name(), "saved");
            return Ok(());
        }

        if format == Format::Text && config.get("append") == Some(&Value::Bool(true)) {
            return Err(AnyloadError::Unsupported {
                backend: backend.name(),
                operation: "append",
                reason: "remote objects can only be replaced".to_string(),
            });
        }

        let stage = self.staging.stage()?;
        let local = stage.file(final_segment(uri));
        format.save(&local, payload, config)?;
        backend.upload(&local, uri)?;
        info!(uri, format = format.name(), backend = backend.name(), "saved");
        Ok(())
    }

    /// Entries under `uri`, optionally filtered by extension (`"jpg"` or
    /// `".jpg"`, case-insensitive).
    pub fn list<S: AsRef<str>>(
        &self,
        uri: &str,
        extensions: &[S],
        relative: bool,
    ) -> Result<Vec<String>, AnyloadError> {
        let extensions = normalize_extensions(extensions);
        route(uri, &self.ctx).list(uri, &extensions, relative)
    }

    pub fn exists(&self, uri: &str) -> Result<bool, AnyloadError> {
        route(uri, &self.ctx).exists(uri)
    }

    /// Presigned GET URL for an object-storage URI.
    pub fn presign(&self, uri: &str, ttl: Option<Duration>) -> Result<String, AnyloadError> {
        route(uri, &self.ctx).presign(uri, ttl)
    }

    /// Load every URI on up to `workers` threads.
    ///
    /// `result[i]` belongs to `uris[i]`. A failed item is `None` and is
    /// logged; it never aborts the batch.
    pub fn concurrent_load<S: AsRef<str> + Sync>(
        &self,
        uris: &[S],
        workers: usize,
    ) -> Vec<Option<Payload>> {
        if uris.is_empty() {
            return Vec::new();
        }
        let workers = workers.clamp(1, uris.len());
        let next = AtomicUsize::new(0);
        let slots: Vec<Mutex<Option<Payload>>> = (0..uris.len()).map(|_| Mutex::new(None)).collect();

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(uri) = uris.get(index) else {
                            break;
                        };
                        let uri = uri.as_ref();
                        match self.load(uri) {
                            Ok(payload) => {
                                *slots[index].lock().unwrap_or_else(PoisonError::into_inner) =
                                    Some(payload);
                            }
                            Err(error) => warn!(uri, %error, "failed to load"),
                        }
                    })
                })
                .collect();

            for handle in handles {
                if handle.join().is_err() {
                    warn!("load worker panicked; the item it was loading is reported as failed");
                }
            }
        });

        let results: Vec<Option<Payload>> = slots
            .into_iter()
            .map(|slot| slot.into_inner().unwrap_or_else(PoisonError::into_inner))
            .collect();
        let failures = results.iter().filter(|result| result.is_none()).count();
        if failures > 0 {
            warn!(failures, total = uris.len(), "concurrent load finished with failures");
        } else {
            info!(total = uris.len(), workers, "concurrent load finished");
        }
        results
    }
}

/// Format of a staged download, falling back to the original URI when the
/// staged name carries no usable extension.
fn staged_format(local: &Path, uri: &str) -> Result<Format, AnyloadError> {
    let local_name = local.to_string_lossy();
    format_for_path(&local_name).or_else(|_| format_for_path(uri))
}
