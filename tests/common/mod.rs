#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyload::backend::BucketConnector;
use anyload::hub::{HubApi, HubRepo};
use anyload::{Anyload, AnyloadError, Settings};
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::signer::Signer;
use object_store::ObjectStore;
use tempfile::TempDir;

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Façade with an isolated staging root, no deny-list and in-memory remotes.
pub struct Harness {
    pub dir: TempDir,
    pub hub: Arc<MemoryHub>,
    pub buckets: Arc<MemoryBuckets>,
    pub anyload: Anyload,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(|settings| settings)
    }

    pub fn with_settings(adjust: impl FnOnce(Settings) -> Settings) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = adjust(
            Settings::default()
                .with_staging_root(dir.path().join("staging"))
                .with_deny_list(Vec::new()),
        );
        let hub = Arc::new(MemoryHub::new());
        let buckets = Arc::new(MemoryBuckets::default());
        let anyload = Anyload::new(settings)
            .with_hub_api(hub.clone())
            .with_bucket_connector(buckets.clone());
        Self {
            dir,
            hub,
            buckets,
            anyload,
        }
    }

    /// Absolute path string of `rel` inside the test directory.
    pub fn path(&self, rel: &str) -> String {
        self.dir.path().join(rel).to_string_lossy().into_owned()
    }

    /// Entries left behind in the staging root.
    pub fn staged_entries(&self) -> usize {
        match fs::read_dir(self.dir.path().join("staging")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// Hub client backed by a map of `(repo id, path) -> bytes`.
pub struct MemoryHub {
    cache: TempDir,
    files: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    created: Mutex<Vec<(String, bool)>>,
    commits: Mutex<Vec<String>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self {
            cache: tempfile::tempdir().expect("tempdir"),
            files: Mutex::new(BTreeMap::new()),
            created: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
        }
    }

    pub fn put(&self, repo_id: &str, path: &str, bytes: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .expect("lock")
            .insert((repo_id.to_string(), path.to_string()), bytes.into());
    }

    pub fn get(&self, repo_id: &str, path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .expect("lock")
            .get(&(repo_id.to_string(), path.to_string()))
            .cloned()
    }

    pub fn created_repos(&self) -> Vec<(String, bool)> {
        self.created.lock().expect("lock").clone()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.commits.lock().expect("lock").clone()
    }
}

impl HubApi for MemoryHub {
    fn list_files(&self, repo: &HubRepo) -> Result<Vec<String>, AnyloadError> {
        Ok(self
            .files
            .lock()
            .expect("lock")
            .keys()
            .filter(|(id, _)| id == &repo.id)
            .map(|(_, path)| path.clone())
            .collect())
    }

    fn download_file(&self, repo: &HubRepo, path: &str) -> Result<PathBuf, AnyloadError> {
        let bytes = self.get(&repo.id, path).ok_or_else(|| AnyloadError::HubApi {
            repo_id: repo.id.clone(),
            message: format!("'{path}' not found"),
        })?;
        let local = self.cache.path().join(&repo.id).join(path);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&local, bytes)?;
        Ok(local)
    }

    fn create_repo(&self, repo: &HubRepo, private: bool) -> Result<(), AnyloadError> {
        self.created
            .lock()
            .expect("lock")
            .push((repo.id.clone(), private));
        Ok(())
    }

    fn upload_file(
        &self,
        repo: &HubRepo,
        local_path: &Path,
        path_in_repo: &str,
        message: &str,
    ) -> Result<(), AnyloadError> {
        let bytes = fs::read(local_path)?;
        self.put(&repo.id, path_in_repo, bytes);
        self.commits.lock().expect("lock").push(message.to_string());
        Ok(())
    }
}

/// One `InMemory` store per bucket; signing uses static test credentials.
#[derive(Default)]
pub struct MemoryBuckets {
    stores: Mutex<HashMap<String, Arc<InMemory>>>,
}

impl MemoryBuckets {
    pub fn bucket(&self, name: &str) -> Arc<InMemory> {
        self.stores
            .lock()
            .expect("lock")
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }
}

impl BucketConnector for MemoryBuckets {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, AnyloadError> {
        Ok(self.bucket(bucket))
    }

    fn signer(&self, bucket: &str) -> Result<Arc<dyn Signer>, AnyloadError> {
        let store = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region("us-east-1")
            .with_access_key_id("AKIDEXAMPLE")
            .with_secret_access_key("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
            .build()
            .map_err(|source| AnyloadError::ObjectStore {
                uri: format!("s3://{bucket}"),
                source,
            })?;
        Ok(Arc::new(store))
    }
}
