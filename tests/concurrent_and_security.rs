use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyload::hub::{HubApi, HubRepo};
use anyload::{AnyloadError, Payload};
use serde_json::json;

mod common;

use common::{Harness, MemoryHub};

/// Hub client that panics when asked for `boom.json`.
struct PanickingHub {
    inner: Arc<MemoryHub>,
}

impl HubApi for PanickingHub {
    fn list_files(&self, repo: &HubRepo) -> Result<Vec<String>, AnyloadError> {
        self.inner.list_files(repo)
    }

    fn download_file(&self, repo: &HubRepo, path: &str) -> Result<PathBuf, AnyloadError> {
        if path == "boom.json" {
            panic!("hub client crashed");
        }
        self.inner.download_file(repo, path)
    }

    fn create_repo(&self, repo: &HubRepo, private: bool) -> Result<(), AnyloadError> {
        self.inner.create_repo(repo, private)
    }

    fn upload_file(
        &self,
        repo: &HubRepo,
        local_path: &Path,
        path_in_repo: &str,
        message: &str,
    ) -> Result<(), AnyloadError> {
        self.inner.upload_file(repo, local_path, path_in_repo, message)
    }
}

#[test]
fn concurrent_load_preserves_order_with_one_failure() {
    let h = Harness::new();
    let mut uris = Vec::new();
    for i in 0..8 {
        let path = h.path(&format!("item-{i}.json"));
        fs::write(&path, json!({"i": i}).to_string()).expect("write");
        uris.push(path);
    }
    uris[5] = "s3://bucket/missing.json".to_string();

    let results = h.anyload.concurrent_load(&uris[..], 4);

    assert_eq!(results.len(), uris.len());
    for (idx, result) in results.iter().enumerate() {
        if idx == 5 {
            assert!(result.is_none());
            continue;
        }
        let value = result
            .as_ref()
            .and_then(Payload::as_json)
            .and_then(|v| v["i"].as_u64())
            .expect("loaded");
        assert_eq!(value, idx as u64);
    }
}

#[test]
fn worker_panic_keeps_items_loaded_before_it() {
    let h = Harness::new();
    let first = h.path("first.json");
    fs::write(&first, "{\"n\": 1}").expect("write");
    h.hub.put("org/repo", "boom.json", "{}");
    let anyload = h.anyload.clone().with_hub_api(Arc::new(PanickingHub {
        inner: h.hub.clone(),
    }));

    let uris = [first.as_str(), "hf://org/repo/boom.json"];
    let results = anyload.concurrent_load(&uris, 1);

    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].as_ref().and_then(Payload::as_json),
        Some(&json!({"n": 1}))
    );
    assert!(results[1].is_none());
    assert_eq!(h.staged_entries(), 0, "staging is removed while unwinding");
}

#[test]
fn concurrent_load_with_more_workers_than_items() {
    let h = Harness::new();
    let path = h.path("one.txt");
    fs::write(&path, "hello\n").expect("write");

    let results = h.anyload.concurrent_load(&[path.as_str()], 16);
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].as_ref().and_then(Payload::as_lines),
        Some(&["hello".to_string()][..])
    );
}

#[test]
fn concurrent_load_with_zero_workers_still_runs() {
    let h = Harness::new();
    let path = h.path("one.json");
    fs::write(&path, "1").expect("write");

    let results = h.anyload.concurrent_load(&[path], 0);
    assert!(results[0].is_some());
}

#[test]
fn save_into_denied_directory_fails_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocked = dir.path().join("secrets");
    let h = Harness::with_settings(|s| s.with_deny_list(vec![blocked.clone()]));

    let target = blocked.join("leak.json");
    let err = h
        .anyload
        .save(Payload::Json(json!({"a": 1})), &target.to_string_lossy())
        .expect_err("denied");

    assert!(matches!(err, AnyloadError::PermissionDenied { .. }));
    assert!(!blocked.exists());
}

#[test]
fn staging_root_under_deny_list_blocks_downloads() {
    let h = Harness::with_settings(|s| {
        let blocked = s.staging_root.with_file_name("blocked");
        s.with_staging_root(blocked.join("staging"))
            .with_deny_list(vec![blocked])
    });
    h.hub.put("org/repo", "a.json", "{}");

    let err = h.anyload.load("hf://org/repo/a.json").expect_err("denied");
    assert!(matches!(err, AnyloadError::PermissionDenied { .. }));
    assert!(!h.dir.path().join("blocked").exists(), "nothing created under the denied root");

    let err = h
        .anyload
        .save(Payload::Json(json!({"a": 1})), "hf://org/repo/b.json")
        .expect_err("denied");
    assert!(matches!(err, AnyloadError::PermissionDenied { .. }));
    assert!(!h.dir.path().join("blocked").exists());
}

#[test]
fn upload_from_denied_source_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let secret = dir.path().join("creds/key.json");
    fs::create_dir_all(secret.parent().expect("parent")).expect("mkdir");
    fs::write(&secret, "{}").expect("write");

    let h = Harness::with_settings(|s| s.with_deny_list(vec![dir.path().join("creds")]));
    let backend = anyload::backend::object_storage::ObjectStorageBackend::new(
        anyload::backend::BackendContext {
            settings: std::sync::Arc::new(h.anyload.settings().clone()),
            hub_api: h.hub.clone(),
            buckets: h.buckets.clone(),
        },
    );

    let err = anyload::backend::StorageBackend::upload(&backend, &secret, "s3://bkt/key.json")
        .expect_err("denied");
    assert!(matches!(err, AnyloadError::PermissionDenied { .. }));
}

#[test]
fn local_list_filters_extensions() {
    let h = Harness::new();
    let dir = h.dir.path().join("pics");
    for name in ["a.jpg", "b.PNG", "c.txt", "deep/d.png"] {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "x").expect("write");
    }
    let uri = dir.to_string_lossy().into_owned();

    let listed = h
        .anyload
        .list(&uri, &[".jpg", ".png"], true)
        .expect("list");
    assert_eq!(listed, vec!["a.jpg", "b.PNG", "deep/d.png"]);

    let none = h.anyload.list(&uri, &[".gif"], true).expect("list");
    assert!(none.is_empty());
}

#[test]
fn web_backend_is_read_only() {
    let h = Harness::new();
    let err = h
        .anyload
        .save(Payload::Json(json!(1)), "https://example.com/out.json")
        .expect_err("read-only");
    assert!(matches!(err, AnyloadError::Unsupported { operation: "upload", .. }));
    assert_eq!(h.staged_entries(), 0, "failed upload leaves no staged file");

    let err = h
        .anyload
        .list("https://example.com/dir/", &[] as &[&str], false)
        .expect_err("read-only");
    assert!(matches!(err, AnyloadError::Unsupported { operation: "list", .. }));
}
