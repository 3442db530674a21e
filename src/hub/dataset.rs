//! Whole-dataset load and save against a hub repository.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::card::update_readme_region;
use super::{HubApi, HubRepo, HubUri};
use crate::error::AnyloadError;
use crate::formats::io_parquet::{self, ParquetWriteOptions};
use crate::formats::{extension_of, Format, LoaderConfig};
use crate::payload::{Payload, Table};
use crate::staging::{StagingArea, StagingDir};
use crate::summary::{summarize_table, SummaryOptions};

const LOADER: &str = "hub-dataset";
const DATA_EXTENSIONS: &[&str] = &["parquet", "jsonl", "csv", "json"];
const METADATA_FILES: &[&str] = &[
    "dataset_info.json",
    "dataset_infos.json",
    "dataset_dict.json",
    "state.json",
];
const README: &str = "README.md";
const DEFAULT_SPLIT: &str = "train";

/// Options for loading a whole dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetLoadOptions {
    pub split: Option<String>,
    pub revision: Option<String>,
    pub to_table: bool,
    pub streaming: bool,
}

impl Default for DatasetLoadOptions {
    fn default() -> Self {
        Self {
            split: None,
            revision: None,
            to_table: true,
            streaming: false,
        }
    }
}

impl DatasetLoadOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader(LOADER);
        let options = Self {
            split: reader.string("split")?,
            revision: reader.string("revision")?,
            to_table: reader.bool("to_table", true)?,
            streaming: reader.bool("streaming", false)?,
        };
        reader.finish();
        Ok(options)
    }
}

/// Options for pushing a dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetSaveOptions {
    pub split: String,
    pub private: bool,
    /// Regenerate the summary region of the dataset card after the push.
    pub summary: bool,
}

impl Default for DatasetSaveOptions {
    fn default() -> Self {
        Self {
            split: DEFAULT_SPLIT.to_string(),
            private: true,
            summary: true,
        }
    }
}

impl DatasetSaveOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader(LOADER);
        let options = Self {
            split: reader
                .string("split")?
                .unwrap_or_else(|| DEFAULT_SPLIT.to_string()),
            private: reader.bool("private", true)?,
            summary: reader.bool("summary", true)?,
        };
        reader.finish();
        Ok(options)
    }
}

/// Load every data file of a dataset repository.
///
/// Returns a [`Payload::Table`] for a single split, [`Payload::Splits`] when
/// several splits exist and none was requested, [`Payload::Records`] (or a
/// mapping of split to records) with `to_table = false`, and a lazy
/// [`Payload::Stream`] with `streaming = true`.
pub fn load_dataset(
    api: Arc<dyn HubApi>,
    uri: &HubUri,
    config: &LoaderConfig,
) -> Result<Payload, AnyloadError> {
    let options = DatasetLoadOptions::from_config(config)?;
    let repo = uri
        .repo
        .clone()
        .with_revision(options.revision.clone().or_else(|| uri.repo.revision.clone()));

    info!(repo = %repo.id, revision = repo.revision_or_main(), "loading hub dataset");
    let files = api.list_files(&repo)?;
    let data_files = select_data_files(&files, uri.trimmed_subpath());
    if data_files.is_empty() {
        return Err(AnyloadError::HubApi {
            repo_id: repo.id.clone(),
            message: format!(
                "no supported data files (parquet, jsonl, csv, json){}",
                match uri.trimmed_subpath() {
                    "" => String::new(),
                    sub => format!(" under '{sub}'"),
                }
            ),
        });
    }

    let mut splits = group_by_split(&data_files);
    if let Some(requested) = options.split.as_deref() {
        let name = normalize_split_name(requested)
            .map(str::to_string)
            .unwrap_or_else(|| requested.to_string());
        let shards = splits.remove(&name).ok_or_else(|| AnyloadError::HubApi {
            repo_id: repo.id.clone(),
            message: format!(
                "split '{requested}' not found (available: {})",
                splits.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        })?;
        splits = BTreeMap::from([(name, shards)]);
    }

    if options.streaming {
        let shards: VecDeque<String> = splits.into_values().flatten().collect();
        return Ok(Payload::Stream(RecordStream::new(api, repo, shards)));
    }

    let mut tables = BTreeMap::new();
    for (split, shards) in splits {
        let parts = shards
            .iter()
            .map(|shard| read_shard(api.as_ref(), &repo, shard))
            .collect::<Result<Vec<_>, _>>()?;
        let table = Table::concat(parts);
        debug!(split = %split, rows = table.num_rows(), "loaded split");
        tables.insert(split, table);
    }

    if !options.to_table {
        if tables.len() == 1 {
            let table = tables.into_values().next().unwrap_or_default();
            return Ok(Payload::Records(table.to_records()));
        }
        return Ok(Payload::Json(Value::Object(
            tables
                .into_iter()
                .map(|(split, table)| (split, Value::Array(table.to_records())))
                .collect(),
        )));
    }

    if tables.len() == 1 {
        Ok(Payload::Table(tables.into_values().next().unwrap_or_default()))
    } else {
        Ok(Payload::Splits(tables))
    }
}

/// Push a table (or every split of [`Payload::Splits`]) to a dataset
/// repository as Parquet, then refresh the dataset card summary.
pub fn save_dataset(
    api: &dyn HubApi,
    uri: &HubUri,
    payload: Payload,
    config: &LoaderConfig,
    staging: &StagingArea,
) -> Result<(), AnyloadError> {
    let options = DatasetSaveOptions::from_config(config)?;
    let splits: Vec<(String, Table)> = match payload {
        Payload::Splits(map) => map.into_iter().collect(),
        other => vec![(options.split.clone(), other.into_table(LOADER)?)],
    };
    for (split, _) in &splits {
        if split.is_empty() || split.contains(['/', '\\']) {
            return Err(AnyloadError::InvalidOption {
                loader: LOADER,
                key: "split".to_string(),
                message: format!("invalid split name '{split}'"),
            });
        }
    }

    let stage = staging.stage()?;
    api.create_repo(&uri.repo, options.private)?;

    for (split, table) in &splits {
        let file_name = format!("{split}-00000-of-00001.parquet");
        let local = stage.file(&file_name);
        io_parquet::write_parquet(&local, table, &ParquetWriteOptions::default())?;
        api.upload_file(
            &uri.repo,
            &local,
            &format!("data/{file_name}"),
            &format!("Upload {split} split"),
        )?;
        info!(repo = %uri.repo.id, split = %split, rows = table.num_rows(), "pushed split");
    }

    if options.summary {
        if let Err(error) = publish_summary(api, &uri.repo, &splits, &stage) {
            warn!(repo = %uri.repo.id, %error, "failed to update dataset summary");
        }
    }
    Ok(())
}

fn publish_summary(
    api: &dyn HubApi,
    repo: &HubRepo,
    splits: &[(String, Table)],
    stage: &StagingDir,
) -> Result<(), AnyloadError> {
    let combined;
    let table = match splits {
        [(_, only)] => only,
        many => {
            combined = Table::concat(many.iter().map(|(_, table)| table.clone()).collect());
            &combined
        }
    };
    let summary = summarize_table(&repo.id, table, &SummaryOptions::default());

    let existing = if api.list_files(repo)?.iter().any(|path| path == README) {
        let local = api.download_file(repo, README)?;
        std::fs::read_to_string(local)?
    } else {
        String::new()
    };

    let local = stage.file(README);
    std::fs::write(&local, update_readme_region(&existing, &summary.to_string()))?;
    api.upload_file(repo, &local, README, "Update dataset summary")?;
    debug!(repo = %repo.id, "updated dataset card");
    Ok(())
}

fn read_shard(api: &dyn HubApi, repo: &HubRepo, path: &str) -> Result<Table, AnyloadError> {
    let local = api.download_file(repo, path)?;
    shard_format(path)?
        .load(&local, &LoaderConfig::new())?
        .into_table(LOADER)
}

fn shard_records(api: &dyn HubApi, repo: &HubRepo, path: &str) -> Result<Vec<Value>, AnyloadError> {
    let local = api.download_file(repo, path)?;
    shard_format(path)?
        .load(&local, &LoaderConfig::new())?
        .into_records(LOADER)
}

fn shard_format(path: &str) -> Result<Format, AnyloadError> {
    extension_of(path)
        .and_then(|ext| Format::from_extension(&ext))
        .ok_or_else(|| crate::formats::no_loader(path))
}

/// Supported data files under `subpath`, sorted. Parquet shards win over
/// other formats when both are present.
fn select_data_files(files: &[String], subpath: &str) -> Vec<String> {
    let mut selected: Vec<String> = files
        .iter()
        .filter(|path| is_under(path, subpath))
        .filter(|path| is_data_file(path))
        .cloned()
        .collect();

    if selected.iter().any(|path| path.ends_with(".parquet")) {
        selected.retain(|path| path.ends_with(".parquet"));
    }
    selected.sort();
    selected
}

/// Whether `path` equals `prefix` or lies under it on a segment boundary.
pub(crate) fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_matches('/');
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_data_file(path: &str) -> bool {
    if path.split('/').any(|segment| segment.starts_with('.')) {
        return false;
    }
    let file_name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    if METADATA_FILES.contains(&file_name.as_str()) {
        return false;
    }
    extension_of(path).is_some_and(|ext| DATA_EXTENSIONS.contains(&ext.as_str()))
}

fn group_by_split(files: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut splits: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in files {
        let split = infer_split_from_path(path).unwrap_or_else(|| DEFAULT_SPLIT.to_string());
        splits.entry(split).or_default().push(path.clone());
    }
    splits
}

/// Infer a split from a shard path such as `data/train-00000-of-00001.parquet`
/// or `validation/part.jsonl`.
pub fn infer_split_from_path(path: &str) -> Option<String> {
    let parsed = Path::new(path);
    let file_name = parsed
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_ascii_lowercase());

    if let Some(file_name) = file_name {
        if let Some((prefix, _)) = file_name.split_once(['-', '_']) {
            if let Some(normalized) = normalize_split_name(prefix) {
                return Some(normalized.to_string());
            }
        }
        let stem = Path::new(&file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        if let Some(normalized) = normalize_split_name(stem) {
            return Some(normalized.to_string());
        }
    }

    for component in parsed.components().rev().skip(1) {
        let Some(name) = component.as_os_str().to_str() else {
            continue;
        };
        if let Some(normalized) = normalize_split_name(name) {
            return Some(normalized.to_string());
        }
    }

    None
}

/// Canonical name of a conventional split, if `name` is one.
pub fn normalize_split_name(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "train" => Some("train"),
        "test" => Some("test"),
        "validation" | "valid" | "val" => Some("validation"),
        "dev" => Some("dev"),
        _ => None,
    }
}

/// Rows of a dataset fetched one shard at a time.
///
/// Iteration stops after the first error, which is yielded once.
pub struct RecordStream {
    api: Arc<dyn HubApi>,
    repo: HubRepo,
    pending: VecDeque<String>,
    buffer: std::vec::IntoIter<Value>,
    failed: bool,
}

impl RecordStream {
    fn new(api: Arc<dyn HubApi>, repo: HubRepo, shards: VecDeque<String>) -> Self {
        Self {
            api,
            repo,
            pending: shards,
            buffer: Vec::new().into_iter(),
            failed: false,
        }
    }

    /// Shards not fetched yet.
    pub fn remaining_shards(&self) -> usize {
        self.pending.len()
    }
}

impl Iterator for RecordStream {
    type Item = Result<Value, AnyloadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }
            if self.failed {
                return None;
            }
            let shard = self.pending.pop_front()?;
            debug!(repo = %self.repo.id, shard = %shard, "streaming shard");
            match shard_records(self.api.as_ref(), &self.repo, &shard) {
                Ok(records) => self.buffer = records.into_iter(),
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("repo", &self.repo.id)
            .field("pending", &self.pending)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_inference() {
        assert_eq!(
            infer_split_from_path("data/train-00000-of-00002.parquet").as_deref(),
            Some("train")
        );
        assert_eq!(
            infer_split_from_path("validation/part-0.jsonl").as_deref(),
            Some("validation")
        );
        assert_eq!(infer_split_from_path("val.csv").as_deref(), Some("validation"));
        assert_eq!(infer_split_from_path("test_set.json").as_deref(), Some("test"));
        assert_eq!(infer_split_from_path("data/rows.csv"), None);
    }

    #[test]
    fn data_file_selection_prefers_parquet() {
        let files = paths(&[
            "README.md",
            ".gitattributes",
            "data/train-00000-of-00001.parquet",
            "data/test-00000-of-00001.parquet",
            "raw/train.jsonl",
        ]);
        assert_eq!(
            select_data_files(&files, ""),
            paths(&[
                "data/test-00000-of-00001.parquet",
                "data/train-00000-of-00001.parquet"
            ])
        );
        assert_eq!(select_data_files(&files, "raw"), paths(&["raw/train.jsonl"]));
    }

    #[test]
    fn metadata_and_hidden_files_are_skipped() {
        let files = paths(&["dataset_info.json", ".cache/x.csv", "rows.csv"]);
        assert_eq!(select_data_files(&files, ""), paths(&["rows.csv"]));
    }

    #[test]
    fn prefix_match_respects_segments() {
        assert!(is_under("data/a.csv", "data"));
        assert!(is_under("data/a.csv", "data/"));
        assert!(!is_under("database/a.csv", "data"));
        assert!(is_under("anything", ""));
    }

    #[test]
    fn unknown_split_defaults_to_train() {
        let grouped = group_by_split(&paths(&["rows.csv", "test.csv"]));
        assert_eq!(grouped["train"], paths(&["rows.csv"]));
        assert_eq!(grouped["test"], paths(&["test.csv"]));
    }

    #[test]
    fn options_defaults() {
        let load = DatasetLoadOptions::from_config(&LoaderConfig::new()).expect("load");
        assert_eq!(load, DatasetLoadOptions::default());
        let save = DatasetSaveOptions::from_config(&LoaderConfig::new()).expect("save");
        assert_eq!(save.split, "train");
        assert!(save.private && save.summary);
    }
}
