//! Payload formats and the extension router.
//!
//! Each [`Format`] knows how to load a local file into a [`Payload`] and how
//! to save a payload to a local file. [`route_for_path`] picks the format
//! from a path or URI; hub URIs that name a whole dataset route to
//! [`LoaderRoute::HubDataset`] instead.
//!
//! # Formats
//!
//! | Extension | Format | Loads as |
//! |---|---|---|
//! | `.csv` | [`Format::Csv`] | table |
//! | `.parquet` | [`Format::Parquet`] | table |
//! | `.json` | [`Format::Json`] | any JSON value (empty file is null) |
//! | `.jsonl` | [`Format::Jsonl`] | records |
//! | `.txt` | [`Format::Text`] | lines |
//! | `.toml` | [`Format::Toml`] | mapping |
//! | `.yaml`, `.yml` | [`Format::Yaml`] | any YAML value |
//! | see [`IMAGE_EXTENSIONS`] | [`Format::Image`] | decoded image |

pub mod io_config;
pub mod io_csv;
pub mod io_image;
pub mod io_json;
pub mod io_jsonl;
pub mod io_parquet;
pub mod io_text;
mod options;

use std::path::Path;

use tracing::{debug, warn};

pub use options::{LoaderConfig, OptionReader};

use crate::config::HubPathRule;
use crate::error::AnyloadError;
use crate::hub::HubUri;
use crate::payload::{Payload, PayloadKind};
use crate::uri::{self, UriKind};

/// Extensions handled by the image format.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "png", "bmp", "gif", "tif", "tiff", "webp", "ico", "tga", "pnm", "pbm",
    "pgm", "ppm", "dds", "hdr", "qoi",
];

/// A single-file payload format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Csv,
    Parquet,
    Json,
    Jsonl,
    Text,
    Toml,
    Yaml,
    Image,
}

/// Where the loader router sends a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoaderRoute {
    File(Format),
    HubDataset,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Parquet => "parquet",
            Format::Json => "json",
            Format::Jsonl => "jsonl",
            Format::Text => "text",
            Format::Toml => "toml",
            Format::Yaml => "yaml",
            Format::Image => "image",
        }
    }

    /// Look up a lower-case extension without the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let format = match extension {
            "csv" => Format::Csv,
            "parquet" => Format::Parquet,
            "json" => Format::Json,
            "jsonl" => Format::Jsonl,
            "txt" => Format::Text,
            "toml" => Format::Toml,
            "yaml" | "yml" => Format::Yaml,
            ext if IMAGE_EXTENSIONS.contains(&ext) => Format::Image,
            _ => return None,
        };
        Some(format)
    }

    /// The payload shape this format loads into.
    pub fn native_kind(self) -> PayloadKind {
        match self {
            Format::Csv | Format::Parquet => PayloadKind::Table,
            Format::Json | Format::Toml | Format::Yaml => PayloadKind::Mapping,
            Format::Jsonl => PayloadKind::Sequence,
            Format::Text => PayloadKind::Lines,
            Format::Image => PayloadKind::Image,
        }
    }

    /// Whether a payload of `kind` can be saved without a lossy or surprising
    /// conversion.
    pub fn accepts(self, kind: PayloadKind) -> bool {
        use PayloadKind as K;
        match self {
            Format::Csv | Format::Parquet => matches!(kind, K::Table | K::Sequence | K::Stream),
            Format::Json | Format::Yaml => !matches!(kind, K::Image | K::Bytes),
            Format::Jsonl => matches!(kind, K::Sequence | K::Table | K::Stream | K::Null),
            Format::Text => matches!(kind, K::Lines | K::Bytes | K::Scalar),
            Format::Toml => kind == K::Mapping,
            Format::Image => kind == K::Image,
        }
    }

    /// Load a local file.
    pub fn load(self, path: &Path, config: &LoaderConfig) -> Result<Payload, AnyloadError> {
        debug!(path = %path.display(), format = self.name(), "loading");
        let payload = match self {
            Format::Csv => {
                let options = io_csv::CsvReadOptions::from_config(config)?;
                Payload::Table(io_csv::read_csv(path, &options)?)
            }
            Format::Parquet => {
                let options = io_parquet::ParquetReadOptions::from_config(config)?;
                Payload::Table(io_parquet::read_parquet(path, &options)?)
            }
            Format::Json => {
                config.reader("json").finish();
                match io_json::read_json(path)? {
                    Some(value) => Payload::Json(value),
                    None => Payload::Null,
                }
            }
            Format::Jsonl => {
                let options = io_jsonl::JsonlReadOptions::from_config(config)?;
                Payload::Records(io_jsonl::read_jsonl(path, &options)?)
            }
            Format::Text => {
                let options = io_text::TextReadOptions::from_config(config)?;
                Payload::Lines(io_text::read_text(path, &options)?)
            }
            Format::Toml => {
                config.reader("toml").finish();
                Payload::Json(io_config::read_toml(path)?)
            }
            Format::Yaml => {
                config.reader("yaml").finish();
                Payload::Json(io_config::read_yaml(path)?)
            }
            Format::Image => {
                let options = io_image::ImageReadOptions::from_config(config)?;
                Payload::Image(io_image::read_image(path, &options)?)
            }
        };
        Ok(payload)
    }

    /// Save a payload to a local file, converting it to this format's shape.
    pub fn save(
        self,
        path: &Path,
        payload: Payload,
        config: &LoaderConfig,
    ) -> Result<(), AnyloadError> {
        let kind = payload.kind();
        if !self.accepts(kind) {
            warn!(
                path = %path.display(),
                format = self.name(),
                payload = kind.name(),
                "payload shape does not match the file extension; converting to {}",
                self.native_kind()
            );
        }

        let name = self.name();
        match self {
            Format::Csv => {
                let options = io_csv::CsvWriteOptions::from_config(config)?;
                io_csv::write_csv(path, &payload.into_table(name)?, &options)
            }
            Format::Parquet => {
                let options = io_parquet::ParquetWriteOptions::from_config(config)?;
                io_parquet::write_parquet(path, &payload.into_table(name)?, &options)
            }
            Format::Json => {
                let options = io_json::JsonWriteOptions::from_config(config)?;
                io_json::write_json(path, &payload.into_json(name)?, &options)
            }
            Format::Jsonl => {
                config.reader("jsonl").finish();
                io_jsonl::write_jsonl(path, &payload.into_records(name)?)
            }
            Format::Text => {
                let options = io_text::TextWriteOptions::from_config(config)?;
                io_text::write_text(path, &payload.into_lines(name)?, &options)
            }
            Format::Toml => {
                config.reader("toml").finish();
                io_config::write_toml(path, &payload.into_json(name)?)
            }
            Format::Yaml => {
                config.reader("yaml").finish();
                io_config::write_yaml(path, &payload.into_json(name)?)
            }
            Format::Image => {
                let options = io_image::ImageWriteOptions::from_config(config)?;
                io_image::write_image(path, &payload.into_image(name)?, &options)
            }
        }
    }
}

/// Pick a loader for `path_or_uri`.
///
/// Hub URIs that denote a whole dataset under `rule` route to
/// [`LoaderRoute::HubDataset`]; for other hub URIs the sub-path is used. For
/// any other `scheme://` URI only the final path segment is considered.
/// Returns `None` when the extension is not recognised.
pub fn route_for_path(path_or_uri: &str, rule: HubPathRule) -> Option<LoaderRoute> {
    if uri::classify(path_or_uri) == UriKind::RemoteHub {
        let hub = HubUri::parse(path_or_uri).ok()?;
        if rule.is_dataset(&hub.subpath) {
            return Some(LoaderRoute::HubDataset);
        }
        return extension_of(&hub.subpath)
            .and_then(|ext| Format::from_extension(&ext))
            .map(LoaderRoute::File);
    }

    let working = if path_or_uri.contains("://") {
        uri::final_segment(path_or_uri)
    } else {
        path_or_uri
    };

    extension_of(working)
        .and_then(|ext| Format::from_extension(&ext))
        .map(LoaderRoute::File)
}

/// Like [`route_for_path`] but only for single files; a missing loader or a
/// whole-dataset URI is a [`AnyloadError::NoLoader`].
pub fn format_for_path(path_or_uri: &str) -> Result<Format, AnyloadError> {
    match route_for_path(path_or_uri, HubPathRule::AlwaysFile) {
        Some(LoaderRoute::File(format)) => Ok(format),
        _ => Err(no_loader(path_or_uri)),
    }
}

pub(crate) fn no_loader(target: &str) -> AnyloadError {
    AnyloadError::NoLoader {
        target: target.to_string(),
        extension: extension_of(uri::final_segment(target))
            .map(|ext| format!(".{ext}"))
            .unwrap_or_else(|| "<none>".to_string()),
    }
}

/// Lower-cased extension of the last segment of `path`, without the dot.
pub fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> Option<LoaderRoute> {
        route_for_path(path, HubPathRule::Heuristic)
    }

    #[test]
    fn extension_table() {
        assert_eq!(route("a/b.csv"), Some(LoaderRoute::File(Format::Csv)));
        assert_eq!(route("B.PARQUET"), Some(LoaderRoute::File(Format::Parquet)));
        assert_eq!(route("x.json"), Some(LoaderRoute::File(Format::Json)));
        assert_eq!(route("x.jsonl"), Some(LoaderRoute::File(Format::Jsonl)));
        assert_eq!(route("notes.txt"), Some(LoaderRoute::File(Format::Text)));
        assert_eq!(route("c.toml"), Some(LoaderRoute::File(Format::Toml)));
        assert_eq!(route("c.yml"), Some(LoaderRoute::File(Format::Yaml)));
        assert_eq!(route("c.yaml"), Some(LoaderRoute::File(Format::Yaml)));
        assert_eq!(route("p.JPEG"), Some(LoaderRoute::File(Format::Image)));
        assert_eq!(route("p.webp"), Some(LoaderRoute::File(Format::Image)));
    }

    #[test]
    fn unknown_or_missing_extension_is_none() {
        assert_eq!(route("file.unknownext"), None);
        assert_eq!(route("Makefile"), None);
        assert_eq!(route(""), None);
    }

    #[test]
    fn urls_use_final_segment_only() {
        assert_eq!(
            route("https://example.com/data.v2/file.csv?token=a.json"),
            Some(LoaderRoute::File(Format::Csv))
        );
        assert_eq!(
            route("s3://bucket.with.dots/folder/img.png"),
            Some(LoaderRoute::File(Format::Image))
        );
        assert_eq!(route("s3://bucket.json/folder/"), None);
    }

    #[test]
    fn hub_dataset_heuristic() {
        assert_eq!(route("hf://owner/repo"), Some(LoaderRoute::HubDataset));
        assert_eq!(route("hf://owner/repo/data"), Some(LoaderRoute::HubDataset));
        assert_eq!(
            route("hf://owner/repo/data/train.csv"),
            Some(LoaderRoute::File(Format::Csv))
        );
        assert_eq!(route("hf://owner/repo/weights.bin"), None);
    }

    #[test]
    fn hub_path_rule_overrides_heuristic() {
        assert_eq!(
            route_for_path("hf://owner/repo/data", HubPathRule::AlwaysFile),
            None
        );
        assert_eq!(
            route_for_path("hf://owner/repo/a.csv", HubPathRule::AlwaysDataset),
            Some(LoaderRoute::HubDataset)
        );
    }

    #[test]
    fn accepts_follows_native_shapes() {
        assert!(!Format::Csv.accepts(PayloadKind::Lines));
        assert!(Format::Json.accepts(PayloadKind::Sequence));
        assert!(!Format::Toml.accepts(PayloadKind::Sequence));
    }

    #[test]
    fn no_loader_error_names_extension() {
        let err = format_for_path("dir/file.xyz").expect_err("unknown");
        assert!(err.to_string().contains(".xyz"));
    }
}
