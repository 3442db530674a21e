//! Anyload: load and save data by URI.
//!
//! One call reads or writes a local path, an `s3://` object, an `hf://` hub
//! file or dataset, or an `http(s)://` URL. The storage backend is picked from
//! the URI and the format from the file extension, so
//! `load("s3://bucket/table.parquet")` and `load("notes.txt")` look the same to
//! the caller.
//!
//! # Modules
//!
//! - [`uri`]: URI classification
//! - [`backend`]: storage backends (local, object storage, hub, web)
//! - [`formats`]: per-extension loaders and the loader router
//! - [`payload`]: in-memory values ([`Payload`], [`Table`])
//! - [`hub`]: hub URIs, client seam and whole-dataset load/save
//! - [`summary`]: the dataset summary written to hub dataset cards
//! - [`config`], [`security`], [`staging`]: settings, deny-list, temp files
//! - [`error`]: the [`AnyloadError`] type
//!
//! The free functions below build a façade from the environment on each
//! call. Embedders and tests should hold an [`Anyload`] built from explicit
//! [`Settings`] instead.

pub mod backend;
pub mod config;
pub mod error;
pub mod facade;
pub mod formats;
pub mod hub;
pub mod payload;
pub mod security;
pub mod staging;
pub mod summary;
pub mod uri;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub use backend::{BucketConnector, S3Connector};
pub use config::{HubPathRule, Settings};
pub use error::AnyloadError;
pub use facade::Anyload;
pub use formats::{Format, LoaderConfig};
pub use hub::{HfHubApi, HubApi};
pub use payload::{Payload, PayloadKind, Table};

/// Load `uri` with default options.
pub fn load(uri: &str) -> Result<Payload, AnyloadError> {
    Anyload::from_env().load(uri)
}

/// Load `uri` with loader options.
pub fn load_with(uri: &str, config: &LoaderConfig) -> Result<Payload, AnyloadError> {
    Anyload::from_env().load_with(uri, config)
}

/// Save `payload` to `uri` with default options.
pub fn save(payload: Payload, uri: &str) -> Result<(), AnyloadError> {
    Anyload::from_env().save(payload, uri)
}

/// Save `payload` to `uri` with writer options.
pub fn save_with(payload: Payload, uri: &str, config: &LoaderConfig) -> Result<(), AnyloadError> {
    Anyload::from_env().save_with(payload, uri, config)
}

/// List entries under `uri`, optionally filtered by extension.
pub fn list<S: AsRef<str>>(
    uri: &str,
    extensions: &[S],
    relative: bool,
) -> Result<Vec<String>, AnyloadError> {
    Anyload::from_env().list(uri, extensions, relative)
}

/// Load many URIs in parallel; failed items are `None`.
pub fn concurrent_load<S: AsRef<str> + Sync>(uris: &[S], workers: usize) -> Vec<Option<Payload>> {
    Anyload::from_env().concurrent_load(uris, workers)
}

pub fn exists(uri: &str) -> Result<bool, AnyloadError> {
    Anyload::from_env().exists(uri)
}

/// Presigned GET URL for an `s3://` object.
pub fn presign(uri: &str, ttl: Option<Duration>) -> Result<String, AnyloadError> {
    Anyload::from_env().presign(uri, ttl)
}

/// The anyload CLI application.
#[derive(Parser)]
#[command(name = "anyload")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Root directory for staged downloads and uploads.
    #[arg(long, global = true, env = "ANYLOAD_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// How hub URIs with a sub-path are treated ('heuristic', 'file' or 'dataset').
    #[arg(long, global = true, default_value = "heuristic")]
    hub_path_rule: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List entries under a directory, prefix or repository.
    Ls(LsArgs),
    /// Load a URI and print a short summary of its contents.
    Peek(PeekArgs),
    /// Load one URI and save it to another, converting by extension.
    Convert(ConvertArgs),
    /// Print a presigned GET URL for an s3:// object.
    Presign(PresignArgs),
}

#[derive(clap::Args)]
struct LsArgs {
    uri: String,

    /// Only list entries with this extension (repeatable).
    #[arg(long = "ext")]
    extensions: Vec<String>,

    /// Print paths relative to the listed URI.
    #[arg(long)]
    relative: bool,
}

#[derive(clap::Args)]
struct PeekArgs {
    uri: String,

    /// Number of rows, records or lines to show.
    #[arg(long, default_value_t = 5)]
    rows: usize,

    /// Output format for table summaries ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

#[derive(clap::Args)]
struct ConvertArgs {
    input: String,
    output: String,
}

#[derive(clap::Args)]
struct PresignArgs {
    uri: String,

    /// Lifetime of the URL in seconds (at most 7 days).
    #[arg(long)]
    ttl: Option<u64>,
}

/// Run the anyload CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnyloadError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rule = HubPathRule::from_name(&cli.hub_path_rule).ok_or_else(|| {
        AnyloadError::InvalidOption {
            loader: "cli",
            key: "hub-path-rule".to_string(),
            message: format!(
                "'{}' (expected heuristic, file or dataset)",
                cli.hub_path_rule
            ),
        }
    })?;
    let mut settings = Settings::from_env().with_hub_path_rule(rule);
    if let Some(root) = cli.temp_dir {
        settings = settings.with_staging_root(root);
    }
    let anyload = Anyload::new(settings);

    match cli.command {
        Some(Commands::Ls(args)) => {
            for entry in anyload.list(&args.uri, args.extensions.as_slice(), args.relative)? {
                println!("{entry}");
            }
            Ok(())
        }
        Some(Commands::Peek(args)) => run_peek(&anyload, args),
        Some(Commands::Convert(args)) => {
            let payload = anyload.load(&args.input)?;
            let kind = payload.kind();
            anyload.save(payload, &args.output)?;
            println!("Converted {} -> {} ({})", args.input, args.output, kind.name());
            Ok(())
        }
        Some(Commands::Presign(args)) => {
            let url = anyload.presign(&args.uri, args.ttl.map(Duration::from_secs))?;
            println!("{url}");
            Ok(())
        }
        None => {
            println!("anyload {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Load and save data from anywhere with one call.");
            println!();
            println!("Run 'anyload --help' for usage information.");
            Ok(())
        }
    }
}

/// `RUST_LOG` wins; otherwise the level follows the `-v` count.
fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_peek(anyload: &Anyload, args: PeekArgs) -> Result<(), AnyloadError> {
    let payload = anyload.load(&args.uri)?;
    let summary_opts = summary::SummaryOptions {
        sample_rows: args.rows,
        ..Default::default()
    };
    let to_json = |value: &serde_json::Value| {
        serde_json::to_string_pretty(value).map_err(|source| AnyloadError::JsonWrite {
            path: PathBuf::from(&args.uri),
            source,
        })
    };

    match payload {
        Payload::Table(table) => {
            let report = summary::summarize_table(&args.uri, &table, &summary_opts);
            match args.output.as_str() {
                "json" => {
                    let text = serde_json::to_string_pretty(&report).map_err(|source| {
                        AnyloadError::JsonWrite {
                            path: PathBuf::from(&args.uri),
                            source,
                        }
                    })?;
                    println!("{text}");
                }
                _ => print!("{report}"),
            }
        }
        Payload::Splits(splits) => {
            for (split, table) in &splits {
                let title = format!("{} [{split}]", args.uri);
                print!("{}", summary::summarize_table(&title, table, &summary_opts));
                println!();
            }
        }
        Payload::Json(value) => println!("{}", to_json(&value)?),
        Payload::Records(records) => {
            println!("{} records", records.len());
            for record in records.iter().take(args.rows) {
                println!("{record}");
            }
        }
        Payload::Lines(lines) => {
            println!("{} lines", lines.len());
            for line in lines.iter().take(args.rows) {
                println!("{line}");
            }
        }
        Payload::Image(image) => {
            println!("{}x{} {:?}", image.width(), image.height(), image.color());
        }
        Payload::Bytes(bytes) => println!("{} bytes", bytes.len()),
        Payload::Null => println!("null"),
        Payload::Stream(stream) => {
            for record in stream.take(args.rows) {
                println!("{}", record?);
            }
        }
    }
    Ok(())
}
