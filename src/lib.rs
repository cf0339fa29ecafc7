//! Annatto: dataset ingestion for annotation projects.
//!
//! Annatto takes uploaded dataset files in any of the supported formats
//! (plain text, CSV, Excel, JSON, JSONL, fastText, CoNLL, binary file
//! manifests), normalizes them into examples with pre-annotations, and
//! persists them in batches while enforcing each project's annotation
//! consistency rules. The same rules back the live admission check used
//! when annotators submit labels interactively.
//!
//! # Modules
//!
//! - [`model`] / [`ids`]: projects, examples, label types, annotations
//! - [`encoding`]: charset resolution and sniffing for uploads
//! - [`formats`]: one streaming parser per upload format
//! - [`builder`]: raw field-maps into typed records
//! - [`catalog`]: which formats each project kind accepts
//! - [`labels`]: label-type reconciliation and shortcut handling
//! - [`clean`]: consistency cleaning and the live admission engine
//! - [`writer`] / [`ingest`]: batched persistence and the job pipeline
//! - [`jobs`]: background job execution
//! - [`store`]: the persistence seam (memory and SQLite backends)

pub mod builder;
pub mod catalog;
pub mod clean;
pub mod encoding;
pub mod error;
pub mod formats;
pub mod ids;
pub mod ingest;
pub mod jobs;
pub mod labels;
pub mod model;
pub mod store;
pub mod writer;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::AnnattoError;

use formats::scheme::TaggingScheme;
use formats::FormatKind;
use model::{Project, ProjectKind};
use store::{MemoryStore, ProjectStore, SqliteStore};

/// The annatto CLI application.
#[derive(Parser)]
#[command(name = "annatto")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Import dataset files into a project.
    Ingest(IngestArgs),
    /// List the upload formats a project kind accepts.
    Catalog(CatalogArgs),
}

/// Arguments for the ingest subcommand.
#[derive(clap::Args)]
struct IngestArgs {
    /// Files to import.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Project kind ('category', 'span', 'seq2seq', 'intent_slot',
    /// 'image', 'audio').
    #[arg(long = "project-kind")]
    project_kind: String,

    /// Upload format ('textfile', 'textline', 'csv', 'excel', 'json',
    /// 'jsonl', 'fasttext', 'conll', 'filemanifest').
    #[arg(long)]
    format: String,

    /// SQLite database path. Without it the import runs against an
    /// in-memory store (a dry run).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Examples persisted per flush.
    #[arg(long, default_value_t = writer::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Character encoding of the files, or 'Auto' to sniff.
    #[arg(long, default_value = encoding::AUTO)]
    encoding: String,

    /// CSV field delimiter.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Column holding the example text.
    #[arg(long = "column-data", default_value = builder::DEFAULT_DATA_COLUMN)]
    column_data: String,

    /// Column holding the label payload.
    #[arg(long = "column-label", default_value = builder::DEFAULT_LABEL_COLUMN)]
    column_label: String,

    /// Tagging scheme for CoNLL files.
    #[arg(long, value_enum, default_value_t = TaggingScheme::Iob2)]
    scheme: TaggingScheme,

    /// Keep at most one category per example.
    #[arg(long)]
    single_class: bool,

    /// Allow overlapping spans.
    #[arg(long)]
    allow_overlapping: bool,

    /// Pool all members' annotations into one consistency scope.
    #[arg(long)]
    collaborative: bool,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the catalog subcommand.
#[derive(clap::Args)]
struct CatalogArgs {
    /// Project kind to list formats for.
    #[arg(long = "project-kind")]
    project_kind: String,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Run the annatto CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnnattoError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ingest(args)) => run_ingest(args),
        Some(Commands::Catalog(args)) => run_catalog(args),
        None => {
            println!("annatto {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Dataset ingestion for annotation projects.");
            println!();
            println!("Run 'annatto --help' for usage information.");
            Ok(())
        }
    }
}

fn parse_project_kind(name: &str) -> Result<ProjectKind, AnnattoError> {
    match name {
        "category" | "category_classification" => Ok(ProjectKind::CategoryClassification),
        "span" | "span_labeling" => Ok(ProjectKind::SpanLabeling),
        "seq2seq" => Ok(ProjectKind::Seq2seq),
        "intent_slot" => Ok(ProjectKind::IntentSlot),
        "image" | "image_classification" => Ok(ProjectKind::ImageClassification),
        "audio" | "audio_speech_to_text" => Ok(ProjectKind::AudioSpeechToText),
        other => Err(AnnattoError::InvalidArgument(format!(
            "unknown project kind '{}' (supported: category, span, seq2seq, intent_slot, image, audio)",
            other
        ))),
    }
}

fn parse_format(name: &str) -> Result<FormatKind, AnnattoError> {
    match name {
        "textfile" => Ok(FormatKind::TextFile),
        "textline" => Ok(FormatKind::TextLine),
        "csv" => Ok(FormatKind::Csv),
        "excel" => Ok(FormatKind::Excel),
        "json" => Ok(FormatKind::Json),
        "jsonl" => Ok(FormatKind::Jsonl),
        "fasttext" => Ok(FormatKind::FastText),
        "conll" => Ok(FormatKind::Conll),
        "filemanifest" => Ok(FormatKind::FileManifest),
        other => Err(AnnattoError::InvalidArgument(format!(
            "unknown format '{}' (run 'annatto catalog' to list formats)",
            other
        ))),
    }
}

/// Execute the ingest subcommand.
fn run_ingest(args: IngestArgs) -> Result<(), AnnattoError> {
    let kind = parse_project_kind(&args.project_kind)?;
    let format = parse_format(&args.format)?;

    let store: Box<dyn ProjectStore> = match &args.db {
        Some(path) => Box::new(SqliteStore::open(path)?),
        None => Box::new(MemoryStore::new()),
    };
    let project_id = store.create_project(
        &Project::new(0, "cli import", kind)
            .single_class(args.single_class)
            .overlapping(args.allow_overlapping)
            .collaborative(args.collaborative),
    )?;

    let options = ingest::IngestOptions {
        encoding: args.encoding,
        delimiter: args.delimiter,
        column_data: args.column_data,
        column_label: args.column_label,
        scheme: args.scheme,
    };
    let report = ingest::ingest(
        store.as_ref(),
        project_id,
        ids::UserId::new(1),
        format,
        &args.files,
        &options,
        args.batch_size,
    )?;

    match args.output.as_str() {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?
        ),
        _ => {
            for error in &report.errors {
                println!("error: {}", error);
            }
            println!(
                "imported {} example(s), {} annotation(s), {} error(s)",
                report.examples,
                report.annotations,
                report.errors.len()
            );
        }
    }
    Ok(())
}

/// Execute the catalog subcommand.
fn run_catalog(args: CatalogArgs) -> Result<(), AnnattoError> {
    let kind = parse_project_kind(&args.project_kind)?;
    let specs = catalog::Catalog::new().formats(kind);

    match args.output.as_str() {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(specs).map_err(std::io::Error::other)?
        ),
        _ => {
            println!("formats for {} projects:", kind.name());
            for spec in specs {
                println!();
                println!(
                    "  {} ({})",
                    spec.format.name(),
                    spec.content_types.join(", ")
                );
                for line in spec.example.lines() {
                    println!("    {}", line);
                }
            }
        }
    }
    Ok(())
}
