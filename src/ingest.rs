//! The ingestion pipeline: detect encoding, parse, build records,
//! write in batches.
//!
//! A job processes its files in order through one [`BatchedWriter`],
//! so batches may span file boundaries. Per-line problems and
//! file-fatal parse failures both end up in the job report; only
//! storage and configuration failures abort the job.

use std::path::PathBuf;

use encoding_rs::UTF_8;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::builder::{RecordBuilder, DEFAULT_DATA_COLUMN, DEFAULT_LABEL_COLUMN};
use crate::catalog::Catalog;
use crate::encoding::{self, AUTO};
use crate::error::{AnnattoError, ParseError};
use crate::formats::{parser_for, FormatKind, RawEntry, SourceFile};
use crate::ids::{ProjectId, UserId};
use crate::store::ProjectStore;
use crate::writer::BatchedWriter;

/// Field separators an upload may declare. Anything else is rejected
/// before parsing starts; the `csv` crate only sees single-byte
/// delimiters.
pub const DELIMITERS: [char; 5] = [',', '\t', ';', '|', ' '];

/// Per-job knobs, deserialized from the upload request with every field
/// optional. Unknown keys are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Encoding label, or "Auto" to sniff each file.
    pub encoding: String,
    /// CSV field delimiter.
    pub delimiter: char,
    /// Column holding the example text.
    pub column_data: String,
    /// Column holding the label payload.
    pub column_label: String,
    /// Tagging scheme for CoNLL uploads.
    pub scheme: crate::formats::scheme::TaggingScheme,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            encoding: AUTO.to_string(),
            delimiter: ',',
            column_data: DEFAULT_DATA_COLUMN.to_string(),
            column_label: DEFAULT_LABEL_COLUMN.to_string(),
            scheme: crate::formats::scheme::TaggingScheme::Iob2,
        }
    }
}

/// The outcome of an ingestion job.
///
/// An empty error list means every row of every file was imported.
#[derive(Clone, Debug, Default, Serialize)]
pub struct IngestReport {
    #[serde(rename = "error")]
    pub errors: Vec<ParseError>,
    pub examples: usize,
    pub annotations: usize,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs one ingestion job against `store`.
///
/// The format is gated against the project kind's catalog up front.
/// Each file is then decoded, parsed and built into records that flow
/// through a [`BatchedWriter`]; a file-fatal parse failure is reported
/// as a single error for that file and the next file continues.
pub fn ingest(
    store: &dyn ProjectStore,
    project: ProjectId,
    user: UserId,
    format: FormatKind,
    files: &[PathBuf],
    options: &IngestOptions,
    batch_size: usize,
) -> Result<IngestReport, AnnattoError> {
    if !DELIMITERS.contains(&options.delimiter) {
        return Err(AnnattoError::InvalidArgument(format!(
            "unsupported delimiter {:?}",
            options.delimiter
        )));
    }
    let project = store.project(project)?;
    if !Catalog::new().supports(project.kind, format) {
        return Err(AnnattoError::UnsupportedFormat {
            format: format.name().to_string(),
            kind: project.kind.name().to_string(),
        });
    }

    info!(
        project = project.id.as_i64(),
        format = format.name(),
        files = files.len(),
        "ingestion job started"
    );

    let builder =
        RecordBuilder::for_project(project.kind, &options.column_data, &options.column_label);
    let mut writer = BatchedWriter::new(store, &project, user, batch_size);

    for path in files {
        // Binary formats read raw bytes; everything else goes through
        // the resolved encoding.
        let src = if format.is_binary() {
            SourceFile::new(path, UTF_8)
        } else {
            match encoding::resolve_encoding(path, &options.encoding) {
                Ok(enc) => SourceFile::new(path, enc),
                Err(err @ AnnattoError::UnknownEncoding(_)) => return Err(err),
                Err(AnnattoError::Io(err)) => {
                    writer.record_error(ParseError::new(display_name(path), 0, err.to_string()));
                    continue;
                }
                Err(err) => return Err(err),
            }
        };
        debug!(
            file = src.filename,
            encoding = src.encoding.name(),
            "parsing file"
        );

        let mut parser = parser_for(format, options);
        let result = parser.parse(&src, &mut |entry: RawEntry| {
            match builder.build(entry, &src.filename) {
                Ok(record) => writer.push(record),
                Err(err) => {
                    writer.record_error(err);
                    Ok(())
                }
            }
        });
        for err in parser.take_errors() {
            writer.record_error(err);
        }
        match result {
            Ok(()) => {}
            // A broken file is one report entry; the job moves on.
            Err(AnnattoError::FatalParse {
                filename,
                line,
                message,
            }) => writer.record_error(ParseError::new(filename, line, message)),
            Err(AnnattoError::Io(err)) => {
                writer.record_error(ParseError::new(src.filename.clone(), 0, err.to_string()))
            }
            Err(err) => return Err(err),
        }
    }

    let summary = writer.finish()?;
    let report = IngestReport {
        errors: summary.errors,
        examples: summary.examples,
        annotations: summary.annotations,
    };
    info!(
        examples = report.examples,
        errors = report.errors.len(),
        "ingestion job finished"
    );
    Ok(report)
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Project, ProjectKind};
    use crate::store::MemoryStore;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn rejects_format_outside_catalog() {
        let store = MemoryStore::new();
        let project = store
            .create_project(&Project::new(0, "p", ProjectKind::CategoryClassification))
            .unwrap();
        let err = ingest(
            &store,
            project,
            UserId::new(1),
            FormatKind::Conll,
            &[],
            &IngestOptions::default(),
            10,
        )
        .unwrap_err();
        assert!(matches!(err, AnnattoError::UnsupportedFormat { .. }));
    }

    #[test]
    fn fatal_file_reported_and_next_file_processed() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_file(&dir, "bad.conll", "only-one-field\n");
        let good = write_file(&dir, "good.conll", "Paris\tB-LOC\n");

        let store = MemoryStore::new();
        let project = store
            .create_project(&Project::new(0, "p", ProjectKind::SpanLabeling))
            .unwrap();
        let report = ingest(
            &store,
            project,
            UserId::new(1),
            FormatKind::Conll,
            &[bad, good],
            &IngestOptions::default(),
            10,
        )
        .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].filename, "bad.conll");
        assert_eq!(report.examples, 1);
    }

    #[test]
    fn missing_file_is_reported_not_fatal() {
        let store = MemoryStore::new();
        let project = store
            .create_project(&Project::new(0, "p", ProjectKind::CategoryClassification))
            .unwrap();
        let report = ingest(
            &store,
            project,
            UserId::new(1),
            FormatKind::Csv,
            &[PathBuf::from("/no/such/upload.csv")],
            &IngestOptions::default(),
            10,
        )
        .unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.examples, 0);
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let store = MemoryStore::new();
        let project = store
            .create_project(&Project::new(0, "p", ProjectKind::CategoryClassification))
            .unwrap();
        let options = IngestOptions {
            delimiter: 'é',
            ..IngestOptions::default()
        };
        let err = ingest(
            &store,
            project,
            UserId::new(1),
            FormatKind::Csv,
            &[],
            &options,
            10,
        )
        .unwrap_err();
        assert!(matches!(err, AnnattoError::InvalidArgument(_)));
        assert!(err.to_string().contains("unsupported delimiter"));
    }

    #[test]
    fn unknown_encoding_label_is_job_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_file(&dir, "a.csv", "text,label\nhello,pos\n");
        let store = MemoryStore::new();
        let project = store
            .create_project(&Project::new(0, "p", ProjectKind::CategoryClassification))
            .unwrap();
        let options = IngestOptions {
            encoding: "not-a-charset".to_string(),
            ..IngestOptions::default()
        };
        let err = ingest(
            &store,
            project,
            UserId::new(1),
            FormatKind::Csv,
            &[csv],
            &options,
            10,
        )
        .unwrap_err();
        assert!(matches!(err, AnnattoError::UnknownEncoding(_)));
    }
}
