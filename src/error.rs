use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

/// The main error type for annatto operations.
///
/// Recoverable per-line problems are *not* represented here; they are
/// collected as [`ParseError`] values and surfaced in the job report.
/// This enum covers failures that stop processing of a file or a job.
#[derive(Debug, Error)]
pub enum AnnattoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A file-fatal parse failure (e.g. a CoNLL line that does not split
    /// into exactly two tab-separated fields). Processing of the file
    /// stops; other files in the same job continue.
    #[error("{message} ({filename}, line {line})")]
    FatalParse {
        filename: String,
        line: usize,
        message: String,
    },

    #[error("unsupported format '{format}' for {kind} projects")]
    UnsupportedFormat { format: String, kind: String },

    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),

    #[error("{0}")]
    InvalidArgument(String),
}

/// A recoverable per-line ingestion error.
///
/// These are aggregated into the job result (`{error: [...]}`) and never
/// raised past the ingestion boundary: the offending line is skipped and
/// processing continues.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParseError {
    /// Name of the uploaded file the error occurred in.
    pub filename: String,
    /// 1-based line number (0 when the error is not tied to a line).
    pub line: usize,
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl ParseError {
    pub fn new(filename: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.filename, self.line, self.message)
    }
}

/// Why the live annotation-admission path rejected a request.
///
/// These are user-facing validation failures, surfaced synchronously to
/// the caller and never silently dropped.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("start_offset must be less than end_offset")]
    InvalidOffsets,

    #[error("duplicate annotation for single-class-classification project")]
    SingleClassViolation,

    #[error("this label has already been applied to the example")]
    DuplicateLabel,

    #[error("overlapping span is not allowed for this project")]
    OverlappingSpan,

    #[error("an identical text label already exists for the example")]
    DuplicateText,

    #[error("label text already exists in this project")]
    LabelTextTaken,

    #[error("a label with this shortcut already exists")]
    ShortcutTaken,
}
