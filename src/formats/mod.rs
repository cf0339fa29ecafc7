//! Format parsers for uploaded dataset files.
//!
//! Each supported upload format gets its own module implementing
//! [`RecordParser`]: a single forward pass over one file that pushes raw
//! field-maps into a sink as they are parsed. Recoverable row-level
//! problems are accumulated on the parser and collected afterwards with
//! [`RecordParser::take_errors`]; only file-fatal conditions (CoNLL
//! misalignment, a whole-file JSON decode failure) surface as `Err`.

pub mod conll;
pub mod csv;
pub mod excel;
pub mod fasttext;
pub mod filemanifest;
pub mod json;
pub mod jsonl;
pub mod scheme;
pub mod textfile;
pub mod textline;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;

use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{AnnattoError, ParseError};
use crate::ingest::IngestOptions;

/// The set of upload formats annatto understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Whole file becomes one example.
    TextFile,
    /// One example per non-empty line.
    TextLine,
    Csv,
    Excel,
    Json,
    Jsonl,
    FastText,
    Conll,
    /// Binary file uploads (images, audio); each file is one example.
    FileManifest,
}

impl FormatKind {
    /// The name accepted by job submission and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::TextFile => "textfile",
            FormatKind::TextLine => "textline",
            FormatKind::Csv => "csv",
            FormatKind::Excel => "excel",
            FormatKind::Json => "json",
            FormatKind::Jsonl => "jsonl",
            FormatKind::FastText => "fasttext",
            FormatKind::Conll => "conll",
            FormatKind::FileManifest => "filemanifest",
        }
    }

    /// Formats that read raw bytes directly and skip encoding detection.
    pub fn is_binary(&self) -> bool {
        matches!(self, FormatKind::Excel | FormatKind::FileManifest)
    }
}

/// One uploaded file, together with the encoding it decodes under.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Display name used in error reports (the original upload name).
    pub filename: String,
    pub encoding: &'static Encoding,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, encoding: &'static Encoding) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            filename,
            encoding,
        }
    }

    /// Opens the file as a buffered UTF-8 reader, transcoding from the
    /// resolved encoding on the fly. Line-oriented parsers read through
    /// this so large files never sit in memory whole.
    pub fn open(&self) -> std::io::Result<BufReader<impl Read>> {
        let file = File::open(&self.path)?;
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(Some(self.encoding))
            .build(file);
        Ok(BufReader::new(decoder))
    }

    /// Reads and transcodes the whole file (JSON-array parsing).
    pub fn read_to_string(&self) -> std::io::Result<String> {
        let mut text = String::new();
        self.open()?.read_to_string(&mut text)?;
        Ok(text)
    }
}

/// A parsed row before record construction: the raw field-map plus the
/// 1-based source line it came from.
#[derive(Clone, Debug, Default)]
pub struct RawEntry {
    pub fields: BTreeMap<String, serde_json::Value>,
    pub line: usize,
}

impl RawEntry {
    pub fn new(line: usize) -> Self {
        Self {
            fields: BTreeMap::new(),
            line,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// The sink a parser pushes entries into. Returning `Err` aborts the
/// pass (a downstream storage failure, not a parse problem).
pub type EntrySink<'a> = dyn FnMut(RawEntry) -> Result<(), AnnattoError> + 'a;

/// One forward pass over one file.
///
/// Finite, not restartable without reopening the file. Implementations
/// push well-formed entries into the sink and record malformed rows via
/// their own error list; they return `Err` only for file-fatal
/// conditions or sink failures.
pub trait RecordParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError>;

    /// Row-level errors accumulated during the pass (empty if none).
    fn take_errors(&mut self) -> Vec<ParseError>;
}

/// Builds the parser for a format, configured from the job options.
///
/// Selection happens here once per file, not via scattered conditionals
/// at the call sites.
pub fn parser_for(format: FormatKind, options: &IngestOptions) -> Box<dyn RecordParser> {
    match format {
        FormatKind::TextFile => Box::new(textfile::TextFileParser::new()),
        FormatKind::TextLine => Box::new(textline::TextLineParser::new()),
        FormatKind::Csv => Box::new(csv::CsvParser::new(options.delimiter)),
        FormatKind::Excel => Box::new(excel::ExcelParser::new()),
        FormatKind::Json => Box::new(json::JsonParser::new()),
        FormatKind::Jsonl => Box::new(jsonl::JsonlParser::new()),
        FormatKind::FastText => Box::new(fasttext::FastTextParser::new()),
        FormatKind::Conll => Box::new(conll::ConllParser::new(options.scheme)),
        FormatKind::FileManifest => Box::new(filemanifest::FileManifestParser::new()),
    }
}

/// Reads decoded lines from a source file, yielding `(line_number, line)`.
///
/// Shared by the line-oriented parsers. Trailing `\n`/`\r\n` is stripped.
pub(crate) fn for_each_line<F>(src: &SourceFile, mut f: F) -> Result<(), AnnattoError>
where
    F: FnMut(usize, &str) -> Result<(), AnnattoError>,
{
    let mut reader = src.open()?;
    let mut buf = String::new();
    let mut line_no = 0usize;
    loop {
        buf.clear();
        let n = reader.read_line(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        line_no += 1;
        let line = buf.strip_suffix('\n').unwrap_or(&buf);
        let line = line.strip_suffix('\r').unwrap_or(line);
        f(line_no, line)?;
    }
}
