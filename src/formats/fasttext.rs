//! fastText-style tagged lines.
//!
//! Tokens prefixed with the label marker (`__label__` by default) are
//! extracted as category labels; the remaining tokens join to form the
//! text. A marker with no suffix is a [`ParseError`] and the line is
//! skipped.

use crate::error::{AnnattoError, ParseError};

use super::{for_each_line, EntrySink, RawEntry, RecordParser, SourceFile};

pub const DEFAULT_LABEL_MARKER: &str = "__label__";

pub struct FastTextParser {
    marker: String,
    errors: Vec<ParseError>,
}

impl FastTextParser {
    pub fn new() -> Self {
        Self::with_marker(DEFAULT_LABEL_MARKER)
    }

    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            errors: Vec::new(),
        }
    }
}

impl Default for FastTextParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for FastTextParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        let marker = self.marker.clone();
        let errors = &mut self.errors;
        for_each_line(src, |line_no, line| {
            if line.trim().is_empty() {
                return Ok(());
            }

            let mut labels = Vec::new();
            let mut text_tokens = Vec::new();
            for token in line.split_whitespace() {
                match token.strip_prefix(marker.as_str()) {
                    Some("") => {
                        errors.push(ParseError::new(
                            &src.filename,
                            line_no,
                            format!("empty label name after '{}'", marker),
                        ));
                        return Ok(());
                    }
                    Some(name) => labels.push(serde_json::Value::from(name)),
                    None => text_tokens.push(token),
                }
            }

            sink(
                RawEntry::new(line_no)
                    .with_field("text", text_tokens.join(" "))
                    .with_field("label", serde_json::Value::Array(labels)),
            )
        })
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }
}
