//! Whole-file plain text: the entire file becomes one example.

use crate::error::{AnnattoError, ParseError};

use super::{EntrySink, RawEntry, RecordParser, SourceFile};

#[derive(Debug, Default)]
pub struct TextFileParser;

impl TextFileParser {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for TextFileParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        let text = src.read_to_string()?;
        sink(RawEntry::new(1).with_field("text", text))
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        Vec::new()
    }
}
