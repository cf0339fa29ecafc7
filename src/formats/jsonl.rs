//! JSON Lines: one JSON object per line.
//!
//! A malformed line yields a [`ParseError`] for that line only; parsing
//! continues with the next line.

use crate::error::{AnnattoError, ParseError};

use super::{for_each_line, EntrySink, RawEntry, RecordParser, SourceFile};

#[derive(Debug, Default)]
pub struct JsonlParser {
    errors: Vec<ParseError>,
}

impl JsonlParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordParser for JsonlParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        let errors = &mut self.errors;
        for_each_line(src, |line_no, line| {
            if line.trim().is_empty() {
                return Ok(());
            }
            match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(line) {
                Ok(map) => {
                    let mut entry = RawEntry::new(line_no);
                    entry.fields = map.into_iter().collect();
                    sink(entry)
                }
                Err(e) => {
                    errors.push(ParseError::new(&src.filename, line_no, e.to_string()));
                    Ok(())
                }
            }
        })
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }
}
