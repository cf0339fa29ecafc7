//! Whole-file JSON arrays.
//!
//! The file is parsed in one shot (a known memory-scaling limit for very
//! large uploads). A decode failure invalidates the whole file and
//! yields exactly one [`ParseError`]; no entries are produced.

use crate::error::{AnnattoError, ParseError};

use super::{EntrySink, RawEntry, RecordParser, SourceFile};

#[derive(Debug, Default)]
pub struct JsonParser {
    errors: Vec<ParseError>,
}

impl JsonParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordParser for JsonParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        let text = src.read_to_string()?;

        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                self.errors
                    .push(ParseError::new(&src.filename, e.line(), e.to_string()));
                return Ok(());
            }
        };

        let items = match value {
            serde_json::Value::Array(items) => items,
            // A single top-level object is accepted as a one-element array.
            serde_json::Value::Object(_) => vec![value],
            _ => {
                self.errors.push(ParseError::new(
                    &src.filename,
                    1,
                    "expected a JSON array of objects",
                ));
                return Ok(());
            }
        };

        for (index, item) in items.into_iter().enumerate() {
            let line = index + 1;
            match item {
                serde_json::Value::Object(map) => {
                    let mut entry = RawEntry::new(line);
                    entry.fields = map.into_iter().collect();
                    sink(entry)?;
                }
                other => {
                    self.errors.push(ParseError::new(
                        &src.filename,
                        line,
                        format!("expected a JSON object, found {}", json_kind(&other)),
                    ));
                }
            }
        }
        Ok(())
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
