//! Spreadsheet uploads (xlsx/xls/ods) via calamine.
//!
//! The first sheet is read whole (the same accepted memory-scaling limit
//! as JSON arrays); its first row is the header. Cells beyond the header
//! width make that row malformed; the remaining rows still parse.

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{AnnattoError, ParseError};

use super::{EntrySink, RawEntry, RecordParser, SourceFile};

#[derive(Debug, Default)]
pub struct ExcelParser {
    errors: Vec<ParseError>,
}

impl ExcelParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordParser for ExcelParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        let mut workbook =
            open_workbook_auto(&src.path).map_err(|e| AnnattoError::FatalParse {
                filename: src.filename.clone(),
                line: 0,
                message: format!("failed to open workbook: {}", e),
            })?;

        let sheet_name = match workbook.sheet_names().first() {
            Some(name) => name.clone(),
            None => return Ok(()),
        };
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| AnnattoError::FatalParse {
                filename: src.filename.clone(),
                line: 0,
                message: format!("failed to read sheet '{}': {}", sheet_name, e),
            })?;

        let mut rows = range.rows();
        let header: Vec<String> = match rows.next() {
            Some(row) => row.iter().map(cell_to_string).collect(),
            None => return Ok(()),
        };

        for (index, row) in rows.enumerate() {
            let line = index + 2;

            // Calamine pads rows to the range width with empty cells, so
            // width disagreement shows up as data beyond the header.
            let used = row
                .iter()
                .rposition(|cell| !matches!(cell, Data::Empty))
                .map(|i| i + 1)
                .unwrap_or(0);
            if used == 0 {
                continue;
            }
            if used > header.len() {
                self.errors.push(ParseError::new(
                    &src.filename,
                    line,
                    format!("expected {} column(s), found {}", header.len(), used),
                ));
                continue;
            }

            let mut entry = RawEntry::new(line);
            for (name, cell) in header.iter().zip(row.iter()) {
                if matches!(cell, Data::Empty) {
                    continue;
                }
                entry.fields.insert(name.clone(), cell_to_value(cell));
            }
            sink(entry)?;
        }
        Ok(())
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> serde_json::Value {
    match cell {
        Data::String(s) => serde_json::Value::from(s.as_str()),
        Data::Int(i) => serde_json::Value::from(*i),
        Data::Float(f) => serde_json::Value::from(*f),
        Data::Bool(b) => serde_json::Value::from(*b),
        other => serde_json::Value::from(other.to_string()),
    }
}
