//! Delimited-text parsing (CSV and friends).
//!
//! The header row defines column names. A row whose column count does
//! not match the header yields a [`ParseError`] for that line and is
//! skipped; the remaining rows still parse.

use crate::error::{AnnattoError, ParseError};

use super::{EntrySink, RawEntry, RecordParser, SourceFile};

pub struct CsvParser {
    delimiter: u8,
    errors: Vec<ParseError>,
}

impl CsvParser {
    /// `delimiter` is one of the recognized separators
    /// (`,` `\t` `;` `|` or space).
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter: delimiter as u8,
            errors: Vec::new(),
        }
    }
}

impl RecordParser for CsvParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(src.open()?);

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| AnnattoError::FatalParse {
                filename: src.filename.clone(),
                line: 1,
                message: format!("failed to read header row: {}", e),
            })?
            .iter()
            .map(str::to_string)
            .collect();

        for (index, row) in reader.records().enumerate() {
            // Header is line 1; data rows follow. Positions from the csv
            // reader are preferred when available.
            let fallback_line = index + 2;
            match row {
                Ok(row) => {
                    let line = row
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(fallback_line);
                    if row.len() != header.len() {
                        self.errors.push(ParseError::new(
                            &src.filename,
                            line,
                            format!(
                                "expected {} column(s), found {}",
                                header.len(),
                                row.len()
                            ),
                        ));
                        continue;
                    }
                    let mut entry = RawEntry::new(line);
                    for (name, value) in header.iter().zip(row.iter()) {
                        entry
                            .fields
                            .insert(name.clone(), serde_json::Value::from(value));
                    }
                    sink(entry)?;
                }
                Err(e) => {
                    let line = e
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(fallback_line);
                    self.errors
                        .push(ParseError::new(&src.filename, line, e.to_string()));
                }
            }
        }
        Ok(())
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }
}
