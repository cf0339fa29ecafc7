//! Binary file uploads (images, audio).
//!
//! Each uploaded path becomes one file-backed entry; a directory is
//! walked and every regular file inside it becomes an entry. No labels
//! are extracted.

use walkdir::WalkDir;

use crate::error::{AnnattoError, ParseError};

use super::{EntrySink, RawEntry, RecordParser, SourceFile};

#[derive(Debug, Default)]
pub struct FileManifestParser {
    errors: Vec<ParseError>,
}

impl FileManifestParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordParser for FileManifestParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        if src.path.is_file() {
            return sink(
                RawEntry::new(1).with_field("filename", src.path.display().to_string()),
            );
        }

        let mut line = 0usize;
        for entry in WalkDir::new(&src.path).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    line += 1;
                    sink(
                        RawEntry::new(line)
                            .with_field("filename", entry.path().display().to_string()),
                    )?;
                }
                Ok(_) => {}
                Err(e) => {
                    self.errors
                        .push(ParseError::new(&src.filename, 0, e.to_string()));
                }
            }
        }
        Ok(())
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }
}
