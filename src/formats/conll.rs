//! CoNLL-style tagged tokens.
//!
//! One `token<TAB>tag` pair per line; a blank line ends a sentence. Tags
//! are decoded under the selected [`TaggingScheme`] into entities, which
//! are then aligned to character offsets over the sentence formed by
//! joining tokens with the token delimiter.
//!
//! Unlike CSV/JSONL, malformed lines here are fatal for the whole file:
//! once token/tag alignment is broken, offsets for the rest of the
//! sentence would be undefined.

use crate::error::{AnnattoError, ParseError};

use super::scheme::{char_offsets, TaggingScheme};
use super::{for_each_line, EntrySink, RawEntry, RecordParser, SourceFile};

/// Default join delimiter between tokens when rebuilding sentence text.
pub const DEFAULT_TOKEN_DELIMITER: &str = " ";

pub struct ConllParser {
    scheme: TaggingScheme,
    token_delimiter: String,
}

impl ConllParser {
    pub fn new(scheme: TaggingScheme) -> Self {
        Self::with_token_delimiter(scheme, DEFAULT_TOKEN_DELIMITER)
    }

    /// Overrides the token join delimiter (e.g. `""` for unsegmented
    /// scripts).
    pub fn with_token_delimiter(scheme: TaggingScheme, delimiter: impl Into<String>) -> Self {
        Self {
            scheme,
            token_delimiter: delimiter.into(),
        }
    }

    fn flush_sentence(
        &self,
        tokens: &mut Vec<String>,
        tags: &mut Vec<String>,
        first_line: usize,
        sink: &mut EntrySink<'_>,
    ) -> Result<(), AnnattoError> {
        if tokens.is_empty() {
            return Ok(());
        }

        let token_refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();

        let labels: Vec<serde_json::Value> = self
            .scheme
            .decode(&tag_refs)
            .iter()
            .map(|entity| {
                let (start, end) = char_offsets(&token_refs, &self.token_delimiter, entity);
                serde_json::json!([start, end, entity.label])
            })
            .collect();

        let text = tokens.join(&self.token_delimiter);
        tokens.clear();
        tags.clear();

        sink(
            RawEntry::new(first_line)
                .with_field("text", text)
                .with_field("label", serde_json::Value::Array(labels)),
        )
    }
}

impl RecordParser for ConllParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        let mut tokens: Vec<String> = Vec::new();
        let mut tags: Vec<String> = Vec::new();
        let mut sentence_line = 0usize;

        for_each_line(src, |line_no, line| {
            if line.trim().is_empty() {
                return self.flush_sentence(&mut tokens, &mut tags, sentence_line, sink);
            }

            let mut parts = line.split('\t');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(token), Some(tag), None) => {
                    if tokens.is_empty() {
                        sentence_line = line_no;
                    }
                    tokens.push(token.to_string());
                    tags.push(tag.to_string());
                    Ok(())
                }
                _ => Err(AnnattoError::FatalParse {
                    filename: src.filename.clone(),
                    line: line_no,
                    message: "expected exactly two tab-separated fields (token, tag)".to_string(),
                }),
            }
        })?;

        // Final sentence when the file does not end with a blank line.
        self.flush_sentence(&mut tokens, &mut tags, sentence_line, sink)
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        Vec::new()
    }
}
