//! Line-per-example plain text: every non-empty line becomes an example.

use crate::error::{AnnattoError, ParseError};

use super::{for_each_line, EntrySink, RawEntry, RecordParser, SourceFile};

#[derive(Debug, Default)]
pub struct TextLineParser;

impl TextLineParser {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for TextLineParser {
    fn parse(&mut self, src: &SourceFile, sink: &mut EntrySink<'_>) -> Result<(), AnnattoError> {
        for_each_line(src, |line_no, line| {
            if line.trim().is_empty() {
                return Ok(());
            }
            sink(RawEntry::new(line_no).with_field("text", line))
        })
    }

    fn take_errors(&mut self) -> Vec<ParseError> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::testutil::parse_str;

    #[test]
    fn skips_blank_lines_and_tracks_line_numbers() {
        let mut parser = TextLineParser::new();
        let (entries, errors, result) = parse_str(&mut parser, "first\n\nthird\n");
        result.unwrap();
        assert!(errors.is_empty());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].fields["text"], "first");
        assert_eq!(entries[0].line, 1);
        assert_eq!(entries[1].fields["text"], "third");
        assert_eq!(entries[1].line, 3);
    }

    #[test]
    fn handles_crlf_endings() {
        let mut parser = TextLineParser::new();
        let (entries, _, result) = parse_str(&mut parser, "one\r\ntwo\r\n");
        result.unwrap();
        assert_eq!(entries[0].fields["text"], "one");
        assert_eq!(entries[1].fields["text"], "two");
    }
}
