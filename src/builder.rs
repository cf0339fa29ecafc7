//! Record construction from raw field-maps.
//!
//! The builder knows the task's column semantics: which field holds the
//! text, which holds the labels, and what shape label values take for
//! the task kind. Only a missing/empty text column escalates to a
//! [`ParseError`]; a label item with the wrong shape is silently dropped.

use serde_json::Value;

use crate::error::ParseError;
use crate::formats::RawEntry;
use crate::model::{ExampleData, LabelCandidate, ProjectKind, Record};

/// Default name of the column holding the example text.
pub const DEFAULT_DATA_COLUMN: &str = "text";
/// Default name of the column holding labels.
pub const DEFAULT_LABEL_COLUMN: &str = "label";
/// The field file-based parsers put the upload path in.
pub const FILENAME_COLUMN: &str = "filename";

/// The shape label values take for a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuilderKind {
    /// Scalar label names.
    Category,
    /// `[start, end, label]` triples.
    Span,
    /// Free-text labels.
    Text,
    /// `{"cats": [...], "entities": [...]}` objects.
    IntentSlot,
}

impl BuilderKind {
    /// The label shape a project kind's imports use.
    pub fn for_project(kind: ProjectKind) -> Self {
        match kind {
            ProjectKind::CategoryClassification | ProjectKind::ImageClassification => {
                BuilderKind::Category
            }
            ProjectKind::SpanLabeling => BuilderKind::Span,
            ProjectKind::Seq2seq | ProjectKind::AudioSpeechToText => BuilderKind::Text,
            ProjectKind::IntentSlot => BuilderKind::IntentSlot,
        }
    }
}

/// Turns raw field-maps into canonical [`Record`]s.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    kind: BuilderKind,
    column_data: String,
    column_label: String,
    /// Whether a `filename` field may stand in for missing text. Only
    /// file-based tasks get the fallback; text tasks reject such rows.
    file_fallback: bool,
}

impl RecordBuilder {
    pub fn new(
        kind: BuilderKind,
        column_data: impl Into<String>,
        column_label: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            column_data: column_data.into(),
            column_label: column_label.into(),
            file_fallback: false,
        }
    }

    /// A builder configured for a project kind: its label shape, plus
    /// the filename fallback when the kind annotates uploaded files.
    pub fn for_project(
        kind: ProjectKind,
        column_data: impl Into<String>,
        column_label: impl Into<String>,
    ) -> Self {
        let mut builder = Self::new(BuilderKind::for_project(kind), column_data, column_label);
        builder.file_fallback = kind.is_file_based();
        builder
    }

    /// Builds a record from one parsed entry.
    ///
    /// The text column and label column are popped; everything left over
    /// becomes per-example metadata.
    pub fn build(&self, mut entry: RawEntry, filename: &str) -> Result<Record, ParseError> {
        let data = self.pop_data(&mut entry, filename)?;

        let labels = match entry.fields.remove(&self.column_label) {
            // Absent labels are tolerated: zero labels, not an error.
            None => Vec::new(),
            Some(value) => self.parse_labels(value),
        };

        Ok(Record {
            data,
            labels,
            meta: entry.fields,
            filename: filename.to_string(),
            line: entry.line,
        })
    }

    fn pop_data(&self, entry: &mut RawEntry, filename: &str) -> Result<ExampleData, ParseError> {
        if let Some(value) = entry.fields.remove(&self.column_data) {
            let text = scalar_to_string(&value).unwrap_or_default();
            if text.trim().is_empty() {
                return Err(ParseError::new(
                    filename,
                    entry.line,
                    "empty text is not allowed",
                ));
            }
            return Ok(ExampleData::Text(text));
        }

        if self.file_fallback {
            if let Some(value) = entry.fields.remove(FILENAME_COLUMN) {
                if let Some(path) = scalar_to_string(&value) {
                    return Ok(ExampleData::File(path.into()));
                }
            }
        }

        Err(ParseError::new(
            filename,
            entry.line,
            "empty text is not allowed",
        ))
    }

    /// Parses the label column value into candidates. A scalar is
    /// normalized to a one-element list; items that fail shape
    /// validation are dropped, never escalated.
    fn parse_labels(&self, value: Value) -> Vec<LabelCandidate> {
        if self.kind == BuilderKind::IntentSlot {
            return parse_intent_slot(value);
        }

        let items = match value {
            Value::Array(items) => items,
            Value::Null => return Vec::new(),
            scalar => vec![scalar],
        };

        items
            .iter()
            .filter_map(|item| match self.kind {
                BuilderKind::Category => parse_category(item),
                BuilderKind::Span => parse_span(item),
                BuilderKind::Text => parse_text(item),
                BuilderKind::IntentSlot => unreachable!("handled above"),
            })
            .collect()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_category(item: &Value) -> Option<LabelCandidate> {
    let name = scalar_to_string(item)?;
    if name.is_empty() {
        return None;
    }
    Some(LabelCandidate::Category(name))
}

fn parse_text(item: &Value) -> Option<LabelCandidate> {
    let text = scalar_to_string(item)?;
    if text.is_empty() {
        return None;
    }
    Some(LabelCandidate::Text(text))
}

fn parse_span(item: &Value) -> Option<LabelCandidate> {
    let triple = item.as_array()?;
    if triple.len() != 3 {
        return None;
    }
    let start = triple[0].as_u64()? as usize;
    let end = triple[1].as_u64()? as usize;
    let label = scalar_to_string(&triple[2])?;
    if start >= end || label.is_empty() {
        return None;
    }
    Some(LabelCandidate::Span { start, end, label })
}

fn parse_intent_slot(value: Value) -> Vec<LabelCandidate> {
    // Accept the object directly or wrapped in a one-element list.
    let obj = match value {
        Value::Object(obj) => obj,
        Value::Array(mut items) if items.len() == 1 => match items.remove(0) {
            Value::Object(obj) => obj,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut candidates = Vec::new();
    if let Some(Value::Array(cats)) = obj.get("cats") {
        candidates.extend(cats.iter().filter_map(parse_category));
    }
    if let Some(Value::Array(entities)) = obj.get("entities") {
        candidates.extend(entities.iter().filter_map(parse_span));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(line: usize, fields: Value) -> RawEntry {
        let mut entry = RawEntry::new(line);
        entry.fields = fields.as_object().unwrap().clone().into_iter().collect();
        entry
    }

    #[test]
    fn text_and_scalar_label() {
        let builder = RecordBuilder::new(BuilderKind::Category, "text", "label");
        let record = builder
            .build(entry(2, json!({"text": "hello", "label": "pos"})), "a.csv")
            .unwrap();
        assert_eq!(record.data, ExampleData::Text("hello".into()));
        assert_eq!(record.labels, vec![LabelCandidate::Category("pos".into())]);
        assert_eq!(record.line, 2);
    }

    #[test]
    fn missing_text_is_escalated() {
        let builder = RecordBuilder::new(BuilderKind::Category, "text", "label");
        let err = builder
            .build(entry(5, json!({"label": "pos"})), "a.csv")
            .unwrap_err();
        assert_eq!(err.message, "empty text is not allowed");
        assert_eq!(err.line, 5);
    }

    #[test]
    fn whitespace_only_text_is_escalated() {
        let builder = RecordBuilder::new(BuilderKind::Category, "text", "label");
        assert!(builder
            .build(entry(1, json!({"text": "   "})), "a.csv")
            .is_err());
    }

    #[test]
    fn absent_label_column_means_zero_labels() {
        let builder = RecordBuilder::new(BuilderKind::Category, "text", "label");
        let record = builder
            .build(entry(1, json!({"text": "hello"})), "a.csv")
            .unwrap();
        assert!(record.labels.is_empty());
    }

    #[test]
    fn remaining_columns_become_metadata() {
        let builder = RecordBuilder::new(BuilderKind::Category, "text", "label");
        let record = builder
            .build(
                entry(1, json!({"text": "hi", "label": "a", "source": "web"})),
                "a.csv",
            )
            .unwrap();
        assert_eq!(record.meta.get("source"), Some(&json!("web")));
        assert!(!record.meta.contains_key("text"));
        assert!(!record.meta.contains_key("label"));
    }

    #[test]
    fn malformed_span_items_are_dropped_silently() {
        let builder = RecordBuilder::new(BuilderKind::Span, "text", "label");
        let record = builder
            .build(
                entry(
                    1,
                    json!({
                        "text": "John lives here",
                        "label": [[0, 4, "PER"], [5, 2, "BAD"], ["x"], [1, 3]]
                    }),
                ),
                "a.jsonl",
            )
            .unwrap();
        assert_eq!(
            record.labels,
            vec![LabelCandidate::Span {
                start: 0,
                end: 4,
                label: "PER".into()
            }]
        );
    }

    #[test]
    fn numeric_label_is_stringified() {
        let builder = RecordBuilder::new(BuilderKind::Category, "text", "label");
        let record = builder
            .build(entry(1, json!({"text": "hi", "label": 3})), "a.csv")
            .unwrap();
        assert_eq!(record.labels, vec![LabelCandidate::Category("3".into())]);
    }

    #[test]
    fn filename_entry_builds_file_record() {
        let builder = RecordBuilder::for_project(ProjectKind::ImageClassification, "text", "label");
        let record = builder
            .build(entry(1, json!({"filename": "img/cat.png"})), "upload")
            .unwrap();
        assert_eq!(record.data, ExampleData::File("img/cat.png".into()));
    }

    #[test]
    fn text_task_rejects_filename_only_entry() {
        let builder =
            RecordBuilder::for_project(ProjectKind::CategoryClassification, "text", "label");
        let err = builder
            .build(entry(3, json!({"filename": "img/cat.png"})), "upload")
            .unwrap_err();
        assert_eq!(err.message, "empty text is not allowed");
    }

    #[test]
    fn intent_slot_yields_both_shapes() {
        let builder = RecordBuilder::new(BuilderKind::IntentSlot, "text", "label");
        let record = builder
            .build(
                entry(
                    1,
                    json!({
                        "text": "Book a flight",
                        "label": {"cats": ["travel"], "entities": [[7, 13, "item"]]}
                    }),
                ),
                "a.jsonl",
            )
            .unwrap();
        assert_eq!(
            record.labels,
            vec![
                LabelCandidate::Category("travel".into()),
                LabelCandidate::Span {
                    start: 7,
                    end: 13,
                    label: "item".into()
                },
            ]
        );
    }
}
