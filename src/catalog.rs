//! The format catalog: which upload formats each project kind accepts.
//!
//! The catalog is an explicit, immutable table constructed once during
//! process initialization and passed by reference — format availability
//! is decided here, not by conditionals scattered across the pipeline.
//! Content types and example payloads are UI hints only; they carry no
//! behavioral contract.

use serde::Serialize;

use crate::formats::FormatKind;
use crate::model::ProjectKind;

/// One supported format for a project kind.
#[derive(Clone, Debug, Serialize)]
pub struct FormatSpec {
    pub format: FormatKind,
    /// MIME/content types accepted for this format.
    pub content_types: &'static [&'static str],
    /// A short illustrative payload for UI hinting.
    pub example: &'static str,
}

impl FormatSpec {
    const fn new(
        format: FormatKind,
        content_types: &'static [&'static str],
        example: &'static str,
    ) -> Self {
        Self {
            format,
            content_types,
            example,
        }
    }
}

const TEXT_PLAIN: &[&str] = &["text/plain"];
const TEXT_CSV: &[&str] = &["text/csv"];
const EXCEL_TYPES: &[&str] = &[
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];
const JSON_TYPES: &[&str] = &["application/json"];
const JSONL_TYPES: &[&str] = &["application/jsonl", "text/plain"];
const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/bmp", "image/gif"];
const AUDIO_TYPES: &[&str] = &["audio/ogg", "audio/aac", "audio/mpeg", "audio/wav"];

const TEXTFILE_SPEC: FormatSpec = FormatSpec::new(
    FormatKind::TextFile,
    TEXT_PLAIN,
    "Each file becomes one example:\nEXAMPLE.txt -> \"EXAMPLE\"\n",
);
const TEXTLINE_SPEC: FormatSpec = FormatSpec::new(
    FormatKind::TextLine,
    TEXT_PLAIN,
    "Each line becomes one example:\nfirst example\nsecond example\n",
);
const CSV_CLASSIFICATION: FormatSpec = FormatSpec::new(
    FormatKind::Csv,
    TEXT_CSV,
    "text,label\n\"Terrible customer service.\",negative\n\"Great five stars!\",positive\n",
);
const CSV_SEQ2SEQ: FormatSpec = FormatSpec::new(
    FormatKind::Csv,
    TEXT_CSV,
    "text,label\n\"Hello!\",\"Bonjour !\"\n",
);
const EXCEL_CLASSIFICATION: FormatSpec = FormatSpec::new(
    FormatKind::Excel,
    EXCEL_TYPES,
    "text,label columns; one row per example\n",
);
const JSON_CLASSIFICATION: FormatSpec = FormatSpec::new(
    FormatKind::Json,
    JSON_TYPES,
    "[{\"text\": \"Great five stars!\", \"label\": \"positive\"}]\n",
);
const JSONL_CLASSIFICATION: FormatSpec = FormatSpec::new(
    FormatKind::Jsonl,
    JSONL_TYPES,
    "{\"text\": \"Great five stars!\", \"label\": [\"positive\"]}\n",
);
const JSONL_SPAN: FormatSpec = FormatSpec::new(
    FormatKind::Jsonl,
    JSONL_TYPES,
    "{\"text\": \"John lives in New York\", \"label\": [[0, 4, \"PER\"], [14, 22, \"LOC\"]]}\n",
);
const JSONL_SEQ2SEQ: FormatSpec = FormatSpec::new(
    FormatKind::Jsonl,
    JSONL_TYPES,
    "{\"text\": \"Hello!\", \"label\": [\"Bonjour !\"]}\n",
);
const JSONL_INTENT: FormatSpec = FormatSpec::new(
    FormatKind::Jsonl,
    JSONL_TYPES,
    "{\"text\": \"Book a flight\", \"label\": {\"cats\": [\"travel\"], \"entities\": [[7, 13, \"item\"]]}}\n",
);
const FASTTEXT_SPEC: FormatSpec = FormatSpec::new(
    FormatKind::FastText,
    TEXT_PLAIN,
    "__label__positive Great five stars!\n__label__negative Terrible.\n",
);
const CONLL_SPEC: FormatSpec = FormatSpec::new(
    FormatKind::Conll,
    TEXT_PLAIN,
    "John\tB-PER\nlives\tO\nin\tO\nNew\tB-LOC\nYork\tI-LOC\n",
);
const IMAGE_SPEC: FormatSpec = FormatSpec::new(
    FormatKind::FileManifest,
    IMAGE_TYPES,
    "Upload image files; each file becomes one example.\n",
);
const AUDIO_SPEC: FormatSpec = FormatSpec::new(
    FormatKind::FileManifest,
    AUDIO_TYPES,
    "Upload audio files; each file becomes one example.\n",
);

const CATEGORY_FORMATS: &[FormatSpec] = &[
    TEXTFILE_SPEC,
    TEXTLINE_SPEC,
    CSV_CLASSIFICATION,
    EXCEL_CLASSIFICATION,
    JSON_CLASSIFICATION,
    JSONL_CLASSIFICATION,
    FASTTEXT_SPEC,
];
const SPAN_FORMATS: &[FormatSpec] = &[TEXTFILE_SPEC, TEXTLINE_SPEC, JSONL_SPAN, CONLL_SPEC];
const SEQ2SEQ_FORMATS: &[FormatSpec] = &[
    TEXTFILE_SPEC,
    TEXTLINE_SPEC,
    CSV_SEQ2SEQ,
    EXCEL_CLASSIFICATION,
    JSON_CLASSIFICATION,
    JSONL_SEQ2SEQ,
];
const INTENT_FORMATS: &[FormatSpec] = &[JSONL_INTENT];
const IMAGE_FORMATS: &[FormatSpec] = &[IMAGE_SPEC];
const AUDIO_FORMATS: &[FormatSpec] = &[AUDIO_SPEC];

/// The immutable project-kind → formats table.
#[derive(Debug, Default)]
pub struct Catalog;

impl Catalog {
    pub fn new() -> Self {
        Self
    }

    /// The formats a project of `kind` accepts, in display order.
    pub fn formats(&self, kind: ProjectKind) -> &'static [FormatSpec] {
        match kind {
            ProjectKind::CategoryClassification => CATEGORY_FORMATS,
            ProjectKind::SpanLabeling => SPAN_FORMATS,
            ProjectKind::Seq2seq => SEQ2SEQ_FORMATS,
            ProjectKind::IntentSlot => INTENT_FORMATS,
            ProjectKind::ImageClassification => IMAGE_FORMATS,
            ProjectKind::AudioSpeechToText => AUDIO_FORMATS,
        }
    }

    /// Whether `format` is accepted for `kind` (gates job submission).
    pub fn supports(&self, kind: ProjectKind, format: FormatKind) -> bool {
        self.formats(kind).iter().any(|spec| spec.format == format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_at_least_one_format() {
        let catalog = Catalog::new();
        for kind in [
            ProjectKind::CategoryClassification,
            ProjectKind::SpanLabeling,
            ProjectKind::Seq2seq,
            ProjectKind::IntentSlot,
            ProjectKind::ImageClassification,
            ProjectKind::AudioSpeechToText,
        ] {
            assert!(!catalog.formats(kind).is_empty(), "no formats for {:?}", kind);
        }
    }

    #[test]
    fn file_based_kinds_only_accept_file_uploads() {
        let catalog = Catalog::new();
        for spec in catalog.formats(ProjectKind::ImageClassification) {
            assert_eq!(spec.format, FormatKind::FileManifest);
        }
        assert!(!catalog.supports(ProjectKind::ImageClassification, FormatKind::Csv));
    }

    #[test]
    fn conll_is_span_labeling_only() {
        let catalog = Catalog::new();
        assert!(catalog.supports(ProjectKind::SpanLabeling, FormatKind::Conll));
        assert!(!catalog.supports(ProjectKind::CategoryClassification, FormatKind::Conll));
        assert!(!catalog.supports(ProjectKind::Seq2seq, FormatKind::Conll));
    }

    #[test]
    fn every_spec_carries_ui_hints() {
        let catalog = Catalog::new();
        for kind in [
            ProjectKind::CategoryClassification,
            ProjectKind::SpanLabeling,
            ProjectKind::Seq2seq,
        ] {
            for spec in catalog.formats(kind) {
                assert!(!spec.content_types.is_empty());
                assert!(!spec.example.is_empty());
            }
        }
    }
}
