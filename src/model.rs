//! Core data model for annotation projects.
//!
//! This module defines the persisted entities (projects, label types,
//! examples, annotations) and the transient [`Record`] that ingestion
//! passes between parser, builder, cleaner and writer. Records are never
//! persisted directly; they are always converted into an example plus
//! its annotation rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::ids::{ExampleId, LabelTypeId, ProjectId, UserId};

/// The annotation task a project is set up for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    /// Whole-example category classification.
    CategoryClassification,
    /// Span labeling over character offsets.
    SpanLabeling,
    /// Free-text target per example (translation, summarization, ...).
    Seq2seq,
    /// Combined intent categories and entity spans.
    IntentSlot,
    /// Category classification over uploaded image files.
    ImageClassification,
    /// Free-text transcription over uploaded audio files.
    AudioSpeechToText,
}

impl ProjectKind {
    /// Human-readable name used in CLI output and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ProjectKind::CategoryClassification => "category classification",
            ProjectKind::SpanLabeling => "span labeling",
            ProjectKind::Seq2seq => "sequence to sequence",
            ProjectKind::IntentSlot => "intent and slot filling",
            ProjectKind::ImageClassification => "image classification",
            ProjectKind::AudioSpeechToText => "speech to text",
        }
    }

    /// Whether examples of this kind carry a file payload rather than text.
    pub fn is_file_based(&self) -> bool {
        matches!(
            self,
            ProjectKind::ImageClassification | ProjectKind::AudioSpeechToText
        )
    }
}

/// A project: the unit of tenancy. Owns label types, examples and members.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub kind: ProjectKind,

    /// Pool all members' annotations into one scope for consistency checks.
    pub collaborative_annotation: bool,

    /// Allow at most one category annotation per example and scope.
    pub single_class_classification: bool,

    /// Allow span annotations to overlap within one scope.
    pub allow_overlapping: bool,
}

impl Project {
    /// Creates a project with all flags off.
    pub fn new(id: impl Into<ProjectId>, name: impl Into<String>, kind: ProjectKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            collaborative_annotation: false,
            single_class_classification: false,
            allow_overlapping: false,
        }
    }

    pub fn collaborative(mut self, on: bool) -> Self {
        self.collaborative_annotation = on;
        self
    }

    pub fn single_class(mut self, on: bool) -> Self {
        self.single_class_classification = on;
        self
    }

    pub fn overlapping(mut self, on: bool) -> Self {
        self.allow_overlapping = on;
        self
    }
}

/// Which family of annotations a label type belongs to.
///
/// Text labels are free-form and have no label type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Category,
    Span,
    Relation,
}

/// A keyboard shortcut for applying a label interactively.
///
/// The pair is unique per project. The prefix is a modifier combination
/// ("", "ctrl", "shift" or "ctrl shift"); the suffix is a single
/// lowercase character.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortcutKey {
    pub prefix: String,
    pub suffix: String,
}

impl ShortcutKey {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

/// A named, project-scoped label that annotations reference.
///
/// `(project, kind, text)` is unique; label types are created lazily
/// during import (without a shortcut) or explicitly by an admin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabelType {
    pub id: LabelTypeId,
    pub project: ProjectId,
    pub kind: LabelKind,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<ShortcutKey>,

    /// Background color as a `#RRGGBB` string.
    pub background_color: String,
    /// Text color as a `#RRGGBB` string.
    pub text_color: String,
}

impl LabelType {
    /// Creates a label type with the default color pair and no shortcut.
    pub fn new(
        id: impl Into<LabelTypeId>,
        project: impl Into<ProjectId>,
        kind: LabelKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project: project.into(),
            kind,
            text: text.into(),
            shortcut: None,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
        }
    }

    pub fn with_shortcut(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.shortcut = Some(ShortcutKey::new(prefix, suffix));
        self
    }
}

pub const DEFAULT_BACKGROUND_COLOR: &str = "#a6cee3";
pub const DEFAULT_TEXT_COLOR: &str = "#ffffff";

/// The payload of an example: inline text or a reference to an uploaded
/// file (image/audio variants).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleData {
    Text(String),
    File(PathBuf),
}

/// One unit of annotation belonging to a project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Example {
    pub id: ExampleId,
    pub project: ProjectId,
    pub data: ExampleData,

    /// Free-form per-example metadata (the columns an upload carried
    /// beyond text and label).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,
}

/// An example not yet persisted; the store assigns the ID on insert.
#[derive(Clone, Debug)]
pub struct NewExample {
    pub data: ExampleData,
    pub meta: BTreeMap<String, serde_json::Value>,
}

/// A whole-example category judgment. `(example, user, label)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAnnotation {
    pub example: ExampleId,
    pub user: UserId,
    pub label: LabelTypeId,
}

/// A labeled character range. `start_offset < end_offset`;
/// `(example, user, label, start_offset, end_offset)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanAnnotation {
    pub example: ExampleId,
    pub user: UserId,
    pub label: LabelTypeId,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// A free-text judgment. `(example, user, text)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLabelAnnotation {
    pub example: ExampleId,
    pub user: UserId,
    pub text: String,
}

/// Marks an example "done" for a user (or for the whole project when the
/// project is collaborative). Toggled, not accumulated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleState {
    pub example: ExampleId,
    pub confirmed_by: UserId,
}

// ============================================================================
// Transient import types
// ============================================================================

/// A label observed on an imported row, before reconciliation against the
/// project's label-type space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelCandidate {
    Category(String),
    Span {
        start: usize,
        end: usize,
        label: String,
    },
    Text(String),
}

/// A parsed row on its way through the ingestion pipeline.
///
/// Records are created and destroyed within one ingestion pass; at most
/// one batch of them is held in memory at a time.
#[derive(Clone, Debug)]
pub struct Record {
    pub data: ExampleData,
    pub labels: Vec<LabelCandidate>,
    pub meta: BTreeMap<String, serde_json::Value>,
    /// Source file the record came from, for error reporting.
    pub filename: String,
    /// 1-based line in the source file.
    pub line: usize,
}

impl Record {
    pub fn into_new_example(self) -> (NewExample, Vec<LabelCandidate>) {
        (
            NewExample {
                data: self.data,
                meta: self.meta,
            },
            self.labels,
        )
    }
}
