//! The persistence seam.
//!
//! The pipeline talks to storage through [`ProjectStore`], a narrow
//! object-safe trait. Two backends ship: an in-memory store for tests
//! and dry runs, and a SQLite store for real projects. The relational
//! shape (field names `text`, `label`, `start_offset`, `end_offset`)
//! is shared with the export side and must not change.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use thiserror::Error;

use crate::ids::{ExampleId, LabelTypeId, ProjectId, UserId};
use crate::model::{
    CategoryAnnotation, ExampleState, LabelKind, LabelType, NewExample, Project, SpanAnnotation,
    TextLabelAnnotation,
};

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Backend(String),
}

/// Whose annotations count together for consistency checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Only one user's annotations on the example.
    User(UserId),
    /// Every member's annotations on the example (collaborative projects).
    Project,
}

/// Narrow storage interface consumed by the ingestion pipeline and the
/// live annotation path.
///
/// Implementations must be safe to share across ingestion jobs running
/// concurrently against the same project; in particular
/// [`create_label_type_if_absent`](ProjectStore::create_label_type_if_absent)
/// has ignore-duplicate semantics so interleaved jobs cannot fail each
/// other.
pub trait ProjectStore: Send + Sync {
    fn create_project(&self, project: &Project) -> Result<ProjectId, StoreError>;
    fn project(&self, id: ProjectId) -> Result<Project, StoreError>;

    /// Persists a batch of examples, returning their IDs in input order.
    fn insert_examples(
        &self,
        project: ProjectId,
        examples: &[NewExample],
    ) -> Result<Vec<ExampleId>, StoreError>;

    fn label_types(&self, project: ProjectId, kind: LabelKind)
        -> Result<Vec<LabelType>, StoreError>;

    /// Creates a label type unless one with the same `(project, kind,
    /// text)` already exists; returns the surviving row's ID either way.
    fn create_label_type_if_absent(
        &self,
        project: ProjectId,
        kind: LabelKind,
        text: &str,
    ) -> Result<LabelTypeId, StoreError>;

    /// Creates a label type with full attributes (interactive path).
    /// Shortcut uniqueness is validated by the caller beforehand.
    fn create_label_type(&self, label: &LabelType) -> Result<LabelTypeId, StoreError>;

    fn insert_categories(&self, rows: &[CategoryAnnotation]) -> Result<(), StoreError>;
    fn insert_spans(&self, rows: &[SpanAnnotation]) -> Result<(), StoreError>;
    fn insert_text_labels(&self, rows: &[TextLabelAnnotation]) -> Result<(), StoreError>;

    fn categories_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<CategoryAnnotation>, StoreError>;
    fn spans_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<SpanAnnotation>, StoreError>;
    fn text_labels_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<TextLabelAnnotation>, StoreError>;

    /// Flips the "done" mark for an example. Returns the new state when
    /// the example is now marked, `None` when the toggle cleared it.
    /// When `collaborative` is set the mark is shared by the whole
    /// project, so any member's toggle clears everyone's.
    fn toggle_example_state(
        &self,
        example: ExampleId,
        confirmed_by: UserId,
        collaborative: bool,
    ) -> Result<Option<ExampleState>, StoreError>;

    /// Runs `work` inside one transaction, holding the backend for the
    /// whole call so concurrent transactions serialize instead of
    /// tripping over each other. `work` receives a store view whose
    /// writes commit together on `Ok` and are discarded on `Err`.
    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&dyn ProjectStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}
