//! SQLite-backed project store.
//!
//! Column names on the annotation tables (`text`, `label`,
//! `start_offset`, `end_offset`) are consumed by the export side and
//! must stay stable.
//!
//! All statements run against one connection behind a mutex. A
//! `with_transaction` call holds that mutex for its whole duration, so
//! concurrent batch flushes queue up instead of injecting statements
//! into each other's open transaction.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::ids::{ExampleId, LabelTypeId, ProjectId, UserId};
use crate::model::{
    CategoryAnnotation, ExampleData, ExampleState, LabelKind, LabelType, NewExample, Project,
    ProjectKind, ShortcutKey, SpanAnnotation, TextLabelAnnotation,
};

use super::{ProjectStore, Scope, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    collaborative_annotation INTEGER NOT NULL DEFAULT 0,
    single_class_classification INTEGER NOT NULL DEFAULT 0,
    allow_overlapping INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS examples (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    text TEXT,
    filename TEXT,
    meta TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS label_types (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    kind TEXT NOT NULL,
    text TEXT NOT NULL,
    prefix_key TEXT,
    suffix_key TEXT,
    background_color TEXT NOT NULL,
    text_color TEXT NOT NULL,
    UNIQUE (project_id, kind, text)
);

CREATE TABLE IF NOT EXISTS category_annotations (
    id INTEGER PRIMARY KEY,
    example_id INTEGER NOT NULL REFERENCES examples(id),
    user_id INTEGER NOT NULL,
    label INTEGER NOT NULL REFERENCES label_types(id),
    UNIQUE (example_id, user_id, label)
);

CREATE TABLE IF NOT EXISTS span_annotations (
    id INTEGER PRIMARY KEY,
    example_id INTEGER NOT NULL REFERENCES examples(id),
    user_id INTEGER NOT NULL,
    label INTEGER NOT NULL REFERENCES label_types(id),
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    UNIQUE (example_id, user_id, label, start_offset, end_offset)
);

CREATE TABLE IF NOT EXISTS text_label_annotations (
    id INTEGER PRIMARY KEY,
    example_id INTEGER NOT NULL REFERENCES examples(id),
    user_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    UNIQUE (example_id, user_id, text)
);

CREATE TABLE IF NOT EXISTS example_states (
    id INTEGER PRIMARY KEY,
    example_id INTEGER NOT NULL REFERENCES examples(id),
    confirmed_by INTEGER NOT NULL,
    UNIQUE (example_id, confirmed_by)
);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the store at `path` and applies the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// An in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The store view handed to a `with_transaction` closure. Borrows the
/// already-locked connection; statements it issues land inside the
/// enclosing transaction.
struct SqliteTx<'a> {
    conn: Mutex<&'a mut Connection>,
}

impl<'a> SqliteTx<'a> {
    fn lock(&self) -> std::sync::MutexGuard<'_, &'a mut Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn project_kind_str(kind: ProjectKind) -> &'static str {
    match kind {
        ProjectKind::CategoryClassification => "category_classification",
        ProjectKind::SpanLabeling => "span_labeling",
        ProjectKind::Seq2seq => "seq2seq",
        ProjectKind::IntentSlot => "intent_slot",
        ProjectKind::ImageClassification => "image_classification",
        ProjectKind::AudioSpeechToText => "audio_speech_to_text",
    }
}

fn project_kind_from_str(s: &str) -> Result<ProjectKind, StoreError> {
    match s {
        "category_classification" => Ok(ProjectKind::CategoryClassification),
        "span_labeling" => Ok(ProjectKind::SpanLabeling),
        "seq2seq" => Ok(ProjectKind::Seq2seq),
        "intent_slot" => Ok(ProjectKind::IntentSlot),
        "image_classification" => Ok(ProjectKind::ImageClassification),
        "audio_speech_to_text" => Ok(ProjectKind::AudioSpeechToText),
        other => Err(StoreError::Backend(format!(
            "unknown project kind '{}'",
            other
        ))),
    }
}

fn label_kind_str(kind: LabelKind) -> &'static str {
    match kind {
        LabelKind::Category => "category",
        LabelKind::Span => "span",
        LabelKind::Relation => "relation",
    }
}

fn scope_clause(scope: Scope) -> (String, Option<i64>) {
    match scope {
        Scope::Project => (String::new(), None),
        Scope::User(user) => (" AND user_id = ?2".to_string(), Some(user.as_i64())),
    }
}

// ============================================================================
// Statement bodies, shared by the store and its transaction view
// ============================================================================

fn create_project_on(conn: &Connection, project: &Project) -> Result<ProjectId, StoreError> {
    conn.execute(
        "INSERT INTO projects (name, kind, collaborative_annotation,
                               single_class_classification, allow_overlapping)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            project.name,
            project_kind_str(project.kind),
            project.collaborative_annotation,
            project.single_class_classification,
            project.allow_overlapping,
        ],
    )?;
    Ok(ProjectId::new(conn.last_insert_rowid()))
}

fn project_on(conn: &Connection, id: ProjectId) -> Result<Project, StoreError> {
    let row = conn
        .query_row(
            "SELECT name, kind, collaborative_annotation,
                    single_class_classification, allow_overlapping
             FROM projects WHERE id = ?1",
            params![id.as_i64()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            },
        )
        .optional()?;
    let (name, kind, collaborative, single_class, overlapping) =
        row.ok_or_else(|| StoreError::NotFound(format!("project {}", id)))?;
    Ok(Project {
        id,
        name,
        kind: project_kind_from_str(&kind)?,
        collaborative_annotation: collaborative,
        single_class_classification: single_class,
        allow_overlapping: overlapping,
    })
}

fn insert_examples_on(
    conn: &Connection,
    project: ProjectId,
    examples: &[NewExample],
) -> Result<Vec<ExampleId>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO examples (project_id, text, filename, meta) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut ids = Vec::with_capacity(examples.len());
    for example in examples {
        let (text, filename) = match &example.data {
            ExampleData::Text(text) => (Some(text.as_str()), None),
            ExampleData::File(path) => (None, Some(path.display().to_string())),
        };
        let meta = serde_json::to_string(&example.meta)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        stmt.execute(params![project.as_i64(), text, filename, meta])?;
        ids.push(ExampleId::new(conn.last_insert_rowid()));
    }
    Ok(ids)
}

fn label_types_on(
    conn: &Connection,
    project: ProjectId,
    kind: LabelKind,
) -> Result<Vec<LabelType>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, text, prefix_key, suffix_key, background_color, text_color
         FROM label_types WHERE project_id = ?1 AND kind = ?2 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![project.as_i64(), label_kind_str(kind)], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut labels = Vec::new();
    for row in rows {
        let (id, text, prefix, suffix, background_color, text_color) = row?;
        let shortcut = match (prefix, suffix) {
            (Some(prefix), Some(suffix)) => Some(ShortcutKey { prefix, suffix }),
            _ => None,
        };
        labels.push(LabelType {
            id: LabelTypeId::new(id),
            project,
            kind,
            text,
            shortcut,
            background_color,
            text_color,
        });
    }
    Ok(labels)
}

fn create_label_type_if_absent_on(
    conn: &Connection,
    project: ProjectId,
    kind: LabelKind,
    text: &str,
) -> Result<LabelTypeId, StoreError> {
    // OR IGNORE keeps interleaved ingestion jobs from failing each
    // other; the surviving row's id is read back afterwards.
    conn.execute(
        "INSERT OR IGNORE INTO label_types
             (project_id, kind, text, background_color, text_color)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            project.as_i64(),
            label_kind_str(kind),
            text,
            crate::model::DEFAULT_BACKGROUND_COLOR,
            crate::model::DEFAULT_TEXT_COLOR,
        ],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM label_types WHERE project_id = ?1 AND kind = ?2 AND text = ?3",
        params![project.as_i64(), label_kind_str(kind), text],
        |row| row.get(0),
    )?;
    Ok(LabelTypeId::new(id))
}

fn create_label_type_on(conn: &Connection, label: &LabelType) -> Result<LabelTypeId, StoreError> {
    let (prefix, suffix) = match &label.shortcut {
        Some(key) => (Some(key.prefix.as_str()), Some(key.suffix.as_str())),
        None => (None, None),
    };
    conn.execute(
        "INSERT INTO label_types
             (project_id, kind, text, prefix_key, suffix_key,
              background_color, text_color)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            label.project.as_i64(),
            label_kind_str(label.kind),
            label.text,
            prefix,
            suffix,
            label.background_color,
            label.text_color,
        ],
    )?;
    Ok(LabelTypeId::new(conn.last_insert_rowid()))
}

fn insert_categories_on(conn: &Connection, rows: &[CategoryAnnotation]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO category_annotations (example_id, user_id, label)
         VALUES (?1, ?2, ?3)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.example.as_i64(),
            row.user.as_i64(),
            row.label.as_i64()
        ])?;
    }
    Ok(())
}

fn insert_spans_on(conn: &Connection, rows: &[SpanAnnotation]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO span_annotations
             (example_id, user_id, label, start_offset, end_offset)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.example.as_i64(),
            row.user.as_i64(),
            row.label.as_i64(),
            row.start_offset as i64,
            row.end_offset as i64,
        ])?;
    }
    Ok(())
}

fn insert_text_labels_on(
    conn: &Connection,
    rows: &[TextLabelAnnotation],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO text_label_annotations (example_id, user_id, text)
         VALUES (?1, ?2, ?3)",
    )?;
    for row in rows {
        stmt.execute(params![row.example.as_i64(), row.user.as_i64(), row.text])?;
    }
    Ok(())
}

fn categories_in_scope_on(
    conn: &Connection,
    example: ExampleId,
    scope: Scope,
) -> Result<Vec<CategoryAnnotation>, StoreError> {
    let (clause, user) = scope_clause(scope);
    let sql = format!(
        "SELECT user_id, label FROM category_annotations WHERE example_id = ?1{}",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let map = |row: &rusqlite::Row<'_>| {
        Ok(CategoryAnnotation {
            example,
            user: UserId::new(row.get(0)?),
            label: LabelTypeId::new(row.get(1)?),
        })
    };
    let rows = match user {
        Some(user) => stmt.query_map(params![example.as_i64(), user], map)?,
        None => stmt.query_map(params![example.as_i64()], map)?,
    };
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn spans_in_scope_on(
    conn: &Connection,
    example: ExampleId,
    scope: Scope,
) -> Result<Vec<SpanAnnotation>, StoreError> {
    let (clause, user) = scope_clause(scope);
    let sql = format!(
        "SELECT user_id, label, start_offset, end_offset
         FROM span_annotations WHERE example_id = ?1{}",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let map = |row: &rusqlite::Row<'_>| {
        Ok(SpanAnnotation {
            example,
            user: UserId::new(row.get(0)?),
            label: LabelTypeId::new(row.get(1)?),
            start_offset: row.get::<_, i64>(2)? as usize,
            end_offset: row.get::<_, i64>(3)? as usize,
        })
    };
    let rows = match user {
        Some(user) => stmt.query_map(params![example.as_i64(), user], map)?,
        None => stmt.query_map(params![example.as_i64()], map)?,
    };
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn text_labels_in_scope_on(
    conn: &Connection,
    example: ExampleId,
    scope: Scope,
) -> Result<Vec<TextLabelAnnotation>, StoreError> {
    let (clause, user) = scope_clause(scope);
    let sql = format!(
        "SELECT user_id, text FROM text_label_annotations WHERE example_id = ?1{}",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let map = |row: &rusqlite::Row<'_>| {
        Ok(TextLabelAnnotation {
            example,
            user: UserId::new(row.get(0)?),
            text: row.get(1)?,
        })
    };
    let rows = match user {
        Some(user) => stmt.query_map(params![example.as_i64(), user], map)?,
        None => stmt.query_map(params![example.as_i64()], map)?,
    };
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn toggle_example_state_on(
    conn: &Connection,
    example: ExampleId,
    confirmed_by: UserId,
    collaborative: bool,
) -> Result<Option<ExampleState>, StoreError> {
    let deleted = if collaborative {
        conn.execute(
            "DELETE FROM example_states WHERE example_id = ?1",
            params![example.as_i64()],
        )?
    } else {
        conn.execute(
            "DELETE FROM example_states WHERE example_id = ?1 AND confirmed_by = ?2",
            params![example.as_i64(), confirmed_by.as_i64()],
        )?
    };
    if deleted > 0 {
        return Ok(None);
    }
    conn.execute(
        "INSERT OR IGNORE INTO example_states (example_id, confirmed_by) VALUES (?1, ?2)",
        params![example.as_i64(), confirmed_by.as_i64()],
    )?;
    Ok(Some(ExampleState {
        example,
        confirmed_by,
    }))
}

impl ProjectStore for SqliteStore {
    fn create_project(&self, project: &Project) -> Result<ProjectId, StoreError> {
        create_project_on(&self.lock(), project)
    }

    fn project(&self, id: ProjectId) -> Result<Project, StoreError> {
        project_on(&self.lock(), id)
    }

    fn insert_examples(
        &self,
        project: ProjectId,
        examples: &[NewExample],
    ) -> Result<Vec<ExampleId>, StoreError> {
        insert_examples_on(&self.lock(), project, examples)
    }

    fn label_types(
        &self,
        project: ProjectId,
        kind: LabelKind,
    ) -> Result<Vec<LabelType>, StoreError> {
        label_types_on(&self.lock(), project, kind)
    }

    fn create_label_type_if_absent(
        &self,
        project: ProjectId,
        kind: LabelKind,
        text: &str,
    ) -> Result<LabelTypeId, StoreError> {
        create_label_type_if_absent_on(&self.lock(), project, kind, text)
    }

    fn create_label_type(&self, label: &LabelType) -> Result<LabelTypeId, StoreError> {
        create_label_type_on(&self.lock(), label)
    }

    fn insert_categories(&self, rows: &[CategoryAnnotation]) -> Result<(), StoreError> {
        insert_categories_on(&self.lock(), rows)
    }

    fn insert_spans(&self, rows: &[SpanAnnotation]) -> Result<(), StoreError> {
        insert_spans_on(&self.lock(), rows)
    }

    fn insert_text_labels(&self, rows: &[TextLabelAnnotation]) -> Result<(), StoreError> {
        insert_text_labels_on(&self.lock(), rows)
    }

    fn categories_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<CategoryAnnotation>, StoreError> {
        categories_in_scope_on(&self.lock(), example, scope)
    }

    fn spans_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<SpanAnnotation>, StoreError> {
        spans_in_scope_on(&self.lock(), example, scope)
    }

    fn text_labels_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<TextLabelAnnotation>, StoreError> {
        text_labels_in_scope_on(&self.lock(), example, scope)
    }

    fn toggle_example_state(
        &self,
        example: ExampleId,
        confirmed_by: UserId,
        collaborative: bool,
    ) -> Result<Option<ExampleState>, StoreError> {
        toggle_example_state_on(&self.lock(), example, confirmed_by, collaborative)
    }

    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&dyn ProjectStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = {
            let tx = SqliteTx {
                conn: Mutex::new(&mut *conn),
            };
            work(&tx)
        };
        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(err) => {
                // Preserve the original failure even if rollback fails.
                let _ = conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }
}

impl ProjectStore for SqliteTx<'_> {
    fn create_project(&self, project: &Project) -> Result<ProjectId, StoreError> {
        create_project_on(&self.lock(), project)
    }

    fn project(&self, id: ProjectId) -> Result<Project, StoreError> {
        project_on(&self.lock(), id)
    }

    fn insert_examples(
        &self,
        project: ProjectId,
        examples: &[NewExample],
    ) -> Result<Vec<ExampleId>, StoreError> {
        insert_examples_on(&self.lock(), project, examples)
    }

    fn label_types(
        &self,
        project: ProjectId,
        kind: LabelKind,
    ) -> Result<Vec<LabelType>, StoreError> {
        label_types_on(&self.lock(), project, kind)
    }

    fn create_label_type_if_absent(
        &self,
        project: ProjectId,
        kind: LabelKind,
        text: &str,
    ) -> Result<LabelTypeId, StoreError> {
        create_label_type_if_absent_on(&self.lock(), project, kind, text)
    }

    fn create_label_type(&self, label: &LabelType) -> Result<LabelTypeId, StoreError> {
        create_label_type_on(&self.lock(), label)
    }

    fn insert_categories(&self, rows: &[CategoryAnnotation]) -> Result<(), StoreError> {
        insert_categories_on(&self.lock(), rows)
    }

    fn insert_spans(&self, rows: &[SpanAnnotation]) -> Result<(), StoreError> {
        insert_spans_on(&self.lock(), rows)
    }

    fn insert_text_labels(&self, rows: &[TextLabelAnnotation]) -> Result<(), StoreError> {
        insert_text_labels_on(&self.lock(), rows)
    }

    fn categories_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<CategoryAnnotation>, StoreError> {
        categories_in_scope_on(&self.lock(), example, scope)
    }

    fn spans_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<SpanAnnotation>, StoreError> {
        spans_in_scope_on(&self.lock(), example, scope)
    }

    fn text_labels_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<TextLabelAnnotation>, StoreError> {
        text_labels_in_scope_on(&self.lock(), example, scope)
    }

    fn toggle_example_state(
        &self,
        example: ExampleId,
        confirmed_by: UserId,
        collaborative: bool,
    ) -> Result<Option<ExampleState>, StoreError> {
        toggle_example_state_on(&self.lock(), example, confirmed_by, collaborative)
    }

    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&dyn ProjectStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        // Already inside a transaction; the nested work joins it.
        work(self)
    }
}
