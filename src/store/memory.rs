//! In-memory store for tests and CLI dry runs.
//!
//! Transactions are real: `with_transaction` snapshots the whole state
//! up front and restores it on failure, holding the state lock for the
//! duration so concurrent flushes serialize. The writer's flush
//! atomicity can therefore be exercised without SQLite.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::ids::{ExampleId, LabelTypeId, ProjectId, UserId};
use crate::model::{
    CategoryAnnotation, Example, ExampleState, LabelKind, LabelType, NewExample, Project,
    SpanAnnotation, TextLabelAnnotation,
};

use super::{ProjectStore, Scope, StoreError};

#[derive(Clone, Debug, Default)]
struct Inner {
    next_id: i64,
    projects: BTreeMap<ProjectId, Project>,
    examples: BTreeMap<ExampleId, Example>,
    label_types: BTreeMap<LabelTypeId, LabelType>,
    categories: Vec<CategoryAnnotation>,
    spans: Vec<SpanAnnotation>,
    text_labels: Vec<TextLabelAnnotation>,
    /// (example, confirmed_by) pairs currently marked done.
    states: Vec<(ExampleId, UserId)>,
}

fn in_scope(user: UserId, scope: Scope) -> bool {
    match scope {
        Scope::Project => true,
        Scope::User(u) => user == u,
    }
}

impl Inner {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn create_project(&mut self, project: &Project) -> Result<ProjectId, StoreError> {
        let id = ProjectId::new(self.next());
        let mut stored = project.clone();
        stored.id = id;
        self.projects.insert(id, stored);
        Ok(id)
    }

    fn project(&self, id: ProjectId) -> Result<Project, StoreError> {
        self.projects
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project {}", id)))
    }

    fn insert_examples(
        &mut self,
        project: ProjectId,
        examples: &[NewExample],
    ) -> Result<Vec<ExampleId>, StoreError> {
        let mut ids = Vec::with_capacity(examples.len());
        for example in examples {
            let id = ExampleId::new(self.next());
            self.examples.insert(
                id,
                Example {
                    id,
                    project,
                    data: example.data.clone(),
                    meta: example.meta.clone(),
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    fn label_types(&self, project: ProjectId, kind: LabelKind) -> Vec<LabelType> {
        self.label_types
            .values()
            .filter(|l| l.project == project && l.kind == kind)
            .cloned()
            .collect()
    }

    fn create_label_type_if_absent(
        &mut self,
        project: ProjectId,
        kind: LabelKind,
        text: &str,
    ) -> Result<LabelTypeId, StoreError> {
        if let Some(existing) = self
            .label_types
            .values()
            .find(|l| l.project == project && l.kind == kind && l.text == text)
        {
            return Ok(existing.id);
        }
        let id = LabelTypeId::new(self.next());
        self.label_types
            .insert(id, LabelType::new(id, project, kind, text));
        Ok(id)
    }

    fn create_label_type(&mut self, label: &LabelType) -> Result<LabelTypeId, StoreError> {
        let id = LabelTypeId::new(self.next());
        let mut stored = label.clone();
        stored.id = id;
        self.label_types.insert(id, stored);
        Ok(id)
    }

    fn insert_categories(&mut self, rows: &[CategoryAnnotation]) {
        for row in rows {
            // Uniqueness of (example, user, label): repeats are no-ops.
            if !self.categories.contains(row) {
                self.categories.push(row.clone());
            }
        }
    }

    fn insert_spans(&mut self, rows: &[SpanAnnotation]) {
        for row in rows {
            if !self.spans.contains(row) {
                self.spans.push(row.clone());
            }
        }
    }

    fn insert_text_labels(&mut self, rows: &[TextLabelAnnotation]) {
        for row in rows {
            if !self.text_labels.contains(row) {
                self.text_labels.push(row.clone());
            }
        }
    }

    fn categories_in_scope(&self, example: ExampleId, scope: Scope) -> Vec<CategoryAnnotation> {
        self.categories
            .iter()
            .filter(|a| a.example == example && in_scope(a.user, scope))
            .cloned()
            .collect()
    }

    fn spans_in_scope(&self, example: ExampleId, scope: Scope) -> Vec<SpanAnnotation> {
        self.spans
            .iter()
            .filter(|a| a.example == example && in_scope(a.user, scope))
            .cloned()
            .collect()
    }

    fn text_labels_in_scope(&self, example: ExampleId, scope: Scope) -> Vec<TextLabelAnnotation> {
        self.text_labels
            .iter()
            .filter(|a| a.example == example && in_scope(a.user, scope))
            .cloned()
            .collect()
    }

    fn toggle_example_state(
        &mut self,
        example: ExampleId,
        confirmed_by: UserId,
        collaborative: bool,
    ) -> Option<ExampleState> {
        let was_marked = if collaborative {
            self.states.iter().any(|(e, _)| *e == example)
        } else {
            self.states
                .iter()
                .any(|(e, u)| *e == example && *u == confirmed_by)
        };
        if was_marked {
            if collaborative {
                self.states.retain(|(e, _)| *e != example);
            } else {
                self.states
                    .retain(|(e, u)| !(*e == example && *u == confirmed_by));
            }
            None
        } else {
            self.states.push((example, confirmed_by));
            Some(ExampleState {
                example,
                confirmed_by,
            })
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-mutation in another
        // thread; the state is still usable for the remaining tests.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Test helper: all examples of a project, in insertion order.
    pub fn examples(&self, project: ProjectId) -> Vec<Example> {
        self.lock()
            .examples
            .values()
            .filter(|e| e.project == project)
            .cloned()
            .collect()
    }

    /// Test helper: all category rows.
    pub fn all_categories(&self) -> Vec<CategoryAnnotation> {
        self.lock().categories.clone()
    }

    /// Test helper: all span rows.
    pub fn all_spans(&self) -> Vec<SpanAnnotation> {
        self.lock().spans.clone()
    }

    /// Test helper: label type row count for a project and kind.
    pub fn label_type_count(&self, project: ProjectId, kind: LabelKind) -> usize {
        self.lock()
            .label_types
            .values()
            .filter(|l| l.project == project && l.kind == kind)
            .count()
    }
}

/// The store view handed to a `with_transaction` closure. Operates on
/// the already-locked state, so the outer lock keeps other threads out
/// until the transaction resolves.
struct MemoryTx<'a> {
    inner: Mutex<&'a mut Inner>,
}

impl<'a> MemoryTx<'a> {
    fn lock(&self) -> std::sync::MutexGuard<'_, &'a mut Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProjectStore for MemoryStore {
    fn create_project(&self, project: &Project) -> Result<ProjectId, StoreError> {
        self.lock().create_project(project)
    }

    fn project(&self, id: ProjectId) -> Result<Project, StoreError> {
        self.lock().project(id)
    }

    fn insert_examples(
        &self,
        project: ProjectId,
        examples: &[NewExample],
    ) -> Result<Vec<ExampleId>, StoreError> {
        self.lock().insert_examples(project, examples)
    }

    fn label_types(
        &self,
        project: ProjectId,
        kind: LabelKind,
    ) -> Result<Vec<LabelType>, StoreError> {
        Ok(self.lock().label_types(project, kind))
    }

    fn create_label_type_if_absent(
        &self,
        project: ProjectId,
        kind: LabelKind,
        text: &str,
    ) -> Result<LabelTypeId, StoreError> {
        self.lock().create_label_type_if_absent(project, kind, text)
    }

    fn create_label_type(&self, label: &LabelType) -> Result<LabelTypeId, StoreError> {
        self.lock().create_label_type(label)
    }

    fn insert_categories(&self, rows: &[CategoryAnnotation]) -> Result<(), StoreError> {
        self.lock().insert_categories(rows);
        Ok(())
    }

    fn insert_spans(&self, rows: &[SpanAnnotation]) -> Result<(), StoreError> {
        self.lock().insert_spans(rows);
        Ok(())
    }

    fn insert_text_labels(&self, rows: &[TextLabelAnnotation]) -> Result<(), StoreError> {
        self.lock().insert_text_labels(rows);
        Ok(())
    }

    fn categories_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<CategoryAnnotation>, StoreError> {
        Ok(self.lock().categories_in_scope(example, scope))
    }

    fn spans_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<SpanAnnotation>, StoreError> {
        Ok(self.lock().spans_in_scope(example, scope))
    }

    fn text_labels_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<TextLabelAnnotation>, StoreError> {
        Ok(self.lock().text_labels_in_scope(example, scope))
    }

    fn toggle_example_state(
        &self,
        example: ExampleId,
        confirmed_by: UserId,
        collaborative: bool,
    ) -> Result<Option<ExampleState>, StoreError> {
        Ok(self
            .lock()
            .toggle_example_state(example, confirmed_by, collaborative))
    }

    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&dyn ProjectStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock();
        let snapshot = guard.clone();
        let result = {
            let tx = MemoryTx {
                inner: Mutex::new(&mut *guard),
            };
            work(&tx)
        };
        if result.is_err() {
            *guard = snapshot;
        }
        result
    }
}

impl ProjectStore for MemoryTx<'_> {
    fn create_project(&self, project: &Project) -> Result<ProjectId, StoreError> {
        self.lock().create_project(project)
    }

    fn project(&self, id: ProjectId) -> Result<Project, StoreError> {
        self.lock().project(id)
    }

    fn insert_examples(
        &self,
        project: ProjectId,
        examples: &[NewExample],
    ) -> Result<Vec<ExampleId>, StoreError> {
        self.lock().insert_examples(project, examples)
    }

    fn label_types(
        &self,
        project: ProjectId,
        kind: LabelKind,
    ) -> Result<Vec<LabelType>, StoreError> {
        Ok(self.lock().label_types(project, kind))
    }

    fn create_label_type_if_absent(
        &self,
        project: ProjectId,
        kind: LabelKind,
        text: &str,
    ) -> Result<LabelTypeId, StoreError> {
        self.lock().create_label_type_if_absent(project, kind, text)
    }

    fn create_label_type(&self, label: &LabelType) -> Result<LabelTypeId, StoreError> {
        self.lock().create_label_type(label)
    }

    fn insert_categories(&self, rows: &[CategoryAnnotation]) -> Result<(), StoreError> {
        self.lock().insert_categories(rows);
        Ok(())
    }

    fn insert_spans(&self, rows: &[SpanAnnotation]) -> Result<(), StoreError> {
        self.lock().insert_spans(rows);
        Ok(())
    }

    fn insert_text_labels(&self, rows: &[TextLabelAnnotation]) -> Result<(), StoreError> {
        self.lock().insert_text_labels(rows);
        Ok(())
    }

    fn categories_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<CategoryAnnotation>, StoreError> {
        Ok(self.lock().categories_in_scope(example, scope))
    }

    fn spans_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<SpanAnnotation>, StoreError> {
        Ok(self.lock().spans_in_scope(example, scope))
    }

    fn text_labels_in_scope(
        &self,
        example: ExampleId,
        scope: Scope,
    ) -> Result<Vec<TextLabelAnnotation>, StoreError> {
        Ok(self.lock().text_labels_in_scope(example, scope))
    }

    fn toggle_example_state(
        &self,
        example: ExampleId,
        confirmed_by: UserId,
        collaborative: bool,
    ) -> Result<Option<ExampleState>, StoreError> {
        Ok(self
            .lock()
            .toggle_example_state(example, confirmed_by, collaborative))
    }

    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&dyn ProjectStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        // Already inside a transaction; the nested work joins it.
        work(self)
    }
}
