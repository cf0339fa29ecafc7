//! Annotation consistency rules.
//!
//! One predicate per annotation kind, applied in two places: bulk
//! cleaning of freshly imported rows inside a batch flush, and the
//! live admission check for interactive annotation requests. Both
//! paths share [`scope_for`], so the consistency boundary (per-user or
//! project-wide) can never drift between them.

use crate::error::RejectReason;
use crate::ids::{ExampleId, UserId};
use crate::model::{
    CategoryAnnotation, ExampleState, Project, SpanAnnotation, TextLabelAnnotation,
};
use crate::store::{ProjectStore, Scope, StoreError};

/// The consistency scope for annotations on one example.
///
/// Per-user by default; project-wide when the project pools all
/// members' work via `collaborative_annotation`.
pub fn scope_for(project: &Project, user: UserId) -> Scope {
    if project.collaborative_annotation {
        Scope::Project
    } else {
        Scope::User(user)
    }
}

/// Whether `other`'s annotations count against `owner`'s under the
/// project's scope. Bulk cleaning compares batch rows pairwise with
/// this; the live path reads from the store with the equivalent
/// [`Scope`].
fn shares_scope(project: &Project, owner: UserId, other: UserId) -> bool {
    match scope_for(project, owner) {
        Scope::Project => true,
        Scope::User(user) => user == other,
    }
}

// ============================================================================
// Bulk cleaning (import path)
// ============================================================================
//
// Imported examples are freshly inserted, so the only conflicts a batch
// can contain are among a record's own rows. Cleaning is silent by
// design: dropped rows are counted but do not become job errors.

/// Cleans one record's category rows. First row wins under
/// single-class; duplicates of the same label within one scope are
/// always dropped. Returns the kept rows and the number dropped.
pub fn clean_categories(
    project: &Project,
    rows: Vec<CategoryAnnotation>,
) -> (Vec<CategoryAnnotation>, usize) {
    let total = rows.len();
    let mut kept: Vec<CategoryAnnotation> = Vec::with_capacity(rows.len());
    for row in rows {
        if project.single_class_classification
            && kept.iter().any(|k| shares_scope(project, k.user, row.user))
        {
            continue;
        }
        if kept
            .iter()
            .any(|k| k.label == row.label && shares_scope(project, k.user, row.user))
        {
            continue;
        }
        kept.push(row);
    }
    let dropped = total - kept.len();
    (kept, dropped)
}

/// Cleans one record's span rows. Rows with `start >= end` are always
/// dropped. When overlap is disallowed, rows are sorted by
/// `(start, end)` and kept greedily: a span survives only if it starts
/// at or after the previous survivor's end. Sorting first makes the
/// result independent of input order.
pub fn clean_spans(project: &Project, rows: Vec<SpanAnnotation>) -> (Vec<SpanAnnotation>, usize) {
    let total = rows.len();
    let mut valid: Vec<SpanAnnotation> = rows
        .into_iter()
        .filter(|row| row.start_offset < row.end_offset)
        .collect();

    if project.allow_overlapping {
        let dropped = total - valid.len();
        return (valid, dropped);
    }

    valid.sort_by_key(|row| (row.start_offset, row.end_offset));
    let mut kept: Vec<SpanAnnotation> = Vec::with_capacity(valid.len());
    for row in valid {
        let collides = kept.iter().any(|k| {
            shares_scope(project, k.user, row.user)
                && row.start_offset < k.end_offset
                && k.start_offset < row.end_offset
        });
        if !collides {
            kept.push(row);
        }
    }
    let dropped = total - kept.len();
    (kept, dropped)
}

/// Cleans one record's text-label rows, dropping exact duplicates
/// within one scope.
pub fn clean_text_labels(
    project: &Project,
    rows: Vec<TextLabelAnnotation>,
) -> (Vec<TextLabelAnnotation>, usize) {
    let total = rows.len();
    let mut kept: Vec<TextLabelAnnotation> = Vec::with_capacity(rows.len());
    for row in rows {
        if kept
            .iter()
            .any(|k| k.text == row.text && shares_scope(project, k.user, row.user))
        {
            continue;
        }
        kept.push(row);
    }
    let dropped = total - kept.len();
    (kept, dropped)
}

// ============================================================================
// Live admission (interactive path)
// ============================================================================

/// Synchronous admission check for interactive annotation requests.
///
/// Each check performs one in-scope read against the store and applies
/// the same predicates as bulk cleaning, but rejects loudly instead of
/// dropping silently: a rejected request carries a [`RejectReason`]
/// the caller can surface verbatim.
pub struct AdmissionEngine<'a> {
    store: &'a dyn ProjectStore,
    project: &'a Project,
}

impl<'a> AdmissionEngine<'a> {
    pub fn new(store: &'a dyn ProjectStore, project: &'a Project) -> Self {
        Self { store, project }
    }

    pub fn check_category(
        &self,
        candidate: &CategoryAnnotation,
    ) -> Result<Result<(), RejectReason>, StoreError> {
        let scope = scope_for(self.project, candidate.user);
        let existing = self.store.categories_in_scope(candidate.example, scope)?;
        if self.project.single_class_classification && !existing.is_empty() {
            return Ok(Err(RejectReason::SingleClassViolation));
        }
        if existing.iter().any(|row| row.label == candidate.label) {
            return Ok(Err(RejectReason::DuplicateLabel));
        }
        Ok(Ok(()))
    }

    pub fn check_span(
        &self,
        candidate: &SpanAnnotation,
    ) -> Result<Result<(), RejectReason>, StoreError> {
        if candidate.start_offset >= candidate.end_offset {
            return Ok(Err(RejectReason::InvalidOffsets));
        }
        let scope = scope_for(self.project, candidate.user);
        let existing = self.store.spans_in_scope(candidate.example, scope)?;
        if existing.iter().any(|row| {
            row.label == candidate.label
                && row.start_offset == candidate.start_offset
                && row.end_offset == candidate.end_offset
        }) {
            return Ok(Err(RejectReason::DuplicateLabel));
        }
        if !self.project.allow_overlapping {
            let overlaps = existing.iter().any(|row| {
                candidate.start_offset < row.end_offset && row.start_offset < candidate.end_offset
            });
            if overlaps {
                return Ok(Err(RejectReason::OverlappingSpan));
            }
        }
        Ok(Ok(()))
    }

    pub fn check_text(
        &self,
        candidate: &TextLabelAnnotation,
    ) -> Result<Result<(), RejectReason>, StoreError> {
        let scope = scope_for(self.project, candidate.user);
        let existing = self.store.text_labels_in_scope(candidate.example, scope)?;
        if existing.iter().any(|row| row.text == candidate.text) {
            return Ok(Err(RejectReason::DuplicateText));
        }
        Ok(Ok(()))
    }

    /// Flips the "done" mark for an example on behalf of `user`,
    /// returning the new [`ExampleState`] when now marked and `None`
    /// when the toggle cleared it. Collaborative projects share one
    /// mark across all members.
    pub fn toggle_confirmed(
        &self,
        example: ExampleId,
        user: UserId,
    ) -> Result<Option<ExampleState>, StoreError> {
        self.store
            .toggle_example_state(example, user, self.project.collaborative_annotation)
    }
}
