//! Batched persistence of parsed records.
//!
//! The writer accumulates records up to `batch_size`, then flushes the
//! batch in three steps inside one store transaction: examples first
//! (storage assigns their IDs), label types second (ignore-duplicate),
//! annotations last, after consistency cleaning. The transaction holds
//! the backend for the whole flush, and a failed flush rolls the whole
//! batch back.

use tracing::info;

use crate::clean;
use crate::error::{AnnattoError, ParseError};
use crate::ids::UserId;
use crate::labels::LabelTypeRegistry;
use crate::model::{
    CategoryAnnotation, LabelCandidate, LabelKind, Project, Record, SpanAnnotation,
    TextLabelAnnotation,
};
use crate::store::{ProjectStore, StoreError};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// What a writer did over its lifetime, returned by
/// [`BatchedWriter::finish`] once the tail batch is flushed.
#[derive(Debug, Default)]
pub struct WriteSummary {
    pub errors: Vec<ParseError>,
    pub examples: usize,
    pub annotations: usize,
    /// Rows silently removed by consistency cleaning.
    pub dropped: usize,
}

pub struct BatchedWriter<'a> {
    store: &'a dyn ProjectStore,
    project: &'a Project,
    user: UserId,
    batch_size: usize,
    buffer: Vec<Record>,
    errors: Vec<ParseError>,
    categories: LabelTypeRegistry,
    spans: LabelTypeRegistry,
    examples_written: usize,
    annotations_written: usize,
    annotations_dropped: usize,
}

impl<'a> BatchedWriter<'a> {
    pub fn new(
        store: &'a dyn ProjectStore,
        project: &'a Project,
        user: UserId,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            project,
            user,
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
            errors: Vec::new(),
            categories: LabelTypeRegistry::new(project.id, LabelKind::Category),
            spans: LabelTypeRegistry::new(project.id, LabelKind::Span),
            examples_written: 0,
            annotations_written: 0,
            annotations_dropped: 0,
        }
    }

    /// Buffers a record, flushing when the batch is full. At most one
    /// batch of records is held in memory.
    pub fn push(&mut self, record: Record) -> Result<(), AnnattoError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Records a per-line error without aborting the job.
    pub fn record_error(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Flushes the remainder and returns the accumulated totals.
    pub fn finish(mut self) -> Result<WriteSummary, AnnattoError> {
        self.flush()?;
        info!(
            examples = self.examples_written,
            annotations = self.annotations_written,
            dropped = self.annotations_dropped,
            errors = self.errors.len(),
            "ingestion writer finished"
        );
        Ok(WriteSummary {
            errors: self.errors,
            examples: self.examples_written,
            annotations: self.annotations_written,
            dropped: self.annotations_dropped,
        })
    }

    fn flush(&mut self) -> Result<(), AnnattoError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let store = self.store;
        store.with_transaction(&mut |tx| self.flush_inner(tx))?;
        Ok(())
    }

    fn flush_inner(&mut self, store: &dyn ProjectStore) -> Result<(), StoreError> {
        let records = std::mem::take(&mut self.buffer);
        let batch_len = records.len();

        // Step 1: examples. IDs come back in input order.
        let mut new_examples = Vec::with_capacity(records.len());
        let mut label_sets = Vec::with_capacity(records.len());
        for record in records {
            let (example, labels) = record.into_new_example();
            new_examples.push(example);
            label_sets.push(labels);
        }
        let ids = store.insert_examples(self.project.id, &new_examples)?;

        // Step 2: label types, ignore-duplicate.
        let mut category_texts: Vec<&str> = Vec::new();
        let mut span_texts: Vec<&str> = Vec::new();
        for labels in &label_sets {
            for label in labels {
                match label {
                    LabelCandidate::Category(text) => category_texts.push(text),
                    LabelCandidate::Span { label, .. } => span_texts.push(label),
                    LabelCandidate::Text(_) => {}
                }
            }
        }
        self.categories.reconcile(store, category_texts)?;
        self.spans.reconcile(store, span_texts)?;

        // Step 3: annotations, cleaned per record.
        let mut categories = Vec::new();
        let mut spans = Vec::new();
        let mut texts = Vec::new();
        for (example, labels) in ids.iter().copied().zip(label_sets) {
            let mut record_categories = Vec::new();
            let mut record_spans = Vec::new();
            let mut record_texts = Vec::new();
            for label in labels {
                match label {
                    LabelCandidate::Category(text) => record_categories.push(CategoryAnnotation {
                        example,
                        user: self.user,
                        label: self.resolve(&self.categories, &text)?,
                    }),
                    LabelCandidate::Span { start, end, label } => record_spans.push(SpanAnnotation {
                        example,
                        user: self.user,
                        label: self.resolve(&self.spans, &label)?,
                        start_offset: start,
                        end_offset: end,
                    }),
                    LabelCandidate::Text(text) => record_texts.push(TextLabelAnnotation {
                        example,
                        user: self.user,
                        text,
                    }),
                }
            }
            let (kept, dropped) = clean::clean_categories(self.project, record_categories);
            categories.extend(kept);
            self.annotations_dropped += dropped;
            let (kept, dropped) = clean::clean_spans(self.project, record_spans);
            spans.extend(kept);
            self.annotations_dropped += dropped;
            let (kept, dropped) = clean::clean_text_labels(self.project, record_texts);
            texts.extend(kept);
            self.annotations_dropped += dropped;
        }

        let written = categories.len() + spans.len() + texts.len();
        store.insert_categories(&categories)?;
        store.insert_spans(&spans)?;
        store.insert_text_labels(&texts)?;

        self.examples_written += batch_len;
        self.annotations_written += written;
        info!(
            examples = batch_len,
            annotations = written,
            "flushed batch"
        );
        Ok(())
    }

    fn resolve(
        &self,
        registry: &LabelTypeRegistry,
        text: &str,
    ) -> Result<crate::ids::LabelTypeId, StoreError> {
        registry.get(text).ok_or_else(|| {
            StoreError::Backend(format!("label type '{}' missing after reconcile", text))
        })
    }
}
