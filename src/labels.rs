//! Label-type registry.
//!
//! Import-side reconciliation of observed label texts against the
//! project's label-type space, plus the interactive creation helpers
//! (shortcut suggestion and new-label validation).

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::RejectReason;
use crate::ids::{LabelTypeId, ProjectId};
use crate::model::{LabelKind, LabelType, ShortcutKey};
use crate::store::{ProjectStore, StoreError};

/// Modifier combinations tried when suggesting a shortcut, cheapest
/// chord first.
const SHORTCUT_PREFIXES: [&str; 4] = ["", "ctrl", "shift", "ctrl shift"];

/// Text → id map for one `(project, kind)` label space.
///
/// The registry is rebuilt from storage at every reconcile so that
/// label types created by a concurrently running job are picked up
/// instead of re-created.
pub struct LabelTypeRegistry {
    project: ProjectId,
    kind: LabelKind,
    by_text: BTreeMap<String, LabelTypeId>,
}

impl LabelTypeRegistry {
    pub fn new(project: ProjectId, kind: LabelKind) -> Self {
        Self {
            project,
            kind,
            by_text: BTreeMap::new(),
        }
    }

    /// Refreshes the map from storage, creates every text in `texts`
    /// that is still missing, and returns the id for each requested
    /// text. Creation is ignore-duplicate, so two jobs importing the
    /// same new label cannot fail each other. Imported label types
    /// never receive a shortcut key.
    pub fn reconcile<'a>(
        &mut self,
        store: &dyn ProjectStore,
        texts: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), StoreError> {
        self.by_text = store
            .label_types(self.project, self.kind)?
            .into_iter()
            .map(|label| (label.text, label.id))
            .collect();

        for text in texts {
            if self.by_text.contains_key(text) {
                continue;
            }
            let id = store.create_label_type_if_absent(self.project, self.kind, text)?;
            debug!(label = text, id = id.as_i64(), "created label type");
            self.by_text.insert(text.to_string(), id);
        }
        Ok(())
    }

    pub fn get(&self, text: &str) -> Option<LabelTypeId> {
        self.by_text.get(text).copied()
    }

    pub fn len(&self) -> usize {
        self.by_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_text.is_empty()
    }
}

/// Picks the first unused shortcut, scanning suffixes `a..z` in the
/// outer loop and modifier prefixes in the inner loop, so plain keys
/// are exhausted letter by letter before chords. Returns `None` when
/// all 104 combinations are taken.
pub fn suggest_shortcut(existing: &[LabelType]) -> Option<ShortcutKey> {
    for suffix in 'a'..='z' {
        for prefix in SHORTCUT_PREFIXES {
            let key = ShortcutKey::new(prefix, suffix.to_string());
            let taken = existing
                .iter()
                .any(|label| label.shortcut.as_ref() == Some(&key));
            if !taken {
                return Some(key);
            }
        }
    }
    None
}

/// Validates an interactively created label against its siblings:
/// label text must be unique in the project, and the shortcut (when
/// set) must not already be assigned.
pub fn validate_new_label(
    candidate: &LabelType,
    existing: &[LabelType],
) -> Result<(), RejectReason> {
    if existing.iter().any(|label| label.text == candidate.text) {
        return Err(RejectReason::LabelTextTaken);
    }
    if let Some(key) = &candidate.shortcut {
        if existing
            .iter()
            .any(|label| label.shortcut.as_ref() == Some(key))
        {
            return Err(RejectReason::ShortcutTaken);
        }
    }
    Ok(())
}
