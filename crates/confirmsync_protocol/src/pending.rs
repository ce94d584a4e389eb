//! Accumulated annotation deltas awaiting a flush.

use crate::annotation::FieldAnnotation;
use std::collections::BTreeMap;

/// Annotation deltas that have not been delivered to the remote store yet.
///
/// Entries are keyed by field name: staging a field again replaces the older
/// undelivered delta, so a flush never carries two entries for one field.
///
/// # Invariants
///
/// - At most one entry per field name
/// - `take` empties the set in one step
/// - `restore` never overrides an entry staged after the flush began
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChangeSet {
    entries: BTreeMap<String, FieldAnnotation>,
}

impl PendingChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a delta, returning the older delta it replaced.
    pub fn stage(&mut self, annotation: FieldAnnotation) -> Option<FieldAnnotation> {
        self.entries
            .insert(annotation.field_name.clone(), annotation)
    }

    /// Drains every staged delta, in field name order.
    pub fn take(&mut self) -> Vec<FieldAnnotation> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    /// Re-stages deltas from a failed flush.
    ///
    /// Fields staged again since the flush began keep their newer delta.
    /// Returns the number of deltas restored.
    pub fn restore(&mut self, failed: Vec<FieldAnnotation>) -> usize {
        let mut restored = 0;
        for annotation in failed {
            if !self.entries.contains_key(&annotation.field_name) {
                self.entries
                    .insert(annotation.field_name.clone(), annotation);
                restored += 1;
            }
        }
        restored
    }

    /// Returns the staged delta for a field.
    pub fn get(&self, field_name: &str) -> Option<&FieldAnnotation> {
        self.entries.get(field_name)
    }

    /// Returns true if a delta is staged for the field.
    pub fn contains(&self, field_name: &str) -> bool {
        self.entries.contains_key(field_name)
    }

    /// Iterates staged deltas in field name order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldAnnotation> {
        self.entries.values()
    }

    /// Returns the number of staged deltas.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
