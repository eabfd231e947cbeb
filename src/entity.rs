//! Entity memory records.

use crate::types::{EntityType, Label};
use serde::{Deserialize, Serialize};

/// One tracked entity: its memory vector plus bookkeeping.
///
/// Records are created and mutated only by
/// [`EntityBank`](crate::memory::EntityBank); everything else gets shared
/// references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    label: Label,
    entity_type: EntityType,
    external_index: usize,
    state: Vec<f32>,
    created_sentence: usize,
    last_sentence: usize,
    mentions: usize,
}

impl EntityState {
    pub(crate) fn new(
        label: Label,
        entity_type: EntityType,
        external_index: usize,
        state: Vec<f32>,
        sentence: usize,
    ) -> Self {
        Self {
            label,
            entity_type,
            external_index,
            state,
            created_sentence: sentence,
            last_sentence: sentence,
            mentions: 1,
        }
    }

    /// Stable document-scoped label.
    #[must_use]
    pub const fn label(&self) -> Label {
        self.label
    }

    /// Entity type fixed at creation.
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Index of this entity in the input stream that introduced it.
    #[must_use]
    pub const fn external_index(&self) -> usize {
        self.external_index
    }

    /// Current memory vector.
    #[must_use]
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    /// Fixed dimension of the memory vector.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.state.len()
    }

    /// Sentence in which the entity was created.
    #[must_use]
    pub const fn created_sentence(&self) -> usize {
        self.created_sentence
    }

    /// Sentence of the most recent mention.
    #[must_use]
    pub const fn last_sentence(&self) -> usize {
        self.last_sentence
    }

    /// Number of updates plus the creating mention.
    #[must_use]
    pub const fn mentions(&self) -> usize {
        self.mentions
    }

    /// Sentences elapsed since the last mention. Never underflows.
    #[must_use]
    pub const fn gap(&self, sentence: usize) -> usize {
        sentence.saturating_sub(self.last_sentence)
    }

    /// Replace the memory vector; the caller guarantees the dimension.
    pub(crate) fn set_state(&mut self, state: Vec<f32>, sentence: usize) {
        debug_assert_eq!(state.len(), self.state.len());
        debug_assert!(sentence >= self.last_sentence);
        self.state = state;
        self.last_sentence = sentence;
        self.mentions += 1;
    }
}
