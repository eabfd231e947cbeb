//! Small identifier types shared across the crate.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`TokenId`] | Index into the vocabulary |
//! | [`EntityType`] | Categorical mention type; `0` is the non-entity type |
//! | [`Label`] | Dense, document-scoped entity identifier |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a token in the vocabulary.
pub type TokenId = usize;

/// Categorical entity type.
///
/// Type `0` is [`EntityType::NON_ENTITY`]; every other index below the
/// configured `types_num` is an entity type with its own base embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(pub usize);

impl EntityType {
    /// Tokens that are not part of any mention.
    pub const NON_ENTITY: EntityType = EntityType(0);
    /// The single entity type of the two-type setup.
    pub const ENTITY: EntityType = EntityType(1);

    /// Raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Does this type denote a mention of an entity?
    #[must_use]
    pub const fn is_entity(self) -> bool {
        self.0 != 0
    }
}

impl Default for EntityType {
    fn default() -> Self {
        EntityType::NON_ENTITY
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "NON_ENTITY"),
            1 => write!(f, "ENTITY"),
            n => write!(f, "TYPE_{n}"),
        }
    }
}

/// Dense entity identifier within one document.
///
/// Labels are assigned in creation order starting at 0 and are never reused
/// while the document is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(pub usize);

impl Label {
    /// Raw index into the entity arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_kinds() {
        assert!(!EntityType::NON_ENTITY.is_entity());
        assert!(EntityType::ENTITY.is_entity());
        assert!(EntityType(3).is_entity());
        assert_eq!(EntityType::default(), EntityType::NON_ENTITY);
        assert_eq!(EntityType(4).to_string(), "TYPE_4");
    }

    #[test]
    fn test_label_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Label(5)).unwrap(), "5");
        let l: Label = serde_json::from_str("2").unwrap();
        assert_eq!(l, Label(2));
    }
}
