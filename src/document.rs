//! Annotated documents: the ground-truth stream consumed in scoring mode.
//!
//! Each position carries the token plus its entity annotation:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `token` | vocabulary index |
//! | `entity_type` | `0` for non-entity tokens |
//! | `entity` | external entity index (required for entity types) |
//! | `mention_length` | length of the mention starting here |
//! | `sentence` | sentence index, non-decreasing over the document |
//!
//! Tokens inside a mention (after its first token) either repeat the
//! mention's type and entity or are left plain; any other annotation is
//! rejected. Only the first token of a mention drives the model.
//!
//! Documents are read as JSON or JSON Lines (one document per line):
//!
//! ```rust
//! use engen::Document;
//!
//! let line = r#"{"id":"d1","tokens":[{"token":4,"entity_type":1,"entity":0,"mention_length":1,"sentence":0}]}"#;
//! let docs = Document::from_jsonl(line).unwrap();
//! assert_eq!(docs[0].distinct_entities(), 1);
//! ```

use crate::error::{Error, Result};
use crate::types::{EntityType, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn one() -> usize {
    1
}

/// One position of the ground-truth stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedToken {
    /// Vocabulary index.
    pub token: TokenId,
    /// Entity type of the mention this token starts or continues.
    #[serde(default)]
    pub entity_type: EntityType,
    /// External entity index, for entity tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<usize>,
    /// Mention length in tokens.
    #[serde(default = "one")]
    pub mention_length: usize,
    /// Sentence index.
    #[serde(default)]
    pub sentence: usize,
}

impl AnnotatedToken {
    /// A non-entity token.
    #[must_use]
    pub const fn plain(token: TokenId, sentence: usize) -> Self {
        Self {
            token,
            entity_type: EntityType::NON_ENTITY,
            entity: None,
            mention_length: 1,
            sentence,
        }
    }

    /// A token referring to `entity`, starting a mention of `mention_length`.
    #[must_use]
    pub const fn mention(
        token: TokenId,
        entity_type: EntityType,
        entity: usize,
        mention_length: usize,
        sentence: usize,
    ) -> Self {
        Self {
            token,
            entity_type,
            entity: Some(entity),
            mention_length,
            sentence,
        }
    }
}

/// An annotated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier reported in errors.
    pub id: String,
    /// Ground-truth stream.
    pub tokens: Vec<AnnotatedToken>,
}

impl Document {
    /// Build a document.
    #[must_use]
    pub fn new(id: impl Into<String>, tokens: Vec<AnnotatedToken>) -> Self {
        Self {
            id: id.into(),
            tokens,
        }
    }

    /// Number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True for an empty document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of distinct external entity indices referenced by entity tokens.
    #[must_use]
    pub fn distinct_entities(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| t.entity_type.is_entity())
            .filter_map(|t| t.entity)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Structural checks that do not depend on a model: sentence indices
    /// never decrease, entity tokens name an entity, and tokens inside a
    /// mention agree with the token that opened it.
    ///
    /// # Errors
    ///
    /// `Document` wrapping `InvalidInput` at the first offending position.
    pub fn validate(&self) -> Result<()> {
        validate_tokens(&self.id, &self.tokens, None)
    }

    /// [`validate`](Self::validate), plus every entity type must lie in
    /// `0..types_num`.
    ///
    /// # Errors
    ///
    /// `Document` wrapping `InvalidType` or `InvalidInput` at the first
    /// offending position.
    pub fn validate_for(&self, types_num: usize) -> Result<()> {
        validate_tokens(&self.id, &self.tokens, Some(types_num))
    }

    /// Parse one JSON document.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::parse(e.to_string()))
    }

    /// Parse JSON Lines, skipping blank lines.
    pub fn from_jsonl(s: &str) -> Result<Vec<Self>> {
        s.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .map_err(|e| Error::parse(format!("line {}: {}", i + 1, e)))
            })
            .collect()
    }
}

/// Check a token stream, reporting errors against `id` and the position.
///
/// Used for scored documents and for generation prefixes.
pub(crate) fn validate_tokens(
    id: &str,
    tokens: &[AnnotatedToken],
    types_num: Option<usize>,
) -> Result<()> {
    let mut last_sentence = 0;
    // (opening token, positions still to come)
    let mut open: Option<(AnnotatedToken, usize)> = None;
    for (step, tok) in tokens.iter().enumerate() {
        check_token(tok, last_sentence, types_num, &mut open)
            .map_err(|e| e.in_document(id, step))?;
        last_sentence = tok.sentence;
    }
    Ok(())
}

fn check_token(
    tok: &AnnotatedToken,
    last_sentence: usize,
    types_num: Option<usize>,
    open: &mut Option<(AnnotatedToken, usize)>,
) -> Result<()> {
    if let Some(n) = types_num {
        if tok.entity_type.index() >= n {
            return Err(Error::invalid_type(tok.entity_type.index(), n));
        }
    }
    if tok.sentence < last_sentence {
        return Err(Error::invalid_input(format!(
            "sentence index decreased from {last_sentence} to {}",
            tok.sentence
        )));
    }
    if tok.entity_type.is_entity() && tok.entity.is_none() {
        return Err(Error::invalid_input(format!(
            "{} token without an entity index",
            tok.entity_type
        )));
    }

    if let Some((start, remaining)) = open.as_mut().filter(|(_, remaining)| *remaining > 0) {
        let plain = !tok.entity_type.is_entity();
        let same = tok.entity_type == start.entity_type && tok.entity == start.entity;
        if !(plain || same) {
            return Err(Error::invalid_input(format!(
                "token inside a mention of entity {:?} ({}) is annotated as entity {:?} ({})",
                start.entity, start.entity_type, tok.entity, tok.entity_type
            )));
        }
        *remaining -= 1;
        return Ok(());
    }
    *open = tok
        .entity_type
        .is_entity()
        .then(|| (*tok, tok.mention_length.saturating_sub(1)));
    Ok(())
}
