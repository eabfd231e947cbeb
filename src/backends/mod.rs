//! Collaborator interfaces and their reference implementations.
//!
//! The entity memory and the step protocol only see these traits. Anything
//! that can embed a token, advance a recurrent state, or score a context can
//! be plugged in, including deterministic stubs in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ TokenEmbedding   embed(token) -> x                   │
//! │   EmbeddingTable (vocab x dim lookup)                │
//! ├──────────────────────────────────────────────────────┤
//! │ RecurrentCell    step(x, state) -> state             │
//! │   LstmCell       plain-Rust LSTM                     │
//! │   CandleLstm     candle_nn LSTM (feature = "candle") │
//! ├──────────────────────────────────────────────────────┤
//! │ OutputHeads      context -> logits                   │
//! │   LinearHeads    type / label / length / token       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Heads return logits; the driver normalises them, so every distribution
//! it reports is a valid probability vector whatever the head computes.

pub mod embedding;
pub mod heads;
pub mod lstm;

#[cfg(feature = "candle")]
pub mod candle;

pub use embedding::EmbeddingTable;
pub use heads::LinearHeads;
pub use lstm::LstmCell;

#[cfg(feature = "candle")]
pub use self::candle::CandleLstm;

use crate::error::Result;
use crate::types::TokenId;
use serde::{Deserialize, Serialize};

/// Token embedding lookup.
pub trait TokenEmbedding: Send + Sync {
    /// Embedding dimension.
    fn dim(&self) -> usize;

    /// Number of embeddable tokens.
    fn vocab_size(&self) -> usize;

    /// Embed one token.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a token outside the vocabulary.
    fn embed(&self, token: TokenId) -> Result<Vec<f32>>;
}

/// Recurrent state carried between steps.
///
/// `memory` is the cell's private state (the LSTM cell vector); it may be
/// empty for cells that have none. Only `hidden` is visible to the rest of
/// the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    /// Hidden state `h_t`.
    pub hidden: Vec<f32>,
    /// Cell-private memory.
    pub memory: Vec<f32>,
}

impl CellState {
    /// All-zero state.
    #[must_use]
    pub fn zeros(hidden_dim: usize, memory_dim: usize) -> Self {
        Self {
            hidden: vec![0.0; hidden_dim],
            memory: vec![0.0; memory_dim],
        }
    }
}

/// An opaque recurrent cell: `step(x, state) -> state`.
pub trait RecurrentCell: Send + Sync {
    /// Cell name for logs.
    fn name(&self) -> &'static str;

    /// Expected input (token embedding) dimension.
    fn input_dim(&self) -> usize;

    /// Hidden state dimension.
    fn hidden_dim(&self) -> usize;

    /// State before the first token.
    fn initial_state(&self) -> CellState;

    /// Advance by one token embedding.
    fn step(&self, input: &[f32], state: &CellState) -> Result<CellState>;
}

/// Prediction heads mapping a context vector to unnormalised scores.
pub trait OutputHeads: Send + Sync {
    /// Scores over entity types (`types_num` entries).
    fn type_logits(&self, context: &[f32]) -> Result<Vec<f32>>;

    /// Scores over the live entities followed by one "new entity" score.
    ///
    /// `entities` and `distances` are in label order and have equal length;
    /// the result has `entities.len() + 1` entries.
    fn label_logits(
        &self,
        context: &[f32],
        entities: &[&[f32]],
        distances: &[f32],
    ) -> Result<Vec<f32>>;

    /// Scores over mention lengths `1..=max_mention_length`.
    fn length_logits(&self, context: &[f32]) -> Result<Vec<f32>>;

    /// Scores over the vocabulary.
    fn token_logits(&self, context: &[f32]) -> Result<Vec<f32>>;
}
