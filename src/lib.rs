//! # engen
//!
//! Entity-tracking neural language model.
//!
//! A recurrent decoder is paired with a per-document bank of entity memory
//! vectors. At every token the model decides whether the token starts a
//! mention of a new or an existing entity, reads that entity's memory into
//! its context, and writes back an update. The same step protocol scores
//! annotated documents (teacher forcing) and generates new ones.
//!
//! - **Entity memory**: [`EntityBank`] arena with dense labels, gated
//!   updates and sentence-recency features
//! - **Context**: [`AttentionEncoder`] pools the previous sentence,
//!   [`ContextComposer`] mixes it with the hidden state and entity vector
//! - **Step protocol**: [`StepController`] state machine
//!   (new / continue / no entity, multi-token mentions)
//! - **Drivers**: [`SequenceDriver`] scoring and generation
//!
//! ## Quick Start
//!
//! ```rust
//! use engen::{AnnotatedToken, Document, EnGen, EnGenConfig, EntityType};
//!
//! let config = EnGenConfig::default()
//!     .with_vocab_size(50)
//!     .with_dims(8, 16, 8);
//! let model = EnGen::new(config).unwrap();
//!
//! let doc = Document::new(
//!     "example",
//!     vec![
//!         AnnotatedToken::mention(7, EntityType::ENTITY, 0, 1, 0),
//!         AnnotatedToken::plain(3, 0),
//!         AnnotatedToken::mention(7, EntityType::ENTITY, 0, 1, 1),
//!     ],
//! );
//! let scored = model.score(&doc).unwrap();
//! assert_eq!(scored.entities, 1);
//!
//! let generated = model.generate(&doc.tokens, 5).unwrap();
//! assert!(generated.tokens.len() <= 5);
//! ```
//!
//! ## Feature Flags
//!
//! ```toml
//! [dependencies]
//! engen = "0.1"                                       # plain-Rust core
//! engen = { version = "0.1", features = ["parallel"] } # rayon batch scoring
//! engen = { version = "0.1", features = ["candle"] }   # candle LSTM cell
//! engen = { version = "0.1", features = ["cli"] }      # `engen` binary
//! ```
//!
//! ## Design
//!
//! - **Plain vectors in the core**: entity states and contexts are `Vec<f32>`;
//!   tensor libraries stay behind the collaborator traits
//! - **Injected collaborators**: [`TokenEmbedding`], [`RecurrentCell`] and
//!   [`OutputHeads`] are trait objects, so tests run on deterministic stubs
//! - **Document-scoped state**: one model, many documents, one bank each

#![warn(missing_docs)]

pub mod backends;
pub mod config;
pub mod context;
pub mod controller;
pub mod document;
pub mod driver;
mod entity;
mod error;
pub mod math;
pub mod memory;
pub mod model;
pub mod sampling;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use engen::prelude::*;
    //!
    //! let model = EnGen::new(EnGenConfig::default().with_vocab_size(20).with_dims(4, 4, 4)).unwrap();
    //! let out = model.generate(&[], 3).unwrap();
    //! assert!(out.tokens.len() <= 3);
    //! ```
    pub use crate::config::EnGenConfig;
    pub use crate::document::{AnnotatedToken, Document};
    pub use crate::driver::{FinishReason, Generated, ScoredDocument, SequenceDriver};
    pub use crate::error::{Error, Result};
    pub use crate::model::EnGen;
    pub use crate::sampling::{Sampler, SamplingStrategy};
    pub use crate::types::{EntityType, Label, TokenId};
}

// Re-exports
pub use backends::{
    CellState, EmbeddingTable, LinearHeads, LstmCell, OutputHeads, RecurrentCell, TokenEmbedding,
};
pub use config::{
    AttentionScore, CompositionMethod, DistanceFeature, EnGenConfig, Initializer, PoolingType,
    UpdateRule,
};
pub use context::{AdditiveGate, AttentionEncoder, Compose, ConcatProject, ContextComposer};
pub use controller::{ActiveMention, Decision, EntityRef, StepController, StepOutput, StepState};
pub use document::{AnnotatedToken, Document};
pub use driver::{
    FinishReason, Generated, GeneratedToken, ScoredDocument, SequenceDriver, StepPrediction,
};
pub use entity::EntityState;
pub use error::{Error, Result};
pub use math::Matrix;
pub use memory::{BilinearNormalized, EntityBank, EntityUpdate, GatedInterpolation};
pub use model::{EnGen, EnGenBuilder, EntityParams};
pub use sampling::{Sampler, SamplingStrategy};
pub use types::{EntityType, Label, TokenId};

#[cfg(feature = "candle")]
pub use backends::CandleLstm;
