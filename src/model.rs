//! The assembled model: collaborators plus the parameters shared by every
//! document.
//!
//! ```rust
//! use engen::{EnGen, EnGenConfig};
//!
//! let config = EnGenConfig::default()
//!     .with_vocab_size(30)
//!     .with_dims(8, 12, 6)
//!     .with_types_num(3);
//! let model = EnGen::new(config).unwrap();
//! assert_eq!(model.config().hidden_dim, 12);
//! ```
//!
//! Custom collaborators go through the builder:
//!
//! ```rust
//! use engen::{EnGen, EnGenConfig, LstmCell, Initializer};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let config = EnGenConfig::default().with_vocab_size(10).with_dims(4, 5, 3);
//! let cell = LstmCell::init(4, 5, Initializer::Xavier, &mut StdRng::seed_from_u64(1));
//! let model = EnGen::builder(config).cell(cell).build().unwrap();
//! assert_eq!(model.cell_name(), "lstm");
//! ```

use crate::backends::{
    EmbeddingTable, LinearHeads, LstmCell, OutputHeads, RecurrentCell, TokenEmbedding,
};
use crate::config::EnGenConfig;
use crate::context::ContextComposer;
use crate::document::{AnnotatedToken, Document};
use crate::driver::{Generated, ScoredDocument, SequenceDriver};
use crate::error::{Error, Result};
use crate::math::Matrix;
use crate::memory::{update_rule, EntityBank, EntityUpdate};
use crate::sampling::Sampler;
use crate::types::EntityType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Entity-memory parameters: per-type base embeddings and the update
/// projections.
#[derive(Debug, Clone)]
pub struct EntityParams {
    /// `types_num x entity_dim`; row 0 (non-entity) is never read.
    base: Matrix,
    /// `entity_dim x hidden_dim`.
    w_h: Matrix,
    /// Shape chosen by the update rule.
    w_delta: Matrix,
}

impl EntityParams {
    /// Build from explicit matrices.
    #[must_use]
    pub fn new(base: Matrix, w_h: Matrix, w_delta: Matrix) -> Self {
        Self { base, w_h, w_delta }
    }

    /// Randomly initialised parameters for a configuration and update rule.
    pub fn init<R: Rng + ?Sized>(
        config: &EnGenConfig,
        rule: &dyn EntityUpdate,
        rng: &mut R,
    ) -> Self {
        let init = config.initializer;
        let (rows, cols) = rule.delta_shape(config.entity_dim);
        Self {
            base: Matrix::init(config.types_num, config.entity_dim, init, rng),
            w_h: Matrix::init(config.entity_dim, config.hidden_dim, init, rng),
            w_delta: Matrix::init(rows, cols, init, rng),
        }
    }

    fn validate(&self, config: &EnGenConfig, rule: &dyn EntityUpdate) -> Result<()> {
        self.base
            .ensure_shape("base embeddings", config.types_num, config.entity_dim)?;
        self.w_h
            .ensure_shape("W_h", config.entity_dim, config.hidden_dim)?;
        let (rows, cols) = rule.delta_shape(config.entity_dim);
        self.w_delta.ensure_shape("W_delta", rows, cols)
    }

    /// Initial state for a new entity of `entity_type`.
    pub fn base_embedding(&self, entity_type: EntityType) -> Result<&[f32]> {
        if entity_type.index() >= self.base.rows() {
            return Err(Error::invalid_type(entity_type.index(), self.base.rows()));
        }
        Ok(self.base.row(entity_type.index()))
    }

    /// Hidden-to-entity projection.
    #[must_use]
    pub fn w_h(&self) -> &Matrix {
        &self.w_h
    }

    /// Update gate weights.
    #[must_use]
    pub fn w_delta(&self) -> &Matrix {
        &self.w_delta
    }
}

/// Entity-tracking language model.
///
/// Immutable once built; all per-document state lives in the
/// [`SequenceDriver`] and the [`EntityBank`] it creates, so one model can
/// score many documents concurrently.
pub struct EnGen {
    config: EnGenConfig,
    embedding: Box<dyn TokenEmbedding>,
    cell: Box<dyn RecurrentCell>,
    heads: Box<dyn OutputHeads>,
    composer: ContextComposer,
    rule: Arc<dyn EntityUpdate>,
    params: EntityParams,
}

impl std::fmt::Debug for EnGen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnGen")
            .field("config", &self.config)
            .field("cell", &self.cell.name())
            .field("rule", &self.rule.name())
            .field("composer", &self.composer)
            .finish_non_exhaustive()
    }
}

impl EnGen {
    /// Model with randomly initialised reference collaborators.
    ///
    /// # Errors
    ///
    /// `Config` if the configuration is inconsistent.
    pub fn new(config: EnGenConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Builder for injecting custom collaborators.
    #[must_use]
    pub fn builder(config: EnGenConfig) -> EnGenBuilder {
        EnGenBuilder::new(config)
    }

    /// Configuration the model was built with.
    #[must_use]
    pub fn config(&self) -> &EnGenConfig {
        &self.config
    }

    /// Name of the recurrent cell.
    #[must_use]
    pub fn cell_name(&self) -> &'static str {
        self.cell.name()
    }

    /// Name of the entity update rule.
    #[must_use]
    pub fn update_rule_name(&self) -> &'static str {
        self.rule.name()
    }

    /// An empty entity bank wired to this model's update rule.
    #[must_use]
    pub fn new_bank(&self) -> EntityBank {
        EntityBank::from_config(&self.config).with_rule(Arc::clone(&self.rule))
    }

    /// Score a document with teacher forcing.
    pub fn score(&self, document: &Document) -> Result<ScoredDocument> {
        SequenceDriver::new(self).score(document)
    }

    /// Score independent documents, each with its own bank.
    pub fn score_batch(&self, documents: &[Document]) -> Vec<Result<ScoredDocument>> {
        SequenceDriver::new(self).score_batch(documents)
    }

    /// Greedy generation after an optional prefix.
    pub fn generate(&self, prefix: &[AnnotatedToken], max_steps: usize) -> Result<Generated> {
        SequenceDriver::new(self).generate(prefix, max_steps)
    }

    /// Generation with a caller-supplied sampler.
    pub fn generate_with(
        &self,
        sampler: Sampler,
        prefix: &[AnnotatedToken],
        max_steps: usize,
    ) -> Result<Generated> {
        SequenceDriver::new(self)
            .with_sampler(sampler)
            .generate(prefix, max_steps)
    }

    pub(crate) fn embedding(&self) -> &dyn TokenEmbedding {
        self.embedding.as_ref()
    }

    pub(crate) fn cell(&self) -> &dyn RecurrentCell {
        self.cell.as_ref()
    }

    pub(crate) fn heads(&self) -> &dyn OutputHeads {
        self.heads.as_ref()
    }

    pub(crate) fn composer(&self) -> &ContextComposer {
        &self.composer
    }

    pub(crate) fn params(&self) -> &EntityParams {
        &self.params
    }
}

/// Builder for [`EnGen`]. Anything left unset is randomly initialised from
/// the configuration's seed.
pub struct EnGenBuilder {
    config: EnGenConfig,
    embedding: Option<Box<dyn TokenEmbedding>>,
    cell: Option<Box<dyn RecurrentCell>>,
    heads: Option<Box<dyn OutputHeads>>,
    composer: Option<ContextComposer>,
    rule: Option<Arc<dyn EntityUpdate>>,
    params: Option<EntityParams>,
}

impl EnGenBuilder {
    fn new(config: EnGenConfig) -> Self {
        Self {
            config,
            embedding: None,
            cell: None,
            heads: None,
            composer: None,
            rule: None,
            params: None,
        }
    }

    /// Token embedding lookup.
    #[must_use]
    pub fn embedding<E: TokenEmbedding + 'static>(mut self, embedding: E) -> Self {
        self.embedding = Some(Box::new(embedding));
        self
    }

    /// Recurrent cell.
    #[must_use]
    pub fn cell<C: RecurrentCell + 'static>(mut self, cell: C) -> Self {
        self.cell = Some(Box::new(cell));
        self
    }

    /// Prediction heads.
    #[must_use]
    pub fn heads<H: OutputHeads + 'static>(mut self, heads: H) -> Self {
        self.heads = Some(Box::new(heads));
        self
    }

    /// Context composer.
    #[must_use]
    pub fn composer(mut self, composer: ContextComposer) -> Self {
        self.composer = Some(composer);
        self
    }

    /// Entity update rule, overriding `config.update_rule`.
    #[must_use]
    pub fn update_rule<U: EntityUpdate + 'static>(mut self, rule: U) -> Self {
        self.rule = Some(Arc::new(rule));
        self
    }

    /// Entity parameters (base embeddings and update projections).
    #[must_use]
    pub fn entity_params(mut self, params: EntityParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Validate and assemble.
    ///
    /// # Errors
    ///
    /// `Config` for an invalid configuration, `DimensionMismatch` when a
    /// supplied collaborator disagrees with the configured dimensions.
    pub fn build(self) -> Result<EnGen> {
        let config = self.config;
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let init = config.initializer;

        let embedding = match self.embedding {
            Some(e) => e,
            None => Box::new(EmbeddingTable::init(
                config.vocab_size,
                config.embedding_dim,
                init,
                &mut rng,
            )),
        };
        let cell = match self.cell {
            Some(c) => c,
            None => Box::new(LstmCell::init(
                config.embedding_dim,
                config.hidden_dim,
                init,
                &mut rng,
            )),
        };
        let rule = self
            .rule
            .unwrap_or_else(|| Arc::from(update_rule(config.update_rule)));
        let params = match self.params {
            Some(p) => p,
            None => EntityParams::init(&config, rule.as_ref(), &mut rng),
        };
        let composer = match self.composer {
            Some(c) => c,
            None => ContextComposer::init(&config, &mut rng)?,
        };
        let heads = match self.heads {
            Some(h) => h,
            None => Box::new(LinearHeads::init(&config, &mut rng)),
        };

        if embedding.vocab_size() != config.vocab_size {
            return Err(Error::dimension_mismatch(
                "embedding vocabulary",
                config.vocab_size,
                embedding.vocab_size(),
            ));
        }
        if cell.input_dim() != embedding.dim() {
            return Err(Error::dimension_mismatch(
                "cell input",
                embedding.dim(),
                cell.input_dim(),
            ));
        }
        if cell.hidden_dim() != config.hidden_dim {
            return Err(Error::dimension_mismatch(
                "cell hidden state",
                config.hidden_dim,
                cell.hidden_dim(),
            ));
        }
        params.validate(&config, rule.as_ref())?;

        log::debug!(
            "[engen] built model: cell={} rule={} pooling={:?} composition={:?}",
            cell.name(),
            rule.name(),
            config.pooling_type,
            config.composition_method
        );
        Ok(EnGen {
            config,
            embedding,
            cell,
            heads,
            composer,
            rule,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdateRule;
    use crate::memory::BilinearNormalized;

    fn small() -> EnGenConfig {
        EnGenConfig::default()
            .with_vocab_size(12)
            .with_dims(3, 4, 2)
            .with_types_num(3)
    }

    #[test]
    fn test_new_is_deterministic_per_seed() {
        let a = EnGen::new(small()).unwrap();
        let b = EnGen::new(small()).unwrap();
        assert_eq!(a.params().w_h(), b.params().w_h());
        let c = EnGen::new(small().with_seed(7)).unwrap();
        assert_ne!(a.params().w_h(), c.params().w_h());
    }

    #[test]
    fn test_delta_shape_follows_rule() {
        let gated = EnGen::new(small()).unwrap();
        assert_eq!(gated.params().w_delta().cols(), 4);
        let bilinear =
            EnGen::new(small().with_update_rule(UpdateRule::BilinearNormalized)).unwrap();
        assert_eq!(bilinear.params().w_delta().cols(), 2);
        assert_eq!(bilinear.update_rule_name(), "bilinear_normalized");
    }

    #[test]
    fn test_builder_rejects_mismatched_cell() {
        let mut rng = StdRng::seed_from_u64(0);
        let cell = LstmCell::init(3, 9, Default::default(), &mut rng);
        let err = EnGen::builder(small()).cell(cell).build().unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_builder_rule_overrides_delta_shape() {
        let model = EnGen::builder(small())
            .update_rule(BilinearNormalized)
            .build()
            .unwrap();
        assert_eq!(model.params().w_delta().rows(), 2);
        assert_eq!(model.params().w_delta().cols(), 2);
    }

    #[test]
    fn test_base_embedding_bounds() {
        let model = EnGen::new(small()).unwrap();
        assert_eq!(model.params().base_embedding(EntityType(2)).unwrap().len(), 2);
        assert!(matches!(
            model.params().base_embedding(EntityType(3)),
            Err(Error::InvalidType { .. })
        ));
    }

    #[test]
    fn test_invalid_config_fails_build() {
        assert!(matches!(
            EnGen::new(small().with_types_num(1)),
            Err(Error::Config(_))
        ));
    }
}
