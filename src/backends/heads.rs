//! Linear prediction heads.
//!
//! Type, length and token heads are plain projections of the context. The
//! label head scores entity `i` as
//!
//! ```text
//! score_i   = contextᵀ W_e e_i + w_dist · dist_i
//! score_new = contextᵀ r_new
//! ```
//!
//! so the choice between reusing an entity and introducing a new one depends
//! on both the entity memories and how recently each was mentioned.

use super::OutputHeads;
use crate::config::EnGenConfig;
use crate::error::{ensure_dim, Error, Result};
use crate::math::{dot, Matrix};
use rand::Rng;

/// Projection heads for the four per-step predictions.
#[derive(Debug, Clone)]
pub struct LinearHeads {
    w_type: Matrix,
    w_length: Matrix,
    w_token: Matrix,
    w_entity: Matrix,
    w_dist: f32,
    r_new: Vec<f32>,
}

impl LinearHeads {
    /// Build from weights.
    ///
    /// `w_entity` is `context_dim x entity_dim`; every other matrix has
    /// `context_dim` columns.
    pub fn new(
        w_type: Matrix,
        w_length: Matrix,
        w_token: Matrix,
        w_entity: Matrix,
        w_dist: f32,
        r_new: Vec<f32>,
    ) -> Result<Self> {
        let ctx = w_type.cols();
        w_length.ensure_shape("length head", w_length.rows(), ctx)?;
        w_token.ensure_shape("token head", w_token.rows(), ctx)?;
        w_entity.ensure_shape("entity head", ctx, w_entity.cols())?;
        ensure_dim("new-entity embedding", ctx, r_new.len())?;
        Ok(Self {
            w_type,
            w_length,
            w_token,
            w_entity,
            w_dist,
            r_new,
        })
    }

    /// Randomly initialised heads for a configuration.
    ///
    /// The distance weight starts negative so that, untrained, recently
    /// mentioned entities are preferred.
    pub fn init<R: Rng + ?Sized>(config: &EnGenConfig, rng: &mut R) -> Self {
        let ctx = config.context_dim();
        let init = config.initializer;
        Self {
            w_type: Matrix::init(config.types_num, ctx, init, rng),
            w_length: Matrix::init(config.max_mention_length, ctx, init, rng),
            w_token: Matrix::init(config.vocab_size, ctx, init, rng),
            w_entity: Matrix::init(ctx, config.entity_dim, init, rng),
            w_dist: -1.0,
            r_new: Matrix::init(1, ctx, init, rng).row(0).to_vec(),
        }
    }
}

impl OutputHeads for LinearHeads {
    fn type_logits(&self, context: &[f32]) -> Result<Vec<f32>> {
        self.w_type.matvec(context)
    }

    fn label_logits(
        &self,
        context: &[f32],
        entities: &[&[f32]],
        distances: &[f32],
    ) -> Result<Vec<f32>> {
        if entities.len() != distances.len() {
            return Err(Error::dimension_mismatch(
                "distance features",
                entities.len(),
                distances.len(),
            ));
        }
        let mut logits = Vec::with_capacity(entities.len() + 1);
        for (e, d) in entities.iter().zip(distances) {
            logits.push(self.w_entity.bilinear(context, e)? + self.w_dist * d);
        }
        ensure_dim("context", self.r_new.len(), context.len())?;
        logits.push(dot(context, &self.r_new));
        Ok(logits)
    }

    fn length_logits(&self, context: &[f32]) -> Result<Vec<f32>> {
        self.w_length.matvec(context)
    }

    fn token_logits(&self, context: &[f32]) -> Result<Vec<f32>> {
        self.w_token.matvec(context)
    }
}
