//! Context composition.
//!
//! A context vector combines three signals:
//!
//! - `h`: the decoder hidden state
//! - `s`: the pooled previous sentence
//! - `e`: the referenced entity's memory (zero when no entity is referenced)
//!
//! Composition is stateless: the output depends only on the three inputs and
//! the composer's parameters.

use super::attention::AttentionEncoder;
use crate::config::{AttentionScore, CompositionMethod, EnGenConfig, PoolingType};
use crate::error::{ensure_dim, Result};
use crate::math::{concat, sigmoid, Matrix};
use rand::Rng;

/// A composition strategy.
pub trait Compose: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Combine hidden state, sentence summary and entity vector.
    fn compose(&self, h: &[f32], summary: &[f32], entity: &[f32]) -> Result<Vec<f32>>;
}

/// `tanh(W_c · [h; s; e] + b_c)`.
#[derive(Debug, Clone)]
pub struct ConcatProject {
    w_c: Matrix,
    b_c: Vec<f32>,
}

impl ConcatProject {
    /// Build from a projection matrix and bias.
    pub fn new(w_c: Matrix, b_c: Vec<f32>) -> Result<Self> {
        ensure_dim("composer bias", w_c.rows(), b_c.len())?;
        Ok(Self { w_c, b_c })
    }
}

impl Compose for ConcatProject {
    fn name(&self) -> &'static str {
        "concat_project"
    }

    fn compose(&self, h: &[f32], summary: &[f32], entity: &[f32]) -> Result<Vec<f32>> {
        let projected = self.w_c.matvec(&concat(&[h, summary, entity]))?;
        Ok(projected
            .into_iter()
            .zip(&self.b_c)
            .map(|(x, b)| (x + b).tanh())
            .collect())
    }
}

/// `tanh(h + σ(G_s h) ⊙ P_s s + σ(G_e h) ⊙ P_e e)`.
#[derive(Debug, Clone)]
pub struct AdditiveGate {
    p_s: Matrix,
    p_e: Matrix,
    g_s: Matrix,
    g_e: Matrix,
}

impl AdditiveGate {
    /// Build from summary/entity projections and their gates.
    pub fn new(p_s: Matrix, p_e: Matrix, g_s: Matrix, g_e: Matrix) -> Result<Self> {
        let d = p_s.rows();
        p_e.ensure_shape("P_e", d, p_e.cols())?;
        g_s.ensure_shape("G_s", d, d)?;
        g_e.ensure_shape("G_e", d, d)?;
        Ok(Self { p_s, p_e, g_s, g_e })
    }
}

impl Compose for AdditiveGate {
    fn name(&self) -> &'static str {
        "additive_gate"
    }

    fn compose(&self, h: &[f32], summary: &[f32], entity: &[f32]) -> Result<Vec<f32>> {
        ensure_dim("hidden state", self.p_s.rows(), h.len())?;
        let s = self.p_s.matvec(summary)?;
        let e = self.p_e.matvec(entity)?;
        let gs = self.g_s.matvec(h)?;
        let ge = self.g_e.matvec(h)?;
        Ok((0..h.len())
            .map(|i| (h[i] + sigmoid(gs[i]) * s[i] + sigmoid(ge[i]) * e[i]).tanh())
            .collect())
    }
}

/// Pools the previous sentence and composes the per-step context vector.
pub struct ContextComposer {
    pooling: PoolingType,
    encoder: AttentionEncoder,
    composition: Box<dyn Compose>,
    hidden_dim: usize,
    entity_dim: usize,
}

impl std::fmt::Debug for ContextComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextComposer")
            .field("pooling", &self.pooling)
            .field("attention", &self.encoder.score_kind())
            .field("composition", &self.composition.name())
            .finish()
    }
}

impl ContextComposer {
    /// Assemble from parts.
    pub fn new(
        pooling: PoolingType,
        encoder: AttentionEncoder,
        composition: Box<dyn Compose>,
        entity_dim: usize,
    ) -> Self {
        let hidden_dim = encoder.dim();
        Self {
            pooling,
            encoder,
            composition,
            hidden_dim,
            entity_dim,
        }
    }

    /// Randomly initialised composer for a configuration.
    pub fn init<R: Rng + ?Sized>(config: &EnGenConfig, rng: &mut R) -> Result<Self> {
        let h = config.hidden_dim;
        let e = config.entity_dim;
        let init = config.initializer;
        let encoder = match config.attention_score {
            AttentionScore::ScaledDot => AttentionEncoder::scaled_dot(h),
            AttentionScore::Bilinear => {
                AttentionEncoder::bilinear(Matrix::init(h, h, init, rng))?
            }
        };
        let composition: Box<dyn Compose> = match config.composition_method {
            CompositionMethod::ConcatProject => Box::new(ConcatProject::new(
                Matrix::init(h, 2 * h + e, init, rng),
                vec![0.0; h],
            )?),
            CompositionMethod::AdditiveGate => Box::new(AdditiveGate::new(
                Matrix::init(h, h, init, rng),
                Matrix::init(h, e, init, rng),
                Matrix::init(h, h, init, rng),
                Matrix::init(h, h, init, rng),
            )?),
        };
        Ok(Self::new(config.pooling_type, encoder, composition, e))
    }

    /// Pooling in use.
    #[must_use]
    pub const fn pooling(&self) -> PoolingType {
        self.pooling
    }

    /// Summarise the previous sentence with respect to `query`.
    ///
    /// Returns the zero vector when there is no previous sentence.
    pub fn summarize(&self, previous: &[Vec<f32>], query: &[f32]) -> Result<Vec<f32>> {
        ensure_dim("summary query", self.hidden_dim, query.len())?;
        match self.pooling {
            PoolingType::Attention => self.encoder.encode(previous, query),
            PoolingType::Mean => {
                let mut out = vec![0.0; self.hidden_dim];
                if previous.is_empty() {
                    return Ok(out);
                }
                for (i, s) in previous.iter().enumerate() {
                    ensure_dim(&format!("previous state {i}"), self.hidden_dim, s.len())?;
                    for (o, x) in out.iter_mut().zip(s) {
                        *o += x;
                    }
                }
                let n = previous.len() as f32;
                out.iter_mut().for_each(|o| *o /= n);
                Ok(out)
            }
            PoolingType::Last => match previous.last() {
                Some(last) => {
                    ensure_dim("previous state", self.hidden_dim, last.len())?;
                    Ok(last.clone())
                }
                None => Ok(vec![0.0; self.hidden_dim]),
            },
            PoolingType::None => Ok(vec![0.0; self.hidden_dim]),
        }
    }

    /// Compose the context from hidden state, summary and optional entity.
    pub fn compose(&self, h: &[f32], summary: &[f32], entity: Option<&[f32]>) -> Result<Vec<f32>> {
        ensure_dim("hidden state", self.hidden_dim, h.len())?;
        ensure_dim("sentence summary", self.hidden_dim, summary.len())?;
        let null;
        let entity = match entity {
            Some(e) => {
                ensure_dim("entity state", self.entity_dim, e.len())?;
                e
            }
            None => {
                null = vec![0.0; self.entity_dim];
                null.as_slice()
            }
        };
        let context = self.composition.compose(h, summary, entity)?;
        ensure_dim("context", self.hidden_dim, context.len())?;
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> EnGenConfig {
        EnGenConfig::default().with_dims(4, 3, 2)
    }

    #[test]
    fn test_concat_project_shape_and_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let composer = ContextComposer::init(&config(), &mut rng).unwrap();
        let ctx = composer
            .compose(&[0.5, -0.5, 1.0], &[0.0; 3], Some(&[2.0, -2.0][..]))
            .unwrap();
        assert_eq!(ctx.len(), 3);
        assert!(ctx.iter().all(|x| x.abs() <= 1.0));
    }

    #[test]
    fn test_compose_is_stateless() {
        let mut rng = StdRng::seed_from_u64(2);
        let composer = ContextComposer::init(
            &config().with_composition(CompositionMethod::AdditiveGate),
            &mut rng,
        )
        .unwrap();
        let a = composer.compose(&[0.1, 0.2, 0.3], &[1.0; 3], None).unwrap();
        let _ = composer
            .compose(&[9.0, 9.0, 9.0], &[5.0; 3], Some(&[1.0, 1.0][..]))
            .unwrap();
        let b = composer.compose(&[0.1, 0.2, 0.3], &[1.0; 3], None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_null_entity_equals_zero_entity() {
        let mut rng = StdRng::seed_from_u64(3);
        let composer = ContextComposer::init(&config(), &mut rng).unwrap();
        let h = [0.3, 0.1, -0.2];
        let a = composer.compose(&h, &[0.0; 3], None).unwrap();
        let b = composer.compose(&h, &[0.0; 3], Some(&[0.0, 0.0][..])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_summaries_for_each_pooling() {
        let mut rng = StdRng::seed_from_u64(4);
        let prev = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let q = [0.0, 0.0, 1.0];
        for pooling in [
            PoolingType::Attention,
            PoolingType::Mean,
            PoolingType::Last,
            PoolingType::None,
        ] {
            let composer =
                ContextComposer::init(&config().with_pooling(pooling), &mut rng).unwrap();
            let s = composer.summarize(&prev, &q).unwrap();
            let expected = match pooling {
                PoolingType::Attention | PoolingType::Mean => vec![0.5, 0.5, 0.0],
                PoolingType::Last => vec![0.0, 1.0, 0.0],
                PoolingType::None => vec![0.0; 3],
            };
            for (a, b) in s.iter().zip(&expected) {
                assert!((a - b).abs() < 1e-6, "{pooling:?}: {s:?}");
            }
            assert_eq!(composer.summarize(&[], &q).unwrap(), vec![0.0; 3]);
        }
    }

    #[test]
    fn test_compose_rejects_wrong_entity_dim() {
        let mut rng = StdRng::seed_from_u64(5);
        let composer = ContextComposer::init(&config(), &mut rng).unwrap();
        assert!(composer
            .compose(&[0.0; 3], &[0.0; 3], Some(&[0.0; 3][..]))
            .is_err());
    }
}
