//! Attention pooling over the previous sentence.

use crate::config::AttentionScore;
use crate::error::{ensure_dim, Result};
use crate::math::{dot, softmax, Matrix};

/// Pools a sequence of hidden states into one vector, weighted by their
/// compatibility with a query state.
#[derive(Debug, Clone)]
pub struct AttentionEncoder {
    score: AttentionScore,
    dim: usize,
    w_a: Option<Matrix>,
}

impl AttentionEncoder {
    /// Scaled dot-product attention over `dim`-sized states.
    #[must_use]
    pub fn scaled_dot(dim: usize) -> Self {
        Self {
            score: AttentionScore::ScaledDot,
            dim,
            w_a: None,
        }
    }

    /// Bilinear attention `qᵀ W_a k`.
    pub fn bilinear(w_a: Matrix) -> Result<Self> {
        let dim = w_a.rows();
        w_a.ensure_shape("W_a", dim, dim)?;
        Ok(Self {
            score: AttentionScore::Bilinear,
            dim,
            w_a: Some(w_a),
        })
    }

    /// Which compatibility function is in use.
    #[must_use]
    pub const fn score_kind(&self) -> AttentionScore {
        self.score
    }

    /// State dimension.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    fn score(&self, query: &[f32], key: &[f32]) -> Result<f32> {
        match &self.w_a {
            Some(w_a) => w_a.bilinear(query, key),
            None => Ok(dot(query, key) / (self.dim.max(1) as f32).sqrt()),
        }
    }

    /// Normalised attention weights of `query` over `states`.
    ///
    /// Empty for an empty sequence.
    pub fn weights(&self, states: &[Vec<f32>], query: &[f32]) -> Result<Vec<f32>> {
        ensure_dim("attention query", self.dim, query.len())?;
        let mut scores = Vec::with_capacity(states.len());
        for (i, s) in states.iter().enumerate() {
            ensure_dim(&format!("attention state {i}"), self.dim, s.len())?;
            scores.push(self.score(query, s)?);
        }
        Ok(softmax(&scores))
    }

    /// Attention-weighted sum of `states`.
    ///
    /// An empty sequence (the first sentence of a document) yields the zero
    /// vector.
    pub fn encode(&self, states: &[Vec<f32>], query: &[f32]) -> Result<Vec<f32>> {
        let weights = self.weights(states, query)?;
        let mut pooled = vec![0.0; self.dim];
        for (w, s) in weights.iter().zip(states) {
            for (p, x) in pooled.iter_mut().zip(s) {
                *p += w * x;
            }
        }
        Ok(pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sequence_is_zero() {
        let enc = AttentionEncoder::scaled_dot(3);
        assert_eq!(enc.encode(&[], &[1.0, 2.0, 3.0]).unwrap(), vec![0.0; 3]);
    }

    #[test]
    fn test_single_state_returns_it() {
        let enc = AttentionEncoder::scaled_dot(2);
        let out = enc.encode(&[vec![0.4, -0.7]], &[9.0, 9.0]).unwrap();
        assert!((out[0] - 0.4).abs() < 1e-6 && (out[1] + 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_weights_prefer_aligned_state() {
        let enc = AttentionEncoder::scaled_dot(2);
        let w = enc
            .weights(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[5.0, 0.0])
            .unwrap();
        assert!(w[0] > w[1]);
        assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_matches_dot_with_identity() {
        let enc = AttentionEncoder::bilinear(Matrix::identity(2)).unwrap();
        let w = enc
            .weights(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[2.0, 0.0])
            .unwrap();
        let expected = softmax(&[2.0, 0.0]);
        assert!((w[0] - expected[0]).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_checks() {
        let enc = AttentionEncoder::scaled_dot(2);
        assert!(enc.encode(&[vec![1.0]], &[0.0, 0.0]).is_err());
        assert!(enc.encode(&[], &[0.0]).is_err());
        assert!(AttentionEncoder::bilinear(Matrix::zeros(2, 3)).is_err());
    }
}
