//! Entity update strategies.
//!
//! An update blends an entity's current memory with the decoder hidden state
//! projected into entity space. Both strategies are learned interpolations
//! between persistence and replacement whose output stays bounded however
//! many times an entity is mentioned:
//!
//! | Rule | Gate | Blend |
//! |------|------|-------|
//! | [`GatedInterpolation`] | `g = σ(W_δ · [old; p])`, per dimension | `g ⊙ old + (1 - g) ⊙ p`, with `p = tanh(W_h h)` |
//! | [`BilinearNormalized`] | `δ = σ(pᵀ W_δ old)`, scalar | `normalize(δ old + (1 - δ) p)`, with `p = W_h h` |

use crate::config::UpdateRule;
use crate::error::{ensure_dim, Result};
use crate::math::{concat, dot, l2_norm, sigmoid, Matrix};

/// A pluggable entity update rule.
pub trait EntityUpdate: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Required shape of `W_delta` for a given entity dimension.
    fn delta_shape(&self, entity_dim: usize) -> (usize, usize);

    /// Compute the updated memory vector.
    ///
    /// `w_h` maps hidden space into entity space (`entity_dim x hidden_dim`).
    fn blend(&self, old: &[f32], h_t: &[f32], w_h: &Matrix, w_delta: &Matrix) -> Result<Vec<f32>>;
}

/// Build the strategy selected in the configuration.
#[must_use]
pub fn update_rule(rule: UpdateRule) -> Box<dyn EntityUpdate> {
    match rule {
        UpdateRule::GatedInterpolation => Box::new(GatedInterpolation),
        UpdateRule::BilinearNormalized => Box::new(BilinearNormalized),
    }
}

fn check_projection(old: &[f32], h_t: &[f32], w_h: &Matrix) -> Result<()> {
    w_h.ensure_shape("W_h", old.len(), h_t.len())
}

/// Per-dimension sigmoid gate over the old state and the projected hidden state.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatedInterpolation;

impl EntityUpdate for GatedInterpolation {
    fn name(&self) -> &'static str {
        "gated_interpolation"
    }

    fn delta_shape(&self, entity_dim: usize) -> (usize, usize) {
        (entity_dim, 2 * entity_dim)
    }

    fn blend(&self, old: &[f32], h_t: &[f32], w_h: &Matrix, w_delta: &Matrix) -> Result<Vec<f32>> {
        check_projection(old, h_t, w_h)?;
        let (rows, cols) = self.delta_shape(old.len());
        w_delta.ensure_shape("W_delta", rows, cols)?;

        let projected: Vec<f32> = w_h.matvec(h_t)?.into_iter().map(f32::tanh).collect();
        let gate = w_delta.matvec(&concat(&[old, &projected]))?;

        Ok(old
            .iter()
            .zip(&projected)
            .zip(gate)
            .map(|((&o, &p), g)| {
                let g = sigmoid(g);
                g * o + (1.0 - g) * p
            })
            .collect())
    }
}

/// Scalar bilinear gate followed by rescaling to unit length.
#[derive(Debug, Clone, Copy, Default)]
pub struct BilinearNormalized;

impl EntityUpdate for BilinearNormalized {
    fn name(&self) -> &'static str {
        "bilinear_normalized"
    }

    fn delta_shape(&self, entity_dim: usize) -> (usize, usize) {
        (entity_dim, entity_dim)
    }

    fn blend(&self, old: &[f32], h_t: &[f32], w_h: &Matrix, w_delta: &Matrix) -> Result<Vec<f32>> {
        check_projection(old, h_t, w_h)?;
        let (rows, cols) = self.delta_shape(old.len());
        w_delta.ensure_shape("W_delta", rows, cols)?;

        let projected = w_h.matvec(h_t)?;
        let delta_old = w_delta.matvec(old)?;
        ensure_dim("bilinear gate", projected.len(), delta_old.len())?;
        let gate = sigmoid(dot(&projected, &delta_old));

        let mixed: Vec<f32> = old
            .iter()
            .zip(&projected)
            .map(|(&o, &p)| gate * o + (1.0 - gate) * p)
            .collect();
        let norm = l2_norm(&mixed);
        if norm > f32::EPSILON && norm.is_finite() {
            Ok(mixed.into_iter().map(|x| x / norm).collect())
        } else {
            Ok(mixed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w_h(entity_dim: usize, hidden_dim: usize, v: f32) -> Matrix {
        Matrix::from_vec(entity_dim, hidden_dim, vec![v; entity_dim * hidden_dim]).unwrap()
    }

    #[test]
    fn test_gated_zero_gate_logits_is_midpoint() {
        let rule = GatedInterpolation;
        let old = vec![1.0, -1.0];
        let h = vec![0.0, 0.0, 0.0];
        let out = rule
            .blend(&old, &h, &w_h(2, 3, 0.5), &Matrix::zeros(2, 4))
            .unwrap();
        // projected = tanh(0) = 0, gate = 0.5
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_gated_stays_bounded_over_many_updates() {
        let rule = GatedInterpolation;
        let mut state = vec![0.3, -0.2, 0.9];
        let h = vec![50.0, -80.0, 120.0, 7.0];
        let wh = w_h(3, 4, 1.0);
        let wd = Matrix::from_vec(3, 6, vec![0.1; 18]).unwrap();
        for _ in 0..500 {
            state = rule.blend(&state, &h, &wh, &wd).unwrap();
        }
        assert!(state.iter().all(|x| x.is_finite() && x.abs() <= 1.0 + 1e-5));
    }

    #[test]
    fn test_gated_rejects_bad_shapes() {
        let rule = GatedInterpolation;
        let old = vec![0.0; 2];
        let h = vec![0.0; 3];
        assert!(rule
            .blend(&old, &h, &w_h(2, 4, 0.0), &Matrix::zeros(2, 4))
            .is_err());
        assert!(rule
            .blend(&old, &h, &w_h(2, 3, 0.0), &Matrix::zeros(2, 2))
            .is_err());
    }

    #[test]
    fn test_bilinear_output_is_unit_norm() {
        let rule = BilinearNormalized;
        let old = vec![3.0, 4.0];
        let h = vec![1.0, 2.0];
        let out = rule
            .blend(&old, &h, &w_h(2, 2, 0.7), &Matrix::identity(2))
            .unwrap();
        assert!((l2_norm(&out) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rule_factory() {
        assert_eq!(update_rule(UpdateRule::GatedInterpolation).name(), "gated_interpolation");
        assert_eq!(
            update_rule(UpdateRule::BilinearNormalized).delta_shape(5),
            (5, 5)
        );
    }
}
