//! Model configuration.
//!
//! [`EnGenConfig`] carries every hyperparameter of the model: dimensions,
//! the entity type set, and the pluggable strategies (pooling, composition,
//! entity update, attention score, distance feature, initializer).
//!
//! # Example
//!
//! ```rust
//! use engen::{CompositionMethod, EnGenConfig};
//!
//! let config = EnGenConfig::default()
//!     .with_dims(16, 32, 8)
//!     .with_composition(CompositionMethod::AdditiveGate);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use crate::types::TokenId;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the previous sentence's hidden states are pooled into one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PoolingType {
    /// Attention over previous-sentence states with the current state as query.
    #[default]
    Attention,
    /// Unweighted mean of previous-sentence states.
    Mean,
    /// The previous sentence's final hidden state.
    Last,
    /// No previous-sentence signal (zero vector).
    None,
}

/// How hidden state, sentence summary and entity vector become a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMethod {
    /// `tanh(W_c · [h; s; e] + b_c)`.
    #[default]
    ConcatProject,
    /// `h + g_s ⊙ (P_s · s) + g_e ⊙ (P_e · e)` with sigmoid gates computed from `h`.
    AdditiveGate,
}

/// Gated blending rule used when an entity is updated from a hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// Per-dimension gate `σ(W_δ · [old; W_h h])`, convex blend of old and projected.
    #[default]
    GatedInterpolation,
    /// Scalar gate `σ((W_h h)ᵀ W_δ old)`, convex blend, then unit-norm rescaling.
    BilinearNormalized,
}

/// Compatibility function between the query and previous-sentence states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttentionScore {
    /// `q · k / sqrt(d)`.
    #[default]
    ScaledDot,
    /// `qᵀ W_a k` with a learned matrix.
    Bilinear,
}

/// Shape of the recency feature computed from a sentence gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFeature {
    /// `ln(1 + gap)`.
    #[default]
    Log,
    /// The raw gap, as a float.
    Linear,
    /// Bucket index: 0, 1, 2, 3, 4, 5-7, 8-15, 16-31, 32+.
    Bucketed,
}

/// Parameter initialisation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Initializer {
    /// Uniform in `[-scale, scale]`.
    Uniform {
        /// Half-width of the interval.
        scale: f32,
    },
    /// Zero-mean normal with the given standard deviation.
    Normal {
        /// Standard deviation.
        std: f32,
    },
    /// Glorot/Xavier uniform: `±sqrt(6 / (fan_in + fan_out))`.
    Xavier,
}

impl Default for Initializer {
    fn default() -> Self {
        Initializer::Uniform { scale: 0.1 }
    }
}

impl Initializer {
    /// Draw one parameter for a `rows x cols` matrix.
    pub fn sample<R: Rng + ?Sized>(&self, rows: usize, cols: usize, rng: &mut R) -> f32 {
        match *self {
            Initializer::Uniform { scale } => {
                if scale <= 0.0 {
                    0.0
                } else {
                    rng.gen_range(-scale..=scale)
                }
            }
            Initializer::Normal { std } => {
                Normal::new(0.0, std).map_or(0.0, |normal| normal.sample(rng))
            }
            Initializer::Xavier => {
                let fan = (rows + cols).max(1) as f32;
                let limit = (6.0 / fan).sqrt();
                rng.gen_range(-limit..=limit)
            }
        }
    }
}

/// Configuration for an [`EnGen`](crate::EnGen) model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnGenConfig {
    /// Vocabulary size (token ids are `0..vocab_size`).
    pub vocab_size: usize,
    /// Token embedding dimension.
    pub embedding_dim: usize,
    /// Recurrent hidden state dimension.
    pub hidden_dim: usize,
    /// Entity state dimension.
    pub entity_dim: usize,
    /// Number of entity types. Type 0 is the non-entity type.
    pub types_num: usize,
    /// Longest mention span, in tokens.
    pub max_mention_length: usize,
    /// Previous-sentence pooling.
    pub pooling_type: PoolingType,
    /// Context composition.
    pub composition_method: CompositionMethod,
    /// Entity update rule.
    pub update_rule: UpdateRule,
    /// Attention compatibility function.
    pub attention_score: AttentionScore,
    /// Recency feature shape.
    pub distance_feature: DistanceFeature,
    /// Parameter initialisation.
    pub initializer: Initializer,
    /// Seed for initialisation and sampling.
    pub seed: u64,
    /// Token that ends a generated sequence.
    pub end_of_sequence_token: TokenId,
    /// Token that ends a sentence during generation, if any.
    pub sentence_end_token: Option<TokenId>,
    /// Default hard cap on generated tokens.
    pub max_steps: usize,
}

impl Default for EnGenConfig {
    fn default() -> Self {
        Self {
            vocab_size: 1000,
            embedding_dim: 64,
            hidden_dim: 128,
            entity_dim: 64,
            types_num: 2,
            max_mention_length: 25,
            pooling_type: PoolingType::default(),
            composition_method: CompositionMethod::default(),
            update_rule: UpdateRule::default(),
            attention_score: AttentionScore::default(),
            distance_feature: DistanceFeature::default(),
            initializer: Initializer::default(),
            seed: 42,
            end_of_sequence_token: 0,
            sentence_end_token: None,
            max_steps: 200,
        }
    }
}

impl EnGenConfig {
    /// Set embedding, hidden and entity dimensions.
    #[must_use]
    pub fn with_dims(mut self, embedding_dim: usize, hidden_dim: usize, entity_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self.hidden_dim = hidden_dim;
        self.entity_dim = entity_dim;
        self
    }

    /// Set the vocabulary size.
    #[must_use]
    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = vocab_size;
        self
    }

    /// Set the number of entity types.
    #[must_use]
    pub fn with_types_num(mut self, types_num: usize) -> Self {
        self.types_num = types_num;
        self
    }

    /// Set the maximum mention length.
    #[must_use]
    pub fn with_max_mention_length(mut self, max_mention_length: usize) -> Self {
        self.max_mention_length = max_mention_length;
        self
    }

    /// Set the pooling type.
    #[must_use]
    pub fn with_pooling(mut self, pooling_type: PoolingType) -> Self {
        self.pooling_type = pooling_type;
        self
    }

    /// Set the composition method.
    #[must_use]
    pub fn with_composition(mut self, composition_method: CompositionMethod) -> Self {
        self.composition_method = composition_method;
        self
    }

    /// Set the entity update rule.
    #[must_use]
    pub fn with_update_rule(mut self, update_rule: UpdateRule) -> Self {
        self.update_rule = update_rule;
        self
    }

    /// Set the attention score function.
    #[must_use]
    pub fn with_attention_score(mut self, attention_score: AttentionScore) -> Self {
        self.attention_score = attention_score;
        self
    }

    /// Set the distance feature shape.
    #[must_use]
    pub fn with_distance_feature(mut self, distance_feature: DistanceFeature) -> Self {
        self.distance_feature = distance_feature;
        self
    }

    /// Set the initializer.
    #[must_use]
    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the end-of-sequence and sentence-end tokens.
    #[must_use]
    pub fn with_special_tokens(mut self, eos: TokenId, sentence_end: Option<TokenId>) -> Self {
        self.end_of_sequence_token = eos;
        self.sentence_end_token = sentence_end;
        self
    }

    /// Set the default generation cap.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Dimension of the composed context vector.
    #[must_use]
    pub fn context_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// `Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(Error::config("vocab_size must be positive"));
        }
        if self.embedding_dim == 0 || self.hidden_dim == 0 || self.entity_dim == 0 {
            return Err(Error::config(format!(
                "dimensions must be positive (embedding_dim={}, hidden_dim={}, entity_dim={})",
                self.embedding_dim, self.hidden_dim, self.entity_dim
            )));
        }
        if self.types_num < 2 {
            return Err(Error::config(format!(
                "types_num must be at least 2 (non-entity plus one entity type), got {}",
                self.types_num
            )));
        }
        if self.max_mention_length == 0 {
            return Err(Error::config("max_mention_length must be at least 1"));
        }
        if self.end_of_sequence_token >= self.vocab_size {
            return Err(Error::config(format!(
                "end_of_sequence_token {} outside vocabulary of {}",
                self.end_of_sequence_token, self.vocab_size
            )));
        }
        if let Some(tok) = self.sentence_end_token {
            if tok >= self.vocab_size {
                return Err(Error::config(format!(
                    "sentence_end_token {} outside vocabulary of {}",
                    tok, self.vocab_size
                )));
            }
        }
        match self.initializer {
            Initializer::Uniform { scale } if !scale.is_finite() || scale < 0.0 => {
                return Err(Error::config(format!("invalid uniform scale {scale}")));
            }
            Initializer::Normal { std } if !std.is_finite() || std < 0.0 => {
                return Err(Error::config(format!("invalid normal std {std}")));
            }
            _ => {}
        }
        Ok(())
    }

    /// Parse a TOML configuration.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s).map_err(|e| Error::parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. `.json` files are read as JSON, anything
    /// else as TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        }
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_is_valid() {
        assert!(EnGenConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_single_type() {
        let err = EnGenConfig::default().with_types_num(1).validate();
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_eos_outside_vocab() {
        let config = EnGenConfig::default()
            .with_vocab_size(10)
            .with_special_tokens(10, None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_strategies() {
        let config = EnGenConfig::default()
            .with_pooling(PoolingType::Mean)
            .with_update_rule(UpdateRule::BilinearNormalized)
            .with_initializer(Initializer::Normal { std: 0.05 })
            .with_special_tokens(1, Some(2));
        let text = config.to_toml_string().unwrap();
        let parsed = EnGenConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            EnGenConfig::from_json_str(r#"{"hidden_dim": 8, "pooling_type": "last"}"#).unwrap();
        assert_eq!(config.hidden_dim, 8);
        assert_eq!(config.pooling_type, PoolingType::Last);
        assert_eq!(config.entity_dim, EnGenConfig::default().entity_dim);
    }

    #[test]
    fn test_initializer_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let u = Initializer::Uniform { scale: 0.2 }.sample(3, 3, &mut rng);
            assert!((-0.2..=0.2).contains(&u));
            let x = Initializer::Xavier.sample(3, 3, &mut rng);
            assert!(x.abs() <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_normal_initializer_moments() {
        let mut rng = StdRng::seed_from_u64(11);
        let init = Initializer::Normal { std: 0.5 };
        let draws: Vec<f32> = (0..4000).map(|_| init.sample(4, 4, &mut rng)).collect();
        let mean = draws.iter().sum::<f32>() / draws.len() as f32;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / draws.len() as f32;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.05, "std {}", var.sqrt());
        assert_eq!(Initializer::Normal { std: 0.0 }.sample(1, 1, &mut rng), 0.0);
    }
}
