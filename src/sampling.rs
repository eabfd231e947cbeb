//! Choosing among predicted outcomes during generation.
//!
//! Every generation decision (type, label, mention length, token) goes
//! through the same [`Sampler`], so a single seed reproduces a whole run.

use crate::error::{Error, Result};
use crate::math::{argmax, softmax};
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};

/// How to turn scores into a choice.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SamplingStrategy {
    /// Always the highest-scoring outcome (first on ties).
    #[default]
    Greedy,
    /// Sample from `softmax(logits / temperature)`.
    Temperature {
        /// Must be positive; below 1 sharpens, above 1 flattens.
        temperature: f32,
    },
}

impl SamplingStrategy {
    /// Reject non-positive or non-finite temperatures.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Temperature { temperature } if !(temperature.is_finite() && temperature > 0.0) => {
                Err(Error::config(format!(
                    "temperature must be positive and finite, got {temperature}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// A strategy plus its random source.
#[derive(Debug, Clone)]
pub struct Sampler {
    strategy: SamplingStrategy,
    rng: StdRng,
}

impl Sampler {
    /// Seeded sampler.
    pub fn new(strategy: SamplingStrategy, seed: u64) -> Result<Self> {
        strategy.validate()?;
        Ok(Self {
            strategy,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Greedy sampler; never touches the random source.
    #[must_use]
    pub fn greedy() -> Self {
        Self {
            strategy: SamplingStrategy::Greedy,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// Pick an index from unnormalised scores.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty score vector, or one whose softmax has no
    /// positive finite weight.
    pub fn pick(&mut self, logits: &[f32]) -> Result<usize> {
        if logits.is_empty() {
            return Err(Error::invalid_input("cannot sample from an empty distribution"));
        }
        match self.strategy {
            SamplingStrategy::Greedy => {
                argmax(logits).ok_or_else(|| Error::invalid_input("no finite score to choose"))
            }
            SamplingStrategy::Temperature { temperature } => {
                let scaled: Vec<f32> = logits.iter().map(|l| l / temperature).collect();
                let probs = softmax(&scaled);
                let dist = WeightedIndex::new(&probs)
                    .map_err(|e| Error::invalid_input(format!("cannot sample: {e}")))?;
                Ok(dist.sample(&mut self.rng))
            }
        }
    }
}
