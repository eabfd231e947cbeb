//! Dense token embedding table.

use super::TokenEmbedding;
use crate::config::Initializer;
use crate::error::{Error, Result};
use crate::math::Matrix;
use crate::types::TokenId;
use rand::Rng;

/// A `vocab_size x dim` lookup table.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    table: Matrix,
}

impl EmbeddingTable {
    /// Wrap an existing table (one row per token).
    #[must_use]
    pub fn new(table: Matrix) -> Self {
        Self { table }
    }

    /// Randomly initialised table.
    pub fn init<R: Rng + ?Sized>(
        vocab_size: usize,
        dim: usize,
        initializer: Initializer,
        rng: &mut R,
    ) -> Self {
        Self::new(Matrix::init(vocab_size, dim, initializer, rng))
    }
}

impl TokenEmbedding for EmbeddingTable {
    fn dim(&self) -> usize {
        self.table.cols()
    }

    fn vocab_size(&self) -> usize {
        self.table.rows()
    }

    fn embed(&self, token: TokenId) -> Result<Vec<f32>> {
        if token >= self.table.rows() {
            return Err(Error::invalid_input(format!(
                "token {token} outside vocabulary of {}",
                self.table.rows()
            )));
        }
        Ok(self.table.row(token).to_vec())
    }
}
