//! A plain-Rust LSTM cell.
//!
//! ```text
//! [i; f; g; o] = W · [x; h_{t-1}] + b
//! c_t = σ(f) ⊙ c_{t-1} + σ(i) ⊙ tanh(g)
//! h_t = σ(o) ⊙ tanh(c_t)
//! ```

use super::{CellState, RecurrentCell};
use crate::config::Initializer;
use crate::error::{ensure_dim, Result};
use crate::math::{concat, sigmoid, Matrix};
use rand::Rng;

/// Single-layer LSTM.
#[derive(Debug, Clone)]
pub struct LstmCell {
    input_dim: usize,
    hidden_dim: usize,
    /// `4h x (input + h)`, gate blocks in `i, f, g, o` order.
    w: Matrix,
    b: Vec<f32>,
}

impl LstmCell {
    /// Build from weights.
    pub fn new(input_dim: usize, hidden_dim: usize, w: Matrix, b: Vec<f32>) -> Result<Self> {
        w.ensure_shape("LSTM W", 4 * hidden_dim, input_dim + hidden_dim)?;
        ensure_dim("LSTM bias", 4 * hidden_dim, b.len())?;
        Ok(Self {
            input_dim,
            hidden_dim,
            w,
            b,
        })
    }

    /// Randomly initialised cell. The forget-gate bias starts at 1.
    pub fn init<R: Rng + ?Sized>(
        input_dim: usize,
        hidden_dim: usize,
        initializer: Initializer,
        rng: &mut R,
    ) -> Self {
        let w = Matrix::init(4 * hidden_dim, input_dim + hidden_dim, initializer, rng);
        let mut b = vec![0.0; 4 * hidden_dim];
        b[hidden_dim..2 * hidden_dim].fill(1.0);
        Self {
            input_dim,
            hidden_dim,
            w,
            b,
        }
    }
}

impl RecurrentCell for LstmCell {
    fn name(&self) -> &'static str {
        "lstm"
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    fn initial_state(&self) -> CellState {
        CellState::zeros(self.hidden_dim, self.hidden_dim)
    }

    fn step(&self, input: &[f32], state: &CellState) -> Result<CellState> {
        ensure_dim("LSTM input", self.input_dim, input.len())?;
        ensure_dim("LSTM hidden", self.hidden_dim, state.hidden.len())?;
        ensure_dim("LSTM memory", self.hidden_dim, state.memory.len())?;

        let gates = self.w.matvec(&concat(&[input, &state.hidden]))?;
        let n = self.hidden_dim;
        let mut hidden = Vec::with_capacity(n);
        let mut memory = Vec::with_capacity(n);
        for k in 0..n {
            let i = sigmoid(gates[k] + self.b[k]);
            let f = sigmoid(gates[n + k] + self.b[n + k]);
            let g = (gates[2 * n + k] + self.b[2 * n + k]).tanh();
            let o = sigmoid(gates[3 * n + k] + self.b[3 * n + k]);
            let c = f * state.memory[k] + i * g;
            memory.push(c);
            hidden.push(o * c.tanh());
        }
        Ok(CellState { hidden, memory })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_weights() {
        // σ(0) = 0.5, tanh(0) = 0, forget bias 0: c = 0, h = 0.
        let cell = LstmCell::new(2, 3, Matrix::zeros(12, 5), vec![0.0; 12]).unwrap();
        let next = cell.step(&[1.0, -1.0], &cell.initial_state()).unwrap();
        assert_eq!(next.hidden, vec![0.0; 3]);
        assert_eq!(next.memory, vec![0.0; 3]);
    }

    #[test]
    fn test_hidden_is_bounded() {
        let mut rng = StdRng::seed_from_u64(11);
        let cell = LstmCell::init(4, 6, Initializer::Uniform { scale: 2.0 }, &mut rng);
        let mut state = cell.initial_state();
        for t in 0..50 {
            let x = vec![t as f32; 4];
            state = cell.step(&x, &state).unwrap();
            assert!(state.hidden.iter().all(|h| h.abs() <= 1.0));
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let cell = LstmCell::new(2, 3, Matrix::zeros(12, 5), vec![0.0; 12]).unwrap();
        assert!(cell.step(&[1.0], &cell.initial_state()).is_err());
        assert!(LstmCell::new(2, 3, Matrix::zeros(12, 4), vec![0.0; 12]).is_err());
    }
}
