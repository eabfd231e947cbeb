//! Candle-backed recurrent cell.
//!
//! Wraps `candle_nn`'s LSTM so the decoder can run on any candle device while
//! the entity memory keeps working on plain vectors.

use super::{CellState, RecurrentCell};
use crate::error::{ensure_dim, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::rnn::{lstm, LSTMConfig, LSTMState, LSTM, RNN};
use candle_nn::{VarBuilder, VarMap};

/// An LSTM cell evaluated with candle.
pub struct CandleLstm {
    lstm: LSTM,
    device: Device,
    input_dim: usize,
    hidden_dim: usize,
    // Keeps freshly initialised variables alive.
    _varmap: Option<VarMap>,
}

impl CandleLstm {
    /// Build from a var builder holding pretrained weights.
    pub fn from_var_builder(
        input_dim: usize,
        hidden_dim: usize,
        vb: VarBuilder,
        device: Device,
    ) -> Result<Self> {
        let lstm = lstm(input_dim, hidden_dim, LSTMConfig::default(), vb)?;
        Ok(Self {
            lstm,
            device,
            input_dim,
            hidden_dim,
            _varmap: None,
        })
    }

    /// Freshly initialised cell on the CPU.
    pub fn new_cpu(input_dim: usize, hidden_dim: usize) -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let lstm = lstm(input_dim, hidden_dim, LSTMConfig::default(), vb.pp("lstm"))?;
        Ok(Self {
            lstm,
            device,
            input_dim,
            hidden_dim,
            _varmap: Some(varmap),
        })
    }

    fn row(&self, v: &[f32]) -> Result<Tensor> {
        Ok(Tensor::from_slice(v, (1, v.len()), &self.device)?)
    }

    fn to_vec(t: &Tensor) -> Result<Vec<f32>> {
        Ok(t.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
    }
}

impl RecurrentCell for CandleLstm {
    fn name(&self) -> &'static str {
        "candle_lstm"
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

        let prev = LSTMState::new(self.row(&state.hidden)?, self.row(&state.memory)?);
        let next = self.lstm.step(&self.row(input)?, &prev)?;
        Ok(CellState {
            hidden: Self::to_vec(next.h())?,
            memory: Self::to_vec(next.c())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candle_step_shapes() {
        let cell = CandleLstm::new_cpu(3, 4).unwrap();
        let next = cell.step(&[0.1, 0.2, 0.3], &cell.initial_state()).unwrap();
        assert_eq!(next.hidden.len(), 4);
        assert_eq!(next.memory.len(), 4);
        assert!(next.hidden.iter().all(|h| h.is_finite() && h.abs() <= 1.0));
    }
}
