//! Dense vector and matrix helpers over `f32` slices.
//!
//! The core never depends on a tensor library: every state vector is a plain
//! `Vec<f32>` and every learned projection is a row-major [`Matrix`].

use crate::config::Initializer;
use crate::error::{ensure_dim, Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A row-major dense matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// All-zero matrix.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build from row-major data.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        ensure_dim("matrix data", rows * cols, data.len())?;
        Ok(Self { rows, cols, data })
    }

    /// Build from a list of equally sized rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            ensure_dim(&format!("matrix row {i}"), cols, row.len())?;
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Randomly initialised matrix.
    pub fn init<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        initializer: Initializer,
        rng: &mut R,
    ) -> Self {
        let data = (0..rows * cols)
            .map(|_| initializer.sample(rows, cols, rng))
            .collect();
        Self { rows, cols, data }
    }

    /// Identity matrix.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Number of rows (output dimension of [`Matrix::matvec`]).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (input dimension of [`Matrix::matvec`]).
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// `self · x`.
    pub fn matvec(&self, x: &[f32]) -> Result<Vec<f32>> {
        ensure_dim("matvec input", self.cols, x.len())?;
        if self.cols == 0 {
            return Ok(vec![0.0; self.rows]);
        }
        Ok(self
            .data
            .chunks_exact(self.cols)
            .map(|row| dot(row, x))
            .collect())
    }

    /// `xᵀ · self · y`, a bilinear form.
    pub fn bilinear(&self, x: &[f32], y: &[f32]) -> Result<f32> {
        ensure_dim("bilinear left operand", self.rows, x.len())?;
        let my = self.matvec(y)?;
        Ok(dot(x, &my))
    }

    /// Check the matrix shape.
    pub fn ensure_shape(&self, what: &str, rows: usize, cols: usize) -> Result<()> {
        if self.rows == rows && self.cols == cols {
            Ok(())
        } else {
            Err(Error::dimension_mismatch(
                format!("{what} ({rows}x{cols}, got {}x{})", self.rows, self.cols),
                rows * cols,
                self.rows * self.cols,
            ))
        }
    }
}

/// Dot product over the common prefix of `a` and `b`.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
#[must_use]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Logistic sigmoid.
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Concatenate slices.
#[must_use]
pub fn concat(parts: &[&[f32]]) -> Vec<f32> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for p in parts {
        out.extend_from_slice(p);
    }
    out
}

/// Numerically stable softmax.
///
/// Non-finite logits are treated as impossible outcomes. If nothing finite
/// remains the result is uniform. Empty input gives an empty output.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        log::warn!("[math] softmax over {} non-finite logits, using uniform", logits.len());
        return vec![1.0 / logits.len() as f32; logits.len()];
    }
    let exps: Vec<f32> = logits
        .iter()
        .map(|&x| if x.is_finite() { (x - max).exp() } else { 0.0 })
        .collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value (first one on ties). `None` for empty input.
#[must_use]
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
