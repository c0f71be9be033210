//! Standard Scaler (Z-score normalization).
//!
//! Transforms features by removing the mean and scaling to unit variance.
//!
//! The standard score of a sample `x` is calculated as:
//! ```text
//! z = (x - u) / s
//! ```
//! where `u` is the mean of the fitting samples and `s` the population standard
//! deviation (ddof = 0). A constant column has `s = 0`, which is replaced by 1, and
//! its mean is the column value itself, so every value of that column maps to 0.
//!
//! Statistics are computed in `f64` on the same values later passed to
//! [`FittedTransformer::transform_row`].

use crate::preprocessing::error::PipelineError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use serde::{Deserialize, Serialize};

/// Serializable parameters for a fitted StandardScaler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScalerParams {
    /// Mean of each feature.
    pub mean: Vec<f64>,
    /// Standard deviation of each feature, zeros already replaced by 1.
    pub std: Vec<f64>,
}

/// StandardScaler transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct StandardScaler;

impl StandardScaler {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for StandardScaler {
    /// Rows of equal width.
    type Input = [Vec<f64>];
    type Fitted = FittedStandardScaler;

    fn fit(&self, rows: &Self::Input) -> Result<Self::Fitted, PipelineError> {
        let first = rows.first().ok_or(PipelineError::EmptyDataset)?;
        let width = first.len();
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(PipelineError::Shape {
                expected: width,
                got: r.len(),
                row,
            });
        }

        let n = rows.len() as f64;
        let mut mean = Vec::with_capacity(width);
        let mut std = Vec::with_capacity(width);
        for col in 0..width {
            let head = first[col];
            // Constant features
            if rows.iter().all(|r| r[col] == head) {
                mean.push(head);
                std.push(1.0);
                continue;
            }
            let m = rows.iter().map(|r| r[col]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[col] - m).powi(2)).sum::<f64>() / n;
            let s = var.sqrt();
            mean.push(m);
            std.push(if s == 0.0 { 1.0 } else { s });
        }

        Ok(FittedStandardScaler { mean, std })
    }
}

/// Fitted StandardScaler: per-feature (mean, std).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedStandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl FittedStandardScaler {
    /// Mean of each feature.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Standard deviation of each feature (never zero).
    pub fn std(&self) -> &[f64] {
        &self.std
    }

    fn check_width(&self, got: usize) -> Result<(), PipelineError> {
        if got != self.mean.len() {
            return Err(PipelineError::Shape {
                expected: self.mean.len(),
                got,
                row: 0,
            });
        }
        Ok(())
    }
}

impl FittedTransformer for FittedStandardScaler {
    type Row = [f64];
    type Params = StandardScalerParams;

    fn transform_row(&self, row: &[f64], out: &mut Vec<f64>) -> Result<(), PipelineError> {
        self.check_width(row.len())?;
        out.extend(
            row.iter()
                .zip(self.mean.iter().zip(&self.std))
                .map(|(&x, (&m, &s))| (x - m) / s),
        );
        Ok(())
    }

    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn n_features_out(&self) -> usize {
        self.mean.len()
    }

    fn extract_params(&self) -> Self::Params {
        StandardScalerParams {
            mean: self.mean.clone(),
            std: self.std.clone(),
        }
    }

    fn from_params(params: Self::Params) -> Result<Self, PipelineError> {
        if params.mean.len() != params.std.len() {
            return Err(PipelineError::Shape {
                expected: params.mean.len(),
                got: params.std.len(),
                row: 0,
            });
        }
        if params.std.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(PipelineError::Serialization(
                "standard deviation must be finite and non-zero".to_string(),
            ));
        }
        Ok(Self {
            mean: params.mean,
            std: params.std,
        })
    }
}
