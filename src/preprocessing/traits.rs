//! Core traits for preprocessing transformers.
//!
//! This module defines the two central traits:
//! - [`Transformer`]: Used during fitting; has hyperparameters and learns from data.
//! - [`FittedTransformer`]: After fitting; immutable, ready for inference and serialization.
//!
//! Fitted transformers hold plain parameters rather than tensors, so keeping one
//! around (for example inside a trained session) never pins a numeric buffer.

use crate::preprocessing::error::PipelineError;
use crate::serialization::SerializableParams;

/// Trait for unfitted transformers with hyperparameters.
///
/// # Example
/// ```rust
/// use ev_range::preprocessing::{FittedTransformer, StandardScaler, Transformer};
///
/// let data = vec![vec![1.0], vec![3.0]];
/// let fitted = StandardScaler::new().fit(&data[..]).unwrap();
///
/// let mut out = Vec::new();
/// fitted.transform_row(&[3.0][..], &mut out).unwrap();
/// assert_eq!(out, vec![1.0]);
/// ```
pub trait Transformer: Clone {
    /// Training data the transformer learns from.
    type Input: ?Sized;
    /// The fitted transformer type ready for inference.
    type Fitted: FittedTransformer;

    /// Learns parameters (e.g. mean and std for `StandardScaler`) from the data.
    ///
    /// # Errors
    /// Returns [`PipelineError`] if the data is empty or unusable.
    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted, PipelineError>;
}

/// Trait for fitted transformers ready for inference.
///
/// # Guarantees
/// - `transform_row` is deterministic: the same row always yields bit-identical output.
/// - `extract_params()` + `from_params()` is a round-trip.
pub trait FittedTransformer: Clone {
    /// One input row.
    type Row: ?Sized;
    /// Serializable representation of learned parameters.
    type Params: SerializableParams;

    /// Appends the transformed row to `out`.
    ///
    /// # Errors
    /// Returns [`PipelineError::Shape`] if the row width differs from the fitted width.
    fn transform_row(&self, row: &Self::Row, out: &mut Vec<f64>) -> Result<(), PipelineError>;

    /// Number of input columns seen during fit.
    fn n_features_in(&self) -> usize;

    /// Number of values appended per row.
    fn n_features_out(&self) -> usize;

    /// Extract learned parameters as a serializable representation.
    fn extract_params(&self) -> Self::Params;

    /// Reconstruct a fitted transformer from parameters.
    fn from_params(params: Self::Params) -> Result<Self, PipelineError>
    where
        Self: Sized;
}
