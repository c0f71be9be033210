//! Models and the traits the trainer drives them through.
//!
//! Models use a type-state pattern: `Model<B, Unfitted>` implements
//! [`TrainableModel`], and `into_fitted()` turns it into `Model<B, Fitted>`, which
//! implements [`InferenceModel`] and carries inference parameters only.

use crate::backend::{Backend, BackendError, Tensor2D};
use crate::serialization::SerializableParams;
use rand::RngCore;
use thiserror::Error;

pub mod layers;
pub mod mlp;
pub mod state;

pub use layers::{Activation, DenseParams, Initializer};
pub use mlp::{DenseSnapshot, Mlp, MlpConfig, MlpParams, MlpRegressor, MlpSnapshot, MlpTrace};
pub use state::{Fitted, Unfitted};

/// Failures building or restoring a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("failed to read or write model: {0}")]
    Io(#[from] std::io::Error),
}

/// A model that can be trained with mini-batch gradient descent.
pub trait TrainableModel<B: Backend> {
    type Input;
    type Prediction;
    type Params;
    type Gradients;
    /// Intermediate values of one training forward pass, consumed by `backward`.
    type Trace;
    type Output;

    /// Forward pass in training mode (dropout active).
    fn forward_train(
        &self,
        input: &Self::Input,
        rng: &mut dyn RngCore,
    ) -> Result<(Self::Prediction, Self::Trace), BackendError>;

    /// Forward pass in inference mode (dropout off), used for validation.
    fn forward(&self, input: &Self::Input) -> Result<Self::Prediction, BackendError>;

    /// Gradients of the loss w.r.t. every parameter.
    fn backward(
        &self,
        trace: &Self::Trace,
        grad_output: &Self::Prediction,
    ) -> Result<Self::Gradients, BackendError>;

    fn params(&self) -> &Self::Params;
    fn update_params(&mut self, new_params: Self::Params);

    fn into_fitted(self) -> Self::Output;
}

/// Element-wise operations over a whole parameter set, used by optimizers.
pub trait ParamOps<B: Backend>: Clone {
    fn zeros_like(&self) -> Self;

    /// Applies `f` to each tensor of `self` paired with the same tensor of `other`.
    fn zip_map<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(&Tensor2D<B>, &Tensor2D<B>) -> Tensor2D<B>;

    /// Number of tensors in the set.
    fn num_tensors(&self) -> usize;

    /// True when every value is finite.
    fn all_finite(&self) -> bool;
}

/// A trained model that serves predictions.
pub trait InferenceModel<B: Backend> {
    type InputBatch;
    type OutputBatch;
    type ParamsRepr: SerializableParams;

    fn predict_batch(&self, input: &Self::InputBatch) -> Result<Self::OutputBatch, BackendError>;

    fn extract_params(&self) -> Self::ParamsRepr;

    fn from_params(params: Self::ParamsRepr) -> Result<Self, ModelError>
    where
        Self: Sized;

    fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ModelError> {
        let bytes = self
            .extract_params()
            .to_bytes()
            .map_err(|e| ModelError::InvalidParams(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ModelError>
    where
        Self: Sized,
    {
        let bytes = std::fs::read(path)?;
        let params = Self::ParamsRepr::from_bytes(&bytes)
            .map_err(|e| ModelError::InvalidParams(e.to_string()))?;
        Self::from_params(params)
    }
}
