//! Sequential multi-layer perceptron for scalar regression.
//!
//! Architecture for `hidden_units = [h1, h2, ...]` and matching `dropout` rates:
//!
//! ```text
//! x ─ Dense(h1, ReLU, He-normal) ─ Dropout(r1) ─ Dense(h2, ReLU, He-normal) ─ Dropout(r2) ─ … ─ Dense(1, linear)
//! ```
//!
//! The output layer uses Glorot-uniform weights. Dropout is only active in
//! [`TrainableModel::forward_train`]; validation and inference run without it.

use crate::backend::{Backend, BackendError, Tensor2D};
use crate::model::layers::{dropout_mask, Activation, DenseParams, Initializer};
use crate::model::{Fitted, InferenceModel, ModelError, ParamOps, TrainableModel, Unfitted};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Layer sizes and dropout rates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    pub input_dim: usize,
    pub hidden_units: Vec<usize>,
    pub dropout: Vec<f64>,
}

impl MlpConfig {
    /// Two hidden layers of 32 and 16 units with dropout 0.20 and 0.15.
    pub fn range_regressor(input_dim: usize) -> Self {
        Self {
            input_dim,
            hidden_units: vec![32, 16],
            dropout: vec![0.20, 0.15],
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.input_dim == 0 {
            return Err(ModelError::InvalidArchitecture(
                "input dimension must be positive".to_string(),
            ));
        }
        if self.hidden_units.len() != self.dropout.len() {
            return Err(ModelError::InvalidArchitecture(format!(
                "{} hidden layers but {} dropout rates",
                self.hidden_units.len(),
                self.dropout.len()
            )));
        }
        if self.hidden_units.contains(&0) {
            return Err(ModelError::InvalidArchitecture(
                "hidden layers must have at least one unit".to_string(),
            ));
        }
        if let Some(rate) = self.dropout.iter().find(|r| !(0.0..1.0).contains(*r)) {
            return Err(ModelError::InvalidArchitecture(format!(
                "dropout rate {rate} outside [0, 1)"
            )));
        }
        Ok(())
    }
}

/// Dense layer parameters, input layer first. The last layer is the linear output.
#[derive(Clone, Debug)]
pub struct MlpParams<B: Backend> {
    pub layers: Vec<DenseParams<B>>,
}

impl<B: Backend> ParamOps<B> for MlpParams<B> {
    fn zeros_like(&self) -> Self {
        Self {
            layers: self
                .layers
                .iter()
                .map(|l| DenseParams {
                    weights: Tensor2D::zeros(l.fan_in(), l.units()),
                    bias: Tensor2D::zeros(1, l.units()),
                })
                .collect(),
        }
    }

    fn zip_map<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(&Tensor2D<B>, &Tensor2D<B>) -> Tensor2D<B>,
    {
        Self {
            layers: self
                .layers
                .iter()
                .zip(&other.layers)
                .map(|(a, b)| DenseParams {
                    weights: f(&a.weights, &b.weights),
                    bias: f(&a.bias, &b.bias),
                })
                .collect(),
        }
    }

    fn num_tensors(&self) -> usize {
        self.layers.len() * 2
    }

    fn all_finite(&self) -> bool {
        self.layers.iter().all(|l| {
            l.weights.to_vec().iter().all(|v| v.is_finite())
                && l.bias.to_vec().iter().all(|v| v.is_finite())
        })
    }
}

/// Values kept from a training forward pass.
pub struct MlpTrace<B: Backend> {
    /// Input of each dense layer.
    inputs: Vec<Tensor2D<B>>,
    /// Pre-activation of each hidden layer.
    pre_activations: Vec<Tensor2D<B>>,
    /// Dropout mask of each hidden layer.
    masks: Vec<Option<Tensor2D<B>>>,
}

/// Plain-data form of a fitted MLP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpSnapshot {
    pub layers: Vec<DenseSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseSnapshot {
    pub fan_in: usize,
    pub units: usize,
    /// Row-major `(fan_in, units)`.
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

/// Multi-layer perceptron parametrized by backend and training state.
#[derive(Debug)]
pub struct Mlp<B: Backend, S> {
    params: MlpParams<B>,
    dropout: Vec<f64>,
    _state: PhantomData<S>,
}

pub type MlpRegressor<B> = Mlp<B, Unfitted>;

impl<B: Backend, S> Mlp<B, S> {
    pub fn input_dim(&self) -> usize {
        self.params.layers.first().map_or(0, DenseParams::fan_in)
    }

    /// Number of parameter tensors (weights and biases).
    pub fn num_tensors(&self) -> usize {
        self.params.num_tensors()
    }

    fn hidden_count(&self) -> usize {
        self.params.layers.len() - 1
    }

    fn activation(&self, layer: usize) -> Activation {
        if layer < self.hidden_count() {
            Activation::Relu
        } else {
            Activation::Linear
        }
    }

    fn infer(&self, input: &Tensor2D<B>) -> Result<Tensor2D<B>, BackendError> {
        let mut x = input.clone();
        for (i, layer) in self.params.layers.iter().enumerate() {
            x = self.activation(i).apply(&layer.affine(&x)?);
        }
        Ok(x)
    }
}

impl<B: Backend> Mlp<B, Unfitted> {
    /// Builds a freshly initialized network.
    pub fn new(config: &MlpConfig, rng: &mut dyn RngCore) -> Result<Self, ModelError> {
        config.validate()?;
        let mut layers = Vec::with_capacity(config.hidden_units.len() + 1);
        let mut fan_in = config.input_dim;
        for &units in &config.hidden_units {
            layers.push(DenseParams::init(fan_in, units, Initializer::HeNormal, rng));
            fan_in = units;
        }
        layers.push(DenseParams::init(fan_in, 1, Initializer::GlorotUniform, rng));

        tracing::debug!(
            input_dim = config.input_dim,
            hidden = ?config.hidden_units,
            dropout = ?config.dropout,
            "built mlp"
        );
        Ok(Self {
            params: MlpParams { layers },
            dropout: config.dropout.clone(),
            _state: PhantomData,
        })
    }
}

impl<B: Backend> TrainableModel<B> for Mlp<B, Unfitted> {
    type Input = Tensor2D<B>;
    type Prediction = Tensor2D<B>;
    type Params = MlpParams<B>;
    type Gradients = MlpParams<B>;
    type Trace = MlpTrace<B>;
    type Output = Mlp<B, Fitted>;

    fn forward_train(
        &self,
        input: &Tensor2D<B>,
        rng: &mut dyn RngCore,
    ) -> Result<(Tensor2D<B>, MlpTrace<B>), BackendError> {
        let hidden = self.hidden_count();
        let mut trace = MlpTrace {
            inputs: Vec::with_capacity(hidden + 1),
            pre_activations: Vec::with_capacity(hidden),
            masks: Vec::with_capacity(hidden),
        };

        let mut x = input.clone();
        for (i, layer) in self.params.layers[..hidden].iter().enumerate() {
            let z = layer.affine(&x)?;
            let mut a = z.relu();
            let mask = dropout_mask::<B>(z.rows(), z.cols(), self.dropout[i], rng);
            if let Some(m) = &mask {
                a = a.mul(m);
            }
            trace.inputs.push(x);
            trace.pre_activations.push(z);
            trace.masks.push(mask);
            x = a;
        }

        let output = self.params.layers[hidden].affine(&x)?;
        trace.inputs.push(x);
        Ok((output, trace))
    }

    fn forward(&self, input: &Tensor2D<B>) -> Result<Tensor2D<B>, BackendError> {
        self.infer(input)
    }

    fn backward(
        &self,
        trace: &MlpTrace<B>,
        grad_output: &Tensor2D<B>,
    ) -> Result<MlpParams<B>, BackendError> {
        let n_layers = self.params.layers.len();
        let mut grads: Vec<DenseParams<B>> = Vec::with_capacity(n_layers);
        let mut delta = grad_output.clone();

        for i in (0..n_layers).rev() {
            if i < self.hidden_count() {
                if let Some(m) = &trace.masks[i] {
                    delta = delta.mul(m);
                }
                delta = delta.mul(&trace.pre_activations[i].relu_mask());
            }
            grads.push(DenseParams {
                weights: trace.inputs[i].matmul_tn(&delta)?,
                bias: delta.col_sum(),
            });
            if i > 0 {
                delta = delta.matmul_nt(&self.params.layers[i].weights)?;
            }
        }

        grads.reverse();
        Ok(MlpParams { layers: grads })
    }

    fn params(&self) -> &MlpParams<B> {
        &self.params
    }

    fn update_params(&mut self, new_params: MlpParams<B>) {
        self.params = new_params;
    }

    fn into_fitted(self) -> Mlp<B, Fitted> {
        Mlp {
            params: self.params,
            dropout: Vec::new(),
            _state: PhantomData,
        }
    }
}

impl<B: Backend> InferenceModel<B> for Mlp<B, Fitted> {
    type InputBatch = Tensor2D<B>;
    type OutputBatch = Tensor2D<B>;
    type ParamsRepr = MlpSnapshot;

    fn predict_batch(&self, input: &Tensor2D<B>) -> Result<Tensor2D<B>, BackendError> {
        self.infer(input)
    }

    fn extract_params(&self) -> MlpSnapshot {
        MlpSnapshot {
            layers: self
                .params
                .layers
                .iter()
                .map(|l| DenseSnapshot {
                    fan_in: l.fan_in(),
                    units: l.units(),
                    weights: l.weights.to_vec(),
                    bias: l.bias.to_vec(),
                })
                .collect(),
        }
    }

    fn from_params(snapshot: MlpSnapshot) -> Result<Self, ModelError> {
        let Some(last) = snapshot.layers.last() else {
            return Err(ModelError::InvalidParams("no layers".to_string()));
        };
        if last.units != 1 {
            return Err(ModelError::InvalidParams(format!(
                "output layer has {} units, expected 1",
                last.units
            )));
        }

        let mut layers = Vec::with_capacity(snapshot.layers.len());
        let mut expected_fan_in = None;
        for (i, l) in snapshot.layers.iter().enumerate() {
            if l.weights.len() != l.fan_in * l.units || l.bias.len() != l.units {
                return Err(ModelError::InvalidParams(format!(
                    "layer {i}: buffer sizes do not match ({}, {})",
                    l.fan_in, l.units
                )));
            }
            if expected_fan_in.is_some_and(|f| f != l.fan_in) {
                return Err(ModelError::InvalidParams(format!(
                    "layer {i}: fan-in {} does not match previous layer",
                    l.fan_in
                )));
            }
            expected_fan_in = Some(l.units);
            layers.push(DenseParams {
                weights: Tensor2D::new(
                    l.weights.iter().map(|&v| v as f32).collect(),
                    l.fan_in,
                    l.units,
                ),
                bias: Tensor2D::new(l.bias.iter().map(|&v| v as f32).collect(), 1, l.units),
            });
        }

        Ok(Mlp {
            params: MlpParams { layers },
            dropout: Vec::new(),
            _state: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{live_buffers, CpuBackend};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model(input_dim: usize, dropout: Vec<f64>) -> Mlp<CpuBackend, Unfitted> {
        let config = MlpConfig {
            input_dim,
            hidden_units: vec![4, 3],
            dropout,
        };
        Mlp::new(&config, &mut ChaCha8Rng::seed_from_u64(11)).unwrap()
    }

    fn batch() -> Tensor2D<CpuBackend> {
        Tensor2D::new(vec![0.5, -1.0, 0.25, 1.5, 0.0, -0.5], 3, 2)
    }

    #[test]
    fn test_config_validation() {
        assert!(MlpConfig::range_regressor(14).validate().is_ok());
        let mut c = MlpConfig::range_regressor(14);
        c.dropout = vec![0.2];
        assert!(c.validate().is_err());
        let mut c = MlpConfig::range_regressor(14);
        c.dropout[1] = 1.0;
        assert!(c.validate().is_err());
        let mut c = MlpConfig::range_regressor(0);
        assert!(c.validate().is_err());
        c.input_dim = 3;
        c.hidden_units[0] = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_architecture_shapes() {
        let m = Mlp::<CpuBackend, Unfitted>::new(
            &MlpConfig::range_regressor(14),
            &mut ChaCha8Rng::seed_from_u64(0),
        )
        .unwrap();
        let shapes: Vec<_> = m.params().layers.iter().map(|l| l.weights.shape()).collect();
        assert_eq!(shapes, vec![(14, 32), (32, 16), (16, 1)]);
        assert_eq!(m.num_tensors(), 6);
        assert_eq!(m.input_dim(), 14);
    }

    #[test]
    fn test_forward_output_shape_and_input_check() {
        let m = model(2, vec![0.0, 0.0]);
        assert_eq!(m.forward(&batch()).unwrap().shape(), (3, 1));
        assert!(m.forward(&Tensor2D::zeros(3, 5)).is_err());
    }

    #[test]
    fn test_forward_train_without_dropout_matches_forward() {
        let m = model(2, vec![0.0, 0.0]);
        let (train_out, _) = m
            .forward_train(&batch(), &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap();
        assert_eq!(train_out.to_vec(), m.forward(&batch()).unwrap().to_vec());
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        // loss = sum(output); dL/doutput = 1
        let m = model(2, vec![0.0, 0.0]);
        let x = batch();
        let (out, trace) = m
            .forward_train(&x, &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap();
        let ones = Tensor2D::new(vec![1.0; out.rows()], out.rows(), 1);
        let grads = m.backward(&trace, &ones).unwrap();

        let eps = 1e-3;
        for layer in 0..3 {
            let analytic = grads.layers[layer].weights.to_vec();
            let base = m.params().layers[layer].weights.to_vec();
            for k in [0, base.len() - 1] {
                let loss_at = |delta: f64| {
                    let mut shifted = base.clone();
                    shifted[k] += delta;
                    let mut params = m.params().clone();
                    let (r, c) = params.layers[layer].weights.shape();
                    params.layers[layer].weights =
                        Tensor2D::new(shifted.iter().map(|&v| v as f32).collect(), r, c);
                    let mut probe = model(2, vec![0.0, 0.0]);
                    probe.update_params(params);
                    probe.forward(&x).unwrap().sum()
                };
                let numeric = (loss_at(eps) - loss_at(-eps)) / (2.0 * eps);
                assert!(
                    (numeric - analytic[k]).abs() < 1e-2,
                    "layer {layer} weight {k}: numeric {numeric} analytic {}",
                    analytic[k]
                );
            }
        }
    }

    #[test]
    fn test_gradient_shapes_match_params() {
        let m = model(2, vec![0.5, 0.5]);
        let (out, trace) = m
            .forward_train(&batch(), &mut ChaCha8Rng::seed_from_u64(2))
            .unwrap();
        let grads = m.backward(&trace, &out).unwrap();
        for (g, p) in grads.layers.iter().zip(&m.params().layers) {
            assert_eq!(g.weights.shape(), p.weights.shape());
            assert_eq!(g.bias.shape(), p.bias.shape());
        }
    }

    #[test]
    fn test_training_tensors_are_released() {
        let m = model(2, vec![0.2, 0.15]);
        let before = live_buffers();
        {
            let (out, trace) = m
                .forward_train(&batch(), &mut ChaCha8Rng::seed_from_u64(2))
                .unwrap();
            let _grads = m.backward(&trace, &out).unwrap();
            assert!(live_buffers() > before);
        }
        assert_eq!(live_buffers(), before);
    }

    #[test]
    fn test_snapshot_round_trip_predicts_identically() {
        let fitted = model(2, vec![0.2, 0.15]).into_fitted();
        let restored = Mlp::<CpuBackend, Fitted>::from_params(fitted.extract_params()).unwrap();
        assert_eq!(
            fitted.predict_batch(&batch()).unwrap().to_vec(),
            restored.predict_batch(&batch()).unwrap().to_vec()
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mlp.bin");
        fitted.save_to_file(&path).unwrap();
        let loaded = Mlp::<CpuBackend, Fitted>::load_from_file(&path).unwrap();
        assert_eq!(loaded.extract_params(), fitted.extract_params());
    }

    #[test]
    fn test_snapshot_validation() {
        let mut snap = model(2, vec![0.0, 0.0]).into_fitted().extract_params();
        snap.layers[1].fan_in = 5;
        snap.layers[1].weights = vec![0.0; 5 * 3];
        assert!(Mlp::<CpuBackend, Fitted>::from_params(snap).is_err());
        assert!(Mlp::<CpuBackend, Fitted>::from_params(MlpSnapshot { layers: Vec::new() }).is_err());
    }
}
