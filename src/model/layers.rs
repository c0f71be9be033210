//! Dense layer parameters, weight initializers and dropout masks.

use crate::backend::{Backend, BackendError, Tensor2D};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Non-linearity applied after a dense layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Linear,
}

/// Weight initialization scheme. Biases always start at zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Initializer {
    /// Normal(0, sqrt(2 / fan_in)) truncated at two standard deviations.
    HeNormal,
    /// Uniform(-l, l) with l = sqrt(6 / (fan_in + fan_out)).
    GlorotUniform,
}

impl Initializer {
    fn sample(self, fan_in: usize, fan_out: usize, rng: &mut dyn RngCore) -> Vec<f32> {
        let n = fan_in * fan_out;
        match self {
            Initializer::HeNormal => {
                let std = (2.0 / fan_in as f64).sqrt();
                match Normal::new(0.0, std) {
                    Ok(normal) => (0..n)
                        .map(|_| loop {
                            let w: f64 = normal.sample(rng);
                            if w.abs() <= 2.0 * std {
                                break w as f32;
                            }
                        })
                        .collect(),
                    // std is only invalid for fan_in == 0, which yields no weights
                    Err(_) => vec![0.0; n],
                }
            }
            Initializer::GlorotUniform => {
                let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
                (0..n)
                    .map(|_| rng.gen_range(-limit..=limit) as f32)
                    .collect()
            }
        }
    }
}

/// Weights `(fan_in, units)` and bias `(1, units)` of one dense layer.
#[derive(Clone, Debug)]
pub struct DenseParams<B: Backend> {
    pub weights: Tensor2D<B>,
    pub bias: Tensor2D<B>,
}

impl<B: Backend> DenseParams<B> {
    pub fn init(fan_in: usize, units: usize, init: Initializer, rng: &mut dyn RngCore) -> Self {
        Self {
            weights: Tensor2D::new(init.sample(fan_in, units, rng), fan_in, units),
            bias: Tensor2D::zeros(1, units),
        }
    }

    pub fn fan_in(&self) -> usize {
        self.weights.rows()
    }

    pub fn units(&self) -> usize {
        self.weights.cols()
    }

    /// `x · W + b`.
    pub fn affine(&self, x: &Tensor2D<B>) -> Result<Tensor2D<B>, BackendError> {
        x.matmul(&self.weights)?.add_row(&self.bias)
    }
}

impl Activation {
    pub fn apply<B: Backend>(self, z: &Tensor2D<B>) -> Tensor2D<B> {
        match self {
            Activation::Relu => z.relu(),
            Activation::Linear => z.clone(),
        }
    }
}

/// Inverted-dropout mask: each entry is `0` with probability `rate`, else `1 / (1 - rate)`.
///
/// Returns `None` when `rate` is zero.
pub fn dropout_mask<B: Backend>(
    rows: usize,
    cols: usize,
    rate: f64,
    rng: &mut dyn RngCore,
) -> Option<Tensor2D<B>> {
    if rate <= 0.0 {
        return None;
    }
    let keep = 1.0 - rate;
    let scale = (1.0 / keep) as f32;
    let data = (0..rows * cols)
        .map(|_| if rng.gen::<f64>() < keep { scale } else { 0.0 })
        .collect();
    Some(Tensor2D::new(data, rows, cols))
}
