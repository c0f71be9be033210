use crate::backend::Backend;
use crate::model::ParamOps;
use std::marker::PhantomData;

/// Trait for gradient-based optimizers.
///
/// Optimizers are responsible for updating model parameters based on computed gradients.
/// Training logic (`Trainer`) is decoupled from the parameter update rule, so any model
/// whose parameters implement [`ParamOps`] can be paired with any optimizer.
///
/// # Type Parameters
/// * `B`: computation backend implementing [`Backend`]
/// * `P`: model parameters type (e.g., [`MlpParams`](crate::model::MlpParams))
pub trait Optimizer<B: Backend, P> {
    /// Performs one update and returns the new parameters.
    ///
    /// Inputs are not mutated; stateful optimizers update their own moments.
    fn step(&mut self, params: &P, gradients: &P) -> P;

    /// Forgets all accumulated state, as if freshly constructed.
    fn reset(&mut self);

    fn learning_rate(&self) -> f64;
}

/// Adam optimizer (Kingma & Ba, 2015).
///
/// ```text
/// m ← β1·m + (1 − β1)·g
/// v ← β2·v + (1 − β2)·g²
/// θ ← θ − lr_t · m / (√v + ε̂)
/// lr_t = lr · √(1 − β2^t) / (1 − β1^t),   ε̂ = ε · √(1 − β2^t)
/// ```
///
/// Moment tensors are allocated lazily on the first step and hold buffer leases until
/// [`Optimizer::reset`] or drop.
///
/// # Example
/// ```rust
/// use ev_range::optimizer::{Adam, Optimizer};
/// use ev_range::backend::CpuBackend;
/// use ev_range::model::MlpParams;
///
/// let adam = Adam::<CpuBackend, MlpParams<CpuBackend>>::new(0.001);
/// assert_eq!(adam.learning_rate(), 0.001);
/// assert_eq!(adam.iterations(), 0);
/// ```
pub struct Adam<B: Backend, P> {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: u32,
    moments: Option<(P, P)>,
    _backend: PhantomData<B>,
}

impl<B: Backend, P> Adam<B, P> {
    /// Adam with β1 = 0.9, β2 = 0.999, ε = 1e-7.
    pub fn new(lr: f64) -> Self {
        Self::with_betas(lr, 0.9, 0.999, 1e-7)
    }

    pub fn with_betas(lr: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            moments: None,
            _backend: PhantomData,
        }
    }

    /// Number of steps taken since construction or the last reset.
    pub fn iterations(&self) -> u32 {
        self.t
    }
}

impl<B: Backend, P: ParamOps<B>> Optimizer<B, P> for Adam<B, P> {
    fn step(&mut self, params: &P, grads: &P) -> P {
        self.t += 1;
        let (b1, b2) = (self.beta1, self.beta2);
        let (m, v) = self
            .moments
            .take()
            .unwrap_or_else(|| (grads.zeros_like(), grads.zeros_like()));

        let m = m.zip_map(grads, |m, g| m.scale(b1).add(&g.scale(1.0 - b1)));
        let v = v.zip_map(grads, |v, g| v.scale(b2).add(&g.mul(g).scale(1.0 - b2)));

        let t = self.t as i32;
        let correction2 = (1.0 - b2.powi(t)).sqrt();
        let lr_t = self.lr * correction2 / (1.0 - b1.powi(t));
        let eps_hat = self.epsilon * correction2;

        let update = m.zip_map(&v, |m, v| {
            m.div(&v.sqrt().add_scalar(eps_hat)).scale(lr_t)
        });
        let new_params = params.zip_map(&update, |p, u| p.sub(u));

        self.moments = Some((m, v));
        new_params
    }

    fn reset(&mut self) {
        self.t = 0;
        self.moments = None;
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{live_buffers, CpuBackend, Tensor2D};
    use crate::model::{DenseParams, MlpParams};

    fn params(w: Vec<f32>, b: f32) -> MlpParams<CpuBackend> {
        let n = w.len();
        MlpParams {
            layers: vec![DenseParams {
                weights: Tensor2D::new(w, n, 1),
                bias: Tensor2D::new(vec![b], 1, 1),
            }],
        }
    }

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut adam = Adam::new(0.001);
        let p = params(vec![1.0, -2.0], 0.5);
        let g = params(vec![4.0, -0.01], 100.0);

        let next = adam.step(&p, &g);
        let w = next.layers[0].weights.to_vec();
        assert!((w[0] - (1.0 - 0.001)).abs() < 1e-5, "{w:?}");
        assert!((w[1] - (-2.0 + 0.001)).abs() < 1e-5, "{w:?}");
        assert!((next.layers[0].bias.to_vec()[0] - 0.499).abs() < 1e-5);
        assert_eq!(adam.iterations(), 1);
    }

    #[test]
    fn test_zero_gradient_keeps_params() {
        let mut adam = Adam::new(0.01);
        let p = params(vec![1.5, 2.5], -1.0);
        let g = p.zeros_like();
        let next = adam.step(&p, &g);
        assert_eq!(next.layers[0].weights.to_vec(), vec![1.5, 2.5]);
        assert_eq!(next.layers[0].bias.to_vec(), vec![-1.0]);
    }

    #[test]
    fn test_minimizes_quadratic() {
        // f(w) = Σ (w - 3)²
        let mut adam = Adam::new(0.05);
        let mut p = params(vec![0.0, 6.0], 0.0);
        for _ in 0..300 {
            let w = &p.layers[0].weights;
            let g = MlpParams {
                layers: vec![DenseParams {
                    weights: w.add_scalar(-3.0).scale(2.0),
                    bias: Tensor2D::zeros(1, 1),
                }],
            };
            p = adam.step(&p, &g);
        }
        for w in p.layers[0].weights.to_vec() {
            assert!((w - 3.0).abs() < 0.5, "w = {w}");
        }
    }

    #[test]
    fn test_reset_releases_moments() {
        let p = params(vec![1.0, 2.0, 3.0], 0.0);
        let g = params(vec![0.1, 0.2, 0.3], 0.1);
        let before = live_buffers();

        let mut adam = Adam::new(0.001);
        let next = adam.step(&p, &g);
        // new params plus two moment sets
        assert_eq!(live_buffers(), before + 3 * p.num_tensors());

        adam.reset();
        assert_eq!(adam.iterations(), 0);
        drop(next);
        assert_eq!(live_buffers(), before);
    }
}
