use crate::backend::{Backend, Tensor2D};

/// A trait for differentiable loss functions used during model training.
///
/// Implementors must define:
/// - How to compute the scalar loss value (for logging/metrics).
/// - How to compute the gradient of the loss w.r.t. the model's predictions.
///
/// Predictions and targets are `(n, 1)` column tensors of the same shape.
/// This gradient is passed to the model's `backward()` method to update parameters.
pub trait Loss<B: Backend> {
    /// Short metric name used in logs.
    fn name(&self) -> &'static str;

    /// Computes the scalar loss value (for logging/metrics).
    ///
    /// # Panics
    /// If `prediction` and `target` differ in shape.
    fn loss(&self, prediction: &Tensor2D<B>, target: &Tensor2D<B>) -> f64;

    /// Computes the gradient of the loss w.r.t. the prediction: ∂L/∂pred.
    fn grad_wrt_prediction(&self, prediction: &Tensor2D<B>, target: &Tensor2D<B>) -> Tensor2D<B>;
}

/// Mean Squared Error (MSE) loss: `L = (1/n) * Σ(pred_i - target_i)^2`
///
/// Gradient w.r.t. prediction: `∂L/∂pred = 2 * (pred - target) / n`
#[derive(Clone, Copy, Debug, Default)]
pub struct MSELoss;

impl<B: Backend> Loss<B> for MSELoss {
    fn name(&self) -> &'static str {
        "mse"
    }

    fn loss(&self, pred: &Tensor2D<B>, target: &Tensor2D<B>) -> f64 {
        let diff = pred.sub(target);
        diff.mul(&diff).mean()
    }

    fn grad_wrt_prediction(&self, pred: &Tensor2D<B>, target: &Tensor2D<B>) -> Tensor2D<B> {
        let n = pred.rows().max(1) as f64;
        pred.sub(target).scale(2.0 / n)
    }
}

/// Mean Absolute Error (MAE) loss: `L = (1/n) * Σ|pred_i - target_i|`
///
/// Gradient w.r.t. prediction: `∂L/∂pred = sign(pred - target) / n`
/// (subgradient 0 is used at zero).
#[derive(Clone, Copy, Debug, Default)]
pub struct MAELoss;

impl<B: Backend> Loss<B> for MAELoss {
    fn name(&self) -> &'static str {
        "mae"
    }

    fn loss(&self, pred: &Tensor2D<B>, target: &Tensor2D<B>) -> f64 {
        pred.sub(target).abs().mean()
    }

    fn grad_wrt_prediction(&self, pred: &Tensor2D<B>, target: &Tensor2D<B>) -> Tensor2D<B> {
        let n = pred.rows().max(1) as f64;
        let diff = pred.sub(target);
        let sign = diff.relu_mask().sub(&diff.scale(-1.0).relu_mask());
        sign.scale(1.0 / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    fn column(values: Vec<f32>) -> Tensor2D<CpuBackend> {
        let n = values.len();
        Tensor2D::new(values, n, 1)
    }

    #[test]
    fn test_mse_loss() {
        let pred = column(vec![3.0, 5.0]);
        let target = column(vec![1.0, 2.0]);

        let mse = MSELoss;
        // ((3-1)^2 + (5-2)^2) / 2 = (4 + 9) / 2 = 6.5
        assert!((Loss::<CpuBackend>::loss(&mse, &pred, &target) - 6.5).abs() < 1e-12);

        // grad = 2 * (pred - target) / n = [2.0, 3.0]
        let grad = mse.grad_wrt_prediction(&pred, &target);
        assert_eq!(grad.to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_mae_loss() {
        let pred = column(vec![3.0, 1.0, 2.0]);
        let target = column(vec![1.0, 2.0, 2.0]);

        let mae = MAELoss;
        // (2 + 1 + 0) / 3 = 1.0
        assert!((Loss::<CpuBackend>::loss(&mae, &pred, &target) - 1.0).abs() < 1e-12);

        let grad = mae.grad_wrt_prediction(&pred, &target);
        let g = grad.to_vec();
        assert!((g[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((g[1] + 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(g[2], 0.0);
    }

    #[test]
    fn test_perfect_prediction_has_zero_loss_and_gradient() {
        let pred = column(vec![1.5, -2.0]);
        let mse = MSELoss;
        assert_eq!(Loss::<CpuBackend>::loss(&mse, &pred, &pred), 0.0);
        assert!(mse
            .grad_wrt_prediction(&pred, &pred)
            .to_vec()
            .iter()
            .all(|&g| g == 0.0));
    }

    #[test]
    fn test_loss_names() {
        assert_eq!(Loss::<CpuBackend>::name(&MSELoss), "mse");
        assert_eq!(Loss::<CpuBackend>::name(&MAELoss), "mae");
    }
}
