//! Mini-batch training loop.
//!
//! A [`Trainer`] is configured once through [`TrainerBuilder`] and then drives any
//! [`TrainableModel`] whose parameters implement [`ParamOps`]. Every epoch reshuffles
//! the training rows with a generator seeded from `seed + epoch`, runs one optimizer
//! step per batch, evaluates on the validation set without dropout and reports an
//! [`EpochMetrics`] to the caller's observer, which may stop the run.

use crate::backend::{Backend, BackendError, MemoryScope, Tensor2D};
use crate::dataset::Dataset;
use crate::loss::{Loss, MAELoss};
use crate::model::{ParamOps, TrainableModel};
use crate::optimizer::Optimizer;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::ControlFlow;
use thiserror::Error;

/// Failures of a training run.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("loss became non-finite at epoch {epoch}")]
    NonFiniteLoss { epoch: usize },
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),
    #[error("dataset produced no batches")]
    EmptyBatch,
    #[error("training cancelled after epoch {epoch}")]
    Cancelled { epoch: usize },
    #[error(transparent)]
    Shape(#[from] BackendError),
}

/// Metrics of one completed epoch. `epoch` is 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub val_loss: f64,
    pub mae: f64,
    pub val_mae: f64,
}

/// Loss and mean absolute error over one dataset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub mae: f64,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct FitOutcome<F> {
    pub model: F,
    pub history: Vec<EpochMetrics>,
    /// Final pass over the validation set.
    pub evaluation: Evaluation,
}

pub struct Trainer<B: Backend, L: Loss<B>, O> {
    pub(crate) batch_size: usize,
    pub(crate) max_epochs: usize,
    pub(crate) shuffle: bool,
    pub(crate) seed: u64,
    pub(crate) loss_fn: L,
    pub(crate) optimizer: O,
    _backend: PhantomData<B>,
}

pub struct TrainerBuilder<B: Backend, L: Loss<B>, O> {
    batch_size: usize,
    max_epochs: usize,
    shuffle: bool,
    seed: u64,
    loss_fn: L,
    optimizer: O,
    _backend: PhantomData<B>,
}

impl<B: Backend, L: Loss<B>, O> TrainerBuilder<B, L, O> {
    pub fn new(loss_fn: L, optimizer: O) -> Self {
        Self {
            batch_size: 16,
            max_epochs: 100,
            shuffle: true,
            seed: 0,
            loss_fn,
            optimizer,
            _backend: PhantomData,
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<Trainer<B, L, O>, TrainingError> {
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidConfig(
                "batch size must be positive".to_string(),
            ));
        }
        if self.max_epochs == 0 {
            return Err(TrainingError::InvalidConfig(
                "epoch count must be positive".to_string(),
            ));
        }
        Ok(Trainer {
            batch_size: self.batch_size,
            max_epochs: self.max_epochs,
            shuffle: self.shuffle,
            seed: self.seed,
            loss_fn: self.loss_fn,
            optimizer: self.optimizer,
            _backend: PhantomData,
        })
    }
}

impl<B: Backend, L: Loss<B>, O> Trainer<B, L, O> {
    pub fn builder(loss_fn: L, optimizer: O) -> TrainerBuilder<B, L, O> {
        TrainerBuilder::new(loss_fn, optimizer)
    }

    pub fn max_epochs(&self) -> usize {
        self.max_epochs
    }

    /// Trains `model` on `train`, validating on `validation` after every epoch.
    ///
    /// `on_epoch` runs after each epoch's metrics are known; returning
    /// `ControlFlow::Break(())` stops the run with [`TrainingError::Cancelled`].
    /// Optimizer state is reset at the start and end of every run, so every tensor
    /// created here is released when this returns, except the fitted model's own.
    pub fn fit<M, P, D, F>(
        &mut self,
        mut model: M,
        train: &D,
        validation: &D,
        mut on_epoch: F,
    ) -> Result<FitOutcome<M::Output>, TrainingError>
    where
        M: TrainableModel<
            B,
            Input = Tensor2D<B>,
            Prediction = Tensor2D<B>,
            Params = P,
            Gradients = P,
        >,
        P: ParamOps<B>,
        O: Optimizer<B, P>,
        D: Dataset,
        D::Error: Into<TrainingError>,
        F: FnMut(&EpochMetrics) -> ControlFlow<()>,
    {
        if train.is_empty() || validation.is_empty() {
            return Err(TrainingError::EmptyBatch);
        }

        let _scope = MemoryScope::enter("fit");
        self.optimizer.reset();
        let result = self.run_epochs(&mut model, train, validation, &mut on_epoch);
        self.optimizer.reset();

        let history = result?;
        let evaluation = self.evaluate(&model, validation)?;
        tracing::info!(
            epochs = history.len(),
            loss = evaluation.loss,
            mae = evaluation.mae,
            "training finished"
        );
        Ok(FitOutcome {
            model: model.into_fitted(),
            history,
            evaluation,
        })
    }

    fn run_epochs<M, P, D, F>(
        &mut self,
        model: &mut M,
        train: &D,
        validation: &D,
        on_epoch: &mut F,
    ) -> Result<Vec<EpochMetrics>, TrainingError>
    where
        M: TrainableModel<
            B,
            Input = Tensor2D<B>,
            Prediction = Tensor2D<B>,
            Params = P,
            Gradients = P,
        >,
        P: ParamOps<B>,
        O: Optimizer<B, P>,
        D: Dataset,
        D::Error: Into<TrainingError>,
        F: FnMut(&EpochMetrics) -> ControlFlow<()>,
    {
        let mut history = Vec::with_capacity(self.max_epochs);
        let mut order: Vec<usize> = (0..train.len()).collect();

        for epoch in 1..=self.max_epochs {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
            if self.shuffle {
                order.shuffle(&mut rng);
            }

            let mut loss_sum = 0.0;
            let mut mae_sum = 0.0;
            let mut seen = 0usize;
            for batch in train.batches::<B>(&order, self.batch_size) {
                let (x, y) = batch.map_err(Into::<TrainingError>::into)?;
                let rows = x.rows();
                if rows == 0 {
                    return Err(TrainingError::EmptyBatch);
                }

                let (pred, trace) = model.forward_train(&x, &mut rng)?;
                loss_sum += self.loss_fn.loss(&pred, &y) * rows as f64;
                mae_sum += Loss::<B>::loss(&MAELoss, &pred, &y) * rows as f64;
                seen += rows;

                let grad = self.loss_fn.grad_wrt_prediction(&pred, &y);
                let grads = model.backward(&trace, &grad)?;
                let new_params = self.optimizer.step(model.params(), &grads);
                model.update_params(new_params);
            }

            let val = self.evaluate(model, validation)?;
            let metrics = EpochMetrics {
                epoch,
                loss: loss_sum / seen as f64,
                val_loss: val.loss,
                mae: mae_sum / seen as f64,
                val_mae: val.mae,
            };
            if !metrics.loss.is_finite()
                || !metrics.val_loss.is_finite()
                || !model.params().all_finite()
            {
                tracing::warn!(epoch, loss = metrics.loss, "non-finite loss");
                return Err(TrainingError::NonFiniteLoss { epoch });
            }

            tracing::debug!(
                epoch,
                loss = metrics.loss,
                val_loss = metrics.val_loss,
                mae = metrics.mae,
                val_mae = metrics.val_mae,
                "epoch complete"
            );
            history.push(metrics);

            if on_epoch(&metrics).is_break() {
                tracing::info!(epoch, "training cancelled");
                return Err(TrainingError::Cancelled { epoch });
            }
        }

        Ok(history)
    }

    /// Loss and MAE of `model` over all of `data`, dropout off.
    pub fn evaluate<M, D>(&self, model: &M, data: &D) -> Result<Evaluation, TrainingError>
    where
        M: TrainableModel<B, Input = Tensor2D<B>, Prediction = Tensor2D<B>>,
        D: Dataset,
        D::Error: Into<TrainingError>,
    {
        if data.is_empty() {
            return Err(TrainingError::EmptyBatch);
        }
        let (x, y) = data.full::<B>().map_err(Into::<TrainingError>::into)?;
        let pred = model.forward(&x)?;
        Ok(Evaluation {
            loss: self.loss_fn.loss(&pred, &y),
            mae: Loss::<B>::loss(&MAELoss, &pred, &y),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{live_buffers, CpuBackend};
    use crate::dataset::InMemoryDataset;
    use crate::loss::MSELoss;
    use crate::model::{Mlp, MlpConfig, MlpParams, Unfitted};
    use crate::optimizer::Adam;
    use rand::Rng;

    type Cpu = CpuBackend;

    fn linear_data(n: usize, seed: u64) -> InMemoryDataset {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (x, y): (Vec<Vec<f64>>, Vec<f64>) = (0..n)
            .map(|_| {
                let a: f64 = rng.gen_range(-1.0..1.0);
                let b: f64 = rng.gen_range(-1.0..1.0);
                (vec![a, b], 1.5 * a - 0.5 * b + 0.2)
            })
            .unzip();
        InMemoryDataset::new(x, y).unwrap()
    }

    fn mlp() -> Mlp<Cpu, Unfitted> {
        let config = MlpConfig {
            input_dim: 2,
            hidden_units: vec![8],
            dropout: vec![0.0],
        };
        Mlp::new(&config, &mut ChaCha8Rng::seed_from_u64(5)).unwrap()
    }

    fn trainer(epochs: usize, lr: f64) -> Trainer<Cpu, MSELoss, Adam<Cpu, MlpParams<Cpu>>> {
        Trainer::builder(MSELoss, Adam::new(lr))
            .batch_size(16)
            .max_epochs(epochs)
            .seed(7)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_zero_sizes() {
        let r = Trainer::<Cpu, MSELoss, Adam<Cpu, MlpParams<Cpu>>>::builder(
            MSELoss,
            Adam::new(0.01),
        )
        .batch_size(0)
        .build();
        assert!(matches!(r, Err(TrainingError::InvalidConfig(_))));

        let r = Trainer::<Cpu, MSELoss, Adam<Cpu, MlpParams<Cpu>>>::builder(
            MSELoss,
            Adam::new(0.01),
        )
        .max_epochs(0)
        .build();
        assert!(matches!(r, Err(TrainingError::InvalidConfig(_))));
    }

    #[test]
    fn test_fit_records_history_and_reduces_loss() {
        let train = linear_data(96, 1);
        let val = linear_data(24, 2);
        let mut t = trainer(40, 0.01);

        let mut seen = Vec::new();
        let outcome = t
            .fit(mlp(), &train, &val, |m| {
                seen.push(m.epoch);
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(outcome.history.len(), 40);
        assert_eq!(seen, (1..=40).collect::<Vec<_>>());
        let first = outcome.history[0].loss;
        let last = outcome.history[39].loss;
        assert!(last < first * 0.5, "loss {first} -> {last}");
        assert_eq!(outcome.evaluation.loss, outcome.history[39].val_loss);
    }

    #[test]
    fn test_fit_is_reproducible_with_seed() {
        let train = linear_data(40, 1);
        let val = linear_data(10, 2);
        let run = || {
            trainer(5, 0.01)
                .fit(mlp(), &train, &val, |_| ControlFlow::Continue(()))
                .unwrap()
                .history
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_cancel_stops_after_current_epoch_and_releases_tensors() {
        let train = linear_data(40, 1);
        let val = linear_data(10, 2);
        let mut t = trainer(50, 0.01);
        let model = mlp();
        let before = live_buffers();

        let err = t
            .fit(model, &train, &val, |m| {
                if m.epoch == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap_err();
        assert!(matches!(err, TrainingError::Cancelled { epoch: 3 }));
        // the consumed model's parameters are gone too
        assert_eq!(live_buffers(), before - 4);
    }

    #[test]
    fn test_successful_fit_keeps_only_model_tensors() {
        let train = linear_data(40, 1);
        let val = linear_data(10, 2);
        let mut t = trainer(3, 0.01);
        let model = mlp();
        let before = live_buffers();
        let outcome = t
            .fit(model, &train, &val, |_| ControlFlow::Continue(()))
            .unwrap();
        assert_eq!(live_buffers(), before);
        drop(outcome);
        assert_eq!(live_buffers(), before - 4);
    }

    #[test]
    fn test_non_finite_target_fails() {
        let train = InMemoryDataset::new(
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            vec![f64::INFINITY, 1.0],
        )
        .unwrap();
        let val = linear_data(4, 2);
        let model = mlp();
        let before = live_buffers();
        let err = trainer(5, 0.01)
            .fit(model, &train, &val, |_| ControlFlow::Continue(()))
            .unwrap_err();
        assert!(matches!(err, TrainingError::NonFiniteLoss { epoch: 1 }));
        // model and optimizer state dropped with the error
        assert_eq!(live_buffers(), before - 4);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            TrainingError::NonFiniteLoss { epoch: 4 }.to_string(),
            "loss became non-finite at epoch 4"
        );
        assert_eq!(
            TrainingError::Cancelled { epoch: 2 }.to_string(),
            "training cancelled after epoch 2"
        );
    }
}
