//! Training and inference lifecycle.
//!
//! A [`Session`] owns one fitted pipeline and one trained model at a time. A run
//! walks the stages `Loading → Preprocessing → BuildingModel → Training` and ends in
//! `Ready` (or `Failed`, which is terminal). The observer hears every transition and
//! every epoch and can cancel training between epochs.
//!
//! Methods take `&self` so an observer holding a reference to the session can call
//! back into it; such calls are guarded: a second [`Session::run`] returns
//! [`SessionError::Busy`] and [`Session::predict`] returns `Ok(None)`.
//!
//! ```rust,no_run
//! use ev_range::config::SessionConfig;
//! use ev_range::preprocessing::RawRecord;
//! use ev_range::session::Session;
//!
//! let session = Session::new(SessionConfig::default())?;
//! let csv = std::fs::read_to_string("ev_specs.csv")?;
//! let report = session.run(&csv, &mut ())?;
//! println!("test MAE (standardized): {:.3}", report.evaluation.mae);
//!
//! let car = RawRecord::new()
//!     .with("top_speed_kmh", 180.0)
//!     .with("battery_capacity_kWh", 75.0)
//!     .with("torque_nm", 420.0)
//!     .with("acceleration_0_100_s", 6.1)
//!     .with("fast_charging_power_kw_dc", 150.0)
//!     .with("fast_charge_port", "CCS")
//!     .with("seats", 5.0)
//!     .with("drivetrain", "AWD")
//!     .with("length_mm", 4700.0)
//!     .with("width_mm", 1900.0)
//!     .with("height_mm", 1600.0);
//! if let Some(km) = session.predict(&car)? {
//!     println!("estimated range: {km} km");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::backend::{Backend, CpuBackend, MemoryScope, Tensor2D};
use crate::config::{ConfigError, SessionConfig};
use crate::dataset::{Dataset, DatasetSplit};
use crate::loss::MSELoss;
use crate::model::{Fitted, InferenceModel, Mlp, MlpParams, MlpSnapshot, Unfitted};
use crate::optimizer::Adam;
use crate::preprocessing::{
    fit, ingest, ingest_file, validate_and_filter, FeatureSchema, FittedPipeline,
    PipelineError, RawRecord,
};
use crate::serialization::SerializableParams;
use crate::trainer::{EpochMetrics, Evaluation, Trainer, TrainingError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::path::Path;

pub mod error;
pub mod state;

pub use error::{SessionError, StageFailure};
pub use state::{ChartCadence, SessionState, Stage};

/// Receives lifecycle events of a session.
///
/// Both methods have no-op defaults; `()` is the silent observer.
pub trait SessionObserver {
    fn on_state(&mut self, _state: &SessionState) {}

    /// Called after every epoch. `Break` cancels training.
    fn on_epoch(&mut self, _metrics: &EpochMetrics) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl SessionObserver for () {}

/// Summary of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    pub history: Vec<EpochMetrics>,
    /// Final loss and MAE on the test split, in model (possibly standardized) units.
    pub evaluation: Evaluation,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Everything needed to serve predictions without retraining.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifacts {
    pub pipeline: FittedPipeline,
    pub model: MlpSnapshot,
    pub evaluation: Option<Evaluation>,
}

struct Trained<B: Backend> {
    pipeline: FittedPipeline,
    model: Mlp<B, Fitted>,
}

/// Clears the running flag on every exit path.
struct RunGuard<'a>(&'a Cell<bool>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct Session<B: Backend = CpuBackend> {
    config: SessionConfig,
    state: RefCell<SessionState>,
    running: Cell<bool>,
    trained: RefCell<Option<Trained<B>>>,
    history: RefCell<Vec<EpochMetrics>>,
    evaluation: Cell<Option<Evaluation>>,
}

impl Session<CpuBackend> {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_backend(config)
    }
}

impl<B: Backend> Session<B> {
    pub fn with_backend(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: RefCell::new(SessionState::Idle),
            running: Cell::new(false),
            trained: RefCell::new(None),
            history: RefCell::new(Vec::new()),
            evaluation: Cell::new(None),
        })
    }

    /// A `Ready` session serving a previously exported model.
    pub fn from_artifacts(
        config: SessionConfig,
        artifacts: TrainedArtifacts,
    ) -> Result<Self, SessionError> {
        artifacts
            .pipeline
            .check_consistency()
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        let model = Mlp::<B, Fitted>::from_params(artifacts.model)
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        if model.input_dim() != artifacts.pipeline.n_features() {
            return Err(SessionError::Persistence(format!(
                "model expects {} features but the pipeline produces {}",
                model.input_dim(),
                artifacts.pipeline.n_features()
            )));
        }

        let session = Self::with_backend(config)?;
        session.evaluation.set(artifacts.evaluation);
        *session.trained.borrow_mut() = Some(Trained {
            pipeline: artifacts.pipeline,
            model,
        });
        session.state.replace(SessionState::Ready);
        Ok(session)
    }

    /// Restores a session from a file written by [`Session::save_artifacts`].
    pub fn load<P: AsRef<Path>>(config: SessionConfig, path: P) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let artifacts = TrainedArtifacts::load_from_file(path).map_err(|e| {
            SessionError::Persistence(format!("{}: {e}", path.display()))
        })?;
        let session = Self::from_artifacts(config, artifacts)?;
        tracing::info!(path = %path.display(), "restored trained session");
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Metrics of the current or most recent run.
    pub fn history(&self) -> Vec<EpochMetrics> {
        self.history.borrow().clone()
    }

    pub fn evaluation(&self) -> Option<Evaluation> {
        self.evaluation.get()
    }

    pub fn chart_cadence(&self) -> ChartCadence {
        ChartCadence::new(self.config.training.chart_every, self.config.training.epochs)
    }

    /// Trains on CSV text.
    pub fn run<O>(&self, csv: &str, observer: &mut O) -> Result<TrainingReport, SessionError>
    where
        O: SessionObserver + ?Sized,
    {
        self.run_with(|| ingest(csv), observer)
    }

    /// Trains on a CSV file.
    pub fn run_file<P, O>(&self, path: P, observer: &mut O) -> Result<TrainingReport, SessionError>
    where
        P: AsRef<Path>,
        O: SessionObserver + ?Sized,
    {
        let path = path.as_ref();
        self.run_with(|| ingest_file(path), observer)
    }

    fn run_with<F, O>(&self, load: F, observer: &mut O) -> Result<TrainingReport, SessionError>
    where
        F: FnOnce() -> Result<Vec<RawRecord>, PipelineError>,
        O: SessionObserver + ?Sized,
    {
        self.begin()?;
        let _guard = RunGuard(&self.running);

        self.trained.replace(None);
        self.history.borrow_mut().clear();
        self.evaluation.set(None);
        let mut scope = MemoryScope::enter("run");

        let seed = match self.config.training.seed {
            Some(seed) => {
                tracing::debug!(seed, "starting run");
                seed
            }
            None => {
                let seed: u64 = rand::random();
                tracing::info!(seed, "starting run with entropy seed");
                seed
            }
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        self.transition(SessionState::Loading, observer);
        let records = load()
            .and_then(|records| {
                if records.is_empty() {
                    Err(PipelineError::EmptyDataset)
                } else {
                    Ok(records)
                }
            })
            .map_err(|e| self.fail(Stage::Loading, e, observer))?;

        self.transition(SessionState::Preprocessing, observer);
        let (pipeline, split) = self
            .preprocess(records, &mut rng)
            .map_err(|e| self.fail(Stage::Preprocessing, e, observer))?;

        self.transition(SessionState::BuildingModel, observer);
        let mlp_config = self.config.model.mlp_config(pipeline.n_features());
        let model = Mlp::<B, Unfitted>::new(&mlp_config, &mut rng)
            .map_err(|e| self.fail(Stage::BuildingModel, e, observer))?;
        let training = &self.config.training;
        let mut trainer = Trainer::builder(
            MSELoss,
            Adam::<B, MlpParams<B>>::new(training.learning_rate),
        )
        .batch_size(training.batch_size)
        .max_epochs(training.epochs)
        .shuffle(training.shuffle)
        .seed(seed)
        .build()
        .map_err(|e| self.fail(Stage::BuildingModel, e, observer))?;

        self.transition(SessionState::Training, observer);
        let fitted = trainer.fit(model, &split.train, &split.test, |metrics| {
            self.history.borrow_mut().push(*metrics);
            observer.on_epoch(metrics)
        });
        let outcome = match fitted {
            Ok(outcome) => outcome,
            Err(TrainingError::Cancelled { epoch }) => {
                self.transition(SessionState::Idle, observer);
                return Err(SessionError::Cancelled { epoch });
            }
            Err(e) => return Err(self.fail(Stage::Training, e, observer)),
        };

        scope.retain(outcome.model.num_tensors());
        let report = TrainingReport {
            history: outcome.history,
            evaluation: outcome.evaluation,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
        };
        self.evaluation.set(Some(outcome.evaluation));
        self.trained.replace(Some(Trained {
            pipeline,
            model: outcome.model,
        }));
        self.transition(SessionState::Ready, observer);
        Ok(report)
    }

    fn preprocess(
        &self,
        records: Vec<RawRecord>,
        rng: &mut ChaCha8Rng,
    ) -> Result<(FittedPipeline, DatasetSplit), PipelineError> {
        let schema = FeatureSchema::ev();
        let records = validate_and_filter(records, &schema)?;
        let pipeline = fit(&records, &schema, self.config.pipeline.scale_target)?;
        let (vectors, targets) = pipeline.transform_all(&records)?;
        let split = crate::dataset::split(vectors, targets, self.config.split.train_ratio, rng)?;
        tracing::info!(
            train = split.train.len(),
            test = split.test.len(),
            features = pipeline.n_features(),
            "split dataset"
        );
        Ok((pipeline, split))
    }

    /// Range estimate in whole kilometres.
    ///
    /// Returns `Ok(None)` unless the session is `Ready` and no run is active.
    ///
    /// # Errors
    /// - [`SessionError::Validation`] naming the first missing or non-numeric field.
    /// - [`SessionError::Inference`] when the model rejects the feature vector.
    /// - [`SessionError::UnusableOutput`] when the output is non-finite or does not
    ///   fit in whole kilometres.
    pub fn predict(&self, record: &RawRecord) -> Result<Option<i64>, SessionError> {
        if self.running.get() || !self.state.borrow().is_ready() {
            tracing::debug!(state = %self.state.borrow(), "prediction ignored");
            return Ok(None);
        }
        let trained = self.trained.borrow();
        let Some(trained) = trained.as_ref() else {
            return Ok(None);
        };

        trained
            .pipeline
            .validate_input(record)
            .map_err(SessionError::Validation)?;
        let features = trained
            .pipeline
            .transform(record)
            .map_err(SessionError::Validation)?;

        let _scope = MemoryScope::enter("predict");
        let width = features.len();
        let x = Tensor2D::<B>::from_rows(std::slice::from_ref(&features), width)
            .map_err(SessionError::Inference)?;
        let y = trained
            .model
            .predict_batch(&x)
            .map_err(SessionError::Inference)?;
        let z = y.sum();
        drop(y);
        drop(x);

        let value = trained.pipeline.unscale_target(z).round();
        if !value.is_finite() || value.abs() > i64::MAX as f64 {
            tracing::warn!(value, "unusable model output");
            return Err(SessionError::UnusableOutput { value });
        }
        let km = value as i64;
        tracing::debug!(km, "predicted range");
        Ok(Some(km))
    }

    /// Exports the fitted pipeline and model.
    pub fn artifacts(&self) -> Result<TrainedArtifacts, SessionError> {
        if self.running.get() {
            return Err(SessionError::Busy);
        }
        let trained = self.trained.borrow();
        let trained = trained.as_ref().ok_or(SessionError::NotReady)?;
        Ok(TrainedArtifacts {
            pipeline: trained.pipeline.clone(),
            model: trained.model.extract_params(),
            evaluation: self.evaluation.get(),
        })
    }

    pub fn save_artifacts<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        let path = path.as_ref();
        self.artifacts()?
            .save_to_file(path)
            .map_err(|e| SessionError::Persistence(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "saved trained session");
        Ok(())
    }

    fn begin(&self) -> Result<(), SessionError> {
        if self.running.get() {
            return Err(SessionError::Busy);
        }
        if let SessionState::Failed { stage, message } = &*self.state.borrow() {
            return Err(SessionError::Terminal {
                stage: *stage,
                message: message.clone(),
            });
        }
        self.running.set(true);
        Ok(())
    }

    fn transition<O: SessionObserver + ?Sized>(&self, next: SessionState, observer: &mut O) {
        tracing::info!(state = %next, "session state");
        self.state.replace(next.clone());
        observer.on_state(&next);
    }

    fn fail<O: SessionObserver + ?Sized>(
        &self,
        stage: Stage,
        err: impl Into<StageFailure>,
        observer: &mut O,
    ) -> SessionError {
        let source = err.into();
        let message = source.to_string();
        tracing::error!(%stage, error = %message, "run failed");
        self.transition(SessionState::Failed { stage, message }, observer);
        SessionError::at(stage, source)
    }
}
