use super::state::Stage;
use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::model::ModelError;
use crate::preprocessing::PipelineError;
use crate::trainer::TrainingError;
use thiserror::Error;

/// Underlying failure of a run stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Training(#[from] TrainingError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageFailure,
    },
    #[error("a training run is already in progress")]
    Busy,
    #[error("session failed during {stage} ({message}); start a new session")]
    Terminal { stage: Stage, message: String },
    #[error("training cancelled after epoch {epoch}")]
    Cancelled { epoch: usize },
    #[error("no trained model available")]
    NotReady,
    #[error("invalid prediction input: {0}")]
    Validation(#[source] PipelineError),
    #[error("model inference failed: {0}")]
    Inference(#[source] BackendError),
    #[error("model output {value} km is not a usable range")]
    UnusableOutput { value: f64 },
    #[error("failed to persist or restore artifacts: {0}")]
    Persistence(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    pub(crate) fn at(stage: Stage, source: impl Into<StageFailure>) -> Self {
        SessionError::Stage {
            stage,
            source: source.into(),
        }
    }

    /// The stage a [`SessionError::Stage`] or [`SessionError::Terminal`] refers to.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SessionError::Stage { stage, .. } | SessionError::Terminal { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}
