use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage of a training run that can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Loading,
    Preprocessing,
    BuildingModel,
    Training,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Preprocessing => "preprocessing",
            Stage::BuildingModel => "building model",
            Stage::Training => "training",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a [`Session`](super::Session).
///
/// ```text
/// Idle → Loading → Preprocessing → BuildingModel → Training → Ready
///           └──────────────┴──────────────┴─────────────┴──→ Failed { stage, message }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Loading,
    Preprocessing,
    BuildingModel,
    Training,
    Ready,
    Failed { stage: Stage, message: String },
}

impl SessionState {
    /// The stage this state is running, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SessionState::Loading => Some(Stage::Loading),
            SessionState::Preprocessing => Some(Stage::Preprocessing),
            SessionState::BuildingModel => Some(Stage::BuildingModel),
            SessionState::Training => Some(Stage::Training),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.stage().is_some()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    /// `Failed` accepts no further runs.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Failed { stage, message } => {
                write!(f, "failed during {stage}: {message}")
            }
            running => match running.stage() {
                Some(stage) => write!(f, "{stage}"),
                None => Ok(()),
            },
        }
    }
}

/// Decides on which epochs a progress chart should be redrawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChartCadence {
    every: usize,
    total: usize,
}

impl ChartCadence {
    pub fn new(every: usize, total: usize) -> Self {
        Self {
            every: every.max(1),
            total,
        }
    }

    /// True on every `every`-th epoch (1-based) and on the last one.
    pub fn should_redraw(&self, epoch: usize) -> bool {
        epoch % self.every == 0 || epoch == self.total
    }
}
