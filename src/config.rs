//! Session configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file) gives the stock
//! range-regressor setup:
//!
//! ```toml
//! [model]
//! hidden_units = [32, 16]
//! dropout = [0.2, 0.15]
//!
//! [training]
//! epochs = 100
//! batch_size = 16
//! learning_rate = 0.001
//! shuffle = true
//! # seed = 42
//! chart_every = 5
//!
//! [split]
//! train_ratio = 0.8
//!
//! [pipeline]
//! scale_target = true
//! ```

use crate::model::MlpConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing TOML config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub model: ModelSection,
    pub training: TrainingSection,
    pub split: SplitSection,
    pub pipeline: PipelineSection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSection {
    pub hidden_units: Vec<usize>,
    pub dropout: Vec<f64>,
}

impl Default for ModelSection {
    fn default() -> Self {
        let MlpConfig {
            hidden_units,
            dropout,
            ..
        } = MlpConfig::range_regressor(0);
        Self {
            hidden_units,
            dropout,
        }
    }
}

impl ModelSection {
    /// Architecture for a pipeline producing `input_dim` features.
    pub fn mlp_config(&self, input_dim: usize) -> MlpConfig {
        MlpConfig {
            input_dim,
            hidden_units: self.hidden_units.clone(),
            dropout: self.dropout.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingSection {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub shuffle: bool,
    /// Drawn from OS entropy when absent.
    pub seed: Option<u64>,
    /// Chart redraw interval in epochs.
    pub chart_every: usize,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 16,
            learning_rate: 0.001,
            shuffle: true,
            seed: None,
            chart_every: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitSection {
    pub train_ratio: f64,
}

impl Default for SplitSection {
    fn default() -> Self {
        Self { train_ratio: 0.8 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    /// Train on standardized targets and map predictions back to kilometres.
    pub scale_target: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self { scale_target: true }
    }
}

impl SessionConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.training;
        if t.epochs == 0 {
            return Err(invalid("training.epochs must be positive"));
        }
        if t.batch_size == 0 {
            return Err(invalid("training.batch_size must be positive"));
        }
        if t.chart_every == 0 {
            return Err(invalid("training.chart_every must be positive"));
        }
        if !(t.learning_rate.is_finite() && t.learning_rate > 0.0) {
            return Err(invalid("training.learning_rate must be a positive number"));
        }
        let ratio = self.split.train_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(invalid("split.train_ratio must lie in (0, 1)"));
        }

        let m = &self.model;
        if m.hidden_units.len() != m.dropout.len() {
            return Err(invalid(format!(
                "model.hidden_units has {} entries but model.dropout has {}",
                m.hidden_units.len(),
                m.dropout.len()
            )));
        }
        if m.hidden_units.contains(&0) {
            return Err(invalid("model.hidden_units entries must be positive"));
        }
        if m.dropout.iter().any(|r| !(0.0..1.0).contains(r)) {
            return Err(invalid("model.dropout rates must lie in [0, 1)"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
