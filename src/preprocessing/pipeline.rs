//! Fitting and applying the EV feature pipeline.
//!
//! ```text
//! records ─ validate_and_filter ─┬─ fit_statistics ─┐
//!                                ├─ fit_vocabulary ─┼─ FittedPipeline ─ transform(record)
//!                                └─ target scaler ──┘
//! ```
//!
//! A [`FittedPipeline`] is an immutable value. It is produced once per training run
//! and passed explicitly to every later transform, including the single-record
//! prediction path.

use crate::preprocessing::encoding::{FittedOneHotEncoder, OneHotEncoder};
use crate::preprocessing::error::PipelineError;
use crate::preprocessing::scaling::{FittedStandardScaler, StandardScaler};
use crate::preprocessing::schema::{FeatureSchema, RawRecord, Value};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use crate::serialization::SerializableParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per numeric feature (mean, population std).
pub type FeatureStatistics = FittedStandardScaler;

/// Per categorical feature, the sorted distinct values.
pub type CategoricalVocabulary = FittedOneHotEncoder;

/// Checks required columns on the first record, then keeps only usable rows.
///
/// A row is dropped when its target or any numeric feature is missing or
/// non-numeric, or when any categorical feature is missing.
///
/// # Errors
/// - [`PipelineError::Schema`] listing every required column the first record lacks.
/// - [`PipelineError::EmptyDataset`] when no row survives.
pub fn validate_and_filter(
    records: Vec<RawRecord>,
    schema: &FeatureSchema,
) -> Result<Vec<RawRecord>, PipelineError> {
    let first = records.first().ok_or(PipelineError::EmptyDataset)?;
    let missing = schema.missing_columns(first);
    if !missing.is_empty() {
        return Err(PipelineError::Schema { missing });
    }

    let total = records.len();
    let kept: Vec<RawRecord> = records
        .into_iter()
        .filter(|r| is_usable(r, schema))
        .collect();

    if kept.len() < total {
        tracing::info!(kept = kept.len(), dropped = total - kept.len(), "filtered rows");
    }
    if kept.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }
    Ok(kept)
}

fn is_usable(record: &RawRecord, schema: &FeatureSchema) -> bool {
    let numeric_ok = schema
        .numeric
        .iter()
        .chain(std::iter::once(&schema.target))
        .all(|c| record.get(c).and_then(Value::as_number).is_some());
    let categorical_ok = schema
        .categorical
        .iter()
        .all(|c| record.get(c).and_then(Value::as_category).is_some());
    numeric_ok && categorical_ok
}

/// Mean and population std of each numeric feature, zero std replaced by one.
///
/// Computed on exactly the `f64` values [`FittedPipeline::transform`] later reads.
pub fn fit_statistics(
    records: &[RawRecord],
    numeric: &[String],
) -> Result<FeatureStatistics, PipelineError> {
    let rows = records
        .iter()
        .map(|r| numeric_values(r, numeric))
        .collect::<Result<Vec<_>, _>>()?;
    StandardScaler::new().fit(&rows[..])
}

/// Sorted distinct values of each categorical feature.
pub fn fit_vocabulary(
    records: &[RawRecord],
    categorical: &[String],
) -> Result<CategoricalVocabulary, PipelineError> {
    let columns: Vec<Vec<String>> = categorical
        .iter()
        .map(|feature| {
            records
                .iter()
                .filter_map(|r| r.get(feature).and_then(Value::as_category))
                .collect()
        })
        .collect();
    OneHotEncoder::new(categorical.to_vec()).fit(&columns[..])
}

/// Fits statistics, vocabulary and (optionally) the target scaler on filtered records.
pub fn fit(
    records: &[RawRecord],
    schema: &FeatureSchema,
    scale_target: bool,
) -> Result<FittedPipeline, PipelineError> {
    let statistics = fit_statistics(records, &schema.numeric)?;
    let vocabulary = fit_vocabulary(records, &schema.categorical)?;
    let target = if scale_target {
        Some(fit_statistics(records, std::slice::from_ref(&schema.target))?)
    } else {
        None
    };

    let fitted = FittedPipeline {
        schema: schema.clone(),
        statistics,
        vocabulary,
        target,
    };
    tracing::debug!(
        n_features = fitted.n_features(),
        vocabulary = ?fitted.vocabulary.categories(),
        "fitted feature pipeline"
    );
    Ok(fitted)
}

fn numeric_values(record: &RawRecord, features: &[String]) -> Result<Vec<f64>, PipelineError> {
    features
        .iter()
        .map(|f| match record.get(f) {
            None | Some(Value::Missing) => Err(PipelineError::validation(f, "is missing")),
            Some(v) => v
                .as_number()
                .ok_or_else(|| PipelineError::validation(f, format!("must be a finite number, got '{v}'"))),
        })
        .collect()
}

fn categorical_values(
    record: &RawRecord,
    features: &[String],
) -> Result<Vec<String>, PipelineError> {
    features
        .iter()
        .map(|f| {
            record
                .get(f)
                .and_then(Value::as_category)
                .ok_or_else(|| PipelineError::validation(f, "is missing"))
        })
        .collect()
}

/// Immutable bundle of everything needed to reproduce the training-time transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    schema: FeatureSchema,
    statistics: FeatureStatistics,
    vocabulary: CategoricalVocabulary,
    target: Option<FittedStandardScaler>,
}

impl FittedPipeline {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn statistics(&self) -> &FeatureStatistics {
        &self.statistics
    }

    pub fn vocabulary(&self) -> &CategoricalVocabulary {
        &self.vocabulary
    }

    pub fn target_scaler(&self) -> Option<&FittedStandardScaler> {
        self.target.as_ref()
    }

    /// Feature-vector length (the model's input dimensionality).
    pub fn n_features(&self) -> usize {
        self.statistics.n_features_out() + self.vocabulary.n_features_out()
    }

    /// Checks that every input feature is present and usable.
    ///
    /// # Errors
    /// [`PipelineError::Validation`] naming the first offending field in schema order.
    pub fn validate_input(&self, record: &RawRecord) -> Result<(), PipelineError> {
        numeric_values(record, &self.schema.numeric)?;
        categorical_values(record, &self.schema.categorical)?;
        Ok(())
    }

    /// Normalized numeric values followed by one-hot blocks.
    ///
    /// Unseen categories produce an all-zero block.
    pub fn transform(&self, record: &RawRecord) -> Result<Vec<f64>, PipelineError> {
        let numeric = numeric_values(record, &self.schema.numeric)?;
        let categorical = categorical_values(record, &self.schema.categorical)?;

        let mut out = Vec::with_capacity(self.n_features());
        self.statistics.transform_row(&numeric, &mut out)?;
        self.vocabulary.transform_row(&categorical, &mut out)?;
        Ok(out)
    }

    /// Transforms filtered records into feature vectors and (scaled) targets.
    pub fn transform_all(
        &self,
        records: &[RawRecord],
    ) -> Result<(Vec<Vec<f64>>, Vec<f64>), PipelineError> {
        let mut vectors = Vec::with_capacity(records.len());
        let mut targets = Vec::with_capacity(records.len());
        for record in records {
            vectors.push(self.transform(record)?);
            let y = numeric_values(record, std::slice::from_ref(&self.schema.target))?;
            targets.push(self.scale_target(y[0]));
        }
        Ok((vectors, targets))
    }

    /// Target in model space.
    pub fn scale_target(&self, y: f64) -> f64 {
        match &self.target {
            Some(t) => (y - t.mean()[0]) / t.std()[0],
            None => y,
        }
    }

    /// Model output back in kilometres.
    pub fn unscale_target(&self, z: f64) -> f64 {
        match &self.target {
            Some(t) => z * t.std()[0] + t.mean()[0],
            None => z,
        }
    }

    /// Writes the fitted pipeline with bincode.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Loads a fitted pipeline written by [`FittedPipeline::save_to_file`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path)?;
        let fitted = Self::from_bytes(&bytes)?;
        fitted.check_consistency()?;
        Ok(fitted)
    }

    pub(crate) fn check_consistency(&self) -> Result<(), PipelineError> {
        FittedStandardScaler::from_params(self.statistics.extract_params())?;
        FittedOneHotEncoder::from_params(self.vocabulary.extract_params())?;
        if self.statistics.n_features_in() != self.schema.numeric.len()
            || self.vocabulary.n_features_in() != self.schema.categorical.len()
        {
            return Err(PipelineError::Serialization(
                "fitted statistics do not match the schema".to_string(),
            ));
        }
        Ok(())
    }
}
