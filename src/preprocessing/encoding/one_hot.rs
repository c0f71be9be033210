//! One-hot encoding for categorical features.
//!
//! Each categorical column contributes one block whose width is the number of
//! distinct values observed during fit. Categories are kept in ascending
//! lexicographic order, which fixes the position of every output column.

use crate::preprocessing::error::PipelineError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder for named categorical features.
///
/// # Example
/// ```rust
/// use ev_range::preprocessing::{FittedTransformer, OneHotEncoder, Transformer};
///
/// let column = vec!["RWD".to_string(), "AWD".to_string(), "FWD".to_string()];
/// let fitted = OneHotEncoder::new(vec!["drivetrain".to_string()])
///     .fit(&[column][..])
///     .unwrap();
///
/// let mut out = Vec::new();
/// fitted.transform_row(&["FWD".to_string()][..], &mut out).unwrap();
/// assert_eq!(out, vec![0.0, 1.0, 0.0]); // AWD, FWD, RWD
/// ```
#[derive(Clone, Debug)]
pub struct OneHotEncoder {
    features: Vec<String>,
}

impl OneHotEncoder {
    /// Creates an encoder for the given feature names, in block order.
    pub fn new(features: Vec<String>) -> Self {
        Self { features }
    }
}

/// Serializable parameters for a fitted OneHotEncoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoderParams {
    pub features: Vec<String>,
    /// Sorted categories for each feature.
    pub categories: Vec<Vec<String>>,
}

/// Fitted OneHotEncoder: the categorical vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedOneHotEncoder {
    features: Vec<String>,
    categories: Vec<Vec<String>>,
}

impl FittedOneHotEncoder {
    /// Sorted categories learned for each feature.
    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }
}

impl Transformer for OneHotEncoder {
    /// One `Vec` per feature, holding that feature's value for every row.
    type Input = [Vec<String>];
    type Fitted = FittedOneHotEncoder;

    fn fit(&self, columns: &[Vec<String>]) -> Result<Self::Fitted, PipelineError> {
        if columns.len() != self.features.len() {
            return Err(PipelineError::Shape {
                expected: self.features.len(),
                got: columns.len(),
                row: 0,
            });
        }

        let mut categories = Vec::with_capacity(columns.len());
        for (feature, column) in self.features.iter().zip(columns) {
            let distinct: BTreeSet<&str> = column.iter().map(String::as_str).collect();
            if distinct.is_empty() {
                return Err(PipelineError::EmptyVocabulary {
                    feature: feature.clone(),
                });
            }
            categories.push(distinct.into_iter().map(str::to_string).collect());
        }

        Ok(FittedOneHotEncoder {
            features: self.features.clone(),
            categories,
        })
    }
}

impl FittedTransformer for FittedOneHotEncoder {
    type Row = [String];
    type Params = OneHotEncoderParams;

    fn transform_row(&self, row: &[String], out: &mut Vec<f64>) -> Result<(), PipelineError> {
        if row.len() != self.features.len() {
            return Err(PipelineError::Shape {
                expected: self.features.len(),
                got: row.len(),
                row: 0,
            });
        }

        let start = out.len();
        out.resize(start + self.n_features_out(), 0.0);

        let mut offset = start;
        for ((value, cats), feature) in row.iter().zip(&self.categories).zip(&self.features) {
            match cats.binary_search(value) {
                Ok(idx) => out[offset + idx] = 1.0,
                Err(_) => {
                    tracing::debug!(feature = %feature, value = %value, "unseen category encoded as zeros");
                }
            }
            offset += cats.len();
        }
        Ok(())
    }

    fn n_features_in(&self) -> usize {
        self.features.len()
    }

    fn n_features_out(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    fn extract_params(&self) -> Self::Params {
        OneHotEncoderParams {
            features: self.features.clone(),
            categories: self.categories.clone(),
        }
    }

    fn from_params(params: Self::Params) -> Result<Self, PipelineError> {
        if params.features.len() != params.categories.len() {
            return Err(PipelineError::Shape {
                expected: params.features.len(),
                got: params.categories.len(),
                row: 0,
            });
        }
        for (feature, cats) in params.features.iter().zip(&params.categories) {
            if cats.is_empty() {
                return Err(PipelineError::EmptyVocabulary {
                    feature: feature.clone(),
                });
            }
            if cats.windows(2).any(|w| w[0] >= w[1]) {
                return Err(PipelineError::Serialization(format!(
                    "categories of '{feature}' are not sorted and distinct"
                )));
            }
        }
        Ok(FittedOneHotEncoder {
            features: params.features,
            categories: params.categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn fitted() -> FittedOneHotEncoder {
        let columns = vec![
            strings(&["CCS", "CHAdeMO", "CCS", "Type 2"]),
            strings(&["RWD", "AWD", "FWD", "AWD"]),
        ];
        OneHotEncoder::new(strings(&["fast_charge_port", "drivetrain"]))
            .fit(&columns[..])
            .unwrap()
    }

    #[test]
    fn test_one_hot_vocabulary_sorted_and_distinct() {
        let fitted = fitted();
        assert_eq!(fitted.categories()[0], strings(&["CCS", "CHAdeMO", "Type 2"]));
        assert_eq!(fitted.categories()[1], strings(&["AWD", "FWD", "RWD"]));
        assert_eq!(fitted.n_features_in(), 2);
        assert_eq!(fitted.n_features_out(), 6);
    }

    #[test]
    fn test_one_hot_blocks_in_feature_order() {
        let mut out = vec![9.0];
        fitted()
            .transform_row(&strings(&["Type 2", "AWD"]), &mut out)
            .unwrap();
        assert_eq!(out, vec![9.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_one_hot_unseen_category_is_all_zero_block() {
        let mut out = Vec::new();
        fitted()
            .transform_row(&strings(&["CCS", "6WD"]), &mut out)
            .unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(&out[3..], &[0.0, 0.0, 0.0]);
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn test_one_hot_empty_vocabulary() {
        let columns = vec![strings(&["AWD"]), Vec::new()];
        let err = OneHotEncoder::new(strings(&["drivetrain", "fast_charge_port"]))
            .fit(&columns[..])
            .unwrap_err();
        assert!(
            matches!(err, PipelineError::EmptyVocabulary { ref feature } if feature == "fast_charge_port")
        );
    }

    #[test]
    fn test_one_hot_row_width_mismatch() {
        let mut out = Vec::new();
        let err = fitted()
            .transform_row(&strings(&["CCS"]), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Shape {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_one_hot_params_round_trip_and_validation() {
        let fitted = fitted();
        let restored = FittedOneHotEncoder::from_params(fitted.extract_params()).unwrap();
        assert_eq!(restored, fitted);

        let mut bad = fitted.extract_params();
        bad.categories[1] = strings(&["RWD", "AWD"]);
        assert!(FittedOneHotEncoder::from_params(bad).is_err());
    }
}
