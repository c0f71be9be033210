//! Error types for the feature pipeline.

use thiserror::Error;

/// Dataset-level and input-level failures raised by the feature pipeline.
///
/// Row-level defects (a missing cell, a short row) are filtered out and never
/// produce one of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed tabular input.
    #[error("Format error: {0}")]
    Format(String),
    /// Required columns absent from the input.
    #[error("Schema error: missing required columns [{}]", .missing.join(", "))]
    Schema { missing: Vec<String> },
    /// No row survived validation.
    #[error("Empty dataset: no valid rows after filtering")]
    EmptyDataset,
    /// A categorical feature has no observed values.
    #[error("Empty vocabulary for categorical feature '{feature}'")]
    EmptyVocabulary { feature: String },
    /// Too few rows to produce non-empty train and test groups.
    #[error("Insufficient data: {rows} rows give {train} train / {test} test")]
    InsufficientData {
        rows: usize,
        train: usize,
        test: usize,
    },
    /// Feature vectors (or targets) of inconsistent length.
    #[error("Shape error at row {row}: expected length {expected}, got {got}")]
    Shape {
        expected: usize,
        got: usize,
        row: usize,
    },
    /// A prediction input is missing a field or holds an unusable value.
    #[error("Validation error: field '{field}' {reason}")]
    Validation { field: String, reason: String },
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(String),
    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        PipelineError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        match err.position() {
            Some(pos) => PipelineError::Format(format!("line {}: {}", pos.line(), err)),
            None => PipelineError::Format(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_format() {
        let err = PipelineError::Format("no data rows".to_string());
        assert!(err.to_string().contains("Format error"));
    }

    #[test]
    fn test_error_display_schema_lists_columns() {
        let err = PipelineError::Schema {
            missing: vec!["seats".to_string(), "range_km".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("seats"));
        assert!(msg.contains("range_km"));
    }

    #[test]
    fn test_error_display_insufficient_data() {
        let err = PipelineError::InsufficientData {
            rows: 1,
            train: 0,
            test: 1,
        };
        assert!(err.to_string().contains("Insufficient data"));
    }

    #[test]
    fn test_error_display_shape() {
        let err = PipelineError::Shape {
            expected: 14,
            got: 13,
            row: 7,
        };
        assert!(err.to_string().contains("row 7"));
    }

    #[test]
    fn test_error_display_validation_names_field() {
        let err = PipelineError::validation("seats", "is missing");
        assert_eq!(
            err.to_string(),
            "Validation error: field 'seats' is missing"
        );
    }

    #[test]
    fn test_error_display_empty_vocabulary() {
        let err = PipelineError::EmptyVocabulary {
            feature: "drivetrain".to_string(),
        };
        assert!(err.to_string().contains("drivetrain"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_error_is_std_error() {
        let err = PipelineError::EmptyDataset;
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn test_error_from_bincode_error() {
        let bad_bytes: &[u8] = &[0xff, 0xff, 0xff, 0xff];
        let bincode_result: Result<String, bincode::Error> = bincode::deserialize(bad_bytes);
        if let Err(e) = bincode_result {
            let err: PipelineError = e.into();
            assert!(matches!(err, PipelineError::Serialization(_)));
        }
    }
}
