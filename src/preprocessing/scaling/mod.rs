//! Scaling transformers for feature normalization.
//!
//! | Transformer | Description | Use Case |
//! |-------------|-------------|----------|
//! | [`StandardScaler`] | Z-score normalization (mean=0, std=1) | Numeric features and the regression target |

pub mod standard;

pub use standard::{FittedStandardScaler, StandardScaler, StandardScalerParams};
