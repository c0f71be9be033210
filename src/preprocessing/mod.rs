//! The EV feature pipeline: ingest, validate, fit, transform.
//!
//! Transformers follow a two-state pattern: an unfitted [`Transformer`] learns from
//! data and returns an immutable [`FittedTransformer`] that is reused unchanged for
//! every later row, including single prediction inputs.
//!
//! # Available Transformers
//!
//! - [`StandardScaler`]: Z-score normalization of numeric features (and the target)
//! - [`OneHotEncoder`]: sorted-vocabulary one-hot blocks for categorical features
//!
//! # Example
//!
//! ```rust
//! use ev_range::preprocessing::{fit, ingest, validate_and_filter, FeatureSchema};
//!
//! let csv = "top_speed_kmh,battery_capacity_kWh,torque_nm,acceleration_0_100_s,\
//! fast_charging_power_kw_dc,fast_charge_port,seats,drivetrain,length_mm,width_mm,height_mm,range_km
//! 150,60,310,7.5,100,CCS,5,AWD,4500,1850,1550,400
//! 180,75,420,6.1,150,CCS,5,RWD,4700,1900,1500,480
//! ";
//! let schema = FeatureSchema::ev();
//! let records = validate_and_filter(ingest(csv).unwrap(), &schema).unwrap();
//! let fitted = fit(&records, &schema, true).unwrap();
//!
//! // 9 numeric + 1 port + 2 drivetrains
//! assert_eq!(fitted.transform(&records[0]).unwrap().len(), 12);
//! ```

pub mod encoding;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod scaling;
pub mod schema;
pub mod traits;

pub use encoding::{FittedOneHotEncoder, OneHotEncoder, OneHotEncoderParams};
pub use error::PipelineError;
pub use ingest::{ingest, ingest_file};
pub use pipeline::{
    fit, fit_statistics, fit_vocabulary, validate_and_filter, CategoricalVocabulary,
    FeatureStatistics, FittedPipeline,
};
pub use scaling::{FittedStandardScaler, StandardScaler, StandardScalerParams};
pub use schema::{FeatureSchema, RawRecord, Value, CATEGORICAL_FEATURES, NUMERIC_FEATURES, TARGET};
pub use traits::{FittedTransformer, Transformer};
