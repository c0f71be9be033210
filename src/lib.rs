//! Electric-vehicle driving-range regression.
//!
//! - [`preprocessing`]: CSV ingest, row filtering, fitted normalization and one-hot
//!   encoding, producing fixed-length feature vectors.
//! - [`dataset`]: in-memory datasets, mini-batching and the random train/test split.
//! - [`model`], [`loss`], [`optimizer`], [`trainer`]: a small MLP trained with Adam on
//!   a pluggable tensor [`backend`].
//! - [`session`]: the training and inference lifecycle tying the above together.

pub mod backend;
pub mod config;
pub mod dataset;
pub mod loss;
pub mod model;
pub mod optimizer;
pub mod preprocessing;
pub mod serialization;
pub mod session;
pub mod trainer;

#[cfg(test)]
mod test_fixtures;

pub use backend::{Backend, CpuBackend};
pub use config::SessionConfig;
pub use session::{Session, SessionError, SessionObserver, SessionState};
