//! Categorical feature encoding.
//!
//! ## OneHotEncoder
//! Converts categorical text values to one-hot blocks. A value not seen during fit
//! encodes as an all-zero block.
//!
//! ```text
//! // Input column: ["RWD", "AWD", "FWD"]
//! // Vocabulary:   ["AWD", "FWD", "RWD"]
//! // Output:       [[0,0,1], [1,0,0], [0,1,0]]
//! ```

mod one_hot;

pub use one_hot::{FittedOneHotEncoder, OneHotEncoder, OneHotEncoderParams};
