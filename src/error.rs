//! Error type shared by both estimator families.

use thiserror::Error;

/// Errors returned by estimator construction, merge, compression and record decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Estimator parameters are outside of the supported range.
    #[error("invalid construction parameters: {0}")]
    Construction(String),
    /// Two estimators with different shapes were merged.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: String, found: String },
    /// A serialized record is truncated, inconsistent or corrupt.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    /// Sketch width must be even to be folded in half.
    #[error("cannot compress sketch of odd width {0}")]
    OddWidth(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
