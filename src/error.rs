//! Error types for the filtering core and its I/O surfaces.

use std::io;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised by the FFT engine, the filters and the glue around them.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Transform input whose length is not a power of two
    #[error("sequence length {len} is not a power of two")]
    NotPowerOfTwo { len: usize },

    /// Zero-length sequence or zero-sized matrix
    #[error("empty input: transforms need at least one element")]
    EmptyInput,

    /// Two matrices that must agree in shape do not
    #[error("dimension mismatch: expected {expected:?} (h, w), got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Row data that does not form a rectangle
    #[error("jagged matrix: {rows} rows of width {width} need {expected} cells, got {actual}")]
    JaggedMatrix {
        rows: usize,
        width: usize,
        expected: usize,
        actual: usize,
    },

    /// Gaussian spread must be finite and strictly positive
    #[error("sigma must be > 0, got {0}")]
    InvalidSigma(f64),

    /// Wiener constant must be finite and non-negative
    #[error("k must be >= 0, got {0}")]
    InvalidK(f64),

    /// Worker ceiling below one
    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkers(usize),

    /// First failing unit of work in a dispatch round
    #[error("task {index} failed: {message}")]
    TaskFailed { index: usize, message: String },

    /// Worker pool could not be created
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// Image decode / encode failure
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed request on the wire
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Config line is not valid JSON for the wire record
    #[error("invalid config line: {0}")]
    Json(#[from] serde_json::Error),
}

impl FilterError {
    /// Caller errors (bad arguments or shapes), as opposed to I/O or runtime failures.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            FilterError::NotPowerOfTwo { .. }
                | FilterError::EmptyInput
                | FilterError::DimensionMismatch { .. }
                | FilterError::JaggedMatrix { .. }
                | FilterError::InvalidSigma(_)
                | FilterError::InvalidK(_)
                | FilterError::InvalidWorkers(_)
        )
    }
}
