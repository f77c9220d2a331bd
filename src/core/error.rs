use thiserror::Error;

/// Errors that can occur in layer construction, forward passes, and
/// checkpoint I/O.
///
/// Numerical ill-conditioning (near-singular inverses, tiny singular
/// values) is never reported through this type: those paths are
/// epsilon-stabilized so a training run survives recoverable inputs.
/// The variants here mark configuration bugs and genuine backend or
/// filesystem failures.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Array shape does not match what a layer or model was built for
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Scalar dimension mismatch
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A weight vector does not match the sequence it is meant to drive.
    /// A sequence of N matrices needs exactly N - 1 interpolation weights.
    #[error("weight vector of length {got} cannot drive a sequence of {sequence} matrices (expected {expected})")]
    WeightLength {
        sequence: usize,
        expected: usize,
        got: usize,
    },

    /// Invalid configuration value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Parameter name missing from a state dict during restore
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// Numerical error from ndarray-linalg
    #[error("linear algebra error: {0}")]
    Linalg(String),

    /// Filesystem error while reading or writing a checkpoint
    #[error("i/o error: {0}")]
    Io(String),

    /// Checkpoint could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convert ndarray-linalg errors to Error
impl From<ndarray_linalg::error::LinalgError> for Error {
    fn from(err: ndarray_linalg::error::LinalgError) -> Self {
        Error::Linalg(format!("{:?}", err))
    }
}

/// Result type for all fallible operations in this crate
pub type Result<T> = std::result::Result<T, Error>;
