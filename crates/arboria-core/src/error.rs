use thiserror::Error;

/// Error type for tensor construction and indexing.
#[derive(Debug, Error, Clone)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Index out of bounds: index {index} for axis {axis} with size {size}")]
    IndexOutOfBounds {
        index: usize,
        axis: usize,
        size: usize,
    },

    #[error("Invalid axis: {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

pub type TensorResult<T> = Result<T, TensorError>;

/// Error surface for the arboria model API.
///
/// Three kinds only, matching the three ways a caller can fail to use a
/// model correctly: a malformed buffer, an out-of-range hyperparameter, or
/// an internal training failure.
#[derive(Debug, Error, Clone)]
pub enum ArboriaError {
    #[error("type error: {0}")]
    TypeError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("training failed: {0}")]
    TrainFailed(String),
}

pub type ArboriaResult<T> = Result<T, ArboriaError>;

impl From<TensorError> for ArboriaError {
    fn from(e: TensorError) -> Self {
        match e {
            TensorError::InvalidAxis { .. } | TensorError::DimensionMismatch(_) => {
                ArboriaError::TypeError(e.to_string())
            }
            _ => ArboriaError::InvalidArgument(e.to_string()),
        }
    }
}
