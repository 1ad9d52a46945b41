use std::collections::TryReserveError;
use thiserror::Error;

/// Error types for the blockmeans library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An operation needs a step that has not been performed yet
    /// (for example querying results before `compute()`)
    #[error("No data: {0}")]
    NoData(String),

    /// Caller-supplied sizes or values violate a precondition
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A caller-supplied buffer or leading dimension is too small.
    /// `required` is the size that would have been accepted.
    #[error("Invalid array dimension: {message} (required: {required})")]
    InvalidArrayDimension { required: usize, message: String },

    /// The configuration is internally inconsistent and cannot be corrected
    #[error("Incompatible options: {0}")]
    IncompatibleOptions(String),

    /// Allocation of a scratch buffer failed
    #[error("Memory allocation failed")]
    MemoryError,

    /// The requested result is not produced by this query type
    #[error("Unknown query: {0}")]
    UnknownQuery(String),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::MemoryError
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::InvalidInput(format!("array shape: {}", err))
    }
}

/// Non-fatal conditions reported alongside a successful result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KMeansWarning {
    /// `n_clusters` exceeded the number of samples and was reduced
    #[error("n_clusters = {requested} exceeds n_samples, using n_clusters = {used}")]
    ClustersClamped { requested: usize, used: usize },

    /// Repeated restarts from supplied centres are redundant, so only one run is made
    #[error("n_init = {requested} ignored with supplied initial centres, using n_init = 1")]
    NInitIgnored { requested: usize },

    /// The best run stopped at the iteration limit without converging
    #[error("the maximum number of iterations ({max_iter}) was reached")]
    MaxIterReached { max_iter: usize },
}

/// Allocate a vector of `len` copies of `value`, reporting allocation
/// failure as [`Error::MemoryError`] instead of aborting.
pub(crate) fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, value);
    Ok(v)
}
