//! Error types for the grid index.

use thiserror::Error;

/// Result type alias using [`GridError`].
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors that can occur when building or checking a [`FluidGrid`](crate::FluidGrid).
///
/// A missing key is not an error; lookups return `Option`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("invalid branching order {order}: must be in {}..={}", crate::MIN_ORDER, crate::MAX_ORDER)]
    InvalidOrder { order: usize },

    #[error("cannot reserve {requested} node slots")]
    CapacityOverflow { requested: usize },

    #[error("grid corrupted: {0}")]
    Corrupted(String),
}
