//! Error types shared by the geometry and hierarchy crates.

use thiserror::Error;

/// Structural errors found while checking geometry or a hierarchy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Data violates an invariant
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// An expected element is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// An index points outside its array
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
