//! Errors raised while building mesh acceleration structures.

use thiserror::Error;

/// Reasons a BVH rebuild can be rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BvhError {
    /// Index count of a triangle mesh is not a multiple of 3
    #[error("Mesh '{mesh}' has {index_count} indices, which is not a multiple of 3")]
    MalformedIndexBuffer { mesh: String, index_count: usize },

    /// An index points past the end of the vertex array
    #[error("Mesh '{mesh}' references vertex {index} but has only {vertex_count} vertices")]
    IndexOutOfBounds {
        mesh: String,
        index: u32,
        vertex_count: usize,
    },

    /// Structural check of the built hierarchy failed
    #[error(transparent)]
    Core(#[from] meshray_core::Error),
}

/// Result type alias using [`BvhError`].
pub type Result<T> = std::result::Result<T, BvhError>;
