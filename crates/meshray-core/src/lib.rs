//! Geometry shared by the meshray crates: rays with a parameter interval,
//! axis-aligned boxes, triangles with Möller–Trumbore intersection, and the
//! structural error type.

pub mod error;
pub mod math;
pub mod triangle;

pub use error::{Error, Result};
pub use math::{Aabb, Ray};
pub use triangle::{Triangle, TriangleHit};

/// Geometry constants.
pub mod constants {
    /// Number of indices that make up one triangle in a triangle list.
    pub const INDICES_PER_TRIANGLE: usize = 3;
    /// Rays are treated as parallel to a triangle when the Möller–Trumbore
    /// determinant is below this fraction of `|e1| * |e2| * |direction|`.
    pub const TRIANGLE_EPSILON: f32 = 1e-7;
}
