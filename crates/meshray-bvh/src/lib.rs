//! Bounding volume hierarchy for nearest-hit ray queries over triangles.
//!
//! # Architecture
//!
//! - [`Bvh`] - Flat binary tree over primitive bounding boxes with a
//!   permutation array mapping leaves to primitives
//! - [`SahBuilder`] - Top-down binned surface area heuristic construction
//! - [`HierarchyRefitter`] - Bottom-up bounding box update after primitives move
//! - [`SingleRayTraverser`] - Closest-hit traversal with an explicit stack
//! - [`SpatialIndex`] - Seam that lets callers swap the acceleration structure
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use meshray_bvh::{Bvh, BvhBuildConfig, SpatialIndex};
//! use meshray_core::{Ray, Triangle};
//!
//! let triangles = vec![Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y)];
//! let bvh = Bvh::build(&triangles, &BvhBuildConfig::default());
//!
//! let ray = Ray::new(Vec3::new(0.25, 0.25, 10.0), Vec3::NEG_Z);
//! let hit = bvh.traverse(&ray, &triangles).unwrap();
//! assert_eq!(hit.primitive_index, 0);
//! ```

mod builder;
mod bvh;
mod config;
mod index;
mod node;
mod refit;
mod traverse;

pub use builder::{compute_bounding_boxes_and_centers, compute_bounding_boxes_union, SahBuilder};
pub use bvh::{Bvh, BvhStats};
pub use config::BvhBuildConfig;
pub use index::SpatialIndex;
pub use node::BvhNode;
pub use refit::HierarchyRefitter;
pub use traverse::{ClosestPrimitiveIntersector, Hit, PrimitiveIntersector, SingleRayTraverser};
