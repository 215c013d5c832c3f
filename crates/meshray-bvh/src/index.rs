//! Acceleration structure seam.

use meshray_core::{Ray, Triangle};

use crate::builder::{compute_bounding_boxes_and_centers, compute_bounding_boxes_union, SahBuilder};
use crate::bvh::Bvh;
use crate::config::BvhBuildConfig;
use crate::refit::HierarchyRefitter;
use crate::traverse::{ClosestPrimitiveIntersector, Hit, SingleRayTraverser};

/// A spatial index supporting nearest-hit ray queries and in-place refits.
///
/// The index never owns the triangles; the same slice used for `build` (or
/// an updated copy with identical length and order) must be passed to the
/// other operations.
///
/// Queries take `&self` and may run concurrently. Refits take `&mut self`,
/// so the borrow checker keeps them exclusive.
pub trait SpatialIndex: Send + Sync {
    /// Build a fresh index over `primitives`.
    fn build(primitives: &[Triangle], config: &BvhBuildConfig) -> Self
    where
        Self: Sized;

    /// Update all bounds after primitives moved, keeping topology.
    fn refit_all(&mut self, primitives: &[Triangle]);

    /// Closest hit within the ray's `[t_min, t_max]` range.
    fn traverse(&self, ray: &Ray, primitives: &[Triangle]) -> Option<Hit>;

    /// Number of primitives covered by the index.
    fn primitive_count(&self) -> usize;
}

impl SpatialIndex for Bvh {
    fn build(primitives: &[Triangle], config: &BvhBuildConfig) -> Self {
        let (bboxes, centers) = compute_bounding_boxes_and_centers(primitives);
        let global_bbox = compute_bounding_boxes_union(&bboxes);
        SahBuilder::new(config).build(global_bbox, &bboxes, &centers)
    }

    fn refit_all(&mut self, primitives: &[Triangle]) {
        HierarchyRefitter::new(self).refit_triangles(primitives);
    }

    fn traverse(&self, ray: &Ray, primitives: &[Triangle]) -> Option<Hit> {
        SingleRayTraverser::new(self).traverse(ray, &ClosestPrimitiveIntersector::new(primitives))
    }

    fn primitive_count(&self) -> usize {
        Self::primitive_count(self)
    }
}
