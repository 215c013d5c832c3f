//! Flattened triangle soup of a model plus its hierarchy.

use std::sync::Arc;

use glam::Vec3;
use meshray_bvh::{compute_bounding_boxes_and_centers, Bvh, BvhStats, SpatialIndex};
use meshray_core::constants::INDICES_PER_TRIANGLE;
use meshray_core::{Error as CoreError, Ray, Triangle};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::animation::VertexAnimator;
use crate::bvh_component::{BvhComponentConfig, BvhHitInfo};
use crate::error::Result;
use crate::mesh::{GeometryType, Mesh, MeshHandle};

#[cfg(feature = "profiling")]
use meshray_profiler::{profile_scope, EventCategory};

/// Half-open range `[start, end)` of the primitive array owned by one mesh.
#[derive(Debug, Clone)]
pub struct MeshRange {
    pub mesh: MeshHandle,
    pub start: usize,
    pub end: usize,
}

impl MeshRange {
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub const fn contains(&self, primitive: usize) -> bool {
        self.start <= primitive && primitive < self.end
    }

    /// Range owning `primitive` within `ranges`, which must be sorted by
    /// `start`.
    ///
    /// Picks the last range starting at or before `primitive`, so empty
    /// ranges sharing a start with a populated one are skipped.
    pub fn find(ranges: &[Self], primitive: usize) -> Option<&Self> {
        let upper = ranges.partition_point(|r| r.start <= primitive);
        let range = ranges.get(upper.checked_sub(1)?)?;
        range.contains(primitive).then_some(range)
    }
}

/// Primitives of every triangle mesh of a model laid out back to back, the
/// ranges mapping them to their meshes, and the hierarchy over them.
#[derive(Debug, Clone, Default)]
pub struct BvhData {
    bvh: Bvh,
    primitives: Vec<Triangle>,
    mesh_ranges: Vec<MeshRange>,
}

impl BvhData {
    /// Flatten `meshes` and build a fresh hierarchy.
    ///
    /// Meshes that are not triangle lists are skipped. Fails without
    /// building anything if a mesh has a malformed index buffer.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn build(meshes: &[MeshHandle], config: &BvhComponentConfig) -> Result<Self> {
        let mut mesh_ranges = Vec::with_capacity(meshes.len());
        let mut primitive_count = 0;
        for mesh in meshes {
            if mesh.geometry_type() != GeometryType::Triangles {
                trace!(mesh = mesh.name(), geometry = ?mesh.geometry_type(), "Skipping mesh");
                continue;
            }
            let count = mesh.validate_triangles(config.strict_index_validation)?;
            mesh_ranges.push(MeshRange {
                mesh: Arc::clone(mesh),
                start: primitive_count,
                end: primitive_count + count,
            });
            primitive_count += count;
        }

        let mut primitives = vec![Triangle::default(); primitive_count];
        {
            #[cfg(feature = "profiling")]
            profile_scope!(EventCategory::PrimitiveGather, items = primitive_count);

            split_by_ranges(&mut primitives, &mesh_ranges)
                .into_par_iter()
                .for_each(|(range, out)| gather_triangles(&range.mesh, out, |_, rest| rest));
        }

        let bvh = Bvh::build(&primitives, &config.build);
        debug!(
            meshes = mesh_ranges.len(),
            skipped = meshes.len() - mesh_ranges.len(),
            primitives = primitive_count,
            nodes = bvh.node_count(),
            "Built mesh BVH"
        );

        Ok(Self {
            bvh,
            primitives,
            mesh_ranges,
        })
    }

    /// Re-evaluate every vertex through `animator` and refit the hierarchy.
    ///
    /// Topology, primitive order and mesh ranges stay unchanged.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn refit(&mut self, animator: &dyn VertexAnimator) {
        {
            #[cfg(feature = "profiling")]
            profile_scope!(EventCategory::PrimitiveGather, items = self.primitives.len());

            split_by_ranges(&mut self.primitives, &self.mesh_ranges)
                .into_par_iter()
                .for_each(|(range, out)| {
                    let mesh = &range.mesh;
                    gather_triangles(mesh, out, |index, rest| {
                        animator
                            .local_vertex_position(mesh, index, rest)
                            .unwrap_or(rest)
                    });
                });
        }

        self.bvh.refit_all(&self.primitives);
        trace!(primitives = self.primitives.len(), "Refitted mesh BVH");
    }

    /// Closest hit within `[t_min, t_max]`, attributed to its mesh.
    pub fn intersect(&self, ray: &Ray) -> Option<BvhHitInfo> {
        let hit = self.bvh.traverse(ray, &self.primitives)?;
        let range = MeshRange::find(&self.mesh_ranges, hit.primitive_index)?;
        Some(BvhHitInfo {
            mesh: Some(Arc::clone(&range.mesh)),
            primitive_index: hit.primitive_index - range.start,
            distance: hit.distance(ray),
            t: hit.intersection.t,
            u: hit.intersection.u,
            v: hit.intersection.v,
        })
    }

    /// Whether this data was built from exactly these triangle meshes, in
    /// order.
    pub fn built_from<'a>(&self, meshes: impl IntoIterator<Item = &'a MeshHandle>) -> bool {
        let mut ranges = self.mesh_ranges.iter();
        for mesh in meshes {
            match ranges.next() {
                Some(range) if Arc::ptr_eq(&range.mesh, mesh) => {}
                _ => return false,
            }
        }
        ranges.next().is_none()
    }

    /// Check the range partition and the hierarchy's structural invariants.
    pub fn validate(&self) -> Result<()> {
        let mut expected_start = 0;
        for range in &self.mesh_ranges {
            if range.start != expected_start || range.end < range.start {
                return Err(CoreError::InvalidData(format!(
                    "mesh range [{}, {}) does not continue at {expected_start}",
                    range.start, range.end
                ))
                .into());
            }
            expected_start = range.end;
        }
        if expected_start != self.primitives.len() {
            return Err(CoreError::InvalidData(format!(
                "mesh ranges cover {expected_start} of {} primitives",
                self.primitives.len()
            ))
            .into());
        }

        let (bboxes, _) = compute_bounding_boxes_and_centers(&self.primitives);
        self.bvh.validate(&bboxes)?;
        Ok(())
    }

    pub const fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn primitives(&self) -> &[Triangle] {
        &self.primitives
    }

    pub fn mesh_ranges(&self) -> &[MeshRange] {
        &self.mesh_ranges
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    pub fn stats(&self) -> BvhStats {
        self.bvh.stats()
    }
}

/// Cut `primitives` into the disjoint slices owned by each range.
fn split_by_ranges<'a>(
    mut primitives: &'a mut [Triangle],
    ranges: &'a [MeshRange],
) -> Vec<(&'a MeshRange, &'a mut [Triangle])> {
    let mut slices = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (head, tail) = std::mem::take(&mut primitives).split_at_mut(range.len());
        slices.push((range, head));
        primitives = tail;
    }
    slices
}

/// Write the triangles of `mesh` into `out`, resolving each corner through
/// `position(index, rest)`.
///
/// Triangles past `out.len()` (a truncated partial triangle) are ignored.
fn gather_triangles<P>(mesh: &Mesh, out: &mut [Triangle], position: P)
where
    P: Fn(u32, Vec3) -> Vec3,
{
    let positions = mesh.positions();
    // Indices were bounds-checked when the ranges were built
    let vertex = |index: u32| position(index, positions[index as usize]);

    mesh.visit_indices(|first, batch| {
        let first_triangle = first / INDICES_PER_TRIANGLE;
        for (k, corners) in batch.chunks_exact(INDICES_PER_TRIANGLE).enumerate() {
            let Some(slot) = out.get_mut(first_triangle + k) else {
                return;
            };
            *slot = Triangle::new(vertex(corners[0]), vertex(corners[1]), vertex(corners[2]));
        }
    });
}
