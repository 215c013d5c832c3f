//! Closest-hit ray traversal.

use meshray_core::{Ray, Triangle, TriangleHit};
use tracing::trace;

use crate::bvh::Bvh;

#[cfg(feature = "profiling")]
use meshray_profiler::{profile_scope, EventCategory};

/// Expected depth of well-built trees; the stack grows past it if needed.
const STACK_CAPACITY: usize = 64;

/// Intersects single primitives by their original index.
pub trait PrimitiveIntersector {
    /// Test primitive `primitive_index` against `ray`, honoring its range.
    fn intersect(&self, primitive_index: usize, ray: &Ray) -> Option<TriangleHit>;
}

/// Intersector over a triangle array that keeps the closest hit.
pub struct ClosestPrimitiveIntersector<'a> {
    primitives: &'a [Triangle],
}

impl<'a> ClosestPrimitiveIntersector<'a> {
    pub fn new(primitives: &'a [Triangle]) -> Self {
        Self { primitives }
    }
}

impl PrimitiveIntersector for ClosestPrimitiveIntersector<'_> {
    #[inline]
    fn intersect(&self, primitive_index: usize, ray: &Ray) -> Option<TriangleHit> {
        self.primitives.get(primitive_index)?.intersect(ray)
    }
}

/// Result of a traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// Index into the primitive array the hierarchy was built from.
    pub primitive_index: usize,
    pub intersection: TriangleHit,
}

impl Hit {
    /// Euclidean distance from the ray origin to the hit point.
    ///
    /// Equals `t` for normalized directions.
    #[inline]
    pub fn distance(&self, ray: &Ray) -> f32 {
        self.intersection.t * ray.direction.length()
    }
}

/// Stack-based traversal that visits the nearer child first and prunes any
/// subtree the ray cannot enter before the current closest hit.
///
/// Among hits at exactly the same `t`, the first one found wins; which one
/// that is depends on traversal order.
pub struct SingleRayTraverser<'a> {
    bvh: &'a Bvh,
}

impl<'a> SingleRayTraverser<'a> {
    pub fn new(bvh: &'a Bvh) -> Self {
        Self { bvh }
    }

    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn traverse<I>(&self, ray: &Ray, intersector: &I) -> Option<Hit>
    where
        I: PrimitiveIntersector + ?Sized,
    {
        #[cfg(feature = "profiling")]
        profile_scope!(EventCategory::BvhQuery);

        let nodes = &self.bvh.nodes;
        let root = nodes.first()?;

        let mut ray = *ray;
        let inv_dir = ray.inv_direction();
        let (root_near, _) = root.bounds().intersect_ray_inv(&ray, inv_dir)?;

        let mut closest: Option<Hit> = None;
        let mut stack: Vec<(usize, f32)> = Vec::with_capacity(STACK_CAPACITY);
        stack.push((0, root_near));
        let mut visited = 0usize;

        while let Some((index, t_near)) = stack.pop() {
            if t_near > ray.t_max {
                continue;
            }
            visited += 1;
            let node = &nodes[index];

            if let Some(range) = node.primitive_range() {
                for &p in &self.bvh.primitive_indices[range] {
                    let Some(hit) = intersector.intersect(p, &ray) else {
                        continue;
                    };
                    if closest.map_or(true, |c| hit.t < c.intersection.t) {
                        ray.t_max = hit.t;
                        closest = Some(Hit {
                            primitive_index: p,
                            intersection: hit,
                        });
                    }
                }
                continue;
            }

            let Some((l, r)) = node.children() else {
                continue;
            };
            let hit_l = nodes[l].bounds().intersect_ray_inv(&ray, inv_dir);
            let hit_r = nodes[r].bounds().intersect_ray_inv(&ray, inv_dir);
            match (hit_l, hit_r) {
                (Some((tl, _)), Some((tr, _))) => {
                    // Push the far child first so the near one pops next
                    if tl <= tr {
                        stack.push((r, tr));
                        stack.push((l, tl));
                    } else {
                        stack.push((l, tl));
                        stack.push((r, tr));
                    }
                }
                (Some((tl, _)), None) => stack.push((l, tl)),
                (None, Some((tr, _))) => stack.push((r, tr)),
                (None, None) => {}
            }
        }

        trace!(visited, hit = closest.is_some(), "Traversed BVH");
        closest
    }
}
