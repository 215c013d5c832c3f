//! World-level systems over [`BvhComponent`].

use glam::Vec3;
use hecs::{Entity, World};
use tracing::{debug, warn};

use crate::animation::{AnimatedComponent, VertexAnimator};
use crate::bvh_component::{BvhComponent, BvhHitInfo};
use crate::error::BvhError;
use crate::model::ModelComponent;

#[cfg(feature = "profiling")]
use meshray_profiler::{report_index, IndexStats};

/// Rebuild the hierarchy of every entity with both a model and a BVH
/// component. Returns the entities whose rebuild failed.
pub fn rebuild_bvhs(world: &mut World) -> Vec<(Entity, BvhError)> {
    let mut failures = Vec::new();
    let mut rebuilt = 0usize;
    for (entity, (bvh, model)) in world.query_mut::<(&mut BvhComponent, &ModelComponent)>() {
        match bvh.rebuild_bvh(model.meshes()) {
            Ok(()) => rebuilt += 1,
            Err(e) => {
                warn!(?entity, error = %e, "Failed to rebuild entity BVH");
                failures.push((entity, e));
            }
        }
    }
    debug!(rebuilt, failed = failures.len(), "Rebuilt entity BVHs");

    #[cfg(feature = "profiling")]
    report_index!(index_stats(world));

    failures
}

/// Refit the hierarchy of every animated entity. Returns how many were
/// refitted.
pub fn refit_animated_bvhs(world: &mut World) -> usize {
    let mut refitted = 0;
    for (_, (bvh, model, anim)) in world.query_mut::<(
        &mut BvhComponent,
        Option<&ModelComponent>,
        Option<&AnimatedComponent>,
    )>() {
        let animator = anim.map(|a| a as &dyn VertexAnimator);
        if bvh.rebuild_animated_bvh(model, animator) {
            refitted += 1;
        }
    }
    refitted
}

/// Closest hit across all entities with a BVH component.
pub fn raycast(
    world: &World,
    origin: Vec3,
    direction: Vec3,
    min_dist: f32,
    max_dist: f32,
) -> Option<(Entity, BvhHitInfo)> {
    let mut query = world.query::<&BvhComponent>();
    let mut closest: Option<(Entity, BvhHitInfo)> = None;
    for (entity, bvh) in query.iter() {
        // Each hit narrows the range for the remaining entities
        let max = closest.as_ref().map_or(max_dist, |(_, hit)| hit.t);
        if let Some(hit) = bvh.intersection_test(origin, direction, min_dist, max) {
            if closest.as_ref().map_or(true, |(_, c)| hit.t < c.t) {
                closest = Some((entity, hit));
            }
        }
    }
    closest
}

#[cfg(feature = "profiling")]
fn index_stats(world: &World) -> IndexStats {
    let mut stats = IndexStats::default();
    for (_, bvh) in world.query::<&BvhComponent>().iter() {
        stats.primitive_count += bvh.primitive_count() as u64;
        stats.mesh_count += bvh.mesh_ranges().len() as u64;
        stats.node_count += bvh.bvh_stats().map_or(0, |s| s.node_count as u64);
    }
    stats
}
