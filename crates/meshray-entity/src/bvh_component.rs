//! Per-entity ray query component.

use glam::Vec3;
use meshray_bvh::{BvhBuildConfig, BvhStats};
use meshray_core::Ray;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::animation::VertexAnimator;
use crate::bvh_data::{BvhData, MeshRange};
use crate::error::Result;
use crate::mesh::MeshHandle;
use crate::model::ModelComponent;

#[cfg(feature = "profiling")]
use meshray_profiler::{profile_scope, EventCategory};

/// Configuration for building a [`BvhComponent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhComponentConfig {
    /// Hierarchy construction parameters.
    pub build: BvhBuildConfig,
    /// Reject triangle meshes whose index count is not a multiple of 3.
    /// When disabled, the trailing partial triangle is dropped instead.
    pub strict_index_validation: bool,
}

impl Default for BvhComponentConfig {
    fn default() -> Self {
        Self {
            build: BvhBuildConfig::default(),
            strict_index_validation: true,
        }
    }
}

impl BvhComponentConfig {
    #[must_use]
    pub const fn with_build_config(mut self, build: BvhBuildConfig) -> Self {
        self.build = build;
        self
    }

    #[must_use]
    pub const fn with_strict_index_validation(mut self, strict: bool) -> Self {
        self.strict_index_validation = strict;
        self
    }
}

/// Closest hit reported by [`BvhComponent`].
#[derive(Debug, Clone, Default)]
pub struct BvhHitInfo {
    /// Mesh owning the hit triangle. Always set on reported hits.
    pub mesh: Option<MeshHandle>,
    /// Triangle index local to `mesh`.
    pub primitive_index: usize,
    /// Euclidean distance from the ray origin to the hit point.
    pub distance: f32,
    /// Ray parameter of the hit point.
    pub t: f32,
    /// Barycentric coordinates of the hit point.
    pub u: f32,
    pub v: f32,
}

impl BvhHitInfo {
    /// Hit point on the ray `origin + t * direction`.
    pub fn position(&self, origin: Vec3, direction: Vec3) -> Vec3 {
        origin + direction * self.t
    }
}

/// A single ray query for [`BvhComponent::intersection_test_batch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayQuery {
    pub origin: Vec3,
    pub direction: Vec3,
    pub min_dist: f32,
    pub max_dist: f32,
}

impl RayQuery {
    /// Query over `[0, inf)`.
    pub const fn new(origin: Vec3, direction: Vec3) -> Self {
        Self::with_range(origin, direction, 0.0, f32::INFINITY)
    }

    pub const fn with_range(origin: Vec3, direction: Vec3, min_dist: f32, max_dist: f32) -> Self {
        Self {
            origin,
            direction,
            min_dist,
            max_dist,
        }
    }

    const fn ray(&self) -> Ray {
        Ray::with_range(self.origin, self.direction, self.min_dist, self.max_dist)
    }
}

/// Nearest-hit ray queries against an entity's triangle meshes.
///
/// Starts out without a hierarchy; every query misses until
/// [`rebuild_bvh`](Self::rebuild_bvh) succeeds.
#[derive(Debug, Clone, Default)]
pub struct BvhComponent {
    config: BvhComponentConfig,
    data: Option<BvhData>,
}

impl BvhComponent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: BvhComponentConfig) -> Self {
        Self { config, data: None }
    }

    pub const fn config(&self) -> &BvhComponentConfig {
        &self.config
    }

    /// Discard any existing hierarchy and build a new one over the triangle
    /// meshes in `meshes`.
    ///
    /// On error the component is left without a hierarchy.
    pub fn rebuild_bvh(&mut self, meshes: &[MeshHandle]) -> Result<()> {
        self.clear_bvh();
        match BvhData::build(meshes, &self.config) {
            Ok(data) => {
                self.data = Some(data);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "BVH rebuild failed");
                Err(e)
            }
        }
    }

    /// Update primitive positions from the current animation pose and refit
    /// the hierarchy.
    ///
    /// Does nothing and returns `false` when the model or animator is
    /// missing, no hierarchy has been built, or the model's triangle meshes
    /// differ from the ones the hierarchy was built from.
    pub fn rebuild_animated_bvh(
        &mut self,
        model: Option<&ModelComponent>,
        animator: Option<&dyn VertexAnimator>,
    ) -> bool {
        let (Some(model), Some(animator)) = (model, animator) else {
            trace!("Skipping BVH refit without model or animation");
            return false;
        };
        let Some(data) = self.data.as_mut() else {
            debug!("Skipping BVH refit, nothing built");
            return false;
        };
        if !data.built_from(model.triangle_meshes()) {
            warn!("Model meshes changed since the BVH was built, skipping refit");
            return false;
        }
        data.refit(animator);
        true
    }

    /// Drop the hierarchy and everything built with it.
    pub fn clear_bvh(&mut self) {
        self.data = None;
    }

    /// Closest hit with `t` in `[min_dist, max_dist]`.
    ///
    /// Fills `hit` and returns `true` on a hit; leaves `hit` untouched
    /// otherwise.
    pub fn intersection_test_into(
        &self,
        origin: Vec3,
        direction: Vec3,
        min_dist: f32,
        max_dist: f32,
        hit: &mut BvhHitInfo,
    ) -> bool {
        match self.intersection_test(origin, direction, min_dist, max_dist) {
            Some(found) => {
                *hit = found;
                true
            }
            None => false,
        }
    }

    /// Closest hit with `t` in `[min_dist, max_dist]`.
    ///
    /// The direction need not be normalized; `t` is in units of its length.
    pub fn intersection_test(
        &self,
        origin: Vec3,
        direction: Vec3,
        min_dist: f32,
        max_dist: f32,
    ) -> Option<BvhHitInfo> {
        let data = self.data.as_ref()?;
        data.intersect(&Ray::with_range(origin, direction, min_dist, max_dist))
    }

    /// Answer many queries in parallel. Results are in query order.
    pub fn intersection_test_batch(&self, queries: &[RayQuery]) -> Vec<Option<BvhHitInfo>> {
        #[cfg(feature = "profiling")]
        profile_scope!(EventCategory::BvhBatchQuery, items = queries.len());

        let Some(data) = self.data.as_ref() else {
            return vec![None; queries.len()];
        };
        queries.par_iter().map(|q| data.intersect(&q.ray())).collect()
    }

    pub const fn has_bvh(&self) -> bool {
        self.data.is_some()
    }

    pub const fn data(&self) -> Option<&BvhData> {
        self.data.as_ref()
    }

    pub fn primitive_count(&self) -> usize {
        self.data.as_ref().map_or(0, BvhData::primitive_count)
    }

    pub fn mesh_ranges(&self) -> &[MeshRange] {
        self.data
            .as_ref()
            .map(BvhData::mesh_ranges)
            .unwrap_or_default()
    }

    pub fn bvh_stats(&self) -> Option<BvhStats> {
        self.data.as_ref().map(BvhData::stats)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::animation::AnimatedComponent;
    use crate::error::BvhError;
    use crate::mesh::{Mesh, VertexWeight};
    use approx::assert_relative_eq;
    use glam::Mat4;

    fn unit_triangle(z: f32) -> MeshHandle {
        Mesh::triangles(
            vec![Vec3::new(0.0, 0.0, z), Vec3::new(1.0, 0.0, z), Vec3::new(0.0, 1.0, z)],
            vec![0u32, 1, 2],
        )
        .into_handle()
    }

    fn built(meshes: &[MeshHandle]) -> BvhComponent {
        let mut component = BvhComponent::new();
        component.rebuild_bvh(meshes).unwrap();
        component
    }

    #[test]
    fn component_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BvhComponent>();
    }

    #[test]
    fn single_triangle_hit() {
        let mesh = unit_triangle(0.0);
        let component = built(&[Arc::clone(&mesh)]);

        let hit = component
            .intersection_test(Vec3::new(0.25, 0.25, 10.0), Vec3::NEG_Z, 0.0, 100.0)
            .unwrap();
        assert!(Arc::ptr_eq(hit.mesh.as_ref().unwrap(), &mesh));
        assert_eq!(hit.primitive_index, 0);
        assert_relative_eq!(hit.t, 10.0, epsilon = 1e-5);
        assert_relative_eq!(hit.distance, 10.0, epsilon = 1e-5);
        assert_relative_eq!(hit.u, 0.25, epsilon = 1e-5);
        assert_relative_eq!(hit.v, 0.25, epsilon = 1e-5);
        let p = hit.position(Vec3::new(0.25, 0.25, 10.0), Vec3::NEG_Z);
        assert!(p.abs_diff_eq(Vec3::new(0.25, 0.25, 0.0), 1e-5));
    }

    #[test]
    fn queries_miss_before_build_and_after_clear() {
        let mut component = BvhComponent::new();
        let mut hit = BvhHitInfo::default();
        assert!(!component.intersection_test_into(Vec3::Z, Vec3::NEG_Z, 0.0, 10.0, &mut hit));
        assert!(hit.mesh.is_none());

        component.rebuild_bvh(&[unit_triangle(0.0)]).unwrap();
        let origin = Vec3::new(0.2, 0.2, 1.0);
        assert!(component.intersection_test_into(origin, Vec3::NEG_Z, 0.0, 10.0, &mut hit));
        assert!(hit.mesh.is_some());

        component.clear_bvh();
        component.clear_bvh();
        assert!(!component.has_bvh());
        assert_eq!(component.primitive_count(), 0);
        assert!(component.mesh_ranges().is_empty());
        assert!(component.bvh_stats().is_none());
        assert!(component.intersection_test(origin, Vec3::NEG_Z, 0.0, 10.0).is_none());
    }

    #[test]
    fn miss_leaves_out_parameter_untouched() {
        let component = built(&[unit_triangle(0.0)]);
        let mut hit = BvhHitInfo {
            t: 42.0,
            ..BvhHitInfo::default()
        };
        assert!(!component.intersection_test_into(
            Vec3::new(5.0, 5.0, 1.0),
            Vec3::NEG_Z,
            0.0,
            10.0,
            &mut hit
        ));
        assert_relative_eq!(hit.t, 42.0);
    }

    #[test]
    fn range_limits_hits() {
        let component = built(&[unit_triangle(0.0)]);
        let origin = Vec3::new(0.25, 0.25, 10.0);
        assert!(component.intersection_test(origin, Vec3::NEG_Z, 0.0, 5.0).is_none());
        assert!(component.intersection_test(origin, Vec3::NEG_Z, 11.0, 20.0).is_none());
        assert!(component.intersection_test(origin, Vec3::NEG_Z, 9.5, 10.5).is_some());
        assert!(component.intersection_test(origin, Vec3::NEG_Z, 20.0, 5.0).is_none());
        assert!(component.intersection_test(origin, Vec3::ZERO, 0.0, 100.0).is_none());
    }

    #[test]
    fn nearest_mesh_wins() {
        let far = unit_triangle(-5.0);
        let near = unit_triangle(-2.0);
        let component = built(&[Arc::clone(&far), Arc::clone(&near)]);

        let hit = component
            .intersection_test(Vec3::new(0.2, 0.2, 0.0), Vec3::NEG_Z, 0.0, f32::INFINITY)
            .unwrap();
        assert!(Arc::ptr_eq(hit.mesh.as_ref().unwrap(), &near));
        assert_relative_eq!(hit.t, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn rebuild_replaces_previous_state() {
        let first = unit_triangle(0.0);
        let second = unit_triangle(3.0);
        let mut component = built(&[Arc::clone(&first)]);
        component.rebuild_bvh(&[Arc::clone(&second)]).unwrap();

        assert_eq!(component.mesh_ranges().len(), 1);
        assert!(Arc::ptr_eq(&component.mesh_ranges()[0].mesh, &second));
        let hit = component
            .intersection_test(Vec3::new(0.2, 0.2, 10.0), Vec3::NEG_Z, 0.0, 100.0)
            .unwrap();
        assert_relative_eq!(hit.t, 7.0, epsilon = 1e-5);
    }

    #[test]
    fn failed_rebuild_leaves_component_cleared() {
        let bad = Mesh::triangles(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0u32, 1]).into_handle();
        let mut component = built(&[unit_triangle(0.0)]);
        let err = component.rebuild_bvh(&[bad]).unwrap_err();
        assert!(matches!(err, BvhError::MalformedIndexBuffer { .. }));
        assert!(!component.has_bvh());
    }

    #[test]
    fn empty_model_builds_empty_hierarchy() {
        let component = built(&[]);
        assert!(component.has_bvh());
        assert_eq!(component.primitive_count(), 0);
        assert!(component
            .intersection_test(Vec3::ZERO, Vec3::Z, 0.0, f32::INFINITY)
            .is_none());
    }

    #[test]
    fn animated_refit_follows_pose() {
        let mesh = Mesh::triangles(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0u32, 1, 2])
            .with_vertex_weights(vec![VertexWeight::single(0); 3])
            .into_handle();
        let model = ModelComponent::new(vec![Arc::clone(&mesh)]);
        let mut component = built(model.meshes());
        let nodes = component.bvh_stats().unwrap().node_count;

        let anim = AnimatedComponent::with_bone_matrices(vec![Mat4::from_translation(
            Vec3::new(0.0, 0.0, -4.0),
        )]);
        assert!(component.rebuild_animated_bvh(Some(&model), Some(&anim)));
        assert_eq!(component.bvh_stats().unwrap().node_count, nodes);

        let hit = component
            .intersection_test(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z, 0.0, 100.0)
            .unwrap();
        assert_relative_eq!(hit.t, 5.0, epsilon = 1e-5);
        component.data().unwrap().validate().unwrap();
    }

    #[test]
    fn animated_refit_requires_inputs_and_hierarchy() {
        let model = ModelComponent::new(vec![unit_triangle(0.0)]);
        let anim = AnimatedComponent::new(1);

        let mut empty = BvhComponent::new();
        assert!(!empty.rebuild_animated_bvh(Some(&model), Some(&anim)));
        assert!(!empty.has_bvh());

        let mut component = built(model.meshes());
        assert!(!component.rebuild_animated_bvh(None, Some(&anim)));
        assert!(!component.rebuild_animated_bvh(Some(&model), None));

        let other = ModelComponent::new(vec![unit_triangle(0.0)]);
        assert!(!component.rebuild_animated_bvh(Some(&other), Some(&anim)));
    }

    #[test]
    fn batch_matches_single_queries() {
        let meshes: Vec<_> = (0..4).map(|i| unit_triangle(-(i as f32))).collect();
        let component = built(&meshes);
        let queries: Vec<_> = (0..32)
            .map(|i| {
                let origin = Vec3::new((i % 8) as f32 * 0.15, (i / 8) as f32 * 0.3, 1.0);
                RayQuery::with_range(origin, Vec3::NEG_Z, 0.0, 2.5)
            })
            .collect();

        let batch = component.intersection_test_batch(&queries);
        assert_eq!(batch.len(), queries.len());
        for (query, result) in queries.iter().zip(&batch) {
            let single = component.intersection_test(
                query.origin,
                query.direction,
                query.min_dist,
                query.max_dist,
            );
            assert_eq!(single.map(|h| h.t), result.as_ref().map(|h| h.t));
        }
        assert!(BvhComponent::new()
            .intersection_test_batch(&queries)
            .iter()
            .all(Option::is_none));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: BvhComponentConfig =
            serde_json::from_str(r#"{ "build": { "bin_count": 8 } }"#).unwrap();
        assert!(config.strict_index_validation);
        assert_eq!(config.build.bin_count, 8);
        assert_eq!(config.build.min_leaf_size, BvhBuildConfig::default().min_leaf_size);
        assert_eq!(config.build.max_leaf_size, BvhBuildConfig::default().max_leaf_size);

        let empty: BvhComponentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, BvhComponentConfig::default());
    }

    #[test]
    fn config_survives_serde_round_trip() {
        let config = BvhComponentConfig::default()
            .with_strict_index_validation(false)
            .with_build_config(BvhBuildConfig::default().with_leaf_size(1, 4));
        let json = serde_json::to_string(&config).unwrap();
        let back: BvhComponentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(BvhComponent::with_config(back).config().build.max_leaf_size, 4);
    }
}
