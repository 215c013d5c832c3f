//! End-to-end queries against built and refitted components.

use std::sync::Arc;

use approx::assert_relative_eq;
use glam::Vec3;
use meshray_bvh::BvhBuildConfig;
use meshray_entity::{
    BvhComponent, BvhComponentConfig, BvhError, BvhHitInfo, Mesh, ModelComponent, RayQuery,
};
use meshray_test::fixtures::{
    cube, downward_rays, face_plane_rays, lifted_pose, line_mesh, quad_grid, quad_grid_u16, ray_fan,
    skinned_grid, unit_triangle, wave_animator,
};
use meshray_test::{BruteForceOracle, QueryRegressionTest};
use rayon::prelude::*;

fn built(meshes: &[Arc<Mesh>]) -> BvhComponent {
    let mut component = BvhComponent::new();
    component.rebuild_bvh(meshes).unwrap();
    component
}

#[test]
fn single_triangle_scenario() {
    let mesh = unit_triangle(0.0);
    let component = built(&[Arc::clone(&mesh)]);

    let mut hit = BvhHitInfo::default();
    assert!(component.intersection_test_into(
        Vec3::new(0.25, 0.25, 10.0),
        Vec3::NEG_Z,
        0.0,
        100.0,
        &mut hit
    ));
    assert!(Arc::ptr_eq(hit.mesh.as_ref().unwrap(), &mesh));
    assert_eq!(hit.primitive_index, 0);
    assert_relative_eq!(hit.t, 10.0, epsilon = 1e-5);
    assert_relative_eq!(hit.distance, 10.0, epsilon = 1e-5);

    assert!(!component.intersection_test_into(
        Vec3::new(0.25, 0.25, 10.0),
        Vec3::NEG_Z,
        0.0,
        5.0,
        &mut hit
    ));
}

#[test]
fn mesh_ranges_partition_primitives() {
    // 10 and 15 triangles
    let a = Mesh::triangles(
        (0..30).map(|i| Vec3::new(i as f32, (i % 3) as f32, 0.0)).collect(),
        (0..30u32).collect::<Vec<_>>(),
    )
    .into_handle();
    let b = Mesh::triangles(
        (0..45).map(|i| Vec3::new(i as f32, (i % 3) as f32, 1.0)).collect(),
        (0..45u32).collect::<Vec<_>>(),
    )
    .into_handle();
    let component = built(&[Arc::clone(&a), line_mesh(), Arc::clone(&b)]);

    let ranges: Vec<_> = component
        .mesh_ranges()
        .iter()
        .map(|r| (r.start, r.end))
        .collect();
    assert_eq!(ranges, vec![(0, 10), (10, 25)]);
    assert_eq!(component.primitive_count(), 25);

    let owner = meshray_entity::MeshRange::find(component.mesh_ranges(), 12).unwrap();
    assert!(Arc::ptr_eq(&owner.mesh, &b));
    assert_eq!(12 - owner.start, 2);
    component.data().unwrap().validate().unwrap();
}

#[test]
fn matches_reference_on_mixed_scene() {
    let meshes = vec![
        quad_grid(16, 0.5, 0.0),
        cube(Vec3::new(3.0, 3.0, 2.0), 0.75),
        quad_grid_u16(8, 1.0, -2.0),
        line_mesh(),
        cube(Vec3::new(6.0, 1.5, 1.0), 0.5),
    ];
    let component = built(&meshes);
    let oracle = BruteForceOracle::new(&meshes);
    assert_eq!(component.primitive_count(), oracle.triangle_count());

    let mut queries = downward_rays(-1.0, 9.0, 10.0, 24);
    queries.extend(ray_fan(Vec3::new(-5.0, 4.0, 8.0), Vec3::new(4.0, 4.0, 0.0), 1.2, 16));
    // Grid plane, then bottom and top faces of both cubes
    for z in [0.0, 0.5, 1.25, 1.5, 2.75] {
        queries.extend(face_plane_rays(-2.0, z, 0.0, 9.0, 24));
    }
    let report = QueryRegressionTest::default()
        .run("mixed_scene", &component, &oracle, &queries)
        .unwrap();
    assert!(report.hits > 0);
    assert_eq!(report.misattributed, 0);
}

#[test]
fn rays_in_cube_face_planes_hit_like_reference() {
    let meshes = vec![
        cube(Vec3::new(3.0, 3.0, 2.0), 0.75),
        cube(Vec3::new(6.0, 1.5, 1.0), 0.5),
    ];
    let component = built(&meshes);
    let oracle = BruteForceOracle::new(&meshes);

    // z = 1.25 is the bottom face of the first cube and cuts through the second
    let queries = face_plane_rays(-2.0, 1.25, 0.0, 9.0, 24);
    let report = QueryRegressionTest::default()
        .run("cube_faces", &component, &oracle, &queries)
        .unwrap();
    assert!(report.hits > 0);

    let edge = component
        .intersection_test(Vec3::new(-2.0, 3.0, 1.25), Vec3::X, 0.0, f32::INFINITY)
        .unwrap();
    assert!(Arc::ptr_eq(edge.mesh.as_ref().unwrap(), &meshes[0]));
    assert_relative_eq!(edge.t, 4.25, epsilon = 1e-5);
}

#[test]
fn build_configs_agree_with_reference() {
    let meshes = vec![quad_grid(12, 0.7, 0.0), cube(Vec3::new(4.0, 4.0, 1.0), 1.0)];
    let oracle = BruteForceOracle::new(&meshes);
    let queries = downward_rays(0.0, 8.4, 5.0, 20);

    for build in [
        BvhBuildConfig::default(),
        BvhBuildConfig::default().with_leaf_size(1, 1),
        BvhBuildConfig::default().with_leaf_size(4, 32).with_bin_count(4),
    ] {
        let mut component =
            BvhComponent::with_config(BvhComponentConfig::default().with_build_config(build));
        component.rebuild_bvh(&meshes).unwrap();
        QueryRegressionTest::default()
            .run("build_config", &component, &oracle, &queries)
            .unwrap();
    }
}

#[test]
fn refit_matches_reference_after_animation() {
    let grid = skinned_grid(10, 1.0);
    let model = ModelComponent::new(vec![Arc::clone(&grid), cube(Vec3::new(5.0, 5.0, 4.0), 1.0)]);
    let mut component = built(model.meshes());
    let before = component.bvh_stats().unwrap();

    let pose = lifted_pose(2.5);
    assert!(component.rebuild_animated_bvh(Some(&model), Some(&pose)));
    let after = component.bvh_stats().unwrap();
    assert_eq!(before.node_count, after.node_count);
    assert_eq!(before.leaf_count, after.leaf_count);
    component.data().unwrap().validate().unwrap();

    let oracle = BruteForceOracle::posed(model.meshes(), Some(&pose));
    let queries = downward_rays(0.0, 10.0, 10.0, 20);
    QueryRegressionTest::default()
        .run("lifted_pose", &component, &oracle, &queries)
        .unwrap();

    // Right half now sits at z = 2.5
    let hit = component
        .intersection_test(Vec3::new(8.3, 2.6, 10.0), Vec3::NEG_Z, 0.0, 100.0)
        .unwrap();
    assert_relative_eq!(hit.t, 7.5, epsilon = 1e-4);
}

#[test]
fn repeated_refits_track_wave() {
    let model = ModelComponent::new(vec![quad_grid(12, 1.0, 0.0)]);
    let mut component = built(model.meshes());
    let queries = downward_rays(0.0, 12.0, 10.0, 16);

    for frame in 1..=3 {
        let wave = wave_animator(frame as f32 * 0.5, 0.7);
        assert!(component.rebuild_animated_bvh(Some(&model), Some(&wave)));
        let oracle = BruteForceOracle::posed(model.meshes(), Some(&wave));
        QueryRegressionTest::default()
            .run("wave", &component, &oracle, &queries)
            .unwrap();
    }
}

#[test]
fn malformed_mesh_is_rejected_or_truncated() {
    let mut indices: Vec<u32> = (0..12).collect();
    indices.push(0);
    let mesh = Mesh::triangles(
        (0..12).map(|i| Vec3::new(i as f32, (i % 2) as f32, 0.0)).collect(),
        indices,
    )
    .into_handle();

    let mut strict = built(&[unit_triangle(0.0)]);
    let err = strict.rebuild_bvh(&[Arc::clone(&mesh)]).unwrap_err();
    assert!(matches!(
        err,
        BvhError::MalformedIndexBuffer {
            index_count: 13,
            ..
        }
    ));
    assert!(!strict.has_bvh());

    let lenient_config = BvhComponentConfig::default().with_strict_index_validation(false);
    let mut lenient = BvhComponent::with_config(lenient_config);
    lenient.rebuild_bvh(&[mesh]).unwrap();
    assert_eq!(lenient.primitive_count(), 4);
}

#[test]
fn concurrent_queries_agree() {
    let meshes = vec![quad_grid(20, 0.5, 0.0), cube(Vec3::new(5.0, 5.0, 2.0), 1.5)];
    let component = built(&meshes);
    let queries = downward_rays(0.0, 10.0, 8.0, 32);

    let sequential: Vec<Option<f32>> = queries
        .iter()
        .map(|q| {
            component
                .intersection_test(q.origin, q.direction, q.min_dist, q.max_dist)
                .map(|h| h.t)
        })
        .collect();

    let parallel: Vec<Option<f32>> = queries
        .par_iter()
        .map(|q| {
            component
                .intersection_test(q.origin, q.direction, q.min_dist, q.max_dist)
                .map(|h| h.t)
        })
        .collect();
    assert_eq!(sequential, parallel);

    std::thread::scope(|scope| {
        for chunk in queries.chunks(256) {
            let component = &component;
            scope.spawn(move || {
                let batch = component.intersection_test_batch(chunk);
                assert_eq!(batch.len(), chunk.len());
            });
        }
    });
}

#[test]
fn clear_then_rebuild() {
    let meshes = vec![unit_triangle(-1.0)];
    let mut component = built(&meshes);
    component.clear_bvh();
    component.clear_bvh();
    let query = RayQuery::new(Vec3::new(0.2, 0.2, 0.0), Vec3::NEG_Z);
    assert!(component.intersection_test_batch(&[query])[0].is_none());

    component.rebuild_bvh(&meshes).unwrap();
    let hit = component.intersection_test_batch(&[query])[0].clone().unwrap();
    assert_relative_eq!(hit.t, 1.0, epsilon = 1e-5);
}
