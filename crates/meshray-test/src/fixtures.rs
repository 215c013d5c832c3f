//! Procedural meshes, animators and ray sets used across tests and
//! benchmarks.

use glam::{Mat4, Vec3};
use meshray_entity::{
    AnimatedComponent, GeometryType, Mesh, MeshHandle, RayQuery, VertexAnimator, VertexWeight,
};

/// Right triangle with legs along +X and +Y at height `z`.
pub fn unit_triangle(z: f32) -> MeshHandle {
    Mesh::triangles(
        vec![Vec3::new(0.0, 0.0, z), Vec3::new(1.0, 0.0, z), Vec3::new(0.0, 1.0, z)],
        vec![0u32, 1, 2],
    )
    .with_name("unit_triangle")
    .into_handle()
}

/// `n * n` quads (`2 * n * n` triangles) covering `[0, n * spacing]` in XY
/// at height `z`, with 32-bit indices.
pub fn quad_grid(n: usize, spacing: f32, z: f32) -> MeshHandle {
    let (positions, indices) = grid_geometry(n, spacing, z);
    Mesh::triangles(positions, indices)
        .with_name(format!("grid_{n}"))
        .into_handle()
}

/// Same layout as [`quad_grid`] but with 16-bit indices.
pub fn quad_grid_u16(n: usize, spacing: f32, z: f32) -> MeshHandle {
    let (positions, indices) = grid_geometry(n, spacing, z);
    let indices: Vec<u16> = indices.into_iter().map(|i| i as u16).collect();
    Mesh::triangles(positions, indices)
        .with_name(format!("grid_u16_{n}"))
        .into_handle()
}

/// Grid whose vertices are bound to bone 0 on the left half and bone 1 on
/// the right half.
pub fn skinned_grid(n: usize, spacing: f32) -> MeshHandle {
    let (positions, indices) = grid_geometry(n, spacing, 0.0);
    let half = n as f32 * spacing * 0.5;
    let weights = positions
        .iter()
        .map(|p| VertexWeight::single(i32::from(p.x > half)))
        .collect();
    Mesh::triangles(positions, indices)
        .with_name(format!("skinned_grid_{n}"))
        .with_vertex_weights(weights)
        .into_handle()
}

/// Axis-aligned cube made of 12 triangles.
pub fn cube(center: Vec3, half_extent: f32) -> MeshHandle {
    let corners: Vec<Vec3> = (0..8)
        .map(|i| {
            let sign = |bit: u32| if i & bit == 0 { -1.0 } else { 1.0 };
            center + Vec3::new(sign(1), sign(2), sign(4)) * half_extent
        })
        .collect();
    let indices = vec![
        0u32, 1, 3, 0, 3, 2, // -Z
        4, 6, 7, 4, 7, 5, // +Z
        0, 4, 5, 0, 5, 1, // -Y
        2, 3, 7, 2, 7, 6, // +Y
        0, 2, 6, 0, 6, 4, // -X
        1, 5, 7, 1, 7, 3, // +X
    ];
    Mesh::triangles(corners, indices)
        .with_name("cube")
        .into_handle()
}

/// Line list that BVH builds must skip.
pub fn line_mesh() -> MeshHandle {
    Mesh::new(
        GeometryType::Lines,
        vec![Vec3::new(-10.0, 0.5, 0.0), Vec3::new(10.0, 0.5, 0.0)],
        vec![0u32, 1],
    )
    .with_name("lines")
    .into_handle()
}

/// Pose for [`skinned_grid`] that lifts the right half by `height`.
pub fn lifted_pose(height: f32) -> AnimatedComponent {
    AnimatedComponent::with_bone_matrices(vec![
        Mat4::IDENTITY,
        Mat4::from_translation(Vec3::new(0.0, 0.0, height)),
    ])
}

/// Animator displacing every vertex along Z by a sine of its X position.
pub fn wave_animator(amplitude: f32, frequency: f32) -> impl VertexAnimator {
    move |_: &Mesh, _: u32, rest: Vec3| {
        Some(rest + Vec3::Z * (rest.x * frequency).sin() * amplitude)
    }
}

/// Grid of `count * count` rays pointing down -Z from height `z` over the
/// square `[min, max]` in XY.
///
/// Sample points are offset by an irrational-ish fraction so rays rarely
/// graze triangle edges of axis-aligned grids.
pub fn downward_rays(min: f32, max: f32, z: f32, count: usize) -> Vec<RayQuery> {
    let step = (max - min) / count as f32;
    let mut rays = Vec::with_capacity(count * count);
    for j in 0..count {
        for i in 0..count {
            let origin = Vec3::new(
                min + (i as f32 + 0.371) * step,
                min + (j as f32 + 0.613) * step,
                z,
            );
            rays.push(RayQuery::new(origin, Vec3::NEG_Z));
        }
    }
    rays
}

/// `count` rays travelling along +X from `x`, at height `z`, spread over
/// `[min_y, max_y]`.
///
/// With `z` on a face of a box (a cube side, a grid plane) the rays run
/// inside that face's plane.
pub fn face_plane_rays(x: f32, z: f32, min_y: f32, max_y: f32, count: usize) -> Vec<RayQuery> {
    let step = (max_y - min_y) / count as f32;
    (0..count)
        .map(|i| {
            let origin = Vec3::new(x, min_y + (i as f32 + 0.371) * step, z);
            RayQuery::new(origin, Vec3::X)
        })
        .collect()
}

/// Rays from `eye` through a `count * count` fan aimed at `target`.
pub fn ray_fan(eye: Vec3, target: Vec3, spread: f32, count: usize) -> Vec<RayQuery> {
    let forward = (target - eye).normalize();
    let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
    let up = right.cross(forward);
    let mut rays = Vec::with_capacity(count * count);
    for j in 0..count {
        for i in 0..count {
            let sx = (i as f32 + 0.5) / count as f32 - 0.5;
            let sy = (j as f32 + 0.5) / count as f32 - 0.5;
            let direction = forward + (right * sx + up * sy) * spread;
            rays.push(RayQuery::new(eye, direction));
        }
    }
    rays
}

fn grid_geometry(n: usize, spacing: f32, z: f32) -> (Vec<Vec3>, Vec<u32>) {
    let stride = n + 1;
    let positions = (0..stride * stride)
        .map(|i| Vec3::new((i % stride) as f32 * spacing, (i / stride) as f32 * spacing, z))
        .collect();
    let mut indices = Vec::with_capacity(n * n * 6);
    for y in 0..n {
        for x in 0..n {
            let v = (y * stride + x) as u32;
            let s = stride as u32;
            indices.extend([v, v + 1, v + s + 1, v, v + s + 1, v + s]);
        }
    }
    (positions, indices)
}
