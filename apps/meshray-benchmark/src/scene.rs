//! Procedural benchmark scene.

use glam::{Mat4, Vec3};
use meshray_entity::{AnimatedComponent, BvhComponent, Mesh, MeshHandle, ModelComponent, World};
use meshray_test::fixtures::{cube, skinned_grid};

use crate::config::BenchConfig;

/// Gap between neighbouring entity tiles.
const TILE_GAP: f32 = 2.0;
/// Peak displacement of the animated half of each grid.
const WAVE_AMPLITUDE: f32 = 1.5;

/// A world of skinned grids laid out in a square, each topped by a cube.
pub struct Scene {
    pub world: World,
    /// Side length of the square covered by all tiles.
    pub extent: f32,
}

impl Scene {
    pub fn build(config: &BenchConfig) -> Self {
        let mut world = World::new();
        let tiles_per_row = (config.entities as f32).sqrt().ceil().max(1.0) as usize;
        let tile = config.grid_size as f32 + TILE_GAP;
        let grid = skinned_grid(config.grid_size, 1.0);

        for i in 0..config.entities {
            let offset = Vec3::new(
                (i % tiles_per_row) as f32 * tile,
                (i / tiles_per_row) as f32 * tile,
                0.0,
            );
            let half = config.grid_size as f32 * 0.5;
            let model = ModelComponent::new(vec![
                translated(&grid, offset),
                cube(offset + Vec3::new(half, half, 3.0), 1.0),
            ]);
            world.spawn((model, BvhComponent::new(), AnimatedComponent::new(2)));
        }

        Self {
            world,
            extent: tiles_per_row as f32 * tile,
        }
    }

    /// Advance every entity's pose to `frame`.
    pub fn animate(&mut self, frame: u64) {
        for (entity, anim) in self.world.query_mut::<&mut AnimatedComponent>() {
            let phase = frame as f32 * 0.1 + entity.id() as f32;
            let lift = Mat4::from_translation(Vec3::Z * phase.sin() * WAVE_AMPLITUDE);
            anim.set_bone_matrix(1, lift);
        }
    }
}

/// Copy of `mesh` moved by `offset`, keeping indices and skinning weights.
fn translated(mesh: &Mesh, offset: Vec3) -> MeshHandle {
    let positions = mesh.positions().iter().map(|&p| p + offset).collect();
    Mesh::new(mesh.geometry_type(), positions, mesh.indices().clone())
        .with_name(mesh.name())
        .with_vertex_weights(mesh.vertex_weights().to_vec())
        .into_handle()
}
