//! Model component.

use crate::mesh::{GeometryType, MeshHandle};

/// The meshes an entity renders, in draw order.
#[derive(Debug, Clone, Default)]
pub struct ModelComponent {
    meshes: Vec<MeshHandle>,
}

impl ModelComponent {
    #[must_use]
    pub fn new(meshes: Vec<MeshHandle>) -> Self {
        Self { meshes }
    }

    pub fn meshes(&self) -> &[MeshHandle] {
        &self.meshes
    }

    pub fn add_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.push(mesh);
    }

    /// Meshes with triangle topology.
    pub fn triangle_meshes(&self) -> impl Iterator<Item = &MeshHandle> + '_ {
        self.meshes
            .iter()
            .filter(|m| m.geometry_type() == GeometryType::Triangles)
    }
}
