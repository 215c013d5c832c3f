//! Animated vertex positions.

use glam::{Mat4, Vec3};

use crate::mesh::Mesh;

/// Resolves the current position of a mesh vertex.
///
/// Returning `None` keeps the rest position from the mesh's vertex array.
pub trait VertexAnimator: Send + Sync {
    fn local_vertex_position(&self, mesh: &Mesh, vertex_index: u32, rest: Vec3) -> Option<Vec3>;
}

impl<F> VertexAnimator for F
where
    F: Fn(&Mesh, u32, Vec3) -> Option<Vec3> + Send + Sync,
{
    fn local_vertex_position(&self, mesh: &Mesh, vertex_index: u32, rest: Vec3) -> Option<Vec3> {
        self(mesh, vertex_index, rest)
    }
}

/// Skeletal pose applied to a model's meshes through linear blend skinning.
#[derive(Debug, Clone, Default)]
pub struct AnimatedComponent {
    bone_matrices: Vec<Mat4>,
}

impl AnimatedComponent {
    /// Pose with `bone_count` identity bones.
    #[must_use]
    pub fn new(bone_count: usize) -> Self {
        Self {
            bone_matrices: vec![Mat4::IDENTITY; bone_count],
        }
    }

    #[must_use]
    pub fn with_bone_matrices(bone_matrices: Vec<Mat4>) -> Self {
        Self { bone_matrices }
    }

    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.bone_matrices
    }

    pub fn bone_count(&self) -> usize {
        self.bone_matrices.len()
    }

    /// Set one bone's matrix. Returns `false` if the bone does not exist.
    pub fn set_bone_matrix(&mut self, bone: usize, matrix: Mat4) -> bool {
        match self.bone_matrices.get_mut(bone) {
            Some(slot) => {
                *slot = matrix;
                true
            }
            None => false,
        }
    }
}

impl VertexAnimator for AnimatedComponent {
    fn local_vertex_position(&self, mesh: &Mesh, vertex_index: u32, rest: Vec3) -> Option<Vec3> {
        let weight = mesh.vertex_weights().get(vertex_index as usize)?;

        let mut position = Vec3::ZERO;
        let mut total = 0.0;
        for (bone, w) in weight.influences() {
            let Some(matrix) = self.bone_matrices.get(bone) else {
                continue;
            };
            position += matrix.transform_point3(rest) * w;
            total += w;
        }

        // Weights are normalized so partially bound vertices keep their scale
        (total > 0.0).then(|| position / total)
    }
}
