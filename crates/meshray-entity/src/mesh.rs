//! Renderable mesh data as seen by the acceleration structures.

use std::sync::Arc;

use glam::Vec3;
use meshray_core::constants::INDICES_PER_TRIANGLE;

use crate::error::{BvhError, Result};

/// Number of indices widened per batch when visiting 16-bit buffers.
const WIDEN_BATCH: usize = INDICES_PER_TRIANGLE * 1024;

/// Shared handle to a mesh. Identity is pointer identity.
pub type MeshHandle = Arc<Mesh>;

/// Primitive topology of a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GeometryType {
    /// Indexed triangle list.
    #[default]
    Triangles,
    /// Indexed line list.
    Lines,
    /// Point cloud.
    Points,
}

/// Index storage, either 16 or 32 bits wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexBuffer {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest index value, `None` if empty.
    #[must_use]
    pub fn max_index(&self) -> Option<u32> {
        match self {
            Self::U16(indices) => indices.iter().copied().max().map(u32::from),
            Self::U32(indices) => indices.iter().copied().max(),
        }
    }
}

impl Default for IndexBuffer {
    fn default() -> Self {
        Self::U32(Vec::new())
    }
}

impl From<Vec<u16>> for IndexBuffer {
    fn from(indices: Vec<u16>) -> Self {
        Self::U16(indices)
    }
}

impl From<Vec<u32>> for IndexBuffer {
    fn from(indices: Vec<u32>) -> Self {
        Self::U32(indices)
    }
}

/// Up to four bone influences of a skinned vertex.
///
/// A negative bone id marks an unused slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    pub bone_ids: [i32; 4],
    pub weights: [f32; 4],
}

impl VertexWeight {
    /// Vertex fully bound to a single bone.
    #[must_use]
    pub const fn single(bone: i32) -> Self {
        Self {
            bone_ids: [bone, -1, -1, -1],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Iterate over used `(bone, weight)` slots.
    pub fn influences(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.bone_ids
            .iter()
            .zip(self.weights)
            .filter_map(|(&bone, weight)| {
                let bone = usize::try_from(bone).ok()?;
                (weight > 0.0).then_some((bone, weight))
            })
    }
}

impl Default for VertexWeight {
    fn default() -> Self {
        Self {
            bone_ids: [-1; 4],
            weights: [0.0; 4],
        }
    }
}

/// Vertex positions plus an index buffer.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    name: String,
    geometry_type: GeometryType,
    positions: Vec<Vec3>,
    indices: IndexBuffer,
    vertex_weights: Vec<VertexWeight>,
}

impl Mesh {
    pub fn new(
        geometry_type: GeometryType,
        positions: Vec<Vec3>,
        indices: impl Into<IndexBuffer>,
    ) -> Self {
        Self {
            name: String::new(),
            geometry_type,
            positions,
            indices: indices.into(),
            vertex_weights: Vec::new(),
        }
    }

    /// Indexed triangle list.
    pub fn triangles(positions: Vec<Vec3>, indices: impl Into<IndexBuffer>) -> Self {
        Self::new(GeometryType::Triangles, positions, indices)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach skinning weights, one per vertex.
    #[must_use]
    pub fn with_vertex_weights(mut self, weights: Vec<VertexWeight>) -> Self {
        self.vertex_weights = weights;
        self
    }

    #[must_use]
    pub fn into_handle(self) -> MeshHandle {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub const fn indices(&self) -> &IndexBuffer {
        &self.indices
    }

    pub fn vertex_weights(&self) -> &[VertexWeight] {
        &self.vertex_weights
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Visit the index buffer as 32-bit values.
    ///
    /// The callback receives the position of the batch's first index and
    /// the batch itself. 32-bit buffers arrive in one batch; 16-bit buffers
    /// are widened in batches whose length is a multiple of 3, so a
    /// triangle never straddles two batches.
    pub fn visit_indices<F>(&self, mut visit: F)
    where
        F: FnMut(usize, &[u32]),
    {
        match &self.indices {
            IndexBuffer::U32(indices) => visit(0, indices),
            IndexBuffer::U16(indices) => {
                let mut wide = Vec::with_capacity(WIDEN_BATCH.min(indices.len()));
                for (batch, chunk) in indices.chunks(WIDEN_BATCH).enumerate() {
                    wide.clear();
                    wide.extend(chunk.iter().copied().map(u32::from));
                    visit(batch * WIDEN_BATCH, &wide);
                }
            }
        }
    }

    /// Check that this triangle mesh can be flattened, returning the number
    /// of triangles it contributes.
    ///
    /// With `strict` set, an index count that is not a multiple of 3 is an
    /// error; otherwise the trailing partial triangle is dropped.
    pub fn validate_triangles(&self, strict: bool) -> Result<usize> {
        let index_count = self.index_count();
        if strict && index_count % INDICES_PER_TRIANGLE != 0 {
            return Err(BvhError::MalformedIndexBuffer {
                mesh: self.name.clone(),
                index_count,
            });
        }
        if let Some(index) = self.indices.max_index() {
            if index as usize >= self.positions.len() {
                return Err(BvhError::IndexOutOfBounds {
                    mesh: self.name.clone(),
                    index,
                    vertex_count: self.positions.len(),
                });
            }
        }
        Ok(index_count / INDICES_PER_TRIANGLE)
    }
}
