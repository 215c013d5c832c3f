//! Flat BVH node layout.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use meshray_core::Aabb;

/// A node of the flattened hierarchy (32 bytes, GPU friendly).
///
/// Leaves have `primitive_count > 0` and reference the run
/// `first_child_or_primitive..first_child_or_primitive + primitive_count`
/// of [`crate::Bvh::primitive_indices`]. Internal nodes have
/// `primitive_count == 0`; their children live at `first_child_or_primitive`
/// and `first_child_or_primitive + 1`, always after the parent in the array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BvhNode {
    pub min: Vec3,
    pub first_child_or_primitive: u32,
    pub max: Vec3,
    pub primitive_count: u32,
}

impl BvhNode {
    /// Create a leaf over a run of the permutation array.
    #[inline]
    pub fn leaf(bounds: Aabb, first_primitive: usize, primitive_count: usize) -> Self {
        debug_assert!(primitive_count > 0);
        Self {
            min: bounds.min,
            first_child_or_primitive: first_primitive as u32,
            max: bounds.max,
            primitive_count: primitive_count as u32,
        }
    }

    /// Create an internal node whose children start at `first_child`.
    #[inline]
    pub fn internal(bounds: Aabb, first_child: usize) -> Self {
        Self {
            min: bounds.min,
            first_child_or_primitive: first_child as u32,
            max: bounds.max,
            primitive_count: 0,
        }
    }

    #[inline]
    pub const fn is_leaf(&self) -> bool {
        self.primitive_count != 0
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.min, self.max)
    }

    #[inline]
    pub fn set_bounds(&mut self, bounds: Aabb) {
        self.min = bounds.min;
        self.max = bounds.max;
    }

    /// Indices of both children, if this is an internal node.
    #[inline]
    pub fn children(&self) -> Option<(usize, usize)> {
        (!self.is_leaf()).then(|| {
            let first = self.first_child_or_primitive as usize;
            (first, first + 1)
        })
    }

    /// Range into the permutation array, if this is a leaf.
    #[inline]
    pub fn primitive_range(&self) -> Option<std::ops::Range<usize>> {
        self.is_leaf().then(|| {
            let first = self.first_child_or_primitive as usize;
            first..first + self.primitive_count as usize
        })
    }
}
