//! Bottom-up bounding box refitting.

use meshray_core::{Aabb, Triangle};
use tracing::trace;

use crate::bvh::Bvh;
use crate::node::BvhNode;

#[cfg(feature = "profiling")]
use meshray_profiler::{profile_scope, EventCategory};

/// Updates the boxes of an existing hierarchy without touching its topology.
///
/// Leaves are recomputed through a caller-supplied closure, internal nodes
/// become the union of their children. Runs in O(n) over the node count.
pub struct HierarchyRefitter<'a> {
    bvh: &'a mut Bvh,
}

impl<'a> HierarchyRefitter<'a> {
    pub fn new(bvh: &'a mut Bvh) -> Self {
        Self { bvh }
    }

    /// Refit every node.
    ///
    /// `leaf_bounds` receives each leaf's slice of the permutation array and
    /// returns the new box for that leaf.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn refit<F>(&mut self, mut leaf_bounds: F)
    where
        F: FnMut(&[usize]) -> Aabb,
    {
        #[cfg(feature = "profiling")]
        profile_scope!(EventCategory::BvhRefit);

        let Bvh {
            nodes,
            primitive_indices,
        } = &mut *self.bvh;

        // Children are stored after their parent, so a reverse sweep visits
        // every child before the node that contains it.
        for i in (0..nodes.len()).rev() {
            let node = nodes[i];
            let bounds = match (node.children(), node.primitive_range()) {
                (Some((l, r)), _) => nodes[l].bounds().union(&nodes[r].bounds()),
                (None, Some(range)) => leaf_bounds(&primitive_indices[range]),
                (None, None) => continue,
            };
            nodes[i].set_bounds(bounds);
        }

        trace!(nodes = nodes.len(), "Refitted BVH");
    }

    /// Refit against a triangle array, each leaf becoming the union of its
    /// triangles' boxes.
    pub fn refit_triangles(&mut self, primitives: &[Triangle]) {
        self.refit(|indices| {
            indices
                .iter()
                .fold(Aabb::EMPTY, |acc, &p| acc.union(&primitives[p].bounding_box()))
        });
    }
}

impl Bvh {
    /// Overwrite the box of a single leaf.
    ///
    /// Ancestors are not updated; follow up with [`HierarchyRefitter`] or
    /// [`Bvh::propagate_bounds`] once all leaves are written.
    pub fn set_leaf_bounds(&mut self, leaf: usize, bounds: Aabb) -> bool {
        match self.nodes.get_mut(leaf) {
            Some(node) if node.is_leaf() => {
                node.set_bounds(bounds);
                true
            }
            _ => false,
        }
    }

    /// Recompute every internal node from its children, leaving leaves as is.
    pub fn propagate_bounds(&mut self) {
        for i in (0..self.nodes.len()).rev() {
            if let Some((l, r)) = self.nodes[i].children() {
                let bounds = self.nodes[l].bounds().union(&self.nodes[r].bounds());
                self.nodes[i].set_bounds(bounds);
            }
        }
    }

    /// Leaf node indices, in storage order.
    pub fn leaves(&self) -> impl Iterator<Item = (usize, &BvhNode)> + '_ {
        self.nodes.iter().enumerate().filter(|(_, n)| n.is_leaf())
    }
}
