//! Flattened bounding volume hierarchy.

use meshray_core::{Aabb, Error, Result};

use crate::node::BvhNode;

/// Summary of a hierarchy's shape.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BvhStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub primitive_count: usize,
    /// Number of nodes on the longest root-to-leaf path.
    pub depth: usize,
    /// Surface area of the root box.
    pub root_surface_area: f32,
}

/// Bounding volume hierarchy over an external primitive array.
///
/// The hierarchy only stores boxes and a permutation of primitive indices;
/// the primitives themselves are owned by the caller and passed in for
/// refitting and traversal.
#[derive(Clone, Debug, Default)]
pub struct Bvh {
    pub(crate) nodes: Vec<BvhNode>,
    pub(crate) primitive_indices: Vec<usize>,
}

impl Bvh {
    pub(crate) fn from_parts(nodes: Vec<BvhNode>, primitive_indices: Vec<usize>) -> Self {
        Self {
            nodes,
            primitive_indices,
        }
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Permutation array referenced by leaves.
    pub fn primitive_indices(&self) -> &[usize] {
        &self.primitive_indices
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Number of primitives the hierarchy was built over.
    pub fn primitive_count(&self) -> usize {
        self.primitive_indices.len()
    }

    /// Bounds of the root node, or an empty box if nothing was built.
    pub fn root_bounds(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, BvhNode::bounds)
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        // Children always follow their parent, so one forward pass suffices.
        let mut depths = vec![0usize; self.nodes.len()];
        depths[0] = 1;
        let mut max_depth = 1;
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some((l, r)) = node.children() {
                depths[l] = depths[i] + 1;
                depths[r] = depths[i] + 1;
                max_depth = max_depth.max(depths[i] + 1);
            }
        }
        max_depth
    }

    pub fn stats(&self) -> BvhStats {
        BvhStats {
            node_count: self.node_count(),
            leaf_count: self.leaf_count(),
            primitive_count: self.primitive_count(),
            depth: self.depth(),
            root_surface_area: self.root_bounds().surface_area(),
        }
    }

    /// Check the structural invariants against per-primitive boxes.
    ///
    /// - every child index is in range and after its parent
    /// - every node's box contains its children or primitives
    /// - leaves reference each primitive exactly once
    pub fn validate(&self, primitive_bboxes: &[Aabb]) -> Result<()> {
        if primitive_bboxes.len() != self.primitive_indices.len() {
            return Err(Error::InvalidData(format!(
                "BVH covers {} primitives, {} boxes given",
                self.primitive_indices.len(),
                primitive_bboxes.len()
            )));
        }
        if self.nodes.is_empty() {
            return if self.primitive_indices.is_empty() {
                Ok(())
            } else {
                Err(Error::InvalidData("primitives without nodes".into()))
            };
        }

        let mut seen = vec![false; self.primitive_indices.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            let bounds = node.bounds();
            if let Some((l, r)) = node.children() {
                if l <= i || r >= self.nodes.len() {
                    return Err(Error::OutOfBounds(format!(
                        "node {i} has children {l}, {r} of {}",
                        self.nodes.len()
                    )));
                }
                for child in [l, r] {
                    if !bounds.contains_aabb(&self.nodes[child].bounds()) {
                        return Err(Error::InvalidData(format!(
                            "node {i} does not contain child {child}"
                        )));
                    }
                }
            } else if let Some(range) = node.primitive_range() {
                let Some(slots) = self.primitive_indices.get(range) else {
                    return Err(Error::OutOfBounds(format!("leaf {i} primitive range")));
                };
                for &p in slots {
                    let Some(slot) = seen.get_mut(p) else {
                        return Err(Error::OutOfBounds(format!("leaf {i} primitive {p}")));
                    };
                    if std::mem::replace(slot, true) {
                        return Err(Error::InvalidData(format!("primitive {p} in two leaves")));
                    }
                    if !bounds.contains_aabb(&primitive_bboxes[p]) {
                        return Err(Error::InvalidData(format!(
                            "leaf {i} does not contain primitive {p}"
                        )));
                    }
                }
            }
        }

        match seen.iter().position(|s| !s) {
            Some(p) => Err(Error::NotFound(format!("primitive {p} is in no leaf"))),
            None => Ok(()),
        }
    }
}
