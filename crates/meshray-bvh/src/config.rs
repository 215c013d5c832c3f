//! BVH construction parameters.

use serde::{Deserialize, Serialize};

/// Parameters for surface area heuristic construction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhBuildConfig {
    /// Nodes with at most this many primitives always become leaves.
    pub min_leaf_size: usize,
    /// Nodes with more primitives than this are always split.
    pub max_leaf_size: usize,
    /// Number of centroid bins evaluated per axis.
    pub bin_count: usize,
    /// Relative cost of visiting an internal node.
    pub traversal_cost: f32,
    /// Relative cost of one ray-primitive test.
    pub intersection_cost: f32,
}

impl Default for BvhBuildConfig {
    fn default() -> Self {
        Self {
            min_leaf_size: 2,
            max_leaf_size: 8,
            bin_count: 16,
            traversal_cost: 1.0,
            intersection_cost: 1.0,
        }
    }
}

impl BvhBuildConfig {
    /// Set the leaf size bounds.
    pub fn with_leaf_size(mut self, min: usize, max: usize) -> Self {
        self.min_leaf_size = min.max(1);
        self.max_leaf_size = max.max(self.min_leaf_size);
        self
    }

    /// Set the number of SAH bins per axis.
    pub fn with_bin_count(mut self, bins: usize) -> Self {
        self.bin_count = bins.max(2);
        self
    }

    /// Set the traversal and intersection cost ratio.
    pub fn with_costs(mut self, traversal: f32, intersection: f32) -> Self {
        self.traversal_cost = traversal;
        self.intersection_cost = intersection;
        self
    }

    /// Leaf bounds clamped to sane values, in case the fields were set directly.
    pub(crate) fn leaf_bounds(&self) -> (usize, usize) {
        let min = self.min_leaf_size.max(1);
        (min, self.max_leaf_size.max(min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_values() {
        let config = BvhBuildConfig::default()
            .with_leaf_size(0, 0)
            .with_bin_count(1);
        assert_eq!(config.min_leaf_size, 1);
        assert_eq!(config.max_leaf_size, 1);
        assert_eq!(config.bin_count, 2);
    }

    #[test]
    fn direct_field_edits_are_clamped() {
        let config = BvhBuildConfig {
            min_leaf_size: 6,
            max_leaf_size: 3,
            ..Default::default()
        };
        assert_eq!(config.leaf_bounds(), (6, 6));
    }
}
