//! Top-down BVH construction using a binned Surface Area Heuristic.

use glam::Vec3;
use meshray_core::{Aabb, Triangle};
use rayon::prelude::*;
use tracing::debug;

use crate::bvh::Bvh;
use crate::config::BvhBuildConfig;
use crate::node::BvhNode;

#[cfg(feature = "profiling")]
use meshray_profiler::{profile_scope, EventCategory};

/// Compute the bounding box and centroid of every primitive.
pub fn compute_bounding_boxes_and_centers(primitives: &[Triangle]) -> (Vec<Aabb>, Vec<Vec3>) {
    primitives
        .par_iter()
        .map(|tri| (tri.bounding_box(), tri.centroid()))
        .unzip()
}

/// Union of a set of bounding boxes.
pub fn compute_bounding_boxes_union(bboxes: &[Aabb]) -> Aabb {
    bboxes.iter().fold(Aabb::EMPTY, |acc, b| acc.union(b))
}

#[derive(Clone, Copy)]
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Default for Bin {
    fn default() -> Self {
        Self {
            bounds: Aabb::EMPTY,
            count: 0,
        }
    }
}

/// Chosen partition of a node's primitives.
#[derive(Clone, Copy, Debug)]
enum Split {
    /// Primitives whose centroid falls into a bin `<= last_left_bin` go left.
    Binned {
        axis: usize,
        last_left_bin: usize,
        bin_count: usize,
        axis_min: f32,
        scale: f32,
    },
    /// Median split along an axis by centroid order.
    Median { axis: usize },
}

/// Binned SAH builder.
///
/// Every axis is evaluated with `bin_count` centroid bins. Nodes are split
/// until they reach `min_leaf_size`, or until the best split is estimated to
/// be more expensive than testing all primitives directly (only allowed for
/// nodes no larger than `max_leaf_size`).
pub struct SahBuilder<'a> {
    config: &'a BvhBuildConfig,
}

impl<'a> SahBuilder<'a> {
    /// Create a builder with the given parameters.
    pub fn new(config: &'a BvhBuildConfig) -> Self {
        Self { config }
    }

    /// Build a hierarchy from per-primitive boxes and centers.
    ///
    /// `global_bbox` must enclose all `bboxes`.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn build(&self, global_bbox: Aabb, bboxes: &[Aabb], centers: &[Vec3]) -> Bvh {
        #[cfg(feature = "profiling")]
        profile_scope!(EventCategory::BvhBuild, items = bboxes.len());

        debug_assert_eq!(bboxes.len(), centers.len());
        let primitive_count = bboxes.len();
        if primitive_count == 0 {
            debug!("Built empty BVH");
            return Bvh::default();
        }

        let mut primitive_indices: Vec<usize> = (0..primitive_count).collect();
        let mut nodes = Vec::with_capacity(2 * primitive_count - 1);
        nodes.push(BvhNode::leaf(global_bbox, 0, primitive_count));

        let (min_leaf, _) = self.config.leaf_bounds();
        let mut stack = vec![0usize];
        while let Some(node_index) = stack.pop() {
            let node = nodes[node_index];
            let Some(range) = node.primitive_range() else {
                continue;
            };
            if range.len() <= min_leaf {
                continue;
            }

            let first = range.start;
            let indices = &mut primitive_indices[range];
            let Some(split) = self.find_split(&node.bounds(), indices, bboxes, centers) else {
                continue;
            };
            let mid = partition(indices, split, centers);
            let (left, right) = indices.split_at(mid);

            let first_child = nodes.len();
            nodes.push(BvhNode::leaf(bounds_of(left, bboxes), first, left.len()));
            nodes.push(BvhNode::leaf(bounds_of(right, bboxes), first + mid, right.len()));
            nodes[node_index] = BvhNode::internal(node.bounds(), first_child);

            stack.push(first_child + 1);
            stack.push(first_child);
        }

        let bvh = Bvh::from_parts(nodes, primitive_indices);
        debug!(
            primitives = primitive_count,
            nodes = bvh.node_count(),
            leaves = bvh.leaf_count(),
            "Built BVH"
        );
        bvh
    }

    /// Pick a split for a node, or `None` if it should stay a leaf.
    fn find_split(
        &self,
        node_bounds: &Aabb,
        indices: &[usize],
        bboxes: &[Aabb],
        centers: &[Vec3],
    ) -> Option<Split> {
        let count = indices.len();
        let (_, max_leaf) = self.config.leaf_bounds();
        let bin_count = self.config.bin_count.max(2);

        let centroid_bounds = Aabb::from_points(indices.iter().map(|&i| centers[i]));
        let extent = centroid_bounds.size();

        let mut best: Option<(f32, Split)> = None;
        let mut bins = vec![Bin::default(); bin_count];
        let mut right_area = vec![0.0f32; bin_count];
        let mut right_count = vec![0usize; bin_count];

        for axis in 0..3 {
            if extent[axis] <= f32::EPSILON * centroid_bounds.max[axis].abs().max(1.0) {
                continue;
            }
            let axis_min = centroid_bounds.min[axis];
            let scale = bin_count as f32 / extent[axis];

            bins.fill(Bin::default());
            for &i in indices {
                let b = bin_index(centers[i][axis], axis_min, scale, bin_count);
                bins[b].count += 1;
                bins[b].bounds = bins[b].bounds.union(&bboxes[i]);
            }

            // Right-to-left sweep: area and count of bins[i..]
            let mut acc = Bin::default();
            for i in (1..bin_count).rev() {
                acc.count += bins[i].count;
                acc.bounds = acc.bounds.union(&bins[i].bounds);
                right_area[i] = acc.bounds.surface_area();
                right_count[i] = acc.count;
            }

            // Left-to-right sweep evaluating the split after bin i
            let mut acc = Bin::default();
            for i in 0..bin_count - 1 {
                acc.count += bins[i].count;
                acc.bounds = acc.bounds.union(&bins[i].bounds);
                if acc.count == 0 || right_count[i + 1] == 0 {
                    continue;
                }
                let cost = acc.bounds.surface_area() * acc.count as f32
                    + right_area[i + 1] * right_count[i + 1] as f32;
                if best.map_or(true, |(best_cost, _)| cost < best_cost) {
                    best = Some((
                        cost,
                        Split::Binned {
                            axis,
                            last_left_bin: i,
                            bin_count,
                            axis_min,
                            scale,
                        },
                    ));
                }
            }
        }

        let Some((cost, split)) = best else {
            // All centroids coincide; only split if the leaf would be too big.
            return (count > max_leaf).then(|| Split::Median {
                axis: node_bounds.largest_axis(),
            });
        };

        let node_area = node_bounds.surface_area();
        let split_cost = if node_area > 0.0 {
            self.config.traversal_cost + self.config.intersection_cost * cost / node_area
        } else {
            self.config.traversal_cost + self.config.intersection_cost * count as f32
        };
        let leaf_cost = self.config.intersection_cost * count as f32;

        if split_cost >= leaf_cost && count <= max_leaf {
            return None;
        }
        Some(split)
    }
}

#[inline]
fn bin_index(value: f32, axis_min: f32, scale: f32, bin_count: usize) -> usize {
    let b = ((value - axis_min) * scale) as usize;
    b.min(bin_count - 1)
}

/// Reorder `indices` so the left side of `split` comes first; returns its length.
///
/// Always returns a value in `1..indices.len()` for inputs of length >= 2.
fn partition(indices: &mut [usize], split: Split, centers: &[Vec3]) -> usize {
    let count = indices.len();
    if let Split::Binned {
        axis,
        last_left_bin,
        bin_count,
        axis_min,
        scale,
    } = split
    {
        let goes_left =
            |i: usize| bin_index(centers[i][axis], axis_min, scale, bin_count) <= last_left_bin;

        let mut left = 0;
        let mut right = count;
        while left < right {
            if goes_left(indices[left]) {
                left += 1;
            } else {
                right -= 1;
                indices.swap(left, right);
            }
        }
        if left > 0 && left < count {
            return left;
        }
    }

    // Median fallback, also covers binned splits that rounding left one-sided
    let axis = match split {
        Split::Binned { axis, .. } | Split::Median { axis } => axis,
    };
    let mid = count / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| centers[a][axis].total_cmp(&centers[b][axis]));
    mid
}

fn bounds_of(indices: &[usize], bboxes: &[Aabb]) -> Aabb {
    indices
        .iter()
        .fold(Aabb::EMPTY, |acc, &i| acc.union(&bboxes[i]))
}
