//! Reference comparison of BVH queries.
//!
//! [`BruteForceOracle`] answers closest-hit queries by testing every
//! triangle; [`QueryRegressionTest`] runs a set of rays through a
//! [`BvhComponent`] and the oracle and reports where they disagree.

use std::sync::Arc;

use meshray_core::constants::INDICES_PER_TRIANGLE;
use meshray_core::{Ray, Triangle};
use meshray_entity::{BvhComponent, BvhHitInfo, GeometryType, MeshHandle, RayQuery, VertexAnimator};
use tracing::{debug, info};

use crate::{ComparisonConfig, Result, TestError};

/// Closest hit found by exhaustive search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleHit {
    /// Position of the mesh in the list the oracle was created from.
    pub mesh_index: usize,
    /// Triangle index local to the mesh.
    pub primitive_index: usize,
    pub t: f32,
    /// `t` of the second closest triangle hit, if any.
    pub next_t: Option<f32>,
}

impl OracleHit {
    /// True if another triangle was hit within `tolerance` of this one, so
    /// either may legitimately be reported.
    pub fn is_tied(&self, tolerance: f32) -> bool {
        self.next_t.is_some_and(|next| next - self.t <= tolerance)
    }
}

/// Exhaustive closest-hit search over the triangles of a mesh list.
pub struct BruteForceOracle {
    meshes: Vec<MeshHandle>,
    /// `(mesh index, local primitive, triangle)` for every triangle.
    triangles: Vec<(usize, usize, Triangle)>,
}

impl BruteForceOracle {
    /// Oracle over the rest positions of `meshes`.
    pub fn new(meshes: &[MeshHandle]) -> Self {
        Self::posed(meshes, None)
    }

    /// Oracle over `meshes` with vertices resolved through `animator`.
    pub fn posed(meshes: &[MeshHandle], animator: Option<&dyn VertexAnimator>) -> Self {
        let mut triangles = Vec::new();
        for (mesh_index, mesh) in meshes.iter().enumerate() {
            if mesh.geometry_type() != GeometryType::Triangles {
                continue;
            }
            let triangle_count = mesh.index_count() / INDICES_PER_TRIANGLE;
            let vertex = |index: u32| {
                let rest = mesh.positions()[index as usize];
                animator
                    .and_then(|a| a.local_vertex_position(mesh, index, rest))
                    .unwrap_or(rest)
            };
            mesh.visit_indices(|first, batch| {
                for (k, c) in batch.chunks_exact(INDICES_PER_TRIANGLE).enumerate() {
                    let local = first / INDICES_PER_TRIANGLE + k;
                    if local < triangle_count {
                        let tri = Triangle::new(vertex(c[0]), vertex(c[1]), vertex(c[2]));
                        triangles.push((mesh_index, local, tri));
                    }
                }
            });
        }
        Self {
            meshes: meshes.to_vec(),
            triangles,
        }
    }

    /// Mesh at `index` in the list the oracle was created from.
    pub fn mesh(&self, index: usize) -> Option<&MeshHandle> {
        self.meshes.get(index)
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn closest(&self, query: &RayQuery) -> Option<OracleHit> {
        let ray = Ray::with_range(query.origin, query.direction, query.min_dist, query.max_dist);
        let mut closest: Option<OracleHit> = None;
        for &(mesh_index, primitive_index, tri) in &self.triangles {
            let Some(hit) = tri.intersect(&ray) else {
                continue;
            };
            closest = Some(match closest {
                Some(mut c) if hit.t >= c.t => {
                    c.next_t = Some(c.next_t.map_or(hit.t, |n| n.min(hit.t)));
                    c
                }
                previous => OracleHit {
                    mesh_index,
                    primitive_index,
                    t: hit.t,
                    next_t: previous.map(|c| c.t),
                },
            });
        }
        closest
    }

    /// True if `actual` names the same mesh and triangle as `expected`.
    fn same_primitive(&self, expected: &OracleHit, actual: &BvhHitInfo) -> bool {
        let same_mesh = match (self.mesh(expected.mesh_index), actual.mesh.as_ref()) {
            (Some(e), Some(a)) => Arc::ptr_eq(e, a),
            _ => false,
        };
        same_mesh && expected.primitive_index == actual.primitive_index
    }
}

/// Outcome of a comparison run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComparisonReport {
    pub rays: usize,
    /// Rays the oracle reported a hit for.
    pub hits: usize,
    /// Rays where the BVH and the oracle disagree.
    pub mismatches: usize,
    /// Mismatches where both hit at the same `t` but on different
    /// primitives, without a tie to explain it.
    pub misattributed: usize,
}

impl ComparisonReport {
    pub fn mismatch_ratio(&self) -> f64 {
        if self.rays == 0 {
            0.0
        } else {
            self.mismatches as f64 / self.rays as f64
        }
    }
}

/// Compares a component's answers against a [`BruteForceOracle`].
pub struct QueryRegressionTest {
    config: ComparisonConfig,
}

impl QueryRegressionTest {
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    /// Run every query through both and fail if too many disagree.
    ///
    /// Two answers agree when both miss, or both hit with `t` within the
    /// configured tolerance and on the same mesh and primitive. When another
    /// triangle lies within the tolerance of the closest one, either may win.
    pub fn run(
        &self,
        name: &str,
        component: &BvhComponent,
        oracle: &BruteForceOracle,
        queries: &[RayQuery],
    ) -> Result<ComparisonReport> {
        let results = component.intersection_test_batch(queries);
        let mut report = ComparisonReport {
            rays: queries.len(),
            ..ComparisonReport::default()
        };

        for (i, (query, actual)) in queries.iter().zip(&results).enumerate() {
            let expected = oracle.closest(query);
            report.hits += usize::from(expected.is_some());
            let tolerance = self.config.tolerance;
            let agree = match (expected, actual) {
                (None, None) => true,
                (Some(e), Some(a)) => {
                    let same_t = (e.t - a.t).abs() <= tolerance;
                    let attributed = e.is_tied(tolerance) || oracle.same_primitive(&e, a);
                    if same_t && !attributed {
                        debug!(
                            name,
                            ray = i,
                            expected_mesh = e.mesh_index,
                            expected_primitive = e.primitive_index,
                            actual_primitive = a.primitive_index,
                            "Query hit attributed to the wrong primitive"
                        );
                        report.misattributed += 1;
                    }
                    same_t && attributed
                }
                _ => false,
            };
            if !agree {
                debug!(
                    name,
                    ray = i,
                    expected = ?expected.map(|e| e.t),
                    actual = ?actual.as_ref().map(|a| a.t),
                    "Query mismatch"
                );
                report.mismatches += 1;
            }
        }

        if report.mismatch_ratio() > self.config.max_mismatch_ratio {
            return Err(TestError::Mismatch(format!(
                "{name}: {} of {} rays disagree (ratio {:.4} exceeds {:.4})",
                report.mismatches,
                report.rays,
                report.mismatch_ratio(),
                self.config.max_mismatch_ratio
            )));
        }

        info!(name, rays = report.rays, hits = report.hits, "Query comparison passed");
        Ok(report)
    }
}

impl Default for QueryRegressionTest {
    fn default() -> Self {
        Self::new(ComparisonConfig::default())
    }
}
