//! Test support for meshray.
//!
//! Provides scene fixtures and a brute-force reference that BVH query
//! results are compared against.

pub mod fixtures;
pub mod harness;

pub use harness::{BruteForceOracle, ComparisonReport, OracleHit, QueryRegressionTest};

use meshray_entity::BvhError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("BVH error: {0}")]
    Bvh(#[from] BvhError),
    #[error("Query comparison failed: {0}")]
    Mismatch(String),
}

pub type Result<T> = std::result::Result<T, TestError>;

/// Reference comparison configuration.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    /// Maximum allowed difference in `t` between BVH and reference.
    pub tolerance: f32,
    /// Fraction of rays allowed to disagree (0.0-1.0).
    pub max_mismatch_ratio: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_mismatch_ratio: 0.0,
        }
    }
}
