//! Meshray benchmark
//!
//! Builds a world of animated meshes, then for each frame poses them,
//! refits (or rebuilds) their hierarchies and casts a square of rays
//! through the world, logging timings.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -p meshray-benchmark
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)
//! - `MESHRAY_BENCH_ENTITIES`: Number of animated entities (default: 16)
//! - `MESHRAY_BENCH_GRID_SIZE`: Grid resolution per entity (default: 64)
//! - `MESHRAY_BENCH_FRAMES`: Frames to simulate (default: 60)
//! - `MESHRAY_BENCH_RAYS`: Rays per frame (default: 4096)
//! - `MESHRAY_BENCH_REBUILD`: `true` to rebuild instead of refit (default: false)

mod config;
mod scene;

use std::time::{Duration, Instant};

use meshray_entity::{raycast, rebuild_bvhs, refit_animated_bvhs, RayQuery};
use meshray_test::fixtures::downward_rays;
use rayon::prelude::*;
use tracing::{info, trace, warn};
use tracing_subscriber::EnvFilter;
#[cfg(feature = "profiling-tracy")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::BenchConfig;
use crate::scene::Scene;

/// Height rays start from.
const RAY_HEIGHT: f32 = 50.0;

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    init_logging();

    #[cfg(feature = "profiling")]
    meshray_profiler::init();

    let config = BenchConfig::from_env()?;
    info!(
        entities = config.entities,
        triangles = config.triangle_count(),
        frames = config.frames,
        rays = config.rays_per_frame,
        rebuild = config.rebuild_every_frame,
        "Meshray benchmark starting"
    );

    run(&config);

    #[cfg(feature = "profiling")]
    {
        log_profiler_snapshot();
        meshray_profiler::shutdown();
    }

    Ok(())
}

fn run(config: &BenchConfig) {
    let mut scene = Scene::build(config);

    let start = Instant::now();
    let failures = rebuild_bvhs(&mut scene.world);
    for (entity, error) in &failures {
        warn!(?entity, %error, "Entity skipped");
    }
    info!(elapsed = ?start.elapsed(), "Initial build");

    let side = (config.rays_per_frame as f32).sqrt().ceil().max(1.0) as usize;
    let rays = downward_rays(0.0, scene.extent, RAY_HEIGHT, side);

    let mut update_time = Duration::ZERO;
    let mut query_time = Duration::ZERO;
    let mut hits = 0usize;

    for frame in 0..config.frames {
        let frame_start = Instant::now();

        scene.animate(frame);
        let update_start = Instant::now();
        if config.rebuild_every_frame {
            rebuild_bvhs(&mut scene.world);
        } else {
            refit_animated_bvhs(&mut scene.world);
        }
        update_time += update_start.elapsed();

        let query_start = Instant::now();
        hits += cast(&scene, &rays);
        let query_elapsed = query_start.elapsed();
        query_time += query_elapsed;
        #[cfg(feature = "profiling")]
        meshray_profiler::profile_duration!(
            meshray_profiler::EventCategory::BvhBatchQuery,
            query_elapsed
        );

        let frame_time = frame_start.elapsed();
        trace!(frame, elapsed = ?frame_time, "Frame");
        #[cfg(feature = "profiling")]
        meshray_profiler::end_frame(frame, frame_time.as_secs_f32() * 1000.0);
    }

    let frames = config.frames.max(1) as u32;
    let total_rays = rays.len() as f64 * config.frames as f64;
    info!(
        update_avg = ?(update_time / frames),
        query_avg = ?(query_time / frames),
        mrays_per_sec = total_rays / query_time.as_secs_f64().max(f64::EPSILON) / 1e6,
        hit_ratio = hits as f64 / total_rays.max(1.0),
        "Benchmark finished"
    );
}

/// Cast `rays` through the whole world in parallel, returning the hit count.
fn cast(scene: &Scene, rays: &[RayQuery]) -> usize {
    rays.par_iter()
        .filter(|ray| {
            raycast(
                &scene.world,
                ray.origin,
                ray.direction,
                ray.min_dist,
                ray.max_dist,
            )
            .is_some()
        })
        .count()
}

fn init_logging() {
    #[cfg(feature = "profiling-tracy")]
    {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,meshray_bvh=trace,meshray_entity=trace,meshray_benchmark=trace")
        });
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(tracing_tracy::TracyLayer::default())
            .init();
    }
    #[cfg(not(feature = "profiling-tracy"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }
}

#[cfg(feature = "profiling")]
fn log_profiler_snapshot() {
    let snapshot = meshray_profiler::snapshot();
    for stats in &snapshot.categories {
        info!(
            category = stats.category.name(),
            count = stats.count,
            avg_ms = stats.avg_ms(),
            max_ms = stats.max_ms(),
            p95_ms = stats.p95_ns as f64 / 1e6,
            items_per_sec = stats.items_per_sec(),
            "Profiler"
        );
    }
    info!(
        primitives = snapshot.index.primitive_count,
        nodes = snapshot.index.node_count,
        meshes = snapshot.index.mesh_count,
        "Index size"
    );
}

fn print_help() {
    eprintln!(
        "Meshray benchmark

USAGE:
    cargo run --release -p meshray-benchmark

ENVIRONMENT VARIABLES:
    RUST_LOG                    Set log level (e.g., info, debug, trace)
    MESHRAY_BENCH_ENTITIES      Number of animated entities (default: 16)
    MESHRAY_BENCH_GRID_SIZE     Grid resolution per entity (default: 64)
    MESHRAY_BENCH_FRAMES        Frames to simulate (default: 60)
    MESHRAY_BENCH_RAYS          Rays per frame (default: 4096)
    MESHRAY_BENCH_REBUILD       Rebuild instead of refit (default: false)

FEATURES:
    profiling                   Collect per-category timings
    profiling-tracy             Stream spans to Tracy"
    );
}
