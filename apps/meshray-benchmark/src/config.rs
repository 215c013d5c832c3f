//! Benchmark configuration.

use std::str::FromStr;

use anyhow::Context;

/// Prefix of the environment variables read by [`BenchConfig::from_env`].
pub const ENV_PREFIX: &str = "MESHRAY_BENCH_";

/// Scene and workload parameters.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Number of animated entities.
    pub entities: usize,
    /// Grid resolution of each entity's mesh (`2 * n * n` triangles).
    pub grid_size: usize,
    /// Animation frames to simulate.
    pub frames: u64,
    /// Rays cast per frame, laid out as a square.
    pub rays_per_frame: usize,
    /// Rebuild from scratch every frame instead of refitting.
    pub rebuild_every_frame: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            entities: 16,
            grid_size: 64,
            frames: 60,
            rays_per_frame: 64 * 64,
            rebuild_every_frame: false,
        }
    }
}

impl BenchConfig {
    /// Set the number of entities.
    pub fn with_entities(mut self, entities: usize) -> Self {
        self.entities = entities;
        self
    }

    /// Set the per-entity grid resolution.
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Set the number of frames.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    /// Set the number of rays per frame.
    pub fn with_rays_per_frame(mut self, rays: usize) -> Self {
        self.rays_per_frame = rays;
        self
    }

    /// Rebuild instead of refit.
    pub fn with_rebuild_every_frame(mut self, rebuild: bool) -> Self {
        self.rebuild_every_frame = rebuild;
        self
    }

    /// Defaults overridden by `MESHRAY_BENCH_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(defaults
            .clone()
            .with_entities(env_or("ENTITIES", defaults.entities)?)
            .with_grid_size(env_or("GRID_SIZE", defaults.grid_size)?)
            .with_frames(env_or("FRAMES", defaults.frames)?)
            .with_rays_per_frame(env_or("RAYS", defaults.rays_per_frame)?)
            .with_rebuild_every_frame(env_or("REBUILD", defaults.rebuild_every_frame)?))
    }

    /// Triangles in the whole scene.
    pub fn triangle_count(&self) -> usize {
        self.entities * self.grid_size * self.grid_size * 2
    }
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let key = format!("{ENV_PREFIX}{name}");
    match std::env::var(&key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {value:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = BenchConfig::default()
            .with_entities(2)
            .with_grid_size(8)
            .with_frames(3)
            .with_rays_per_frame(100)
            .with_rebuild_every_frame(true);
        assert_eq!(config.entities, 2);
        assert_eq!(config.frames, 3);
        assert_eq!(config.rays_per_frame, 100);
        assert!(config.rebuild_every_frame);
        assert_eq!(config.triangle_count(), 2 * 8 * 8 * 2);
    }

    #[test]
    fn missing_variable_uses_default() {
        let value: usize = env_or("SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
