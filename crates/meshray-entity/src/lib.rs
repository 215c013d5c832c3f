//! Entity components for ray queries against static and animated meshes.
//!
//! Uses hecs as the ECS backend. The central piece is [`BvhComponent`],
//! which flattens a model's triangle meshes into one primitive array,
//! builds a [`meshray_bvh::Bvh`] over it, refits it when an animation
//! moves vertices, and answers closest-hit queries attributed back to the
//! originating mesh.
//!
//! # Threading
//!
//! All operations are synchronous. Queries take `&self` and may run from
//! several threads at once; rebuilds, refits and clears take `&mut self`
//! and therefore exclude queries on the same component.

pub mod animation;
pub mod bvh_component;
pub mod bvh_data;
pub mod error;
pub mod mesh;
pub mod model;
pub mod systems;

pub use animation::{AnimatedComponent, VertexAnimator};
pub use bvh_component::{BvhComponent, BvhComponentConfig, BvhHitInfo, RayQuery};
pub use bvh_data::{BvhData, MeshRange};
pub use error::{BvhError, Result};
pub use hecs::{Entity, World};
pub use mesh::{GeometryType, IndexBuffer, Mesh, MeshHandle, VertexWeight};
pub use model::ModelComponent;
pub use systems::{raycast, rebuild_bvhs, refit_animated_bvhs};
