//! # bevy_isosurface
//!
//! Chunked signed-distance-field isosurface generation and sculpting for
//! Bevy.
//!
//! ## Features
//!
//! - Smooth additive/subtractive blending of five SDF primitives
//! - Two interchangeable extractors: Marching Cubes and Surface Nets
//! - Chunked density storage with incremental, bounded edit updates
//! - Transform-driven sculpting brushes with change detection
//! - Per-chunk parallel density evaluation and extraction (rayon, default on)
//!
//! ## Quick Start
//!
//! ```ignore
//! use bevy::prelude::*;
//! use bevy_isosurface::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(DefaultPlugins)
//!         .add_plugins(IsosurfacePlugin)
//!         .add_systems(Startup, setup)
//!         .run();
//! }
//!
//! fn setup(mut commands: Commands) {
//!     // A 4x4x4 grid of 16-cell chunks, empty until brushes stamp it.
//!     let surface = commands
//!         .spawn((
//!             Surface::new(IVec3::splat(4), ChunkResolution::Medium).unwrap(),
//!             Transform::default(),
//!             Visibility::default(),
//!         ))
//!         .id();
//!
//!     commands.spawn((
//!         ShapeBrush {
//!             kind: ShapeKind::Sphere,
//!             blend_mode: BlendMode::Additive,
//!             sharpness: 1.0,
//!             dimensions: Vec3::new(8.0, 0.0, 0.0),
//!         },
//!         Transform::from_xyz(32.0, 32.0, 32.0),
//!         ChildOf(surface),
//!     ));
//! }
//! ```

pub mod brush;
pub mod chunk;
pub mod density;
pub mod index;
pub mod mesh;
pub mod sdf;
pub mod shape;
pub mod surface;

mod plugin;

pub use plugin::{ChunkEntities, IsosurfacePlugin, IsosurfaceSystems, SurfaceChunk};

pub mod prelude {
    pub use crate::brush::{PendingStamps, RebuildSurface, ShapeBrush, Stamp};
    pub use crate::chunk::Chunk;
    pub use crate::density::DensityMap;
    pub use crate::mesh::{Extractor, MeshBuffers, Vertex};
    pub use crate::plugin::{IsosurfacePlugin, IsosurfaceSystems, SurfaceChunk};
    pub use crate::shape::{BlendMode, Shape, ShapeError, ShapeKind};
    pub use crate::surface::{ChunkResolution, Surface, SurfaceError};
}
