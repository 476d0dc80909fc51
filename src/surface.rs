//! The grid-of-chunks orchestrator.
//!
//! A [`Surface`] owns a dense 3D array of [`Chunk`]s and drives the two
//! update paths: full recompute from an ordered shape queue, and incremental
//! single-shape edits limited to a bounding volume of chunks. It also answers
//! density queries across chunk boundaries.

use std::collections::HashSet;
use std::time::Instant;

use bevy::log::debug;
use bevy::prelude::*;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use thiserror::Error;

use crate::chunk::Chunk;
use crate::index;
use crate::mesh::{Extractor, MeshBuffers};
use crate::shape::Shape;

/// Magnitude of the base density a chunk is filled with before shapes apply.
/// Large enough that a blend with any in-grid distance cannot flip its sign.
pub const BASE_DENSITY: f32 = 32.0;

/// Out-of-bounds queries clamp to just inside the grid so gradient taps one
/// cell past the boundary still resolve to the boundary chunk.
const BOUNDS_EPSILON: f32 = 0.001;

/// Cells per chunk axis, restricted to sizes that keep one chunk's
/// extraction within a frame budget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChunkResolution {
    Low,
    #[default]
    Medium,
    High,
}

impl ChunkResolution {
    /// Cell count per chunk axis.
    pub const fn cells(self) -> i32 {
        match self {
            ChunkResolution::Low => 8,
            ChunkResolution::Medium => 16,
            ChunkResolution::High => 32,
        }
    }
}

/// Errors from surface construction and lifecycle misuse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Surface dimensions must be positive on every axis, got {dimensions}")]
    InvalidDimensions { dimensions: IVec3 },

    #[error("Operation requires a generated surface; call generate() first")]
    NotGenerated,

    #[error("Surface is already generated; call destroy() before regenerating")]
    AlreadyGenerated,
}

/// A sculptable volume of `dimensions` chunks per axis.
///
/// Starts ungenerated; [`Surface::generate`] allocates the chunk grid and
/// [`Surface::destroy`] releases it. Changing `dimensions` or `resolution`
/// requires destroy-and-regenerate, the grid cannot be resized in place.
#[derive(Component, Debug)]
pub struct Surface {
    dimensions: IVec3,
    resolution: ChunkResolution,
    /// Density threshold the extracted surface interpolates through.
    pub iso_level: f32,
    /// When set, the grid starts fully solid and subtractive shapes carve
    /// into it; otherwise it starts empty and additive shapes build it up.
    pub invert_base: bool,
    /// Extraction algorithm applied to every chunk.
    pub extractor: Extractor,
    chunks: Vec<Chunk>,
}

impl Surface {
    /// Creates an ungenerated surface.
    ///
    /// # Errors
    /// Returns [`SurfaceError::InvalidDimensions`] when any axis of
    /// `dimensions` is zero or negative.
    pub fn new(dimensions: IVec3, resolution: ChunkResolution) -> Result<Self, SurfaceError> {
        if dimensions.min_element() <= 0 {
            return Err(SurfaceError::InvalidDimensions { dimensions });
        }

        Ok(Self {
            dimensions,
            resolution,
            iso_level: 0.0,
            invert_base: false,
            extractor: Extractor::default(),
            chunks: Vec::new(),
        })
    }

    pub fn dimensions(&self) -> IVec3 {
        self.dimensions
    }

    pub fn resolution(&self) -> ChunkResolution {
        self.resolution
    }

    /// Cells per chunk axis, shorthand for `resolution().cells()`.
    pub fn chunk_cells(&self) -> i32 {
        self.resolution.cells()
    }

    pub fn is_generated(&self) -> bool {
        !self.chunks.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Density every chunk is filled with before any shape applies.
    pub fn base_density(&self) -> f32 {
        if self.invert_base {
            BASE_DENSITY
        } else {
            -BASE_DENSITY
        }
    }

    pub fn chunk(&self, chunk_index: IVec3) -> Option<&Chunk> {
        if !index::in_bounds(chunk_index, self.dimensions) {
            return None;
        }
        Some(&self.chunks[index::flatten_size(chunk_index, self.dimensions)])
    }

    /// Allocates the full chunk grid at the base density.
    ///
    /// # Errors
    /// Returns [`SurfaceError::AlreadyGenerated`] when the grid exists;
    /// destroy first to change structure.
    pub fn generate(&mut self) -> Result<(), SurfaceError> {
        if self.is_generated() {
            return Err(SurfaceError::AlreadyGenerated);
        }

        let started = Instant::now();
        let count = (self.dimensions.x * self.dimensions.y * self.dimensions.z) as usize;
        let base = self.base_density();
        let cells = self.chunk_cells();

        self.chunks = (0..count)
            .map(|i| Chunk::new(index::unflatten_size(i, self.dimensions), cells, base))
            .collect();

        debug!(
            "generated {} chunks of {}^3 cells in {:?}",
            count,
            cells,
            started.elapsed()
        );
        Ok(())
    }

    /// Releases every chunk, returning the surface to its ungenerated state.
    ///
    /// # Errors
    /// Returns [`SurfaceError::NotGenerated`] when there is nothing to
    /// destroy.
    pub fn destroy(&mut self) -> Result<(), SurfaceError> {
        if !self.is_generated() {
            return Err(SurfaceError::NotGenerated);
        }
        self.chunks.clear();
        Ok(())
    }

    /// Rebuilds every chunk's field from scratch: base density, then the
    /// full `shapes` queue in order. The correctness baseline for structural
    /// changes; cost grows with chunks x samples x shapes.
    pub fn recompute(&mut self, shapes: &[Shape]) -> Result<(), SurfaceError> {
        if !self.is_generated() {
            return Err(SurfaceError::NotGenerated);
        }

        let started = Instant::now();
        let base = self.base_density();

        #[cfg(feature = "parallel")]
        self.chunks
            .par_iter_mut()
            .for_each(|chunk| chunk.populate(base, shapes));
        #[cfg(not(feature = "parallel"))]
        self.chunks
            .iter_mut()
            .for_each(|chunk| chunk.populate(base, shapes));

        debug!(
            "recomputed {} chunks against {} shapes in {:?}",
            self.chunks.len(),
            shapes.len(),
            started.elapsed()
        );
        Ok(())
    }

    /// Folds one shape into every chunk without resetting the field first.
    pub fn apply_shape(&mut self, shape: &Shape) -> Result<(), SurfaceError> {
        if !self.is_generated() {
            return Err(SurfaceError::NotGenerated);
        }

        #[cfg(feature = "parallel")]
        self.chunks
            .par_iter_mut()
            .for_each(|chunk| chunk.apply_shape(shape));
        #[cfg(not(feature = "parallel"))]
        self.chunks
            .iter_mut()
            .for_each(|chunk| chunk.apply_shape(shape));

        Ok(())
    }

    /// Incremental edit: folds `shape` only into the chunks its bounding
    /// volume around `position` can reach. Returns how many chunks were
    /// touched.
    ///
    /// The volume estimate is conservative and never drops below a 3x3x3
    /// neighbourhood, so shapes smaller than one chunk still cover every
    /// chunk their blend can leak into.
    pub fn apply_shape_at(
        &mut self,
        shape: &Shape,
        position: Vec3,
    ) -> Result<usize, SurfaceError> {
        if !self.is_generated() {
            return Err(SurfaceError::NotGenerated);
        }

        let started = Instant::now();
        let volume = shape.chunk_volume(self.chunk_cells());
        let (centre, _) = self.compute_indices(position);

        let mut targets = HashSet::new();
        for x in 0..volume.x {
            for y in 0..volume.y {
                for z in 0..volume.z {
                    let chunk_index = centre + IVec3::new(x, y, z) - volume / 2;
                    if index::in_bounds(chunk_index, self.dimensions) {
                        targets.insert(chunk_index);
                    }
                }
            }
        }

        #[cfg(feature = "parallel")]
        self.chunks
            .par_iter_mut()
            .filter(|chunk| targets.contains(&chunk.chunk_index()))
            .for_each(|chunk| chunk.apply_shape(shape));
        #[cfg(not(feature = "parallel"))]
        self.chunks
            .iter_mut()
            .filter(|chunk| targets.contains(&chunk.chunk_index()))
            .for_each(|chunk| chunk.apply_shape(shape));

        debug!(
            "stamped {:?} over {} chunks in {:?}",
            shape.kind(),
            targets.len(),
            started.elapsed()
        );
        Ok(targets.len())
    }

    /// Flags every chunk for re-extraction without changing any density.
    /// Call after switching `extractor` or `iso_level` so the change shows
    /// on chunks that are not otherwise dirty.
    pub fn remesh(&mut self) -> Result<(), SurfaceError> {
        if !self.is_generated() {
            return Err(SurfaceError::NotGenerated);
        }
        for chunk in &mut self.chunks {
            chunk.mark_dirty();
        }
        Ok(())
    }

    /// Resolves a world-space position to `(chunk index, cell-local index)`.
    ///
    /// Positions outside the grid clamp to the nearest boundary chunk rather
    /// than failing; gradient estimation reads one cell past any queried
    /// point and relies on this saturation.
    pub fn compute_indices(&self, position: Vec3) -> (IVec3, IVec3) {
        let cells = self.chunk_cells() as f32;
        let max = (self.dimensions.as_vec3() * cells) - Vec3::splat(BOUNDS_EPSILON);
        let clamped = position.clamp(Vec3::ZERO, max);

        let chunk_index = (clamped / cells).floor().as_ivec3();
        let local = clamped.as_ivec3() - chunk_index * self.chunk_cells();
        (chunk_index, local)
    }

    /// Reads the density sample nearest to a world-space position.
    pub fn sample_density(&self, position: Vec3) -> Result<f32, SurfaceError> {
        if !self.is_generated() {
            return Err(SurfaceError::NotGenerated);
        }

        let (chunk_index, local) = self.compute_indices(position);
        let chunk = &self.chunks[index::flatten_size(chunk_index, self.dimensions)];
        // Shift into the map's border shell.
        Ok(chunk.density().sample(local + IVec3::ONE))
    }

    /// Re-extracts every dirty chunk, returning `(chunk index, buffers)`
    /// pairs and clearing the dirty flags.
    pub fn extract_dirty(&mut self) -> Result<Vec<(IVec3, MeshBuffers)>, SurfaceError> {
        if !self.is_generated() {
            return Err(SurfaceError::NotGenerated);
        }

        let started = Instant::now();
        let extractor = self.extractor;
        let iso_level = self.iso_level;

        #[cfg(feature = "parallel")]
        let extracted: Vec<_> = self
            .chunks
            .par_iter_mut()
            .filter(|chunk| chunk.is_dirty())
            .map(|chunk| (chunk.chunk_index(), chunk.extract(extractor, iso_level)))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let extracted: Vec<_> = self
            .chunks
            .iter_mut()
            .filter(|chunk| chunk.is_dirty())
            .map(|chunk| (chunk.chunk_index(), chunk.extract(extractor, iso_level)))
            .collect();

        if !extracted.is_empty() {
            debug!(
                "extracted {} chunk meshes in {:?}",
                extracted.len(),
                started.elapsed()
            );
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{BlendMode, ShapeKind};

    fn sphere(position: Vec3, radius: f32, mode: BlendMode) -> Shape {
        Shape::at_position(
            ShapeKind::Sphere,
            position,
            mode,
            4.0,
            Vec3::new(radius, 0.0, 0.0),
        )
        .unwrap()
    }

    fn generated(dimensions: IVec3) -> Surface {
        let mut surface = Surface::new(dimensions, ChunkResolution::Low).unwrap();
        surface.generate().unwrap();
        surface
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        for dimensions in [IVec3::ZERO, IVec3::new(2, -1, 2), IVec3::new(0, 1, 1)] {
            assert_eq!(
                Surface::new(dimensions, ChunkResolution::Low).unwrap_err(),
                SurfaceError::InvalidDimensions { dimensions }
            );
        }
    }

    #[test]
    fn test_lifecycle_ordering() {
        let mut surface = Surface::new(IVec3::splat(2), ChunkResolution::Low).unwrap();
        assert!(!surface.is_generated());
        assert_eq!(surface.recompute(&[]), Err(SurfaceError::NotGenerated));
        assert_eq!(surface.destroy(), Err(SurfaceError::NotGenerated));

        surface.generate().unwrap();
        assert!(surface.is_generated());
        assert_eq!(surface.chunk_count(), 8);
        assert_eq!(surface.generate(), Err(SurfaceError::AlreadyGenerated));

        surface.destroy().unwrap();
        assert!(!surface.is_generated());
        assert_eq!(
            surface.sample_density(Vec3::ZERO),
            Err(SurfaceError::NotGenerated)
        );
    }

    #[test]
    fn test_fresh_surface_samples_base_density() {
        let surface = generated(IVec3::splat(2));
        assert_eq!(surface.sample_density(Vec3::splat(5.0)).unwrap(), -BASE_DENSITY);

        let mut inverted = Surface::new(IVec3::splat(1), ChunkResolution::Low).unwrap();
        inverted.invert_base = true;
        inverted.generate().unwrap();
        assert_eq!(inverted.sample_density(Vec3::ZERO).unwrap(), BASE_DENSITY);
    }

    #[test]
    fn test_compute_indices_clamps_out_of_bounds() {
        // 2x2x2 grid of 8-cell chunks spans [0, 16) per axis.
        let surface = generated(IVec3::splat(2));

        let (chunk, local) = surface.compute_indices(Vec3::new(3.0, 9.0, 15.0));
        assert_eq!(chunk, IVec3::new(0, 1, 1));
        assert_eq!(local, IVec3::new(3, 1, 7));

        // Beyond the far edge saturates into the last chunk's last cell.
        let (chunk, local) = surface.compute_indices(Vec3::splat(40.0));
        assert_eq!(chunk, IVec3::splat(1));
        assert_eq!(local, IVec3::splat(7));

        // Negative positions saturate to the first chunk.
        let (chunk, local) = surface.compute_indices(Vec3::splat(-5.0));
        assert_eq!(chunk, IVec3::ZERO);
        assert_eq!(local, IVec3::ZERO);
    }

    #[test]
    fn test_recompute_crosses_chunk_boundaries() {
        let mut surface = generated(IVec3::splat(2));
        // A sphere straddling the chunk seam at x=8.
        surface
            .recompute(&[sphere(Vec3::new(8.0, 4.0, 4.0), 3.0, BlendMode::Additive)])
            .unwrap();

        assert!(surface.sample_density(Vec3::new(8.0, 4.0, 4.0)).unwrap() > 0.0);

        // Both chunks adjacent to the seam carry geometry.
        let extracted = surface.extract_dirty().unwrap();
        let with_geometry: Vec<_> = extracted
            .iter()
            .filter(|(_, buffers)| !buffers.is_empty())
            .map(|(chunk_index, _)| *chunk_index)
            .collect();
        assert!(with_geometry.contains(&IVec3::new(0, 0, 0)));
        assert!(with_geometry.contains(&IVec3::new(1, 0, 0)));
    }

    #[test]
    fn test_extract_dirty_clears_flags() {
        let mut surface = generated(IVec3::splat(2));
        assert_eq!(surface.extract_dirty().unwrap().len(), 8);
        // Nothing changed since the last pass.
        assert!(surface.extract_dirty().unwrap().is_empty());

        surface
            .apply_shape_at(&sphere(Vec3::splat(4.0), 2.0, BlendMode::Additive), Vec3::splat(4.0))
            .unwrap();
        assert!(!surface.extract_dirty().unwrap().is_empty());
    }

    #[test]
    fn test_remesh_re_extracts_everything() {
        let mut surface = generated(IVec3::splat(2));
        surface.extract_dirty().unwrap();
        assert!(surface.extract_dirty().unwrap().is_empty());

        surface.extractor = Extractor::SurfaceNets;
        surface.remesh().unwrap();
        assert_eq!(surface.extract_dirty().unwrap().len(), 8);
    }

    #[test]
    fn test_apply_shape_at_touches_bounded_neighbourhood() {
        let mut surface = generated(IVec3::splat(4));
        surface.extract_dirty().unwrap();

        // A small stamp in the grid interior touches exactly the 3x3x3
        // floor around its position.
        let touched = surface
            .apply_shape_at(&sphere(Vec3::splat(16.0), 1.0, BlendMode::Additive), Vec3::splat(16.0))
            .unwrap();
        assert_eq!(touched, 27);

        // The same stamp in a corner clamps to in-bounds chunks only.
        let touched = surface
            .apply_shape_at(&sphere(Vec3::ZERO, 1.0, BlendMode::Additive), Vec3::ZERO)
            .unwrap();
        assert_eq!(touched, 8);
    }

    #[test]
    fn test_incremental_matches_full_recompute() {
        let shapes = [
            sphere(Vec3::splat(8.0), 3.0, BlendMode::Additive),
            sphere(Vec3::new(10.0, 8.0, 8.0), 2.0, BlendMode::Subtractive),
        ];

        let mut incremental = generated(IVec3::splat(2));
        for shape in &shapes {
            incremental.apply_shape_at(shape, shape.position()).unwrap();
        }

        let mut full = generated(IVec3::splat(2));
        full.recompute(&shapes).unwrap();

        for probe in [
            Vec3::splat(8.0),
            Vec3::new(10.0, 8.0, 8.0),
            Vec3::new(6.0, 8.0, 8.0),
            Vec3::splat(1.0),
        ] {
            let a = incremental.sample_density(probe).unwrap();
            let b = full.sample_density(probe).unwrap();
            assert!((a - b).abs() < 1e-4, "divergence at {probe}: {a} vs {b}");
        }
    }

    #[test]
    fn test_inverted_surface_carves() {
        let mut surface = Surface::new(IVec3::splat(2), ChunkResolution::Low).unwrap();
        surface.invert_base = true;
        surface.generate().unwrap();
        surface.extract_dirty().unwrap();

        // Fully solid grid extracts nothing until something is carved.
        surface
            .apply_shape_at(&sphere(Vec3::splat(8.0), 3.0, BlendMode::Subtractive), Vec3::splat(8.0))
            .unwrap();
        assert!(surface.sample_density(Vec3::splat(8.0)).unwrap() < 0.0);

        let extracted = surface.extract_dirty().unwrap();
        assert!(extracted.iter().any(|(_, buffers)| !buffers.is_empty()));
    }
}
