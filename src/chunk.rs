//! One chunk of a surface: a density map and the geometry derived from it.

use bevy::math::IVec3;

use crate::density::DensityMap;
use crate::mesh::{Extractor, MeshBuffers};
use crate::shape::Shape;

/// A fixed-size cube of cells within a surface's chunk grid.
///
/// Chunks are created and destroyed in lockstep with their surface's grid.
/// The `dirty` flag marks chunks whose density changed since the last
/// extraction, so a frame only re-meshes what an edit actually touched.
#[derive(Clone, Debug)]
pub struct Chunk {
    chunk_index: IVec3,
    density: DensityMap,
    dirty: bool,
}

impl Chunk {
    /// Allocates the chunk at `chunk_index` in a grid of `chunk_cells`-sized
    /// chunks, filled with `base` density.
    pub fn new(chunk_index: IVec3, chunk_cells: i32, base: f32) -> Self {
        Self {
            chunk_index,
            density: DensityMap::new(chunk_cells, chunk_index * chunk_cells, base),
            // Freshly allocated chunks need an initial extraction pass.
            dirty: true,
        }
    }

    pub fn chunk_index(&self) -> IVec3 {
        self.chunk_index
    }

    /// Global cell coordinate of the chunk's lowest corner.
    pub fn origin_index(&self) -> IVec3 {
        self.density.chunk_origin_index()
    }

    pub fn density(&self) -> &DensityMap {
        &self.density
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Resets the chunk to `base` and folds in `shapes` in order.
    pub fn populate(&mut self, base: f32, shapes: &[Shape]) {
        self.density.populate(base, shapes);
        self.dirty = true;
    }

    /// Folds one shape into the chunk's existing field.
    pub fn apply_shape(&mut self, shape: &Shape) {
        self.density.apply_shape(shape);
        self.dirty = true;
    }

    /// Flags the chunk for re-extraction without touching its field.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Runs `extractor` over the chunk's field and clears the dirty flag.
    pub fn extract(&mut self, extractor: Extractor, iso_level: f32) -> MeshBuffers {
        self.dirty = false;
        extractor.extract(&self.density, iso_level)
    }
}
