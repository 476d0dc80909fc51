//! Flat-buffer addressing for 3D sample and chunk grids.
//!
//! Every grid in this crate (per-chunk density samples, the surface's chunk
//! array) stores its contents in a flat `Vec` using the same row-major
//! convention: `x` varies fastest, then `y`, then `z`.

use bevy::prelude::*;

/// Converts a 3D coordinate into a flat buffer index for a cubic grid.
#[inline]
pub fn flatten(coord: IVec3, axis_size: i32) -> usize {
    ((coord.z * axis_size * axis_size) + (coord.y * axis_size) + coord.x) as usize
}

/// Converts a flat buffer index back into a 3D coordinate for a cubic grid.
#[inline]
pub fn unflatten(index: usize, axis_size: i32) -> IVec3 {
    let mut index = index as i32;

    // Dividing out z first saves one modulo over the naive form.
    let z = index / (axis_size * axis_size);
    index -= z * axis_size * axis_size;
    let y = index / axis_size;
    let x = index % axis_size;

    IVec3::new(x, y, z)
}

/// Converts a 3D coordinate into a flat buffer index for a non-cubic grid.
#[inline]
pub fn flatten_size(coord: IVec3, size: IVec3) -> usize {
    ((coord.z * size.x * size.y) + (coord.y * size.x) + coord.x) as usize
}

/// Converts a flat buffer index back into a 3D coordinate for a non-cubic grid.
#[inline]
pub fn unflatten_size(index: usize, size: IVec3) -> IVec3 {
    let mut index = index as i32;

    let z = index / (size.x * size.y);
    index -= z * size.x * size.y;
    let y = index / size.x;
    let x = index % size.x;

    IVec3::new(x, y, z)
}

/// Whether a coordinate lies inside `[0, size)` on every axis.
#[inline]
pub fn in_bounds(coord: IVec3, size: IVec3) -> bool {
    coord.x >= 0
        && coord.x < size.x
        && coord.y >= 0
        && coord.y < size.y
        && coord.z >= 0
        && coord.z < size.z
}
