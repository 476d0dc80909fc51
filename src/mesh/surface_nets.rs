//! Relaxed-vertex quad extraction.

use std::collections::HashMap;

use bevy::math::{IVec3, Vec3};

use super::tables::{AXES, CELL_EDGES, QUAD_POINTS};
use super::{MeshBuffers, Vertex};
use crate::density::DensityMap;

/// Extracts the iso-crossing of `map` with one relaxed vertex per
/// intersected cell.
///
/// For every cell the three positive-axis neighbours are sign-tested against
/// `iso_level`; each crossing produces a quad out of the four cells around
/// that edge. A cell's vertex sits at the mean of its crossed cube-edge
/// intersections, so the result is smoother than per-edge triangulation at
/// the cost of rounding sharp features.
///
/// One chunk extracts serially, so the cell-vertex map has a single writer;
/// callers parallelise by extracting independent chunks at once.
pub fn extract_surface_nets(map: &DensityMap, iso_level: f32) -> MeshBuffers {
    let ppa = map.points_per_axis();
    let mut buffers = MeshBuffers::default();
    let mut cell_vertices: HashMap<IVec3, u32> = HashMap::new();

    for x in 1..ppa - 2 {
        for y in 1..ppa - 2 {
            for z in 1..ppa - 2 {
                let cell = IVec3::new(x, y, z);
                let here = map.sample(cell) - iso_level;

                for (axis, offset) in AXES.iter().enumerate() {
                    let neighbour = map.sample(cell + *offset) - iso_level;

                    if here < 0.0 && neighbour >= 0.0 {
                        make_quad(map, iso_level, cell, axis, false, &mut buffers, &mut cell_vertices);
                    } else if here >= 0.0 && neighbour < 0.0 {
                        make_quad(map, iso_level, cell, axis, true, &mut buffers, &mut cell_vertices);
                    }
                }
            }
        }
    }

    buffers
}

fn make_quad(
    map: &DensityMap,
    iso_level: f32,
    cell: IVec3,
    axis: usize,
    reversed: bool,
    buffers: &mut MeshBuffers,
    cell_vertices: &mut HashMap<IVec3, u32>,
) {
    let points = QUAD_POINTS[axis].map(|offset| cell + offset);

    // The two winding orders keep front faces on the empty side whichever
    // way the edge crosses.
    let order: [usize; 6] = if reversed {
        [2, 1, 0, 0, 3, 2]
    } else {
        [0, 1, 2, 2, 3, 0]
    };

    for corner in order {
        let index = shared_vertex(map, iso_level, points[corner], buffers, cell_vertices);
        buffers.indices.push(index);
    }
}

fn shared_vertex(
    map: &DensityMap,
    iso_level: f32,
    cell: IVec3,
    buffers: &mut MeshBuffers,
    cell_vertices: &mut HashMap<IVec3, u32>,
) -> u32 {
    if let Some(&existing) = cell_vertices.get(&cell) {
        return existing;
    }

    let index = buffers.vertices.len() as u32;
    buffers.vertices.push(Vertex {
        position: relaxed_position(map, iso_level, cell).to_array(),
        normal: gradient(map, cell).normalize_or_zero().to_array(),
    });
    cell_vertices.insert(cell, index);
    index
}

/// Mean of the cell's crossed cube-edge intersections, chunk-local.
///
/// A marked cell should always have at least one crossed edge; the
/// cell-centre fallback covers degenerate fields where it does not.
fn relaxed_position(map: &DensityMap, iso_level: f32, cell: IVec3) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut crossings = 0;

    for [start, end] in CELL_EDGES {
        let density_a = map.sample_clamped(cell + start) - iso_level;
        let density_b = map.sample_clamped(cell + end) - iso_level;

        if density_a * density_b <= 0.0 {
            // Both endpoints exactly on the surface would divide 0 by 0.
            let magnitude = density_a.abs() + density_b.abs();
            let t = if magnitude == 0.0 {
                0.5
            } else {
                density_a.abs() / magnitude
            };
            let position_a = (cell + start - IVec3::ONE).as_vec3();
            let position_b = (cell + end - IVec3::ONE).as_vec3();
            sum += position_a.lerp(position_b, t);
            crossings += 1;
        }
    }

    if crossings == 0 {
        return (cell - IVec3::ONE).as_vec3() + Vec3::splat(0.5);
    }

    sum / crossings as f32
}

/// Central-difference gradient at the cell's own coordinate, pointing out of
/// the solid.
fn gradient(map: &DensityMap, cell: IVec3) -> Vec3 {
    Vec3::new(
        map.sample_clamped(cell - AXES[0]) - map.sample_clamped(cell + AXES[0]),
        map.sample_clamped(cell - AXES[1]) - map.sample_clamped(cell + AXES[1]),
        map.sample_clamped(cell - AXES[2]) - map.sample_clamped(cell + AXES[2]),
    )
}
