//! Edge-table cell triangulation.

use std::collections::HashMap;

use bevy::math::{IVec3, Vec3};

use super::tables::{AXES, CORNER_OFFSETS, EDGE_CORNER_A, EDGE_CORNER_B, TRIANGULATION};
use super::{MeshBuffers, Vertex};
use crate::density::DensityMap;
use crate::index;

/// Triangulates the iso-crossing of `map` with the classic cell-table walk.
///
/// Each cell's eight corner samples are classified against `iso_level` into
/// an 8-bit configuration; the table gives the crossed edges, and one vertex
/// is interpolated per crossed edge. Vertices are shared between the cells
/// that touch the same edge, keyed by the edge's corner pair.
///
/// One chunk extracts serially, so the shared-edge map has a single writer;
/// callers parallelise by extracting independent chunks at once.
pub fn extract_marching_cubes(map: &DensityMap, iso_level: f32) -> MeshBuffers {
    let ppa = map.points_per_axis();
    let mut buffers = MeshBuffers::default();
    let mut shared_edges: HashMap<(usize, usize), u32> = HashMap::new();

    // Cells of the chunk proper. The one-sample shell on each side keeps all
    // corner and gradient reads inside the map.
    for x in 1..ppa - 2 {
        for y in 1..ppa - 2 {
            for z in 1..ppa - 2 {
                march_cell(
                    map,
                    iso_level,
                    IVec3::new(x, y, z),
                    &mut buffers,
                    &mut shared_edges,
                );
            }
        }
    }

    buffers
}

fn march_cell(
    map: &DensityMap,
    iso_level: f32,
    cell: IVec3,
    buffers: &mut MeshBuffers,
    shared_edges: &mut HashMap<(usize, usize), u32>,
) {
    let mut corners = [IVec3::ZERO; 8];
    let mut densities = [0.0f32; 8];
    let mut configuration = 0usize;
    for (bit, offset) in CORNER_OFFSETS.iter().enumerate() {
        corners[bit] = cell + *offset;
        densities[bit] = map.sample(corners[bit]);
        if densities[bit] < iso_level {
            configuration |= 1 << bit;
        }
    }

    // Fully solid or fully empty cells generate nothing.
    if configuration == 0 || configuration == 0xff {
        return;
    }

    let edges = &TRIANGULATION[configuration];
    for triangle in edges.chunks_exact(3) {
        if triangle[0] == -1 {
            break;
        }

        // The table winds for the opposite front-face convention; swapping
        // the last two vertices makes front faces counter-clockwise.
        for &edge in [triangle[0], triangle[2], triangle[1]].iter() {
            let corner_a = EDGE_CORNER_A[edge as usize];
            let corner_b = EDGE_CORNER_B[edge as usize];
            let index = shared_vertex(
                map,
                iso_level,
                corners[corner_a],
                corners[corner_b],
                densities[corner_a],
                densities[corner_b],
                buffers,
                shared_edges,
            );
            buffers.indices.push(index);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn shared_vertex(
    map: &DensityMap,
    iso_level: f32,
    coord_a: IVec3,
    coord_b: IVec3,
    density_a: f32,
    density_b: f32,
    buffers: &mut MeshBuffers,
    shared_edges: &mut HashMap<(usize, usize), u32>,
) -> u32 {
    let flat_a = index::flatten(coord_a, map.points_per_axis());
    let flat_b = index::flatten(coord_b, map.points_per_axis());
    let key = (flat_a.min(flat_b), flat_a.max(flat_b));

    if let Some(&existing) = shared_edges.get(&key) {
        return existing;
    }

    let t = (iso_level - density_a) / (density_b - density_a);

    // Shift by the shell so positions are chunk-local.
    let position_a = (coord_a - IVec3::ONE).as_vec3();
    let position_b = (coord_b - IVec3::ONE).as_vec3();
    let position = position_a + t * (position_b - position_a);

    let normal_a = gradient(map, coord_a);
    let normal_b = gradient(map, coord_b);
    let normal = (normal_a + t * (normal_b - normal_a)).normalize_or_zero();

    let index = buffers.vertices.len() as u32;
    buffers.vertices.push(Vertex {
        position: position.to_array(),
        normal: normal.to_array(),
    });
    shared_edges.insert(key, index);
    index
}

/// Central-difference gradient at a sample, pointing out of the solid.
fn gradient(map: &DensityMap, at: IVec3) -> Vec3 {
    Vec3::new(
        map.sample(at - AXES[0]) - map.sample(at + AXES[0]),
        map.sample(at - AXES[1]) - map.sample(at + AXES[1]),
        map.sample(at - AXES[2]) - map.sample(at + AXES[2]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{BlendMode, Shape, ShapeKind};

    fn sphere_map(chunk_cells: i32, centre: Vec3, radius: f32) -> DensityMap {
        let mut map = DensityMap::new(chunk_cells, IVec3::ZERO, -32.0);
        map.apply_shape(
            &Shape::at_position(
                ShapeKind::Sphere,
                centre,
                BlendMode::Additive,
                8.0,
                Vec3::new(radius, 0.0, 0.0),
            )
            .unwrap(),
        );
        map
    }

    #[test]
    fn test_shared_edge_vertices_deduplicated() {
        let map = sphere_map(8, Vec3::splat(4.0), 3.0);
        let buffers = extract_marching_cubes(&map, 0.0);

        // With dedup a closed surface has far fewer vertices than indices.
        assert!(!buffers.is_empty());
        assert!(buffers.vertices.len() < buffers.indices.len() / 2);

        // No two vertices should sit at the same position.
        let mut seen = std::collections::HashSet::new();
        for vertex in &buffers.vertices {
            let quantised = vertex.position.map(|p| (p * 1024.0).round() as i64);
            assert!(seen.insert(quantised), "duplicate vertex at {quantised:?}");
        }
    }

    #[test]
    fn test_vertices_lie_between_crossing_corners() {
        let map = sphere_map(8, Vec3::splat(4.0), 3.0);
        let buffers = extract_marching_cubes(&map, 0.0);

        for vertex in &buffers.vertices {
            // Chunk-local positions stay within the chunk plus its shell.
            for p in vertex.position {
                assert!((-1.0..=9.0).contains(&p));
            }
        }
    }

    #[test]
    fn test_iso_level_shifts_surface() {
        let centre = Vec3::splat(8.0);
        let map = sphere_map(16, centre, 5.0);

        // A higher threshold carves deeper into the solid, shrinking it.
        let at_zero = extract_marching_cubes(&map, 0.0);
        let at_two = extract_marching_cubes(&map, 2.0);

        let mean_radius = |buffers: &MeshBuffers| {
            let sum: f32 = buffers
                .vertices
                .iter()
                .map(|v| (Vec3::from(v.position) - centre).length())
                .sum();
            sum / buffers.vertices.len() as f32
        };
        assert!(mean_radius(&at_two) < mean_radius(&at_zero));
    }
}
