//! Isosurface extraction: cell-table and relaxed-vertex extractors plus the
//! buffers they fill.
//!
//! Both extractors consume one [`DensityMap`](crate::density::DensityMap) and
//! emit chunk-local, deduplicated geometry. Vertex positions are relative to
//! the chunk's origin corner so the resulting [`Mesh`] can be placed with the
//! chunk entity's transform alone.

use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, Mesh, PrimitiveTopology};
use bytemuck::{Pod, Zeroable};

use crate::density::DensityMap;

mod marching_cubes;
mod surface_nets;
mod tables;

pub use marching_cubes::extract_marching_cubes;
pub use surface_nets::extract_surface_nets;

/// A single mesh vertex, laid out for direct GPU upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Which extraction algorithm a surface runs over its density maps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Extractor {
    /// Per-cell edge-table triangulation with vertices interpolated onto
    /// crossed edges. Sharper features, more triangles.
    #[default]
    MarchingCubes,
    /// One relaxed vertex per intersected cell, joined by quads. Smoother
    /// output, fewer triangles.
    SurfaceNets,
}

impl Extractor {
    /// Runs the chosen algorithm over `map`, treating `iso_level` as the
    /// surface crossing.
    pub fn extract(self, map: &DensityMap, iso_level: f32) -> MeshBuffers {
        match self {
            Extractor::MarchingCubes => extract_marching_cubes(map, iso_level),
            Extractor::SurfaceNets => extract_surface_nets(map, iso_level),
        }
    }
}

/// Deduplicated triangle-list geometry for one chunk.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffers {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// True when extraction produced no geometry, meaning any displayed mesh
    /// for this chunk should be cleared rather than replaced.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Converts the buffers into a renderable [`Mesh`], or `None` when empty.
    pub fn build(self) -> Option<Mesh> {
        if self.is_empty() {
            return None;
        }

        let mut positions = Vec::with_capacity(self.vertices.len());
        let mut normals = Vec::with_capacity(self.vertices.len());
        for vertex in &self.vertices {
            positions.push(vertex.position);
            normals.push(vertex.normal);
        }

        let mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
        )
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, normals)
        .with_inserted_indices(Indices::U32(self.indices));

        Some(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::{IVec3, Vec3};

    use crate::shape::{BlendMode, Shape, ShapeKind};

    fn solid_sphere_map(chunk_cells: i32, centre: Vec3, radius: f32) -> DensityMap {
        let mut map = DensityMap::new(chunk_cells, IVec3::ZERO, -32.0);
        let shape = Shape::at_position(
            ShapeKind::Sphere,
            centre,
            BlendMode::Additive,
            8.0,
            Vec3::new(radius, 0.0, 0.0),
        )
        .unwrap();
        map.apply_shape(&shape);
        map
    }

    #[test]
    fn test_empty_field_produces_no_geometry() {
        let map = DensityMap::new(8, IVec3::ZERO, -32.0);
        for extractor in [Extractor::MarchingCubes, Extractor::SurfaceNets] {
            let buffers = extractor.extract(&map, 0.0);
            assert!(buffers.is_empty());
            assert!(buffers.vertices.is_empty());
            assert!(buffers.build().is_none());
        }
    }

    #[test]
    fn test_full_field_produces_no_geometry() {
        // Uniformly solid is just as boring as uniformly empty.
        let map = DensityMap::new(8, IVec3::ZERO, 32.0);
        for extractor in [Extractor::MarchingCubes, Extractor::SurfaceNets] {
            assert!(extractor.extract(&map, 0.0).is_empty());
        }
    }

    #[test]
    fn test_sphere_produces_closed_mesh() {
        let map = solid_sphere_map(16, Vec3::splat(8.0), 4.0);

        for extractor in [Extractor::MarchingCubes, Extractor::SurfaceNets] {
            let buffers = extractor.extract(&map, 0.0);
            assert!(!buffers.is_empty());
            assert_eq!(buffers.indices.len() % 3, 0);

            // Every index refers to a real vertex.
            let count = buffers.vertices.len() as u32;
            assert!(buffers.indices.iter().all(|&i| i < count));

            // A closed surface has every edge shared by exactly two triangles.
            let mut edge_counts = std::collections::HashMap::new();
            for tri in buffers.indices.chunks_exact(3) {
                for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                    *edge_counts.entry((a.min(b), a.max(b))).or_insert(0u32) += 1;
                }
            }
            assert!(edge_counts.values().all(|&c| c == 2));

            // Euler characteristic of a genus-0 surface.
            let vertices = buffers.vertices.len() as i64;
            let edges = edge_counts.len() as i64;
            let faces = (buffers.indices.len() / 3) as i64;
            assert_eq!(vertices - edges + faces, 2);
        }
    }

    #[test]
    fn test_sphere_vertices_near_radius() {
        let centre = Vec3::splat(8.0);
        let map = solid_sphere_map(16, centre, 4.0);

        let buffers = Extractor::MarchingCubes.extract(&map, 0.0);
        for vertex in &buffers.vertices {
            let distance = (Vec3::from(vertex.position) - centre).length();
            assert!(
                (distance - 4.0).abs() < 0.5,
                "vertex {:?} is {distance} from centre",
                vertex.position
            );
        }
    }

    #[test]
    fn test_normals_point_outward() {
        let centre = Vec3::splat(8.0);
        let map = solid_sphere_map(16, centre, 4.0);

        for extractor in [Extractor::MarchingCubes, Extractor::SurfaceNets] {
            let buffers = extractor.extract(&map, 0.0);
            for vertex in &buffers.vertices {
                let outward = (Vec3::from(vertex.position) - centre).normalize();
                let normal = Vec3::from(vertex.normal);
                assert!((normal.length() - 1.0).abs() < 1e-3);
                assert!(
                    normal.dot(outward) > 0.5,
                    "normal {normal} opposes outward direction {outward}"
                );
            }
        }
    }

    #[test]
    fn test_winding_faces_outward() {
        let centre = Vec3::splat(8.0);
        let map = solid_sphere_map(16, centre, 4.0);

        for extractor in [Extractor::MarchingCubes, Extractor::SurfaceNets] {
            let buffers = extractor.extract(&map, 0.0);
            for tri in buffers.indices.chunks_exact(3) {
                let [a, b, c] = [
                    Vec3::from(buffers.vertices[tri[0] as usize].position),
                    Vec3::from(buffers.vertices[tri[1] as usize].position),
                    Vec3::from(buffers.vertices[tri[2] as usize].position),
                ];
                let face_normal = (b - a).cross(c - a);
                if face_normal.length() < 1e-6 {
                    continue;
                }
                let outward = (a + b + c) / 3.0 - centre;
                assert!(
                    face_normal.dot(outward) > 0.0,
                    "triangle {tri:?} winds toward the solid interior"
                );
            }
        }
    }

    #[test]
    fn test_build_sets_all_attributes() {
        let map = solid_sphere_map(8, Vec3::splat(4.0), 2.0);
        let mesh = Extractor::MarchingCubes.extract(&map, 0.0).build().unwrap();

        let positions = mesh.attribute(Mesh::ATTRIBUTE_POSITION).unwrap().len();
        let normals = mesh.attribute(Mesh::ATTRIBUTE_NORMAL).unwrap().len();
        assert_eq!(positions, normals);
        assert!(mesh.indices().is_some());
    }

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        let bytes: &[u8] = bytemuck::bytes_of(&Vertex {
            position: [1.0, 2.0, 3.0],
            normal: [0.0, 1.0, 0.0],
        });
        assert_eq!(bytes.len(), 24);
    }
}
