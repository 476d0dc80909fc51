//! Plugin wiring surfaces, brushes, and chunk meshes together.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::brush::{
    apply_pending_stamps, queue_changed_brushes, rebuild_surfaces, PendingStamps, RebuildSurface,
};
use crate::index;
use crate::surface::Surface;

/// System set containing every isosurface system, for external ordering.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct IsosurfaceSystems;

/// Plugin that turns [`Surface`] entities into sculptable chunked meshes.
///
/// Each frame, in order: newly added surfaces are generated and given chunk
/// child entities, moved brushes queue stamps while structural brush edits
/// request rebuilds, those are folded into the density fields, and dirty
/// chunks are re-extracted into their children's [`Mesh3d`] handles.
///
/// # Example
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_isosurface::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(IsosurfacePlugin)
///     .run();
/// ```
pub struct IsosurfacePlugin;

impl Plugin for IsosurfacePlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<RebuildSurface>().add_systems(
            Update,
            (
                initialize_surfaces,
                queue_changed_brushes,
                rebuild_surfaces,
                apply_pending_stamps,
                update_chunk_meshes,
            )
                .chain()
                .in_set(IsosurfaceSystems),
        );
    }
}

/// Marks a chunk child entity and records which chunk it displays.
#[derive(Component, Debug)]
pub struct SurfaceChunk {
    pub chunk_index: IVec3,
}

/// Chunk-index to child-entity table kept on the surface entity.
#[derive(Component, Default, Debug)]
pub struct ChunkEntities(HashMap<IVec3, Entity>);

impl ChunkEntities {
    pub fn get(&self, chunk_index: IVec3) -> Option<Entity> {
        self.0.get(&chunk_index).copied()
    }
}

/// Generates newly added surfaces and spawns one child entity per chunk,
/// placed at the chunk's origin. Despawning the surface entity tears the
/// chunk children down with it.
pub fn initialize_surfaces(
    mut commands: Commands,
    mut surfaces: Query<
        (Entity, &mut Surface, Option<&MeshMaterial3d<StandardMaterial>>),
        Added<Surface>,
    >,
) {
    for (entity, mut surface, material) in &mut surfaces {
        if !surface.is_generated() {
            if let Err(error) = surface.generate() {
                warn!("surface generation failed: {error}");
                continue;
            }
        }

        let cells = surface.chunk_cells();
        let dimensions = surface.dimensions();
        let mut entities = ChunkEntities::default();

        for i in 0..surface.chunk_count() {
            let chunk_index = index::unflatten_size(i, dimensions);
            let origin = (chunk_index * cells).as_vec3();
            let mut child = commands.spawn((
                SurfaceChunk { chunk_index },
                Transform::from_translation(origin),
                Visibility::default(),
                ChildOf(entity),
            ));
            // Chunks render with the material placed on the surface entity.
            if let Some(material) = material {
                child.insert(material.clone());
            }
            entities.0.insert(chunk_index, child.id());
        }

        commands
            .entity(entity)
            .insert((entities, PendingStamps::default()));
    }
}

/// Re-extracts dirty chunks and pushes the geometry into the chunk
/// children's mesh handles. Empty buffers clear the child's mesh instead of
/// replacing it.
pub fn update_chunk_meshes(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut surfaces: Query<(&mut Surface, &ChunkEntities)>,
    chunk_meshes: Query<Option<&Mesh3d>, With<SurfaceChunk>>,
) {
    for (mut surface, entities) in &mut surfaces {
        if !surface.is_generated() {
            continue;
        }

        let Ok(extracted) = surface.extract_dirty() else {
            continue;
        };

        for (chunk_index, buffers) in extracted {
            let Some(child) = entities.get(chunk_index) else {
                continue;
            };

            match buffers.build() {
                Some(mesh) => match chunk_meshes.get(child) {
                    Ok(Some(existing)) => {
                        meshes.insert(existing.id(), mesh);
                    }
                    _ => {
                        commands.entity(child).insert(Mesh3d(meshes.add(mesh)));
                    }
                },
                None => {
                    commands.entity(child).remove::<Mesh3d>();
                }
            }
        }
    }
}
