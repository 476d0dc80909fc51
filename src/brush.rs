//! Sculpting brushes driven by the transform hierarchy.
//!
//! A [`ShapeBrush`] entity parented under a [`Surface`] entity acts as a
//! stamp. Transform-only moves fold the current shape into the surface
//! incrementally; parameter edits, added or removed brushes, and child
//! reorders request a [`RebuildSurface`] recompute from the full queue,
//! since stamping cannot take back density already folded in.

use std::collections::HashSet;

use bevy::prelude::*;

use crate::shape::{BlendMode, Shape, ShapeError, ShapeKind};
use crate::surface::Surface;

/// One sculpting stamp, placed under a surface entity.
///
/// # Example
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_isosurface::prelude::*;
///
/// fn spawn_brush(mut commands: Commands, surface: Entity) {
///     commands.spawn((
///         ShapeBrush {
///             kind: ShapeKind::Sphere,
///             blend_mode: BlendMode::Additive,
///             sharpness: 1.0,
///             dimensions: Vec3::new(4.0, 0.0, 0.0),
///         },
///         Transform::from_xyz(16.0, 16.0, 16.0),
///         ChildOf(surface),
///     ));
/// }
/// ```
#[derive(Component, Clone, Debug)]
#[require(Transform)]
pub struct ShapeBrush {
    pub kind: ShapeKind,
    pub blend_mode: BlendMode,
    /// Blend sharpness handed to [`Shape::new`]; out-of-range values are
    /// reported once per change and the stamp is skipped.
    pub sharpness: f32,
    /// Size parameters, interpreted per [`ShapeKind`].
    pub dimensions: Vec3,
}

impl Default for ShapeBrush {
    fn default() -> Self {
        Self {
            kind: ShapeKind::Sphere,
            blend_mode: BlendMode::Additive,
            sharpness: 1.0,
            dimensions: Vec3::new(4.0, 0.0, 0.0),
        }
    }
}

impl ShapeBrush {
    /// Snapshots the brush into an immutable [`Shape`] at its current
    /// world placement.
    pub fn to_shape(&self, transform: &GlobalTransform) -> Result<Shape, ShapeError> {
        Shape::new(
            self.kind,
            transform.affine(),
            self.blend_mode,
            self.sharpness,
            self.dimensions,
        )
    }
}

/// Stamps waiting to be folded into a surface.
///
/// Lives on the surface entity; brush systems push into it and
/// [`apply_pending_stamps`] drains it in arrival order.
#[derive(Component, Default, Debug)]
pub struct PendingStamps(Vec<Stamp>);

/// A snapshotted shape plus the world position it was stamped at.
#[derive(Clone, Copy, Debug)]
pub struct Stamp {
    pub shape: Shape,
    pub position: Vec3,
}

impl PendingStamps {
    pub fn push(&mut self, stamp: Stamp) {
        self.0.push(stamp);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Requests a full recompute of a surface's field from its brush children,
/// in child order. Issued for every edit that incremental stamping cannot
/// express: parameter changes, brush add/remove, and child reorders.
#[derive(Message, Debug, Clone, Copy)]
pub struct RebuildSurface {
    pub surface: Entity,
}

/// Routes brush changes this frame: transform-only moves queue incremental
/// stamps, every structural edit requests a full rebuild instead.
pub fn queue_changed_brushes(
    brushes: Query<(Ref<ShapeBrush>, Ref<GlobalTransform>, &ChildOf)>,
    mut removed_brushes: RemovedComponents<ShapeBrush>,
    parents: Query<&ChildOf>,
    reordered: Query<Entity, (With<Surface>, Changed<Children>)>,
    mut emptied: RemovedComponents<Children>,
    mut stamps: Query<&mut PendingStamps>,
    mut rebuilds: MessageWriter<RebuildSurface>,
) {
    // Child-list edits cover brush despawns and reorders. Losing the last
    // child drops the list component entirely, hence the second read.
    for surface in &reordered {
        rebuilds.write(RebuildSurface { surface });
    }
    for entity in emptied.read() {
        if stamps.contains(entity) {
            rebuilds.write(RebuildSurface { surface: entity });
        }
    }
    // A brush stripped of its component while still parented.
    for entity in removed_brushes.read() {
        if let Ok(child_of) = parents.get(entity) {
            rebuilds.write(RebuildSurface {
                surface: child_of.parent(),
            });
        }
    }

    for (brush, transform, child_of) in &brushes {
        if brush.is_changed() {
            // Parameter edits re-shape density that is already folded in;
            // only a recompute of the full queue can take it back out.
            rebuilds.write(RebuildSurface {
                surface: child_of.parent(),
            });
            continue;
        }
        if !transform.is_changed() {
            continue;
        }

        let Ok(mut pending) = stamps.get_mut(child_of.parent()) else {
            continue;
        };

        match brush.to_shape(&transform) {
            Ok(shape) => pending.push(Stamp {
                shape,
                position: transform.translation(),
            }),
            Err(error) => warn!("skipping brush stamp: {error}"),
        }
    }
}

/// Drains each surface's stamp queue into incremental edits.
pub fn apply_pending_stamps(mut surfaces: Query<(&mut Surface, &mut PendingStamps)>) {
    for (mut surface, mut pending) in &mut surfaces {
        if pending.0.is_empty() || !surface.is_generated() {
            continue;
        }

        for stamp in pending.0.drain(..) {
            if let Err(error) = surface.apply_shape_at(&stamp.shape, stamp.position) {
                warn!("dropped stamp: {error}");
            }
        }
    }
}

/// Recomputes requested surfaces from their brush children, in child order.
pub fn rebuild_surfaces(
    mut requests: MessageReader<RebuildSurface>,
    mut surfaces: Query<(&mut Surface, &mut PendingStamps, Option<&Children>)>,
    brushes: Query<(&ShapeBrush, &GlobalTransform)>,
) {
    let mut rebuilt = HashSet::new();
    for request in requests.read() {
        if !rebuilt.insert(request.surface) {
            continue;
        }
        let Ok((mut surface, mut pending, children)) = surfaces.get_mut(request.surface) else {
            continue;
        };
        if !surface.is_generated() {
            continue;
        }

        // A full rebuild supersedes any queued incremental edits.
        pending.0.clear();

        let mut shapes = Vec::new();
        if let Some(children) = children {
            for child in children.iter() {
                let Ok((brush, transform)) = brushes.get(child) else {
                    continue;
                };
                match brush.to_shape(transform) {
                    Ok(shape) => shapes.push(shape),
                    Err(error) => warn!("excluding brush from rebuild: {error}"),
                }
            }
        }

        if let Err(error) = surface.recompute(&shapes) {
            warn!("rebuild failed: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{ChunkResolution, Surface};

    fn sculpt_app() -> (App, Entity) {
        let mut app = App::new();
        app.add_message::<RebuildSurface>();
        app.add_systems(
            Update,
            (queue_changed_brushes, rebuild_surfaces, apply_pending_stamps).chain(),
        );

        let mut surface = Surface::new(IVec3::splat(2), ChunkResolution::Low).unwrap();
        surface.generate().unwrap();
        let entity = app
            .world_mut()
            .spawn((surface, PendingStamps::default()))
            .id();
        (app, entity)
    }

    fn spawn_brush(app: &mut App, surface: Entity, position: Vec3, radius: f32) -> Entity {
        app.world_mut()
            .spawn((
                ShapeBrush {
                    dimensions: Vec3::new(radius, 0.0, 0.0),
                    ..default()
                },
                Transform::from_translation(position),
                GlobalTransform::from(Transform::from_translation(position)),
                ChildOf(surface),
            ))
            .id()
    }

    fn sample(app: &App, surface: Entity, position: Vec3) -> f32 {
        app.world()
            .get::<Surface>(surface)
            .unwrap()
            .sample_density(position)
            .unwrap()
    }

    #[test]
    fn test_parameter_edit_recomputes_from_queue() {
        let (mut app, surface) = sculpt_app();
        let brush = spawn_brush(&mut app, surface, Vec3::splat(8.0), 5.0);
        app.update();
        assert!(sample(&app, surface, Vec3::new(12.0, 8.0, 8.0)) > 0.0);

        app.world_mut()
            .get_mut::<ShapeBrush>(brush)
            .unwrap()
            .dimensions
            .x = 2.0;
        app.update();
        // The shrunk sphere no longer reaches this point; geometry from the
        // wider one must not survive the edit.
        assert!(sample(&app, surface, Vec3::new(12.0, 8.0, 8.0)) < 0.0);
        assert!(sample(&app, surface, Vec3::splat(8.0)) > 0.0);
    }

    #[test]
    fn test_brush_despawn_rebuilds_surface() {
        let (mut app, surface) = sculpt_app();
        let brush = spawn_brush(&mut app, surface, Vec3::splat(8.0), 5.0);
        app.update();
        assert!(sample(&app, surface, Vec3::splat(8.0)) > 0.0);

        app.world_mut().entity_mut(brush).despawn();
        app.update();
        assert!(sample(&app, surface, Vec3::splat(8.0)) < 0.0);
    }

    #[test]
    fn test_transform_move_stamps_incrementally() {
        let (mut app, surface) = sculpt_app();
        let brush = spawn_brush(&mut app, surface, Vec3::new(4.0, 8.0, 8.0), 3.0);
        app.update();
        assert!(sample(&app, surface, Vec3::new(4.0, 8.0, 8.0)) > 0.0);

        *app.world_mut().get_mut::<GlobalTransform>(brush).unwrap() =
            GlobalTransform::from(Transform::from_xyz(12.0, 8.0, 8.0));
        app.update();

        // A move stamps the new spot and leaves the old one painted.
        assert!(sample(&app, surface, Vec3::new(12.0, 8.0, 8.0)) > 0.0);
        assert!(sample(&app, surface, Vec3::new(4.0, 8.0, 8.0)) > 0.0);
    }

    #[test]
    fn test_brush_snapshot_uses_world_transform() {
        let brush = ShapeBrush::default();
        let transform = GlobalTransform::from(Transform::from_xyz(10.0, 0.0, 0.0));

        let shape = brush.to_shape(&transform).unwrap();
        assert_eq!(shape.position(), Vec3::new(10.0, 0.0, 0.0));
        // Point at the brush centre is inside the default sphere.
        assert!(shape.distance(shape.transform_point(Vec3::new(10.0, 0.0, 0.0))) < 0.0);
    }

    #[test]
    fn test_brush_rejects_invalid_sharpness() {
        let brush = ShapeBrush {
            sharpness: 0.0,
            ..default()
        };
        let transform = GlobalTransform::default();
        assert!(matches!(
            brush.to_shape(&transform),
            Err(ShapeError::InvalidSharpness { .. })
        ));
    }

    #[test]
    fn test_pending_stamps_accumulate() {
        let mut pending = PendingStamps::default();
        assert!(pending.is_empty());

        let brush = ShapeBrush::default();
        let shape = brush.to_shape(&GlobalTransform::default()).unwrap();
        pending.push(Stamp {
            shape,
            position: Vec3::ZERO,
        });
        assert!(!pending.is_empty());
    }
}
