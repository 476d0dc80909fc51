//! Sculpting demo: a blob built from a few brushes, carved live by an
//! orbiting subtractive brush.

use bevy::prelude::*;
use bevy_isosurface::prelude::*;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(IsosurfacePlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, orbit_carver)
        .run();
}

/// Marks the brush that keeps moving, carving a groove as it goes.
#[derive(Component)]
struct Carver {
    angle: f32,
}

fn setup(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // A 4x4x4 grid of 16-cell chunks spanning 64 units per axis.
    let surface = commands
        .spawn((
            Surface::new(IVec3::splat(4), ChunkResolution::Medium).unwrap(),
            Transform::default(),
            Visibility::default(),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.7, 0.6, 0.5),
                perceptual_roughness: 0.9,
                ..default()
            })),
        ))
        .id();

    // Static body: two merged spheres and a torus collar.
    commands.spawn((
        ShapeBrush {
            kind: ShapeKind::Sphere,
            blend_mode: BlendMode::Additive,
            sharpness: 0.5,
            dimensions: Vec3::new(10.0, 0.0, 0.0),
        },
        Transform::from_xyz(32.0, 28.0, 32.0),
        ChildOf(surface),
    ));
    commands.spawn((
        ShapeBrush {
            kind: ShapeKind::Sphere,
            blend_mode: BlendMode::Additive,
            sharpness: 0.5,
            dimensions: Vec3::new(7.0, 0.0, 0.0),
        },
        Transform::from_xyz(32.0, 40.0, 32.0),
        ChildOf(surface),
    ));
    commands.spawn((
        ShapeBrush {
            kind: ShapeKind::Torus,
            blend_mode: BlendMode::Additive,
            sharpness: 1.0,
            dimensions: Vec3::new(12.0, 2.0, 0.0),
        },
        Transform::from_xyz(32.0, 34.0, 32.0),
        ChildOf(surface),
    ));

    // The moving subtractive brush.
    commands.spawn((
        ShapeBrush {
            kind: ShapeKind::Sphere,
            blend_mode: BlendMode::Subtractive,
            sharpness: 2.0,
            dimensions: Vec3::new(3.0, 0.0, 0.0),
        },
        Transform::from_xyz(42.0, 28.0, 32.0),
        Carver { angle: 0.0 },
        ChildOf(surface),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 60.0, 20.0).looking_at(Vec3::splat(32.0), Vec3::Y),
    ));

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(80.0, 60.0, 80.0).looking_at(Vec3::new(32.0, 32.0, 32.0), Vec3::Y),
    ));
}

fn orbit_carver(time: Res<Time>, mut carvers: Query<(&mut Carver, &mut Transform)>) {
    for (mut carver, mut transform) in &mut carvers {
        carver.angle += time.delta_secs() * 0.4;
        let radius = 11.0;
        transform.translation = Vec3::new(
            32.0 + radius * carver.angle.cos(),
            28.0 + 4.0 * (carver.angle * 2.0).sin(),
            32.0 + radius * carver.angle.sin(),
        );
    }
}
