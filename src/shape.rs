//! Shape placements: one primitive, one blend mode, one transform.
//!
//! A [`Shape`] is an immutable value describing a single primitive's
//! contribution to a surface. Brushes construct a fresh `Shape` whenever
//! their parameters change; density maps consume them read-only.

use bevy::math::Affine3A;
use bevy::prelude::*;
use thiserror::Error;

use crate::sdf;

/// Largest accepted blend sharpness.
///
/// The raw log-sum-exp blend computes `exp(sharpness * distance)`; bounding
/// sharpness keeps that finite for any distance reachable inside a surface's
/// grid and its base density of magnitude 32.
pub const MAX_SHARPNESS: f32 = 8.0;

/// Which distance primitive a shape evaluates.
///
/// The meaning of the up-to-three size parameters depends on the kind; see
/// [`Shape::new`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    #[default]
    Sphere,
    SemiSphere,
    Capsule,
    Torus,
    Cube,
}

/// Whether a shape adds material to the surface or carves it away.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    Additive,
    Subtractive,
}

/// Errors produced when validating shape parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Sharpness must be in (0, {MAX_SHARPNESS}], got {value}")]
    InvalidSharpness { value: f32 },

    #[error("Size parameter {index} must be non-negative and finite, got {value}")]
    InvalidDimension { index: usize, value: f32 },
}

/// A single primitive placement, immutable once constructed.
#[derive(Clone, Copy, Debug)]
pub struct Shape {
    kind: ShapeKind,
    /// World-to-local transform applied to query points before evaluating
    /// the distance function.
    inverse_transform: Affine3A,
    blend_mode: BlendMode,
    sharpness: f32,
    dimensions: Vec3,
}

impl Shape {
    /// Creates a validated shape.
    ///
    /// `transform` is the shape's local-to-world placement; it is inverted
    /// once here so density evaluation pays only a matrix multiply per
    /// sample. `dimensions` holds up to three size parameters:
    ///
    /// | kind         | x              | y             | z            |
    /// |--------------|----------------|---------------|--------------|
    /// | `Sphere`     | radius         | -             | -            |
    /// | `SemiSphere` | radius         | cut height    | -            |
    /// | `Capsule`    | half-height    | radius        | -            |
    /// | `Torus`      | ring radius    | tube radius   | -            |
    /// | `Cube`       | half-extent x  | half-extent y | half-extent z|
    ///
    /// # Errors
    /// Returns [`ShapeError`] if `sharpness` is outside `(0, MAX_SHARPNESS]`
    /// or any dimension is negative or non-finite.
    pub fn new(
        kind: ShapeKind,
        transform: Affine3A,
        blend_mode: BlendMode,
        sharpness: f32,
        dimensions: Vec3,
    ) -> Result<Self, ShapeError> {
        if !(sharpness > 0.0 && sharpness <= MAX_SHARPNESS) {
            return Err(ShapeError::InvalidSharpness { value: sharpness });
        }

        for (index, value) in dimensions.to_array().into_iter().enumerate() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ShapeError::InvalidDimension { index, value });
            }
        }

        Ok(Self {
            kind,
            inverse_transform: transform.inverse(),
            blend_mode,
            sharpness,
            dimensions,
        })
    }

    /// Convenience constructor for an axis-aligned shape at a world position.
    pub fn at_position(
        kind: ShapeKind,
        position: Vec3,
        blend_mode: BlendMode,
        sharpness: f32,
        dimensions: Vec3,
    ) -> Result<Self, ShapeError> {
        Self::new(
            kind,
            Affine3A::from_translation(position),
            blend_mode,
            sharpness,
            dimensions,
        )
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn sharpness(&self) -> f32 {
        self.sharpness
    }

    pub fn dimensions(&self) -> Vec3 {
        self.dimensions
    }

    /// The shape's world-space position, recovered from the stored inverse.
    pub fn position(&self) -> Vec3 {
        self.inverse_transform.inverse().translation.into()
    }

    /// Maps a world/grid-space point into the shape's local space.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.inverse_transform.transform_point3(point)
    }

    /// Signed distance from a local-space point to the shape's boundary.
    #[inline]
    pub fn distance(&self, local_point: Vec3) -> f32 {
        let d = self.dimensions;
        match self.kind {
            ShapeKind::Sphere => sdf::sphere(local_point, d.x),
            ShapeKind::SemiSphere => sdf::semi_sphere(local_point, d.x, d.y),
            ShapeKind::Capsule => sdf::capsule(local_point, d.x, d.y),
            ShapeKind::Torus => sdf::torus(local_point, d.x, d.y),
            ShapeKind::Cube => sdf::cube(local_point, d.x, d.y, d.z),
        }
    }

    /// Folds this shape's contribution into an existing density value at the
    /// given world/grid-space point.
    #[inline]
    pub fn apply(&self, existing: f32, point: Vec3) -> f32 {
        let distance = self.distance(self.transform_point(point));
        sdf::blend_density(
            existing,
            distance,
            self.sharpness,
            self.blend_mode == BlendMode::Subtractive,
        )
    }

    /// Estimates, in chunks per axis, the region this shape can influence.
    ///
    /// The estimate starts from a characteristic world-space extent per kind,
    /// widens it by `2 / sharpness` (softer blends reach further before the
    /// contribution becomes negligible), converts to chunks, and clamps to a
    /// 3-chunk floor per axis so shapes smaller than one chunk still cover
    /// their full 27-chunk neighbourhood. Deliberately an over-estimate: the
    /// cost of an extra chunk update beats a visible seam from an
    /// under-updated one. The shape's rotation is not taken into account.
    pub fn chunk_volume(&self, chunk_cells: i32) -> IVec3 {
        let d = self.dimensions;

        let mut extent = match self.kind {
            ShapeKind::Sphere | ShapeKind::SemiSphere => Vec3::splat(d.x * 2.0),
            ShapeKind::Capsule | ShapeKind::Torus => Vec3::splat((d.x + d.y) * 2.5),
            ShapeKind::Cube => d * 2.0,
        };

        extent *= 2.0 / self.sharpness;

        let chunks = (extent / chunk_cells as f32).ceil().as_ivec3();
        (chunks + IVec3::ONE).max(IVec3::splat(3))
    }
}
