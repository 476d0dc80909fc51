//! Signed-distance primitives and the smooth blend operator.
//!
//! All primitives operate in the shape's local space (the caller applies the
//! shape's inverse transform first) and return a signed distance: negative
//! inside, positive outside.
//!
//! Formulas follow <https://iquilezles.org/articles/distfunctions/>.

use bevy::prelude::*;

/// Distance to a sphere of the given radius, centred at the origin.
#[inline]
pub fn sphere(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

/// Distance to a sphere cut by the plane `y = h`, keeping the lower part.
///
/// Exact hemisphere SDF: one branch for points radially inside the sphere,
/// one for points above the cut face, one for points nearest the rim.
#[inline]
pub fn semi_sphere(p: Vec3, radius: f32, h: f32) -> f32 {
    let w = (radius * radius - h * h).sqrt();

    let q = Vec2::new(p.xz().length(), p.y);
    let s = ((h - radius) * q.x * q.x + w * w * (h + radius - 2.0 * q.y)).max(h * q.x - w * q.y);

    if s < 0.0 {
        q.length() - radius
    } else if q.x < w {
        h - q.y
    } else {
        (q - Vec2::new(w, h)).length()
    }
}

/// Distance to a capsule along the Y axis: a segment of the given half-height
/// swept by the given radius.
#[inline]
pub fn capsule(p: Vec3, height: f32, radius: f32) -> f32 {
    let dir = Vec3::new(0.0, height, 0.0);

    let pa = p - dir;
    let ba = -dir - dir;
    let h = (pa.dot(ba) / ba.dot(ba)).clamp(0.0, 1.0);
    (pa - ba * h).length() - radius
}

/// Distance to a torus lying in the XZ plane.
#[inline]
pub fn torus(p: Vec3, outer_radius: f32, inner_radius: f32) -> f32 {
    let q = Vec2::new(p.xz().length() - outer_radius, p.y);
    q.length() - inner_radius
}

/// Distance to an axis-aligned box with the given half-extents.
#[inline]
pub fn cube(p: Vec3, hx: f32, hy: f32, hz: f32) -> f32 {
    let d = p.abs() - Vec3::new(hx, hy, hz);
    d.max(Vec3::ZERO).length() + d.max_element().min(0.0)
}

/// Log-sum-exp smooth maximum.
///
/// Symmetric in `a` and `b`; converges to `max(a, b)` as `k` grows, while
/// lower `k` blends the two inputs into one continuous surface. The raw
/// (unstabilised) form is used throughout; sharpness validation at the shape
/// layer keeps `k * a` small enough that `exp` stays finite for any distance
/// that can occur inside a surface's grid.
#[inline]
pub fn smooth_max(a: f32, b: f32, k: f32) -> f32 {
    ((k * a).exp() + (k * b).exp()).ln() / k
}

/// Folds one signed distance into an existing density value.
///
/// Additive blending is a smooth union: `smooth_max(-distance, existing, k)`.
/// The subtractive case is the matching smooth min, computed by negating both
/// inputs and the result rather than branching into a second formula, so both
/// modes share one code path and are numerically identical to their branching
/// forms.
#[inline]
pub fn blend_density(existing: f32, distance: f32, sharpness: f32, subtractive: bool) -> f32 {
    let mult = if subtractive { -1.0 } else { 1.0 };
    smooth_max(-distance, existing * mult, sharpness) * mult
}
