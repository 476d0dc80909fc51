//! Per-chunk scalar field storage.
//!
//! A [`DensityMap`] holds the sampled field for one chunk, including a
//! one-sample border shell on every side. The shell lets extraction read
//! neighbouring densities for interpolation and normals without touching any
//! other chunk, so chunks can be evaluated independently.

use bevy::math::{IVec3, Vec3};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::index;
use crate::shape::Shape;

/// Dense scalar field for a single chunk, border shell included.
///
/// With `chunk_cells` cells per axis a chunk needs `chunk_cells + 1` corner
/// samples; the shell adds one more on each side, giving
/// `points_per_axis = chunk_cells + 3`. Local sample coordinate `l` maps to
/// global cell `chunk_origin_index + l - 1`.
#[derive(Clone, Debug)]
pub struct DensityMap {
    samples: Vec<f32>,
    points_per_axis: i32,
    chunk_origin_index: IVec3,
}

impl DensityMap {
    /// Allocates a map filled with `base` for the chunk whose lowest corner
    /// sits at global cell `chunk_origin_index`.
    pub fn new(chunk_cells: i32, chunk_origin_index: IVec3, base: f32) -> Self {
        let points_per_axis = chunk_cells + 3;
        let len = (points_per_axis as usize).pow(3);
        Self {
            samples: vec![base; len],
            points_per_axis,
            chunk_origin_index,
        }
    }

    pub fn points_per_axis(&self) -> i32 {
        self.points_per_axis
    }

    pub fn chunk_origin_index(&self) -> IVec3 {
        self.chunk_origin_index
    }

    /// World-space position of the sample at local coordinate `local`.
    #[inline]
    pub fn world_position(&self, local: IVec3) -> Vec3 {
        (self.chunk_origin_index + local - IVec3::ONE).as_vec3()
    }

    /// Resets every sample to `base`, discarding all shape contributions.
    pub fn fill(&mut self, base: f32) {
        self.samples.fill(base);
    }

    /// Refills with `base` then folds in `shapes` in slice order.
    ///
    /// Order matters: the log-sum-exp blend is applied shape by shape, so an
    /// additive stamp followed by a subtractive one is not the same field as
    /// the reverse.
    pub fn populate(&mut self, base: f32, shapes: &[Shape]) {
        let origin = self.chunk_origin_index;
        let ppa = self.points_per_axis;
        Self::for_each_sample(&mut self.samples, ppa, |local, value| {
            let point = (origin + local - IVec3::ONE).as_vec3();
            *value = base;
            for shape in shapes {
                *value = shape.apply(*value, point);
            }
        });
    }

    /// Folds one shape into the existing field.
    pub fn apply_shape(&mut self, shape: &Shape) {
        let origin = self.chunk_origin_index;
        let ppa = self.points_per_axis;
        Self::for_each_sample(&mut self.samples, ppa, |local, value| {
            let point = (origin + local - IVec3::ONE).as_vec3();
            *value = shape.apply(*value, point);
        });
    }

    /// Reads the sample at `local`.
    ///
    /// # Panics
    /// Panics if `local` lies outside `[0, points_per_axis)` on any axis.
    #[inline]
    pub fn sample(&self, local: IVec3) -> f32 {
        debug_assert!(index::in_bounds(local, IVec3::splat(self.points_per_axis)));
        self.samples[index::flatten(local, self.points_per_axis)]
    }

    /// Reads the sample at `local`, clamping each axis into the stored range.
    ///
    /// Used for gradient estimation at the border shell, where one of the
    /// central-difference taps would otherwise fall off the map.
    #[inline]
    pub fn sample_clamped(&self, local: IVec3) -> f32 {
        let clamped = local.clamp(IVec3::ZERO, IVec3::splat(self.points_per_axis - 1));
        self.samples[index::flatten(clamped, self.points_per_axis)]
    }

    #[cfg(feature = "parallel")]
    fn for_each_sample<F>(samples: &mut [f32], points_per_axis: i32, op: F)
    where
        F: Fn(IVec3, &mut f32) + Sync + Send,
    {
        samples.par_iter_mut().enumerate().for_each(|(i, value)| {
            op(index::unflatten(i, points_per_axis), value);
        });
    }

    #[cfg(not(feature = "parallel"))]
    fn for_each_sample<F>(samples: &mut [f32], points_per_axis: i32, op: F)
    where
        F: Fn(IVec3, &mut f32),
    {
        for (i, value) in samples.iter_mut().enumerate() {
            op(index::unflatten(i, points_per_axis), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{BlendMode, ShapeKind};

    fn sphere_at(position: Vec3, radius: f32, mode: BlendMode) -> Shape {
        Shape::at_position(
            ShapeKind::Sphere,
            position,
            mode,
            1.0,
            Vec3::new(radius, 0.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions_include_border() {
        let map = DensityMap::new(16, IVec3::ZERO, -32.0);
        assert_eq!(map.points_per_axis(), 19);
        assert_eq!(map.sample(IVec3::ZERO), -32.0);
        assert_eq!(map.sample(IVec3::splat(18)), -32.0);
    }

    #[test]
    fn test_world_position_offsets_by_shell() {
        let map = DensityMap::new(8, IVec3::new(8, 0, 16), 0.0);
        // Local (1,1,1) is the chunk's own origin corner.
        assert_eq!(map.world_position(IVec3::ONE), Vec3::new(8.0, 0.0, 16.0));
        assert_eq!(map.world_position(IVec3::ZERO), Vec3::new(7.0, -1.0, 15.0));
    }

    #[test]
    fn test_fill_is_idempotent() {
        let mut map = DensityMap::new(8, IVec3::ZERO, -32.0);
        map.apply_shape(&sphere_at(Vec3::splat(4.0), 3.0, BlendMode::Additive));
        map.fill(-32.0);
        let again = map.clone();
        map.fill(-32.0);
        assert_eq!(map.samples, again.samples);
        assert!(map.samples.iter().all(|&v| v == -32.0));
    }

    #[test]
    fn test_apply_shape_raises_density_inside() {
        let mut map = DensityMap::new(8, IVec3::ZERO, -32.0);
        let centre = Vec3::splat(4.0);
        map.apply_shape(&sphere_at(centre, 3.0, BlendMode::Additive));

        // Centre of the sphere: well inside, density pulled positive.
        assert!(map.sample(IVec3::splat(5)) > 0.0);
        // Far corner: outside the sphere, still negative.
        assert!(map.sample(IVec3::ZERO) < 0.0);
    }

    #[test]
    fn test_populate_matches_sequential_apply() {
        let shapes = [
            sphere_at(Vec3::splat(4.0), 3.0, BlendMode::Additive),
            sphere_at(Vec3::new(6.0, 4.0, 4.0), 2.0, BlendMode::Subtractive),
        ];

        let mut populated = DensityMap::new(8, IVec3::ZERO, -32.0);
        populated.populate(-32.0, &shapes);

        let mut stepped = DensityMap::new(8, IVec3::ZERO, -32.0);
        for shape in &shapes {
            stepped.apply_shape(shape);
        }

        for (a, b) in populated.samples.iter().zip(&stepped.samples) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_shape_order_changes_field() {
        // A soft additive sphere against a sharp subtractive one; the
        // sharpness asymmetry makes the ordering visibly non-commutative.
        let centre = Vec3::splat(4.0);
        let add = Shape::at_position(
            ShapeKind::Sphere,
            centre,
            BlendMode::Additive,
            0.1,
            Vec3::new(3.0, 0.0, 0.0),
        )
        .unwrap();
        let cut = Shape::at_position(
            ShapeKind::Sphere,
            centre,
            BlendMode::Subtractive,
            1.0,
            Vec3::new(2.0, 0.0, 0.0),
        )
        .unwrap();

        let mut add_then_cut = DensityMap::new(8, IVec3::ZERO, -32.0);
        add_then_cut.populate(-32.0, &[add, cut]);

        let mut cut_then_add = DensityMap::new(8, IVec3::ZERO, -32.0);
        cut_then_add.populate(-32.0, &[cut, add]);

        // After add-then-cut the centre is carved out; the reverse order
        // leaves the additive sphere intact there.
        let centre = IVec3::splat(5);
        assert!(add_then_cut.sample(centre) < 0.0);
        assert!(cut_then_add.sample(centre) > 0.0);
    }

    #[test]
    fn test_sample_clamped_extends_edges() {
        let mut map = DensityMap::new(4, IVec3::ZERO, 0.0);
        map.apply_shape(&sphere_at(Vec3::splat(2.0), 8.0, BlendMode::Additive));
        assert_eq!(
            map.sample_clamped(IVec3::new(-1, 3, 3)),
            map.sample(IVec3::new(0, 3, 3))
        );
        assert_eq!(
            map.sample_clamped(IVec3::splat(99)),
            map.sample(IVec3::splat(map.points_per_axis() - 1))
        );
    }
}
