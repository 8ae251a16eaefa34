//! Sampling lattice geometry and the calculation-space transform.

use nalgebra::{Rotation3, Unit};
use tracing::warn;

use crate::{
    error::{Result, SurfaceError},
    types::{Point, Value, Vector},
};

/// A rectilinear sampling lattice: origin, one voxel vector per axis and
/// the number of lattice points along each axis.
///
/// ```text
/// lattice_to_world(i, j, k) = origin + i·v0 + j·v1 + k·v2
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct VolumetricGrid {
    origin: Point,
    vectors: [Vector; 3],
    counts: [usize; 3],
    unit_vectors: [Vector; 3],
    lengths: [Value; 3],
}

impl VolumetricGrid {
    /// Returns [`SurfaceError::InvalidGrid`] when a count is zero or the
    /// voxel vectors do not span a parallelepiped.
    pub fn new(origin: Point, vectors: [Vector; 3], counts: [usize; 3]) -> Result<Self> {
        if counts.contains(&0) {
            return Err(SurfaceError::InvalidGrid);
        }
        let lengths = vectors.map(|v| v.norm());
        if lengths.iter().any(|l| !l.is_finite() || *l < 1e-12) {
            return Err(SurfaceError::InvalidGrid);
        }
        let volume = vectors[0].dot(&vectors[1].cross(&vectors[2])).abs();
        if volume < 1e-9 * lengths[0] * lengths[1] * lengths[2] {
            return Err(SurfaceError::InvalidGrid);
        }
        Ok(Self {
            origin,
            vectors,
            counts,
            unit_vectors: [0, 1, 2].map(|i| vectors[i] / lengths[i]),
            lengths,
        })
    }

    /// Axis-aligned grid with `counts` points per axis spanning `min..=max`.
    pub fn axis_aligned(min: Point, max: Point, counts: [usize; 3]) -> Result<Self> {
        let mut vectors = [Vector::zeros(); 3];
        for axis in 0..3 {
            let n = counts[axis].max(2);
            vectors[axis][axis] = (max[axis] - min[axis]) / (n - 1) as Value;
        }
        Self::new(min, vectors, counts)
    }

    pub fn origin(&self) -> &Point {
        &self.origin
    }

    /// Voxel vectors, one per axis.
    pub fn vectors(&self) -> &[Vector; 3] {
        &self.vectors
    }

    /// Lattice points along each axis.
    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    pub fn unit_vectors(&self) -> &[Vector; 3] {
        &self.unit_vectors
    }

    /// Length of each voxel vector.
    pub fn lengths(&self) -> [Value; 3] {
        self.lengths
    }

    pub fn point_count(&self) -> usize {
        self.counts.iter().product()
    }

    /// Number of cells along each axis.
    pub fn cell_counts(&self) -> [usize; 3] {
        self.counts.map(|n| n.saturating_sub(1))
    }

    /// Length of one cell's main diagonal.
    pub fn cell_diagonal(&self) -> Value {
        (self.vectors[0] + self.vectors[1] + self.vectors[2]).norm()
    }

    pub fn is_orthogonal(&self) -> bool {
        let [u0, u1, u2] = &self.unit_vectors;
        u0.dot(u1).abs() < 1e-4 && u0.dot(u2).abs() < 1e-4 && u1.dot(u2).abs() < 1e-4
    }

    pub fn lattice_to_world(&self, i: usize, j: usize, k: usize) -> Point {
        self.fractional_to_world(i as Value, j as Value, k as Value)
    }

    /// Like [`lattice_to_world`](Self::lattice_to_world) for fractional lattice coordinates.
    pub fn fractional_to_world(&self, x: Value, y: Value, z: Value) -> Point {
        self.origin + self.vectors[0] * x + self.vectors[1] * y + self.vectors[2] * z
    }

    /// Fractional lattice coordinates of `p`.
    ///
    /// Projects the offset from the origin onto each unit vector, so the
    /// result is only exact for orthogonal bases.
    pub fn world_to_lattice(&self, p: &Point) -> Vector {
        let offset = p - self.origin;
        Vector::new(
            offset.dot(&self.unit_vectors[0]) / self.lengths[0],
            offset.dot(&self.unit_vectors[1]) / self.lengths[1],
            offset.dot(&self.unit_vectors[2]) / self.lengths[2],
        )
    }

    /// The axis whose unit vector is most parallel to `direction`.
    pub fn most_aligned_axis(&self, direction: &Vector) -> usize {
        let mut best = 0;
        let mut best_dot = -1.0;
        for (axis, unit) in self.unit_vectors.iter().enumerate() {
            let d = unit.dot(direction).abs();
            if d > best_dot {
                best = axis;
                best_dot = d;
            }
        }
        best
    }

    /// Row-major index with `z` fastest, matching the order samples are stored in.
    #[inline]
    pub fn linear_index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.counts[1] + j) * self.counts[2] + k
    }
}

/// Accumulates per-axis ranges into a grid.
#[derive(Clone, Debug, Default)]
pub struct GridBuilder {
    origin: [Value; 3],
    lengths: [Value; 3],
    counts: [usize; 3],
}

impl GridBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Covers `min..=max` along `axis` with `range·points_per_unit + 1` points,
    /// capped at `hard_cap`. Returns the chosen count.
    ///
    /// The voxel vector length is `range / count`, so the last lattice point
    /// stops one voxel short of `max`.
    pub fn set_axis_range(
        &mut self,
        axis: usize,
        min: Value,
        max: Value,
        points_per_unit: Value,
        hard_cap: usize,
    ) -> usize {
        let range = (max - min).abs().max(1e-4);
        let wanted = (range * points_per_unit).floor() as usize + 1;
        let count = wanted.clamp(2, hard_cap.max(2));
        self.origin[axis] = min.min(max);
        self.lengths[axis] = range / count as Value;
        self.counts[axis] = count;
        count
    }

    pub fn build(self) -> Result<VolumetricGrid> {
        let mut vectors = [Vector::zeros(); 3];
        for (axis, v) in vectors.iter_mut().enumerate() {
            v[axis] = self.lengths[axis];
        }
        VolumetricGrid::new(Point::from(self.origin), vectors, self.counts)
    }
}

/// Maps world points into the frame a parametric shape is defined in.
///
/// ```text
/// to_calculation(p) = S⁻¹ · R⁻¹ · (p − center)
/// ```
///
/// `R` is the optional eccentricity rotation and `S` the per-axis
/// anisotropy scale.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculationTransform {
    center: Point,
    rotation: Option<Rotation3<Value>>,
    scale: Vector,
}

impl Default for CalculationTransform {
    fn default() -> Self {
        Self::centered(Point::origin())
    }
}

impl CalculationTransform {
    pub fn centered(center: Point) -> Self {
        Self {
            center,
            rotation: None,
            scale: Vector::new(1.0, 1.0, 1.0),
        }
    }

    /// Applies an eccentricity `{x y z ratio}`.
    ///
    /// The shape's z axis is turned onto `(x, y, z)` by a 180° rotation about
    /// the bisector of ẑ and that direction. The scale becomes
    /// `(|ratio|·c, |ratio|·c, c)` with `c = |(x, y, z)|`, or `c = 1` for a
    /// negative ratio.
    pub fn with_eccentricity(mut self, eccentricity: [Value; 4]) -> Result<Self> {
        let [x, y, z, ratio] = eccentricity;
        if !eccentricity.iter().all(|v| v.is_finite()) {
            return Err(SurfaceError::InvalidEllipsoid);
        }
        let target = Vector::new(x, y, z);
        let length = target.norm();
        if length < 1e-6 || ratio == 0.0 {
            return Err(SurfaceError::InvalidEllipsoid);
        }
        let c = if ratio < 0.0 { 1.0 } else { length };
        let fab_c = ratio.abs();

        let axis = target / length + Vector::z();
        let axis = if axis.norm() < 1e-6 || axis.iter().any(|v| v.is_nan()) {
            warn!(?target, "eccentricity axis is degenerate, rotating about x instead");
            Vector::x()
        } else {
            axis
        };
        self.rotation = Some(Rotation3::from_axis_angle(
            &Unit::new_normalize(axis),
            std::f32::consts::PI,
        ));
        self.scale.component_mul_assign(&Vector::new(fab_c * c, fab_c * c, c));
        Ok(self)
    }

    /// Multiplies the per-axis scale.
    pub fn with_anisotropy(mut self, anisotropy: [Value; 3]) -> Self {
        self.scale.component_mul_assign(&Vector::from(anisotropy));
        self
    }

    pub fn center(&self) -> &Point {
        &self.center
    }

    pub fn scale(&self) -> &Vector {
        &self.scale
    }

    pub fn is_identity(&self) -> bool {
        self.rotation.is_none() && self.scale == Vector::new(1.0, 1.0, 1.0)
    }

    /// Largest per-axis stretch, used to size grids around stretched shapes.
    pub fn max_scale(&self) -> Value {
        self.scale.amax()
    }

    pub fn to_calculation(&self, p: &Point) -> Vector {
        let mut v = p - self.center;
        if let Some(rotation) = &self.rotation {
            v = rotation.inverse() * v;
        }
        v.component_div(&self.scale)
    }

    pub fn from_calculation(&self, v: &Vector) -> Point {
        let mut v = v.component_mul(&self.scale);
        if let Some(rotation) = &self.rotation {
            v = rotation * v;
        }
        self.center + v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn axis_range_is_capped_and_split_by_count() {
        let mut builder = GridBuilder::new();
        assert_eq!(builder.set_axis_range(0, -1.0, 1.0, 10.0, 20), 20);
        assert_eq!(builder.set_axis_range(1, 0.0, 1.0, 10.0, 20), 11);
        assert_eq!(builder.set_axis_range(2, 1.0, 0.0, 4.0, 20), 5);
        let grid = builder.build().unwrap();
        let lengths = grid.lengths();
        assert_relative_eq!(lengths[0], 2.0 / 20.0, epsilon = 1e-6);
        assert_relative_eq!(lengths[1], 1.0 / 11.0, epsilon = 1e-6);
        assert_relative_eq!(lengths[2], 1.0 / 5.0, epsilon = 1e-6);
        assert_relative_eq!(grid.lattice_to_world(0, 0, 0).z, 0.0);
        assert_relative_eq!(grid.lattice_to_world(19, 0, 0).x, 0.9, epsilon = 1e-5);
        assert_relative_eq!(grid.lattice_to_world(0, 10, 0).y, 10.0 / 11.0, epsilon = 1e-5);
    }

    #[test]
    fn lattice_round_trip_on_orthogonal_grid() {
        let grid = VolumetricGrid::axis_aligned(
            Point::new(-2.0, -1.0, 0.0),
            Point::new(2.0, 1.0, 4.0),
            [5, 3, 9],
        )
        .unwrap();
        let p = grid.lattice_to_world(3, 1, 7);
        assert_relative_eq!(grid.world_to_lattice(&p), Vector::new(3.0, 1.0, 7.0), epsilon = 1e-5);
        assert!(grid.is_orthogonal());
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        let flat = [Vector::x(), Vector::y(), Vector::x() + Vector::y()];
        assert!(VolumetricGrid::new(Point::origin(), flat, [2, 2, 2]).is_err());
        let basis = [Vector::x(), Vector::y(), Vector::z()];
        assert!(VolumetricGrid::new(Point::origin(), basis, [2, 0, 2]).is_err());
    }

    #[test]
    fn eccentricity_turns_z_onto_target() {
        let transform = CalculationTransform::centered(Point::new(1.0, 2.0, 3.0))
            .with_eccentricity([1.0, 0.0, 0.0, 1.0])
            .unwrap();
        // A point one unit along the target direction maps onto the shape's z axis.
        let v = transform.to_calculation(&Point::new(2.0, 2.0, 3.0));
        assert_relative_eq!(v, Vector::new(0.0, 0.0, 1.0), epsilon = 1e-5);
        let back = transform.from_calculation(&v);
        assert_relative_eq!(back, Point::new(2.0, 2.0, 3.0), epsilon = 1e-5);
    }

    #[test]
    fn opposite_z_eccentricity_falls_back_to_x_axis() {
        let transform = CalculationTransform::default()
            .with_eccentricity([0.0, 0.0, -1.0, 1.0])
            .unwrap();
        let v = transform.to_calculation(&Point::new(0.0, 0.0, -1.0));
        assert_relative_eq!(v, Vector::new(0.0, 0.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn eccentricity_ratio_stretches_xy() {
        let transform = CalculationTransform::default()
            .with_eccentricity([0.0, 0.0, 2.0, 0.5])
            .unwrap();
        assert_relative_eq!(*transform.scale(), Vector::new(1.0, 1.0, 2.0));
        assert!(CalculationTransform::default().with_eccentricity([0.0, 0.0, 0.0, 1.0]).is_err());
    }
}
