use nalgebra::{Point3, Vector3};

use crate::error::{Result, SurfaceError};

/// Scalar field value at a point in space.
pub type Value = f32;

/// A 3D point with [`Value`] components.
pub type Point = Point3<Value>;

/// A 3D vector with [`Value`] components.
pub type Vector = Vector3<Value>;

/// Linear RGBA color handed to the renderer.
pub type Rgba = [f32; 4];

/// Decides which samples lie "inside" the surface.
///
/// ```text
/// cutoff >  0:  inside <=> (|v| if absolute else v) >= cutoff
/// cutoff <= 0:  inside <=> v <= cutoff
/// ```
///
/// A sample exactly equal to a positive cutoff is inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CutoffPolicy {
    /// Iso-value threshold.
    pub cutoff: Value,
    /// Compare `|v|` against a positive cutoff, so both orbital phases are kept.
    pub absolute: bool,
    /// Keep only the positive phase; overrides `absolute`.
    pub positive_only: bool,
}

impl CutoffPolicy {
    pub fn new(cutoff: Value) -> Self {
        Self {
            cutoff,
            absolute: false,
            positive_only: false,
        }
    }

    pub fn with_absolute(mut self, absolute: bool) -> Self {
        self.absolute = absolute;
        self
    }

    pub fn with_positive_only(mut self, positive_only: bool) -> Self {
        self.positive_only = positive_only;
        self
    }

    /// `true` when `|v|` is what gets compared against the cutoff.
    #[inline]
    pub fn uses_absolute(&self) -> bool {
        self.absolute && !self.positive_only && self.cutoff > 0.0
    }

    #[inline]
    pub fn is_inside(&self, v: Value) -> bool {
        if self.cutoff > 0.0 {
            let v = if self.uses_absolute() { v.abs() } else { v };
            v >= self.cutoff
        } else {
            v <= self.cutoff
        }
    }
}

impl Default for CutoffPolicy {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A plane `a·x + b·y + c·z + d = 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub a: Value,
    pub b: Value,
    pub c: Value,
    pub d: Value,
}

impl Plane {
    /// Returns [`SurfaceError::InvalidPlane`] for non-finite coefficients or a zero normal.
    pub fn new(a: Value, b: Value, c: Value, d: Value) -> Result<Self> {
        let plane = Self { a, b, c, d };
        if ![a, b, c, d].iter().all(|v| v.is_finite()) || plane.normal().norm() < 1e-6 {
            return Err(SurfaceError::InvalidPlane);
        }
        Ok(plane)
    }

    /// Plane through `point` with the given `normal`.
    pub fn from_point_normal(point: &Point, normal: &Vector) -> Result<Self> {
        Self::new(normal.x, normal.y, normal.z, -normal.dot(&point.coords))
    }

    /// Unnormalized normal `(a, b, c)`.
    pub fn normal(&self) -> Vector {
        Vector::new(self.a, self.b, self.c)
    }

    /// Signed distance from `p` to the plane.
    pub fn distance(&self, p: &Point) -> Value {
        (self.normal().dot(&p.coords) + self.d) / self.normal().norm()
    }
}

/// An atom as supplied by the (external) molecule bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    /// Atomic number.
    pub element: u8,
    pub position: Point,
    /// Van der Waals radius in Angstroms.
    pub radius: Value,
    /// Partial charge, used by electrostatic potential fields.
    pub charge: Value,
}

impl Atom {
    pub fn new(element: u8, position: Point, radius: Value) -> Self {
        Self {
            element,
            position,
            radius,
            charge: 0.0,
        }
    }

    pub fn with_charge(mut self, charge: Value) -> Self {
        self.charge = charge;
        self
    }
}
