//! Parametric shapes centered on one point: spheres, ellipsoids, lobes and
//! hydrogen-like atomic orbitals.

use crate::{
    error::Result,
    grid::{CalculationTransform, VolumetricGrid},
    types::{Point, Value, Vector},
};

use super::{
    FieldContext, FieldKind, GeneratedField, ScalarField, grid_around,
    orbital::{HydrogenOrbital, QuantumNumbers},
};

const LOBE: QuantumNumbers = QuantumNumbers {
    n: 3,
    l: 2,
    m: 0,
    z: 14.0,
};

#[derive(Clone, Debug)]
enum Profile {
    /// `radius − |v|`
    Sphere { radius: Value },
    Orbital {
        psi: HydrogenOrbital,
        clamp_negative: bool,
    },
}

#[derive(Clone, Debug)]
struct Shape {
    transform: CalculationTransform,
    profile: Profile,
}

impl Shape {
    fn new(kind: &FieldKind, ctx: &FieldContext) -> Result<Self> {
        let base = ctx.transform();
        Ok(match kind {
            FieldKind::Sphere { radius } => Self {
                transform: base,
                profile: Profile::Sphere { radius: *radius },
            },
            FieldKind::Ellipsoid {
                radius,
                eccentricity,
            } => Self {
                transform: base.with_eccentricity(*eccentricity)?,
                profile: Profile::Sphere { radius: *radius },
            },
            FieldKind::Lobe { eccentricity } => Self {
                transform: base.with_eccentricity(*eccentricity)?,
                profile: Profile::Orbital {
                    psi: HydrogenOrbital::new(LOBE)?,
                    clamp_negative: true,
                },
            },
            FieldKind::AtomicOrbital(numbers) => Self {
                transform: base,
                profile: Profile::Orbital {
                    psi: HydrogenOrbital::new(*numbers)?,
                    clamp_negative: false,
                },
            },
            _ => unreachable!("{} is not a parametric shape", kind.name()),
        })
    }

    fn value(&self, p: &Point) -> Value {
        let v = self.transform.to_calculation(p);
        match &self.profile {
            Profile::Sphere { radius } => radius - v.norm(),
            Profile::Orbital {
                psi,
                clamp_negative,
            } => {
                let value = psi.value(&v);
                if *clamp_negative { value.max(0.0) } else { value }
            }
        }
    }

    /// Half-width of a cube that contains the whole surface.
    fn bounding_radius(&self, cutoff: Value) -> Value {
        let extent = match &self.profile {
            Profile::Sphere { radius } => radius * 1.2 + 0.1,
            Profile::Orbital { psi, .. } => {
                let cutoff = if cutoff > 0.0 { cutoff } else { 0.14 };
                psi.extent(cutoff * 0.01)
            }
        };
        extent * self.transform.max_scale()
    }

    fn title(&self) -> [String; 2] {
        match &self.profile {
            Profile::Sphere { radius } => [
                format!("ellipsoid radius {radius}"),
                format!("scale {:?}", self.transform.scale().as_slice()),
            ],
            Profile::Orbital { psi, .. } => {
                let q = psi.numbers();
                [
                    format!("hydrogen-like orbital n={} l={} m={} Z={}", q.n, q.l, q.m, q.z),
                    format!("scale {:?}", self.transform.scale().as_slice()),
                ]
            }
        }
    }

    fn fill(self, grid: &VolumetricGrid, lazy: bool) -> ScalarField {
        if lazy {
            let grid = grid.clone();
            ScalarField::lazy(grid.counts(), move |x, y, z| {
                self.value(&grid.lattice_to_world(x, y, z))
            })
        } else {
            ScalarField::fill(grid, |p| self.value(p))
        }
    }
}

pub(super) fn generate(kind: &FieldKind, ctx: &FieldContext) -> Result<GeneratedField> {
    let shape = Shape::new(kind, ctx)?;
    let radius = shape.bounding_radius(ctx.cutoff);
    let grid = grid_around(
        &ctx.center,
        &Vector::repeat(radius),
        kind.points_per_unit(ctx),
        kind.hard_cap(),
    )?;
    let title = shape.title();
    let transform = shape.transform.clone();
    let field = shape.fill(&grid, ctx.lazy);
    Ok(GeneratedField {
        title,
        grid,
        field,
        atoms: Vec::new(),
        transform: Some(transform),
    })
}

pub(super) fn fill_on(
    kind: &FieldKind,
    ctx: &FieldContext,
    grid: &VolumetricGrid,
) -> Result<ScalarField> {
    Ok(Shape::new(kind, ctx)?.fill(grid, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_is_positive_inside() {
        let shape = Shape::new(&FieldKind::Sphere { radius: 2.0 }, &FieldContext::default()).unwrap();
        assert_relative_eq!(shape.value(&Point::origin()), 2.0);
        assert_relative_eq!(shape.value(&Point::new(0.0, 3.0, 0.0)), -1.0);
    }

    #[test]
    fn ellipsoid_is_stretched_along_eccentricity() {
        let kind = FieldKind::Ellipsoid {
            radius: 1.0,
            eccentricity: [0.0, 0.0, 2.0, 0.5],
        };
        let shape = Shape::new(&kind, &FieldContext::default()).unwrap();
        assert_relative_eq!(shape.value(&Point::new(0.0, 0.0, 2.0)), 0.0, epsilon = 1e-5);
        assert_relative_eq!(shape.value(&Point::new(1.0, 0.0, 0.0)), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn lobe_has_no_negative_values() {
        let kind = FieldKind::Lobe {
            eccentricity: [0.0, 0.0, 1.0, 1.0],
        };
        let shape = Shape::new(&kind, &FieldContext::default()).unwrap();
        // d_z2 is negative in the xy plane; the lobe clamps it away.
        assert_eq!(shape.value(&Point::new(0.2, 0.0, 0.0)), 0.0);
        assert!(shape.value(&Point::new(0.0, 0.0, 0.2)) > 0.0);
    }

    #[test]
    fn lazy_and_dense_fills_agree() {
        let kind = FieldKind::AtomicOrbital(QuantumNumbers::new(2, 1, 1, 1.0));
        let ctx = FieldContext {
            lazy: true,
            cutoff: 0.05,
            ..FieldContext::default()
        };
        let lazy = generate(&kind, &ctx).unwrap();
        let dense = fill_on(&kind, &ctx, &lazy.grid).unwrap();
        assert!(!lazy.field.is_dense());
        assert_relative_eq!(lazy.field.get(3, 4, 5), dense.get(3, 4, 5));
    }
}
