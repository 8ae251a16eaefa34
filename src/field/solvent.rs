use tracing::debug;

use crate::{
    error::{Result, SurfaceError},
    grid::VolumetricGrid,
    types::{Atom, Point, Value, Vector},
};

use super::{FieldContext, FieldKind, GeneratedField, ScalarField, grid_around_atoms};

/// Which radius the distance field is measured against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SolventMode {
    /// Bare van der Waals spheres.
    #[default]
    Vdw,
    /// Spheres grown by the probe radius.
    SolventAccessible,
    /// Van der Waals spheres with the crevices a rolling probe cannot reach filled in.
    Molecular,
}

impl SolventMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vdw => "vdw",
            Self::SolventAccessible => "sasurface",
            Self::Molecular => "molecular",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolventConfig {
    pub mode: SolventMode,
    pub probe_radius: Value,
}

impl Default for SolventConfig {
    fn default() -> Self {
        Self {
            mode: SolventMode::Molecular,
            probe_radius: 1.2,
        }
    }
}

impl SolventConfig {
    pub fn new(mode: SolventMode, probe_radius: Value) -> Self {
        Self {
            mode,
            probe_radius: probe_radius.max(0.0),
        }
    }

    pub(super) fn validate(&self, ctx: &FieldContext) -> Result<()> {
        if ctx.atoms.is_empty() {
            return Err(SurfaceError::MissingAtoms);
        }
        Ok(())
    }

    fn probe(&self) -> Value {
        if self.mode == SolventMode::Vdw {
            0.0
        } else {
            self.probe_radius
        }
    }

    pub(super) fn generate(&self, kind: &FieldKind, ctx: &FieldContext) -> Result<GeneratedField> {
        let grid = grid_around_atoms(
            &ctx.atoms,
            self.probe() + 2.0,
            kind.points_per_unit(ctx),
            kind.hard_cap(),
        )?;
        let field = self.fill_on(ctx, &grid);
        Ok(GeneratedField {
            title: [
                format!("{} surface", self.mode.name()),
                format!("probe radius {} Å, {} atoms", self.probe(), ctx.atoms.len()),
            ],
            grid,
            field,
            atoms: ctx.atoms.clone(),
            transform: None,
        })
    }

    pub(super) fn fill_on(&self, ctx: &FieldContext, grid: &VolumetricGrid) -> ScalarField {
        // Solvent accessible spheres are grown by the probe; the other modes
        // measure against the bare radius.
        let grow = if self.mode == SolventMode::SolventAccessible {
            self.probe_radius
        } else {
            0.0
        };
        let mut field = ScalarField::fill(grid, |p| {
            ctx.atoms
                .iter()
                .map(|atom| (p - atom.position).norm() - (atom.radius + grow))
                .fold(Value::MAX, Value::min)
        });
        if self.mode == SolventMode::Molecular && self.probe_radius > 0.0 {
            fill_troughs(&mut field, grid, &ctx.atoms, self.probe_radius);
        }
        field
    }
}

/// Probe center touching both spheres, in the plane through `a`, `b` and `p`.
struct Trough {
    a: Point,
    b: Point,
    axis: Vector,
    cos_a: Value,
    cos_b: Value,
    sin_a: Value,
    /// `rA + probe`
    reach_a: Value,
}

impl Trough {
    fn new(a: &Atom, b: &Atom, probe: Value) -> Option<Self> {
        let ra = a.radius + probe;
        let rb = b.radius + probe;
        let ab = b.position - a.position;
        let c = ab.norm();
        if c < 1e-4 || c >= ra + rb || c <= (ra - rb).abs() {
            return None;
        }
        let cos_a = (ra * ra + c * c - rb * rb) / (2.0 * ra * c);
        let cos_b = (rb * rb + c * c - ra * ra) / (2.0 * rb * c);
        Some(Self {
            a: a.position,
            b: b.position,
            axis: ab / c,
            cos_a,
            cos_b,
            sin_a: (1.0 - cos_a * cos_a).max(0.0).sqrt(),
            reach_a: ra,
        })
    }

    /// Distance from `p` to the probe center, if `p` lies in the triangle
    /// spanned by the two atom centers and that probe center.
    fn probe_distance(&self, p: &Point) -> Option<Value> {
        let pa = p - self.a;
        let pb = p - self.b;
        let (la, lb) = (pa.norm(), pb.norm());
        if la < 1e-6 || lb < 1e-6 {
            return None;
        }
        if pa.dot(&self.axis) / la < self.cos_a || -pb.dot(&self.axis) / lb < self.cos_b {
            return None;
        }
        let mut side = pa - self.axis * pa.dot(&self.axis);
        if side.norm() < 1e-6 {
            side = self.axis.cross(&Vector::x());
            if side.norm() < 1e-6 {
                side = self.axis.cross(&Vector::y());
            }
        }
        let side = side.normalize();
        let q = self.a + (self.axis * self.cos_a + side * self.sin_a) * self.reach_a;
        Some((p - q).norm())
    }
}

fn fill_troughs(field: &mut ScalarField, grid: &VolumetricGrid, atoms: &[Atom], probe: Value) {
    let counts = grid.counts();
    let mut corrected = 0usize;
    for (i, a) in atoms.iter().enumerate() {
        for b in &atoms[i + 1..] {
            let Some(trough) = Trough::new(a, b, probe) else {
                continue;
            };
            let reach = (a.radius + probe).max(b.radius + probe);
            let lo = grid.world_to_lattice(&a.position.inf(&b.position));
            let hi = grid.world_to_lattice(&a.position.sup(&b.position));
            let mut range = [(0usize, 0usize); 3];
            for axis in 0..3 {
                let pad = reach / grid.lengths()[axis];
                let start = (lo[axis] - pad).floor().max(0.0) as usize;
                let end = ((hi[axis] + pad).ceil().max(0.0) as usize).min(counts[axis] - 1);
                range[axis] = (start, end);
            }
            for x in range[0].0..=range[0].1 {
                for y in range[1].0..=range[1].1 {
                    for z in range[2].0..=range[2].1 {
                        let p = grid.lattice_to_world(x, y, z);
                        if let Some(d) = trough.probe_distance(&p) {
                            let v = probe - d;
                            if v < field.get(x, y, z) {
                                field.set(x, y, z, v);
                                corrected += 1;
                            }
                        }
                    }
                }
            }
        }
    }
    debug!(corrected, "solvent troughs filled");
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair(separation: Value) -> Vec<Atom> {
        vec![
            Atom::new(6, Point::new(0.0, 0.0, 0.0), 1.5),
            Atom::new(6, Point::new(separation, 0.0, 0.0), 1.5),
        ]
    }

    fn ctx(atoms: Vec<Atom>) -> FieldContext {
        FieldContext {
            atoms,
            ..FieldContext::default()
        }
    }

    #[test]
    fn vdw_value_is_distance_to_nearest_sphere() {
        let config = SolventConfig::new(SolventMode::Vdw, 1.2);
        let grid = VolumetricGrid::axis_aligned(
            Point::new(-4.0, -4.0, -4.0),
            Point::new(4.0, 4.0, 4.0),
            [9, 9, 9],
        )
        .unwrap();
        let field = config.fill_on(&ctx(pair(2.0)), &grid);
        // lattice (4,4,4) is the first atom's center
        assert_relative_eq!(field.get(4, 4, 4), -1.5);
        // (0, 3, 0) is 3 Å from the first atom and sqrt(13) from the second
        assert_relative_eq!(field.get(4, 7, 4), 1.5);
    }

    #[test]
    fn solvent_accessible_grows_by_probe() {
        let config = SolventConfig::new(SolventMode::SolventAccessible, 1.0);
        let grid = VolumetricGrid::axis_aligned(
            Point::new(-4.0, -4.0, -4.0),
            Point::new(4.0, 4.0, 4.0),
            [9, 9, 9],
        )
        .unwrap();
        let field = config.fill_on(&ctx(vec![Atom::new(8, Point::origin(), 1.5)]), &grid);
        assert_relative_eq!(field.get(4, 7, 4), 0.5);
    }

    #[test]
    fn trough_between_close_atoms_is_filled() {
        let atoms = pair(3.4);
        let trough = Trough::new(&atoms[0], &atoms[1], 1.4).unwrap();
        // Just outside both spheres, above the midpoint: reachable only from the crevice side.
        let p = Point::new(1.7, 0.9, 0.0);
        let d = trough.probe_distance(&p).unwrap();
        assert!(1.4 - d < 0.0, "crevice point should be enclosed");
        // A point beyond the probe center is not in the wedge.
        assert!(trough.probe_distance(&Point::new(1.7, 6.0, 0.0)).is_none());
    }

    #[test]
    fn distant_atoms_have_no_trough() {
        let atoms = pair(10.0);
        assert!(Trough::new(&atoms[0], &atoms[1], 1.4).is_none());
    }

    #[test]
    fn solvent_requires_atoms() {
        let config = SolventConfig::default();
        assert!(matches!(
            config.validate(&FieldContext::default()),
            Err(SurfaceError::MissingAtoms)
        ));
    }
}
