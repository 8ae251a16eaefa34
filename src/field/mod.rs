//! Scalar field storage and the per-kind generators that fill it.

mod cube;
mod function;
mod molecular;
mod orbital;
mod shape;
mod solvent;

use std::fmt;

use ndarray::Array3;
use tracing::debug;

pub use cube::{ANGSTROMS_PER_BOHR, CubeData, CubeHeader};
pub(crate) use cube::LineCursor;
pub use function::{FunctionXy, UserFunction};
pub use molecular::{
    CoulombPotential, MepConfig, MolecularOrbitalConfig, OrbitalEvaluator, OrbitalRequest,
};
pub use orbital::{HydrogenOrbital, QuantumNumbers};
pub use solvent::{SolventConfig, SolventMode};

use crate::{
    error::{Result, SurfaceError},
    grid::{CalculationTransform, GridBuilder, VolumetricGrid},
    types::{Atom, Point, Value, Vector},
};

/// Anything the extractors can read lattice samples from.
pub trait VoxelSource {
    /// Lattice points along each axis.
    fn counts(&self) -> [usize; 3];

    /// Sample at lattice point `(x, y, z)`.
    fn value(&self, x: usize, y: usize, z: usize) -> Value;
}

impl VoxelSource for Array3<Value> {
    fn counts(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.dim();
        [nx, ny, nz]
    }

    #[inline]
    fn value(&self, x: usize, y: usize, z: usize) -> Value {
        self[[x, y, z]]
    }
}

/// Per-lattice-point evaluator backing a lazy field.
pub type LatticeFunction = dyn Fn(usize, usize, usize) -> Value + Send + Sync;

/// Samples of a scalar field on a [`VolumetricGrid`], indexed `[x][y][z]`.
///
/// Either a dense array allocated once the counts are known, or a function
/// evaluated each time a cell asks for a corner.
pub enum ScalarField {
    Dense(Array3<Value>),
    Lazy {
        counts: [usize; 3],
        function: Box<LatticeFunction>,
    },
}

impl fmt::Debug for ScalarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dense(values) => f.debug_tuple("Dense").field(&values.dim()).finish(),
            Self::Lazy { counts, .. } => f.debug_struct("Lazy").field("counts", counts).finish(),
        }
    }
}

impl ScalarField {
    /// A dense field with every sample set to `0.0`.
    pub fn zeros(counts: [usize; 3]) -> Self {
        Self::Dense(Array3::zeros((counts[0], counts[1], counts[2])))
    }

    pub fn lazy<F>(counts: [usize; 3], function: F) -> Self
    where
        F: Fn(usize, usize, usize) -> Value + Send + Sync + 'static,
    {
        Self::Lazy {
            counts,
            function: Box::new(function),
        }
    }

    /// Evaluates `function` at the world position of every lattice point.
    pub fn fill<F>(grid: &VolumetricGrid, function: F) -> Self
    where
        F: Fn(&Point) -> Value,
    {
        let mut field = Self::zeros(grid.counts());
        field.for_each_corner(|x, y, z, value| *value = function(&grid.lattice_to_world(x, y, z)));
        field
    }

    /// Calls `f(x, y, z, &mut value)` for every lattice point, materializing a lazy field first.
    pub fn for_each_corner<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize, usize, &mut Value),
    {
        let values = self.values_mut();
        for ((x, y, z), value) in values.indexed_iter_mut() {
            f(x, y, z, value);
        }
    }

    fn values_mut(&mut self) -> &mut Array3<Value> {
        if let Self::Lazy { .. } = self {
            *self = Self::Dense(self.to_dense());
        }
        match self {
            Self::Dense(values) => values,
            Self::Lazy { .. } => unreachable!("lazy field was just materialized"),
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, Self::Dense(_))
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Value {
        self.value(x, y, z)
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, v: Value) {
        self.values_mut()[[x, y, z]] = v;
    }

    /// Copies every sample into a dense array.
    pub fn to_dense(&self) -> Array3<Value> {
        match self {
            Self::Dense(values) => values.clone(),
            Self::Lazy { counts, function } => {
                Array3::from_shape_fn((counts[0], counts[1], counts[2]), |(x, y, z)| {
                    function(x, y, z)
                })
            }
        }
    }

    /// Minimum and maximum over all non-NaN samples.
    pub fn range(&self) -> Option<(Value, Value)> {
        let [nx, ny, nz] = self.counts();
        let mut range: Option<(Value, Value)> = None;
        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    let v = self.value(x, y, z);
                    if v.is_nan() {
                        continue;
                    }
                    range = Some(match range {
                        Some((lo, hi)) => (lo.min(v), hi.max(v)),
                        None => (v, v),
                    });
                }
            }
        }
        range
    }

    /// Trilinear interpolation at fractional lattice coordinates, clamped to the lattice.
    pub fn sample(&self, lattice: &Vector) -> Value {
        let counts = self.counts();
        let mut base = [0usize; 3];
        let mut t = [0.0 as Value; 3];
        for axis in 0..3 {
            let max = (counts[axis] - 1) as Value;
            let c = lattice[axis].clamp(0.0, max);
            let i = (c.floor() as usize).min(counts[axis].saturating_sub(2));
            base[axis] = i;
            t[axis] = if counts[axis] > 1 { c - i as Value } else { 0.0 };
        }
        let at = |dx: usize, dy: usize, dz: usize| {
            self.value(
                (base[0] + dx).min(counts[0] - 1),
                (base[1] + dy).min(counts[1] - 1),
                (base[2] + dz).min(counts[2] - 1),
            )
        };
        let lerp = crate::interp::lerp;
        let c00 = lerp(at(0, 0, 0), at(1, 0, 0), t[0]);
        let c10 = lerp(at(0, 1, 0), at(1, 1, 0), t[0]);
        let c01 = lerp(at(0, 0, 1), at(1, 0, 1), t[0]);
        let c11 = lerp(at(0, 1, 1), at(1, 1, 1), t[0]);
        lerp(lerp(c00, c10, t[1]), lerp(c01, c11, t[1]), t[2])
    }
}

impl VoxelSource for ScalarField {
    fn counts(&self) -> [usize; 3] {
        match self {
            Self::Dense(values) => values.counts(),
            Self::Lazy { counts, .. } => *counts,
        }
    }

    #[inline]
    fn value(&self, x: usize, y: usize, z: usize) -> Value {
        match self {
            Self::Dense(values) => values[[x, y, z]],
            Self::Lazy { function, .. } => function(x, y, z),
        }
    }
}

/// What a generator needs from the request, with ignored atoms already removed.
#[derive(Clone, Debug)]
pub struct FieldContext {
    pub atoms: Vec<Atom>,
    pub center: Point,
    pub anisotropy: [Value; 3],
    pub points_per_unit: Option<Value>,
    pub cutoff: Value,
    pub lazy: bool,
}

impl Default for FieldContext {
    fn default() -> Self {
        Self {
            atoms: Vec::new(),
            center: Point::origin(),
            anisotropy: [1.0; 3],
            points_per_unit: None,
            cutoff: 0.0,
            lazy: false,
        }
    }
}

impl FieldContext {
    /// Base transform shared by all parametric shapes: the center plus anisotropy.
    pub(crate) fn transform(&self) -> CalculationTransform {
        CalculationTransform::centered(self.center).with_anisotropy(self.anisotropy)
    }
}

/// A filled field plus the description that goes into an exchange-format header.
#[derive(Debug)]
pub struct GeneratedField {
    pub title: [String; 2],
    pub grid: VolumetricGrid,
    pub field: ScalarField,
    pub atoms: Vec<Atom>,
    /// Present for parametric shapes; used to invert positions for phase coloring.
    pub transform: Option<CalculationTransform>,
}

/// The kinds of scalar field the pipeline can generate, each with its own configuration.
#[derive(Clone, Debug)]
pub enum FieldKind {
    Sphere { radius: Value },
    Ellipsoid { radius: Value, eccentricity: [Value; 4] },
    /// A single d-type lobe pair pointing along the eccentricity vector.
    Lobe { eccentricity: [Value; 4] },
    AtomicOrbital(QuantumNumbers),
    MolecularOrbital(MolecularOrbitalConfig),
    Mep(MepConfig),
    Solvent(SolventConfig),
    Cube(CubeData),
    FunctionXy(FunctionXy),
    Function(UserFunction),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sphere { .. } => "sphere",
            Self::Ellipsoid { .. } => "ellipsoid",
            Self::Lobe { .. } => "lobe",
            Self::AtomicOrbital(_) => "atomicOrbital",
            Self::MolecularOrbital(_) => "molecularOrbital",
            Self::Mep(_) => "mep",
            Self::Solvent(config) => config.mode.name(),
            Self::Cube(_) => "cube",
            Self::FunctionXy(_) => "functionXY",
            Self::Function(_) => "function",
        }
    }

    /// Maximum lattice points per axis.
    pub fn hard_cap(&self) -> usize {
        match self {
            Self::Sphere { .. } | Self::Ellipsoid { .. } | Self::Lobe { .. } => 20,
            Self::Cube(cube) => cube.header.grid.counts().into_iter().max().unwrap_or(1),
            _ => 60,
        }
    }

    /// Points per Angstrom used when the request gives no resolution hint.
    pub fn default_resolution(&self) -> Value {
        match self {
            Self::Sphere { .. } | Self::Ellipsoid { .. } | Self::Lobe { .. } => 10.0,
            Self::AtomicOrbital(_) => 6.0,
            Self::MolecularOrbital(_) | Self::Mep(_) => 4.0,
            Self::Solvent(_) => 3.0,
            Self::Cube(_) => 1.0,
            Self::FunctionXy(_) | Self::Function(_) => 10.0,
        }
    }

    pub fn default_cutoff(&self) -> Value {
        match self {
            Self::Lobe { .. } | Self::AtomicOrbital(_) => 0.14,
            Self::MolecularOrbital(_) | Self::Mep(_) => 0.05,
            Self::Cube(_) => 0.02,
            _ => 0.0,
        }
    }

    /// Rejects malformed configurations before anything is allocated.
    pub fn validate(&self, ctx: &FieldContext) -> Result<()> {
        match self {
            Self::Sphere { radius } => positive_radius(*radius),
            Self::Ellipsoid { radius, eccentricity } => {
                positive_radius(*radius)?;
                CalculationTransform::default().with_eccentricity(*eccentricity)?;
                Ok(())
            }
            Self::Lobe { eccentricity } => {
                CalculationTransform::default().with_eccentricity(*eccentricity)?;
                Ok(())
            }
            Self::AtomicOrbital(q) => q.validate(),
            Self::MolecularOrbital(config) => config.validate(ctx),
            Self::Mep(config) => config.validate(ctx),
            Self::Solvent(config) => config.validate(ctx),
            Self::Cube(_) => Ok(()),
            Self::FunctionXy(f) => f.validate(),
            Self::Function(f) => f.validate(),
        }
    }

    /// Validates, sizes the grid, and fills the field.
    pub fn generate(&self, ctx: &FieldContext) -> Result<GeneratedField> {
        self.validate(ctx)?;
        if let Some(ppu) = ctx.points_per_unit {
            if !(ppu.is_finite() && ppu > 0.0) {
                return Err(SurfaceError::InvalidResolution(ppu));
            }
        }
        let generated = match self {
            Self::Sphere { .. }
            | Self::Ellipsoid { .. }
            | Self::Lobe { .. }
            | Self::AtomicOrbital(_) => shape::generate(self, ctx)?,
            Self::MolecularOrbital(config) => config.generate(self, ctx)?,
            Self::Mep(config) => config.generate(self, ctx)?,
            Self::Solvent(config) => config.generate(self, ctx)?,
            Self::Cube(cube) => cube.generate(),
            Self::FunctionXy(f) => f.generate(self, ctx)?,
            Self::Function(f) => f.generate(self, ctx)?,
        };
        let [nx, ny, nz] = generated.grid.counts();
        debug!(kind = self.name(), nx, ny, nz, dense = generated.field.is_dense(), "field generated");
        Ok(generated)
    }

    /// Fills this kind's values on someone else's grid, for mapping a second
    /// property onto an already extracted surface.
    pub fn fill_on(&self, ctx: &FieldContext, grid: &VolumetricGrid) -> Result<ScalarField> {
        self.validate(ctx)?;
        Ok(match self {
            Self::Sphere { .. }
            | Self::Ellipsoid { .. }
            | Self::Lobe { .. }
            | Self::AtomicOrbital(_) => shape::fill_on(self, ctx, grid)?,
            Self::MolecularOrbital(config) => config.fill_on(ctx, grid)?,
            Self::Mep(config) => config.fill_on(ctx, grid)?,
            Self::Solvent(config) => config.fill_on(ctx, grid),
            Self::Cube(cube) => cube.resample_on(grid),
            Self::FunctionXy(f) => f.fill_on(grid),
            Self::Function(f) => f.fill_on(grid),
        })
    }

    pub(crate) fn points_per_unit(&self, ctx: &FieldContext) -> Value {
        ctx.points_per_unit.unwrap_or_else(|| self.default_resolution())
    }
}

fn positive_radius(radius: Value) -> Result<()> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(SurfaceError::InvalidEllipsoid)
    }
}

/// An axis-aligned grid covering `center ± half_extent`.
pub(crate) fn grid_around(
    center: &Point,
    half_extent: &Vector,
    points_per_unit: Value,
    hard_cap: usize,
) -> Result<VolumetricGrid> {
    let mut builder = GridBuilder::new();
    for axis in 0..3 {
        builder.set_axis_range(
            axis,
            center[axis] - half_extent[axis],
            center[axis] + half_extent[axis],
            points_per_unit,
            hard_cap,
        );
    }
    builder.build()
}

/// An axis-aligned grid bounding every atom's sphere plus `margin`.
pub(crate) fn grid_around_atoms(
    atoms: &[Atom],
    margin: Value,
    points_per_unit: Value,
    hard_cap: usize,
) -> Result<VolumetricGrid> {
    let first = atoms.first().ok_or(SurfaceError::MissingAtoms)?;
    let mut min = first.position;
    let mut max = first.position;
    for atom in atoms {
        for axis in 0..3 {
            min[axis] = min[axis].min(atom.position[axis] - atom.radius);
            max[axis] = max[axis].max(atom.position[axis] + atom.radius);
        }
    }
    let mut builder = GridBuilder::new();
    for axis in 0..3 {
        builder.set_axis_range(
            axis,
            min[axis] - margin,
            max[axis] + margin,
            points_per_unit,
            hard_cap,
        );
    }
    builder.build()
}
