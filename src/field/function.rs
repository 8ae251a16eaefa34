use std::{fmt, sync::Arc};

use ndarray::Array2;

use crate::{
    error::{Result, SurfaceError},
    grid::{GridBuilder, VolumetricGrid},
    types::{Point, Value},
};

use super::{FieldContext, FieldKind, GeneratedField, ScalarField};

pub type Function2 = dyn Fn(Value, Value) -> Value + Send + Sync;
pub type Function3 = dyn Fn(Value, Value, Value) -> Value + Send + Sync;

fn check_range(min: &[Value], max: &[Value]) -> Result<()> {
    let ok = min
        .iter()
        .zip(max)
        .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && hi > lo);
    if ok { Ok(()) } else { Err(SurfaceError::InvalidGrid) }
}

/// A height field `z = f(x, y)` over a rectangle.
///
/// As a volume it is sampled as `z − f(x, y)`, so the zero iso-surface is
/// the graph of `f`. The contour engine evaluates `f` directly instead.
#[derive(Clone)]
pub struct FunctionXy {
    pub function: Arc<Function2>,
    pub min: [Value; 2],
    pub max: [Value; 2],
}

impl fmt::Debug for FunctionXy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionXy")
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

impl FunctionXy {
    pub fn new<F>(function: F, min: [Value; 2], max: [Value; 2]) -> Self
    where
        F: Fn(Value, Value) -> Value + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
            min,
            max,
        }
    }

    pub(super) fn validate(&self) -> Result<()> {
        check_range(&self.min, &self.max)
    }

    pub fn evaluate(&self, x: Value, y: Value) -> Value {
        (self.function)(x, y)
    }

    /// `f` at every `(x, y)` column of `grid`.
    fn columns(&self, grid: &VolumetricGrid) -> Array2<Value> {
        let [nx, ny, _] = grid.counts();
        Array2::from_shape_fn((nx, ny), |(x, y)| {
            let p = grid.lattice_to_world(x, y, 0);
            self.evaluate(p.x, p.y)
        })
    }

    pub(super) fn generate(&self, kind: &FieldKind, ctx: &FieldContext) -> Result<GeneratedField> {
        let ppu = kind.points_per_unit(ctx);
        let cap = kind.hard_cap();
        let mut builder = GridBuilder::new();
        builder.set_axis_range(0, self.min[0], self.max[0], ppu, cap);
        builder.set_axis_range(1, self.min[1], self.max[1], ppu, cap);
        builder.set_axis_range(2, 0.0, 1.0, ppu, cap);
        let flat = builder.clone().build()?;

        let columns = self.columns(&flat);
        let (lo, hi) = columns
            .iter()
            .filter(|v| v.is_finite())
            .fold((Value::MAX, Value::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let (lo, hi) = if lo > hi { (-1.0, 1.0) } else { (lo, hi) };
        let pad = ((hi - lo) * 0.1).max(0.5);
        builder.set_axis_range(2, lo - pad, hi + pad, ppu, cap);
        let grid = builder.build()?;
        let field = self.fill_with(&grid, columns, ctx.lazy);

        Ok(GeneratedField {
            title: [
                "functionXY".to_string(),
                format!("x {:?} y {:?}", [self.min[0], self.max[0]], [self.min[1], self.max[1]]),
            ],
            grid,
            field,
            atoms: Vec::new(),
            transform: None,
        })
    }

    fn fill_with(&self, grid: &VolumetricGrid, columns: Array2<Value>, lazy: bool) -> ScalarField {
        if lazy {
            let grid = grid.clone();
            ScalarField::lazy(grid.counts(), move |x, y, z| {
                grid.lattice_to_world(x, y, z).z - columns[[x, y]]
            })
        } else {
            let mut field = ScalarField::zeros(grid.counts());
            field.for_each_corner(|x, y, z, value| {
                *value = grid.lattice_to_world(x, y, z).z - columns[[x, y]];
            });
            field
        }
    }

    pub(crate) fn fill_on(&self, grid: &VolumetricGrid) -> ScalarField {
        ScalarField::fill(grid, |p| p.z - self.evaluate(p.x, p.y))
    }
}

/// An arbitrary `f(x, y, z)` sampled over a box.
#[derive(Clone)]
pub struct UserFunction {
    pub function: Arc<Function3>,
    pub min: Point,
    pub max: Point,
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

impl UserFunction {
    pub fn new<F>(function: F, min: Point, max: Point) -> Self
    where
        F: Fn(Value, Value, Value) -> Value + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
            min,
            max,
        }
    }

    pub(super) fn validate(&self) -> Result<()> {
        check_range(self.min.coords.as_slice(), self.max.coords.as_slice())
    }

    pub(super) fn generate(&self, kind: &FieldKind, ctx: &FieldContext) -> Result<GeneratedField> {
        let ppu = kind.points_per_unit(ctx);
        let mut builder = GridBuilder::new();
        for axis in 0..3 {
            builder.set_axis_range(axis, self.min[axis], self.max[axis], ppu, kind.hard_cap());
        }
        let grid = builder.build()?;
        let field = if ctx.lazy {
            let grid = grid.clone();
            let function = Arc::clone(&self.function);
            ScalarField::lazy(grid.counts(), move |x, y, z| {
                let p = grid.lattice_to_world(x, y, z);
                function(p.x, p.y, p.z)
            })
        } else {
            self.fill_on(&grid)
        };
        Ok(GeneratedField {
            title: ["function".to_string(), format!("{:?} to {:?}", self.min, self.max)],
            grid,
            field,
            atoms: Vec::new(),
            transform: None,
        })
    }

    pub(super) fn fill_on(&self, grid: &VolumetricGrid) -> ScalarField {
        ScalarField::fill(grid, |p| (self.function)(p.x, p.y, p.z))
    }
}
