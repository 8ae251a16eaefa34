use tracing::{debug, info};

use crate::{
    color::{ColorMapper, ColorScheme},
    contour::{ContourEngine, ContourLevels, PixelGrid},
    error::{Result, SurfaceError},
    field::{FieldContext, FieldKind, FunctionXy, GeneratedField},
    grid::GridBuilder,
    marching_cubes::MarchingCubes,
    surface::{Extraction, Surface, value_range},
    types::{Atom, CutoffPolicy, Plane, Point, Value},
};

/// Everything one surface computation needs.
///
/// Built from [`SurfaceRequest::new`] (or `Default`, a unit sphere) with
/// `with_*` methods and run once with [`run`](Self::run):
///
/// ```rust,ignore
/// let surface = SurfaceRequest::new(FieldKind::Sphere { radius: 1.0 })
///     .with_resolution(10.0)
///     .with_color_scheme("bwr".parse()?)
///     .run()?;
/// let jvxl = surface.to_jvxl()?;
/// ```
#[derive(Clone, Debug)]
pub struct SurfaceRequest {
    kind: FieldKind,
    cutoff: Option<Value>,
    absolute: bool,
    positive_only: bool,
    plane: Option<Plane>,
    contours: ContourLevels,
    center: Point,
    anisotropy: [Value; 3],
    points_per_unit: Option<Value>,
    atoms: Vec<Atom>,
    ignored: Vec<usize>,
    scheme: ColorScheme,
    color_range: Option<(Value, Value)>,
    lazy: bool,
    remappable: bool,
    map_from: Option<FieldKind>,
    invalidate_near_zero: bool,
    share_normals: bool,
}

impl Default for SurfaceRequest {
    fn default() -> Self {
        Self::new(FieldKind::Sphere { radius: 1.0 })
    }
}

impl SurfaceRequest {
    /// Orbital kinds start with the absolute cutoff so both phases are drawn.
    pub fn new(kind: FieldKind) -> Self {
        let absolute = matches!(
            kind,
            FieldKind::AtomicOrbital(_) | FieldKind::MolecularOrbital(_)
        );
        Self {
            kind,
            cutoff: None,
            absolute,
            positive_only: false,
            plane: None,
            contours: ContourLevels::default(),
            center: Point::origin(),
            anisotropy: [1.0; 3],
            points_per_unit: None,
            atoms: Vec::new(),
            ignored: Vec::new(),
            scheme: ColorScheme::default(),
            color_range: None,
            lazy: false,
            remappable: false,
            map_from: None,
            invalidate_near_zero: false,
            share_normals: true,
        }
    }

    /// Overrides the kind's default cutoff.
    pub fn with_cutoff(mut self, cutoff: Value) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    pub fn with_absolute(mut self, absolute: bool) -> Self {
        self.absolute = absolute;
        self
    }

    pub fn with_positive_only(mut self, positive_only: bool) -> Self {
        self.positive_only = positive_only;
        self
    }

    /// Draws contour lines where `plane` cuts the field instead of a 3D surface.
    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.plane = Some(plane);
        self
    }

    pub fn with_contours(mut self, contours: ContourLevels) -> Self {
        self.contours = contours;
        self
    }

    pub fn with_center(mut self, center: Point) -> Self {
        self.center = center;
        self
    }

    pub fn with_anisotropy(mut self, anisotropy: [Value; 3]) -> Self {
        self.anisotropy = anisotropy;
        self
    }

    /// Lattice points per Angstrom, still subject to the kind's hard cap.
    pub fn with_resolution(mut self, points_per_unit: Value) -> Self {
        self.points_per_unit = Some(points_per_unit);
        self
    }

    pub fn with_atoms(mut self, atoms: Vec<Atom>) -> Self {
        self.atoms = atoms;
        self
    }

    /// Indices into the atom list that generators should leave out.
    pub fn with_ignored_atoms<I: IntoIterator<Item = usize>>(mut self, ignored: I) -> Self {
        self.ignored = ignored.into_iter().collect();
        self
    }

    pub fn with_color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Values mapped to the two ends of the color scheme.
    pub fn with_color_range(mut self, red: Value, blue: Value) -> Self {
        self.color_range = Some((red, blue));
        self
    }

    /// Evaluates parametric fields per corner instead of filling an array.
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Keeps the sampled field on the surface for later mapping.
    pub fn with_remappable(mut self, remappable: bool) -> Self {
        self.remappable = remappable;
        self
    }

    /// Colors the surface by a second field sampled at each vertex.
    pub fn with_map_from(mut self, kind: FieldKind) -> Self {
        self.map_from = Some(kind);
        self
    }

    /// Hides vertices whose (mapped) value is essentially zero.
    pub fn with_invalidate_near_zero(mut self, invalidate: bool) -> Self {
        self.invalidate_near_zero = invalidate;
        self
    }

    pub fn with_shared_normals(mut self, share_normals: bool) -> Self {
        self.share_normals = share_normals;
        self
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn policy(&self) -> CutoffPolicy {
        CutoffPolicy::new(self.cutoff.unwrap_or_else(|| self.kind.default_cutoff()))
            .with_absolute(self.absolute)
            .with_positive_only(self.positive_only)
    }

    /// The generator's view of this request, ignored atoms removed.
    pub fn context(&self) -> FieldContext {
        let atoms = self
            .atoms
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.ignored.contains(i))
            .map(|(_, atom)| atom.clone())
            .collect();
        FieldContext {
            atoms,
            center: self.center,
            anisotropy: self.anisotropy,
            points_per_unit: self.points_per_unit,
            cutoff: self.policy().cutoff,
            lazy: self.lazy,
        }
    }

    /// Rejects a malformed request before anything is allocated.
    pub fn validate(&self) -> Result<()> {
        if let Some(ppu) = self.points_per_unit {
            if !(ppu.is_finite() && ppu > 0.0) {
                return Err(SurfaceError::InvalidResolution(ppu));
            }
        }
        if self.anisotropy.iter().any(|a| !(a.is_finite() && *a > 0.0)) {
            return Err(SurfaceError::InvalidEllipsoid);
        }
        let ctx = self.context();
        self.kind.validate(&ctx)?;
        if let Some(kind) = &self.map_from {
            kind.validate(&ctx)?;
        }
        Ok(())
    }

    /// Generates the field, extracts the surface or contours, maps and colors it.
    pub fn run(&self) -> Result<Surface> {
        self.validate()?;
        let ctx = self.context();
        let policy = self.policy();

        let mut surface = match (&self.kind, &self.plane) {
            (FieldKind::FunctionXy(function), Some(_)) => self.contour_function(function, &ctx)?,
            (_, Some(plane)) => {
                let generated = self.kind.generate(&ctx)?;
                let pixels = PixelGrid::for_plane(&generated.grid, plane).sample_from(&generated.field);
                self.contour(generated, pixels, *plane)
            }
            (_, None) => self.volume(self.kind.generate(&ctx)?),
        };

        if let Some(kind) = &self.map_from {
            let secondary = kind.fill_on(&ctx, &surface.grid)?;
            surface.map_values_from(&secondary);
        }
        if self.invalidate_near_zero {
            let hidden = surface.invalidate_near_zero();
            debug!(hidden, "near-zero vertices invalidated");
        }
        surface.recolor();
        info!(
            kind = self.kind.name(),
            cutoff = policy.cutoff,
            contour = surface.is_contour(),
            vertices = surface.mesh.vertex_count(),
            triangles = surface.mesh.triangle_count(),
            area = surface.mesh.area(),
            "surface ready"
        );
        Ok(surface)
    }

    fn volume(&self, generated: GeneratedField) -> Surface {
        let policy = self.policy();
        let result = MarchingCubes::new(&generated.field, &generated.grid, policy)
            .with_shared_normals(self.share_normals)
            .extract();
        let data_range = value_range(&result.mesh).unwrap_or((policy.cutoff, policy.cutoff));
        Surface {
            title: generated.title,
            atoms: generated.atoms,
            grid: generated.grid,
            policy,
            plane: None,
            mesh: result.mesh,
            colors: Vec::new(),
            mapper: ColorMapper::new(self.scheme.clone()).with_range(self.color_range),
            data_range,
            color_range: (0.0, 0.0),
            extraction: Extraction::Volume {
                runs: result.runs,
                fractions: result.fractions,
                cells: result.cells,
            },
            field: self.remappable.then_some(generated.field),
            transform: generated.transform,
        }
    }

    fn contour(&self, generated: GeneratedField, pixels: PixelGrid, plane: Plane) -> Surface {
        let data_range = pixels.range().unwrap_or((0.0, 0.0));
        let range = self
            .color_range
            .or_else(|| pixels.range())
            .unwrap_or((-1.0, 1.0));
        let result = ContourEngine::new(self.contours.clone())
            .with_range(Some(range))
            .run(&pixels);
        Surface {
            title: generated.title,
            atoms: generated.atoms,
            grid: generated.grid,
            policy: self.policy(),
            plane: Some(plane),
            mesh: result.mesh,
            colors: Vec::new(),
            mapper: ColorMapper::new(self.scheme.clone()).with_range(Some(range)),
            data_range,
            color_range: range,
            extraction: Extraction::Contour {
                pixels,
                levels: self.contours.clone(),
                lines: result.levels,
                vertices: result.vertices,
            },
            field: self.remappable.then_some(generated.field),
            transform: generated.transform,
        }
    }

    /// Contours of `f(x, y)` itself on a one-cell-thick slab around `z = 0`.
    fn contour_function(&self, function: &FunctionXy, ctx: &FieldContext) -> Result<Surface> {
        let ppu = self.kind.points_per_unit(ctx);
        let cap = self.kind.hard_cap();
        let mut builder = GridBuilder::new();
        builder.set_axis_range(0, function.min[0], function.max[0], ppu, cap);
        builder.set_axis_range(1, function.min[1], function.max[1], ppu, cap);
        // two points, z = -0.5 and z = 0.5
        builder.set_axis_range(2, -0.5, 1.5, 1.0, 2);
        let grid = builder.build()?;
        let plane = Plane::new(0.0, 0.0, 1.0, 0.0)?;
        let pixels = PixelGrid::for_plane(&grid, &plane).evaluate(|p| function.evaluate(p.x, p.y));
        let field = function.fill_on(&grid);
        let generated = GeneratedField {
            title: ["functionXY".to_string(), "contour map".to_string()],
            grid,
            field,
            atoms: Vec::new(),
            transform: None,
        };
        Ok(self.contour(generated, pixels, plane))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{QuantumNumbers, SolventConfig};

    #[test]
    fn configuration_errors_come_first() {
        let bad = SurfaceRequest::new(FieldKind::AtomicOrbital(QuantumNumbers::new(2, 2, 0, 1.0)));
        let err = bad.run().unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, SurfaceError::InvalidQuantumNumbers { n: 2, l: 2, m: 0 }));

        let no_atoms = SurfaceRequest::new(FieldKind::Solvent(SolventConfig::default()));
        assert!(matches!(no_atoms.run(), Err(SurfaceError::MissingAtoms)));

        let bad_resolution = SurfaceRequest::default().with_resolution(0.0);
        assert!(matches!(
            bad_resolution.validate(),
            Err(SurfaceError::InvalidResolution(_))
        ));
    }

    #[test]
    fn orbitals_default_to_both_phases() {
        let orbital = SurfaceRequest::new(FieldKind::AtomicOrbital(QuantumNumbers::new(2, 1, 0, 1.0)));
        assert!(orbital.policy().uses_absolute());
        assert_eq!(orbital.policy().cutoff, 0.14);
        assert!(!SurfaceRequest::default().policy().absolute);
    }

    #[test]
    fn ignored_atoms_are_dropped_from_the_context() {
        let atoms = (0..3)
            .map(|i| Atom::new(6, Point::new(i as Value, 0.0, 0.0), 1.7))
            .collect();
        let ctx = SurfaceRequest::default()
            .with_atoms(atoms)
            .with_ignored_atoms([1])
            .context();
        assert_eq!(ctx.atoms.len(), 2);
        assert_eq!(ctx.atoms[1].position.x, 2.0);
    }

    #[test]
    fn remappable_keeps_the_field() {
        let surface = SurfaceRequest::default()
            .with_resolution(4.0)
            .with_remappable(true)
            .run()
            .unwrap();
        assert!(surface.field.is_some());
        let surface = SurfaceRequest::default().with_resolution(4.0).run().unwrap();
        assert!(surface.field.is_none());
    }

    #[test]
    fn function_xy_contours_lie_in_the_xy_plane() {
        let function = FunctionXy::new(|x, y| x + y, [-1.0, -1.0], [1.0, 1.0]);
        let surface = SurfaceRequest::new(FieldKind::FunctionXy(function))
            .with_resolution(4.0)
            .with_plane(Plane::new(0.0, 0.0, 1.0, 0.0).unwrap())
            .with_contours(ContourLevels::Count(3))
            .run()
            .unwrap();
        assert!(surface.is_contour());
        assert!(surface.mesh.triangle_count() > 0);
        for p in &surface.mesh.vertices {
            assert!(p.z.abs() < 1e-4);
        }
        assert_eq!(surface.grid.counts()[2], 2);
        let (lo, hi) = surface.data_range;
        assert!((lo + 2.0).abs() < 1e-5);
        // nine points a 2/9 step apart stop at x = y = 7/9
        assert!((hi - 14.0 / 9.0).abs() < 1e-5, "{hi}");
        assert_eq!(surface.colors.len(), surface.mesh.vertex_count());
    }
}
