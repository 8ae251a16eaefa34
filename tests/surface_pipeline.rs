use approx::assert_relative_eq;
use jvxl_surface::{
    ColorScheme, ContourLevels, CutoffPolicy, FieldKind, MarchingCubes, Plane, Point, SurfaceRequest,
    Value, VolumetricGrid,
    color::{BLUE, PhaseFunction, RED},
    field::{MepConfig, QuantumNumbers, SolventConfig, SolventMode},
    types::Atom,
};
use ndarray::Array3;
use proptest::prelude::*;

fn unit_grid(n: usize) -> VolumetricGrid {
    let max = (n - 1) as Value;
    VolumetricGrid::axis_aligned(Point::origin(), Point::new(max, max, max), [n, n, n]).unwrap()
}

#[test]
fn all_zero_field_has_no_surface() {
    let field = Array3::<Value>::zeros((3, 3, 3));
    let result = MarchingCubes::new(&field, &unit_grid(3), CutoffPolicy::new(0.5)).extract();
    assert_eq!(result.mesh.vertex_count(), 0);
    assert_eq!(result.mesh.triangle_count(), 0);
    assert_eq!(result.cells.outside, 8);
    assert_eq!(result.cells.boundary, 0);
}

#[test]
fn all_inside_field_has_no_surface() {
    let field = Array3::<Value>::from_elem((4, 4, 4), 1.0);
    let result = MarchingCubes::new(&field, &unit_grid(4), CutoffPolicy::new(0.5)).extract();
    assert_eq!(result.mesh.triangle_count(), 0);
    assert_eq!(result.cells.inside, 27);
    assert_eq!(result.runs, vec![0, 64]);
}

#[test]
fn sample_equal_to_positive_cutoff_is_inside() {
    let policy = CutoffPolicy::new(0.5);
    assert!(policy.is_inside(0.5));
    assert!(!policy.is_inside(0.4999));
    let negative = CutoffPolicy::new(-0.5);
    assert!(negative.is_inside(-0.5));
    assert!(!negative.is_inside(-0.4999));
}

#[test]
fn unit_sphere_vertices_sit_on_the_sphere() {
    let surface = SurfaceRequest::new(FieldKind::Sphere { radius: 1.0 })
        .with_resolution(10.0)
        .run()
        .unwrap();
    assert_eq!(surface.grid.counts(), [20, 20, 20]);
    assert!(surface.mesh.vertex_count() > 0);
    for p in &surface.mesh.vertices {
        let r = p.coords.norm();
        assert!((0.9..=1.1).contains(&r), "vertex at distance {r}");
    }
    assert!(surface.mesh.check_indices().is_ok());
    // 4π, less what the chords cut off.
    assert!((surface.mesh.area() - 4.0 * std::f32::consts::PI).abs() < 0.6);
}

#[test]
fn sphere_normals_point_outward() {
    let surface = SurfaceRequest::default().with_resolution(8.0).run().unwrap();
    let outward = surface
        .mesh
        .vertices
        .iter()
        .zip(&surface.mesh.normals)
        .filter(|(p, n)| p.coords.dot(n) > 0.0)
        .count();
    assert_eq!(outward, surface.mesh.vertex_count());
}

#[test]
fn hydrogen_1s_is_a_sphere_at_the_expected_radius() {
    let surface = SurfaceRequest::new(FieldKind::AtomicOrbital(QuantumNumbers::new(1, 0, 0, 1.0)))
        .run()
        .unwrap();
    // ψ = e^(−r/a₀) / √(π a₀³) = 0.14
    let expected = 0.52918 * (1.0 / (std::f32::consts::PI * 0.52918f32.powi(3)).sqrt() / 0.14).ln();
    let tolerance = surface.grid.cell_diagonal();
    assert!(surface.mesh.vertex_count() > 0);
    for p in &surface.mesh.vertices {
        assert!((p.coords.norm() - expected).abs() < tolerance);
    }
}

#[test]
fn absolute_cutoff_keeps_both_lobes() {
    let surface = SurfaceRequest::new(FieldKind::AtomicOrbital(QuantumNumbers::new(2, 1, 0, 1.0)))
        .with_cutoff(0.05)
        .with_color_scheme(ColorScheme::phase(PhaseFunction::Z))
        .run()
        .unwrap();
    let values = &surface.mesh.values;
    assert!(values.iter().any(|&v| v > 0.0));
    assert!(values.iter().any(|&v| v < 0.0));
    for ((p, v), color) in surface.mesh.vertices.iter().zip(values).zip(&surface.colors) {
        assert_eq!(v.signum(), p.z.signum());
        assert_eq!(*color, if p.z < 0.0 { RED } else { BLUE });
    }

    let positive = SurfaceRequest::new(FieldKind::AtomicOrbital(QuantumNumbers::new(2, 1, 0, 1.0)))
        .with_cutoff(0.05)
        .with_positive_only(true)
        .run()
        .unwrap();
    assert!(positive.mesh.vertices.iter().all(|p| p.z > 0.0));
}

#[test]
fn solvent_surface_colored_by_potential() {
    let atoms = vec![
        Atom::new(8, Point::new(0.0, 0.0, 0.0), 1.52).with_charge(-0.8),
        Atom::new(1, Point::new(0.96, 0.0, 0.0), 1.1).with_charge(0.4),
        Atom::new(1, Point::new(-0.24, 0.93, 0.0), 1.1).with_charge(0.4),
    ];
    let surface = SurfaceRequest::new(FieldKind::Solvent(SolventConfig::new(
        SolventMode::SolventAccessible,
        1.2,
    )))
    .with_atoms(atoms)
    .with_map_from(FieldKind::Mep(MepConfig::default()))
    .with_color_scheme("rwb".parse().unwrap())
    .run()
    .unwrap();

    assert!(surface.mesh.triangle_count() > 0);
    let (lo, hi) = surface.data_range;
    assert!(lo < 0.0 && hi > 0.0);
    assert_eq!(surface.color_range, (lo, hi));
    assert_eq!(surface.colors.len(), surface.mesh.vertex_count());
}

#[test]
fn ignored_atoms_shrink_the_surface() {
    let atoms = vec![
        Atom::new(6, Point::new(0.0, 0.0, 0.0), 1.7),
        Atom::new(6, Point::new(2.5, 0.0, 0.0), 1.7),
    ];
    let request = SurfaceRequest::new(FieldKind::Solvent(SolventConfig::new(SolventMode::Vdw, 0.0)))
        .with_atoms(atoms)
        .with_resolution(4.0);
    let both = request.clone().run().unwrap();
    let one = request.with_ignored_atoms([1]).run().unwrap();
    let (_, hi) = one.mesh.bounds().unwrap();
    assert!(hi.x < 2.0);
    assert!(both.mesh.bounds().unwrap().1.x > 3.5);
}

#[test]
fn plane_through_sphere_gives_contours() {
    let plane = Plane::new(0.0, 0.0, 1.0, -0.1).unwrap();
    let surface = SurfaceRequest::default()
        .with_resolution(8.0)
        .with_plane(plane)
        .with_contours(ContourLevels::Count(5))
        .run()
        .unwrap();
    assert!(surface.is_contour());
    assert!(surface.mesh.triangle_count() > 0);
    for p in &surface.mesh.vertices {
        assert_relative_eq!(p.z, 0.1, epsilon = 1e-4);
    }
    let (lo, hi) = surface.data_range;
    assert!(lo < 0.0 && hi > 0.7);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn sphere_vertices_within_one_cell_diagonal(
        radius in 0.5f32..2.0,
        cx in -1.0f32..1.0,
        cz in -1.0f32..1.0,
    ) {
        let center = Point::new(cx, 0.25, cz);
        let surface = SurfaceRequest::new(FieldKind::Sphere { radius })
            .with_center(center)
            .with_resolution(12.0)
            .run()
            .unwrap();
        let diagonal = surface.grid.cell_diagonal();
        prop_assert!(surface.mesh.vertex_count() > 0);
        for p in &surface.mesh.vertices {
            let d = (p - center).norm();
            prop_assert!((d - radius).abs() <= diagonal);
        }
    }
}
