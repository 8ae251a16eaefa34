use jvxl_surface::{
    ContourLevels, Extraction, FieldKind, JvxlDocument, JvxlReader, JvxlWriter, Plane, SurfaceError,
    SurfaceRequest,
    field::QuantumNumbers,
    jvxl::{FractionCodec, char_to_fraction, compress, decompress, fraction_to_char},
};
use proptest::prelude::*;

fn sphere() -> SurfaceRequest {
    SurfaceRequest::default().with_resolution(8.0)
}

#[test]
fn fraction_0_37_is_d() {
    assert_eq!(fraction_to_char(0.37, 35, 90), 'D');
    assert!((char_to_fraction('D', 35, 90) - 33.0 / 90.0).abs() < 1e-6);
}

#[test]
fn sphere_survives_the_stream() {
    let surface = sphere().run().unwrap();
    let text = surface.to_jvxl().unwrap();
    let reader = JvxlReader::new(&text).unwrap();
    assert_eq!(reader.surface_count(), 1);
    assert_eq!(reader.header().grid.counts(), surface.grid.counts());

    let decoded = reader.read_surface(1).unwrap();
    assert!(!decoded.is_contour());
    assert_eq!(decoded.mesh.vertex_count(), surface.mesh.vertex_count());
    assert_eq!(decoded.mesh.triangle_count(), surface.mesh.triangle_count());
    assert_eq!(decoded.mesh.tris, surface.mesh.tris);
    let tolerance = surface.grid.cell_diagonal() / 90.0 + 1e-4;
    for (a, b) in decoded.mesh.vertices.iter().zip(&surface.mesh.vertices) {
        assert!((a - b).norm() <= tolerance, "{a} vs {b}");
    }
    assert_eq!(decoded.cutoff(), surface.cutoff());
    assert_eq!(decoded.colors.len(), decoded.mesh.vertex_count());
}

#[test]
fn orbital_phases_survive_the_stream() {
    let surface = SurfaceRequest::new(FieldKind::AtomicOrbital(QuantumNumbers::new(2, 1, 0, 1.0)))
        .with_cutoff(0.05)
        .run()
        .unwrap();
    let text = JvxlWriter::default()
        .with_precise_colors(true)
        .write(&surface)
        .unwrap();
    let decoded = JvxlReader::new(&text).unwrap().read_surface(1).unwrap();
    assert_eq!(decoded.data_range, surface.data_range);
    assert_eq!(decoded.mesh.vertex_count(), surface.mesh.vertex_count());
    for (a, b) in decoded.mesh.values.iter().zip(&surface.mesh.values) {
        assert!((a - b).abs() < 1e-3, "{a} vs {b}");
    }
}

#[test]
fn second_surface_is_read_after_skipping_the_first() {
    let outer = sphere().run().unwrap();
    let inner = sphere().with_cutoff(0.3).run().unwrap();
    assert_eq!(outer.grid, inner.grid);

    let text = JvxlWriter::default().write_all([&outer, &inner]).unwrap();
    let reader = JvxlReader::new(&text).unwrap();
    assert_eq!(reader.surface_count(), 2);

    let second = reader.read_surface(2).unwrap();
    assert_eq!(second.cutoff(), 0.3);
    assert_eq!(second.mesh.vertex_count(), inner.mesh.vertex_count());
    assert!(second.mesh.vertex_count() < outer.mesh.vertex_count());

    let all = reader.read_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].mesh.vertex_count(), outer.mesh.vertex_count());
}

#[test]
fn surface_index_is_one_based() {
    let text = sphere().run().unwrap().to_jvxl().unwrap();
    let reader = JvxlReader::new(&text).unwrap();
    for k in [0, 2] {
        match reader.read_surface(k) {
            Err(SurfaceError::SurfaceIndexOutOfRange {
                requested,
                available,
            }) => {
                assert_eq!(requested, k);
                assert_eq!(available, 1);
            }
            other => panic!("expected an index error, got {other:?}"),
        }
    }
}

#[test]
fn missing_record_is_end_of_data() {
    let text = sphere().run().unwrap().to_jvxl().unwrap();
    let text = text.replacen("\n-1 35 90 35 90\n", "\n-2 35 90 35 90\n", 1);
    let reader = JvxlReader::new(&text).unwrap();
    assert_eq!(reader.surface_count(), 2);
    assert!(reader.read_surface(1).is_ok());
    assert!(matches!(
        reader.read_surface(2),
        Err(SurfaceError::UnexpectedEndOfData)
    ));
}

#[test]
fn damaged_skipped_record_does_not_panic() {
    let text = sphere().run().unwrap().to_jvxl().unwrap();
    let text = text.replacen("\n-1 35 90 35 90\n", "\n-2 35 90 35 90\n", 1);
    let lines: Vec<&str> = text.lines().collect();
    let truncated = lines[..lines.len() - 2].join("\n");
    let reader = JvxlReader::new(&truncated).unwrap();
    assert!(reader.read_surface(2).is_err());
}

#[test]
fn contour_record_round_trip() {
    let plane = Plane::new(0.0, 0.0, 1.0, -0.1).unwrap();
    let surface = sphere()
        .with_plane(plane)
        .with_contours(ContourLevels::Count(5))
        .run()
        .unwrap();
    let text = surface.to_jvxl().unwrap();
    let decoded = JvxlReader::new(&text).unwrap().read_surface(1).unwrap();

    assert!(decoded.is_contour());
    assert_eq!(decoded.plane, Some(plane));
    assert_eq!(decoded.data_range, surface.data_range);
    assert_eq!(decoded.color_range, surface.color_range);
    assert!(decoded.mesh.triangle_count() > 0);

    let (Extraction::Contour { pixels: a, .. }, Extraction::Contour { pixels: b, .. }) =
        (&decoded.extraction, &surface.extraction)
    else {
        panic!("both surfaces should be contour maps");
    };
    assert_eq!(a.dims(), b.dims());
    let (lo, hi) = surface.data_range;
    let tolerance = (hi - lo) * 2.0 / 8100.0;
    for (x, y) in a.values().iter().zip(b.values()) {
        assert_eq!(x.is_nan(), y.is_nan());
        if !y.is_nan() {
            assert!((x - y).abs() <= tolerance, "{x} vs {y}");
        }
    }
}

#[test]
fn explicit_levels_come_back_as_a_count() {
    let plane = Plane::new(0.0, 0.0, 1.0, -0.1).unwrap();
    let surface = sphere()
        .with_plane(plane)
        .with_contours(ContourLevels::Explicit(vec![0.2, 0.5, 0.8]))
        .run()
        .unwrap();
    let text = surface.to_jvxl().unwrap();
    let decoded = JvxlReader::new(&text).unwrap().read_surface(1).unwrap();
    let Extraction::Contour { levels, lines, .. } = &decoded.extraction else {
        panic!("decoded surface should be a contour map");
    };
    assert_eq!(*levels, ContourLevels::Count(3));
    assert_eq!(lines.len(), 3);
}

#[test]
fn plain_cube_is_not_a_surface_stream() {
    let cube = "\
plain cube
two by two by two
    1    0.000000    0.000000    0.000000
    2    1.000000    0.000000    0.000000
    2    0.000000    1.000000    0.000000
    2    0.000000    0.000000    1.000000
    8    0.000000    0.000000    0.000000    0.000000
 1.0 2.0 3.0 4.0 5.0 6.0 7.0 8.0
";
    match JvxlDocument::parse(cube).unwrap() {
        JvxlDocument::Cube(data) => assert_eq!(data.values[[1, 1, 1]], 8.0),
        JvxlDocument::Surfaces(_) => panic!("plain cube read as a surface stream"),
    }
    assert!(JvxlReader::new(cube).is_err());
}

#[test]
fn writer_needs_a_surface() {
    let none: [&jvxl_surface::Surface; 0] = [];
    assert!(matches!(
        JvxlWriter::default().write_all(none),
        Err(SurfaceError::NoSurfaces)
    ));
}

proptest! {
    #[test]
    fn fractions_round_trip_within_one_step(f in 0.0f32..1.0) {
        let codec = FractionCodec::default();
        let decoded = codec.decode(codec.encode(f));
        prop_assert!((decoded - f).abs() <= 1.0 / 90.0);
    }

    #[test]
    fn compression_round_trips(text in "[a-c~# 0-9]{0,64}") {
        let packed = compress(&text);
        prop_assert_eq!(decompress(&packed).unwrap(), text);
    }

    #[test]
    fn compression_drops_line_breaks(text in "[a-c~ \n\r]{0,64}") {
        let single_line: String = text.chars().filter(|&c| c != '\n' && c != '\r').collect();
        prop_assert_eq!(decompress(&compress(&text)).unwrap(), single_line);
    }
}
