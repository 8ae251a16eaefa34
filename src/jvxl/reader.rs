use ndarray::{Array2, Array3};
use tracing::{debug, warn};

use crate::{
    color::ColorMapper,
    contour::{ContourEngine, ContourLevels, PixelGrid},
    error::{Result, SurfaceError},
    field::{CubeData, CubeHeader, LineCursor},
    interp::lerp,
    marching_cubes::{Crossing, EdgeCrossing, EdgeResolver, MarchingCubes, expand_runs},
    mesh::IsoMesh,
    surface::{Extraction, Surface},
    types::{CutoffPolicy, Plane, Value},
};

use super::{Definition, compress::decompress, fraction::FractionCodec};

/// Feeds stored crossing fractions back to the extractor in vertex order.
///
/// A NaN fraction, or running out of fractions, reports the edge as failed.
pub struct DecodedFractions<I> {
    fractions: I,
    value: Value,
}

impl<I: Iterator<Item = Value>> DecodedFractions<I> {
    /// `value` is what every created vertex carries until colors are applied.
    pub fn new(fractions: I, value: Value) -> Self {
        Self { fractions, value }
    }
}

impl<I: Iterator<Item = Value>> EdgeResolver for DecodedFractions<I> {
    fn resolve(&mut self, _edge: &EdgeCrossing) -> Option<Crossing> {
        let fraction = self.fractions.next().filter(|f| !f.is_nan())?;
        Some(Crossing {
            fraction,
            value: self.value,
        })
    }
}

/// What a text stream turned out to hold.
pub enum JvxlDocument<'a> {
    Surfaces(JvxlReader<'a>),
    /// A plain (or multi-orbital) Gaussian cube.
    Cube(CubeData),
}

impl<'a> JvxlDocument<'a> {
    pub fn parse(text: &'a str) -> Result<Self> {
        let mut cursor = LineCursor::new(text);
        let header = CubeHeader::read(&mut cursor)?;
        let is_jvxl = header.extended
            && header.orbital_indices.is_empty()
            && cursor
                .peek_line()
                .is_some_and(|line| line.trim_start().starts_with('-'));
        if !is_jvxl {
            return Ok(Self::Cube(CubeData::read_values(header, &mut cursor)?));
        }
        let (surface_count, edge, color) = read_surface_line(&mut cursor)?;
        Ok(Self::Surfaces(JvxlReader {
            text,
            header,
            edge,
            color,
            surface_count,
            mapper: ColorMapper::default(),
        }))
    }
}

fn read_surface_line(cursor: &mut LineCursor<'_>) -> Result<(usize, FractionCodec, FractionCodec)> {
    let fields: Vec<i64> = cursor.next_values()?;
    let count = fields
        .first()
        .ok_or_else(|| cursor.error("missing surface count"))?
        .unsigned_abs() as usize;
    let codec = |at: usize| -> Result<FractionCodec> {
        let mut codec = FractionCodec::default();
        if let [base, range] = fields.get(at..at + 2).unwrap_or_default() {
            let byte = |v: i64| u8::try_from(v).map_err(|_| cursor.error("codec parameter out of range"));
            codec = FractionCodec::new(byte(*base)?, byte(*range)?);
        }
        Ok(codec)
    };
    Ok((count, codec(1)?, codec(3)?))
}

/// Tracks damage found while skipping records so it is reported once.
#[derive(Default)]
struct SkipState {
    end_of_data: bool,
}

impl SkipState {
    fn tolerate<T>(&mut self, result: Result<T>, filler: T) -> T {
        result.unwrap_or_else(|error| {
            if !self.end_of_data {
                warn!(%error, "stream damaged in a skipped surface, padding with filler");
                self.end_of_data = true;
            }
            filler
        })
    }
}

/// Reads surfaces back out of a JVXL stream without recomputing any field.
pub struct JvxlReader<'a> {
    text: &'a str,
    header: CubeHeader,
    edge: FractionCodec,
    color: FractionCodec,
    surface_count: usize,
    mapper: ColorMapper,
}

impl<'a> JvxlReader<'a> {
    /// Fails if `text` is not a JVXL stream.
    pub fn new(text: &'a str) -> Result<Self> {
        match JvxlDocument::parse(text)? {
            JvxlDocument::Surfaces(reader) => Ok(reader),
            JvxlDocument::Cube(_) => Err(SurfaceError::data(0, "no surface records in stream")),
        }
    }

    /// Color scheme for decoded surfaces; the stored red/blue values set its range.
    pub fn with_color_mapper(mut self, mapper: ColorMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn header(&self) -> &CubeHeader {
        &self.header
    }

    pub fn surface_count(&self) -> usize {
        self.surface_count
    }

    /// Decodes surface `k` (1-based), skipping the records before it by
    /// counting characters only.
    ///
    /// A contour record stores only how many levels it had. Explicit level
    /// lists therefore come back as [`ContourLevels::Count`], spread evenly
    /// over the stored color range, and may sit at other values than the
    /// ones written.
    pub fn read_surface(&self, k: usize) -> Result<Surface> {
        if k == 0 || k > self.surface_count {
            return Err(SurfaceError::SurfaceIndexOutOfRange {
                requested: k,
                available: self.surface_count,
            });
        }
        let mut cursor = LineCursor::new(self.text);
        CubeHeader::read(&mut cursor)?;
        cursor.next_line()?;
        let mut state = SkipState::default();
        for _ in 1..k {
            self.skip_record(&mut cursor, &mut state);
        }
        self.read_record(&mut cursor)
    }

    pub fn read_all(&self) -> Result<Vec<Surface>> {
        (1..=self.surface_count).map(|k| self.read_surface(k)).collect()
    }

    fn skip_record(&self, cursor: &mut LineCursor<'_>, state: &mut SkipState) {
        let definition = cursor
            .next_line()
            .and_then(|line| Definition::parse(line, cursor.line_number()));
        let Some(definition) = state.tolerate(definition.map(Some), None) else {
            return;
        };
        for _ in 0..definition.run_count.unwrap_or(0) {
            if state.end_of_data {
                return;
            }
            state.tolerate(cursor.next_value::<usize>(), 0);
        }
        for count in [definition.edge_chars, definition.color_chars] {
            let filler = vec![self.edge.encode(0.0); count];
            state.tolerate(read_chars(cursor, count), filler);
        }
    }

    fn read_record(&self, cursor: &mut LineCursor<'_>) -> Result<Surface> {
        let line = cursor.next_line()?;
        let definition = Definition::parse(line, cursor.line_number())?;
        let runs = (0..definition.run_count.unwrap_or(0))
            .map(|_| cursor.next_value::<usize>())
            .collect::<Result<Vec<_>>>()?;
        let edges = read_chars(cursor, definition.edge_chars)?;
        let colors = read_chars(cursor, definition.color_chars)?;
        match definition.plane {
            Some((plane, contours)) => self.decode_plane(&definition, plane, contours, &edges, cursor),
            None => Ok(self.decode_volume(&definition, runs, &edges, &colors)),
        }
    }

    fn decode_volume(
        &self,
        definition: &Definition,
        runs: Vec<usize>,
        edges: &[char],
        colors: &[char],
    ) -> Surface {
        let grid = self.header.grid.clone();
        let cutoff = definition.cutoff;
        let inside = expand_runs(&runs, grid.point_count());
        let outside = if cutoff > 0.0 { 0.0 } else { cutoff + 1.0 };
        let [nx, ny, nz] = grid.counts();
        let field = Array3::from_shape_fn((nx, ny, nz), |(x, y, z)| {
            if inside[grid.linear_index(x, y, z)] {
                cutoff
            } else {
                outside
            }
        });

        let policy = CutoffPolicy::new(cutoff);
        let mut resolver = DecodedFractions::new(edges.iter().map(|&c| self.edge.decode(c)), cutoff);
        let result = MarchingCubes::new(&field, &grid, policy).extract_with(&mut resolver);
        if result.fractions.len() != edges.len() {
            warn!(
                stored = edges.len(),
                used = result.fractions.len(),
                "edge data does not match the stored runs"
            );
        }

        let mut mesh = result.mesh;
        self.apply_values(&mut mesh, definition, colors);
        debug!(
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "jvxl surface decoded"
        );
        let mut surface = Surface {
            title: self.header.title.clone(),
            atoms: self.header.atoms.clone(),
            grid,
            policy,
            plane: None,
            mesh,
            colors: Vec::new(),
            mapper: self.mapper.clone().with_range(Some(definition.color_range)),
            data_range: definition.data_range,
            color_range: definition.color_range,
            extraction: Extraction::Volume {
                runs,
                fractions: result.fractions,
                cells: result.cells,
            },
            field: None,
            transform: None,
        };
        surface.recolor();
        surface
    }

    /// Restores vertex values from the color characters; NaN marks the vertex invalid.
    fn apply_values(&self, mesh: &mut IsoMesh, definition: &Definition, colors: &[char]) {
        if colors.is_empty() {
            return;
        }
        let fractions = if definition.precise_colors {
            self.color.decode_precise(colors)
        } else {
            colors.iter().map(|&c| self.color.decode(c)).collect()
        };
        if fractions.len() != mesh.vertex_count() {
            warn!(
                stored = fractions.len(),
                vertices = mesh.vertex_count(),
                "color data does not match the vertex count"
            );
        }
        let (min, max) = definition.data_range;
        for (i, f) in fractions.into_iter().enumerate().take(mesh.vertex_count()) {
            if f.is_nan() {
                mesh.valid[i] = false;
                mesh.values[i] = Value::NAN;
            } else {
                mesh.values[i] = lerp(min, max, f);
            }
        }
    }

    fn decode_plane(
        &self,
        definition: &Definition,
        plane: Plane,
        contours: usize,
        edges: &[char],
        cursor: &LineCursor<'_>,
    ) -> Result<Surface> {
        let grid = self.header.grid.clone();
        let pixels = PixelGrid::for_plane(&grid, &plane);
        let [np, nq] = pixels.dims();
        let (min, max) = definition.data_range;
        let values: Vec<Value> = self
            .edge
            .decode_precise(edges)
            .into_iter()
            .map(|f| if f.is_nan() { f } else { lerp(min, max, f) })
            .collect();
        let values = Array2::from_shape_vec((np, nq), values)
            .map_err(|_| cursor.error(format!("expected {} pixel values", np * nq)))?;
        let pixels = pixels.with_values(values)?;

        let levels = ContourLevels::Count(contours);
        let result = ContourEngine::new(levels.clone())
            .with_range(Some(definition.color_range))
            .run(&pixels);
        let mut surface = Surface {
            title: self.header.title.clone(),
            atoms: self.header.atoms.clone(),
            grid,
            policy: CutoffPolicy::new(definition.cutoff),
            plane: Some(plane),
            mesh: result.mesh,
            colors: Vec::new(),
            mapper: self.mapper.clone().with_range(Some(definition.color_range)),
            data_range: definition.data_range,
            color_range: definition.color_range,
            extraction: Extraction::Contour {
                pixels,
                levels,
                lines: result.levels,
                vertices: result.vertices,
            },
            field: None,
            transform: None,
        };
        surface.recolor();
        Ok(surface)
    }
}

/// Reads compressed lines until `count` characters have been decoded.
///
/// Each string starts on a fresh line, even an empty one.
fn read_chars(cursor: &mut LineCursor<'_>, count: usize) -> Result<Vec<char>> {
    let mut compressed = String::new();
    loop {
        compressed.push_str(cursor.next_line()?);
        let decoded = decompress(&compressed).map_err(|error| match error {
            SurfaceError::DataRead { reason, .. } => cursor.error(reason),
            other => other,
        })?;
        let mut chars: Vec<char> = decoded.chars().collect();
        if chars.len() >= count {
            chars.truncate(count);
            return Ok(chars);
        }
    }
}
