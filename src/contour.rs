//! Marching squares over a plane slice or a function of two variables.
//!
//! The field is first resampled onto a [`PixelGrid`]. For each contour
//! level every square is classified, and the crossings of that level with
//! the square's edges are resolved once and shared with the squares at
//! `p + 1` and `q + 1`. The filled bands between consecutive levels are then
//! triangulated square by square: the corners of band `i` are the XOR of the
//! masks of levels `i` and `i + 1`, and the band polygon walks those corners
//! and the two levels' crossings around the square.

use ndarray::Array2;
use tracing::debug;

use crate::{
    error::{Result, SurfaceError},
    field::VoxelSource,
    grid::VolumetricGrid,
    interp::{bilinear, find_t, lerp},
    marching_cubes::{PlaneSlice, march_plane},
    mesh::IsoMesh,
    types::{Plane, Point, Value, Vector},
};

pub const DEFAULT_CONTOUR_COUNT: usize = 11;

/// Levels closer to zero than this are pushed out to it.
const ZERO_NUDGE: Value = 1e-4;

/// Pixel offsets of the square's corners. Edge `e` joins corner `e` and `(e + 1) % 4`.
///
/// ```text
///  3 --2-- 2
///  |       |
///  3       1
///  |       |
///  0 --0-- 1
/// ```
pub const SQUARE_CORNERS: [[usize; 2]; 4] = [[0, 0], [1, 0], [1, 1], [0, 1]];

/// Inside-corner mask -> mask of crossed edges.
pub const SQUARE_EDGES: [u8; 16] = [0, 9, 3, 10, 6, 15, 5, 12, 12, 5, 15, 6, 10, 3, 9, 0];

fn is_saddle(mask: u8) -> bool {
    mask == 5 || mask == 10
}

/// How many levels to draw, or exactly which.
#[derive(Clone, Debug, PartialEq)]
pub enum ContourLevels {
    /// Evenly spaced strictly inside the data range.
    Count(usize),
    Explicit(Vec<Value>),
}

impl Default for ContourLevels {
    fn default() -> Self {
        Self::Count(DEFAULT_CONTOUR_COUNT)
    }
}

impl ContourLevels {
    /// Ascending, de-duplicated level values for data in `min..=max`.
    pub fn resolve(&self, min: Value, max: Value) -> Vec<Value> {
        let mut levels: Vec<Value> = match self {
            Self::Count(n) => {
                let n = (*n).max(1);
                let dv = (max - min) / (n + 1) as Value;
                (0..n).map(|i| min + (i + 1) as Value * dv).collect()
            }
            Self::Explicit(levels) => levels.iter().copied().filter(|v| v.is_finite()).collect(),
        };
        for level in &mut levels {
            if level.abs() < ZERO_NUDGE {
                *level = if *level < 0.0 { -ZERO_NUDGE } else { ZERO_NUDGE };
            }
        }
        levels.sort_by(|a, b| a.total_cmp(b));
        levels.dedup();
        levels
    }
}

/// The field resampled onto the square grid the contours are traced on.
#[derive(Clone, Debug)]
pub struct PixelGrid {
    values: Array2<Value>,
    positions: Array2<Point>,
    lattice: Array2<Vector>,
    normal: Vector,
    slice: Option<PlaneSlice>,
}

impl PixelGrid {
    /// Geometry of the pixels where `plane` cuts `grid`, with every value NaN.
    ///
    /// Pixel `(p, q)` sits on lattice column `(p, q)` of the two in-plane
    /// axes. Columns the plane misses stay NaN and their squares are skipped.
    pub fn for_plane(grid: &VolumetricGrid, plane: &Plane) -> Self {
        let slice = march_plane(grid, plane);
        let counts = grid.counts();
        let dims = (counts[slice.in_plane[0]], counts[slice.in_plane[1]]);
        let mut positions = Array2::from_elem(dims, Point::new(Value::NAN, Value::NAN, Value::NAN));
        let mut lattice = Array2::from_elem(dims, Vector::repeat(Value::NAN));
        for crossing in &slice.crossings {
            let [u, v] = crossing.column;
            let mut frac = Vector::zeros();
            frac[slice.in_plane[0]] = u as Value;
            frac[slice.in_plane[1]] = v as Value;
            frac[slice.axis] = crossing.lower as Value + crossing.fraction;
            positions[[u, v]] = grid.fractional_to_world(frac.x, frac.y, frac.z);
            lattice[[u, v]] = frac;
        }
        Self {
            values: Array2::from_elem(dims, Value::NAN),
            positions,
            lattice,
            normal: plane.normal().normalize(),
            slice: Some(slice),
        }
    }

    /// Fills pixel values from the samples on either side of each cut.
    pub fn sample_from<S: VoxelSource + ?Sized>(mut self, source: &S) -> Self {
        if let Some(slice) = &self.slice {
            for crossing in &slice.crossings {
                let [u, v] = crossing.column;
                let mut ijk = [0usize; 3];
                ijk[slice.in_plane[0]] = u;
                ijk[slice.in_plane[1]] = v;
                ijk[slice.axis] = crossing.lower;
                let below = source.value(ijk[0], ijk[1], ijk[2]);
                ijk[slice.axis] += 1;
                let above = source.value(ijk[0], ijk[1], ijk[2]);
                self.values[[u, v]] = lerp(below, above, crossing.fraction);
            }
        }
        self
    }

    /// Evaluates `f` directly at each pixel's world position.
    pub fn evaluate<F: Fn(&Point) -> Value>(mut self, f: F) -> Self {
        for ((p, q), value) in self.values.indexed_iter_mut() {
            let position = self.positions[[p, q]];
            if position.x.is_finite() {
                *value = f(&position);
            }
        }
        self
    }

    /// Replaces the values, e.g. with ones decoded from a stream.
    pub fn with_values(mut self, values: Array2<Value>) -> Result<Self> {
        if values.dim() != self.values.dim() {
            return Err(SurfaceError::InvalidGrid);
        }
        self.values = values;
        Ok(self)
    }

    pub fn dims(&self) -> [usize; 2] {
        let (np, nq) = self.values.dim();
        [np, nq]
    }

    pub fn values(&self) -> &Array2<Value> {
        &self.values
    }

    pub fn normal(&self) -> &Vector {
        &self.normal
    }

    /// Minimum and maximum over the non-NaN pixels.
    pub fn range(&self) -> Option<(Value, Value)> {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |range, &v| match range {
                Some((lo, hi)) => Some((v.min(lo), v.max(hi))),
                None => Some((v, v)),
            })
    }

    /// World and lattice position of a point given in pixel coordinates
    /// inside square `(p, q)`.
    fn locate(&self, square: [usize; 2], pixel: [Value; 2]) -> (Point, Vector) {
        let [p, q] = square;
        let tx = pixel[0] - p as Value;
        let ty = pixel[1] - q as Value;
        let blend = |c: [Value; 4]| bilinear(c[0], c[1], c[2], c[3], tx, ty);
        let corners = [[p, q], [p + 1, q], [p, q + 1], [p + 1, q + 1]];
        let mut position = Point::origin();
        let mut lattice = Vector::zeros();
        for axis in 0..3 {
            position[axis] = blend(corners.map(|[i, j]| self.positions[[i, j]][axis]));
            lattice[axis] = blend(corners.map(|[i, j]| self.lattice[[i, j]][axis]));
        }
        (position, lattice)
    }

    /// `+1` if increasing `p` then `q` turns counter-clockwise about the normal.
    fn handedness(&self) -> Value {
        let [np, nq] = self.dims();
        for p in 0..np.saturating_sub(1) {
            for q in 0..nq.saturating_sub(1) {
                let origin = self.positions[[p, q]];
                let du = self.positions[[p + 1, q]] - origin;
                let dv = self.positions[[p, q + 1]] - origin;
                let turn = du.cross(&dv).dot(&self.normal);
                if turn.is_finite() && turn != 0.0 {
                    return turn.signum();
                }
            }
        }
        1.0
    }
}

/// Ties a mesh vertex to where it came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContourVertex {
    pub vertex: usize,
    /// Fractional lattice coordinates in the volumetric grid.
    pub lattice: Vector,
    /// Coordinates in the pixel plane.
    pub pixel: [Value; 2],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SquareClass {
    Inside,
    Outside,
    Through,
}

/// One square's classification at one level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContourSquare {
    pub square: [usize; 2],
    pub level: usize,
    /// Bit `c` set when corner `c` is at or above the level.
    pub mask: u8,
    pub class: SquareClass,
    /// Vertex on each edge where the level crosses it, `-1` if none.
    pub points: [i32; 4],
}

/// One iso-line, as vertex pairs for line rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContourLevel {
    pub value: Value,
    pub segments: Vec<[usize; 2]>,
}

#[derive(Clone, Debug, Default)]
pub struct ContourResult {
    /// Filled bands; vertex values are pixel values or level values.
    pub mesh: IsoMesh,
    /// One entry per mesh vertex, in the same order.
    pub vertices: Vec<ContourVertex>,
    pub squares: Vec<ContourSquare>,
    pub levels: Vec<ContourLevel>,
}

#[derive(Clone, Debug, Default)]
pub struct ContourEngine {
    levels: ContourLevels,
    range: Option<(Value, Value)>,
}

impl ContourEngine {
    pub fn new(levels: ContourLevels) -> Self {
        Self {
            levels,
            range: None,
        }
    }

    /// Spreads counted levels over this range instead of the data range.
    pub fn with_range(mut self, range: Option<(Value, Value)>) -> Self {
        self.range = range;
        self
    }

    pub fn levels_for(&self, pixels: &PixelGrid) -> Vec<Value> {
        let (min, max) = self
            .range
            .map(|(a, b)| (a.min(b), a.max(b)))
            .or_else(|| pixels.range())
            .unwrap_or((-1.0, 1.0));
        self.levels.resolve(min, max)
    }

    pub fn run(&self, pixels: &PixelGrid) -> ContourResult {
        let levels = self.levels_for(pixels);
        debug!(?levels, "contour levels");
        let mut builder = Builder {
            pixels,
            levels: &levels,
            reverse: pixels.handedness() < 0.0,
            result: ContourResult {
                levels: levels
                    .iter()
                    .map(|&value| ContourLevel {
                        value,
                        segments: Vec::new(),
                    })
                    .collect(),
                ..ContourResult::default()
            },
            corner_vertices: Array2::from_elem(pixels.values.dim(), -1),
            flipped: 0,
        };

        let [np, nq] = pixels.dims();
        if np >= 2 && nq >= 2 && !levels.is_empty() {
            let empty = vec![[-1i32; 4]; levels.len()];
            let mut previous = vec![empty.clone(); nq - 1];
            let mut current = previous.clone();
            for p in 0..np - 1 {
                for q in 0..nq - 1 {
                    let crossings = builder.square(
                        [p, q],
                        (p > 0).then(|| previous[q].as_slice()),
                        (q > 0).then(|| current[q - 1].as_slice()),
                    );
                    current[q] = crossings.unwrap_or_else(|| empty.clone());
                }
                std::mem::swap(&mut previous, &mut current);
            }
        }

        let Builder {
            mut result,
            flipped,
            reverse,
            ..
        } = builder;
        result.mesh.create_normals(&[]);
        debug!(
            vertices = result.mesh.vertex_count(),
            triangles = result.mesh.triangle_count(),
            flipped,
            reverse,
            "contours finished"
        );
        result
    }
}

/// A node of the cell being filled: a square corner or a saddle center.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anchor {
    Corner(usize),
    Center,
}

#[derive(Clone, Copy, Debug)]
struct Node {
    pixel: [Value; 2],
    value: Value,
    anchor: Anchor,
}

/// Where a band polygon point comes from.
#[derive(Clone, Copy, Debug)]
enum Source {
    Node(Anchor),
    /// Where `level` crosses the cell edge between two nodes.
    Crossing { from: Anchor, to: Anchor, level: usize },
}

#[derive(Clone, Copy, Debug)]
struct PolyPoint {
    pixel: [Value; 2],
    value: Value,
    source: Source,
}

/// Bit `k` set when node `k` is at or above `level`.
fn node_mask(nodes: &[Node], level: Value) -> u8 {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.value >= level)
        .fold(0, |mask, (k, _)| mask | (1 << k))
}

/// Nodes inside band `band`, i.e. at or above its level and below the next.
///
/// Level masks are nested, so the XOR of consecutive masks leaves exactly
/// the band's nodes. The last band is open above.
fn band_nodes(masks: &[u8], band: usize) -> u8 {
    masks[band] ^ masks.get(band + 1).copied().unwrap_or(0)
}

/// The cached vertex id for a crossing on a square edge or a saddle spoke.
fn crossing_slot(square: &mut Square, from: Anchor, to: Anchor, level: usize) -> Option<&mut i32> {
    match (from, to) {
        (Anchor::Corner(a), Anchor::Corner(b)) => {
            let edge = if b == (a + 1) % 4 { a } else { b };
            Some(&mut square.crossings[level][edge])
        }
        (Anchor::Center, Anchor::Corner(c)) | (Anchor::Corner(c), Anchor::Center) => {
            Some(&mut square.spokes[level][c])
        }
        (Anchor::Center, Anchor::Center) => None,
    }
}

fn signed_area(a: [Value; 2], b: [Value; 2], c: [Value; 2]) -> Value {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

struct Builder<'a> {
    pixels: &'a PixelGrid,
    levels: &'a [Value],
    reverse: bool,
    result: ContourResult,
    corner_vertices: Array2<i32>,
    flipped: usize,
}

/// Per-square scratch state.
struct Square {
    at: [usize; 2],
    values: [Value; 4],
    crossings: Vec<[i32; 4]>,
    /// Crossings on the center-to-corner spokes of a saddle, per level.
    spokes: Vec<[i32; 4]>,
    center: Option<usize>,
}

impl Builder<'_> {
    fn add_vertex(&mut self, square: [usize; 2], pixel: [Value; 2], value: Value) -> usize {
        let (position, lattice) = self.pixels.locate(square, pixel);
        let vertex = self.result.mesh.add_vertex(position, value);
        self.result.vertices.push(ContourVertex {
            vertex,
            lattice,
            pixel,
        });
        vertex
    }

    fn corner_pixel(at: [usize; 2], corner: usize) -> [Value; 2] {
        let [dx, dy] = SQUARE_CORNERS[corner];
        [(at[0] + dx) as Value, (at[1] + dy) as Value]
    }

    /// Classifies square `at` at every level and triangulates its bands.
    ///
    /// `from_left` and `from_below` are the crossings already resolved by
    /// the squares at `p − 1` and `q − 1`. Returns this square's crossings,
    /// or `None` when a corner has no sample.
    fn square(
        &mut self,
        at: [usize; 2],
        from_left: Option<&[[i32; 4]]>,
        from_below: Option<&[[i32; 4]]>,
    ) -> Option<Vec<[i32; 4]>> {
        let [p, q] = at;
        let values = SQUARE_CORNERS.map(|[dx, dy]| self.pixels.values[[p + dx, q + dy]]);
        if values.iter().any(|v| v.is_nan()) {
            return None;
        }
        let center_value = bilinear(values[0], values[1], values[3], values[2], 0.5, 0.5);

        let mut square = Square {
            at,
            values,
            crossings: vec![[-1; 4]; self.levels.len()],
            spokes: vec![[-1; 4]; self.levels.len()],
            center: None,
        };
        let mut masks = Vec::with_capacity(self.levels.len());
        for (j, &level) in self.levels.iter().enumerate() {
            let mut mask = 0u8;
            for (c, &v) in values.iter().enumerate() {
                if v >= level {
                    mask |= 1 << c;
                }
            }
            masks.push(mask);
            let crossed = SQUARE_EDGES[mask as usize];
            let mut points = [-1i32; 4];
            if let Some(below) = from_below {
                points[0] = below[j][2];
            }
            if let Some(left) = from_left {
                points[3] = left[j][1];
            }
            for (e, point) in points.iter_mut().enumerate() {
                if crossed & (1 << e) == 0 {
                    *point = -1;
                } else if *point < 0 {
                    let (a, b) = (e, (e + 1) % 4);
                    let t = find_t(values[a], values[b], level);
                    let pa = Self::corner_pixel(at, a);
                    let pb = Self::corner_pixel(at, b);
                    let pixel = [lerp(pa[0], pb[0], t), lerp(pa[1], pb[1], t)];
                    *point = self.add_vertex(at, pixel, level) as i32;
                }
            }
            square.crossings[j] = points;
            self.record(&square, j, mask, center_value >= level);
        }

        let corners: [Node; 4] = std::array::from_fn(|c| Node {
            pixel: Self::corner_pixel(at, c),
            value: values[c],
            anchor: Anchor::Corner(c),
        });
        if masks.iter().any(|&m| is_saddle(m)) {
            let center = Node {
                pixel: [p as Value + 0.5, q as Value + 0.5],
                value: center_value,
                anchor: Anchor::Center,
            };
            for e in 0..4 {
                let triangle = [center, corners[e], corners[(e + 1) % 4]];
                let triangle_masks: Vec<u8> =
                    self.levels.iter().map(|&level| node_mask(&triangle, level)).collect();
                for band in 0..self.levels.len() {
                    self.fill_band(&mut square, &triangle, &triangle_masks, band);
                }
            }
        } else {
            for band in 0..self.levels.len() {
                self.fill_band(&mut square, &corners, &masks, band);
            }
        }
        Some(square.crossings)
    }

    fn record(&mut self, square: &Square, level: usize, mask: u8, center_inside: bool) {
        let class = match mask {
            0 => SquareClass::Outside,
            15 => SquareClass::Inside,
            _ => SquareClass::Through,
        };
        let points = square.crossings[level];
        self.result.squares.push(ContourSquare {
            square: square.at,
            level,
            mask,
            class,
            points,
        });
        let pairs: Vec<(usize, usize)> = if class != SquareClass::Through {
            Vec::new()
        } else if is_saddle(mask) {
            // Which opposite corners the level line cuts off depends on the center.
            if (mask == 5) == center_inside {
                vec![(0, 1), (2, 3)]
            } else {
                vec![(3, 0), (1, 2)]
            }
        } else {
            let crossed = SQUARE_EDGES[mask as usize];
            let edges: Vec<usize> = (0..4).filter(|e| crossed & (1 << e) != 0).collect();
            vec![(edges[0], edges[1])]
        };
        for (a, b) in pairs {
            if points[a] >= 0 && points[b] >= 0 {
                self.result.levels[level]
                    .segments
                    .push([points[a] as usize, points[b] as usize]);
            }
        }
    }

    fn resolve(&mut self, square: &mut Square, point: &PolyPoint) -> usize {
        match point.source {
            Source::Node(Anchor::Corner(c)) => {
                let [dx, dy] = SQUARE_CORNERS[c];
                let pixel = [square.at[0] + dx, square.at[1] + dy];
                let cached = self.corner_vertices[pixel];
                if cached >= 0 {
                    return cached as usize;
                }
                let vertex = self.add_vertex(square.at, point.pixel, square.values[c]);
                self.corner_vertices[pixel] = vertex as i32;
                vertex
            }
            Source::Node(Anchor::Center) => match square.center {
                Some(vertex) => vertex,
                None => {
                    let vertex = self.add_vertex(square.at, point.pixel, point.value);
                    square.center = Some(vertex);
                    vertex
                }
            },
            Source::Crossing { from, to, level } => {
                let at = square.at;
                let Some(slot) = crossing_slot(square, from, to, level) else {
                    return self.add_vertex(at, point.pixel, point.value);
                };
                if *slot >= 0 {
                    return *slot as usize;
                }
                let vertex = self.add_vertex(at, point.pixel, point.value);
                *slot = vertex as i32;
                vertex
            }
        }
    }

    /// Band `band` of the cell spanned by `nodes`, walked in edge order.
    ///
    /// Each node in the band is kept, and on each edge the crossings of the
    /// band's two levels are kept in the order the edge meets them.
    fn band_polygon(&self, nodes: &[Node], masks: &[u8], band: usize) -> Vec<PolyPoint> {
        let inside = band_nodes(masks, band);
        let n = nodes.len();
        let mut polygon = Vec::with_capacity(2 * n + 2);
        for (k, a) in nodes.iter().enumerate() {
            let next = (k + 1) % n;
            let b = &nodes[next];
            if inside & (1 << k) != 0 {
                polygon.push(PolyPoint {
                    pixel: a.pixel,
                    value: a.value,
                    source: Source::Node(a.anchor),
                });
            }
            let mut cuts: Vec<(Value, PolyPoint)> = Vec::with_capacity(2);
            for level in band..(band + 2).min(self.levels.len()) {
                let mask = masks[level];
                if (mask >> k) & 1 == (mask >> next) & 1 {
                    continue;
                }
                let value = self.levels[level];
                let t = find_t(a.value, b.value, value);
                cuts.push((
                    t,
                    PolyPoint {
                        pixel: [lerp(a.pixel[0], b.pixel[0], t), lerp(a.pixel[1], b.pixel[1], t)],
                        value,
                        source: Source::Crossing {
                            from: a.anchor,
                            to: b.anchor,
                            level,
                        },
                    },
                ));
            }
            cuts.sort_by(|x, y| x.0.total_cmp(&y.0));
            polygon.extend(cuts.into_iter().map(|(_, point)| point));
        }
        polygon
    }

    /// Triangulates one band of a cell as a fan in walk order, reversed when
    /// the walk turns out clockwise.
    fn fill_band(&mut self, square: &mut Square, nodes: &[Node], masks: &[u8], band: usize) {
        let polygon = self.band_polygon(nodes, masks, band);
        if polygon.len() < 3 {
            return;
        }
        let area: Value = (1..polygon.len() - 1)
            .map(|k| signed_area(polygon[0].pixel, polygon[k].pixel, polygon[k + 1].pixel))
            .sum();
        if area.abs() < 1e-9 {
            return;
        }
        let mut points: Vec<(usize, [Value; 2])> = polygon
            .iter()
            .map(|pt| (self.resolve(square, pt), pt.pixel))
            .collect();
        if area < 0.0 {
            self.flipped += 1;
            points.reverse();
        }
        for k in 1..points.len() - 1 {
            let (a, pa) = points[0];
            let (mut b, pb) = points[k];
            let (mut c, pc) = points[k + 1];
            if signed_area(pa, pb, pc).abs() < 1e-9 {
                continue;
            }
            if self.reverse {
                std::mem::swap(&mut b, &mut c);
            }
            self.result.mesh.tris.push([a, b, c]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: usize) -> VolumetricGrid {
        let max = (n - 1) as Value;
        VolumetricGrid::axis_aligned(Point::origin(), Point::new(max, max, max), [n, n, n]).unwrap()
    }

    fn ramp_pixels(n: usize) -> PixelGrid {
        let plane = Plane::new(0.0, 0.0, 1.0, -1.5).unwrap();
        PixelGrid::for_plane(&grid(n), &plane).evaluate(|p| p.x)
    }

    #[test]
    fn counted_levels_are_evenly_spaced_inside_the_range() {
        let levels = ContourLevels::Count(3).resolve(0.0, 4.0);
        assert_eq!(levels, vec![1.0, 2.0, 3.0]);
        assert_eq!(ContourLevels::default().resolve(0.0, 12.0).len(), 11);
    }

    #[test]
    fn levels_near_zero_are_nudged() {
        let levels = ContourLevels::Explicit(vec![0.5, 0.0, -0.00001]).resolve(-1.0, 1.0);
        assert_eq!(levels, vec![-ZERO_NUDGE, ZERO_NUDGE, 0.5]);
    }

    #[test]
    fn plane_pixels_sit_on_the_plane() {
        let pixels = ramp_pixels(4);
        assert_eq!(pixels.dims(), [4, 4]);
        let (lo, hi) = pixels.range().unwrap();
        assert_relative_eq!(lo, 0.0);
        assert_relative_eq!(hi, 3.0);
        let (position, lattice) = pixels.locate([1, 1], [1.5, 1.25]);
        assert_relative_eq!(position, Point::new(1.5, 1.25, 1.5), epsilon = 1e-5);
        assert_relative_eq!(lattice, Vector::new(1.5, 1.25, 1.5), epsilon = 1e-5);
    }

    #[test]
    fn slice_samples_interpolate_along_the_column() {
        let g = grid(3);
        let values = ndarray::Array3::from_shape_fn((3, 3, 3), |(x, _, z)| (x + 10 * z) as Value);
        let plane = Plane::new(0.0, 0.0, 1.0, -0.5).unwrap();
        let pixels = PixelGrid::for_plane(&g, &plane).sample_from(&values);
        assert_relative_eq!(pixels.values()[[2, 1]], 2.0 + 5.0);
    }

    #[test]
    fn straight_level_lines_on_a_ramp() {
        let pixels = ramp_pixels(4);
        let engine = ContourEngine::new(ContourLevels::Explicit(vec![0.5, 1.5, 2.5]));
        let result = engine.run(&pixels);
        assert_eq!(result.levels.len(), 3);
        for level in &result.levels {
            // one segment per row of squares
            assert_eq!(level.segments.len(), 3);
            for seg in &level.segments {
                for &v in seg {
                    assert_relative_eq!(result.mesh.vertices[v].x, level.value, epsilon = 1e-5);
                }
            }
        }
        // bands cover x in [0.5, 3]
        assert_relative_eq!(result.mesh.area(), 2.5 * 3.0, epsilon = 1e-4);
        assert!(result.mesh.check_indices().is_ok());
        assert_eq!(result.vertices.len(), result.mesh.vertex_count());
    }

    #[test]
    fn crossings_are_shared_between_squares() {
        let pixels = ramp_pixels(4);
        let result = ContourEngine::new(ContourLevels::Explicit(vec![1.5])).run(&pixels);
        // level x = 1.5 crosses the 4 horizontal pixel edges of that column once each
        let crossings = result
            .mesh
            .values
            .iter()
            .zip(&result.mesh.vertices)
            .filter(|(v, p)| **v == 1.5 && (p.x - 1.5).abs() < 1e-5)
            .count();
        assert_eq!(crossings, 4);
    }

    #[test]
    fn triangles_face_the_plane_normal() {
        let pixels = ramp_pixels(3);
        let result = ContourEngine::new(ContourLevels::Count(2)).run(&pixels);
        assert!(!result.mesh.is_empty());
        for t in 0..result.mesh.triangle_count() {
            assert!(result.mesh.tri_normal(t).z > 0.99);
        }
    }

    #[test]
    fn saddle_square_is_split_through_its_center() {
        let plane = Plane::new(0.0, 0.0, 1.0, -0.5).unwrap();
        let values = ndarray::Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let pixels = PixelGrid::for_plane(&grid(2), &plane).with_values(values).unwrap();
        let result = ContourEngine::new(ContourLevels::Explicit(vec![0.25])).run(&pixels);
        let square = result.squares[0];
        assert_eq!(square.mask, 5);
        assert_eq!(square.class, SquareClass::Through);
        // center value 0.5 is above the level, so the two low corners are cut off
        assert_eq!(result.levels[0].segments.len(), 2);
        let band_area = result.mesh.area();
        assert!(band_area > 0.5 && band_area < 1.0);
        for t in 0..result.mesh.triangle_count() {
            assert!(result.mesh.tri_normal(t).z > 0.0);
        }
    }

    #[test]
    fn band_corners_are_the_xor_of_adjacent_masks() {
        assert_eq!(band_nodes(&[0b0110, 0b0110], 0), 0);
        assert_eq!(band_nodes(&[0b0110, 0b0110], 1), 0b0110);
        assert_eq!(band_nodes(&[0b1111, 0b0010], 0), 0b1101);
        assert_eq!(band_nodes(&[0b1110, 0b1100, 0b1000], 1), 0b0100);
    }

    #[test]
    fn inner_band_without_corners_is_a_strip_between_two_levels() {
        let plane = Plane::new(0.0, 0.0, 1.0, -0.5).unwrap();
        // x ramp: corners 1 and 2 sit at 3, corners 0 and 3 at 0
        let values = ndarray::Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 3.0, 3.0]).unwrap();
        let pixels = PixelGrid::for_plane(&grid(2), &plane).with_values(values).unwrap();
        let result = ContourEngine::new(ContourLevels::Explicit(vec![1.0, 2.0])).run(&pixels);
        assert_eq!(result.squares[0].mask, 0b0110);
        assert_eq!(result.squares[1].mask, 0b0110);

        // corners below the first level never become vertices
        assert!(result.mesh.values.iter().all(|&v| v >= 1.0));
        let mut strip = 0.0;
        let mut top = 0.0;
        for t in 0..result.mesh.triangle_count() {
            let area = result.mesh.tri_area(t);
            if result.mesh.tris[t].iter().all(|&v| result.mesh.values[v] <= 2.0) {
                strip += area;
            } else {
                top += area;
            }
            assert!(result.mesh.tri_normal(t).z > 0.0);
        }
        // band 0 is x in [1/3, 2/3], band 1 is x in [2/3, 1]
        assert_relative_eq!(strip, 1.0 / 3.0, epsilon = 1e-5);
        assert_relative_eq!(top, 1.0 / 3.0, epsilon = 1e-5);
    }

    #[test]
    fn missing_pixels_skip_their_squares() {
        let plane = Plane::new(0.0, 0.0, 1.0, -10.0).unwrap();
        let pixels = PixelGrid::for_plane(&grid(3), &plane).evaluate(|p| p.x);
        assert!(pixels.range().is_none());
        let result = ContourEngine::default().run(&pixels);
        assert!(result.mesh.is_empty());
        assert!(result.squares.is_empty());
    }
}
