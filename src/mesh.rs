use crate::{
    error::{Result, SurfaceError},
    types::{Point, Value, Vector},
};

/// Shared-vertex triangle mesh produced by the extractors.
///
/// Vertices are never removed once added; a vertex that should not be drawn
/// is flagged in [`valid`](IsoMesh::valid) instead, so triangle indices and
/// the per-vertex data of an encoded stream stay aligned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IsoMesh {
    /// Vertex positions.
    pub vertices: Vec<Point>,

    /// Scalar value carried by each vertex (surface value, contour level or mapped data).
    pub values: Vec<Value>,

    /// `false` for vertices that are kept only for index stability.
    pub valid: Vec<bool>,

    /// Triangle index triples into `vertices`.
    pub tris: Vec<[usize; 3]>,

    /// Per-vertex unit normals, empty until [`create_normals`](IsoMesh::create_normals) runs.
    pub normals: Vec<Vector>,
}

impl IsoMesh {
    /// Creates an empty mesh with no vertices, triangles, or normals.
    pub fn new_empty() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.tris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tris.is_empty()
    }

    /// Appends a vertex and returns its index.
    pub fn add_vertex(&mut self, point: Point, value: Value) -> usize {
        self.vertices.push(point);
        self.values.push(value);
        self.valid.push(true);
        self.vertices.len() - 1
    }

    /// Adds a triangle defined by three vertex indices.
    ///
    /// Returns [`SurfaceError::InvalidTriangle`] if any index is out of bounds.
    pub fn triangle_from_verts(&mut self, a: usize, b: usize, c: usize) -> Result<()> {
        let index = a.max(b.max(c));
        if self.vertices.len() <= index {
            return Err(SurfaceError::InvalidTriangle {
                index,
                vertex_count: self.vertices.len(),
            });
        }
        self.tris.push([a, b, c]);
        Ok(())
    }

    /// Checks that every triangle index is below the vertex count.
    pub fn check_indices(&self) -> Result<()> {
        let vertex_count = self.vertices.len();
        match self.tris.iter().flatten().find(|&&i| i >= vertex_count) {
            Some(&index) => Err(SurfaceError::InvalidTriangle {
                index,
                vertex_count,
            }),
            None => Ok(()),
        }
    }

    /// Returns the three vertex positions of triangle `tri`.
    pub fn tri_coords(&self, tri: usize) -> [Point; 3] {
        self.tris[tri].map(|i| self.vertices[i])
    }

    /// Area-weighted normal of triangle `tri` (length = twice its area).
    fn tri_cross(&self, tri: usize) -> Vector {
        let [a, b, c] = self.tri_coords(tri);
        (b - a).cross(&(c - b))
    }

    /// Computes the face normal for triangle `tri`.
    ///
    /// Returns the zero vector if the triangle is degenerate.
    pub fn tri_normal(&self, tri: usize) -> Vector {
        let cross = self.tri_cross(tri);
        let nrm = cross.norm();
        if nrm == 0.0 {
            Vector::zeros()
        } else {
            cross / nrm
        }
    }

    pub fn tri_area(&self, tri: usize) -> Value {
        self.tri_cross(tri).norm() * 0.5
    }

    /// Total surface area.
    pub fn area(&self) -> Value {
        (0..self.tris.len()).map(|t| self.tri_area(t)).sum()
    }

    /// Axis-aligned bounds of the valid vertices.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let mut points = self
            .vertices
            .iter()
            .zip(&self.valid)
            .filter(|(p, valid)| **valid && p.iter().all(|c| c.is_finite()))
            .map(|(p, _)| p);
        let first = *points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| (lo.inf(p), hi.sup(p))))
    }

    /// Computes smooth per-vertex normals, replacing any stored ones.
    ///
    /// Each vertex gets the area-weighted sum of its faces' normals. Vertices
    /// listed together in one of `groups` then share the sum over the whole
    /// group, which hides seams between vertices that nearly coincide.
    /// Vertices without any face fall back to a zero normal.
    pub fn create_normals(&mut self, groups: &[Vec<usize>]) {
        let mut sums = vec![Vector::zeros(); self.vertices.len()];
        for tri in 0..self.tris.len() {
            let n = self.tri_cross(tri);
            for &i in &self.tris[tri] {
                sums[i] += n;
            }
        }
        for group in groups.iter().filter(|g| g.len() > 1) {
            let shared: Vector = group.iter().map(|&i| sums[i]).sum();
            for &i in group {
                sums[i] = shared;
            }
        }
        self.normals = sums
            .into_iter()
            .map(|n| {
                let nrm = n.norm();
                if nrm > 0.0 { n / nrm } else { n }
            })
            .collect();
    }

    /// Flags vertices for which `predicate(value)` holds as invalid.
    pub fn invalidate_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(Value) -> bool,
    {
        let mut count = 0;
        for (valid, &value) in self.valid.iter_mut().zip(&self.values) {
            if *valid && predicate(value) {
                *valid = false;
                count += 1;
            }
        }
        count
    }

    /// Flips every triangle and normal.
    pub fn reverse_winding(&mut self) {
        for tri in &mut self.tris {
            tri.swap(1, 2);
        }
        for n in &mut self.normals {
            *n = -*n;
        }
    }

    /// Appends `other`, shifting its triangle indices.
    pub fn append(&mut self, other: IsoMesh) {
        let offset = self.vertices.len();
        self.vertices.extend(other.vertices);
        self.values.extend(other.values);
        self.valid.extend(other.valid);
        self.tris
            .extend(other.tris.into_iter().map(|t| t.map(|i| i + offset)));
        self.normals.extend(other.normals);
    }
}
