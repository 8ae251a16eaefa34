use crate::{
    color::ColorMapper,
    contour::{ContourLevel, ContourLevels, ContourVertex, PixelGrid},
    error::Result,
    field::ScalarField,
    grid::{CalculationTransform, VolumetricGrid},
    jvxl::JvxlWriter,
    marching_cubes::CellCounts,
    mesh::IsoMesh,
    types::{Atom, CutoffPolicy, Plane, Rgba, Value},
};

/// Below this a mapped value counts as zero for [`Surface::invalidate_near_zero`].
pub const NEAR_ZERO: Value = 1e-5;

/// What the extractor left behind besides the mesh; this is what gets encoded.
#[derive(Clone, Debug)]
pub enum Extraction {
    Volume {
        /// Outside/inside run lengths over the lattice, starting outside.
        runs: Vec<usize>,
        /// Crossing fraction per resolved edge in vertex order, NaN if failed.
        fractions: Vec<Value>,
        cells: CellCounts,
    },
    Contour {
        pixels: PixelGrid,
        levels: ContourLevels,
        lines: Vec<ContourLevel>,
        vertices: Vec<ContourVertex>,
    },
}

/// A finished iso-surface or plane contour map, ready for rendering or encoding.
#[derive(Debug)]
pub struct Surface {
    pub title: [String; 2],
    pub atoms: Vec<Atom>,
    pub grid: VolumetricGrid,
    pub policy: CutoffPolicy,
    /// Set for contour maps.
    pub plane: Option<Plane>,
    pub mesh: IsoMesh,
    /// One color per mesh vertex.
    pub colors: Vec<Rgba>,
    pub mapper: ColorMapper,
    /// Range of the values the surface carries: vertex values, or pixel values for contours.
    pub data_range: (Value, Value),
    /// Values mapped to the two ends of the color scheme.
    pub color_range: (Value, Value),
    pub extraction: Extraction,
    /// The sampled field, kept only when the request asked for it.
    pub field: Option<ScalarField>,
    /// Inverse mapping for phase coloring of parametric shapes.
    pub transform: Option<CalculationTransform>,
}

impl Surface {
    pub fn cutoff(&self) -> Value {
        self.policy.cutoff
    }

    pub fn is_contour(&self) -> bool {
        matches!(self.extraction, Extraction::Contour { .. })
    }

    /// Recomputes colors and the color range from the current vertex values.
    pub fn recolor(&mut self) {
        self.color_range = self.mapper.resolve_range(&self.mesh);
        self.colors = self.mapper.color_mesh(&self.mesh, self.transform.as_ref());
    }

    /// Replaces each vertex value with `field` sampled at the vertex, then recolors.
    ///
    /// `field` must be laid out on this surface's grid.
    pub fn map_values_from(&mut self, field: &ScalarField) {
        for (value, p) in self.mesh.values.iter_mut().zip(&self.mesh.vertices) {
            *value = field.sample(&self.grid.world_to_lattice(p));
        }
        self.data_range = value_range(&self.mesh).unwrap_or(self.data_range);
        self.recolor();
    }

    /// Marks vertices whose value is within [`NEAR_ZERO`] of zero as invalid.
    pub fn invalidate_near_zero(&mut self) -> usize {
        let count = self.mesh.invalidate_where(|v| v.abs() < NEAR_ZERO);
        if count > 0 {
            self.recolor();
        }
        count
    }

    /// Encodes this surface alone as a JVXL stream.
    pub fn to_jvxl(&self) -> Result<String> {
        JvxlWriter::default().write(self)
    }
}

/// Minimum and maximum over the valid, finite vertex values.
pub(crate) fn value_range(mesh: &IsoMesh) -> Option<(Value, Value)> {
    mesh.values
        .iter()
        .zip(&mesh.valid)
        .filter(|(v, valid)| **valid && v.is_finite())
        .fold(None, |range, (&v, _)| match range {
            Some((lo, hi)) => Some((v.min(lo), v.max(hi))),
            None => Some((v, v)),
        })
}
