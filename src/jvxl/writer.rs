use std::io::Write;

use tracing::debug;

use crate::{
    contour::ContourLevels,
    error::{Result, SurfaceError},
    surface::{Extraction, Surface},
    types::Value,
};

use super::{
    Definition,
    compress::compress,
    fraction::{FractionCodec, to_fraction},
};

const RUNS_PER_LINE: usize = 20;

/// Serializes surfaces into a JVXL stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JvxlWriter {
    edge: FractionCodec,
    color: FractionCodec,
    precise_colors: bool,
}

impl JvxlWriter {
    pub fn new(edge: FractionCodec, color: FractionCodec) -> Self {
        Self {
            edge,
            color,
            precise_colors: false,
        }
    }

    /// Two characters per vertex value instead of one.
    pub fn with_precise_colors(mut self, precise_colors: bool) -> Self {
        self.precise_colors = precise_colors;
        self
    }

    pub fn write(&self, surface: &Surface) -> Result<String> {
        self.write_all([surface])
    }

    /// One stream holding every surface; they must share a grid.
    pub fn write_all<'s, I>(&self, surfaces: I) -> Result<String>
    where
        I: IntoIterator<Item = &'s Surface>,
    {
        let mut out = Vec::new();
        self.write_to(surfaces, &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn write_to<'s, I, W>(&self, surfaces: I, out: &mut W) -> Result<()>
    where
        I: IntoIterator<Item = &'s Surface>,
        W: Write,
    {
        let surfaces: Vec<&Surface> = surfaces.into_iter().collect();
        let first = surfaces.first().ok_or(SurfaceError::NoSurfaces)?;
        if surfaces.iter().any(|s| s.grid != first.grid) {
            return Err(SurfaceError::InvalidGrid);
        }
        write_header(first, out)?;
        writeln!(
            out,
            "-{} {} {} {} {}",
            surfaces.len(),
            self.edge.base,
            self.edge.range,
            self.color.base,
            self.color.range
        )?;
        for surface in surfaces {
            self.write_record(surface, out)?;
        }
        Ok(())
    }

    fn write_record<W: Write>(&self, surface: &Surface, out: &mut W) -> Result<()> {
        let (runs, edges, colors, plane) = match &surface.extraction {
            Extraction::Volume {
                runs, fractions, ..
            } => {
                let edges: String = fractions.iter().map(|&f| self.edge.encode(f)).collect();
                (Some(runs.as_slice()), edges, self.encode_colors(surface), None)
            }
            Extraction::Contour { pixels, levels, .. } => {
                let plane = surface.plane.ok_or(SurfaceError::InvalidPlane)?;
                let contours = match levels {
                    ContourLevels::Count(n) => *n,
                    ContourLevels::Explicit(values) => values.len(),
                };
                let edges = self.edge.encode_precise(
                    pixels
                        .values()
                        .iter()
                        .map(|&v| to_fraction(v, surface.data_range)),
                );
                (None, edges, String::new(), Some((plane, contours)))
            }
        };

        let definition = Definition {
            cutoff: surface.cutoff(),
            run_count: runs.map(<[usize]>::len),
            edge_chars: edges.chars().count(),
            color_chars: colors.chars().count(),
            precise_colors: self.precise_colors && !colors.is_empty(),
            plane,
            data_range: surface.data_range,
            color_range: surface.color_range,
        };
        writeln!(out, "{definition}")?;
        if let Some(runs) = runs {
            for chunk in runs.chunks(RUNS_PER_LINE) {
                let line: Vec<String> = chunk.iter().map(usize::to_string).collect();
                writeln!(out, "{}", line.join(" "))?;
            }
        }
        let edges = compress(&edges);
        let colors = compress(&colors);
        debug!(
            edge_chars = definition.edge_chars,
            compressed = edges.len(),
            color_chars = definition.color_chars,
            "jvxl record written"
        );
        writeln!(out, "{edges}")?;
        writeln!(out, "{colors}")?;
        Ok(())
    }

    /// Vertex values as fractions of the data range; invalid vertices as NaN.
    fn encode_colors(&self, surface: &Surface) -> String {
        let mesh = &surface.mesh;
        let fractions = mesh.values.iter().zip(&mesh.valid).map(|(&v, &valid)| {
            if valid {
                to_fraction(v, surface.data_range)
            } else {
                Value::NAN
            }
        });
        if self.precise_colors {
            self.color.encode_precise(fractions)
        } else {
            fractions.map(|f| self.color.encode(f)).collect()
        }
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

fn write_header<W: Write>(surface: &Surface, out: &mut W) -> Result<()> {
    let grid = &surface.grid;
    writeln!(out, "{}", single_line(&surface.title[0]))?;
    writeln!(out, "{}", single_line(&surface.title[1]))?;
    let o = grid.origin();
    writeln!(
        out,
        "-{} {:.6} {:.6} {:.6}",
        surface.atoms.len(),
        o.x,
        o.y,
        o.z
    )?;
    for (count, v) in grid.counts().iter().zip(grid.vectors()) {
        writeln!(out, "-{count} {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
    }
    for atom in &surface.atoms {
        let p = atom.position;
        writeln!(
            out,
            "{} {:.6} {:.6} {:.6} {:.6}",
            atom.element, atom.charge, p.x, p.y, p.z
        )?;
    }
    Ok(())
}
