//! Per-vertex coloring: sign, orbital phase, or a continuous ramp.

use std::str::FromStr;

use crate::{
    error::{Result, SurfaceError},
    grid::CalculationTransform,
    interp::{lerp, remap},
    mesh::IsoMesh,
    surface::value_range,
    types::{Rgba, Value, Vector},
};

pub const RED: Rgba = [1.0, 0.0, 0.0, 1.0];
pub const BLUE: Rgba = [0.0, 0.0, 1.0, 1.0];

/// Angular sign function used to color orbital lobes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseFunction {
    S,
    X,
    Y,
    Z,
    Xy,
    Yz,
    Xz,
    X2MinusY2,
    Z2,
}

impl PhaseFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::S => "s",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::Xy => "xy",
            Self::Yz => "yz",
            Self::Xz => "xz",
            Self::X2MinusY2 => "x2-y2",
            Self::Z2 => "z2",
        }
    }

    /// Raw value of the angular function at `v`.
    pub fn evaluate(&self, v: &Vector) -> Value {
        let (x, y, z) = (v.x, v.y, v.z);
        match self {
            Self::S => 1.0,
            Self::X => x,
            Self::Y => y,
            Self::Z => z,
            Self::Xy => x * y,
            Self::Yz => y * z,
            Self::Xz => x * z,
            Self::X2MinusY2 => x * x - y * y,
            Self::Z2 => 2.0 * z * z - x * x - y * y,
        }
    }

    /// `+1` or `-1`; zero counts as positive.
    pub fn sign(&self, v: &Vector) -> Value {
        if self.evaluate(v) < 0.0 { -1.0 } else { 1.0 }
    }
}

impl FromStr for PhaseFunction {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "s" => Self::S,
            "x" | "px" => Self::X,
            "y" | "py" => Self::Y,
            "z" | "pz" => Self::Z,
            "xy" | "dxy" => Self::Xy,
            "yz" | "dyz" => Self::Yz,
            "xz" | "dxz" => Self::Xz,
            "x2-y2" | "dx2-y2" => Self::X2MinusY2,
            "z2" | "dz2" => Self::Z2,
            _ => return Err(SurfaceError::UnknownColorScheme(s.to_string())),
        })
    }
}

/// Named color ramps; the first stop is the "red" end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ramp {
    #[default]
    Roygb,
    Bwr,
    Rwb,
    Low,
    High,
    Bw,
    Wb,
}

impl Ramp {
    pub fn stops(&self) -> &'static [[f32; 3]] {
        const R: [f32; 3] = [1.0, 0.0, 0.0];
        const O: [f32; 3] = [1.0, 0.5, 0.0];
        const Y: [f32; 3] = [1.0, 1.0, 0.0];
        const G: [f32; 3] = [0.0, 1.0, 0.0];
        const C: [f32; 3] = [0.0, 1.0, 1.0];
        const B: [f32; 3] = [0.0, 0.0, 1.0];
        const W: [f32; 3] = [1.0, 1.0, 1.0];
        const K: [f32; 3] = [0.0, 0.0, 0.0];
        match self {
            Self::Roygb => &[R, O, Y, G, B],
            Self::Bwr => &[B, W, R],
            Self::Rwb => &[R, W, B],
            Self::Low => &[R, Y, G],
            Self::High => &[G, C, B],
            Self::Bw => &[K, W],
            Self::Wb => &[W, K],
        }
    }

    /// Color at `f` in `[0, 1]`, interpolating between stops.
    pub fn at(&self, f: Value) -> Rgba {
        let stops = self.stops();
        let x = f.clamp(0.0, 1.0) * (stops.len() - 1) as Value;
        let i = (x.floor() as usize).min(stops.len() - 2);
        let t = x - i as Value;
        let [a, b] = [stops[i], stops[i + 1]];
        [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t), 1.0]
    }
}

impl FromStr for Ramp {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "roygb" | "rgb" => Self::Roygb,
            "bwr" => Self::Bwr,
            "rwb" => Self::Rwb,
            "low" => Self::Low,
            "high" => Self::High,
            "bw" => Self::Bw,
            "wb" => Self::Wb,
            _ => return Err(SurfaceError::UnknownColorScheme(s.to_string())),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ColorScheme {
    /// Fixed colors by the sign of the vertex value.
    Bicolor { negative: Rgba, positive: Rgba },
    /// Fixed colors by the sign of an angular function at the vertex pre-image.
    Phase {
        function: PhaseFunction,
        negative: Rgba,
        positive: Rgba,
    },
    Ramp { ramp: Ramp, reversed: bool },
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::Ramp {
            ramp: Ramp::Roygb,
            reversed: false,
        }
    }
}

impl ColorScheme {
    pub fn bicolor() -> Self {
        Self::Bicolor {
            negative: RED,
            positive: BLUE,
        }
    }

    pub fn phase(function: PhaseFunction) -> Self {
        Self::Phase {
            function,
            negative: RED,
            positive: BLUE,
        }
    }
}

/// Parses `"sign"`, `"bicolor"`, `"phase [function]"` or a ramp name,
/// optionally preceded by `"reverse"`.
impl FromStr for ColorScheme {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split_whitespace();
        let mut first = tokens
            .next()
            .ok_or_else(|| SurfaceError::UnknownColorScheme(s.to_string()))?;
        let reversed = first.eq_ignore_ascii_case("reverse");
        if reversed {
            first = tokens
                .next()
                .ok_or_else(|| SurfaceError::UnknownColorScheme(s.to_string()))?;
        }
        match first.to_ascii_lowercase().as_str() {
            "sign" | "bicolor" => Ok(Self::bicolor()),
            "phase" => {
                let function = tokens.next().map(str::parse).transpose()?;
                Ok(Self::phase(function.unwrap_or(PhaseFunction::S)))
            }
            name => Ok(Self::Ramp {
                ramp: name.parse()?,
                reversed,
            }),
        }
    }
}

/// Turns vertex values into colors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorMapper {
    scheme: ColorScheme,
    /// Values mapped to the ramp's first and last stop.
    range: Option<(Value, Value)>,
}

impl ColorMapper {
    pub fn new(scheme: ColorScheme) -> Self {
        Self {
            scheme,
            range: None,
        }
    }

    pub fn with_range(mut self, range: Option<(Value, Value)>) -> Self {
        self.range = range;
        self
    }

    pub fn scheme(&self) -> &ColorScheme {
        &self.scheme
    }

    /// The explicit range, else min/max over the valid vertex values, else `[-1, 1]`.
    pub fn resolve_range(&self, mesh: &IsoMesh) -> (Value, Value) {
        if let Some(range) = self.range {
            return range;
        }
        match value_range(mesh) {
            Some((lo, hi)) if lo != 0.0 || hi != 0.0 => (lo, hi),
            _ => (-1.0, 1.0),
        }
    }

    /// Color for a value, given the resolved `(red, blue)` range.
    pub fn color_value(&self, value: Value, (red, blue): (Value, Value)) -> Rgba {
        match &self.scheme {
            ColorScheme::Bicolor { negative, positive }
            | ColorScheme::Phase {
                negative, positive, ..
            } => {
                if value < 0.0 {
                    *negative
                } else {
                    *positive
                }
            }
            ColorScheme::Ramp { ramp, reversed } => {
                let f = if red == blue {
                    0.5
                } else {
                    remap(value, [red, blue], [0.0, 1.0])
                };
                let f = if *reversed { 1.0 - f } else { f };
                ramp.at(f)
            }
        }
    }

    fn invalid_color(&self) -> Rgba {
        let mut color = match &self.scheme {
            ColorScheme::Bicolor { negative, .. } | ColorScheme::Phase { negative, .. } => {
                *negative
            }
            ColorScheme::Ramp { ramp, reversed } => ramp.at(if *reversed { 1.0 } else { 0.0 }),
        };
        color[3] = 0.0;
        color
    }

    /// One color per mesh vertex.
    ///
    /// Phase coloring evaluates its function at each vertex mapped back
    /// through `transform`, so it follows the shape rather than the grid.
    pub fn color_mesh(&self, mesh: &IsoMesh, transform: Option<&CalculationTransform>) -> Vec<Rgba> {
        let range = self.resolve_range(mesh);
        let invalid = self.invalid_color();
        mesh.vertices
            .iter()
            .zip(&mesh.values)
            .zip(&mesh.valid)
            .map(|((p, &value), &valid)| {
                if !valid {
                    return invalid;
                }
                match &self.scheme {
                    ColorScheme::Phase { function, .. } => {
                        let v = match transform {
                            Some(t) => t.to_calculation(p),
                            None => p.coords,
                        };
                        self.color_value(function.sign(&v), range)
                    }
                    _ => self.color_value(value, range),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use approx::assert_relative_eq;

    fn mesh_with_values(values: &[Value]) -> IsoMesh {
        let mut mesh = IsoMesh::new_empty();
        for (i, &v) in values.iter().enumerate() {
            mesh.add_vertex(Point::new(i as Value, 0.0, 0.0), v);
        }
        mesh
    }

    #[test]
    fn ramp_ends_are_red_and_blue() {
        let mapper = ColorMapper::default().with_range(Some((0.0, 10.0)));
        let range = (0.0, 10.0);
        assert_eq!(mapper.color_value(0.0, range), RED);
        assert_eq!(mapper.color_value(10.0, range), BLUE);
        assert_eq!(mapper.color_value(-5.0, range), RED);
        let mid = mapper.color_value(5.0, range);
        assert_relative_eq!(mid[1], 1.0);
    }

    #[test]
    fn reversed_ramp_mirrors() {
        let mapper = ColorMapper::new("reverse roygb".parse().unwrap());
        assert_eq!(mapper.color_value(0.0, (0.0, 1.0)), BLUE);
    }

    #[test]
    fn range_falls_back_to_unit_interval() {
        let mapper = ColorMapper::default();
        assert_eq!(mapper.resolve_range(&mesh_with_values(&[0.0, 0.0])), (-1.0, 1.0));
        assert_eq!(mapper.resolve_range(&IsoMesh::new_empty()), (-1.0, 1.0));
        let mut mesh = mesh_with_values(&[-2.0, 3.0, 100.0]);
        mesh.valid[2] = false;
        assert_eq!(mapper.resolve_range(&mesh), (-2.0, 3.0));
    }

    #[test]
    fn bicolor_splits_on_sign() {
        let mapper = ColorMapper::new(ColorScheme::bicolor());
        let colors = mapper.color_mesh(&mesh_with_values(&[-0.1, 0.0, 0.2]), None);
        assert_eq!(colors, vec![RED, BLUE, BLUE]);
    }

    #[test]
    fn phase_follows_pre_image() {
        let mapper = ColorMapper::new("phase x2-y2".parse().unwrap());
        let mut mesh = IsoMesh::new_empty();
        mesh.add_vertex(Point::new(2.0, 0.0, 0.0), 0.1);
        mesh.add_vertex(Point::new(0.0, 2.0, 0.0), 0.1);
        assert_eq!(mapper.color_mesh(&mesh, None), vec![BLUE, RED]);

        // Centered at x = 3 the pre-images are (-1, 0) and (-3, 2), both in the x lobe.
        let transform = CalculationTransform::centered(Point::new(3.0, 0.0, 0.0));
        assert_eq!(mapper.color_mesh(&mesh, Some(&transform)), vec![BLUE, BLUE]);
    }

    #[test]
    fn z2_phase_matches_dz2_lobes() {
        assert_eq!(PhaseFunction::Z2.sign(&Vector::new(0.0, 0.0, 1.0)), 1.0);
        assert_eq!(PhaseFunction::Z2.sign(&Vector::new(1.0, 0.0, 0.0)), -1.0);
        assert_eq!(PhaseFunction::Xy.sign(&Vector::zeros()), 1.0);
    }

    #[test]
    fn invalid_vertices_are_transparent() {
        let mapper = ColorMapper::default();
        let mut mesh = mesh_with_values(&[1.0, 2.0]);
        mesh.valid[0] = false;
        let colors = mapper.color_mesh(&mesh, None);
        assert_eq!(colors[0][3], 0.0);
        assert_eq!(colors[1][3], 1.0);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!("plaid".parse::<ColorScheme>().is_err());
        assert!("phase q".parse::<ColorScheme>().is_err());
        assert!(matches!(
            "".parse::<ColorScheme>(),
            Err(SurfaceError::UnknownColorScheme(_))
        ));
    }
}
