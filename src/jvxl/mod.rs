//! The JVXL exchange format: a cube-file header followed by one record per
//! surface, each holding run lengths, encoded edge fractions and encoded
//! vertex values instead of the full sample grid.
//!
//! ```text
//! title line 1
//! title line 2
//! -nAtoms  ox oy oz
//! -nx  vx vy vz                   negative counts: Angstroms
//! -ny  ...
//! -nz  ...
//! Z  charge  x y z                one line per atom
//! -nSurfaces  edgeBase edgeRange  colorBase colorRange
//! cutoff nRuns nEdgeChars nColorChars [a b c d nContours] dataMin dataMax red blue
//! run run run ...                 absent when nRuns is -1 (plane record)
//! compressed edge characters
//! compressed color characters
//! ```

mod compress;
mod fraction;
mod reader;
mod writer;

pub use compress::{compress, decompress};
pub use fraction::{DEFAULT_BASE, DEFAULT_RANGE, FractionCodec, char_to_fraction, fraction_to_char};
pub use reader::{DecodedFractions, JvxlDocument, JvxlReader};
pub use writer::JvxlWriter;

use std::fmt;

use crate::{
    error::{Result, SurfaceError},
    types::{Plane, Value},
};

/// Contents of a record's definition line.
#[derive(Clone, Debug, PartialEq)]
struct Definition {
    cutoff: Value,
    /// `None` marks a plane record.
    run_count: Option<usize>,
    edge_chars: usize,
    color_chars: usize,
    precise_colors: bool,
    plane: Option<(Plane, usize)>,
    data_range: (Value, Value),
    color_range: (Value, Value),
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let runs = self.run_count.map_or(-1, |n| n as i64);
        let colors = if self.precise_colors {
            -(self.color_chars as i64)
        } else {
            self.color_chars as i64
        };
        write!(f, "{} {runs} {} {colors}", self.cutoff, self.edge_chars)?;
        if let Some((plane, contours)) = &self.plane {
            write!(f, " {} {} {} {} {contours}", plane.a, plane.b, plane.c, plane.d)?;
        }
        write!(
            f,
            " {} {} {} {}",
            self.data_range.0, self.data_range.1, self.color_range.0, self.color_range.1
        )
    }
}

impl Definition {
    fn parse(line: &str, line_number: usize) -> Result<Self> {
        let error = |reason: &str| SurfaceError::data(line_number, reason);
        let fields: Vec<&str> = line.split_whitespace().collect();
        let number = |i: usize| -> Result<Value> {
            let token = fields
                .get(i)
                .ok_or_else(|| error("definition line is too short"))?;
            token
                .parse()
                .map_err(|_| SurfaceError::data(line_number, format!("cannot parse '{token}'")))
        };
        let count = |i: usize| -> Result<i64> {
            let value = number(i)?;
            if value.fract() != 0.0 {
                return Err(error("expected a whole number"));
            }
            Ok(value as i64)
        };

        let cutoff = number(0)?;
        let runs = count(1)?;
        let edge_chars = count(2)?;
        let colors = count(3)?;
        if edge_chars < 0 {
            return Err(error("negative edge character count"));
        }
        let (run_count, plane, rest) = if runs < 0 {
            let plane = Plane::new(number(4)?, number(5)?, number(6)?, number(7)?)
                .map_err(|_| error("malformed plane"))?;
            let contours = count(8)?.max(0) as usize;
            (None, Some((plane, contours)), 9)
        } else {
            (Some(runs as usize), None, 4)
        };
        Ok(Self {
            cutoff,
            run_count,
            edge_chars: edge_chars as usize,
            color_chars: colors.unsigned_abs() as usize,
            precise_colors: colors < 0,
            plane,
            data_range: (number(rest)?, number(rest + 1)?),
            color_range: (number(rest + 2)?, number(rest + 3)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_line_survives_a_round_trip() {
        let volume = Definition {
            cutoff: 0.05,
            run_count: Some(12),
            edge_chars: 340,
            color_chars: 220,
            precise_colors: true,
            plane: None,
            data_range: (-0.05, 0.05),
            color_range: (-1.0, 1.0),
        };
        let line = volume.to_string();
        assert_eq!(line, "0.05 12 340 -220 -0.05 0.05 -1 1");
        assert_eq!(Definition::parse(&line, 1).unwrap(), volume);

        let plane = Definition {
            run_count: None,
            precise_colors: false,
            color_chars: 0,
            plane: Some((Plane::new(0.0, 0.0, 1.0, -0.5).unwrap(), 9)),
            ..volume
        };
        let line = plane.to_string();
        assert!(line.starts_with("0.05 -1 340 0 0 0 1 -0.5 9 "));
        assert_eq!(Definition::parse(&line, 1).unwrap(), plane);
    }

    #[test]
    fn short_definition_is_a_data_error() {
        assert!(matches!(
            Definition::parse("0.1 3 5", 7),
            Err(SurfaceError::DataRead { line: 7, .. })
        ));
        assert!(Definition::parse("0.1 -1 5 0 0 0 0 0 3 0 1 0 1", 2).is_err());
    }
}
