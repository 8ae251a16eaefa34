//! Gaussian cube files and the line/token cursor shared with the JVXL reader.

use std::{collections::VecDeque, fmt, str::FromStr};

use ndarray::Array3;

use crate::{
    error::{Result, SurfaceError},
    grid::VolumetricGrid,
    types::{Atom, Point, Value, Vector},
};

use super::{GeneratedField, ScalarField};

pub const ANGSTROMS_PER_BOHR: Value = 0.529177;

/// Walks a text stream line by line or whitespace token by token, keeping
/// track of the line number for error messages.
pub(crate) struct LineCursor<'a> {
    lines: Vec<&'a str>,
    next: usize,
    tokens: VecDeque<&'a str>,
}

impl<'a> LineCursor<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            next: 0,
            tokens: VecDeque::new(),
        }
    }

    /// 1-based number of the line most recently read.
    pub(crate) fn line_number(&self) -> usize {
        self.next
    }

    pub(crate) fn error(&self, reason: impl Into<String>) -> SurfaceError {
        SurfaceError::data(self.line_number(), reason)
    }

    /// Drops any unread tokens and returns the next whole line.
    pub(crate) fn next_line(&mut self) -> Result<&'a str> {
        self.tokens.clear();
        let line = self
            .lines
            .get(self.next)
            .copied()
            .ok_or(SurfaceError::UnexpectedEndOfData)?;
        self.next += 1;
        Ok(line)
    }

    pub(crate) fn peek_line(&self) -> Option<&'a str> {
        if !self.tokens.is_empty() {
            return None;
        }
        self.lines.get(self.next).copied()
    }

    pub(crate) fn next_token(&mut self) -> Result<&'a str> {
        while self.tokens.is_empty() {
            let line = self.next_line()?;
            self.tokens.extend(line.split_whitespace());
        }
        self.tokens.pop_front().ok_or(SurfaceError::UnexpectedEndOfData)
    }

    pub(crate) fn next_value<T: FromStr>(&mut self) -> Result<T> {
        let token = self.next_token()?;
        parse_token(token, self.line_number())
    }

    /// Parses every whitespace-separated field of the next line.
    pub(crate) fn next_values<T: FromStr>(&mut self) -> Result<Vec<T>> {
        let line = self.next_line()?;
        let n = self.line_number();
        line.split_whitespace().map(|t| parse_token(t, n)).collect()
    }
}

fn parse_token<T: FromStr>(token: &str, line: usize) -> Result<T> {
    token
        .parse()
        .map_err(|_| SurfaceError::data(line, format!("cannot parse '{token}'")))
}

fn vdw_radius(element: u8) -> Value {
    match element {
        1 => 1.1,
        6 => 1.7,
        7 => 1.55,
        8 => 1.52,
        9 => 1.47,
        15 => 1.8,
        16 => 1.8,
        17 => 1.75,
        _ => 2.0,
    }
}

/// Everything before the data block of a cube or JVXL file.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeHeader {
    pub title: [String; 2],
    /// Always in Angstroms, whatever units the file used.
    pub grid: VolumetricGrid,
    pub atoms: Vec<Atom>,
    /// The atom count was written negative.
    pub extended: bool,
    /// Positive voxel counts: the file was in Bohr.
    pub bohr: bool,
    /// Orbital numbers listed after the atoms of a multi-orbital cube.
    pub orbital_indices: Vec<i32>,
}

impl CubeHeader {
    pub(crate) fn read(cursor: &mut LineCursor<'_>) -> Result<Self> {
        let title = [
            cursor.next_line()?.trim().to_string(),
            cursor.next_line()?.trim().to_string(),
        ];

        let line = cursor.next_line()?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let count_token = *fields
            .first()
            .ok_or_else(|| cursor.error("missing atom count"))?;
        let extended = count_token.starts_with('-');
        let atom_count = parse_token::<i64>(count_token, cursor.line_number())?.unsigned_abs() as usize;
        let origin: Vec<Value> = if fields.len() >= 4 {
            fields[1..4]
                .iter()
                .map(|t| parse_token(t, cursor.line_number()))
                .collect::<Result<_>>()?
        } else {
            cursor.next_values()?
        };
        if origin.len() < 3 {
            return Err(cursor.error("origin needs three coordinates"));
        }

        let mut counts = [0usize; 3];
        let mut vectors = [Vector::zeros(); 3];
        let mut bohr = false;
        for axis in 0..3 {
            let count: i64 = cursor.next_value()?;
            if axis == 0 {
                bohr = count > 0;
            }
            counts[axis] = count.unsigned_abs() as usize;
            for c in 0..3 {
                vectors[axis][c] = cursor.next_value()?;
            }
        }
        let unit = if bohr { ANGSTROMS_PER_BOHR } else { 1.0 };
        let origin = Point::new(origin[0], origin[1], origin[2]) * unit;
        let vectors = vectors.map(|v| v * unit);
        let grid = VolumetricGrid::new(origin, vectors, counts)
            .map_err(|_| cursor.error("voxel vectors are degenerate"))?;

        let mut atoms = Vec::with_capacity(atom_count);
        for _ in 0..atom_count {
            let fields: Vec<Value> = cursor.next_values()?;
            if fields.len() < 5 {
                return Err(cursor.error("atom line needs five fields"));
            }
            let element = fields[0].abs() as u8;
            let position = Point::new(fields[2], fields[3], fields[4]) * unit;
            atoms.push(Atom::new(element, position, vdw_radius(element)).with_charge(fields[1]));
        }

        let mut orbital_indices = Vec::new();
        if extended {
            if let Some(line) = cursor.peek_line() {
                if !line.trim_start().starts_with('-') {
                    let values: Vec<i32> = cursor.next_values()?;
                    orbital_indices = values.into_iter().skip(1).collect();
                }
            }
        }

        Ok(Self {
            title,
            grid,
            atoms,
            extended,
            bohr,
            orbital_indices,
        })
    }
}

/// A parsed cube file: header plus the first data set, indexed `[x][y][z]`.
#[derive(Clone, PartialEq)]
pub struct CubeData {
    pub header: CubeHeader,
    pub values: Array3<Value>,
}

impl fmt::Debug for CubeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CubeData")
            .field("title", &self.header.title)
            .field("counts", &self.header.grid.counts())
            .field("atoms", &self.header.atoms.len())
            .finish_non_exhaustive()
    }
}

impl CubeData {
    pub fn parse(text: &str) -> Result<Self> {
        let mut cursor = LineCursor::new(text);
        let header = CubeHeader::read(&mut cursor)?;
        Self::read_values(header, &mut cursor)
    }

    /// Reads the data block that follows an already parsed header.
    pub(crate) fn read_values(header: CubeHeader, cursor: &mut LineCursor<'_>) -> Result<Self> {
        let [nx, ny, nz] = header.grid.counts();
        let sets = header.orbital_indices.len().max(1);
        let mut values = Array3::zeros((nx, ny, nz));
        for value in values.iter_mut() {
            *value = cursor.next_value()?;
            for _ in 1..sets {
                cursor.next_value::<Value>()?;
            }
        }
        Ok(Self { header, values })
    }

    pub(super) fn generate(&self) -> GeneratedField {
        GeneratedField {
            title: self.header.title.clone(),
            grid: self.header.grid.clone(),
            field: ScalarField::Dense(self.values.clone()),
            atoms: self.header.atoms.clone(),
            transform: None,
        }
    }

    /// Trilinear resampling onto another grid.
    pub(super) fn resample_on(&self, grid: &VolumetricGrid) -> ScalarField {
        let own = ScalarField::Dense(self.values.clone());
        ScalarField::fill(grid, |p| own.sample(&self.header.grid.world_to_lattice(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CUBE: &str = "\
test cube
generated by hand
    1    0.000000    0.000000    0.000000
    2    1.000000    0.000000    0.000000
    2    0.000000    1.000000    0.000000
    3    0.000000    0.000000    1.000000
    8    0.000000    0.000000    0.000000    0.000000
 1.0 2.0 3.0
 4.0 5.0 6.0
 7.0 8.0 9.0 10.0 11.0 12.0
";

    #[test]
    fn parses_bohr_cube() {
        let cube = CubeData::parse(CUBE).unwrap();
        assert!(cube.header.bohr);
        assert!(!cube.header.extended);
        assert_eq!(cube.header.grid.counts(), [2, 2, 3]);
        assert_relative_eq!(cube.header.grid.lengths()[0], ANGSTROMS_PER_BOHR);
        assert_eq!(cube.header.atoms[0].element, 8);
        assert_relative_eq!(cube.values[[0, 0, 2]], 3.0);
        assert_relative_eq!(cube.values[[1, 1, 2]], 12.0);
    }

    #[test]
    fn reads_first_orbital_of_multi_orbital_cube() {
        let text = "\
mo cube
two orbitals
   -1    0.0 0.0 0.0
   -2    1.0 0.0 0.0
   -1    0.0 1.0 0.0
   -1    0.0 0.0 1.0
    1    0.0 0.0 0.0 0.0
    2    5 6
 0.1 -0.1 0.2 -0.2
";
        let cube = CubeData::parse(text).unwrap();
        assert!(cube.header.extended);
        assert!(!cube.header.bohr);
        assert_eq!(cube.header.orbital_indices, vec![5, 6]);
        assert_relative_eq!(cube.values[[1, 0, 0]], 0.2);
    }

    #[test]
    fn origin_may_sit_on_its_own_line() {
        let text = "a\nb\n-0\n0.5 0.5 0.5\n-2 1 0 0\n-2 0 1 0\n-2 0 0 1\n";
        let mut cursor = LineCursor::new(text);
        let header = CubeHeader::read(&mut cursor).unwrap();
        assert!(header.extended);
        assert!(header.atoms.is_empty());
        assert_relative_eq!(header.grid.origin().x, 0.5);
    }

    #[test]
    fn truncated_data_is_an_error() {
        let truncated = &CUBE[..CUBE.len() - 12];
        assert!(CubeData::parse(truncated).is_err());
    }

    #[test]
    fn bad_number_reports_the_line() {
        let text = CUBE.replace("4.0 5.0", "4.0 x.0");
        match CubeData::parse(&text) {
            Err(SurfaceError::DataRead { line, .. }) => assert_eq!(line, 9),
            other => panic!("expected a data error, got {other:?}"),
        }
    }
}
