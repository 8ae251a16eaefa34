use crate::{
    tables::{CORNER_OFFSETS, CORNER_POINT_INDICES, TRI_TABLE},
    types::{CutoffPolicy, Value},
};

/// Edge triples of the triangles for a marching cubes `state`.
///
/// `TRI_TABLE[state]` contains edge indices in groups of three, terminated by `-1`:
/// ```text
/// TRI_TABLE[state] = [e0, e1, e2,  e3, e4, e5,  -1, ...]
///                     \___tri0__/   \___tri1__/
/// ```
#[inline]
pub fn triangle_edges(state: usize) -> impl Iterator<Item = [usize; 3]> {
    let row = TRI_TABLE[state];
    let len = row.iter().take_while(|&&e| e != -1).count();
    (0..len / 3).map(move |t| {
        [
            row[3 * t] as usize,
            row[3 * t + 1] as usize,
            row[3 * t + 2] as usize,
        ]
    })
}

/// Lattice coordinates of the 8 corners of the cell whose minimum corner is `(x, y, z)`.
///
/// ```text
///     7----6          Y
///    /|   /|          |
///   3----2 |          *-- X
///   | 4--|-5         /
///   |/   |/         Z
///   0----1
/// ```
#[inline]
pub fn corner_lattice(x: usize, y: usize, z: usize) -> [[usize; 3]; 8] {
    CORNER_OFFSETS.map(|[dx, dy, dz]| [x + dx, y + dy, z + dz])
}

/// Lattice coordinates of both ends of `edge` in the cell at `(x, y, z)`.
#[inline]
pub fn edge_endpoints(x: usize, y: usize, z: usize, edge: usize) -> [[usize; 3]; 2] {
    let corners = corner_lattice(x, y, z);
    let [a, b] = CORNER_POINT_INDICES[edge];
    [corners[a], corners[b]]
}

/// Computes the marching cubes state bitmask for a cell.
///
/// Each of the 8 corners maps to one bit, set when the corner is inside
/// under `policy`:
///
/// ```text
/// corner index:  7  6  5  4  3  2  1  0
/// state bits:   [_][_][_][_][_][_][_][_]
///                                      ^-- corner 0 inside?
/// ```
#[inline]
pub fn cell_mask(corner_values: &[Value; 8], policy: &CutoffPolicy) -> usize {
    let mut state = 0;
    for (i, &v) in corner_values.iter().enumerate() {
        if policy.is_inside(v) {
            state |= 1 << i;
        }
    }
    state
}

const KEY_AXIS_MASK: u64 = (1 << 21) - 1;

/// Packs a lattice coordinate into one key, 21 bits per axis.
#[inline]
pub fn pack_lattice_key(x: usize, y: usize, z: usize) -> u64 {
    ((x as u64 & KEY_AXIS_MASK) << 42)
        | ((y as u64 & KEY_AXIS_MASK) << 21)
        | (z as u64 & KEY_AXIS_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_sets_one_bit_per_inside_corner() {
        let policy = CutoffPolicy::new(0.5);
        let values = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5];
        assert_eq!(cell_mask(&values, &policy), 0b1000_0001);
    }

    #[test]
    fn single_corner_case_emits_one_triangle() {
        let tris: Vec<_> = triangle_edges(1).collect();
        assert_eq!(tris.len(), 1);
        let mut edges = tris[0];
        edges.sort();
        assert_eq!(edges, [0, 3, 8]);
        assert_eq!(triangle_edges(0).count(), 0);
        assert_eq!(triangle_edges(255).count(), 0);
    }

    #[test]
    fn edge_endpoints_follow_corner_numbering() {
        assert_eq!(edge_endpoints(2, 3, 4, 8), [[2, 3, 4], [2, 3, 5]]);
        assert_eq!(edge_endpoints(0, 0, 0, 1), [[1, 0, 0], [1, 1, 0]]);
    }

    #[test]
    fn lattice_keys_are_distinct_per_axis() {
        assert_ne!(pack_lattice_key(1, 0, 0), pack_lattice_key(0, 1, 0));
        assert_ne!(pack_lattice_key(0, 1, 0), pack_lattice_key(0, 0, 1));
        assert_eq!(pack_lattice_key(3, 2, 1), (3 << 42) | (2 << 21) | 1);
    }

    #[test]
    fn keys_past_1024_points_stay_distinct() {
        assert_ne!(pack_lattice_key(0, 0, 1024), pack_lattice_key(0, 1, 0));
        assert_ne!(pack_lattice_key(0, 1024, 0), pack_lattice_key(1, 0, 0));
        assert_ne!(pack_lattice_key(1500, 7, 3), pack_lattice_key(476, 7, 3));
    }
}
