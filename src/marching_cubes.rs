//! 256-case marching cubes over a [`VoxelSource`].
//!
//! Cells are visited x outer, y, z inner. Edges shared with the cells at
//! `x − 1`, `y − 1` and `z − 1` are taken from a per-slab cache of edge
//! vertex indices, so every crossing edge is resolved exactly once and the
//! order in which vertices are created is fully determined by the grid.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
    field::VoxelSource,
    grid::VolumetricGrid,
    interp::{find_t, interpolate_points},
    mesh::IsoMesh,
    tables::{CORNER_POINT_INDICES, EDGE_TABLE, SHARED_FROM_X, SHARED_FROM_Y, SHARED_FROM_Z},
    types::{CutoffPolicy, Plane, Value},
    utils::{cell_mask, corner_lattice, edge_endpoints, pack_lattice_key, triangle_edges},
};

/// Crossings closer than this to an endpoint share that lattice point's normal.
const NORMAL_SHARING_FRACTION: Value = 0.3;

/// Slot states in the edge cache.
const UNRESOLVED: i32 = -1;
const FAILED: i32 = -2;

/// A lattice edge the surface crosses, as seen by an [`EdgeResolver`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeCrossing {
    pub from: [usize; 3],
    pub to: [usize; 3],
    pub from_value: Value,
    pub to_value: Value,
}

/// Where along an edge the vertex sits, and the value it carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crossing {
    pub fraction: Value,
    pub value: Value,
}

/// Decides where the vertex on a crossing edge goes.
///
/// Called once per distinct edge, in vertex creation order. Returning `None`
/// marks the edge as failed: no vertex is created and every cell using it
/// is counted as failed.
pub trait EdgeResolver {
    fn resolve(&mut self, edge: &EdgeCrossing) -> Option<Crossing>;
}

/// Linear interpolation of the field values against the cutoff.
#[derive(Clone, Copy, Debug)]
pub struct FieldInterpolator {
    pub policy: CutoffPolicy,
}

impl EdgeResolver for FieldInterpolator {
    fn resolve(&mut self, edge: &EdgeCrossing) -> Option<Crossing> {
        let in_range = |t: Value| (0.0..=1.0).contains(&t);
        let cutoff = self.policy.cutoff;
        let t = find_t(edge.from_value, edge.to_value, cutoff);
        if in_range(t) {
            return Some(Crossing {
                fraction: t,
                value: cutoff,
            });
        }
        if self.policy.uses_absolute() {
            let t = find_t(edge.from_value, edge.to_value, -cutoff);
            if in_range(t) {
                return Some(Crossing {
                    fraction: t,
                    value: -cutoff,
                });
            }
        }
        None
    }
}

/// Cell classification totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellCounts {
    pub inside: usize,
    pub outside: usize,
    /// Cells with at least one crossing edge, failed ones included.
    pub boundary: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Default)]
pub struct MarchingCubesResult {
    pub mesh: IsoMesh,
    /// One fraction per resolved edge in vertex creation order; NaN for failed edges.
    pub fractions: Vec<Value>,
    /// Alternating outside/inside run lengths over lattice points in x-y-z
    /// order, starting with an outside run.
    pub runs: Vec<usize>,
    pub cells: CellCounts,
}

/// Extracts the iso-surface of `source` on `grid`.
pub struct MarchingCubes<'a, S: VoxelSource + ?Sized> {
    source: &'a S,
    grid: &'a VolumetricGrid,
    policy: CutoffPolicy,
    share_normals: bool,
    reverse_winding: bool,
}

impl<'a, S: VoxelSource + ?Sized> MarchingCubes<'a, S> {
    pub fn new(source: &'a S, grid: &'a VolumetricGrid, policy: CutoffPolicy) -> Self {
        Self {
            source,
            grid,
            policy,
            share_normals: true,
            // Keeps face normals pointing down the field for both comparison directions.
            reverse_winding: policy.cutoff > 0.0,
        }
    }

    /// Whether vertices close to a lattice point pool their normals.
    pub fn with_shared_normals(mut self, share_normals: bool) -> Self {
        self.share_normals = share_normals;
        self
    }

    pub fn extract(&self) -> MarchingCubesResult {
        self.extract_with(&mut FieldInterpolator {
            policy: self.policy,
        })
    }

    pub fn extract_with<R: EdgeResolver + ?Sized>(&self, resolver: &mut R) -> MarchingCubesResult {
        let counts = self.source.counts();
        let mut result = MarchingCubesResult {
            runs: surface_runs(self.source, &self.policy),
            ..MarchingCubesResult::default()
        };
        if counts.iter().any(|&n| n < 2) {
            return result;
        }
        let [cx, cy, cz] = counts.map(|n| n - 1);
        let slab = cy * cz;
        let mut previous = vec![[UNRESOLVED; 12]; slab];
        let mut current = vec![[UNRESOLVED; 12]; slab];
        let mut normal_groups: HashMap<u64, Vec<usize>> = HashMap::new();

        for x in 0..cx {
            for y in 0..cy {
                for z in 0..cz {
                    let idx = y * cz + z;
                    let corners = corner_lattice(x, y, z);
                    let values = corners.map(|[i, j, k]| self.source.value(i, j, k));
                    let state = cell_mask(&values, &self.policy);

                    let mut edges = [UNRESOLVED; 12];
                    if state == 0 || state == 255 {
                        if state == 0 {
                            result.cells.outside += 1;
                        } else {
                            result.cells.inside += 1;
                        }
                        current[idx] = edges;
                        continue;
                    }
                    result.cells.boundary += 1;

                    if x > 0 {
                        for (theirs, ours) in SHARED_FROM_X {
                            edges[ours] = previous[idx][theirs];
                        }
                    }
                    if y > 0 {
                        let neighbour = current[idx - cz];
                        for (theirs, ours) in SHARED_FROM_Y {
                            if edges[ours] == UNRESOLVED {
                                edges[ours] = neighbour[theirs];
                            }
                        }
                    }
                    if z > 0 {
                        let neighbour = current[idx - 1];
                        for (theirs, ours) in SHARED_FROM_Z {
                            if edges[ours] == UNRESOLVED {
                                edges[ours] = neighbour[theirs];
                            }
                        }
                    }

                    let crossed = EDGE_TABLE[state];
                    for (e, slot) in edges.iter_mut().enumerate() {
                        if crossed & (1 << e) == 0 || *slot != UNRESOLVED {
                            continue;
                        }
                        let [from, to] = edge_endpoints(x, y, z, e);
                        let [ca, cb] = CORNER_POINT_INDICES[e];
                        let edge = EdgeCrossing {
                            from,
                            to,
                            from_value: values[ca],
                            to_value: values[cb],
                        };
                        *slot = match resolver.resolve(&edge) {
                            Some(crossing) => {
                                let p = interpolate_points(
                                    &self.grid.lattice_to_world(from[0], from[1], from[2]),
                                    &self.grid.lattice_to_world(to[0], to[1], to[2]),
                                    crossing.fraction,
                                );
                                let vertex = result.mesh.add_vertex(p, crossing.value);
                                result.fractions.push(crossing.fraction);
                                if self.share_normals {
                                    let anchor = if crossing.fraction < NORMAL_SHARING_FRACTION {
                                        Some(from)
                                    } else if crossing.fraction > 1.0 - NORMAL_SHARING_FRACTION {
                                        Some(to)
                                    } else {
                                        None
                                    };
                                    if let Some([i, j, k]) = anchor {
                                        normal_groups
                                            .entry(pack_lattice_key(i, j, k))
                                            .or_default()
                                            .push(vertex);
                                    }
                                }
                                vertex as i32
                            }
                            None => {
                                result.fractions.push(Value::NAN);
                                FAILED
                            }
                        };
                    }

                    let mut failed = false;
                    for tri in triangle_edges(state) {
                        let ids = tri.map(|e| edges[e]);
                        if ids.iter().any(|&i| i < 0) {
                            failed = true;
                            continue;
                        }
                        let [a, b, c] = ids.map(|i| i as usize);
                        if self.reverse_winding {
                            result.mesh.tris.push([a, c, b]);
                        } else {
                            result.mesh.tris.push([a, b, c]);
                        }
                    }
                    if failed {
                        result.cells.failed += 1;
                        if result.cells.failed <= 5 {
                            warn!(x, y, z, "edge crossing outside its cell, cell marked failed");
                        }
                    }
                    current[idx] = edges;
                }
            }
            std::mem::swap(&mut previous, &mut current);
            current.fill([UNRESOLVED; 12]);
        }

        let groups: Vec<Vec<usize>> = normal_groups.into_values().collect();
        result.mesh.create_normals(&groups);
        if result.cells.failed > 5 {
            warn!(failed = result.cells.failed, "cells failed during extraction");
        }
        debug!(
            inside = result.cells.inside,
            outside = result.cells.outside,
            boundary = result.cells.boundary,
            failed = result.cells.failed,
            vertices = result.mesh.vertex_count(),
            triangles = result.mesh.triangle_count(),
            "marching cubes finished"
        );
        result
    }
}

/// Alternating outside/inside run lengths over the lattice, starting outside.
pub fn surface_runs<S: VoxelSource + ?Sized>(source: &S, policy: &CutoffPolicy) -> Vec<usize> {
    let [nx, ny, nz] = source.counts();
    let mut runs = Vec::new();
    let mut inside = false;
    let mut run = 0;
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                if policy.is_inside(source.value(x, y, z)) != inside {
                    runs.push(run);
                    run = 0;
                    inside = !inside;
                }
                run += 1;
            }
        }
    }
    runs.push(run);
    runs
}

/// Expands run lengths back into one inside flag per lattice point.
pub fn expand_runs(runs: &[usize], point_count: usize) -> Vec<bool> {
    let mut flags = Vec::with_capacity(point_count);
    for (i, &run) in runs.iter().enumerate() {
        flags.extend(std::iter::repeat_n(i % 2 == 1, run));
    }
    flags.resize(point_count, false);
    flags
}

/// Where a plane cuts one lattice column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneCrossing {
    /// Lattice coordinates along the two in-plane axes, in increasing axis order.
    pub column: [usize; 2],
    /// Index along the slicing axis of the edge's lower end.
    pub lower: usize,
    pub fraction: Value,
}

/// Crossings of a plane with every lattice edge along the slicing axis.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneSlice {
    /// The grid axis most parallel to the plane normal.
    pub axis: usize,
    /// The other two axes, in increasing order.
    pub in_plane: [usize; 2],
    pub crossings: Vec<PlaneCrossing>,
}

/// Plane-restricted marching: a lattice point is inside when its signed
/// distance to `plane` is `<= 0`, and only edges along the axis most
/// parallel to the plane normal are kept.
pub fn march_plane(grid: &VolumetricGrid, plane: &Plane) -> PlaneSlice {
    let axis = grid.most_aligned_axis(&plane.normal());
    let in_plane = match axis {
        0 => [1, 2],
        1 => [0, 2],
        _ => [0, 1],
    };
    let counts = grid.counts();
    let mut crossings = Vec::new();
    for u in 0..counts[in_plane[0]] {
        for v in 0..counts[in_plane[1]] {
            let at = |k: usize| {
                let mut ijk = [0; 3];
                ijk[in_plane[0]] = u;
                ijk[in_plane[1]] = v;
                ijk[axis] = k;
                plane.distance(&grid.lattice_to_world(ijk[0], ijk[1], ijk[2]))
            };
            let mut below = at(0);
            for k in 1..counts[axis] {
                let above = at(k);
                if (below <= 0.0) != (above <= 0.0) {
                    crossings.push(PlaneCrossing {
                        column: [u, v],
                        lower: k - 1,
                        fraction: find_t(below, above, 0.0),
                    });
                    break;
                }
                below = above;
            }
        }
    }
    PlaneSlice {
        axis,
        in_plane,
        crossings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn unit_grid(counts: [usize; 3]) -> VolumetricGrid {
        VolumetricGrid::axis_aligned(
            Point::origin(),
            Point::new(
                (counts[0] - 1) as Value,
                (counts[1] - 1) as Value,
                (counts[2] - 1) as Value,
            ),
            counts,
        )
        .unwrap()
    }

    #[test]
    fn single_inside_corner_makes_one_triangle() {
        let mut values = Array3::<Value>::zeros((2, 2, 2));
        values[[0, 0, 0]] = 1.0;
        let grid = unit_grid([2, 2, 2]);
        let result = MarchingCubes::new(&values, &grid, CutoffPolicy::new(0.5)).extract();
        assert_eq!(result.mesh.vertex_count(), 3);
        assert_eq!(result.mesh.triangle_count(), 1);
        assert_eq!(result.cells.boundary, 1);
        for p in &result.mesh.vertices {
            assert_relative_eq!(p.coords.sum(), 0.5);
        }
        // normal points away from the high corner
        assert!(result.mesh.tri_normal(0).x > 0.0);
    }

    #[test]
    fn shared_edges_are_resolved_once() {
        // A plane z = 1.5 through a 4x4x4 lattice: every z edge between
        // z = 1 and z = 2 is crossed exactly once.
        let values = Array3::from_shape_fn((4, 4, 4), |(_, _, z)| z as Value);
        let grid = unit_grid([4, 4, 4]);
        let result = MarchingCubes::new(&values, &grid, CutoffPolicy::new(1.5)).extract();
        assert_eq!(result.mesh.vertex_count(), 16);
        assert_eq!(result.fractions.len(), 16);
        assert_eq!(result.mesh.triangle_count(), 18);
        assert_eq!(result.cells.boundary, 9);
        assert_eq!(result.cells.inside + result.cells.outside, 18);
        for p in &result.mesh.vertices {
            assert_relative_eq!(p.z, 1.5);
        }
        assert!(result.mesh.check_indices().is_ok());
    }

    #[test]
    fn absolute_policy_keeps_negative_phase() {
        // inside, outside, inside (negative phase) along x
        let values = Array3::from_shape_fn((3, 2, 2), |(x, _, _)| [1.0, 0.0, -1.0][x]);
        let grid = unit_grid([3, 2, 2]);
        let policy = CutoffPolicy::new(0.5).with_absolute(true);
        let result = MarchingCubes::new(&values, &grid, policy).extract();
        assert_eq!(result.mesh.vertex_count(), 8);
        assert!(result.mesh.values.contains(&0.5));
        assert!(result.mesh.values.contains(&-0.5));
        assert_eq!(result.cells.failed, 0);
    }

    #[test]
    fn failed_edges_mark_the_cell() {
        struct Refuse;
        impl EdgeResolver for Refuse {
            fn resolve(&mut self, _: &EdgeCrossing) -> Option<Crossing> {
                None
            }
        }
        let mut values = Array3::<Value>::zeros((2, 2, 2));
        values[[1, 1, 1]] = 1.0;
        let grid = unit_grid([2, 2, 2]);
        let result = MarchingCubes::new(&values, &grid, CutoffPolicy::new(0.5)).extract_with(&mut Refuse);
        assert_eq!(result.cells.failed, 1);
        assert_eq!(result.mesh.triangle_count(), 0);
        assert!(result.fractions.iter().all(|f| f.is_nan()));
    }

    #[test]
    fn runs_alternate_starting_outside() {
        let values = Array3::from_shape_fn((1, 1, 6), |(_, _, z)| [1.0, 1.0, 0.0, 0.0, 0.0, 1.0][z]);
        let runs = surface_runs(&values, &CutoffPolicy::new(0.5));
        assert_eq!(runs, vec![0, 2, 3, 1]);
        assert_eq!(expand_runs(&runs, 6), vec![true, true, false, false, false, true]);
    }

    #[test]
    fn plane_slices_along_the_aligned_axis() {
        let grid = unit_grid([3, 3, 5]);
        let plane = Plane::new(0.1, 0.0, 1.0, -2.5).unwrap();
        let slice = march_plane(&grid, &plane);
        assert_eq!(slice.axis, 2);
        assert_eq!(slice.in_plane, [0, 1]);
        assert_eq!(slice.crossings.len(), 9);
        let first = slice.crossings[0];
        assert_eq!(first.column, [0, 0]);
        assert_eq!(first.lower, 2);
        assert_relative_eq!(first.fraction, 0.5, epsilon = 1e-5);
    }
}
