use crate::types::{Point, Value};

/// Maps `s` from one interval onto another, without clamping.
pub fn remap(s: Value, [in_lo, in_hi]: [Value; 2], [out_lo, out_hi]: [Value; 2]) -> Value {
    out_lo + (s - in_lo) * (out_hi - out_lo) / (in_hi - in_lo)
}

/// Fraction of the way from `v0` to `v1` at which `iso` is reached.
pub fn find_t(v0: Value, v1: Value, iso: Value) -> Value {
    (iso - v0) / (v1 - v0)
}

pub fn lerp(a: Value, b: Value, t: Value) -> Value {
    a + (b - a) * t
}

pub fn interpolate_points(p0: &Point, p1: &Point, t: Value) -> Point {
    p0 + (p1 - p0) * t
}

/// Bilinear interpolation over a unit square.
///
/// ```text
///  v01 ---- v11
///   |        |      ty
///  v00 ---- v10     |__ tx
/// ```
pub fn bilinear(v00: Value, v10: Value, v01: Value, v11: Value, tx: Value, ty: Value) -> Value {
    lerp(lerp(v00, v10, tx), lerp(v01, v11, tx), ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn find_t_inverts_lerp() {
        let t = find_t(-1.0, 3.0, 0.0);
        assert_relative_eq!(t, 0.25);
        assert_relative_eq!(lerp(-1.0, 3.0, t), 0.0);
    }

    #[test]
    fn remap_maps_endpoints() {
        assert_relative_eq!(remap(5.0, [0.0, 10.0], [-1.0, 1.0]), 0.0);
        assert_relative_eq!(remap(10.0, [0.0, 10.0], [-1.0, 1.0]), 1.0);
    }

    #[test]
    fn bilinear_hits_corners_and_center() {
        assert_relative_eq!(bilinear(1.0, 2.0, 3.0, 4.0, 0.0, 0.0), 1.0);
        assert_relative_eq!(bilinear(1.0, 2.0, 3.0, 4.0, 1.0, 1.0), 4.0);
        assert_relative_eq!(bilinear(1.0, 2.0, 3.0, 4.0, 0.5, 0.5), 2.5);
    }

    #[test]
    fn interpolate_points_is_linear() {
        let p = interpolate_points(&Point::new(0.0, 0.0, 0.0), &Point::new(2.0, 4.0, -2.0), 0.5);
        assert_relative_eq!(p, Point::new(1.0, 2.0, -1.0));
    }
}
