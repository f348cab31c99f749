//! Hilbert curve alternative for 2-D linearization.
//!
//! The Hilbert curve maps 2-D coordinates to a 1-D index with better
//! locality than the z-order curve (no long diagonal jumps). The join
//! algorithms are driven exclusively by z-order codes; this module exists
//! for callers who linearize their data themselves and want the stronger
//! clustering.

use crate::curve::BitCode;

/// Maximum order for Hilbert curve encoding (determines precision)
const MAX_HILBERT_ORDER: u32 = 32;

/// Encodes 2D coordinates to a Hilbert curve index.
///
/// # Arguments
/// * `x` - X coordinate (normalized to [0, 1])
/// * `y` - Y coordinate (normalized to [0, 1])
/// * `order` - Hilbert curve order (1-32, higher = more precision)
///
/// # Returns
/// Hilbert index as u64 (allows up to 32-bit per dimension at order 32)
pub fn hilbert_index(x: f64, y: f64, order: u32) -> u64 {
    debug_assert!((0.0..=1.0).contains(&x), "x must be in [0,1]");
    debug_assert!((0.0..=1.0).contains(&y), "y must be in [0,1]");
    debug_assert!(order > 0 && order <= MAX_HILBERT_ORDER, "order must be 1-32");

    // Convert normalized coordinates to discrete grid coordinates
    let n = 1u64 << order;
    let mut xi = (x * (n as f64 - 0.5)) as u64;
    let mut yi = (y * (n as f64 - 0.5)) as u64;

    xi = xi.min(n - 1);
    yi = yi.min(n - 1);

    xy2d(n, xi, yi)
}

/// Decodes a Hilbert index back to its grid cell.
///
/// The inverse of the index computation: returns `(x, y)` grid coordinates
/// in `[0, 2^order)`.
pub fn hilbert_cell(index: u64, order: u32) -> (u64, u64) {
    debug_assert!(order > 0 && order <= MAX_HILBERT_ORDER, "order must be 1-32");
    let n = 1u64 << order;
    d2xy(n, index)
}

/// Encodes 2D coordinates as a fixed-precision bit code of the Hilbert
/// index (`2 × order` bits, most significant first).
///
/// Sorting these codes lexicographically sorts by Hilbert index.
pub fn hilbert_code(x: f64, y: f64, order: u32) -> BitCode {
    let index = hilbert_index(x, y, order);
    let precision = 2 * order;
    let mut code = BitCode::zeros(precision);
    for i in 0..precision {
        code.set(i, (index >> (precision - 1 - i)) & 1 == 1);
    }
    code
}

/// Converts (x, y) coordinates on the Hilbert curve to a 1D distance.
///
/// This is the core Hilbert curve algorithm using rotation and reflection.
/// Based on the standard xy2d conversion algorithm.
fn xy2d(n: u64, x: u64, y: u64) -> u64 {
    let mut d = 0u64;
    let mut x = x;
    let mut y = y;
    let mut s = n / 2;

    while s > 0 {
        let rx = ((x & s) > 0) as u64;
        let ry = ((y & s) > 0) as u64;
        d += s * s * ((3 * rx) ^ ry);
        rotate(s, &mut x, &mut y, rx, ry);
        s /= 2;
    }

    d
}

/// Converts a 1D Hilbert distance back to (x, y) coordinates.
fn d2xy(n: u64, d: u64) -> (u64, u64) {
    let mut x = 0u64;
    let mut y = 0u64;
    let mut t = d;
    let mut s = 1u64;

    while s < n {
        let rx = 1 & (t / 2);
        let ry = 1 & (t ^ rx);
        rotate(s, &mut x, &mut y, rx, ry);
        x += s * rx;
        y += s * ry;
        t /= 4;
        s *= 2;
    }

    (x, y)
}

/// Rotates and reflects the coordinate system appropriately for Hilbert curve.
fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n.wrapping_sub(1).wrapping_sub(*x);
            *y = n.wrapping_sub(1).wrapping_sub(*y);
        }
        std::mem::swap(x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hilbert_index_corners() {
        // Corners should have distinct indices
        let tl = hilbert_index(0.0, 1.0, 8);
        let tr = hilbert_index(1.0, 1.0, 8);
        let bl = hilbert_index(0.0, 0.0, 8);
        let br = hilbert_index(1.0, 0.0, 8);
        let mut corners = vec![tl, tr, bl, br];
        corners.sort();
        corners.dedup();
        assert_eq!(corners.len(), 4);
    }

    #[test]
    fn test_hilbert_cell_round_trip() {
        let n = 1u64 << 4;
        for x in 0..n {
            for y in 0..n {
                let d = xy2d(n, x, y);
                assert_eq!(hilbert_cell(d, 4), (x, y));
            }
        }
    }

    #[test]
    fn test_hilbert_indices_are_a_permutation() {
        let n = 1u64 << 3;
        let mut seen = vec![false; (n * n) as usize];
        for x in 0..n {
            for y in 0..n {
                let d = xy2d(n, x, y) as usize;
                assert!(!seen[d]);
                seen[d] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_consecutive_indices_are_grid_neighbors() {
        // The defining property of the Hilbert curve.
        let n = 1u64 << 4;
        for d in 0..(n * n - 1) {
            let (x0, y0) = hilbert_cell(d, 4);
            let (x1, y1) = hilbert_cell(d + 1, 4);
            let dist = x0.abs_diff(x1) + y0.abs_diff(y1);
            assert_eq!(dist, 1, "indices {} and {} not adjacent", d, d + 1);
        }
    }

    #[test]
    fn test_hilbert_code_sorts_by_index() {
        let a = hilbert_code(0.1, 0.1, 6);
        let b = hilbert_code(0.9, 0.9, 6);
        assert_eq!(a.precision(), 12);
        let ia = hilbert_index(0.1, 0.1, 6);
        let ib = hilbert_index(0.9, 0.9, 6);
        assert_eq!(a < b, ia < ib);
    }
}
