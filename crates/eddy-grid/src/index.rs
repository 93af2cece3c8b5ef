//! Row-major index arithmetic shared by arrays, patches and convolutions.

use crate::EdgeBehavior;
use smallvec::SmallVec;

/// Spatial shape of an array, one extent per axis.
pub type Shape = SmallVec<[usize; 4]>;

/// Resolve a possibly out-of-range index on an axis of length `len`.
///
/// `len` must be nonzero.
pub fn resolve_axis(val: i64, len: usize, edge: EdgeBehavior) -> usize {
    let n = len as i64;
    if val >= 0 && val < n {
        return val as usize;
    }
    match edge {
        EdgeBehavior::Wrap => val.rem_euclid(n) as usize,
        EdgeBehavior::Clamp => val.clamp(0, n - 1) as usize,
        EdgeBehavior::Mirror => {
            let m = val.rem_euclid(2 * n);
            if m < n {
                m as usize
            } else {
                (2 * n - 1 - m) as usize
            }
        }
    }
}

/// Number of elements in an array of the given shape. A zero-rank shape
/// holds one element.
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides for `shape`.
pub fn strides(shape: &[usize]) -> Shape {
    let mut out: Shape = smallvec::smallvec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        out[axis] = out[axis + 1] * shape[axis + 1];
    }
    out
}

/// Decompose a flat row-major index into `out`.
pub fn unravel(mut flat: usize, shape: &[usize], out: &mut [usize]) {
    for axis in (0..shape.len()).rev() {
        out[axis] = flat % shape[axis];
        flat /= shape[axis];
    }
}

/// Flat row-major index of `idx` given `strides`.
pub fn ravel(idx: &[usize], strides: &[usize]) -> usize {
    idx.iter().zip(strides).map(|(i, s)| i * s).sum()
}

/// Flat index of `idx + delta`, each axis resolved under `edge`.
pub fn neighbour_flat(
    idx: &[usize],
    delta: &[i64],
    shape: &[usize],
    strides: &[usize],
    edge: EdgeBehavior,
) -> usize {
    let mut flat = 0;
    for axis in 0..shape.len() {
        let r = resolve_axis(idx[axis] as i64 + delta[axis], shape[axis], edge);
        flat += r * strides[axis];
    }
    flat
}

/// Periodically shift `data` so that `out[i] = data[i - shift]` per axis.
pub fn roll(data: &[f64], shape: &[usize], shifts: &[i64]) -> Vec<f64> {
    if shifts.iter().all(|&s| s == 0) {
        return data.to_vec();
    }
    let st = strides(shape);
    let neg: SmallVec<[i64; 4]> = shifts.iter().map(|s| -s).collect();
    let mut idx: Shape = smallvec::smallvec![0; shape.len()];
    (0..data.len())
        .map(|flat| {
            unravel(flat, shape, &mut idx);
            data[neighbour_flat(&idx, &neg, shape, &st, EdgeBehavior::Wrap)]
        })
        .collect()
}

/// All multi-indices of `shape` in row-major order.
pub fn indices(shape: &[usize]) -> impl Iterator<Item = Shape> + '_ {
    let count = element_count(shape);
    (0..count).map(move |flat| {
        let mut idx: Shape = smallvec::smallvec![0; shape.len()];
        unravel(flat, shape, &mut idx);
        idx
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn resolve_axis_in_bounds() {
        assert_eq!(resolve_axis(2, 5, EdgeBehavior::Clamp), 2);
        assert_eq!(resolve_axis(0, 5, EdgeBehavior::Wrap), 0);
    }

    #[test]
    fn resolve_axis_wrap() {
        assert_eq!(resolve_axis(-1, 5, EdgeBehavior::Wrap), 4);
        assert_eq!(resolve_axis(5, 5, EdgeBehavior::Wrap), 0);
        assert_eq!(resolve_axis(7, 5, EdgeBehavior::Wrap), 2);
    }

    #[test]
    fn resolve_axis_clamp() {
        assert_eq!(resolve_axis(-3, 5, EdgeBehavior::Clamp), 0);
        assert_eq!(resolve_axis(9, 5, EdgeBehavior::Clamp), 4);
    }

    #[test]
    fn resolve_axis_mirror() {
        assert_eq!(resolve_axis(-1, 4, EdgeBehavior::Mirror), 0);
        assert_eq!(resolve_axis(-2, 4, EdgeBehavior::Mirror), 1);
        assert_eq!(resolve_axis(4, 4, EdgeBehavior::Mirror), 3);
        assert_eq!(resolve_axis(5, 4, EdgeBehavior::Mirror), 2);
    }

    #[test]
    fn strides_row_major() {
        assert_eq!(strides(&[2, 3, 4]).as_slice(), &[12, 4, 1]);
        assert!(strides(&[]).is_empty());
    }

    #[test]
    fn roll_matches_numpy_convention() {
        let data = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(roll(&data, &[4], &[1]), vec![3.0, 0.0, 1.0, 2.0]);
        assert_eq!(roll(&data, &[4], &[-1]), vec![1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn roll_2d_rolls_each_axis() {
        // [[0, 1, 2], [3, 4, 5]]
        let data: Vec<f64> = (0..6).map(f64::from).collect();
        let rolled = roll(&data, &[2, 3], &[1, 1]);
        assert_eq!(rolled, vec![5.0, 3.0, 4.0, 2.0, 0.0, 1.0]);
    }

    proptest! {
        #[test]
        fn unravel_inverts_ravel(a in 1usize..6, b in 1usize..6, c in 1usize..6, seed in 0usize..1000) {
            let shape = [a, b, c];
            let flat = seed % element_count(&shape);
            let mut idx = [0usize; 3];
            unravel(flat, &shape, &mut idx);
            prop_assert_eq!(ravel(&idx, &strides(&shape)), flat);
        }

        #[test]
        fn resolved_index_always_in_range(val in -50i64..50, len in 1usize..10) {
            for edge in [EdgeBehavior::Wrap, EdgeBehavior::Clamp, EdgeBehavior::Mirror] {
                prop_assert!(resolve_axis(val, len, edge) < len);
            }
        }
    }
}
