//! Moving grid data between staggered offsets.

use std::sync::Arc;

use eddy_core::ValidationError;
use eddy_grid::{GridArray, Offset};

use crate::finite_differences::shift;

const OFFSET_TOL: f64 = 1e-12;

fn check_rank(c: &GridArray, target: &Offset) -> Result<(), ValidationError> {
    if c.offset().ndim() != target.ndim() {
        return Err(ValidationError::OffsetMismatch {
            expected: target.as_slice().to_vec(),
            actual: c.offset().as_slice().to_vec(),
        });
    }
    Ok(())
}

/// Multilinear interpolation of `c` to an arbitrary `target` offset.
///
/// Each axis is interpolated between the two nearest samples; integer
/// displacements reduce to a shift.
///
/// # Errors
///
/// Returns [`ValidationError::OffsetMismatch`] if `target` has a different
/// number of axes than `c`.
pub fn linear(c: &GridArray, target: &Offset) -> Result<GridArray, ValidationError> {
    check_rank(c, target)?;
    let mut out = c.clone();
    for axis in 0..target.ndim() {
        let delta = target.as_slice()[axis] - c.offset().as_slice()[axis];
        if delta.abs() < OFFSET_TOL {
            continue;
        }
        let lo = delta.floor();
        let frac = delta - lo;
        let lower = shift(&out, axis, lo as i64);
        let upper = shift(&out, axis, lo as i64 + 1);
        let (l, u) = (lower.data(), upper.data());
        out = GridArray::from_flat_fn(out.offset().clone(), Arc::clone(out.grid()), |i| {
            (1.0 - frac) * l[i] + frac * u[i]
        });
    }
    Ok(out.with_offset(target.clone()))
}

/// [`linear`] with the velocity ignored, for use as a centered scalar
/// scheme in [`advect_general`](crate::advection::advect_general).
pub fn linear_scalar(
    c: &GridArray,
    target: &Offset,
    _velocity: &GridArray,
) -> Result<GridArray, ValidationError> {
    linear(c, target)
}

/// First-order upwind interpolation across half a cell along one axis.
///
/// Takes the upstream neighbour according to the sign of `velocity`, which
/// must already sit at `target`.
///
/// # Errors
///
/// Returns [`ValidationError::OffsetMismatch`] if `velocity` is not at
/// `target`, or if `target` is not a half-cell move of `c` along exactly
/// one axis. Returns [`ValidationError::GridMismatch`] if `c` and
/// `velocity` live on different grids.
pub fn upwind(
    c: &GridArray,
    target: &Offset,
    velocity: &GridArray,
) -> Result<GridArray, ValidationError> {
    check_rank(c, target)?;
    if c.offset().approx_eq(target) {
        return Ok(c.clone());
    }
    target.check(velocity.offset())?;
    if !Arc::ptr_eq(c.grid(), velocity.grid()) {
        c.grid().check_same(velocity.grid())?;
    }

    let moved: Vec<(usize, f64)> = target
        .as_slice()
        .iter()
        .zip(c.offset().as_slice())
        .enumerate()
        .map(|(axis, (t, s))| (axis, t - s))
        .filter(|(_, d)| d.abs() >= OFFSET_TOL)
        .collect();
    let (axis, delta) = match moved.as_slice() {
        [(axis, delta)] if (delta.abs() - 0.5).abs() < OFFSET_TOL => (*axis, *delta),
        _ => {
            return Err(ValidationError::OffsetMismatch {
                expected: target.as_slice().to_vec(),
                actual: c.offset().as_slice().to_vec(),
            })
        }
    };

    let lo = delta.floor() as i64;
    let lower = shift(c, axis, lo);
    let upper = shift(c, axis, lo + 1);
    let (l, u, w) = (lower.data(), upper.data(), velocity.data());
    Ok(GridArray::from_flat_fn(target.clone(), Arc::clone(c.grid()), |i| {
        if w[i] > 0.0 {
            l[i]
        } else {
            u[i]
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_test_utils::fixtures::{periodic_grid, sample};

    #[test]
    fn linear_center_to_face_averages_neighbours() {
        let g = periodic_grid(&[4], 4.0);
        let c = GridArray::new(vec![1.0, 3.0, 5.0, 11.0], g.cell_center(), g.clone()).unwrap();
        let face = linear(&c, &g.cell_faces()[0]).unwrap();
        assert_eq!(face.offset().as_slice(), &[1.0]);
        assert_eq!(face.data(), &[2.0, 4.0, 8.0, 6.0]);
    }

    #[test]
    fn linear_is_exact_for_affine_data_inside() {
        let g = periodic_grid(&[8, 8], 8.0);
        let c = sample(&g, Offset::new(&[1.0, 0.5]), |x| 2.0 * x[0] - x[1]);
        let target = Offset::new(&[0.5, 1.0]);
        let out = linear(&c, &target).unwrap();
        let exact = sample(&g, target, |x| 2.0 * x[0] - x[1]);
        // interior rows and columns avoid the periodic seam
        for i in 1..7 {
            for j in 0..7 {
                let k = i * 8 + j;
                assert!((out.data()[k] - exact.data()[k]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn linear_integer_offset_is_a_shift() {
        let g = periodic_grid(&[3], 3.0);
        let c = GridArray::new(vec![1.0, 2.0, 3.0], g.cell_center(), g.clone()).unwrap();
        let out = linear(&c, &Offset::new(&[1.5])).unwrap();
        assert_eq!(out.data(), &[2.0, 3.0, 1.0]);
    }

    #[test]
    fn upwind_follows_velocity_sign() {
        let g = periodic_grid(&[4], 4.0);
        let face = g.cell_faces()[0].clone();
        let c = GridArray::new(vec![1.0, 2.0, 3.0, 4.0], g.cell_center(), g.clone()).unwrap();
        let v = GridArray::new(vec![1.0, -1.0, 0.0, 2.0], face.clone(), g.clone()).unwrap();
        let out = upwind(&c, &face, &v).unwrap();
        assert_eq!(out.data(), &[1.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn upwind_backward_half_cell() {
        let g = periodic_grid(&[4], 4.0);
        let c = GridArray::new(vec![1.0, 2.0, 3.0, 4.0], g.cell_faces()[0].clone(), g.clone()).unwrap();
        let center = g.cell_center();
        let v = GridArray::new(vec![1.0, 1.0, -1.0, -1.0], center.clone(), g.clone()).unwrap();
        let out = upwind(&c, &center, &v).unwrap();
        // positive velocity takes the face behind, negative the face ahead
        assert_eq!(out.data(), &[4.0, 1.0, 3.0, 4.0]);
    }

    #[test]
    fn upwind_rejects_diagonal_move() {
        let g = periodic_grid(&[4, 4], 1.0);
        let target = Offset::new(&[1.0, 1.0]);
        let c = GridArray::zeros(g.cell_center(), g.clone());
        let v = GridArray::zeros(target.clone(), g.clone());
        assert!(matches!(
            upwind(&c, &target, &v),
            Err(ValidationError::OffsetMismatch { .. })
        ));
    }

    #[test]
    fn upwind_requires_velocity_at_target() {
        let g = periodic_grid(&[4], 1.0);
        let c = GridArray::zeros(g.cell_center(), g.clone());
        let v = GridArray::zeros(g.cell_center(), g.clone());
        assert!(upwind(&c, &g.cell_faces()[0], &v).is_err());
    }
}
