//! Second-order finite differences on staggered grids.
//!
//! One-sided differences move data half a cell: [`forward_difference`]
//! takes centers to the following face, [`backward_difference`] takes faces
//! back to centers. Out-of-range neighbours resolve through the grid's
//! [`EdgeBehavior`](eddy_grid::EdgeBehavior).

use eddy_core::ValidationError;
use eddy_grid::index::{neighbour_flat, strides, unravel};
use eddy_grid::{GridArray, GridField};
use smallvec::SmallVec;

/// Values of `c` at `i + delta` along `axis`, row-major.
fn shifted_values(c: &GridArray, axis: usize, delta: i64) -> Vec<f64> {
    let grid = c.grid();
    let shape = grid.shape();
    let st = strides(shape);
    let edge = grid.edge_behavior();
    let mut d: SmallVec<[i64; 4]> = smallvec::smallvec![0; shape.len()];
    d[axis] = delta;
    let mut idx: SmallVec<[usize; 4]> = smallvec::smallvec![0; shape.len()];
    (0..c.data().len())
        .map(|flat| {
            unravel(flat, shape, &mut idx);
            c.data()[neighbour_flat(&idx, &d, shape, &st, edge)]
        })
        .collect()
}

/// Values of `c` at `i + delta` along `axis`, at `c`'s offset moved by
/// `delta` cells.
pub fn shift(c: &GridArray, axis: usize, delta: i64) -> GridArray {
    let values = shifted_values(c, axis, delta);
    GridArray::from_flat_fn(c.offset().shifted(axis, delta as f64), c.grid().clone(), |i| {
        values[i]
    })
}

/// `(c[i + 1] − c[i]) / h`, located half a cell forward.
pub fn forward_difference(c: &GridArray, axis: usize) -> GridArray {
    let h = c.grid().step()[axis];
    let ahead = shifted_values(c, axis, 1);
    let data = c.data();
    GridArray::from_flat_fn(c.offset().shifted(axis, 0.5), c.grid().clone(), |i| {
        (ahead[i] - data[i]) / h
    })
}

/// `(c[i] − c[i − 1]) / h`, located half a cell back.
pub fn backward_difference(c: &GridArray, axis: usize) -> GridArray {
    let h = c.grid().step()[axis];
    let behind = shifted_values(c, axis, -1);
    let data = c.data();
    GridArray::from_flat_fn(c.offset().shifted(axis, -0.5), c.grid().clone(), |i| {
        (data[i] - behind[i]) / h
    })
}

/// `(c[i + 1] − c[i − 1]) / 2h`, at `c`'s offset.
pub fn central_difference(c: &GridArray, axis: usize) -> GridArray {
    let h = c.grid().step()[axis];
    let ahead = shifted_values(c, axis, 1);
    let behind = shifted_values(c, axis, -1);
    GridArray::from_flat_fn(c.offset().clone(), c.grid().clone(), |i| {
        (ahead[i] - behind[i]) / (2.0 * h)
    })
}

/// Standard `2·ndim + 1` point Laplacian, at `c`'s offset.
pub fn laplacian(c: &GridArray) -> GridArray {
    let grid = c.grid();
    let data = c.data();
    let mut out = vec![0.0; data.len()];
    for axis in 0..grid.ndim() {
        let h2 = grid.step()[axis].powi(2);
        let ahead = shifted_values(c, axis, 1);
        let behind = shifted_values(c, axis, -1);
        for (i, o) in out.iter_mut().enumerate() {
            *o += (ahead[i] - 2.0 * data[i] + behind[i]) / h2;
        }
    }
    GridArray::from_flat_fn(c.offset().clone(), grid.clone(), |i| out[i])
}

/// Divergence of a face-located field, at cell centers.
///
/// # Errors
///
/// Returns [`ValidationError::ArityMismatch`] if `v` does not have one
/// component per axis and [`ValidationError::OffsetMismatch`] if the
/// backward differences do not land on a common offset.
pub fn divergence(v: &GridField) -> Result<GridArray, ValidationError> {
    let ndim = v.grid().ndim();
    if v.len() != ndim {
        return Err(ValidationError::ArityMismatch {
            expected: ndim,
            actual: v.len(),
        });
    }
    let mut terms = v
        .iter()
        .enumerate()
        .map(|(axis, u)| backward_difference(u, axis));
    let first = terms.next().ok_or(ValidationError::ArityMismatch {
        expected: ndim,
        actual: 0,
    })?;
    terms.try_fold(first, |acc, t| acc.try_add(&t))
}

/// Gradient of a center-located scalar, one component per axis at the
/// corresponding faces.
pub fn gradient(c: &GridArray) -> Result<GridField, ValidationError> {
    GridField::new(
        (0..c.grid().ndim())
            .map(|axis| forward_difference(c, axis))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_test_utils::fixtures::{mirror_grid, periodic_grid, sample, taylor_green};
    use std::f64::consts::PI;

    #[test]
    fn forward_difference_of_linear_is_exact_inside() {
        let g = mirror_grid(&[8], 8.0);
        let c = sample(&g, g.cell_center(), |x| 3.0 * x[0]);
        let d = forward_difference(&c, 0);
        assert_eq!(d.offset().as_slice(), &[1.0]);
        for &v in &d.data()[..7] {
            assert!((v - 3.0).abs() < 1e-12);
        }
        // mirror edge repeats the last cell
        assert_eq!(d.data()[7], 0.0);
    }

    #[test]
    fn backward_undoes_forward_offset() {
        let g = periodic_grid(&[6], 1.0);
        let c = sample(&g, g.cell_center(), |x| x[0]);
        let d = backward_difference(&forward_difference(&c, 0), 0);
        assert_eq!(d.offset().as_slice(), &[0.5]);
    }

    #[test]
    fn central_difference_of_sine() {
        let g = periodic_grid(&[64], 2.0 * PI);
        let c = sample(&g, g.cell_center(), |x| x[0].sin());
        let d = central_difference(&c, 0);
        let exact = sample(&g, g.cell_center(), |x| x[0].cos());
        assert!(d.try_sub(&exact).unwrap().max_abs() < 2e-3);
    }

    #[test]
    fn laplacian_of_periodic_mode() {
        let g = periodic_grid(&[32, 32], 2.0 * PI);
        let c = sample(&g, g.cell_center(), |x| x[0].sin() * x[1].cos());
        let lap = laplacian(&c);
        let h = g.step()[0];
        // discrete eigenvalue of sin(x) per axis: -(2 sin(h/2) / h)²
        let lambda = -2.0 * (2.0 * (h / 2.0).sin() / h).powi(2);
        assert!(lap.try_sub(&c.scaled(lambda)).unwrap().max_abs() < 1e-10);
    }

    #[test]
    fn taylor_green_is_discretely_divergence_free() {
        let g = periodic_grid(&[16, 16], 2.0 * PI);
        let div = divergence(&taylor_green(&g)).unwrap();
        assert_eq!(div.offset().as_slice(), &[0.5, 0.5]);
        assert!(div.max_abs() < 1e-12);
    }

    #[test]
    fn divergence_of_gradient_is_laplacian() {
        let g = periodic_grid(&[8, 8], 1.0);
        let c = sample(&g, g.cell_center(), |x| (2.0 * PI * x[0]).cos() + x[1].sin());
        let lhs = divergence(&gradient(&c).unwrap()).unwrap();
        assert!(lhs.try_sub(&laplacian(&c)).unwrap().max_abs() < 1e-10);
    }

    #[test]
    fn divergence_needs_one_component_per_axis() {
        let g = periodic_grid(&[4, 4], 1.0);
        let v = GridField::new(vec![GridArray::zeros(g.cell_faces()[0].clone(), g.clone())]).unwrap();
        assert!(matches!(
            divergence(&v),
            Err(ValidationError::ArityMismatch { expected: 2, actual: 1 })
        ));
    }
}
