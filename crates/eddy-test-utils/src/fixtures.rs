//! Reusable grids and analytic fields.
//!
//! - [`periodic_grid`] / [`mirror_grid`]: square-cell grids of a given
//!   physical length.
//! - [`taylor_green`]: a staggered 2-D field whose discrete divergence
//!   vanishes to round-off.
//! - [`random_field`]: deterministic noise on the cell faces.
//! - [`polynomial`]: sampling and differentiating 1-D polynomials, for
//!   checking stencil accuracy.

use std::f64::consts::PI;
use std::sync::Arc;

use eddy_grid::{EdgeBehavior, Grid, GridArray, GridField, Offset};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Periodic grid spanning `[0, length)` on every axis.
///
/// # Panics
///
/// Panics if `shape` is empty or contains a zero extent.
pub fn periodic_grid(shape: &[usize], length: f64) -> Arc<Grid> {
    grid_with_edge(shape, length, EdgeBehavior::Wrap)
}

/// Mirror-bounded grid spanning `[0, length)` on every axis.
///
/// # Panics
///
/// Panics if `shape` is empty or contains a zero extent.
pub fn mirror_grid(shape: &[usize], length: f64) -> Arc<Grid> {
    grid_with_edge(shape, length, EdgeBehavior::Mirror)
}

fn grid_with_edge(shape: &[usize], length: f64, edge: EdgeBehavior) -> Arc<Grid> {
    let step: Vec<f64> = shape.iter().map(|&n| length / n as f64).collect();
    Arc::new(Grid::new(shape, &step, edge).expect("fixture grid must be valid"))
}

/// Sample `f` at the physical coordinates of every point at `offset`.
pub fn sample(grid: &Arc<Grid>, offset: Offset, f: impl Fn(&[f64]) -> f64) -> GridArray {
    GridArray::from_fn(offset, Arc::clone(grid), f)
}

/// The Taylor-Green vortex `u = sin x cos y`, `v = -cos x sin y` on the
/// faces of a 2-D grid. Use a periodic grid of length `2π`.
pub fn taylor_green(grid: &Arc<Grid>) -> GridField {
    let faces = grid.cell_faces();
    let u = sample(grid, faces[0].clone(), |x| x[0].sin() * x[1].cos());
    let v = sample(grid, faces[1].clone(), |x| -x[0].cos() * x[1].sin());
    GridField::new(vec![u, v]).expect("components share one grid")
}

/// A single Fourier mode `amplitude · sin(2π k x / L)` along `axis`, at
/// `offset`.
pub fn sine_mode(grid: &Arc<Grid>, offset: Offset, axis: usize, k: f64, amplitude: f64) -> GridArray {
    let length = grid.length(axis);
    sample(grid, offset, move |x| amplitude * (2.0 * PI * k * x[axis] / length).sin())
}

/// Uniform noise in `[-1, 1)` on the cell faces, seeded for reproducibility.
pub fn random_field(grid: &Arc<Grid>, seed: u64) -> GridField {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let components = grid
        .cell_faces()
        .into_iter()
        .map(|offset| {
            let data = (0..grid.cell_count())
                .map(|_| rng.random_range(-1.0..1.0))
                .collect();
            GridArray::new(data, offset, Arc::clone(grid)).expect("length matches grid")
        })
        .collect();
    GridField::new(components).expect("components share one grid")
}

/// 1-D polynomials given by ascending coefficients `c[0] + c[1] x + ...`.
pub mod polynomial {
    /// Value at `x`.
    pub fn eval(coeffs: &[f64], x: f64) -> f64 {
        coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    /// Coefficients of the `order`-th derivative.
    pub fn derivative(coeffs: &[f64], order: u32) -> Vec<f64> {
        let mut out = coeffs.to_vec();
        for _ in 0..order {
            out = out
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, &c)| k as f64 * c)
                .collect();
        }
        out
    }

    /// Values at each position.
    pub fn sample(coeffs: &[f64], positions: &[f64]) -> Vec<f64> {
        positions.iter().map(|&x| eval(coeffs, x)).collect()
    }

    /// Cell averages over `[x - h/2, x + h/2]` at each position.
    pub fn cell_averages(coeffs: &[f64], positions: &[f64], h: f64) -> Vec<f64> {
        let antiderivative: Vec<f64> = std::iter::once(0.0)
            .chain(coeffs.iter().enumerate().map(|(k, &c)| c / (k as f64 + 1.0)))
            .collect();
        positions
            .iter()
            .map(|&x| (eval(&antiderivative, x + h / 2.0) - eval(&antiderivative, x - h / 2.0)) / h)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynomial_derivative_of_cubic() {
        // 1 + 2x + 3x² + 4x³ -> 2 + 6x + 12x² -> 6 + 24x
        assert_eq!(polynomial::derivative(&[1.0, 2.0, 3.0, 4.0], 2), vec![6.0, 24.0]);
        assert_eq!(polynomial::eval(&[6.0, 24.0], 0.5), 18.0);
    }

    #[test]
    fn cell_average_of_quadratic() {
        // mean of x² over [-h/2, h/2] is h²/12
        let avg = polynomial::cell_averages(&[0.0, 0.0, 1.0], &[0.0], 0.5);
        assert!((avg[0] - 0.25 / 12.0).abs() < 1e-15);
    }

    #[test]
    fn random_field_is_reproducible() {
        let g = periodic_grid(&[4, 4], 1.0);
        let a = random_field(&g, 7);
        let b = random_field(&g, 7);
        assert_eq!(a.components()[1].data(), b.components()[1].data());
        assert!(a.max_abs() <= 1.0);
    }
}
