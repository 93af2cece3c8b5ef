//! Pressure projection and Poisson solvers.
//!
//! [`PressureProjection`] removes the divergent part of a face-located
//! velocity: it solves `∇²p = ∇·v` at cell centers and subtracts `∇p` from
//! the faces. The Poisson solve is pluggable; [`FastDiagonalization`] is the
//! direct default and [`ConjugateGradient`] the iterative alternative.

use eddy_core::{ConfigurationError, ValidationError};
use eddy_grid::{GridArray, GridField};
use eddy_solver::{PressureSolve, Projection};

use crate::fast_diag::FastDiagonalization;
use crate::finite_differences::{divergence, gradient, laplacian};

/// Pseudo-inverse Poisson solve; the result has zero mean.
impl PressureSolve for FastDiagonalization {
    fn solve(&self, rhs: &GridArray) -> Result<GridArray, ValidationError> {
        self.check_grid(rhs.grid())?;
        rhs.with_data(self.pseudo_inverse(rhs.data())?)
    }
}

// ── ConjugateGradient ──────────────────────────────────────────────

/// Matrix-free conjugate gradient on `−∇²p = −rhs`.
///
/// The mean of `rhs` is removed first so that periodic and Neumann problems
/// are consistent; the returned pressure has zero mean. Stops when the
/// residual norm falls below `tolerance` times the right-hand side norm,
/// after `max_iterations`, or with the current iterate when `p·Ap` is not
/// positive and finite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConjugateGradient {
    tolerance: f64,
    max_iterations: usize,
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 1000,
        }
    }
}

impl ConjugateGradient {
    /// Create a solver with the given relative tolerance and iteration cap.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for a non-positive
    /// tolerance or a zero iteration cap.
    pub fn new(tolerance: f64, max_iterations: usize) -> Result<Self, ConfigurationError> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "tolerance",
                reason: format!("must be finite and positive, got {tolerance}"),
            });
        }
        if max_iterations == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            tolerance,
            max_iterations,
        })
    }

    /// Relative residual tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Iteration cap.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl PressureSolve for ConjugateGradient {
    fn solve(&self, rhs: &GridArray) -> Result<GridArray, ValidationError> {
        let mean = rhs.mean();
        let b: Vec<f64> = rhs.data().iter().map(|r| mean - r).collect();
        let b_norm = dot(&b, &b).sqrt();
        let mut x = vec![0.0; b.len()];
        if b_norm == 0.0 {
            return rhs.with_data(x);
        }

        let operator = |p: &[f64]| -> Result<Vec<f64>, ValidationError> {
            Ok(laplacian(&rhs.with_data(p.to_vec())?)
                .into_data()
                .into_iter()
                .map(|v| -v)
                .collect())
        };

        let mut r = b;
        let mut p = r.clone();
        let mut rs = dot(&r, &r);
        let mut iterations = 0;
        let mut breakdown = false;
        while iterations < self.max_iterations && rs.sqrt() > self.tolerance * b_norm {
            let ap = operator(&p)?;
            let curvature = dot(&p, &ap);
            if !(curvature.is_finite() && curvature > 0.0) {
                breakdown = true;
                break;
            }
            let alpha = rs / curvature;
            for i in 0..x.len() {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            let rs_next = dot(&r, &r);
            let beta = rs_next / rs;
            for i in 0..p.len() {
                p[i] = r[i] + beta * p[i];
            }
            rs = rs_next;
            iterations += 1;
        }

        let relative = rs.sqrt() / b_norm;
        if breakdown {
            log::warn!(
                "conjugate gradient broke down after {iterations} iterations (p·Ap not positive), relative residual {relative:.3e}"
            );
        } else if relative > self.tolerance {
            log::warn!(
                "conjugate gradient stopped at the {} iteration cap with relative residual {:.3e}",
                self.max_iterations,
                relative
            );
        } else {
            log::trace!("conjugate gradient converged in {iterations} iterations");
        }

        let x_mean = x.iter().sum::<f64>() / x.len() as f64;
        rhs.with_data(x.into_iter().map(|v| v - x_mean).collect())
    }
}

// ── PressureProjection ─────────────────────────────────────────────

/// [`Projection`] by a Poisson solve and gradient subtraction.
#[derive(Clone, Debug)]
pub struct PressureProjection<S> {
    solver: S,
}

impl<S: PressureSolve> PressureProjection<S> {
    /// Project with `solver`.
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    /// The Poisson solver.
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Pressure whose gradient [`project`](Projection::project) removes.
    ///
    /// # Errors
    ///
    /// Propagates divergence and solver errors.
    pub fn pressure(&self, v: &GridField) -> Result<GridArray, ValidationError> {
        self.solver.solve(&divergence(v)?)
    }
}

impl<S: PressureSolve> Projection for PressureProjection<S> {
    fn project(&self, v: &GridField) -> Result<GridField, ValidationError> {
        let grad = gradient(&self.pressure(v)?)?;
        let components = v
            .iter()
            .zip(&grad)
            .map(|(u, g)| u.try_sub(g))
            .collect::<Result<Vec<_>, _>>()?;
        GridField::new(components)
    }
}
