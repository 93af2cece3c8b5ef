//! Explicit and implicit diffusion.

use eddy_core::ValidationError;
use eddy_grid::{Grid, GridArray, GridField};
use eddy_solver::{Diffusion, DiffusionSolve};

use crate::fast_diag::FastDiagonalization;
use crate::finite_differences::laplacian;

/// Diffusive tendency `nu · ∇²c`.
pub fn diffuse(c: &GridArray, nu: f64) -> GridArray {
    laplacian(c).scaled(nu)
}

/// Largest stable forward-Euler step: `min(step)² / (viscosity · 2^ndim)`.
///
/// Infinite for zero viscosity.
pub fn stable_time_step(viscosity: f64, grid: &Grid) -> f64 {
    grid.min_step().powi(2) / (viscosity * 2f64.powi(grid.ndim() as i32))
}

/// [`Diffusion`] by the second-difference Laplacian.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExplicitDiffusion;

impl Diffusion for ExplicitDiffusion {
    fn diffuse(&self, c: &GridArray, coefficient: f64) -> Result<GridArray, ValidationError> {
        Ok(diffuse(c, coefficient))
    }

    fn stable_time_step(&self, viscosity: f64, grid: &Grid) -> f64 {
        stable_time_step(viscosity, grid)
    }
}

/// Solves `(I − ν dt ∇²) u' = u` per component in the Laplacian eigenbasis.
impl DiffusionSolve for FastDiagonalization {
    fn solve(&self, v: &GridField, viscosity: f64, dt: f64) -> Result<GridField, ValidationError> {
        self.check_grid(v.grid())?;
        let nu_dt = viscosity * dt;
        let components = v
            .iter()
            .map(|u| {
                let data = self.apply(u.data(), |lambda| 1.0 / (1.0 - nu_dt * lambda))?;
                u.with_data(data)
            })
            .collect::<Result<Vec<_>, _>>()?;
        GridField::new(components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_test_utils::fixtures::{mirror_grid, periodic_grid, random_field, sample};
    use std::f64::consts::PI;

    #[test]
    fn stable_step_formula() {
        let g = periodic_grid(&[10, 20], 1.0);
        // 0.05² / (0.1 · 4)
        assert!((stable_time_step(0.1, &g) - 0.00625).abs() < 1e-15);
        assert!(stable_time_step(0.0, &g).is_infinite());
    }

    #[test]
    fn diffuse_scales_laplacian() {
        let g = periodic_grid(&[16], 2.0 * PI);
        let c = sample(&g, g.cell_center(), |x| x[0].cos());
        let d = ExplicitDiffusion.diffuse(&c, 0.5).unwrap();
        let h = g.step()[0];
        let lambda = -(2.0 * (h / 2.0).sin() / h).powi(2);
        assert!(d.try_sub(&c.scaled(0.5 * lambda)).unwrap().max_abs() < 1e-12);
    }

    #[test]
    fn implicit_solve_inverts_helmholtz_operator() {
        for g in [periodic_grid(&[8, 6], 1.0), mirror_grid(&[5, 7], 2.0)] {
            let solver = FastDiagonalization::laplacian(&g).unwrap();
            let v = random_field(&g, 11);
            let (nu, dt) = (0.3, 0.05);
            let solved = solver.solve(&v, nu, dt).unwrap();
            for (u_new, u_old) in solved.iter().zip(&v) {
                let residual = u_new.axpy(-nu * dt, &laplacian(u_new)).unwrap();
                assert!(residual.try_sub(u_old).unwrap().max_abs() < 1e-10);
            }
        }
    }

    #[test]
    fn implicit_solve_damps() {
        let g = periodic_grid(&[8, 8], 1.0);
        let solver = FastDiagonalization::laplacian(&g).unwrap();
        let v = random_field(&g, 5);
        let solved = solver.solve(&v, 1.0, 1.0).unwrap();
        assert!(solved.max_abs() < v.max_abs());
    }

    #[test]
    fn implicit_solve_checks_edge_behavior() {
        let solver = FastDiagonalization::laplacian(&periodic_grid(&[4, 4], 1.0)).unwrap();
        let v = random_field(&mirror_grid(&[4, 4], 1.0), 0);
        assert!(matches!(
            solver.solve(&v, 0.1, 0.1),
            Err(ValidationError::GridMismatch { .. })
        ));
    }

    #[test]
    fn implicit_solve_checks_grid_shape() {
        let solver = FastDiagonalization::laplacian(&periodic_grid(&[4, 4], 1.0)).unwrap();
        let v = random_field(&periodic_grid(&[4, 5], 1.0), 0);
        assert!(matches!(
            solver.solve(&v, 0.1, 0.1),
            Err(ValidationError::ShapeMismatch { .. })
        ));
    }
}
