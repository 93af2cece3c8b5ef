//! Time-step selection from advection and diffusion stability bounds.

use crate::traits::{Advection, Diffusion};
use eddy_core::ValidationError;
use eddy_grid::{Grid, GridField};

/// Largest stable step for a Navier-Stokes run.
///
/// The step comes from `advection`'s CFL bound. With explicit diffusion the
/// diffusion bound must not be smaller; implicit diffusion skips that check.
///
/// # Errors
///
/// Returns [`ValidationError::DiffusionStepTooSmall`] when explicit
/// diffusion would be unstable at the advective step.
pub fn stable_time_step<A, D>(
    max_velocity: f64,
    max_courant_number: f64,
    viscosity: f64,
    grid: &Grid,
    advection: &A,
    diffusion: &D,
    implicit_diffusion: bool,
) -> Result<f64, ValidationError>
where
    A: Advection + ?Sized,
    D: Diffusion + ?Sized,
{
    let dt = advection.stable_time_step(max_velocity, max_courant_number, grid);
    if !implicit_diffusion {
        let diffusion_dt = diffusion.stable_time_step(viscosity, grid);
        if diffusion_dt < dt {
            return Err(ValidationError::DiffusionStepTooSmall { diffusion_dt, dt });
        }
    }
    Ok(dt)
}

/// Velocity bound used by [`dynamic_time_step`]: the square root of the
/// largest sum of squared component values, summed index by index across
/// components regardless of their offsets.
pub fn max_velocity(v: &GridField) -> f64 {
    let mut sum_sq = vec![0.0; v.grid().cell_count()];
    for component in v {
        for (acc, &u) in sum_sq.iter_mut().zip(component.data()) {
            *acc += u * u;
        }
    }
    sum_sq.into_iter().fold(0.0, f64::max).sqrt()
}

/// [`stable_time_step`] for the current velocity field.
///
/// # Errors
///
/// Same conditions as [`stable_time_step`].
pub fn dynamic_time_step<A, D>(
    v: &GridField,
    max_courant_number: f64,
    viscosity: f64,
    grid: &Grid,
    advection: &A,
    diffusion: &D,
    implicit_diffusion: bool,
) -> Result<f64, ValidationError>
where
    A: Advection + ?Sized,
    D: Diffusion + ?Sized,
{
    stable_time_step(
        max_velocity(v),
        max_courant_number,
        viscosity,
        grid,
        advection,
        diffusion,
        implicit_diffusion,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_grid::{EdgeBehavior, GridArray};
    use std::sync::Arc;

    struct Cfl;

    impl Advection for Cfl {
        fn advect(&self, c: &GridArray, _: &GridField, _: f64) -> Result<GridArray, ValidationError> {
            Ok(c.scaled(0.0))
        }

        fn stable_time_step(&self, max_velocity: f64, courant: f64, grid: &Grid) -> f64 {
            courant * grid.min_step() / max_velocity
        }
    }

    struct Explicit;

    impl Diffusion for Explicit {
        fn diffuse(&self, c: &GridArray, _: f64) -> Result<GridArray, ValidationError> {
            Ok(c.scaled(0.0))
        }

        fn stable_time_step(&self, viscosity: f64, grid: &Grid) -> f64 {
            grid.min_step().powi(2) / (viscosity * 2f64.powi(grid.ndim() as i32))
        }
    }

    fn grid() -> Grid {
        Grid::uniform(&[8, 8], 0.1, EdgeBehavior::Wrap).unwrap()
    }

    #[test]
    fn advection_bound_when_diffusion_is_slow() {
        let dt = stable_time_step(1.0, 0.5, 1e-4, &grid(), &Cfl, &Explicit, false).unwrap();
        assert!((dt - 0.05).abs() < 1e-15);
    }

    #[test]
    fn explicit_diffusion_violation_rejected() {
        // diffusion bound 0.01 / (1.0 * 4) = 0.0025 < 0.05
        let err = stable_time_step(1.0, 0.5, 1.0, &grid(), &Cfl, &Explicit, false).unwrap_err();
        assert!(matches!(err, ValidationError::DiffusionStepTooSmall { .. }));
        assert!(err.to_string().contains("stable step for diffusion smaller than chosen"));
    }

    #[test]
    fn implicit_diffusion_skips_check() {
        let dt = stable_time_step(1.0, 0.5, 1.0, &grid(), &Cfl, &Explicit, true).unwrap();
        assert!((dt - 0.05).abs() < 1e-15);
    }

    #[test]
    fn max_velocity_sums_components_by_index() {
        let g = Arc::new(grid());
        let faces = g.cell_faces();
        let mut u = vec![0.0; 64];
        let mut w = vec![0.0; 64];
        u[3] = 3.0;
        w[3] = 4.0;
        w[10] = 4.5;
        let v = GridField::new(vec![
            GridArray::new(u, faces[0].clone(), g.clone()).unwrap(),
            GridArray::new(w, faces[1].clone(), g).unwrap(),
        ])
        .unwrap();
        assert!((max_velocity(&v) - 5.0).abs() < 1e-15);
    }

    #[test]
    fn dynamic_step_uses_field_speed() {
        let g = Arc::new(grid());
        let v = GridField::new(
            g.cell_faces()
                .into_iter()
                .map(|off| GridArray::new(vec![2.0; 64], off, g.clone()).unwrap())
                .collect(),
        )
        .unwrap();
        let dt = dynamic_time_step(&v, 0.5, 1e-4, &grid(), &Cfl, &Explicit, false).unwrap();
        assert!((dt - 0.05 / 8f64.sqrt()).abs() < 1e-12);
    }
}
