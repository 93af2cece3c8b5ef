//! Benchmark profiles for the Eddy CFD toolkit.
//!
//! - [`reference_profile`]: 64x64 periodic Kolmogorov flow, explicit diffusion
//! - [`stress_profile`]: 256x256 periodic Kolmogorov flow, implicit diffusion
//! - [`initial_velocity`]: deterministic projected noise via seed
//! - [`derivative_set`]: a face gradient and a center Laplacian for the
//!   stencil benchmarks

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::f64::consts::PI;
use std::sync::Arc;

use eddy_core::{EddyError, Precision};
use eddy_grid::{EdgeBehavior, Grid, GridArray, GridField, Offset};
use eddy_operators::presets::navier_stokes;
use eddy_operators::{FastDiagonalization, KolmogorovForcing, PressureProjection};
use eddy_solver::{NavierStokes, NavierStokesConfig, Projection};
use eddy_stencil::{Method, SpatialDerivativeFromLogits, SpatialDerivativeSpec};
use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A stepper with the grid it runs on and a starting velocity.
pub struct Profile {
    /// Periodic square grid of side `2π`.
    pub grid: Arc<Grid>,
    /// Navier-Stokes stepper with Kolmogorov forcing.
    pub stepper: NavierStokes,
    /// Divergence-free initial velocity.
    pub initial: GridField,
}

fn kolmogorov_profile(n: usize, implicit_diffusion: bool, seed: u64) -> Result<Profile, EddyError> {
    let grid = Arc::new(Grid::uniform(&[n, n], 2.0 * PI / n as f64, EdgeBehavior::Wrap)?);
    let config = NavierStokesConfig {
        viscosity: 1e-3,
        dt: 1e-3,
        implicit_diffusion,
        ..Default::default()
    };
    let stepper = navier_stokes(&config, &grid)?
        .forcing(KolmogorovForcing::new(1.0, 4.0))
        .build()?;
    let initial = initial_velocity(&grid, seed)?;
    Ok(Profile {
        grid,
        stepper,
        initial,
    })
}

/// Build the reference profile: 64x64 grid (4K cells).
///
/// Semi-implicit stepping, ν=1e-3, dt=1e-3, forcing `sin(4y)`.
///
/// # Errors
///
/// Propagates grid, stepper and projection failures.
pub fn reference_profile(seed: u64) -> Result<Profile, EddyError> {
    kolmogorov_profile(64, false, seed)
}

/// Build the stress profile: 256x256 grid (~65K cells).
///
/// Same flow as [`reference_profile`] with diffusion solved implicitly.
///
/// # Errors
///
/// Propagates grid, stepper and projection failures.
pub fn stress_profile(seed: u64) -> Result<Profile, EddyError> {
    kolmogorov_profile(256, true, seed)
}

/// Uniform noise of amplitude 0.1 on the faces of `grid`, projected to be
/// divergence free.
///
/// # Errors
///
/// Returns [`EddyError::Configuration`] if the grid Laplacian cannot be
/// diagonalized.
pub fn initial_velocity(grid: &Arc<Grid>, seed: u64) -> Result<GridField, EddyError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let components = grid
        .cell_faces()
        .into_iter()
        .map(|offset| GridArray::from_flat_fn(offset, Arc::clone(grid), |_| 0.1 * rng.random_range(-1.0..1.0)))
        .collect();
    let noise = GridField::new(components)?;
    let projection = PressureProjection::new(FastDiagonalization::laplacian(grid)?);
    Ok(projection.project(&noise)?)
}

/// Face-to-center first derivative and center-to-center second derivative
/// on a 1-D grid with step `step`, keyed `"grad"` and `"lap"`.
///
/// # Errors
///
/// Returns [`EddyError::Configuration`] if a constraint cannot be built.
pub fn derivative_set(step: f64) -> Result<IndexMap<&'static str, SpatialDerivativeFromLogits>, EddyError> {
    let derivative = |input: f64, target: f64, stencil: usize, order: u32| -> Result<_, EddyError> {
        let spec = SpatialDerivativeSpec::builder()
            .stencil_shape(&[stencil])
            .input_offset(Offset::new(&[input]))
            .target_offset(Offset::new(&[target]))
            .derivative_orders(&[order])
            .steps(&[step])
            .method(Method::FiniteVolume)
            .precision(Precision::Exact)
            .build()?;
        Ok(SpatialDerivativeFromLogits::new(spec)?)
    };
    let mut map = IndexMap::new();
    map.insert("grad", derivative(1.0, 0.5, 4, 1)?);
    map.insert("lap", derivative(0.5, 0.5, 5, 2)?);
    Ok(map)
}

/// Deterministic values in `[-1, 1)`.
pub fn noise(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_operators::finite_differences::divergence;

    #[test]
    fn reference_profile_steps() {
        let profile = reference_profile(42).unwrap();
        assert_eq!(profile.grid.cell_count(), 64 * 64);
        assert!(!profile.stepper.implicit_diffusion());
        let next = profile.stepper.step(&profile.initial).unwrap();
        assert!(divergence(&next).unwrap().max_abs() < 1e-9);
    }

    #[test]
    fn initial_velocity_is_seeded_and_solenoidal() {
        let grid = Arc::new(Grid::uniform(&[16, 16], 0.25, EdgeBehavior::Wrap).unwrap());
        let a = initial_velocity(&grid, 7).unwrap();
        let b = initial_velocity(&grid, 7).unwrap();
        assert_eq!(a.components()[0].data(), b.components()[0].data());
        assert!(divergence(&a).unwrap().max_abs() < 1e-9);
    }

    #[test]
    fn derivative_set_keeps_order() {
        let set = derivative_set(0.25).unwrap();
        assert_eq!(set.keys().copied().collect::<Vec<_>>(), vec!["grad", "lap"]);
    }
}
