//! Navier-Stokes steppers wired with the reference operators.
//!
//! Each preset validates the config and returns a pre-filled
//! [`NavierStokesBuilder`]; add forcing if needed, then `build()`:
//!
//! ```
//! use eddy_operators::presets::semi_implicit_navier_stokes;
//! use eddy_operators::KolmogorovForcing;
//! use eddy_grid::{EdgeBehavior, Grid};
//! use eddy_solver::NavierStokesConfig;
//! use std::sync::Arc;
//!
//! let grid = Arc::new(Grid::uniform(&[16, 16], 0.4, EdgeBehavior::Wrap).unwrap());
//! let stepper = semi_implicit_navier_stokes(&NavierStokesConfig::default(), &grid)
//!     .unwrap()
//!     .forcing(KolmogorovForcing::default())
//!     .build()
//!     .unwrap();
//! assert!(!stepper.implicit_diffusion());
//! ```

use eddy_core::{ConfigurationError, ValidationError};
use eddy_grid::Grid;
use eddy_solver::{NavierStokes, NavierStokesBuilder, NavierStokesConfig};

use crate::advection::{AdvectGeneral, SelfAdvection};
use crate::diffusion::ExplicitDiffusion;
use crate::fast_diag::FastDiagonalization;
use crate::pressure::PressureProjection;

fn base(
    config: &NavierStokesConfig,
    grid: &Grid,
) -> Result<(NavierStokesBuilder, FastDiagonalization), ConfigurationError> {
    config.validate()?;
    let solver = FastDiagonalization::laplacian(grid)?;
    let builder = NavierStokes::builder()
        .config(config)
        .convection(SelfAdvection::new(AdvectGeneral::default(), config.dt))
        .projection(PressureProjection::new(solver.clone()));
    Ok((builder, solver))
}

/// Explicit diffusion, upwind self-advection, fast-diagonalization
/// projection.
///
/// # Errors
///
/// Returns [`ConfigurationError`] if `config` fails validation or the
/// Laplacian cannot be diagonalized.
pub fn semi_implicit_navier_stokes(
    config: &NavierStokesConfig,
    grid: &Grid,
) -> Result<NavierStokesBuilder, ConfigurationError> {
    let (builder, _) = base(config, grid)?;
    Ok(builder.explicit_diffusion(ExplicitDiffusion))
}

/// Like [`semi_implicit_navier_stokes`], with diffusion solved implicitly
/// by fast diagonalization after projection.
///
/// # Errors
///
/// Same conditions as [`semi_implicit_navier_stokes`].
pub fn implicit_diffusion_navier_stokes(
    config: &NavierStokesConfig,
    grid: &Grid,
) -> Result<NavierStokesBuilder, ConfigurationError> {
    let (builder, solver) = base(config, grid)?;
    Ok(builder.implicit_diffusion(solver))
}

/// The preset selected by `config.implicit_diffusion`.
///
/// # Errors
///
/// Same conditions as [`semi_implicit_navier_stokes`].
pub fn navier_stokes(
    config: &NavierStokesConfig,
    grid: &Grid,
) -> Result<NavierStokesBuilder, ConfigurationError> {
    if config.implicit_diffusion {
        implicit_diffusion_navier_stokes(config, grid)
    } else {
        semi_implicit_navier_stokes(config, grid)
    }
}

/// Stable step for the presets at the given peak velocity.
///
/// # Errors
///
/// Returns [`ValidationError::DiffusionStepTooSmall`] when explicit
/// diffusion would be unstable at the advective step.
pub fn stable_time_step(
    config: &NavierStokesConfig,
    grid: &Grid,
    max_velocity: f64,
) -> Result<f64, ValidationError> {
    eddy_solver::stable_time_step(
        max_velocity,
        config.max_courant_number,
        config.viscosity,
        grid,
        &AdvectGeneral::default(),
        &ExplicitDiffusion,
        config.implicit_diffusion,
    )
}
