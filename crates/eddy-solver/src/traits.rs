//! Collaborator seams consumed by the time stepper.
//!
//! Each physical process is a trait so that reference operators, learned
//! closures and test doubles plug in interchangeably. Every trait is
//! object-safe; [`NavierStokes`](crate::NavierStokes) stores collaborators as
//! `Box<dyn Trait>`. [`Convection`], [`Projection`] and [`Forcing`] are
//! implemented for plain closures.

use eddy_core::ValidationError;
use eddy_grid::{Grid, GridArray, GridField};

/// Transport of a scalar by a velocity field.
pub trait Advection: Send + Sync {
    /// Rate of change of `c` due to advection by `v`, at `c`'s offset.
    ///
    /// `dt` is available to schemes whose fluxes depend on the step.
    fn advect(&self, c: &GridArray, v: &GridField, dt: f64) -> Result<GridArray, ValidationError>;

    /// Largest step satisfying the scheme's CFL condition.
    fn stable_time_step(&self, max_velocity: f64, max_courant_number: f64, grid: &Grid) -> f64;
}

/// Rate of change of the velocity due to its own transport.
pub trait Convection: Send + Sync {
    /// One tendency component per velocity component.
    fn convect(&self, v: &GridField) -> Result<GridField, ValidationError>;
}

impl<F> Convection for F
where
    F: Fn(&GridField) -> Result<GridField, ValidationError> + Send + Sync,
{
    fn convect(&self, v: &GridField) -> Result<GridField, ValidationError> {
        self(v)
    }
}

/// Explicit diffusion operator.
pub trait Diffusion: Send + Sync {
    /// Diffusive tendency `coefficient · ∇²c`.
    fn diffuse(&self, c: &GridArray, coefficient: f64) -> Result<GridArray, ValidationError>;

    /// Largest step for which explicit diffusion is stable.
    fn stable_time_step(&self, viscosity: f64, grid: &Grid) -> f64;
}

/// Implicit diffusion: advance a field through one step of diffusion.
pub trait DiffusionSolve: Send + Sync {
    /// Solve `(I − viscosity · dt · ∇²) v' = v` for every component.
    fn solve(&self, v: &GridField, viscosity: f64, dt: f64) -> Result<GridField, ValidationError>;
}

/// Poisson solver used by pressure projection.
pub trait PressureSolve: Send + Sync {
    /// Pressure `p` with `∇²p = rhs`, at `rhs`'s offset.
    fn solve(&self, rhs: &GridArray) -> Result<GridArray, ValidationError>;
}

/// Removes the divergent part of a velocity field.
pub trait Projection: Send + Sync {
    /// A divergence-free field differing from `v` by a gradient.
    fn project(&self, v: &GridField) -> Result<GridField, ValidationError>;
}

impl<F> Projection for F
where
    F: Fn(&GridField) -> Result<GridField, ValidationError> + Send + Sync,
{
    fn project(&self, v: &GridField) -> Result<GridField, ValidationError> {
        self(v)
    }
}

/// External body force.
pub trait Forcing: Send + Sync {
    /// Force per unit volume, same arity and grid as `v`.
    fn force(&self, v: &GridField) -> Result<GridField, ValidationError>;
}

impl<F> Forcing for F
where
    F: Fn(&GridField) -> Result<GridField, ValidationError> + Send + Sync,
{
    fn force(&self, v: &GridField) -> Result<GridField, ValidationError> {
        self(v)
    }
}
