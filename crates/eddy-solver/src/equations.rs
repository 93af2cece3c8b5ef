//! First-order Navier-Stokes time stepping with exact projection.
//!
//! Two schemes share one stepper:
//!
//! - **explicit diffusion**: convection, diffusion and forcing are summed
//!   into one acceleration, the velocity advances by forward Euler, and the
//!   result is projected;
//! - **implicit diffusion**: convection and forcing advance the velocity,
//!   the result is projected, then diffusion is solved implicitly.
//!
//! Projection is the last operation of the explicit scheme, so its output
//! is divergence free.

use crate::config::{non_negative, positive, NavierStokesConfig};
use crate::traits::{Convection, Diffusion, DiffusionSolve, Forcing, Projection};
use eddy_core::{ConfigurationError, ValidationError};
use eddy_grid::GridField;

enum DiffusionScheme {
    Explicit(Box<dyn Diffusion>),
    Implicit(Box<dyn DiffusionSolve>),
}

/// A pure Navier-Stokes step function.
///
/// All parameters are fixed at construction; [`step`](Self::step) consumes a
/// velocity field and returns the next one without touching shared state.
///
/// # Construction
///
/// ```
/// use eddy_core::ValidationError;
/// use eddy_grid::GridField;
/// use eddy_solver::{Diffusion, NavierStokes};
/// # use eddy_grid::{Grid, GridArray};
/// # struct NoDiffusion;
/// # impl Diffusion for NoDiffusion {
/// #     fn diffuse(&self, c: &GridArray, _: f64) -> Result<GridArray, ValidationError> { Ok(c.scaled(0.0)) }
/// #     fn stable_time_step(&self, _: f64, _: &Grid) -> f64 { f64::INFINITY }
/// # }
///
/// let still = |v: &GridField| -> Result<GridField, ValidationError> { Ok(v.scaled(0.0)) };
/// let identity = |v: &GridField| -> Result<GridField, ValidationError> { Ok(v.clone()) };
/// let stepper = NavierStokes::builder()
///     .density(1.0)
///     .viscosity(0.0)
///     .dt(0.01)
///     .convection(still)
///     .projection(identity)
///     .explicit_diffusion(NoDiffusion)
///     .build()
///     .unwrap();
/// assert!(!stepper.implicit_diffusion());
/// ```
pub struct NavierStokes {
    density: f64,
    viscosity: f64,
    dt: f64,
    convection: Box<dyn Convection>,
    projection: Box<dyn Projection>,
    forcing: Option<Box<dyn Forcing>>,
    diffusion: DiffusionScheme,
}

/// Builder for [`NavierStokes`].
///
/// Required: `density`, `viscosity`, `dt`, `convection`, `projection`, and
/// exactly one of `explicit_diffusion` / `implicit_diffusion`. Forcing is
/// optional.
#[derive(Default)]
pub struct NavierStokesBuilder {
    density: Option<f64>,
    viscosity: Option<f64>,
    dt: Option<f64>,
    convection: Option<Box<dyn Convection>>,
    projection: Option<Box<dyn Projection>>,
    forcing: Option<Box<dyn Forcing>>,
    explicit: Option<Box<dyn Diffusion>>,
    implicit: Option<Box<dyn DiffusionSolve>>,
}

impl NavierStokes {
    /// Create a new builder.
    pub fn builder() -> NavierStokesBuilder {
        NavierStokesBuilder::default()
    }

    /// Fluid density.
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Kinematic viscosity.
    pub fn viscosity(&self) -> f64 {
        self.viscosity
    }

    /// Time step.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Whether diffusion is solved implicitly.
    pub fn implicit_diffusion(&self) -> bool {
        matches!(self.diffusion, DiffusionScheme::Implicit(_))
    }

    /// Advance `v` by one step.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ArityMismatch`] if a collaborator returns
    /// the wrong number of components, and propagates collaborator errors.
    pub fn step(&self, v: &GridField) -> Result<GridField, ValidationError> {
        let mut acceleration = self.convection.convect(v)?;
        v.check_arity(&acceleration)?;

        if let DiffusionScheme::Explicit(diffusion) = &self.diffusion {
            if self.viscosity != 0.0 {
                let coefficient = self.viscosity / self.density;
                let diffused = v
                    .iter()
                    .map(|u| diffusion.diffuse(u, coefficient))
                    .collect::<Result<Vec<_>, _>>()?;
                acceleration = acceleration.try_add(&GridField::new(diffused)?)?;
            }
        }

        if let Some(forcing) = &self.forcing {
            let force = forcing.force(v)?;
            v.check_arity(&force)?;
            acceleration = acceleration.axpy(1.0 / self.density, &force)?;
        }

        let advanced = v.axpy(self.dt, &acceleration)?;
        let projected = self.projection.project(&advanced)?;
        v.check_arity(&projected)?;

        let next = match &self.diffusion {
            DiffusionScheme::Explicit(_) => projected,
            DiffusionScheme::Implicit(solve) => {
                let solved = solve.solve(&projected, self.viscosity, self.dt)?;
                v.check_arity(&solved)?;
                solved
            }
        };
        log::trace!(
            "navier-stokes step dt={} max |v| {:.3e} -> {:.3e}",
            self.dt,
            v.max_abs(),
            next.max_abs()
        );
        Ok(next)
    }
}

impl NavierStokesBuilder {
    /// Fill density, viscosity and step from a config.
    pub fn config(self, config: &NavierStokesConfig) -> Self {
        self.density(config.density).viscosity(config.viscosity).dt(config.dt)
    }

    /// Fluid density.
    pub fn density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self
    }

    /// Kinematic viscosity.
    pub fn viscosity(mut self, viscosity: f64) -> Self {
        self.viscosity = Some(viscosity);
        self
    }

    /// Time step.
    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }

    /// Convection operator.
    pub fn convection(mut self, convection: impl Convection + 'static) -> Self {
        self.convection = Some(Box::new(convection));
        self
    }

    /// Pressure projection.
    pub fn projection(mut self, projection: impl Projection + 'static) -> Self {
        self.projection = Some(Box::new(projection));
        self
    }

    /// External forcing.
    pub fn forcing(mut self, forcing: impl Forcing + 'static) -> Self {
        self.forcing = Some(Box::new(forcing));
        self
    }

    /// Diffuse explicitly inside the acceleration sum.
    pub fn explicit_diffusion(mut self, diffusion: impl Diffusion + 'static) -> Self {
        self.explicit = Some(Box::new(diffusion));
        self
    }

    /// Solve diffusion implicitly after projection.
    pub fn implicit_diffusion(mut self, solve: impl DiffusionSolve + 'static) -> Self {
        self.implicit = Some(Box::new(solve));
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingComponent`] for a missing
    /// parameter or collaborator, and
    /// [`ConfigurationError::InvalidParameter`] for out-of-range values or
    /// when both diffusion schemes are given.
    pub fn build(self) -> Result<NavierStokes, ConfigurationError> {
        let density = self
            .density
            .ok_or(ConfigurationError::MissingComponent { name: "density" })?;
        let viscosity = self
            .viscosity
            .ok_or(ConfigurationError::MissingComponent { name: "viscosity" })?;
        let dt = self.dt.ok_or(ConfigurationError::MissingComponent { name: "dt" })?;
        positive("density", density)?;
        non_negative("viscosity", viscosity)?;
        positive("dt", dt)?;

        let convection = self
            .convection
            .ok_or(ConfigurationError::MissingComponent { name: "convection" })?;
        let projection = self
            .projection
            .ok_or(ConfigurationError::MissingComponent { name: "projection" })?;
        let diffusion = match (self.explicit, self.implicit) {
            (Some(d), None) => DiffusionScheme::Explicit(d),
            (None, Some(s)) => DiffusionScheme::Implicit(s),
            (None, None) => return Err(ConfigurationError::MissingComponent { name: "diffusion" }),
            (Some(_), Some(_)) => {
                return Err(ConfigurationError::InvalidParameter {
                    name: "diffusion",
                    reason: "choose explicit or implicit diffusion, not both".to_string(),
                })
            }
        };

        log::debug!(
            "navier-stokes stepper: density={density} viscosity={viscosity} dt={dt} implicit={} forcing={}",
            matches!(diffusion, DiffusionScheme::Implicit(_)),
            self.forcing.is_some()
        );

        Ok(NavierStokes {
            density,
            viscosity,
            dt,
            convection,
            projection,
            forcing: self.forcing,
            diffusion,
        })
    }
}
