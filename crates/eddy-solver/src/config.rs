//! Physical and numerical parameters for a Navier-Stokes run.

use eddy_core::ConfigurationError;

// ── NavierStokesConfig ─────────────────────────────────────────────

/// Parameters shared by the stepper presets and time-step selection.
#[derive(Clone, Debug, PartialEq)]
pub struct NavierStokesConfig {
    /// Fluid density. Default: 1.0.
    pub density: f64,
    /// Kinematic viscosity. Default: 1e-3.
    pub viscosity: f64,
    /// Time step. Default: 1e-3.
    pub dt: f64,
    /// Largest Courant number accepted when picking a step. Default: 0.5.
    pub max_courant_number: f64,
    /// Solve diffusion implicitly after projection. Default: false.
    pub implicit_diffusion: bool,
}

impl Default for NavierStokesConfig {
    fn default() -> Self {
        Self {
            density: 1.0,
            viscosity: 1e-3,
            dt: 1e-3,
            max_courant_number: 0.5,
            implicit_diffusion: false,
        }
    }
}

impl NavierStokesConfig {
    /// Check every parameter's range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] naming the first
    /// parameter out of range.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        positive("density", self.density)?;
        non_negative("viscosity", self.viscosity)?;
        positive("dt", self.dt)?;
        positive("max_courant_number", self.max_courant_number)?;
        Ok(())
    }

    /// This config with the step replaced.
    pub fn with_dt(&self, dt: f64) -> Self {
        Self { dt, ..self.clone() }
    }
}

pub(crate) fn positive(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            name,
            reason: format!("must be finite and positive, got {value}"),
        })
    }
}

pub(crate) fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            name,
            reason: format!("must be finite and non-negative, got {value}"),
        })
    }
}
