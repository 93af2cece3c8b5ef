//! Test fixtures and mock collaborators for Eddy development.
//!
//! Mock implementations of the solver seams ([`Convection`], [`Projection`],
//! [`Forcing`], [`Diffusion`], [`DiffusionSolve`], [`Advection`]) plus a
//! [`CallLog`] for asserting the order collaborators run in. Grids and
//! analytic fields live in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use eddy_core::ValidationError;
use eddy_grid::{Grid, GridArray, GridField};
use eddy_solver::{Advection, Convection, Diffusion, DiffusionSolve, Forcing, Projection};

/// Shared, ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name);
        }
    }

    /// Snapshot of the calls so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

/// Convection returning a zero tendency for every component.
pub struct ZeroConvection {
    log: Option<CallLog>,
}

impl ZeroConvection {
    pub fn new() -> Self {
        Self { log: None }
    }

    pub fn logged(log: &CallLog) -> Self {
        Self {
            log: Some(log.clone()),
        }
    }
}

impl Default for ZeroConvection {
    fn default() -> Self {
        Self::new()
    }
}

impl Convection for ZeroConvection {
    fn convect(&self, v: &GridField) -> Result<GridField, ValidationError> {
        if let Some(log) = &self.log {
            log.record("convect");
        }
        Ok(v.scaled(0.0))
    }
}

/// Projection returning its input unchanged.
pub struct IdentityProjection {
    log: Option<CallLog>,
}

impl IdentityProjection {
    pub fn new() -> Self {
        Self { log: None }
    }

    pub fn logged(log: &CallLog) -> Self {
        Self {
            log: Some(log.clone()),
        }
    }
}

impl Default for IdentityProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl Projection for IdentityProjection {
    fn project(&self, v: &GridField) -> Result<GridField, ValidationError> {
        if let Some(log) = &self.log {
            log.record("project");
        }
        Ok(v.clone())
    }
}

/// Forcing with a constant value on every component, counting its calls.
///
/// Uses `AtomicUsize` for the counter so it satisfies `Sync`.
pub struct ConstantForcing {
    pub value: f64,
    call_count: AtomicUsize,
}

impl ConstantForcing {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            call_count: AtomicUsize::new(0),
        }
    }

    /// How many times `force()` has been called.
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Forcing for ConstantForcing {
    fn force(&self, v: &GridField) -> Result<GridField, ValidationError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        GridField::new(v.iter().map(|c| c.map(|_| self.value)).collect())
    }
}

/// Explicit diffusion with a zero tendency and a fixed stability bound.
pub struct FixedBoundDiffusion {
    pub stable_dt: f64,
}

impl FixedBoundDiffusion {
    pub fn new(stable_dt: f64) -> Self {
        Self { stable_dt }
    }
}

impl Diffusion for FixedBoundDiffusion {
    fn diffuse(&self, c: &GridArray, _coefficient: f64) -> Result<GridArray, ValidationError> {
        Ok(c.scaled(0.0))
    }

    fn stable_time_step(&self, _viscosity: f64, _grid: &Grid) -> f64 {
        self.stable_dt
    }
}

/// Implicit diffusion returning its input unchanged.
pub struct IdentityDiffusionSolve {
    log: Option<CallLog>,
}

impl IdentityDiffusionSolve {
    pub fn new() -> Self {
        Self { log: None }
    }

    pub fn logged(log: &CallLog) -> Self {
        Self {
            log: Some(log.clone()),
        }
    }
}

impl Default for IdentityDiffusionSolve {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffusionSolve for IdentityDiffusionSolve {
    fn solve(&self, v: &GridField, _viscosity: f64, _dt: f64) -> Result<GridField, ValidationError> {
        if let Some(log) = &self.log {
            log.record("diffusion_solve");
        }
        Ok(v.clone())
    }
}

/// Advection with a zero tendency and the textbook CFL bound
/// `courant · min(step) / max_velocity`.
pub struct CflAdvection;

impl Advection for CflAdvection {
    fn advect(&self, c: &GridArray, _v: &GridField, _dt: f64) -> Result<GridArray, ValidationError> {
        Ok(c.scaled(0.0))
    }

    fn stable_time_step(&self, max_velocity: f64, max_courant_number: f64, grid: &Grid) -> f64 {
        max_courant_number * grid.min_step() / max_velocity
    }
}
