//! Flux-form advection of scalars and velocity components.

use std::sync::Arc;

use eddy_core::ValidationError;
use eddy_grid::{Grid, GridArray, GridField, Offset};
use eddy_solver::{Advection, Convection};

use crate::finite_differences::backward_difference;
use crate::interpolation::{linear, linear_scalar, upwind};

/// Interpolates one velocity component to a target offset.
pub type VelocityInterpolation = fn(&GridArray, &Offset) -> Result<GridArray, ValidationError>;

/// Interpolates the advected quantity to a target offset, given the
/// velocity already interpolated there.
pub type ScalarInterpolation =
    fn(&GridArray, &Offset, &GridArray) -> Result<GridArray, ValidationError>;

/// Largest step with Courant number `max_courant_number`:
/// `max_courant_number · min(step) / max_velocity`.
pub fn cfl_time_step(max_velocity: f64, max_courant_number: f64, grid: &Grid) -> f64 {
    max_courant_number * grid.min_step() / max_velocity
}

/// Rate of change `−∇·(v c)` of `c` under velocity `v`.
///
/// For each axis the velocity is interpolated to the face of `c`'s control
/// volume with `u_interp`, `c` is interpolated there with `c_interp`, and
/// the flux `c·u` is differenced back to `c`'s offset.
///
/// # Errors
///
/// Returns [`ValidationError::ArityMismatch`] unless `v` has one component
/// per axis, [`ValidationError::GridMismatch`] if `c` and `v` live on
/// different grids, and propagates interpolation errors.
pub fn advect_general(
    c: &GridArray,
    v: &GridField,
    u_interp: VelocityInterpolation,
    c_interp: ScalarInterpolation,
) -> Result<GridArray, ValidationError> {
    let grid = c.grid();
    if v.len() != grid.ndim() {
        return Err(ValidationError::ArityMismatch {
            expected: grid.ndim(),
            actual: v.len(),
        });
    }
    if !Arc::ptr_eq(grid, v.grid()) {
        grid.check_same(v.grid())?;
    }

    let mut tendency = GridArray::zeros(c.offset().clone(), Arc::clone(grid));
    for (axis, u) in v.iter().enumerate() {
        let face = c.offset().shifted(axis, 0.5);
        let u_face = u_interp(u, &face)?;
        let c_face = c_interp(c, &face, &u_face)?;
        let (cf, uf) = (c_face.data(), u_face.data());
        let flux = GridArray::from_flat_fn(face, Arc::clone(grid), |i| cf[i] * uf[i]);
        tendency = tendency.axpy(-1.0, &backward_difference(&flux, axis))?;
    }
    Ok(tendency)
}

/// [`Advection`] through [`advect_general`] with fixed interpolation
/// schemes.
///
/// The default is upwind for the advected quantity and linear for the
/// velocity; [`centered`](Self::centered) uses linear for both.
#[derive(Clone, Copy, Debug)]
pub struct AdvectGeneral {
    velocity: VelocityInterpolation,
    scalar: ScalarInterpolation,
}

impl AdvectGeneral {
    /// Advection with the given interpolation schemes.
    pub fn new(velocity: VelocityInterpolation, scalar: ScalarInterpolation) -> Self {
        Self { velocity, scalar }
    }

    /// Second-order centered advection, linear for both quantities.
    pub fn centered() -> Self {
        Self::new(linear, linear_scalar)
    }
}

impl Default for AdvectGeneral {
    fn default() -> Self {
        Self::new(linear, upwind)
    }
}

impl Advection for AdvectGeneral {
    fn advect(&self, c: &GridArray, v: &GridField, _dt: f64) -> Result<GridArray, ValidationError> {
        advect_general(c, v, self.velocity, self.scalar)
    }

    fn stable_time_step(&self, max_velocity: f64, max_courant_number: f64, grid: &Grid) -> f64 {
        cfl_time_step(max_velocity, max_courant_number, grid)
    }
}

/// Convection of a velocity field by itself: each component is advected
/// by the whole field.
#[derive(Clone, Debug)]
pub struct SelfAdvection<A> {
    advection: A,
    dt: f64,
}

impl<A: Advection> SelfAdvection<A> {
    /// Convection through `advection`, passing `dt` to schemes that use it.
    pub fn new(advection: A, dt: f64) -> Self {
        Self { advection, dt }
    }

    /// The wrapped scheme.
    pub fn advection(&self) -> &A {
        &self.advection
    }
}

impl<A: Advection> Convection for SelfAdvection<A> {
    fn convect(&self, v: &GridField) -> Result<GridField, ValidationError> {
        let components = v
            .iter()
            .map(|u| self.advection.advect(u, v, self.dt))
            .collect::<Result<Vec<_>, _>>()?;
        GridField::new(components)
    }
}
