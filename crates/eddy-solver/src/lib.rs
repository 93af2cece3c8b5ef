//! Navier-Stokes time stepping for Eddy.
//!
//! [`NavierStokes`] composes a convection term, a diffusion scheme
//! (explicit or implicit), optional forcing and a pressure projection into
//! a pure step function. Every physical process is a trait in [`traits`];
//! reference implementations live in `eddy-operators`.
//!
//! Time-step selection from CFL and diffusion bounds is in [`timestep`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod equations;
pub mod timestep;
pub mod traits;

pub use config::NavierStokesConfig;
pub use equations::{NavierStokes, NavierStokesBuilder};
pub use timestep::{dynamic_time_step, max_velocity, stable_time_step};
pub use traits::{Advection, Convection, Diffusion, DiffusionSolve, Forcing, PressureSolve, Projection};
