//! Reference operators for Eddy's Navier-Stokes collaborators.
//!
//! Everything here implements a seam from `eddy-solver`, so the stepper is
//! usable end to end without learned components.
//!
//! | Module | Provides |
//! |--------|----------|
//! | [`finite_differences`] | staggered differences, Laplacian, divergence, gradient |
//! | [`interpolation`] | linear and upwind interpolation between offsets |
//! | [`advection`] | flux-form [`AdvectGeneral`], [`SelfAdvection`] convection |
//! | [`diffusion`] | [`ExplicitDiffusion`]; implicit solve via [`FastDiagonalization`] |
//! | [`fast_diag`] | eigenbasis transforms of separable operators |
//! | [`pressure`] | [`PressureProjection`], [`ConjugateGradient`] |
//! | [`forcing`] | [`KolmogorovForcing`], [`LinearForcing`], [`SumForcing`] |
//! | [`presets`] | pre-wired steppers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod advection;
pub mod diffusion;
pub mod fast_diag;
pub mod finite_differences;
pub mod forcing;
pub mod interpolation;
pub mod presets;
pub mod pressure;

pub use advection::{advect_general, AdvectGeneral, SelfAdvection};
pub use diffusion::ExplicitDiffusion;
pub use fast_diag::FastDiagonalization;
pub use forcing::{KolmogorovForcing, LinearForcing, SumForcing};
pub use presets::{implicit_diffusion_navier_stokes, semi_implicit_navier_stokes};
pub use pressure::{ConjugateGradient, PressureProjection};
