//! Eddy: staggered-grid Navier-Stokes solvers with learnable,
//! polynomially constrained stencils.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Eddy sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use eddy::prelude::*;
//! use std::f64::consts::PI;
//! use std::sync::Arc;
//!
//! // 32×32 periodic box of side 2π.
//! let grid = Arc::new(Grid::uniform(&[32, 32], 2.0 * PI / 32.0, EdgeBehavior::Wrap).unwrap());
//! let config = NavierStokesConfig { viscosity: 0.01, dt: 0.01, ..Default::default() };
//! let stepper = eddy::operators::presets::navier_stokes(&config, &grid)
//!     .unwrap()
//!     .forcing(KolmogorovForcing::default())
//!     .build()
//!     .unwrap();
//!
//! let rest: Vec<GridArray> = grid
//!     .cell_faces()
//!     .into_iter()
//!     .map(|offset| GridArray::zeros(offset, grid.clone()))
//!     .collect();
//! let mut v = GridField::new(rest).unwrap();
//! for _ in 0..3 {
//!     v = stepper.step(&v).unwrap();
//! }
//! assert!(v.max_abs() > 0.0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `eddy-core` | Error taxonomy and contraction precision |
//! | [`grid`] | `eddy-grid` | Staggered grids, offsets, grid arrays and channel tensors |
//! | [`stencil`] | `eddy-stencil` | Polynomial constraints, learned derivatives, fusion |
//! | [`solver`] | `eddy-solver` | Operator traits, config, Navier-Stokes stepper, time steps |
//! | [`operators`] | `eddy-operators` | Finite differences, advection, diffusion, projection, forcing |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Errors and contraction precision (`eddy-core`).
pub use eddy_core as types;

/// Staggered grids and grid-aligned data (`eddy-grid`).
///
/// [`grid::Grid`] carries shape, step and [`grid::EdgeBehavior`];
/// [`grid::GridArray`] and [`grid::GridField`] pair data with an offset.
pub use eddy_grid as grid;

/// Polynomially constrained stencils (`eddy-stencil`).
///
/// Build a [`stencil::PolynomialConstraint`], or go straight to a
/// [`stencil::SpatialDerivative`] driven by a [`stencil::Tower`].
pub use eddy_stencil as stencil;

/// Operator traits and the Navier-Stokes stepper (`eddy-solver`).
pub use eddy_solver as solver;

/// Reference operator implementations (`eddy-operators`).
///
/// Includes [`operators::AdvectGeneral`], [`operators::FastDiagonalization`]
/// and the [`operators::presets`] wiring them into a stepper.
pub use eddy_operators as operators;

/// Common imports for typical Eddy usage.
///
/// ```rust
/// use eddy::prelude::*;
/// ```
pub mod prelude {
    // Core
    pub use eddy_core::{ConfigurationError, EddyError, Precision, ValidationError};

    // Grid
    pub use eddy_grid::{Channels, EdgeBehavior, Grid, GridArray, GridField, Offset};

    // Stencils
    pub use eddy_stencil::{
        ConstraintSpec, Method, PolynomialConstraint, SpatialDerivative, SpatialDerivativeFromLogits,
        SpatialDerivativeSpec, Stencil,
    };

    // Solver
    pub use eddy_solver::{
        Advection, Convection, Diffusion, DiffusionSolve, Forcing, NavierStokes, NavierStokesConfig,
        PressureSolve, Projection,
    };

    // Operators
    pub use eddy_operators::{
        AdvectGeneral, ConjugateGradient, ExplicitDiffusion, FastDiagonalization, KolmogorovForcing,
        PressureProjection, SelfAdvection,
    };
}
