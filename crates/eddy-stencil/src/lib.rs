//! Polynomially constrained stencils and learned spatial derivatives.
//!
//! The pieces, leaves first:
//!
//! - [`polynomial`]: the linear system encoding polynomial accuracy of a
//!   tensor-product stencil, and its standard minimum-norm solution.
//! - [`constraint`]: [`PolynomialConstraint`], mapping logits to valid
//!   coefficients as `bias + logits · nullspace`.
//! - [`geometry`] and [`patches`]: alignment of staggered input and target
//!   locations, and per-point stencil patches.
//! - [`derivative`]: derivatives from explicit logits or from a [`Tower`].
//! - [`fusion`]: several derivatives through one block-diagonal
//!   contraction.
//! - [`conv`], [`tower`], [`rescale`]: network plumbing for learned
//!   coefficients.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod constraint;
pub mod conv;
pub mod derivative;
pub mod fusion;
pub mod geometry;
pub mod patches;
pub mod polynomial;
pub mod rescale;
pub mod tower;

pub use constraint::{ConstraintSpec, PolynomialConstraint};
pub use conv::{Conv, ConvPadding};
pub use derivative::{SpatialDerivative, SpatialDerivativeFromLogits, SpatialDerivativeSpec, StencilCoefficients};
pub use fusion::{fuse, FuseOptions, FusedDerivatives, FusedEvaluator};
pub use geometry::{roll_and_shift, Alignment};
pub use patches::PatchMethod;
pub use polynomial::{polynomial_accuracy_coefficients, polynomial_accuracy_constraints, Method, Stencil};
pub use rescale::rescale_to_range;
pub use tower::{ConvTower, ConvTowerFactory, Tower, TowerFactory};
