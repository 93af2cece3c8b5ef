//! Staggered grids and grid-located data for Eddy.
//!
//! This crate defines the [`Grid`] geometry consumed read-only by every
//! numerical operation, the [`GridArray`] / [`GridField`] data carried
//! between operators, and the [`Channels`] layout used for logits,
//! coefficients and stencil patches.
//!
//! # Boundary topology
//!
//! Every grid carries one [`EdgeBehavior`] (wrap, clamp, mirror). Index
//! resolution for out-of-range neighbours lives in [`index`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod array;
pub mod channels;
pub mod edge;
pub mod grid;
pub mod index;

pub use array::{GridArray, GridField};
pub use channels::Channels;
pub use edge::EdgeBehavior;
pub use grid::{Grid, Offset};
pub use index::Shape;
