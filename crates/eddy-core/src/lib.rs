//! Core types for the Eddy CFD toolkit.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! error taxonomy shared by every other crate and the explicit contraction
//! [`Precision`] threaded through constrained-coefficient evaluation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod precision;

pub use error::{ConfigurationError, EddyError, ValidationError};
pub use precision::Precision;
