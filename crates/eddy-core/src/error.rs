//! Error types for the Eddy CFD toolkit.
//!
//! Two classes, split by when they can occur:
//!
//! - [`ConfigurationError`]: invalid construction-time parameters. Raised
//!   while building constraints, evaluators, grids and steppers, before any
//!   stepping happens. Never retried.
//! - [`ValidationError`]: runtime shape, offset, or stability mismatches on
//!   a single call. Fatal to that call; the caller must supply corrected
//!   input (smaller `dt`, correctly-shaped logits).
//!
//! There is no transient error class: nothing in this workspace performs
//! I/O.

use std::error::Error;
use std::fmt;

/// Invalid construction-time parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigurationError {
    /// Stencil steps differ between axes of one constraint group.
    NonuniformSteps {
        /// The steps that were supplied.
        steps: Vec<f64>,
    },
    /// The bias does not satisfy the accuracy constraints.
    InvalidBias {
        /// `‖A·bias − rhs‖`.
        residual: f64,
    },
    /// An explicit bias has the wrong number of entries.
    BiasLength {
        /// Flattened stencil size.
        expected: usize,
        /// Length of the supplied bias.
        actual: usize,
    },
    /// The constraint system leaves no freedom beyond the unique solution.
    NoDegreesOfFreedom {
        /// Number of stencil coefficients.
        stencil_size: usize,
        /// Number of constraint rows.
        constraints: usize,
    },
    /// Stencils, derivative orders, or offsets disagree in dimensionality.
    StencilMismatch {
        /// Description of the mismatch.
        reason: String,
    },
    /// Accuracy order must be at least 1.
    InvalidAccuracyOrder {
        /// The rejected order.
        order: u32,
    },
    /// A derivative passed to fusion requires a nonzero roll.
    DerivativeUsesRoll {
        /// Debug rendering of the derivative key.
        key: String,
        /// The offending roll.
        roll: Vec<i64>,
    },
    /// Derivatives passed to fusion cannot share one contraction.
    IncompatibleFusion {
        /// Description of the incompatibility.
        reason: String,
    },
    /// A grid definition failed validation.
    InvalidGrid {
        /// Description of the validation failure.
        reason: String,
    },
    /// A scalar parameter is out of range.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of the valid range.
        reason: String,
    },
    /// A required builder component was not supplied.
    MissingComponent {
        /// Component name.
        name: &'static str,
    },
    /// A dense matrix decomposition did not produce its factors.
    DecompositionFailed {
        /// Which decomposition failed.
        reason: String,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonuniformSteps { steps } => {
                write!(f, "nonuniform steps unsupported: {steps:?}")
            }
            Self::InvalidBias { residual } => {
                write!(f, "invalid bias, not in nullspace (residual {residual:e})")
            }
            Self::BiasLength { expected, actual } => {
                write!(f, "bias has {actual} entries, stencil has {expected}")
            }
            Self::NoDegreesOfFreedom {
                stencil_size,
                constraints,
            } => write!(
                f,
                "no degrees of freedom beyond the unique solution: \
                 {stencil_size} coefficients, {constraints} constraints"
            ),
            Self::StencilMismatch { reason } => write!(f, "stencil mismatch: {reason}"),
            Self::InvalidAccuracyOrder { order } => {
                write!(f, "accuracy order must be >= 1, got {order}")
            }
            Self::DerivativeUsesRoll { key, roll } => {
                write!(f, "derivative {key} uses roll {roll:?}; fusion needs aligned patches")
            }
            Self::IncompatibleFusion { reason } => write!(f, "incompatible fusion: {reason}"),
            Self::InvalidGrid { reason } => write!(f, "invalid grid: {reason}"),
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter '{name}': {reason}")
            }
            Self::MissingComponent { name } => write!(f, "{name} is required"),
            Self::DecompositionFailed { reason } => write!(f, "decomposition failed: {reason}"),
        }
    }
}

impl Error for ConfigurationError {}

/// Runtime shape, offset, and stability mismatches.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationError {
    /// The last dimension of the logits does not match the subspace size.
    LogitsWidthMismatch {
        /// Subspace size of the constraint.
        expected: usize,
        /// Width of the supplied logits.
        actual: usize,
    },
    /// Explicit diffusion would be unstable at the chosen time step.
    DiffusionStepTooSmall {
        /// Stable step for diffusion.
        diffusion_dt: f64,
        /// Step chosen from the advection bound.
        dt: f64,
    },
    /// Array shapes disagree.
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Supplied shape.
        actual: Vec<usize>,
    },
    /// Array offsets disagree.
    OffsetMismatch {
        /// Expected offset.
        expected: Vec<f64>,
        /// Supplied offset.
        actual: Vec<f64>,
    },
    /// Arrays live on grids with different shape, spacing, or topology.
    GridMismatch {
        /// Description of the difference.
        reason: String,
    },
    /// A collaborator returned a field with the wrong number of components.
    ArityMismatch {
        /// Number of components expected.
        expected: usize,
        /// Number of components returned.
        actual: usize,
    },
    /// A key was not part of the fused set.
    UnknownKey {
        /// Debug rendering of the key.
        key: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogitsWidthMismatch { expected, actual } => write!(
                f,
                "logits width mismatch: last dimension is {actual}, subspace size is {expected}"
            ),
            Self::DiffusionStepTooSmall { diffusion_dt, dt } => write!(
                f,
                "stable step for diffusion smaller than chosen: {diffusion_dt} vs {dt}"
            ),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "shape mismatch: expected {expected:?}, got {actual:?}")
            }
            Self::OffsetMismatch { expected, actual } => {
                write!(f, "offset mismatch: expected {expected:?}, got {actual:?}")
            }
            Self::GridMismatch { reason } => write!(f, "grid mismatch: {reason}"),
            Self::ArityMismatch { expected, actual } => {
                write!(f, "expected {expected} components, got {actual}")
            }
            Self::UnknownKey { key } => write!(f, "key {key} is not part of the fused set"),
        }
    }
}

impl Error for ValidationError {}

/// Either error class, for operations that both configure and evaluate.
#[derive(Clone, Debug, PartialEq)]
pub enum EddyError {
    /// Construction-time failure.
    Configuration(ConfigurationError),
    /// Per-call failure.
    Validation(ValidationError),
}

impl fmt::Display for EddyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration: {e}"),
            Self::Validation(e) => write!(f, "validation: {e}"),
        }
    }
}

impl Error for EddyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::Validation(e) => Some(e),
        }
    }
}

impl From<ConfigurationError> for EddyError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<ValidationError> for EddyError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}
