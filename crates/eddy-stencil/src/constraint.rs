//! Nullspace parametrization of polynomially accurate stencil coefficients.
//!
//! A [`PolynomialConstraint`] maps a `subspace_size`-wide logits vector to a
//! full coefficient set `bias + logits · nullspace`. Every image satisfies the
//! accuracy constraints, so a network emitting arbitrary logits can only
//! produce valid derivative stencils.

use crate::polynomial::{
    full_svd, polynomial_accuracy_coefficients, polynomial_accuracy_constraints, stencil_shape,
    Method, Stencil,
};
use eddy_core::{ConfigurationError, Precision, ValidationError};
use eddy_grid::{Channels, Shape};
use nalgebra::{DMatrix, DVector};

/// Maximum residual `‖A·bias − rhs‖` accepted for a bias.
pub const BIAS_TOLERANCE: f64 = 1e-8;

/// Relative tolerance when checking that all stencil steps agree.
const STEP_TOLERANCE: f64 = 1e-12;

/// Inputs shared by both [`PolynomialConstraint`] constructors.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintSpec {
    stencils: Vec<Stencil>,
    derivative_orders: Vec<u32>,
    method: Method,
    accuracy_order: u32,
    precision: Precision,
}

impl ConstraintSpec {
    /// One stencil and derivative order per axis. Accuracy order defaults to
    /// 1 and precision to [`Precision::Exact`].
    pub fn new(stencils: Vec<Stencil>, method: Method, derivative_orders: Vec<u32>) -> Self {
        Self {
            stencils,
            derivative_orders,
            method,
            accuracy_order: 1,
            precision: Precision::Exact,
        }
    }

    /// Order of polynomial accuracy enforced on every coefficient set.
    pub fn accuracy_order(mut self, order: u32) -> Self {
        self.accuracy_order = order;
        self
    }

    /// Contraction precision for [`PolynomialConstraint::apply`].
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Per-axis stencils.
    pub fn stencils(&self) -> &[Stencil] {
        &self.stencils
    }

    /// Per-axis derivative orders.
    pub fn derivative_orders(&self) -> &[u32] {
        &self.derivative_orders
    }

    /// Discretization method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The common step, or `NonuniformSteps` if the stencils disagree.
    fn uniform_step(&self) -> Result<f64, ConfigurationError> {
        let steps: Vec<f64> = self.stencils.iter().map(Stencil::step).collect();
        let first = steps.first().copied().unwrap_or(1.0);
        let uniform = steps
            .iter()
            .all(|s| (s - first).abs() <= STEP_TOLERANCE * first.abs().max(1.0));
        if uniform {
            Ok(first)
        } else {
            Err(ConfigurationError::NonuniformSteps { steps })
        }
    }
}

/// Polynomially accurate stencil coefficients parametrized by logits.
///
/// Immutable after construction and freely shareable across threads.
#[derive(Clone, Debug)]
pub struct PolynomialConstraint {
    constraint_matrix: DMatrix<f64>,
    rhs: DVector<f64>,
    bias: Vec<f64>,
    nullspace: DMatrix<f64>,
    stencil_shape: Shape,
    precision: Precision,
}

impl PolynomialConstraint {
    /// Build a constraint whose bias is the standard minimum-norm stencil of
    /// `bias_accuracy_order`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the steps are nonuniform, the
    /// standard stencil does not satisfy the constraint at the configured
    /// accuracy order, or the constraint leaves no degrees of freedom.
    pub fn from_default_bias(
        spec: &ConstraintSpec,
        bias_accuracy_order: u32,
    ) -> Result<Self, ConfigurationError> {
        spec.uniform_step()?;
        let bias = polynomial_accuracy_coefficients(
            &spec.stencils,
            spec.method,
            &spec.derivative_orders,
            bias_accuracy_order,
        )?;
        Self::build(spec, bias)
    }

    /// Build a constraint around a caller-supplied bias.
    ///
    /// # Errors
    ///
    /// As [`from_default_bias`](Self::from_default_bias), plus
    /// [`ConfigurationError::BiasLength`] if `bias` does not have one entry
    /// per stencil point.
    pub fn from_explicit_bias(spec: &ConstraintSpec, bias: Vec<f64>) -> Result<Self, ConfigurationError> {
        spec.uniform_step()?;
        Self::build(spec, bias)
    }

    fn build(spec: &ConstraintSpec, bias: Vec<f64>) -> Result<Self, ConfigurationError> {
        let step = spec.uniform_step()?;
        let (a, rhs) = polynomial_accuracy_constraints(
            &spec.stencils,
            spec.method,
            &spec.derivative_orders,
            spec.accuracy_order,
        )?;
        let (nrows, ncols) = a.shape();

        if bias.len() != ncols {
            return Err(ConfigurationError::BiasLength {
                expected: ncols,
                actual: bias.len(),
            });
        }
        let residual = (&a * DVector::from_column_slice(&bias) - &rhs).norm();
        if residual > BIAS_TOLERANCE {
            return Err(ConfigurationError::InvalidBias { residual });
        }
        if ncols <= nrows {
            return Err(ConfigurationError::NoDegreesOfFreedom {
                stencil_size: ncols,
                constraints: nrows,
            });
        }

        let subspace_size = ncols - nrows;
        let svd = full_svd(&a)?;
        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&i, &j| svd.singular_values[j].total_cmp(&svd.singular_values[i]));

        // coefficients carry 1/h^order
        let total_order: u32 = spec.derivative_orders.iter().sum();
        let scale = 1.0 / step.powi(total_order as i32);
        let mut nullspace = DMatrix::<f64>::zeros(subspace_size, ncols);
        for (row, &i) in order[ncols - subspace_size..].iter().enumerate() {
            nullspace.set_row(row, &(svd.v_t.row(i) * scale));
        }

        log::debug!(
            "polynomial constraint: {} coefficients, {} constraints, subspace {}, bias residual {:e}",
            ncols,
            nrows,
            subspace_size,
            residual
        );

        Ok(Self {
            constraint_matrix: a,
            rhs,
            bias,
            nullspace,
            stencil_shape: stencil_shape(&spec.stencils),
            precision: spec.precision,
        })
    }

    /// Coefficients `bias + logits · nullspace` at every point of `logits`.
    ///
    /// The output has the spatial shape of `logits` and `stencil_size`
    /// channels.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::LogitsWidthMismatch`] if the channel count
    /// of `logits` differs from [`subspace_size`](Self::subspace_size).
    pub fn apply(&self, logits: &Channels) -> Result<Channels, ValidationError> {
        self.check_width(logits.channels())?;
        let mut out = Channels::zeros(logits.shape(), self.stencil_size());
        for point in 0..logits.points() {
            self.coefficients_into(logits.point(point), out.point_mut(point));
        }
        Ok(out)
    }

    /// Return `Ok` if a logits vector of `width` entries can be applied.
    pub fn check_width(&self, width: usize) -> Result<(), ValidationError> {
        if width == self.subspace_size() {
            Ok(())
        } else {
            Err(ValidationError::LogitsWidthMismatch {
                expected: self.subspace_size(),
                actual: width,
            })
        }
    }

    /// Write the coefficients for one logits vector into `out`. Widths must
    /// already be checked.
    pub(crate) fn coefficients_into(&self, logits: &[f64], out: &mut [f64]) {
        for (j, slot) in out.iter_mut().enumerate() {
            let column = self.nullspace.column(j);
            *slot = self
                .precision
                .accumulate(self.bias[j], logits.iter().copied().zip(column.iter().copied()));
        }
    }

    /// Zero-logit coefficients.
    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    /// Basis of valid coefficient perturbations, `[subspace_size, stencil_size]`.
    pub fn nullspace(&self) -> &DMatrix<f64> {
        &self.nullspace
    }

    /// Polynomial-accuracy constraint matrix.
    pub fn constraint_matrix(&self) -> &DMatrix<f64> {
        &self.constraint_matrix
    }

    /// Right-hand side of the constraint system.
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// Number of free parameters.
    pub fn subspace_size(&self) -> usize {
        self.nullspace.nrows()
    }

    /// Number of stencil points.
    pub fn stencil_size(&self) -> usize {
        self.bias.len()
    }

    /// Per-axis stencil extents.
    pub fn stencil_shape(&self) -> &[usize] {
        &self.stencil_shape
    }

    /// Contraction precision.
    pub fn precision(&self) -> Precision {
        self.precision
    }
}
