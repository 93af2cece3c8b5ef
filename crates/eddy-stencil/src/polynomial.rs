//! Polynomial-accuracy constraint systems for stencil coefficients.
//!
//! A coefficient vector `c` over a tensor-product stencil approximates the
//! mixed derivative `∂^{d_0}…∂^{d_{n-1}}` at the origin with polynomial
//! accuracy `k` when it differentiates every monomial of total degree up to
//! `k + Σ d_i − 1` exactly. Each monomial contributes one row of
//! `A · c = rhs`.

use eddy_core::ConfigurationError;
use eddy_grid::index::{element_count, indices};
use eddy_grid::Shape;
use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;

/// Coefficients below this magnitude are flushed to zero.
const ZERO_FLUSH: f64 = 1e-12;

/// Discretization represented by stencil values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// Values are averages over the cell centered at each stencil point.
    FiniteVolume,
    /// Values are point samples at each stencil point.
    FiniteDifference,
}

/// One-dimensional stencil: offsets in cell units and the cell size.
#[derive(Clone, Debug, PartialEq)]
pub struct Stencil {
    offsets: Vec<f64>,
    step: f64,
}

impl Stencil {
    /// Create a stencil from offsets measured in cells.
    pub fn new(offsets: Vec<f64>, step: f64) -> Self {
        Self { offsets, step }
    }

    /// A centered integer stencil `[-half, …, half]`.
    pub fn centered(half_width: usize, step: f64) -> Self {
        let h = half_width as i64;
        Self::new((-h..=h).map(|k| k as f64).collect(), step)
    }

    /// Offsets in cell units.
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Cell size.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the stencil has no points.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Physical positions `offset · step`.
    pub fn positions(&self) -> impl Iterator<Item = f64> + '_ {
        self.offsets.iter().map(move |o| o * self.step)
    }
}

/// All exponent tuples over `ndim` axes with total degree at most `degree`,
/// lexicographic in the leading axis.
fn exponents_up_to_degree(degree: u32, ndim: usize) -> Vec<SmallVec<[u32; 4]>> {
    if ndim == 0 {
        return vec![SmallVec::new()];
    }
    let mut out = Vec::new();
    for d in 0..=degree {
        for rest in exponents_up_to_degree(degree - d, ndim - 1) {
            let mut e: SmallVec<[u32; 4]> = SmallVec::with_capacity(ndim);
            e.push(d);
            e.extend_from_slice(&rest);
            out.push(e);
        }
    }
    out
}

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

/// Per-axis row term: the monomial `x^m` as represented by each stencil value.
fn monomial_term(stencil: &Stencil, exponent: u32, method: Method) -> Vec<f64> {
    let h = stencil.step();
    match method {
        Method::FiniteDifference => stencil.positions().map(|x| x.powi(exponent as i32)).collect(),
        Method::FiniteVolume => {
            let p = exponent as i32 + 1;
            stencil
                .positions()
                .map(|x| ((x + h / 2.0).powi(p) - (x - h / 2.0).powi(p)) / (h * f64::from(p)))
                .collect()
        }
    }
}

/// Shape of the tensor-product stencil.
pub fn stencil_shape(stencils: &[Stencil]) -> Shape {
    stencils.iter().map(Stencil::len).collect()
}

fn check_inputs(
    stencils: &[Stencil],
    derivative_orders: &[u32],
    accuracy_order: u32,
) -> Result<(), ConfigurationError> {
    if stencils.len() != derivative_orders.len() {
        return Err(ConfigurationError::StencilMismatch {
            reason: format!(
                "{} stencils for {} derivative orders",
                stencils.len(),
                derivative_orders.len()
            ),
        });
    }
    if stencils.is_empty() || stencils.iter().any(Stencil::is_empty) {
        return Err(ConfigurationError::StencilMismatch {
            reason: "every axis needs a non-empty stencil".to_string(),
        });
    }
    if accuracy_order < 1 {
        return Err(ConfigurationError::InvalidAccuracyOrder {
            order: accuracy_order,
        });
    }
    Ok(())
}

/// Build the linear system `A · c = rhs` whose solutions are stencil
/// coefficients accurate to `accuracy_order`.
///
/// Columns follow the row-major flattening of the tensor-product stencil.
///
/// # Errors
///
/// Returns [`ConfigurationError`] if the stencil and derivative counts
/// differ, a stencil is empty, or `accuracy_order` is zero.
pub fn polynomial_accuracy_constraints(
    stencils: &[Stencil],
    method: Method,
    derivative_orders: &[u32],
    accuracy_order: u32,
) -> Result<(DMatrix<f64>, DVector<f64>), ConfigurationError> {
    check_inputs(stencils, derivative_orders, accuracy_order)?;

    let shape = stencil_shape(stencils);
    let ncols = element_count(&shape);
    let max_degree = accuracy_order + derivative_orders.iter().sum::<u32>() - 1;
    let exponents = exponents_up_to_degree(max_degree, stencils.len());

    let mut a = DMatrix::<f64>::zeros(exponents.len(), ncols);
    let mut rhs = DVector::<f64>::zeros(exponents.len());
    for (row, exps) in exponents.iter().enumerate() {
        let terms: Vec<Vec<f64>> = stencils
            .iter()
            .zip(exps)
            .map(|(s, &m)| monomial_term(s, m, method))
            .collect();
        for (col, idx) in indices(&shape).enumerate() {
            a[(row, col)] = idx.iter().zip(&terms).map(|(&i, t)| t[i]).product();
        }
        // d^m/dx^m x^m = m!; every other monomial vanishes at the origin.
        if exps.iter().zip(derivative_orders).all(|(e, d)| e == d) {
            rhs[row] = exps.iter().map(|&m| factorial(m)).product();
        }
    }
    Ok((a, rhs))
}

/// Singular value decomposition of `a` padded with zero rows to be square
/// when it is wide, so that the full right-singular basis is available.
pub(crate) struct FullSvd {
    pub u: DMatrix<f64>,
    pub singular_values: DVector<f64>,
    pub v_t: DMatrix<f64>,
}

pub(crate) fn full_svd(a: &DMatrix<f64>) -> Result<FullSvd, ConfigurationError> {
    let (nrows, ncols) = a.shape();
    let n = nrows.max(ncols);
    let mut padded = DMatrix::<f64>::zeros(n, ncols);
    padded.view_mut((0, 0), (nrows, ncols)).copy_from(a);
    let svd = padded.svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => Ok(FullSvd {
            u,
            singular_values: svd.singular_values,
            v_t,
        }),
        _ => Err(ConfigurationError::DecompositionFailed {
            reason: "SVD did not return singular vectors".to_string(),
        }),
    }
}

/// Minimum-norm least-squares solution of `a · x = b`.
pub(crate) fn min_norm_solve(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, ConfigurationError> {
    let svd = full_svd(a)?;
    let n = svd.u.nrows();
    let mut padded_b = DVector::<f64>::zeros(n);
    padded_b.rows_mut(0, b.len()).copy_from(b);

    let s_max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let tol = s_max * n as f64 * f64::EPSILON;
    let mut x = DVector::<f64>::zeros(a.ncols());
    for (i, &s) in svd.singular_values.iter().enumerate() {
        if s > tol {
            let weight = svd.u.column(i).dot(&padded_b) / s;
            x += svd.v_t.row(i).transpose() * weight;
        }
    }
    Ok(x)
}

/// Standard coefficients of the given accuracy: the minimum-norm solution of
/// [`polynomial_accuracy_constraints`], flattened row-major, with
/// negligible entries flushed to zero.
///
/// # Errors
///
/// Same conditions as [`polynomial_accuracy_constraints`].
pub fn polynomial_accuracy_coefficients(
    stencils: &[Stencil],
    method: Method,
    derivative_orders: &[u32],
    accuracy_order: u32,
) -> Result<Vec<f64>, ConfigurationError> {
    let (a, rhs) = polynomial_accuracy_constraints(stencils, method, derivative_orders, accuracy_order)?;
    let x = min_norm_solve(&a, &rhs)?;
    Ok(x
        .iter()
        .map(|&v| if v.abs() < ZERO_FLUSH { 0.0 } else { v })
        .collect())
}
