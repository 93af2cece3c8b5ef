//! Fast diagonalization of separable operators.
//!
//! An operator that is a sum of per-axis symmetric matrices, such as the
//! Laplacian `L = Lx ⊕ Ly`, is diagonal in the tensor product of the
//! per-axis eigenbases. Applying `f(L)` then costs one small dense transform
//! per axis plus a pointwise multiply by `f(λx + λy)`.
//!
//! [`FastDiagonalization`] serves as the default pressure solver (pseudo
//! inverse of the Laplacian) and as the implicit diffusion solver (inverse
//! of `I − ν dt L`).

use eddy_core::{ConfigurationError, ValidationError};
use eddy_grid::index::{element_count, indices, resolve_axis, strides, Shape};
use eddy_grid::{EdgeBehavior, Grid};
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Eigenvalues below this fraction of the largest are treated as zero by
/// [`FastDiagonalization::pseudo_inverse`].
pub const PSEUDO_INVERSE_RTOL: f64 = 1e-10;

const SYMMETRY_TOL: f64 = 1e-12;

/// Dense 1-D second-difference matrix for `size` points spaced `step`
/// apart, with out-of-range neighbours resolved under `edge`.
pub fn laplacian_matrix(size: usize, step: f64, edge: EdgeBehavior) -> DMatrix<f64> {
    let inv_h2 = 1.0 / (step * step);
    let mut m = DMatrix::<f64>::zeros(size, size);
    for i in 0..size {
        m[(i, i)] -= 2.0 * inv_h2;
        for delta in [-1, 1] {
            let j = resolve_axis(i as i64 + delta, size, edge);
            m[(i, j)] += inv_h2;
        }
    }
    m
}

/// Precomputed eigenbasis of a separable symmetric operator.
#[derive(Clone, Debug)]
pub struct FastDiagonalization {
    shape: Shape,
    grid: Option<Grid>,
    eigenvectors: Vec<DMatrix<f64>>,
    eigenvalues: Vec<f64>,
}

impl FastDiagonalization {
    /// Diagonalize `Σ_axis operators[axis]`, one square symmetric matrix per
    /// axis.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for an empty list or
    /// a non-square or non-symmetric matrix, and
    /// [`ConfigurationError::DecompositionFailed`] if an eigendecomposition
    /// does not converge.
    pub fn new(operators: &[DMatrix<f64>]) -> Result<Self, ConfigurationError> {
        if operators.is_empty() {
            return Err(ConfigurationError::InvalidParameter {
                name: "operators",
                reason: "at least one axis is required".to_string(),
            });
        }
        let mut shape = Shape::new();
        let mut eigenvectors = Vec::with_capacity(operators.len());
        let mut axis_values = Vec::with_capacity(operators.len());
        for (axis, op) in operators.iter().enumerate() {
            if !op.is_square() || op.nrows() == 0 {
                return Err(ConfigurationError::InvalidParameter {
                    name: "operators",
                    reason: format!("axis {axis} operator is {}x{}", op.nrows(), op.ncols()),
                });
            }
            let asymmetry = (op - op.transpose()).amax();
            if asymmetry > SYMMETRY_TOL * op.amax().max(1.0) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "operators",
                    reason: format!("axis {axis} operator is not symmetric ({asymmetry:e})"),
                });
            }
            let eigen = SymmetricEigen::try_new(op.clone(), f64::EPSILON, 0).ok_or_else(|| {
                ConfigurationError::DecompositionFailed {
                    reason: format!("symmetric eigendecomposition of axis {axis}"),
                }
            })?;
            shape.push(op.nrows());
            eigenvectors.push(eigen.eigenvectors);
            axis_values.push(eigen.eigenvalues);
        }

        let eigenvalues: Vec<f64> = indices(&shape)
            .map(|idx| {
                idx.iter()
                    .zip(&axis_values)
                    .map(|(&i, values)| values[i])
                    .sum::<f64>()
            })
            .collect();
        Ok(Self {
            shape,
            grid: None,
            eigenvectors,
            eigenvalues,
        })
    }

    /// Diagonalize the grid's second-difference Laplacian.
    ///
    /// The transform remembers `grid` and rejects arrays on grids with a
    /// different spacing or edge behavior.
    ///
    /// # Errors
    ///
    /// Same conditions as [`new`](Self::new).
    pub fn laplacian(grid: &Grid) -> Result<Self, ConfigurationError> {
        let operators: Vec<_> = grid
            .shape()
            .iter()
            .zip(grid.step())
            .map(|(&n, &h)| laplacian_matrix(n, h, grid.edge_behavior()))
            .collect();
        let mut fd = Self::new(&operators)?;
        fd.grid = Some(grid.clone());
        Ok(fd)
    }

    /// Shape of the arrays this transform applies to.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Eigenvalues of the full operator, row-major over
    /// [`shape`](Self::shape).
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Row-major `f(operator) · data`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShapeMismatch`] if `data` does not hold
    /// one value per point.
    pub fn apply(&self, data: &[f64], f: impl Fn(f64) -> f64) -> Result<Vec<f64>, ValidationError> {
        if data.len() != element_count(&self.shape) {
            return Err(ValidationError::ShapeMismatch {
                expected: self.shape.to_vec(),
                actual: vec![data.len()],
            });
        }
        let mut work = data.to_vec();
        for (axis, q) in self.eigenvectors.iter().enumerate() {
            work = along_axis(&work, &self.shape, axis, q, true);
        }
        for (w, &lambda) in work.iter_mut().zip(&self.eigenvalues) {
            *w *= f(lambda);
        }
        for (axis, q) in self.eigenvectors.iter().enumerate() {
            work = along_axis(&work, &self.shape, axis, q, false);
        }
        Ok(work)
    }

    /// Least-squares solution of `operator · x = data`, zero on the
    /// operator's nullspace.
    ///
    /// # Errors
    ///
    /// Same conditions as [`apply`](Self::apply).
    pub fn pseudo_inverse(&self, data: &[f64]) -> Result<Vec<f64>, ValidationError> {
        let largest = self.eigenvalues.iter().fold(0.0f64, |m, l| m.max(l.abs()));
        let cutoff = PSEUDO_INVERSE_RTOL * largest;
        self.apply(data, |lambda| {
            if lambda.abs() > cutoff {
                1.0 / lambda
            } else {
                0.0
            }
        })
    }

    /// Return `Ok` if arrays on `grid` fit this transform.
    ///
    /// Transforms built by [`laplacian`](Self::laplacian) also require the
    /// same spacing and edge behavior; those built from raw matrices only
    /// check the shape.
    pub(crate) fn check_grid(&self, grid: &Grid) -> Result<(), ValidationError> {
        if grid.shape() != self.shape.as_slice() {
            return Err(ValidationError::ShapeMismatch {
                expected: self.shape.to_vec(),
                actual: grid.shape().to_vec(),
            });
        }
        match &self.grid {
            Some(own) => own.check_same(grid),
            None => Ok(()),
        }
    }
}

/// Multiply every line of `data` along `axis` by `matrix` (or its
/// transpose).
fn along_axis(
    data: &[f64],
    shape: &[usize],
    axis: usize,
    matrix: &DMatrix<f64>,
    transpose: bool,
) -> Vec<f64> {
    let n = shape[axis];
    let stride = strides(shape)[axis];
    let mut out = vec![0.0; data.len()];
    let mut line = DVector::<f64>::zeros(n);
    for start in 0..data.len() {
        if (start / stride) % n != 0 {
            continue;
        }
        for j in 0..n {
            line[j] = data[start + j * stride];
        }
        let mapped = if transpose {
            matrix.tr_mul(&line)
        } else {
            matrix * &line
        };
        for i in 0..n {
            out[start + i * stride] = mapped[i];
        }
    }
    out
}
