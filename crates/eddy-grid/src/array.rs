//! Grid-located data: [`GridArray`] and the per-component [`GridField`].

use std::sync::Arc;

use crate::grid::{Grid, Offset};
use crate::index::{indices, roll};
use eddy_core::ValidationError;

/// Dense row-major data living at one [`Offset`] of a shared [`Grid`].
///
/// Operations never mutate in place; every arithmetic helper returns a new
/// array. Binary operations require identical offsets and grids.
#[derive(Clone, Debug)]
pub struct GridArray {
    data: Vec<f64>,
    offset: Offset,
    grid: Arc<Grid>,
}

impl GridArray {
    /// Wrap `data` as an array at `offset` on `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShapeMismatch`] if `data` does not hold one
    /// value per cell, or [`ValidationError::OffsetMismatch`] if the offset
    /// has the wrong number of axes.
    pub fn new(data: Vec<f64>, offset: Offset, grid: Arc<Grid>) -> Result<Self, ValidationError> {
        if data.len() != grid.cell_count() {
            return Err(ValidationError::ShapeMismatch {
                expected: grid.shape().to_vec(),
                actual: vec![data.len()],
            });
        }
        if offset.ndim() != grid.ndim() {
            return Err(ValidationError::OffsetMismatch {
                expected: vec![0.0; grid.ndim()],
                actual: offset.as_slice().to_vec(),
            });
        }
        Ok(Self { data, offset, grid })
    }

    /// An all-zero array.
    pub fn zeros(offset: Offset, grid: Arc<Grid>) -> Self {
        let data = vec![0.0; grid.cell_count()];
        Self { data, offset, grid }
    }

    /// Sample `f` at the physical coordinates of every cell.
    pub fn from_fn(offset: Offset, grid: Arc<Grid>, f: impl Fn(&[f64]) -> f64) -> Self {
        let mut x = vec![0.0; grid.ndim()];
        let data = indices(grid.shape())
            .map(|idx| {
                for (axis, &i) in idx.iter().enumerate() {
                    x[axis] = grid.coordinate(axis, i, &offset);
                }
                f(&x)
            })
            .collect();
        Self { data, offset, grid }
    }

    /// Build an array from values computed per flat row-major index.
    pub fn from_flat_fn(offset: Offset, grid: Arc<Grid>, f: impl FnMut(usize) -> f64) -> Self {
        let data = (0..grid.cell_count()).map(f).collect();
        Self { data, offset, grid }
    }

    /// Cell values in row-major order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Consume the array, returning its values.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Sub-cell location.
    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    /// The grid this array lives on.
    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    /// Cells per axis.
    pub fn shape(&self) -> &[usize] {
        self.grid.shape()
    }

    /// Same grid and offset, new values.
    pub fn with_data(&self, data: Vec<f64>) -> Result<Self, ValidationError> {
        Self::new(data, self.offset.clone(), Arc::clone(&self.grid))
    }

    /// Same grid and values, relabelled at another offset.
    pub fn with_offset(&self, offset: Offset) -> Self {
        Self {
            data: self.data.clone(),
            offset,
            grid: Arc::clone(&self.grid),
        }
    }

    /// Apply `f` to every value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            data: self.data.iter().map(|&v| f(v)).collect(),
            offset: self.offset.clone(),
            grid: Arc::clone(&self.grid),
        }
    }

    /// Multiply every value by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        self.map(|v| v * k)
    }

    /// Return `Ok` if `other` shares this array's grid and offset.
    pub fn check_compatible(&self, other: &GridArray) -> Result<(), ValidationError> {
        if !Arc::ptr_eq(&self.grid, &other.grid) {
            self.grid.check_same(&other.grid)?;
        }
        self.offset.check(&other.offset)
    }

    /// Elementwise `self + k * other`.
    pub fn axpy(&self, k: f64, other: &GridArray) -> Result<Self, ValidationError> {
        self.check_compatible(other)?;
        Ok(Self {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + k * b)
                .collect(),
            offset: self.offset.clone(),
            grid: Arc::clone(&self.grid),
        })
    }

    /// Elementwise sum.
    pub fn try_add(&self, other: &GridArray) -> Result<Self, ValidationError> {
        self.axpy(1.0, other)
    }

    /// Elementwise difference.
    pub fn try_sub(&self, other: &GridArray) -> Result<Self, ValidationError> {
        self.axpy(-1.0, other)
    }

    /// Periodically roll the data, `out[i] = self[i - shift]` per axis.
    pub fn roll(&self, shifts: &[i64]) -> Self {
        Self {
            data: roll(&self.data, self.grid.shape(), shifts),
            offset: self.offset.clone(),
            grid: Arc::clone(&self.grid),
        }
    }

    /// Largest absolute value, `0.0` for an empty array.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    /// Arithmetic mean of the values.
    pub fn mean(&self) -> f64 {
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }
}

/// An ordered tuple of [`GridArray`]s, one per velocity component.
///
/// All components share one grid; each may sit at its own offset.
#[derive(Clone, Debug)]
pub struct GridField {
    components: Vec<GridArray>,
}

impl GridField {
    /// Build a field from its components.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ArityMismatch`] for an empty component
    /// list and [`ValidationError::GridMismatch`] if components live on
    /// different grids.
    pub fn new(components: Vec<GridArray>) -> Result<Self, ValidationError> {
        let first = components.first().ok_or(ValidationError::ArityMismatch {
            expected: 1,
            actual: 0,
        })?;
        for c in &components[1..] {
            if !Arc::ptr_eq(first.grid(), c.grid()) {
                first.grid().check_same(c.grid())?;
            }
        }
        Ok(Self { components })
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false; a field has at least one component.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component arrays.
    pub fn components(&self) -> &[GridArray] {
        &self.components
    }

    /// Consume the field, returning its components.
    pub fn into_components(self) -> Vec<GridArray> {
        self.components
    }

    /// Iterate over components.
    pub fn iter(&self) -> std::slice::Iter<'_, GridArray> {
        self.components.iter()
    }

    /// The shared grid.
    pub fn grid(&self) -> &Arc<Grid> {
        self.components[0].grid()
    }

    /// Return `Ok` if `other` has the same number of components.
    pub fn check_arity(&self, other: &GridField) -> Result<(), ValidationError> {
        if self.len() == other.len() {
            Ok(())
        } else {
            Err(ValidationError::ArityMismatch {
                expected: self.len(),
                actual: other.len(),
            })
        }
    }

    /// Componentwise `self + k * other`.
    pub fn axpy(&self, k: f64, other: &GridField) -> Result<Self, ValidationError> {
        self.check_arity(other)?;
        let components = self
            .components
            .iter()
            .zip(&other.components)
            .map(|(a, b)| a.axpy(k, b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    /// Componentwise sum.
    pub fn try_add(&self, other: &GridField) -> Result<Self, ValidationError> {
        self.axpy(1.0, other)
    }

    /// Multiply every component by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        Self {
            components: self.components.iter().map(|c| c.scaled(k)).collect(),
        }
    }

    /// Largest absolute value over all components.
    pub fn max_abs(&self) -> f64 {
        self.components.iter().fold(0.0, |m, c| m.max(c.max_abs()))
    }
}

impl<'a> IntoIterator for &'a GridField {
    type Item = &'a GridArray;
    type IntoIter = std::slice::Iter<'a, GridArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EdgeBehavior;

    fn grid() -> Arc<Grid> {
        Arc::new(Grid::uniform(&[2, 3], 1.0, EdgeBehavior::Wrap).unwrap())
    }

    #[test]
    fn new_rejects_wrong_length() {
        let g = grid();
        let off = g.cell_center();
        assert!(matches!(
            GridArray::new(vec![0.0; 5], off, g),
            Err(ValidationError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn from_fn_samples_coordinates() {
        let g = grid();
        let a = GridArray::from_fn(g.cell_center(), Arc::clone(&g), |x| 10.0 * x[0] + x[1]);
        // (i + 0.5, j + 0.5)
        assert_eq!(a.data()[0], 5.5);
        assert_eq!(a.data()[4], 16.5);
    }

    #[test]
    fn from_flat_fn_is_row_major() {
        let g = grid();
        let a = GridArray::from_flat_fn(g.cell_center(), Arc::clone(&g), |i| i as f64);
        assert_eq!(a.data()[..3], [0.0, 1.0, 2.0]);
        assert_eq!(a.data().len(), g.cell_count());
    }

    #[test]
    fn axpy_checks_offsets() {
        let g = grid();
        let a = GridArray::zeros(g.cell_center(), Arc::clone(&g));
        let b = GridArray::zeros(g.cell_faces()[0].clone(), Arc::clone(&g));
        assert!(matches!(a.try_add(&b), Err(ValidationError::OffsetMismatch { .. })));
    }

    #[test]
    fn axpy_accepts_equal_grid_behind_other_arc() {
        let a = GridArray::zeros(grid().cell_center(), grid()).map(|_| 1.0);
        let b = GridArray::zeros(grid().cell_center(), grid()).map(|_| 2.0);
        let c = a.axpy(0.5, &b).unwrap();
        assert!(c.data().iter().all(|&v| v == 2.0));
    }

    #[test]
    fn field_rejects_mixed_grids() {
        let a = GridArray::zeros(grid().cell_center(), grid());
        let other = Arc::new(Grid::uniform(&[2, 3], 0.5, EdgeBehavior::Wrap).unwrap());
        let b = GridArray::zeros(other.cell_center(), other);
        assert!(GridField::new(vec![a, b]).is_err());
    }

    #[test]
    fn field_axpy_checks_arity() {
        let g = grid();
        let one = GridField::new(vec![GridArray::zeros(g.cell_center(), Arc::clone(&g))]).unwrap();
        let two = GridField::new(
            g.cell_faces()
                .into_iter()
                .map(|o| GridArray::zeros(o, Arc::clone(&g)))
                .collect(),
        )
        .unwrap();
        assert!(matches!(
            one.try_add(&two),
            Err(ValidationError::ArityMismatch { expected: 1, actual: 2 })
        ));
    }
}
