//! Staggered-grid geometry: [`Grid`] and sub-cell [`Offset`]s.

use crate::index::{element_count, Shape};
use crate::EdgeBehavior;
use eddy_core::{ConfigurationError, ValidationError};
use smallvec::SmallVec;

/// Tolerance used when comparing steps and offsets.
const GEOMETRY_TOL: f64 = 1e-12;

/// Sub-cell location of an array on a staggered grid, one fractional
/// coordinate per axis. Cell centers sit at `0.5`; the face between cells
/// `i` and `i + 1` along an axis sits at `1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct Offset(SmallVec<[f64; 4]>);

impl Offset {
    /// Create an offset from per-axis fractional coordinates.
    pub fn new(coords: &[f64]) -> Self {
        Self(coords.iter().copied().collect())
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Per-axis coordinates.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// This offset moved by `delta` cells along `axis`.
    pub fn shifted(&self, axis: usize, delta: f64) -> Self {
        let mut out = self.clone();
        out.0[axis] += delta;
        out
    }

    /// Whether two offsets agree within a tight tolerance.
    pub fn approx_eq(&self, other: &Offset) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| (a - b).abs() < GEOMETRY_TOL)
    }

    /// Return `Ok` if `other` matches this offset.
    pub fn check(&self, other: &Offset) -> Result<(), ValidationError> {
        if self.approx_eq(other) {
            Ok(())
        } else {
            Err(ValidationError::OffsetMismatch {
                expected: self.0.to_vec(),
                actual: other.0.to_vec(),
            })
        }
    }
}

/// A uniform rectilinear grid: shape, spacing and boundary topology.
///
/// Grids are immutable and shared between arrays through `Arc<Grid>`.
///
/// # Examples
///
/// ```
/// use eddy_grid::{EdgeBehavior, Grid};
///
/// let grid = Grid::uniform(&[8, 8], 0.25, EdgeBehavior::Wrap).unwrap();
/// assert_eq!(grid.ndim(), 2);
/// assert_eq!(grid.cell_count(), 64);
/// assert_eq!(grid.cell_center().as_slice(), &[0.5, 0.5]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    shape: Shape,
    step: SmallVec<[f64; 4]>,
    edge: EdgeBehavior,
}

impl Grid {
    /// Create a grid with per-axis spacing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidGrid`] if the shape is empty,
    /// any extent is zero, the step count differs from the axis count, or a
    /// step is not finite and positive.
    pub fn new(shape: &[usize], step: &[f64], edge: EdgeBehavior) -> Result<Self, ConfigurationError> {
        if shape.is_empty() {
            return Err(ConfigurationError::InvalidGrid {
                reason: "grid must have at least one axis".to_string(),
            });
        }
        if shape.contains(&0) {
            return Err(ConfigurationError::InvalidGrid {
                reason: format!("every axis needs at least one cell, got {shape:?}"),
            });
        }
        if step.len() != shape.len() {
            return Err(ConfigurationError::InvalidGrid {
                reason: format!("{} steps for {} axes", step.len(), shape.len()),
            });
        }
        if let Some(bad) = step.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(ConfigurationError::InvalidGrid {
                reason: format!("steps must be finite and positive, got {bad}"),
            });
        }
        Ok(Self {
            shape: shape.iter().copied().collect(),
            step: step.iter().copied().collect(),
            edge,
        })
    }

    /// Create a grid with the same spacing along every axis.
    pub fn uniform(shape: &[usize], step: f64, edge: EdgeBehavior) -> Result<Self, ConfigurationError> {
        Self::new(shape, &vec![step; shape.len()], edge)
    }

    /// Number of spatial axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Cells per axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Spacing per axis.
    pub fn step(&self) -> &[f64] {
        &self.step
    }

    /// Smallest spacing over all axes.
    pub fn min_step(&self) -> f64 {
        self.step.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Boundary topology.
    pub fn edge_behavior(&self) -> EdgeBehavior {
        self.edge
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        element_count(&self.shape)
    }

    /// Offset of cell centers.
    pub fn cell_center(&self) -> Offset {
        Offset(smallvec::smallvec![0.5; self.ndim()])
    }

    /// Offsets of the cell faces, one per axis (velocity locations on a
    /// staggered grid).
    pub fn cell_faces(&self) -> Vec<Offset> {
        (0..self.ndim())
            .map(|axis| self.cell_center().shifted(axis, 0.5))
            .collect()
    }

    /// Physical coordinate of `index` along `axis` for data at `offset`.
    pub fn coordinate(&self, axis: usize, index: usize, offset: &Offset) -> f64 {
        (index as f64 + offset.as_slice()[axis]) * self.step[axis]
    }

    /// Physical extent of the domain along `axis`.
    pub fn length(&self, axis: usize) -> f64 {
        self.shape[axis] as f64 * self.step[axis]
    }

    /// Return `Ok` if `other` has the same shape, spacing and topology.
    pub fn check_same(&self, other: &Grid) -> Result<(), ValidationError> {
        if self.shape != other.shape {
            return Err(ValidationError::GridMismatch {
                reason: format!("shape {:?} vs {:?}", self.shape, other.shape),
            });
        }
        let steps_match = self
            .step
            .iter()
            .zip(&other.step)
            .all(|(a, b)| (a - b).abs() <= GEOMETRY_TOL * a.abs().max(1.0));
        if !steps_match {
            return Err(ValidationError::GridMismatch {
                reason: format!("step {:?} vs {:?}", self.step, other.step),
            });
        }
        if self.edge != other.edge {
            return Err(ValidationError::GridMismatch {
                reason: format!("edge {:?} vs {:?}", self.edge, other.edge),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty_shape() {
        assert!(matches!(
            Grid::new(&[], &[], EdgeBehavior::Wrap),
            Err(ConfigurationError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn new_rejects_zero_extent() {
        assert!(Grid::uniform(&[4, 0], 1.0, EdgeBehavior::Wrap).is_err());
    }

    #[test]
    fn new_rejects_step_arity() {
        assert!(Grid::new(&[4, 4], &[1.0], EdgeBehavior::Wrap).is_err());
    }

    #[test]
    fn new_rejects_nonpositive_step() {
        assert!(Grid::new(&[4], &[0.0], EdgeBehavior::Wrap).is_err());
        assert!(Grid::new(&[4], &[f64::NAN], EdgeBehavior::Wrap).is_err());
    }

    #[test]
    fn faces_are_half_cell_from_center() {
        let grid = Grid::uniform(&[4, 4, 4], 1.0, EdgeBehavior::Wrap).unwrap();
        let faces = grid.cell_faces();
        assert_eq!(faces.len(), 3);
        assert_eq!(faces[1].as_slice(), &[0.5, 1.0, 0.5]);
    }

    #[test]
    fn coordinate_uses_offset_and_step() {
        let grid = Grid::new(&[4, 4], &[0.5, 2.0], EdgeBehavior::Clamp).unwrap();
        let off = Offset::new(&[1.0, 0.5]);
        assert_eq!(grid.coordinate(0, 1, &off), 1.0);
        assert_eq!(grid.coordinate(1, 1, &off), 3.0);
        assert_eq!(grid.min_step(), 0.5);
    }

    #[test]
    fn check_same_detects_spacing() {
        let a = Grid::uniform(&[4], 1.0, EdgeBehavior::Wrap).unwrap();
        let b = Grid::uniform(&[4], 0.5, EdgeBehavior::Wrap).unwrap();
        assert!(a.check_same(&a.clone()).is_ok());
        assert!(matches!(
            a.check_same(&b),
            Err(ValidationError::GridMismatch { .. })
        ));
    }

    #[test]
    fn offset_check_reports_both_sides() {
        let a = Offset::new(&[0.5]);
        let b = Offset::new(&[1.0]);
        match a.check(&b) {
            Err(ValidationError::OffsetMismatch { expected, actual }) => {
                assert_eq!(expected, vec![0.5]);
                assert_eq!(actual, vec![1.0]);
            }
            other => panic!("expected OffsetMismatch, got {other:?}"),
        }
    }
}
