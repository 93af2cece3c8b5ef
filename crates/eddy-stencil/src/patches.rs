//! Stencil patch extraction and coefficient application.
//!
//! A patch is the set of input values under a stencil, one channel per tap
//! in row-major order over [`kernel_offsets`]. Two interchangeable
//! extractors are provided and agree to rounding.

use crate::conv::Conv;
use crate::geometry::kernel_offsets;
use eddy_core::{Precision, ValidationError};
use eddy_grid::index::{element_count, neighbour_flat, strides, unravel};
use eddy_grid::{Channels, EdgeBehavior, Shape};
use smallvec::SmallVec;

/// Patch extraction strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PatchMethod {
    /// Gather neighbours by index arithmetic.
    #[default]
    Roll,
    /// Convolve with a one-hot kernel per tap.
    Conv,
}

/// Tap displacements of a stencil, row-major.
fn taps(stencil_shape: &[usize]) -> Vec<SmallVec<[i64; 4]>> {
    let count = element_count(stencil_shape);
    let mut idx: Shape = smallvec::smallvec![0; stencil_shape.len()];
    (0..count)
        .map(|flat| {
            unravel(flat, stencil_shape, &mut idx);
            idx.iter()
                .zip(stencil_shape)
                .map(|(&i, &n)| kernel_offsets(n).nth(i).unwrap_or(0))
                .collect()
        })
        .collect()
}

fn check_rank(shape: &[usize], stencil_shape: &[usize]) -> Result<(), ValidationError> {
    if shape.len() == stencil_shape.len() {
        Ok(())
    } else {
        Err(ValidationError::ShapeMismatch {
            expected: stencil_shape.to_vec(),
            actual: shape.to_vec(),
        })
    }
}

/// Extract `stencil_shape` patches around every point of `data`.
///
/// Out-of-range neighbours are resolved with `edge`. The result has
/// `∏ stencil_shape` channels.
///
/// # Errors
///
/// Returns [`ValidationError::ShapeMismatch`] if `data` does not match
/// `shape` or the stencil rank differs from the array rank.
pub fn extract_patches(
    data: &[f64],
    shape: &[usize],
    stencil_shape: &[usize],
    edge: EdgeBehavior,
    method: PatchMethod,
) -> Result<Channels, ValidationError> {
    check_rank(shape, stencil_shape)?;
    let input = Channels::new(shape, 1, data.to_vec())?;
    match method {
        PatchMethod::Conv => Conv::one_hot(stencil_shape, edge.into()).apply(&input),
        PatchMethod::Roll => {
            let deltas = taps(stencil_shape);
            let st = strides(shape);
            let mut out = Channels::zeros(shape, deltas.len());
            let mut idx: Shape = smallvec::smallvec![0; shape.len()];
            for point in 0..input.points() {
                unravel(point, shape, &mut idx);
                for (slot, delta) in out.point_mut(point).iter_mut().zip(&deltas) {
                    *slot = data[neighbour_flat(&idx, delta, shape, &st, edge)];
                }
            }
            Ok(out)
        }
    }
}

/// Patches for several stencil shapes at once, concatenated along the
/// channel axis in the given order. Each distinct shape is extracted once.
///
/// # Errors
///
/// Same conditions as [`extract_patches`].
pub fn fused_extract_patches(
    data: &[f64],
    shape: &[usize],
    stencil_shapes: &[&[usize]],
    edge: EdgeBehavior,
    method: PatchMethod,
) -> Result<Channels, ValidationError> {
    let mut distinct: Vec<(&[usize], Channels)> = Vec::new();
    for &s in stencil_shapes {
        if !distinct.iter().any(|(d, _)| *d == s) {
            distinct.push((s, extract_patches(data, shape, s, edge, method)?));
        }
    }
    let parts: Vec<&Channels> = stencil_shapes
        .iter()
        .filter_map(|s| distinct.iter().find(|(d, _)| d == s).map(|(_, p)| p))
        .collect();
    Channels::concat(&parts)
}

/// Weighted sum of each patch with its coefficients.
///
/// `coefficients` is either per point or a broadcast vector.
///
/// # Errors
///
/// Returns [`ValidationError::ShapeMismatch`] if channel counts differ or
/// the coefficients cannot broadcast to the patch shape.
pub fn apply_coefficients(
    patches: &Channels,
    coefficients: &Channels,
    precision: Precision,
) -> Result<Vec<f64>, ValidationError> {
    if patches.channels() != coefficients.channels() {
        return Err(ValidationError::ShapeMismatch {
            expected: vec![patches.channels()],
            actual: vec![coefficients.channels()],
        });
    }
    coefficients.check_broadcastable(patches.shape())?;
    Ok((0..patches.points())
        .map(|point| {
            let terms = patches
                .point(point)
                .iter()
                .copied()
                .zip(coefficients.point_or_broadcast(point).iter().copied());
            precision.accumulate(0.0, terms)
        })
        .collect())
}
