//! Input conditioning for towers.

use eddy_core::ValidationError;
use eddy_grid::index::{element_count, unravel};
use eddy_grid::Channels;

/// Affinely map `inputs` so that, within each group, the smallest value
/// lands on `min` and the largest on `max`.
///
/// Groups are formed by reducing over `axes`, which index the full
/// `[spatial..., channels]` layout (the channel axis is
/// `inputs.shape().len()`). A group whose values are all equal maps to
/// `min`.
///
/// # Errors
///
/// Returns [`ValidationError::ShapeMismatch`] if an axis is out of range.
pub fn rescale_to_range(
    inputs: &Channels,
    min: f64,
    max: f64,
    axes: &[usize],
) -> Result<Channels, ValidationError> {
    let mut full = inputs.shape().to_vec();
    full.push(inputs.channels());
    if let Some(&bad) = axes.iter().find(|&&a| a >= full.len()) {
        return Err(ValidationError::ShapeMismatch {
            expected: full,
            actual: vec![bad],
        });
    }

    // Extent of the kept axes; reduced axes collapse to one.
    let kept: Vec<usize> = full
        .iter()
        .enumerate()
        .map(|(axis, &n)| if axes.contains(&axis) { 1 } else { n })
        .collect();
    let groups = element_count(&kept);
    let mut idx = vec![0; full.len()];
    let group_of = |flat: usize, idx: &mut [usize]| {
        unravel(flat, &full, idx);
        idx.iter()
            .zip(&kept)
            .fold(0, |acc, (&i, &n)| acc * n + if n == 1 { 0 } else { i })
    };

    let mut lo = vec![f64::INFINITY; groups];
    let mut hi = vec![f64::NEG_INFINITY; groups];
    for (flat, &v) in inputs.data().iter().enumerate() {
        let g = group_of(flat, &mut idx);
        lo[g] = lo[g].min(v);
        hi[g] = hi[g].max(v);
    }

    let data = inputs
        .data()
        .iter()
        .enumerate()
        .map(|(flat, &v)| {
            let g = group_of(flat, &mut idx);
            let span = hi[g] - lo[g];
            if span > 0.0 {
                (v - lo[g]) / span * (max - min) + min
            } else {
                min
            }
        })
        .collect();
    Channels::new(inputs.shape(), inputs.channels(), data)
}
