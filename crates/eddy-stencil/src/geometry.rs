//! Alignment between input and target locations on a staggered grid.

use crate::polynomial::Stencil;
use eddy_core::ConfigurationError;
use eddy_grid::Offset;
use smallvec::SmallVec;

/// Deltas within this distance of an integer are snapped to it.
const SNAP_TOL: f64 = 1e-9;

/// Integer roll and fractional shift aligning input data with a target
/// location.
#[derive(Clone, Debug, PartialEq)]
pub struct Alignment {
    /// Periodic index shift applied to the input before patch extraction.
    pub roll: SmallVec<[i64; 4]>,
    /// Residual sub-cell shift in `(-1, 0]`, folded into the stencil offsets.
    pub shift: SmallVec<[f64; 4]>,
}

impl Alignment {
    /// Whether the input needs no rolling.
    pub fn is_unrolled(&self) -> bool {
        self.roll.iter().all(|&r| r == 0)
    }
}

/// Split `target − input` per axis into `roll = −ceil(delta)` and
/// `shift = delta + roll`.
///
/// # Errors
///
/// Returns [`ConfigurationError::StencilMismatch`] if the offsets have
/// different dimensionality.
pub fn roll_and_shift(input: &Offset, target: &Offset) -> Result<Alignment, ConfigurationError> {
    if input.ndim() != target.ndim() {
        return Err(ConfigurationError::StencilMismatch {
            reason: format!(
                "input offset has {} axes, target offset has {}",
                input.ndim(),
                target.ndim()
            ),
        });
    }
    let mut roll = SmallVec::new();
    let mut shift = SmallVec::new();
    for (i, t) in input.as_slice().iter().zip(target.as_slice()) {
        let mut delta = t - i;
        if (delta - delta.round()).abs() < SNAP_TOL {
            delta = delta.round();
        }
        let r = -delta.ceil();
        roll.push(r as i64);
        shift.push(delta + r);
    }
    Ok(Alignment { roll, shift })
}

/// Integer offsets `[-(n/2), n - n/2)` of an `n`-point kernel.
pub fn kernel_offsets(size: usize) -> impl Iterator<Item = i64> {
    let lo = -((size / 2) as i64);
    let hi = (size - size / 2) as i64;
    lo..hi
}

/// Per-axis stencils for a patch of `stencil_shape` whose values sit at
/// `k − shift` cells from the target.
///
/// # Errors
///
/// Returns [`ConfigurationError::StencilMismatch`] if the three slices have
/// different lengths.
pub fn stencils_for(
    stencil_shape: &[usize],
    shift: &[f64],
    steps: &[f64],
) -> Result<Vec<Stencil>, ConfigurationError> {
    if stencil_shape.len() != shift.len() || shift.len() != steps.len() {
        return Err(ConfigurationError::StencilMismatch {
            reason: format!(
                "stencil shape has {} axes, shift {}, steps {}",
                stencil_shape.len(),
                shift.len(),
                steps.len()
            ),
        });
    }
    Ok(stencil_shape
        .iter()
        .zip(shift)
        .zip(steps)
        .map(|((&n, &s), &h)| Stencil::new(kernel_offsets(n).map(|k| k as f64 - s).collect(), h))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_location_needs_no_alignment() {
        let a = Offset::new(&[0.5, 0.5]);
        let al = roll_and_shift(&a, &a).unwrap();
        assert!(al.is_unrolled());
        assert_eq!(al.shift.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn center_to_face_is_half_shift() {
        let al = roll_and_shift(&Offset::new(&[0.5]), &Offset::new(&[1.0])).unwrap();
        assert_eq!(al.roll.as_slice(), &[-1]);
        assert_eq!(al.shift.as_slice(), &[-0.5]);
    }

    #[test]
    fn face_to_center_is_half_shift_without_roll() {
        let al = roll_and_shift(&Offset::new(&[1.0]), &Offset::new(&[0.5])).unwrap();
        assert_eq!(al.roll.as_slice(), &[0]);
        assert_eq!(al.shift.as_slice(), &[-0.5]);
    }

    #[test]
    fn whole_cell_delta_rolls_only() {
        let al = roll_and_shift(&Offset::new(&[0.5]), &Offset::new(&[2.5])).unwrap();
        assert_eq!(al.roll.as_slice(), &[-2]);
        assert_eq!(al.shift.as_slice(), &[0.0]);
    }

    #[test]
    fn near_integer_delta_snaps() {
        let al = roll_and_shift(&Offset::new(&[0.1 + 0.2]), &Offset::new(&[0.3])).unwrap();
        assert!(al.is_unrolled());
    }

    #[test]
    fn dimensionality_mismatch_rejected() {
        assert!(roll_and_shift(&Offset::new(&[0.5]), &Offset::new(&[0.5, 0.5])).is_err());
    }

    #[test]
    fn kernel_offsets_for_odd_and_even() {
        assert_eq!(kernel_offsets(3).collect::<Vec<_>>(), vec![-1, 0, 1]);
        assert_eq!(kernel_offsets(4).collect::<Vec<_>>(), vec![-2, -1, 0, 1]);
    }

    #[test]
    fn stencils_apply_shift() {
        let s = stencils_for(&[2], &[-0.5], &[0.1]).unwrap();
        assert_eq!(s[0].offsets(), &[-0.5, 0.5]);
        assert_eq!(s[0].step(), 0.1);
    }
}
