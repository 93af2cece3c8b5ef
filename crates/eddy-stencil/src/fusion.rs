//! Batched evaluation of several derivatives through one contraction.
//!
//! The joint bias is the concatenation of every derivative's bias and the
//! joint nullspace is block diagonal, so one `logits · nullspace` over the
//! stacked logits yields every derivative's coefficients at once. Results
//! are split back per key by cumulative stencil size.

use crate::conv::Conv;
use crate::derivative::SpatialDerivativeFromLogits;
use crate::patches::{apply_coefficients, fused_extract_patches};
use eddy_core::{ConfigurationError, EddyError, Precision, ValidationError};
use eddy_grid::{Channels, GridArray};
use indexmap::IndexMap;
use nalgebra::DMatrix;
use std::fmt::Debug;
use std::hash::Hash;

/// How the fused contraction and patch extraction are performed.
///
/// Every combination yields the same coefficients and derivatives up to
/// rounding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FuseOptions {
    /// Contract with a `1 × … × 1` convolution instead of a direct product.
    pub constrain_with_conv: bool,
    /// Extract all keys' patches in one pass and sum each key's segment.
    pub fuse_patches: bool,
}

/// Coefficients for a set of fused derivatives, ready to evaluate.
#[derive(Clone, Debug)]
pub struct FusedDerivatives<K> {
    derivatives: IndexMap<K, SpatialDerivativeFromLogits>,
    all_coefficients: Channels,
    split: Vec<Channels>,
    segments: Vec<(usize, usize)>,
    precision: Precision,
    fuse_patches: bool,
}

/// Evaluates one key of a [`FusedDerivatives`].
#[derive(Clone, Copy, Debug)]
pub struct FusedEvaluator<'a, K> {
    fused: &'a FusedDerivatives<K>,
    index: usize,
}

impl<K> FusedEvaluator<'_, K>
where
    K: Hash + Eq + Debug,
{
    /// Derivative of `input` for this evaluator's key.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] on offset, spacing or shape mismatch.
    pub fn evaluate(&self, input: &GridArray) -> Result<GridArray, ValidationError> {
        self.fused.evaluate_index(self.index, input)
    }
}

fn compatible<T: PartialEq + Debug>(what: &str, values: &[T]) -> Result<(), ConfigurationError> {
    match values.split_first() {
        Some((first, rest)) if rest.iter().any(|v| v != first) => Err(ConfigurationError::IncompatibleFusion {
            reason: format!("{what} differs between derivatives: {values:?}"),
        }),
        _ => Ok(()),
    }
}

/// Fuse `derivatives` and compute their coefficients from `all_logits`,
/// the per-key logits stacked along the channel axis in map order.
///
/// # Errors
///
/// Returns [`ConfigurationError`] if the map is empty, any derivative needs
/// a nonzero roll, or precisions or tile layouts differ; and
/// [`ValidationError::LogitsWidthMismatch`] if `all_logits` is not as wide
/// as the summed subspace sizes.
pub fn fuse<K>(
    derivatives: &IndexMap<K, SpatialDerivativeFromLogits>,
    all_logits: &Channels,
    options: FuseOptions,
) -> Result<FusedDerivatives<K>, EddyError>
where
    K: Hash + Eq + Clone + Debug,
{
    if derivatives.is_empty() {
        return Err(ConfigurationError::IncompatibleFusion {
            reason: "nothing to fuse".to_string(),
        }
        .into());
    }
    for (key, d) in derivatives {
        if d.roll().iter().any(|&r| r != 0) {
            return Err(ConfigurationError::DerivativeUsesRoll {
                key: format!("{key:?}"),
                roll: d.roll().to_vec(),
            }
            .into());
        }
    }
    let precisions: Vec<Precision> = derivatives.values().map(|d| d.spec().precision()).collect();
    compatible("precision", &precisions)?;
    let layouts: Vec<Option<&[usize]>> = derivatives.values().map(|d| d.spec().tile_layout()).collect();
    compatible("tile layout", &layouts)?;
    let precision = precisions[0];

    let subspace: usize = derivatives.values().map(|d| d.subspace_size()).sum();
    let stencil: usize = derivatives.values().map(|d| d.stencil_size()).sum();
    if all_logits.channels() != subspace {
        return Err(ValidationError::LogitsWidthMismatch {
            expected: subspace,
            actual: all_logits.channels(),
        }
        .into());
    }

    let mut joint_bias = Vec::with_capacity(stencil);
    let mut joint_nullspace = DMatrix::zeros(subspace, stencil);
    let mut segments = Vec::with_capacity(derivatives.len());
    let (mut row, mut col) = (0, 0);
    for d in derivatives.values() {
        let c = d.constraint();
        joint_bias.extend_from_slice(c.bias());
        joint_nullspace
            .view_mut((row, col), (c.subspace_size(), c.stencil_size()))
            .copy_from(c.nullspace());
        segments.push((col, c.stencil_size()));
        row += c.subspace_size();
        col += c.stencil_size();
    }

    let all_coefficients = if options.constrain_with_conv {
        let mut weights = Vec::with_capacity(subspace * stencil);
        for i in 0..subspace {
            weights.extend(joint_nullspace.row(i).iter().copied());
        }
        Conv::pointwise(all_logits.shape().len(), subspace, stencil, weights, joint_bias)?
            .with_precision(precision)
            .apply(all_logits)?
    } else {
        let mut out = Channels::zeros(all_logits.shape(), stencil);
        for point in 0..all_logits.points() {
            let logits = all_logits.point(point);
            for (j, slot) in out.point_mut(point).iter_mut().enumerate() {
                let column = joint_nullspace.column(j);
                *slot = precision.accumulate(joint_bias[j], logits.iter().copied().zip(column.iter().copied()));
            }
        }
        out
    };
    let sizes: Vec<usize> = segments.iter().map(|&(_, size)| size).collect();
    let split = all_coefficients.split(&sizes)?;

    log::debug!(
        "fused {} derivatives: {} logits -> {} coefficients (conv: {}, fused patches: {})",
        derivatives.len(),
        subspace,
        stencil,
        options.constrain_with_conv,
        options.fuse_patches
    );

    Ok(FusedDerivatives {
        derivatives: derivatives.clone(),
        all_coefficients,
        split,
        segments,
        precision,
        fuse_patches: options.fuse_patches,
    })
}

impl<K> FusedDerivatives<K>
where
    K: Hash + Eq + Debug,
{
    fn index_of(&self, key: &K) -> Result<usize, ValidationError> {
        self.derivatives
            .get_index_of(key)
            .ok_or_else(|| ValidationError::UnknownKey { key: format!("{key:?}") })
    }

    /// Coefficients of every key, concatenated along the channel axis.
    pub fn all_coefficients(&self) -> &Channels {
        &self.all_coefficients
    }

    /// Coefficients for `key`.
    pub fn coefficients(&self, key: &K) -> Option<&Channels> {
        self.derivatives.get_index_of(key).map(|i| &self.split[i])
    }

    /// Keys in fusion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.derivatives.keys()
    }

    /// Derivative of `input` for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownKey`] for a key that was not fused,
    /// and other [`ValidationError`]s on offset, spacing or shape mismatch.
    pub fn evaluate(&self, key: &K, input: &GridArray) -> Result<GridArray, ValidationError> {
        self.evaluate_index(self.index_of(key)?, input)
    }

    /// One evaluator per key, in fusion order.
    pub fn evaluators(&self) -> IndexMap<&K, FusedEvaluator<'_, K>> {
        self.derivatives
            .keys()
            .enumerate()
            .map(|(index, key)| (key, FusedEvaluator { fused: self, index }))
            .collect()
    }

    fn evaluate_index(&self, index: usize, input: &GridArray) -> Result<GridArray, ValidationError> {
        let Some((_, derivative)) = self.derivatives.get_index(index) else {
            return Err(ValidationError::UnknownKey {
                key: format!("#{index}"),
            });
        };
        derivative.check_input(input)?;
        self.all_coefficients.check_broadcastable(input.shape())?;

        let values = if self.fuse_patches {
            let shapes: Vec<&[usize]> = self.derivatives.values().map(|d| d.spec().stencil_shape()).collect();
            let all_patches = fused_extract_patches(
                input.data(),
                input.shape(),
                &shapes,
                input.grid().edge_behavior(),
                derivative.spec().patch_method(),
            )?;
            let (start, size) = self.segments[index];
            (0..all_patches.points())
                .map(|point| {
                    let patch = &all_patches.point(point)[start..start + size];
                    let coeffs = &self.all_coefficients.point_or_broadcast(point)[start..start + size];
                    self.precision
                        .accumulate(0.0, patch.iter().copied().zip(coeffs.iter().copied()))
                })
                .collect()
        } else {
            let patches = derivative.extract_patches(input)?;
            apply_coefficients(&patches, &self.split[index], self.precision)?
        };
        GridArray::new(values, derivative.spec().target_offset().clone(), input.grid().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivative::SpatialDerivativeSpec;
    use crate::polynomial::Method;
    use eddy_grid::{EdgeBehavior, Grid, Offset};
    use proptest::prelude::*;
    use std::sync::Arc;

    const H: f64 = 0.25;

    fn derivative(input: f64, target: f64, stencil: usize, order: u32, precision: Precision) -> SpatialDerivativeFromLogits {
        let spec = SpatialDerivativeSpec::builder()
            .stencil_shape(&[stencil])
            .input_offset(Offset::new(&[input]))
            .target_offset(Offset::new(&[target]))
            .derivative_orders(&[order])
            .steps(&[H])
            .method(Method::FiniteVolume)
            .precision(precision)
            .build()
            .unwrap();
        SpatialDerivativeFromLogits::new(spec).unwrap()
    }

    fn face_set() -> IndexMap<&'static str, SpatialDerivativeFromLogits> {
        let mut map = IndexMap::new();
        // face -> center gradient, center -> center second derivative
        map.insert("grad", derivative(1.0, 0.5, 4, 1, Precision::Exact));
        map.insert("lap", derivative(0.5, 0.5, 5, 2, Precision::Exact));
        map
    }

    fn grid() -> Arc<Grid> {
        Arc::new(Grid::uniform(&[6], H, EdgeBehavior::Wrap).unwrap())
    }

    #[test]
    fn empty_map_rejected() {
        let map: IndexMap<&str, SpatialDerivativeFromLogits> = IndexMap::new();
        let err = fuse(&map, &Channels::vector(vec![]), FuseOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            EddyError::Configuration(ConfigurationError::IncompatibleFusion { .. })
        ));
    }

    #[test]
    fn rolled_derivative_rejected() {
        let mut map = face_set();
        map.insert("shifted", derivative(0.5, 1.0, 4, 1, Precision::Exact));
        let width: usize = map.values().map(|d| d.subspace_size()).sum();
        let err = fuse(&map, &Channels::vector(vec![0.0; width]), FuseOptions::default()).unwrap_err();
        match err {
            EddyError::Configuration(ConfigurationError::DerivativeUsesRoll { key, roll }) => {
                assert_eq!(key, "\"shifted\"");
                assert_eq!(roll, vec![-1]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mixed_precision_rejected() {
        let mut map = face_set();
        map.insert("fast", derivative(0.5, 0.5, 3, 1, Precision::Fast));
        let width: usize = map.values().map(|d| d.subspace_size()).sum();
        assert!(matches!(
            fuse(&map, &Channels::vector(vec![0.0; width]), FuseOptions::default()),
            Err(EddyError::Configuration(ConfigurationError::IncompatibleFusion { .. }))
        ));
    }

    #[test]
    fn logits_width_checked() {
        let map = face_set();
        assert!(matches!(
            fuse(&map, &Channels::vector(vec![0.0; 1]), FuseOptions::default()),
            Err(EddyError::Validation(ValidationError::LogitsWidthMismatch { .. }))
        ));
    }

    #[test]
    fn unknown_key_rejected() {
        let map = face_set();
        let width: usize = map.values().map(|d| d.subspace_size()).sum();
        let fused = fuse(&map, &Channels::vector(vec![0.0; width]), FuseOptions::default()).unwrap();
        let input = GridArray::zeros(Offset::new(&[1.0]), grid());
        assert!(matches!(
            fused.evaluate(&"div", &input),
            Err(ValidationError::UnknownKey { .. })
        ));
    }

    #[test]
    fn zero_logits_give_biases() {
        let map = face_set();
        let width: usize = map.values().map(|d| d.subspace_size()).sum();
        let fused = fuse(&map, &Channels::vector(vec![0.0; width]), FuseOptions::default()).unwrap();
        assert_eq!(fused.coefficients(&"grad").unwrap().data(), map["grad"].constraint().bias());
        assert_eq!(fused.coefficients(&"lap").unwrap().data(), map["lap"].constraint().bias());
        assert_eq!(fused.keys().copied().collect::<Vec<_>>(), vec!["grad", "lap"]);
    }

    proptest! {
        #[test]
        fn fused_paths_match_sequential(
            logits in prop::collection::vec(-2.0f64..2.0, 6 * 4),
            data in prop::collection::vec(-5.0f64..5.0, 6),
        ) {
            let map = face_set();
            let width: usize = map.values().map(|d| d.subspace_size()).sum();
            prop_assert_eq!(width, 4);
            let all_logits = Channels::new(&[6], width, logits).unwrap();
            let per_key = all_logits.split(&[map["grad"].subspace_size(), map["lap"].subspace_size()]).unwrap();

            let faces = GridArray::new(data.clone(), Offset::new(&[1.0]), grid()).unwrap();
            let centers = GridArray::new(data, Offset::new(&[0.5]), grid()).unwrap();
            let inputs = [("grad", &faces, &per_key[0]), ("lap", &centers, &per_key[1])];

            for (conv, patches) in [(false, false), (true, false), (false, true), (true, true)] {
                let options = FuseOptions { constrain_with_conv: conv, fuse_patches: patches };
                let fused = fuse(&map, &all_logits, options).unwrap();
                let evaluators = fused.evaluators();
                for (key, input, logits) in inputs {
                    let expected_coeffs = map[key].constraint().apply(logits).unwrap();
                    for (a, b) in fused.coefficients(&key).unwrap().data().iter().zip(expected_coeffs.data()) {
                        prop_assert!((a - b).abs() <= 1e-12 * b.abs().max(1.0));
                    }
                    let expected = map[key].evaluate(input, logits).unwrap();
                    let actual = evaluators[&key].evaluate(input).unwrap();
                    prop_assert_eq!(actual.offset(), expected.offset());
                    for (a, b) in actual.data().iter().zip(expected.data()) {
                        prop_assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
                    }
                }
            }
        }
    }
}
