//! Spatial derivatives on staggered grids from constrained stencils.
//!
//! [`SpatialDerivativeFromLogits`] takes logits as an argument;
//! [`SpatialDerivative`] computes them with a [`Tower`] from the input and
//! any auxiliary fields. Both roll the input so that patches line up with
//! the target location, then contract each patch with its coefficients.

use crate::constraint::{ConstraintSpec, PolynomialConstraint};
use crate::geometry::{roll_and_shift, stencils_for, Alignment};
use crate::patches::{apply_coefficients, extract_patches, PatchMethod};
use crate::polynomial::Method;
use crate::tower::{Tower, TowerFactory};
use eddy_core::{ConfigurationError, Precision, ValidationError};
use eddy_grid::{Channels, GridArray, Offset, Shape};
use smallvec::SmallVec;

/// Relative tolerance when comparing configured steps with a grid's.
const STEP_TOL: f64 = 1e-12;

/// Everything that fixes a derivative's patch geometry and constraint.
///
/// Built with [`SpatialDerivativeSpec::builder`].
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialDerivativeSpec {
    stencil_shape: Shape,
    input_offset: Offset,
    target_offset: Offset,
    derivative_orders: SmallVec<[u32; 4]>,
    steps: SmallVec<[f64; 4]>,
    method: Method,
    patch_method: PatchMethod,
    tile_layout: Option<Vec<usize>>,
    precision: Precision,
    accuracy_order: u32,
    bias_accuracy_order: u32,
    bias: Option<Vec<f64>>,
}

/// Builder for [`SpatialDerivativeSpec`].
///
/// Required: `stencil_shape`, `input_offset`, `target_offset`,
/// `derivative_orders` and `steps`. Defaults: finite volumes, roll-based
/// patches, no tile layout, exact precision, accuracy order 1, standard
/// first-order bias.
#[derive(Default)]
pub struct SpatialDerivativeSpecBuilder {
    stencil_shape: Option<Shape>,
    input_offset: Option<Offset>,
    target_offset: Option<Offset>,
    derivative_orders: Option<SmallVec<[u32; 4]>>,
    steps: Option<SmallVec<[f64; 4]>>,
    method: Option<Method>,
    patch_method: PatchMethod,
    tile_layout: Option<Vec<usize>>,
    precision: Precision,
    accuracy_order: Option<u32>,
    bias_accuracy_order: Option<u32>,
    bias: Option<Vec<f64>>,
}

impl SpatialDerivativeSpec {
    /// Create a new builder.
    pub fn builder() -> SpatialDerivativeSpecBuilder {
        SpatialDerivativeSpecBuilder::default()
    }

    /// Stencil taps per axis.
    pub fn stencil_shape(&self) -> &[usize] {
        &self.stencil_shape
    }

    /// Location of the input data.
    pub fn input_offset(&self) -> &Offset {
        &self.input_offset
    }

    /// Location of the result.
    pub fn target_offset(&self) -> &Offset {
        &self.target_offset
    }

    /// Derivative order per axis.
    pub fn derivative_orders(&self) -> &[u32] {
        &self.derivative_orders
    }

    /// Grid spacing per axis.
    pub fn steps(&self) -> &[f64] {
        &self.steps
    }

    /// Discretization method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Patch extraction strategy.
    pub fn patch_method(&self) -> PatchMethod {
        self.patch_method
    }

    /// Tiling tag; derivatives fuse only when their tags agree.
    pub fn tile_layout(&self) -> Option<&[usize]> {
        self.tile_layout.as_deref()
    }

    /// Contraction precision.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    fn constraint(&self, shift: &[f64]) -> Result<PolynomialConstraint, ConfigurationError> {
        let stencils = stencils_for(&self.stencil_shape, shift, &self.steps)?;
        let spec = ConstraintSpec::new(stencils, self.method, self.derivative_orders.to_vec())
            .accuracy_order(self.accuracy_order)
            .precision(self.precision);
        match &self.bias {
            Some(bias) => PolynomialConstraint::from_explicit_bias(&spec, bias.clone()),
            None => PolynomialConstraint::from_default_bias(&spec, self.bias_accuracy_order),
        }
    }
}

impl SpatialDerivativeSpecBuilder {
    /// Stencil taps per axis.
    pub fn stencil_shape(mut self, shape: &[usize]) -> Self {
        self.stencil_shape = Some(shape.iter().copied().collect());
        self
    }

    /// Location of the input data.
    pub fn input_offset(mut self, offset: Offset) -> Self {
        self.input_offset = Some(offset);
        self
    }

    /// Location of the result.
    pub fn target_offset(mut self, offset: Offset) -> Self {
        self.target_offset = Some(offset);
        self
    }

    /// Derivative order per axis.
    pub fn derivative_orders(mut self, orders: &[u32]) -> Self {
        self.derivative_orders = Some(orders.iter().copied().collect());
        self
    }

    /// Grid spacing per axis.
    pub fn steps(mut self, steps: &[f64]) -> Self {
        self.steps = Some(steps.iter().copied().collect());
        self
    }

    /// Discretization method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Patch extraction strategy.
    pub fn patch_method(mut self, method: PatchMethod) -> Self {
        self.patch_method = method;
        self
    }

    /// Tiling tag.
    pub fn tile_layout(mut self, layout: &[usize]) -> Self {
        self.tile_layout = Some(layout.to_vec());
        self
    }

    /// Contraction precision.
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Order of polynomial accuracy enforced on learned coefficients.
    pub fn accuracy_order(mut self, order: u32) -> Self {
        self.accuracy_order = Some(order);
        self
    }

    /// Accuracy order of the standard stencil used as the bias.
    pub fn bias_accuracy_order(mut self, order: u32) -> Self {
        self.bias_accuracy_order = Some(order);
        self
    }

    /// Use an explicit bias instead of the standard stencil.
    pub fn bias(mut self, bias: Vec<f64>) -> Self {
        self.bias = Some(bias);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingComponent`] for a missing
    /// required field and [`ConfigurationError::StencilMismatch`] if the
    /// per-axis fields disagree in length or a stencil axis is empty.
    pub fn build(self) -> Result<SpatialDerivativeSpec, ConfigurationError> {
        let stencil_shape = self
            .stencil_shape
            .ok_or(ConfigurationError::MissingComponent { name: "stencil_shape" })?;
        let input_offset = self
            .input_offset
            .ok_or(ConfigurationError::MissingComponent { name: "input_offset" })?;
        let target_offset = self
            .target_offset
            .ok_or(ConfigurationError::MissingComponent { name: "target_offset" })?;
        let derivative_orders = self
            .derivative_orders
            .ok_or(ConfigurationError::MissingComponent { name: "derivative_orders" })?;
        let steps = self
            .steps
            .ok_or(ConfigurationError::MissingComponent { name: "steps" })?;

        let ndim = stencil_shape.len();
        let lengths = [
            input_offset.ndim(),
            target_offset.ndim(),
            derivative_orders.len(),
            steps.len(),
        ];
        if ndim == 0 || lengths.iter().any(|&n| n != ndim) {
            return Err(ConfigurationError::StencilMismatch {
                reason: format!(
                    "stencil shape has {ndim} axes; offsets, orders and steps have {lengths:?}"
                ),
            });
        }
        if stencil_shape.contains(&0) {
            return Err(ConfigurationError::StencilMismatch {
                reason: format!("empty stencil axis in {stencil_shape:?}"),
            });
        }

        Ok(SpatialDerivativeSpec {
            stencil_shape,
            input_offset,
            target_offset,
            derivative_orders,
            steps,
            method: self.method.unwrap_or(Method::FiniteVolume),
            patch_method: self.patch_method,
            tile_layout: self.tile_layout,
            precision: self.precision,
            accuracy_order: self.accuracy_order.unwrap_or(1),
            bias_accuracy_order: self.bias_accuracy_order.unwrap_or(1),
            bias: self.bias,
        })
    }
}

/// Shared patch geometry of both derivative flavours.
#[derive(Clone, Debug)]
struct PatchGeometry {
    spec: SpatialDerivativeSpec,
    alignment: Alignment,
}

impl PatchGeometry {
    fn new(spec: SpatialDerivativeSpec) -> Result<Self, ConfigurationError> {
        let alignment = roll_and_shift(&spec.input_offset, &spec.target_offset)?;
        Ok(Self { spec, alignment })
    }

    fn check_input(&self, input: &GridArray) -> Result<(), ValidationError> {
        self.spec.input_offset.check(input.offset())?;
        let grid_steps = input.grid().step();
        let matches = grid_steps.len() == self.spec.steps.len()
            && grid_steps
                .iter()
                .zip(&self.spec.steps)
                .all(|(a, b)| (a - b).abs() <= STEP_TOL * b.abs().max(1.0));
        if matches {
            Ok(())
        } else {
            Err(ValidationError::GridMismatch {
                reason: format!(
                    "derivative built for steps {:?}, grid has {:?}",
                    self.spec.steps, grid_steps
                ),
            })
        }
    }

    fn rolled(&self, input: &GridArray) -> GridArray {
        input.roll(&self.alignment.roll)
    }

    fn patches(&self, rolled: &GridArray) -> Result<Channels, ValidationError> {
        extract_patches(
            rolled.data(),
            rolled.shape(),
            &self.spec.stencil_shape,
            rolled.grid().edge_behavior(),
            self.spec.patch_method,
        )
    }

    fn finish(&self, input: &GridArray, values: Vec<f64>) -> Result<GridArray, ValidationError> {
        GridArray::new(values, self.spec.target_offset.clone(), input.grid().clone())
    }
}

/// A derivative whose coefficients come from caller-supplied logits.
///
/// # Examples
///
/// ```
/// use eddy_grid::Offset;
/// use eddy_stencil::{Method, SpatialDerivativeFromLogits, SpatialDerivativeSpec};
///
/// let spec = SpatialDerivativeSpec::builder()
///     .stencil_shape(&[4])
///     .input_offset(Offset::new(&[0.5]))
///     .target_offset(Offset::new(&[1.0]))
///     .derivative_orders(&[1])
///     .steps(&[0.1])
///     .method(Method::FiniteVolume)
///     .build()
///     .unwrap();
/// let derivative = SpatialDerivativeFromLogits::new(spec).unwrap();
/// assert_eq!(derivative.roll(), &[-1]);
/// assert_eq!(derivative.subspace_size(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct SpatialDerivativeFromLogits {
    geometry: PatchGeometry,
    constraint: PolynomialConstraint,
}

impl SpatialDerivativeFromLogits {
    /// Build the derivative's geometry and constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] from the constraint construction.
    pub fn new(spec: SpatialDerivativeSpec) -> Result<Self, ConfigurationError> {
        let geometry = PatchGeometry::new(spec)?;
        let constraint = geometry.spec.constraint(&geometry.alignment.shift)?;
        log::debug!(
            "spatial derivative {:?} from {:?} to {:?}: roll {:?}, subspace {}",
            geometry.spec.derivative_orders.as_slice(),
            geometry.spec.input_offset.as_slice(),
            geometry.spec.target_offset.as_slice(),
            geometry.alignment.roll.as_slice(),
            constraint.subspace_size()
        );
        Ok(Self { geometry, constraint })
    }

    /// The [`SpatialDerivativeSpec`] this derivative was built from.
    pub fn spec(&self) -> &SpatialDerivativeSpec {
        &self.geometry.spec
    }

    /// Integer roll applied to the input.
    pub fn roll(&self) -> &[i64] {
        &self.geometry.alignment.roll
    }

    /// Fractional stencil shift.
    pub fn shift(&self) -> &[f64] {
        &self.geometry.alignment.shift
    }

    /// The coefficient constraint.
    pub fn constraint(&self) -> &PolynomialConstraint {
        &self.constraint
    }

    /// Expected logits width.
    pub fn subspace_size(&self) -> usize {
        self.constraint.subspace_size()
    }

    /// Number of stencil taps.
    pub fn stencil_size(&self) -> usize {
        self.constraint.stencil_size()
    }

    /// Validate `input` against the configured input offset and steps.
    pub fn check_input(&self, input: &GridArray) -> Result<(), ValidationError> {
        self.geometry.check_input(input)
    }

    /// Patches of the rolled input, one channel per stencil tap.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `input` has the wrong offset, spacing
    /// or rank.
    pub fn extract_patches(&self, input: &GridArray) -> Result<Channels, ValidationError> {
        self.geometry.check_input(input)?;
        self.geometry.patches(&self.geometry.rolled(input))
    }

    /// Derivative of `input` at the target offset.
    ///
    /// `logits` is either per point (the grid's shape) or a broadcast
    /// vector.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::LogitsWidthMismatch`] for logits of the
    /// wrong width, and other [`ValidationError`]s for offset, spacing or
    /// shape mismatches.
    pub fn evaluate(&self, input: &GridArray, logits: &Channels) -> Result<GridArray, ValidationError> {
        self.constraint.check_width(logits.channels())?;
        logits.check_broadcastable(input.shape())?;
        let coefficients = self.constraint.apply(logits)?;
        let patches = self.extract_patches(input)?;
        let values = apply_coefficients(&patches, &coefficients, self.constraint.precision())?;
        self.geometry.finish(input, values)
    }
}

/// A tower followed by a polynomial constraint: inputs to valid
/// coefficients.
pub struct StencilCoefficients {
    constraint: PolynomialConstraint,
    tower: Box<dyn Tower>,
}

impl StencilCoefficients {
    /// Build the constraint and a tower emitting its subspace size.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] from the constraint construction, or
    /// [`ConfigurationError::InvalidParameter`] if the factory ignores the
    /// requested width.
    pub fn new<F>(
        spec: &ConstraintSpec,
        bias_accuracy_order: u32,
        factory: &F,
    ) -> Result<Self, ConfigurationError>
    where
        F: TowerFactory + ?Sized,
    {
        let constraint = PolynomialConstraint::from_default_bias(spec, bias_accuracy_order)?;
        Self::with_constraint(constraint, factory)
    }

    /// Attach a tower to an existing constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] if the factory's
    /// tower does not emit `subspace_size` channels.
    pub fn with_constraint<F>(constraint: PolynomialConstraint, factory: &F) -> Result<Self, ConfigurationError>
    where
        F: TowerFactory + ?Sized,
    {
        let tower = factory.build(constraint.subspace_size());
        if tower.output_channels() != constraint.subspace_size() {
            return Err(ConfigurationError::InvalidParameter {
                name: "tower_factory",
                reason: format!(
                    "tower emits {} channels, constraint needs {}",
                    tower.output_channels(),
                    constraint.subspace_size()
                ),
            });
        }
        Ok(Self { constraint, tower })
    }

    /// Coefficients conditioned on `inputs`.
    ///
    /// # Errors
    ///
    /// Propagates tower and constraint shape errors.
    pub fn evaluate(&self, inputs: &Channels) -> Result<Channels, ValidationError> {
        let logits = self.tower.forward(inputs)?;
        self.constraint.apply(&logits)
    }

    /// The coefficient constraint.
    pub fn constraint(&self) -> &PolynomialConstraint {
        &self.constraint
    }
}

/// A derivative whose coefficients are predicted from the input itself
/// and any auxiliary fields.
pub struct SpatialDerivative {
    geometry: PatchGeometry,
    coefficients: StencilCoefficients,
}

impl SpatialDerivative {
    /// Build the geometry, constraint and tower.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] from the constraint construction or
    /// the tower width check.
    pub fn new<F>(spec: SpatialDerivativeSpec, factory: &F) -> Result<Self, ConfigurationError>
    where
        F: TowerFactory + ?Sized,
    {
        let geometry = PatchGeometry::new(spec)?;
        let constraint = geometry.spec.constraint(&geometry.alignment.shift)?;
        let coefficients = StencilCoefficients::with_constraint(constraint, factory)?;
        Ok(Self {
            geometry,
            coefficients,
        })
    }

    /// The [`SpatialDerivativeSpec`] this derivative was built from.
    pub fn spec(&self) -> &SpatialDerivativeSpec {
        &self.geometry.spec
    }

    /// The coefficient model.
    pub fn coefficients(&self) -> &StencilCoefficients {
        &self.coefficients
    }

    /// Derivative of `input` at the target offset.
    ///
    /// The tower sees the rolled input followed by each rolled auxiliary
    /// field as channels.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `input` does not match the configured offset and steps or an
    /// auxiliary field lives on a different grid.
    pub fn evaluate(&self, input: &GridArray, auxiliary: &[&GridArray]) -> Result<GridArray, ValidationError> {
        self.geometry.check_input(input)?;
        let rolled = self.geometry.rolled(input);
        let patches = self.geometry.patches(&rolled)?;

        let mut features = vec![Channels::from_array(&rolled)];
        for aux in auxiliary {
            input.grid().check_same(aux.grid())?;
            features.push(Channels::from_array(&self.geometry.rolled(aux)));
        }
        let refs: Vec<&Channels> = features.iter().collect();
        let coefficients = self.coefficients.evaluate(&Channels::concat(&refs)?)?;

        let precision = self.coefficients.constraint().precision();
        let values = apply_coefficients(&patches, &coefficients, precision)?;
        self.geometry.finish(input, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conv::{Conv, ConvPadding};
    use crate::tower::ConvTower;
    use eddy_grid::{EdgeBehavior, Grid};
    use std::f64::consts::PI;
    use std::sync::Arc;

    fn periodic_grid(n: usize) -> Arc<Grid> {
        Arc::new(Grid::uniform(&[n], 1.0 / n as f64, EdgeBehavior::Wrap).unwrap())
    }

    fn center_to_face(stencil: usize, patch_method: PatchMethod) -> SpatialDerivativeSpec {
        SpatialDerivativeSpec::builder()
            .stencil_shape(&[stencil])
            .input_offset(Offset::new(&[0.5]))
            .target_offset(Offset::new(&[1.0]))
            .derivative_orders(&[1])
            .steps(&[1.0 / 32.0])
            .method(Method::FiniteDifference)
            .patch_method(patch_method)
            .bias_accuracy_order(3)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_fields() {
        assert!(matches!(
            SpatialDerivativeSpec::builder().build(),
            Err(ConfigurationError::MissingComponent { name: "stencil_shape" })
        ));
    }

    #[test]
    fn builder_checks_arity() {
        let err = SpatialDerivativeSpec::builder()
            .stencil_shape(&[3, 3])
            .input_offset(Offset::new(&[0.5]))
            .target_offset(Offset::new(&[0.5]))
            .derivative_orders(&[1])
            .steps(&[1.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::StencilMismatch { .. }));
    }

    #[test]
    fn default_method_is_finite_volume() {
        let spec = SpatialDerivativeSpec::builder()
            .stencil_shape(&[2])
            .input_offset(Offset::new(&[0.5]))
            .target_offset(Offset::new(&[1.0]))
            .derivative_orders(&[1])
            .steps(&[1.0])
            .build()
            .unwrap();
        assert_eq!(spec.method(), Method::FiniteVolume);
    }

    #[test]
    fn zero_logits_reproduce_linear_derivative() {
        let grid = periodic_grid(32);
        let center = grid.cell_center();
        let u = GridArray::from_fn(center, grid.clone(), |x| (2.0 * PI * x[0]).sin());
        let d = SpatialDerivativeFromLogits::new(center_to_face(4, PatchMethod::Roll)).unwrap();
        let du = d.evaluate(&u, &Channels::vector(vec![0.0; d.subspace_size()])).unwrap();
        assert_eq!(du.offset().as_slice(), &[1.0]);
        for (i, v) in du.data().iter().enumerate() {
            let x = grid.coordinate(0, i, du.offset());
            let exact = 2.0 * PI * (2.0 * PI * x).cos();
            assert!((v - exact).abs() < 1e-3, "{i}: {v} vs {exact}");
        }
    }

    #[test]
    fn logits_width_checked() {
        let grid = periodic_grid(32);
        let u = GridArray::zeros(grid.cell_center(), grid);
        let d = SpatialDerivativeFromLogits::new(center_to_face(4, PatchMethod::Roll)).unwrap();
        let err = d.evaluate(&u, &Channels::vector(vec![0.0; 7])).unwrap_err();
        assert!(matches!(err, ValidationError::LogitsWidthMismatch { expected: 2, actual: 7 }));
    }

    #[test]
    fn input_offset_checked() {
        let grid = periodic_grid(32);
        let u = GridArray::zeros(Offset::new(&[1.0]), grid);
        let d = SpatialDerivativeFromLogits::new(center_to_face(4, PatchMethod::Roll)).unwrap();
        assert!(matches!(
            d.extract_patches(&u),
            Err(ValidationError::OffsetMismatch { .. })
        ));
    }

    #[test]
    fn grid_spacing_checked() {
        let grid = periodic_grid(16);
        let u = GridArray::zeros(grid.cell_center(), grid);
        let d = SpatialDerivativeFromLogits::new(center_to_face(4, PatchMethod::Roll)).unwrap();
        assert!(matches!(d.extract_patches(&u), Err(ValidationError::GridMismatch { .. })));
    }

    #[test]
    fn learned_derivative_with_zero_tower_uses_bias() {
        let grid = periodic_grid(32);
        let u = GridArray::from_fn(grid.cell_center(), grid.clone(), |x| x[0]);
        let aux = GridArray::from_fn(grid.cell_center(), grid.clone(), |x| x[0] * x[0]);
        let zero_tower = |n: usize| -> Box<dyn Tower> {
            let conv = Conv::new(&[1], 2, n, 1, ConvPadding::Periodic, vec![0.0; 2 * n], vec![0.0; n]).unwrap();
            Box::new(ConvTower::new(vec![conv]).unwrap())
        };
        let learned = SpatialDerivative::new(center_to_face(4, PatchMethod::Conv), &zero_tower).unwrap();
        let from_logits = SpatialDerivativeFromLogits::new(center_to_face(4, PatchMethod::Roll)).unwrap();

        let a = learned.evaluate(&u, &[&aux]).unwrap();
        let b = from_logits
            .evaluate(&u, &Channels::vector(vec![0.0; from_logits.subspace_size()]))
            .unwrap();
        for (x, y) in a.data().iter().zip(b.data()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn tower_width_enforced() {
        let bad = |_: usize| -> Box<dyn Tower> {
            Box::new(ConvTower::new(vec![Conv::one_hot(&[1], ConvPadding::Periodic)]).unwrap())
        };
        let err = SpatialDerivative::new(center_to_face(4, PatchMethod::Roll), &bad).err();
        assert!(matches!(err, Some(ConfigurationError::InvalidParameter { .. })));
    }
}
