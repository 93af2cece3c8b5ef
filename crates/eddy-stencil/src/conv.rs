//! N-dimensional convolution with boundary handling chosen at construction.
//!
//! One [`Conv`] type covers periodic, mirrored, clamped and unpadded
//! convolutions; the boundary is a [`ConvPadding`] value rather than a
//! separate layer type per topology.
//!
//! Only forward convolutions are provided. There is no transposed
//! (upsampling) counterpart; derivative towers keep the grid resolution.

use eddy_core::{Precision, ValidationError};
use eddy_grid::index::{element_count, indices, resolve_axis, unravel};
use eddy_grid::{Channels, EdgeBehavior, Shape};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// How a convolution treats points beyond the array edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConvPadding {
    /// Wrap around (periodic domains).
    Periodic,
    /// Reflect symmetrically: index `-1` reads `0`, `-2` reads `1`.
    Mirror,
    /// Repeat the edge value.
    Clamp,
    /// No padding; the output shrinks by `effective_size - 1` per axis.
    Valid,
}

impl ConvPadding {
    fn edge(self) -> Option<EdgeBehavior> {
        match self {
            Self::Periodic => Some(EdgeBehavior::Wrap),
            Self::Mirror => Some(EdgeBehavior::Mirror),
            Self::Clamp => Some(EdgeBehavior::Clamp),
            Self::Valid => None,
        }
    }
}

impl From<EdgeBehavior> for ConvPadding {
    fn from(edge: EdgeBehavior) -> Self {
        match edge {
            EdgeBehavior::Wrap => Self::Periodic,
            EdgeBehavior::Mirror => Self::Mirror,
            EdgeBehavior::Clamp => Self::Clamp,
        }
    }
}

/// Extent covered by a kernel of `size` taps at dilation `rate`.
pub fn effective_size(size: usize, rate: usize) -> usize {
    size + (rate - 1) * (size.saturating_sub(1))
}

/// Left and right padding that keeps the output the size of the input.
pub fn same_padding(size: usize, rate: usize) -> (usize, usize) {
    let eff = effective_size(size, rate);
    let left = eff / 2;
    (left, eff - left - 1)
}

/// A dense convolution layer: kernel `[kernel_shape..., in, out]` plus bias.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv {
    kernel_shape: Shape,
    in_channels: usize,
    out_channels: usize,
    rate: usize,
    padding: ConvPadding,
    kernel: Vec<f64>,
    bias: Vec<f64>,
    precision: Precision,
}

impl Conv {
    /// Wrap explicit weights.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShapeMismatch`] if `kernel` or `bias` do
    /// not match the declared shape, or `rate` is zero.
    pub fn new(
        kernel_shape: &[usize],
        in_channels: usize,
        out_channels: usize,
        rate: usize,
        padding: ConvPadding,
        kernel: Vec<f64>,
        bias: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        let expected = element_count(kernel_shape) * in_channels * out_channels;
        if kernel.len() != expected || bias.len() != out_channels || rate == 0 {
            let mut full = kernel_shape.to_vec();
            full.extend([in_channels, out_channels]);
            return Err(ValidationError::ShapeMismatch {
                expected: full,
                actual: vec![kernel.len(), bias.len(), rate],
            });
        }
        Ok(Self {
            kernel_shape: kernel_shape.iter().copied().collect(),
            in_channels,
            out_channels,
            rate,
            padding,
            kernel,
            bias,
            precision: Precision::Exact,
        })
    }

    /// Glorot-uniform kernel and zero bias from a seeded ChaCha8 stream.
    pub fn initialized(
        kernel_shape: &[usize],
        in_channels: usize,
        out_channels: usize,
        rate: usize,
        padding: ConvPadding,
        seed: u64,
    ) -> Self {
        let taps = element_count(kernel_shape);
        let fan = (taps * (in_channels + out_channels)).max(1) as f64;
        let limit = (6.0 / fan).sqrt();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let kernel = (0..taps * in_channels * out_channels)
            .map(|_| rng.random_range(-limit..=limit))
            .collect();
        Self {
            kernel_shape: kernel_shape.iter().copied().collect(),
            in_channels,
            out_channels,
            rate: rate.max(1),
            padding,
            kernel,
            bias: vec![0.0; out_channels],
            precision: Precision::Exact,
        }
    }

    /// Single-input convolution whose output channel `j` copies the input at
    /// the `j`-th kernel tap (row-major), i.e. a patch extractor.
    pub fn one_hot(kernel_shape: &[usize], padding: ConvPadding) -> Self {
        let taps = element_count(kernel_shape);
        let mut kernel = vec![0.0; taps * taps];
        for tap in 0..taps {
            kernel[tap * taps + tap] = 1.0;
        }
        Self {
            kernel_shape: kernel_shape.iter().copied().collect(),
            in_channels: 1,
            out_channels: taps,
            rate: 1,
            padding,
            kernel,
            bias: vec![0.0; taps],
            precision: Precision::Exact,
        }
    }

    /// A `1 × … × 1` convolution over `ndim` axes: a per-point affine map
    /// `x · weights + bias` with `weights` laid out `[in, out]`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Conv::new`].
    pub fn pointwise(
        ndim: usize,
        in_channels: usize,
        out_channels: usize,
        weights: Vec<f64>,
        bias: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        Self::new(
            &vec![1; ndim],
            in_channels,
            out_channels,
            1,
            ConvPadding::Periodic,
            weights,
            bias,
        )
    }

    /// Use `precision` for the accumulation.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Kernel taps per axis.
    pub fn kernel_shape(&self) -> &[usize] {
        &self.kernel_shape
    }

    /// Boundary handling.
    pub fn padding(&self) -> ConvPadding {
        self.padding
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape, ValidationError> {
        if self.padding != ConvPadding::Valid {
            return Ok(input.iter().copied().collect());
        }
        let mut out = Shape::new();
        for (&n, &k) in input.iter().zip(&self.kernel_shape) {
            let eff = effective_size(k, self.rate);
            if n < eff {
                return Err(ValidationError::ShapeMismatch {
                    expected: self.kernel_shape.to_vec(),
                    actual: input.to_vec(),
                });
            }
            out.push(n - eff + 1);
        }
        Ok(out)
    }

    /// Convolve `input`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShapeMismatch`] if the input rank or
    /// channel count does not match the kernel, or a `Valid` convolution
    /// has an input smaller than its kernel.
    pub fn apply(&self, input: &Channels) -> Result<Channels, ValidationError> {
        if input.shape().len() != self.kernel_shape.len() || input.channels() != self.in_channels {
            let mut expected = vec![0; self.kernel_shape.len()];
            expected.push(self.in_channels);
            let mut actual = input.shape().to_vec();
            actual.push(input.channels());
            return Err(ValidationError::ShapeMismatch { expected, actual });
        }
        let in_shape = input.shape();
        let out_shape = self.output_shape(in_shape)?;
        let taps: Vec<Shape> = indices(&self.kernel_shape).collect();
        let edge = self.padding.edge();
        let in_strides = eddy_grid::index::strides(in_shape);

        let mut out = Channels::zeros(&out_shape, self.out_channels);
        let mut idx: Shape = smallvec::smallvec![0; in_shape.len()];
        let mut sources = vec![0usize; taps.len()];
        for point in 0..out.points() {
            unravel(point, &out_shape, &mut idx);
            for (src, tap) in sources.iter_mut().zip(&taps) {
                let mut flat = 0;
                for axis in 0..in_shape.len() {
                    let mut pos = (idx[axis] + tap[axis] * self.rate) as i64;
                    let resolved = match edge {
                        Some(edge) => {
                            let (left, _) = same_padding(self.kernel_shape[axis], self.rate);
                            pos -= left as i64;
                            resolve_axis(pos, in_shape[axis], edge)
                        }
                        None => pos as usize,
                    };
                    flat += resolved * in_strides[axis];
                }
                *src = flat;
            }

            let (cin, cout) = (self.in_channels, self.out_channels);
            for (o, value) in out.point_mut(point).iter_mut().enumerate() {
                let terms = sources.iter().enumerate().flat_map(|(tap, &src)| {
                    input
                        .point(src)
                        .iter()
                        .enumerate()
                        .map(move |(i, &x)| (x, self.kernel[(tap * cin + i) * cout + o]))
                });
                *value = self.precision.accumulate(self.bias[o], terms);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Channels {
        Channels::new(&[n], 1, (0..n).map(|i| i as f64).collect()).unwrap()
    }

    #[test]
    fn padding_widths() {
        assert_eq!(same_padding(3, 1), (1, 1));
        assert_eq!(same_padding(4, 1), (2, 1));
        assert_eq!(effective_size(3, 2), 5);
        assert_eq!(same_padding(3, 2), (2, 2));
    }

    #[test]
    fn padding_follows_edge_behavior() {
        assert_eq!(ConvPadding::from(EdgeBehavior::Wrap), ConvPadding::Periodic);
        assert_eq!(ConvPadding::from(EdgeBehavior::Mirror), ConvPadding::Mirror);
        assert_eq!(ConvPadding::from(EdgeBehavior::Clamp), ConvPadding::Clamp);
    }

    #[test]
    fn periodic_difference_wraps() {
        // out[i] = x[i+1] - x[i-1]
        let conv = Conv::new(&[3], 1, 1, 1, ConvPadding::Periodic, vec![-1.0, 0.0, 1.0], vec![0.0]).unwrap();
        let out = conv.apply(&ramp(4)).unwrap();
        assert_eq!(out.data(), &[-2.0, 2.0, 2.0, -2.0]);
    }

    #[test]
    fn mirror_reflects_edges() {
        let conv = Conv::new(&[3], 1, 1, 1, ConvPadding::Mirror, vec![1.0, 0.0, 0.0], vec![0.0]).unwrap();
        let out = conv.apply(&ramp(4)).unwrap();
        assert_eq!(out.data(), &[0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn valid_shrinks_output() {
        let conv = Conv::new(&[3], 1, 1, 1, ConvPadding::Valid, vec![1.0, 1.0, 1.0], vec![0.5]).unwrap();
        let out = conv.apply(&ramp(5)).unwrap();
        assert_eq!(out.shape(), &[3]);
        assert_eq!(out.data(), &[3.5, 6.5, 9.5]);
    }

    #[test]
    fn valid_rejects_small_input() {
        let conv = Conv::new(&[3], 1, 1, 2, ConvPadding::Valid, vec![1.0; 3], vec![0.0]).unwrap();
        assert!(conv.apply(&ramp(4)).is_err());
    }

    #[test]
    fn dilation_spreads_taps() {
        // rate 2, taps at -2, 0, +2
        let conv = Conv::new(&[3], 1, 1, 2, ConvPadding::Periodic, vec![1.0, 0.0, 0.0], vec![0.0]).unwrap();
        let out = conv.apply(&ramp(6)).unwrap();
        assert_eq!(out.data(), &[4.0, 5.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn one_hot_extracts_neighbours() {
        let conv = Conv::one_hot(&[3], ConvPadding::Clamp);
        let out = conv.apply(&ramp(3)).unwrap();
        assert_eq!(out.channels(), 3);
        assert_eq!(out.point(0), &[0.0, 0.0, 1.0]);
        assert_eq!(out.point(2), &[1.0, 2.0, 2.0]);
    }

    #[test]
    fn pointwise_is_affine_map() {
        let conv = Conv::pointwise(2, 2, 1, vec![2.0, 3.0], vec![1.0]).unwrap();
        let input = Channels::new(&[1, 2], 2, vec![1.0, 1.0, 0.0, 2.0]).unwrap();
        assert_eq!(conv.apply(&input).unwrap().data(), &[6.0, 7.0]);
    }

    #[test]
    fn rejects_channel_mismatch() {
        let conv = Conv::one_hot(&[3], ConvPadding::Periodic);
        let input = Channels::zeros(&[4], 2);
        assert!(matches!(conv.apply(&input), Err(ValidationError::ShapeMismatch { .. })));
    }

    #[test]
    fn initialization_is_deterministic() {
        let a = Conv::initialized(&[3, 3], 2, 4, 1, ConvPadding::Periodic, 7);
        let b = Conv::initialized(&[3, 3], 2, 4, 1, ConvPadding::Periodic, 7);
        let c = Conv::initialized(&[3, 3], 2, 4, 1, ConvPadding::Periodic, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let limit = (6.0 / (9.0 * 6.0f64)).sqrt();
        assert!(a.kernel.iter().all(|w| w.abs() <= limit));
    }
}
