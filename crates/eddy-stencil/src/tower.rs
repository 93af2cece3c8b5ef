//! Networks that produce logits from grid-shaped inputs.

use crate::conv::{Conv, ConvPadding};
use eddy_core::{ConfigurationError, ValidationError};
use eddy_grid::Channels;

/// A network mapping `[spatial..., in]` inputs to `[spatial..., out]` logits
/// at the same spatial resolution.
pub trait Tower: Send + Sync {
    /// Evaluate the network.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the input shape is not accepted.
    fn forward(&self, inputs: &Channels) -> Result<Channels, ValidationError>;

    /// Width of the output channel axis.
    fn output_channels(&self) -> usize;
}

/// Builds a [`Tower`] with a requested output width.
pub trait TowerFactory {
    /// Construct a tower emitting `output_channels` channels.
    fn build(&self, output_channels: usize) -> Box<dyn Tower>;
}

impl<F> TowerFactory for F
where
    F: Fn(usize) -> Box<dyn Tower>,
{
    fn build(&self, output_channels: usize) -> Box<dyn Tower> {
        self(output_channels)
    }
}

/// A stack of same-padded convolutions with ReLU between layers.
#[derive(Clone, Debug)]
pub struct ConvTower {
    layers: Vec<Conv>,
}

impl ConvTower {
    /// Wrap an explicit layer stack.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] if the stack is
    /// empty or adjacent layers disagree on channel counts.
    pub fn new(layers: Vec<Conv>) -> Result<Self, ConfigurationError> {
        if layers.is_empty() {
            return Err(ConfigurationError::InvalidParameter {
                name: "layers",
                reason: "a tower needs at least one layer".to_string(),
            });
        }
        for pair in layers.windows(2) {
            if pair[0].out_channels() != pair[1].in_channels() {
                return Err(ConfigurationError::InvalidParameter {
                    name: "layers",
                    reason: format!(
                        "layer emits {} channels, next expects {}",
                        pair[0].out_channels(),
                        pair[1].in_channels()
                    ),
                });
            }
        }
        Ok(Self { layers })
    }
}

impl Tower for ConvTower {
    fn forward(&self, inputs: &Channels) -> Result<Channels, ValidationError> {
        let last = self.layers.len() - 1;
        let mut x = inputs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.apply(&x)?;
            if i < last {
                let shape = x.shape().to_vec();
                let channels = x.channels();
                let data = x.into_data().into_iter().map(|v| v.max(0.0)).collect();
                x = Channels::new(&shape, channels, data)?;
            }
        }
        Ok(x)
    }

    fn output_channels(&self) -> usize {
        self.layers.last().map_or(0, Conv::out_channels)
    }
}

/// Builds [`ConvTower`]s with fixed hidden width, depth and kernel.
///
/// # Examples
///
/// ```
/// use eddy_stencil::tower::{ConvTowerFactory, Tower, TowerFactory};
///
/// let factory = ConvTowerFactory::builder()
///     .input_channels(2)
///     .hidden_channels(8)
///     .hidden_layers(2)
///     .kernel_shape(&[3, 3])
///     .build()
///     .unwrap();
/// assert_eq!(factory.build(5).output_channels(), 5);
/// ```
#[derive(Clone, Debug)]
pub struct ConvTowerFactory {
    input_channels: usize,
    hidden_channels: usize,
    hidden_layers: usize,
    kernel_shape: Vec<usize>,
    padding: ConvPadding,
    seed: u64,
}

/// Builder for [`ConvTowerFactory`].
///
/// Required: `input_channels` and `kernel_shape`. Defaults: 16 hidden
/// channels, 2 hidden layers, periodic padding, seed 0.
pub struct ConvTowerFactoryBuilder {
    input_channels: Option<usize>,
    hidden_channels: usize,
    hidden_layers: usize,
    kernel_shape: Option<Vec<usize>>,
    padding: ConvPadding,
    seed: u64,
}

impl ConvTowerFactory {
    /// Create a new builder.
    pub fn builder() -> ConvTowerFactoryBuilder {
        ConvTowerFactoryBuilder {
            input_channels: None,
            hidden_channels: 16,
            hidden_layers: 2,
            kernel_shape: None,
            padding: ConvPadding::Periodic,
            seed: 0,
        }
    }
}

impl ConvTowerFactoryBuilder {
    /// Channels of the tower input.
    pub fn input_channels(mut self, channels: usize) -> Self {
        self.input_channels = Some(channels);
        self
    }

    /// Width of each hidden layer.
    pub fn hidden_channels(mut self, channels: usize) -> Self {
        self.hidden_channels = channels;
        self
    }

    /// Number of hidden layers before the output layer.
    pub fn hidden_layers(mut self, layers: usize) -> Self {
        self.hidden_layers = layers;
        self
    }

    /// Kernel taps per spatial axis.
    pub fn kernel_shape(mut self, shape: &[usize]) -> Self {
        self.kernel_shape = Some(shape.to_vec());
        self
    }

    /// Boundary handling for every layer.
    pub fn padding(mut self, padding: ConvPadding) -> Self {
        self.padding = padding;
        self
    }

    /// Seed for weight initialization.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if a required field is missing, the
    /// kernel has a zero extent, or `Valid` padding is requested (towers
    /// must preserve resolution).
    pub fn build(self) -> Result<ConvTowerFactory, ConfigurationError> {
        let input_channels = self
            .input_channels
            .ok_or(ConfigurationError::MissingComponent { name: "input_channels" })?;
        let kernel_shape = self
            .kernel_shape
            .ok_or(ConfigurationError::MissingComponent { name: "kernel_shape" })?;
        if kernel_shape.is_empty() || kernel_shape.contains(&0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "kernel_shape",
                reason: format!("every axis needs at least one tap, got {kernel_shape:?}"),
            });
        }
        if self.padding == ConvPadding::Valid {
            return Err(ConfigurationError::InvalidParameter {
                name: "padding",
                reason: "towers must preserve spatial resolution".to_string(),
            });
        }
        if self.hidden_layers > 0 && self.hidden_channels == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "hidden_channels",
                reason: "must be positive".to_string(),
            });
        }
        Ok(ConvTowerFactory {
            input_channels,
            hidden_channels: self.hidden_channels,
            hidden_layers: self.hidden_layers,
            kernel_shape,
            padding: self.padding,
            seed: self.seed,
        })
    }
}

impl TowerFactory for ConvTowerFactory {
    fn build(&self, output_channels: usize) -> Box<dyn Tower> {
        let mut layers = Vec::with_capacity(self.hidden_layers + 1);
        let mut channels = self.input_channels;
        for layer in 0..=self.hidden_layers {
            let out = if layer == self.hidden_layers {
                output_channels
            } else {
                self.hidden_channels
            };
            let seed = self.seed.wrapping_add(layer as u64);
            layers.push(Conv::initialized(&self.kernel_shape, channels, out, 1, self.padding, seed));
            channels = out;
        }
        Box::new(ConvTower { layers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> ConvTowerFactory {
        ConvTowerFactory::builder()
            .input_channels(1)
            .hidden_channels(4)
            .hidden_layers(1)
            .kernel_shape(&[3])
            .build()
            .unwrap()
    }

    #[test]
    fn output_width_matches_request() {
        let tower = factory().build(3);
        let out = tower.forward(&Channels::zeros(&[8], 1)).unwrap();
        assert_eq!(out.channels(), 3);
        assert_eq!(out.shape(), &[8]);
        assert_eq!(tower.output_channels(), 3);
    }

    #[test]
    fn zero_input_gives_zero_output() {
        let tower = factory().build(2);
        let out = tower.forward(&Channels::zeros(&[5], 1)).unwrap();
        assert!(out.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn relu_applied_between_layers() {
        // identity then negation: relu clips before the second layer
        let first = Conv::new(&[1], 1, 1, 1, ConvPadding::Periodic, vec![1.0], vec![0.0]).unwrap();
        let second = Conv::new(&[1], 1, 1, 1, ConvPadding::Periodic, vec![-1.0], vec![0.0]).unwrap();
        let tower = ConvTower::new(vec![first, second]).unwrap();
        let input = Channels::new(&[2], 1, vec![-2.0, 3.0]).unwrap();
        assert_eq!(tower.forward(&input).unwrap().data(), &[0.0, -3.0]);
    }

    #[test]
    fn mismatched_layers_rejected() {
        let a = Conv::one_hot(&[3], ConvPadding::Periodic);
        let b = Conv::one_hot(&[3], ConvPadding::Periodic);
        assert!(ConvTower::new(vec![a, b]).is_err());
        assert!(ConvTower::new(Vec::new()).is_err());
    }

    #[test]
    fn builder_requires_kernel() {
        assert!(matches!(
            ConvTowerFactory::builder().input_channels(1).build(),
            Err(ConfigurationError::MissingComponent { name: "kernel_shape" })
        ));
    }

    #[test]
    fn closures_are_factories() {
        let f = |n: usize| -> Box<dyn Tower> { factory().build(n) };
        assert_eq!(TowerFactory::build(&f, 4).output_channels(), 4);
    }
}
