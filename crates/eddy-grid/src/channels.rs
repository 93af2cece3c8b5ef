//! Multi-channel arrays: logits, stencil coefficients, patches, and network
//! activations all share the `[spatial..., channels]` layout.

use crate::array::GridArray;
use crate::index::{element_count, Shape};
use eddy_core::ValidationError;

/// A dense array of shape `[spatial..., channels]`, channels fastest.
///
/// A zero-rank spatial shape holds a single vector that broadcasts against
/// any spatial shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Channels {
    shape: Shape,
    channels: usize,
    data: Vec<f64>,
}

impl Channels {
    /// Wrap `data` with the given spatial shape and channel count.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShapeMismatch`] if the data length is not
    /// `∏ shape · channels`.
    pub fn new(shape: &[usize], channels: usize, data: Vec<f64>) -> Result<Self, ValidationError> {
        let expected = element_count(shape) * channels;
        if data.len() != expected {
            let mut full = shape.to_vec();
            full.push(channels);
            return Err(ValidationError::ShapeMismatch {
                expected: full,
                actual: vec![data.len()],
            });
        }
        Ok(Self {
            shape: shape.iter().copied().collect(),
            channels,
            data,
        })
    }

    /// An all-zero array.
    pub fn zeros(shape: &[usize], channels: usize) -> Self {
        Self {
            shape: shape.iter().copied().collect(),
            channels,
            data: vec![0.0; element_count(shape) * channels],
        }
    }

    /// A single broadcast vector.
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: Shape::new(),
            channels: values.len(),
            data: values,
        }
    }

    /// A one-channel view of a grid array's values.
    pub fn from_array(array: &GridArray) -> Self {
        Self {
            shape: array.shape().iter().copied().collect(),
            channels: 1,
            data: array.data().to_vec(),
        }
    }

    /// Stack arrays with identical spatial shape along the channel axis.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShapeMismatch`] if spatial shapes differ
    /// or `parts` is empty.
    pub fn concat(parts: &[&Channels]) -> Result<Self, ValidationError> {
        let first = parts.first().ok_or(ValidationError::ShapeMismatch {
            expected: vec![1],
            actual: vec![0],
        })?;
        for p in parts {
            first.check_spatial(&p.shape)?;
        }
        let channels: usize = parts.iter().map(|p| p.channels).sum();
        let mut data = Vec::with_capacity(first.points() * channels);
        for point in 0..first.points() {
            for p in parts {
                data.extend_from_slice(p.point(point));
            }
        }
        Ok(Self {
            shape: first.shape.clone(),
            channels,
            data,
        })
    }

    /// Spatial shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of spatial points.
    pub fn points(&self) -> usize {
        element_count(&self.shape)
    }

    /// Whether this is a single broadcast vector.
    pub fn is_broadcast(&self) -> bool {
        self.shape.is_empty()
    }

    /// All values, channels fastest.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Consume the array, returning its values.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Channel values at a spatial point.
    pub fn point(&self, point: usize) -> &[f64] {
        &self.data[point * self.channels..(point + 1) * self.channels]
    }

    /// Mutable channel values at a spatial point.
    pub fn point_mut(&mut self, point: usize) -> &mut [f64] {
        &mut self.data[point * self.channels..(point + 1) * self.channels]
    }

    /// Values of one channel across all points.
    pub fn channel(&self, channel: usize) -> Vec<f64> {
        self.data
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
            .collect()
    }

    /// Split along the channel axis into consecutive groups of `widths`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShapeMismatch`] if the widths do not sum to
    /// the channel count.
    pub fn split(&self, widths: &[usize]) -> Result<Vec<Channels>, ValidationError> {
        let total: usize = widths.iter().sum();
        if total != self.channels {
            return Err(ValidationError::ShapeMismatch {
                expected: vec![self.channels],
                actual: vec![total],
            });
        }
        let mut out: Vec<Channels> = widths.iter().map(|&w| Channels::zeros(&self.shape, w)).collect();
        for point in 0..self.points() {
            let values = self.point(point);
            let mut start = 0;
            for (part, &w) in out.iter_mut().zip(widths) {
                part.point_mut(point).copy_from_slice(&values[start..start + w]);
                start += w;
            }
        }
        Ok(out)
    }

    /// Return `Ok` if `shape` matches this array's spatial shape.
    pub fn check_spatial(&self, shape: &[usize]) -> Result<(), ValidationError> {
        if self.shape.as_slice() == shape {
            Ok(())
        } else {
            Err(ValidationError::ShapeMismatch {
                expected: self.shape.to_vec(),
                actual: shape.to_vec(),
            })
        }
    }

    /// Return `Ok` if this array is a broadcast vector or matches `shape`.
    pub fn check_broadcastable(&self, shape: &[usize]) -> Result<(), ValidationError> {
        if self.is_broadcast() {
            Ok(())
        } else {
            self.check_spatial(shape)
        }
    }

    /// Channel values at `point`, treating a broadcast vector as constant.
    pub fn point_or_broadcast(&self, point: usize) -> &[f64] {
        if self.is_broadcast() {
            &self.data
        } else {
            self.point(point)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_length() {
        assert!(Channels::new(&[2, 2], 3, vec![0.0; 11]).is_err());
        assert!(Channels::new(&[2, 2], 3, vec![0.0; 12]).is_ok());
    }

    #[test]
    fn vector_is_broadcast() {
        let v = Channels::vector(vec![1.0, 2.0]);
        assert!(v.is_broadcast());
        assert_eq!(v.points(), 1);
        assert!(v.check_broadcastable(&[7, 3]).is_ok());
        assert_eq!(v.point_or_broadcast(20), &[1.0, 2.0]);
    }

    #[test]
    fn concat_then_split_restores_parts() {
        let a = Channels::new(&[2], 1, vec![1.0, 2.0]).unwrap();
        let b = Channels::new(&[2], 2, vec![10.0, 11.0, 20.0, 21.0]).unwrap();
        let joined = Channels::concat(&[&a, &b]).unwrap();
        assert_eq!(joined.data(), &[1.0, 10.0, 11.0, 2.0, 20.0, 21.0]);
        let parts = joined.split(&[1, 2]).unwrap();
        assert_eq!(parts[0], a);
        assert_eq!(parts[1], b);
    }

    #[test]
    fn concat_rejects_shape_mismatch() {
        let a = Channels::zeros(&[2], 1);
        let b = Channels::zeros(&[3], 1);
        assert!(Channels::concat(&[&a, &b]).is_err());
    }

    #[test]
    fn channel_extracts_strided_values() {
        let c = Channels::new(&[3], 2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(c.channel(1), vec![1.0, 3.0, 5.0]);
    }
}
