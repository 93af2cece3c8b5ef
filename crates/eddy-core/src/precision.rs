//! Contraction precision for constrained-coefficient evaluation.

/// Numerical precision used when contracting logits against a nullspace.
///
/// Passed explicitly to every constraint and evaluator; there is no
/// process-wide default. `Exact` accumulates in `f64`. `Fast` rounds
/// operands and the running sum to `f32`, mimicking reduced-precision matrix
/// units, and is only useful for reproducing results from such hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Precision {
    /// Full `f64` accumulation.
    #[default]
    Exact,
    /// `f32` operands and accumulation.
    Fast,
}

impl Precision {
    /// Compute `init + Σ a·b` over `terms` at this precision.
    pub fn accumulate<I>(self, init: f64, terms: I) -> f64
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        match self {
            Self::Exact => terms.into_iter().fold(init, |acc, (a, b)| acc + a * b),
            Self::Fast => {
                let sum = terms
                    .into_iter()
                    .fold(0.0f32, |acc, (a, b)| acc + (a as f32) * (b as f32));
                (init as f32 + sum) as f64
            }
        }
    }
}
