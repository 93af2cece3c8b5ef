//! Boundary topology for grid axes.

/// How a grid resolves indices that fall outside its extent.
///
/// Applies uniformly to every axis of a [`Grid`](crate::Grid). Patch
/// extraction, convolution padding and the finite-difference helpers all
/// resolve out-of-range neighbours through [`resolve_axis`](crate::index::resolve_axis).
///
/// # Examples
///
/// ```
/// use eddy_grid::{EdgeBehavior, index::resolve_axis};
///
/// assert_eq!(resolve_axis(-1, 5, EdgeBehavior::Wrap), 4);
/// assert_eq!(resolve_axis(-1, 5, EdgeBehavior::Clamp), 0);
/// assert_eq!(resolve_axis(-2, 5, EdgeBehavior::Mirror), 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeBehavior {
    /// Out-of-range index wraps to the opposite side (periodic).
    Wrap,
    /// Out-of-range index maps to the nearest boundary cell.
    Clamp,
    /// Out-of-range index reflects about the boundary face, repeating the
    /// edge cell (`-1 → 0`, `-2 → 1`).
    Mirror,
}

impl EdgeBehavior {
    /// Whether this topology is periodic.
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Wrap)
    }
}
