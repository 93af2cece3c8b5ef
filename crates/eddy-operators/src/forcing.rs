//! External body forces.

use eddy_core::ValidationError;
use eddy_grid::{GridArray, GridField};
use eddy_solver::Forcing;

/// Kolmogorov forcing: `f_x = scale · sin(k y)`, other components zero.
///
/// With [`swapped`](Self::swapped) the roles of the first two axes are
/// exchanged, `f_y = scale · sin(k x)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KolmogorovForcing {
    scale: f64,
    wavenumber: f64,
    swap_xy: bool,
}

impl Default for KolmogorovForcing {
    fn default() -> Self {
        Self::new(1.0, 2.0)
    }
}

impl KolmogorovForcing {
    /// Forcing with amplitude `scale` and wavenumber `wavenumber`.
    pub fn new(scale: f64, wavenumber: f64) -> Self {
        Self {
            scale,
            wavenumber,
            swap_xy: false,
        }
    }

    /// Force the second component as a function of the first coordinate.
    pub fn swapped(mut self) -> Self {
        self.swap_xy = !self.swap_xy;
        self
    }
}

impl Forcing for KolmogorovForcing {
    fn force(&self, v: &GridField) -> Result<GridField, ValidationError> {
        let grid = v.grid();
        if grid.ndim() < 2 {
            return Err(ValidationError::GridMismatch {
                reason: format!("kolmogorov forcing needs 2 or more axes, grid has {}", grid.ndim()),
            });
        }
        let (forced, along) = if self.swap_xy { (1, 0) } else { (0, 1) };
        let (scale, k) = (self.scale, self.wavenumber);
        let components = v
            .iter()
            .enumerate()
            .map(|(i, u)| {
                if i == forced {
                    GridArray::from_fn(u.offset().clone(), grid.clone(), |x| {
                        scale * (k * x[along]).sin()
                    })
                } else {
                    u.scaled(0.0)
                }
            })
            .collect();
        GridField::new(components)
    }
}

/// Linear forcing `f = coefficient · v`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearForcing {
    coefficient: f64,
}

impl LinearForcing {
    /// Forcing proportional to the velocity.
    pub fn new(coefficient: f64) -> Self {
        Self { coefficient }
    }
}

impl Forcing for LinearForcing {
    fn force(&self, v: &GridField) -> Result<GridField, ValidationError> {
        Ok(v.scaled(self.coefficient))
    }
}

/// Sum of several forcings.
#[derive(Default)]
pub struct SumForcing {
    terms: Vec<Box<dyn Forcing>>,
}

impl SumForcing {
    /// An empty sum, which forces nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term.
    pub fn with(mut self, forcing: impl Forcing + 'static) -> Self {
        self.terms.push(Box::new(forcing));
        self
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the sum has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Forcing for SumForcing {
    fn force(&self, v: &GridField) -> Result<GridField, ValidationError> {
        let mut total = v.scaled(0.0);
        for term in &self.terms {
            let f = term.force(v)?;
            v.check_arity(&f)?;
            total = total.try_add(&f)?;
        }
        Ok(total)
    }
}
