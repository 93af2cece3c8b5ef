//! Constrained coefficients differentiate low-degree polynomials exactly,
//! whatever the logits.

use eddy_grid::Channels;
use eddy_stencil::{ConstraintSpec, Method, PolynomialConstraint, Stencil};
use eddy_test_utils::fixtures::polynomial;
use proptest::prelude::*;

fn coefficients(constraint: &PolynomialConstraint, logits: Vec<f64>) -> Vec<f64> {
    constraint
        .apply(&Channels::vector(logits))
        .unwrap()
        .into_data()
}

proptest! {
    #[test]
    fn first_derivative_exact_for_quadratics(
        logits in prop::collection::vec(-2.0f64..2.0, 2),
        poly in prop::collection::vec(-3.0f64..3.0, 3),
    ) {
        let stencil = Stencil::centered(2, 0.5);
        let spec = ConstraintSpec::new(vec![stencil.clone()], Method::FiniteDifference, vec![1])
            .accuracy_order(2);
        let constraint = PolynomialConstraint::from_default_bias(&spec, 2).unwrap();
        prop_assert_eq!(constraint.subspace_size(), 2);

        let c = coefficients(&constraint, logits);
        let positions: Vec<f64> = stencil.positions().collect();
        let values = polynomial::sample(&poly, &positions);
        let approx: f64 = c.iter().zip(&values).map(|(a, b)| a * b).sum();
        let exact = polynomial::eval(&polynomial::derivative(&poly, 1), 0.0);
        prop_assert!((approx - exact).abs() < 1e-9, "{} vs {}", approx, exact);
    }

    #[test]
    fn finite_volume_second_derivative_exact_for_cubics(
        logits in prop::collection::vec(-2.0f64..2.0, 1),
        poly in prop::collection::vec(-3.0f64..3.0, 4),
    ) {
        let h = 0.25;
        let stencil = Stencil::centered(2, h);
        let spec = ConstraintSpec::new(vec![stencil.clone()], Method::FiniteVolume, vec![2])
            .accuracy_order(2);
        let constraint = PolynomialConstraint::from_default_bias(&spec, 2).unwrap();
        prop_assert_eq!(constraint.subspace_size(), 1);

        let c = coefficients(&constraint, logits);
        let positions: Vec<f64> = stencil.positions().collect();
        let averages = polynomial::cell_averages(&poly, &positions, h);
        let approx: f64 = c.iter().zip(&averages).map(|(a, b)| a * b).sum();
        let exact = polynomial::eval(&polynomial::derivative(&poly, 2), 0.0);
        prop_assert!((approx - exact).abs() < 1e-8, "{} vs {}", approx, exact);
    }

    #[test]
    fn mixed_derivative_exact_for_bilinear_products(
        logits in prop::collection::vec(-1.0f64..1.0, 3),
        a in prop::collection::vec(-2.0f64..2.0, 2),
        b in prop::collection::vec(-2.0f64..2.0, 2),
    ) {
        let stencils = vec![Stencil::centered(1, 1.0), Stencil::centered(1, 1.0)];
        let spec = ConstraintSpec::new(stencils.clone(), Method::FiniteDifference, vec![1, 1]);
        let constraint = PolynomialConstraint::from_default_bias(&spec, 1).unwrap();
        prop_assert_eq!(constraint.subspace_size(), 3);

        let c = coefficients(&constraint, logits);
        let xs: Vec<f64> = stencils[0].positions().collect();
        let ys: Vec<f64> = stencils[1].positions().collect();
        // row-major over (x, y)
        let mut approx = 0.0;
        for (i, &x) in xs.iter().enumerate() {
            for (j, &y) in ys.iter().enumerate() {
                approx += c[i * ys.len() + j] * polynomial::eval(&a, x) * polynomial::eval(&b, y);
            }
        }
        let exact = a[1] * b[1];
        prop_assert!((approx - exact).abs() < 1e-9, "{} vs {}", approx, exact);
    }
}
