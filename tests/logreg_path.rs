use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use sparsepath::design::CenteredDesign;
use sparsepath::solver::constraint_norm;
use sparsepath::{DesignMatrix, PathError, PathOptions, ProblemKind, compute_path};

/// Labels in {-1, +1} drawn from a sparse logistic model.
fn classification_problem(n: usize, p: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let x = Array2::from_shape_fn((n, p), |_| normal.sample(&mut rng));
    let mut w = Array1::<f64>::zeros(p);
    for j in 0..p.min(4) {
        w[j] = if j % 2 == 0 { 1.5 } else { -1.0 };
    }
    let score = x.dot(&w);
    let y = score.mapv(|s| {
        let prob = 1.0 / (1.0 + (-s).exp());
        if rng.gen_range(0.0..1.0) < prob { 1.0 } else { -1.0 }
    });
    (x, y)
}

fn options(prox_newton: bool) -> PathOptions {
    PathOptions {
        n_alphas: 6,
        eps: 5e-2,
        tol: 1e-8,
        max_iter: 50,
        use_prox_newton: prox_newton,
        return_duals: true,
        ..PathOptions::default()
    }
}

#[test]
fn coordinate_descent_and_prox_newton_trace_the_same_path() {
    let (x, y) = classification_problem(80, 15, 5);
    let design = DesignMatrix::dense(x).unwrap();

    let cd = compute_path(&design, y.view(), ProblemKind::Logreg, &options(false)).unwrap();
    let newton = compute_path(&design, y.view(), ProblemKind::Logreg, &options(true)).unwrap();

    assert_eq!(cd.alphas, newton.alphas);
    assert!(cd.all_converged(), "{:?}", cd.convergence);
    assert!(newton.all_converged(), "{:?}", newton.convergence);
    for (a, b) in cd.coefs.iter().zip(newton.coefs.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-3);
    }
    assert_eq!(cd.support_sizes()[0], 0);
    assert!(cd.support_sizes()[5] > 0);
}

#[test]
fn logistic_alpha_max_uses_the_half_correlation() {
    let (x, y) = classification_problem(50, 8, 9);
    let design = DesignMatrix::dense(x.clone()).unwrap();

    let result = compute_path(&design, y.view(), ProblemKind::Logreg, &options(false)).unwrap();

    let expected = x.t().dot(&y).iter().fold(0.0_f64, |acc, c| acc.max(c.abs())) / 2.0;
    assert_relative_eq!(result.alphas[0], expected, max_relative = 1e-10);
}

#[test]
fn logistic_duals_are_feasible_and_inside_the_label_box() {
    let (x, y) = classification_problem(60, 10, 13);
    let design = DesignMatrix::dense(x).unwrap();

    let result = compute_path(&design, y.view(), ProblemKind::Logreg, &options(true)).unwrap();

    let view = CenteredDesign::uncentered(&design);
    let thetas = result.thetas.as_ref().expect("duals were requested");
    for (theta, &alpha) in thetas.rows().into_iter().zip(result.alphas.iter()) {
        assert!(constraint_norm(&view, theta, 0..10, false) <= 1.0 + 1e-8);
        // αθᵢyᵢ must stay in [0, 1] for the dual objective to be finite.
        for (&t, &label) in theta.iter().zip(y.iter()) {
            let u = alpha * t * label;
            assert!((-1e-12..=1.0 + 1e-12).contains(&u), "u = {u}");
        }
    }
}

#[test]
fn both_strategies_drop_initial_weight_on_an_empty_column() {
    let x = ndarray::array![[1.0, 0.0], [2.0, 0.0], [-1.0, 0.0], [-0.5, 0.0], [0.3, 0.0], [-2.0, 0.0]];
    let y = ndarray::array![1.0, 1.0, -1.0, 1.0, -1.0, -1.0];
    let design = DesignMatrix::dense(x).unwrap();

    for prox_newton in [false, true] {
        let opts = PathOptions {
            alphas: Some(vec![0.1]),
            coef_init: Some(vec![0.0, 1.5]),
            ..options(prox_newton)
        };
        let result = compute_path(&design, y.view(), ProblemKind::Logreg, &opts).unwrap();

        assert!(result.all_converged(), "prox_newton={prox_newton}: {:?}", result.convergence);
        assert_eq!(result.coefs[[1, 0]], 0.0);
        assert!(result.coefs[[0, 0]] > 0.0);
    }
}

#[test]
fn logistic_inputs_are_validated() {
    let (x, mut y) = classification_problem(30, 5, 2);
    let design = DesignMatrix::dense(x).unwrap();

    let positive = PathOptions {
        positive: true,
        ..options(false)
    };
    assert!(matches!(
        compute_path(&design, y.view(), ProblemKind::Logreg, &positive),
        Err(PathError::PositiveLogistic)
    ));

    y[4] = 0.0;
    assert!(matches!(
        compute_path(&design, y.view(), ProblemKind::Logreg, &options(false)),
        Err(PathError::InvalidLabel { row: 4, .. })
    ));
}
