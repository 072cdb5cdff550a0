use approx::assert_abs_diff_eq;
use ndarray::{Array2, Axis, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use sparsepath::{DesignMatrix, MultiTaskOptions, PathError, compute_multitask_path};

/// Targets driven by the same three features in every task.
fn multitask_problem(n: usize, p: usize, tasks: usize, seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::<f64>::new(0.0, 1.0).unwrap();
    let x = Array2::from_shape_fn((n, p), |_| normal.sample(&mut rng));
    let mut w = Array2::zeros((p, tasks));
    for j in 0..3 {
        for k in 0..tasks {
            w[[j, k]] = 1.0 + normal.sample(&mut rng).abs();
        }
    }
    let noise = Array2::from_shape_fn((n, tasks), |_| 0.1 * normal.sample(&mut rng));
    let y = x.dot(&w) + noise;
    (x, y)
}

fn options() -> MultiTaskOptions {
    MultiTaskOptions {
        n_alphas: 6,
        eps: 5e-2,
        tol: 1e-8,
        max_iter: 50,
        return_duals: true,
        return_n_iter: true,
        ..MultiTaskOptions::default()
    }
}

#[test]
fn multitask_path_shares_support_across_tasks() {
    let (x, y) = multitask_problem(50, 12, 3, 4);
    let design = DesignMatrix::dense(x.clone()).unwrap();

    let result = compute_multitask_path(&design, y.view(), &options()).unwrap();

    assert_eq!(result.coefs.dim(), (3, 12, 6));
    assert_eq!(result.thetas.as_ref().map(|t| t.dim()), Some((6, 50, 3)));
    assert!(result.all_converged(), "{:?}", result.convergence);
    assert!(result.alphas.windows(2).into_iter().all(|w| w[0] > w[1]));

    let supports = result.support_sizes();
    assert_eq!(supports[0], 0);
    assert!(supports[5] >= 3);

    for t in 0..6 {
        let slice = result.coefs.slice(s![.., .., t]);
        for feature in slice.axis_iter(Axis(1)) {
            let zeros = feature.iter().filter(|&&v| v == 0.0).count();
            assert!(zeros == 0 || zeros == 3, "a feature is active in only some tasks");
        }
    }
}

#[test]
fn inactive_rows_satisfy_the_group_optimality_condition() {
    let (x, y) = multitask_problem(40, 10, 2, 8);
    let design = DesignMatrix::dense(x.clone()).unwrap();

    let result = compute_multitask_path(&design, y.view(), &options()).unwrap();

    let n = x.nrows() as f64;
    for (t, &alpha) in result.alphas.iter().enumerate() {
        // coefs[.., .., t] is (tasks, features); the model needs (features, tasks).
        let w = result.coefs.slice(s![.., .., t]).t().to_owned();
        let residual = &y - &x.dot(&w);
        let correlation = x.t().dot(&residual) / n;
        for (j, row) in correlation.rows().into_iter().enumerate() {
            let norm = row.dot(&row).sqrt();
            if w.row(j).iter().all(|&v| v == 0.0) {
                assert!(norm <= alpha + 1e-3, "feature {j} at index {t}: {norm} > {alpha}");
            } else {
                assert_abs_diff_eq!(norm, alpha, epsilon = 1e-3);
            }
        }
    }
}

#[test]
fn multitask_without_acceleration_reaches_the_same_solution() {
    let (x, y) = multitask_problem(40, 10, 2, 15);
    let design = DesignMatrix::dense(x).unwrap();
    let plain = MultiTaskOptions {
        use_accel: false,
        prune: false,
        ..options()
    };

    let accelerated = compute_multitask_path(&design, y.view(), &options()).unwrap();
    let unaccelerated = compute_multitask_path(&design, y.view(), &plain).unwrap();

    assert!(unaccelerated.all_converged());
    for (a, b) in accelerated.coefs.iter().zip(unaccelerated.coefs.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-4);
    }
}

#[test]
fn multitask_support_grows_along_a_short_grid() {
    let (x, y) = multitask_problem(50, 12, 3, 4);
    let design = DesignMatrix::dense(x).unwrap();
    let opts = MultiTaskOptions {
        n_alphas: 5,
        ..options()
    };

    let result = compute_multitask_path(&design, y.view(), &opts).unwrap();

    let supports = result.support_sizes();
    assert!(supports.windows(2).all(|w| w[0] <= w[1]), "supports {supports:?}");
    assert!(result.dual_gaps.iter().all(|&gap| gap <= opts.tol));
}

#[test]
fn initial_row_on_an_empty_column_is_dropped() {
    let x = ndarray::array![[1.0, 0.0], [2.0, 0.0], [-1.0, 0.0], [0.5, 0.0]];
    let y = ndarray::array![[1.0, -0.5], [1.9, -1.0], [-1.1, 0.4], [0.4, -0.2]];
    let design = DesignMatrix::dense(x).unwrap();
    let opts = MultiTaskOptions {
        alphas: Some(vec![0.1]),
        // (tasks, features)
        coef_init: Some(ndarray::array![[0.0, 1.0], [0.0, -1.0]]),
        ..options()
    };

    let result = compute_multitask_path(&design, y.view(), &opts).unwrap();

    assert!(result.all_converged(), "{:?}", result.convergence);
    assert!(result.dual_gaps[0] <= opts.tol);
    assert_eq!(result.coefs[[0, 1, 0]], 0.0);
    assert_eq!(result.coefs[[1, 1, 0]], 0.0);
    assert!(result.coefs[[0, 0, 0]] != 0.0);
}

#[test]
fn multitask_inputs_are_validated() {
    let (x, y) = multitask_problem(20, 6, 2, 1);
    let design = DesignMatrix::dense(x).unwrap();

    let no_tasks = y.slice(s![.., ..0]);
    assert!(matches!(
        compute_multitask_path(&design, no_tasks, &options()),
        Err(PathError::NoTasks)
    ));

    let transposed_init = MultiTaskOptions {
        coef_init: Some(Array2::zeros((6, 2))),
        ..options()
    };
    assert!(matches!(
        compute_multitask_path(&design, y.view(), &transposed_init),
        Err(PathError::CoefInitShape { expected: (2, 6), found: (6, 2) })
    ));
}
