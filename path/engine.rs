//! # Path Engine
//!
//! Sequential solver for the whole regularization path:
//!
//! 1. validate the inputs and build the implicit column correction;
//! 2. build the descending grid (computing `alpha_max` only when needed);
//! 3. for each grid index, warm-start from the previous index, certify a dual
//!    point, run the selected oracle, and record coefficients, gap and
//!    diagnostics.
//!
//! The grid is walked strictly in order; each index depends on the previous
//! one through the warm start.

use crate::assemble::{MultiTaskPathAssembler, PathAssembler};
use crate::centering::{CenteringError, SparseCentering};
use crate::config::{MultiTaskOptions, PathOptions};
use crate::design::{DesignError, DesignMatrix};
use crate::dual::DualPointBuilder;
use crate::grid::{GridError, GridSpec, alpha_max, alpha_max_multitask, build_grid};
use crate::monitor::ConvergenceMonitor;
use crate::solver::loss::Loss;
use crate::solver::{
    MultiTaskBlockCd, OracleOutput, OracleSettings, SolverStrategy, Subproblem, SubproblemOracle,
    SubproblemState,
};
use crate::types::{MultiTaskPathResult, PathResult, ProblemKind, count_nonzero};
use crate::warm_start::{WarmStartController, active_rows};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("The design has {samples} samples but the target has {targets} rows.")]
    SampleMismatch { samples: usize, targets: usize },

    #[error("Non-finite target value at row {row}.")]
    NonFiniteTarget { row: usize },

    #[error("Logistic regression needs labels in {{-1, +1}}; found {value} at row {row}.")]
    InvalidLabel { row: usize, value: f64 },

    #[error("Positivity constraints are only supported for the Lasso, not for logistic regression.")]
    PositiveLogistic,

    #[error("The option '{name}' must be at least 1.")]
    ZeroBudget { name: &'static str },

    #[error("The tolerance must be finite and non-negative; got {0}.")]
    InvalidTolerance(f64),

    #[error("coef_init has shape {found:?}, expected {expected:?}.")]
    CoefInitShape {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("coef_init contains a non-finite value.")]
    NonFiniteCoefInit,

    #[error("At least one target column is required.")]
    NoTasks,

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Centering(#[from] CenteringError),

    #[error(transparent)]
    Design(#[from] DesignError),
}

/// Knobs shared by both entry points, checked before any work starts.
struct Budgets {
    max_iter: usize,
    gap_freq: usize,
    p0: usize,
    tol: f64,
}

impl Budgets {
    fn validate(&self) -> Result<(), PathError> {
        for (name, value) in [("max_iter", self.max_iter), ("gap_freq", self.gap_freq), ("p0", self.p0)] {
            if value == 0 {
                return Err(PathError::ZeroBudget { name });
            }
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            return Err(PathError::InvalidTolerance(self.tol));
        }
        Ok(())
    }
}

fn check_targets<'a>(
    samples: usize,
    rows: usize,
    values: impl Iterator<Item = (usize, &'a f64)>,
) -> Result<(), PathError> {
    if rows != samples {
        return Err(PathError::SampleMismatch {
            samples,
            targets: rows,
        });
    }
    for (row, value) in values {
        if !value.is_finite() {
            return Err(PathError::NonFiniteTarget { row });
        }
    }
    Ok(())
}

/// Computes a Lasso, positive Lasso, or sparse logistic regression path.
pub fn compute_path(
    design: &DesignMatrix,
    y: ArrayView1<f64>,
    kind: ProblemKind,
    options: &PathOptions,
) -> Result<PathResult, PathError> {
    let n_samples = design.n_samples();
    let n_features = design.n_features();
    check_targets(n_samples, y.len(), y.iter().enumerate())?;
    if kind == ProblemKind::Logreg {
        if options.positive {
            return Err(PathError::PositiveLogistic);
        }
        if let Some((row, &value)) = y.iter().enumerate().find(|(_, v)| **v != 1.0 && **v != -1.0) {
            return Err(PathError::InvalidLabel { row, value });
        }
    }
    Budgets {
        max_iter: options.max_iter,
        gap_freq: options.gap_freq,
        p0: options.p0,
        tol: options.tol,
    }
    .validate()?;
    if let Some(init) = options.coef_init.as_deref() {
        if init.len() != n_features {
            return Err(PathError::CoefInitShape {
                expected: (n_features, 1),
                found: (init.len(), 1),
            });
        }
        if init.iter().any(|v| !v.is_finite()) {
            return Err(PathError::NonFiniteCoefInit);
        }
    }

    let centering = SparseCentering::new(
        n_features,
        options.x_offset.as_deref(),
        options.x_scale.as_deref(),
    )?;
    let x = centering.apply(design)?;
    let spec = GridSpec::new(options.alphas.as_deref(), options.n_alphas, options.eps);
    let alphas = build_grid(spec, || alpha_max(&x, y, kind, options.positive))?;
    let col_sq_norms = x.col_sq_norms();

    let loss = match kind {
        ProblemKind::Lasso => Loss::Quadratic,
        ProblemKind::Logreg => Loss::Logistic,
    };
    let settings = OracleSettings {
        max_iter: options.max_iter,
        max_epochs: options.max_epochs,
        gap_freq: options.gap_freq,
        tol: options.tol,
        prune: options.prune,
        accel_depth: options.accel_depth,
        verbose: options.verbose_inner > 0,
    };
    let strategy = SolverStrategy::select(kind, options.positive, options.use_prox_newton, settings);
    let duals = DualPointBuilder::new(x, options.positive);
    let monitor = ConvergenceMonitor::new(options.tol);
    let mut assembler = PathAssembler::new(
        alphas.clone(),
        n_features,
        n_samples,
        options.return_duals,
        options.return_n_iter,
    );
    log::debug!(
        "Solving {kind:?} path over {} alphas with {} ({n_samples} samples, {n_features} features, centered: {})",
        alphas.len(),
        strategy.name(),
        x.is_centered()
    );

    let (mut state, mut seed) = WarmStartController::new(options.p0).initial(
        loss,
        &x,
        y,
        options.coef_init.as_deref(),
    );
    for (t, &alpha) in alphas.iter().enumerate() {
        let output = if alpha == 0.0 {
            // Only a zero alpha_max produces this; the zero vector is optimal.
            OracleOutput {
                state: SubproblemState {
                    coef: Array1::zeros(n_features),
                    fitted: loss.zero_fitted(y),
                    dual: Array1::zeros(n_samples),
                },
                gaps: vec![0.0],
            }
        } else {
            state.dual = if t == 0 {
                duals.initial(loss, y, state.fitted.view(), alpha)
            } else {
                duals.recertify(state.dual)
            };
            let problem = Subproblem {
                x,
                y,
                alpha,
                col_sq_norms: col_sq_norms.view(),
                ws_seed: seed,
            };
            strategy.solve(&problem, state)
        };
        let convergence = monitor.record(t, alpha, &output);
        if options.verbose > 0 {
            log::info!(
                "Iteration {}/{}: alpha {alpha:.4e}, {} non-zeros, gap {:.3e}, {} outer iterations",
                t + 1,
                alphas.len(),
                count_nonzero(output.state.coef.view()),
                convergence.gap,
                convergence.n_iter
            );
        }
        assembler.record(output.state.coef.view(), output.state.dual.view(), convergence);
        (state, seed) = WarmStartController::advance(output.state);
    }

    Ok(assembler.finish())
}

/// Computes a multi-task Lasso path. `y` has one column per task.
pub fn compute_multitask_path(
    design: &DesignMatrix,
    y: ArrayView2<f64>,
    options: &MultiTaskOptions,
) -> Result<MultiTaskPathResult, PathError> {
    let n_samples = design.n_samples();
    let n_features = design.n_features();
    let n_tasks = y.ncols();
    if n_tasks == 0 {
        return Err(PathError::NoTasks);
    }
    check_targets(
        n_samples,
        y.nrows(),
        y.indexed_iter().map(|((row, _), v)| (row, v)),
    )?;
    Budgets {
        max_iter: options.max_iter,
        gap_freq: options.gap_freq,
        p0: options.p0,
        tol: options.tol,
    }
    .validate()?;
    if let Some(init) = options.coef_init.as_ref() {
        if init.dim() != (n_tasks, n_features) {
            return Err(PathError::CoefInitShape {
                expected: (n_tasks, n_features),
                found: init.dim(),
            });
        }
        if init.iter().any(|v| !v.is_finite()) {
            return Err(PathError::NonFiniteCoefInit);
        }
    }

    let centering = SparseCentering::new(
        n_features,
        options.x_offset.as_deref(),
        options.x_scale.as_deref(),
    )?;
    let x = centering.apply(design)?;
    let spec = GridSpec::new(options.alphas.as_deref(), options.n_alphas, options.eps);
    let alphas = build_grid(spec, || alpha_max_multitask(&x, y))?;
    let col_sq_norms = x.col_sq_norms();

    let oracle = MultiTaskBlockCd {
        settings: OracleSettings {
            max_iter: options.max_iter,
            max_epochs: options.max_epochs,
            gap_freq: options.gap_freq,
            tol: options.tol,
            prune: options.prune,
            accel_depth: if options.use_accel { options.accel_depth } else { 0 },
            verbose: options.verbose_inner > 0,
        },
    };
    let duals = DualPointBuilder::new(x, false);
    let monitor = ConvergenceMonitor::new(options.tol);
    let mut assembler = MultiTaskPathAssembler::new(
        alphas.clone(),
        n_features,
        n_samples,
        n_tasks,
        options.return_duals,
        options.return_n_iter,
    );
    log::debug!(
        "Solving multi-task path over {} alphas ({n_samples} samples, {n_features} features, {n_tasks} tasks)",
        alphas.len()
    );

    let (mut state, mut seed) =
        WarmStartController::new(options.p0).initial_multitask(&x, y, options.coef_init.as_ref());
    for (t, &alpha) in alphas.iter().enumerate() {
        let output = if alpha == 0.0 {
            OracleOutput {
                state: SubproblemState {
                    coef: Array2::zeros((n_features, n_tasks)),
                    fitted: y.to_owned(),
                    dual: Array2::zeros((n_samples, n_tasks)),
                },
                gaps: vec![0.0],
            }
        } else {
            state.dual = if t == 0 {
                duals.initial_multitask(state.fitted.view())
            } else {
                duals.recertify_multitask(state.dual)
            };
            let problem = Subproblem {
                x,
                y,
                alpha,
                col_sq_norms: col_sq_norms.view(),
                ws_seed: seed,
            };
            oracle.solve(&problem, state)
        };
        let convergence = monitor.record(t, alpha, &output);
        if options.verbose > 0 {
            log::info!(
                "Iteration {}/{}: alpha {alpha:.4e}, {} active features, gap {:.3e}",
                t + 1,
                alphas.len(),
                active_rows(output.state.coef.view()),
                convergence.gap
            );
        }
        assembler.record(output.state.coef.view(), output.state.dual.view(), convergence);
        (state, seed) = WarmStartController::advance_multitask(output.state);
    }

    Ok(assembler.finish())
}
