//! # Subproblem Oracles
//!
//! An oracle solves the L1-penalized problem for one fixed `alpha`, starting
//! from a warm point, until a duality gap certifies the requested tolerance or
//! its outer-iteration budget runs out. Every strategy shares one contract:
//!
//! - it receives the state buffers (coefficients, fitted values, dual point)
//!   by value and hands them back, so nothing is aliased across the call;
//! - it returns the sequence of duality gaps, one per outer iteration. The
//!   primal objective never increases and the best dual point seen is kept, so
//!   the sequence is non-increasing;
//! - it never fails on non-convergence. The caller inspects the last gap.
//!
//! Strategies:
//!
//! | Strategy            | Problems                         |
//! |---------------------|----------------------------------|
//! | `CoordinateDescent` | Lasso, positive Lasso, logistic  |
//! | `ProxNewton`        | logistic                         |
//! | `MultiTaskBlockCd`  | multi-task Lasso                 |
//!
//! The single-task path engine goes through `SolverStrategy`, chosen once per
//! run by `SolverStrategy::select`.

pub mod accel;
pub mod cd;
pub mod loss;
pub mod multitask;
pub mod newton;
pub mod working_set;

use crate::design::CenteredDesign;
use crate::types::ProblemKind;
use ndarray::{Array1, Array2, ArrayView1};

pub use cd::CoordinateDescent;
pub use multitask::MultiTaskBlockCd;
pub use newton::ProxNewton;

/// Buffers owned by one oracle call.
#[derive(Debug, Clone, PartialEq)]
pub struct SubproblemState<W, R> {
    /// Primal coefficients.
    pub coef: W,
    /// Residual `y - Xw` (squared losses) or linear predictor `Xw` (logistic).
    pub fitted: R,
    /// A dual-feasible point.
    pub dual: R,
}

pub type SingleTaskState = SubproblemState<Array1<f64>, Array1<f64>>;
pub type MultiTaskState = SubproblemState<Array2<f64>, Array2<f64>>;

/// Read-only inputs of one subproblem.
#[derive(Debug, Clone, Copy)]
pub struct Subproblem<'a, Y> {
    pub x: CenteredDesign<'a>,
    pub y: Y,
    pub alpha: f64,
    /// Squared norms of the centered columns, cached once per path.
    pub col_sq_norms: ArrayView1<'a, f64>,
    /// Size of the first working set.
    pub ws_seed: usize,
}

#[derive(Debug, Clone)]
pub struct OracleOutput<S> {
    pub state: S,
    /// Duality gap at the start of each outer iteration.
    pub gaps: Vec<f64>,
}

impl<S> OracleOutput<S> {
    pub fn final_gap(&self) -> f64 {
        self.gaps.last().copied().unwrap_or(f64::INFINITY)
    }

    pub fn n_iter(&self) -> usize {
        self.gaps.len()
    }
}

/// Budgets and switches shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct OracleSettings {
    pub max_iter: usize,
    pub max_epochs: usize,
    pub gap_freq: usize,
    pub tol: f64,
    pub prune: bool,
    /// Number of iterates used for dual extrapolation; below 2 disables it.
    pub accel_depth: usize,
    pub verbose: bool,
}

impl OracleSettings {
    pub(crate) fn log_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Trace
        }
    }
}

pub trait SubproblemOracle<Y, S> {
    fn solve(&self, problem: &Subproblem<'_, Y>, state: S) -> OracleOutput<S>;
}

/// The single-task strategies, selected once per path.
#[derive(Debug, Clone)]
pub enum SolverStrategy {
    CoordinateDescent(CoordinateDescent),
    ProxNewton(ProxNewton),
}

impl SolverStrategy {
    pub fn select(
        kind: ProblemKind,
        positive: bool,
        use_prox_newton: bool,
        settings: OracleSettings,
    ) -> Self {
        match (kind, use_prox_newton) {
            (ProblemKind::Logreg, true) => SolverStrategy::ProxNewton(ProxNewton { settings }),
            (ProblemKind::Logreg, false) => SolverStrategy::CoordinateDescent(CoordinateDescent {
                loss: loss::Loss::Logistic,
                positive: false,
                settings,
            }),
            (ProblemKind::Lasso, _) => SolverStrategy::CoordinateDescent(CoordinateDescent {
                loss: loss::Loss::Quadratic,
                positive,
                settings,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SolverStrategy::CoordinateDescent(_) => "coordinate descent",
            SolverStrategy::ProxNewton(_) => "proximal Newton",
        }
    }
}

impl SubproblemOracle<ArrayView1<'_, f64>, SingleTaskState> for SolverStrategy {
    fn solve(
        &self,
        problem: &Subproblem<'_, ArrayView1<'_, f64>>,
        state: SingleTaskState,
    ) -> OracleOutput<SingleTaskState> {
        match self {
            SolverStrategy::CoordinateDescent(oracle) => oracle.solve(problem, state),
            SolverStrategy::ProxNewton(oracle) => oracle.solve(problem, state),
        }
    }
}

/// `max_j |x̃_jᵀθ|` over `features`, or the one-sided `max(0, max_j x̃_jᵀθ)`
/// for non-negative problems.
pub fn constraint_norm(
    x: &CenteredDesign,
    theta: ArrayView1<f64>,
    features: impl IntoIterator<Item = usize>,
    positive: bool,
) -> f64 {
    features.into_iter().fold(0.0_f64, |acc, j| {
        let c = x.col_dot(j, theta);
        acc.max(if positive { c } else { c.abs() })
    })
}

/// Dual correlations used to rank features for the working set.
pub(crate) fn correlations(x: &CenteredDesign, theta: ArrayView1<f64>, positive: bool) -> Array1<f64> {
    let raw = x.xt_dot(theta);
    if positive { raw } else { raw.mapv(f64::abs) }
}
