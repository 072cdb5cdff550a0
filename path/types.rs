use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// The loss paired with the L1 penalty on a single-task path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemKind {
    /// `‖y - Xw‖² / (2n) + α‖w‖₁`
    Lasso,
    /// `Σ log(1 + exp(-yᵢ xᵢᵀw)) + α‖w‖₁`, with labels in {-1, +1}.
    Logreg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The final duality gap is within tolerance.
    Converged,
    /// The oracle ran out of outer iterations above tolerance. The point is
    /// still the official result for its grid index.
    NotConverged,
}

/// Per-grid-index convergence record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Convergence {
    pub index: usize,
    pub alpha: f64,
    pub gap: f64,
    pub tol: f64,
    pub n_iter: usize,
    pub status: ConvergenceStatus,
}

impl Convergence {
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }
}

/// A single-task regularization path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResult {
    /// The grid, in the (non-increasing) order it was solved.
    pub alphas: Array1<f64>,
    /// Shape `[n_features, n_alphas]`.
    pub coefs: Array2<f64>,
    /// Final duality gap per grid index.
    pub dual_gaps: Array1<f64>,
    /// Shape `[n_alphas, n_samples]`; present when dual points were requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thetas: Option<Array2<f64>>,
    /// Oracle outer iterations per grid index; present when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_iters: Option<Array1<usize>>,
    pub convergence: Vec<Convergence>,
}

impl PathResult {
    /// Number of non-zero coefficients at each grid index.
    pub fn support_sizes(&self) -> Vec<usize> {
        self.coefs
            .axis_iter(Axis(1))
            .map(|column| count_nonzero(column))
            .collect()
    }

    /// Whether every grid index reached the tolerance.
    pub fn all_converged(&self) -> bool {
        self.convergence.iter().all(Convergence::converged)
    }
}

/// A multi-task regularization path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiTaskPathResult {
    pub alphas: Array1<f64>,
    /// Shape `[n_tasks, n_features, n_alphas]`.
    pub coefs: Array3<f64>,
    pub dual_gaps: Array1<f64>,
    /// Shape `[n_alphas, n_samples, n_tasks]`; present when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thetas: Option<Array3<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_iters: Option<Array1<usize>>,
    pub convergence: Vec<Convergence>,
}

impl MultiTaskPathResult {
    /// Number of features with a non-zero coefficient in any task, per grid index.
    pub fn support_sizes(&self) -> Vec<usize> {
        self.coefs
            .axis_iter(Axis(2))
            .map(|slice| {
                slice
                    .axis_iter(Axis(1))
                    .filter(|feature| feature.iter().any(|&v| v != 0.0))
                    .count()
            })
            .collect()
    }

    pub fn all_converged(&self) -> bool {
        self.convergence.iter().all(Convergence::converged)
    }
}

pub(crate) fn count_nonzero(v: ArrayView1<f64>) -> usize {
    v.iter().filter(|&&x| x != 0.0).count()
}
