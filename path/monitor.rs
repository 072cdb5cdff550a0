use crate::solver::OracleOutput;
use crate::types::{Convergence, ConvergenceStatus};

/// Turns an oracle's gap sequence into a per-index diagnostic.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceMonitor {
    tol: f64,
}

impl ConvergenceMonitor {
    pub fn new(tol: f64) -> Self {
        Self { tol }
    }

    /// Records the outcome at grid index `index`. A gap above tolerance is not
    /// an error: the point is kept and a warning is logged.
    pub fn record<S>(&self, index: usize, alpha: f64, output: &OracleOutput<S>) -> Convergence {
        let gap = output.final_gap();
        let status = if gap <= self.tol {
            ConvergenceStatus::Converged
        } else {
            log::warn!(
                "Objective did not converge at alpha {alpha:.4e} (index {index}): duality gap {gap:.3e} \
                 exceeds tolerance {:.3e}. Consider increasing max_iter or using a larger alpha.",
                self.tol
            );
            ConvergenceStatus::NotConverged
        };
        Convergence {
            index,
            alpha,
            gap,
            tol: self.tol,
            n_iter: output.n_iter(),
            status,
        }
    }
}
