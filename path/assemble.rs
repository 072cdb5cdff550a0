//! Result storage, preallocated once the grid length is known.

use crate::types::{Convergence, MultiTaskPathResult, PathResult};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, s};

#[derive(Debug)]
pub struct PathAssembler {
    alphas: Array1<f64>,
    coefs: Array2<f64>,
    dual_gaps: Array1<f64>,
    thetas: Option<Array2<f64>>,
    n_iters: Option<Array1<usize>>,
    convergence: Vec<Convergence>,
}

impl PathAssembler {
    pub fn new(
        alphas: Array1<f64>,
        n_features: usize,
        n_samples: usize,
        return_duals: bool,
        return_n_iter: bool,
    ) -> Self {
        let n_alphas = alphas.len();
        Self {
            coefs: Array2::zeros((n_features, n_alphas)),
            dual_gaps: Array1::zeros(n_alphas),
            thetas: return_duals.then(|| Array2::zeros((n_alphas, n_samples))),
            n_iters: return_n_iter.then(|| Array1::zeros(n_alphas)),
            convergence: Vec::with_capacity(n_alphas),
            alphas,
        }
    }

    pub fn record(&mut self, coef: ArrayView1<f64>, dual: ArrayView1<f64>, convergence: Convergence) {
        let t = convergence.index;
        self.coefs.column_mut(t).assign(&coef);
        self.dual_gaps[t] = convergence.gap;
        if let Some(thetas) = self.thetas.as_mut() {
            thetas.row_mut(t).assign(&dual);
        }
        if let Some(n_iters) = self.n_iters.as_mut() {
            n_iters[t] = convergence.n_iter;
        }
        self.convergence.push(convergence);
    }

    pub fn finish(self) -> PathResult {
        PathResult {
            alphas: self.alphas,
            coefs: self.coefs,
            dual_gaps: self.dual_gaps,
            thetas: self.thetas,
            n_iters: self.n_iters,
            convergence: self.convergence,
        }
    }
}

/// Multi-task storage. Coefficients are kept as `(features, tasks, grid)`,
/// matching the solver's row layout, and transposed once in `finish`.
#[derive(Debug)]
pub struct MultiTaskPathAssembler {
    alphas: Array1<f64>,
    coefs: Array3<f64>,
    dual_gaps: Array1<f64>,
    thetas: Option<Array3<f64>>,
    n_iters: Option<Array1<usize>>,
    convergence: Vec<Convergence>,
}

impl MultiTaskPathAssembler {
    pub fn new(
        alphas: Array1<f64>,
        n_features: usize,
        n_samples: usize,
        n_tasks: usize,
        return_duals: bool,
        return_n_iter: bool,
    ) -> Self {
        let n_alphas = alphas.len();
        Self {
            coefs: Array3::zeros((n_features, n_tasks, n_alphas)),
            dual_gaps: Array1::zeros(n_alphas),
            thetas: return_duals.then(|| Array3::zeros((n_alphas, n_samples, n_tasks))),
            n_iters: return_n_iter.then(|| Array1::zeros(n_alphas)),
            convergence: Vec::with_capacity(n_alphas),
            alphas,
        }
    }

    /// `coef` is `(features, tasks)` and `dual` is `(samples, tasks)`.
    pub fn record(&mut self, coef: ArrayView2<f64>, dual: ArrayView2<f64>, convergence: Convergence) {
        let t = convergence.index;
        self.coefs.slice_mut(s![.., .., t]).assign(&coef);
        self.dual_gaps[t] = convergence.gap;
        if let Some(thetas) = self.thetas.as_mut() {
            thetas.slice_mut(s![t, .., ..]).assign(&dual);
        }
        if let Some(n_iters) = self.n_iters.as_mut() {
            n_iters[t] = convergence.n_iter;
        }
        self.convergence.push(convergence);
    }

    pub fn finish(self) -> MultiTaskPathResult {
        let coefs = self
            .coefs
            .permuted_axes([1, 0, 2])
            .as_standard_layout()
            .into_owned();
        MultiTaskPathResult {
            alphas: self.alphas,
            coefs,
            dual_gaps: self.dual_gaps,
            thetas: self.thetas,
            n_iters: self.n_iters,
            convergence: self.convergence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConvergenceStatus;
    use ndarray::array;

    fn converged(index: usize, gap: f64, n_iter: usize) -> Convergence {
        Convergence {
            index,
            alpha: 1.0,
            gap,
            tol: 1e-6,
            n_iter,
            status: ConvergenceStatus::Converged,
        }
    }

    #[test]
    fn single_task_columns_follow_the_grid() {
        let mut assembler = PathAssembler::new(array![2.0, 1.0], 3, 2, true, true);
        assembler.record(array![0.0, 0.0, 0.0].view(), array![0.5, 0.5].view(), converged(0, 0.0, 1));
        assembler.record(array![1.0, 0.0, -2.0].view(), array![0.1, 0.2].view(), converged(1, 1e-8, 4));
        let result = assembler.finish();
        assert_eq!(result.coefs.column(1).to_vec(), vec![1.0, 0.0, -2.0]);
        assert_eq!(result.support_sizes(), vec![0, 2]);
        assert_eq!(result.thetas.unwrap().row(1).to_vec(), vec![0.1, 0.2]);
        assert_eq!(result.n_iters.unwrap().to_vec(), vec![1, 4]);
        assert_eq!(result.dual_gaps[1], 1e-8);
    }

    #[test]
    fn optional_outputs_stay_absent() {
        let mut assembler = PathAssembler::new(array![1.0], 1, 2, false, false);
        assembler.record(array![0.0].view(), array![0.5, 0.5].view(), converged(0, 0.0, 1));
        let result = assembler.finish();
        assert!(result.thetas.is_none());
        assert!(result.n_iters.is_none());
    }

    #[test]
    fn multitask_coefficients_are_transposed_to_tasks_first() {
        let mut assembler = MultiTaskPathAssembler::new(array![1.0, 0.5], 3, 2, 2, true, false);
        let w0 = array![[0.0, 0.0], [0.0, 0.0], [0.0, 0.0]];
        let w1 = array![[1.0, 2.0], [0.0, 0.0], [3.0, 4.0]];
        let theta = array![[0.1, 0.2], [0.3, 0.4]];
        assembler.record(w0.view(), theta.view(), converged(0, 0.0, 1));
        assembler.record(w1.view(), theta.view(), converged(1, 0.0, 2));
        let result = assembler.finish();

        assert_eq!(result.coefs.dim(), (2, 3, 2));
        for task in 0..2 {
            for feature in 0..3 {
                assert_eq!(result.coefs[[task, feature, 1]], w1[[feature, task]]);
            }
        }
        assert_eq!(result.support_sizes(), vec![0, 2]);
        assert_eq!(result.thetas.unwrap().dim(), (2, 2, 2));
    }
}
