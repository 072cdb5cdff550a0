//! Starting points for each grid index.
//!
//! Index 0 starts from the caller's coefficients (or zeros) with a fitted
//! buffer derived from them. Every later index continues from the previous
//! oracle's final state, whose fitted buffer is already consistent with its
//! coefficients, so no `Xw` product is recomputed along the path.

use crate::design::CenteredDesign;
use crate::solver::loss::Loss;
use crate::solver::{MultiTaskState, SingleTaskState, SubproblemState};
use crate::types::count_nonzero;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

#[derive(Debug, Clone, Copy)]
pub struct WarmStartController {
    /// Minimum size of the first working set at index 0.
    p0: usize,
}

impl WarmStartController {
    pub fn new(p0: usize) -> Self {
        Self { p0 }
    }

    /// State and working-set seed for index 0 of a single-task path.
    /// `coef_init` has already been checked against the number of features.
    pub fn initial(
        &self,
        loss: Loss,
        x: &CenteredDesign,
        y: ArrayView1<f64>,
        coef_init: Option<&[f64]>,
    ) -> (SingleTaskState, usize) {
        let (coef, fitted) = match coef_init {
            Some(init) => {
                let coef = Array1::from(init.to_vec());
                let fitted = loss.fitted_from_predictor(y, x.dot(coef.view()));
                (coef, fitted)
            }
            None => (Array1::zeros(x.n_features()), loss.zero_fitted(y)),
        };
        let seed = self.p0.max(count_nonzero(coef.view()));
        let state = SubproblemState {
            coef,
            fitted,
            dual: Array1::zeros(y.len()),
        };
        (state, seed)
    }

    /// State and seed for the next index, continuing from `previous`.
    pub fn advance(previous: SingleTaskState) -> (SingleTaskState, usize) {
        let seed = count_nonzero(previous.coef.view()).max(1);
        (previous, seed)
    }

    /// Multi-task counterpart of `initial`. `coef_init` is `(n_tasks,
    /// n_features)`; the solver works on its transpose.
    pub fn initial_multitask(
        &self,
        x: &CenteredDesign,
        y: ArrayView2<f64>,
        coef_init: Option<&Array2<f64>>,
    ) -> (MultiTaskState, usize) {
        let coef = match coef_init {
            Some(init) => init.t().to_owned(),
            None => Array2::zeros((x.n_features(), y.ncols())),
        };
        let fitted = &y - &x.dot_matrix(coef.view());
        let seed = self.p0.max(active_rows(coef.view()));
        let state = SubproblemState {
            coef,
            fitted,
            dual: Array2::zeros(y.raw_dim()),
        };
        (state, seed)
    }

    pub fn advance_multitask(previous: MultiTaskState) -> (MultiTaskState, usize) {
        let seed = active_rows(previous.coef.view()).max(1);
        (previous, seed)
    }
}

/// Features with a non-zero coefficient in at least one task.
pub fn active_rows(coef: ArrayView2<f64>) -> usize {
    coef.rows()
        .into_iter()
        .filter(|row| row.iter().any(|&w| w != 0.0))
        .count()
}
