//! Feasible dual points handed to the oracle.
//!
//! At index 0 a dual point is built from the fitted buffer. At later indices
//! the previous dual is reused; the feasible set does not depend on alpha, so
//! it only needs to be re-certified against rounding drift.

use crate::design::CenteredDesign;
use crate::solver::constraint_norm;
use crate::solver::loss::Loss;
use crate::solver::multitask::group_constraint_norm;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

#[derive(Debug, Clone, Copy)]
pub struct DualPointBuilder<'a> {
    x: CenteredDesign<'a>,
    /// Use the one-sided constraint `x̃_jᵀθ ≤ 1`.
    positive: bool,
}

impl<'a> DualPointBuilder<'a> {
    pub fn new(x: CenteredDesign<'a>, positive: bool) -> Self {
        Self { x, positive }
    }

    fn norm(&self, theta: ArrayView1<f64>) -> f64 {
        constraint_norm(&self.x, theta, 0..self.x.n_features(), self.positive)
    }

    /// A dual point on (or inside) the boundary of the feasible set, built from
    /// the fitted buffer of the starting coefficients.
    pub fn initial(&self, loss: Loss, y: ArrayView1<f64>, fitted: ArrayView1<f64>, alpha: f64) -> Array1<f64> {
        match loss {
            Loss::Quadratic => {
                let theta = fitted.to_owned();
                let norm = self.norm(theta.view());
                if norm > 0.0 { theta / norm } else { theta }
            }
            Loss::Logistic => {
                let theta = loss.dual_direction(y, fitted, alpha);
                let norm = self.norm(theta.view());
                theta / norm.max(1.0)
            }
        }
    }

    /// Scales `theta` back into the feasible set if it drifted out of it.
    pub fn recertify(&self, theta: Array1<f64>) -> Array1<f64> {
        let norm = self.norm(theta.view());
        if norm > 1.0 { theta / norm } else { theta }
    }

    pub fn initial_multitask(&self, residual: ArrayView2<f64>) -> Array2<f64> {
        let theta = residual.to_owned();
        let norm = group_constraint_norm(&self.x, theta.view(), 0..self.x.n_features());
        if norm > 0.0 { theta / norm } else { theta }
    }

    pub fn recertify_multitask(&self, theta: Array2<f64>) -> Array2<f64> {
        let norm = group_constraint_norm(&self.x, theta.view(), 0..self.x.n_features());
        if norm > 1.0 { theta / norm } else { theta }
    }
}
