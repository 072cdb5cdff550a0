//! Working-set proximal Newton for sparse logistic regression.
//!
//! The outer loop is the same as for coordinate descent: a rescaled dual point,
//! a gap check, and a working set ranked by dual correlation. Within the
//! working set, each Newton step minimizes the second-order model of the
//! logistic loss plus the L1 penalty by a few epochs of coordinate descent,
//! then a backtracking line search on the true objective picks the step size.

use super::cd::{FEASIBILITY_SLACK, INNER_TOL_RATIO};
use super::loss::{Loss, l1_norm, sigmoid, soft_threshold};
use super::working_set::{GrowthPolicy, feature_scores, select, support};
use super::{
    OracleOutput, OracleSettings, SingleTaskState, Subproblem, SubproblemOracle, SubproblemState,
    constraint_norm, correlations,
};
use crate::design::CenteredDesign;
use ndarray::{Array1, ArrayView1};

/// Coordinate descent epochs spent on each quadratic model.
const MODEL_EPOCHS: usize = 20;
const LINE_SEARCH_STEPS: usize = 30;
/// Sufficient-decrease constant of the Armijo rule.
const ARMIJO: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct ProxNewton {
    pub settings: OracleSettings,
}

/// A Newton direction restricted to the working set, with its image `X̃d`
/// and the loss gradient with respect to `Xw` it was built from.
struct Direction {
    d: Vec<f64>,
    xd: Array1<f64>,
    loss_grad: Array1<f64>,
}

impl ProxNewton {
    fn feasible_dual(
        x: &CenteredDesign,
        y: ArrayView1<f64>,
        fitted: ArrayView1<f64>,
        alpha: f64,
        features: impl IntoIterator<Item = usize>,
    ) -> Array1<f64> {
        let mut theta = Loss::Logistic.dual_direction(y, fitted, alpha);
        let norm = constraint_norm(x, theta.view(), features, false);
        if norm > 1.0 {
            theta /= norm;
        }
        theta
    }

    /// Minimizes the local quadratic model around `coef` over `ws`.
    fn newton_direction(
        x: &CenteredDesign,
        y: ArrayView1<f64>,
        alpha: f64,
        col_sq_norms: ArrayView1<f64>,
        ws: &[usize],
        coef: &Array1<f64>,
        fitted: &Array1<f64>,
    ) -> (Direction, usize) {
        let n = x.n_samples();
        let mut grad_weights = Array1::zeros(n);
        let mut hessian = Array1::zeros(n);
        for i in 0..n {
            grad_weights[i] = Loss::Logistic.derivative(y[i], fitted[i], n);
            let p = sigmoid(fitted[i]);
            hessian[i] = p * (1.0 - p);
        }
        let grad: Vec<f64> = ws.iter().map(|&j| x.col_dot(j, grad_weights.view())).collect();

        let mut direction = Direction {
            d: vec![0.0; ws.len()],
            xd: Array1::zeros(n),
            loss_grad: grad_weights,
        };
        let mut epochs = 0;
        for _ in 0..MODEL_EPOCHS {
            epochs += 1;
            let mut largest_move = 0.0_f64;
            for (k, &j) in ws.iter().enumerate() {
                let (curvature, coupling) = x.col_weighted(j, hessian.view(), direction.xd.view());
                let current = coef[j] + direction.d[k];
                if curvature <= 0.0 {
                    // A zero column only carries its penalty, so its optimum is 0.
                    if col_sq_norms[j] == 0.0 && current != 0.0 {
                        direction.d[k] -= current;
                        largest_move = largest_move.max(current.abs());
                    }
                    continue;
                }
                let target = soft_threshold(
                    current - (grad[k] + coupling) / curvature,
                    alpha / curvature,
                    false,
                );
                let delta = target - current;
                if delta != 0.0 {
                    x.col_axpy(j, delta, direction.xd.view_mut());
                    direction.d[k] += delta;
                    largest_move = largest_move.max(delta.abs());
                }
            }
            if largest_move <= 1e-12 {
                break;
            }
        }
        (direction, epochs)
    }
}

impl SubproblemOracle<ArrayView1<'_, f64>, SingleTaskState> for ProxNewton {
    fn solve(
        &self,
        problem: &Subproblem<'_, ArrayView1<'_, f64>>,
        state: SingleTaskState,
    ) -> OracleOutput<SingleTaskState> {
        let SubproblemState {
            mut coef,
            mut fitted,
            mut dual,
        } = state;
        let x = &problem.x;
        let y = problem.y;
        let alpha = problem.alpha;
        let n_features = x.n_features();
        let loss = Loss::Logistic;
        let settings = &self.settings;
        let level = settings.log_level();
        let col_norms = problem.col_sq_norms.mapv(f64::sqrt);
        let policy = GrowthPolicy {
            prune: settings.prune,
        };

        let mut best_dual = if constraint_norm(x, dual.view(), 0..n_features, false)
            <= 1.0 + FEASIBILITY_SLACK
        {
            loss.dual(y, dual.view(), alpha)
        } else {
            f64::NEG_INFINITY
        };
        let mut gaps = Vec::with_capacity(settings.max_iter);
        let mut ws: Vec<usize> = Vec::new();

        for outer in 0..settings.max_iter {
            let candidate = Self::feasible_dual(x, y, fitted.view(), alpha, 0..n_features);
            let value = loss.dual(y, candidate.view(), alpha);
            if value > best_dual {
                best_dual = value;
                dual = candidate;
            }
            let primal = loss.primal(y, fitted.view(), l1_norm(coef.view()), alpha);
            let gap = (primal - best_dual).max(0.0);
            gaps.push(gap);
            log::log!(
                level,
                "alpha {alpha:.3e} newton iter {outer}: primal {primal:.6e}, gap {gap:.3e}"
            );
            if gap <= settings.tol {
                break;
            }

            let scores = feature_scores(correlations(x, dual.view(), false).view(), col_norms.view());
            let current = support(coef.view());
            let size = policy
                .next_size(outer, ws.len(), current.len(), problem.ws_seed)
                .min(n_features);
            ws = select(scores.view(), &policy.forced(&current, &ws), size);
            if ws.is_empty() {
                break;
            }

            let inner_tol = INNER_TOL_RATIO * gap;
            let mut epochs_spent = 0;
            while epochs_spent < settings.max_epochs {
                let (direction, epochs) = Self::newton_direction(
                    x,
                    y,
                    alpha,
                    problem.col_sq_norms,
                    &ws,
                    &coef,
                    &fitted,
                );
                epochs_spent += epochs;

                let l1_old: f64 = ws.iter().map(|&j| coef[j].abs()).sum();
                let l1_full: f64 = ws
                    .iter()
                    .zip(&direction.d)
                    .map(|(&j, &dj)| (coef[j] + dj).abs())
                    .sum();
                let slope = direction.loss_grad.dot(&direction.xd) + alpha * (l1_full - l1_old);
                if slope >= 0.0 {
                    break;
                }

                let objective = loss.primal(y, fitted.view(), l1_norm(coef.view()), alpha);
                let mut step = 1.0;
                let mut accepted = false;
                for _ in 0..LINE_SEARCH_STEPS {
                    let trial_fitted = &fitted + &(step * &direction.xd);
                    let trial_l1 = l1_norm(coef.view()) - l1_old
                        + ws
                            .iter()
                            .zip(&direction.d)
                            .map(|(&j, &dj)| (coef[j] + step * dj).abs())
                            .sum::<f64>();
                    let trial = loss.primal(y, trial_fitted.view(), trial_l1, alpha);
                    if trial <= objective + ARMIJO * step * slope {
                        fitted = trial_fitted;
                        for (&j, &dj) in ws.iter().zip(&direction.d) {
                            coef[j] += step * dj;
                        }
                        accepted = true;
                        break;
                    }
                    step *= 0.5;
                }
                if !accepted {
                    log::debug!("line search stalled at alpha {alpha:.3e}");
                    break;
                }

                let inner_dual = Self::feasible_dual(x, y, fitted.view(), alpha, ws.iter().copied());
                let inner_gap = loss.primal(y, fitted.view(), l1_norm(coef.view()), alpha)
                    - loss.dual(y, inner_dual.view(), alpha);
                log::trace!("  step {step:.3e}: inner gap {inner_gap:.3e}");
                if inner_gap < inner_tol {
                    break;
                }
            }
        }

        OracleOutput {
            state: SubproblemState { coef, fitted, dual },
            gaps,
        }
    }
}
