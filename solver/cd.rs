//! Working-set coordinate descent with dual extrapolation.
//!
//! Each outer iteration builds a feasible dual point, measures the duality gap,
//! and (unless the gap already meets the tolerance) solves the problem
//! restricted to a working set of promising features by cyclic proximal
//! coordinate descent. The inner solve stops once its own gap, measured on the
//! working set only, drops below a fraction of the outer gap.

use super::accel::Extrapolator;
use super::loss::{Loss, l1_norm, soft_threshold};
use super::working_set::{GrowthPolicy, feature_scores, select, support};
use super::{
    OracleOutput, OracleSettings, SingleTaskState, Subproblem, SubproblemOracle, SubproblemState,
    constraint_norm, correlations,
};
use crate::design::CenteredDesign;
use ndarray::{Array1, ArrayView1};

/// Inner solves stop once their gap is below this fraction of the outer gap.
pub(crate) const INNER_TOL_RATIO: f64 = 0.3;

/// Slack allowed when checking that an incoming dual point is feasible.
pub(crate) const FEASIBILITY_SLACK: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct CoordinateDescent {
    pub loss: Loss,
    /// Constrain coefficients to be non-negative.
    pub positive: bool,
    pub settings: OracleSettings,
}

impl CoordinateDescent {
    /// Rescales a dual direction into the feasible set over `features`.
    fn rescale<I>(&self, x: &CenteredDesign, mut direction: Array1<f64>, features: I) -> Array1<f64>
    where
        I: IntoIterator<Item = usize>,
    {
        let norm = constraint_norm(x, direction.view(), features, self.positive);
        if norm > 1.0 {
            direction /= norm;
        }
        direction
    }

    /// One cyclic pass over `ws`.
    fn epoch(
        &self,
        problem: &Subproblem<'_, ArrayView1<'_, f64>>,
        lipschitz: ArrayView1<f64>,
        ws: &[usize],
        coef: &mut Array1<f64>,
        fitted: &mut Array1<f64>,
    ) {
        let x = &problem.x;
        let y = problem.y;
        let n = x.n_samples();
        let loss = self.loss;
        for &j in ws {
            let lj = lipschitz[j];
            if lj == 0.0 {
                // A zero column only carries its penalty.
                coef[j] = 0.0;
                continue;
            }
            let old = coef[j];
            let grad = x.col_dot_with(j, fitted.view(), |i, f| loss.derivative(y[i], f, n));
            let new = soft_threshold(old - grad / lj, problem.alpha / lj, self.positive);
            if new != old {
                x.col_axpy(j, loss.fitted_sign() * (new - old), fitted.view_mut());
                coef[j] = new;
            }
        }
    }
}

impl SubproblemOracle<ArrayView1<'_, f64>, SingleTaskState> for CoordinateDescent {
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
        let loss = self.loss;
        let settings = &self.settings;
        let level = settings.log_level();

        let col_norms = problem.col_sq_norms.mapv(f64::sqrt);
        let lipschitz = problem
            .col_sq_norms
            .mapv(|s| loss.lipschitz(s, x.n_samples()));
        let policy = GrowthPolicy {
            prune: settings.prune,
        };

        let mut best_dual = if constraint_norm(x, dual.view(), 0..n_features, self.positive)
            <= 1.0 + FEASIBILITY_SLACK
        {
            loss.dual(y, dual.view(), alpha)
        } else {
            f64::NEG_INFINITY
        };
        let mut gaps = Vec::with_capacity(settings.max_iter);
        let mut ws: Vec<usize> = Vec::new();
        let mut extrapolated: Option<Array1<f64>> = None;

        for outer in 0..settings.max_iter {
            let mut candidates = vec![loss.dual_direction(y, fitted.view(), alpha)];
            if let Some(r) = extrapolated.take() {
                candidates.push(loss.dual_direction(y, r.view(), alpha));
            }
            for candidate in candidates {
                let candidate = self.rescale(x, candidate, 0..n_features);
                let value = loss.dual(y, candidate.view(), alpha);
                if value > best_dual {
                    best_dual = value;
                    dual = candidate;
                }
            }
            let primal = loss.primal(y, fitted.view(), l1_norm(coef.view()), alpha);
            let gap = (primal - best_dual).max(0.0);
            gaps.push(gap);
            log::log!(
                level,
                "alpha {alpha:.3e} iter {outer}: primal {primal:.6e}, gap {gap:.3e}, working set {}",
                ws.len()
            );
            if gap <= settings.tol {
                break;
            }

            let scores = feature_scores(
                correlations(x, dual.view(), self.positive).view(),
                col_norms.view(),
            );
            let current = support(coef.view());
            let size = policy
                .next_size(outer, ws.len(), current.len(), problem.ws_seed)
                .min(n_features);
            ws = select(scores.view(), &policy.forced(&current, &ws), size);
            if ws.is_empty() {
                break;
            }

            let inner_tol = INNER_TOL_RATIO * gap;
            let mut extrapolator = Extrapolator::new(settings.accel_depth);
            for epoch in 0..settings.max_epochs {
                if epoch > 0 && epoch % settings.gap_freq == 0 {
                    extrapolator.push(fitted.view());
                    let mut inner_dual = f64::NEG_INFINITY;
                    let mut inner_candidates = vec![loss.dual_direction(y, fitted.view(), alpha)];
                    if let Some(r) = extrapolator.extrapolate() {
                        inner_candidates.push(loss.dual_direction(y, r.view(), alpha));
                        extrapolated = Some(r);
                    }
                    for candidate in inner_candidates {
                        let candidate = self.rescale(x, candidate, ws.iter().copied());
                        inner_dual = inner_dual.max(loss.dual(y, candidate.view(), alpha));
                    }
                    let inner_primal = loss.primal(y, fitted.view(), l1_norm(coef.view()), alpha);
                    let inner_gap = inner_primal - inner_dual;
                    log::trace!("  epoch {epoch}: inner gap {inner_gap:.3e}");
                    if inner_gap < inner_tol {
                        break;
                    }
                }
                self.epoch(problem, lipschitz.view(), &ws, &mut coef, &mut fitted);
            }
        }

        OracleOutput {
            state: SubproblemState { coef, fitted, dual },
            gaps,
        }
    }
}
