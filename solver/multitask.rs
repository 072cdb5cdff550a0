//! Working-set block coordinate descent for the multi-task Lasso.
//!
//! Coefficients form a `(n_features, n_tasks)` matrix `W` penalized by the sum
//! of its row norms, so a feature is either active for every task or for none.
//! The fitted buffer is the residual matrix `R = Y - X̃W` and the dual point a
//! matrix `Θ` of the same shape.

use super::accel::Extrapolator;
use super::cd::{FEASIBILITY_SLACK, INNER_TOL_RATIO};
use super::working_set::{GrowthPolicy, feature_scores, select};
use super::{MultiTaskState, OracleOutput, OracleSettings, Subproblem, SubproblemOracle, SubproblemState};
use crate::design::CenteredDesign;
use crate::grid::l2_norm;
use ndarray::{Array1, Array2, ArrayView2, ShapeBuilder};

#[derive(Debug, Clone)]
pub struct MultiTaskBlockCd {
    pub settings: OracleSettings,
}

/// `max_j ‖x̃_jᵀΘ‖₂` over `features`.
pub fn group_constraint_norm(
    x: &CenteredDesign,
    theta: ArrayView2<f64>,
    features: impl IntoIterator<Item = usize>,
) -> f64 {
    features
        .into_iter()
        .fold(0.0_f64, |acc, j| acc.max(l2_norm(x.col_dot_columns(j, theta).view())))
}

pub fn primal(residual: ArrayView2<f64>, coef: ArrayView2<f64>, alpha: f64) -> f64 {
    let n = residual.nrows() as f64;
    let datafit = residual.iter().map(|r| r * r).sum::<f64>() / (2.0 * n);
    let penalty: f64 = coef.rows().into_iter().map(l2_norm).sum();
    datafit + alpha * penalty
}

pub fn dual(y: ArrayView2<f64>, theta: ArrayView2<f64>, alpha: f64) -> f64 {
    let n = y.nrows() as f64;
    let scale = n * alpha;
    let (norm_y, norm_diff) = y
        .iter()
        .zip(theta.iter())
        .fold((0.0, 0.0), |(ny, nd), (&yi, &ti)| {
            let d = yi - scale * ti;
            (ny + yi * yi, nd + d * d)
        });
    (norm_y - norm_diff) / (2.0 * n)
}

/// `z·max(0, 1 - threshold/‖z‖)`.
pub fn group_soft_threshold(z: Array1<f64>, threshold: f64) -> Array1<f64> {
    let norm = l2_norm(z.view());
    if norm <= threshold {
        Array1::zeros(z.len())
    } else {
        z * (1.0 - threshold / norm)
    }
}

fn rescale(
    x: &CenteredDesign,
    residual: ArrayView2<f64>,
    alpha: f64,
    features: impl IntoIterator<Item = usize>,
) -> Array2<f64> {
    let n = residual.nrows() as f64;
    let mut theta = residual.mapv(|r| r / (n * alpha));
    let norm = group_constraint_norm(x, theta.view(), features);
    if norm > 1.0 {
        theta /= norm;
    }
    theta
}

fn flatten(m: &Array2<f64>) -> Array1<f64> {
    m.iter().copied().collect()
}

fn unflatten(v: Array1<f64>, shape: (usize, usize)) -> Option<Array2<f64>> {
    let logical = Array2::from_shape_vec(shape, v.to_vec()).ok()?;
    let mut out = Array2::zeros(shape.f());
    out.assign(&logical);
    Some(out)
}

impl MultiTaskBlockCd {
    fn epoch(
        problem: &Subproblem<'_, ArrayView2<'_, f64>>,
        ws: &[usize],
        coef: &mut Array2<f64>,
        residual: &mut Array2<f64>,
    ) {
        let x = &problem.x;
        let n = x.n_samples() as f64;
        for &j in ws {
            let sq_norm = problem.col_sq_norms[j];
            if sq_norm == 0.0 {
                coef.row_mut(j).fill(0.0);
                continue;
            }
            let old = coef.row(j).to_owned();
            let z = &old + &(x.col_dot_columns(j, residual.view()) / sq_norm);
            let new = group_soft_threshold(z, n * problem.alpha / sq_norm);
            let delta = &new - &old;
            if delta.iter().any(|&d| d != 0.0) {
                x.col_rank_one(j, (-&delta).view(), residual.view_mut());
                coef.row_mut(j).assign(&new);
            }
        }
    }
}

impl SubproblemOracle<ArrayView2<'_, f64>, MultiTaskState> for MultiTaskBlockCd {
    fn solve(
        &self,
        problem: &Subproblem<'_, ArrayView2<'_, f64>>,
        state: MultiTaskState,
    ) -> OracleOutput<MultiTaskState> {
        let SubproblemState {
            mut coef,
            fitted: mut residual,
            mut dual,
        } = state;
        let x = &problem.x;
        let y = problem.y;
        let alpha = problem.alpha;
        let n_features = x.n_features();
        let shape = (residual.nrows(), residual.ncols());
        let settings = &self.settings;
        let level = settings.log_level();
        let col_norms = problem.col_sq_norms.mapv(f64::sqrt);
        let policy = GrowthPolicy {
            prune: settings.prune,
        };

        let mut best_dual = if group_constraint_norm(x, dual.view(), 0..n_features)
            <= 1.0 + FEASIBILITY_SLACK
        {
            self::dual(y, dual.view(), alpha)
        } else {
            f64::NEG_INFINITY
        };
        let mut gaps = Vec::with_capacity(settings.max_iter);
        let mut ws: Vec<usize> = Vec::new();
        let mut extrapolated: Option<Array2<f64>> = None;

        for outer in 0..settings.max_iter {
            let mut candidates = vec![rescale(x, residual.view(), alpha, 0..n_features)];
            if let Some(r) = extrapolated.take() {
                candidates.push(rescale(x, r.view(), alpha, 0..n_features));
            }
            for candidate in candidates {
                let value = self::dual(y, candidate.view(), alpha);
                if value > best_dual {
                    best_dual = value;
                    dual = candidate;
                }
            }
            let p_obj = primal(residual.view(), coef.view(), alpha);
            let gap = (p_obj - best_dual).max(0.0);
            gaps.push(gap);
            log::log!(
                level,
                "alpha {alpha:.3e} block iter {outer}: primal {p_obj:.6e}, gap {gap:.3e}, working set {}",
                ws.len()
            );
            if gap <= settings.tol {
                break;
            }

            let row_correlations: Array1<f64> = (0..n_features)
                .map(|j| l2_norm(x.col_dot_columns(j, dual.view()).view()))
                .collect();
            let scores = feature_scores(row_correlations.view(), col_norms.view());
            let current: Vec<usize> = coef
                .rows()
                .into_iter()
                .enumerate()
                .filter_map(|(j, row)| row.iter().any(|&w| w != 0.0).then_some(j))
                .collect();
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
                    extrapolator.push(flatten(&residual).view());
                    let mut inner_dual =
                        self::dual(y, rescale(x, residual.view(), alpha, ws.iter().copied()).view(), alpha);
                    if let Some(r) = extrapolator.extrapolate().and_then(|v| unflatten(v, shape)) {
                        let theta = rescale(x, r.view(), alpha, ws.iter().copied());
                        inner_dual = inner_dual.max(self::dual(y, theta.view(), alpha));
                        extrapolated = Some(r);
                    }
                    let inner_gap = primal(residual.view(), coef.view(), alpha) - inner_dual;
                    log::trace!("  epoch {epoch}: inner gap {inner_gap:.3e}");
                    if inner_gap < inner_tol {
                        break;
                    }
                }
                Self::epoch(problem, &ws, &mut coef, &mut residual);
            }
        }

        OracleOutput {
            state: SubproblemState {
                coef,
                fitted: residual,
                dual,
            },
            gaps,
        }
    }
}
