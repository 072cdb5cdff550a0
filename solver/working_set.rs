//! Working-set construction shared by the three oracles.
//!
//! Features are ranked by how far the current dual point is from activating
//! their constraint, normalized by the column norm:
//! `score_j = (1 - |x̃_jᵀθ|) / ‖x̃_j‖`. A small score means the feature is close
//! to (or beyond) the boundary of the dual feasible set and likely belongs to
//! the support. Features with a zero column can never enter the model.

use ndarray::{Array1, ArrayView1};

/// Ranks features from their dual correlations (`|x̃_jᵀθ|`, or the row norm
/// `‖x̃_jᵀΘ‖₂` in the multi-task case, or the signed `x̃_jᵀθ` when positive).
pub fn feature_scores(correlations: ArrayView1<f64>, col_norms: ArrayView1<f64>) -> Array1<f64> {
    Array1::from_shape_fn(correlations.len(), |j| {
        if col_norms[j] == 0.0 {
            f64::INFINITY
        } else {
            (1.0 - correlations[j]) / col_norms[j]
        }
    })
}

/// How the working-set size evolves across outer iterations.
#[derive(Debug, Clone, Copy)]
pub struct GrowthPolicy {
    /// Rebuild from the current support (`max(seed, 2·nnz)`) instead of doubling
    /// the previous working set and keeping all of its features.
    pub prune: bool,
}

impl GrowthPolicy {
    pub fn next_size(&self, outer_iter: usize, previous: usize, nnz: usize, seed: usize) -> usize {
        if outer_iter == 0 {
            seed.max(nnz).max(1)
        } else if self.prune {
            seed.max(2 * nnz).max(1)
        } else {
            (2 * previous).max(nnz).max(1)
        }
    }

    /// Features that must stay in the next working set.
    pub fn forced(&self, support: &[usize], previous: &[usize]) -> Vec<usize> {
        let mut forced = support.to_vec();
        if !self.prune {
            forced.extend_from_slice(previous);
            forced.sort_unstable();
            forced.dedup();
        }
        forced
    }
}

/// Selects `size` features: every forced feature first, then the best-scored
/// remaining ones. Features with an infinite score are only taken when forced.
/// The result is sorted by feature index.
pub fn select(scores: ArrayView1<f64>, forced: &[usize], size: usize) -> Vec<usize> {
    let mut ranked = scores.to_vec();
    for &j in forced {
        ranked[j] = f64::NEG_INFINITY;
    }
    let mut order: Vec<usize> = (0..ranked.len())
        .filter(|&j| ranked[j] < f64::INFINITY)
        .collect();
    order.sort_by(|&a, &b| ranked[a].total_cmp(&ranked[b]));
    order.truncate(size.max(forced.len()));
    order.sort_unstable();
    order
}

pub fn support(coef: ArrayView1<f64>) -> Vec<usize> {
    coef.iter()
        .enumerate()
        .filter_map(|(j, &w)| (w != 0.0).then_some(j))
        .collect()
}
