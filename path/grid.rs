use crate::design::CenteredDesign;
use crate::types::ProblemKind;
use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("The path length must be at least 1.")]
    EmptyPath,
    #[error("The path ratio eps must lie in (0, 1]; got {0}.")]
    InvalidEps(f64),
    #[error("Explicit alphas must be finite and positive; found {0}.")]
    InvalidAlpha(f64),
}

/// How the grid is specified.
#[derive(Debug, Clone, Copy)]
pub enum GridSpec<'a> {
    /// `n_alphas` values geometrically spaced from `alpha_max` to `eps·alpha_max`.
    Geometric { n_alphas: usize, eps: f64 },
    /// User-supplied values, used as given after sorting in descending order.
    Explicit(&'a [f64]),
}

impl<'a> GridSpec<'a> {
    pub fn new(alphas: Option<&'a [f64]>, n_alphas: usize, eps: f64) -> Self {
        match alphas {
            Some(alphas) => GridSpec::Explicit(alphas),
            None => GridSpec::Geometric { n_alphas, eps },
        }
    }
}

/// Smallest alpha at which the all-zero vector solves a single-task problem.
pub fn alpha_max(x: &CenteredDesign, y: ArrayView1<f64>, kind: ProblemKind, positive: bool) -> f64 {
    let correlation = x.xt_dot(y);
    let n = x.n_samples() as f64;
    match (kind, positive) {
        (ProblemKind::Lasso, true) => correlation.fold(0.0_f64, |acc, &c| acc.max(c)) / n,
        (ProblemKind::Logreg, _) => inf_norm(correlation.view()) / 2.0,
        (ProblemKind::Lasso, false) => inf_norm(correlation.view()) / n,
    }
}

/// Smallest alpha at which the all-zero matrix solves a multi-task Lasso.
pub fn alpha_max_multitask(x: &CenteredDesign, y: ArrayView2<f64>) -> f64 {
    let n = x.n_samples() as f64;
    (0..x.n_features())
        .map(|j| l2_norm(x.col_dot_columns(j, y).view()))
        .fold(0.0_f64, f64::max)
        / n
}

/// Builds the descending grid. `alpha_max` is only evaluated for a geometric
/// grid, so explicit grids skip the `Xᵀy` product.
pub fn build_grid(
    spec: GridSpec,
    alpha_max: impl FnOnce() -> f64,
) -> Result<Array1<f64>, GridError> {
    match spec {
        GridSpec::Geometric { n_alphas, eps } => {
            if n_alphas == 0 {
                return Err(GridError::EmptyPath);
            }
            if !(eps > 0.0 && eps <= 1.0) {
                return Err(GridError::InvalidEps(eps));
            }
            let mut ratios =
                Array1::geomspace(1.0, eps, n_alphas).ok_or(GridError::InvalidEps(eps))?;
            // A single point is alpha_max itself; otherwise alpha_min / alpha_max == eps exactly.
            if n_alphas > 1 {
                ratios[n_alphas - 1] = eps;
            }
            let top = alpha_max();
            Ok(ratios.mapv(|r| top * r))
        }
        GridSpec::Explicit(alphas) => {
            if alphas.is_empty() {
                return Err(GridError::EmptyPath);
            }
            if let Some(&bad) = alphas.iter().find(|a| !(a.is_finite() && **a > 0.0)) {
                return Err(GridError::InvalidAlpha(bad));
            }
            let mut sorted = alphas.to_vec();
            sorted.sort_by(|a, b| b.total_cmp(a));
            Ok(Array1::from(sorted))
        }
    }
}

pub(crate) fn inf_norm(v: ArrayView1<f64>) -> f64 {
    v.fold(0.0_f64, |acc, &x| acc.max(x.abs()))
}

pub(crate) fn l2_norm(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::DesignMatrix;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn design() -> DesignMatrix {
        DesignMatrix::dense(array![[1.0, -2.0], [0.5, 1.0], [-1.0, -3.0], [2.0, 0.0]]).unwrap()
    }

    #[test]
    fn alpha_max_depends_on_loss_and_sign() {
        let x = design();
        let view = CenteredDesign::uncentered(&x);
        let y = array![1.0, -1.0, 1.0, -1.0];
        // Xᵀy = [-2.5, -6.0]
        assert_relative_eq!(alpha_max(&view, y.view(), ProblemKind::Lasso, false), 6.0 / 4.0);
        assert_relative_eq!(alpha_max(&view, y.view(), ProblemKind::Logreg, false), 3.0);
        assert_relative_eq!(alpha_max(&view, y.view(), ProblemKind::Lasso, true), 0.0);

        let flipped = -&y;
        assert_relative_eq!(alpha_max(&view, flipped.view(), ProblemKind::Lasso, true), 6.0 / 4.0);
    }

    #[test]
    fn multitask_alpha_max_uses_row_norms() {
        let x = design();
        let view = CenteredDesign::uncentered(&x);
        let y = array![[1.0, 0.0], [-1.0, 0.0], [1.0, 0.0], [-1.0, 1.0]];
        // x_0ᵀY = [-2.5, 2.0], x_1ᵀY = [-6.0, 0.0]
        assert_relative_eq!(alpha_max_multitask(&view, y.view()), 6.0 / 4.0);
    }

    #[test]
    fn geometric_grid_spans_alpha_max_to_eps() {
        let grid = build_grid(GridSpec::new(None, 5, 1e-2), || 2.0).unwrap();
        assert_eq!(grid.len(), 5);
        assert_relative_eq!(grid[0], 2.0);
        assert_relative_eq!(grid[4], 2e-2, max_relative = 1e-12);
        assert_relative_eq!(grid[2], 0.2, max_relative = 1e-12);
        assert!(grid.to_vec().windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn single_point_grid_is_alpha_max() {
        let grid = build_grid(GridSpec::new(None, 1, 1e-3), || 0.7).unwrap();
        assert_eq!(grid.to_vec(), vec![0.7]);
    }

    #[test]
    fn zero_alpha_max_gives_a_zero_grid() {
        let grid = build_grid(GridSpec::new(None, 3, 1e-2), || 0.0).unwrap();
        assert_eq!(grid.to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn explicit_grid_is_sorted_descending_and_not_rescaled() {
        let alphas = [0.1, 3.0, 1.0, 3.0];
        let grid = build_grid(GridSpec::new(Some(&alphas[..]), 100, 1e-3), || {
            panic!("alpha_max should not be needed")
        })
        .unwrap();
        assert_eq!(grid.to_vec(), vec![3.0, 3.0, 1.0, 0.1]);
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert!(matches!(
            build_grid(GridSpec::new(None, 0, 1e-3), || 1.0),
            Err(GridError::EmptyPath)
        ));
        assert!(matches!(
            build_grid(GridSpec::new(None, 3, 0.0), || 1.0),
            Err(GridError::InvalidEps(_))
        ));
        assert!(matches!(
            build_grid(GridSpec::new(Some(&[1.0, -1.0][..]), 3, 1e-3), || 1.0),
            Err(GridError::InvalidAlpha(_))
        ));
        assert!(matches!(
            build_grid(GridSpec::new(Some(&[0.5, 0.0][..]), 3, 1e-3), || 1.0),
            Err(GridError::InvalidAlpha(_))
        ));
        assert!(matches!(
            build_grid(GridSpec::new(Some(&[][..]), 3, 1e-3), || 1.0),
            Err(GridError::EmptyPath)
        ));
    }
}
