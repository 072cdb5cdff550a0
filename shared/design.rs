//! # Design Matrix Storage
//!
//! Every solver in this crate reads the feature matrix through the small set of
//! column-oriented primitives defined here: column dot products, column updates
//! of a fitted-value buffer, squared column norms, and the two full products
//! `Xᵀv` and `Xw`. Both storage layouts are column-major so that a single
//! feature can be visited without touching the rest of the matrix:
//!
//! - `Dense`: an `ndarray::Array2` in Fortran (column-major) order.
//! - `Sparse`: a `sprs::CsMat` in compressed-sparse-column (CSC) form.
//!
//! `CenteredDesign` layers an implicit column centering on top of a sparse
//! matrix. A centered column is `x̃_j = x_j - c_j·1`, which is dense even when
//! `x_j` is not, so the centering is folded into each primitive algebraically
//! instead of being materialized.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, ShapeBuilder};
use sprs::CsMat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DesignError {
    #[error("The design matrix has {rows} rows and {cols} columns; both must be non-zero.")]
    EmptyMatrix { rows: usize, cols: usize },

    #[error("Non-finite value found in the design matrix at row {row}, column {col}.")]
    NonFiniteEntry { row: usize, col: usize },

    #[error("Expected {expected} values for the column correction, found {found}.")]
    CorrectionLength { expected: usize, found: usize },
}

/// A feature matrix with `n_samples` rows and `n_features` columns.
#[derive(Debug, Clone)]
pub enum DesignMatrix {
    Dense(Array2<f64>),
    Sparse(CsMat<f64>),
}

impl DesignMatrix {
    /// Wraps a dense matrix, copying it into column-major order if needed.
    pub fn dense(x: Array2<f64>) -> Result<Self, DesignError> {
        check_shape(x.nrows(), x.ncols())?;
        if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(DesignError::NonFiniteEntry { row, col });
        }
        let x = if x.t().is_standard_layout() {
            x
        } else {
            let mut fortran = Array2::zeros(x.raw_dim().f());
            fortran.assign(&x);
            fortran
        };
        Ok(DesignMatrix::Dense(x))
    }

    /// Wraps a sparse matrix, converting CSR input to CSC.
    pub fn sparse(x: CsMat<f64>) -> Result<Self, DesignError> {
        check_shape(x.rows(), x.cols())?;
        let x = if x.is_csc() { x } else { x.to_csc() };
        for (col, column) in x.outer_iterator().enumerate() {
            if let Some((row, _)) = column.iter().find(|(_, v)| !v.is_finite()) {
                return Err(DesignError::NonFiniteEntry { row, col });
            }
        }
        Ok(DesignMatrix::Sparse(x))
    }

    pub fn n_samples(&self) -> usize {
        match self {
            DesignMatrix::Dense(x) => x.nrows(),
            DesignMatrix::Sparse(x) => x.rows(),
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            DesignMatrix::Dense(x) => x.ncols(),
            DesignMatrix::Sparse(x) => x.cols(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, DesignMatrix::Sparse(_))
    }

    /// Per-column sums of the raw (uncentered) matrix.
    pub fn column_sums(&self) -> Array1<f64> {
        match self {
            DesignMatrix::Dense(x) => x.sum_axis(ndarray::Axis(0)),
            DesignMatrix::Sparse(x) => x
                .outer_iterator()
                .map(|column| column.iter().map(|(_, &v)| v).sum::<f64>())
                .collect(),
        }
    }

    /// Raw `x_jᵀv`.
    fn raw_col_dot(&self, j: usize, v: ArrayView1<f64>) -> f64 {
        match self {
            DesignMatrix::Dense(x) => x.column(j).dot(&v),
            DesignMatrix::Sparse(x) => x
                .outer_view(j)
                .map_or(0.0, |column| column.iter().map(|(i, &a)| a * v[i]).sum::<f64>()),
        }
    }

    /// Raw `v += a·x_j`.
    fn raw_col_axpy(&self, j: usize, a: f64, mut v: ArrayViewMut1<f64>) {
        match self {
            DesignMatrix::Dense(x) => v.scaled_add(a, &x.column(j)),
            DesignMatrix::Sparse(x) => {
                if let Some(column) = x.outer_view(j) {
                    for (i, &value) in column.iter() {
                        v[i] += a * value;
                    }
                }
            }
        }
    }

    /// Raw `(Σ h_i x_ij², Σ h_i x_ij, Σ h_i x_ij v_i)`.
    fn raw_col_weighted_moments(
        &self,
        j: usize,
        h: ArrayView1<f64>,
        v: ArrayView1<f64>,
    ) -> (f64, f64, f64) {
        let accumulate = |(sq, lin, dot): (f64, f64, f64), i: usize, a: f64| {
            let ha = h[i] * a;
            (sq + ha * a, lin + ha, dot + ha * v[i])
        };
        match self {
            DesignMatrix::Dense(x) => x
                .column(j)
                .iter()
                .enumerate()
                .fold((0.0, 0.0, 0.0), |acc, (i, &a)| accumulate(acc, i, a)),
            DesignMatrix::Sparse(x) => x.outer_view(j).map_or((0.0, 0.0, 0.0), |column| {
                column
                    .iter()
                    .fold((0.0, 0.0, 0.0), |acc, (i, &a)| accumulate(acc, i, a))
            }),
        }
    }
}

fn check_shape(rows: usize, cols: usize) -> Result<(), DesignError> {
    if rows == 0 || cols == 0 {
        return Err(DesignError::EmptyMatrix { rows, cols });
    }
    Ok(())
}

/// A read-only view of a design matrix together with its column correction.
///
/// The correction only takes effect for sparse storage. Dense input is taken
/// as already centered by the caller, so the same code path runs with the
/// correction ignored.
#[derive(Debug, Clone, Copy)]
pub struct CenteredDesign<'a> {
    matrix: &'a DesignMatrix,
    correction: Option<ArrayView1<'a, f64>>,
}

impl<'a> CenteredDesign<'a> {
    pub fn new(
        matrix: &'a DesignMatrix,
        correction: ArrayView1<'a, f64>,
    ) -> Result<Self, DesignError> {
        if correction.len() != matrix.n_features() {
            return Err(DesignError::CorrectionLength {
                expected: matrix.n_features(),
                found: correction.len(),
            });
        }
        let active = matrix.is_sparse() && correction.iter().any(|&c| c != 0.0);
        Ok(Self {
            matrix,
            correction: active.then_some(correction),
        })
    }

    /// A view with no centering at all.
    pub fn uncentered(matrix: &'a DesignMatrix) -> Self {
        Self {
            matrix,
            correction: None,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.n_samples()
    }

    pub fn n_features(&self) -> usize {
        self.matrix.n_features()
    }

    pub fn is_centered(&self) -> bool {
        self.correction.is_some()
    }

    /// `x̃_jᵀv`.
    pub fn col_dot(&self, j: usize, v: ArrayView1<f64>) -> f64 {
        let raw = self.matrix.raw_col_dot(j, v);
        match self.correction {
            Some(c) if c[j] != 0.0 => raw - c[j] * v.sum(),
            _ => raw,
        }
    }

    /// `Σ_i x̃_ij f(i, v_i)`, visiting only the stored entries of a sparse
    /// column unless the column is centered.
    pub fn col_dot_with(&self, j: usize, v: ArrayView1<f64>, f: impl Fn(usize, f64) -> f64) -> f64 {
        let raw = match self.matrix {
            DesignMatrix::Dense(x) => x
                .column(j)
                .iter()
                .zip(v.iter())
                .enumerate()
                .map(|(i, (&a, &vi))| a * f(i, vi))
                .sum::<f64>(),
            DesignMatrix::Sparse(x) => x
                .outer_view(j)
                .map_or(0.0, |column| column.iter().map(|(i, &a)| a * f(i, v[i])).sum::<f64>()),
        };
        match self.correction {
            Some(c) if c[j] != 0.0 => {
                let total: f64 = v.iter().enumerate().map(|(i, &vi)| f(i, vi)).sum();
                raw - c[j] * total
            }
            _ => raw,
        }
    }

    /// `v += a·x̃_j`.
    pub fn col_axpy(&self, j: usize, a: f64, mut v: ArrayViewMut1<f64>) {
        self.matrix.raw_col_axpy(j, a, v.view_mut());
        if let Some(c) = self.correction {
            if c[j] != 0.0 {
                v -= a * c[j];
            }
        }
    }

    /// `(Σ h_i x̃_ij², Σ h_i x̃_ij v_i)`, the curvature and weighted
    /// correlation used by the proximal Newton inner solver.
    pub fn col_weighted(&self, j: usize, h: ArrayView1<f64>, v: ArrayView1<f64>) -> (f64, f64) {
        let (sq, lin, dot) = self.matrix.raw_col_weighted_moments(j, h, v);
        match self.correction {
            Some(c) if c[j] != 0.0 => {
                let cj = c[j];
                let hv: f64 = h.iter().zip(v.iter()).map(|(a, b)| a * b).sum();
                (sq - 2.0 * cj * lin + cj * cj * h.sum(), dot - cj * hv)
            }
            _ => (sq, dot),
        }
    }

    /// `x̃_jᵀV` for every column of `V`.
    pub fn col_dot_columns(&self, j: usize, v: ArrayView2<f64>) -> Array1<f64> {
        v.columns().into_iter().map(|column| self.col_dot(j, column)).collect()
    }

    /// `V += x̃_j ⊗ a`, one column update per entry of `a`.
    pub fn col_rank_one(&self, j: usize, a: ArrayView1<f64>, mut v: ArrayViewMut2<f64>) {
        for (k, column) in v.columns_mut().into_iter().enumerate() {
            if a[k] != 0.0 {
                self.col_axpy(j, a[k], column);
            }
        }
    }

    /// `X̃ᵀv`.
    pub fn xt_dot(&self, v: ArrayView1<f64>) -> Array1<f64> {
        let total = match self.correction {
            Some(_) => v.sum(),
            None => 0.0,
        };
        Array1::from_shape_fn(self.n_features(), |j| {
            let raw = self.matrix.raw_col_dot(j, v);
            match self.correction {
                Some(c) => raw - c[j] * total,
                None => raw,
            }
        })
    }

    /// `X̃w`.
    pub fn dot(&self, w: ArrayView1<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.n_samples());
        for (j, &wj) in w.iter().enumerate() {
            if wj != 0.0 {
                self.col_axpy(j, wj, out.view_mut());
            }
        }
        out
    }

    /// `X̃W` for a coefficient matrix with one column per task.
    pub fn dot_matrix(&self, w: ArrayView2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((self.n_samples(), w.ncols()).f());
        for (j, row) in w.rows().into_iter().enumerate() {
            self.col_rank_one(j, row, out.view_mut());
        }
        out
    }

    /// Squared norms of the centered columns.
    pub fn col_sq_norms(&self) -> Array1<f64> {
        let n = self.n_samples() as f64;
        let sums = match self.correction {
            Some(_) => self.matrix.column_sums(),
            None => Array1::zeros(self.n_features()),
        };
        let ones = Array1::ones(self.n_samples());
        Array1::from_shape_fn(self.n_features(), |j| {
            let (sq, _, _) = self.matrix.raw_col_weighted_moments(j, ones.view(), ones.view());
            match self.correction {
                Some(c) => (sq - 2.0 * c[j] * sums[j] + n * c[j] * c[j]).max(0.0),
                None => sq,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use sprs::TriMat;

    fn to_sparse(x: &Array2<f64>) -> CsMat<f64> {
        let mut tri = TriMat::new((x.nrows(), x.ncols()));
        for ((i, j), &v) in x.indexed_iter() {
            if v != 0.0 {
                tri.add_triplet(i, j, v);
            }
        }
        tri.to_csc()
    }

    fn sample() -> Array2<f64> {
        array![[1.0, 0.0, 2.0], [0.0, 3.0, 0.0], [4.0, 0.0, 0.0], [0.0, 0.5, 1.0]]
    }

    #[test]
    fn sparse_and_dense_primitives_agree() {
        let x = sample();
        let dense = DesignMatrix::dense(x.clone()).unwrap();
        let sparse = DesignMatrix::sparse(to_sparse(&x)).unwrap();
        let v = array![0.5, -1.0, 2.0, 0.25];
        let w = array![1.0, -2.0, 0.5];

        let d = CenteredDesign::uncentered(&dense);
        let s = CenteredDesign::uncentered(&sparse);
        for (a, b) in d.xt_dot(v.view()).iter().zip(s.xt_dot(v.view()).iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        for (a, b) in d.dot(w.view()).iter().zip(s.dot(w.view()).iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        for (a, b) in d.col_sq_norms().iter().zip(s.col_sq_norms().iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn sparse_centering_matches_explicit_centering() {
        let x = sample();
        let means = x.mean_axis(ndarray::Axis(0)).unwrap();
        let centered = &x - &means;

        let explicit = DesignMatrix::dense(centered).unwrap();
        let sparse = DesignMatrix::sparse(to_sparse(&x)).unwrap();
        let e = CenteredDesign::uncentered(&explicit);
        let s = CenteredDesign::new(&sparse, means.view()).unwrap();
        assert!(s.is_centered());

        let v = array![0.5, -1.0, 2.0, 0.25];
        let h = array![0.2, 0.1, 0.25, 0.05];
        for j in 0..3 {
            assert_abs_diff_eq!(e.col_dot(j, v.view()), s.col_dot(j, v.view()), epsilon = 1e-12);
            let (a_sq, a_dot) = e.col_weighted(j, h.view(), v.view());
            let (b_sq, b_dot) = s.col_weighted(j, h.view(), v.view());
            assert_abs_diff_eq!(a_sq, b_sq, epsilon = 1e-12);
            assert_abs_diff_eq!(a_dot, b_dot, epsilon = 1e-12);
        }
        for (a, b) in e.col_sq_norms().iter().zip(s.col_sq_norms().iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }

        let mut from_explicit = Array1::zeros(4);
        let mut from_sparse = Array1::zeros(4);
        e.col_axpy(0, 1.5, from_explicit.view_mut());
        s.col_axpy(0, 1.5, from_sparse.view_mut());
        for (a, b) in from_explicit.iter().zip(from_sparse.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn dense_ignores_correction() {
        let dense = DesignMatrix::dense(sample()).unwrap();
        let correction = array![1.0, 1.0, 1.0];
        let view = CenteredDesign::new(&dense, correction.view()).unwrap();
        assert!(!view.is_centered());
    }

    #[test]
    fn rejects_bad_inputs() {
        let err = DesignMatrix::dense(array![[1.0, f64::NAN]]).unwrap_err();
        assert!(matches!(err, DesignError::NonFiniteEntry { row: 0, col: 1 }));

        let dense = DesignMatrix::dense(sample()).unwrap();
        let short = array![1.0];
        let err = CenteredDesign::new(&dense, short.view()).unwrap_err();
        assert!(matches!(err, DesignError::CorrectionLength { expected: 3, found: 1 }));
    }

    #[test]
    fn row_major_input_is_stored_column_major() {
        let dense = DesignMatrix::dense(sample()).unwrap();
        match dense {
            DesignMatrix::Dense(x) => assert!(x.t().is_standard_layout()),
            DesignMatrix::Sparse(_) => unreachable!(),
        }
    }
}
