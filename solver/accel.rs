//! Dual extrapolation.
//!
//! Coordinate descent iterates converge linearly once the support is
//! identified, so the sequence of fitted buffers `r_1, ..., r_K` behaves like a
//! vector autoregressive process. Combining the last `K` iterates with weights
//! `c = z / Σz`, where `(UUᵀ) z = 1` and `U` stacks the successive differences,
//! extrapolates towards the limit and usually gives a far better dual point than
//! the current residual alone.

use faer::linalg::solvers::Solve;
use faer::{Mat, MatRef, Side};
use ndarray::{Array1, Array2, ArrayView1};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Extrapolator {
    depth: usize,
    history: VecDeque<Array1<f64>>,
}

impl Extrapolator {
    /// `depth < 2` disables extrapolation.
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            history: VecDeque::with_capacity(depth),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.depth >= 2
    }

    pub fn push(&mut self, iterate: ArrayView1<f64>) {
        if !self.is_enabled() {
            return;
        }
        if self.history.len() == self.depth {
            self.history.pop_front();
        }
        self.history.push_back(iterate.to_owned());
    }

    /// The extrapolated iterate, once `depth` iterates have been seen and the
    /// difference system is well posed.
    pub fn extrapolate(&self) -> Option<Array1<f64>> {
        if !self.is_enabled() || self.history.len() < self.depth {
            return None;
        }
        let k = self.depth - 1;
        let diffs: Vec<Array1<f64>> = (0..k)
            .map(|i| &self.history[i + 1] - &self.history[i])
            .collect();
        let mut gram = Array2::from_shape_fn((k, k), |(a, b)| diffs[a].dot(&diffs[b]));
        // Successive differences are often nearly collinear; a small ridge keeps
        // the system solvable and still yields the minimal-residual combination.
        let ridge = 1e-8 * gram.diag().sum();
        gram.diag_mut().mapv_inplace(|v| v + ridge);
        let z = anderson_weights(&gram)?;
        let total = z.sum();
        if !total.is_finite() || total.abs() < f64::EPSILON {
            return None;
        }
        let mut out = Array1::zeros(self.history[0].len());
        for (i, &zi) in z.iter().enumerate() {
            out.scaled_add(zi / total, &self.history[i + 1]);
        }
        out.iter().all(|v| v.is_finite()).then_some(out)
    }
}

/// Solves `G z = 1` through a Cholesky factorization of the ridge-stabilized
/// Gram matrix. `None` when `G` is not numerically positive definite.
fn anderson_weights(gram: &Array2<f64>) -> Option<Array1<f64>> {
    let k = gram.nrows();
    let slice = gram.as_slice()?;
    let factor = match MatRef::from_row_major_slice(slice, k, k).llt(Side::Lower) {
        Ok(factor) => factor,
        Err(err) => {
            log::trace!("extrapolation skipped: {err:?}");
            return None;
        }
    };
    let ones = Mat::<f64>::from_fn(k, 1, |_, _| 1.0);
    let z = factor.solve(ones.as_ref());
    Some(Array1::from_shape_fn(k, |i| z[(i, 0)]))
}
