//! Loss-specific pieces of the L1-penalized problems.
//!
//! Each loss is described through the "fitted" buffer the solvers maintain:
//! the residual `y - Xw` for the quadratic loss and the linear predictor `Xw`
//! for the logistic loss. Coordinate updates, dual points and objectives are
//! all written in terms of that buffer and the pointwise derivative of the loss
//! with respect to `Xw`.

use ndarray::{Array1, ArrayView1};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// `‖y - Xw‖² / (2n)`, fitted buffer holds the residual.
    Quadratic,
    /// `Σ log(1 + exp(-yᵢ (Xw)ᵢ))`, fitted buffer holds `Xw`.
    Logistic,
}

impl Loss {
    /// Sign applied to `δ·x_j` when coefficient `j` moves by `δ`.
    pub fn fitted_sign(self) -> f64 {
        match self {
            Loss::Quadratic => -1.0,
            Loss::Logistic => 1.0,
        }
    }

    /// Fitted buffer for coefficients with linear predictor `xw`.
    pub fn fitted_from_predictor(self, y: ArrayView1<f64>, xw: Array1<f64>) -> Array1<f64> {
        match self {
            Loss::Quadratic => &y - &xw,
            Loss::Logistic => xw,
        }
    }

    /// Fitted buffer for the all-zero coefficient vector.
    pub fn zero_fitted(self, y: ArrayView1<f64>) -> Array1<f64> {
        match self {
            Loss::Quadratic => y.to_owned(),
            Loss::Logistic => Array1::zeros(y.len()),
        }
    }

    /// Derivative of the loss with respect to `(Xw)ᵢ`.
    #[inline]
    pub fn derivative(self, yi: f64, fitted: f64, n_samples: usize) -> f64 {
        match self {
            Loss::Quadratic => -fitted / n_samples as f64,
            Loss::Logistic => -yi * sigmoid(-yi * fitted),
        }
    }

    /// Coordinate-wise Lipschitz constant of the gradient for a column with
    /// squared norm `col_sq_norm`.
    pub fn lipschitz(self, col_sq_norm: f64, n_samples: usize) -> f64 {
        match self {
            Loss::Quadratic => col_sq_norm / n_samples as f64,
            Loss::Logistic => col_sq_norm / 4.0,
        }
    }

    /// The unscaled dual candidate `-∇ / alpha`: `r / (nα)` for the quadratic
    /// loss and `y / (1 + exp(y ⊙ Xw)) / α` for the logistic loss.
    pub fn dual_direction(self, y: ArrayView1<f64>, fitted: ArrayView1<f64>, alpha: f64) -> Array1<f64> {
        let n = y.len();
        let mut out = Array1::zeros(n);
        for ((o, &yi), &fi) in out.iter_mut().zip(y.iter()).zip(fitted.iter()) {
            *o = -self.derivative(yi, fi, n) / alpha;
        }
        out
    }

    pub fn primal(self, y: ArrayView1<f64>, fitted: ArrayView1<f64>, l1_norm: f64, alpha: f64) -> f64 {
        let datafit = match self {
            Loss::Quadratic => fitted.dot(&fitted) / (2.0 * y.len() as f64),
            Loss::Logistic => y
                .iter()
                .zip(fitted.iter())
                .map(|(&yi, &fi)| log1p_exp(-yi * fi))
                .sum::<f64>(),
        };
        datafit + alpha * l1_norm
    }

    /// Dual objective at `theta`. Returns `-inf` when `theta` lies outside the
    /// domain of the logistic dual.
    pub fn dual(self, y: ArrayView1<f64>, theta: ArrayView1<f64>, alpha: f64) -> f64 {
        match self {
            Loss::Quadratic => {
                let n = y.len() as f64;
                let scale = n * alpha;
                let (norm_y, norm_diff) = y.iter().zip(theta.iter()).fold(
                    (0.0, 0.0),
                    |(ny, nd), (&yi, &ti)| {
                        let d = yi - scale * ti;
                        (ny + yi * yi, nd + d * d)
                    },
                );
                (norm_y - norm_diff) / (2.0 * n)
            }
            Loss::Logistic => {
                let mut total = 0.0;
                for (&yi, &ti) in y.iter().zip(theta.iter()) {
                    let u = alpha * yi * ti;
                    if !(-1e-12..=1.0 + 1e-12).contains(&u) {
                        return f64::NEG_INFINITY;
                    }
                    total -= binary_entropy(u.clamp(0.0, 1.0));
                }
                total
            }
        }
    }
}

/// `sign(z)·max(|z| - threshold, 0)`, or `max(z - threshold, 0)` when the
/// coefficient is constrained non-negative.
#[inline]
pub fn soft_threshold(z: f64, threshold: f64, positive: bool) -> f64 {
    if positive {
        (z - threshold).max(0.0)
    } else if z > threshold {
        z - threshold
    } else if z < -threshold {
        z + threshold
    } else {
        0.0
    }
}

#[inline]
pub fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

/// `log(1 + exp(t))` without overflow.
#[inline]
pub fn log1p_exp(t: f64) -> f64 {
    if t > 0.0 {
        t + (-t).exp().ln_1p()
    } else {
        t.exp().ln_1p()
    }
}

/// `u log u + (1 - u) log(1 - u)`, zero at both endpoints.
fn binary_entropy(u: f64) -> f64 {
    let xlogx = |v: f64| if v <= 0.0 { 0.0 } else { v * v.ln() };
    xlogx(u) + xlogx(1.0 - u)
}

pub fn l1_norm(w: ArrayView1<f64>) -> f64 {
    w.iter().map(|v| v.abs()).sum()
}
