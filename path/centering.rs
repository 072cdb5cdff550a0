//! Implicit column centering for sparse design matrices.
//!
//! Centering a sparse column makes it dense. Instead of centering, the caller
//! passes each column's offset (usually its mean) and scale, and every solver
//! primitive subtracts `offset / scale` algebraically. With no offset the
//! correction is the zero vector and the solvers behave exactly as on the raw
//! matrix.

use crate::design::{CenteredDesign, DesignError, DesignMatrix};
use ndarray::Array1;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CenteringError {
    #[error("Column offsets have length {found}, but the design has {expected} features.")]
    OffsetLength { expected: usize, found: usize },

    #[error("Column scales have length {found}, but the design has {expected} features.")]
    ScaleLength { expected: usize, found: usize },

    #[error("Column scale for feature {index} is {value}; scales must be positive and finite.")]
    InvalidScale { index: usize, value: f64 },

    #[error("Column offset for feature {index} is not finite.")]
    NonFiniteOffset { index: usize },

    #[error(transparent)]
    Design(#[from] DesignError),
}

/// The per-feature correction `offset / scale`, computed once per run.
#[derive(Debug, Clone)]
pub struct SparseCentering {
    correction: Array1<f64>,
}

impl SparseCentering {
    /// The correction for no centering at all.
    pub fn none(n_features: usize) -> Self {
        Self {
            correction: Array1::zeros(n_features),
        }
    }

    /// Builds the correction from optional offsets and scales. A missing scale
    /// defaults to one; a missing offset yields the zero correction regardless
    /// of the scale.
    pub fn new(
        n_features: usize,
        offset: Option<&[f64]>,
        scale: Option<&[f64]>,
    ) -> Result<Self, CenteringError> {
        if let Some(scale) = scale {
            if scale.len() != n_features {
                return Err(CenteringError::ScaleLength {
                    expected: n_features,
                    found: scale.len(),
                });
            }
            if let Some((index, &value)) = scale
                .iter()
                .enumerate()
                .find(|(_, s)| !(s.is_finite() && **s > 0.0))
            {
                return Err(CenteringError::InvalidScale { index, value });
            }
        }
        let Some(offset) = offset else {
            return Ok(Self::none(n_features));
        };
        if offset.len() != n_features {
            return Err(CenteringError::OffsetLength {
                expected: n_features,
                found: offset.len(),
            });
        }
        if let Some(index) = offset.iter().position(|o| !o.is_finite()) {
            return Err(CenteringError::NonFiniteOffset { index });
        }
        let correction = match scale {
            Some(scale) => offset.iter().zip(scale).map(|(o, s)| o / s).collect(),
            None => Array1::from(offset.to_vec()),
        };
        Ok(Self { correction })
    }

    /// Column means of `x` as offsets, unit scales.
    pub fn column_means(x: &DesignMatrix) -> Self {
        let n = x.n_samples() as f64;
        Self {
            correction: x.column_sums().mapv(|s| s / n),
        }
    }

    pub fn correction(&self) -> &Array1<f64> {
        &self.correction
    }

    /// Whether any feature is actually corrected.
    pub fn is_active(&self) -> bool {
        self.correction.iter().any(|&c| c != 0.0)
    }

    /// Pairs the design with this correction for the solvers.
    pub fn apply<'a>(&'a self, x: &'a DesignMatrix) -> Result<CenteredDesign<'a>, CenteringError> {
        if self.is_active() && !x.is_sparse() {
            log::debug!("Column correction supplied for a dense design; treating it as pre-centered");
        }
        Ok(CenteredDesign::new(x, self.correction.view())?)
    }
}
