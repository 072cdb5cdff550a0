//! # Path Configuration
//!
//! Knobs for the single-task and multi-task entry points. Both structs are
//! `serde`-(de)serializable with per-field defaults, so a TOML file only needs
//! to list the settings it changes:
//!
//! ```toml
//! eps = 1e-2
//! n_alphas = 30
//! tol = 1e-8
//! prune = true
//! ```

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// Options for `compute_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOptions {
    /// Ratio `alpha_min / alpha_max` of a generated grid.
    pub eps: f64,
    /// Length of a generated grid. Ignored when `alphas` is given.
    pub n_alphas: usize,
    /// An explicit grid. Sorted in descending order before use.
    pub alphas: Option<Vec<f64>>,
    /// Starting coefficients for the first grid index.
    pub coef_init: Option<Vec<f64>>,
    /// Outer (working-set) iterations per grid index.
    pub max_iter: usize,
    /// Inner epochs per working set.
    pub max_epochs: usize,
    /// Inner epochs between two duality gap evaluations.
    pub gap_freq: usize,
    /// Size of the first working set.
    pub p0: usize,
    pub tol: f64,
    /// Rebuild working sets from the current support instead of growing them.
    pub prune: bool,
    /// Constrain Lasso coefficients to be non-negative.
    pub positive: bool,
    /// Solve logistic problems with the proximal Newton strategy.
    pub use_prox_newton: bool,
    /// Extrapolate dual points from the last `accel_depth` iterates. Zero disables it.
    pub accel_depth: usize,
    /// Column means of a sparse matrix that should be centered implicitly.
    pub x_offset: Option<Vec<f64>>,
    /// Column scales matching `x_offset`.
    pub x_scale: Option<Vec<f64>>,
    pub return_duals: bool,
    pub return_n_iter: bool,
    pub verbose: u8,
    pub verbose_inner: u8,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            eps: 1e-3,
            n_alphas: 100,
            alphas: None,
            coef_init: None,
            max_iter: 20,
            max_epochs: 50_000,
            gap_freq: 10,
            p0: 10,
            tol: 1e-6,
            prune: false,
            positive: false,
            use_prox_newton: false,
            accel_depth: 5,
            x_offset: None,
            x_scale: None,
            return_duals: false,
            return_n_iter: false,
            verbose: 0,
            verbose_inner: 0,
        }
    }
}

/// Options for `compute_multitask_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTaskOptions {
    pub eps: f64,
    pub n_alphas: usize,
    pub alphas: Option<Vec<f64>>,
    /// Starting coefficients, shape `[n_tasks, n_features]`.
    pub coef_init: Option<Array2<f64>>,
    pub max_iter: usize,
    pub max_epochs: usize,
    pub gap_freq: usize,
    pub p0: usize,
    pub tol: f64,
    pub prune: bool,
    pub use_accel: bool,
    /// Number of residual iterates combined by the extrapolation step.
    pub accel_depth: usize,
    pub x_offset: Option<Vec<f64>>,
    pub x_scale: Option<Vec<f64>>,
    pub return_duals: bool,
    pub return_n_iter: bool,
    pub verbose: u8,
    pub verbose_inner: u8,
}

impl Default for MultiTaskOptions {
    fn default() -> Self {
        Self {
            eps: 1e-2,
            n_alphas: 100,
            alphas: None,
            coef_init: None,
            max_iter: 100,
            max_epochs: 50_000,
            gap_freq: 10,
            p0: 10,
            tol: 1e-6,
            prune: true,
            use_accel: true,
            accel_depth: 6,
            x_offset: None,
            x_scale: None,
            return_duals: false,
            return_n_iter: false,
            verbose: 0,
            verbose_inner: 0,
        }
    }
}

macro_rules! impl_toml_io {
    ($ty:ty) => {
        impl $ty {
            /// Loads options from a TOML file. Missing keys take their defaults.
            pub fn load(path: &Path) -> Result<Self, ConfigError> {
                let toml_string = fs::read_to_string(path)?;
                Ok(toml::from_str(&toml_string)?)
            }

            /// Writes the options as pretty-printed TOML.
            pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
                fs::write(path, toml::to_string_pretty(self)?)?;
                Ok(())
            }
        }
    };
}

impl_toml_io!(PathOptions);
impl_toml_io!(MultiTaskOptions);
