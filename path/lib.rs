#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Regularization paths for L1-penalized models: the Lasso, the non-negative
//! Lasso, sparse logistic regression and the multi-task Lasso. Each path is
//! solved from the largest alpha down, warm-starting every point from the
//! previous one, with working-set oracles certified by duality gaps.

pub mod assemble;
pub mod centering;
pub mod config;
pub mod dual;
pub mod engine;
pub mod grid;
pub mod monitor;
pub mod types;
pub mod warm_start;

#[path = "../shared/design.rs"]
pub mod design;

#[path = "../shared/data.rs"]
pub mod data;

#[path = "../solver/mod.rs"]
pub mod solver;

pub use config::{ConfigError, MultiTaskOptions, PathOptions};
pub use design::{DesignError, DesignMatrix};
pub use engine::{PathError, compute_multitask_path, compute_path};
pub use types::{Convergence, ConvergenceStatus, MultiTaskPathResult, PathResult, ProblemKind};
