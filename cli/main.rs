#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use itertools::{Itertools, izip};
use ndarray::Axis;
use std::fs;
use std::path::PathBuf;
use std::process;

use sparsepath::centering::SparseCentering;
use sparsepath::data::{LoadedTable, load_table};
use sparsepath::{
    Convergence, DesignMatrix, MultiTaskOptions, PathOptions, ProblemKind, compute_multitask_path,
    compute_path,
};

#[derive(Clone, Copy, ValueEnum)]
pub enum ProblemCli {
    Lasso,
    Logreg,
}

impl From<ProblemCli> for ProblemKind {
    fn from(value: ProblemCli) -> Self {
        match value {
            ProblemCli::Lasso => ProblemKind::Lasso,
            ProblemCli::Logreg => ProblemKind::Logreg,
        }
    }
}

/// Options shared by both subcommands. Flags given here override the values
/// read from `--config`.
#[derive(Args)]
pub struct CommonArgs {
    /// Delimited text file with a header row (.csv for commas, tabs otherwise)
    pub data: PathBuf,

    /// Target column name; every other column is a feature
    #[arg(long = "target", required = true)]
    pub targets: Vec<String>,

    /// TOML file with path options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Ratio alpha_min / alpha_max of the generated grid
    #[arg(long)]
    pub eps: Option<f64>,

    /// Number of grid points
    #[arg(long)]
    pub n_alphas: Option<usize>,

    /// Explicit grid, comma separated
    #[arg(long, value_delimiter = ',')]
    pub alphas: Vec<f64>,

    /// Duality gap tolerance per grid point
    #[arg(long)]
    pub tol: Option<f64>,

    /// Outer working-set iterations per grid point
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Rebuild working sets from the current support
    #[arg(long)]
    pub prune: bool,

    /// Store features as a compressed sparse column matrix
    #[arg(long)]
    pub sparse: bool,

    /// Center features (implicitly when stored sparse)
    #[arg(long)]
    pub center: bool,

    /// Include the dual point of every grid index in the output
    #[arg(long)]
    pub duals: bool,

    /// Include the outer iteration count of every grid index in the output
    #[arg(long)]
    pub n_iter: bool,

    /// Write the full result as TOML instead of printing a summary
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Log progress per grid point (-v) and inside the solvers (-vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args)]
pub struct PathArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, value_enum, default_value_t = ProblemCli::Lasso)]
    pub problem: ProblemCli,

    /// Constrain Lasso coefficients to be non-negative
    #[arg(long)]
    pub positive: bool,

    /// Use proximal Newton for logistic regression
    #[arg(long)]
    pub prox_newton: bool,
}

#[derive(Parser)]
#[command(name = "sparsepath", version, about = "Regularization paths for L1-penalized models")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lasso, positive Lasso, or sparse logistic regression path
    #[command(about = "Compute a single-target regularization path")]
    Path(PathArgs),

    /// Multi-task Lasso path over several target columns
    #[command(about = "Compute a multi-task Lasso path (repeat --target per task)")]
    Multitask(CommonArgs),
}

/// Design matrix plus the implicit centering offsets it needs, if any.
fn prepare_design(
    mut table: LoadedTable,
    sparse: bool,
    center: bool,
) -> Result<(DesignMatrix, Option<Vec<f64>>, LoadedTable), Box<dyn std::error::Error>> {
    if center && !sparse {
        if let Some(means) = table.features.mean_axis(Axis(0)) {
            table.features -= &means;
        }
    }
    let design = table.design(sparse)?;
    let offsets = (center && sparse)
        .then(|| SparseCentering::column_means(&design).correction().to_vec());
    Ok((design, offsets, table))
}

fn print_summary(alphas: &[f64], supports: &[usize], convergence: &[Convergence]) {
    println!("{:>5}  {:>12}  {:>9}  {:>11}  {}", "index", "alpha", "non-zeros", "gap", "status");
    for (alpha, support, record) in izip!(alphas, supports, convergence) {
        println!(
            "{:>5}  {:>12.5e}  {:>9}  {:>11.3e}  {:?}",
            record.index, alpha, support, record.gap, record.status
        );
    }
    let stalled = convergence.iter().filter(|c| !c.converged()).map(|c| c.index).join(", ");
    if !stalled.is_empty() {
        println!("Grid points above tolerance: {stalled}");
    }
}

fn run_path(args: PathArgs) -> Result<(), Box<dyn std::error::Error>> {
    let common = &args.common;
    let mut options = match &common.config {
        Some(path) => PathOptions::load(path)?,
        None => PathOptions::default(),
    };
    if let Some(eps) = common.eps {
        options.eps = eps;
    }
    if let Some(n_alphas) = common.n_alphas {
        options.n_alphas = n_alphas;
    }
    if !common.alphas.is_empty() {
        options.alphas = Some(common.alphas.clone());
    }
    if let Some(tol) = common.tol {
        options.tol = tol;
    }
    if let Some(max_iter) = common.max_iter {
        options.max_iter = max_iter;
    }
    options.prune |= common.prune;
    options.positive |= args.positive;
    options.use_prox_newton |= args.prox_newton;
    options.return_duals |= common.duals;
    options.return_n_iter |= common.n_iter;
    options.verbose = options.verbose.max(common.verbose);
    options.verbose_inner = options.verbose_inner.max(common.verbose.saturating_sub(1));

    if common.targets.len() != 1 {
        return Err("The path command takes exactly one --target; use multitask for several.".into());
    }
    println!("Loading data from: {}", common.data.display());
    let table = load_table(&common.data, &common.targets)?;
    let (design, offsets, table) = prepare_design(table, common.sparse, common.center)?;
    if offsets.is_some() {
        options.x_offset = offsets;
    }
    println!(
        "Loaded {} samples with {} features",
        design.n_samples(),
        design.n_features()
    );

    let y = table.targets.column(0);
    let result = compute_path(&design, y, args.problem.into(), &options)?;

    match &common.out {
        Some(path) => {
            fs::write(path, toml::to_string_pretty(&result)?)?;
            println!("Path written to: {}", path.display());
        }
        None => print_summary(
            result.alphas.as_slice().unwrap_or(&[]),
            &result.support_sizes(),
            &result.convergence,
        ),
    }
    Ok(())
}

fn run_multitask(common: CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = match &common.config {
        Some(path) => MultiTaskOptions::load(path)?,
        None => MultiTaskOptions::default(),
    };
    if let Some(eps) = common.eps {
        options.eps = eps;
    }
    if let Some(n_alphas) = common.n_alphas {
        options.n_alphas = n_alphas;
    }
    if !common.alphas.is_empty() {
        options.alphas = Some(common.alphas.clone());
    }
    if let Some(tol) = common.tol {
        options.tol = tol;
    }
    if let Some(max_iter) = common.max_iter {
        options.max_iter = max_iter;
    }
    options.prune |= common.prune;
    options.return_duals |= common.duals;
    options.return_n_iter |= common.n_iter;
    options.verbose = options.verbose.max(common.verbose);
    options.verbose_inner = options.verbose_inner.max(common.verbose.saturating_sub(1));

    println!("Loading data from: {}", common.data.display());
    let table = load_table(&common.data, &common.targets)?;
    let (design, offsets, table) = prepare_design(table, common.sparse, common.center)?;
    if offsets.is_some() {
        options.x_offset = offsets;
    }
    println!(
        "Loaded {} samples with {} features and {} tasks ({})",
        design.n_samples(),
        design.n_features(),
        table.targets.ncols(),
        table.target_names.iter().join(", ")
    );

    let result = compute_multitask_path(&design, table.targets.view(), &options)?;

    match &common.out {
        Some(path) => {
            fs::write(path, toml::to_string_pretty(&result)?)?;
            println!("Path written to: {}", path.display());
        }
        None => print_summary(
            result.alphas.as_slice().unwrap_or(&[]),
            &result.support_sizes(),
            &result.convergence,
        ),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Path(args)) => run_path(args),
        Some(Commands::Multitask(args)) => run_multitask(args),
        None => {
            if let Err(e) = Cli::command().print_help() {
                eprintln!("Error: {e}");
            }
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
