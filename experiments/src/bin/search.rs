//! Hyperparameter search for SAC / ActionSAC.
//!
//! ```text
//! search -e URGym/CubesGrasp-v1 -t 50 -n 50000 --asac
//! search -e URGym/CubesGrasp-v1 -c -t 20        # append 20 trials
//! search -e URGym/CubesGrasp-v1 -b              # report the best trial only
//! ```

use std::path::PathBuf;

use action_sac::driver::{run_search, SacTrialRunner, SearchConfig};
use action_sac::Algorithm;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[cfg(not(feature = "wgpu"))]
type B = burn::backend::Autodiff<burn::backend::NdArray<f32>>;
#[cfg(feature = "wgpu")]
type B = burn::backend::Autodiff<burn::backend::Wgpu>;

#[derive(Parser)]
#[command(name = "search")]
#[command(version, about = "Search SAC hyperparameters over a persistent study", long_about = None)]
struct Cli {
    /// Environment id (e.g. URGym/CubesGrasp-v1)
    #[arg(short, long)]
    env: String,

    /// Number of trials
    #[arg(short, long, default_value = "50")]
    trials: usize,

    /// Number of steps per trial
    #[arg(short, long, default_value = "50000")]
    nsteps: usize,

    /// Name of the study (default: <env>_sac)
    #[arg(short = 'm', long)]
    name: Option<String>,

    /// Continue an existing study
    #[arg(short, long = "continue")]
    cont: bool,

    /// Do not optimize; only print and save the best trial
    #[arg(short, long)]
    best: bool,

    /// Use ActionSAC instead of SAC
    #[arg(long)]
    asac: bool,

    /// Policy to start every trial from; its replay buffer is loaded too
    #[arg(short, long)]
    policy: Option<PathBuf>,

    /// Root of the study database and artifacts
    #[arg(long, default_value = "optuna_results")]
    results_dir: PathBuf,

    /// Evaluation episodes per trial
    #[arg(long, default_value = "10")]
    eval_episodes: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let algorithm = if cli.asac { Algorithm::ActionSac } else { Algorithm::Sac };

    let config = SearchConfig::new(cli.env)
        .with_trials(cli.trials)
        .with_steps(cli.nsteps)
        .with_study_name(cli.name)
        .with_continue(cli.cont)
        .with_best_only(cli.best)
        .with_algorithm(algorithm)
        .with_policy(cli.policy)
        .with_results_dir(cli.results_dir)
        .with_eval_episodes(cli.eval_episodes);

    let mut runner = SacTrialRunner::<B>::new(&config, Default::default());
    let outcome = run_search(&config, &mut runner)
        .with_context(|| format!("search for study '{}' failed", config.study_name()))?;

    tracing::info!(
        trials = outcome.trials.len(),
        best = outcome.best.number,
        "Best parameters written to {}",
        outcome.study_dir.display()
    );
    println!("{}", outcome.best_json);
    Ok(())
}
