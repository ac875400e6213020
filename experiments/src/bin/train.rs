//! Train a SAC or ActionSAC agent on a registered environment.
//!
//! ```text
//! train -e URGym/CubesGrasp-v0 -a ActionSAC -n 100000 --name grasp -t
//! ```

use std::path::PathBuf;

use action_sac::driver::{run_training, TrainConfig};
use action_sac::Algorithm;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[cfg(not(feature = "wgpu"))]
type B = burn::backend::Autodiff<burn::backend::NdArray<f32>>;
#[cfg(feature = "wgpu")]
type B = burn::backend::Autodiff<burn::backend::Wgpu>;

#[derive(Parser)]
#[command(name = "train")]
#[command(version, about = "Train a SAC or ActionSAC agent", long_about = None)]
struct Cli {
    /// Environment id (e.g. URGym/CubesGrasp-v0)
    #[arg(short, long, default_value = "URGym/CubesGrasp-v0")]
    env: String,

    /// Algorithm to use: SAC or ActionSAC
    #[arg(short, long, default_value = "ActionSAC")]
    algo: String,

    /// Number of steps to train
    #[arg(short, long, default_value = "100000")]
    nsteps: usize,

    /// Record episodes as GIFs in the "video" directory instead of using the screen
    #[arg(short, long)]
    recvideo: bool,

    /// Write tensorboard logs to the "logs" directory
    #[arg(short, long)]
    tblog: bool,

    /// Name of this experiment (prefix of logs and policies)
    #[arg(long, default_value = "model")]
    name: String,

    /// Show the training in a window
    #[arg(short, long)]
    visualize: bool,

    /// Policy snapshot to resume from; its replay buffer is loaded too
    #[arg(short, long)]
    policy: Option<PathBuf>,

    /// Hidden width of the actor heads and critic layers
    #[arg(long, default_value = "256")]
    nodes: usize,

    /// Steps between checkpoints
    #[arg(long, default_value = "10000")]
    checkpoint_freq: usize,

    /// Also write the replay buffer at every checkpoint
    #[arg(long)]
    save_replay_buffer: bool,

    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let algorithm = Algorithm::from_name(&cli.algo).context("invalid --algo")?;

    let config = TrainConfig::new(cli.env.clone(), algorithm)
        .with_total_timesteps(cli.nsteps)
        .with_record_video(cli.recvideo)
        .with_tensorboard(cli.tblog)
        .with_name(cli.name)
        .with_human(cli.visualize)
        .with_policy(cli.policy)
        .with_n_nodes(cli.nodes)
        .with_checkpoint_freq(cli.checkpoint_freq)
        .with_checkpoint_replay_buffer(cli.save_replay_buffer)
        .with_seed(cli.seed);

    let outputs = run_training::<B>(&config, Default::default())
        .with_context(|| format!("training {} on {} failed", algorithm, cli.env))?;

    tracing::info!(
        steps = outputs.num_timesteps,
        updates = outputs.n_updates,
        checkpoints = outputs.checkpoints.len(),
        "Done. Policy at {}",
        outputs.policy.display()
    );
    if let Some(reward) = outputs.mean_reward {
        tracing::info!("Mean episode reward over the last episodes: {:.3}", reward);
    }
    Ok(())
}
