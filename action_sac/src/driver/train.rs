//! Single training run.
//!
//! ```text
//! Initializing -> Running -> Checkpointing (every checkpoint_freq steps) -> Finalizing -> Terminated
//! ```
//!
//! Output layout below `output_dir`, with `run = <name>_<algo>`:
//!
//! ```text
//! checkpoints/<run>/<run>_<steps>_steps.{json,bin}
//! policies/<run>_policy.{json,bin}
//! policies/<run>_replay_buffer
//! logs/<run>/            (tensorboard)
//! video/                 (recorded episodes)
//! ```

use std::fmt;
use std::path::PathBuf;

use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use urgym::{make, spec, Env, Monitor, RenderMode};

use super::{policy_stem, replay_buffer_path, POLICY_SUFFIX, REPLAY_BUFFER_SUFFIX};
use crate::algorithms::{Algorithm, Sac, SacConfig};
use crate::callbacks::CheckpointCallback;
use crate::error::Result;
use crate::metrics::{ConsoleLogger, MetricsLogger};

/// Stage of a training run, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainPhase {
    Initializing,
    Running,
    Checkpointing,
    Finalizing,
    Terminated,
}

impl fmt::Display for TrainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainPhase::Initializing => "initializing",
            TrainPhase::Running => "running",
            TrainPhase::Checkpointing => "checkpointing",
            TrainPhase::Finalizing => "finalizing",
            TrainPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub env_id: String,
    pub algorithm: Algorithm,
    pub total_timesteps: usize,
    /// Record episodes as GIFs under `video/` instead of showing a window.
    pub record_video: bool,
    pub tensorboard: bool,
    /// Experiment name, prefix of every output.
    pub name: String,
    /// Render to a desktop window while training.
    pub human: bool,
    /// Resume from this policy snapshot and its paired replay buffer.
    pub policy: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub seed: u64,
    pub checkpoint_freq: usize,
    /// Write the replay buffer next to every checkpoint.
    pub checkpoint_replay_buffer: bool,
    /// Hidden width of the actor heads and critic layers.
    pub n_nodes: usize,
    pub sac: SacConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            env_id: "URGym/CubesGrasp-v0".to_string(),
            algorithm: Algorithm::ActionSac,
            total_timesteps: 100_000,
            record_video: false,
            tensorboard: false,
            name: "model".to_string(),
            human: false,
            policy: None,
            output_dir: PathBuf::from("."),
            seed: 42,
            checkpoint_freq: 10_000,
            checkpoint_replay_buffer: false,
            n_nodes: 256,
            sac: SacConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn new(env_id: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            env_id: env_id.into(),
            algorithm,
            ..Self::default()
        }
    }

    pub fn with_total_timesteps(mut self, steps: usize) -> Self {
        self.total_timesteps = steps;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_record_video(mut self, record: bool) -> Self {
        self.record_video = record;
        self
    }

    pub fn with_tensorboard(mut self, tensorboard: bool) -> Self {
        self.tensorboard = tensorboard;
        self
    }

    pub fn with_human(mut self, human: bool) -> Self {
        self.human = human;
        self
    }

    pub fn with_policy(mut self, policy: Option<PathBuf>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_checkpoint_freq(mut self, freq: usize) -> Self {
        self.checkpoint_freq = freq;
        self
    }

    pub fn with_checkpoint_replay_buffer(mut self, save: bool) -> Self {
        self.checkpoint_replay_buffer = save;
        self
    }

    pub fn with_n_nodes(mut self, n_nodes: usize) -> Self {
        self.n_nodes = n_nodes;
        self
    }

    pub fn with_sac(mut self, sac: SacConfig) -> Self {
        self.sac = sac;
        self
    }

    /// `<name>_<algo>`
    pub fn run_name(&self) -> String {
        format!("{}_{}", self.name, self.algorithm)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.output_dir.join("checkpoints").join(self.run_name())
    }

    pub fn policy_path(&self) -> PathBuf {
        self.output_dir
            .join("policies")
            .join(format!("{}{POLICY_SUFFIX}", self.run_name()))
    }

    pub fn replay_buffer_path(&self) -> PathBuf {
        self.output_dir
            .join("policies")
            .join(format!("{}{REPLAY_BUFFER_SUFFIX}", self.run_name()))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.output_dir.join("logs").join(self.run_name())
    }

    pub fn video_dir(&self) -> PathBuf {
        self.output_dir.join("video")
    }

    fn render_mode(&self) -> RenderMode {
        if self.human {
            RenderMode::Human
        } else if self.record_video {
            RenderMode::RgbArray
        } else {
            RenderMode::None
        }
    }
}

/// What a finished run left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutputs {
    pub policy: PathBuf,
    pub replay_buffer: PathBuf,
    pub checkpoints: Vec<PathBuf>,
    pub num_timesteps: usize,
    pub n_updates: usize,
    pub mean_reward: Option<f32>,
}

fn enter(phase: TrainPhase, run: &str) {
    log::info!("[{run}] {phase}");
}

/// Registered environment, optionally recorded, under an episode monitor.
fn build_env(config: &TrainConfig) -> Result<Box<dyn Env>> {
    let mut env = make(&config.env_id, config.render_mode())?;
    if config.record_video {
        env = Box::new(urgym::RecordVideo::new(env, config.video_dir(), config.run_name())?);
    }
    Ok(Box::new(Monitor::new(env)))
}

fn metrics_logger(config: &TrainConfig) -> Box<dyn MetricsLogger> {
    if !config.tensorboard {
        return Box::new(ConsoleLogger::new());
    }
    #[cfg(feature = "tensorboard")]
    {
        let dir = config.log_dir();
        log::info!("Writing tensorboard logs to {}", dir.display());
        Box::new(
            crate::metrics::MultiLogger::new()
                .add(ConsoleLogger::new())
                .add(crate::metrics::TensorBoardLogger::new(dir)),
        )
    }
    #[cfg(not(feature = "tensorboard"))]
    {
        log::warn!("Tensorboard logging needs the `tensorboard` feature; logging to the console only");
        Box::new(ConsoleLogger::new())
    }
}

/// Build (or resume) an agent, train it and write the final snapshots.
pub fn run_training<B: AutodiffBackend>(config: &TrainConfig, device: B::Device) -> Result<TrainOutputs> {
    let run = config.run_name();

    enter(TrainPhase::Initializing, &run);
    let env = build_env(config)?;
    let action_dim = env.action_space().dim();
    let layout = spec(&config.env_id)?.action_layout;
    let policy_config = config.algorithm.policy_config(layout, action_dim, config.n_nodes);
    let sac_config = config.sac.clone().with_seed(config.seed);

    let mut sac = match &config.policy {
        Some(path) => {
            let stem = policy_stem(path);
            let mut sac = Sac::<B>::load(&stem, env, Some(sac_config), Some(&policy_config), device)?;
            if sac.algorithm() != config.algorithm {
                log::warn!(
                    "Requested {} but the snapshot holds a {} policy; continuing with {}",
                    config.algorithm,
                    sac.algorithm(),
                    sac.algorithm()
                );
            }
            sac.load_replay_buffer(replay_buffer_path(&stem))?;
            sac
        }
        None => Sac::<B>::new(env, config.algorithm, sac_config, policy_config, device)?,
    };
    sac.set_logger(metrics_logger(config));

    enter(TrainPhase::Running, &run);
    log::info!("Training for {} steps with {}...", config.total_timesteps, config.algorithm);
    let mut checkpoints = CheckpointCallback::new(config.checkpoint_freq, config.checkpoint_dir(), &run)
        .with_replay_buffer(config.checkpoint_replay_buffer);
    let outcome = sac.learn(config.total_timesteps, &mut checkpoints);
    if let Err(err) = outcome {
        sac.close();
        enter(TrainPhase::Terminated, &run);
        return Err(err);
    }

    enter(TrainPhase::Finalizing, &run);
    let policy = config.policy_path();
    let replay_buffer = config.replay_buffer_path();
    sac.save(&policy)?;
    sac.save_replay_buffer(&replay_buffer)?;
    log::info!("Saved policy to {}", policy.display());
    log::info!("Saved replay buffer to {}", replay_buffer.display());

    let outputs = TrainOutputs {
        policy,
        replay_buffer,
        checkpoints: checkpoints.saved().to_vec(),
        num_timesteps: sac.num_timesteps(),
        n_updates: sac.n_updates(),
        mean_reward: sac.metrics().mean_reward(),
    };

    sac.close();
    enter(TrainPhase::Terminated, &run);
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::snapshot_exists;
    use crate::evaluation::evaluate_policy;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray<f32>>;

    fn small(dir: &std::path::Path, algorithm: Algorithm) -> TrainConfig {
        TrainConfig::new("URGym/CubesGrasp-v0", algorithm)
            .with_total_timesteps(60)
            .with_name("toy")
            .with_output_dir(dir)
            .with_checkpoint_freq(25)
            .with_n_nodes(16)
            .with_sac(
                SacConfig::new()
                    .with_learning_starts(20)
                    .with_batch_size(8)
                    .with_buffer_size(500),
            )
    }

    #[test]
    fn test_layout() {
        let config = TrainConfig::new("Pendulum-v1", Algorithm::Sac).with_name("exp");
        assert_eq!(config.run_name(), "exp_SAC");
        assert_eq!(config.checkpoint_dir(), PathBuf::from("./checkpoints/exp_SAC"));
        assert_eq!(config.policy_path(), PathBuf::from("./policies/exp_SAC_policy"));
        assert_eq!(
            config.replay_buffer_path(),
            PathBuf::from("./policies/exp_SAC_replay_buffer")
        );
        assert_eq!(config.log_dir(), PathBuf::from("./logs/exp_SAC"));
    }

    #[test]
    fn test_defaults() {
        let config = TrainConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.checkpoint_freq, 10_000);
        assert_eq!(config.n_nodes, 256);
        assert_eq!(config.algorithm, Algorithm::ActionSac);
    }

    #[test]
    fn test_env_reports_episode_stats() {
        let dir = tempfile::tempdir().unwrap();
        let config = small(dir.path(), Algorithm::Sac);
        let mut env = build_env(&config).unwrap();
        let zero = vec![0.0; env.action_space().dim()];

        env.reset(Some(0));
        let mut total = 0.0;
        let mut length = 0;
        let stats = loop {
            let step = env.step(&zero).unwrap();
            total += step.reward;
            length += 1;
            if step.done() {
                break step.info.episode.expect("finished episode carries its stats");
            }
            assert!(step.info.episode.is_none());
        };
        assert_eq!(stats.length, length);
        assert!((stats.reward - total).abs() < 1e-3);
    }

    #[test]
    fn test_train_persist_and_evaluate() {
        let dir = tempfile::tempdir().unwrap();
        let config = small(dir.path(), Algorithm::ActionSac);
        let outputs = run_training::<B>(&config, Default::default()).unwrap();

        assert_eq!(outputs.num_timesteps, 60);
        assert_eq!(outputs.n_updates, 40);
        assert!(snapshot_exists(&outputs.policy));
        assert!(outputs.replay_buffer.exists());
        assert_eq!(outputs.checkpoints.len(), 2);
        assert!(snapshot_exists(&config.checkpoint_dir().join("toy_ActionSAC_50_steps")));
        assert!(!config.checkpoint_dir().join("toy_ActionSAC_replay_buffer_50_steps").exists());

        let env = make(&config.env_id, RenderMode::None).unwrap();
        let mut restored = Sac::<B>::load(&outputs.policy, env, None, None, Default::default()).unwrap();
        assert_eq!(restored.algorithm(), Algorithm::ActionSac);
        let result = evaluate_policy(&mut restored, 2, true).unwrap();
        assert!(result.mean_reward.is_finite());
    }

    #[test]
    fn test_checkpoints_can_carry_replay_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let config = small(dir.path(), Algorithm::Sac)
            .with_total_timesteps(30)
            .with_checkpoint_replay_buffer(true);
        let outputs = run_training::<B>(&config, Default::default()).unwrap();
        assert_eq!(outputs.checkpoints.len(), 1);

        let buffer_path = config.checkpoint_dir().join("toy_SAC_replay_buffer_25_steps");
        let buffer = crate::algorithms::sac::ReplayBuffer::load(&buffer_path).unwrap();
        assert_eq!(buffer.len(), 25);
    }

    #[test]
    fn test_resume_from_policy() {
        let dir = tempfile::tempdir().unwrap();
        let first = small(dir.path(), Algorithm::Sac);
        let outputs = run_training::<B>(&first, Default::default()).unwrap();

        let resumed = small(dir.path(), Algorithm::Sac)
            .with_name("resumed")
            .with_total_timesteps(10)
            .with_policy(Some(outputs.policy.clone()));
        let second = run_training::<B>(&resumed, Default::default()).unwrap();
        assert_eq!(second.num_timesteps, 10);

        // The resumed buffer holds the first run's transitions as well
        let env = make("URGym/CubesGrasp-v0", RenderMode::None).unwrap();
        let mut sac = Sac::<B>::load(&second.policy, env, None, None, Default::default()).unwrap();
        sac.load_replay_buffer(&second.replay_buffer).unwrap();
        assert_eq!(sac.buffer().len(), 70);
    }

    #[test]
    fn test_missing_resume_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = small(dir.path(), Algorithm::Sac).with_policy(Some(dir.path().join("nope_policy")));
        assert!(run_training::<B>(&config, Default::default()).is_err());
    }
}
