//! Training progress loggers.

use std::time::Instant;

/// Progress report emitted every `log_interval` episodes.
#[derive(Debug, Clone, Default)]
pub struct TrainingSnapshot {
    /// Environment steps so far.
    pub timesteps: usize,
    pub episodes: usize,
    /// Windowed mean return.
    pub ep_rew_mean: Option<f32>,
    pub ep_len_mean: Option<f32>,
    pub actor_loss: Option<f32>,
    pub critic_loss: Option<f32>,
    pub ent_coef: f32,
    pub ent_coef_loss: Option<f32>,
    pub n_updates: usize,
    pub learning_rate: f64,
}

impl TrainingSnapshot {
    pub fn new(timesteps: usize, episodes: usize) -> Self {
        Self {
            timesteps,
            episodes,
            ..Self::default()
        }
    }

    pub fn with_episode_means(mut self, reward: Option<f32>, length: Option<f32>) -> Self {
        self.ep_rew_mean = reward;
        self.ep_len_mean = length;
        self
    }

    pub fn with_losses(mut self, actor: Option<f32>, critic: Option<f32>) -> Self {
        self.actor_loss = actor;
        self.critic_loss = critic;
        self
    }

    pub fn with_entropy(mut self, ent_coef: f32, ent_coef_loss: Option<f32>) -> Self {
        self.ent_coef = ent_coef;
        self.ent_coef_loss = ent_coef_loss;
        self
    }

    pub fn with_updates(mut self, n_updates: usize) -> Self {
        self.n_updates = n_updates;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Named scalars, `None` values skipped.
    pub fn scalars(&self) -> Vec<(&'static str, f32)> {
        let mut out = vec![
            ("time/episodes", self.episodes as f32),
            ("train/ent_coef", self.ent_coef),
            ("train/n_updates", self.n_updates as f32),
            ("train/learning_rate", self.learning_rate as f32),
        ];
        let optional = [
            ("rollout/ep_rew_mean", self.ep_rew_mean),
            ("rollout/ep_len_mean", self.ep_len_mean),
            ("train/actor_loss", self.actor_loss),
            ("train/critic_loss", self.critic_loss),
            ("train/ent_coef_loss", self.ent_coef_loss),
        ];
        out.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
        out
    }
}

/// Sink for training progress.
pub trait MetricsLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot);

    fn flush(&mut self) {}
}

/// Progress lines through `log::info!`.
pub struct ConsoleLogger {
    start_time: Instant,
    start_timesteps: usize,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            start_timesteps: 0,
        }
    }

    /// Restart the FPS clock, counting from `timesteps`.
    pub fn reset_timer(&mut self, timesteps: usize) {
        self.start_time = Instant::now();
        self.start_timesteps = timesteps;
    }

    fn fps(&self, timesteps: usize) -> f32 {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        if elapsed > 0.0 {
            timesteps.saturating_sub(self.start_timesteps) as f32 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn fmt_opt(v: Option<f32>) -> String {
    v.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".into())
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        log::info!(
            "steps {:>8} | episodes {:>5} | ep_rew_mean {:>9} | ep_len_mean {:>6} | actor {:>9} | critic {:>9} | ent_coef {:.4} | updates {} | fps {:.0}",
            snapshot.timesteps,
            snapshot.episodes,
            fmt_opt(snapshot.ep_rew_mean),
            fmt_opt(snapshot.ep_len_mean),
            fmt_opt(snapshot.actor_loss),
            fmt_opt(snapshot.critic_loss),
            snapshot.ent_coef,
            snapshot.n_updates,
            self.fps(snapshot.timesteps),
        );
    }
}

/// Scalar event files readable by TensorBoard.
#[cfg(feature = "tensorboard")]
pub struct TensorBoardLogger {
    writer: tensorboard_rs::summary_writer::SummaryWriter,
}

#[cfg(feature = "tensorboard")]
impl TensorBoardLogger {
    pub fn new(log_dir: impl AsRef<std::path::Path>) -> Self {
        Self {
            writer: tensorboard_rs::summary_writer::SummaryWriter::new(log_dir.as_ref()),
        }
    }
}

#[cfg(feature = "tensorboard")]
impl MetricsLogger for TensorBoardLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for (name, value) in snapshot.scalars() {
            self.writer.add_scalar(name, value, snapshot.timesteps);
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}

/// Writes to every contained logger.
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
