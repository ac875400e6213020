//! Soft Actor-Critic training loop.
//!
//! One environment, one process. Every `train_freq` environment steps the
//! agent runs `gradient_steps` updates on uniformly sampled replay batches:
//!
//! 1. entropy coefficient (automatic mode)
//! 2. critic ensemble on soft TD targets from the target critic
//! 3. actor against the freshly updated critic
//! 4. Polyak update of the target critic every `target_update_interval` steps

use std::path::Path;

use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use urgym::{BoxSpace, Env, EpisodeStats};

use super::actor::Actor;
use super::buffer::ReplayBuffer;
use super::config::{PolicyConfig, SacConfig};
use super::critic::Critic;
use super::distribution::{scale_action, StateDependentNoise};
use super::entropy::EntropyTuner;
use super::losses::{actor_loss, critic_loss, td_targets};
use super::policy::SacPolicy;
use crate::algorithms::Algorithm;
use crate::callbacks::Callback;
use crate::checkpoint::{load_policy, reconcile_policy_config, save_policy, PolicySnapshot};
use crate::core::TargetNetworkManager;
use crate::error::{Error, Result};
use crate::metrics::{ConsoleLogger, MetricsLogger, TrainingMetrics, TrainingSnapshot};

/// Losses of the most recent gradient step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainStats {
    pub actor_loss: Option<f32>,
    pub critic_loss: Option<f32>,
    pub ent_coef_loss: Option<f32>,
}

pub struct Sac<B: AutodiffBackend> {
    env: Box<dyn Env>,
    action_space: BoxSpace,
    obs_dim: usize,
    algorithm: Algorithm,
    config: SacConfig,
    policy_config: PolicyConfig,
    device: B::Device,

    policy: SacPolicy<B>,
    actor_optimizer: OptimizerAdaptor<Adam, Actor<B>, B>,
    critic_optimizer: OptimizerAdaptor<Adam, Critic<B>, B>,
    entropy: EntropyTuner,
    target_manager: TargetNetworkManager,
    buffer: ReplayBuffer,

    rng: StdRng,
    rollout_noise: Option<StateDependentNoise<B>>,
    reset_seed: Option<u64>,
    last_obs: Option<Vec<f32>>,
    episode_reward: f32,
    episode_length: usize,

    metrics: TrainingMetrics,
    last_stats: TrainStats,
    logger: Box<dyn MetricsLogger>,
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// First element of a tensor, NaN if it has none.
fn scalar<B: Backend>(t: Tensor<B, 1>) -> f32 {
    t.into_data().iter::<f32>().next().unwrap_or(f32::NAN)
}

impl<B: AutodiffBackend> Sac<B> {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Fresh agent on `env`. `config.use_sde` decides the exploration mode.
    pub fn new(
        env: Box<dyn Env>,
        algorithm: Algorithm,
        config: SacConfig,
        policy_config: PolicyConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        let policy_config = policy_config.with_use_sde(config.use_sde);
        let obs_dim = env.observation_space().dim();
        let action_dim = env.action_space().dim();

        let mut rng = seeded_rng(config.seed);
        let policy = SacPolicy::new(&policy_config, obs_dim, action_dim, &mut rng, &device)?;
        Self::assemble(env, algorithm, config, policy_config, policy, rng, device)
    }

    /// Restore a saved agent.
    ///
    /// The architecture (including the exploration mode) always comes from
    /// the snapshot; `requested` is only compared against it. Training
    /// hyperparameters come from `config` when given, otherwise from the
    /// snapshot.
    pub fn load(
        stem: impl AsRef<Path>,
        env: Box<dyn Env>,
        config: Option<SacConfig>,
        requested: Option<&PolicyConfig>,
        device: B::Device,
    ) -> Result<Self> {
        let stem = stem.as_ref();
        let (snapshot, policy) = load_policy::<B>(stem, &device)?;
        let algorithm = Algorithm::from_name(&snapshot.algo)?;
        let policy_config = reconcile_policy_config(&snapshot.policy, requested);

        let obs_dim = env.observation_space().dim();
        let action_dim = env.action_space().dim();
        if obs_dim != snapshot.obs_dim || action_dim != snapshot.action_dim {
            return Err(Error::Config(format!(
                "snapshot expects observation/action dims ({}, {}), environment {} has ({obs_dim}, {action_dim})",
                snapshot.obs_dim,
                snapshot.action_dim,
                env.id()
            )));
        }

        let mut config = config.unwrap_or_else(|| snapshot.sac.clone());
        if config.use_sde != policy_config.use_sde {
            log::warn!(
                "Ignoring use_sde={}; snapshot was trained with use_sde={}",
                config.use_sde,
                policy_config.use_sde
            );
            config.use_sde = policy_config.use_sde;
        }
        config.validate()?;

        log::info!("Loaded {} policy from {}", algorithm, stem.display());
        let rng = seeded_rng(config.seed);
        Self::assemble(env, algorithm, config, policy_config, policy, rng, device)
    }

    fn assemble(
        env: Box<dyn Env>,
        algorithm: Algorithm,
        config: SacConfig,
        policy_config: PolicyConfig,
        policy: SacPolicy<B>,
        rng: StdRng,
        device: B::Device,
    ) -> Result<Self> {
        let action_space = env.action_space();
        let obs_dim = env.observation_space().dim();
        let action_dim = action_space.dim();
        if !action_space.is_bounded() {
            log::warn!("{} has an unbounded action space; actions are passed unscaled", env.id());
        }

        let entropy = EntropyTuner::new(config.ent_coef, config.target_entropy_for(action_dim));
        let target_manager = TargetNetworkManager::new(config.tau, config.target_update_interval);
        let buffer = ReplayBuffer::new(config.buffer_size, obs_dim, action_dim);
        let metrics = TrainingMetrics::new(config.stats_window_size);

        Ok(Self {
            env,
            action_space,
            obs_dim,
            algorithm,
            reset_seed: config.seed,
            config,
            policy_config,
            device,
            policy,
            actor_optimizer: AdamConfig::new().init(),
            critic_optimizer: AdamConfig::new().init(),
            entropy,
            target_manager,
            buffer,
            rng,
            rollout_noise: None,
            last_obs: None,
            episode_reward: 0.0,
            episode_length: 0,
            metrics,
            last_stats: TrainStats::default(),
            logger: Box::new(ConsoleLogger::new()),
        })
    }

    pub fn set_logger(&mut self, logger: Box<dyn MetricsLogger>) {
        self.logger = logger;
    }

    // ========================================================================
    // Training
    // ========================================================================

    /// Run `total_timesteps` environment steps, training after each rollout
    /// once past `learning_starts`.
    pub fn learn(&mut self, total_timesteps: usize, callback: &mut dyn Callback<B>) -> Result<()> {
        self.metrics.reset_run();
        self.last_obs = Some(self.env.reset(self.reset_seed.take()));
        self.episode_reward = 0.0;
        self.episode_length = 0;

        log::info!(
            "Training {} on {} for {} steps",
            self.algorithm,
            self.env.id(),
            total_timesteps
        );

        while self.metrics.num_timesteps() < total_timesteps {
            if !self.collect_rollout(total_timesteps, callback)? {
                log::info!("Training stopped by callback at step {}", self.metrics.num_timesteps());
                break;
            }

            let steps = self.metrics.num_timesteps();
            if steps > 0 && steps > self.config.learning_starts {
                self.train(self.config.gradient_steps, self.config.batch_size)?;
            }
        }

        self.logger.flush();
        Ok(())
    }

    /// Step the environment `train_freq` times. Returns `false` when a
    /// callback asked to stop.
    fn collect_rollout(&mut self, total_timesteps: usize, callback: &mut dyn Callback<B>) -> Result<bool> {
        if self.config.use_sde {
            self.reset_noise();
        }

        for collected in 0..self.config.train_freq {
            if self.metrics.num_timesteps() >= total_timesteps {
                break;
            }
            if self.config.use_sde
                && self.config.sde_sample_freq > 0
                && collected as i64 % self.config.sde_sample_freq == 0
            {
                self.reset_noise();
            }

            let obs = match self.last_obs.take() {
                Some(obs) => obs,
                None => self.env.reset(self.reset_seed.take()),
            };
            let action = self.sample_action(&obs);
            let env_action = scale_action(&action, &self.action_space.low, &self.action_space.high);
            let step = self.env.step(&env_action)?;

            self.metrics.add_env_steps(1);
            self.episode_reward += step.reward;
            self.episode_length += 1;

            // Truncated episodes still bootstrap
            self.buffer
                .add(&obs, &action, step.reward, &step.observation, step.terminated)?;

            if step.done() {
                // A monitored env reports the episode itself
                let stats = step.info.episode.unwrap_or(EpisodeStats {
                    reward: self.episode_reward,
                    length: self.episode_length,
                });
                self.metrics.record_episode(stats);
                self.episode_reward = 0.0;
                self.episode_length = 0;
                if self.config.log_interval > 0
                    && self.metrics.episodes() % self.config.log_interval == 0
                {
                    self.dump_logs();
                }
                self.last_obs = Some(self.env.reset(None));
            } else {
                self.last_obs = Some(step.observation);
            }

            if !callback.on_step(self)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Warmup actions are uniform in `[-1, 1]`; later ones come from the
    /// stochastic policy.
    fn sample_action(&mut self, obs: &[f32]) -> Vec<f32> {
        let warmup = self.metrics.num_timesteps() < self.config.learning_starts
            && !(self.config.use_sde && self.config.use_sde_at_warmup);
        if warmup {
            let dim = self.action_space.dim();
            (0..dim).map(|_| self.rng.gen_range(-1.0f32..=1.0)).collect()
        } else {
            self.policy_action(obs, false)
        }
    }

    /// Action in `[-1, 1]` for a single observation.
    fn policy_action(&mut self, obs: &[f32], deterministic: bool) -> Vec<f32> {
        if !deterministic && self.policy.actor.uses_sde() && self.rollout_noise.is_none() {
            self.reset_noise();
        }
        let input = Tensor::<B, 1>::from_floats(obs, &self.device).reshape([1, obs.len()]);
        let actions = self
            .policy
            .act(input, deterministic, &mut self.rng, self.rollout_noise.as_ref());
        actions.detach().into_data().iter::<f32>().collect()
    }

    fn reset_noise(&mut self) {
        if self.policy.actor.uses_sde() {
            self.rollout_noise = Some(StateDependentNoise::sample(
                self.policy.actor.latent_dim(),
                self.policy.actor.action_dim(),
                &mut self.rng,
                &self.device,
            ));
        }
    }

    fn check_finite(&self, what: &'static str, value: f32) -> Result<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(Error::Divergence {
                what,
                step: self.metrics.num_timesteps(),
            })
        }
    }

    /// Run `gradient_steps` updates on batches of `batch_size`.
    pub fn train(&mut self, gradient_steps: usize, batch_size: usize) -> Result<()> {
        let lr = self.config.learning_rate;
        let gamma = self.config.gamma;

        for _ in 0..gradient_steps {
            let batch = self.buffer.sample::<B, _>(batch_size, &mut self.rng, &self.device)?;

            // Fresh exploration matrix per gradient step, shared by both samples
            let noise = if self.policy.actor.uses_sde() {
                Some(StateDependentNoise::sample(
                    self.policy.actor.latent_dim(),
                    self.policy.actor.action_dim(),
                    &mut self.rng,
                    &self.device,
                ))
            } else {
                None
            };

            let pi = self
                .policy
                .actor
                .forward(batch.observations.clone())
                .rsample(&mut self.rng, noise.as_ref());

            // Losses below use the coefficient from before its update
            let ent_coef = self.entropy.alpha();
            let mean_log_prob = scalar(pi.log_prob.clone().detach().mean());
            let ent_coef_loss = self.entropy.update(mean_log_prob, lr);

            // ----------------------------------------------------------------
            // Critic
            // ----------------------------------------------------------------
            let next = self
                .policy
                .actor
                .forward(batch.next_observations.clone())
                .rsample(&mut self.rng, noise.as_ref());
            let min_q_next = self
                .policy
                .critic_target
                .min_q(batch.next_observations, next.actions.detach());
            let targets = td_targets(
                batch.rewards,
                batch.dones,
                min_q_next,
                next.log_prob,
                gamma,
                ent_coef,
            )
            .detach();

            let q_values = self.policy.critic.forward(batch.observations.clone(), batch.actions);
            let loss = critic_loss(q_values, targets);
            let critic_loss_value = scalar(loss.clone());
            self.check_finite("critic loss", critic_loss_value)?;

            let grads = GradientsParams::from_grads(loss.backward(), &self.policy.critic);
            self.policy.critic = self
                .critic_optimizer
                .step(lr, self.policy.critic.clone(), grads);

            // ----------------------------------------------------------------
            // Actor
            // ----------------------------------------------------------------
            let min_q_pi = self.policy.critic.min_q(batch.observations, pi.actions);
            let loss = actor_loss(min_q_pi, pi.log_prob, ent_coef);
            let actor_loss_value = scalar(loss.clone());
            self.check_finite("actor loss", actor_loss_value)?;

            let grads = GradientsParams::from_grads(loss.backward(), &self.policy.actor);
            self.policy.actor = self
                .actor_optimizer
                .step(lr, self.policy.actor.clone(), grads);

            self.policy.critic_target = self
                .target_manager
                .maybe_update::<B, _>(&self.policy.critic, self.policy.critic_target.clone());

            self.metrics.increment_updates();
            self.last_stats = TrainStats {
                actor_loss: Some(actor_loss_value),
                critic_loss: Some(critic_loss_value),
                ent_coef_loss,
            };
        }

        log::debug!(
            "n_updates {} critic {:?} actor {:?} ent_coef {:.4}",
            self.metrics.n_updates(),
            self.last_stats.critic_loss,
            self.last_stats.actor_loss,
            self.entropy.alpha()
        );
        Ok(())
    }

    fn dump_logs(&mut self) {
        let snapshot = TrainingSnapshot::new(self.metrics.num_timesteps(), self.metrics.episodes())
            .with_episode_means(self.metrics.mean_reward(), self.metrics.mean_length())
            .with_losses(self.last_stats.actor_loss, self.last_stats.critic_loss)
            .with_entropy(self.entropy.alpha(), self.last_stats.ent_coef_loss)
            .with_updates(self.metrics.n_updates())
            .with_learning_rate(self.config.learning_rate);
        self.logger.log(&snapshot);
    }

    // ========================================================================
    // Inference
    // ========================================================================

    /// Action for one observation, scaled to the environment's bounds.
    pub fn predict(&mut self, obs: &[f32], deterministic: bool) -> Result<Vec<f32>> {
        if obs.len() != self.obs_dim {
            return Err(Error::Config(format!(
                "observation has {} values, policy expects {}",
                obs.len(),
                self.obs_dim
            )));
        }
        let action = self.policy_action(obs, deterministic);
        Ok(scale_action(&action, &self.action_space.low, &self.action_space.high))
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write `<stem>.json` and `<stem>.bin`.
    pub fn save(&self, stem: impl AsRef<Path>) -> Result<()> {
        let snapshot = PolicySnapshot {
            algo: self.algorithm.name().to_string(),
            obs_dim: self.obs_dim,
            action_dim: self.action_space.dim(),
            policy: self.policy_config.clone(),
            sac: self.config.clone(),
        };
        save_policy(stem.as_ref(), &snapshot, &self.policy)
    }

    pub fn save_replay_buffer(&self, path: impl AsRef<Path>) -> Result<()> {
        self.buffer.save(path)
    }

    pub fn load_replay_buffer(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.buffer = ReplayBuffer::load_for(path, self.obs_dim, self.action_space.dim())?;
        log::info!(
            "Loaded {} transitions from {}",
            self.buffer.len(),
            path.display()
        );
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn config(&self) -> &SacConfig {
        &self.config
    }

    pub fn policy_config(&self) -> &PolicyConfig {
        &self.policy_config
    }

    pub fn policy(&self) -> &SacPolicy<B> {
        &self.policy
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn ent_coef(&self) -> f32 {
        self.entropy.alpha()
    }

    pub fn last_stats(&self) -> TrainStats {
        self.last_stats
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn num_timesteps(&self) -> usize {
        self.metrics.num_timesteps()
    }

    pub fn n_updates(&self) -> usize {
        self.metrics.n_updates()
    }

    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn env(&self) -> &dyn Env {
        self.env.as_ref()
    }

    /// The training environment. Stepping it outside [`Sac::learn`] ends the
    /// current training episode.
    pub fn env_mut(&mut self) -> &mut dyn Env {
        self.last_obs = None;
        self.env.as_mut()
    }

    pub fn close(&mut self) {
        self.env.close();
    }
}
