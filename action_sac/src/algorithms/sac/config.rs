//! SAC and policy configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nn::{ActionConfig, Activation};

// ============================================================================
// SAC Configuration
// ============================================================================

/// Entropy coefficient setting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntCoef {
    /// Learned, starting from `init`.
    Auto { init: f32 },
    /// Constant.
    Fixed(f32),
}

impl Default for EntCoef {
    fn default() -> Self {
        EntCoef::Auto { init: 1.0 }
    }
}

/// Hyperparameters of the off-policy training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SacConfig {
    /// Adam learning rate shared by actor, critic and entropy coefficient.
    pub learning_rate: f64,
    /// Replay buffer capacity in transitions.
    pub buffer_size: usize,
    /// Environment steps collected with uniform random actions before training.
    pub learning_starts: usize,
    pub batch_size: usize,
    /// Polyak coefficient for the target critic.
    pub tau: f32,
    pub gamma: f32,
    /// Environment steps per rollout.
    pub train_freq: usize,
    /// Gradient steps after each rollout.
    pub gradient_steps: usize,
    pub ent_coef: EntCoef,
    /// `None` means `-action_dim`.
    pub target_entropy: Option<f32>,
    /// Gradient steps between target updates.
    pub target_update_interval: usize,
    /// State-dependent exploration (gSDE).
    pub use_sde: bool,
    /// Env steps between gSDE noise resamples; non-positive means once per rollout.
    pub sde_sample_freq: i64,
    /// Use gSDE instead of uniform actions during warmup.
    pub use_sde_at_warmup: bool,
    pub seed: Option<u64>,
    /// Episodes between progress reports.
    pub log_interval: usize,
    /// Episode window for the reward/length means.
    pub stats_window_size: usize,
}

impl Default for SacConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            buffer_size: 1_000_000,
            learning_starts: 100,
            batch_size: 256,
            tau: 0.005,
            gamma: 0.99,
            train_freq: 1,
            gradient_steps: 1,
            ent_coef: EntCoef::default(),
            target_entropy: None,
            target_update_interval: 1,
            use_sde: false,
            sde_sample_freq: -1,
            use_sde_at_warmup: false,
            seed: None,
            log_interval: 4,
            stats_window_size: 100,
        }
    }
}

impl SacConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_learning_starts(mut self, steps: usize) -> Self {
        self.learning_starts = steps;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_train_freq(mut self, freq: usize) -> Self {
        self.train_freq = freq;
        self
    }

    pub fn with_gradient_steps(mut self, steps: usize) -> Self {
        self.gradient_steps = steps;
        self
    }

    pub fn with_ent_coef(mut self, ent_coef: EntCoef) -> Self {
        self.ent_coef = ent_coef;
        self
    }

    pub fn with_target_entropy(mut self, target: f32) -> Self {
        self.target_entropy = Some(target);
        self
    }

    pub fn with_target_update_interval(mut self, interval: usize) -> Self {
        self.target_update_interval = interval;
        self
    }

    pub fn with_use_sde(mut self, use_sde: bool) -> Self {
        self.use_sde = use_sde;
        self
    }

    pub fn with_sde_sample_freq(mut self, freq: i64) -> Self {
        self.sde_sample_freq = freq;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_log_interval(mut self, episodes: usize) -> Self {
        self.log_interval = episodes;
        self
    }

    /// Target entropy for an action space of `action_dim` dimensions.
    pub fn target_entropy_for(&self, action_dim: usize) -> f32 {
        self.target_entropy.unwrap_or(-(action_dim as f32))
    }

    pub fn validate(&self) -> Result<()> {
        let check = |ok: bool, msg: &str| {
            if ok {
                Ok(())
            } else {
                Err(Error::Config(msg.to_string()))
            }
        };
        check(self.learning_rate > 0.0, "learning_rate must be positive")?;
        check(self.buffer_size > 0, "buffer_size must be positive")?;
        check(self.batch_size > 0, "batch_size must be positive")?;
        check((0.0..=1.0).contains(&self.tau), "tau must lie in [0, 1]")?;
        check((0.0..=1.0).contains(&self.gamma), "gamma must lie in [0, 1]")?;
        check(self.train_freq > 0, "train_freq must be positive")?;
        check(self.gradient_steps > 0, "gradient_steps must be positive")?;
        check(self.target_update_interval > 0, "target_update_interval must be positive")?;
        match self.ent_coef {
            EntCoef::Auto { init } | EntCoef::Fixed(init) => {
                check(init > 0.0, "ent_coef must be positive")?
            }
        }
        Ok(())
    }
}

// ============================================================================
// Policy Configuration
// ============================================================================

/// Hidden layer widths of the actor latent path and of each Q-network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetArch {
    pub pi: Vec<usize>,
    pub qf: Vec<usize>,
}

impl NetArch {
    /// Same widths for actor and critics.
    pub fn shared(widths: Vec<usize>) -> Self {
        Self {
            pi: widths.clone(),
            qf: widths,
        }
    }
}

impl Default for NetArch {
    fn default() -> Self {
        Self::shared(vec![256, 256])
    }
}

/// Architecture of a [`SacPolicy`](super::SacPolicy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub net_arch: NetArch,
    pub activation: Activation,
    pub use_sde: bool,
    /// Initial value of the gSDE log-std matrix.
    pub log_std_init: f32,
    /// Bound of the mean head under gSDE; non-positive disables it.
    pub clip_mean: f32,
    pub n_critics: usize,
    /// When set, the actor's latent stage is a factored action network and
    /// the mean head is the identity.
    pub action_config: Option<ActionConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            net_arch: NetArch::default(),
            activation: Activation::Relu,
            use_sde: false,
            log_std_init: -3.0,
            clip_mean: 2.0,
            n_critics: 2,
            action_config: None,
        }
    }
}

impl PolicyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factored actor over `action_config`, critics of width `qf`.
    pub fn factored(action_config: ActionConfig, action_dim: usize, qf: Vec<usize>) -> Self {
        Self {
            net_arch: NetArch {
                pi: vec![action_dim],
                qf,
            },
            action_config: Some(action_config),
            ..Self::default()
        }
    }

    pub fn with_net_arch(mut self, net_arch: NetArch) -> Self {
        self.net_arch = net_arch;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_use_sde(mut self, use_sde: bool) -> Self {
        self.use_sde = use_sde;
        self
    }

    pub fn with_log_std_init(mut self, log_std_init: f32) -> Self {
        self.log_std_init = log_std_init;
        self
    }

    pub fn with_n_critics(mut self, n: usize) -> Self {
        self.n_critics = n;
        self
    }

    pub fn with_action_config(mut self, action_config: Option<ActionConfig>) -> Self {
        self.action_config = action_config;
        self
    }

    pub fn is_factored(&self) -> bool {
        self.action_config.is_some()
    }

    pub fn validate(&self, action_dim: usize) -> Result<()> {
        if self.n_critics == 0 {
            return Err(Error::Config("n_critics must be positive".into()));
        }
        if self.net_arch.qf.iter().chain(&self.net_arch.pi).any(|w| *w == 0) {
            return Err(Error::Config("net_arch widths must be positive".into()));
        }
        if let Some(action_config) = &self.action_config {
            action_config.validate(action_dim)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::ActionGroup;

    #[test]
    fn test_sac_defaults() {
        let config = SacConfig::default();
        assert_eq!(config.learning_rate, 3e-4);
        assert_eq!(config.buffer_size, 1_000_000);
        assert_eq!(config.learning_starts, 100);
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.ent_coef, EntCoef::Auto { init: 1.0 });
        assert_eq!(config.target_entropy_for(8), -8.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sac_validation() {
        assert!(SacConfig::new().with_batch_size(0).validate().is_err());
        assert!(SacConfig::new().with_gamma(1.5).validate().is_err());
        assert!(SacConfig::new().with_ent_coef(EntCoef::Fixed(0.0)).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SacConfig = serde_json::from_str(r#"{"gamma": 0.9, "use_sde": true}"#).unwrap();
        assert_eq!(config.gamma, 0.9);
        assert!(config.use_sde);
        assert_eq!(config.tau, 0.005);
    }

    #[test]
    fn test_factored_policy_config() {
        let action = ActionConfig::new(
            64,
            vec![ActionGroup::new(7, Activation::Tanh), ActionGroup::new(1, Activation::Tanh)],
        );
        let config = PolicyConfig::factored(action, 8, vec![64, 64]);
        assert!(config.is_factored());
        assert_eq!(config.net_arch.pi, vec![8]);
        assert!(config.validate(8).is_ok());
        assert!(matches!(
            config.validate(9),
            Err(Error::ActionDimMismatch { expected: 9, got: 8 })
        ));
    }
}
