//! Hyperparameter search over SAC training runs.
//!
//! Each trial samples a configuration, trains a fresh (or warm-started) agent
//! for `n_steps`, saves it to `models/trial_<n>` and reports the mean return
//! of `n_eval_episodes` deterministic episodes. A trial that errors or panics
//! is scored negative infinity and the search moves on.
//!
//! ```text
//! <results_dir>/optuna.db                 study storage
//! <results_dir>/<study>/models/trial_<n>  per-trial policies
//! <results_dir>/<study>/*.html            visualizations
//! <results_dir>/<study>/best_trial_sac.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use urgym::{make, spec, RenderMode};

use super::{policy_stem, replay_buffer_path};
use crate::algorithms::{Algorithm, Sac, SacConfig};
use crate::callbacks::NoCallback;
use crate::checkpoint::read_snapshot;
use crate::error::Result;
use crate::evaluation::evaluate_policy;
use crate::search::{
    write_best_trial, write_study_plots, SampledHyperparams, Sampler, SearchSpace, Study,
    StudyStorage, TrialRecord,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub env_id: String,
    pub n_trials: usize,
    /// Environment steps per trial.
    pub n_steps: usize,
    /// Defaults to `<env_id>_sac`.
    pub study_name: Option<String>,
    /// Append to the stored study instead of starting over.
    pub continue_study: bool,
    /// Skip optimization; only report the stored best trial.
    pub best_only: bool,
    pub algorithm: Algorithm,
    /// Warm-start every trial from this policy and its replay buffer.
    pub policy: Option<PathBuf>,
    pub results_dir: PathBuf,
    pub seed: u64,
    pub n_eval_episodes: usize,
    pub space: SearchSpace,
    /// Training settings the sampled values are applied on top of. A
    /// warm-started search uses the snapshot's settings instead.
    pub base: SacConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            env_id: "URGym/CubesGrasp-v1".to_string(),
            n_trials: 50,
            n_steps: 50_000,
            study_name: None,
            continue_study: false,
            best_only: false,
            algorithm: Algorithm::Sac,
            policy: None,
            results_dir: PathBuf::from("optuna_results"),
            seed: 42,
            n_eval_episodes: 10,
            space: SearchSpace::default(),
            base: SacConfig::new().with_learning_starts(1_000).with_log_interval(50),
        }
    }
}

impl SearchConfig {
    pub fn new(env_id: impl Into<String>) -> Self {
        Self {
            env_id: env_id.into(),
            ..Self::default()
        }
    }

    pub fn with_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    pub fn with_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    pub fn with_study_name(mut self, name: Option<String>) -> Self {
        self.study_name = name;
        self
    }

    pub fn with_continue(mut self, continue_study: bool) -> Self {
        self.continue_study = continue_study;
        self
    }

    pub fn with_best_only(mut self, best_only: bool) -> Self {
        self.best_only = best_only;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_policy(mut self, policy: Option<PathBuf>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn with_eval_episodes(mut self, n: usize) -> Self {
        self.n_eval_episodes = n;
        self
    }

    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.space = space;
        self
    }

    pub fn with_base(mut self, base: SacConfig) -> Self {
        self.base = base;
        self
    }

    pub fn study_name(&self) -> String {
        self.study_name
            .clone()
            .unwrap_or_else(|| format!("{}_sac", self.env_id))
    }

    pub fn storage_path(&self) -> PathBuf {
        self.results_dir.join("optuna.db")
    }

    pub fn study_dir(&self) -> PathBuf {
        self.results_dir.join(self.study_name())
    }

    pub fn trial_model_path(&self, number: u64) -> PathBuf {
        self.study_dir().join("models").join(format!("trial_{number}"))
    }
}

// ============================================================================
// Trial Runner
// ============================================================================

/// Trains and scores one sampled configuration.
pub trait TrialRunner {
    /// Objective of `trial`; errors are scored negative infinity by the study.
    fn run(&mut self, trial: &TrialRecord, hp: &SampledHyperparams, model_path: &Path) -> Result<f64>;
}

/// Trains a SAC agent and returns its mean evaluation return.
pub struct SacTrialRunner<B: AutodiffBackend> {
    config: SearchConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> SacTrialRunner<B> {
    pub fn new(config: &SearchConfig, device: B::Device) -> Self {
        Self {
            config: config.clone(),
            device,
        }
    }

    fn build(&self, trial: &TrialRecord, hp: &SampledHyperparams) -> Result<Sac<B>> {
        let env = make(&self.config.env_id, RenderMode::None)?;
        let action_dim = env.action_space().dim();
        let layout = spec(&self.config.env_id)?.action_layout;
        let policy_config = self
            .config
            .algorithm
            .policy_config(layout, action_dim, hp.net_arch_nodes);
        let seed = self.config.seed.wrapping_add(trial.number);

        match &self.config.policy {
            Some(path) => {
                // Architecture, exploration mode and unsampled settings stay as stored
                let stem = policy_stem(path);
                let stored = read_snapshot(&stem)?.sac;
                let sac_config = hp.apply(stored.with_seed(seed));
                let mut sac = Sac::<B>::load(
                    &stem,
                    env,
                    Some(sac_config),
                    Some(&policy_config),
                    self.device.clone(),
                )?;
                sac.load_replay_buffer(replay_buffer_path(&stem))?;
                Ok(sac)
            }
            None => Sac::<B>::new(
                env,
                self.config.algorithm,
                hp.apply(self.config.base.clone().with_seed(seed)),
                policy_config,
                self.device.clone(),
            ),
        }
    }
}

impl<B: AutodiffBackend> TrialRunner for SacTrialRunner<B> {
    fn run(&mut self, trial: &TrialRecord, hp: &SampledHyperparams, model_path: &Path) -> Result<f64> {
        let params = trial
            .params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        log::info!("Trial {} with hyperparameters: {}", trial.number, params);

        let mut sac = self.build(trial, hp)?;
        let result = sac
            .learn(self.config.n_steps, &mut NoCallback)
            .and_then(|_| sac.save(model_path))
            .and_then(|_| evaluate_policy(&mut sac, self.config.n_eval_episodes, true));
        sac.close();
        Ok(result?.mean_reward)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Result of a search invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub study_name: String,
    pub study_dir: PathBuf,
    /// Every trial of the study, earlier invocations included.
    pub trials: Vec<TrialRecord>,
    pub best: TrialRecord,
    /// Contents of `best_trial_sac.json`.
    pub best_json: String,
}

fn prepare_study_dir(dir: &Path, delete_existing: bool) -> Result<()> {
    if delete_existing && dir.exists() {
        fs::remove_dir_all(dir)?;
        log::info!("Removed existing study directory and all its contents: {}", dir.display());
    }
    fs::create_dir_all(dir.join("models"))?;
    log::info!("Using study directory: {}", dir.display());
    Ok(())
}

/// Run the configured number of trials (unless `best_only`), then report and
/// save the best trial.
pub fn run_search<R: TrialRunner>(config: &SearchConfig, runner: &mut R) -> Result<SearchOutcome> {
    let name = config.study_name();
    let study_dir = config.study_dir();
    let storage = StudyStorage::open(config.storage_path())?;

    if !config.best_only {
        prepare_study_dir(&study_dir, !config.continue_study)?;
        if !config.continue_study {
            storage.delete_study(&name)?;
        }

        // Continued studies must not replay the draws of earlier invocations
        let offset = storage.next_trial_number(&name)?;
        let sampler = Sampler::new(Some(config.seed.wrapping_add(offset)));
        let mut study = Study::create(
            storage.clone(),
            &name,
            config.space.clone(),
            config.continue_study,
            sampler,
        )?;

        log::info!("Searching for the best hyperparameters in {} trials...", config.n_trials);
        study.optimize(config.n_trials, |trial| {
            let hp = SampledHyperparams::from_params(&trial.params)?;
            runner.run(trial, &hp, &config.trial_model_path(trial.number))
        })?;

        write_study_plots(&study_dir, &name, study.space(), &study.trials()?)?;
    }

    let study = Study::load(storage, &name, Sampler::new(None))?;
    let best = study.best_trial()?;
    let best_json = write_best_trial(&study_dir, &best)?;

    Ok(SearchOutcome {
        study_name: name,
        study_dir,
        trials: study.trials()?,
        best,
        best_json,
    })
}
