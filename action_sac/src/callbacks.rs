//! Hooks invoked after every environment step of [`Sac::learn`].

use std::path::PathBuf;

use burn::tensor::backend::AutodiffBackend;

use crate::algorithms::sac::Sac;
use crate::error::Result;

pub trait Callback<B: AutodiffBackend> {
    /// Return `false` to stop training early.
    fn on_step(&mut self, sac: &Sac<B>) -> Result<bool>;
}

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallback;

impl<B: AutodiffBackend> Callback<B> for NoCallback {
    fn on_step(&mut self, _sac: &Sac<B>) -> Result<bool> {
        Ok(true)
    }
}

/// Saves the policy every `save_freq` steps to
/// `<dir>/<prefix>_<timesteps>_steps`.
#[derive(Debug, Clone)]
pub struct CheckpointCallback {
    save_freq: usize,
    dir: PathBuf,
    prefix: String,
    save_replay_buffer: bool,
    saved: Vec<PathBuf>,
}

impl CheckpointCallback {
    pub fn new(save_freq: usize, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            save_freq: save_freq.max(1),
            dir: dir.into(),
            prefix: prefix.into(),
            save_replay_buffer: false,
            saved: Vec::new(),
        }
    }

    pub fn with_replay_buffer(mut self, save: bool) -> Self {
        self.save_replay_buffer = save;
        self
    }

    /// Stems written so far.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }
}

impl<B: AutodiffBackend> Callback<B> for CheckpointCallback {
    fn on_step(&mut self, sac: &Sac<B>) -> Result<bool> {
        let steps = sac.num_timesteps();
        if steps % self.save_freq != 0 {
            return Ok(true);
        }

        let stem = self.dir.join(format!("{}_{}_steps", self.prefix, steps));
        sac.save(&stem)?;
        if self.save_replay_buffer {
            let buffer = self
                .dir
                .join(format!("{}_replay_buffer_{}_steps", self.prefix, steps));
            sac.save_replay_buffer(&buffer)?;
        }
        log::info!("Saved checkpoint to {}", stem.display());
        self.saved.push(stem);
        Ok(true)
    }
}

/// Runs callbacks in order; stops as soon as one asks to.
pub struct CallbackList<B: AutodiffBackend> {
    callbacks: Vec<Box<dyn Callback<B>>>,
}

impl<B: AutodiffBackend> CallbackList<B> {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add<C: Callback<B> + 'static>(mut self, callback: C) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }
}

impl<B: AutodiffBackend> Default for CallbackList<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: AutodiffBackend> Callback<B> for CallbackList<B> {
    fn on_step(&mut self, sac: &Sac<B>) -> Result<bool> {
        for callback in &mut self.callbacks {
            if !callback.on_step(sac)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Stops training once `max_steps` environment steps are reached.
#[derive(Debug, Clone, Copy)]
pub struct StopAfter {
    pub max_steps: usize,
}

impl<B: AutodiffBackend> Callback<B> for StopAfter {
    fn on_step(&mut self, sac: &Sac<B>) -> Result<bool> {
        Ok(sac.num_timesteps() < self.max_steps)
    }
}
