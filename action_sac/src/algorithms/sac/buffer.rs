//! Uniform replay buffer.
//!
//! Ring buffer of individual transitions stored column-wise in flat vectors.
//! Storage grows with use up to `capacity`, after which the oldest entries
//! are overwritten. Actions are kept in the policy's `[-1, 1]` space.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Batch
// ============================================================================

/// Sampled mini-batch as tensors.
#[derive(Debug, Clone)]
pub struct ReplayBatch<B: Backend> {
    /// `[batch, obs_dim]`
    pub observations: Tensor<B, 2>,
    /// `[batch, action_dim]`
    pub actions: Tensor<B, 2>,
    /// `[batch, obs_dim]`
    pub next_observations: Tensor<B, 2>,
    /// `[batch]`
    pub rewards: Tensor<B, 1>,
    /// `[batch]`, 1.0 for terminal transitions.
    pub dones: Tensor<B, 1>,
}

// ============================================================================
// Buffer
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayBuffer {
    capacity: usize,
    obs_dim: usize,
    action_dim: usize,
    pos: usize,
    full: bool,
    observations: Vec<f32>,
    actions: Vec<f32>,
    next_observations: Vec<f32>,
    rewards: Vec<f32>,
    dones: Vec<f32>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize, obs_dim: usize, action_dim: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            obs_dim,
            action_dim,
            pos: 0,
            full: false,
            observations: Vec::new(),
            actions: Vec::new(),
            next_observations: Vec::new(),
            rewards: Vec::new(),
            dones: Vec::new(),
        }
    }

    /// Store one transition, overwriting the oldest once full.
    pub fn add(
        &mut self,
        obs: &[f32],
        action: &[f32],
        reward: f32,
        next_obs: &[f32],
        done: bool,
    ) -> Result<()> {
        if obs.len() != self.obs_dim || next_obs.len() != self.obs_dim {
            return Err(Error::Config(format!(
                "observation has {} values, buffer expects {}",
                obs.len(),
                self.obs_dim
            )));
        }
        if action.len() != self.action_dim {
            return Err(Error::ActionDimMismatch {
                expected: self.action_dim,
                got: action.len(),
            });
        }

        let done = if done { 1.0 } else { 0.0 };
        if self.full {
            let i = self.pos;
            self.observations[i * self.obs_dim..(i + 1) * self.obs_dim].copy_from_slice(obs);
            self.actions[i * self.action_dim..(i + 1) * self.action_dim].copy_from_slice(action);
            self.next_observations[i * self.obs_dim..(i + 1) * self.obs_dim]
                .copy_from_slice(next_obs);
            self.rewards[i] = reward;
            self.dones[i] = done;
        } else {
            self.observations.extend_from_slice(obs);
            self.actions.extend_from_slice(action);
            self.next_observations.extend_from_slice(next_obs);
            self.rewards.push(reward);
            self.dones.push(done);
        }

        self.pos += 1;
        if self.pos == self.capacity {
            self.pos = 0;
            self.full = true;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        if self.full {
            self.capacity
        } else {
            self.pos
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Uniformly sample `batch_size` transitions with replacement.
    pub fn sample<B: Backend, R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
        device: &B::Device,
    ) -> Result<ReplayBatch<B>> {
        let len = self.len();
        if len == 0 {
            return Err(Error::EmptyBuffer {
                have: 0,
                need: batch_size.max(1),
            });
        }

        let mut obs = Vec::with_capacity(batch_size * self.obs_dim);
        let mut actions = Vec::with_capacity(batch_size * self.action_dim);
        let mut next_obs = Vec::with_capacity(batch_size * self.obs_dim);
        let mut rewards = Vec::with_capacity(batch_size);
        let mut dones = Vec::with_capacity(batch_size);

        for _ in 0..batch_size {
            let i = rng.gen_range(0..len);
            obs.extend_from_slice(&self.observations[i * self.obs_dim..(i + 1) * self.obs_dim]);
            actions.extend_from_slice(&self.actions[i * self.action_dim..(i + 1) * self.action_dim]);
            next_obs.extend_from_slice(
                &self.next_observations[i * self.obs_dim..(i + 1) * self.obs_dim],
            );
            rewards.push(self.rewards[i]);
            dones.push(self.dones[i]);
        }

        Ok(ReplayBatch {
            observations: Tensor::<B, 1>::from_floats(obs.as_slice(), device)
                .reshape([batch_size, self.obs_dim]),
            actions: Tensor::<B, 1>::from_floats(actions.as_slice(), device)
                .reshape([batch_size, self.action_dim]),
            next_observations: Tensor::<B, 1>::from_floats(next_obs.as_slice(), device)
                .reshape([batch_size, self.obs_dim]),
            rewards: Tensor::from_floats(rewards.as_slice(), device),
            dones: Tensor::from_floats(dones.as_slice(), device),
        })
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        log::debug!("Saved {} transitions to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a saved buffer, rejecting files whose columns disagree with
    /// the stored capacity and cursor.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let buffer: Self = bincode::deserialize_from(reader)?;
        buffer
            .check_consistent()
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Ok(buffer)
    }

    /// Load and check the stored dimensions against the expected ones.
    pub fn load_for(path: impl AsRef<Path>, obs_dim: usize, action_dim: usize) -> Result<Self> {
        let buffer = Self::load(path)?;
        if buffer.obs_dim != obs_dim || buffer.action_dim != action_dim {
            return Err(Error::Config(format!(
                "replay buffer holds ({}, {}) observation/action dims, expected ({obs_dim}, {action_dim})",
                buffer.obs_dim, buffer.action_dim
            )));
        }
        Ok(buffer)
    }

    /// Every column must hold exactly `len()` rows and the cursor must lie
    /// inside the ring, or `add` and `sample` would index out of bounds.
    fn check_consistent(&self) -> std::result::Result<(), String> {
        if self.capacity == 0 {
            return Err("replay buffer has zero capacity".into());
        }
        if self.pos >= self.capacity {
            return Err(format!(
                "replay buffer cursor {} is outside capacity {}",
                self.pos, self.capacity
            ));
        }
        let len = self.len();
        let columns = [
            ("observations", self.observations.len(), len * self.obs_dim),
            ("actions", self.actions.len(), len * self.action_dim),
            ("next_observations", self.next_observations.len(), len * self.obs_dim),
            ("rewards", self.rewards.len(), len),
            ("dones", self.dones.len(), len),
        ];
        for (name, got, expected) in columns {
            if got != expected {
                return Err(format!(
                    "replay buffer column {name} has {got} values, expected {expected} for {len} transitions"
                ));
            }
        }
        Ok(())
    }
}
