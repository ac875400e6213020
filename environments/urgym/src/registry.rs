//! Environment registry.
//!
//! Environments are created by id through a closed table; each entry fixes the
//! episode time limit and tells callers how the action vector is organized.

use serde::{Deserialize, Serialize};

use crate::env::{Env, RenderMode};
use crate::envs::{Control, CubesEnv, Pendulum, Task};
use crate::error::{EnvError, EnvResult};
use crate::wrappers::{Rendered, TimeLimit};

/// Layout of an environment's action vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionLayout {
    /// A single homogeneous block (e.g. torques).
    Torque,
    /// 6 joint deltas followed by a gripper closure in `[0, 1]`.
    JointGripper,
    /// 7 end-effector pose components followed by a gripper command.
    PoseGripper,
}

/// Registry entry.
#[derive(Debug, Clone, Copy)]
pub struct EnvSpec {
    pub id: &'static str,
    pub max_episode_steps: usize,
    pub action_layout: ActionLayout,
    entry: fn() -> Box<dyn Env>,
}

const REGISTRY: &[EnvSpec] = &[
    EnvSpec {
        id: Pendulum::ID,
        max_episode_steps: 200,
        action_layout: ActionLayout::Torque,
        entry: || Box::new(Pendulum::new()),
    },
    EnvSpec {
        id: "URGym/CubesGrasp-v0",
        max_episode_steps: 20,
        action_layout: ActionLayout::JointGripper,
        entry: || Box::new(CubesEnv::new("URGym/CubesGrasp-v0", Task::Grasp, Control::Joint)),
    },
    EnvSpec {
        id: "URGym/CubesGrasp-v1",
        max_episode_steps: 20,
        action_layout: ActionLayout::PoseGripper,
        entry: || Box::new(CubesEnv::new("URGym/CubesGrasp-v1", Task::Grasp, Control::EndEffector)),
    },
    EnvSpec {
        id: "URGym/CubesPush-v0",
        max_episode_steps: 50,
        action_layout: ActionLayout::PoseGripper,
        entry: || Box::new(CubesEnv::new("URGym/CubesPush-v0", Task::Push, Control::EndEffector)),
    },
];

/// Ids of every registered environment.
pub fn registered_ids() -> Vec<&'static str> {
    REGISTRY.iter().map(|s| s.id).collect()
}

/// Look up a registry entry.
pub fn spec(id: &str) -> EnvResult<&'static EnvSpec> {
    REGISTRY
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| EnvError::UnknownEnv {
            id: id.to_string(),
            registered: registered_ids().join(", "),
        })
}

/// Create an environment by id, wrapped in its time limit and render mode.
pub fn make(id: &str, render_mode: RenderMode) -> EnvResult<Box<dyn Env>> {
    let spec = spec(id)?;
    log::debug!("Making {} (max {} steps, {:?})", spec.id, spec.max_episode_steps, render_mode);
    let base = (spec.entry)();
    Ok(Box::new(TimeLimit::new(
        Rendered::new(base, render_mode),
        spec.max_episode_steps,
    )))
}
