//! Single-instance environment abstraction.
//!
//! Mirrors the Gymnasium contract: `reset` returns the first observation, `step`
//! returns the next observation with the reward and the two episode-end flags.
//! A `terminated` episode reached a terminal state of the task; a `truncated`
//! episode was cut short (time limit) and must still be bootstrapped.

use serde::{Deserialize, Serialize};

use crate::error::EnvResult;
use crate::space::BoxSpace;

// ============================================================================
// Step Result
// ============================================================================

/// Statistics of a finished episode, attached by the `Monitor` wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Undiscounted return.
    pub reward: f32,
    /// Number of steps.
    pub length: usize,
}

/// Auxiliary step information.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInfo {
    /// Whether the task goal was reached on this step.
    pub is_success: bool,
    /// Set on the final step of an episode when wrapped in a `Monitor`.
    pub episode: Option<EpisodeStats>,
}

/// Result of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

impl Step {
    /// Whether the episode is over for either reason.
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

// ============================================================================
// Rendering Types
// ============================================================================

/// How an environment presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// No rendering.
    #[default]
    None,
    /// `render()` returns RGB frames.
    RgbArray,
    /// Frames are pushed to a desktop window on every step.
    Human,
}

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Primitive shape of a top-down 2D scene.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle { center: (f32, f32), radius: f32, color: Rgb },
    Rect { min: (f32, f32), max: (f32, f32), color: Rgb },
    Segment { from: (f32, f32), to: (f32, f32), width: u32, color: Rgb },
}

/// Renderer-independent description of what an environment looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// World-space x range shown.
    pub x_range: (f32, f32),
    /// World-space y range shown.
    pub y_range: (f32, f32),
    pub background: Rgb,
    pub shapes: Vec<Shape>,
}

impl Scene {
    pub fn new(x_range: (f32, f32), y_range: (f32, f32)) -> Self {
        Self {
            x_range,
            y_range,
            background: Rgb(240, 240, 235),
            shapes: Vec::new(),
        }
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }
}

/// A rendered RGB frame, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

// ============================================================================
// Env Trait
// ============================================================================

/// A single (non-vectorized) continuous-control environment.
pub trait Env {
    /// Registry id of the environment.
    fn id(&self) -> &str;

    fn observation_space(&self) -> BoxSpace;

    fn action_space(&self) -> BoxSpace;

    /// Start a new episode. `Some(seed)` reseeds the environment RNG.
    fn reset(&mut self, seed: Option<u64>) -> Vec<f32>;

    /// Advance one step. The action must have `action_space().dim()` components;
    /// out-of-bounds components are clipped by the environment.
    fn step(&mut self, action: &[f32]) -> EnvResult<Step>;

    /// Renderer-independent description of the current state.
    fn scene(&self) -> Scene;

    /// Produce a frame when the render mode is `RgbArray`; `None` otherwise.
    fn render(&mut self) -> EnvResult<Option<Frame>> {
        Ok(None)
    }

    fn render_mode(&self) -> RenderMode {
        RenderMode::None
    }

    /// Release resources (windows, open files).
    fn close(&mut self) {}
}

impl<E: Env + ?Sized> Env for Box<E> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn observation_space(&self) -> BoxSpace {
        (**self).observation_space()
    }

    fn action_space(&self) -> BoxSpace {
        (**self).action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        (**self).reset(seed)
    }

    fn step(&mut self, action: &[f32]) -> EnvResult<Step> {
        (**self).step(action)
    }

    fn scene(&self) -> Scene {
        (**self).scene()
    }

    fn render(&mut self) -> EnvResult<Option<Frame>> {
        (**self).render()
    }

    fn render_mode(&self) -> RenderMode {
        (**self).render_mode()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Validate an action against a space before stepping.
pub(crate) fn check_action(space: &BoxSpace, action: &[f32]) -> EnvResult<Vec<f32>> {
    if action.len() != space.dim() {
        return Err(crate::EnvError::ActionShape {
            expected: space.dim(),
            got: action.len(),
        });
    }
    if action.iter().any(|a| !a.is_finite()) {
        return Err(crate::EnvError::NonFiniteAction);
    }
    Ok(space.clip(action))
}
