//! # urgym
//!
//! Single-instance continuous-control environments for manipulation experiments.
//!
//! Environments are created by id through [`make`], which applies the registered
//! episode time limit and the requested [`RenderMode`]:
//!
//! ```rust,ignore
//! use urgym::{make, Env, RenderMode};
//!
//! let mut env = make("URGym/CubesGrasp-v1", RenderMode::None)?;
//! let obs = env.reset(Some(42));
//! let step = env.step(&vec![0.0; env.action_space().dim()])?;
//! ```
//!
//! ## Features
//!
//! - `render` (default): rasterize scenes with plotters
//! - `render-gif` (default): `RecordVideo` wrapper writing GIFs
//! - `render-realtime`: desktop window for `RenderMode::Human`

pub mod env;
pub mod envs;
pub mod error;
pub mod registry;
pub mod space;
pub mod wrappers;

#[cfg(feature = "render")]
pub mod render;

pub use env::{Env, EpisodeStats, Frame, RenderMode, Rgb, Scene, Shape, Step, StepInfo};
pub use error::{EnvError, EnvResult};
pub use registry::{make, registered_ids, spec, ActionLayout, EnvSpec};
pub use space::BoxSpace;
pub use wrappers::{Monitor, Rendered, TimeLimit};

#[cfg(feature = "render-gif")]
pub use wrappers::RecordVideo;
