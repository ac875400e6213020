//! Frame rendering for environments.
//!
//! Environments describe themselves as a [`Scene`](crate::Scene); [`rasterize`]
//! turns a scene into an RGB [`Frame`](crate::Frame) with plotters. Behind
//! feature flags, frames are recorded to GIF (`render-gif`) or shown in a
//! desktop window (`render-realtime`).

mod canvas;

pub use canvas::{rasterize, SceneCanvas};

#[cfg(feature = "render-gif")]
mod gif_recorder;

#[cfg(feature = "render-gif")]
pub use gif_recorder::GifRecorder;

#[cfg(feature = "render-realtime")]
mod realtime;

#[cfg(feature = "render-realtime")]
pub use realtime::RealtimeWindow;
