//! Training statistics and logging backends.
//!
//! - [`TrainingMetrics`]: step/episode counters with a windowed episode mean
//! - [`ConsoleLogger`]: progress lines through the `log` facade
//! - `TensorBoardLogger`: scalar event files (`tensorboard` feature)
//! - [`MultiLogger`]: fan out to several backends

pub mod logger;
pub mod training_metrics;

pub use logger::{ConsoleLogger, MetricsLogger, MultiLogger, TrainingSnapshot};
pub use training_metrics::TrainingMetrics;

#[cfg(feature = "tensorboard")]
pub use logger::TensorBoardLogger;
