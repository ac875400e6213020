//! Hyperparameter search.
//!
//! A [`Study`] asks its [`Sampler`] for parameters, persists every
//! [`TrialRecord`] in a [`StudyStorage`] and maximizes the reported
//! objective. [`plots`] and [`best`] turn a finished study into artifacts.

pub mod best;
pub mod plots;
mod sampler;
mod space;
mod storage;
mod study;
mod trial;

pub use best::{best_trial_params, write_best_trial, BEST_TRIAL_FILE};
pub use plots::{param_importances, write_study_plots};
pub use sampler::Sampler;
pub use space::{
    ParamSpec, ParamValue, Params, SampledHyperparams, SearchSpace, BATCH_SIZE, GAMMA,
    GRADIENT_STEPS, LEARNING_RATE, NET_ARCH_NODES, TAU, USE_SDE,
};
pub use storage::{StudyMeta, StudyStorage};
pub use study::Study;
pub use trial::{best_of, TrialRecord, TrialState};
