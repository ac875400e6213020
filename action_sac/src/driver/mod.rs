//! Experiment entry points shared by the command-line tools.
//!
//! - [`train`]: one training run with checkpoints and final snapshots
//! - [`search`]: hyperparameter search over a persistent study

pub mod search;
pub mod train;

use std::path::{Path, PathBuf};

pub use search::{run_search, SacTrialRunner, SearchConfig, SearchOutcome, TrialRunner};
pub use train::{run_training, TrainConfig, TrainOutputs, TrainPhase};

const POLICY_SUFFIX: &str = "_policy";
const REPLAY_BUFFER_SUFFIX: &str = "_replay_buffer";

/// Replay buffer saved next to a policy: `<dir>/<run>_policy` pairs with
/// `<dir>/<run>_replay_buffer`. A trailing `.json`/`.bin` on the policy path
/// is ignored.
pub fn replay_buffer_path(policy_stem: &Path) -> PathBuf {
    let name = policy_stem
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name
        .strip_suffix(".json")
        .or_else(|| name.strip_suffix(".bin"))
        .unwrap_or(&name);
    let run = name.strip_suffix(POLICY_SUFFIX).unwrap_or(name);
    policy_stem.with_file_name(format!("{run}{REPLAY_BUFFER_SUFFIX}"))
}

/// Policy stem with any `.json`/`.bin` extension removed.
pub fn policy_stem(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") | Some("bin") => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_buffer_pairs_with_policy() {
        assert_eq!(
            replay_buffer_path(Path::new("policies/model_ActionSAC_policy")),
            PathBuf::from("policies/model_ActionSAC_replay_buffer")
        );
        assert_eq!(
            replay_buffer_path(Path::new("out/run_policy.json")),
            PathBuf::from("out/run_replay_buffer")
        );
        // Without the suffix the whole name is the run
        assert_eq!(
            replay_buffer_path(Path::new("trial_3")),
            PathBuf::from("trial_3_replay_buffer")
        );
    }

    #[test]
    fn test_policy_stem_strips_snapshot_extensions() {
        assert_eq!(policy_stem(Path::new("a/b_policy.bin")), PathBuf::from("a/b_policy"));
        assert_eq!(policy_stem(Path::new("a/Pendulum-v1.x")), PathBuf::from("a/Pendulum-v1.x"));
    }
}
