//! Best-trial summary.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use super::space::NET_ARCH_NODES;
use super::trial::TrialRecord;
use crate::error::Result;

pub const BEST_TRIAL_FILE: &str = "best_trial_sac.json";

/// Parameters of `trial` keyed in sorted order, with the hidden width folded
/// into `policy_kwargs.net_arch`.
pub fn best_trial_params(trial: &TrialRecord) -> BTreeMap<String, Value> {
    let mut params: BTreeMap<String, Value> = trial
        .params
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect();
    if let Some(nodes) = params.remove(NET_ARCH_NODES) {
        params.insert(
            "policy_kwargs".to_string(),
            serde_json::json!({ "net_arch": [nodes.clone(), nodes] }),
        );
    }
    params
}

/// Pretty JSON with four-space indentation.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Log the best trial and write its parameters to `<dir>/best_trial_sac.json`.
pub fn write_best_trial(dir: &Path, trial: &TrialRecord) -> Result<String> {
    let json = to_pretty_json(&best_trial_params(trial))?;
    log::info!("Best trial: {}", trial.number);
    log::info!("  Value: {}", trial.value.unwrap_or(f64::NEG_INFINITY));
    log::info!("  Params:\n{json}");

    fs::create_dir_all(dir)?;
    let path = dir.join(BEST_TRIAL_FILE);
    fs::write(&path, &json)?;
    log::info!("Wrote {}", path.display());
    Ok(json)
}
