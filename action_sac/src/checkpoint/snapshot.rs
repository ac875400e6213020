//! Architecture JSON plus burn record.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::algorithms::sac::{PolicyConfig, SacConfig, SacPolicy};
use crate::error::{Error, Result};

/// Everything needed to rebuild a policy before its parameters are loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub algo: String,
    pub obs_dim: usize,
    pub action_dim: usize,
    pub policy: PolicyConfig,
    pub sac: SacConfig,
}

/// `stem` with `suffix` appended to the file name. Environment ids contain
/// dots, so the stem's own "extension" is never replaced.
pub fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn snapshot_exists(stem: &Path) -> bool {
    with_suffix(stem, ".json").is_file() && with_suffix(stem, ".bin").is_file()
}

pub fn save_policy<B: Backend>(
    stem: &Path,
    snapshot: &PolicySnapshot,
    policy: &SacPolicy<B>,
) -> Result<()> {
    if let Some(parent) = stem.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(with_suffix(stem, ".json"))?);
    serde_json::to_writer_pretty(writer, snapshot)?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    policy
        .clone()
        .save_file(with_suffix(stem, ".bin"), &recorder)
        .map_err(|e| Error::Recorder(e.to_string()))?;

    log::debug!("Saved {} policy to {}", snapshot.algo, stem.display());
    Ok(())
}

/// Architecture and training configuration recorded at `stem`.
pub fn read_snapshot(stem: &Path) -> Result<PolicySnapshot> {
    let json = with_suffix(stem, ".json");
    let reader = BufReader::new(File::open(&json).map_err(|e| {
        Error::Config(format!("cannot open policy snapshot {}: {e}", json.display()))
    })?);
    Ok(serde_json::from_reader(reader)?)
}

/// Rebuild the architecture recorded at `stem`, then load its parameters.
pub fn load_policy<B: Backend>(
    stem: &Path,
    device: &B::Device,
) -> Result<(PolicySnapshot, SacPolicy<B>)> {
    let snapshot = read_snapshot(stem)?;

    // Initial values are overwritten by the record
    let template = SacPolicy::new(
        &snapshot.policy,
        snapshot.obs_dim,
        snapshot.action_dim,
        &mut StdRng::seed_from_u64(0),
        device,
    )?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let policy = template
        .load_file(with_suffix(stem, ".bin"), &recorder, device)
        .map_err(|e| Error::Recorder(e.to_string()))?;

    Ok((snapshot, policy))
}

/// The snapshot's architecture always wins; disagreements from the caller
/// are reported.
pub fn reconcile_policy_config(
    stored: &PolicyConfig,
    requested: Option<&PolicyConfig>,
) -> PolicyConfig {
    if let Some(requested) = requested {
        if requested.action_config != stored.action_config {
            log::warn!(
                "Ignoring requested action configuration {:?}; snapshot has {:?}",
                requested.action_config,
                stored.action_config
            );
        }
        if requested.net_arch != stored.net_arch {
            log::warn!(
                "Ignoring requested net_arch {:?}; snapshot has {:?}",
                requested.net_arch,
                stored.net_arch
            );
        }
        if requested.use_sde != stored.use_sde {
            log::warn!(
                "Ignoring requested use_sde={}; snapshot has use_sde={}",
                requested.use_sde,
                stored.use_sde
            );
        }
    }
    stored.clone()
}
