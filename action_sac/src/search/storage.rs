//! Study persistence on an embedded `sled` database.
//!
//! Layout: the `studies` tree maps a study name to its [`StudyMeta`]; each
//! study keeps its trials in a tree `trials:<name>` keyed by the big-endian
//! trial number, so iteration yields trials in order.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::space::SearchSpace;
use super::trial::TrialRecord;
use crate::error::{Error, Result};

const STUDIES_TREE: &str = "studies";

/// Study header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMeta {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub space: SearchSpace,
}

#[derive(Debug, Clone)]
pub struct StudyStorage {
    db: sled::Db,
}

fn trials_tree_name(study: &str) -> String {
    format!("trials:{study}")
}

impl StudyStorage {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory database for tests.
    pub fn memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn studies(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree(STUDIES_TREE)?)
    }

    fn trials_tree(&self, study: &str) -> Result<sled::Tree> {
        Ok(self.db.open_tree(trials_tree_name(study))?)
    }

    pub fn study_exists(&self, name: &str) -> Result<bool> {
        Ok(self.studies()?.contains_key(name.as_bytes())?)
    }

    /// Create a study. An existing one is returned as is when
    /// `load_if_exists`, otherwise it is an error.
    pub fn create_study(
        &self,
        name: &str,
        space: &SearchSpace,
        load_if_exists: bool,
    ) -> Result<StudyMeta> {
        if self.study_exists(name)? {
            if load_if_exists {
                log::info!("Using an existing study with name '{name}'");
                return self.load_study(name);
            }
            return Err(Error::Config(format!("study '{name}' already exists")));
        }

        let meta = StudyMeta {
            name: name.to_string(),
            created_at: Utc::now(),
            space: space.clone(),
        };
        self.studies()?
            .insert(name.as_bytes(), bincode::serialize(&meta)?)?;
        self.db.flush()?;
        log::info!("Created study '{name}'");
        Ok(meta)
    }

    pub fn load_study(&self, name: &str) -> Result<StudyMeta> {
        match self.studies()?.get(name.as_bytes())? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Err(Error::StudyNotFound(name.to_string())),
        }
    }

    /// Remove a study and its trials. Returns whether it existed.
    pub fn delete_study(&self, name: &str) -> Result<bool> {
        let existed = self.studies()?.remove(name.as_bytes())?.is_some();
        self.db.drop_tree(trials_tree_name(name))?;
        self.db.flush()?;
        if existed {
            log::info!("Deleted study '{name}'");
        }
        Ok(existed)
    }

    pub fn study_names(&self) -> Result<Vec<String>> {
        self.studies()?
            .iter()
            .keys()
            .map(|key| -> Result<String> { Ok(String::from_utf8_lossy(&key?).into_owned()) })
            .collect()
    }

    /// Insert or replace a trial.
    pub fn put_trial(&self, study: &str, trial: &TrialRecord) -> Result<()> {
        if !self.study_exists(study)? {
            return Err(Error::StudyNotFound(study.to_string()));
        }
        self.trials_tree(study)?
            .insert(trial.number.to_be_bytes(), bincode::serialize(trial)?)?;
        self.db.flush()?;
        Ok(())
    }

    /// All trials of a study, ordered by number.
    pub fn trials(&self, study: &str) -> Result<Vec<TrialRecord>> {
        if !self.study_exists(study)? {
            return Err(Error::StudyNotFound(study.to_string()));
        }
        self.trials_tree(study)?
            .iter()
            .values()
            .map(|bytes| -> Result<TrialRecord> { Ok(bincode::deserialize(&bytes?)?) })
            .collect()
    }

    /// Number the next trial would get.
    pub fn next_trial_number(&self, study: &str) -> Result<u64> {
        match self.trials_tree(study)?.last()? {
            Some((key, _)) => {
                let bytes: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| Error::Config(format!("corrupt trial key in study '{study}'")))?;
                Ok(u64::from_be_bytes(bytes) + 1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::space::Params;

    #[test]
    fn test_create_load_and_conflict() {
        let storage = StudyStorage::memory().unwrap();
        let space = SearchSpace::default();
        let meta = storage.create_study("pendulum", &space, false).unwrap();
        assert_eq!(meta.space, space);

        assert!(storage.create_study("pendulum", &space, false).is_err());
        let loaded = storage.create_study("pendulum", &space, true).unwrap();
        assert_eq!(loaded, meta);
        assert_eq!(storage.study_names().unwrap(), vec!["pendulum".to_string()]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let storage = StudyStorage::memory().unwrap();
        storage.create_study("s", &SearchSpace::default(), false).unwrap();
        storage.put_trial("s", &TrialRecord::running(0, Params::new())).unwrap();

        assert!(storage.delete_study("s").unwrap());
        assert!(!storage.delete_study("s").unwrap());
        assert!(matches!(storage.load_study("s"), Err(Error::StudyNotFound(_))));

        // A recreated study starts empty
        storage.create_study("s", &SearchSpace::default(), false).unwrap();
        assert!(storage.trials("s").unwrap().is_empty());
        assert_eq!(storage.next_trial_number("s").unwrap(), 0);
    }

    #[test]
    fn test_trials_are_ordered_and_replaced() {
        let storage = StudyStorage::memory().unwrap();
        storage.create_study("s", &SearchSpace::default(), false).unwrap();
        for n in [2u64, 0, 1, 256] {
            storage.put_trial("s", &TrialRecord::running(n, Params::new())).unwrap();
        }
        let done = TrialRecord::running(1, Params::new()).complete(3.5);
        storage.put_trial("s", &done).unwrap();

        let trials = storage.trials("s").unwrap();
        let numbers: Vec<u64> = trials.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 256]);
        assert_eq!(trials[1].value, Some(3.5));
        assert_eq!(storage.next_trial_number("s").unwrap(), 257);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("optuna.db");
        {
            let storage = StudyStorage::open(&path).unwrap();
            storage.create_study("s", &SearchSpace::default(), false).unwrap();
            storage
                .put_trial("s", &TrialRecord::running(0, Params::new()).fail("nan"))
                .unwrap();
        }
        let storage = StudyStorage::open(&path).unwrap();
        let trials = storage.trials("s").unwrap();
        assert_eq!(trials.len(), 1);
        assert_eq!(trials[0].value, Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_unknown_study() {
        let storage = StudyStorage::memory().unwrap();
        assert!(matches!(storage.trials("nope"), Err(Error::StudyNotFound(_))));
        assert!(storage.put_trial("nope", &TrialRecord::running(0, Params::new())).is_err());
    }
}
