//! Named, persistent hyperparameter study that maximizes its objective.

use std::panic::{self, AssertUnwindSafe};

use super::sampler::Sampler;
use super::space::SearchSpace;
use super::storage::{StudyMeta, StudyStorage};
use super::trial::{best_of, TrialRecord};
use crate::error::{Error, Result};

pub struct Study {
    meta: StudyMeta,
    storage: StudyStorage,
    sampler: Sampler,
}

/// Text of a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Study {
    /// Create a study, or attach to the stored one when `load_if_exists`.
    pub fn create(
        storage: StudyStorage,
        name: &str,
        space: SearchSpace,
        load_if_exists: bool,
        sampler: Sampler,
    ) -> Result<Self> {
        space.validate()?;
        let meta = storage.create_study(name, &space, load_if_exists)?;
        if meta.space != space {
            log::warn!("Study '{name}' was created with a different search space; keeping the stored one");
        }
        Ok(Self {
            meta,
            storage,
            sampler,
        })
    }

    pub fn load(storage: StudyStorage, name: &str, sampler: Sampler) -> Result<Self> {
        let meta = storage.load_study(name)?;
        Ok(Self {
            meta,
            storage,
            sampler,
        })
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn space(&self) -> &SearchSpace {
        &self.meta.space
    }

    pub fn trials(&self) -> Result<Vec<TrialRecord>> {
        self.storage.trials(&self.meta.name)
    }

    /// Start a trial: sample parameters and persist it as running.
    pub fn ask(&mut self) -> Result<TrialRecord> {
        let history = self.trials()?;
        let number = self.storage.next_trial_number(&self.meta.name)?;
        let params = self.sampler.suggest(&self.meta.space, &history);
        let trial = TrialRecord::running(number, params);
        self.storage.put_trial(&self.meta.name, &trial)?;
        Ok(trial)
    }

    /// Finish a trial with its objective, or with the error that ended it.
    pub fn tell(&mut self, trial: TrialRecord, outcome: Result<f64>) -> Result<TrialRecord> {
        let finished = match outcome {
            Ok(value) if value.is_nan() => trial.fail("objective is NaN"),
            Ok(value) => trial.complete(value),
            Err(err) => trial.fail(err.to_string()),
        };
        self.storage.put_trial(&self.meta.name, &finished)?;
        Ok(finished)
    }

    /// Run `n_trials` trials one after another.
    ///
    /// Errors and panics raised by `objective` end only their own trial,
    /// which is scored negative infinity. Storage errors abort the study.
    pub fn optimize<F>(&mut self, n_trials: usize, mut objective: F) -> Result<Vec<TrialRecord>>
    where
        F: FnMut(&TrialRecord) -> Result<f64>,
    {
        let mut finished = Vec::with_capacity(n_trials);
        for _ in 0..n_trials {
            let trial = self.ask()?;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| objective(&trial)))
                .unwrap_or_else(|payload| Err(Error::TrialPanic(panic_message(payload.as_ref()))));

            let record = self.tell(trial, outcome)?;
            match &record.failure {
                Some(reason) => log::warn!("Trial {} failed: {}", record.number, reason),
                None => log::info!(
                    "Trial {} finished with value {:.4}",
                    record.number,
                    record.value.unwrap_or(f64::NEG_INFINITY)
                ),
            }
            if let Some(best) = best_of(&self.trials()?) {
                log::info!(
                    "Best is trial {} with value {:.4}",
                    best.number,
                    best.value.unwrap_or(f64::NEG_INFINITY)
                );
            }
            finished.push(record);
        }
        Ok(finished)
    }

    /// Finished trial with the highest objective.
    pub fn best_trial(&self) -> Result<TrialRecord> {
        best_of(&self.trials()?)
            .cloned()
            .ok_or_else(|| Error::NoCompletedTrials(self.meta.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::space::{ParamSpec, GAMMA};
    use crate::search::trial::TrialState;

    fn study(name: &str, storage: &StudyStorage) -> Study {
        Study::create(storage.clone(), name, SearchSpace::default(), true, Sampler::new(Some(0)))
            .unwrap()
    }

    #[test]
    fn test_optimize_survives_failures() {
        let storage = StudyStorage::memory().unwrap();
        let mut study = study("s", &storage);

        let finished = study
            .optimize(4, |trial| match trial.number {
                1 => Err(Error::Divergence { what: "critic loss", step: 7 }),
                2 => panic!("exploding gradients"),
                n => Ok(n as f64),
            })
            .unwrap();

        assert_eq!(finished.len(), 4);
        assert_eq!(finished[1].state, TrialState::Failed);
        assert_eq!(finished[1].value, Some(f64::NEG_INFINITY));
        assert!(finished[2].failure.as_deref().unwrap().contains("exploding gradients"));

        let stored = study.trials().unwrap();
        assert_eq!(stored, finished);
        assert_eq!(study.best_trial().unwrap().number, 3);
    }

    #[test]
    fn test_continue_appends() {
        let storage = StudyStorage::memory().unwrap();
        study("s", &storage).optimize(2, |_| Ok(1.0)).unwrap();

        let mut resumed = study("s", &storage);
        resumed.optimize(1, |_| Ok(2.0)).unwrap();
        let numbers: Vec<u64> = resumed.trials().unwrap().iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn test_best_trial_requires_finished_trials() {
        let storage = StudyStorage::memory().unwrap();
        let mut study = study("s", &storage);
        assert!(matches!(study.best_trial(), Err(Error::NoCompletedTrials(_))));

        // A trial left running does not count
        study.ask().unwrap();
        assert!(study.best_trial().is_err());
    }

    #[test]
    fn test_nan_objective_is_failure() {
        let storage = StudyStorage::memory().unwrap();
        let mut study = study("s", &storage);
        let trial = study.ask().unwrap();
        let record = study.tell(trial, Ok(f64::NAN)).unwrap();
        assert_eq!(record.state, TrialState::Failed);
    }

    #[test]
    fn test_stored_space_wins() {
        let storage = StudyStorage::memory().unwrap();
        study("s", &storage);
        let narrow = SearchSpace::new().with(GAMMA, ParamSpec::uniform(0.9, 0.91));
        let reopened = Study::create(storage, "s", narrow, true, Sampler::new(None)).unwrap();
        assert_eq!(reopened.space(), &SearchSpace::default());
    }
}
