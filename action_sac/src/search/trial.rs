//! Trial records persisted by a study.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::space::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// Asked but not told yet. A process killed mid-trial leaves these behind.
    Running,
    /// Objective reported.
    Complete,
    /// Training or evaluation failed; scored negative infinity.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub number: u64,
    pub params: Params,
    pub value: Option<f64>,
    pub state: TrialState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Error message of a failed trial.
    pub failure: Option<String>,
}

impl TrialRecord {
    pub fn running(number: u64, params: Params) -> Self {
        Self {
            number,
            params,
            value: None,
            state: TrialState::Running,
            started_at: Utc::now(),
            finished_at: None,
            failure: None,
        }
    }

    pub fn complete(mut self, value: f64) -> Self {
        self.value = Some(value);
        self.state = TrialState::Complete;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.value = Some(f64::NEG_INFINITY);
        self.state = TrialState::Failed;
        self.failure = Some(message.into());
        self.finished_at = Some(Utc::now());
        self
    }

    /// Complete or failed.
    pub fn is_finished(&self) -> bool {
        self.state != TrialState::Running
    }

    /// Objective of a finished trial.
    pub fn finished_value(&self) -> Option<f64> {
        if self.is_finished() {
            self.value
        } else {
            None
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Finished trial with the largest objective. Ties go to the earliest trial.
pub fn best_of(trials: &[TrialRecord]) -> Option<&TrialRecord> {
    trials
        .iter()
        .filter_map(|t| t.finished_value().map(|v| (t, v)))
        .fold(None, |best: Option<(&TrialRecord, f64)>, (t, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((t, v)),
        })
        .map(|(t, _)| t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(number: u64, value: f64) -> TrialRecord {
        TrialRecord::running(number, Params::new()).complete(value)
    }

    #[test]
    fn test_lifecycle() {
        let trial = TrialRecord::running(0, Params::new());
        assert!(!trial.is_finished());
        assert_eq!(trial.finished_value(), None);

        let failed = trial.fail("critic loss diverged");
        assert_eq!(failed.state, TrialState::Failed);
        assert_eq!(failed.finished_value(), Some(f64::NEG_INFINITY));
        assert!(failed.duration_secs().is_some());
    }

    #[test]
    fn test_best_is_maximum_and_skips_running() {
        let trials = vec![
            finished(0, -10.0),
            TrialRecord::running(1, Params::new()),
            finished(2, 5.0),
            TrialRecord::running(3, Params::new()).fail("boom"),
            finished(4, 5.0),
        ];
        assert_eq!(best_of(&trials).map(|t| t.number), Some(2));
    }

    #[test]
    fn test_all_failed_still_has_best() {
        let trials = vec![TrialRecord::running(0, Params::new()).fail("x")];
        assert_eq!(best_of(&trials).map(|t| t.number), Some(0));
        assert!(best_of(&[]).is_none());
    }
}
