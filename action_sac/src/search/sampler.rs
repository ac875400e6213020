//! Trial sampler.
//!
//! The first `n_startup_trials` draws are uniform over the space. After that
//! a parent is picked from the best `top_fraction` of the finite-scored
//! trials and each of its parameters is perturbed: continuous values by up to
//! `perturb_scale` of their range, choices kept with probability
//! `keep_probability`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::space::{Params, SearchSpace};
use super::trial::TrialRecord;

#[derive(Debug, Clone)]
pub struct Sampler {
    rng: StdRng,
    n_startup_trials: usize,
    top_fraction: f64,
    perturb_scale: f64,
    keep_probability: f64,
}

impl Sampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            n_startup_trials: 10,
            top_fraction: 0.25,
            perturb_scale: 0.1,
            keep_probability: 0.8,
        }
    }

    pub fn with_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn suggest(&mut self, space: &SearchSpace, history: &[TrialRecord]) -> Params {
        let mut scored: Vec<(&TrialRecord, f64)> = history
            .iter()
            .filter_map(|t| t.finished_value().map(|v| (t, v)))
            .filter(|(_, v)| v.is_finite())
            .collect();

        if scored.len() < self.n_startup_trials.max(1) {
            return space.sample(&mut self.rng);
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        let n_top = ((scored.len() as f64 * self.top_fraction).ceil() as usize).max(1);
        let Some((parent, _)) = scored[..n_top].choose(&mut self.rng) else {
            return space.sample(&mut self.rng);
        };

        space
            .params
            .iter()
            .map(|(name, spec)| {
                let value = match parent.params.get(name) {
                    Some(value) => spec.perturb(
                        *value,
                        self.perturb_scale,
                        self.keep_probability,
                        &mut self.rng,
                    ),
                    None => spec.sample(&mut self.rng),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::space::{ParamSpec, ParamValue};

    fn space() -> SearchSpace {
        SearchSpace::new().with("x", ParamSpec::uniform(0.0, 100.0))
    }

    fn record(number: u64, x: f64, value: f64) -> TrialRecord {
        let mut params = Params::new();
        params.insert("x".into(), ParamValue::Float(x));
        TrialRecord::running(number, params).complete(value)
    }

    #[test]
    fn test_seeded_suggestions_repeat() {
        let mut a = Sampler::new(Some(4));
        let mut b = Sampler::new(Some(4));
        let space = SearchSpace::default();
        for _ in 0..5 {
            assert_eq!(a.suggest(&space, &[]), b.suggest(&space, &[]));
        }
    }

    #[test]
    fn test_exploits_best_quartile_after_startup() {
        let mut sampler = Sampler::new(Some(0)).with_startup_trials(4);
        // Best trial sits at x = 90; the rest near 10
        let mut history: Vec<_> = (0..7).map(|i| record(i, 10.0 + i as f64, -(i as f64))).collect();
        history.push(record(7, 90.0, 100.0));

        for _ in 0..50 {
            let x = sampler.suggest(&space(), &history)["x"].as_f64();
            // Top two of eight: x = 90 (value 100) or x = 10 (value 0)
            assert!((80.0..=100.0).contains(&x) || (0.0..=20.0).contains(&x), "{x}");
        }
    }

    #[test]
    fn test_failed_trials_do_not_count_toward_startup() {
        let mut sampler = Sampler::new(Some(1)).with_startup_trials(2);
        let mut params = Params::new();
        params.insert("x".into(), ParamValue::Float(50.0));
        let failed: Vec<_> = (0..5)
            .map(|i| TrialRecord::running(i, params.clone()).fail("diverged"))
            .collect();
        // Falls back to uniform draws over the full range
        let draws: Vec<f64> = (0..100)
            .map(|_| sampler.suggest(&space(), &failed)["x"].as_f64())
            .collect();
        assert!(draws.iter().any(|x| (*x - 50.0).abs() > 20.0));
    }
}
