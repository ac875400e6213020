//! Continuous box spaces.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A bounded box in `R^n`, described by per-dimension `low`/`high` limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub low: Vec<f32>,
    pub high: Vec<f32>,
}

impl BoxSpace {
    /// Create a space from explicit bounds.
    ///
    /// # Panics
    ///
    /// Panics if `low` and `high` differ in length. Spaces are built from constants
    /// inside this crate, so a mismatch is a programming error.
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Self {
        assert_eq!(low.len(), high.len(), "BoxSpace bounds must have equal length");
        Self { low, high }
    }

    /// Create a space with the same bounds on every dimension.
    pub fn uniform(dim: usize, low: f32, high: f32) -> Self {
        Self::new(vec![low; dim], vec![high; dim])
    }

    /// Dimensionality of the space.
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Whether every dimension has finite bounds.
    pub fn is_bounded(&self) -> bool {
        self.low.iter().chain(self.high.iter()).all(|v| v.is_finite())
    }

    /// Check that `x` lies inside the space (inclusive).
    pub fn contains(&self, x: &[f32]) -> bool {
        x.len() == self.dim()
            && x.iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// Clip `x` into the space.
    pub fn clip(&self, x: &[f32]) -> Vec<f32> {
        x.iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
            .collect()
    }

    /// Draw a uniform sample. Unbounded dimensions sample from `[-1, 1]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f32> {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(lo, hi)| {
                if lo.is_finite() && hi.is_finite() && hi > lo {
                    rng.gen_range(*lo..*hi)
                } else {
                    rng.gen_range(-1.0..1.0)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_clip_and_contains() {
        let space = BoxSpace::new(vec![-1.0, 0.0], vec![1.0, 1.0]);
        assert_eq!(space.dim(), 2);
        assert!(space.contains(&[0.5, 0.5]));
        assert!(!space.contains(&[1.5, 0.5]));
        assert!(!space.contains(&[0.5]));
        assert_eq!(space.clip(&[2.0, -3.0]), vec![1.0, 0.0]);
    }

    #[test]
    fn test_sample_in_bounds() {
        let space = BoxSpace::new(vec![-2.0, 0.0, 5.0], vec![2.0, 0.1, 6.0]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(space.contains(&space.sample(&mut rng)));
        }
    }

    #[test]
    fn test_unbounded_space() {
        let space = BoxSpace::uniform(3, f32::NEG_INFINITY, f32::INFINITY);
        assert!(!space.is_bounded());
        let mut rng = StdRng::seed_from_u64(0);
        let x = space.sample(&mut rng);
        assert!(x.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}
