//! Counters of a single training run.

use std::collections::VecDeque;

use urgym::EpisodeStats;

/// Step, update and episode counters plus a window of recent episodes.
#[derive(Debug, Clone)]
pub struct TrainingMetrics {
    num_timesteps: usize,
    n_updates: usize,
    episodes: usize,
    window: VecDeque<EpisodeStats>,
    window_size: usize,
}

impl TrainingMetrics {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            num_timesteps: 0,
            n_updates: 0,
            episodes: 0,
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Start a new run: step and episode counters restart, updates persist.
    pub fn reset_run(&mut self) {
        self.num_timesteps = 0;
        self.episodes = 0;
        self.window.clear();
    }

    pub fn add_env_steps(&mut self, steps: usize) {
        self.num_timesteps += steps;
    }

    pub fn increment_updates(&mut self) {
        self.n_updates += 1;
    }

    pub fn record_episode(&mut self, stats: EpisodeStats) {
        self.episodes += 1;
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(stats);
    }

    pub fn num_timesteps(&self) -> usize {
        self.num_timesteps
    }

    pub fn n_updates(&self) -> usize {
        self.n_updates
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Mean return over the window, `None` before the first episode.
    pub fn mean_reward(&self) -> Option<f32> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().map(|e| e.reward).sum::<f32>() / self.window.len() as f32)
    }

    pub fn mean_length(&self) -> Option<f32> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().map(|e| e.length as f32).sum::<f32>() / self.window.len() as f32)
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(reward: f32, length: usize) -> EpisodeStats {
        EpisodeStats { reward, length }
    }

    #[test]
    fn test_counters() {
        let mut metrics = TrainingMetrics::default();
        metrics.add_env_steps(100);
        metrics.add_env_steps(50);
        metrics.increment_updates();
        assert_eq!(metrics.num_timesteps(), 150);
        assert_eq!(metrics.n_updates(), 1);
        assert_eq!(metrics.mean_reward(), None);
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut metrics = TrainingMetrics::new(2);
        metrics.record_episode(episode(100.0, 10));
        metrics.record_episode(episode(200.0, 20));
        metrics.record_episode(episode(400.0, 40));
        assert_eq!(metrics.episodes(), 3);
        assert_eq!(metrics.mean_reward(), Some(300.0));
        assert_eq!(metrics.mean_length(), Some(30.0));

        metrics.increment_updates();
        metrics.reset_run();
        assert_eq!(metrics.episodes(), 0);
        assert_eq!(metrics.mean_reward(), None);
        assert_eq!(metrics.n_updates(), 1);
    }
}
