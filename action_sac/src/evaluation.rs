//! Policy evaluation over full episodes.

use burn::tensor::backend::AutodiffBackend;

use crate::algorithms::sac::Sac;
use crate::error::{Error, Result};

/// Returns and lengths of the evaluation episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    pub mean_reward: f64,
    pub std_reward: f64,
    pub episode_rewards: Vec<f32>,
    pub episode_lengths: Vec<usize>,
}

impl EvalResult {
    fn from_episodes(episode_rewards: Vec<f32>, episode_lengths: Vec<usize>) -> Self {
        let n = episode_rewards.len().max(1) as f64;
        let mean = episode_rewards.iter().map(|r| *r as f64).sum::<f64>() / n;
        let var = episode_rewards
            .iter()
            .map(|r| (*r as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        Self {
            mean_reward: mean,
            std_reward: var.sqrt(),
            episode_rewards,
            episode_lengths,
        }
    }
}

/// Run `n_episodes` complete episodes on the agent's own environment.
///
/// Interrupts any training episode in progress; the next [`Sac::learn`]
/// starts from a fresh reset.
pub fn evaluate_policy<B: AutodiffBackend>(
    sac: &mut Sac<B>,
    n_episodes: usize,
    deterministic: bool,
) -> Result<EvalResult> {
    if n_episodes == 0 {
        return Err(Error::Config("n_eval_episodes must be positive".into()));
    }

    let mut rewards = Vec::with_capacity(n_episodes);
    let mut lengths = Vec::with_capacity(n_episodes);

    for _ in 0..n_episodes {
        let mut obs = sac.env_mut().reset(None);
        let mut episode_reward = 0.0f32;
        let mut episode_length = 0usize;
        loop {
            let action = sac.predict(&obs, deterministic)?;
            let step = sac.env_mut().step(&action)?;
            episode_reward += step.reward;
            episode_length += 1;
            if step.done() {
                break;
            }
            obs = step.observation;
        }
        rewards.push(episode_reward);
        lengths.push(episode_length);
    }

    let result = EvalResult::from_episodes(rewards, lengths);
    log::info!(
        "Evaluation over {} episodes: mean reward {:.2} +/- {:.2}",
        n_episodes,
        result.mean_reward,
        result.std_reward
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::sac::{NetArch, PolicyConfig, SacConfig};
    use crate::algorithms::Algorithm;
    use crate::callbacks::NoCallback;
    use burn::backend::{Autodiff, NdArray};
    use urgym::{make, RenderMode};

    type B = Autodiff<NdArray<f32>>;

    fn grasp_agent() -> Sac<B> {
        let env = make("URGym/CubesGrasp-v1", RenderMode::None).unwrap();
        let config = SacConfig::new()
            .with_learning_starts(10)
            .with_batch_size(8)
            .with_buffer_size(200)
            .with_seed(3);
        let policy = PolicyConfig::new().with_net_arch(NetArch::shared(vec![8, 8]));
        Sac::new(env, Algorithm::Sac, config, policy, Default::default()).unwrap()
    }

    #[test]
    fn test_statistics() {
        let result = EvalResult::from_episodes(vec![1.0, 3.0], vec![5, 7]);
        assert!((result.mean_reward - 2.0).abs() < 1e-12);
        assert!((result.std_reward - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_after_training() {
        let mut sac = grasp_agent();
        sac.learn(30, &mut NoCallback).unwrap();

        let result = evaluate_policy(&mut sac, 3, true).unwrap();
        assert_eq!(result.episode_rewards.len(), 3);
        assert!(result.mean_reward.is_finite());
        assert!(result.episode_lengths.iter().all(|l| *l >= 1 && *l <= 20));

        // Training resumes from a fresh episode
        sac.learn(10, &mut NoCallback).unwrap();
        assert_eq!(sac.num_timesteps(), 10);
    }

    #[test]
    fn test_zero_episodes_rejected() {
        let mut sac = grasp_agent();
        assert!(evaluate_policy(&mut sac, 0, true).is_err());
    }
}
