//! SAC loss functions.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Soft TD targets.
///
/// ```text
/// y = r + γ * (1 - done) * (min Q_target(s', a') - α * log π(a'|s'))
/// ```
///
/// `dones` marks true terminations only; time-limit truncations bootstrap.
pub fn td_targets<B: Backend>(
    rewards: Tensor<B, 1>,
    dones: Tensor<B, 1>,
    min_q_next: Tensor<B, 1>,
    next_log_prob: Tensor<B, 1>,
    gamma: f32,
    alpha: f32,
) -> Tensor<B, 1> {
    let v_next = min_q_next - next_log_prob.mul_scalar(alpha);
    let not_done = dones.neg().add_scalar(1.0);
    rewards + not_done.mul_scalar(gamma) * v_next
}

/// `0.5 * Σ_i MSE(Q_i, y)` over the critic ensemble.
pub fn critic_loss<B: Backend>(q_values: Vec<Tensor<B, 1>>, targets: Tensor<B, 1>) -> Tensor<B, 1> {
    let device = targets.device();
    q_values
        .into_iter()
        .map(|q| (q - targets.clone()).powf_scalar(2.0).mean())
        .fold(Tensor::zeros([1], &device), |acc, l| acc + l)
        .mul_scalar(0.5)
}

/// `mean(α * log π(a|s) - min Q(s, a))`
pub fn actor_loss<B: Backend>(min_q: Tensor<B, 1>, log_prob: Tensor<B, 1>, alpha: f32) -> Tensor<B, 1> {
    (log_prob.mul_scalar(alpha) - min_q).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn scalar(t: Tensor<B, 1>) -> f32 {
        t.into_data().to_vec::<f32>().unwrap()[0]
    }

    #[test]
    fn test_td_targets_respect_termination() {
        let device = Default::default();
        let targets = td_targets::<B>(
            Tensor::from_floats([1.0, 1.0], &device),
            Tensor::from_floats([0.0, 1.0], &device),
            Tensor::from_floats([10.0, 10.0], &device),
            Tensor::from_floats([-2.0, -2.0], &device),
            0.9,
            0.5,
        );
        let values = targets.into_data().to_vec::<f32>().unwrap();
        // 1 + 0.9 * (10 + 0.5 * 2) = 10.9
        assert!((values[0] - 10.9).abs() < 1e-5);
        assert!((values[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_critic_loss_is_half_sum_of_mse() {
        let device = Default::default();
        let y = Tensor::<B, 1>::from_floats([0.0, 0.0], &device);
        let q1 = Tensor::<B, 1>::from_floats([1.0, 1.0], &device);
        let q2 = Tensor::<B, 1>::from_floats([2.0, 0.0], &device);
        // 0.5 * (1 + 2) = 1.5
        assert!((scalar(critic_loss(vec![q1, q2], y)) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_actor_loss() {
        let device = Default::default();
        let loss = actor_loss::<B>(
            Tensor::from_floats([1.0, 3.0], &device),
            Tensor::from_floats([-1.0, -1.0], &device),
            0.2,
        );
        // mean(-0.2 - 1, -0.2 - 3) = -2.2
        assert!((scalar(loss) + 2.2).abs() < 1e-6);
    }
}
