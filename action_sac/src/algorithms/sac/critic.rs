//! Q-network ensemble.
//!
//! Each Q-network reads `concat(obs, action)` and outputs a scalar. Taking the
//! minimum across the ensemble counters overestimation in the TD target.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;

use crate::nn::{Activation, Mlp, MlpConfig};

#[derive(Module, Debug)]
pub struct Critic<B: Backend> {
    q_networks: Vec<Mlp<B>>,
}

impl<B: Backend> Critic<B> {
    pub fn new<R: Rng + ?Sized>(
        obs_dim: usize,
        action_dim: usize,
        hidden: &[usize],
        activation: Activation,
        n_critics: usize,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        let config = MlpConfig::new(obs_dim + action_dim, hidden.to_vec())
            .with_output(1)
            .with_activation(activation);
        Self {
            q_networks: (0..n_critics).map(|_| config.init(rng, device)).collect(),
        }
    }

    /// Q-values of every network, each `[batch]`.
    pub fn forward(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>) -> Vec<Tensor<B, 1>> {
        let input = Tensor::cat(vec![obs, actions], 1);
        self.q_networks
            .iter()
            .map(|q| q.forward(input.clone()).flatten::<1>(0, 1))
            .collect()
    }

    /// Element-wise minimum over the ensemble, `[batch]`.
    pub fn min_q(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        let batch = obs.dims()[0];
        let device = obs.device();
        self.forward(obs, actions)
            .into_iter()
            .reduce(|a, b| a.min_pair(b))
            .unwrap_or_else(|| Tensor::zeros([batch], &device))
    }

    pub fn n_critics(&self) -> usize {
        self.q_networks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type B = NdArray<f32>;

    #[test]
    fn test_ensemble_outputs_and_min() {
        let device = Default::default();
        let critic: Critic<B> =
            Critic::new(4, 2, &[8, 8], Activation::Relu, 2, &mut StdRng::seed_from_u64(0), &device);
        assert_eq!(critic.n_critics(), 2);

        let obs = Tensor::<B, 2>::ones([3, 4], &device);
        let act = Tensor::<B, 2>::zeros([3, 2], &device);
        let qs = critic.forward(obs.clone(), act.clone());
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].dims(), [3]);

        let q1 = qs[0].clone().into_data().to_vec::<f32>().unwrap();
        let q2 = qs[1].clone().into_data().to_vec::<f32>().unwrap();
        let min = critic.min_q(obs, act).into_data().to_vec::<f32>().unwrap();
        for i in 0..3 {
            assert_eq!(min[i], q1[i].min(q2[i]));
        }
    }
}
