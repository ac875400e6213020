//! Target network updates.
//!
//! The critic's bootstrap targets come from a slowly moving copy of the
//! critic. After every `interval`-th gradient step the copy is pulled toward
//! the online weights by Polyak averaging:
//!
//! ```text
//! θ_target = τ * θ_online + (1 - τ) * θ_target
//! ```

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;

// ============================================================================
// Soft Update via ModuleMapper
// ============================================================================

/// Collects every float parameter of a module, flattened, in traversal order.
///
/// Two modules built from the same configuration traverse their parameters in
/// the same order, so matching by index pairs online and target weights.
struct ParamExtractor<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for ParamExtractor<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let numel: usize = val.dims().iter().product();
        self.params.push(val.detach().reshape([numel]));
        param
    }
}

/// Interpolates each target parameter toward its online counterpart.
struct SoftUpdateMapper<B: Backend> {
    online: Vec<Tensor<B, 1>>,
    tau: f32,
    index: usize,
}

impl<B: Backend> ModuleMapper<B> for SoftUpdateMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let idx = self.index;
        self.index += 1;

        let Some(online) = self.online.get(idx) else {
            log::warn!("Soft update: target has more parameters than online model, keeping #{idx}");
            return param;
        };

        let target = param.val();
        let shape = target.dims();
        let numel: usize = shape.iter().product();

        let mixed = online.clone().mul_scalar(self.tau)
            + target.detach().reshape([numel]).mul_scalar(1.0 - self.tau);

        Param::initialized(param.id.clone(), mixed.reshape(shape))
    }
}

/// Polyak-average `target` toward `online`. The result carries no autodiff
/// history.
pub fn soft_update<B, M>(online: &M, target: M, tau: f32) -> M
where
    B: Backend,
    M: Module<B>,
{
    if tau <= 0.0 {
        return target;
    }

    let mut extractor = ParamExtractor { params: Vec::new() };
    let _ = online.clone().map(&mut extractor);

    let mut updater = SoftUpdateMapper {
        online: extractor.params,
        tau: tau.min(1.0),
        index: 0,
    };
    target.map(&mut updater)
}

// ============================================================================
// Manager
// ============================================================================

/// Decides when the target copy is refreshed.
#[derive(Debug, Clone)]
pub struct TargetNetworkManager {
    tau: f32,
    interval: usize,
    steps: usize,
}

impl TargetNetworkManager {
    /// Soft updates with coefficient `tau` every `interval` calls.
    pub fn new(tau: f32, interval: usize) -> Self {
        Self {
            tau,
            interval: interval.max(1),
            steps: 0,
        }
    }

    /// Count one gradient step and update the target when it is due.
    pub fn maybe_update<B, M>(&mut self, online: &M, target: M) -> M
    where
        B: Backend,
        M: Module<B>,
    {
        self.steps += 1;
        if self.steps % self.interval == 0 {
            soft_update(online, target, self.tau)
        } else {
            target
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn tau(&self) -> f32 {
        self.tau
    }

    pub fn set_tau(&mut self, tau: f32) {
        self.tau = tau;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::init::seeded_linear;
    use burn::backend::NdArray;
    use burn::nn::Linear;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    fn pair(seed: u64) -> (Linear<TestBackend>, Linear<TestBackend>) {
        let device = Default::default();
        let mut rng = StdRng::seed_from_u64(seed);
        (
            seeded_linear(4, 3, &mut rng, &device),
            seeded_linear(4, 3, &mut rng, &device),
        )
    }

    fn values(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_tau_zero_keeps_target() {
        let (online, target) = pair(0);
        let before = values(target.weight.val());
        let updated = soft_update::<TestBackend, _>(&online, target, 0.0);
        assert_eq!(values(updated.weight.val()), before);
    }

    #[test]
    fn test_tau_one_copies_online() {
        let (online, target) = pair(1);
        let updated = soft_update::<TestBackend, _>(&online, target, 1.0);
        let (a, b) = (values(online.weight.val()), values(updated.weight.val()));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_interpolates_weights_and_bias() {
        let (online, target) = pair(2);
        let tau = 0.3;
        let ow = values(online.weight.val());
        let tw = values(target.weight.val());
        let ob = online.bias.as_ref().unwrap().val().into_data().to_vec::<f32>().unwrap();
        let tb = target.bias.as_ref().unwrap().val().into_data().to_vec::<f32>().unwrap();

        let updated = soft_update::<TestBackend, _>(&online, target, tau);
        let uw = values(updated.weight.val());
        let ub = updated.bias.as_ref().unwrap().val().into_data().to_vec::<f32>().unwrap();

        for i in 0..ow.len() {
            assert!((uw[i] - (tau * ow[i] + (1.0 - tau) * tw[i])).abs() < 1e-5);
        }
        for i in 0..ob.len() {
            assert!((ub[i] - (tau * ob[i] + (1.0 - tau) * tb[i])).abs() < 1e-5);
        }
    }

    #[test]
    fn test_manager_respects_interval() {
        let (online, target) = pair(3);
        let before = values(target.weight.val());
        let mut manager = TargetNetworkManager::new(1.0, 2);

        let target = manager.maybe_update::<TestBackend, _>(&online, target);
        assert_eq!(manager.steps(), 1);
        assert_eq!(values(target.weight.val()), before);

        let target = manager.maybe_update::<TestBackend, _>(&online, target);
        assert_eq!(manager.steps(), 2);
        let (a, b) = (values(online.weight.val()), values(target.weight.val()));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}
