//! Factored action network.
//!
//! The action vector is split into contiguous groups (for example arm motion
//! and gripper command). Each group is produced by its own two-layer head
//! reading the same input features (the observation, in the actor):
//!
//! ```text
//! features ─┬─ Linear(D, n_nodes) ─ ReLU ─ Linear(n_nodes, w_0) ─ squash_0 ─┐
//!           ├─ Linear(D, n_nodes) ─ ReLU ─ Linear(n_nodes, w_1) ─ squash_1 ─┼─ concat
//!           └─ ...                                                          ┘
//! ```
//!
//! Heads share no parameters, so a loss on one group's slice leaves the other
//! heads' gradients at zero.

use std::ops::Range;

use burn::module::{Ignored, Module};
use burn::nn::Linear;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;
use serde::{Deserialize, Serialize};
use urgym::ActionLayout;

use super::activation::Activation;
use super::init::seeded_linear;
use crate::error::{Error, Result};

// ============================================================================
// Configuration
// ============================================================================

/// One contiguous block of the action vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGroup {
    pub width: usize,
    pub squash: Activation,
}

impl ActionGroup {
    pub fn new(width: usize, squash: Activation) -> Self {
        Self { width, squash }
    }
}

/// Group layout plus the hidden width shared by every head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub n_nodes: usize,
    pub groups: Vec<ActionGroup>,
}

impl ActionConfig {
    pub fn new(n_nodes: usize, groups: Vec<ActionGroup>) -> Self {
        Self { n_nodes, groups }
    }

    /// Registered default grouping for an environment's action layout.
    pub fn for_layout(layout: ActionLayout, action_dim: usize, n_nodes: usize) -> Self {
        let groups = match layout {
            ActionLayout::Torque => vec![ActionGroup::new(action_dim, Activation::Tanh)],
            ActionLayout::JointGripper => vec![
                ActionGroup::new(action_dim.saturating_sub(1), Activation::Tanh),
                ActionGroup::new(1, Activation::Sigmoid),
            ],
            ActionLayout::PoseGripper => vec![
                ActionGroup::new(action_dim.saturating_sub(1), Activation::Tanh),
                ActionGroup::new(1, Activation::Tanh),
            ],
        };
        Self::new(n_nodes, groups)
    }

    pub fn with_n_nodes(mut self, n_nodes: usize) -> Self {
        self.n_nodes = n_nodes;
        self
    }

    /// Sum of group widths.
    pub fn total_width(&self) -> usize {
        self.groups.iter().map(|g| g.width).sum()
    }

    /// Column range of every group, in order.
    pub fn group_ranges(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        self.groups
            .iter()
            .map(|g| {
                let range = start..start + g.width;
                start += g.width;
                range
            })
            .collect()
    }

    /// Check the layout against the environment's action dimension.
    pub fn validate(&self, action_dim: usize) -> Result<()> {
        if self.groups.is_empty() {
            return Err(Error::Config("action configuration has no groups".into()));
        }
        if self.n_nodes == 0 {
            return Err(Error::Config("action configuration needs n_nodes > 0".into()));
        }
        if let Some(i) = self.groups.iter().position(|g| g.width == 0) {
            return Err(Error::Config(format!("action group {i} has zero width")));
        }
        let got = self.total_width();
        if got != action_dim {
            return Err(Error::ActionDimMismatch {
                expected: action_dim,
                got,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Network
// ============================================================================

/// Independent two-layer head for one action group.
#[derive(Module, Debug)]
pub struct GroupHead<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
    squash: Ignored<Activation>,
}

impl<B: Backend> GroupHead<B> {
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let h = relu(self.hidden.forward(features));
        self.squash.forward(self.output.forward(h))
    }

    pub fn output_layer(&self) -> &Linear<B> {
        &self.output
    }

    pub fn hidden_layer(&self) -> &Linear<B> {
        &self.hidden
    }

    pub fn squash(&self) -> Activation {
        *self.squash
    }
}

/// Feature vector to action vector through one head per group.
#[derive(Module, Debug)]
pub struct FactoredActionNet<B: Backend> {
    heads: Vec<GroupHead<B>>,
    config: Ignored<ActionConfig>,
    #[module(skip)]
    feature_dim: usize,
}

impl<B: Backend> FactoredActionNet<B> {
    /// Build one head per group. The layout must be non-empty with positive
    /// widths; matching it to an action space is the caller's job.
    pub fn new<R: Rng + ?Sized>(
        feature_dim: usize,
        config: &ActionConfig,
        rng: &mut R,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate(config.total_width())?;

        let heads = config
            .groups
            .iter()
            .map(|group| GroupHead {
                hidden: seeded_linear(feature_dim, config.n_nodes, rng, device),
                output: seeded_linear(config.n_nodes, group.width, rng, device),
                squash: Ignored(group.squash),
            })
            .collect();

        Ok(Self {
            heads,
            config: Ignored(config.clone()),
            feature_dim,
        })
    }

    /// `[batch, feature_dim]` to `[batch, total_width]`.
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let outputs: Vec<Tensor<B, 2>> = self
            .heads
            .iter()
            .map(|head| head.forward(features.clone()))
            .collect();
        Tensor::cat(outputs, 1)
    }

    pub fn heads(&self) -> &[GroupHead<B>] {
        &self.heads
    }

    pub fn config(&self) -> &ActionConfig {
        &self.config.0
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn output_dim(&self) -> usize {
        self.config.total_width()
    }

    pub fn group_ranges(&self) -> Vec<Range<usize>> {
        self.config.group_ranges()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::Param;
    use burn::record::{BinFileRecorder, FullPrecisionSettings};
    use burn::tensor::backend::AutodiffBackend;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type B = Autodiff<NdArray<f32>>;

    fn grasp_config() -> ActionConfig {
        ActionConfig::new(
            16,
            vec![
                ActionGroup::new(6, Activation::Tanh),
                ActionGroup::new(1, Activation::Sigmoid),
            ],
        )
    }

    #[test]
    fn test_output_width_and_ranges() {
        let device = Default::default();
        let net: FactoredActionNet<B> =
            FactoredActionNet::new(10, &grasp_config(), &mut StdRng::seed_from_u64(0), &device)
                .unwrap();
        assert_eq!(net.output_dim(), 7);
        assert_eq!(net.group_ranges(), vec![0..6, 6..7]);

        let x = Tensor::<B, 2>::ones([3, 10], &device);
        assert_eq!(net.forward(x).dims(), [3, 7]);
    }

    #[test]
    fn test_widths_short_of_action_dim_fail_fast() {
        let config = ActionConfig::new(
            64,
            vec![
                ActionGroup::new(6, Activation::Tanh),
                ActionGroup::new(1, Activation::Tanh),
            ],
        );
        let err = config.validate(8).unwrap_err();
        assert!(matches!(err, Error::ActionDimMismatch { expected: 8, got: 7 }));
    }

    #[test]
    fn test_rejects_empty_and_zero_width() {
        assert!(ActionConfig::new(8, vec![]).validate(0).is_err());
        let zero = ActionConfig::new(8, vec![ActionGroup::new(0, Activation::Tanh)]);
        assert!(matches!(zero.validate(0), Err(Error::Config(_))));
    }

    #[test]
    fn test_layout_defaults() {
        let joint = ActionConfig::for_layout(ActionLayout::JointGripper, 7, 256);
        assert_eq!(joint, grasp_config().with_n_nodes(256));

        let pose = ActionConfig::for_layout(ActionLayout::PoseGripper, 8, 256);
        assert_eq!(pose.groups[0], ActionGroup::new(7, Activation::Tanh));
        assert_eq!(pose.groups[1], ActionGroup::new(1, Activation::Tanh));
        assert!(pose.validate(8).is_ok());
    }

    /// Gradient of `param`, with a missing entry read as all zeros.
    fn grad_or_zeros<const D: usize>(
        param: &Param<Tensor<B, D>>,
        grads: &<B as AutodiffBackend>::Gradients,
    ) -> Vec<f32> {
        param
            .grad(grads)
            .unwrap_or_else(|| param.val().inner().zeros_like())
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    fn head_grads(head: &GroupHead<B>, grads: &<B as AutodiffBackend>::Gradients) -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        for layer in [head.hidden_layer(), head.output_layer()] {
            out.push(grad_or_zeros(&layer.weight, grads));
            out.push(grad_or_zeros(layer.bias.as_ref().unwrap(), grads));
        }
        out
    }

    #[test]
    fn test_gradient_independence() {
        let device = Default::default();
        let net: FactoredActionNet<B> =
            FactoredActionNet::new(5, &grasp_config(), &mut StdRng::seed_from_u64(3), &device)
                .unwrap();
        let x = Tensor::<B, 2>::ones([4, 5], &device);

        // Loss on the gripper slice only
        let out = net.forward(x);
        let loss = out.slice([0..4, 6..7]).sum();
        let grads = loss.backward();

        let arm = head_grads(&net.heads()[0], &grads);
        assert_eq!(arm.len(), 4);
        for grad in &arm {
            assert!(!grad.is_empty());
            assert!(grad.iter().all(|g| *g == 0.0), "arm head received gradient {grad:?}");
        }

        let gripper = head_grads(&net.heads()[1], &grads);
        // Output weight and bias always see the gripper loss
        assert!(gripper[2].iter().any(|g| *g != 0.0));
        assert!(gripper[3].iter().any(|g| *g != 0.0));
    }

    #[test]
    fn test_checkpoint_roundtrip_keeps_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factored");
        let device = Default::default();
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();

        let trained: FactoredActionNet<NdArray<f32>> =
            FactoredActionNet::new(5, &grasp_config(), &mut StdRng::seed_from_u64(1), &device)
                .unwrap();
        let x = Tensor::<NdArray<f32>, 2>::ones([2, 5], &device);
        let expected = trained.forward(x.clone()).into_data();
        trained.save_file(&path, &recorder).unwrap();

        let fresh: FactoredActionNet<NdArray<f32>> =
            FactoredActionNet::new(5, &grasp_config(), &mut StdRng::seed_from_u64(2), &device)
                .unwrap();
        let restored = fresh.load_file(&path, &recorder, &device).unwrap();

        assert_eq!(restored.config(), &grasp_config());
        assert_eq!(restored.heads()[1].squash(), Activation::Sigmoid);
        assert_eq!(restored.forward(x).into_data(), expected);
    }

    fn squash_strategy() -> impl Strategy<Value = Activation> {
        prop_oneof![
            Just(Activation::Identity),
            Just(Activation::Tanh),
            Just(Activation::Sigmoid),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_groups_partition_output(
            groups in prop::collection::vec((1usize..4, squash_strategy()), 1..4),
            batch in 1usize..5,
            seed in any::<u64>(),
        ) {
            let device = Default::default();
            let config = ActionConfig::new(
                8,
                groups.iter().map(|(w, s)| ActionGroup::new(*w, *s)).collect(),
            );
            let action_dim: usize = groups.iter().map(|(w, _)| *w).sum();
            prop_assert!(config.validate(action_dim).is_ok());

            let mut rng = StdRng::seed_from_u64(seed);
            let net: FactoredActionNet<NdArray<f32>> =
                FactoredActionNet::new(6, &config, &mut rng, &device).unwrap();
            let x = crate::nn::init::standard_normal::<NdArray<f32>, _, 2>([batch, 6], &mut rng, &device)
                .mul_scalar(3.0);
            let out = net.forward(x);
            prop_assert_eq!(out.dims(), [batch, action_dim]);

            let data = out.into_data();
            let values = data.as_slice::<f32>().unwrap();
            for (group, range) in config.groups.iter().zip(config.group_ranges()) {
                if let Some((lo, hi)) = group.squash.range() {
                    for row in 0..batch {
                        for col in range.clone() {
                            let v = values[row * action_dim + col];
                            prop_assert!(v >= lo && v <= hi, "{} outside [{}, {}]", v, lo, hi);
                        }
                    }
                }
            }
        }
    }
}
