//! Fully connected stacks.

use burn::module::{Ignored, Module};
use burn::nn::Linear;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;

use super::activation::Activation;
use super::init::seeded_linear;

/// Layer sizes of an [`Mlp`].
#[derive(Debug, Clone, PartialEq)]
pub struct MlpConfig {
    pub input: usize,
    pub hidden: Vec<usize>,
    /// Final un-activated projection. `None` means every layer is activated and
    /// the last hidden width is the output width.
    pub output: Option<usize>,
    pub activation: Activation,
}

impl MlpConfig {
    pub fn new(input: usize, hidden: Vec<usize>) -> Self {
        Self {
            input,
            hidden,
            output: None,
            activation: Activation::Relu,
        }
    }

    pub fn with_output(mut self, output: usize) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn init<B: Backend, R: Rng + ?Sized>(&self, rng: &mut R, device: &B::Device) -> Mlp<B> {
        let mut layers = Vec::with_capacity(self.hidden.len() + 1);
        let mut last = self.input;
        for &width in &self.hidden {
            layers.push(seeded_linear(last, width, rng, device));
            last = width;
        }
        if let Some(out) = self.output {
            layers.push(seeded_linear(last, out, rng, device));
            last = out;
        }

        Mlp {
            layers,
            activation: Ignored(self.activation),
            activate_last: self.output.is_none(),
            output_dim: last,
        }
    }
}

/// Linear layers separated by a shared activation.
///
/// With no layers at all the stack is the identity.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    layers: Vec<Linear<B>>,
    activation: Ignored<Activation>,
    #[module(skip)]
    activate_last: bool,
    #[module(skip)]
    output_dim: usize,
}

impl<B: Backend> Mlp<B> {
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let n = self.layers.len();
        let mut x = input;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            if i + 1 < n || self.activate_last {
                x = self.activation.forward(x);
            }
        }
        x
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn activation(&self) -> Activation {
        *self.activation
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
    fn test_latent_stack_is_fully_activated() {
        let device = Default::default();
        let mlp: Mlp<B> = MlpConfig::new(3, vec![8, 4]).init(&mut StdRng::seed_from_u64(0), &device);
        assert_eq!(mlp.output_dim(), 4);
        assert_eq!(mlp.num_layers(), 2);

        let x = Tensor::<B, 2>::from_floats([[1.0, -2.0, 0.5], [0.0, 3.0, -1.0]], &device);
        let out = mlp.forward(x).into_data();
        // ReLU after the last layer
        assert!(out.as_slice::<f32>().unwrap().iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_q_network_shape() {
        let device = Default::default();
        let mlp: Mlp<B> = MlpConfig::new(5, vec![16, 16])
            .with_output(1)
            .init(&mut StdRng::seed_from_u64(0), &device);
        let x = Tensor::<B, 2>::zeros([7, 5], &device);
        assert_eq!(mlp.forward(x).dims(), [7, 1]);
    }

    #[test]
    fn test_empty_stack_is_identity() {
        let device = Default::default();
        let mlp: Mlp<B> = MlpConfig::new(3, vec![]).init(&mut StdRng::seed_from_u64(0), &device);
        assert_eq!(mlp.output_dim(), 3);
        let x = Tensor::<B, 2>::from_floats([[1.0, -2.0, 0.5]], &device);
        assert_eq!(mlp.forward(x.clone()).into_data(), x.into_data());
    }

    #[test]
    fn test_record_roundtrip_keeps_activation() {
        let device = Default::default();
        let config = MlpConfig::new(3, vec![4]).with_activation(Activation::Tanh);
        let trained: Mlp<B> = config.init(&mut StdRng::seed_from_u64(1), &device);
        let fresh: Mlp<B> = config.init(&mut StdRng::seed_from_u64(2), &device);

        let x = Tensor::<B, 2>::from_floats([[1.0, -2.0, 0.5]], &device);
        let expected = trained.forward(x.clone()).into_data();
        let restored = fresh.load_record(trained.into_record());

        assert_eq!(restored.activation(), Activation::Tanh);
        assert_eq!(restored.output_dim(), 4);
        assert_eq!(restored.forward(x).into_data(), expected);
    }
}
