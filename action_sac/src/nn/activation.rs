//! Element-wise activation functions selectable from configuration.

use burn::tensor::activation::{relu, sigmoid, tanh};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Activation applied after a linear layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Pass-through.
    Identity,
    #[default]
    Relu,
    /// Bounded to (-1, 1).
    Tanh,
    /// Bounded to (0, 1).
    Sigmoid,
}

impl Activation {
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Identity => x,
            Activation::Relu => relu(x),
            Activation::Tanh => tanh(x),
            Activation::Sigmoid => sigmoid(x),
        }
    }

    /// Open interval the output is confined to, if any.
    pub fn range(&self) -> Option<(f32, f32)> {
        match self {
            Activation::Tanh => Some((-1.0, 1.0)),
            Activation::Sigmoid => Some((0.0, 1.0)),
            Activation::Identity | Activation::Relu => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Activation {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "identity" | "linear" => Ok(Activation::Identity),
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            other => Err(crate::Error::Config(format!("unknown activation '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_forward_values() {
        let device = Default::default();
        let x: Tensor<B, 1> = Tensor::from_floats([-2.0, 0.0, 2.0], &device);

        let relu_out = Activation::Relu.forward(x.clone()).into_data();
        assert_eq!(relu_out.as_slice::<f32>().unwrap(), &[0.0, 0.0, 2.0]);

        let sig = Activation::Sigmoid.forward(x.clone()).into_data();
        let sig = sig.as_slice::<f32>().unwrap();
        assert!((sig[1] - 0.5).abs() < 1e-6);
        assert!(sig.iter().all(|v| *v > 0.0 && *v < 1.0));

        let id = Activation::Identity.forward(x).into_data();
        assert_eq!(id.as_slice::<f32>().unwrap(), &[-2.0, 0.0, 2.0]);
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("Tanh".parse::<Activation>().unwrap(), Activation::Tanh);
        assert!("gelu".parse::<Activation>().is_err());

        let json = serde_json::to_string(&Activation::Sigmoid).unwrap();
        assert_eq!(json, "\"sigmoid\"");
    }
}
