//! Réseau de l'autoencodeur
//!
//! Couches denses `burn`: ReLU sur les couches cachées, sigmoïde en sortie
//! pour garder la reconstruction dans [0, 1].

use crate::features::FEATURE_DIM;
use burn::module::{Module, Param};
use burn::nn::{Linear, Relu};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::rngs::StdRng;
use rand::Rng;

/// Encodeur puis décodeur, couches dans l'ordre d'évaluation
#[derive(Module, Debug)]
pub struct Network<B: Backend> {
    layers: Vec<Linear<B>>,
    activation: Relu,
}

impl<B: Backend> Network<B> {
    /// Construit `FEATURE_DIM -> hidden... -> FEATURE_DIM`.
    ///
    /// Poids tirés du générateur fourni (Glorot uniforme), jamais de la graine
    /// globale du backend.
    pub fn new(hidden_layers: &[usize], rng: &mut StdRng, device: &B::Device) -> Self {
        let mut widths = vec![FEATURE_DIM];
        widths.extend(hidden_layers);
        widths.push(FEATURE_DIM);

        let layers = widths
            .windows(2)
            .map(|pair| glorot_linear(pair[0], pair[1], rng, device))
            .collect();

        Self {
            layers,
            activation: Relu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len().saturating_sub(1);
        let mut x = input;
        for (index, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            x = if index == last {
                sigmoid(x)
            } else {
                self.activation.forward(x)
            };
        }
        x
    }

    /// Largeurs de toutes les couches, entrée comprise
    pub fn widths(&self) -> Vec<usize> {
        let mut widths = vec![FEATURE_DIM];
        widths.extend(self.layers.iter().map(|layer| layer.weight.dims()[1]));
        widths
    }
}

fn glorot_linear<B: Backend>(inputs: usize, outputs: usize, rng: &mut StdRng, device: &B::Device) -> Linear<B> {
    let limit = (6.0 / (inputs + outputs) as f32).sqrt();
    let weights: Vec<f32> = (0..inputs * outputs)
        .map(|_| rng.random_range(-limit..limit))
        .collect();

    Linear {
        weight: Param::from_tensor(Tensor::from_data(TensorData::new(weights, [inputs, outputs]), device)),
        bias: Some(Param::from_tensor(Tensor::zeros([outputs], device))),
    }
}

/// Met des vecteurs en lot `[n, FEATURE_DIM]`
pub fn batch_tensor<B: Backend>(rows: &[&[f64]], device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = rows.iter().flat_map(|row| row.iter().map(|v| *v as f32)).collect();
    Tensor::from_data(TensorData::new(values, [rows.len(), FEATURE_DIM]), device)
}
