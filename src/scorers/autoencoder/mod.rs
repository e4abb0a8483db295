//! Autoencodeur dense
//!
//! Architecture par défaut: 10 -> 8 -> 4 -> 8 -> 10. Entraîné avec `burn`
//! (backend NdArray + autodiff) par Adam sur l'erreur quadratique moyenne de
//! reconstruction.

mod network;

use super::ReconstructionScorer;
use crate::error::DetectorError;
use crate::features::{FeatureVector, FEATURE_DIM};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::ElementConversion;
use log::debug;
use network::{batch_tensor, Network};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

type InferenceBackend = NdArray;
type TrainingBackend = Autodiff<NdArray>;

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-7;

/// Paramètres de l'autoencodeur
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoencoderParams {
    /// Largeurs des couches cachées, encodeur puis décodeur
    pub hidden_layers: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for AutoencoderParams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![8, 4, 8],
            epochs: 5,
            batch_size: 32,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

impl AutoencoderParams {
    /// Vérifie l'architecture: au moins une couche strictement plus étroite que l'entrée
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.hidden_layers.is_empty() || self.hidden_layers.contains(&0) {
            return Err(DetectorError::InvalidConfig(
                "hidden_layers doit contenir des couches de largeur non nulle".to_string(),
            ));
        }
        if !self.hidden_layers.iter().any(|&width| width < FEATURE_DIM) {
            return Err(DetectorError::InvalidConfig(format!(
                "hidden_layers {:?} sans goulot d'étranglement (< {})",
                self.hidden_layers, FEATURE_DIM
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(DetectorError::InvalidConfig(
                "epochs et batch_size doivent être au moins 1".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(DetectorError::InvalidConfig(format!(
                "learning_rate {} invalide",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Autoencodeur à goulot d'étranglement
pub struct Autoencoder {
    params: AutoencoderParams,
    device: NdArrayDevice,
    /// Modèle d'inférence. Les paramètres `burn` ne sont pas `Sync`: les
    /// boucles de capture y accèdent une à la fois.
    model: Option<Mutex<Network<InferenceBackend>>>,
    widths: Vec<usize>,
    /// Perte moyenne de la dernière époque
    final_loss: Option<f64>,
}

impl Autoencoder {
    pub fn new(params: AutoencoderParams) -> Self {
        Self {
            params,
            device: NdArrayDevice::Cpu,
            model: None,
            widths: Vec::new(),
            final_loss: None,
        }
    }

    pub fn params(&self) -> &AutoencoderParams {
        &self.params
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.final_loss
    }

    /// Largeurs de toutes les couches, entrée comprise (vide avant l'entraînement)
    pub fn layer_widths(&self) -> &[usize] {
        &self.widths
    }

    fn train(&self, corpus: &[FeatureVector]) -> (Network<TrainingBackend>, f64) {
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut model = Network::<TrainingBackend>::new(&self.params.hidden_layers, &mut rng, &self.device);
        let mut optimizer = AdamConfig::new()
            .with_beta_1(ADAM_BETA1)
            .with_beta_2(ADAM_BETA2)
            .with_epsilon(ADAM_EPSILON)
            .init::<TrainingBackend, Network<TrainingBackend>>();
        let loss_fn = MseLoss::new();

        let mut order: Vec<usize> = (0..corpus.len()).collect();
        let mut mean_loss = f64::NAN;

        for epoch in 0..self.params.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(self.params.batch_size) {
                let rows: Vec<&[f64]> = batch.iter().map(|&i| corpus[i].as_slice()).collect();
                let input = batch_tensor::<TrainingBackend>(&rows, &self.device);

                let output = model.forward(input.clone());
                let loss = loss_fn.forward(output, input, Reduction::Mean);
                epoch_loss += loss.clone().into_scalar().elem::<f64>() * batch.len() as f64;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optimizer.step(self.params.learning_rate, model, grads);
            }

            mean_loss = epoch_loss / corpus.len() as f64;
            debug!("Autoencodeur époque {}/{}: perte {:.6}", epoch + 1, self.params.epochs, mean_loss);
        }

        (model, mean_loss)
    }
}

impl Default for Autoencoder {
    fn default() -> Self {
        Self::new(AutoencoderParams::default())
    }
}

impl fmt::Debug for Autoencoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autoencoder")
            .field("params", &self.params)
            .field("widths", &self.widths)
            .field("final_loss", &self.final_loss)
            .finish()
    }
}

impl ReconstructionScorer for Autoencoder {
    fn fit(&mut self, corpus: &[FeatureVector]) -> Result<(), DetectorError> {
        self.params.validate()?;
        if corpus.is_empty() {
            return Err(DetectorError::EmptyCorpus);
        }

        let (model, loss) = self.train(corpus);
        let model = model.valid();

        self.widths = model.widths();
        self.final_loss = Some(loss);
        self.model = Some(Mutex::new(model));
        Ok(())
    }

    fn reconstruct(&self, vector: &FeatureVector) -> [f64; FEATURE_DIM] {
        let Some(model) = &self.model else {
            panic!("Autoencoder: reconstruction demandée avant l'entraînement");
        };

        let input = batch_tensor::<InferenceBackend>(&[vector.as_slice()], &self.device);
        let output = {
            let model = model.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            model.forward(input)
        };
        let values = output.into_data().to_vec::<f32>().unwrap_or_default();

        let mut reconstruction = [0.0; FEATURE_DIM];
        for (slot, value) in reconstruction.iter_mut().zip(values) {
            *slot = f64::from(value);
        }
        reconstruction
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &'static str {
        "Autoencoder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::synthetic_baseline;

    fn pattern() -> FeatureVector {
        FeatureVector::new([0.2, 0.1, 0.25, 0.7, 0.3, 0.05, 0.6, 0.5, 0.5, 0.5]).unwrap()
    }

    #[test]
    fn test_default_architecture_has_bottleneck() {
        let mut autoencoder = Autoencoder::default();
        assert!(autoencoder.layer_widths().is_empty());
        autoencoder.fit(&synthetic_baseline(64, 1)).unwrap();
        assert_eq!(autoencoder.layer_widths(), &[10, 8, 4, 8, 10]);
    }

    #[test]
    fn test_rejects_architecture_without_bottleneck() {
        let params = AutoencoderParams {
            hidden_layers: vec![12, 10, 12],
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(DetectorError::InvalidConfig(_))));

        let params = AutoencoderParams {
            hidden_layers: vec![],
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let mut autoencoder = Autoencoder::new(AutoencoderParams {
            epochs: 0,
            ..Default::default()
        });
        assert!(autoencoder.fit(&[pattern()]).is_err());
        assert!(!autoencoder.is_fitted());
    }

    #[test]
    fn test_reconstruction_stays_in_unit_range() {
        let mut autoencoder = Autoencoder::default();
        autoencoder.fit(&synthetic_baseline(200, 5)).unwrap();

        for v in synthetic_baseline(50, 6) {
            let r = autoencoder.reconstruct(&v);
            assert!(r.iter().all(|x| (0.0..=1.0).contains(x)));
            let error = autoencoder.reconstruction_error(&v);
            assert!((0.0..=1.0).contains(&error));
        }
    }

    #[test]
    fn test_learns_benign_structure() {
        let corpus = vec![pattern(); 200];
        let mut autoencoder = Autoencoder::new(AutoencoderParams {
            epochs: 200,
            learning_rate: 0.01,
            ..Default::default()
        });
        autoencoder.fit(&corpus).unwrap();

        let normal_error = autoencoder.reconstruction_error(&pattern());
        let odd = FeatureVector::new([0.9, 0.95, 0.9, 0.05, 0.9, 0.95, 0.05, 0.0, 1.0, 0.0]).unwrap();
        let odd_error = autoencoder.reconstruction_error(&odd);

        assert!(normal_error < 0.01, "normal_error = {}", normal_error);
        assert!(odd_error > normal_error * 10.0, "odd_error = {}", odd_error);
    }

    #[test]
    fn test_training_reduces_loss() {
        // Vecteurs sur une diagonale: structure apprenable à travers le goulot
        let corpus: Vec<FeatureVector> = (0..300)
            .map(|i| FeatureVector::new([i as f64 / 299.0; FEATURE_DIM]).unwrap())
            .collect();
        let mut short = Autoencoder::new(AutoencoderParams {
            epochs: 1,
            ..Default::default()
        });
        let mut long = Autoencoder::new(AutoencoderParams {
            epochs: 30,
            learning_rate: 0.01,
            ..Default::default()
        });
        short.fit(&corpus).unwrap();
        long.fit(&corpus).unwrap();

        assert!(long.final_loss().unwrap() < short.final_loss().unwrap());
    }

    #[test]
    fn test_same_seed_same_reconstruction() {
        let corpus = synthetic_baseline(100, 4);
        let mut a = Autoencoder::default();
        let mut b = Autoencoder::default();
        a.fit(&corpus).unwrap();
        b.fit(&corpus).unwrap();

        let v = pattern();
        assert_eq!(a.reconstruct(&v), b.reconstruct(&v));
    }

    #[test]
    #[should_panic(expected = "avant l'entraînement")]
    fn test_reconstruct_before_fit_panics() {
        Autoencoder::default().reconstruct(&pattern());
    }
}
