//! Modèles d'évaluation utilisés par le détecteur hybride

mod autoencoder;
mod isolation_forest;

pub use autoencoder::{Autoencoder, AutoencoderParams};
pub use isolation_forest::{IsolationForest, IsolationForestParams};

use crate::error::DetectorError;
use crate::features::{FeatureVector, FEATURE_DIM};

/// Verdict binaire d'un modèle de détection de points aberrants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierVerdict {
    Inlier,
    Outlier,
}

/// Modèle non supervisé rapide (évalué en premier)
pub trait OutlierScorer: Send + Sync {
    /// Entraîne le modèle sur un corpus supposé majoritairement bénin
    fn fit(&mut self, corpus: &[FeatureVector]) -> Result<(), DetectorError>;

    /// # Panics
    ///
    /// Si le modèle n'a pas été entraîné.
    fn predict(&self, vector: &FeatureVector) -> OutlierVerdict;

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Modèle de reconstruction (encodage puis décodage)
pub trait ReconstructionScorer: Send + Sync {
    fn fit(&mut self, corpus: &[FeatureVector]) -> Result<(), DetectorError>;

    /// # Panics
    ///
    /// Si le modèle n'a pas été entraîné.
    fn reconstruct(&self, vector: &FeatureVector) -> [f64; FEATURE_DIM];

    /// Erreur quadratique moyenne entre l'entrée et sa reconstruction
    fn reconstruction_error(&self, vector: &FeatureVector) -> f64 {
        mean_squared_error(vector.values(), &self.reconstruct(vector))
    }

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &'static str;
}

pub fn mean_squared_error(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        / a.len() as f64
}
