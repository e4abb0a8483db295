//! Détecteur hybride
//!
//! Combine un modèle rapide de points aberrants (Isolation Forest) et un modèle
//! de reconstruction (autoencodeur). Politique de décision, la première règle
//! satisfaite l'emporte:
//! 1. point aberrant -> menace, gravité High
//! 2. erreur de reconstruction > seuil -> menace, gravité Medium
//! 3. sinon -> normal, gravité Low

use crate::config::DetectionConfig;
use crate::error::DetectorError;
use crate::features::FeatureVector;
use crate::models::{Severity, Verdict};
use crate::scorers::{
    Autoencoder, IsolationForest, OutlierScorer, OutlierVerdict, ReconstructionScorer,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Nombre de décimales de l'erreur dans la raison d'une alerte
const ERROR_DECIMALS: usize = 4;

/// Stratégie d'évaluation des deux modèles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecisionMode {
    /// L'autoencodeur n'est pas évalué quand l'Isolation Forest a déjà conclu
    #[default]
    ShortCircuit,
    /// Les deux modèles sont toujours évalués (contexte d'alerte plus riche)
    Exhaustive,
}

/// État du détecteur: les deux modèles entraînés et le seuil de reconstruction.
///
/// Construit une seule fois au démarrage puis partagé en lecture seule.
pub struct HybridDetector {
    outlier: Arc<dyn OutlierScorer>,
    reconstruction: Arc<dyn ReconstructionScorer>,
    threshold: f64,
    mode: DecisionMode,
}

/// Alias du nom utilisé dans la documentation d'architecture
pub type DetectorState = HybridDetector;

impl HybridDetector {
    /// Assemble un détecteur à partir de modèles déjà entraînés
    pub fn new<O, R>(outlier: O, reconstruction: R, threshold: f64, mode: DecisionMode) -> Result<Self, DetectorError>
    where
        O: OutlierScorer + 'static,
        R: ReconstructionScorer + 'static,
    {
        Self::from_shared(Arc::new(outlier), Arc::new(reconstruction), threshold, mode)
    }

    fn from_shared(
        outlier: Arc<dyn OutlierScorer>,
        reconstruction: Arc<dyn ReconstructionScorer>,
        threshold: f64,
        mode: DecisionMode,
    ) -> Result<Self, DetectorError> {
        if !outlier.is_fitted() {
            return Err(DetectorError::Untrained(outlier.name()));
        }
        if !reconstruction.is_fitted() {
            return Err(DetectorError::Untrained(reconstruction.name()));
        }
        validate_threshold(threshold)?;

        Ok(Self {
            outlier,
            reconstruction,
            threshold,
            mode,
        })
    }

    /// Entraîne les deux modèles sur un corpus fourni par l'appelant
    pub fn train(config: &DetectionConfig, corpus: &[FeatureVector]) -> Result<Self, DetectorError> {
        config.validate()?;
        if corpus.is_empty() {
            return Err(DetectorError::EmptyCorpus);
        }

        info!("Entraînement du détecteur hybride sur {} échantillons...", corpus.len());
        let started = Instant::now();

        let mut forest = IsolationForest::new(config.isolation_forest_params());
        forest.fit(corpus)?;

        let mut autoencoder = Autoencoder::new(config.autoencoder_params());
        autoencoder.fit(corpus)?;

        info!(
            "Détecteur prêt en {:.2?} (seuil IF {:.4}, perte AE {:.6})",
            started.elapsed(),
            forest.threshold(),
            autoencoder.final_loss().unwrap_or(f64::NAN)
        );

        Self::new(forest, autoencoder, config.threshold, config.decision_mode)
    }

    /// Même modèles, autre seuil de reconstruction (sans réentraînement)
    pub fn with_threshold(&self, threshold: f64) -> Result<Self, DetectorError> {
        Self::from_shared(
            Arc::clone(&self.outlier),
            Arc::clone(&self.reconstruction),
            threshold,
            self.mode,
        )
    }

    pub fn with_mode(&self, mode: DecisionMode) -> Self {
        Self {
            outlier: Arc::clone(&self.outlier),
            reconstruction: Arc::clone(&self.reconstruction),
            threshold: self.threshold,
            mode,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn mode(&self) -> DecisionMode {
        self.mode
    }

    /// Évalue un vecteur. Déterministe pour des modèles et un vecteur donnés.
    pub fn detect(&self, vector: &FeatureVector) -> Verdict {
        let is_outlier = self.outlier.predict(vector) == OutlierVerdict::Outlier;

        if is_outlier && self.mode == DecisionMode::ShortCircuit {
            return Verdict {
                is_threat: true,
                severity: Severity::High,
                reason: format!("{} (Anomaly)", self.outlier.name()),
                reconstruction_error: None,
            };
        }

        let error = self.reconstruction.reconstruction_error(vector);

        if is_outlier {
            return Verdict {
                is_threat: true,
                severity: Severity::High,
                reason: format!(
                    "{} (Anomaly) + {} (Error: {:.*})",
                    self.outlier.name(),
                    self.reconstruction.name(),
                    ERROR_DECIMALS,
                    error
                ),
                reconstruction_error: Some(error),
            };
        }

        if error > self.threshold {
            return Verdict {
                is_threat: true,
                severity: Severity::Medium,
                reason: format!(
                    "{} (Zero-Day Pattern, Error: {:.*})",
                    self.reconstruction.name(),
                    ERROR_DECIMALS,
                    error
                ),
                reconstruction_error: Some(error),
            };
        }

        Verdict::normal(Some(error))
    }
}

fn validate_threshold(threshold: f64) -> Result<(), DetectorError> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(())
    } else {
        Err(DetectorError::InvalidConfig(format!(
            "seuil de reconstruction {} invalide",
            threshold
        )))
    }
}
