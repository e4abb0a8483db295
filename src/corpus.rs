//! Corpus d'entraînement fournis par l'appelant
//!
//! Deux sources: une baseline synthétique uniforme (reproductible par graine)
//! ou un fichier JSON contenant un tableau de vecteurs de 10 valeurs dans [0, 1].

use crate::config::TrainingConfig;
use crate::error::DetectorError;
use crate::features::{FeatureVector, FEATURE_DIM};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;

/// Génère une baseline uniforme dans [0, 1]^10
pub fn synthetic_baseline(samples: usize, seed: u64) -> Vec<FeatureVector> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..samples)
        .filter_map(|_| {
            let mut values = [0.0; FEATURE_DIM];
            for v in values.iter_mut() {
                *v = rng.random::<f64>();
            }
            FeatureVector::new(values)
        })
        .collect()
}

/// Charge un corpus JSON: `[[0.1, 0.2, ...], ...]`
pub fn load_corpus(path: &Path) -> Result<Vec<FeatureVector>, DetectorError> {
    let content = fs::read_to_string(path)?;
    let corpus = parse_corpus(&content)?;
    info!("Corpus chargé depuis {}: {} échantillons", path.display(), corpus.len());
    Ok(corpus)
}

/// Corpus d'entraînement configuré: le fichier s'il est renseigné, sinon la baseline
pub fn training_corpus(training: &TrainingConfig, seed: u64) -> Result<Vec<FeatureVector>, DetectorError> {
    match &training.corpus_path {
        Some(path) => load_corpus(Path::new(path)),
        None => {
            if training.synthetic_samples == 0 {
                return Err(DetectorError::EmptyCorpus);
            }
            info!(
                "Aucun corpus fourni, baseline synthétique de {} échantillons",
                training.synthetic_samples
            );
            Ok(synthetic_baseline(training.synthetic_samples, seed))
        }
    }
}

pub fn parse_corpus(content: &str) -> Result<Vec<FeatureVector>, DetectorError> {
    let rows: Vec<Vec<f64>> = serde_json::from_str(content)?;
    if rows.is_empty() {
        return Err(DetectorError::EmptyCorpus);
    }

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            if row.len() != FEATURE_DIM {
                return Err(DetectorError::InvalidCorpus {
                    index,
                    reason: format!("{} valeurs au lieu de {}", row.len(), FEATURE_DIM),
                });
            }
            FeatureVector::from_slice(row).ok_or_else(|| DetectorError::InvalidCorpus {
                index,
                reason: "valeur hors de [0, 1]".to_string(),
            })
        })
        .collect()
}
