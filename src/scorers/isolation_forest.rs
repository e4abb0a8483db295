//! Isolation Forest
//!
//! Les points aberrants sont isolés par moins de coupes aléatoires que les points
//! normaux: leur profondeur moyenne dans les arbres est plus faible.

use super::{OutlierScorer, OutlierVerdict};
use crate::error::DetectorError;
use crate::features::{FeatureVector, FEATURE_DIM};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Constante d'Euler-Mascheroni
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Paramètres de l'Isolation Forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestParams {
    /// Nombre d'arbres de l'ensemble
    pub n_estimators: usize,
    /// Taille maximale du sous-échantillon par arbre
    pub max_samples: usize,
    /// Proportion attendue de points aberrants dans le corpus d'entraînement
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// Arbre stocké à plat, la racine est à l'indice 0
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: &[FeatureVector], indices: &mut [usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build_node(data, indices, 0, max_depth, rng);
        tree
    }

    fn build_node(
        &mut self,
        data: &[FeatureVector],
        indices: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: indices.len() });

        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // Essayer les caractéristiques dans un ordre aléatoire jusqu'à en trouver une non constante
        let mut features: Vec<usize> = (0..FEATURE_DIM).collect();
        features.shuffle(rng);

        let mut cut = None;
        for feature in features {
            let (min, max) = indices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &i| {
                let v = data[i].values()[feature];
                (lo.min(v), hi.max(v))
            });
            if max > min {
                cut = Some((feature, rng.random_range(min..max)));
                break;
            }
        }

        let Some((feature, split)) = cut else {
            return id;
        };

        // Partition en place: [< split | >= split]
        let mut boundary = 0;
        for j in 0..indices.len() {
            if data[indices[j]].values()[feature] < split {
                indices.swap(boundary, j);
                boundary += 1;
            }
        }

        let (left_indices, right_indices) = indices.split_at_mut(boundary);
        let left = self.build_node(data, left_indices, depth + 1, max_depth, rng);
        let right = self.build_node(data, right_indices, depth + 1, max_depth, rng);

        self.nodes[id] = Node::Internal {
            feature,
            split,
            left,
            right,
        };
        id
    }

    fn path_length(&self, vector: &FeatureVector) -> f64 {
        let mut id = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[id] {
                Node::Internal {
                    feature,
                    split,
                    left,
                    right,
                } => {
                    id = if vector.values()[*feature] < *split { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// Longueur moyenne c(n) d'une recherche infructueuse dans un arbre binaire de n éléments
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Quantile par interpolation linéaire sur des valeurs triées
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Isolation Forest avec seuil calibré sur la contamination
#[derive(Debug, Clone)]
pub struct IsolationForest {
    params: IsolationForestParams,
    trees: Vec<IsolationTree>,
    /// Normalisation c(taille du sous-échantillon)
    normalizer: f64,
    /// Score au-delà duquel un vecteur est aberrant
    threshold: f64,
    fitted: bool,
}

impl IsolationForest {
    pub fn new(params: IsolationForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            normalizer: 0.0,
            threshold: 1.0,
            fitted: false,
        }
    }

    pub fn params(&self) -> &IsolationForestParams {
        &self.params
    }

    /// Seuil de score calibré lors de l'entraînement
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score d'anomalie dans (0, 1]: proche de 1 pour un point facile à isoler
    pub fn score(&self, vector: &FeatureVector) -> f64 {
        assert!(self.fitted, "IsolationForest: score demandé avant l'entraînement");

        if self.normalizer == 0.0 {
            return 0.5;
        }

        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(vector))
            .sum::<f64>()
            / self.trees.len() as f64;

        2f64.powf(-mean_path / self.normalizer)
    }

    fn validate(&self) -> Result<(), DetectorError> {
        if self.params.n_estimators == 0 {
            return Err(DetectorError::InvalidConfig(
                "n_estimators doit être au moins 1".to_string(),
            ));
        }
        if self.params.max_samples < 2 {
            return Err(DetectorError::InvalidConfig(
                "max_samples doit être au moins 2".to_string(),
            ));
        }
        if !(self.params.contamination > 0.0 && self.params.contamination <= 0.5) {
            return Err(DetectorError::InvalidConfig(format!(
                "contamination {} hors de ]0, 0.5]",
                self.params.contamination
            )));
        }
        Ok(())
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(IsolationForestParams::default())
    }
}

impl OutlierScorer for IsolationForest {
    fn fit(&mut self, corpus: &[FeatureVector]) -> Result<(), DetectorError> {
        self.validate()?;
        if corpus.is_empty() {
            return Err(DetectorError::EmptyCorpus);
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let sample_size = self.params.max_samples.min(corpus.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        self.trees = (0..self.params.n_estimators)
            .map(|_| {
                // Sous-échantillon sans remise
                let mut indices = rand::seq::index::sample(&mut rng, corpus.len(), sample_size).into_vec();
                IsolationTree::build(corpus, &mut indices, max_depth, &mut rng)
            })
            .collect();
        self.normalizer = average_path_length(sample_size);
        self.fitted = true;

        // Calibrer le seuil pour qu'environ `contamination` du corpus soit aberrant
        let mut scores: Vec<f64> = corpus.iter().map(|v| self.score(v)).collect();
        scores.sort_by(f64::total_cmp);
        self.threshold = quantile(&scores, 1.0 - self.params.contamination);

        debug!(
            "Isolation Forest entraînée: {} arbres, {} échantillons, seuil {:.4}",
            self.trees.len(),
            sample_size,
            self.threshold
        );
        Ok(())
    }

    fn predict(&self, vector: &FeatureVector) -> OutlierVerdict {
        if self.score(vector) > self.threshold {
            OutlierVerdict::Outlier
        } else {
            OutlierVerdict::Inlier
        }
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn name(&self) -> &'static str {
        "Isolation Forest"
    }
}
