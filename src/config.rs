use crate::detector::DecisionMode;
use crate::error::DetectorError;
use crate::features::FEATURE_DIM;
use crate::log_mode::LogMode;
use crate::scorers::{AutoencoderParams, IsolationForestParams};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "/etc/aegis-ids/config.json";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Version actuelle du logiciel
    pub version: String,

    /// Interfaces réseau à surveiller (une boucle de détection par interface)
    pub interfaces: Vec<String>,

    /// Mode promiscuous de la capture
    pub promiscuous: bool,

    /// Longueur maximale capturée par paquet
    pub snaplen: i32,

    /// Chemin vers le journal d'alertes
    pub alert_log: String,

    /// Niveau de log
    pub log_level: String,

    /// Mode de journalisation (fichier ou systemd-journal)
    pub log_mode: LogMode,

    /// Paramètres des modèles et de la décision
    pub detection: DetectionConfig,

    /// Source du corpus d'entraînement
    pub training: TrainingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: env!("CARGO_PKG_VERSION").to_string(),
            interfaces: vec!["eth0".to_string()],
            promiscuous: true,
            snaplen: 65535,
            alert_log: "logs/alerts.log".to_string(),
            log_level: "info".to_string(),
            log_mode: LogMode::File,
            detection: DetectionConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

/// Configuration du détecteur hybride
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    /// Dimension du vecteur de caractéristiques (fixée à 10)
    pub feature_dim: usize,
    /// Seuil d'erreur de reconstruction (le réglage le plus sensible)
    pub threshold: f64,
    /// Proportion attendue de points aberrants dans la baseline
    pub contamination: f64,
    /// Nombre d'arbres de l'Isolation Forest
    pub n_estimators: usize,
    pub max_samples: usize,
    /// Couches cachées de l'autoencodeur
    pub hidden_layers: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Graine des deux modèles
    pub seed: u64,
    pub decision_mode: DecisionMode,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let forest = IsolationForestParams::default();
        let autoencoder = AutoencoderParams::default();
        Self {
            feature_dim: FEATURE_DIM,
            threshold: 0.05,
            contamination: forest.contamination,
            n_estimators: forest.n_estimators,
            max_samples: forest.max_samples,
            hidden_layers: autoencoder.hidden_layers,
            epochs: autoencoder.epochs,
            batch_size: autoencoder.batch_size,
            learning_rate: autoencoder.learning_rate,
            seed: forest.seed,
            decision_mode: DecisionMode::ShortCircuit,
        }
    }
}

impl DetectionConfig {
    pub fn isolation_forest_params(&self) -> IsolationForestParams {
        IsolationForestParams {
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            contamination: self.contamination,
            seed: self.seed,
        }
    }

    pub fn autoencoder_params(&self) -> AutoencoderParams {
        AutoencoderParams {
            hidden_layers: self.hidden_layers.clone(),
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }

    /// Vérifie la cohérence des paramètres avant tout entraînement
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.feature_dim != FEATURE_DIM {
            return Err(DetectorError::InvalidConfig(format!(
                "feature_dim vaut {} mais le vecteur de caractéristiques est fixé à {}",
                self.feature_dim, FEATURE_DIM
            )));
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(DetectorError::InvalidConfig(format!(
                "threshold {} invalide",
                self.threshold
            )));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectorError::InvalidConfig(format!(
                "contamination {} hors de ]0, 0.5]",
                self.contamination
            )));
        }
        if self.n_estimators == 0 {
            return Err(DetectorError::InvalidConfig(
                "n_estimators doit être au moins 1".to_string(),
            ));
        }
        if self.max_samples < 2 {
            return Err(DetectorError::InvalidConfig(
                "max_samples doit être au moins 2".to_string(),
            ));
        }
        self.autoencoder_params().validate()
    }
}

/// Source du corpus d'entraînement
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fichier JSON de vecteurs; à défaut, baseline synthétique
    pub corpus_path: Option<String>,
    /// Taille de la baseline synthétique
    pub synthetic_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            synthetic_samples: 500,
        }
    }
}

impl Config {
    /// Charge la configuration depuis le fichier par défaut
    pub fn load() -> Result<Self, Box<dyn Error>> {
        Self::load_or_default(Path::new(CONFIG_FILE))
    }

    /// Charge `path`, ou les valeurs par défaut si le fichier n'existe pas.
    ///
    /// Les valeurs par défaut sont écrites dans `path` quand c'est possible.
    /// Un fichier présent mais illisible ou mal formé reste une erreur.
    pub fn load_or_default(path: &Path) -> Result<Self, Box<dyn Error>> {
        if !path.exists() {
            let default_config = Config::default();
            if let Err(e) = default_config.save_to(path) {
                // La journalisation n'est pas encore initialisée
                eprintln!(
                    "Impossible de créer {} ({}), configuration par défaut en mémoire",
                    path.display(),
                    e
                );
            }
            return Ok(default_config);
        }

        Self::load_from(path)
    }

    /// Charge la configuration depuis un fichier explicite
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn Error>> {
        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Sauvegarde la configuration dans le fichier
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        // Créer le répertoire si nécessaire
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let config_json = serde_json::to_string_pretty(self)?;
        fs::write(path, config_json)?;

        Ok(())
    }
}
