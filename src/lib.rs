//! Bibliothèque Aegis IDS pour la détection d'anomalies réseau
//!
//! Chaque paquet IP capturé est résumé par un vecteur de caractéristiques
//! normalisé, puis évalué par deux modèles complémentaires: une Isolation Forest
//! pour les points aberrants évidents et un autoencodeur pour les motifs
//! inconnus (zero-day). Les menaces sont affichées et ajoutées à un journal CSV.

// Modèles de données et extraction
pub mod models;   // Structures de données (paquets, verdicts, alertes)
pub mod features; // Vecteur de caractéristiques
pub mod corpus;   // Corpus d'entraînement

// Détection
pub mod scorers;  // Isolation Forest et autoencodeur
pub mod detector; // Détecteur hybride

// Services
pub mod pipeline; // Boucle de détection en flux
pub mod logger;   // Journal d'alertes
pub mod services; // Capture réseau

pub mod config;
pub mod error;
pub mod log_mode; // Modes de journalisation

// Re-export des structures principales pour faciliter l'utilisation
pub use config::{Config, DetectionConfig, TrainingConfig};
pub use detector::{DecisionMode, DetectorState, HybridDetector};
pub use error::{CaptureError, DetectorError};
pub use features::{extract, FeatureVector, FEATURE_DIM};
pub use log_mode::LogMode;
pub use logger::AlertLogger;
pub use models::{AlertLogEntry, IpHeader, PacketRecord, Severity, TransportHeader, Verdict};
pub use pipeline::{AlertSink, PipelineStats, StreamPipeline};
pub use scorers::{OutlierScorer, OutlierVerdict, ReconstructionScorer};
