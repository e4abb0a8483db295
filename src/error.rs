//! Erreurs du moteur de détection et de la capture

use thiserror::Error;

/// Erreurs liées à la construction et à l'entraînement du détecteur
#[derive(Error, Debug)]
pub enum DetectorError {
    /// Un modèle est utilisé avant d'avoir été entraîné
    #[error("Modèle non entraîné: {0}")]
    Untrained(&'static str),

    #[error("Configuration invalide: {0}")]
    InvalidConfig(String),

    #[error("Corpus d'entraînement vide")]
    EmptyCorpus,

    #[error("Corpus invalide (échantillon {index}): {reason}")]
    InvalidCorpus { index: usize, reason: String },

    #[error("Erreur d'E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erreur JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Erreurs fatales de la source de capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Interface {0} introuvable")]
    DeviceNotFound(String),

    #[error("Permission refusée sur {0}: lancez le capteur en root ou avec la capacité CAP_NET_RAW")]
    PermissionDenied(String),

    #[error("Erreur pcap: {0}")]
    Pcap(#[from] pcap::Error),
}
