use aegis_ids::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aegis-ids")]
#[command(author, version, about = "Détection hybride d'anomalies réseau (Isolation Forest + autoencodeur)")]
pub struct Cli {
    /// Fichier de configuration (défaut: /etc/aegis-ids/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Seuil d'erreur de reconstruction
    #[arg(short, long, global = true)]
    pub threshold: Option<f64>,

    /// Proportion attendue de points aberrants
    #[arg(long, global = true)]
    pub contamination: Option<f64>,

    /// Nombre d'arbres de l'Isolation Forest
    #[arg(long, global = true)]
    pub estimators: Option<usize>,

    /// Interface à surveiller (répétable)
    #[arg(short, long = "interface", global = true)]
    pub interfaces: Vec<String>,

    /// Chemin du journal d'alertes
    #[arg(long, global = true)]
    pub alert_log: Option<String>,

    /// Corpus d'entraînement JSON
    #[arg(long, global = true)]
    pub corpus: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Démarrer la capture en direct
    Start,

    /// Rejouer un fichier pcap à travers le détecteur
    Replay {
        /// Fichier pcap
        file: PathBuf,
    },

    /// Afficher les dernières alertes
    Alerts {
        /// Nombre d'alertes
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Afficher la configuration effective
    Config,
}

impl Cli {
    /// Applique les options de la ligne de commande sur la configuration chargée
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(threshold) = self.threshold {
            config.detection.threshold = threshold;
        }
        if let Some(contamination) = self.contamination {
            config.detection.contamination = contamination;
        }
        if let Some(estimators) = self.estimators {
            config.detection.n_estimators = estimators;
        }
        if !self.interfaces.is_empty() {
            config.interfaces = self.interfaces.clone();
        }
        if let Some(alert_log) = &self.alert_log {
            config.alert_log = alert_log.clone();
        }
        if let Some(corpus) = &self.corpus {
            config.training.corpus_path = Some(corpus.clone());
        }
    }
}
