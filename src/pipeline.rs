//! Boucle de détection en flux
//!
//! Chaque paquet est entièrement traité (extraction -> détection -> alerte)
//! avant que le suivant soit accepté. Rien n'est conservé entre deux paquets
//! hormis des compteurs.

use crate::detector::HybridDetector;
use crate::features;
use crate::logger::AlertLogger;
use crate::models::{AlertLogEntry, PacketRecord, Verdict};
use log::{debug, error, info};
use std::io;
use std::sync::Arc;

/// Destination persistante des alertes
pub trait AlertSink: Send + Sync {
    fn record(&self, entry: &AlertLogEntry) -> io::Result<()>;
}

impl AlertSink for AlertLogger {
    fn record(&self, entry: &AlertLogEntry) -> io::Result<()> {
        self.append(entry)
    }
}

/// Compteurs d'une boucle de détection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub packets_seen: u64,
    /// Paquets non IP ou incohérents
    pub skipped: u64,
    pub analyzed: u64,
    pub alerts: u64,
    pub sink_failures: u64,
}

/// Boucle de détection pour une source de capture
pub struct StreamPipeline {
    detector: Arc<HybridDetector>,
    sink: Arc<dyn AlertSink>,
    /// Afficher les alertes sur la sortie standard
    console: bool,
    stats: PipelineStats,
}

impl StreamPipeline {
    pub fn new(detector: Arc<HybridDetector>, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            detector,
            sink,
            console: true,
            stats: PipelineStats::default(),
        }
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Traite un paquet. Retourne le verdict lorsqu'une détection a eu lieu.
    pub fn handle_packet(&mut self, packet: &PacketRecord) -> Option<Verdict> {
        self.stats.packets_seen += 1;

        let (Some(ip), Some(vector)) = (packet.ip, features::extract(packet)) else {
            self.stats.skipped += 1;
            return None;
        };

        self.stats.analyzed += 1;
        let verdict = self.detector.detect(&vector);

        if verdict.is_threat {
            self.stats.alerts += 1;
            let entry = AlertLogEntry::now(&ip, &verdict);

            if self.console {
                println!(
                    "[{}] 🚨 ALERTE {}: {} | {} -> {}",
                    entry.timestamp, entry.severity, entry.reason, entry.source_ip, entry.dest_ip
                );
            }

            // Une alerte perdue ne doit pas arrêter le capteur
            if let Err(e) = self.sink.record(&entry) {
                self.stats.sink_failures += 1;
                error!("Impossible d'écrire l'alerte {} -> {}: {}", entry.source_ip, entry.dest_ip, e);
            }
        } else {
            debug!("{} -> {}: {}", ip.source_ip, ip.dest_ip, verdict.reason);
        }

        Some(verdict)
    }

    /// Journalise le bilan de la boucle
    pub fn log_summary(&self, source: &str) {
        info!(
            "Bilan {}: {} paquets, {} ignorés, {} analysés, {} alertes, {} échecs d'écriture",
            source,
            self.stats.packets_seen,
            self.stats.skipped,
            self.stats.analyzed,
            self.stats.alerts,
            self.stats.sink_failures
        );
    }
}
