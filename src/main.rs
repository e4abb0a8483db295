mod cli;

use aegis_ids::corpus::training_corpus;
use aegis_ids::log_mode::init_logging;
use aegis_ids::logger::read_recent_alerts;
use aegis_ids::services::{run_capture, CaptureSource, CaptureSummary};
use aegis_ids::config::CONFIG_FILE;
use aegis_ids::{AlertLogger, AlertSink, CaptureError, Config, HybridDetector, PipelineStats, StreamPipeline};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use log::{error, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

type CaptureOutcome = Result<(PipelineStats, CaptureSummary), CaptureError>;

#[tokio::main]
async fn main() -> Result<()> {
    // Analyser les arguments de ligne de commande
    let cli = Cli::parse();

    // Charger la configuration pour déterminer le mode de log
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .map_err(|e| anyhow!("Impossible de lire la configuration {}: {}", path.display(), e))?,
        None => Config::load()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("Configuration invalide dans {}", CONFIG_FILE))?,
    };

    init_logging(config.log_mode, &config.log_level);
    cli.apply_overrides(&mut config);

    match cli.command {
        Command::Start => run_live(config).await,
        Command::Replay { file } => run_replay(config, file).await,
        Command::Alerts { count } => show_alerts(Path::new(&config.alert_log), count),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Entraîne le détecteur. Toute erreur ici est fatale: aucune capture sans modèles.
fn build_detector(config: &Config) -> Result<Arc<HybridDetector>> {
    let corpus = training_corpus(&config.training, config.detection.seed)
        .context("Impossible de préparer le corpus d'entraînement")?;
    let detector = HybridDetector::train(&config.detection, &corpus)
        .context("Échec de l'entraînement du détecteur")?;
    Ok(Arc::new(detector))
}

fn install_stop_handler(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interruption reçue, arrêt des captures...");
            stop.store(true, Ordering::SeqCst);
        }
    });
}

/// Lance une boucle de détection sur un thread bloquant dédié
fn spawn_pipeline(
    source: CaptureSource,
    detector: Arc<HybridDetector>,
    sink: Arc<dyn AlertSink>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<CaptureOutcome> {
    tokio::task::spawn_blocking(move || {
        let mut pipeline = StreamPipeline::new(detector, sink);
        let result = run_capture(&source, &stop, |packet| {
            pipeline.handle_packet(packet);
        });
        pipeline.log_summary(&source.label());
        result.map(|summary| (pipeline.stats(), summary))
    })
}

async fn run_live(config: Config) -> Result<()> {
    if config.interfaces.is_empty() {
        bail!("Aucune interface à surveiller (option --interface ou champ \"interfaces\")");
    }

    let detector = build_detector(&config)?;
    let logger = Arc::new(AlertLogger::new(&config.alert_log));
    let stop = Arc::new(AtomicBool::new(false));

    print_banner(&config);
    install_stop_handler(stop.clone());

    let mut handles = Vec::new();
    for name in &config.interfaces {
        let source = CaptureSource::Interface {
            name: name.clone(),
            promiscuous: config.promiscuous,
            snaplen: config.snaplen,
        };
        handles.push((name.clone(), spawn_pipeline(source, detector.clone(), logger.clone(), stop.clone())));
    }

    let total = handles.len();
    let mut failures = 0;
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok((stats, _))) => {
                info!("Capture sur {} terminée ({} alertes)", name, stats.alerts);
            }
            Ok(Err(e)) => {
                failures += 1;
                report_capture_error(&name, &e);
            }
            Err(e) => {
                failures += 1;
                error!("La boucle de capture {} s'est arrêtée anormalement: {}", name, e);
            }
        }
    }

    if failures == total {
        bail!("Aucune interface n'a pu être surveillée");
    }
    Ok(())
}

async fn run_replay(config: Config, file: PathBuf) -> Result<()> {
    let detector = build_detector(&config)?;
    let logger = Arc::new(AlertLogger::new(&config.alert_log));
    let stop = Arc::new(AtomicBool::new(false));
    install_stop_handler(stop.clone());

    let label = file.display().to_string();
    let handle = spawn_pipeline(CaptureSource::File(file), detector, logger, stop);

    match handle.await? {
        Ok((stats, summary)) => {
            println!(
                "Relecture de {} {}: {} paquets, {} analysés, {} ignorés, {} alertes",
                label,
                if summary.exhausted { "terminée" } else { "interrompue" },
                stats.packets_seen,
                stats.analyzed,
                stats.skipped,
                stats.alerts
            );
            if stats.sink_failures > 0 {
                warn!("{} alertes n'ont pas pu être écrites dans {}", stats.sink_failures, config.alert_log);
            }
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Échec de la relecture de {}", label)),
    }
}

fn report_capture_error(name: &str, error: &CaptureError) {
    error!("Capture sur {} impossible: {}", name, error);

    if let CaptureError::DeviceNotFound(_) = error {
        match pcap::Device::list() {
            Ok(devices) => {
                let names: Vec<String> = devices.into_iter().map(|d| d.name).collect();
                eprintln!("Interfaces disponibles: {}", names.join(", "));
            }
            Err(e) => eprintln!("Impossible de lister les interfaces: {}", e),
        }
    }
}

fn show_alerts(path: &Path, count: usize) -> Result<()> {
    let alerts = match read_recent_alerts(path, count) {
        Ok(alerts) => alerts,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            println!("Aucune alerte enregistrée ({} absent)", path.display());
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Lecture de {}", path.display())),
    };

    if alerts.is_empty() {
        println!("Aucune alerte enregistrée");
    }
    for alert in alerts {
        println!(
            "[{}] {:<6} {} | {} -> {}",
            alert.timestamp, alert.severity, alert.reason, alert.source_ip, alert.dest_ip
        );
    }
    Ok(())
}

fn print_banner(config: &Config) {
    println!("=== Aegis IDS v{} ===", env!("CARGO_PKG_VERSION"));
    println!("Interfaces surveillées: {}", config.interfaces.join(", "));
    println!(
        "Seuil de reconstruction: {} | contamination: {} | mode: {:?}",
        config.detection.threshold, config.detection.contamination, config.detection.decision_mode
    );
    println!("Journal d'alertes: {}", config.alert_log);
    println!("Ctrl+C pour arrêter");
}
