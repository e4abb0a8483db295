use aegis_ids::corpus::synthetic_baseline;
use aegis_ids::scorers::{Autoencoder, AutoencoderParams, IsolationForest, IsolationForestParams};
use aegis_ids::{
    AlertLogEntry, AlertLogger, AlertSink, DecisionMode, DetectionConfig, DetectorError, FeatureVector,
    HybridDetector, IpHeader, OutlierScorer, OutlierVerdict, PacketRecord, ReconstructionScorer, Severity,
    StreamPipeline, TransportHeader, FEATURE_DIM,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

struct AlwaysOutlier(bool);

impl OutlierScorer for AlwaysOutlier {
    fn fit(&mut self, _corpus: &[FeatureVector]) -> Result<(), DetectorError> {
        Ok(())
    }

    fn predict(&self, _vector: &FeatureVector) -> OutlierVerdict {
        if self.0 {
            OutlierVerdict::Outlier
        } else {
            OutlierVerdict::Inlier
        }
    }

    fn is_fitted(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Isolation Forest"
    }
}

struct ConstantError(f64);

impl ReconstructionScorer for ConstantError {
    fn fit(&mut self, _corpus: &[FeatureVector]) -> Result<(), DetectorError> {
        Ok(())
    }

    fn reconstruct(&self, vector: &FeatureVector) -> [f64; FEATURE_DIM] {
        *vector.values()
    }

    fn reconstruction_error(&self, _vector: &FeatureVector) -> f64 {
        self.0
    }

    fn is_fitted(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Autoencoder"
    }
}

/// Journal qui refuse une écriture donnée puis délègue au vrai journal
struct FlakySink {
    inner: AlertLogger,
    fail_on: usize,
    calls: AtomicUsize,
}

impl AlertSink for FlakySink {
    fn record(&self, entry: &AlertLogEntry) -> io::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on {
            return Err(io::Error::new(io::ErrorKind::Other, "disque plein"));
        }
        self.inner.append(entry)
    }
}

fn trained_detector() -> HybridDetector {
    let config = DetectionConfig::default();
    HybridDetector::train(&config, &synthetic_baseline(500, config.seed)).unwrap()
}

fn fake_detector(outlier: bool, error: f64) -> HybridDetector {
    HybridDetector::new(AlwaysOutlier(outlier), ConstantError(error), 0.05, DecisionMode::ShortCircuit).unwrap()
}

fn tcp_packet(source: Ipv4Addr, flags: u16) -> PacketRecord {
    PacketRecord::new(
        60,
        Some(IpHeader {
            source_ip: IpAddr::V4(source),
            dest_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            protocol: 6,
            ttl: 64,
        }),
        Some(TransportHeader::Tcp {
            source_port: 443,
            dest_port: 51000,
            flags,
            window: 8192,
        }),
    )
}

fn random_packet(rng: &mut StdRng) -> PacketRecord {
    let transport = if rng.random_bool(0.5) {
        (
            6,
            Some(TransportHeader::Tcp {
                source_port: rng.random(),
                dest_port: rng.random(),
                flags: rng.random_range(0..256),
                window: rng.random(),
            }),
        )
    } else {
        (
            17,
            Some(TransportHeader::Udp {
                source_port: rng.random(),
                dest_port: rng.random(),
            }),
        )
    };

    PacketRecord::new(
        rng.random_range(40..1500),
        Some(IpHeader {
            source_ip: IpAddr::V4(Ipv4Addr::from(rng.random::<u32>())),
            dest_ip: IpAddr::V4(Ipv4Addr::from(rng.random::<u32>())),
            protocol: transport.0,
            ttl: rng.random(),
        }),
        transport.1,
    )
}

fn log_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_single_packet_logs_only_threats() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("logs/alerts.log");
    let logger = Arc::new(AlertLogger::new(&path));
    let detector = Arc::new(trained_detector());

    let packet = tcp_packet(Ipv4Addr::new(192, 168, 1, 20), 2);
    let vector = aegis_ids::extract(&packet).unwrap();
    let expected = detector.detect(&vector);

    let mut pipeline = StreamPipeline::new(detector, logger).with_console(false);
    let verdict = pipeline.handle_packet(&packet).unwrap();
    assert_eq!(verdict, expected);

    let lines = log_lines(&path);
    assert_eq!(lines.len(), usize::from(verdict.is_threat));
    if let Some(line) = lines.first() {
        let entry = AlertLogEntry::parse_line(line).unwrap();
        assert_eq!(entry.source_ip, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)));
        assert_eq!(entry.severity, verdict.severity);
        assert_eq!(entry.reason, verdict.reason);
    }
}

#[test]
fn test_single_forced_outlier_writes_one_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("logs/alerts.log");
    let logger = Arc::new(AlertLogger::new(&path));
    let mut pipeline = StreamPipeline::new(Arc::new(fake_detector(true, 0.0)), logger).with_console(false);

    let verdict = pipeline.handle_packet(&tcp_packet(Ipv4Addr::new(192, 168, 1, 20), 2)).unwrap();
    assert!(verdict.is_threat);

    let lines = log_lines(&path);
    assert_eq!(lines.len(), 1);
    let entry = AlertLogEntry::parse_line(&lines[0]).unwrap();
    assert_eq!(entry.source_ip, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)));
    assert_eq!(entry.dest_ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(entry.severity, Severity::High);
    assert_eq!(entry.reason, "Isolation Forest (Anomaly)");
}

#[test]
fn test_single_forced_normal_writes_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("logs/alerts.log");
    let logger = Arc::new(AlertLogger::new(&path));
    let mut pipeline = StreamPipeline::new(Arc::new(fake_detector(false, 0.0)), logger).with_console(false);

    let verdict = pipeline.handle_packet(&tcp_packet(Ipv4Addr::new(192, 168, 1, 20), 2)).unwrap();
    assert!(!verdict.is_threat);
    assert_eq!(verdict.severity, Severity::Low);

    assert!(log_lines(&path).is_empty());
    assert_eq!(pipeline.stats().alerts, 0);
}

#[test]
fn test_stream_counts_match_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("alerts.log");
    let logger = Arc::new(AlertLogger::new(&path));
    let mut pipeline = StreamPipeline::new(Arc::new(trained_detector()), logger).with_console(false);

    let mut rng = StdRng::seed_from_u64(2024);
    let packets = std::iter::repeat_with(move || random_packet(&mut rng)).take(1000);

    let mut threats = 0;
    for packet in packets {
        if pipeline.handle_packet(&packet).is_some_and(|v| v.is_threat) {
            threats += 1;
        }
    }

    let stats = pipeline.stats();
    assert_eq!(stats.packets_seen, 1000);
    assert_eq!(stats.analyzed, 1000);
    assert_eq!(stats.alerts, threats);
    assert_eq!(stats.sink_failures, 0);
    assert_eq!(log_lines(&path).len() as u64, threats);
}

#[test]
fn test_sink_failure_does_not_stop_pipeline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("alerts.log");
    let sink = Arc::new(FlakySink {
        inner: AlertLogger::new(&path),
        fail_on: 1,
        calls: AtomicUsize::new(0),
    });
    let mut pipeline = StreamPipeline::new(Arc::new(fake_detector(true, 0.0)), sink).with_console(false);

    for i in 0..3 {
        let verdict = pipeline.handle_packet(&tcp_packet(Ipv4Addr::new(10, 9, 9, i), 2)).unwrap();
        assert_eq!(verdict.severity, Severity::High);
    }

    let lines = log_lines(&path);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(",10.9.9.0,"));
    assert!(lines[1].contains(",10.9.9.2,"));
    assert_eq!(pipeline.stats().alerts, 3);
    assert_eq!(pipeline.stats().sink_failures, 1);
}

#[test]
fn test_training_is_deterministic() {
    let a = trained_detector();
    let b = trained_detector();

    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..200 {
        let vector = aegis_ids::extract(&random_packet(&mut rng)).unwrap();
        let verdict = a.detect(&vector);
        assert_eq!(verdict, a.detect(&vector));
        assert_eq!(verdict, b.detect(&vector));
    }
}

#[test]
fn test_raising_threshold_never_adds_threats() {
    let base = trained_detector();
    let thresholds = [0.0, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0];
    let detectors: Vec<HybridDetector> = thresholds.iter().map(|t| base.with_threshold(*t).unwrap()).collect();

    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..300 {
        let vector = aegis_ids::extract(&random_packet(&mut rng)).unwrap();
        let flags: Vec<bool> = detectors.iter().map(|d| d.detect(&vector).is_threat).collect();
        for pair in flags.windows(2) {
            // Menace au seuil haut implique menace au seuil bas
            assert!(!pair[1] || pair[0]);
        }
    }
}

#[test]
fn test_outlier_is_high_regardless_of_error() {
    let vector = FeatureVector::new([0.5; FEATURE_DIM]).unwrap();
    for error in [0.0, 0.04, 0.3, 1.0] {
        let verdict = fake_detector(true, error).detect(&vector);
        assert!(verdict.is_threat);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.reason, "Isolation Forest (Anomaly)");
    }
}

#[test]
fn test_reconstruction_alert_embeds_error() {
    let vector = FeatureVector::new([0.5; FEATURE_DIM]).unwrap();

    let verdict = fake_detector(false, 0.0712).detect(&vector);
    assert!(verdict.is_threat);
    assert_eq!(verdict.severity, Severity::Medium);
    assert_eq!(verdict.reason, "Autoencoder (Zero-Day Pattern, Error: 0.0712)");

    let verdict = fake_detector(false, 0.02).detect(&vector);
    assert!(!verdict.is_threat);
    assert_eq!(verdict.severity, Severity::Low);
    assert_eq!(verdict.reason, "Normal");
}

#[test]
fn test_untrained_models_are_rejected() {
    let result = HybridDetector::new(
        IsolationForest::new(IsolationForestParams::default()),
        Autoencoder::new(AutoencoderParams::default()),
        0.05,
        DecisionMode::ShortCircuit,
    );
    assert!(matches!(result, Err(DetectorError::Untrained("Isolation Forest"))));

    let result = HybridDetector::new(
        AlwaysOutlier(false),
        Autoencoder::new(AutoencoderParams::default()),
        0.05,
        DecisionMode::ShortCircuit,
    );
    assert!(matches!(result, Err(DetectorError::Untrained("Autoencoder"))));
}

#[test]
fn test_empty_corpus_is_rejected() {
    let result = HybridDetector::train(&DetectionConfig::default(), &[]);
    assert!(matches!(result, Err(DetectorError::EmptyCorpus)));
}
