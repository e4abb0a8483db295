use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::SystemTime;

/// Format d'horodatage du journal d'alertes
pub const ALERT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// En-tête IP d'un paquet capturé
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpHeader {
    pub source_ip: IpAddr,
    pub dest_ip: IpAddr,
    /// Numéro de protocole (IPv4) ou next header (IPv6)
    pub protocol: u8,
    /// TTL (IPv4) ou hop limit (IPv6)
    pub ttl: u8,
}

/// Couche transport, lorsqu'elle a pu être décodée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportHeader {
    Tcp {
        source_port: u16,
        dest_port: u16,
        flags: u16,
        window: u16,
    },
    Udp {
        source_port: u16,
        dest_port: u16,
    },
    /// Protocole TCP ou UDP annoncé mais en-tête tronqué ou invalide
    Truncated {
        protocol: u8,
    },
}

/// Paquet structuré produit par la capture
///
/// Éphémère: il n'est conservé que le temps de son traitement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketRecord {
    pub timestamp: SystemTime,
    /// Longueur totale de la trame sur le fil
    pub length: usize,
    pub ip: Option<IpHeader>,
    pub transport: Option<TransportHeader>,
}

impl PacketRecord {
    pub fn new(length: usize, ip: Option<IpHeader>, transport: Option<TransportHeader>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            length,
            ip,
            transport,
        }
    }
}

/// Gravité d'un verdict. L'ordre des variantes donne Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            other => Err(format!("Gravité inconnue: {}", other)),
        }
    }
}

/// Décision du détecteur hybride pour un vecteur de caractéristiques
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_threat: bool,
    pub severity: Severity,
    /// Modèle ayant déclenché et, pour l'autoencodeur, l'erreur de reconstruction
    pub reason: String,
    /// Erreur de reconstruction, si elle a été calculée
    pub reconstruction_error: Option<f64>,
}

impl Verdict {
    pub fn normal(reconstruction_error: Option<f64>) -> Self {
        Self {
            is_threat: false,
            severity: Severity::Low,
            reason: "Normal".to_string(),
            reconstruction_error,
        }
    }
}

/// Ligne du journal d'alertes: `timestamp,source_ip,destination_ip,severity,reason`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub timestamp: String,
    pub source_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub severity: Severity,
    pub reason: String,
}

impl AlertLogEntry {
    /// Crée une entrée horodatée à l'instant de la détection
    pub fn now(ip: &IpHeader, verdict: &Verdict) -> Self {
        Self {
            timestamp: chrono::Local::now().format(ALERT_TIME_FORMAT).to_string(),
            source_ip: ip.source_ip,
            dest_ip: ip.dest_ip,
            severity: verdict.severity,
            reason: verdict.reason.clone(),
        }
    }

    /// Ligne CSV sans retour à la ligne final
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.timestamp, self.source_ip, self.dest_ip, self.severity, self.reason
        )
    }

    /// Relit une ligne du journal. La raison peut contenir des virgules:
    /// elle occupe tout le reste de la ligne.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.trim_end_matches(['\r', '\n']).splitn(5, ',');
        let timestamp = fields.next()?.to_string();
        let source_ip = fields.next()?.parse().ok()?;
        let dest_ip = fields.next()?.parse().ok()?;
        let severity = fields.next()?.parse().ok()?;
        let reason = fields.next()?.to_string();

        chrono::NaiveDateTime::parse_from_str(&timestamp, ALERT_TIME_FORMAT).ok()?;

        Some(Self {
            timestamp,
            source_ip,
            dest_ip,
            severity,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);

        let mut severities = vec![Severity::Medium, Severity::High, Severity::Low];
        severities.sort();
        assert_eq!(severities, vec![Severity::Low, Severity::Medium, Severity::High]);
    }

    #[test]
    fn test_alert_line_keeps_commas_in_reason() {
        let entry = AlertLogEntry {
            timestamp: "2024-05-01 12:30:00".to_string(),
            source_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            dest_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            severity: Severity::Medium,
            reason: "Autoencoder (Zero-Day Pattern, Error: 0.1234)".to_string(),
        };

        let line = entry.to_line();
        assert_eq!(
            line,
            "2024-05-01 12:30:00,10.0.0.5,10.0.0.1,Medium,Autoencoder (Zero-Day Pattern, Error: 0.1234)"
        );
        assert_eq!(AlertLogEntry::parse_line(&line), Some(entry));
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(AlertLogEntry::parse_line("").is_none());
        assert!(AlertLogEntry::parse_line("hier,1.1.1.1,2.2.2.2,High,x").is_none());
        assert!(AlertLogEntry::parse_line("2024-05-01 12:30:00,1.1.1.1,2.2.2.2,Critical,x").is_none());
    }
}
