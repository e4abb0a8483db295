//! Extraction des caractéristiques d'un paquet
//!
//! Chaque paquet IP est résumé par un vecteur de 10 valeurs normalisées dans [0, 1].
//! L'ordre et la normalisation font partie du contrat avec les modèles entraînés:
//! les modifier invalide tout modèle existant.

use crate::models::{PacketRecord, TransportHeader};
use serde::{Deserialize, Serialize};

/// Dimension fixe du vecteur de caractéristiques
pub const FEATURE_DIM: usize = 10;

/// Valeur des emplacements réservés aux métriques futures
pub const PLACEHOLDER: f64 = 0.5;

const MAX_PROTOCOL: f64 = 255.0;
const MAX_LENGTH: usize = 1500;
const MAX_TTL: f64 = 255.0;
const MAX_PORT: f64 = 65535.0;
const MAX_TCP_FLAGS: u16 = 255;
const MAX_WINDOW: f64 = 65535.0;

const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

/// Vecteur de caractéristiques normalisé, immuable une fois produit
///
/// Ordre: `[protocol, length, ttl, src_port, dst_port, tcp_flags, window, réservé x3]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_DIM]);

impl FeatureVector {
    /// Construit un vecteur en vérifiant que chaque composante est dans [0, 1]
    pub fn new(values: [f64; FEATURE_DIM]) -> Option<Self> {
        if values.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)) {
            Some(Self(values))
        } else {
            None
        }
    }

    /// Construit un vecteur depuis une tranche de longueur quelconque
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let array: [f64; FEATURE_DIM] = values.try_into().ok()?;
        Self::new(array)
    }

    pub fn values(&self) -> &[f64; FEATURE_DIM] {
        &self.0
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Extrait le vecteur de caractéristiques d'un paquet.
///
/// Retourne `None` pour un paquet non IP ou incohérent: le paquet est alors
/// simplement ignoré par la détection.
pub fn extract(packet: &PacketRecord) -> Option<FeatureVector> {
    let ip = packet.ip?;

    let (src_port, dst_port, flags, window) = match packet.transport {
        Some(TransportHeader::Tcp {
            source_port,
            dest_port,
            flags,
            window,
        }) => {
            // Couche TCP annoncée sur un autre protocole: en-têtes incohérents
            if ip.protocol != IPPROTO_TCP {
                return None;
            }
            (source_port, dest_port, flags, window)
        }
        Some(TransportHeader::Udp {
            source_port,
            dest_port,
        }) => {
            if ip.protocol != IPPROTO_UDP {
                return None;
            }
            (source_port, dest_port, 0, 0)
        }
        Some(TransportHeader::Truncated { .. }) => return None,
        None => (0, 0, 0, 0),
    };

    if packet.length == 0 {
        return None;
    }

    FeatureVector::new([
        f64::from(ip.protocol) / MAX_PROTOCOL,
        packet.length.min(MAX_LENGTH) as f64 / MAX_LENGTH as f64,
        f64::from(ip.ttl) / MAX_TTL,
        f64::from(src_port) / MAX_PORT,
        f64::from(dst_port) / MAX_PORT,
        // Le bit NS (9e bit) dépasse la plage d'un octet
        f64::from(flags.min(MAX_TCP_FLAGS)) / f64::from(MAX_TCP_FLAGS),
        f64::from(window) / MAX_WINDOW,
        PLACEHOLDER,
        PLACEHOLDER,
        PLACEHOLDER,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IpHeader;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn ip(protocol: u8, ttl: u8) -> IpHeader {
        IpHeader {
            source_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            dest_ip: IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)),
            protocol,
            ttl,
        }
    }

    #[test]
    fn test_tcp_syn_packet() {
        let packet = PacketRecord::new(
            60,
            Some(ip(6, 64)),
            Some(TransportHeader::Tcp {
                source_port: 443,
                dest_port: 51000,
                flags: 2,
                window: 8192,
            }),
        );

        let features = extract(&packet).expect("paquet TCP valide");
        let v = features.values();
        assert!((v[0] - 6.0 / 255.0).abs() < 1e-12);
        assert!((v[1] - 60.0 / 1500.0).abs() < 1e-12);
        assert!((v[2] - 64.0 / 255.0).abs() < 1e-12);
        assert!((v[3] - 443.0 / 65535.0).abs() < 1e-12);
        assert!((v[4] - 51000.0 / 65535.0).abs() < 1e-12);
        assert!((v[5] - 2.0 / 255.0).abs() < 1e-12);
        assert!((v[6] - 8192.0 / 65535.0).abs() < 1e-12);
        assert_eq!(&v[7..], &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_udp_packet_has_no_flags_or_window() {
        let packet = PacketRecord::new(
            120,
            Some(ip(17, 128)),
            Some(TransportHeader::Udp {
                source_port: 53,
                dest_port: 40000,
            }),
        );

        let v = *extract(&packet).unwrap().values();
        assert_eq!(v[5], 0.0);
        assert_eq!(v[6], 0.0);
        assert!(v[3] > 0.0 && v[4] > 0.0);
    }

    #[test]
    fn test_ip_without_transport_defaults_ports_to_zero() {
        let packet = PacketRecord::new(84, Some(ip(1, 64)), None);
        let v = *extract(&packet).unwrap().values();
        assert_eq!(&v[3..7], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_length_is_capped() {
        let packet = PacketRecord::new(9000, Some(ip(17, 64)), None);
        assert_eq!(extract(&packet).unwrap().values()[1], 1.0);
    }

    #[test]
    fn test_non_ip_packet_is_skipped() {
        let packet = PacketRecord::new(42, None, None);
        assert!(extract(&packet).is_none());
    }

    #[test]
    fn test_inconsistent_headers_are_skipped() {
        let packet = PacketRecord::new(
            60,
            Some(ip(17, 64)),
            Some(TransportHeader::Tcp {
                source_port: 1,
                dest_port: 2,
                flags: 2,
                window: 1024,
            }),
        );
        assert!(extract(&packet).is_none());
        assert!(extract(&PacketRecord::new(0, Some(ip(6, 64)), None)).is_none());

        let truncated = PacketRecord::new(
            38,
            Some(ip(6, 64)),
            Some(TransportHeader::Truncated { protocol: 6 }),
        );
        assert!(extract(&truncated).is_none());
    }

    #[test]
    fn test_ns_flag_stays_in_range() {
        let packet = PacketRecord::new(
            60,
            Some(ip(6, 64)),
            Some(TransportHeader::Tcp {
                source_port: 1,
                dest_port: 2,
                flags: 0x1FF,
                window: 65535,
            }),
        );
        let v = *extract(&packet).unwrap().values();
        assert_eq!(v[5], 1.0);
        assert_eq!(v[6], 1.0);
    }

    #[test]
    fn test_random_packets_are_normalized() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..2000 {
            let v6 = rng.random_bool(0.3);
            let (source_ip, dest_ip) = if v6 {
                (IpAddr::V6(Ipv6Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::UNSPECIFIED))
            } else {
                (IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V4(Ipv4Addr::BROADCAST))
            };
            let (protocol, transport) = match rng.random_range(0..3) {
                0 => (
                    6,
                    Some(TransportHeader::Tcp {
                        source_port: rng.random(),
                        dest_port: rng.random(),
                        flags: rng.random_range(0..512),
                        window: rng.random(),
                    }),
                ),
                1 => (
                    17,
                    Some(TransportHeader::Udp {
                        source_port: rng.random(),
                        dest_port: rng.random(),
                    }),
                ),
                _ => (rng.random(), None),
            };
            let header = IpHeader {
                source_ip,
                dest_ip,
                protocol,
                ttl: rng.random(),
            };
            let packet = PacketRecord::new(rng.random_range(1..70000), Some(header), transport);

            let features = extract(&packet).expect("paquet IP valide");
            assert_eq!(features.as_slice().len(), FEATURE_DIM);
            assert!(features.values().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_feature_vector_rejects_out_of_range() {
        assert!(FeatureVector::new([0.5; FEATURE_DIM]).is_some());
        assert!(FeatureVector::new([1.5; FEATURE_DIM]).is_none());
        assert!(FeatureVector::from_slice(&[f64::NAN; FEATURE_DIM]).is_none());
        assert!(FeatureVector::from_slice(&[0.1; 9]).is_none());
    }
}
