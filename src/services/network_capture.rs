use crate::error::CaptureError;
use crate::models::{IpHeader, PacketRecord, TransportHeader};
use log::{info, warn};
use pcap::{Activated, Capture, Device};
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Délai de lecture pcap: borne le temps de réaction à une demande d'arrêt
const READ_TIMEOUT_MS: i32 = 1000;

/// Taille de l'en-tête Linux cooked capture (SLL)
const SLL_HEADER_LEN: usize = 16;

/// Source de paquets
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Capture en direct sur une interface
    Interface {
        name: String,
        promiscuous: bool,
        snaplen: i32,
    },
    /// Relecture d'un fichier pcap
    File(PathBuf),
}

impl CaptureSource {
    pub fn label(&self) -> String {
        match self {
            Self::Interface { name, .. } => name.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Couche liaison des trames capturées
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    RawIp,
    LinuxSll,
}

impl LinkLayer {
    /// Traduit un code DLT libpcap
    pub fn from_dlt(code: i32) -> Self {
        match code {
            1 => Self::Ethernet,
            12 | 14 | 101 | 228 | 229 => Self::RawIp,
            113 => Self::LinuxSll,
            other => {
                warn!("Type de liaison {} non géré, décodage Ethernet par défaut", other);
                Self::Ethernet
            }
        }
    }
}

/// Bilan d'une capture terminée
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub packets: u64,
    /// Fin de fichier atteinte (relecture)
    pub exhausted: bool,
}

/// Capture les paquets d'une source et les remet un par un à `on_packet`.
///
/// Bloquant. S'arrête quand `stop` passe à vrai, en fin de fichier, ou sur une
/// erreur fatale de la source. Aucun paquet n'est conservé après le rappel.
pub fn run_capture<F>(source: &CaptureSource, stop: &AtomicBool, on_packet: F) -> Result<CaptureSummary, CaptureError>
where
    F: FnMut(&PacketRecord),
{
    match source {
        CaptureSource::Interface {
            name,
            promiscuous,
            snaplen,
        } => {
            let device = find_device(name)?;
            let mut capture = Capture::from_device(device)
                .and_then(|c| {
                    c.promisc(*promiscuous)
                        .snaplen(*snaplen)
                        .timeout(READ_TIMEOUT_MS)
                        .immediate_mode(true)
                        .open()
                })
                .map_err(|e| classify_open_error(name, e))?;

            info!("Démarrage de la capture sur l'interface {}", name);
            let link = LinkLayer::from_dlt(capture.get_datalink().0);
            drain(&mut capture, link, stop, on_packet)
        }
        CaptureSource::File(path) => {
            let mut capture = Capture::from_file(path)?;
            info!("Relecture du fichier {}", path.display());
            let link = LinkLayer::from_dlt(capture.get_datalink().0);
            drain(&mut capture, link, stop, on_packet)
        }
    }
}

fn find_device(name: &str) -> Result<Device, CaptureError> {
    Device::list()?
        .into_iter()
        .find(|d| d.name == name)
        .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))
}

fn classify_open_error(name: &str, error: pcap::Error) -> CaptureError {
    let message = error.to_string().to_lowercase();
    if message.contains("permission") || message.contains("not permitted") {
        CaptureError::PermissionDenied(name.to_string())
    } else {
        CaptureError::Pcap(error)
    }
}

fn drain<T, F>(
    capture: &mut Capture<T>,
    link: LinkLayer,
    stop: &AtomicBool,
    mut on_packet: F,
) -> Result<CaptureSummary, CaptureError>
where
    T: Activated + ?Sized,
    F: FnMut(&PacketRecord),
{
    let mut summary = CaptureSummary::default();

    while !stop.load(Ordering::SeqCst) {
        match capture.next_packet() {
            Ok(packet) => {
                let record = parse_frame(packet.data, packet.header.len as usize, link);
                summary.packets += 1;
                on_packet(&record);
            }
            // Ignorer les erreurs de timeout
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(pcap::Error::NoMorePackets) => {
                summary.exhausted = true;
                break;
            }
            Err(e) => return Err(CaptureError::Pcap(e)),
        }
    }

    Ok(summary)
}

/// Décode une trame brute en PacketRecord. Une trame non IP donne `ip: None`.
pub fn parse_frame(data: &[u8], wire_len: usize, link: LinkLayer) -> PacketRecord {
    let network = match link {
        LinkLayer::Ethernet => parse_ethernet(data),
        LinkLayer::RawIp => match data.first().map(|b| b >> 4) {
            Some(4) => Some((EtherTypes::Ipv4, data)),
            Some(6) => Some((EtherTypes::Ipv6, data)),
            _ => None,
        },
        LinkLayer::LinuxSll => {
            if data.len() < SLL_HEADER_LEN {
                None
            } else {
                let ethertype = EtherType(u16::from_be_bytes([data[14], data[15]]));
                Some((ethertype, &data[SLL_HEADER_LEN..]))
            }
        }
    };

    let (ip, transport) = match network {
        Some((ethertype, payload)) => parse_network(ethertype, payload),
        None => (None, None),
    };

    PacketRecord::new(wire_len.max(data.len()), ip, transport)
}

fn parse_ethernet(data: &[u8]) -> Option<(EtherType, &[u8])> {
    let ethernet = EthernetPacket::new(data)?;
    let header_len = data.len() - ethernet.payload().len();

    match ethernet.get_ethertype() {
        EtherTypes::Vlan => {
            // Une seule étiquette 802.1Q
            let vlan = VlanPacket::new(&data[header_len..])?;
            let vlan_header_len = data.len() - header_len - vlan.payload().len();
            Some((vlan.get_ethertype(), &data[header_len + vlan_header_len..]))
        }
        ethertype => Some((ethertype, &data[header_len..])),
    }
}

fn parse_network(ethertype: EtherType, payload: &[u8]) -> (Option<IpHeader>, Option<TransportHeader>) {
    match ethertype {
        EtherTypes::Ipv4 => {
            let Some(ipv4) = Ipv4Packet::new(payload) else {
                return (None, None);
            };
            if ipv4.get_version() != 4 || ipv4.get_header_length() < 5 {
                return (None, None);
            }
            let protocol = ipv4.get_next_level_protocol();
            let header = IpHeader {
                source_ip: IpAddr::V4(ipv4.get_source()),
                dest_ip: IpAddr::V4(ipv4.get_destination()),
                protocol: protocol.0,
                ttl: ipv4.get_ttl(),
            };
            (Some(header), parse_transport(protocol, ipv4.payload()))
        }
        EtherTypes::Ipv6 => {
            let Some(ipv6) = Ipv6Packet::new(payload) else {
                return (None, None);
            };
            if ipv6.get_version() != 6 {
                return (None, None);
            }
            let protocol = ipv6.get_next_header();
            let header = IpHeader {
                source_ip: IpAddr::V6(ipv6.get_source()),
                dest_ip: IpAddr::V6(ipv6.get_destination()),
                protocol: protocol.0,
                ttl: ipv6.get_hop_limit(),
            };
            (Some(header), parse_transport(protocol, ipv6.payload()))
        }
        _ => (None, None),
    }
}

fn parse_transport(protocol: IpNextHeaderProtocol, payload: &[u8]) -> Option<TransportHeader> {
    match protocol {
        IpNextHeaderProtocols::Tcp => Some(match TcpPacket::new(payload) {
            Some(tcp) if tcp.get_data_offset() >= 5 => TransportHeader::Tcp {
                source_port: tcp.get_source(),
                dest_port: tcp.get_destination(),
                flags: u16::from(tcp.get_flags()),
                window: tcp.get_window(),
            },
            _ => TransportHeader::Truncated { protocol: protocol.0 },
        }),
        IpNextHeaderProtocols::Udp => Some(match UdpPacket::new(payload) {
            Some(udp) => TransportHeader::Udp {
                source_port: udp.get_source(),
                dest_port: udp.get_destination(),
            },
            None => TransportHeader::Truncated { protocol: protocol.0 },
        }),
        _ => None,
    }
}
