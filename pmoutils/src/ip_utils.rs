use get_if_addrs::get_if_addrs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::debug;

/// Interface réseau IPv4 utilisable pour la découverte multicast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub addr: Ipv4Addr,
}

/// Devine l'adresse IP locale de la machine.
///
/// Crée un socket UDP lié à `0.0.0.0:0` et le "connecte" vers `8.8.8.8:80` :
/// aucun paquet n'est émis, mais le système choisit l'interface de sortie.
/// En cas d'échec, retourne `"127.0.0.1"`.
pub fn guess_local_ip() -> String {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip().to_string();
                }
            }
            "127.0.0.1".to_string()
        }
        Err(_) => "127.0.0.1".to_string(),
    }
}

/// Adresse locale que le système utiliserait pour joindre `remote_host:remote_port`.
///
/// Utilisé pour construire l'URL de callback des abonnements GENA.
pub fn local_ip_for(remote_host: &str, remote_port: u16) -> io::Result<IpAddr> {
    let is_ipv6 = remote_host.contains(':') && !remote_host.contains('.');
    let target = if is_ipv6 {
        format!(
            "[{}]:{}",
            remote_host.trim_matches(|c| c == '[' || c == ']'),
            remote_port
        )
    } else {
        format!("{}:{}", remote_host, remote_port)
    };
    let bind_addr = if is_ipv6 { "[::]:0" } else { "0.0.0.0:0" };
    let socket = UdpSocket::bind(bind_addr)?;
    socket.connect(&target)?;
    Ok(socket.local_addr()?.ip())
}

/// Liste les interfaces IPv4 non-loopback.
///
/// Si `names` est fourni et non vide, seules les interfaces dont le nom y figure
/// sont retournées. Une liste vide ou `None` signifie "toutes les interfaces".
pub fn usable_interfaces(names: Option<&[String]>) -> io::Result<Vec<NetworkInterface>> {
    let wanted = names.filter(|n| !n.is_empty());
    let mut result = Vec::new();

    for iface in get_if_addrs()? {
        let IpAddr::V4(addr) = iface.ip() else {
            continue;
        };
        if addr.is_loopback() {
            continue;
        }
        if let Some(wanted) = wanted {
            if !wanted.iter().any(|n| n == &iface.name) {
                debug!(interface = iface.name.as_str(), "Interface not selected, skipping");
                continue;
            }
        }
        let candidate = NetworkInterface {
            name: iface.name,
            addr,
        };
        if !result.contains(&candidate) {
            result.push(candidate);
        }
    }

    Ok(result)
}
