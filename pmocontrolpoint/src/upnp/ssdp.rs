//! Client SSDP du control point.
//!
//! M-SEARCH is sent from an ephemeral-port socket, which also receives the
//! unicast responses. A second socket bound on 1900 (SO_REUSEADDR) listens
//! to multicast NOTIFY alive/byebye; when it cannot be bound, discovery
//! relies on M-SEARCH and max-age expiry only.

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use pmoutils::NetworkInterface;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SSDP_PORT: u16 = 1900;
/// Used when CACHE-CONTROL is missing or unparsable.
pub const DEFAULT_MAX_AGE: u32 = 1800;

const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Événements SSDP intéressants pour un control point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpEvent {
    Alive {
        usn: String,
        nt: String,
        location: String,
        max_age: u32,
        from: SocketAddr,
    },
    ByeBye {
        usn: String,
        nt: String,
        from: SocketAddr,
    },
    SearchResponse {
        usn: String,
        st: String,
        location: String,
        max_age: u32,
        from: SocketAddr,
    },
}

impl SsdpEvent {
    /// `uuid:...` part of the USN.
    pub fn udn(&self) -> &str {
        let usn = match self {
            SsdpEvent::Alive { usn, .. }
            | SsdpEvent::ByeBye { usn, .. }
            | SsdpEvent::SearchResponse { usn, .. } => usn,
        };
        udn_from_usn(usn)
    }
}

pub fn udn_from_usn(usn: &str) -> &str {
    usn.split("::").next().unwrap_or(usn).trim()
}

pub struct SsdpClient {
    search: UdpSocket,
    notify: Option<UdpSocket>,
}

fn join_all(socket: &UdpSocket, interfaces: &[NetworkInterface]) {
    for iface in interfaces {
        match socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, &iface.addr) {
            Ok(()) => debug!(interface = iface.name.as_str(), addr = %iface.addr, "SSDP: joined multicast group"),
            Err(e) => warn!(interface = iface.name.as_str(), error = %e, "SSDP: failed to join multicast group"),
        }
    }
}

impl SsdpClient {
    pub fn new(interfaces: &[NetworkInterface]) -> io::Result<Self> {
        let search = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        search.set_reuse_address(true)?;
        search.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
        let search: UdpSocket = search.into();
        search.set_read_timeout(Some(READ_TIMEOUT))?;
        search.set_multicast_loop_v4(true)?;
        if let Some(first) = interfaces.first() {
            if let Err(e) = Socket::from(search.try_clone()?).set_multicast_if_v4(&first.addr) {
                warn!(interface = first.name.as_str(), error = %e, "SSDP: cannot select multicast interface");
            }
        }
        join_all(&search, interfaces);

        let notify = match Self::bind_notify_socket() {
            Ok(socket) => {
                join_all(&socket, interfaces);
                Some(socket)
            }
            Err(e) => {
                warn!(error = %e, "SSDP: cannot listen on port 1900, NOTIFY announcements ignored");
                None
            }
        };

        info!(
            local = ?search.local_addr().ok(),
            interfaces = interfaces.len(),
            "SSDP client ready"
        );
        Ok(Self { search, notify })
    }

    fn bind_notify_socket() -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, SSDP_PORT)).into())?;
        let socket: UdpSocket = socket.into();
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(socket)
    }

    /// Envoie un M-SEARCH pour un type donné
    pub fn send_msearch(&self, st: &str, mx: u32) -> io::Result<()> {
        let msg = build_msearch(st, mx, &pmoutils::user_agent());
        let target = SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT);
        match self.search.send_to(msg.as_bytes(), target) {
            Ok(_) => {
                debug!(st, mx, "M-SEARCH sent");
                Ok(())
            }
            Err(e) => {
                warn!(st, error = %e, "Failed to send M-SEARCH");
                Err(e)
            }
        }
    }

    /// Waits up to one second for a search response.
    pub fn recv_search(&self) -> io::Result<Option<SsdpEvent>> {
        recv_event(&self.search)
    }

    /// Waits up to one second for a multicast announcement.
    /// Returns `Ok(None)` immediately when no NOTIFY socket is bound.
    pub fn recv_notify(&self) -> io::Result<Option<SsdpEvent>> {
        match &self.notify {
            Some(socket) => recv_event(socket),
            None => Ok(None),
        }
    }

    pub fn listens_notify(&self) -> bool {
        self.notify.is_some()
    }
}

fn recv_event(socket: &UdpSocket) -> io::Result<Option<SsdpEvent>> {
    let mut buf = [0u8; 8192];
    match socket.recv_from(&mut buf) {
        Ok((n, from)) => {
            let data = String::from_utf8_lossy(&buf[..n]);
            Ok(parse_message(&data, from))
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn build_msearch(st: &str, mx: u32, user_agent: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: {}\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR,
        SSDP_PORT,
        mx.max(1),
        st,
        user_agent
    )
}

pub fn parse_message(data: &str, from: SocketAddr) -> Option<SsdpEvent> {
    let mut lines = data.lines();
    let first_line = lines.next()?.trim();
    let upper = first_line.to_ascii_uppercase();
    let headers = parse_headers(lines);

    if upper.starts_with("NOTIFY ") {
        handle_notify(&headers, from)
    } else if upper.starts_with("HTTP/") && upper.contains(" 200") {
        handle_search_response(&headers, from)
    } else {
        // M-SEARCH d'un autre control point, ou message inconnu
        trace!(%from, line = first_line, "Ignoring SSDP message");
        None
    }
}

fn handle_notify(headers: &HashMap<String, String>, from: SocketAddr) -> Option<SsdpEvent> {
    let nts = headers.get("NTS")?.to_ascii_lowercase();
    let nt = headers.get("NT")?.to_string();
    let usn = headers.get("USN")?.to_string();

    match nts.as_str() {
        "ssdp:alive" => {
            let Some(location) = headers.get("LOCATION") else {
                trace!(%from, "NOTIFY ssdp:alive without LOCATION, ignoring");
                return None;
            };
            Some(SsdpEvent::Alive {
                usn,
                nt,
                location: location.to_string(),
                max_age: parse_max_age(headers.get("CACHE-CONTROL")),
                from,
            })
        }
        "ssdp:byebye" => Some(SsdpEvent::ByeBye { usn, nt, from }),
        _ => {
            trace!(%from, nts = nts.as_str(), "Unknown NTS value");
            None
        }
    }
}

fn handle_search_response(headers: &HashMap<String, String>, from: SocketAddr) -> Option<SsdpEvent> {
    let st = headers.get("ST")?.to_string();
    let usn = headers.get("USN")?.to_string();
    let location = headers.get("LOCATION")?.to_string();
    Some(SsdpEvent::SearchResponse {
        usn,
        st,
        location,
        max_age: parse_max_age(headers.get("CACHE-CONTROL")),
        from,
    })
}

fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        // Les valeurs peuvent contenir ':' (URLs)
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_uppercase();
            let value = value.trim();
            if !name.is_empty() && !value.is_empty() {
                headers.insert(name, value.to_string());
            }
        }
    }
    headers
}

fn parse_max_age(value: Option<&String>) -> u32 {
    let Some(v) = value else {
        return DEFAULT_MAX_AGE;
    };
    let lower = v.to_ascii_lowercase();
    if let Some(idx) = lower.find("max-age") {
        let after = lower[idx + 7..].trim_start().trim_start_matches('=').trim_start();
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(age) = digits.parse::<u32>() {
            return age;
        }
    }
    trace!(value = v.as_str(), "Could not parse max-age, using default");
    DEFAULT_MAX_AGE
}
