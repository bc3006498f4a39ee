//! GENA eventing: local NOTIFY listener plus a subscription worker.
//!
//! The worker owns every subscription. Devices are subscribed/unsubscribed
//! through a command channel; incoming NOTIFY requests are matched by
//! callback path and SID, parsed, and fanned out as [`RawNotification`]s.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{IpAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use ureq::{Agent, http};
use xmltree::{Element, XMLNode};

use crate::errors::ControlPointError;
use crate::listeners::ListenerList;
use crate::raw::{NotifyListener, RawNotification};

const RENEWAL_SAFETY_MARGIN_SECS: u64 = 60;
const HTTP_READ_TIMEOUT_SECS: u64 = 5;
const WORKER_LOOP_INTERVAL_MILLIS: u64 = 250;
const ACCEPT_POLL_MILLIS: u64 = 100;
const RETRY_DELAY_SECS: u64 = 15;
const MAX_NOTIFY_BODY_BYTES: usize = 64 * 1024;

/// Service to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventedService {
    pub udn: String,
    pub service_id: String,
    pub event_sub_url: String,
}

enum GenaCommand {
    Subscribe(EventedService),
    UnsubscribeDevice(String),
}

struct IncomingNotify {
    path: String,
    sid: Option<String>,
    seq: u32,
    body: Vec<u8>,
}

pub struct GenaSubscriber {
    commands: Sender<GenaCommand>,
    shutdown: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl GenaSubscriber {
    pub fn start(
        event_timeout: Duration,
        http_timeout: Duration,
        listeners: Arc<ListenerList<dyn NotifyListener>>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind("0.0.0.0:0")?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();
        info!(port, "GENA notify listener bound");

        let shutdown = Arc::new(AtomicBool::new(false));
        let (notify_tx, notify_rx) = unbounded::<IncomingNotify>();
        let (commands, command_rx) = unbounded::<GenaCommand>();

        let http_shutdown = Arc::clone(&shutdown);
        let http_thread = thread::Builder::new()
            .name("gena-http".into())
            .spawn(move || run_http_listener(listener, notify_tx, http_shutdown))?;

        let worker = GenaWorker {
            agent: build_agent(http_timeout),
            event_timeout: Duration::from_secs(event_timeout.as_secs().max(1)),
            listener_port: port,
            commands: command_rx,
            notifications: notify_rx,
            listeners,
            subscriptions: HashMap::new(),
        };
        let worker_shutdown = Arc::clone(&shutdown);
        let worker_thread = thread::Builder::new()
            .name("gena-worker".into())
            .spawn(move || worker.run(worker_shutdown))?;

        Ok(Self {
            commands,
            shutdown,
            threads: Mutex::new(vec![http_thread, worker_thread]),
        })
    }

    pub fn subscribe(&self, service: EventedService) {
        let _ = self.commands.send(GenaCommand::Subscribe(service));
    }

    pub fn unsubscribe_device(&self, udn: &str) {
        let _ = self.commands.send(GenaCommand::UnsubscribeDevice(udn.to_string()));
    }

    /// Unsubscribes everything and joins both threads.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in threads {
            let _ = handle.join();
        }
    }
}

impl Drop for GenaSubscriber {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_http_listener(listener: TcpListener, notify_tx: Sender<IncomingNotify>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((mut stream, from)) => {
                trace!(%from, "Incoming GENA connection");
                if let Err(err) = stream.set_nonblocking(false) {
                    warn!(error = %err, "Failed to make notify connection blocking");
                    continue;
                }
                if let Err(err) = stream.set_read_timeout(Some(Duration::from_secs(HTTP_READ_TIMEOUT_SECS))) {
                    warn!(error = %err, "Failed to set read timeout on notify connection");
                }
                handle_connection(&mut stream, &notify_tx);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(ACCEPT_POLL_MILLIS));
            }
            Err(err) => {
                warn!(error = %err, "Incoming notify connection failed");
                thread::sleep(Duration::from_millis(ACCEPT_POLL_MILLIS));
            }
        }
    }
    debug!("GENA notify listener stopped");
}

fn handle_connection(stream: &mut TcpStream, notify_tx: &Sender<IncomingNotify>) {
    match read_http_request(&mut *stream) {
        Ok(request) => {
            if request.method != "NOTIFY" {
                let _ = write_http_response(stream, 405, "Method Not Allowed");
                return;
            }
            let seq = request
                .headers
                .get("seq")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            let notify = IncomingNotify {
                path: request.path,
                sid: request.headers.get("sid").cloned(),
                seq,
                body: request.body,
            };
            if notify_tx.send(notify).is_err() {
                warn!("Dropping notify event because worker channel is closed");
            }
            let _ = write_http_response(stream, 200, "OK");
        }
        Err(RequestError::BodyTooLarge(length)) => {
            warn!(length, "Rejecting oversized notify request");
            let _ = write_http_response(stream, 413, "Payload Too Large");
        }
        Err(err) => {
            warn!(error = %err, "Failed to parse incoming notify request");
            let _ = write_http_response(stream, 400, "Bad Request");
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("request body of {0} bytes exceeds the notify limit")]
    BodyTooLarge(usize),
}

struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn read_http_request<R: Read>(stream: R) -> Result<HttpRequest, RequestError> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "missing request line").into());
    }

    let request_line = request_line.trim_end_matches(&['\r', '\n'][..]);
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing method"))?
        .to_ascii_uppercase();
    let path = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing path"))?
        .to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    if content_length > MAX_NOTIFY_BODY_BYTES {
        return Err(RequestError::BodyTooLarge(content_length));
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    Ok(HttpRequest {
        method,
        path,
        headers,
        body,
    })
}

fn write_http_response(stream: &mut TcpStream, status: u16, message: &str) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status, message
    );
    stream.write_all(response.as_bytes())
}

struct Subscription {
    service: EventedService,
    callback_path: String,
    sid: Option<String>,
    expires_at: Option<Instant>,
    retry_after: Instant,
}

impl Subscription {
    fn new(service: EventedService) -> Self {
        Self {
            callback_path: build_callback_path(&service.udn, &service.service_id),
            service,
            sid: None,
            expires_at: None,
            retry_after: Instant::now(),
        }
    }

    fn defer_retry(&mut self) {
        self.sid = None;
        self.expires_at = None;
        self.retry_after = Instant::now() + Duration::from_secs(RETRY_DELAY_SECS);
    }
}

struct GenaWorker {
    agent: Agent,
    event_timeout: Duration,
    listener_port: u16,
    commands: Receiver<GenaCommand>,
    notifications: Receiver<IncomingNotify>,
    listeners: Arc<ListenerList<dyn NotifyListener>>,
    // indexé par chemin de callback
    subscriptions: HashMap<String, Subscription>,
}

impl GenaWorker {
    fn run(mut self, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::SeqCst) {
            match self
                .commands
                .recv_timeout(Duration::from_millis(WORKER_LOOP_INTERVAL_MILLIS))
            {
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            while let Ok(command) = self.commands.try_recv() {
                self.handle_command(command);
            }
            while let Ok(notify) = self.notifications.try_recv() {
                self.handle_notification(notify);
            }
            self.subscribe_pending();
            self.renew_expiring();
        }

        let paths: Vec<String> = self.subscriptions.keys().cloned().collect();
        for path in paths {
            if let Some(mut subscription) = self.subscriptions.remove(&path) {
                self.unsubscribe(&mut subscription);
            }
        }
        debug!("GENA worker stopped");
    }

    fn handle_command(&mut self, command: GenaCommand) {
        match command {
            GenaCommand::Subscribe(service) => {
                let subscription = Subscription::new(service);
                if !self.subscriptions.contains_key(&subscription.callback_path) {
                    self.subscriptions
                        .insert(subscription.callback_path.clone(), subscription);
                }
            }
            GenaCommand::UnsubscribeDevice(udn) => {
                let paths: Vec<String> = self
                    .subscriptions
                    .iter()
                    .filter(|(_, s)| s.service.udn == udn)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in paths {
                    if let Some(mut subscription) = self.subscriptions.remove(&path) {
                        self.unsubscribe(&mut subscription);
                    }
                }
            }
        }
    }

    fn subscribe_pending(&mut self) {
        let now = Instant::now();
        let agent = &self.agent;
        let port = self.listener_port;
        let timeout = self.event_timeout;
        for subscription in self.subscriptions.values_mut() {
            if subscription.sid.is_some() || subscription.retry_after > now {
                continue;
            }
            if let Err(err) = subscribe(agent, port, timeout, subscription) {
                warn!(
                    udn = subscription.service.udn.as_str(),
                    service = subscription.service.service_id.as_str(),
                    error = %err,
                    "SUBSCRIBE failed"
                );
                subscription.defer_retry();
            }
        }
    }

    fn renew_expiring(&mut self) {
        let limit = Instant::now() + Duration::from_secs(RENEWAL_SAFETY_MARGIN_SECS);
        let agent = &self.agent;
        let timeout = self.event_timeout;
        for subscription in self.subscriptions.values_mut() {
            let Some(expires_at) = subscription.expires_at else {
                continue;
            };
            if expires_at > limit {
                continue;
            }
            if let Err(err) = renew(agent, timeout, subscription) {
                warn!(
                    udn = subscription.service.udn.as_str(),
                    service = subscription.service.service_id.as_str(),
                    error = %err,
                    "Failed to renew subscription"
                );
                // on repart d'un SUBSCRIBE neuf
                subscription.sid = None;
                subscription.expires_at = None;
                subscription.retry_after = Instant::now();
            }
        }
    }

    fn unsubscribe(&self, subscription: &mut Subscription) {
        let Some(sid) = subscription.sid.take() else {
            return;
        };
        let url = subscription.service.event_sub_url.as_str();
        let Some(host_header) = host_header(url) else {
            return;
        };
        let request = match http::Request::builder()
            .method("UNSUBSCRIBE")
            .uri(url)
            .header("HOST", host_header)
            .header("SID", sid)
            .body(())
        {
            Ok(request) => request,
            Err(err) => {
                warn!(url, error = %err, "Failed to build UNSUBSCRIBE request");
                return;
            }
        };
        match self.agent.run(request) {
            Ok(response) if response.status().is_success() => {
                debug!(udn = subscription.service.udn.as_str(), "Unsubscribed");
            }
            Ok(response) => {
                debug!(url, status = %response.status(), "UNSUBSCRIBE returned non-success status");
            }
            Err(err) => {
                debug!(url, error = %err, "UNSUBSCRIBE request failed");
            }
        }
    }

    fn handle_notification(&mut self, notify: IncomingNotify) {
        let Some(subscription) = self.subscriptions.get(&notify.path) else {
            debug!(path = notify.path.as_str(), "Dropping notify for unknown path");
            return;
        };

        let sid_matches = match (&notify.sid, &subscription.sid) {
            (Some(received), Some(expected)) => expected.eq_ignore_ascii_case(received),
            _ => false,
        };
        if !sid_matches {
            debug!(
                udn = subscription.service.udn.as_str(),
                expected_sid = subscription.sid.as_deref().unwrap_or("none"),
                received_sid = notify.sid.as_deref().unwrap_or("none"),
                "Ignoring notify with mismatched SID"
            );
            return;
        }

        let properties = match parse_property_set(&notify.body) {
            Ok(properties) => properties,
            Err(err) => {
                warn!(udn = subscription.service.udn.as_str(), error = %err, "Malformed property set");
                return;
            }
        };

        for (variable, value) in properties {
            let notification = RawNotification {
                udn: subscription.service.udn.clone(),
                service_id: subscription.service.service_id.clone(),
                sequence: notify.seq,
                variable,
                value,
            };
            trace!(
                udn = notification.udn.as_str(),
                variable = notification.variable.as_str(),
                seq = notification.sequence,
                "Notify"
            );
            self.listeners
                .for_each("notify", |listener| listener.on_notify(&notification));
        }
    }
}

fn subscribe(
    agent: &Agent,
    listener_port: u16,
    event_timeout: Duration,
    subscription: &mut Subscription,
) -> Result<(), ControlPointError> {
    let url = subscription.service.event_sub_url.as_str();
    let (remote_host, remote_port) = parse_host_port(url)
        .ok_or_else(|| ControlPointError::http(format!("cannot extract host from {}", url)))?;
    let local_ip = pmoutils::local_ip_for(&remote_host, remote_port)?;
    let callback_url = format!(
        "http://{}:{}{}",
        format_ip(&local_ip),
        listener_port,
        subscription.callback_path
    );

    let request = http::Request::builder()
        .method("SUBSCRIBE")
        .uri(url)
        .header("HOST", format!("{}:{}", remote_host, remote_port))
        .header("USER-AGENT", pmoutils::user_agent())
        .header("CALLBACK", format!("<{}>", callback_url))
        .header("NT", "upnp:event")
        .header("TIMEOUT", format!("Second-{}", event_timeout.as_secs()))
        .body(())
        .map_err(ControlPointError::http)?;

    let response = agent.run(request)?;
    if !response.status().is_success() {
        return Err(ControlPointError::http(format!(
            "SUBSCRIBE returned HTTP {}",
            response.status()
        )));
    }

    let sid = response
        .headers()
        .get("SID")
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ControlPointError::http("SUBSCRIBE response missing SID"))?;
    let timeout = parse_timeout(
        response.headers().get("TIMEOUT").and_then(|value| value.to_str().ok()),
        event_timeout,
    )
    .unwrap_or(event_timeout);

    info!(
        udn = subscription.service.udn.as_str(),
        service = subscription.service.service_id.as_str(),
        timeout_secs = timeout.as_secs(),
        "Subscribed to events"
    );
    subscription.sid = Some(sid);
    subscription.expires_at = Some(Instant::now() + timeout);
    Ok(())
}

fn renew(agent: &Agent, event_timeout: Duration, subscription: &mut Subscription) -> Result<(), ControlPointError> {
    let url = subscription.service.event_sub_url.as_str();
    let sid = subscription
        .sid
        .clone()
        .ok_or_else(|| ControlPointError::http("SID missing for renew"))?;
    let host = host_header(url)
        .ok_or_else(|| ControlPointError::http(format!("cannot extract host from {}", url)))?;

    let request = http::Request::builder()
        .method("SUBSCRIBE")
        .uri(url)
        .header("HOST", host)
        .header("SID", sid)
        .header("TIMEOUT", format!("Second-{}", event_timeout.as_secs()))
        .body(())
        .map_err(ControlPointError::http)?;

    let response = agent.run(request)?;
    if !response.status().is_success() {
        return Err(ControlPointError::http(format!(
            "SUBSCRIBE renewal failed with {}",
            response.status()
        )));
    }

    let timeout = parse_timeout(
        response.headers().get("TIMEOUT").and_then(|value| value.to_str().ok()),
        event_timeout,
    )
    .unwrap_or(event_timeout);
    subscription.expires_at = Some(Instant::now() + timeout);
    debug!(udn = subscription.service.udn.as_str(), "Renewed subscription");
    Ok(())
}

/// `<e:propertyset><e:property><Var>value</Var></e:property>...` as (name, value) pairs.
pub fn parse_property_set(body: &[u8]) -> Result<Vec<(String, String)>, ControlPointError> {
    let root = Element::parse(body)?;
    let mut properties = Vec::new();
    for property in xml_children(&root) {
        for variable in xml_children(property) {
            let value = variable.get_text().map(|t| t.into_owned()).unwrap_or_default();
            properties.push((variable.name.clone(), value));
        }
    }
    Ok(properties)
}

fn xml_children(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(elem) => Some(elem),
        _ => None,
    })
}

fn build_callback_path(udn: &str, service_id: &str) -> String {
    let mut sanitized = String::new();
    for ch in udn.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch);
        } else {
            sanitized.push('_');
        }
    }

    let mut hasher = DefaultHasher::new();
    udn.hash(&mut hasher);
    service_id.hash(&mut hasher);
    format!("/gena/{}-{:x}", sanitized, hasher.finish())
}

/// `Second-N` or `Second-infinite` (mapped to `requested`).
pub fn parse_timeout(raw: Option<&str>, requested: Duration) -> Option<Duration> {
    let lower = raw?.trim().to_ascii_lowercase();
    if lower == "second-infinite" {
        return Some(requested);
    }
    let idx = lower.find("second-")?;
    lower[idx + 7..].parse::<u64>().ok().map(Duration::from_secs)
}

pub fn parse_host_port(url: &str) -> Option<(String, u16)> {
    let default_port = if url.to_ascii_lowercase().starts_with("https://") {
        443
    } else {
        80
    };
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split('/').next()?.trim();
    if authority.starts_with('[') {
        let end = authority.find(']')?;
        let host = &authority[1..end];
        let port = match authority.get(end + 1..).and_then(|r| r.strip_prefix(':')) {
            Some(port) => port.parse().ok()?,
            None => default_port,
        };
        Some((host.to_string(), port))
    } else if let Some((host, port)) = authority.split_once(':') {
        Some((host.to_string(), port.parse().ok()?))
    } else {
        Some((authority.to_string(), default_port))
    }
}

fn host_header(url: &str) -> Option<String> {
    parse_host_port(url).map(|(host, port)| {
        if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        }
    })
}

fn format_ip(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}

pub(crate) fn build_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .allow_non_standard_methods(true)
        .build()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout() {
        let requested = Duration::from_secs(300);
        assert_eq!(parse_timeout(Some("Second-1800"), requested), Some(Duration::from_secs(1800)));
        assert_eq!(parse_timeout(Some("second-infinite"), requested), Some(requested));
        assert_eq!(parse_timeout(Some("bogus"), requested), None);
        assert_eq!(parse_timeout(None, requested), None);
    }

    #[test]
    fn test_read_http_request() {
        let raw = b"NOTIFY /gena/x HTTP/1.1\r\nSID: uuid:sub-1\r\nSEQ: 3\r\nContent-Length: 5\r\n\r\nhello";
        let request = read_http_request(&raw[..]).unwrap();
        assert_eq!(request.method, "NOTIFY");
        assert_eq!(request.path, "/gena/x");
        assert_eq!(request.headers.get("sid").map(String::as_str), Some("uuid:sub-1"));
        assert_eq!(request.body, b"hello");
    }

    #[test]
    fn test_read_http_request_caps_body() {
        let raw = b"NOTIFY /gena/x HTTP/1.1\r\nContent-Length: 1000000000000\r\n\r\n<e:propertyset/>";
        assert!(matches!(
            read_http_request(&raw[..]),
            Err(RequestError::BodyTooLarge(1_000_000_000_000))
        ));

        let limit = format!(
            "NOTIFY /gena/x HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_NOTIFY_BODY_BYTES + 1
        );
        assert!(matches!(
            read_http_request(limit.as_bytes()),
            Err(RequestError::BodyTooLarge(_))
        ));
    }

    #[test]
    fn test_parse_host_port() {
        assert_eq!(parse_host_port("http://10.0.0.2:8200/evt"), Some(("10.0.0.2".to_string(), 8200)));
        assert_eq!(parse_host_port("http://nas/evt"), Some(("nas".to_string(), 80)));
        assert_eq!(parse_host_port("http://[fe80::1]:49152/e"), Some(("fe80::1".to_string(), 49152)));
        assert_eq!(parse_host_port("not a url"), None);
    }

    #[test]
    fn test_callback_path_is_stable_and_url_safe() {
        let a = build_callback_path("uuid:1234-5678", "urn:upnp-org:serviceId:ContentDirectory");
        let b = build_callback_path("uuid:1234-5678", "urn:upnp-org:serviceId:ContentDirectory");
        let c = build_callback_path("uuid:1234-5678", "urn:upnp-org:serviceId:AVTransport");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("/gena/uuid_1234_5678-"));
    }

    #[test]
    fn test_parse_property_set() {
        let body = br#"<?xml version="1.0"?>
        <e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
          <e:property><SystemUpdateID>12</SystemUpdateID></e:property>
          <e:property><ContainerUpdateIDs>1,5,64,2</ContainerUpdateIDs></e:property>
          <e:property><Empty/></e:property>
        </e:propertyset>"#;
        let properties = parse_property_set(body).unwrap();
        assert_eq!(
            properties,
            vec![
                ("SystemUpdateID".to_string(), "12".to_string()),
                ("ContainerUpdateIDs".to_string(), "1,5,64,2".to_string()),
                ("Empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_read_notify_request() {
        let raw = b"NOTIFY /gena/x HTTP/1.1\r\nHOST: 10.0.0.5:4000\r\nSID: uuid:sub-1\r\nSEQ: 7\r\nContent-Length: 5\r\n\r\nhello";
        let request = read_http_request(&raw[..]).unwrap();
        assert_eq!(request.method, "NOTIFY");
        assert_eq!(request.path, "/gena/x");
        assert_eq!(request.headers.get("seq").map(String::as_str), Some("7"));
        assert_eq!(request.body, b"hello");
    }
}
