//! Control point brut UPnP : SSDP, descriptions, SOAP et GENA.
//!
//! [`UpnpControlPoint`] implements [`RawControlPoint`] with plain threads:
//!
//! - `ssdp-search` / `ssdp-notify` read SSDP traffic,
//! - `upnp-describe` fetches device descriptions and SCPDs,
//! - `upnp-maintenance` expires silent devices and re-searches periodically,
//! - the GENA subscriber runs its own listener and worker.

mod description;
mod device;
mod gena;
mod soap;
mod ssdp;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::{Mutex, RwLock};
use pmoconfig::Config;
use tracing::{debug, info, warn};
use ureq::Agent;

use crate::errors::ControlPointError;
use crate::icon::{IconSelector, ScoredIconSelector};
use crate::listeners::ListenerList;
use crate::raw::{
    DiscoveryListener, NotifyListener, RawControlPoint, RawControlPointFactory, RawDevice,
};

pub use description::{
    DeviceDescription, Scpd, ServiceDescription, parse_description, parse_scpd, resolve_url,
};
pub use device::{UpnpDevice, UpnpService};
pub use gena::{EventedService, parse_property_set};
pub use soap::{build_soap_request, parse_action_response};
pub use ssdp::{SsdpEvent, parse_message};

const RESEARCH_INTERVAL: Duration = Duration::from_secs(120);
const MAINTENANCE_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpOptions {
    pub http_timeout: Duration,
    pub search_mx: u32,
    pub search_targets: Vec<String>,
    /// Interfaces used when the factory is given none; empty means all.
    pub interfaces: Vec<String>,
    pub event_timeout: Duration,
}

impl Default for UpnpOptions {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(5),
            search_mx: 3,
            search_targets: vec![
                "ssdp:all".to_string(),
                "urn:schemas-upnp-org:device:MediaServer:1".to_string(),
                "urn:schemas-upnp-org:device:MediaRenderer:1".to_string(),
            ],
            interfaces: Vec::new(),
            event_timeout: Duration::from_secs(300),
        }
    }
}

impl UpnpOptions {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            http_timeout: config
                .get_http_timeout_secs()
                .map(|s| Duration::from_secs(s.max(1) as u64))
                .unwrap_or(defaults.http_timeout),
            search_mx: config
                .get_search_mx()
                .map(|mx| mx.clamp(1, 5) as u32)
                .unwrap_or(defaults.search_mx),
            search_targets: config
                .get_search_targets()
                .ok()
                .filter(|targets| !targets.is_empty())
                .unwrap_or(defaults.search_targets),
            interfaces: config.get_interfaces().unwrap_or(defaults.interfaces),
            event_timeout: config
                .get_event_timeout_secs()
                .map(|s| Duration::from_secs(s.max(1) as u64))
                .unwrap_or(defaults.event_timeout),
        }
    }
}

struct TrackedDevice {
    device: Arc<UpnpDevice>,
    // None pour un device épinglé : il n'expire jamais
    expires_at: Option<Instant>,
}

/// State that outlives a single initialize/terminate cycle.
struct Shared {
    running: AtomicBool,
    devices: RwLock<HashMap<String, TrackedDevice>>,
    discovery_listeners: ListenerList<dyn DiscoveryListener>,
    notify_listeners: Arc<ListenerList<dyn NotifyListener>>,
    icon_selector: RwLock<Arc<dyn IconSelector>>,
}

struct FetchRequest {
    location: String,
    max_age: u32,
}

/// Everything the worker threads of one session need.
struct Engine {
    options: UpnpOptions,
    agent: Agent,
    shared: Arc<Shared>,
    ssdp: ssdp::SsdpClient,
    gena: gena::GenaSubscriber,
    fetch_tx: Sender<FetchRequest>,
    pending: Mutex<HashSet<String>>,
    shutdown: AtomicBool,
}

impl Engine {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn send_search(&self) -> Result<(), ControlPointError> {
        for target in &self.options.search_targets {
            self.ssdp.send_msearch(target, self.options.search_mx)?;
        }
        Ok(())
    }

    fn handle_event(&self, event: ssdp::SsdpEvent) {
        if !self.shared.running.load(Ordering::SeqCst) {
            return;
        }
        match event {
            ssdp::SsdpEvent::Alive {
                ref usn,
                ref location,
                max_age,
                ..
            }
            | ssdp::SsdpEvent::SearchResponse {
                ref usn,
                ref location,
                max_age,
                ..
            } => self.on_alive(ssdp::udn_from_usn(usn), location, max_age),
            ssdp::SsdpEvent::ByeBye { ref usn, .. } => {
                self.remove_device(ssdp::udn_from_usn(usn), "byebye");
            }
        }
    }

    fn on_alive(&self, udn: &str, location: &str, max_age: u32) {
        let stale = {
            let mut devices = self.shared.devices.write();
            match devices.get_mut(udn) {
                Some(tracked) if tracked.device.location() == location => {
                    if tracked.expires_at.is_some() {
                        tracked.expires_at = Some(Instant::now() + Duration::from_secs(max_age as u64));
                    }
                    return;
                }
                Some(tracked) if tracked.expires_at.is_none() => return,
                Some(_) => true,
                None => false,
            }
        };
        if stale {
            // la description a changé d'URL : on repart de zéro
            self.remove_device(udn, "location changed");
        }

        if !self.pending.lock().insert(location.to_string()) {
            return;
        }
        let request = FetchRequest {
            location: location.to_string(),
            max_age,
        };
        if self.fetch_tx.send(request).is_err() {
            self.pending.lock().remove(location);
        }
    }

    fn remove_device(&self, udn: &str, reason: &str) {
        let removed = self.shared.devices.write().remove(udn);
        let Some(tracked) = removed else {
            return;
        };
        info!(udn, reason, name = tracked.device.friendly_name(), "Device lost");
        self.gena.unsubscribe_device(udn);
        let device: Arc<dyn RawDevice> = tracked.device;
        self.shared
            .discovery_listeners
            .for_each("lost", |listener| listener.on_lost(Arc::clone(&device)));
    }

    /// Fetches `location` and registers every unknown device it describes.
    fn describe(&self, location: &str, max_age: Option<u32>) -> Result<usize, ControlPointError> {
        let xml = description::fetch_text(&self.agent, location)?;
        let descriptions = description::parse_description(&xml, location)?;

        let mut added = 0;
        for desc in descriptions {
            if self.shared.devices.read().contains_key(&desc.udn) {
                continue;
            }
            let device = Arc::new(self.build_device(desc, location));
            let expires_at = max_age.map(|age| Instant::now() + Duration::from_secs(age as u64));
            {
                let mut devices = self.shared.devices.write();
                if devices.contains_key(device.udn()) {
                    continue;
                }
                devices.insert(
                    device.udn().to_string(),
                    TrackedDevice {
                        device: Arc::clone(&device),
                        expires_at,
                    },
                );
            }

            for service in device.services() {
                let desc = service.description();
                if !desc.event_sub_url.is_empty() {
                    self.gena.subscribe(EventedService {
                        udn: device.udn().to_string(),
                        service_id: desc.service_id.clone(),
                        event_sub_url: desc.event_sub_url.clone(),
                    });
                }
            }

            info!(
                udn = device.udn(),
                device_type = device.device_type(),
                name = device.friendly_name(),
                "Device discovered"
            );
            added += 1;
            let device: Arc<dyn RawDevice> = device;
            self.shared
                .discovery_listeners
                .for_each("discover", |listener| listener.on_discover(Arc::clone(&device)));
        }
        Ok(added)
    }

    fn build_device(&self, desc: DeviceDescription, location: &str) -> UpnpDevice {
        let services = desc
            .services
            .iter()
            .map(|service| {
                let scpd = if service.scpd_url.is_empty() {
                    None
                } else {
                    match description::fetch_text(&self.agent, &service.scpd_url)
                        .and_then(|xml| description::parse_scpd(&xml))
                    {
                        Ok(scpd) => Some(scpd),
                        Err(err) => {
                            warn!(
                                udn = desc.udn.as_str(),
                                service = service.service_id.as_str(),
                                error = %err,
                                "Cannot read SCPD, assuming every action"
                            );
                            None
                        }
                    }
                };
                Arc::new(UpnpService::new(self.agent.clone(), service.clone(), scpd))
            })
            .collect();
        UpnpDevice::new(desc, location.to_string(), services)
    }

    fn expire(&self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .shared
            .devices
            .read()
            .iter()
            .filter(|(_, tracked)| tracked.expires_at.is_some_and(|at| at <= now))
            .map(|(udn, _)| udn.clone())
            .collect();
        for udn in expired {
            self.remove_device(&udn, "max-age expired");
        }
    }
}

fn run_search_receiver(engine: Arc<Engine>) {
    while !engine.is_shutdown() {
        match engine.ssdp.recv_search() {
            Ok(Some(event)) => engine.handle_event(event),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "SSDP search socket error");
                thread::sleep(MAINTENANCE_TICK);
            }
        }
    }
}

fn run_notify_receiver(engine: Arc<Engine>) {
    while !engine.is_shutdown() {
        match engine.ssdp.recv_notify() {
            Ok(Some(event)) => engine.handle_event(event),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "SSDP notify socket error");
                thread::sleep(MAINTENANCE_TICK);
            }
        }
    }
}

fn run_describer(engine: Arc<Engine>, requests: Receiver<FetchRequest>) {
    while !engine.is_shutdown() {
        let request = match requests.recv_timeout(MAINTENANCE_TICK) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if let Err(err) = engine.describe(&request.location, Some(request.max_age)) {
            warn!(location = request.location.as_str(), error = %err, "Device description failed");
        }
        engine.pending.lock().remove(&request.location);
    }
}

fn run_maintenance(engine: Arc<Engine>) {
    let mut last_search = Instant::now();
    while !engine.is_shutdown() {
        thread::sleep(MAINTENANCE_TICK);
        if !engine.shared.running.load(Ordering::SeqCst) {
            continue;
        }
        engine.expire();
        if last_search.elapsed() >= RESEARCH_INTERVAL {
            last_search = Instant::now();
            if let Err(err) = engine.send_search() {
                debug!(error = %err, "Periodic search failed");
            }
        }
    }
}

struct Session {
    engine: Arc<Engine>,
    threads: Vec<JoinHandle<()>>,
}

/// [`RawControlPoint`] over SSDP/SOAP/GENA.
pub struct UpnpControlPoint {
    options: UpnpOptions,
    interfaces: Vec<String>,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl UpnpControlPoint {
    /// `interfaces` restricts multicast to these names; empty means all.
    pub fn new(options: UpnpOptions, interfaces: &[String]) -> Self {
        Self {
            options,
            interfaces: interfaces.to_vec(),
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                devices: RwLock::new(HashMap::new()),
                discovery_listeners: ListenerList::new(),
                notify_listeners: Arc::new(ListenerList::new()),
                icon_selector: RwLock::new(Arc::new(ScoredIconSelector::default())),
            }),
            session: Mutex::new(None),
        }
    }

    fn engine(&self, operation: &'static str) -> Result<Arc<Engine>, ControlPointError> {
        self.session
            .lock()
            .as_ref()
            .map(|session| Arc::clone(&session.engine))
            .ok_or(ControlPointError::NotInitialized(operation))
    }

    pub fn device_count(&self) -> usize {
        self.shared.devices.read().len()
    }

    fn spawn(
        name: &str,
        engine: &Arc<Engine>,
        body: impl FnOnce(Arc<Engine>) + Send + 'static,
    ) -> Result<JoinHandle<()>, ControlPointError> {
        let engine = Arc::clone(engine);
        Ok(thread::Builder::new()
            .name(name.into())
            .spawn(move || body(engine))?)
    }
}

impl RawControlPoint for UpnpControlPoint {
    fn initialize(&self) -> Result<(), ControlPointError> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Ok(());
        }

        let interfaces = pmoutils::usable_interfaces(Some(self.interfaces.as_slice()))?;
        if interfaces.is_empty() {
            warn!(wanted = ?self.interfaces, "No usable IPv4 interface for SSDP");
        }
        let agent = gena::build_agent(self.options.http_timeout);
        let ssdp = ssdp::SsdpClient::new(&interfaces)?;
        let gena = gena::GenaSubscriber::start(
            self.options.event_timeout,
            self.options.http_timeout,
            Arc::clone(&self.shared.notify_listeners),
        )?;
        let (fetch_tx, fetch_rx) = unbounded();

        let engine = Arc::new(Engine {
            options: self.options.clone(),
            agent,
            shared: Arc::clone(&self.shared),
            ssdp,
            gena,
            fetch_tx,
            pending: Mutex::new(HashSet::new()),
            shutdown: AtomicBool::new(false),
        });

        let mut threads = vec![
            Self::spawn("ssdp-search", &engine, run_search_receiver)?,
            Self::spawn("upnp-describe", &engine, move |engine| {
                run_describer(engine, fetch_rx)
            })?,
            Self::spawn("upnp-maintenance", &engine, run_maintenance)?,
        ];
        if engine.ssdp.listens_notify() {
            threads.push(Self::spawn("ssdp-notify", &engine, run_notify_receiver)?);
        }

        info!(interfaces = interfaces.len(), "UPnP control point initialized");
        *session = Some(Session { engine, threads });
        Ok(())
    }

    fn start(&self) -> Result<(), ControlPointError> {
        let engine = self.engine("start")?;
        self.shared.running.store(true, Ordering::SeqCst);
        debug!("UPnP discovery started");
        engine.send_search()
    }

    fn stop(&self) -> Result<(), ControlPointError> {
        self.engine("stop")?;
        self.shared.running.store(false, Ordering::SeqCst);
        debug!("UPnP discovery stopped");
        Ok(())
    }

    fn terminate(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        self.shared.running.store(false, Ordering::SeqCst);
        session.engine.shutdown.store(true, Ordering::SeqCst);
        let current = thread::current().id();
        for handle in session.threads {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        session.engine.gena.shutdown();
        self.shared.devices.write().clear();
        info!("UPnP control point terminated");
    }

    fn search(&self) -> Result<(), ControlPointError> {
        self.engine("search")?.send_search()
    }

    fn add_pinned_device(&self, location: &str) -> Result<(), ControlPointError> {
        let engine = self.engine("add_pinned_device")?;
        let added = engine.describe(location, None)?;
        debug!(location, added, "Pinned device location");
        Ok(())
    }

    fn add_discovery_listener(&self, listener: Arc<dyn DiscoveryListener>) {
        self.shared.discovery_listeners.add(listener);
    }

    fn remove_discovery_listener(&self, listener: &Arc<dyn DiscoveryListener>) {
        self.shared.discovery_listeners.remove(listener);
    }

    fn add_notify_listener(&self, listener: Arc<dyn NotifyListener>) {
        self.shared.notify_listeners.add(listener);
    }

    fn remove_notify_listener(&self, listener: &Arc<dyn NotifyListener>) {
        self.shared.notify_listeners.remove(listener);
    }

    fn set_icon_selector(&self, selector: Arc<dyn IconSelector>) {
        *self.shared.icon_selector.write() = selector;
    }

    fn icon_selector(&self) -> Arc<dyn IconSelector> {
        Arc::clone(&self.shared.icon_selector.read())
    }
}

impl Drop for UpnpControlPoint {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Builds [`UpnpControlPoint`]s sharing one set of options.
pub struct UpnpControlPointFactory {
    options: UpnpOptions,
}

impl UpnpControlPointFactory {
    pub fn new(options: UpnpOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(UpnpOptions::from_config(config))
    }
}

impl RawControlPointFactory for UpnpControlPointFactory {
    fn create(&self, interfaces: &[String]) -> Result<Arc<dyn RawControlPoint>, ControlPointError> {
        let interfaces = if interfaces.is_empty() {
            &self.options.interfaces[..]
        } else {
            interfaces
        };
        Ok(Arc::new(UpnpControlPoint::new(self.options.clone(), interfaces)))
    }
}
