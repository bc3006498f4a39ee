#![allow(dead_code)]

//! Control point, devices et services en mémoire pour les tests d'intégration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use pmocontrolpoint::media_renderer::{AV_TRANSPORT_SERVICE_ID, MEDIA_RENDERER_TYPE_PREFIX};
use pmocontrolpoint::media_server::{CONTENT_DIRECTORY_SERVICE_ID, MEDIA_SERVER_TYPE_PREFIX};
use pmocontrolpoint::{
    ActionResult, BrowseListener, BrowsePage, ContentObject, ContentSource, ControlPointError,
    DeviceIcon, DeviceListener, DeviceProxy, DiscoveryListener, EntryListener, HttpFetcher,
    IconSelector, ListenerList, NotifyListener, RawControlPoint, RawControlPointFactory,
    RawDevice, RawNotification, RawService, ScoredIconSelector, TagValue,
};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ---------------------------------------------------------------------------
// Services et devices
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&str, &[(&str, &str)]) -> Result<ActionResult, ControlPointError> + Send + Sync>;

pub struct FakeService {
    id: String,
    service_type: String,
    actions: HashSet<String>,
    allowed: HashMap<String, Vec<String>>,
    handler: Handler,
    pub calls: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new(id: &str, actions: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            service_type: format!("urn:schemas-upnp-org:service:{}:1", id.rsplit(':').next().unwrap_or(id)),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            allowed: HashMap::new(),
            handler: Box::new(|_, _| Ok(ActionResult::new())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &[(&str, &str)]) -> Result<ActionResult, ControlPointError> + Send + Sync + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    pub fn with_allowed_values(mut self, variable: &str, values: &[&str]) -> Self {
        self.allowed
            .insert(variable.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl RawService for FakeService {
    fn service_id(&self) -> &str {
        &self.id
    }

    fn service_type(&self) -> &str {
        &self.service_type
    }

    fn has_action(&self, action: &str) -> bool {
        self.actions.contains(action)
    }

    fn invoke(&self, action: &str, args: &[(&str, &str)]) -> Result<ActionResult, ControlPointError> {
        self.calls.lock().push(action.to_string());
        (self.handler)(action, args)
    }

    fn allowed_values(&self, variable: &str) -> Vec<String> {
        self.allowed.get(variable).cloned().unwrap_or_default()
    }
}

pub struct FakeDevice {
    udn: String,
    device_type: String,
    friendly_name: String,
    location: String,
    icons: Vec<DeviceIcon>,
    services: Vec<Arc<FakeService>>,
}

impl FakeDevice {
    pub fn new(udn: &str, device_type: &str) -> Self {
        Self {
            udn: udn.to_string(),
            device_type: device_type.to_string(),
            friendly_name: format!("Device {}", udn),
            location: format!("http://192.0.2.1/{}.xml", udn),
            icons: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn with_service(mut self, service: FakeService) -> Self {
        self.services.push(Arc::new(service));
        self
    }

    pub fn with_icon(mut self, icon: DeviceIcon) -> Self {
        self.icons.push(icon);
        self
    }

    pub fn fake_service(&self, id: &str) -> Option<Arc<FakeService>> {
        self.services.iter().find(|s| s.id == id).cloned()
    }

    pub fn into_raw(self) -> Arc<dyn RawDevice> {
        Arc::new(self)
    }
}

impl RawDevice for FakeDevice {
    fn udn(&self) -> &str {
        &self.udn
    }

    fn device_type(&self) -> &str {
        &self.device_type
    }

    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn icons(&self) -> &[DeviceIcon] {
        &self.icons
    }

    fn service(&self, service_id: &str) -> Option<Arc<dyn RawService>> {
        self.services
            .iter()
            .find(|s| s.id == service_id)
            .map(|s| Arc::clone(s) as Arc<dyn RawService>)
    }
}

/// Device whose first `service()` lookup parks until [`DeviceGate::release`].
pub struct ParkedDevice {
    inner: FakeDevice,
    parked: AtomicBool,
    entered: Sender<()>,
    release: Receiver<()>,
}

pub struct DeviceGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl DeviceGate {
    /// Waits until a discovery thread is parked inside the device.
    pub fn wait_parked(&self, timeout: Duration) -> bool {
        self.entered.recv_timeout(timeout).is_ok()
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl ParkedDevice {
    pub fn new(inner: FakeDevice) -> (Arc<dyn RawDevice>, DeviceGate) {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let device = Self {
            inner,
            parked: AtomicBool::new(false),
            entered: entered_tx,
            release: release_rx,
        };
        let gate = DeviceGate {
            entered: entered_rx,
            release: release_tx,
        };
        (Arc::new(device), gate)
    }
}

impl RawDevice for ParkedDevice {
    fn udn(&self) -> &str {
        self.inner.udn()
    }

    fn device_type(&self) -> &str {
        self.inner.device_type()
    }

    fn friendly_name(&self) -> &str {
        self.inner.friendly_name()
    }

    fn location(&self) -> &str {
        self.inner.location()
    }

    fn icons(&self) -> &[DeviceIcon] {
        self.inner.icons()
    }

    fn service(&self, service_id: &str) -> Option<Arc<dyn RawService>> {
        if !self.parked.swap(true, Ordering::SeqCst) {
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(5));
        }
        self.inner.service(service_id)
    }
}

pub fn server_type() -> String {
    format!("{}1", MEDIA_SERVER_TYPE_PREFIX)
}

pub fn renderer_type() -> String {
    format!("{}1", MEDIA_RENDERER_TYPE_PREFIX)
}

/// Builds `count` items `item-0..` under `parent`, titled `Track i`.
pub fn items(parent: &str, count: usize) -> Vec<ContentObject> {
    (0..count)
        .map(|i| {
            ContentObject::new_item(format!("item-{}", i), parent)
                .with_tag("dc:title", TagValue::new(format!("Track {}", i)))
                .with_tag("upnp:class", TagValue::new("object.item.audioItem.musicTrack"))
        })
        .collect()
}

pub fn container(id: &str, parent: &str, title: &str) -> ContentObject {
    ContentObject::new_container(id, parent)
        .with_tag("dc:title", TagValue::new(title))
        .with_tag("upnp:class", TagValue::new("object.container"))
}

fn arg<'a>(args: &[(&'a str, &'a str)], name: &str) -> &'a str {
    args.iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
        .unwrap_or_default()
}

/// ContentDirectory answering `Browse` from an in-memory tree, as DIDL-Lite.
pub fn content_directory(tree: HashMap<String, Vec<ContentObject>>) -> FakeService {
    FakeService::new(
        CONTENT_DIRECTORY_SERVICE_ID,
        &["Browse", "GetSearchCapabilities", "GetSortCapabilities", "GetSystemUpdateID"],
    )
    .with_handler(move |action, args| {
        if action != "Browse" {
            return Ok(ActionResult::new());
        }
        let children = tree.get(arg(args, "ObjectID")).cloned().unwrap_or_default();
        let start: usize = arg(args, "StartingIndex").parse().unwrap_or(0);
        let count: usize = arg(args, "RequestedCount").parse().unwrap_or(0);
        let end = if count == 0 {
            children.len()
        } else {
            (start + count).min(children.len())
        };
        let page = children.get(start.min(end)..end).unwrap_or_default();

        let mut result = ActionResult::new();
        result.insert("Result".into(), pmodidl::to_didl(page)?);
        result.insert("NumberReturned".into(), page.len().to_string());
        result.insert("TotalMatches".into(), children.len().to_string());
        result.insert("UpdateID".into(), "1".into());
        Ok(result)
    })
}

pub fn media_server(udn: &str, tree: HashMap<String, Vec<ContentObject>>) -> FakeDevice {
    FakeDevice::new(udn, &server_type()).with_service(content_directory(tree))
}

pub fn av_transport() -> FakeService {
    FakeService::new(
        AV_TRANSPORT_SERVICE_ID,
        &["SetAVTransportURI", "Play", "Pause", "Stop", "Seek", "Next", "Previous"],
    )
}

pub fn media_renderer(udn: &str) -> FakeDevice {
    FakeDevice::new(udn, &renderer_type()).with_service(av_transport())
}

// ---------------------------------------------------------------------------
// Control point brut
// ---------------------------------------------------------------------------

pub struct FakeControlPoint {
    pub interfaces: Vec<String>,
    pub fail_initialize: AtomicBool,
    initialized: AtomicBool,
    started: AtomicBool,
    pub terminate_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub pinned: Mutex<Vec<String>>,
    discovery: ListenerList<dyn DiscoveryListener>,
    notify: ListenerList<dyn NotifyListener>,
    icon_selector: RwLock<Arc<dyn IconSelector>>,
}

impl FakeControlPoint {
    pub fn new(interfaces: &[String]) -> Self {
        Self {
            interfaces: interfaces.to_vec(),
            fail_initialize: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            started: AtomicBool::new(false),
            terminate_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            pinned: Mutex::new(Vec::new()),
            discovery: ListenerList::new(),
            notify: ListenerList::new(),
            icon_selector: RwLock::new(Arc::new(ScoredIconSelector::default())),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new(&[]))
    }

    pub fn as_raw(self: &Arc<Self>) -> Arc<dyn RawControlPoint> {
        Arc::clone(self) as Arc<dyn RawControlPoint>
    }

    pub fn discover(&self, device: &Arc<dyn RawDevice>) {
        self.discovery
            .for_each("discover", |l| l.on_discover(Arc::clone(device)));
    }

    pub fn lose(&self, device: &Arc<dyn RawDevice>) {
        self.discovery.for_each("lost", |l| l.on_lost(Arc::clone(device)));
    }

    pub fn notify(&self, udn: &str, service_id: &str, variable: &str, value: &str) {
        let notification = RawNotification {
            udn: udn.to_string(),
            service_id: service_id.to_string(),
            sequence: 0,
            variable: variable.to_string(),
            value: value.to_string(),
        };
        self.notify.for_each("notify", |l| l.on_notify(&notification));
    }

    pub fn discovery_listener_count(&self) -> usize {
        self.discovery.len()
    }

    pub fn notify_listener_count(&self) -> usize {
        self.notify.len()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate_calls.load(Ordering::SeqCst) > 0
    }

    fn require_initialized(&self, operation: &'static str) -> Result<(), ControlPointError> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ControlPointError::NotInitialized(operation))
        }
    }
}

impl RawControlPoint for FakeControlPoint {
    fn initialize(&self) -> Result<(), ControlPointError> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(ControlPointError::ControlPoint("no usable interface".into()));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn start(&self) -> Result<(), ControlPointError> {
        self.require_initialized("start")?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), ControlPointError> {
        self.require_initialized("stop")?;
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn terminate(&self) {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        self.initialized.store(false, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
    }

    fn search(&self) -> Result<(), ControlPointError> {
        self.require_initialized("search")?;
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn add_pinned_device(&self, location: &str) -> Result<(), ControlPointError> {
        self.require_initialized("add_pinned_device")?;
        self.pinned.lock().push(location.to_string());
        Ok(())
    }

    fn add_discovery_listener(&self, listener: Arc<dyn DiscoveryListener>) {
        self.discovery.add(listener);
    }

    fn remove_discovery_listener(&self, listener: &Arc<dyn DiscoveryListener>) {
        self.discovery.remove(listener);
    }

    fn add_notify_listener(&self, listener: Arc<dyn NotifyListener>) {
        self.notify.add(listener);
    }

    fn remove_notify_listener(&self, listener: &Arc<dyn NotifyListener>) {
        self.notify.remove(listener);
    }

    fn set_icon_selector(&self, selector: Arc<dyn IconSelector>) {
        *self.icon_selector.write() = selector;
    }

    fn icon_selector(&self) -> Arc<dyn IconSelector> {
        Arc::clone(&self.icon_selector.read())
    }
}

/// Records every control point it creates.
#[derive(Default)]
pub struct FakeFactory {
    pub created: Mutex<Vec<Arc<FakeControlPoint>>>,
    pub fail_initialize: AtomicBool,
}

impl FakeFactory {
    pub fn last(&self) -> Arc<FakeControlPoint> {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("no control point created yet")
    }

    pub fn count(&self) -> usize {
        self.created.lock().len()
    }
}

impl RawControlPointFactory for FakeFactory {
    fn create(&self, interfaces: &[String]) -> Result<Arc<dyn RawControlPoint>, ControlPointError> {
        let cp = Arc::new(FakeControlPoint::new(interfaces));
        cp.fail_initialize
            .store(self.fail_initialize.load(Ordering::SeqCst), Ordering::SeqCst);
        self.created.lock().push(Arc::clone(&cp));
        Ok(cp)
    }
}

// ---------------------------------------------------------------------------
// Sources de contenu
// ---------------------------------------------------------------------------

/// Serves the children of one container from memory, with optional latency
/// and an optional failure on a given page.
pub struct VecSource {
    objects: Vec<ContentObject>,
    pub page_delay: Duration,
    pub fail_on_page: Option<usize>,
    pub pages_served: AtomicUsize,
}

impl VecSource {
    pub fn new(objects: Vec<ContentObject>) -> Self {
        Self {
            objects,
            page_delay: Duration::ZERO,
            fail_on_page: None,
            pages_served: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn failing_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }
}

impl ContentSource for VecSource {
    fn browse_children(
        &self,
        _container_id: &str,
        starting_index: u32,
        requested_count: u32,
    ) -> Result<BrowsePage, ControlPointError> {
        if !self.page_delay.is_zero() {
            thread::sleep(self.page_delay);
        }
        let page_number = self.pages_served.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_page == Some(page_number) {
            return Err(ControlPointError::Http("connection reset".into()));
        }
        let start = (starting_index as usize).min(self.objects.len());
        let end = (start + requested_count as usize).min(self.objects.len());
        let objects = self.objects[start..end].to_vec();
        Ok(BrowsePage {
            number_returned: objects.len() as u32,
            total_matches: self.objects.len() as u32,
            update_id: 0,
            objects,
        })
    }
}

// ---------------------------------------------------------------------------
// Listeners enregistreurs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct DeviceRecorder {
    pub discovered: Mutex<Vec<String>>,
    pub lost: Mutex<Vec<String>>,
}

impl DeviceRecorder {
    pub fn discovered(&self) -> Vec<String> {
        self.discovered.lock().clone()
    }

    pub fn lost(&self) -> Vec<String> {
        self.lost.lock().clone()
    }
}

impl<P: DeviceProxy> DeviceListener<P> for DeviceRecorder {
    fn on_discover(&self, device: &Arc<P>) {
        self.discovered.lock().push(device.udn().to_string());
    }

    fn on_lost(&self, device: &Arc<P>) {
        self.lost.lock().push(device.udn().to_string());
    }
}

/// Every browse batch as (object ids, in_progress).
#[derive(Default)]
pub struct BatchRecorder {
    pub batches: Mutex<Vec<(Vec<String>, bool)>>,
}

impl BatchRecorder {
    pub fn batches(&self) -> Vec<(Vec<String>, bool)> {
        self.batches.lock().clone()
    }

    pub fn concatenated_ids(&self) -> Vec<String> {
        self.batches
            .lock()
            .iter()
            .flat_map(|(ids, _)| ids.clone())
            .collect()
    }

    pub fn final_count(&self) -> usize {
        self.batches.lock().iter().filter(|(_, p)| !p).count()
    }
}

impl BrowseListener for BatchRecorder {
    fn on_batch(&self, batch: &[ContentObject], in_progress: bool) {
        let ids = batch.iter().map(|o| o.id.clone()).collect();
        self.batches.lock().push((ids, in_progress));
    }
}

/// Every navigator notification as (entry count, in_progress).
#[derive(Default)]
pub struct EntryRecorder {
    pub calls: Mutex<Vec<(usize, bool)>>,
}

impl EntryRecorder {
    pub fn calls(&self) -> Vec<(usize, bool)> {
        self.calls.lock().clone()
    }

    pub fn last(&self) -> Option<(usize, bool)> {
        self.calls.lock().last().copied()
    }
}

impl EntryListener for EntryRecorder {
    fn on_entries(&self, entries: &[ContentObject], in_progress: bool) {
        self.calls.lock().push((entries.len(), in_progress));
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Serves canned bodies by URL and records requested URLs.
#[derive(Default)]
pub struct MockHttp {
    bodies: HashMap<String, String>,
    pub requests: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl HttpFetcher for MockHttp {
    fn get_text(&self, url: &str) -> Result<String, ControlPointError> {
        self.requests.lock().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| ControlPointError::Http(format!("GET {} returned 404 Not Found", url)))
    }
}
